//! Profanity filter and counters
//!
//! Every utterance is checked against a configured keyword list. Hits
//! bump persistent daily/weekly/monthly/total counters no matter what
//! else happens to the utterance; when censorship mode is on the
//! dispatcher additionally swallows the utterance. The counter file is
//! round-tripped whole on every hit, same as the other stores.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PeriodCount {
    key: String,
    count: u64,
}

impl PeriodCount {
    fn bump(&mut self, key: String) {
        if self.key != key {
            self.key = key;
            self.count = 0;
        }
        self.count += 1;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Counters {
    total: u64,
    day: PeriodCount,
    week: PeriodCount,
    month: PeriodCount,
}

pub struct SwearFilter {
    words: Vec<String>,
    path: PathBuf,
}

impl SwearFilter {
    pub fn new(words: Vec<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            words: words.into_iter().map(|w| w.to_lowercase()).collect(),
            path: path.into(),
        }
    }

    /// True when `text` contains a listed word; the counters are bumped
    /// on disk before returning.
    pub fn record(&self, text: &str) -> Result<bool> {
        if !self.words.iter().any(|w| text.contains(w.as_str())) {
            return Ok(false);
        }
        self.bump(Local::now().date_naive())?;
        Ok(true)
    }

    fn bump(&self, today: NaiveDate) -> Result<()> {
        let mut counters = self.read()?;
        counters.total += 1;
        counters.day.bump(today.format("%Y-%m-%d").to_string());
        let week = today.iso_week();
        counters
            .week
            .bump(format!("{}-W{:02}", week.year(), week.week()));
        counters
            .month
            .bump(format!("{}-{:02}", today.year(), today.month()));
        self.write(&counters)
    }

    fn read(&self) -> Result<Counters> {
        if !self.path.exists() {
            return Ok(Counters::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Counters::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, counters: &Counters) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(counters)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(dir: &tempfile::TempDir) -> SwearFilter {
        SwearFilter::new(
            vec!["блин".to_string()],
            dir.path().join("counters.json"),
        )
    }

    #[test]
    fn clean_text_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let f = filter(&dir);
        assert!(!f.record("джо открой браузер").unwrap());
        assert!(!dir.path().join("counters.json").exists());
    }

    #[test]
    fn hits_accumulate_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let f = filter(&dir);
        assert!(f.record("ну блин").unwrap());
        assert!(f.record("блин блин").unwrap());

        let reopened = filter(&dir);
        let counters = reopened.read().unwrap();
        assert_eq!(counters.total, 2);
        assert_eq!(counters.day.count, 2);
    }

    #[test]
    fn period_rollover_resets_count_but_not_total() {
        let dir = tempfile::tempdir().unwrap();
        let f = filter(&dir);
        f.bump(NaiveDate::from_ymd_opt(2026, 7, 31).unwrap()).unwrap();
        f.bump(NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()).unwrap();

        let counters = f.read().unwrap();
        assert_eq!(counters.total, 2);
        assert_eq!(counters.day.count, 1);
        assert_eq!(counters.month.key, "2026-08");
        assert_eq!(counters.month.count, 1);
    }
}
