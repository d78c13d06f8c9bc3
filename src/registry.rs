//! Process registry
//!
//! Durable mapping from a logical launch-target name to the process
//! names that must be killed to close it, stored as a JSON array of
//! single-key mappings: `[ {"Rust": ["RustClient.exe"]}, ... ]`.
//!
//! The whole file is round-tripped on every mutation. Writes are
//! infrequent and user-driven, so concurrent external edits are
//! last-writer-wins and no locking is attempted.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    path: PathBuf,
}

impl ProcessRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Process names recorded for `logical_name`; empty when unknown.
    pub fn get(&self, logical_name: &str) -> Result<Vec<String>> {
        let entries = self.read_all()?;
        Ok(entries
            .into_iter()
            .find_map(|mut entry| entry.remove(logical_name))
            .unwrap_or_default())
    }

    /// Upsert: an existing entry's process list is replaced wholesale.
    pub fn put(&self, logical_name: &str, process_names: &[String]) -> Result<()> {
        let mut entries = self.read_all()?;
        match entries
            .iter_mut()
            .find(|entry| entry.contains_key(logical_name))
        {
            Some(entry) => {
                entry.insert(logical_name.to_string(), process_names.to_vec());
            }
            None => {
                let mut entry = HashMap::new();
                entry.insert(logical_name.to_string(), process_names.to_vec());
                entries.push(entry);
            }
        }
        self.write_all(&entries)
    }

    /// Purge entries left behind by a deleted command.
    pub fn remove_by_value(&self, identifier: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.retain(|entry| !entry.contains_key(identifier));
        self.write_all(&entries)
    }

    fn read_all(&self) -> Result<Vec<HashMap<String, Vec<String>>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, entries: &[HashMap<String, Vec<String>>]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, ProcessRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let reg = ProcessRegistry::new(dir.path().join("registry.json"));
        (dir, reg)
    }

    #[test]
    fn unknown_name_is_empty() {
        let (_dir, reg) = registry();
        assert!(reg.get("Rust").unwrap().is_empty());
    }

    #[test]
    fn put_replaces_not_merges() {
        let (_dir, reg) = registry();
        reg.put("Rust", &["EasyAntiCheat.exe".to_string(), "RustClient.exe".to_string()])
            .unwrap();
        reg.put("Rust", &["RustClient.exe".to_string()]).unwrap();
        assert_eq!(reg.get("Rust").unwrap(), vec!["RustClient.exe"]);
    }

    #[test]
    fn entries_survive_round_trip() {
        let (_dir, reg) = registry();
        reg.put("Rust", &["RustClient.exe".to_string()]).unwrap();
        reg.put("Paint", &["mspaint.exe".to_string()]).unwrap();

        let reopened = ProcessRegistry::new(reg.path().to_path_buf());
        assert_eq!(reopened.get("Rust").unwrap(), vec!["RustClient.exe"]);
        assert_eq!(reopened.get("Paint").unwrap(), vec!["mspaint.exe"]);
    }

    #[test]
    fn remove_by_value_purges_entry() {
        let (_dir, reg) = registry();
        reg.put("Rust", &["RustClient.exe".to_string()]).unwrap();
        reg.put("Paint", &["mspaint.exe".to_string()]).unwrap();
        reg.remove_by_value("Rust").unwrap();
        assert!(reg.get("Rust").unwrap().is_empty());
        assert_eq!(reg.get("Paint").unwrap(), vec!["mspaint.exe"]);
    }
}
