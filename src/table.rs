//! User command table
//!
//! A JSON object on disk, `{ keyword: target_string }`, owned by the
//! command-editing UI and read-only to the core. A target string ending
//! in `.lnk`/`.url` is an application command; anything else is a folder
//! command. The file is watched and the parsed table swapped atomically,
//! so GUI edits show up between dispatch cycles without restarts.
//!
//! Keyword disjointness against the built-in keyword sets is enforced
//! here, at load time. Overlapping keys are configuration errors and are
//! dropped with a report, never resolved by dispatch-time priority.

use arc_swap::ArcSwap;
use notify::{RecursiveMode, Watcher, recommended_watcher};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::builtin;
use crate::error::{Error, Result};
use crate::feedback::{Notifier, Severity};

/// What a spoken keyword launches or closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTarget {
    /// A `.lnk` or `.url` file describing an application or game
    ShortcutFile(PathBuf),
    /// A plain directory opened in the file manager
    FolderPath(PathBuf),
}

impl CommandTarget {
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        if lower.ends_with(".lnk") || lower.ends_with(".url") {
            CommandTarget::ShortcutFile(PathBuf::from(raw))
        } else {
            CommandTarget::FolderPath(PathBuf::from(raw))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            CommandTarget::ShortcutFile(p) | CommandTarget::FolderPath(p) => p,
        }
    }

    /// The logical name a launch is tracked under in the process
    /// registry: the target's file stem.
    pub fn logical_name(&self) -> String {
        self.path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path().to_string_lossy().into_owned())
    }

    fn raw(&self) -> String {
        self.path().to_string_lossy().into_owned()
    }
}

/// A user keyword that collides with a built-in keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordConflict {
    pub keyword: String,
    pub builtin: String,
}

/// In-memory command table with unique lowercase keys.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    entries: HashMap<String, CommandTarget>,
}

impl CommandTable {
    pub fn new(entries: HashMap<String, CommandTarget>) -> Self {
        Self { entries }
    }

    /// Parse the on-disk JSON object, dropping keys that collide with
    /// built-in keywords. A missing file is an empty table.
    pub fn load(path: &Path) -> Result<(Self, Vec<KeywordConflict>)> {
        if !path.exists() {
            return Ok((Self::default(), Vec::new()));
        }
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<(Self, Vec<KeywordConflict>)> {
        let raw: HashMap<String, String> = serde_json::from_str(contents)?;
        let mut entries = HashMap::new();
        let mut conflicts = Vec::new();

        for (keyword, target) in raw {
            let keyword = keyword.trim().to_lowercase();
            if keyword.is_empty() {
                continue;
            }
            match builtin::overlapping_keyword(&keyword) {
                Some(builtin) => conflicts.push(KeywordConflict {
                    keyword,
                    builtin: builtin.to_string(),
                }),
                None => {
                    entries.insert(keyword, CommandTarget::classify(&target));
                }
            }
        }

        Ok((Self { entries }, conflicts))
    }

    pub fn to_json(&self) -> Result<String> {
        let raw: HashMap<&str, String> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.raw()))
            .collect();
        Ok(serde_json::to_string_pretty(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, keyword: &str) -> Option<&CommandTarget> {
        self.entries.get(keyword)
    }

    /// Longest keyword contained in `text` whose target is an
    /// application shortcut.
    pub fn match_app(&self, text: &str) -> Option<(&str, &CommandTarget)> {
        self.match_where(text, |t| matches!(t, CommandTarget::ShortcutFile(_)))
    }

    /// Longest keyword contained in `text` whose target is a folder.
    pub fn match_folder(&self, text: &str) -> Option<(&str, &CommandTarget)> {
        self.match_where(text, |t| matches!(t, CommandTarget::FolderPath(_)))
    }

    pub fn match_any(&self, text: &str) -> Option<(&str, &CommandTarget)> {
        self.match_where(text, |_| true)
    }

    fn match_where(
        &self,
        text: &str,
        accept: impl Fn(&CommandTarget) -> bool,
    ) -> Option<(&str, &CommandTarget)> {
        self.entries
            .iter()
            .filter(|(k, t)| accept(t) && text.contains(k.as_str()))
            .max_by_key(|(k, _)| k.len())
            .map(|(k, t)| (k.as_str(), t))
    }
}

/// Shared handle to the current table, swapped on file change.
pub struct CommandTableHandle {
    inner: Arc<ArcSwap<CommandTable>>,
    _watcher: Option<notify::RecommendedWatcher>,
}

impl CommandTableHandle {
    /// A handle over a table that never changes (tests, embedding).
    pub fn fixed(table: CommandTable) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(table)),
            _watcher: None,
        }
    }

    /// Load the table and keep it fresh while the UI rewrites the file.
    pub fn watch(path: &Path, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let (table, conflicts) = CommandTable::load(path)?;
        report_conflicts(&conflicts, notifier.as_ref());

        let inner = Arc::new(ArcSwap::from_pointee(table));

        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher =
            recommended_watcher(tx).map_err(|e| Error::Config(format!("table watcher: {e}")))?;
        if path.exists() {
            watcher
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(|e| Error::Config(format!("table watch: {e}")))?;
        } else if let Some(parent) = path.parent() {
            // The UI may not have created the file yet; watch the directory.
            fs::create_dir_all(parent)?;
            watcher
                .watch(parent, RecursiveMode::NonRecursive)
                .map_err(|e| Error::Config(format!("table watch: {e}")))?;
        }

        let swap = Arc::clone(&inner);
        let watch_path = path.to_path_buf();
        std::thread::spawn(move || {
            for event in rx {
                let Ok(event) = event else { continue };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    continue;
                }
                // Editors often write in two steps; let the file settle.
                std::thread::sleep(Duration::from_millis(100));
                match CommandTable::load(&watch_path) {
                    Ok((table, conflicts)) => {
                        report_conflicts(&conflicts, notifier.as_ref());
                        tracing::info!(commands = table.len(), "command table reloaded");
                        swap.store(Arc::new(table));
                    }
                    Err(e) => notifier.on_error(&e),
                }
            }
        });

        Ok(Self {
            inner,
            _watcher: Some(watcher),
        })
    }

    pub fn current(&self) -> Arc<CommandTable> {
        self.inner.load_full()
    }
}

fn report_conflicts(conflicts: &[KeywordConflict], notifier: &dyn Notifier) {
    for c in conflicts {
        notifier.on_log(
            Severity::Warn,
            &format!(
                "command keyword '{}' overlaps built-in keyword '{}' and was disabled",
                c.keyword, c.builtin
            ),
        );
    }
}
