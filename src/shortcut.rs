//! Shortcut resolution
//!
//! Launch targets are described by Windows shortcut files: `.lnk` for
//! applications (target executable, argument string, working directory)
//! and `.url` for launcher URIs (Steam, Epic). Reading them sits behind
//! [`ShortcutReader`] so resolver tests can hand in canned results.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// What a `.lnk` file points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedShortcut {
    pub target: PathBuf,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

pub trait ShortcutReader: Send + Sync {
    /// Extract (target, arguments, working directory) from a `.lnk`.
    /// An empty stored working directory defaults to the target's
    /// containing directory.
    fn read_lnk(&self, path: &Path) -> Result<ResolvedShortcut>;

    /// Extract the embedded URI from a `.url` file.
    fn read_url(&self, path: &Path) -> Result<String>;
}

/// Reads real shortcut files from disk.
pub struct FileShortcutReader;

impl ShortcutReader for FileShortcutReader {
    fn read_lnk(&self, path: &Path) -> Result<ResolvedShortcut> {
        let link = lnk::ShellLink::open(path)
            .map_err(|e| Error::Shortcut(format!("{}: {e:?}", path.display())))?;

        let target = link
            .link_info()
            .as_ref()
            .and_then(|info| info.local_base_path().clone())
            .map(|p| PathBuf::from(normalize_separators(&p)))
            .or_else(|| {
                link.relative_path().as_ref().map(|rel| {
                    let base = path.parent().unwrap_or_else(|| Path::new("."));
                    base.join(normalize_separators(rel))
                })
            })
            .ok_or_else(|| {
                Error::Shortcut(format!("{}: no target stored", path.display()))
            })?;

        let args = link
            .arguments()
            .as_deref()
            .map(split_args)
            .unwrap_or_default();

        let workdir = link
            .working_dir()
            .as_deref()
            .filter(|dir| !dir.trim().is_empty())
            .map(|dir| PathBuf::from(normalize_separators(dir)))
            .unwrap_or_else(|| {
                target
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."))
            });

        Ok(ResolvedShortcut {
            target,
            args,
            workdir,
        })
    }

    fn read_url(&self, path: &Path) -> Result<String> {
        let contents = fs::read_to_string(path)?;
        parse_url_file(&contents)
            .ok_or_else(|| Error::Shortcut(format!("{}: no URL entry", path.display())))
    }
}

/// Pull `URL=...` out of an INI-style `.url` file.
pub fn parse_url_file(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let line = line.trim();
        let (key, value) = line.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("url") {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

/// Game id from a `steam://rungameid/<id>` URI.
pub fn steam_game_id(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("steam://rungameid/")?;
    let id = rest.split(['/', '?']).next()?;
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then_some(id)
}

/// Tokenize a shortcut's argument string, respecting double quotes.
pub fn split_args(s: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in s.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

fn normalize_separators(path: &str) -> String {
    if std::path::MAIN_SEPARATOR == '/' {
        path.replace('\\', "/")
    } else {
        path.to_string()
    }
}
