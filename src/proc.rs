//! OS process control
//!
//! Everything the assistant does to the machine goes through the
//! [`ProcessControl`] trait so the dispatch logic stays testable. The
//! system implementation shells out to the OS tools: `tasklist`/
//! `taskkill` on Windows, `ps`/`pkill` elsewhere. Only the observable
//! contract matters, not the tool: list process names, kill by name
//! (success when already absent), launch, open URIs and folders,
//! enumerate and close windows by title.

use std::collections::HashSet;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use crate::error::{Error, Result};

pub trait ProcessControl: Send + Sync {
    /// Names of all currently running processes.
    fn process_names(&self) -> Result<HashSet<String>>;

    /// Terminate every process with this image name. A name that is not
    /// running is a success; only abnormal tool failures are errors.
    fn kill_by_name(&self, name: &str) -> Result<()>;

    /// Launch an executable detached, with arguments and a working
    /// directory.
    fn launch(&self, exe: &Path, args: &[String], workdir: &Path) -> Result<()>;

    /// Open a URI with the OS default handler.
    fn open_uri(&self, uri: &str) -> Result<()>;

    /// Open a directory in the file manager.
    fn open_folder(&self, dir: &Path) -> Result<()>;

    /// Titles of all open top-level windows.
    fn window_titles(&self) -> Result<Vec<String>>;

    /// Close the window whose title is exactly `title`.
    fn close_window(&self, title: &str) -> Result<()>;

    /// Run a small OS utility given as a command line.
    fn spawn_utility(&self, cmdline: &str) -> Result<()>;

    fn shutdown(&self) -> Result<()>;

    fn restart(&self) -> Result<()>;
}

/// Discovers which processes a freshly launched program spawned by
/// diffing the OS process list around the launch.
pub struct ProcessDiffTracker {
    proc: Arc<dyn ProcessControl>,
}

impl ProcessDiffTracker {
    pub fn new(proc: Arc<dyn ProcessControl>) -> Self {
        Self { proc }
    }

    pub fn snapshot(&self) -> Result<HashSet<String>> {
        self.proc.process_names()
    }

    /// `after - before`, sorted. Empty means detection failed, which is
    /// not the same as launch failure.
    pub fn diff(before: &HashSet<String>, after: &HashSet<String>) -> Vec<String> {
        let mut new: Vec<String> = after.difference(before).cloned().collect();
        new.sort();
        new
    }
}

/// The real thing: shells out to the OS tools.
pub struct SystemProcessControl;

impl SystemProcessControl {
    fn detached(mut cmd: Command) -> Result<()> {
        cmd.stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Process(format!("spawn failed: {e}")))?;
        Ok(())
    }
}

#[cfg(windows)]
impl ProcessControl for SystemProcessControl {
    fn process_names(&self) -> Result<HashSet<String>> {
        let output = Command::new("tasklist")
            .args(["/FO", "CSV", "/NH"])
            .output()
            .map_err(|e| Error::Process(format!("tasklist failed: {e}")))?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text
            .lines()
            .filter_map(|line| csv_fields(line).into_iter().next())
            .collect())
    }

    fn kill_by_name(&self, name: &str) -> Result<()> {
        let output = Command::new("taskkill")
            .args(["/IM", name, "/F", "/T"])
            .output()
            .map_err(|e| Error::Process(format!("taskkill failed: {e}")))?;
        if output.status.success() {
            return Ok(());
        }
        // Exit code 128: no such process. Already gone counts as done.
        if output.status.code() == Some(128) {
            return Ok(());
        }
        Err(Error::Process(format!(
            "taskkill {name} exit={}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }

    fn launch(&self, exe: &Path, args: &[String], workdir: &Path) -> Result<()> {
        let mut cmd = Command::new(exe);
        cmd.args(args).current_dir(workdir);
        Self::detached(cmd)
    }

    fn open_uri(&self, uri: &str) -> Result<()> {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", uri]);
        Self::detached(cmd)
    }

    fn open_folder(&self, dir: &Path) -> Result<()> {
        let mut cmd = Command::new("explorer");
        cmd.arg(dir);
        Self::detached(cmd)
    }

    fn window_titles(&self) -> Result<Vec<String>> {
        let output = Command::new("tasklist")
            .args(["/V", "/FO", "CSV", "/NH"])
            .output()
            .map_err(|e| Error::Process(format!("tasklist failed: {e}")))?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text
            .lines()
            .filter_map(|line| csv_fields(line).into_iter().last())
            .filter(|title| !title.is_empty() && title != "N/A")
            .collect())
    }

    fn close_window(&self, title: &str) -> Result<()> {
        let output = Command::new("taskkill")
            .args(["/FI", &format!("WINDOWTITLE eq {title}")])
            .output()
            .map_err(|e| Error::Process(format!("taskkill failed: {e}")))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Process(format!(
                "taskkill window '{title}' exit={}",
                output.status
            )))
        }
    }

    fn spawn_utility(&self, cmdline: &str) -> Result<()> {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", cmdline]);
        Self::detached(cmd)
    }

    fn shutdown(&self) -> Result<()> {
        let mut cmd = Command::new("shutdown");
        cmd.args(["/s", "/t", "5"]);
        Self::detached(cmd)
    }

    fn restart(&self) -> Result<()> {
        let mut cmd = Command::new("shutdown");
        cmd.args(["/r", "/t", "5"]);
        Self::detached(cmd)
    }
}

#[cfg(not(windows))]
impl ProcessControl for SystemProcessControl {
    fn process_names(&self) -> Result<HashSet<String>> {
        let output = Command::new("ps")
            .args(["-eo", "comm="])
            .output()
            .map_err(|e| Error::Process(format!("ps failed: {e}")))?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect())
    }

    fn kill_by_name(&self, name: &str) -> Result<()> {
        let output = Command::new("pkill")
            .args(["-x", name])
            .output()
            .map_err(|e| Error::Process(format!("pkill failed: {e}")))?;
        // Exit code 1: no processes matched. Already gone counts as done.
        match output.status.code() {
            Some(0) | Some(1) => Ok(()),
            _ => Err(Error::Process(format!(
                "pkill {name} exit={}",
                output.status
            ))),
        }
    }

    fn launch(&self, exe: &Path, args: &[String], workdir: &Path) -> Result<()> {
        let mut cmd = Command::new(exe);
        cmd.args(args).current_dir(workdir);
        Self::detached(cmd)
    }

    fn open_uri(&self, uri: &str) -> Result<()> {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(uri);
        Self::detached(cmd)
    }

    fn open_folder(&self, dir: &Path) -> Result<()> {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(dir);
        Self::detached(cmd)
    }

    fn window_titles(&self) -> Result<Vec<String>> {
        // No portable window enumeration outside Windows.
        Ok(Vec::new())
    }

    fn close_window(&self, title: &str) -> Result<()> {
        Err(Error::Process(format!(
            "window close not supported on this platform: {title}"
        )))
    }

    fn spawn_utility(&self, cmdline: &str) -> Result<()> {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", cmdline]);
        Self::detached(cmd)
    }

    fn shutdown(&self) -> Result<()> {
        self.spawn_utility("systemctl poweroff")
    }

    fn restart(&self) -> Result<()> {
        self.spawn_utility("systemctl reboot")
    }
}

/// Split one line of `tasklist /FO CSV` output into unquoted fields.
#[cfg_attr(not(windows), allow(dead_code))]
fn csv_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if !current.is_empty() || !fields.is_empty() {
        fields.push(current);
    }
    fields
}
