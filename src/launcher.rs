//! Launch resolution
//!
//! Turns a [`CommandTarget`] plus an open/close action into OS effects.
//! Opening an application with no recorded processes goes through the
//! snapshot → launch → settle → snapshot → diff sequence so the spawned
//! processes can be registered for a later "close". The settle wait
//! deliberately blocks the dispatcher: the assistant is busy while it
//! confirms a launch, and utterances keep their order.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::AssistantConfig;
use crate::error::{Error, Result};
use crate::feedback::{Notifier, Severity};
use crate::proc::{ProcessControl, ProcessDiffTracker};
use crate::registry::ProcessRegistry;
use crate::shortcut::{ShortcutReader, steam_game_id};
use crate::table::CommandTarget;

/// What a recognized verb asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Open,
    Close,
}

/// Seam between the dispatcher and the launch machinery.
pub trait Resolver: Send {
    fn open(&self, keyword: &str, target: &CommandTarget) -> Result<()>;
    fn close(&self, keyword: &str, target: &CommandTarget) -> Result<()>;
}

/// Settle delay before the post-launch snapshot, per launch class.
/// Steam and Epic start a wrapper first; the real game process can take
/// half a minute to appear.
#[derive(Debug, Clone, Copy)]
pub struct SettleDelays {
    pub plain: Duration,
    pub steam: Duration,
    pub epic: Duration,
}

impl SettleDelays {
    pub fn from_config(config: &AssistantConfig) -> Self {
        Self {
            plain: Duration::from_secs(config.settle_plain_secs),
            steam: Duration::from_secs(config.settle_steam_secs),
            epic: Duration::from_secs(config.settle_epic_secs),
        }
    }
}

enum Invocation {
    Exe {
        exe: PathBuf,
        args: Vec<String>,
        workdir: PathBuf,
    },
    Uri(String),
}

pub struct LaunchResolver {
    proc: Arc<dyn ProcessControl>,
    tracker: ProcessDiffTracker,
    shortcuts: Box<dyn ShortcutReader>,
    registry: ProcessRegistry,
    steam_path: PathBuf,
    settle: SettleDelays,
    notifier: Arc<dyn Notifier>,
}

impl LaunchResolver {
    pub fn new(
        proc: Arc<dyn ProcessControl>,
        shortcuts: Box<dyn ShortcutReader>,
        registry: ProcessRegistry,
        steam_path: PathBuf,
        settle: SettleDelays,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let tracker = ProcessDiffTracker::new(Arc::clone(&proc));
        Self {
            proc,
            tracker,
            shortcuts,
            registry,
            steam_path,
            settle,
            notifier,
        }
    }

    fn resolve_invocation(&self, path: &Path) -> Result<(Invocation, Duration)> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "lnk" => {
                let resolved = self.shortcuts.read_lnk(path)?;
                check_executable(&resolved.target)?;
                Ok((
                    Invocation::Exe {
                        exe: resolved.target,
                        args: resolved.args,
                        workdir: resolved.workdir,
                    },
                    self.settle.plain,
                ))
            }
            "url" => {
                let uri = self.shortcuts.read_url(path)?;
                if let Some(id) = steam_game_id(&uri) {
                    check_executable(&self.steam_path)?;
                    let workdir = self
                        .steam_path
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| PathBuf::from("."));
                    Ok((
                        Invocation::Exe {
                            exe: self.steam_path.clone(),
                            args: vec!["-applaunch".to_string(), id.to_string()],
                            workdir,
                        },
                        self.settle.steam,
                    ))
                } else {
                    Ok((Invocation::Uri(uri), self.settle.epic))
                }
            }
            other => Err(Error::Shortcut(format!(
                "{}: unsupported shortcut type '{other}'",
                path.display()
            ))),
        }
    }

    fn invoke(&self, invocation: &Invocation) -> Result<()> {
        match invocation {
            Invocation::Exe { exe, args, workdir } => self.proc.launch(exe, args, workdir),
            Invocation::Uri(uri) => self.proc.open_uri(uri),
        }
    }

    fn open_shortcut(&self, path: &Path, logical: &str) -> Result<()> {
        let (invocation, settle) = self.resolve_invocation(path)?;

        if !self.registry.get(logical)?.is_empty() {
            // Spawned processes are already known; no need to watch.
            return self.invoke(&invocation);
        }

        let before = self.tracker.snapshot()?;
        self.invoke(&invocation)?;

        self.notifier.on_log(
            Severity::Info,
            &format!("{logical}: waiting {}s to confirm the launch", settle.as_secs()),
        );
        std::thread::sleep(settle);

        let after = self.tracker.snapshot()?;
        let spawned = ProcessDiffTracker::diff(&before, &after);
        if spawned.is_empty() {
            return Err(Error::DetectionFailed(logical.to_string()));
        }

        tracing::debug!(logical, processes = ?spawned, "launch attributed");
        self.registry.put(logical, &spawned)
    }

    fn close_shortcut(&self, logical: &str) -> Result<()> {
        let names = self.registry.get(logical)?;
        if names.is_empty() {
            return Err(Error::RegistryMissing(logical.to_string()));
        }
        for name in &names {
            self.proc.kill_by_name(name)?;
        }
        Ok(())
    }

    fn close_folder(&self, dir: &Path) -> Result<()> {
        let base = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let titles = self.proc.window_titles()?;
        match titles
            .iter()
            .find(|title| title.to_lowercase().contains(&base))
        {
            Some(title) => self.proc.close_window(title),
            None => Err(Error::CommandNotFound(format!("open window for '{base}'"))),
        }
    }
}

impl Resolver for LaunchResolver {
    fn open(&self, keyword: &str, target: &CommandTarget) -> Result<()> {
        match target {
            CommandTarget::ShortcutFile(path) => {
                let logical = target.logical_name();
                tracing::info!(keyword, %logical, "open");
                self.open_shortcut(path, &logical)
            }
            CommandTarget::FolderPath(dir) => {
                tracing::info!(keyword, dir = %dir.display(), "open folder");
                self.proc.open_folder(dir)
            }
        }
    }

    fn close(&self, keyword: &str, target: &CommandTarget) -> Result<()> {
        match target {
            CommandTarget::ShortcutFile(_) => {
                let logical = target.logical_name();
                tracing::info!(keyword, %logical, "close");
                self.close_shortcut(&logical)
            }
            CommandTarget::FolderPath(dir) => {
                tracing::info!(keyword, dir = %dir.display(), "close folder window");
                self.close_folder(dir)
            }
        }
    }
}

/// The target must exist and be a readable, executable file before the
/// assistant tries to start it.
fn check_executable(path: &Path) -> Result<()> {
    let meta = fs::metadata(path)
        .map_err(|_| Error::TargetUnavailable(format!("{} does not exist", path.display())))?;
    if !meta.is_file() {
        return Err(Error::TargetUnavailable(format!(
            "{} is not a file",
            path.display()
        )));
    }
    fs::File::open(path)
        .map_err(|_| Error::TargetUnavailable(format!("{} is not readable", path.display())))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 == 0 {
            return Err(Error::TargetUnavailable(format!(
                "{} is not executable",
                path.display()
            )));
        }
    }
    Ok(())
}
