//! Feedback boundary between the core and the outer shell
//!
//! The core never talks to a GUI directly. Everything user-facing goes
//! through [`Notifier`]: short audio reactions selected by a symbolic
//! [`CueId`], log lines, and error reports. The mapping from a cue id to
//! an actual audio asset is the shell's business.
//!
//! [`DesktopHooks`] covers the two voice requests whose implementation
//! lives entirely outside the core (screenshot capture and the widget
//! panel).

use crate::error::Error;

/// Symbolic id of a short pre-recorded audio reaction.
///
/// `folder()` names the asset directory the shell picks a random clip
/// from, which is also the stable wire name for the cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueId {
    /// The assistant heard its name and is waiting for a command
    Acknowledge,
    /// A target was launched
    Start,
    /// A target was closed
    Close,
    /// Something went wrong while resolving or launching
    Error,
    /// An action verb arrived without a recognizable target
    What,
    /// A follow-up utterance still did not name a known target
    NotUnderstood,
    /// Censorship mode swallowed the utterance
    Censored,
    /// Launch went through but no new process was confirmed yet
    StillLoading,
    /// A web search was opened
    Search,
    /// The machine is about to shut down or restart
    Shutdown,
}

impl CueId {
    pub fn folder(self) -> &'static str {
        match self {
            CueId::Acknowledge => "name_folder",
            CueId::Start => "start_folder",
            CueId::Close => "close_folder",
            CueId::Error => "error_file",
            CueId::What => "what_folder",
            CueId::NotUnderstood => "not_understood_folder",
            CueId::Censored => "censored_folder",
            CueId::StillLoading => "loading_folder",
            CueId::Search => "search_folder",
            CueId::Shutdown => "shutdown_folder",
        }
    }
}

/// Log severity as seen by the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Capability the shell implements to receive feedback from the core.
pub trait Notifier: Send + Sync {
    /// Fire-and-forget playback of a short audio reaction.
    fn on_cue(&self, cue: CueId);

    /// A human-readable progress line.
    fn on_log(&self, severity: Severity, message: &str);

    /// A recoverable error was handled; the loop keeps running.
    fn on_error(&self, error: &Error);
}

/// Voice requests implemented entirely outside the core.
pub trait DesktopHooks: Send + Sync {
    /// "Take a screenshot" was recognized.
    fn screenshot(&self) {}

    /// The widget panel was asked to open or close.
    fn toggle_widgets(&self, _open: bool) {}
}

/// Notifier for headless runs: everything goes to the log.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn on_cue(&self, cue: CueId) {
        tracing::info!(cue = cue.folder(), "cue");
    }

    fn on_log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!("{message}"),
            Severity::Warn => tracing::warn!("{message}"),
            Severity::Error => tracing::error!("{message}"),
        }
    }

    fn on_error(&self, error: &Error) {
        tracing::error!(error = %error, "recovered");
    }
}

/// Hooks for headless runs: requests are logged and dropped.
pub struct NullHooks;

impl DesktopHooks for NullHooks {
    fn screenshot(&self) {
        tracing::info!("screenshot requested (no desktop shell attached)");
    }

    fn toggle_widgets(&self, open: bool) {
        tracing::info!(open, "widget panel toggle requested (no desktop shell attached)");
    }
}
