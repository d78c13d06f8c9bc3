//! Golos - a wake-word desktop assistant
//!
//! Golos listens to the microphone, recognizes speech in two languages,
//! matches recognized phrases against a small command table, and
//! dispatches to OS actions: launching and killing applications and
//! games, opening folders, media keys, web search, shutdown.
//!
//! # Architecture
//!
//! ```text
//! microphone ──cpal──▶ SpeechRecognitionPipeline ──mpsc──▶ CommandDispatcher
//!                       (VAD + dual whisper)                (state machine)
//!                                                                │
//!                                          LaunchResolver ◀──────┤
//!                                          ProcessRegistry       │
//!                                          ProcessDiffTracker    │
//!                                                                ▼
//!                                                    OS processes / cues
//! ```
//!
//! The pipeline runs on its own thread and feeds finalized lowercase
//! utterances into an mpsc channel, in order, exactly once each. The
//! dispatcher consumes them one at a time; a launch that is being
//! confirmed blocks the queue on purpose, so commands never interleave.

pub mod audio;
pub mod builtin;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod feedback;
pub mod launcher;
pub mod media;
pub mod model;
pub mod pipeline;
pub mod proc;
pub mod registry;
pub mod shortcut;
pub mod stt;
pub mod swear;
pub mod table;
pub mod vad;

pub use config::AssistantConfig;
pub use dispatch::CommandDispatcher;
pub use error::{Error, Result};
pub use feedback::{ConsoleNotifier, CueId, DesktopHooks, Notifier, NullHooks, Severity};
pub use launcher::{Action, LaunchResolver, Resolver, SettleDelays};
pub use pipeline::SpeechRecognitionPipeline;
pub use proc::{ProcessControl, ProcessDiffTracker, SystemProcessControl};
pub use registry::ProcessRegistry;
pub use shortcut::{FileShortcutReader, ResolvedShortcut, ShortcutReader};
pub use table::{CommandTable, CommandTableHandle, CommandTarget};
