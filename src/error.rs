//! Error types for Golos
//!
//! Every recoverable outcome of the dispatch loop is a variant here;
//! the dispatcher converts each into a feedback cue and a log line and
//! keeps running. Only an explicit stop request ends the loop.

use thiserror::Error;

/// Result type alias for Golos operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No usable input/output device; the assistant stays in a degraded
    /// "listening disabled" state until a device reappears.
    #[error("audio device error: {0}")]
    AudioDevice(String),

    /// The capture stream stopped delivering non-silent frames and is
    /// being rebuilt.
    #[error("recognition stream stalled: {0}")]
    StreamStalled(String),

    /// A resolved shortcut points at a missing or non-executable file.
    #[error("launch target unavailable: {0}")]
    TargetUnavailable(String),

    /// The launch itself went through but no new process could be
    /// attributed to it.
    #[error("no new process could be attributed to {0}")]
    DetectionFailed(String),

    /// A keyword matched nothing the assistant knows how to do.
    #[error("no command matched: {0}")]
    CommandNotFound(String),

    /// Close requested for a target with no recorded process names.
    #[error("no recorded processes for {0}")]
    RegistryMissing(String),

    /// Speech recognition failed on a finalized segment.
    #[error("recognition error: {0}")]
    Recognition(String),

    /// An OS process-control operation failed abnormally.
    #[error("process control error: {0}")]
    Process(String),

    /// A `.lnk`/`.url` file could not be read or understood.
    #[error("shortcut error: {0}")]
    Shortcut(String),

    /// Configuration problem (bad file, conflicting keywords).
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error from one of the storage files
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error from one of the storage files
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
