//! Assistant configuration
//!
//! One [`AssistantConfig`] is loaded at startup and passed by reference
//! into the pipeline, the dispatcher and the resolver. There are no
//! ambient settings singletons.
//!
//! Search order: XDG config dir, then a home dotdir, then the working
//! directory. A commented default config is written on first run.

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for Golos
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AssistantConfig {
    /// Wake names the assistant answers to (up to three are honored)
    pub names: Vec<String>,
    /// Whisper model size: tiny, base, small, medium, large
    pub model: String,
    /// Primary recognizer language (ISO 639-1)
    pub language: String,
    pub threads: usize,
    /// Input device name substring; empty = auto-detect
    pub device: String,
    /// Input device index override (takes precedence over `device`)
    pub device_index: Option<usize>,
    /// Steam executable used for steam://rungameid launches
    pub steam_path: String,
    /// Swallow profane utterances instead of processing them
    pub censorship: bool,
    pub profanity: Vec<String>,
    pub open_verbs: Vec<String>,
    pub close_verbs: Vec<String>,
    /// Utterance splitters for compound commands
    pub conjunctions: Vec<String>,
    pub disambiguation_timeout_secs: u64,
    pub name_mention_timeout_secs: u64,
    /// Settle delay before the post-launch process snapshot, per launch class
    pub settle_plain_secs: u64,
    pub settle_steam_secs: u64,
    pub settle_epic_secs: u64,
    /// RMS threshold on the 16-bit PCM scale below which a frame is silence
    pub silence_threshold: f32,
    /// Seconds without a non-silent frame before the stream is rebuilt
    pub stall_timeout_secs: u64,
    pub vad_sensitivity: f32,
    pub vad_silence_ms: u64,
    pub vad_min_speech_ms: u64,
    pub vad_speech_pad_ms: u64,
    /// Override for the command table file; empty = default location
    pub commands_file: String,
    /// Override for the process registry file; empty = default location
    pub registry_file: String,
    /// Override for the profanity counter file; empty = default location
    pub counters_file: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            names: vec!["джо".to_string(), "джозеф".to_string(), "joe".to_string()],
            model: "small".to_string(),
            language: "ru".to_string(),
            threads: 4,
            device: String::new(),
            device_index: None,
            steam_path: "C:/Program Files (x86)/Steam/steam.exe".to_string(),
            censorship: false,
            profanity: ["блять", "блядь", "сука", "пизд", "ебат", "нахуй", "хуй"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            open_verbs: ["открой", "открыть", "запусти", "запустить", "включи"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            close_verbs: ["закрой", "закрыть", "выключи", "заверши", "останови"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            conjunctions: [" и ", " а также ", " потом ", " ещё "]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            disambiguation_timeout_secs: 7,
            name_mention_timeout_secs: 30,
            settle_plain_secs: 20,
            settle_steam_secs: 35,
            settle_epic_secs: 40,
            silence_threshold: 20.0,
            stall_timeout_secs: 10,
            vad_sensitivity: 0.5,
            vad_silence_ms: 700,
            vad_min_speech_ms: 250,
            vad_speech_pad_ms: 150,
            commands_file: String::new(),
            registry_file: String::new(),
            counters_file: String::new(),
        }
    }
}

impl AssistantConfig {
    pub fn load() -> (Self, Option<PathBuf>) {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("golos").join("config.toml")),
            dirs::home_dir().map(|p| p.join(".golos").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ];

        for path in config_paths.into_iter().flatten() {
            if path.exists() {
                if let Ok(contents) = fs::read_to_string(&path) {
                    match toml::from_str(&contents) {
                        Ok(config) => {
                            tracing::info!(path = %path.display(), "loaded config");
                            return (config, Some(path));
                        }
                        Err(e) => {
                            tracing::error!(path = %path.display(), error = %e, "config parse error");
                        }
                    }
                }
            }
        }

        // No config found - create one at the default location
        if let Some(config_dir) = dirs::config_dir() {
            let golos_dir = config_dir.join("golos");
            let config_path = golos_dir.join("config.toml");

            if let Err(e) = fs::create_dir_all(&golos_dir) {
                tracing::error!(error = %e, "failed to create config directory");
            } else if let Err(e) = fs::write(&config_path, Self::default_config_content()) {
                tracing::error!(error = %e, "failed to write default config");
            } else {
                tracing::info!(path = %config_path.display(), "created default config");
                return (Self::default(), Some(config_path));
            }
        }

        tracing::info!("using default config");
        (Self::default(), None)
    }

    pub fn load_from(path: &PathBuf) -> Option<Self> {
        let contents = fs::read_to_string(path).ok()?;
        match toml::from_str(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::error!(error = %e, "config reload error");
                None
            }
        }
    }

    fn default_config_content() -> &'static str {
        r##"# Golos configuration
# Edit this file to customize your settings.

# Names the assistant answers to (up to three are honored).
# Say a name alone to get an acknowledgement, or prefix a command with it.
names = ["джо", "джозеф", "joe"]

# Whisper model size: tiny, base, small, medium, large
# Two models are used: ggml-<model>.bin for the primary language and
# ggml-<model>.en.bin for the English fallback.
model = "small"

# Primary recognizer language (ISO 639-1)
language = "ru"

# Number of threads for whisper inference
threads = 4

# Specific audio input device name (partial match). Empty = auto-detect.
device = ""

# Steam executable, used for steam://rungameid shortcut launches
steam_path = "C:/Program Files (x86)/Steam/steam.exe"

# Swallow profane utterances (the counters are kept either way)
censorship = false

# Seconds a remembered action verb waits for its target
disambiguation_timeout_secs = 7

# Seconds a bare name mention keeps the assistant attentive
name_mention_timeout_secs = 30

# Settle delays before the post-launch process snapshot, per launch class.
# Steam/Epic wrappers take a while to spawn the real game process.
settle_plain_secs = 20
settle_steam_secs = 35
settle_epic_secs = 40

# RMS threshold (16-bit PCM scale) below which a frame counts as silence
silence_threshold = 20.0

# Seconds without a non-silent frame before the input stream is rebuilt
stall_timeout_secs = 10

# Voice activity detection tuning
vad_sensitivity = 0.5
vad_silence_ms = 700
vad_min_speech_ms = 250
vad_speech_pad_ms = 150

# Storage overrides; empty = default locations under the config/data dirs
commands_file = ""
registry_file = ""
counters_file = ""
"##
    }

    pub fn primary_model_filename(&self) -> String {
        format!("ggml-{}.bin", self.model)
    }

    pub fn english_model_filename(&self) -> String {
        format!("ggml-{}.en.bin", self.model)
    }

    pub fn model_url(&self, filename: &str) -> String {
        format!("https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{filename}")
    }

    /// Wake names, lowercased, capped at three.
    pub fn wake_names(&self) -> Vec<String> {
        self.names
            .iter()
            .take(3)
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect()
    }

    pub fn disambiguation_timeout(&self) -> Duration {
        Duration::from_secs(self.disambiguation_timeout_secs)
    }

    pub fn name_mention_timeout(&self) -> Duration {
        Duration::from_secs(self.name_mention_timeout_secs)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }

    pub fn commands_path(&self) -> PathBuf {
        Self::storage_path(&self.commands_file, dirs::config_dir(), "commands.json")
    }

    pub fn registry_path(&self) -> PathBuf {
        Self::storage_path(&self.registry_file, dirs::data_dir(), "registry.json")
    }

    pub fn counters_path(&self) -> PathBuf {
        Self::storage_path(&self.counters_file, dirs::data_dir(), "counters.json")
    }

    fn storage_path(overridden: &str, base: Option<PathBuf>, filename: &str) -> PathBuf {
        if overridden.is_empty() {
            base.unwrap_or_else(|| PathBuf::from("."))
                .join("golos")
                .join(filename)
        } else {
            PathBuf::from(shellexpand::tilde(overridden).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_content_parses_to_defaults() {
        let parsed: AssistantConfig =
            toml::from_str(AssistantConfig::default_config_content()).unwrap();
        let defaults = AssistantConfig::default();
        assert_eq!(parsed.names, defaults.names);
        assert_eq!(parsed.model, defaults.model);
        assert_eq!(parsed.language, defaults.language);
        assert_eq!(parsed.disambiguation_timeout_secs, 7);
        assert_eq!(parsed.name_mention_timeout_secs, 30);
    }

    #[test]
    fn wake_names_are_normalized_and_capped() {
        let config = AssistantConfig {
            names: vec![
                "  Джо ".to_string(),
                "МАРК".to_string(),
                "joe".to_string(),
                "fourth".to_string(),
            ],
            ..AssistantConfig::default()
        };
        assert_eq!(config.wake_names(), vec!["джо", "марк", "joe"]);
    }

    #[test]
    fn storage_override_expands_tilde() {
        let config = AssistantConfig {
            registry_file: "~/golos/registry.json".to_string(),
            ..AssistantConfig::default()
        };
        assert!(!config.registry_path().to_string_lossy().contains('~'));
    }

    #[test]
    fn model_filenames_follow_size() {
        let config = AssistantConfig::default();
        assert_eq!(config.primary_model_filename(), "ggml-small.bin");
        assert_eq!(config.english_model_filename(), "ggml-small.en.bin");
    }
}
