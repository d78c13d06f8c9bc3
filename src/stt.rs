//! Speech recognition
//!
//! Every finalized utterance segment goes through two whisper.cpp
//! recognizers loaded from distinct models: the primary language and an
//! English-only fallback. The primary result wins whenever it is
//! non-empty; the English-only model's noise sentinel (`[BLANK_AUDIO]`
//! and friends) is discarded so pure noise never becomes an utterance.

use std::path::Path;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::error::{Error, Result};

pub struct DualRecognizer {
    primary: WhisperContext,
    english: WhisperContext,
    language: String,
    threads: usize,
}

impl DualRecognizer {
    pub fn new(
        primary_model: &Path,
        english_model: &Path,
        language: &str,
        threads: usize,
    ) -> Result<Self> {
        let primary = load_context(primary_model)?;
        let english = load_context(english_model)?;
        Ok(Self {
            primary,
            english,
            language: language.to_string(),
            threads,
        })
    }

    /// Run both recognizers over a 16kHz mono segment and merge:
    /// primary text when non-empty, the English text otherwise, `None`
    /// when both came up empty.
    pub fn transcribe(&self, audio: &[f32]) -> Result<Option<String>> {
        let primary = self.run(&self.primary, &self.language, audio)?;
        let english = self.run(&self.english, "en", audio)?;

        let text = if !primary.is_empty() { primary } else { english };
        Ok((!text.is_empty()).then_some(text))
    }

    fn run(&self, ctx: &WhisperContext, language: &str, audio: &[f32]) -> Result<String> {
        let mut state = ctx
            .create_state()
            .map_err(|e| Error::Recognition(format!("whisper state: {e}")))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.threads as i32);
        params.set_language(Some(language));
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, audio)
            .map_err(|e| Error::Recognition(format!("whisper: {e}")))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| Error::Recognition(format!("whisper segments: {e}")))?;
        let mut result = String::new();
        for i in 0..num_segments {
            if let Ok(segment) = state.full_get_segment_text(i) {
                result.push_str(&segment);
            }
        }

        Ok(clean_transcript(&result))
    }
}

fn load_context(path: &Path) -> Result<WhisperContext> {
    let path_str = path
        .to_str()
        .ok_or_else(|| Error::Recognition(format!("bad model path: {}", path.display())))?;
    WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
        .map_err(|e| Error::Recognition(format!("model load {}: {e}", path.display())))
}

/// Lowercase and strip the non-speech annotations whisper emits for
/// noise, e.g. `[BLANK_AUDIO]`, `[MUSIC]`, `(coughing)`.
pub fn clean_transcript(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            c if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_audio_sentinel_is_discarded() {
        assert_eq!(clean_transcript(" [BLANK_AUDIO]"), "");
        assert_eq!(clean_transcript("[MUSIC] (coughing)"), "");
    }

    #[test]
    fn speech_survives_annotation_stripping() {
        assert_eq!(
            clean_transcript(" Джо, открой браузер [BLANK_AUDIO]"),
            "джо, открой браузер"
        );
    }

    #[test]
    fn whitespace_is_normalized() {
        assert_eq!(clean_transcript("  Открой   Паинт  "), "открой паинт");
    }
}
