//! Media-player voice commands
//!
//! Play/pause, next and previous are recognized anywhere in an
//! utterance, with or without the wake name, and dispatched immediately
//! as media-key presses.

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaAction {
    PlayPause,
    Next,
    Previous,
}

/// Media command contained in `text`, if any.
pub fn media_action(text: &str) -> Option<MediaAction> {
    const PLAY_PAUSE: &[&str] = &["пауза", "поставь на паузу", "плей", "продолжи музыку"];
    const NEXT: &[&str] = &["следующий трек", "следующая песня", "некст"];
    const PREVIOUS: &[&str] = &["предыдущий трек", "предыдущая песня", "песню назад"];

    if NEXT.iter().any(|k| text.contains(k)) {
        Some(MediaAction::Next)
    } else if PREVIOUS.iter().any(|k| text.contains(k)) {
        Some(MediaAction::Previous)
    } else if PLAY_PAUSE.iter().any(|k| text.contains(k)) {
        Some(MediaAction::PlayPause)
    } else {
        None
    }
}

/// Media-key emulation boundary.
pub trait MediaKeys: Send + Sync {
    fn tap(&self, action: MediaAction) -> Result<()>;
}

/// Presses the real media keys. An `Enigo` handle is created per press;
/// the keys are rare enough that setup cost does not matter.
pub struct EnigoMediaKeys;

impl MediaKeys for EnigoMediaKeys {
    fn tap(&self, action: MediaAction) -> Result<()> {
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| Error::Process(format!("media keys unavailable: {e}")))?;
        let key = match action {
            MediaAction::PlayPause => Key::MediaPlayPause,
            MediaAction::Next => Key::MediaNextTrack,
            MediaAction::Previous => Key::MediaPrevTrack,
        };
        enigo
            .key(key, Direction::Click)
            .map_err(|e| Error::Process(format!("media key press failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matched_anywhere_in_the_utterance() {
        assert_eq!(
            media_action("джо поставь на паузу пожалуйста"),
            Some(MediaAction::PlayPause)
        );
        assert_eq!(media_action("следующий трек"), Some(MediaAction::Next));
        assert_eq!(
            media_action("включи предыдущий трек"),
            Some(MediaAction::Previous)
        );
        assert_eq!(media_action("открой браузер"), None);
    }
}
