//! Utterance segmentation using Silero VAD
//!
//! State machine:
//! - Listening: waiting for speech
//! - Speaking: speech detected, accumulating audio
//! - SilenceDetected: speech ended, waiting for the silence timeout
//!
//! A rolling pre-buffer catches the start of speech that happened just
//! before the detector triggered. Segments shorter than the minimum
//! speech duration are dropped as noise.

use std::time::{Duration, Instant};
use voice_activity_detector::VoiceActivityDetector;

use crate::error::{Error, Result};

/// VAD sample rate - Silero v5 works best at 16kHz
pub const VAD_SAMPLE_RATE: u32 = 16000;

/// VAD chunk size for 16kHz (fixed by Silero v5)
pub const VAD_CHUNK_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq)]
enum SegmenterState {
    Listening,
    Speaking,
    SilenceDetected,
}

/// Cuts a continuous 16kHz stream into finalized utterance segments.
pub struct Segmenter {
    detector: VoiceActivityDetector,
    state: SegmenterState,
    /// Accumulated audio for the current utterance
    audio_buffer: Vec<f32>,
    /// Rolling buffer of recent audio for catching speech start
    pre_buffer: Vec<f32>,
    pre_buffer_max: usize,
    silence_start: Option<Instant>,
    speech_start: Option<Instant>,
    sensitivity: f32,
    silence_ms: u64,
    min_speech_ms: u64,
    speech_pad_ms: u64,
    /// Buffer for incomplete chunks
    chunk_buffer: Vec<f32>,
}

impl Segmenter {
    /// # Arguments
    /// * `sensitivity` - 0.0-1.0, higher = more sensitive (lower threshold)
    /// * `silence_ms` - silence needed after speech before finalizing
    /// * `min_speech_ms` - minimum speech duration to count as an utterance
    /// * `speech_pad_ms` - padding kept around the speech edges
    pub fn new(
        sensitivity: f32,
        silence_ms: u64,
        min_speech_ms: u64,
        speech_pad_ms: u64,
    ) -> Result<Self> {
        let detector = VoiceActivityDetector::builder()
            .sample_rate(VAD_SAMPLE_RATE)
            .chunk_size(VAD_CHUNK_SIZE)
            .build()
            .map_err(|e| Error::Recognition(format!("vad init: {e}")))?;

        let pre_buffer_max = (VAD_SAMPLE_RATE as u64 * speech_pad_ms / 1000) as usize;

        Ok(Self {
            detector,
            state: SegmenterState::Listening,
            audio_buffer: Vec::with_capacity(VAD_SAMPLE_RATE as usize * 30),
            pre_buffer: Vec::with_capacity(pre_buffer_max),
            pre_buffer_max,
            silence_start: None,
            speech_start: None,
            sensitivity,
            silence_ms,
            min_speech_ms,
            speech_pad_ms,
            chunk_buffer: Vec::with_capacity(VAD_CHUNK_SIZE),
        })
    }

    /// Feed 16kHz mono samples; returns any utterances finalized by this
    /// block, in order.
    pub fn feed(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        let mut finalized = Vec::new();

        self.chunk_buffer.extend_from_slice(samples);

        while self.chunk_buffer.len() >= VAD_CHUNK_SIZE {
            let chunk: Vec<f32> = self.chunk_buffer.drain(..VAD_CHUNK_SIZE).collect();

            let probability = self.detector.predict(chunk.iter().copied());
            // sensitivity 0.0 -> threshold 0.9, 0.5 -> 0.5, 1.0 -> 0.1
            let threshold = 1.0 - (self.sensitivity * 0.8);
            let is_speech = probability >= threshold;

            match self.state {
                SegmenterState::Listening => {
                    self.pre_buffer.extend_from_slice(&chunk);
                    if self.pre_buffer.len() > self.pre_buffer_max {
                        let excess = self.pre_buffer.len() - self.pre_buffer_max;
                        self.pre_buffer.drain(..excess);
                    }

                    if is_speech {
                        self.state = SegmenterState::Speaking;
                        self.speech_start = Some(Instant::now());
                        self.audio_buffer.clear();
                        // Prepend pre-buffer to catch the start of speech
                        self.audio_buffer.extend_from_slice(&self.pre_buffer);
                        self.audio_buffer.extend_from_slice(&chunk);
                        self.pre_buffer.clear();
                    }
                }
                SegmenterState::Speaking => {
                    self.audio_buffer.extend_from_slice(&chunk);
                    if !is_speech {
                        self.state = SegmenterState::SilenceDetected;
                        self.silence_start = Some(Instant::now());
                    }
                }
                SegmenterState::SilenceDetected => {
                    // Still accumulate; this might be a brief pause
                    self.audio_buffer.extend_from_slice(&chunk);

                    if is_speech {
                        self.state = SegmenterState::Speaking;
                        self.silence_start = None;
                    } else if let Some(silence_start) = self.silence_start {
                        let total_wait = self.silence_ms + self.speech_pad_ms;
                        if silence_start.elapsed() >= Duration::from_millis(total_wait) {
                            let speech_duration = self
                                .speech_start
                                .map(|s| s.elapsed())
                                .unwrap_or(Duration::ZERO);

                            if speech_duration >= Duration::from_millis(self.min_speech_ms) {
                                finalized.push(std::mem::take(&mut self.audio_buffer));
                            }

                            self.state = SegmenterState::Listening;
                            self.silence_start = None;
                            self.speech_start = None;
                            self.chunk_buffer.clear();
                        }
                    }
                }
            }
        }

        finalized
    }

    /// Drop any partial utterance, e.g. around a stream rebuild.
    pub fn reset(&mut self) {
        self.audio_buffer.clear();
        self.chunk_buffer.clear();
        self.pre_buffer.clear();
        self.silence_start = None;
        self.speech_start = None;
        self.state = SegmenterState::Listening;
    }
}
