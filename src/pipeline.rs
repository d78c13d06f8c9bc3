//! Speech recognition pipeline
//!
//! Owns the capture stream and turns the microphone into an infinite
//! FIFO sequence of non-empty lowercase utterances on an mpsc channel.
//! The cpal callback downmixes and forwards raw blocks; the pipeline
//! worker resamples, segments, recognizes and enqueues. That channel is
//! the documented seam to the dispatcher: order preserved, no
//! deduplication, consumed at most once.
//!
//! The worker also keeps the stream honest: when no block has crossed
//! the silence threshold for the stall timeout, the stream is torn down
//! and rebuilt, falling back to the default device when the configured
//! one will not reopen, retrying forever on a fixed backoff. Recognizer
//! models survive rebuilds; only the stream and the segmenter state are
//! replaced.

use cpal::traits::{DeviceTrait, StreamTrait};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::audio::{self, BlockResampler};
use crate::config::AssistantConfig;
use crate::error::{Error, Result};
use crate::feedback::Notifier;
use crate::stt::DualRecognizer;
use crate::vad::Segmenter;

/// Poll granularity of the worker loop; also bounds how fast `stop`
/// takes effect.
const POLL: Duration = Duration::from_millis(250);

/// Backoff between reopen attempts when no device will open.
const REOPEN_BACKOFF: Duration = Duration::from_secs(10);

pub struct SpeechRecognitionPipeline {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SpeechRecognitionPipeline {
    /// Open the capture pipeline and hand back the utterance channel.
    ///
    /// Fails with `AudioDevice` when no usable input device exists at
    /// startup; after that the worker self-heals indefinitely.
    pub fn start(
        config: Arc<AssistantConfig>,
        recognizers: Arc<DualRecognizer>,
        notifier: Arc<dyn Notifier>,
        device_id: Option<usize>,
    ) -> Result<(Self, Receiver<String>)> {
        // Startup probe so a missing microphone is reported to the
        // caller instead of disappearing into the retry loop.
        let host = cpal::default_host();
        audio::find_input_device(&host, device_id, &config.device, false)?;

        let (utterance_tx, utterance_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("golos-pipeline".to_string())
                .spawn(move || {
                    worker_loop(
                        &config,
                        recognizers.as_ref(),
                        notifier.as_ref(),
                        device_id,
                        &running,
                        &utterance_tx,
                    );
                })
                .map_err(|e| Error::AudioDevice(format!("pipeline thread: {e}")))?
        };

        Ok((
            Self {
                running,
                worker: Some(worker),
            },
            utterance_rx,
        ))
    }

    /// Abort the stream promptly and release the device. The worker is
    /// joined with a bounded wait and only logged on failure.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let deadline = Instant::now() + Duration::from_secs(3);
            while !worker.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(20));
            }
            if worker.is_finished() {
                let _ = worker.join();
            } else {
                tracing::warn!("pipeline worker did not stop in time, detaching");
            }
        }
    }
}

impl Drop for SpeechRecognitionPipeline {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn worker_loop(
    config: &AssistantConfig,
    recognizers: &DualRecognizer,
    notifier: &dyn Notifier,
    device_id: Option<usize>,
    running: &AtomicBool,
    utterance_tx: &Sender<String>,
) {
    // The segmenter outlives stream rebuilds, same as the recognizer
    // models; only a dead stream's partial utterance is dropped.
    let mut segmenter = match Segmenter::new(
        config.vad_sensitivity,
        config.vad_silence_ms,
        config.vad_min_speech_ms,
        config.vad_speech_pad_ms,
    ) {
        Ok(segmenter) => segmenter,
        Err(e) => {
            notifier.on_error(&e);
            return;
        }
    };

    let mut device_error_reported = false;

    while running.load(Ordering::SeqCst) {
        let host = cpal::default_host();
        let opened = open_stream(&host, config, device_id, false).or_else(|e| {
            tracing::warn!(error = %e, "configured device failed, trying default");
            open_stream(&host, config, device_id, true)
        });

        let (stream, sample_rx, rate) = match opened {
            Ok(opened) => {
                device_error_reported = false;
                opened
            }
            Err(e) => {
                if !device_error_reported {
                    notifier.on_error(&e);
                    device_error_reported = true;
                } else {
                    tracing::warn!(error = %e, "still no usable input device");
                }
                sleep_while_running(running, REOPEN_BACKOFF);
                continue;
            }
        };

        tracing::info!(rate, "capture stream running");
        if let Err(e) = run_stream(
            config,
            recognizers,
            notifier,
            running,
            utterance_tx,
            &sample_rx,
            rate,
            &mut segmenter,
        ) {
            notifier.on_error(&e);
        }
        // Dropping the stream aborts capture without waiting for
        // in-flight buffers; whatever it was mid-utterance on is gone.
        drop(stream);
        segmenter.reset();
    }
}

/// Pump one stream until stop, stall, or stream death.
#[allow(clippy::too_many_arguments)]
fn run_stream(
    config: &AssistantConfig,
    recognizers: &DualRecognizer,
    notifier: &dyn Notifier,
    running: &AtomicBool,
    utterance_tx: &Sender<String>,
    sample_rx: &Receiver<Vec<f32>>,
    rate: u32,
    segmenter: &mut Segmenter,
) -> Result<()> {
    let mut resampler = BlockResampler::new(rate)?;
    let stall_timeout = config.stall_timeout();
    let mut last_voice = Instant::now();

    loop {
        if !running.load(Ordering::SeqCst) {
            return Ok(());
        }

        match sample_rx.recv_timeout(POLL) {
            Ok(block) => {
                if audio::rms_level(&block) > config.silence_threshold {
                    last_voice = Instant::now();
                }
                let frames = resampler.push(&block)?;
                for segment in segmenter.feed(&frames) {
                    match recognizers.transcribe(&segment) {
                        Ok(Some(text)) => {
                            tracing::debug!(%text, "utterance finalized");
                            let _ = utterance_tx.send(text);
                        }
                        Ok(None) => {}
                        Err(e) => notifier.on_error(&e),
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::StreamStalled("audio callback went away".to_string()));
            }
        }

        if last_voice.elapsed() > stall_timeout {
            // Self-healed: rebuild the stream, keep the models.
            tracing::warn!(
                stalled_secs = stall_timeout.as_secs(),
                "no non-silent frames, rebuilding capture stream"
            );
            return Ok(());
        }
    }
}

fn open_stream(
    host: &cpal::Host,
    config: &AssistantConfig,
    device_id: Option<usize>,
    force_default: bool,
) -> Result<(cpal::Stream, Receiver<Vec<f32>>, u32)> {
    let device = audio::find_input_device(host, device_id, &config.device, force_default)?;
    let device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

    let audio_config = device
        .default_input_config()
        .map_err(|e| Error::AudioDevice(format!("{device_name}: {e}")))?;
    let rate = audio_config.sample_rate().0;
    let channels = audio_config.channels() as usize;

    let (tx, rx) = mpsc::channel();
    let err_fn = |err| tracing::error!(error = %err, "stream error");

    let stream = match audio_config.sample_format() {
        cpal::SampleFormat::I8 => {
            audio::build_stream::<i8>(&device, &audio_config.into(), channels, tx, err_fn)?
        }
        cpal::SampleFormat::I16 => {
            audio::build_stream::<i16>(&device, &audio_config.into(), channels, tx, err_fn)?
        }
        cpal::SampleFormat::I32 => {
            audio::build_stream::<i32>(&device, &audio_config.into(), channels, tx, err_fn)?
        }
        cpal::SampleFormat::F32 => {
            audio::build_stream::<f32>(&device, &audio_config.into(), channels, tx, err_fn)?
        }
        format => {
            return Err(Error::AudioDevice(format!(
                "{device_name}: unsupported sample format {format:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| Error::AudioDevice(format!("{device_name}: {e}")))?;
    tracing::info!(device = %device_name, "listening");

    Ok((stream, rx, rate))
}

fn sleep_while_running(running: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(100));
    }
}
