//! Audio capture and conditioning
//!
//! This module handles:
//! - Microphone device selection (platform-specific name heuristics)
//! - Input stream building (any sample format, downmixed to mono f32)
//! - Block resampling to 16kHz for the VAD and Whisper
//! - RMS silence measurement for the stall watchdog

use cpal::Sample;
use cpal::traits::{DeviceTrait, HostTrait};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::sync::mpsc::Sender;

use crate::error::{Error, Result};

pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Fixed input block size fed to the resampler.
const RESAMPLE_CHUNK: usize = 1024;

/// Check if a device name looks like a microphone (Linux)
#[cfg(target_os = "linux")]
pub fn is_microphone(name: &str) -> bool {
    name.contains("Microphone") && name.contains("CARD")
}

/// Check if a device name looks like a microphone (Windows)
#[cfg(target_os = "windows")]
pub fn is_microphone(name: &str) -> bool {
    name.to_lowercase().contains("microphone")
}

/// Check if a device name looks like a microphone (macOS)
#[cfg(target_os = "macos")]
pub fn is_microphone(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("microphone") || lower.contains("input") || lower.contains("mic")
}

/// Check if a device name looks like a microphone (other platforms)
#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
pub fn is_microphone(_name: &str) -> bool {
    true
}

/// Pick an input device: explicit index, then name substring, then the
/// first microphone-looking device, then the system default.
pub fn find_input_device(
    host: &cpal::Host,
    index: Option<usize>,
    name_fragment: &str,
    force_default: bool,
) -> Result<cpal::Device> {
    if force_default {
        return host
            .default_input_device()
            .ok_or_else(|| Error::AudioDevice("no default input device".to_string()));
    }

    if let Some(index) = index {
        let device = host
            .input_devices()
            .map_err(|e| Error::AudioDevice(e.to_string()))?
            .nth(index);
        match device {
            Some(d) => return Ok(d),
            None => tracing::warn!(index, "no input device at index, falling back"),
        }
    }

    let device = if !name_fragment.is_empty() {
        host.input_devices()
            .map_err(|e| Error::AudioDevice(e.to_string()))?
            .find(|d| d.name().map(|n| n.contains(name_fragment)).unwrap_or(false))
            .or_else(|| {
                tracing::warn!(
                    device = name_fragment,
                    "configured device not found, using default"
                );
                host.default_input_device()
            })
    } else {
        host.input_devices()
            .map_err(|e| Error::AudioDevice(e.to_string()))?
            .find(|d| d.name().map(|n| is_microphone(&n)).unwrap_or(false))
            .or_else(|| host.default_input_device())
    };

    device.ok_or_else(|| Error::AudioDevice("no input device available".to_string()))
}

/// Build an audio input stream with the given sample type. Frames are
/// downmixed to mono and pushed to `tx` as blocks; a closed receiver
/// just drops the block, letting the stream be torn down at leisure.
pub fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    tx: Sender<Vec<f32>>,
    err_fn: impl FnMut(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut block = Vec::with_capacity(data.len() / channels.max(1));
                for chunk in data.chunks(channels.max(1)) {
                    let sum: f32 = chunk
                        .iter()
                        .map(|&s| <f32 as Sample>::from_sample(s))
                        .sum();
                    block.push(sum / channels.max(1) as f32);
                }
                let _ = tx.send(block);
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::AudioDevice(e.to_string()))?;
    Ok(stream)
}

/// RMS of a block on the 16-bit PCM scale, for the silence watchdog.
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt() * 32768.0
}

/// Streaming resampler to 16kHz over fixed-size input blocks.
/// A pass-through when the stream already runs at 16kHz.
pub struct BlockResampler {
    inner: Option<SincFixedIn<f32>>,
    pending: Vec<f32>,
}

impl BlockResampler {
    pub fn new(from_rate: u32) -> Result<Self> {
        if from_rate == TARGET_SAMPLE_RATE {
            return Ok(Self {
                inner: None,
                pending: Vec::new(),
            });
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let ratio = TARGET_SAMPLE_RATE as f64 / from_rate as f64;
        let inner = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK, 1)
            .map_err(|e| Error::AudioDevice(format!("resampler: {e}")))?;

        Ok(Self {
            inner: Some(inner),
            pending: Vec::new(),
        })
    }

    /// Feed captured samples, get back whatever is ready at 16kHz.
    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(samples.to_vec());
        };

        self.pending.extend_from_slice(samples);
        let mut out = Vec::new();
        while self.pending.len() >= RESAMPLE_CHUNK {
            let chunk: Vec<f32> = self.pending.drain(..RESAMPLE_CHUNK).collect();
            let waves = resampler
                .process(&[chunk], None)
                .map_err(|e| Error::AudioDevice(format!("resample: {e}")))?;
            if let Some(wave) = waves.into_iter().next() {
                out.extend(wave);
            }
        }
        Ok(out)
    }
}
