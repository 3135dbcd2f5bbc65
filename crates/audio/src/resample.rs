//! Channel downmix and sample-rate conversion.

use std::borrow::Cow;

use rubato::{FftFixedIn, Resampler};

use crate::AudioError;

/// Input frames handed to rubato per call.
const STREAM_BLOCK: usize = 256;

/// Average interleaved channels into mono. Mono input is borrowed.
pub fn downmix(samples: &[f32], channels: usize) -> Cow<'_, [f32]> {
    if channels <= 1 {
        return Cow::Borrowed(samples);
    }
    let scale = 1.0 / channels as f32;
    Cow::Owned(
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale)
            .collect(),
    )
}

/// One-shot linear interpolation, for short buffers with no stream history.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Cow<'_, [f32]> {
    if from_rate == to_rate || from_rate == 0 || samples.is_empty() {
        return Cow::Borrowed(samples);
    }
    let step = from_rate as f64 / to_rate as f64;
    let len = (samples.len() as f64 / step) as usize;
    let last = samples.len() - 1;

    Cow::Owned(
        (0..len)
            .map(|i| {
                let pos = i as f64 * step;
                let idx = (pos as usize).min(last);
                let next = (idx + 1).min(last);
                let frac = (pos - idx as f64) as f32;
                samples[idx] + (samples[next] - samples[idx]) * frac
            })
            .collect(),
    )
}

/// Stateful converter for a continuous capture stream.
///
/// Device callbacks deliver buffers of any length; input is held back until
/// rubato has a full block, so the filter state carries across callbacks.
pub struct StreamResampler {
    inner: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> crate::Result<Self> {
        let inner = if from_rate == to_rate {
            None
        } else {
            let resampler =
                FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, STREAM_BLOCK, 2, 1)
                    .map_err(|e| {
                        AudioError::StreamError(format!(
                            "cannot resample {from_rate}Hz to {to_rate}Hz: {e}"
                        ))
                    })?;
            Some(resampler)
        };
        Ok(Self {
            inner,
            pending: Vec::with_capacity(STREAM_BLOCK * 2),
        })
    }

    /// Samples held back waiting for a full block.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.inner.as_mut() else {
            return samples.to_vec();
        };
        self.pending.extend_from_slice(samples);

        let mut output = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let block: Vec<f32> = self.pending.drain(..needed).collect();
            match resampler.process(&[block], None) {
                Ok(mut channels) => {
                    if let Some(mono) = channels.pop() {
                        output.extend(mono);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "resampler dropped a block"),
            }
        }
        output
    }
}
