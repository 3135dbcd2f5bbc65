use proctor_audio::resample_linear;

/// Standard sample rate for STT processing.
pub const STT_SAMPLE_RATE: u32 = 16000;

/// Speech-to-text backend used for keyword screening.
pub trait Transcriber: Send + Sync {
    /// Transcribe audio samples (expected at 16kHz mono, `-1..1`).
    fn transcribe(&self, audio: &[f32]) -> crate::Result<String>;

    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// Normalize signed 16-bit PCM to `-1..1`.
pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|s| *s as f32 / 32768.0).collect()
}

/// Convert captured PCM at `sample_rate` into transcriber input.
pub fn prepare_for_transcription(samples: &[i16], sample_rate: u32) -> crate::Result<Vec<f32>> {
    if sample_rate == 0 {
        return Err(crate::SttError::InvalidAudioFormat);
    }
    let normalized = pcm16_to_f32(samples);
    Ok(resample_linear(&normalized, sample_rate, STT_SAMPLE_RATE).into_owned())
}
