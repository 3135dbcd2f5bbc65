//! Audio acquisition for the audio monitor.
//!
//! Capture devices deliver buffers of arbitrary length; everything downstream
//! works on fixed-size 16-bit `AudioChunk`s produced by the `Rechunker`.

mod chunk;
mod resample;
mod ring;
mod stream;

pub use chunk::{AudioChunk, ChunkSource, Rechunker, VecChunkSource};
pub use resample::{downmix, resample_linear, StreamResampler};
pub use ring::ChunkRing;
pub use stream::MicrophoneSource;

pub const SAMPLE_RATE: u32 = 16000;

/// Samples per chunk (32ms at 16kHz).
pub const CHUNK_SIZE: usize = 512;

/// Chunks retained for transcription (~480ms at 16kHz).
pub const RING_CHUNKS: usize = 15;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("stream error: {0}")]
    StreamError(String),
    #[error("audio source disconnected")]
    Disconnected,
    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(usize),
    #[error("device error: {0}")]
    DeviceError(#[from] cpal::DevicesError),
    #[error("build stream error: {0}")]
    BuildStreamError(#[from] cpal::BuildStreamError),
}

pub type Result<T> = std::result::Result<T, AudioError>;
