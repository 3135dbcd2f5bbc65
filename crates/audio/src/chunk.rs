use std::collections::VecDeque;
use std::time::Duration;

use crate::{AudioError, Result};

/// Fixed-length run of mono 16-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Producer of fixed-size chunks.
pub trait ChunkSource: Send {
    /// Wait up to `timeout` for the next chunk.
    ///
    /// `Ok(None)` means nothing arrived in time; `Err(AudioError::Disconnected)`
    /// means the source is finished.
    fn next_chunk(&mut self, timeout: Duration) -> Result<Option<AudioChunk>>;

    fn sample_rate(&self) -> u32;
}

/// Cuts an arbitrary sample stream into chunks of exactly `chunk_size`.
#[derive(Debug)]
pub struct Rechunker {
    chunk_size: usize,
    sample_rate: u32,
    pending: VecDeque<i16>,
}

impl Rechunker {
    pub fn new(chunk_size: usize, sample_rate: u32) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AudioError::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            chunk_size,
            sample_rate,
            pending: VecDeque::with_capacity(chunk_size * 2),
        })
    }

    pub fn push(&mut self, samples: &[i16]) {
        self.pending.extend(samples.iter().copied());
    }

    /// Next complete chunk, if enough samples are buffered.
    pub fn pop(&mut self) -> Option<AudioChunk> {
        if self.pending.len() < self.chunk_size {
            return None;
        }
        let samples: Vec<i16> = self.pending.drain(..self.chunk_size).collect();
        Some(AudioChunk::new(samples, self.sample_rate))
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

/// Pre-recorded chunks; disconnects once drained.
pub struct VecChunkSource {
    chunks: VecDeque<AudioChunk>,
    sample_rate: u32,
}

impl VecChunkSource {
    pub fn new(chunks: impl IntoIterator<Item = AudioChunk>, sample_rate: u32) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
            sample_rate,
        }
    }
}

impl ChunkSource for VecChunkSource {
    fn next_chunk(&mut self, _timeout: Duration) -> Result<Option<AudioChunk>> {
        self.chunks
            .pop_front()
            .map(Some)
            .ok_or(AudioError::Disconnected)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rechunker_emits_exact_sizes() {
        let mut rechunker = Rechunker::new(4, 16000).unwrap();
        rechunker.push(&[1, 2, 3]);
        assert!(rechunker.pop().is_none());

        rechunker.push(&[4, 5, 6, 7, 8, 9]);
        assert_eq!(rechunker.pop().unwrap().samples, vec![1, 2, 3, 4]);
        assert_eq!(rechunker.pop().unwrap().samples, vec![5, 6, 7, 8]);
        assert!(rechunker.pop().is_none());
        assert_eq!(rechunker.buffered(), 1);
    }

    #[test]
    fn test_rechunker_rejects_zero() {
        assert!(matches!(
            Rechunker::new(0, 16000),
            Err(AudioError::InvalidChunkSize(0))
        ));
    }

    #[test]
    fn test_chunk_duration() {
        let chunk = AudioChunk::new(vec![0; 512], 16000);
        assert_eq!(chunk.duration(), Duration::from_millis(32));
    }

    #[test]
    fn test_vec_source_disconnects_when_drained() {
        let mut source = VecChunkSource::new([AudioChunk::new(vec![1; 4], 16000)], 16000);
        assert!(source.next_chunk(Duration::ZERO).unwrap().is_some());
        assert!(matches!(
            source.next_chunk(Duration::ZERO),
            Err(AudioError::Disconnected)
        ));
    }
}
