use std::collections::VecDeque;

use crate::AudioChunk;

/// Bounded history of the most recent chunks; the oldest is evicted first.
#[derive(Debug)]
pub struct ChunkRing {
    capacity: usize,
    chunks: VecDeque<AudioChunk>,
}

impl ChunkRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            chunks: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, chunk: AudioChunk) {
        if self.chunks.len() == self.capacity {
            self.chunks.pop_front();
        }
        self.chunks.push_back(chunk);
    }

    /// All buffered samples, oldest first.
    pub fn samples(&self) -> Vec<i16> {
        let total = self.chunks.iter().map(AudioChunk::len).sum();
        let mut out = Vec::with_capacity(total);
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.samples);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}
