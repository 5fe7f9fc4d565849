//! Growable byte arena written from its high end toward its low end.
//!
//! Positions handed out by the arena are distances from the *end* of the
//! allocation (bytes used at the time of writing). Growth copies the used
//! suffix to the tail of a larger allocation, so those positions survive
//! reallocation unchanged.

use tabula_core::Scalar;
use tabula_core::layout::{MAX_BUFFER_SIZE, padding_bytes};

use crate::builder::BuildError;

/// Back-to-front byte arena.
#[derive(Clone, Debug)]
pub struct Arena {
    buf: Vec<u8>,
    /// Index of the lowest written byte; `buf[head..]` is the used suffix.
    head: usize,
    /// Largest alignment requested so far.
    min_align: usize,
}

impl Default for Arena {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl Arena {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_BUFFER_SIZE);
        Self {
            buf: vec![0; capacity],
            head: capacity,
            min_align: 1,
        }
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn min_align(&self) -> usize {
        self.min_align
    }

    /// The written bytes, lowest address first.
    pub fn data(&self) -> &[u8] {
        &self.buf[self.head..]
    }

    /// Consume the arena, keeping only the written bytes.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.buf.drain(..self.head);
        self.buf
    }

    /// Forget everything written, keeping the allocation.
    pub fn clear(&mut self) {
        self.head = self.buf.len();
        self.min_align = 1;
    }

    /// Make room for `additional` more bytes below `head`.
    pub fn reserve(&mut self, additional: usize) -> Result<(), BuildError> {
        if additional <= self.head {
            return Ok(());
        }

        let used = self.len();
        let needed = used
            .checked_add(additional)
            .filter(|&n| n <= MAX_BUFFER_SIZE)
            .ok_or(BuildError::BufferTooLarge {
                requested: used.saturating_add(additional),
            })?;
        let capacity = self
            .buf
            .len()
            .saturating_mul(2)
            .max(needed)
            .min(MAX_BUFFER_SIZE);

        let mut grown = vec![0u8; capacity];
        grown[capacity - used..].copy_from_slice(&self.buf[self.head..]);
        tracing::trace!(from = self.buf.len(), to = capacity, used, "arena grown");
        self.buf = grown;
        self.head = capacity - used;
        Ok(())
    }

    /// Pad with zeros so that, after `len` more bytes, the used size is a
    /// multiple of `alignment` (a power of two).
    pub fn align(&mut self, len: usize, alignment: usize) -> Result<(), BuildError> {
        self.min_align = self.min_align.max(alignment);
        let pad = padding_bytes(self.len().wrapping_add(len), alignment);
        self.push_zeros(pad)
    }

    pub fn push_zeros(&mut self, count: usize) -> Result<(), BuildError> {
        self.reserve(count)?;
        self.head -= count;
        self.buf[self.head..self.head + count].fill(0);
        Ok(())
    }

    /// Copy `bytes` in, preserving their order in memory.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), BuildError> {
        self.reserve(bytes.len())?;
        self.head -= bytes.len();
        self.buf[self.head..self.head + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Write a scalar. The caller aligns first.
    pub fn push<T: Scalar>(&mut self, value: T) -> Result<(), BuildError> {
        self.reserve(T::SIZE)?;
        self.head -= T::SIZE;
        value.write_le(&mut self.buf[self.head..]);
        Ok(())
    }

    /// Overwrite an already written scalar at `pos` (distance from the end).
    pub fn patch<T: Scalar>(&mut self, pos: usize, value: T) {
        let idx = self.buf.len() - pos;
        value.write_le(&mut self.buf[idx..idx + T::SIZE]);
    }

    /// `len` written bytes starting at `pos` (distance from the end).
    pub fn bytes_at(&self, pos: usize, len: usize) -> &[u8] {
        let idx = self.buf.len() - pos;
        &self.buf[idx..idx + len]
    }
}
