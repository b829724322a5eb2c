//! Bump arena over a caller-owned `f32` scratch buffer.
//!
//! Why Arena: MCUs have no heap allocator. The caller owns a `[f32; N]` (or a
//! `Vec<f32>` on the host) and passes `&mut [f32]` into a scheduling call. The
//! arena hands out zeroed, disjoint sub-slices: zero fragmentation, O(1) alloc.
//!
//! Every entry point builds its own `Arena` from the scratch slice, so the
//! scratch is released on every exit path when the call returns.

use crate::error::{BrickError, BrickResult};

/// Bump allocator over a borrowed `f32` buffer.
///
/// Lifetime `'a` ties all allocations to the buffer. Each allocation splits the
/// remaining buffer, so slices handed out never alias.
pub struct Arena<'a> {
    buf: &'a mut [f32],
    capacity: usize,
}

impl<'a> Arena<'a> {
    /// Create a new arena from a mutable scratch buffer.
    pub fn new(buf: &'a mut [f32]) -> Self {
        let capacity = buf.len();
        Self { buf, capacity }
    }

    /// Allocate a zeroed mutable slice of `len` scalars.
    pub fn alloc_f32_slice(&mut self, len: usize) -> BrickResult<&'a mut [f32]> {
        if len > self.buf.len() {
            return Err(BrickError::ArenaExhausted {
                requested: len,
                remaining: self.buf.len(),
            });
        }

        let buf = core::mem::take(&mut self.buf);
        let (head, tail) = buf.split_at_mut(len);
        self.buf = tail;

        // Zero-initialize: accumulators rely on a clean start.
        head.fill(0.0);
        Ok(head)
    }

    /// Scalars remaining in the arena.
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Total capacity in scalars.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Scalars currently allocated.
    #[inline(always)]
    pub fn used(&self) -> usize {
        self.capacity - self.buf.len()
    }
}
