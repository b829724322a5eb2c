//! Strided output slots, and the bidirectional offset split.
//!
//! An output buffer is `out_time` slots of `stride` scalars. A unidirectional
//! pass owns every slot whole (`stride == width == rnn_hidden`). For a
//! bidirectional pair the buffer is split into two writers with
//! `stride == 2 * rnn_hidden`: the forward one writes `[0, rnn_hidden)` of each
//! slot, the backward one `[rnn_hidden, 2 * rnn_hidden)`. No concatenation pass
//! is ever needed.
//!
//! ```text
//! slot k:   | fwd h[0..H) | bwd h[0..H) |
//!           ^ k*2H        ^ k*2H + H
//! ```

use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::error::{BrickError, BrickResult, ConfigError};

/// Write access to one `width`-scalar column of a strided slot buffer.
///
/// Holds a raw pointer instead of a slice so that two writers can cover
/// interleaved, disjoint halves of the same buffer. Every access stays inside
/// `[slot * stride + offset, slot * stride + offset + width)`, and the two
/// halves produced by [`SlotWriter::bidirectional`] never share an index.
pub struct SlotWriter<'a> {
    ptr: NonNull<f32>,
    len: usize,
    stride: usize,
    offset: usize,
    width: usize,
    _buf: PhantomData<&'a mut [f32]>,
}

// SAFETY: a SlotWriter is a unique borrow of its index set (see the type docs);
// moving it to another thread is no different from moving a `&mut [f32]`.
unsafe impl Send for SlotWriter<'_> {}

impl<'a> SlotWriter<'a> {
    fn check_shape(buf: &[f32], stride: usize, width: usize) -> BrickResult<()> {
        if width == 0 {
            return Err(ConfigError::ZeroDims.into());
        }
        if buf.len() % stride != 0 {
            return Err(BrickError::InvalidInputLength {
                expected: (buf.len() / stride + 1) * stride,
                actual: buf.len(),
            });
        }
        Ok(())
    }

    /// The whole buffer as `buf.len() / width` slots of `width` scalars.
    pub fn unidirectional(buf: &'a mut [f32], width: usize) -> BrickResult<Self> {
        Self::check_shape(buf, width.max(1), width)?;
        Ok(Self {
            len: buf.len(),
            ptr: NonNull::from(buf).cast(),
            stride: width,
            offset: 0,
            width,
            _buf: PhantomData,
        })
    }

    /// Split the buffer into the forward and backward halves of
    /// `buf.len() / (2 * width)` interleaved slots.
    ///
    /// The schedulers only accept a half when the configuration passes
    /// [`validate_aligned`](super::layout::validate_aligned).
    pub fn bidirectional(buf: &'a mut [f32], width: usize) -> BrickResult<(Self, Self)> {
        let stride = 2 * width;
        Self::check_shape(buf, stride.max(1), width)?;
        let len = buf.len();
        let ptr = NonNull::from(buf).cast();
        let half = |offset| Self { ptr, len, stride, offset, width, _buf: PhantomData };
        Ok((half(0), half(width)))
    }

    /// Number of slots in the buffer.
    pub fn slots(&self) -> usize {
        self.len / self.stride
    }

    /// Scalars this writer owns per slot.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Scalars between consecutive slots (`rnn_assign_offset`).
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Position of this writer's column inside a slot.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Fail unless the buffer holds at least `out_time` slots.
    pub fn ensure_slots(&self, out_time: usize) -> BrickResult<()> {
        if self.slots() < out_time {
            return Err(BrickError::BufferTooSmall {
                required: out_time * self.stride,
                available: self.len,
            });
        }
        Ok(())
    }

    /// This writer's column of slot `slot`.
    pub fn slot_mut(&mut self, slot: usize) -> BrickResult<&mut [f32]> {
        if slot >= self.slots() {
            return Err(BrickError::BufferTooSmall {
                required: (slot + 1) * self.stride,
                available: self.len,
            });
        }
        let start = slot * self.stride + self.offset;
        // SAFETY: `start + width <= (slot + 1) * stride <= len`, the range lies
        // in the borrowed buffer and belongs to this writer's column only. The
        // returned borrow is tied to `&mut self`, so it cannot alias another
        // slice handed out by the same writer.
        Ok(unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr().add(start), self.width) })
    }

    /// Copy a hidden state into slot `slot`.
    pub fn write(&mut self, slot: usize, state: &[f32]) -> BrickResult<()> {
        if state.len() != self.width {
            return Err(BrickError::DimensionMismatch { expected: self.width, actual: state.len() });
        }
        self.slot_mut(slot)?.copy_from_slice(state);
        Ok(())
    }
}
