//! # Recurrent Cell Capability
//!
//! The brick scheduler never looks inside a cell. It only needs one
//! capability: "advance this hidden-state accumulator across `steps` time steps
//! of input, forward or backward in time". [`RecurrentCell`] is that capability.
//!
//! Parameters live in the cell value itself (`&self`); per-call scratch is a
//! plain `&mut [f32]` sized by [`RecurrentCell::scratch_len`] and carved out of
//! the scheduler's arena. Variants (full-rank, low-rank, ...) are separate
//! implementations chosen at construction time.
//!
//! | Cell | Parameters | Scratch |
//! |------|-----------|---------|
//! | [`FastGrnn`] | `W [hidden × in]`, `U [hidden × hidden]` | `in + hidden` |
//! | [`FastGrnnLr`] | `W1, W2, U1, U2` low-rank pairs | `in + w_rank + u_rank + hidden` |
//!
//! ## Composition
//!
//! Calling `advance` twice on the same accumulator without resetting it
//! composes the two recurrences. The forward scheduler relies on this to sample
//! the first brick one step at a time.

pub mod fastgrnn;

pub use fastgrnn::{FastGrnn, FastGrnnLr, FastGrnnLrParams, FastGrnnParams, Normalization};

use crate::error::{BrickError, BrickResult};

/// Temporal order in which a cell consumes the steps it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// First step to last.
    #[default]
    Forward,
    /// Last step to first.
    Backward,
}

/// A recurrent cell that advances a hidden-state accumulator in place.
pub trait RecurrentCell {
    fn name(&self) -> &'static str;

    /// Scalars per input time step.
    fn input_dims(&self) -> usize;

    /// Scalars in the hidden state.
    fn hidden_dims(&self) -> usize;

    /// Scratch scalars one `advance` call needs.
    fn scratch_len(&self) -> usize;

    /// Consume `steps` time steps of `input` (`steps * input_dims` scalars),
    /// reading `hidden` as the current state and overwriting it with the new
    /// one.
    ///
    /// With `normalize`, each step is standardized by the cell's own statistics
    /// before use. Any `Err` aborts the caller's scheduling pass.
    fn advance(
        &self,
        hidden: &mut [f32],
        input: &[f32],
        steps: usize,
        scratch: &mut [f32],
        direction: Direction,
        normalize: bool,
    ) -> BrickResult<()>;
}

impl<C: RecurrentCell + ?Sized> RecurrentCell for &C {
    fn name(&self) -> &'static str {
        (**self).name()
    }
    fn input_dims(&self) -> usize {
        (**self).input_dims()
    }
    fn hidden_dims(&self) -> usize {
        (**self).hidden_dims()
    }
    fn scratch_len(&self) -> usize {
        (**self).scratch_len()
    }
    fn advance(
        &self,
        hidden: &mut [f32],
        input: &[f32],
        steps: usize,
        scratch: &mut [f32],
        direction: Direction,
        normalize: bool,
    ) -> BrickResult<()> {
        (**self).advance(hidden, input, steps, scratch, direction, normalize)
    }
}

/// Shared argument validation for `advance` implementations.
pub(crate) fn check_advance_args<C: RecurrentCell + ?Sized>(
    cell: &C,
    hidden: &[f32],
    input: &[f32],
    steps: usize,
    scratch: &[f32],
) -> BrickResult<()> {
    if hidden.len() != cell.hidden_dims() {
        return Err(BrickError::DimensionMismatch {
            expected: cell.hidden_dims(),
            actual: hidden.len(),
        });
    }
    if input.len() != steps * cell.input_dims() {
        return Err(BrickError::InvalidInputLength {
            expected: steps * cell.input_dims(),
            actual: input.len(),
        });
    }
    if scratch.len() < cell.scratch_len() {
        return Err(BrickError::BufferTooSmall {
            required: cell.scratch_len(),
            available: scratch.len(),
        });
    }
    Ok(())
}
