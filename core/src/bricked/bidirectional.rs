//! BidirectionalBrickedRnn: a forward and a backward bricked pass sharing one
//! interleaved output buffer.
//!
//! ```text
//! input ──► forward cell  ──► [0, H)   of every slot ─┐
//!       └─► backward cell ──► [H, 2H)  of every slot ─┴─► out_time × 2H
//! ```
//!
//! Both cells and both configurations are checked at construction time; the
//! alignment constraints that depend on the sequence length are checked once
//! per `run`, before anything is written.

use tracing::debug;

use super::batched::{backward_bricked_batched, batched_scratch_len, forward_bricked_batched};
use super::layout::{validate_bidirectional, BrickConfig};
use super::output::SlotWriter;
use super::sequential::{backward_bricked, forward_bricked, sequential_scratch_len};
use crate::cell::{FastGrnnLr, RecurrentCell};
use crate::error::{AlignmentError, BrickError, BrickResult};
use crate::sequence::Sequence;

/// A forward/backward cell pair run as one bidirectional bricked RNN.
pub struct BidirectionalBrickedRnn<F, B> {
    forward_cell: F,
    backward_cell: B,
    forward: BrickConfig,
    backward: BrickConfig,
}

impl<F: RecurrentCell, B: RecurrentCell> BidirectionalBrickedRnn<F, B> {
    /// Pair two cells. Fails fast if they disagree on dimensions or if the
    /// configurations can never align.
    pub fn new(forward_cell: F, backward_cell: B, forward: BrickConfig, backward: BrickConfig) -> BrickResult<Self> {
        forward.validate()?;
        backward.validate()?;
        if forward_cell.input_dims() != backward_cell.input_dims() {
            return Err(BrickError::DimensionMismatch {
                expected: forward_cell.input_dims(),
                actual: backward_cell.input_dims(),
            });
        }
        if forward_cell.hidden_dims() != backward_cell.hidden_dims() {
            return Err(BrickError::DimensionMismatch {
                expected: forward_cell.hidden_dims(),
                actual: backward_cell.hidden_dims(),
            });
        }
        if forward.hop != backward.hop {
            return Err(AlignmentError::HopMismatch { forward: forward.hop, backward: backward.hop }.into());
        }
        if !forward.dense_sampling || !backward.dense_sampling {
            return Err(AlignmentError::SamplingDisabled.into());
        }

        Ok(Self { forward_cell, backward_cell, forward, backward })
    }

    pub fn input_dims(&self) -> usize {
        self.forward_cell.input_dims()
    }

    /// Hidden size of one direction.
    pub fn hidden_dims(&self) -> usize {
        self.forward_cell.hidden_dims()
    }

    /// Scalars per output slot: both halves.
    pub fn slot_width(&self) -> usize {
        2 * self.hidden_dims()
    }

    pub fn forward_config(&self) -> &BrickConfig {
        &self.forward
    }

    pub fn backward_config(&self) -> &BrickConfig {
        &self.backward
    }

    /// Slots both passes write for an `in_time`-step sequence.
    pub fn out_time(&self, in_time: usize) -> BrickResult<usize> {
        validate_bidirectional(in_time, &self.forward, &self.backward)?;
        let forward = self.forward.layout(in_time)?.forward_out_time(&self.forward);
        let backward = self.backward.layout(in_time)?.backward_out_time(&self.backward);
        debug_assert_eq!(forward, backward);
        Ok(forward)
    }

    /// Output buffer length in scalars for an `in_time`-step sequence.
    pub fn output_len(&self, in_time: usize) -> BrickResult<usize> {
        Ok(self.out_time(in_time)? * self.slot_width())
    }

    /// Scratch for [`run`](Self::run). The passes run one after the other and
    /// reuse the same scratch.
    pub fn estimate_scratch_len(&self) -> usize {
        sequential_scratch_len(&self.forward_cell).max(sequential_scratch_len(&self.backward_cell))
    }

    fn split_output<'o>(&self, input: &Sequence<'_>, output: &'o mut [f32]) -> BrickResult<(SlotWriter<'o>, SlotWriter<'o>)> {
        let required = self.output_len(input.in_time())?;
        if output.len() < required {
            return Err(BrickError::BufferTooSmall { required, available: output.len() });
        }
        SlotWriter::bidirectional(&mut output[..required], self.hidden_dims())
    }

    /// Run both passes with the sequential schedulers. Returns `out_time`.
    pub fn run(&self, input: &Sequence<'_>, output: &mut [f32], scratch: &mut [f32]) -> BrickResult<usize> {
        let (mut fwd, mut bwd) = self.split_output(input, output)?;
        debug!(in_time = input.in_time(), hidden = self.hidden_dims(), "bidirectional bricked run");

        let out_time = forward_bricked(&mut fwd, input, &self.forward_cell, &self.forward, scratch)?;
        let written = backward_bricked(&mut bwd, input, &self.backward_cell, &self.backward, scratch)?;
        debug_assert_eq!(out_time, written);
        Ok(out_time)
    }
}

impl<'p> BidirectionalBrickedRnn<FastGrnnLr<'p>, FastGrnnLr<'p>> {
    /// Scratch for [`run_batched`](Self::run_batched) over `in_time` steps.
    pub fn estimate_batched_scratch_len(&self, in_time: usize) -> BrickResult<usize> {
        let forward = batched_scratch_len(&self.forward_cell, in_time, &self.forward)?;
        let backward = batched_scratch_len(&self.backward_cell, in_time, &self.backward)?;
        Ok(forward.max(backward))
    }

    /// Run both passes with the batched low-rank path. Returns `out_time`.
    pub fn run_batched(&self, input: &Sequence<'_>, output: &mut [f32], scratch: &mut [f32]) -> BrickResult<usize> {
        let (mut fwd, mut bwd) = self.split_output(input, output)?;
        debug!(in_time = input.in_time(), hidden = self.hidden_dims(), "bidirectional batched run");

        let out_time = forward_bricked_batched(&mut fwd, input, &self.forward_cell, &self.forward, scratch)?;
        let written = backward_bricked_batched(&mut bwd, input, &self.backward_cell, &self.backward, scratch)?;
        debug_assert_eq!(out_time, written);
        Ok(out_time)
    }
}
