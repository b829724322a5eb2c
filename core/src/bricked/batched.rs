//! Batched brick path for low-rank FastGRNN.
//!
//! Instead of running bricks one after another with per-step matrix-vector
//! products, every brick advances in lockstep. At synchronized step `t`, brick
//! `n` consumes sequence step `n * hop + t`, so:
//!
//! 1. the input side `W2 (W1 x)` is computed once for the whole sequence with
//!    two tiled matrix products, and brick `n` just reads row `n * hop + t`;
//! 2. the hidden side `U2 (U1 h)` is computed for all stacked states
//!    (`num_bricks × hidden`) with two more tiled products per step;
//! 3. the FastGRNN gate is applied row by row.
//!
//! ```text
//!            t = 0 .. window
//! brick 0:   x[0]      x[1]        ...
//! brick 1:   x[hop]    x[hop+1]    ...
//! brick 2:   x[2hop]   x[2hop+1]   ...
//! ```
//!
//! Many small matrix-vector products become a few cache-blocked
//! matrix-matrix products, at the price of `O(num_bricks * hidden)` extra
//! scratch plus the sequence-wide projection.
//!
//! Edge regions fall back to the sequential scheduler: a sequence shorter than
//! one window, the forward partial tail brick, and a backward final segment
//! longer than one window.

use tracing::debug;

use super::layout::{BrickConfig, BrickLayout};
use super::output::SlotWriter;
use super::sequential::{
    backward_bricked, backward_final_segment, forward_bricked, forward_tail, prepare,
    sequential_scratch_len,
};
use crate::arena::Arena;
use crate::cell::{FastGrnnLr, RecurrentCell};
use crate::error::{BrickResult, ConfigError};
use crate::math::tiled_mat_mul_transposed;
use crate::sequence::Sequence;

/// Scratch scalars a batched pass over `in_time` steps needs.
///
/// Covers the sequential fallback, the optional normalized copy of the
/// sequence, the two input projections and the stacked per-brick buffers.
pub fn batched_scratch_len(cell: &FastGrnnLr<'_>, in_time: usize, config: &BrickConfig) -> BrickResult<usize> {
    config.validate()?;
    let layout = config.layout(in_time)?;
    let sequential = sequential_scratch_len(cell);
    if layout.is_degenerate() {
        return Ok(sequential);
    }

    let covered = layout.covered_end();
    let bricks = layout.num_bricks();
    let hidden = cell.hidden_dims();
    let normalized = if config.normalize { covered * cell.input_dims() } else { 0 };

    Ok(sequential
        + normalized
        + covered * (cell.w_rank() + hidden)
        + bricks * (2 * hidden + cell.u_rank()))
}

/// Stacked hidden states of `bricks` bricks advancing in lockstep.
struct Lockstep<'s> {
    projection: &'s [f32],
    states: &'s mut [f32],
    pre: &'s mut [f32],
    tmp_u: &'s mut [f32],
    bricks: usize,
    hop: usize,
    block_size: usize,
}

impl<'s> Lockstep<'s> {
    /// Allocate the stacked buffers and precompute `W2 (W1 x)` for every
    /// covered step.
    fn new(
        arena: &mut Arena<'s>,
        cell: &FastGrnnLr<'_>,
        input: &Sequence<'_>,
        layout: &BrickLayout,
        config: &BrickConfig,
        bricks: usize,
    ) -> BrickResult<Self> {
        let in_dims = cell.input_dims();
        let hidden = cell.hidden_dims();
        let covered = layout.covered_end();
        let block_size = config.block_size;

        let source: &[f32] = if config.normalize {
            let stats = cell.normalization().ok_or(ConfigError::MissingNormalization)?;
            let normalized = arena.alloc_f32_slice(covered * in_dims)?;
            for (x, out) in input
                .steps(0, covered)
                .chunks_exact(in_dims)
                .zip(normalized.chunks_exact_mut(in_dims))
            {
                stats.apply(x, out)?;
            }
            normalized
        } else {
            input.steps(0, covered)
        };

        // [covered × w_rank] = X · W1ᵗ
        let tmp_w = arena.alloc_f32_slice(covered * cell.w_rank())?;
        tiled_mat_mul_transposed(
            source,
            cell.w1(),
            covered,
            in_dims,
            cell.w_rank(),
            in_dims,
            in_dims,
            tmp_w,
            block_size,
        )?;
        // [covered × hidden] = (X W1ᵗ) · W2ᵗ
        let projection = arena.alloc_f32_slice(covered * hidden)?;
        tiled_mat_mul_transposed(
            tmp_w,
            cell.w2(),
            covered,
            cell.w_rank(),
            hidden,
            cell.w_rank(),
            cell.w_rank(),
            projection,
            block_size,
        )?;

        Ok(Self {
            projection,
            states: arena.alloc_f32_slice(bricks * hidden)?,
            pre: arena.alloc_f32_slice(bricks * hidden)?,
            tmp_u: arena.alloc_f32_slice(bricks * cell.u_rank())?,
            bricks,
            hop: layout.hop(),
            block_size,
        })
    }

    /// Advance every brick by its step `t`.
    fn step(&mut self, cell: &FastGrnnLr<'_>, t: usize) -> BrickResult<()> {
        let hidden = cell.hidden_dims();
        let u_rank = cell.u_rank();

        // [bricks × u_rank] = H · U1ᵗ
        self.tmp_u.fill(0.0);
        tiled_mat_mul_transposed(
            self.states,
            cell.u1(),
            self.bricks,
            hidden,
            u_rank,
            hidden,
            hidden,
            self.tmp_u,
            self.block_size,
        )?;
        // [bricks × hidden] = (H U1ᵗ) · U2ᵗ
        self.pre.fill(0.0);
        tiled_mat_mul_transposed(
            self.tmp_u,
            cell.u2(),
            self.bricks,
            u_rank,
            hidden,
            u_rank,
            u_rank,
            self.pre,
            self.block_size,
        )?;

        let gate = cell.gate();
        for (n, (state, pre)) in self
            .states
            .chunks_exact_mut(hidden)
            .zip(self.pre.chunks_exact_mut(hidden))
            .enumerate()
        {
            let row = (n * self.hop + t) * hidden;
            for (p, &x) in pre.iter_mut().zip(&self.projection[row..row + hidden]) {
                *p += x;
            }
            gate.apply(state, pre);
        }
        Ok(())
    }

    /// Current hidden state of brick `n`.
    fn state(&self, n: usize, hidden: usize) -> &[f32] {
        &self.states[n * hidden..(n + 1) * hidden]
    }
}

/// Forward bricked recurrence with all bricks in lockstep.
///
/// Same slot layout and return value as
/// [`forward_bricked`](super::sequential::forward_bricked); scratch must hold
/// [`batched_scratch_len`] scalars.
pub fn forward_bricked_batched(
    output: &mut SlotWriter<'_>,
    input: &Sequence<'_>,
    cell: &FastGrnnLr<'_>,
    config: &BrickConfig,
    scratch: &mut [f32],
) -> BrickResult<usize> {
    let layout = prepare(output, input, cell, config)?;
    if layout.is_degenerate() {
        debug!(in_time = layout.in_time(), window = layout.window(), "sequence shorter than window, sequential fallback");
        return forward_bricked(output, input, cell, config, scratch);
    }
    let out_time = layout.forward_out_time(config);
    output.ensure_slots(out_time)?;

    let hidden = cell.hidden_dims();
    let bricks = layout.num_bricks();
    let (gcd, lcm) = layout.lockstep_period();
    debug!(bricks, window = layout.window(), hop = layout.hop(), gcd, lcm, out_time, "forward batched pass");

    let mut arena = Arena::new(scratch);
    let fallback_hidden = arena.alloc_f32_slice(hidden)?;
    let cell_scratch = arena.alloc_f32_slice(cell.scratch_len())?;
    let mut lockstep = Lockstep::new(&mut arena, cell, input, &layout, config, bricks)?;

    let hop = layout.hop();
    let mut out_index = 0;
    for t in 0..layout.window() {
        lockstep.step(cell, t)?;
        if config.dense_sampling && t % hop == 0 {
            output.write(out_index, lockstep.state(0, hidden))?;
            out_index += 1;
        }
    }
    for n in 0..bricks {
        output.write(out_index, lockstep.state(n, hidden))?;
        out_index += 1;
    }

    if layout.has_forward_tail(config.tail) {
        debug!(tail = layout.tail_len(), "partial tail brick, sequential fallback");
        forward_tail(output, out_index, &layout, input, cell, config, fallback_hidden, cell_scratch)?;
        out_index += 1;
    }
    Ok(out_index)
}

/// Backward bricked recurrence with all bricks in lockstep.
///
/// Same slot layout and return value as
/// [`backward_bricked`](super::sequential::backward_bricked). When uncovered
/// trailing steps extend the final segment beyond one window, that segment is
/// run by the sequential scheduler and only the other bricks go in lockstep.
pub fn backward_bricked_batched(
    output: &mut SlotWriter<'_>,
    input: &Sequence<'_>,
    cell: &FastGrnnLr<'_>,
    config: &BrickConfig,
    scratch: &mut [f32],
) -> BrickResult<usize> {
    let layout = prepare(output, input, cell, config)?;
    if layout.is_degenerate() {
        debug!(in_time = layout.in_time(), window = layout.window(), "sequence shorter than window, sequential fallback");
        return backward_bricked(output, input, cell, config, scratch);
    }
    let out_time = layout.backward_out_time(config);
    output.ensure_slots(out_time)?;

    let hidden = cell.hidden_dims();
    let bricks = layout.num_bricks();
    let last_in_lockstep = layout.tail_len() == 0;
    let lockstep_bricks = if last_in_lockstep { bricks } else { bricks - 1 };
    let (gcd, lcm) = layout.lockstep_period();
    debug!(bricks, lockstep_bricks, window = layout.window(), hop = layout.hop(), gcd, lcm, out_time, "backward batched pass");

    let mut arena = Arena::new(scratch);
    let fallback_hidden = arena.alloc_f32_slice(hidden)?;
    let cell_scratch = arena.alloc_f32_slice(cell.scratch_len())?;

    if lockstep_bricks > 0 {
        let mut lockstep = Lockstep::new(&mut arena, cell, input, &layout, config, lockstep_bricks)?;
        let window = layout.window();
        let hop = layout.hop();
        let mut out_index = out_time;
        for t in (0..window).rev() {
            lockstep.step(cell, t)?;
            if last_in_lockstep && (window - 1 - t) % hop == 0 && out_index > bricks {
                out_index -= 1;
                output.write(out_index, lockstep.state(bricks - 1, hidden))?;
            }
        }
        for n in 0..lockstep_bricks {
            output.write(n, lockstep.state(n, hidden))?;
        }
    }

    if !last_in_lockstep {
        debug!(segment = layout.backward_segment_len(), "long final segment, sequential fallback");
        backward_final_segment(output, &layout, input, cell, config, fallback_hidden, cell_scratch)?;
    }
    Ok(out_time)
}
