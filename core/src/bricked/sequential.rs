//! Sequential brick scheduler: one hidden-state accumulator, reused brick
//! after brick, driven through any [`RecurrentCell`].
//!
//! Forward slot order:
//!
//! ```text
//! [ dense samples of brick 0 ] [ final of brick 0 .. brick N-1 ] [ tail ]
//! ```
//!
//! Backward slot order (written from both ends):
//!
//! ```text
//! [ finals of bricks 0 .. N-2 ] [ final of last segment ] [ dense samples, reversed ]
//!   -> written left to right                                <- written right to left
//! ```

use tracing::{debug, trace};

use super::layout::{validate_aligned, BrickConfig, BrickLayout};
use super::output::SlotWriter;
use crate::arena::Arena;
use crate::cell::{Direction, RecurrentCell};
use crate::error::{BrickError, BrickResult};
use crate::sequence::Sequence;

/// Scratch scalars the sequential schedulers need for `cell`.
pub fn sequential_scratch_len<C: RecurrentCell + ?Sized>(cell: &C) -> usize {
    cell.hidden_dims() + cell.scratch_len()
}

/// Validate everything that can be checked before the first write. A writer
/// over one half of an interleaved buffer also requires an aligned layout.
pub(crate) fn prepare<C: RecurrentCell + ?Sized>(
    output: &SlotWriter<'_>,
    input: &Sequence<'_>,
    cell: &C,
    config: &BrickConfig,
) -> BrickResult<BrickLayout> {
    config.validate()?;
    if cell.input_dims() != input.in_dims() {
        return Err(BrickError::DimensionMismatch {
            expected: cell.input_dims(),
            actual: input.in_dims(),
        });
    }
    if output.width() != cell.hidden_dims() {
        return Err(BrickError::DimensionMismatch {
            expected: cell.hidden_dims(),
            actual: output.width(),
        });
    }
    if output.stride() != output.width() {
        validate_aligned(input.in_time(), config)?;
    }
    config.layout(input.in_time())
}

/// Reset `hidden` and run the cell over `len` steps starting at `start`.
#[inline]
pub(crate) fn run_brick<C: RecurrentCell + ?Sized>(
    cell: &C,
    hidden: &mut [f32],
    input: &Sequence<'_>,
    start: usize,
    len: usize,
    scratch: &mut [f32],
    direction: Direction,
    normalize: bool,
) -> BrickResult<()> {
    hidden.fill(0.0);
    cell.advance(hidden, input.steps(start, len), len, scratch, direction, normalize)
}

/// Forward partial brick over the steps after the last full brick, written
/// to slot `slot`.
pub(crate) fn forward_tail<C: RecurrentCell + ?Sized>(
    output: &mut SlotWriter<'_>,
    slot: usize,
    layout: &BrickLayout,
    input: &Sequence<'_>,
    cell: &C,
    config: &BrickConfig,
    hidden: &mut [f32],
    scratch: &mut [f32],
) -> BrickResult<()> {
    let start = layout.brick_start(layout.num_bricks());
    let len = layout.in_time() - start;
    trace!(start, len, slot, "forward partial brick");
    run_brick(cell, hidden, input, start, len, scratch, Direction::Forward, config.normalize)?;
    output.write(slot, hidden)
}

/// Backward final segment `[segment_start, in_time)`, stepped one time step at
/// a time from the end. Dense samples go to decreasing slots from
/// `out_time - 1` down to `num_bricks`; the segment's first-in-time state goes
/// to slot `num_bricks - 1`, last.
pub(crate) fn backward_final_segment<C: RecurrentCell + ?Sized>(
    output: &mut SlotWriter<'_>,
    layout: &BrickLayout,
    input: &Sequence<'_>,
    cell: &C,
    config: &BrickConfig,
    hidden: &mut [f32],
    scratch: &mut [f32],
) -> BrickResult<()> {
    let in_time = layout.in_time();
    let hop = layout.hop();
    let start = layout.backward_segment_start();
    let mut out_index = layout.backward_out_time(config);
    trace!(start, len = in_time - start, "backward final segment");

    hidden.fill(0.0);
    for s in (start..in_time).rev() {
        cell.advance(hidden, input.step(s), 1, scratch, Direction::Backward, config.normalize)?;
        if (in_time - 1 - s) % hop == 0 && out_index > layout.num_bricks() {
            out_index -= 1;
            output.write(out_index, hidden)?;
        }
    }
    output.write(layout.num_bricks() - 1, hidden)
}

/// Forward bricked recurrence.
///
/// Brick 0 is stepped one time step at a time so its intermediate states can
/// be sampled every `hop` steps; every later brick is advanced in one call
/// from a fresh state. Returns the number of slots written.
///
/// # Errors
/// Configuration and sizing errors are reported before the first write. A cell
/// failure aborts the pass; slots after the last written one are undefined.
pub fn forward_bricked<C: RecurrentCell + ?Sized>(
    output: &mut SlotWriter<'_>,
    input: &Sequence<'_>,
    cell: &C,
    config: &BrickConfig,
    scratch: &mut [f32],
) -> BrickResult<usize> {
    let layout = prepare(output, input, cell, config)?;
    let out_time = layout.forward_out_time(config);
    output.ensure_slots(out_time)?;

    let mut arena = Arena::new(scratch);
    let hidden = arena.alloc_f32_slice(cell.hidden_dims())?;
    let cell_scratch = arena.alloc_f32_slice(cell.scratch_len())?;

    debug!(
        cell = cell.name(),
        in_time = layout.in_time(),
        window = layout.window(),
        hop = layout.hop(),
        bricks = layout.num_bricks(),
        out_time,
        "forward bricked pass"
    );

    let hop = layout.hop();
    let dense = layout.forward_dense_samples(config.dense_sampling) > 0;
    let mut out_index = 0;

    // Brick 0, one step at a time.
    for t in 0..layout.brick_len() {
        cell.advance(hidden, input.step(t), 1, cell_scratch, Direction::Forward, config.normalize)?;
        if dense && t % hop == 0 {
            output.write(out_index, hidden)?;
            out_index += 1;
        }
    }
    output.write(out_index, hidden)?;
    out_index += 1;

    for i in 1..layout.num_bricks() {
        let start = layout.brick_start(i);
        trace!(brick = i, start, "forward brick");
        run_brick(
            cell,
            hidden,
            input,
            start,
            layout.brick_len(),
            cell_scratch,
            Direction::Forward,
            config.normalize,
        )?;
        output.write(out_index, hidden)?;
        out_index += 1;
    }

    if layout.has_forward_tail(config.tail) {
        forward_tail(output, out_index, &layout, input, cell, config, hidden, cell_scratch)?;
        out_index += 1;
    }

    Ok(out_index)
}

/// Backward bricked recurrence.
///
/// Every brick but the temporally last is advanced backward in one call and
/// written left to right from slot 0. The final segment is then stepped one
/// time step at a time from `in_time - 1`. Returns the number of slots
/// written.
///
/// # Errors
/// Same contract as [`forward_bricked`].
pub fn backward_bricked<C: RecurrentCell + ?Sized>(
    output: &mut SlotWriter<'_>,
    input: &Sequence<'_>,
    cell: &C,
    config: &BrickConfig,
    scratch: &mut [f32],
) -> BrickResult<usize> {
    let layout = prepare(output, input, cell, config)?;
    let out_time = layout.backward_out_time(config);
    output.ensure_slots(out_time)?;

    let mut arena = Arena::new(scratch);
    let hidden = arena.alloc_f32_slice(cell.hidden_dims())?;
    let cell_scratch = arena.alloc_f32_slice(cell.scratch_len())?;

    debug!(
        cell = cell.name(),
        in_time = layout.in_time(),
        window = layout.window(),
        hop = layout.hop(),
        bricks = layout.num_bricks(),
        out_time,
        "backward bricked pass"
    );

    for i in 0..layout.num_bricks() - 1 {
        let start = layout.brick_start(i);
        trace!(brick = i, start, "backward brick");
        run_brick(
            cell,
            hidden,
            input,
            start,
            layout.brick_len(),
            cell_scratch,
            Direction::Backward,
            config.normalize,
        )?;
        output.write(i, hidden)?;
    }

    backward_final_segment(output, &layout, input, cell, config, hidden, cell_scratch)?;
    Ok(out_time)
}
