//! Sequential forward/backward schedulers: slot contents, slot ordering,
//! reversal symmetry, tails, error propagation and buffer sizing.

mod common;

use common::{manual_state, random_signal, reverse_rows, run_backward, run_forward, LrWeights};
use nano_brick_core::*;

const IN_DIMS: usize = 4;
const HIDDEN: usize = 8;

fn slot(output: &[f32], k: usize) -> &[f32] {
    &output[k * HIDDEN..(k + 1) * HIDDEN]
}

// =============================================================================
// Forward
// =============================================================================

#[test]
fn test_forward_reference_scenario() {
    let weights = LrWeights::random(1, IN_DIMS, HIDDEN, 2, 4);
    let cell = weights.cell();
    let signal = random_signal(2, 100, IN_DIMS);
    let config = BrickConfig::new(60, 3).with_dense_sampling(true);

    let (out_time, output) = run_forward(&cell, &signal, 100, &config);
    assert_eq!(out_time, 34);

    // Slots 0..20: brick 0 sampled after steps 0, 3, ..., 57.
    for k in 0..20 {
        let expected = manual_state(&cell, &signal, 0, 3 * k + 1, Direction::Forward);
        assert_eq!(slot(&output, k), expected.as_slice(), "dense slot {}", k);
    }
    // Slot 20: brick 0 final.
    let first = manual_state(&cell, &signal, 0, 60, Direction::Forward);
    assert_eq!(slot(&output, 20), first.as_slice());
    // Slots 21..34: finals of bricks 1..13.
    for i in 1..14 {
        let expected = manual_state(&cell, &signal, 3 * i, 60, Direction::Forward);
        assert_eq!(slot(&output, 20 + i), expected.as_slice(), "brick {}", i);
    }
}

#[test]
fn test_forward_without_dense_sampling_emits_only_finals() {
    let weights = LrWeights::random(3, IN_DIMS, HIDDEN, 2, 4);
    let cell = weights.cell();
    let signal = random_signal(4, 40, IN_DIMS);
    let config = BrickConfig::new(10, 5);

    let (out_time, output) = run_forward(&cell, &signal, 40, &config);
    assert_eq!(out_time, 7);
    for i in 0..7 {
        let expected = manual_state(&cell, &signal, 5 * i, 10, Direction::Forward);
        assert_eq!(slot(&output, i), expected.as_slice());
    }
}

#[test]
fn test_forward_partial_tail_brick() {
    let weights = LrWeights::random(5, IN_DIMS, HIDDEN, 2, 4);
    let cell = weights.cell();
    let signal = random_signal(6, 11, IN_DIMS);
    let config = BrickConfig::new(6, 2).with_tail(ForwardTail::PartialBrick);

    let (out_time, output) = run_forward(&cell, &signal, 11, &config);
    assert_eq!(out_time, 4);
    // Bricks start at 0, 2, 4; the tail brick covers [6, 11).
    let tail = manual_state(&cell, &signal, 6, 5, Direction::Forward);
    assert_eq!(slot(&output, 3), tail.as_slice());

    let (dropped, _) = run_forward(&cell, &signal, 11, &BrickConfig::new(6, 2));
    assert_eq!(dropped, 3);
}

#[test]
fn test_degenerate_input_emits_one_slot() {
    let weights = LrWeights::random(7, IN_DIMS, HIDDEN, 2, 4);
    let cell = weights.cell();
    let signal = random_signal(8, 5, IN_DIMS);
    let config = BrickConfig::new(8, 2).with_dense_sampling(true);

    // One short brick over all 5 steps; dense sampling does not apply.
    let (out_time, output) = run_forward(&cell, &signal, 5, &config);
    assert_eq!(out_time, 1);
    let whole = manual_state(&cell, &signal, 0, 5, Direction::Forward);
    assert_eq!(output, whole);

    let (out_time, output) = run_backward(&cell, &signal, 5, &config);
    assert_eq!(out_time, 1);
    let whole = manual_state(&cell, &signal, 0, 5, Direction::Backward);
    assert_eq!(output, whole);
}

// =============================================================================
// Backward
// =============================================================================

#[test]
fn test_backward_slot_layout() {
    let weights = LrWeights::random(9, IN_DIMS, HIDDEN, 2, 4);
    let cell = weights.cell();
    let signal = random_signal(10, 30, IN_DIMS);
    let config = BrickConfig::new(12, 3).with_dense_sampling(true);

    let (out_time, output) = run_backward(&cell, &signal, 30, &config);
    // 7 bricks + 4 samples of the last brick [18, 30).
    assert_eq!(out_time, 11);

    for i in 0..6 {
        let expected = manual_state(&cell, &signal, 3 * i, 12, Direction::Backward);
        assert_eq!(slot(&output, i), expected.as_slice(), "brick {}", i);
    }
    let last = manual_state(&cell, &signal, 18, 12, Direction::Backward);
    assert_eq!(slot(&output, 6), last.as_slice());
    // Samples after reading steps 29, 26, 23, 20, stored right to left.
    for k in 0..4 {
        let start = 29 - 3 * k;
        let expected = manual_state(&cell, &signal, start, 30 - start, Direction::Backward);
        assert_eq!(slot(&output, out_time - 1 - k), expected.as_slice(), "sample {}", k);
    }
}

#[test]
fn test_backward_final_segment_absorbs_uncovered_steps() {
    let weights = LrWeights::random(11, IN_DIMS, HIDDEN, 2, 4);
    let cell = weights.cell();
    let signal = random_signal(12, 100, IN_DIMS);
    let config = BrickConfig::new(60, 3).with_dense_sampling(true);

    let (out_time, output) = run_backward(&cell, &signal, 100, &config);
    assert_eq!(out_time, 34);
    // Last segment is [39, 100): 61 steps, no step left unread.
    let segment = manual_state(&cell, &signal, 39, 61, Direction::Backward);
    assert_eq!(slot(&output, 13), segment.as_slice());
    // Samples after reading steps 99, 96, ..., 42 fill slots 33 down to 14.
    for k in 0..20 {
        let start = 99 - 3 * k;
        let expected = manual_state(&cell, &signal, start, 100 - start, Direction::Backward);
        assert_eq!(slot(&output, 33 - k), expected.as_slice(), "sample {}", k);
    }
}

#[test]
fn test_backward_fits_forward_sized_buffer() {
    let weights = LrWeights::random(21, IN_DIMS, HIDDEN, 2, 4);
    let cell = weights.cell();
    let signal = random_signal(22, 100, IN_DIMS);
    let input = Sequence::new(&signal, 100, IN_DIMS).unwrap();
    let config = BrickConfig::new(60, 3).with_dense_sampling(true);

    let mut output = vec![0.0f32; (100 / 3 + 1) * HIDDEN];
    let mut scratch = vec![0.0f32; sequential_scratch_len(&cell)];
    let mut slots = SlotWriter::unidirectional(&mut output, HIDDEN).unwrap();
    assert_eq!(backward_bricked(&mut slots, &input, &cell, &config, &mut scratch), Ok(34));
    let mut slots = SlotWriter::unidirectional(&mut output, HIDDEN).unwrap();
    assert_eq!(forward_bricked(&mut slots, &input, &cell, &config, &mut scratch), Ok(34));
}

#[test]
fn test_backward_unaligned_window_stays_on_hop_grid() {
    let weights = LrWeights::random(23, IN_DIMS, HIDDEN, 2, 4);
    let cell = weights.cell();
    let signal = random_signal(24, 32, IN_DIMS);
    let config = BrickConfig::new(12, 5).with_dense_sampling(true);

    // 5 bricks, last segment [20, 32): samples after steps 31 and 26 only.
    let (out_time, output) = run_backward(&cell, &signal, 32, &config);
    assert_eq!(out_time, 32 / 5 + 1);
    let segment = manual_state(&cell, &signal, 20, 12, Direction::Backward);
    assert_eq!(slot(&output, 4), segment.as_slice());
    assert_eq!(slot(&output, 6), manual_state(&cell, &signal, 31, 1, Direction::Backward).as_slice());
    assert_eq!(slot(&output, 5), manual_state(&cell, &signal, 26, 6, Direction::Backward).as_slice());
}

// =============================================================================
// Symmetry
// =============================================================================

#[test]
fn test_reversal_symmetry() {
    let weights = LrWeights::random(13, IN_DIMS, HIDDEN, 2, 4);
    let cell = weights.cell();
    let signal = random_signal(14, 48, IN_DIMS);
    let reversed = reverse_rows(&signal, IN_DIMS);

    for (window, hop, dense) in [(12, 3, true), (12, 3, false), (8, 8, true), (20, 4, true)] {
        let config = BrickConfig::new(window, hop).with_dense_sampling(dense);
        let (fwd_time, forward) = run_forward(&cell, &signal, 48, &config);
        let (bwd_time, backward) = run_backward(&cell, &reversed, 48, &config);
        assert_eq!(fwd_time, bwd_time);
        assert_eq!(reverse_rows(&backward, HIDDEN), forward, "window {} hop {}", window, hop);
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Delegates to a real cell but fails once it has consumed `budget` steps.
struct FailingCell<'p> {
    inner: FastGrnnLr<'p>,
    budget: usize,
    consumed: core::cell::Cell<usize>,
}

impl RecurrentCell for FailingCell<'_> {
    fn name(&self) -> &'static str {
        "failing"
    }
    fn input_dims(&self) -> usize {
        self.inner.input_dims()
    }
    fn hidden_dims(&self) -> usize {
        self.inner.hidden_dims()
    }
    fn scratch_len(&self) -> usize {
        self.inner.scratch_len()
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
        let consumed = self.consumed.get() + steps;
        if consumed > self.budget {
            return Err(BrickError::CellFailure { code: -7 });
        }
        self.consumed.set(consumed);
        self.inner.advance(hidden, input, steps, scratch, direction, normalize)
    }
}

#[test]
fn test_cell_failure_aborts_the_pass() {
    let weights = LrWeights::random(15, IN_DIMS, HIDDEN, 2, 4);
    let cell = FailingCell { inner: weights.cell(), budget: 5, consumed: core::cell::Cell::new(0) };
    let signal = random_signal(16, 40, IN_DIMS);
    let input = Sequence::new(&signal, 40, IN_DIMS).unwrap();
    let config = BrickConfig::new(10, 5).with_dense_sampling(true);

    let mut output = vec![f32::NAN; 20 * HIDDEN];
    let mut scratch = vec![0.0f32; sequential_scratch_len(&cell)];
    let mut slots = SlotWriter::unidirectional(&mut output, HIDDEN).unwrap();
    let result = forward_bricked(&mut slots, &input, &cell, &config, &mut scratch);
    assert_eq!(result, Err(BrickError::CellFailure { code: -7 }));

    // Only the sample after step 0 lands before the failure at step 5.
    assert!(output[..HIDDEN].iter().all(|x| x.is_finite()));
    assert!(output[HIDDEN..].iter().all(|x| x.is_nan()));
}

#[test]
fn test_undersized_output_is_rejected_before_writing() {
    let weights = LrWeights::random(17, IN_DIMS, HIDDEN, 2, 4);
    let cell = weights.cell();
    let signal = random_signal(18, 100, IN_DIMS);
    let input = Sequence::new(&signal, 100, IN_DIMS).unwrap();
    let config = BrickConfig::new(60, 3).with_dense_sampling(true);

    let mut output = vec![-1.0f32; 33 * HIDDEN];
    let mut scratch = vec![0.0f32; sequential_scratch_len(&cell)];
    let mut slots = SlotWriter::unidirectional(&mut output, HIDDEN).unwrap();
    let result = forward_bricked(&mut slots, &input, &cell, &config, &mut scratch);
    assert_eq!(
        result,
        Err(BrickError::BufferTooSmall { required: 34 * HIDDEN, available: 33 * HIDDEN })
    );
    assert!(output.iter().all(|&x| x == -1.0));
}

#[test]
fn test_undersized_scratch_and_mismatched_shapes() {
    let weights = LrWeights::random(19, IN_DIMS, HIDDEN, 2, 4);
    let cell = weights.cell();
    let signal = random_signal(20, 20, IN_DIMS);
    let input = Sequence::new(&signal, 20, IN_DIMS).unwrap();
    let config = BrickConfig::new(10, 5);
    let mut output = vec![0.0f32; 3 * HIDDEN];

    let mut scratch = vec![0.0f32; sequential_scratch_len(&cell) - 1];
    let mut slots = SlotWriter::unidirectional(&mut output, HIDDEN).unwrap();
    assert!(matches!(
        backward_bricked(&mut slots, &input, &cell, &config, &mut scratch),
        Err(BrickError::ArenaExhausted { .. })
    ));

    let narrow = Sequence::new(&signal, 40, 2).unwrap();
    let mut scratch = vec![0.0f32; sequential_scratch_len(&cell)];
    assert_eq!(
        forward_bricked(&mut slots, &narrow, &cell, &config, &mut scratch),
        Err(BrickError::DimensionMismatch { expected: IN_DIMS, actual: 2 })
    );

    let bad = BrickConfig::new(4, 6);
    assert_eq!(
        forward_bricked(&mut slots, &input, &cell, &bad, &mut scratch),
        Err(ConfigError::HopExceedsWindow { hop: 6, window: 4 }.into())
    );
}
