//! Shared fixtures: seeded random FastGRNN weights and signals, and tolerance
//! checks.

#![allow(dead_code)]

use nano_brick_core::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn uniform(rng: &mut StdRng, len: usize, scale: f32) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-scale..scale)).collect()
}

/// Owned low-rank FastGRNN parameters plus normalization statistics.
pub struct LrWeights {
    pub w1: Vec<f32>,
    pub w2: Vec<f32>,
    pub u1: Vec<f32>,
    pub u2: Vec<f32>,
    pub bias_gate: Vec<f32>,
    pub bias_update: Vec<f32>,
    pub mean: Vec<f32>,
    pub std_dev: Vec<f32>,
    pub zeta: f32,
    pub nu: f32,
    pub in_dims: usize,
    pub hidden: usize,
    pub w_rank: usize,
    pub u_rank: usize,
}

impl LrWeights {
    pub fn random(seed: u64, in_dims: usize, hidden: usize, w_rank: usize, u_rank: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            w1: uniform(&mut rng, w_rank * in_dims, 0.5),
            w2: uniform(&mut rng, hidden * w_rank, 0.5),
            u1: uniform(&mut rng, u_rank * hidden, 0.5),
            u2: uniform(&mut rng, hidden * u_rank, 0.5),
            bias_gate: uniform(&mut rng, hidden, 0.5),
            bias_update: uniform(&mut rng, hidden, 0.5),
            mean: uniform(&mut rng, in_dims, 0.2),
            std_dev: (0..in_dims).map(|_| rng.gen_range(0.5f32..1.5)).collect(),
            zeta: 1.0,
            nu: -4.0,
            in_dims,
            hidden,
            w_rank,
            u_rank,
        }
    }

    pub fn params(&self) -> FastGrnnLrParams<'_> {
        FastGrnnLrParams {
            w1: &self.w1,
            w2: &self.w2,
            u1: &self.u1,
            u2: &self.u2,
            bias_gate: &self.bias_gate,
            bias_update: &self.bias_update,
            zeta: self.zeta,
            nu: self.nu,
            in_dims: self.in_dims,
            hidden: self.hidden,
            w_rank: self.w_rank,
            u_rank: self.u_rank,
        }
    }

    pub fn cell(&self) -> FastGrnnLr<'_> {
        FastGrnnLr::new(self.params()).unwrap()
    }

    pub fn normalized_cell(&self) -> FastGrnnLr<'_> {
        let stats = Normalization::new(&self.mean, &self.std_dev).unwrap();
        self.cell().with_normalization(stats).unwrap()
    }
}

/// `in_time × in_dims` signal in `[-1, 1)`.
pub fn random_signal(seed: u64, in_time: usize, in_dims: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    uniform(&mut rng, in_time * in_dims, 1.0)
}

/// Reverse the order of `width`-scalar rows.
pub fn reverse_rows(data: &[f32], width: usize) -> Vec<f32> {
    data.chunks_exact(width).rev().flatten().copied().collect()
}

/// Elementwise `|a - b| <= tol * max(|b|, 1)`.
pub fn assert_close(actual: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (&a, &b)) in actual.iter().zip(expected).enumerate() {
        let bound = tol * b.abs().max(1.0);
        assert!((a - b).abs() <= bound, "index {}: {} vs {} (tol {})", i, a, b, bound);
    }
}

/// Run the sequential forward scheduler into a fresh buffer.
pub fn run_forward<C: RecurrentCell>(cell: &C, signal: &[f32], in_time: usize, config: &BrickConfig) -> (usize, Vec<f32>) {
    let input = Sequence::new(signal, in_time, cell.input_dims()).unwrap();
    let out_time = config.layout(in_time).unwrap().forward_out_time(config);
    let mut output = vec![0.0f32; out_time * cell.hidden_dims()];
    let mut scratch = vec![0.0f32; sequential_scratch_len(cell)];
    let mut slots = SlotWriter::unidirectional(&mut output, cell.hidden_dims()).unwrap();
    let written = forward_bricked(&mut slots, &input, cell, config, &mut scratch).unwrap();
    (written, output)
}

/// Run the sequential backward scheduler into a fresh buffer.
pub fn run_backward<C: RecurrentCell>(cell: &C, signal: &[f32], in_time: usize, config: &BrickConfig) -> (usize, Vec<f32>) {
    let input = Sequence::new(signal, in_time, cell.input_dims()).unwrap();
    let out_time = config.layout(in_time).unwrap().backward_out_time(config);
    let mut output = vec![0.0f32; out_time * cell.hidden_dims()];
    let mut scratch = vec![0.0f32; sequential_scratch_len(cell)];
    let mut slots = SlotWriter::unidirectional(&mut output, cell.hidden_dims()).unwrap();
    let written = backward_bricked(&mut slots, &input, cell, config, &mut scratch).unwrap();
    (written, output)
}

/// Run the batched forward path into a fresh buffer.
pub fn run_forward_batched(cell: &FastGrnnLr<'_>, signal: &[f32], in_time: usize, config: &BrickConfig) -> (usize, Vec<f32>) {
    let input = Sequence::new(signal, in_time, cell.input_dims()).unwrap();
    let out_time = config.layout(in_time).unwrap().forward_out_time(config);
    let mut output = vec![0.0f32; out_time * cell.hidden_dims()];
    let mut scratch = vec![0.0f32; batched_scratch_len(cell, in_time, config).unwrap()];
    let mut slots = SlotWriter::unidirectional(&mut output, cell.hidden_dims()).unwrap();
    let written = forward_bricked_batched(&mut slots, &input, cell, config, &mut scratch).unwrap();
    (written, output)
}

/// Run the batched backward path into a fresh buffer.
pub fn run_backward_batched(cell: &FastGrnnLr<'_>, signal: &[f32], in_time: usize, config: &BrickConfig) -> (usize, Vec<f32>) {
    let input = Sequence::new(signal, in_time, cell.input_dims()).unwrap();
    let out_time = config.layout(in_time).unwrap().backward_out_time(config);
    let mut output = vec![0.0f32; out_time * cell.hidden_dims()];
    let mut scratch = vec![0.0f32; batched_scratch_len(cell, in_time, config).unwrap()];
    let mut slots = SlotWriter::unidirectional(&mut output, cell.hidden_dims()).unwrap();
    let written = backward_bricked_batched(&mut slots, &input, cell, config, &mut scratch).unwrap();
    (written, output)
}

/// Hidden state after running `cell` from zero over `steps` steps starting at
/// `start`, in the given direction.
pub fn manual_state<C: RecurrentCell>(
    cell: &C,
    signal: &[f32],
    start: usize,
    steps: usize,
    direction: Direction,
) -> Vec<f32> {
    let in_dims = cell.input_dims();
    let mut hidden = vec![0.0f32; cell.hidden_dims()];
    let mut scratch = vec![0.0f32; cell.scratch_len()];
    cell.advance(
        &mut hidden,
        &signal[start * in_dims..(start + steps) * in_dims],
        steps,
        &mut scratch,
        direction,
        false,
    )
    .unwrap();
    hidden
}
