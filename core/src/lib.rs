//! # nano-brick-core: Bricked Recurrent Inference
//!
//! A `no_std` Rust library for running recurrent cells over long time series
//! on microcontrollers (ESP32, STM32, Cortex-M) and on the host.
//!
//! ## Architecture
//!
//! - **Bricks**: the sequence is cut into overlapping `window`-step bricks,
//!   `hop` steps apart, each run from a fresh hidden state
//! - **Cell capability**: the scheduler only sees [`RecurrentCell`]
//! - **Bidirectional**: forward and backward passes write interleaved halves
//!   of one buffer, no concatenation pass
//! - **Batched path**: FastGRNN-LR bricks in lockstep through tiled matmuls
//! - **Arena Allocator**: zero-heap scratch via `&mut [f32]`
//!
//! ## Usage
//!
//! ```ignore
//! use nano_brick_core::*;
//!
//! let cell = FastGrnnLr::new(FastGrnnLrParams {
//!     w1: W1, w2: W2, u1: U1, u2: U2,
//!     bias_gate: BG, bias_update: BH,
//!     zeta: 1.0, nu: -4.0,
//!     in_dims: 4, hidden: 8, w_rank: 2, u_rank: 4,
//! })?;
//! let config = BrickConfig::new(60, 3).with_dense_sampling(true);
//!
//! let input = Sequence::new(&signal, 100, 4)?;
//! let out_time = config.layout(100)?.forward_out_time(&config);
//!
//! let mut output = [0.0f32; 34 * 8];
//! let mut scratch = [0.0f32; 64];
//! let mut slots = SlotWriter::unidirectional(&mut output, 8)?;
//! forward_bricked(&mut slots, &input, &cell, &config, &mut scratch)?;
//! ```

// Why #![no_std]: Compiles for bare-metal MCU targets.
#![no_std]

#[cfg(feature = "std")]
extern crate std;

pub mod arena;
pub mod bricked;
pub mod cell;
pub mod error;
pub mod math;
pub mod sequence;

// Re-export primary types
pub use arena::Arena;
pub use bricked::{
    backward_bricked, backward_bricked_batched, batched_scratch_len, forward_bricked,
    forward_bricked_batched, sequential_scratch_len, validate_aligned, validate_bidirectional,
    BidirectionalBrickedRnn, BrickConfig, BrickLayout, ForwardTail, SlotWriter,
    DEFAULT_BLOCK_SIZE,
};
pub use cell::{Direction, FastGrnn, FastGrnnLr, FastGrnnLrParams, FastGrnnParams, Normalization, RecurrentCell};
pub use error::{AlignmentError, BrickError, BrickResult, ConfigError};
pub use math::{
    mat_mul, mat_vec, relative_squared_error, sigmoid, tanh, tiled_mat_mul_transposed,
};
pub use sequence::Sequence;
