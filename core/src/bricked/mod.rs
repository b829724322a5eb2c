//! # Bricked Recurrence
//!
//! A long sequence is cut into overlapping bricks of `window` steps that start
//! every `hop` steps. Each brick is run from a zero hidden state, so the work
//! per brick is bounded and bricks never depend on each other.
//!
//! | Module | Role |
//! |--------|------|
//! | [`layout`] | Configuration, brick boundaries, `out_time` |
//! | [`output`] | Strided slot writers, bidirectional split |
//! | [`sequential`] | Forward/backward schedulers over any [`RecurrentCell`](crate::cell::RecurrentCell) |
//! | [`batched`] | All bricks in lockstep via tiled matmuls (FastGRNN-LR) |
//! | [`bidirectional`] | Forward + backward into one interleaved buffer |

pub mod batched;
pub mod bidirectional;
pub mod layout;
pub mod output;
pub mod sequential;

pub use batched::{backward_bricked_batched, batched_scratch_len, forward_bricked_batched};
pub use bidirectional::BidirectionalBrickedRnn;
pub use layout::{validate_aligned, validate_bidirectional, BrickConfig, BrickLayout, ForwardTail, DEFAULT_BLOCK_SIZE};
pub use output::SlotWriter;
pub use sequential::{backward_bricked, forward_bricked, sequential_scratch_len};
