//! Error types for the nano-brick-core library.
//!
//! Every scheduling entry point returns `BrickResult<T>` instead of panicking:
//! on a microcontroller a panic halts the whole device. All errors are fatal to
//! the current call; nothing here is retried.

use thiserror::Error;

/// All possible error conditions in the nano-brick-core library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BrickError {
    #[error("buffer too small: {required} scalars required, {available} available")]
    BufferTooSmall {
        required: usize,
        available: usize,
    },
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
    },
    #[error("scratch arena exhausted: requested {requested}, {remaining} remaining")]
    ArenaExhausted {
        requested: usize,
        remaining: usize,
    },
    #[error("invalid input length: expected {expected}, got {actual}")]
    InvalidInputLength {
        expected: usize,
        actual: usize,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("unsupported bidirectional configuration: {0}")]
    UnsupportedAlignment(#[from] AlignmentError),
    #[error("recurrent cell failed with code {code}")]
    CellFailure {
        code: i32,
    },
}

/// Configuration rejected before any scheduling starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("window must be at least one time step")]
    ZeroWindow,
    #[error("hop must be at least one time step")]
    ZeroHop,
    #[error("hop {hop} exceeds window {window}; bricks would leave gaps")]
    HopExceedsWindow { hop: usize, window: usize },
    #[error("sequence has no time steps")]
    ZeroTime,
    #[error("feature and hidden dimensions must be non-zero")]
    ZeroDims,
    #[error("tiled matmul block size must be at least one")]
    ZeroBlockSize,
    #[error("normalization requested but the cell has no mean/std statistics")]
    MissingNormalization,
}

/// A forward/backward pair that cannot share one interleaved output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("window {window} exceeds the {in_time}-step input")]
    WindowExceedsInput { window: usize, in_time: usize },
    #[error("forward hop {forward} differs from backward hop {backward}")]
    HopMismatch { forward: usize, backward: usize },
    #[error("window {window} is not a multiple of hop {hop}")]
    WindowNotMultipleOfHop { window: usize, hop: usize },
    #[error("{in_time} steps minus window {window} is not a multiple of hop {hop}")]
    UncoveredSteps {
        in_time: usize,
        window: usize,
        hop: usize,
    },
    #[error("dense brick sampling must be enabled on both directions")]
    SamplingDisabled,
}

pub type BrickResult<T> = Result<T, BrickError>;
