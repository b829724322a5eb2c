//! Brick configuration and index arithmetic.
//!
//! All boundary math lives here so the forward, backward and batched
//! schedulers agree on exactly which steps each brick covers and which output
//! slot each sampled state lands in.
//!
//! ```text
//! in_time = 11, window = 6, hop = 2
//!
//! step:     0 1 2 3 4 5 6 7 8 9 10
//! brick 0:  [---------]
//! brick 1:      [---------]
//! brick 2:          [---------]
//! tail:                       .       (uncovered; see ForwardTail)
//! ```

use crate::error::{AlignmentError, BrickResult, ConfigError};

/// What the forward scheduler does with steps after the last full brick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ForwardTail {
    /// Leave them unconsumed. `out_time` follows the brick count exactly.
    #[default]
    Drop,
    /// Run one more, shorter brick over them and emit its final state in an
    /// extra trailing slot.
    PartialBrick,
}

/// Default tile edge for the tiled matmul in the batched path.
pub const DEFAULT_BLOCK_SIZE: usize = 100;

/// Per-direction bricking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BrickConfig {
    /// Steps per brick.
    pub window: usize,
    /// Steps between consecutive brick starts.
    pub hop: usize,
    /// Also sample every `hop`-th state inside the first (forward) or last
    /// (backward) brick.
    pub dense_sampling: bool,
    /// Ask the cell to standardize each input step.
    pub normalize: bool,
    /// Forward-only handling of uncovered trailing steps.
    pub tail: ForwardTail,
    /// Tile edge for the batched path's matrix products.
    pub block_size: usize,
}

impl BrickConfig {
    pub fn new(window: usize, hop: usize) -> Self {
        Self {
            window,
            hop,
            dense_sampling: false,
            normalize: false,
            tail: ForwardTail::Drop,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    pub fn with_dense_sampling(mut self, dense_sampling: bool) -> Self {
        self.dense_sampling = dense_sampling;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_tail(mut self, tail: ForwardTail) -> Self {
        self.tail = tail;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Reject configurations the engine cannot schedule.
    pub fn validate(&self) -> BrickResult<()> {
        if self.window == 0 {
            return Err(ConfigError::ZeroWindow.into());
        }
        if self.hop == 0 {
            return Err(ConfigError::ZeroHop.into());
        }
        if self.hop > self.window {
            return Err(ConfigError::HopExceedsWindow { hop: self.hop, window: self.window }.into());
        }
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize.into());
        }
        Ok(())
    }

    /// Brick layout of this configuration over an `in_time`-step sequence.
    pub fn layout(&self, in_time: usize) -> BrickResult<BrickLayout> {
        BrickLayout::new(in_time, self.window, self.hop)
    }
}

/// Brick boundaries over one sequence length.
///
/// When `in_time < window` the layout degenerates to a single short brick
/// spanning the whole sequence, written to one slot with no dense samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrickLayout {
    in_time: usize,
    window: usize,
    hop: usize,
    num_bricks: usize,
    brick_len: usize,
}

impl BrickLayout {
    pub fn new(in_time: usize, window: usize, hop: usize) -> BrickResult<Self> {
        if in_time == 0 {
            return Err(ConfigError::ZeroTime.into());
        }
        if window == 0 {
            return Err(ConfigError::ZeroWindow.into());
        }
        if hop == 0 {
            return Err(ConfigError::ZeroHop.into());
        }
        if hop > window {
            return Err(ConfigError::HopExceedsWindow { hop, window }.into());
        }

        let (num_bricks, brick_len) = if in_time >= window {
            ((in_time - window) / hop + 1, window)
        } else {
            (1, in_time)
        };
        Ok(Self { in_time, window, hop, num_bricks, brick_len })
    }

    pub fn in_time(&self) -> usize {
        self.in_time
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// `floor((in_time - window) / hop) + 1`, or 1 for a degenerate layout.
    pub fn num_bricks(&self) -> usize {
        self.num_bricks
    }

    /// Steps per full brick: `window`, or `in_time` when degenerate.
    pub fn brick_len(&self) -> usize {
        self.brick_len
    }

    /// Whether the sequence is shorter than one window.
    pub fn is_degenerate(&self) -> bool {
        self.in_time < self.window
    }

    /// First step of brick `i`.
    #[inline]
    pub fn brick_start(&self, i: usize) -> usize {
        i * self.hop
    }

    /// One past the last step any full brick covers.
    pub fn covered_end(&self) -> usize {
        self.brick_start(self.num_bricks - 1) + self.brick_len
    }

    /// Steps after the last full brick.
    pub fn tail_len(&self) -> usize {
        self.in_time - self.covered_end()
    }

    /// Dense samples the forward pass takes inside the first brick: one after
    /// every step `t` with `t % hop == 0`, i.e. `ceil(window / hop)`. A
    /// degenerate layout is never densely sampled.
    pub fn forward_dense_samples(&self, dense_sampling: bool) -> usize {
        if dense_sampling && !self.is_degenerate() {
            self.brick_len.div_ceil(self.hop)
        } else {
            0
        }
    }

    /// Whether the forward pass runs an extra partial brick over the tail.
    pub fn has_forward_tail(&self, tail: ForwardTail) -> bool {
        tail == ForwardTail::PartialBrick && self.tail_len() > 0
    }

    /// Slots the forward pass writes.
    pub fn forward_out_time(&self, config: &BrickConfig) -> usize {
        self.forward_dense_samples(config.dense_sampling)
            + self.num_bricks
            + usize::from(self.has_forward_tail(config.tail))
    }

    /// First step of the backward pass's final segment.
    pub fn backward_segment_start(&self) -> usize {
        self.brick_start(self.num_bricks - 1)
    }

    /// Length of the backward final segment: the last brick plus any uncovered
    /// trailing steps (which come first in reversed time).
    pub fn backward_segment_len(&self) -> usize {
        self.in_time - self.backward_segment_start()
    }

    /// Dense samples the backward pass takes inside its final segment:
    /// `floor(segment_len / hop)`, so the pass fills exactly
    /// `in_time / hop + 1` slots. A degenerate layout takes none.
    pub fn backward_dense_samples(&self, dense_sampling: bool) -> usize {
        if dense_sampling && !self.is_degenerate() {
            self.backward_segment_len() / self.hop
        } else {
            0
        }
    }

    /// Slots the backward pass writes: `in_time / hop + 1` with dense
    /// sampling, `num_bricks` without.
    pub fn backward_out_time(&self, config: &BrickConfig) -> usize {
        self.num_bricks + self.backward_dense_samples(config.dense_sampling)
    }

    /// `(gcd, lcm)` of window and hop. Every `lcm` steps the pattern of brick
    /// boundaries relative to the lockstep schedule repeats.
    pub fn lockstep_period(&self) -> (usize, usize) {
        let g = gcd(self.window, self.hop);
        (g, self.window / g * self.hop)
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Check that a pass writing one half of an interleaved buffer lands on the
/// same slot indices as its opposite direction would.
///
/// The window must fit the sequence, be a multiple of `hop` and tile it
/// exactly, with dense sampling on. Under these constraints both
/// `out_time`s equal `in_time / hop + 1`.
pub fn validate_aligned(in_time: usize, config: &BrickConfig) -> BrickResult<()> {
    let BrickConfig { window, hop, .. } = *config;
    if !config.dense_sampling {
        return Err(AlignmentError::SamplingDisabled.into());
    }
    if window > in_time {
        return Err(AlignmentError::WindowExceedsInput { window, in_time }.into());
    }
    if window % hop != 0 {
        return Err(AlignmentError::WindowNotMultipleOfHop { window, hop }.into());
    }
    if (in_time - window) % hop != 0 {
        return Err(AlignmentError::UncoveredSteps { in_time, window, hop }.into());
    }
    Ok(())
}

/// Check that a forward and a backward pass can share one interleaved output
/// buffer slot for slot: a common hop, and each direction aligned per
/// [`validate_aligned`].
pub fn validate_bidirectional(
    in_time: usize,
    forward: &BrickConfig,
    backward: &BrickConfig,
) -> BrickResult<()> {
    forward.validate()?;
    backward.validate()?;
    if in_time == 0 {
        return Err(ConfigError::ZeroTime.into());
    }
    if forward.hop != backward.hop {
        return Err(AlignmentError::HopMismatch { forward: forward.hop, backward: backward.hop }.into());
    }
    if !forward.dense_sampling || !backward.dense_sampling {
        return Err(AlignmentError::SamplingDisabled.into());
    }
    validate_aligned(in_time, forward)?;
    validate_aligned(in_time, backward)
}
