//! Borrowed, time-major input sequence.
//!
//! Memory layout: `in_time` feature vectors of `in_dims` scalars, contiguous,
//! step after step. The scheduler only ever reads it, so one `Sequence` can be
//! shared by a forward and a backward pass running at the same time.

use crate::error::{BrickError, BrickResult, ConfigError};

/// A read-only view over a caller-owned `[in_time × in_dims]` signal.
#[derive(Debug, Clone, Copy)]
pub struct Sequence<'a> {
    data: &'a [f32],
    in_time: usize,
    in_dims: usize,
}

impl<'a> Sequence<'a> {
    /// Wrap a flat time-major buffer.
    ///
    /// Fails if either dimension is zero or if `data.len() != in_time * in_dims`.
    pub fn new(data: &'a [f32], in_time: usize, in_dims: usize) -> BrickResult<Self> {
        if in_time == 0 {
            return Err(ConfigError::ZeroTime.into());
        }
        if in_dims == 0 {
            return Err(ConfigError::ZeroDims.into());
        }
        if data.len() != in_time * in_dims {
            return Err(BrickError::InvalidInputLength {
                expected: in_time * in_dims,
                actual: data.len(),
            });
        }
        Ok(Self { data, in_time, in_dims })
    }

    /// Number of time steps.
    #[inline(always)]
    pub fn in_time(&self) -> usize {
        self.in_time
    }

    /// Scalars per time step.
    #[inline(always)]
    pub fn in_dims(&self) -> usize {
        self.in_dims
    }

    /// The whole flat buffer.
    #[inline(always)]
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// `steps` consecutive time steps starting at `start`.
    ///
    /// Callers derive `start`/`steps` from a validated `BrickLayout`, which
    /// keeps the range inside the sequence.
    #[inline]
    pub(crate) fn steps(&self, start: usize, steps: usize) -> &'a [f32] {
        &self.data[start * self.in_dims..(start + steps) * self.in_dims]
    }

    /// A single time step.
    #[inline]
    pub(crate) fn step(&self, t: usize) -> &'a [f32] {
        self.steps(t, 1)
    }
}
