//! FastGRNN cells: full-rank and low-rank.
//!
//! Both share the same gated update:
//!
//! ```text
//! pre    = W x + U h                       (low-rank: W2 (W1 x) + U2 (U1 h))
//! gate   = σ(pre + b_g)
//! update = tanh(pre + b_h)
//! h'     = gate ⊙ h + (σ(ζ) (1 - gate) + σ(ν)) ⊙ update
//! ```
//!
//! Parameters are borrowed (`&'p [f32]`) so weights can stay in Flash
//! (`&'static`) on a microcontroller. `zeta`/`nu` are given raw and squashed
//! through σ once at construction.

use super::{check_advance_args, Direction, RecurrentCell};
use crate::error::{BrickError, BrickResult, ConfigError};
use crate::math::{mat_vec, sigmoid, tanh, v_add};

fn check_param(expected: usize, param: &[f32]) -> BrickResult<()> {
    if param.len() != expected {
        return Err(BrickError::DimensionMismatch { expected, actual: param.len() });
    }
    Ok(())
}

// =============================================================================
// Normalization
// =============================================================================

/// Per-feature standardization statistics: `x' = (x - mean) / std_dev`.
#[derive(Debug, Clone, Copy)]
pub struct Normalization<'p> {
    mean: &'p [f32],
    std_dev: &'p [f32],
}

impl<'p> Normalization<'p> {
    pub fn new(mean: &'p [f32], std_dev: &'p [f32]) -> BrickResult<Self> {
        check_param(mean.len(), std_dev)?;
        if mean.is_empty() {
            return Err(ConfigError::ZeroDims.into());
        }
        Ok(Self { mean, std_dev })
    }

    pub fn dims(&self) -> usize {
        self.mean.len()
    }

    /// Standardize one time step into `out`.
    pub fn apply(&self, x: &[f32], out: &mut [f32]) -> BrickResult<()> {
        v_add(1.0, x, -1.0, self.mean, out)?;
        for (val, &s) in out.iter_mut().zip(self.std_dev) {
            *val /= s;
        }
        Ok(())
    }
}

// =============================================================================
// Gate
// =============================================================================

/// The elementwise half of a FastGRNN step, shared by the cells and by the
/// batched brick path.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Gate<'p> {
    bias_gate: &'p [f32],
    bias_update: &'p [f32],
    sigmoid_zeta: f32,
    sigmoid_nu: f32,
}

impl<'p> Gate<'p> {
    fn new(bias_gate: &'p [f32], bias_update: &'p [f32], zeta: f32, nu: f32) -> Self {
        Self {
            bias_gate,
            bias_update,
            sigmoid_zeta: sigmoid(zeta),
            sigmoid_nu: sigmoid(nu),
        }
    }

    /// `hidden` and `pre` are one row of `hidden_dims` scalars each.
    #[inline]
    pub(crate) fn apply(&self, hidden: &mut [f32], pre: &[f32]) {
        for (((h, &p), &bg), &bh) in hidden
            .iter_mut()
            .zip(pre)
            .zip(self.bias_gate)
            .zip(self.bias_update)
        {
            let gate = sigmoid(p + bg);
            let update = tanh(p + bh);
            *h = gate * *h + (self.sigmoid_zeta * (1.0 - gate) + self.sigmoid_nu) * update;
        }
    }
}

/// Resolve the input for step `t`, normalizing into `norm` when asked to.
#[inline]
fn step_input<'s>(
    input: &'s [f32],
    in_dims: usize,
    t: usize,
    normalization: Option<&Normalization<'_>>,
    norm: &'s mut [f32],
) -> BrickResult<&'s [f32]> {
    let x = &input[t * in_dims..(t + 1) * in_dims];
    match normalization {
        Some(stats) => {
            stats.apply(x, norm)?;
            Ok(norm)
        }
        None => Ok(x),
    }
}

#[inline]
fn step_index(direction: Direction, i: usize, steps: usize) -> usize {
    match direction {
        Direction::Forward => i,
        Direction::Backward => steps - 1 - i,
    }
}

fn resolve_normalization<'a, 'p>(
    normalization: &'a Option<Normalization<'p>>,
    normalize: bool,
) -> BrickResult<Option<&'a Normalization<'p>>> {
    if !normalize {
        return Ok(None);
    }
    match normalization {
        Some(stats) => Ok(Some(stats)),
        None => Err(ConfigError::MissingNormalization.into()),
    }
}

// =============================================================================
// Low-rank FastGRNN
// =============================================================================

/// Borrowed parameter bundle for [`FastGrnnLr::new`].
///
/// Row-major layouts: `w1 [w_rank × in_dims]`, `w2 [hidden × w_rank]`,
/// `u1 [u_rank × hidden]`, `u2 [hidden × u_rank]`, biases `[hidden]`.
#[derive(Debug, Clone, Copy)]
pub struct FastGrnnLrParams<'p> {
    pub w1: &'p [f32],
    pub w2: &'p [f32],
    pub u1: &'p [f32],
    pub u2: &'p [f32],
    pub bias_gate: &'p [f32],
    pub bias_update: &'p [f32],
    pub zeta: f32,
    pub nu: f32,
    pub in_dims: usize,
    pub hidden: usize,
    pub w_rank: usize,
    pub u_rank: usize,
}

/// FastGRNN with both weight matrices factored into two low-rank maps.
#[derive(Debug, Clone, Copy)]
pub struct FastGrnnLr<'p> {
    w1: &'p [f32],
    w2: &'p [f32],
    u1: &'p [f32],
    u2: &'p [f32],
    gate: Gate<'p>,
    normalization: Option<Normalization<'p>>,
    in_dims: usize,
    hidden: usize,
    w_rank: usize,
    u_rank: usize,
}

impl<'p> FastGrnnLr<'p> {
    /// Validate shapes and build the cell. Fails fast, before any inference.
    pub fn new(params: FastGrnnLrParams<'p>) -> BrickResult<Self> {
        let FastGrnnLrParams { in_dims, hidden, w_rank, u_rank, .. } = params;
        if in_dims == 0 || hidden == 0 || w_rank == 0 || u_rank == 0 {
            return Err(ConfigError::ZeroDims.into());
        }
        check_param(w_rank * in_dims, params.w1)?;
        check_param(hidden * w_rank, params.w2)?;
        check_param(u_rank * hidden, params.u1)?;
        check_param(hidden * u_rank, params.u2)?;
        check_param(hidden, params.bias_gate)?;
        check_param(hidden, params.bias_update)?;

        Ok(Self {
            w1: params.w1,
            w2: params.w2,
            u1: params.u1,
            u2: params.u2,
            gate: Gate::new(params.bias_gate, params.bias_update, params.zeta, params.nu),
            normalization: None,
            in_dims,
            hidden,
            w_rank,
            u_rank,
        })
    }

    /// Attach per-feature normalization statistics.
    pub fn with_normalization(mut self, normalization: Normalization<'p>) -> BrickResult<Self> {
        check_param(self.in_dims, normalization.mean)?;
        self.normalization = Some(normalization);
        Ok(self)
    }

    pub fn w1(&self) -> &'p [f32] {
        self.w1
    }
    pub fn w2(&self) -> &'p [f32] {
        self.w2
    }
    pub fn u1(&self) -> &'p [f32] {
        self.u1
    }
    pub fn u2(&self) -> &'p [f32] {
        self.u2
    }
    pub fn w_rank(&self) -> usize {
        self.w_rank
    }
    pub fn u_rank(&self) -> usize {
        self.u_rank
    }
    pub fn normalization(&self) -> Option<&Normalization<'p>> {
        self.normalization.as_ref()
    }

    pub(crate) fn gate(&self) -> &Gate<'p> {
        &self.gate
    }
}

impl RecurrentCell for FastGrnnLr<'_> {
    fn name(&self) -> &'static str {
        "FastGRNN-LR"
    }

    fn input_dims(&self) -> usize {
        self.in_dims
    }

    fn hidden_dims(&self) -> usize {
        self.hidden
    }

    fn scratch_len(&self) -> usize {
        self.in_dims + self.w_rank + self.u_rank + self.hidden
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
        check_advance_args(self, hidden, input, steps, scratch)?;
        let normalization = resolve_normalization(&self.normalization, normalize)?;

        let (norm, rest) = scratch.split_at_mut(self.in_dims);
        let (tmp_w, rest) = rest.split_at_mut(self.w_rank);
        let (tmp_u, rest) = rest.split_at_mut(self.u_rank);
        let pre = &mut rest[..self.hidden];

        for i in 0..steps {
            let t = step_index(direction, i, steps);
            let x = step_input(input, self.in_dims, t, normalization, &mut *norm)?;

            // Input side: W2 (W1 x)
            mat_vec(self.w1, x, self.w_rank, self.in_dims, 0.0, 1.0, tmp_w)?;
            mat_vec(self.w2, tmp_w, self.hidden, self.w_rank, 0.0, 1.0, pre)?;
            // Hidden side: + U2 (U1 h)
            mat_vec(self.u1, hidden, self.u_rank, self.hidden, 0.0, 1.0, tmp_u)?;
            mat_vec(self.u2, tmp_u, self.hidden, self.u_rank, 1.0, 1.0, pre)?;

            self.gate.apply(hidden, pre);
        }
        Ok(())
    }
}

// =============================================================================
// Full-rank FastGRNN
// =============================================================================

/// Borrowed parameter bundle for [`FastGrnn::new`].
///
/// Row-major layouts: `w [hidden × in_dims]`, `u [hidden × hidden]`.
#[derive(Debug, Clone, Copy)]
pub struct FastGrnnParams<'p> {
    pub w: &'p [f32],
    pub u: &'p [f32],
    pub bias_gate: &'p [f32],
    pub bias_update: &'p [f32],
    pub zeta: f32,
    pub nu: f32,
    pub in_dims: usize,
    pub hidden: usize,
}

/// FastGRNN with dense weight matrices.
#[derive(Debug, Clone, Copy)]
pub struct FastGrnn<'p> {
    w: &'p [f32],
    u: &'p [f32],
    gate: Gate<'p>,
    normalization: Option<Normalization<'p>>,
    in_dims: usize,
    hidden: usize,
}

impl<'p> FastGrnn<'p> {
    pub fn new(params: FastGrnnParams<'p>) -> BrickResult<Self> {
        let FastGrnnParams { in_dims, hidden, .. } = params;
        if in_dims == 0 || hidden == 0 {
            return Err(ConfigError::ZeroDims.into());
        }
        check_param(hidden * in_dims, params.w)?;
        check_param(hidden * hidden, params.u)?;
        check_param(hidden, params.bias_gate)?;
        check_param(hidden, params.bias_update)?;

        Ok(Self {
            w: params.w,
            u: params.u,
            gate: Gate::new(params.bias_gate, params.bias_update, params.zeta, params.nu),
            normalization: None,
            in_dims,
            hidden,
        })
    }

    pub fn with_normalization(mut self, normalization: Normalization<'p>) -> BrickResult<Self> {
        check_param(self.in_dims, normalization.mean)?;
        self.normalization = Some(normalization);
        Ok(self)
    }
}

impl RecurrentCell for FastGrnn<'_> {
    fn name(&self) -> &'static str {
        "FastGRNN"
    }

    fn input_dims(&self) -> usize {
        self.in_dims
    }

    fn hidden_dims(&self) -> usize {
        self.hidden
    }

    fn scratch_len(&self) -> usize {
        self.in_dims + self.hidden
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
        check_advance_args(self, hidden, input, steps, scratch)?;
        let normalization = resolve_normalization(&self.normalization, normalize)?;

        let (norm, rest) = scratch.split_at_mut(self.in_dims);
        let pre = &mut rest[..self.hidden];

        for i in 0..steps {
            let t = step_index(direction, i, steps);
            let x = step_input(input, self.in_dims, t, normalization, &mut *norm)?;

            mat_vec(self.w, x, self.hidden, self.in_dims, 0.0, 1.0, pre)?;
            mat_vec(self.u, hidden, self.hidden, self.hidden, 1.0, 1.0, pre)?;

            self.gate.apply(hidden, pre);
        }
        Ok(())
    }
}
