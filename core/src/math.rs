//! Floating-point numeric primitives shared by every cell and by the batched
//! brick path.
//!
//! Transcendentals go through `libm` so the exact same arithmetic runs on a
//! bare-metal Cortex-M build and on the host test machine. All slice-taking
//! functions validate their lengths and return `BrickResult` instead of
//! indexing out of bounds.
//!
//! Summation order: every dot product accumulates left to right in a single
//! `f32`. The `unroll` feature only changes code generation, not the order.

use crate::error::{BrickError, BrickResult, ConfigError};

// =============================================================================
// Scalar Activations
// =============================================================================

/// Logistic sigmoid `1 / (1 + e^-x)`.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + libm::expf(-x))
}

/// Hyperbolic tangent.
#[inline]
pub fn tanh(x: f32) -> f32 {
    libm::tanhf(x)
}

// =============================================================================
// Elementwise Vector Operations
// =============================================================================

fn check_len(expected: usize, actual: usize) -> BrickResult<()> {
    if expected != actual {
        return Err(BrickError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Scaled vector addition: `ret = s1 * a + s2 * b`.
pub fn v_add(s1: f32, a: &[f32], s2: f32, b: &[f32], ret: &mut [f32]) -> BrickResult<()> {
    check_len(a.len(), b.len())?;
    check_len(a.len(), ret.len())?;
    for ((out, &x), &y) in ret.iter_mut().zip(a).zip(b) {
        *out = s1 * x + s2 * y;
    }
    Ok(())
}

/// Squared Euclidean distance between two vectors.
pub fn l2_squared(a: &[f32], b: &[f32]) -> BrickResult<f32> {
    check_len(a.len(), b.len())?;
    Ok(a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum())
}

/// Aggregate squared error normalized by the label energy:
/// `Σ (pred - label)² / Σ label²`.
///
/// This is the figure of merit used to compare a prediction buffer against a
/// reference output. Returns the raw squared error when the label is all zero.
pub fn relative_squared_error(pred: &[f32], label: &[f32]) -> BrickResult<f32> {
    let error = l2_squared(pred, label)?;
    let denom: f32 = label.iter().map(|x| x * x).sum();
    if denom == 0.0 {
        return Ok(error);
    }
    Ok(error / denom)
}

// =============================================================================
// Matrix Operations
// =============================================================================

/// Left-to-right dot product of two equally long slices.
#[cfg(not(feature = "unroll"))]
#[inline(always)]
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        sum += x * y;
    }
    sum
}

/// Left-to-right dot product, manually unrolled by four.
#[cfg(feature = "unroll")]
#[inline(always)]
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);
    let mut sum = 0.0f32;
    let chunks_a = a.chunks_exact(4);
    let chunks_b = b.chunks_exact(4);
    let (rem_a, rem_b) = (chunks_a.remainder(), chunks_b.remainder());
    for (ca, cb) in chunks_a.zip(chunks_b) {
        sum += ca[0] * cb[0];
        sum += ca[1] * cb[1];
        sum += ca[2] * cb[2];
        sum += ca[3] * cb[3];
    }
    for (x, y) in rem_a.iter().zip(rem_b) {
        sum += x * y;
    }
    sum
}

/// Scaled matrix-vector product: `ret = alpha * ret + beta * (M · v)`.
///
/// `mat` is row-major `[nrows × ncols]`, `vec` has `ncols` entries, `ret` has
/// `nrows`.
pub fn mat_vec(
    mat: &[f32],
    vec: &[f32],
    nrows: usize,
    ncols: usize,
    alpha: f32,
    beta: f32,
    ret: &mut [f32],
) -> BrickResult<()> {
    check_len(nrows * ncols, mat.len())?;
    check_len(ncols, vec.len())?;
    check_len(nrows, ret.len())?;

    for (row, out) in mat.chunks_exact(ncols.max(1)).zip(ret.iter_mut()) {
        let sum = if ncols == 0 { 0.0 } else { dot(row, vec) };
        *out = alpha * *out + beta * sum;
    }
    if ncols == 0 {
        for out in ret.iter_mut() {
            *out *= alpha;
        }
    }
    Ok(())
}

/// Naive scaled matrix product: `ret = alpha * ret + beta * (A · B)`.
///
/// `a` is `[nrows × ncommon]`, `b` is `[ncommon × ncols]`, both row-major.
/// Reference implementation for the tiled kernel below.
pub fn mat_mul(
    a: &[f32],
    b: &[f32],
    nrows: usize,
    ncommon: usize,
    ncols: usize,
    alpha: f32,
    beta: f32,
    ret: &mut [f32],
) -> BrickResult<()> {
    check_len(nrows * ncommon, a.len())?;
    check_len(ncommon * ncols, b.len())?;
    check_len(nrows * ncols, ret.len())?;

    for row in 0..nrows {
        for col in 0..ncols {
            let mut sum = 0.0f32;
            for k in 0..ncommon {
                sum += a[row * ncommon + k] * b[k * ncols + col];
            }
            let idx = row * ncols + col;
            ret[idx] = alpha * ret[idx] + beta * sum;
        }
    }
    Ok(())
}

/// Scalars a strided `[rows × cols]` view with row stride `stride` spans.
#[inline]
fn strided_len(rows: usize, cols: usize, stride: usize) -> usize {
    if rows == 0 {
        0
    } else {
        (rows - 1) * stride + cols
    }
}

/// Cache-blocked `ret += A · Bᵗ`.
///
/// - `a`: `nrows` rows of `ncommon` scalars, consecutive rows `stride_a` apart
/// - `b`: `ncols` rows of `ncommon` scalars, consecutive rows `stride_b` apart
///   (B is read transposed, so both operands stream along contiguous rows)
/// - `ret`: dense row-major `[nrows × ncols]`, **accumulated into**; zero it first
///   for a fresh product
///
/// Why tiling: rows, columns and the common dimension are walked in
/// `block_size` tiles so each tile's operands stay cache-resident. The block
/// size never changes the result beyond floating-point summation order.
pub fn tiled_mat_mul_transposed(
    a: &[f32],
    b: &[f32],
    nrows: usize,
    ncommon: usize,
    ncols: usize,
    stride_a: usize,
    stride_b: usize,
    ret: &mut [f32],
    block_size: usize,
) -> BrickResult<()> {
    if block_size == 0 {
        return Err(ConfigError::ZeroBlockSize.into());
    }
    if nrows > 1 && stride_a < ncommon {
        return Err(BrickError::DimensionMismatch { expected: ncommon, actual: stride_a });
    }
    if ncols > 1 && stride_b < ncommon {
        return Err(BrickError::DimensionMismatch { expected: ncommon, actual: stride_b });
    }
    let need_a = strided_len(nrows, ncommon, stride_a);
    if a.len() < need_a {
        return Err(BrickError::BufferTooSmall { required: need_a, available: a.len() });
    }
    let need_b = strided_len(ncols, ncommon, stride_b);
    if b.len() < need_b {
        return Err(BrickError::BufferTooSmall { required: need_b, available: b.len() });
    }
    if ret.len() < nrows * ncols {
        return Err(BrickError::BufferTooSmall { required: nrows * ncols, available: ret.len() });
    }

    for row in (0..nrows).step_by(block_size) {
        let row_end = (row + block_size).min(nrows);
        for col in (0..ncols).step_by(block_size) {
            let col_end = (col + block_size).min(ncols);
            for comm in (0..ncommon).step_by(block_size) {
                let comm_end = (comm + block_size).min(ncommon);
                for r in row..row_end {
                    let a_tile = &a[r * stride_a + comm..r * stride_a + comm_end];
                    let ret_tile = &mut ret[r * ncols + col..r * ncols + col_end];
                    for (c, out) in (col..col_end).zip(ret_tile.iter_mut()) {
                        let b_tile = &b[c * stride_b + comm..c * stride_b + comm_end];
                        *out += dot(a_tile, b_tile);
                    }
                }
            }
        }
    }
    Ok(())
}
