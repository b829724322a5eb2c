//! Python bindings for nano-brick-core via PyO3.

use pyo3::prelude::*;
use pyo3::exceptions::PyValueError;

use nano_brick_core::{
    backward_bricked, backward_bricked_batched, batched_scratch_len, forward_bricked,
    forward_bricked_batched, sequential_scratch_len, BidirectionalBrickedRnn, BrickConfig,
    BrickError, FastGrnnLr, FastGrnnLrParams, ForwardTail, Normalization, Sequence, SlotWriter,
};

fn to_py_err(e: BrickError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn brick_config(window: usize, hop: usize, dense_sampling: bool, normalize: bool, partial_tail: bool) -> BrickConfig {
    let tail = if partial_tail { ForwardTail::PartialBrick } else { ForwardTail::Drop };
    BrickConfig::new(window, hop)
        .with_dense_sampling(dense_sampling)
        .with_normalize(normalize)
        .with_tail(tail)
}

/// Low-rank FastGRNN cell with owned parameters, run over bricked sequences.
#[pyclass(name = "FastGrnnLr")]
pub struct PyFastGrnnLr {
    w1: Vec<f32>,
    w2: Vec<f32>,
    u1: Vec<f32>,
    u2: Vec<f32>,
    bias_gate: Vec<f32>,
    bias_update: Vec<f32>,
    mean: Option<Vec<f32>>,
    std_dev: Option<Vec<f32>>,
    zeta: f32,
    nu: f32,
    in_dims: usize,
    hidden: usize,
    w_rank: usize,
    u_rank: usize,
}

impl PyFastGrnnLr {
    /// Borrow the owned parameters as a core cell.
    fn cell(&self) -> Result<FastGrnnLr<'_>, BrickError> {
        let cell = FastGrnnLr::new(FastGrnnLrParams {
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
        })?;
        match (&self.mean, &self.std_dev) {
            (Some(mean), Some(std_dev)) => cell.with_normalization(Normalization::new(mean, std_dev)?),
            _ => Ok(cell),
        }
    }

    fn run(&self, input: &[f32], in_time: usize, config: &BrickConfig, backward: bool, batched: bool) -> Result<Vec<f32>, BrickError> {
        let cell = self.cell()?;
        let layout = config.layout(in_time)?;
        let out_time = if backward { layout.backward_out_time(config) } else { layout.forward_out_time(config) };
        let sequence = Sequence::new(input, in_time, self.in_dims)?;

        let mut output = vec![0.0f32; out_time * self.hidden];
        let scratch_len = if batched { batched_scratch_len(&cell, in_time, config)? } else { sequential_scratch_len(&cell) };
        let mut scratch = vec![0.0f32; scratch_len];
        let mut slots = SlotWriter::unidirectional(&mut output, self.hidden)?;
        match (backward, batched) {
            (false, false) => forward_bricked(&mut slots, &sequence, &cell, config, &mut scratch)?,
            (false, true) => forward_bricked_batched(&mut slots, &sequence, &cell, config, &mut scratch)?,
            (true, false) => backward_bricked(&mut slots, &sequence, &cell, config, &mut scratch)?,
            (true, true) => backward_bricked_batched(&mut slots, &sequence, &cell, config, &mut scratch)?,
        };
        Ok(output)
    }
}

#[pymethods]
impl PyFastGrnnLr {
    #[new]
    #[pyo3(signature = (w1, w2, u1, u2, bias_gate, bias_update, zeta, nu, in_dims, hidden, w_rank, u_rank, mean=None, std_dev=None))]
    fn new(
        w1: Vec<f32>, w2: Vec<f32>, u1: Vec<f32>, u2: Vec<f32>,
        bias_gate: Vec<f32>, bias_update: Vec<f32>, zeta: f32, nu: f32,
        in_dims: usize, hidden: usize, w_rank: usize, u_rank: usize,
        mean: Option<Vec<f32>>, std_dev: Option<Vec<f32>>,
    ) -> PyResult<Self> {
        if mean.is_some() != std_dev.is_some() {
            return Err(PyValueError::new_err("mean and std_dev must be given together"));
        }
        let cell = Self { w1, w2, u1, u2, bias_gate, bias_update, mean, std_dev, zeta, nu, in_dims, hidden, w_rank, u_rank };
        cell.cell().map_err(to_py_err)?;
        Ok(cell)
    }

    #[getter]
    fn in_dims(&self) -> usize { self.in_dims }
    #[getter]
    fn hidden(&self) -> usize { self.hidden }

    /// Number of output slots of a forward (or backward) pass.
    #[pyo3(signature = (in_time, window, hop, dense_sampling=true, backward=false, partial_tail=false))]
    fn out_time(&self, in_time: usize, window: usize, hop: usize, dense_sampling: bool, backward: bool, partial_tail: bool) -> PyResult<usize> {
        let config = brick_config(window, hop, dense_sampling, false, partial_tail);
        config.validate().map_err(to_py_err)?;
        let layout = config.layout(in_time).map_err(to_py_err)?;
        Ok(if backward { layout.backward_out_time(&config) } else { layout.forward_out_time(&config) })
    }

    /// Forward bricked pass over a flat `in_time × in_dims` signal.
    #[pyo3(signature = (input, in_time, window, hop, dense_sampling=true, normalize=false, batched=false, partial_tail=false))]
    fn forward_bricked(&self, input: Vec<f32>, in_time: usize, window: usize, hop: usize, dense_sampling: bool, normalize: bool, batched: bool, partial_tail: bool) -> PyResult<Vec<f32>> {
        let config = brick_config(window, hop, dense_sampling, normalize, partial_tail);
        self.run(&input, in_time, &config, false, batched).map_err(to_py_err)
    }

    /// Backward bricked pass over a flat `in_time × in_dims` signal.
    #[pyo3(signature = (input, in_time, window, hop, dense_sampling=true, normalize=false, batched=false))]
    fn backward_bricked(&self, input: Vec<f32>, in_time: usize, window: usize, hop: usize, dense_sampling: bool, normalize: bool, batched: bool) -> PyResult<Vec<f32>> {
        let config = brick_config(window, hop, dense_sampling, normalize, false);
        self.run(&input, in_time, &config, true, batched).map_err(to_py_err)
    }
}

/// Bidirectional bricked pass: `out_time` slots of `[forward h | backward h]`.
#[pyfunction]
#[pyo3(signature = (forward, backward, input, in_time, forward_window, backward_window, hop, normalize=false, batched=false))]
fn bidirectional_bricked(
    forward: PyRef<'_, PyFastGrnnLr>, backward: PyRef<'_, PyFastGrnnLr>,
    input: Vec<f32>, in_time: usize, forward_window: usize, backward_window: usize, hop: usize,
    normalize: bool, batched: bool,
) -> PyResult<Vec<f32>> {
    let fwd_config = brick_config(forward_window, hop, true, normalize, false);
    let bwd_config = brick_config(backward_window, hop, true, normalize, false);
    let fwd_cell = forward.cell().map_err(to_py_err)?;
    let bwd_cell = backward.cell().map_err(to_py_err)?;
    let rnn = BidirectionalBrickedRnn::new(fwd_cell, bwd_cell, fwd_config, bwd_config).map_err(to_py_err)?;

    let sequence = Sequence::new(&input, in_time, rnn.input_dims()).map_err(to_py_err)?;
    let mut output = vec![0.0f32; rnn.output_len(in_time).map_err(to_py_err)?];
    let scratch_len = if batched {
        rnn.estimate_batched_scratch_len(in_time).map_err(to_py_err)?
    } else {
        rnn.estimate_scratch_len()
    };
    let mut scratch = vec![0.0f32; scratch_len];
    if batched {
        rnn.run_batched(&sequence, &mut output, &mut scratch).map_err(to_py_err)?;
    } else {
        rnn.run(&sequence, &mut output, &mut scratch).map_err(to_py_err)?;
    }
    Ok(output)
}

#[pymodule]
fn nano_brick_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyFastGrnnLr>()?;
    m.add_function(wrap_pyfunction!(bidirectional_bricked, m)?)?;
    Ok(())
}
