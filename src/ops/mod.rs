//! Differentiable operations. Each one computes its forward value with the
//! kernels in [`cpu_ops`] and registers itself in the tensor's graph; the
//! matching backward rule lives in [`cpu_backward`].

use ndarray::ArrayD;
use rand::Rng;

use crate::error::Error;
use crate::graph::{Graph, OpType};
use crate::tensor::Tensor;
use crate::util::normalize_axis;

pub mod cpu_backward;
pub mod cpu_ops;
pub mod loss;

pub use loss::{bce_loss, cross_entropy_loss, Target};

// --- Binary Operations (broadcasting) ---

/// Element-wise addition, NumPy broadcasting.
pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor, Error> {
    let output_data = cpu_ops::add(&a.data(), &b.data())?;
    Graph::register(OpType::Add, &[a, b], output_data)
}

/// Element-wise subtraction: a - b
pub fn sub(a: &Tensor, b: &Tensor) -> Result<Tensor, Error> {
    let output_data = cpu_ops::sub(&a.data(), &b.data())?;
    Graph::register(OpType::Sub, &[a, b], output_data)
}

/// Element-wise multiplication: a * b
pub fn mul(a: &Tensor, b: &Tensor) -> Result<Tensor, Error> {
    let output_data = cpu_ops::mul(&a.data(), &b.data())?;
    Graph::register(OpType::Mul, &[a, b], output_data)
}

/// Element-wise division: a / b
pub fn div(a: &Tensor, b: &Tensor) -> Result<Tensor, Error> {
    let output_data = cpu_ops::div(&a.data(), &b.data())?;
    Graph::register(OpType::Div, &[a, b], output_data)
}

/// Matrix product of two 2-D tensors.
pub fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor, Error> {
    let output_data = cpu_ops::matmul(&a.data(), &b.data())?;
    Graph::register(OpType::Matmul, &[a, b], output_data)
}

// --- Unary Operations ---

pub fn neg(x: &Tensor) -> Result<Tensor, Error> {
    let output_data = cpu_ops::neg(&x.data());
    Graph::register(OpType::Neg, &[x], output_data)
}

pub fn exp(x: &Tensor) -> Result<Tensor, Error> {
    let output_data = cpu_ops::exp(&x.data());
    Graph::register(OpType::Exp, &[x], output_data)
}

/// Natural logarithm. Not guarded: zeros produce `-inf`.
pub fn ln(x: &Tensor) -> Result<Tensor, Error> {
    let output_data = cpu_ops::ln(&x.data());
    Graph::register(OpType::Ln, &[x], output_data)
}

/// `log(1 + exp(x))` (softplus), stable for large `|x|`.
pub fn exp_log(x: &Tensor) -> Result<Tensor, Error> {
    let output_data = cpu_ops::exp_log(&x.data());
    Graph::register(OpType::ExpLog, &[x], output_data)
}

// --- Reductions ---

/// Sums along `axis` (negative counts from the end) or over all elements when
/// `axis` is `None`. With `keepdims` the reduced axes stay as size 1.
pub fn sum(x: &Tensor, axis: Option<isize>, keepdims: bool) -> Result<Tensor, Error> {
    let axis = axis
        .map(|axis| normalize_axis(axis, x.data().ndim()))
        .transpose()?;
    let output_data = cpu_ops::sum(&x.data(), axis, keepdims)?;
    Graph::register(OpType::Sum { axis, keepdims }, &[x], output_data)
}

/// Mean over all elements, as a scalar tensor.
pub fn mean(x: &Tensor) -> Result<Tensor, Error> {
    let output_data = cpu_ops::mean(&x.data())?;
    Graph::register(OpType::Mean, &[x], output_data)
}

// --- Activations ---

/// Sigmoid `1 / (1 + exp(-x))`. The backward rule works from the output
/// value; near saturation the gradient underflows to zero, which is accepted.
pub fn sigmoid(x: &Tensor) -> Result<Tensor, Error> {
    let output_data = cpu_ops::sigmoid(&x.data());
    Graph::register(OpType::Sigmoid, &[x], output_data)
}

/// ReLU `max(0, x)`. The gradient at exactly zero is zero.
pub fn relu(x: &Tensor) -> Result<Tensor, Error> {
    let output_data = cpu_ops::relu(&x.data());
    Graph::register(OpType::Relu, &[x], output_data)
}

/// Softmax over the last axis, built as `exp(x) / sum(exp(x), -1, keepdims)`.
///
/// No maximum is subtracted first: logits large enough to overflow `exp`
/// produce `inf`/NaN. Shift the input yourself if that can happen.
pub fn softmax(x: &Tensor) -> Result<Tensor, Error> {
    let e = exp(x)?;
    let total = sum(&e, Some(-1), true)?;
    div(&e, &total)
}

// --- Regularization ---

/// Inverted dropout.
///
/// * `p == 0.0` returns `x` itself and adds nothing to the graph.
/// * Otherwise `p` must lie in `(0, 1)`.
/// * In training mode surviving elements are scaled by `1 / (1 - p)`, so no
///   rescaling is needed at inference. The mask is drawn from `rng`.
/// * In inference mode the output equals the input (a node is still created).
pub fn dropout<R>(x: &Tensor, p: f32, training: bool, rng: &mut R) -> Result<Tensor, Error>
where
    R: Rng + ?Sized,
{
    if p == 0.0 {
        return Ok(x.clone());
    }
    if !(p > 0.0 && p < 1.0) {
        return Err(Error::InvalidDropProbability(p));
    }

    let (output_data, mask) = if training {
        let mask = cpu_ops::dropout_mask(&x.shape(), p, rng)?;
        debug_println!("dropout p={} kept {}/{}", p, mask.to_vec().iter().filter(|&&m| m > 0.0).count(), mask.size());
        (cpu_ops::mul(&x.data(), &mask)?, Some(mask))
    } else {
        (x.data().clone(), None)
    };
    Graph::register(OpType::Dropout { p, mask }, &[x], output_data)
}

// --- Lookup ---

/// Integer indices for [`embedding`], with their own shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indices {
    values: Vec<usize>,
    shape: Vec<usize>,
}

impl Indices {
    pub fn new(values: Vec<usize>, shape: &[usize]) -> Result<Self, Error> {
        if values.len() != shape.iter().product::<usize>() {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                actual: vec![values.len()],
            });
        }
        Ok(Self {
            values,
            shape: shape.to_vec(),
        })
    }

    pub fn values(&self) -> &[usize] {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

impl From<Vec<usize>> for Indices {
    fn from(values: Vec<usize>) -> Self {
        let shape = vec![values.len()];
        Self { values, shape }
    }
}

impl From<&[usize]> for Indices {
    fn from(values: &[usize]) -> Self {
        Self::from(values.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Indices {
    fn from(values: [usize; N]) -> Self {
        Self::from(values.to_vec())
    }
}

impl From<ArrayD<usize>> for Indices {
    fn from(array: ArrayD<usize>) -> Self {
        let shape = array.shape().to_vec();
        Self {
            values: array.iter().copied().collect(),
            shape,
        }
    }
}

/// Gathers rows of `table` along its first axis. The output has shape
/// `indices.shape ++ table.shape[1..]`. Indices are not differentiated; the
/// backward step scatter-adds into the table, so repeated indices accumulate.
pub fn embedding(table: &Tensor, indices: impl Into<Indices>) -> Result<Tensor, Error> {
    let indices = indices.into();
    let output_data = table.data().gather_rows(indices.values(), indices.shape())?;
    Graph::register(
        OpType::Embedding {
            indices: indices.values,
        },
        &[table],
        output_data,
    )
}

// --- Spatial Padding ---

/// Padding of the last two (height, width) axes, applied on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Padding {
    pub height: usize,
    pub width: usize,
}

impl Padding {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    fn as_pair(self) -> (usize, usize) {
        (self.height, self.width)
    }
}

impl From<usize> for Padding {
    fn from(padding: usize) -> Self {
        Self::new(padding, padding)
    }
}

impl From<(usize, usize)> for Padding {
    fn from((height, width): (usize, usize)) -> Self {
        Self::new(height, width)
    }
}

/// Zero-pads the last two axes. Needs at least two axes.
pub fn pad2d(x: &Tensor, padding: impl Into<Padding>) -> Result<Tensor, Error> {
    let padding = padding.into().as_pair();
    let output_data = x.data().pad2d(padding)?;
    Graph::register(OpType::Pad2d { padding }, &[x], output_data)
}

/// Removes padding added by [`pad2d`] with the same amounts.
pub fn unpad2d(x: &Tensor, padding: impl Into<Padding>) -> Result<Tensor, Error> {
    let padding = padding.into().as_pair();
    let output_data = x.data().unpad2d(padding)?;
    Graph::register(OpType::Unpad2d { padding }, &[x], output_data)
}
