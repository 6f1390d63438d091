//! Forward kernels over [`Array`]. These never touch the graph.

use crate::array::Array;
use crate::error::Error;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution};

pub fn add(a: &Array, b: &Array) -> Result<Array, Error> {
    a.add(b)
}

pub fn sub(a: &Array, b: &Array) -> Result<Array, Error> {
    a.sub(b)
}

pub fn mul(a: &Array, b: &Array) -> Result<Array, Error> {
    a.mul(b)
}

pub fn div(a: &Array, b: &Array) -> Result<Array, Error> {
    a.div(b)
}

pub fn neg(a: &Array) -> Array {
    a.mapv(|x| -x)
}

pub fn exp(a: &Array) -> Array {
    a.mapv(f32::exp)
}

/// Natural logarithm. `ln(0)` is `-inf` and negative inputs give NaN.
pub fn ln(a: &Array) -> Array {
    a.mapv(f32::ln)
}

/// `log(1 + exp(x))` rewritten as `max(x, 0) + log1p(exp(-|x|))` so large
/// magnitudes neither overflow nor lose the linear tail.
pub fn exp_log(a: &Array) -> Array {
    a.mapv(|x| x.max(0.0) + (-x.abs()).exp().ln_1p())
}

/// Sigmoid activation function
pub fn sigmoid(a: &Array) -> Array {
    a.mapv(|x| 1.0 / (1.0 + (-x).exp()))
}

/// ReLU activation function
pub fn relu(a: &Array) -> Array {
    a.mapv(|x| x.max(0.0))
}

pub fn sum(a: &Array, axis: Option<usize>, keepdims: bool) -> Result<Array, Error> {
    match axis {
        Some(axis) => a.sum_along_axis(axis, keepdims),
        None if keepdims => Ok(Array::from_elem(&vec![1; a.ndim()], a.sum_all())),
        None => Ok(Array::scalar(a.sum_all())),
    }
}

/// Mean over every element, as a scalar.
pub fn mean(a: &Array) -> Result<Array, Error> {
    if a.is_empty() {
        return Err(Error::EmptyTensor);
    }
    Ok(Array::scalar(a.sum_all() / a.size() as f32))
}

/// Matrix multiplication of two 2-D arrays
pub fn matmul(a: &Array, b: &Array) -> Result<Array, Error> {
    a.matmul(b)
}

/// Inverted-dropout mask: each element is `1 / (1 - p)` with probability
/// `1 - p` and `0` otherwise, so the mask has expectation 1.
pub fn dropout_mask<R>(shape: &[usize], p: f32, rng: &mut R) -> Result<Array, Error>
where
    R: Rng + ?Sized,
{
    if !(p > 0.0 && p < 1.0) {
        return Err(Error::InvalidDropProbability(p));
    }
    let keep = Bernoulli::new(1.0 - p as f64).map_err(|_| Error::InvalidDropProbability(p))?;
    let scale = 1.0 / (1.0 - p);
    let size = shape.iter().product::<usize>();
    let mut data = Vec::with_capacity(size);
    for _ in 0..size {
        let kept: bool = keep.sample(&mut *rng);
        data.push(if kept { scale } else { 0.0 });
    }
    Array::from_vec(data, shape)
}
