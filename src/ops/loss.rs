//! Loss functions composed from the primitive operations.

use ndarray::ArrayD;

use crate::array::Array;
use crate::error::{Error, Reduction};
use crate::tensor::Tensor;

use super::{add, exp_log, ln, mean, mul, neg, softmax, sub, sum};

/// A loss target: either a tensor already in the graph or raw data that is
/// turned into a leaf of the logits' graph.
#[derive(Debug, Clone)]
pub enum Target {
    Tensor(Tensor),
    Data(Array),
}

impl Target {
    fn into_tensor(self, logits: &Tensor) -> Tensor {
        match self {
            Target::Tensor(tensor) => tensor,
            Target::Data(data) => logits.graph().tensor_named(data, "target"),
        }
    }
}

impl From<Tensor> for Target {
    fn from(tensor: Tensor) -> Self {
        Target::Tensor(tensor)
    }
}

impl From<&Tensor> for Target {
    fn from(tensor: &Tensor) -> Self {
        Target::Tensor(tensor.clone())
    }
}

impl From<Array> for Target {
    fn from(data: Array) -> Self {
        Target::Data(data)
    }
}

impl From<ArrayD<f32>> for Target {
    fn from(data: ArrayD<f32>) -> Self {
        Target::Data(Array::new(data))
    }
}

fn reduce(loss: &Tensor, reduction: Reduction) -> Result<Tensor, Error> {
    match reduction {
        Reduction::Mean => mean(loss),
        Reduction::Sum => sum(loss, None, false),
    }
}

/// Binary cross-entropy on raw logits.
///
/// Computed as `logits - logits * target + log(1 + exp(-logits))`, which never
/// evaluates `log(sigmoid(x))` and stays finite for large-magnitude logits.
pub fn bce_loss(
    logits: &Tensor,
    target: impl Into<Target>,
    reduction: Reduction,
) -> Result<Tensor, Error> {
    let target = target.into().into_tensor(logits);
    let logits_times_target = mul(logits, &target)?;
    let softplus_neg = exp_log(&neg(logits)?)?;
    let loss = add(&sub(logits, &logits_times_target)?, &softplus_neg)?;
    reduce(&loss, reduction)
}

/// Categorical cross-entropy of `softmax(logits)` (last axis) against a
/// probability `target`: `-target * ln(softmax(logits))`, then reduced over
/// every element.
///
/// The logarithm is not guarded: a softmax probability that underflows to
/// zero yields `inf`/NaN in the loss.
pub fn cross_entropy_loss(
    logits: &Tensor,
    target: impl Into<Target>,
    reduction: Reduction,
) -> Result<Tensor, Error> {
    let target = target.into().into_tensor(logits);
    let log_probs = ln(&softmax(logits)?)?;
    let loss = mul(&neg(&target)?, &log_probs)?;
    reduce(&loss, reduction)
}
