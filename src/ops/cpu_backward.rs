// src/ops/cpu_backward.rs
//! Backward kernels: given the parents' data, the output data and the output's
//! accumulated gradient, compute each parent's gradient contribution.

use crate::array::Array;
use crate::error::Error;
use crate::graph::OpType;
use ndarray::Axis;

use super::cpu_ops;

/// Dispatches to the backward rule of `op_type`. Returns one contribution per
/// parent, each already reduced to that parent's shape.
pub(crate) fn backward(
    op_type: &OpType,
    parents: &[&Array],
    out: &Array,
    out_grad: &Array,
) -> Result<Vec<Array>, Error> {
    if parents.len() != op_type.arity() {
        return Err(Error::InternalLogicError(format!(
            "{} backward expected {} inputs, found {}",
            op_type,
            op_type.arity(),
            parents.len()
        )));
    }

    match op_type {
        OpType::Add => binary_backward(parents, out_grad.clone(), out_grad.clone()),
        OpType::Sub => binary_backward(parents, out_grad.clone(), cpu_ops::neg(out_grad)),
        OpType::Mul => {
            let (a, b) = (parents[0], parents[1]);
            binary_backward(parents, out_grad.mul(b)?, out_grad.mul(a)?)
        }
        OpType::Div => {
            // d(a/b)/db = -a / b^2
            let (a, b) = (parents[0], parents[1]);
            let grad_a = out_grad.div(b)?;
            let grad_b = out_grad.mul(a)?.zip_with(b, "div_backward", |ga, bv| -ga / (bv * bv))?;
            binary_backward(parents, grad_a, grad_b)
        }
        OpType::Neg => Ok(vec![cpu_ops::neg(out_grad)]),
        OpType::Exp => Ok(vec![out_grad.mul(out)?]),
        OpType::Ln => Ok(vec![out_grad.div(parents[0])?]),
        OpType::ExpLog => Ok(vec![out_grad.mul(&cpu_ops::sigmoid(parents[0]))?]),
        OpType::Sum { axis, keepdims } => {
            let input_shape = parents[0].shape();
            let grad = match (axis, keepdims) {
                (Some(axis), false) => {
                    // Re-insert the reduced axis so the gradient broadcasts back.
                    let expanded = out_grad.get_data().clone().insert_axis(Axis(*axis));
                    Array::new(expanded).broadcast_to(input_shape)?
                }
                _ => out_grad.broadcast_to(input_shape)?,
            };
            Ok(vec![grad])
        }
        OpType::Mean => {
            let input = parents[0];
            let scale = 1.0 / input.size() as f32;
            Ok(vec![out_grad.broadcast_to(input.shape())?.mapv(|g| g * scale)])
        }
        OpType::Matmul => {
            // grad_a = grad_output @ b.T, grad_b = a.T @ grad_output
            let (a, b) = (parents[0], parents[1]);
            let grad_a = out_grad.matmul(&b.transpose_2d()?)?;
            let grad_b = a.transpose_2d()?.matmul(out_grad)?;
            Ok(vec![grad_a, grad_b])
        }
        OpType::Sigmoid => {
            // Uses the stored output; 1 - out may underflow to 0 near saturation.
            let derivative = out.mapv(|y| y * (1.0 - y));
            Ok(vec![out_grad.mul(&derivative)?])
        }
        OpType::Relu => {
            let grad = out_grad.zip_with(out, "relu_backward", |g, y| if y > 0.0 { g } else { 0.0 })?;
            Ok(vec![grad])
        }
        OpType::Dropout { mask, .. } => match mask {
            Some(mask) => Ok(vec![out_grad.mul(mask)?]),
            None => Ok(vec![out_grad.clone()]),
        },
        OpType::Embedding { indices } => {
            let mut grad_table = Array::zeros(parents[0].shape());
            grad_table.scatter_add_rows(indices, out_grad)?;
            Ok(vec![grad_table])
        }
        OpType::Pad2d { padding } => Ok(vec![out_grad.unpad2d(*padding)?]),
        OpType::Unpad2d { padding } => Ok(vec![out_grad.pad2d(*padding)?]),
    }
}

/// Reduces broadcast gradients of a binary op back to each operand's shape.
fn binary_backward(parents: &[&Array], grad_a: Array, grad_b: Array) -> Result<Vec<Array>, Error> {
    Ok(vec![
        grad_a.sum_to_shape(parents[0].shape())?,
        grad_b.sum_to_shape(parents[1].shape())?,
    ])
}
