use crate::{Array, Error, Graph, Tensor};

/// Checks the gradient of a function with respect to one of its inputs.
///
/// `func` receives the inputs as leaves of a fresh [`Graph`] and must return a
/// single-element tensor. The analytical gradient comes from one backward
/// pass; the numerical one from central differences, one graph per
/// evaluation.
///
/// # Arguments
/// * `func`: Builds the loss from the input tensors.
/// * `inputs`: Input values.
/// * `input_idx_to_check`: Index in `inputs` of the input to check.
/// * `epsilon`: Finite-difference step (e.g., 1e-3 for `f32`).
/// * `tolerance`: The maximum allowed relative (or, near zero, absolute) error.
pub fn check_gradient<F>(
    func: F,
    inputs: &[Array],
    input_idx_to_check: usize,
    epsilon: f32,
    tolerance: f32,
) -> Result<(), Error>
where
    F: Fn(&[Tensor]) -> Result<Tensor, Error>,
{
    if input_idx_to_check >= inputs.len() {
        return Err(Error::InvalidOperation(format!(
            "input_idx_to_check ({}) is out of bounds for inputs slice (len {})",
            input_idx_to_check,
            inputs.len()
        )));
    }

    let analytical = compute_analytical_gradient(&func, inputs, input_idx_to_check)?;
    let numerical = compute_numerical_gradient(&func, inputs, input_idx_to_check, epsilon)?;
    compare_gradients(&analytical, &numerical, tolerance)
}

fn evaluate<F>(func: &F, inputs: &[Array]) -> Result<(Tensor, Vec<Tensor>), Error>
where
    F: Fn(&[Tensor]) -> Result<Tensor, Error>,
{
    let graph = Graph::new();
    let leaves: Vec<Tensor> = inputs
        .iter()
        .enumerate()
        .map(|(i, data)| graph.tensor_named(data.clone(), &format!("input{}", i)))
        .collect();
    let loss = func(&leaves)?;
    if loss.size() != 1 {
        return Err(Error::InvalidOperation(format!(
            "Function must return a scalar tensor for gradient checking, got shape {:?}",
            loss.shape()
        )));
    }
    Ok((loss, leaves))
}

fn compute_analytical_gradient<F>(
    func: &F,
    inputs: &[Array],
    input_idx_to_check: usize,
) -> Result<Vec<f32>, Error>
where
    F: Fn(&[Tensor]) -> Result<Tensor, Error>,
{
    let (loss, leaves) = evaluate(func, inputs)?;
    loss.backward()?;
    let grad = leaves[input_idx_to_check].grad().to_vec();
    Ok(grad)
}

fn compute_numerical_gradient<F>(
    func: &F,
    inputs: &[Array],
    input_idx_to_check: usize,
    epsilon: f32,
) -> Result<Vec<f32>, Error>
where
    F: Fn(&[Tensor]) -> Result<Tensor, Error>,
{
    let target = &inputs[input_idx_to_check];
    let original = target.to_vec();
    let mut numerical = vec![0.0; original.len()];
    let mut perturbed_inputs = inputs.to_vec();

    for (i, slot) in numerical.iter_mut().enumerate() {
        let mut plus = original.clone();
        plus[i] += epsilon;
        perturbed_inputs[input_idx_to_check] = Array::from_vec(plus, target.shape())?;
        let loss_plus = evaluate(func, &perturbed_inputs)?.0.item()?;

        let mut minus = original.clone();
        minus[i] -= epsilon;
        perturbed_inputs[input_idx_to_check] = Array::from_vec(minus, target.shape())?;
        let loss_minus = evaluate(func, &perturbed_inputs)?.0.item()?;

        // Central difference formula
        *slot = (loss_plus - loss_minus) / (2.0 * epsilon);
    }

    Ok(numerical)
}

fn compare_gradients(analytical: &[f32], numerical: &[f32], tolerance: f32) -> Result<(), Error> {
    if analytical.len() != numerical.len() {
        return Err(Error::InternalLogicError(format!(
            "Gradient size mismatch: analytical size={}, numerical size={}",
            analytical.len(),
            numerical.len()
        )));
    }

    let mut max_rel_err = 0.0;
    let mut max_abs_err = 0.0;
    let mut max_err_idx = 0;

    for (i, (a, n)) in analytical.iter().zip(numerical.iter()).enumerate() {
        let abs_err = (a - n).abs();
        let rel_err = if a.abs() > 1e-3 && n.abs() > 1e-3 {
            abs_err / a.abs().max(n.abs())
        } else {
            abs_err
        };

        if rel_err > max_rel_err {
            max_rel_err = rel_err;
            max_abs_err = abs_err;
            max_err_idx = i;
        }
    }

    if max_rel_err <= tolerance {
        Ok(())
    } else {
        Err(Error::GradientCheckError {
            analytical: analytical.to_vec(),
            numerical: numerical.to_vec(),
            max_rel_error: max_rel_err,
            max_abs_error: max_abs_err,
            at_index: max_err_idx,
        })
    }
}

pub fn assert_array_close(a: &Array, b: &Array, tol: f32) {
    assert_eq!(a.shape(), b.shape(), "Array shapes don't match");
    for (i, (a_val, b_val)) in a.to_vec().iter().zip(b.to_vec().iter()).enumerate() {
        assert!(
            (a_val - b_val).abs() < tol,
            "Values at index {i} aren't close enough: a={a_val}, b={b_val}, diff={}, tol={tol}",
            (a_val - b_val).abs()
        );
    }
}
