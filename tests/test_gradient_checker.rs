// tests/test_gradient_checker.rs
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_autograd_lib::test_utils::check_gradient;
use rust_autograd_lib::{ops, Array, Error, Reduction, Tensor};

const EPSILON: f32 = 1e-3;
const TOLERANCE: f32 = 2e-2;

fn array(data: Vec<f32>, shape: &[usize]) -> Array {
    Array::from_vec(data, shape).unwrap()
}

/// Deterministic, non-uniform weights so each output element gets a different
/// upstream gradient.
fn weights(shape: &[usize]) -> Array {
    let n: usize = shape.iter().product();
    let data = (0..n)
        .map(|i| ((i * 7 % 5) as f32 - 2.0) * 0.3 + 0.1)
        .collect();
    array(data, shape)
}

/// `sum(t * w)` with `w` a fixed leaf in `t`'s graph.
fn weighted_sum(t: &Tensor) -> Result<Tensor, Error> {
    let w = t.graph().tensor(weights(&t.shape()));
    ops::sum(&ops::mul(t, &w)?, None, false)
}

fn check_all(
    func: impl Fn(&[Tensor]) -> Result<Tensor, Error>,
    inputs: &[Array],
) -> Result<(), Error> {
    for idx in 0..inputs.len() {
        check_gradient(&func, inputs, idx, EPSILON, TOLERANCE)?;
    }
    Ok(())
}

#[test]
fn test_add_broadcast_gradient() -> Result<(), Error> {
    let inputs = [
        array(vec![0.1, -0.4, 0.7, 1.2, -0.3, 0.5], &[2, 3]),
        array(vec![0.2, -0.6, 0.9], &[3]),
    ];
    check_all(|t| weighted_sum(&ops::add(&t[0], &t[1])?), &inputs)
}

#[test]
fn test_sub_gradient() -> Result<(), Error> {
    let inputs = [
        array(vec![0.1, -0.4, 0.7, 1.2], &[2, 2]),
        array(vec![0.3, -0.2], &[2, 1]),
    ];
    check_all(|t| weighted_sum(&ops::sub(&t[0], &t[1])?), &inputs)
}

#[test]
fn test_mul_gradient() -> Result<(), Error> {
    let inputs = [
        array(vec![0.5, -1.5, 2.0, 0.8], &[4]),
        array(vec![1.1, 0.4, -0.7, 1.9], &[4]),
    ];
    check_all(|t| weighted_sum(&ops::mul(&t[0], &t[1])?), &inputs)
}

#[test]
fn test_div_gradient() -> Result<(), Error> {
    let inputs = [
        array(vec![0.5, -1.5, 2.0, 0.8], &[2, 2]),
        array(vec![1.5, 2.5], &[2]),
    ];
    check_all(|t| weighted_sum(&ops::div(&t[0], &t[1])?), &inputs)
}

#[test]
fn test_unary_gradients() -> Result<(), Error> {
    let inputs = [array(vec![0.3, -0.8, 1.1, -1.6, 0.9, 0.2], &[2, 3])];
    check_all(|t| weighted_sum(&ops::neg(&t[0])?), &inputs)?;
    check_all(|t| weighted_sum(&ops::exp(&t[0])?), &inputs)?;
    check_all(|t| weighted_sum(&ops::exp_log(&t[0])?), &inputs)?;
    check_all(|t| weighted_sum(&ops::sigmoid(&t[0])?), &inputs)?;
    // Inputs stay away from the kink at zero.
    check_all(|t| weighted_sum(&ops::relu(&t[0])?), &inputs)
}

#[test]
fn test_ln_gradient() -> Result<(), Error> {
    let inputs = [array(vec![0.5, 1.0, 2.5, 4.0], &[4])];
    check_all(|t| weighted_sum(&ops::ln(&t[0])?), &inputs)
}

#[test]
fn test_sum_axis_gradient() -> Result<(), Error> {
    let inputs = [array((0..24).map(|v| v as f32 * 0.1 - 1.0).collect(), &[2, 3, 4])];
    check_all(|t| weighted_sum(&ops::sum(&t[0], Some(1), false)?), &inputs)?;
    check_all(|t| weighted_sum(&ops::sum(&t[0], Some(-1), true)?), &inputs)?;
    check_all(|t| weighted_sum(&ops::sum(&t[0], None, true)?), &inputs)
}

#[test]
fn test_mean_gradient() -> Result<(), Error> {
    let inputs = [array(vec![0.3, -0.8, 1.1, -1.6, 0.9, 0.2], &[3, 2])];
    check_all(|t| ops::mean(&ops::exp(&t[0])?), &inputs)
}

#[test]
fn test_matmul_gradient() -> Result<(), Error> {
    let inputs = [
        array(vec![0.1, -0.2, 0.3, 0.4, 0.5, -0.6], &[2, 3]),
        array(vec![0.7, 0.8, -0.9, 1.0, 1.1, -1.2], &[3, 2]),
    ];
    check_all(|t| weighted_sum(&ops::matmul(&t[0], &t[1])?), &inputs)
}

#[test]
fn test_softmax_gradient() -> Result<(), Error> {
    let inputs = [array(vec![0.2, -0.5, 1.0, 0.3, 0.8, -1.1], &[2, 3])];
    check_all(|t| weighted_sum(&ops::softmax(&t[0])?), &inputs)
}

#[test]
fn test_dropout_gradient() -> Result<(), Error> {
    let inputs = [array((0..20).map(|v| v as f32 * 0.05 - 0.5).collect(), &[4, 5])];
    // Re-seeding inside the closure gives every evaluation the same mask.
    check_all(
        |t| {
            let mut rng = StdRng::seed_from_u64(3);
            weighted_sum(&ops::dropout(&t[0], 0.4, true, &mut rng)?)
        },
        &inputs,
    )
}

#[test]
fn test_embedding_gradient() -> Result<(), Error> {
    let inputs = [array((0..15).map(|v| v as f32 * 0.1).collect(), &[5, 3])];
    check_all(
        |t| weighted_sum(&ops::exp(&ops::embedding(&t[0], [4, 0, 4, 2])?)?),
        &inputs,
    )
}

#[test]
fn test_pad_gradients() -> Result<(), Error> {
    let inputs = [array((0..18).map(|v| v as f32 * 0.1 - 0.9).collect(), &[2, 3, 3])];
    check_all(|t| weighted_sum(&ops::pad2d(&t[0], (1, 2))?), &inputs)?;
    check_all(|t| weighted_sum(&ops::unpad2d(&t[0], 1)?), &inputs)
}

#[test]
fn test_bce_loss_gradient() -> Result<(), Error> {
    let inputs = [array(vec![0.5, -1.0, 2.0, -0.3, 0.1, 1.4], &[2, 3])];
    let target = array(vec![1.0, 0.0, 1.0, 1.0, 0.0, 0.0], &[2, 3]);
    check_all(
        |t| ops::bce_loss(&t[0], target.clone(), Reduction::Mean),
        &inputs,
    )?;
    check_all(
        |t| ops::bce_loss(&t[0], target.clone(), Reduction::Sum),
        &inputs,
    )
}

#[test]
fn test_cross_entropy_gradient() -> Result<(), Error> {
    let inputs = [array(vec![0.5, -1.0, 2.0, -0.3, 0.1, 1.4], &[2, 3])];
    let target = array(vec![0.0, 0.0, 1.0, 0.2, 0.3, 0.5], &[2, 3]);
    check_all(
        |t| ops::cross_entropy_loss(&t[0], target.clone(), Reduction::Sum),
        &inputs,
    )?;
    check_all(
        |t| ops::cross_entropy_loss(&t[0], target.clone(), Reduction::Mean),
        &inputs,
    )
}

#[test]
fn test_composed_network_gradient() -> Result<(), Error> {
    // logits = sigmoid(x @ w1) @ w2, then binary cross-entropy
    let inputs = [
        array(vec![0.2, -0.4, 0.9, 0.5, -0.1, 0.3], &[2, 3]),
        array(vec![0.3, -0.6, 0.8, 0.5, -0.2, 0.7], &[3, 2]),
        array(vec![0.4, -0.9], &[2, 1]),
    ];
    let target = array(vec![1.0, 0.0], &[2, 1]);
    check_all(
        |t| {
            let hidden = ops::sigmoid(&ops::matmul(&t[0], &t[1])?)?;
            let logits = ops::matmul(&hidden, &t[2])?;
            ops::bce_loss(&logits, target.clone(), Reduction::Mean)
        },
        &inputs,
    )
}

#[test]
fn test_checker_reports_wrong_gradient() {
    // A detached constant copy breaks the chain, so the analytical gradient is zero.
    let inputs = [array(vec![1.0, 2.0], &[2])];
    let result = check_gradient(
        |t: &[Tensor]| {
            let detached = t[0].data().clone();
            let copy = t[0].graph().tensor(detached);
            ops::sum(&ops::mul(&copy, &copy)?, None, false)
        },
        &inputs,
        0,
        EPSILON,
        TOLERANCE,
    );
    assert!(matches!(result, Err(Error::GradientCheckError { .. })));
}

#[test]
fn test_checker_rejects_bad_index() {
    let inputs = [array(vec![1.0], &[1])];
    let result = check_gradient(|t: &[Tensor]| ops::sum(&t[0], None, false), &inputs, 3, EPSILON, TOLERANCE);
    assert!(matches!(result, Err(Error::InvalidOperation(_))));
}
