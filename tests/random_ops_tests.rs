use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_autograd_lib::{ops, Error, Graph, OpType};

#[test]
fn test_dropout_preserves_expectation() -> Result<(), Error> {
    let mut rng = StdRng::seed_from_u64(42);
    let graph = Graph::new();
    let x = graph.ones(&[1000]);

    let trials = 20;
    let mut total = 0.0;
    for _ in 0..trials {
        let y = ops::dropout(&x, 0.3, true, &mut rng)?;
        total += y.data().sum_all() / 1000.0;
    }
    assert_abs_diff_eq!(total / trials as f32, 1.0, epsilon = 0.05);
    Ok(())
}

#[test]
fn test_dropout_values_are_zero_or_scaled() -> Result<(), Error> {
    let mut rng = StdRng::seed_from_u64(7);
    let graph = Graph::new();
    let x = graph.ones(&[4, 25]);
    let y = ops::dropout(&x, 0.5, true, &mut rng)?;

    let values = y.data().to_vec();
    assert!(values
        .iter()
        .all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
    assert!(values.iter().any(|&v| v == 0.0));
    assert!(values.iter().any(|&v| v > 0.0));
    Ok(())
}

#[test]
fn test_dropout_is_reproducible_with_seed() -> Result<(), Error> {
    let graph = Graph::new();
    let x = graph.from_vec((0..50).map(|v| v as f32).collect(), &[5, 10])?;

    let a = ops::dropout(&x, 0.25, true, &mut StdRng::seed_from_u64(11))?;
    let b = ops::dropout(&x, 0.25, true, &mut StdRng::seed_from_u64(11))?;
    assert_eq!(a.data().to_vec(), b.data().to_vec());
    Ok(())
}

#[test]
fn test_dropout_zero_probability_returns_input() -> Result<(), Error> {
    let mut rng = StdRng::seed_from_u64(0);
    let graph = Graph::new();
    let x = graph.from_vec(vec![1.0, 2.0, 3.0], &[3])?;
    let ops_before = graph.op_count();

    let y = ops::dropout(&x, 0.0, true, &mut rng)?;
    assert_eq!(y, x);
    assert_eq!(graph.op_count(), ops_before);
    Ok(())
}

#[test]
fn test_dropout_rejects_invalid_probability() {
    let mut rng = StdRng::seed_from_u64(0);
    let graph = Graph::new();
    let x = graph.ones(&[3]);

    for p in [1.0, 1.5, -0.2, f32::NAN] {
        let result = ops::dropout(&x, p, true, &mut rng);
        assert!(
            matches!(result, Err(Error::InvalidDropProbability(_))),
            "p = {} should be rejected",
            p
        );
    }
}

#[test]
fn test_dropout_inference_is_identity() -> Result<(), Error> {
    let mut rng = StdRng::seed_from_u64(0);
    let graph = Graph::new();
    let x = graph.from_vec(vec![0.5, -1.0, 2.0], &[3])?;

    let y = ops::dropout(&x, 0.5, false, &mut rng)?;
    assert_ne!(y, x);
    assert_eq!(y.data().to_vec(), x.data().to_vec());
    assert_eq!(
        y.op_type(),
        Some(OpType::Dropout {
            p: 0.5,
            mask: None
        })
    );

    ops::sum(&y, None, false)?.backward()?;
    assert_eq!(x.grad().to_vec(), vec![1.0, 1.0, 1.0]);
    Ok(())
}

#[test]
fn test_dropout_backward_uses_mask() -> Result<(), Error> {
    let mut rng = StdRng::seed_from_u64(5);
    let graph = Graph::new();
    let x = graph.ones(&[2, 8]);

    let y = ops::dropout(&x, 0.4, true, &mut rng)?;
    ops::sum(&y, None, false)?.backward()?;

    // With x = 1 the forward output equals the mask, and so does the gradient.
    let grad = x.grad().to_vec();
    let out = y.data().to_vec();
    for (g, o) in grad.iter().zip(&out) {
        assert_abs_diff_eq!(g, o, epsilon = 1e-6);
    }
    Ok(())
}
