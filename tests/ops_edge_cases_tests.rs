use rust_autograd_lib::{ops, Array, Error, Graph, Indices};

#[test]
fn test_incompatible_shapes_error() {
    let graph = Graph::new();
    let a = graph.ones(&[2, 3]);
    let b = graph.ones(&[4]);
    let err = ops::add(&a, &b).unwrap_err();
    assert_eq!(
        err,
        Error::IncompatibleShapes {
            op: "add".to_string(),
            shape_a: vec![2, 3],
            shape_b: vec![4],
        }
    );
    // Nothing was recorded for the failed op.
    assert_eq!(graph.op_count(), 0);
}

#[test]
fn test_matmul_shape_errors() {
    let graph = Graph::new();
    let a = graph.ones(&[2, 3]);
    let b = graph.ones(&[2, 3]);
    assert!(matches!(
        ops::matmul(&a, &b),
        Err(Error::IncompatibleShapes { .. })
    ));
    let v = graph.ones(&[3]);
    assert!(matches!(ops::matmul(&a, &v), Err(Error::ShapeError(_))));
}

#[test]
fn test_operands_from_different_graphs() {
    let a = Graph::new().ones(&[2]);
    let b = Graph::new().ones(&[2]);
    assert!(matches!(
        ops::mul(&a, &b),
        Err(Error::GraphMismatch(_, _))
    ));
}

#[test]
fn test_backward_requires_single_element() -> Result<(), Error> {
    let graph = Graph::new();
    let x = graph.from_vec(vec![1.0, 2.0], &[1, 2])?;
    let y = ops::exp(&x)?;
    let err = y.backward().unwrap_err();
    assert!(matches!(err, Error::NonScalarBackward { ref shape, .. } if shape == &vec![1, 2]));

    // A [1, 1] tensor counts as a scalar.
    let w = ops::sum(&y, Some(1), true)?;
    assert_eq!(w.shape(), vec![1, 1]);
    w.backward()?;
    assert_eq!(x.grad().to_vec(), y.data().to_vec());
    Ok(())
}

#[test]
fn test_embedding_index_out_of_range() {
    let graph = Graph::new();
    let table = graph.ones(&[3, 2]);
    assert!(matches!(
        ops::embedding(&table, [0, 3]),
        Err(Error::IndexOutOfBounds { index: 3, size: 3 })
    ));
}

#[test]
fn test_indices_shape_must_match() {
    assert!(Indices::new(vec![0, 1, 2], &[2, 2]).is_err());
    let indices = Indices::new(vec![0, 1, 2, 0], &[2, 2]).unwrap();
    assert_eq!(indices.shape(), &[2, 2]);
    assert_eq!(indices.values(), &[0, 1, 2, 0]);
}

#[test]
fn test_mean_of_empty_tensor() {
    let graph = Graph::new();
    let x = graph.tensor(Array::zeros(&[0]));
    assert!(matches!(ops::mean(&x), Err(Error::EmptyTensor)));
}

#[test]
fn test_ln_of_zero_is_negative_infinity() -> Result<(), Error> {
    let graph = Graph::new();
    let x = graph.from_vec(vec![0.0, 1.0], &[2])?;
    let y = ops::ln(&x)?;
    let values = y.data().to_vec();
    assert_eq!(values[0], f32::NEG_INFINITY);
    assert_eq!(values[1], 0.0);
    Ok(())
}

#[test]
fn test_array_from_vec_shape_mismatch() {
    assert!(Array::from_vec(vec![1.0, 2.0, 3.0], &[2, 2]).is_err());
    assert!(Graph::new().from_vec(vec![1.0], &[2]).is_err());
}

#[test]
#[should_panic]
fn test_building_while_data_is_borrowed_panics() {
    let graph = Graph::new();
    let x = graph.ones(&[2]);
    let _held = x.data();
    let _ = ops::relu(&x);
}
