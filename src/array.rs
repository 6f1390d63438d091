use crate::error::Error;
use crate::util::broadcast_shapes;
use ndarray::{ArrayD, Axis, Ix2, IxDyn, ShapeError, Slice, Zip};

/// Dense `f32` storage backing every tensor's data and gradient.
#[derive(Clone, Debug, PartialEq)]
pub struct Array {
    pub(crate) data: ArrayD<f32>,
}

impl Array {
    pub fn new(data: ArrayD<f32>) -> Self {
        Self { data }
    }

    pub fn into_ndarray(self) -> ArrayD<f32> {
        self.data
    }

    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self, Error> {
        let actual_len = data.len();
        let map_err = |_e: ShapeError| Error::ShapeMismatch {
            expected: shape.to_vec(),
            actual: vec![actual_len],
        };
        let array = ArrayD::from_shape_vec(IxDyn(shape), data).map_err(map_err)?;
        Ok(Self { data: array })
    }

    pub fn scalar(value: f32) -> Self {
        Self::from_elem(&[], value)
    }

    pub fn from_elem(shape: &[usize], value: f32) -> Self {
        Self {
            data: ArrayD::from_elem(IxDyn(shape), value),
        }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: ArrayD::zeros(IxDyn(shape)),
        }
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self {
            data: ArrayD::ones(IxDyn(shape)),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the array contains no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get_data(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn get_data_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.data
    }

    /// Elements in logical (row-major) order.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    pub fn into_raw_vec(self) -> Vec<f32> {
        self.to_vec()
    }

    /// Reads the value of a single-element array.
    pub fn item(&self) -> Result<f32, Error> {
        if self.size() != 1 {
            return Err(Error::ShapeMismatch {
                expected: vec![],
                actual: self.shape().to_vec(),
            });
        }
        self.data.iter().next().copied().ok_or(Error::EmptyTensor)
    }

    pub fn mapv<F>(&self, f: F) -> Array
    where
        F: Fn(f32) -> f32,
    {
        Array::new(self.data.mapv(f))
    }

    /// Applies `f` pairwise after broadcasting both operands to their common shape.
    pub fn zip_with<F>(&self, other: &Array, op: &str, f: F) -> Result<Array, Error>
    where
        F: Fn(f32, f32) -> f32,
    {
        let shape = broadcast_shapes(op, self.shape(), other.shape())?;
        let incompatible = || Error::IncompatibleShapes {
            op: op.to_string(),
            shape_a: self.shape().to_vec(),
            shape_b: other.shape().to_vec(),
        };
        let a = self.data.broadcast(IxDyn(&shape)).ok_or_else(incompatible)?;
        let b = other.data.broadcast(IxDyn(&shape)).ok_or_else(incompatible)?;
        Ok(Array::new(Zip::from(&a).and(&b).map_collect(|&x, &y| f(x, y))))
    }

    pub fn add(&self, other: &Array) -> Result<Array, Error> {
        self.zip_with(other, "add", |a, b| a + b)
    }

    pub fn sub(&self, other: &Array) -> Result<Array, Error> {
        self.zip_with(other, "sub", |a, b| a - b)
    }

    pub fn mul(&self, other: &Array) -> Result<Array, Error> {
        self.zip_with(other, "mul", |a, b| a * b)
    }

    pub fn div(&self, other: &Array) -> Result<Array, Error> {
        self.zip_with(other, "div", |a, b| a / b)
    }

    pub(crate) fn broadcast_to(&self, shape: &[usize]) -> Result<Array, Error> {
        match self.data.broadcast(IxDyn(shape)) {
            Some(broadcasted_view) => Ok(Array::new(broadcasted_view.to_owned())),
            None => Err(Error::IncompatibleShapes {
                op: "broadcast".to_string(),
                shape_a: self.shape().to_vec(),
                shape_b: shape.to_vec(),
            }),
        }
    }

    /// Reverses broadcasting: sums away the leading axes `target` lacks and every
    /// axis where `target` has size 1 but `self` does not.
    pub fn sum_to_shape(&self, target: &[usize]) -> Result<Array, Error> {
        if self.shape() == target {
            return Ok(self.clone());
        }
        let mismatch = || Error::IncompatibleShapes {
            op: "sum_to_shape".to_string(),
            shape_a: self.shape().to_vec(),
            shape_b: target.to_vec(),
        };
        if target.len() > self.ndim() {
            return Err(mismatch());
        }

        let mut reduced = self.data.clone();
        for _ in 0..(self.ndim() - target.len()) {
            reduced = reduced.sum_axis(Axis(0));
        }
        for (axis, &target_dim) in target.iter().enumerate() {
            let current_dim = reduced.shape()[axis];
            if target_dim == current_dim {
                continue;
            }
            if target_dim != 1 {
                return Err(mismatch());
            }
            reduced = reduced.sum_axis(Axis(axis)).insert_axis(Axis(axis));
        }
        Ok(Array::new(reduced))
    }

    pub fn sum_all(&self) -> f32 {
        self.data.sum()
    }

    pub(crate) fn sum_along_axis(&self, axis: usize, keepdims: bool) -> Result<Array, Error> {
        if axis >= self.data.ndim() {
            return Err(Error::InvalidIndex(vec![axis]));
        }
        let summed = self.data.sum_axis(Axis(axis));
        Ok(Array::new(if keepdims {
            summed.insert_axis(Axis(axis))
        } else {
            summed
        }))
    }

    fn check_rows(&self, indices: &[usize]) -> Result<usize, Error> {
        if self.ndim() == 0 {
            return Err(Error::DimensionMismatch(1, 0));
        }
        let rows = self.shape()[0];
        if let Some(&bad) = indices.iter().find(|&&i| i >= rows) {
            return Err(Error::IndexOutOfBounds {
                index: bad,
                size: rows,
            });
        }
        Ok(rows)
    }

    /// Gathers rows along the first axis. The result has shape
    /// `index_shape ++ self.shape()[1..]`.
    pub fn gather_rows(&self, indices: &[usize], index_shape: &[usize]) -> Result<Array, Error> {
        self.check_rows(indices)?;
        let mut out_shape = index_shape.to_vec();
        out_shape.extend_from_slice(&self.shape()[1..]);
        let selected = self.data.select(Axis(0), indices);
        selected
            .into_shape_with_order(IxDyn(&out_shape))
            .map(Array::new)
            .map_err(|e| Error::ShapeError(e.to_string()))
    }

    /// Adds row `k` of `src` (viewed as `[indices.len(), row...]`) into row
    /// `indices[k]` of `self`. Repeated indices accumulate.
    pub fn scatter_add_rows(&mut self, indices: &[usize], src: &Array) -> Result<(), Error> {
        self.check_rows(indices)?;
        let mut rows_shape = vec![indices.len()];
        rows_shape.extend_from_slice(&self.shape()[1..]);
        let rows = ArrayD::from_shape_vec(IxDyn(&rows_shape), src.to_vec()).map_err(|_| {
            Error::ShapeMismatch {
                expected: rows_shape.clone(),
                actual: src.shape().to_vec(),
            }
        })?;
        for (k, &row) in indices.iter().enumerate() {
            let mut target = self.data.index_axis_mut(Axis(0), row);
            target += &rows.index_axis(Axis(0), k);
        }
        Ok(())
    }

    fn spatial_dims(&self) -> Result<(usize, usize), Error> {
        let ndim = self.ndim();
        if ndim < 2 {
            return Err(Error::DimensionMismatch(2, ndim));
        }
        Ok((self.shape()[ndim - 2], self.shape()[ndim - 1]))
    }

    /// Zero-pads the last two axes by `(pad_h, pad_w)` on both sides.
    pub fn pad2d(&self, (pad_h, pad_w): (usize, usize)) -> Result<Array, Error> {
        let (h, w) = self.spatial_dims()?;
        let ndim = self.ndim();
        let mut out_shape = self.shape().to_vec();
        out_shape[ndim - 2] = h + 2 * pad_h;
        out_shape[ndim - 1] = w + 2 * pad_w;

        let mut padded = ArrayD::<f32>::zeros(IxDyn(&out_shape));
        padded
            .slice_each_axis_mut(|ax| spatial_slice(ax.axis.index(), ndim, (pad_h, h), (pad_w, w)))
            .assign(&self.data);
        Ok(Array::new(padded))
    }

    /// Crops `(pad_h, pad_w)` off both sides of the last two axes.
    pub fn unpad2d(&self, (pad_h, pad_w): (usize, usize)) -> Result<Array, Error> {
        let (h, w) = self.spatial_dims()?;
        if h < 2 * pad_h || w < 2 * pad_w {
            return Err(Error::InvalidOperation(format!(
                "Cannot remove padding ({}, {}) from spatial shape ({}, {})",
                pad_h, pad_w, h, w
            )));
        }
        let ndim = self.ndim();
        let cropped = self
            .data
            .slice_each_axis(|ax| {
                spatial_slice(ax.axis.index(), ndim, (pad_h, h - 2 * pad_h), (pad_w, w - 2 * pad_w))
            })
            .to_owned();
        Ok(Array::new(cropped))
    }

    pub fn matmul(&self, other: &Array) -> Result<Array, Error> {
        let a_2d = self
            .data
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|e| Error::ShapeError(format!("Input 'a' is not 2D: {}", e)))?;
        let b_2d = other
            .data
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|e| Error::ShapeError(format!("Input 'b' is not 2D: {}", e)))?;
        if a_2d.shape()[1] != b_2d.shape()[0] {
            return Err(Error::IncompatibleShapes {
                op: "matmul".to_string(),
                shape_a: self.shape().to_vec(),
                shape_b: other.shape().to_vec(),
            });
        }
        Ok(Array::new(a_2d.dot(&b_2d).into_dyn()))
    }

    pub fn transpose_2d(&self) -> Result<Array, Error> {
        if self.ndim() != 2 {
            return Err(Error::DimensionMismatch(2, self.ndim()));
        }
        Ok(Array::new(self.data.t().as_standard_layout().into_owned()))
    }
}

/// Slice selecting `len` elements from `start` on the two spatial axes, everything elsewhere.
fn spatial_slice(axis: usize, ndim: usize, h: (usize, usize), w: (usize, usize)) -> Slice {
    if axis == ndim - 2 {
        Slice::from(h.0..h.0 + h.1)
    } else if axis == ndim - 1 {
        Slice::from(w.0..w.0 + w.1)
    } else {
        Slice::from(..)
    }
}

impl From<ArrayD<f32>> for Array {
    fn from(data: ArrayD<f32>) -> Self {
        Array::new(data)
    }
}
