use crate::{
    array::Array,
    error::Error,
    graph::{Graph, OpId, OpType, TensorId},
    ops,
};
use std::cell::Ref;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A node of the computation graph: forward data, an accumulated gradient and
/// the operation that produced it (none for leaves).
///
/// `Tensor` is a cheap handle into a [`Graph`]; cloning it does not copy data.
///
/// # Example
/// ```rust
/// use rust_autograd_lib::{ops, Graph};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let graph = Graph::new();
///     let a = graph.from_vec(vec![1.0, 2.0], &[2])?;
///     let b = graph.from_vec(vec![3.0, 4.0], &[2])?;
///
///     let c = (&a * &b)?;
///     let loss = c.sum(None, false)?;
///     loss.backward()?;
///
///     assert_eq!(a.grad().to_vec(), vec![3.0, 4.0]);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Tensor {
    pub(crate) graph: Graph,
    pub(crate) id: TensorId,
}

impl Tensor {
    pub(crate) fn from_parts(graph: Graph, id: TensorId) -> Self {
        Self { graph, id }
    }

    pub fn id(&self) -> TensorId {
        self.id
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Gets an immutable reference to the forward data.
    ///
    /// The borrow locks the whole graph: drop it before building further operations.
    pub fn data(&self) -> Ref<'_, Array> {
        Ref::map(self.graph.inner.borrow(), |g| &g.node(self.id).data)
    }

    /// Gets an immutable reference to the accumulated gradient.
    pub fn grad(&self) -> Ref<'_, Array> {
        Ref::map(self.graph.inner.borrow(), |g| &g.node(self.id).grad)
    }

    pub fn shape(&self) -> Vec<usize> {
        self.data().shape().to_vec()
    }

    pub fn size(&self) -> usize {
        self.data().size()
    }

    /// Value of a single-element tensor.
    pub fn item(&self) -> Result<f32, Error> {
        self.data().item()
    }

    pub fn name(&self) -> String {
        self.graph.inner.borrow().node(self.id).name.clone()
    }

    pub fn set_name(&self, name: &str) {
        self.graph.inner.borrow_mut().node_mut(self.id).name = name.to_string();
    }

    /// The operation that produced this tensor, `None` for leaves.
    pub fn op(&self) -> Option<OpId> {
        self.graph.inner.borrow().node(self.id).op
    }

    pub fn op_type(&self) -> Option<OpType> {
        let graph = self.graph.inner.borrow();
        graph
            .node(self.id)
            .op
            .map(|op| graph.op(op).op_type.clone())
    }

    pub fn is_leaf(&self) -> bool {
        self.op().is_none()
    }

    /// Inputs of the producing operation, in order.
    pub fn parents(&self) -> Vec<Tensor> {
        let graph = self.graph.inner.borrow();
        match graph.node(self.id).op {
            Some(op) => graph
                .op(op)
                .parents
                .iter()
                .map(|&id| Tensor::from_parts(self.graph.clone(), id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Back-propagates from this single-element tensor to every reachable node.
    /// See [`Graph::backward_from`].
    pub fn backward(&self) -> Result<(), Error> {
        self.graph.backward_from(self.id)
    }

    pub fn relu(&self) -> Result<Tensor, Error> {
        ops::relu(self)
    }

    pub fn sigmoid(&self) -> Result<Tensor, Error> {
        ops::sigmoid(self)
    }

    pub fn softmax(&self) -> Result<Tensor, Error> {
        ops::softmax(self)
    }

    pub fn exp(&self) -> Result<Tensor, Error> {
        ops::exp(self)
    }

    pub fn ln(&self) -> Result<Tensor, Error> {
        ops::ln(self)
    }

    /// Sums along `axis` (negative values count from the end) or over everything.
    pub fn sum(&self, axis: Option<isize>, keepdims: bool) -> Result<Tensor, Error> {
        ops::sum(self, axis, keepdims)
    }

    pub fn mean(&self) -> Result<Tensor, Error> {
        ops::mean(self)
    }

    pub fn matmul(&self, other: &Tensor) -> Result<Tensor, Error> {
        ops::matmul(self, other)
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.graph.same_graph(&other.graph)
    }
}

impl Eq for Tensor {}

impl Hash for Tensor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.graph.inner.borrow();
        let node = graph.node(self.id);
        f.debug_struct("Tensor")
            .field("id", &self.id)
            .field("name", &node.name)
            .field("shape", &node.data.shape())
            .field("op", &node.op.map(|op| graph.op(op).op_type.to_string()))
            .finish()
    }
}

// --- Operator Overloading ---
impl<'b> Add<&'b Tensor> for &Tensor {
    type Output = Result<Tensor, Error>;

    /// Element-wise, broadcasting addition. Calls `ops::add`.
    fn add(self, rhs: &'b Tensor) -> Self::Output {
        ops::add(self, rhs)
    }
}

impl<'b> Sub<&'b Tensor> for &Tensor {
    type Output = Result<Tensor, Error>;

    fn sub(self, rhs: &'b Tensor) -> Self::Output {
        ops::sub(self, rhs)
    }
}

impl<'b> Mul<&'b Tensor> for &Tensor {
    type Output = Result<Tensor, Error>;

    /// Element-wise multiplication; use `ops::matmul` for matrix products.
    fn mul(self, rhs: &'b Tensor) -> Self::Output {
        ops::mul(self, rhs)
    }
}

impl<'b> Div<&'b Tensor> for &Tensor {
    type Output = Result<Tensor, Error>;

    fn div(self, rhs: &'b Tensor) -> Self::Output {
        ops::div(self, rhs)
    }
}

impl Neg for &Tensor {
    type Output = Result<Tensor, Error>;

    fn neg(self) -> Self::Output {
        ops::neg(self)
    }
}
