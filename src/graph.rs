use crate::array::Array;
use crate::error::Error;
use crate::tensor::Tensor;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Parent names longer than this are referred to by their id in an op's output name.
const MAX_INLINE_NAME: usize = 32;

/// Handle of a tensor node inside a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub(crate) usize);

/// Handle of an operation node inside a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub(crate) usize);

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Every differentiable operation the engine knows about. Variants carry the
/// state their backward step needs.
#[derive(Debug, Clone, PartialEq)]
pub enum OpType {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Exp,
    Ln,
    /// `log(1 + exp(x))`, evaluated without overflow.
    ExpLog,
    Sum { axis: Option<usize>, keepdims: bool },
    Mean,
    Matmul,
    Sigmoid,
    Relu,
    /// `mask` is `None` in inference mode.
    Dropout { p: f32, mask: Option<Array> },
    Embedding { indices: Vec<usize> },
    Pad2d { padding: (usize, usize) },
    Unpad2d { padding: (usize, usize) },
}

impl OpType {
    /// Number of parents an operation of this kind takes.
    pub fn arity(&self) -> usize {
        match self {
            OpType::Add | OpType::Sub | OpType::Mul | OpType::Div | OpType::Matmul => 2,
            _ => 1,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            OpType::Add => "add",
            OpType::Sub => "sub",
            OpType::Mul => "mul",
            OpType::Div => "div",
            OpType::Neg => "neg",
            OpType::Exp => "exp",
            OpType::Ln => "ln",
            OpType::ExpLog => "exp_log",
            OpType::Sum { .. } => "sum",
            OpType::Mean => "mean",
            OpType::Matmul => "matmul",
            OpType::Sigmoid => "sigmoid",
            OpType::Relu => "relu",
            OpType::Dropout { .. } => "dropout",
            OpType::Embedding { .. } => "embedding",
            OpType::Pad2d { .. } => "pad2d",
            OpType::Unpad2d { .. } => "unpad2d",
        }
    }

    /// Diagnostic name of the tensor this operation produces, e.g. `sigmoid(x)`.
    pub fn output_name(&self, parent_names: &[String]) -> String {
        format!("{}({})", self.label(), parent_names.join(", "))
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OpType::Sum { axis: None, .. } => write!(f, "Sum(global)"),
            OpType::Sum {
                axis: Some(axis),
                keepdims,
            } => write!(f, "Sum(axis={}, keepdims={})", axis, keepdims),
            OpType::Dropout { p, mask } => {
                write!(f, "Dropout(p={}, training={})", p, mask.is_some())
            }
            OpType::Embedding { indices } => write!(f, "Embedding(n={})", indices.len()),
            OpType::Pad2d { padding } => write!(f, "Pad2d(padding={:?})", padding),
            OpType::Unpad2d { padding } => write!(f, "Unpad2d(padding={:?})", padding),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// One function application in the graph.
#[derive(Debug, Clone)]
pub struct Op {
    pub op_type: OpType,
    pub parents: Vec<TensorId>,
    pub out: TensorId,
    pub(crate) differentiated: bool,
}

impl Op {
    pub fn is_differentiated(&self) -> bool {
        self.differentiated
    }
}

#[derive(Debug)]
pub(crate) struct TensorNode {
    pub(crate) name: String,
    pub(crate) data: Array,
    pub(crate) grad: Array,
    pub(crate) op: Option<OpId>,
    /// Set once the node is the backward seed or has received a contribution.
    pub(crate) grad_seeded: bool,
}

#[derive(Debug, Default)]
pub(crate) struct GraphData {
    pub(crate) tensors: Vec<TensorNode>,
    pub(crate) ops: Vec<Op>,
}

impl GraphData {
    pub(crate) fn node(&self, id: TensorId) -> &TensorNode {
        &self.tensors[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: TensorId) -> &mut TensorNode {
        &mut self.tensors[id.0]
    }

    pub(crate) fn op(&self, id: OpId) -> &Op {
        &self.ops[id.0]
    }

    fn push_tensor(&mut self, data: Array, name: Option<String>, op: Option<OpId>) -> TensorId {
        let id = TensorId(self.tensors.len());
        let grad = Array::zeros(data.shape());
        self.tensors.push(TensorNode {
            name: name.unwrap_or_else(|| id.to_string()),
            data,
            grad,
            op,
            grad_seeded: false,
        });
        id
    }
}

/// Arena owning every tensor and operation of one computation.
///
/// Tensors refer to their producing operation and operations refer to their
/// parents by index, so the arena is the only owner of node storage. The arena
/// is single-threaded: a `Graph` is `!Send`, and re-entrant access (for example
/// building an op while holding a [`Tensor::data`] borrow) panics.
///
/// # Example
/// ```rust
/// use rust_autograd_lib::{ops, Graph};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let graph = Graph::new();
///     let x = graph.from_vec(vec![-1.0, 0.5, 2.0], &[3])?;
///     let loss = ops::sum(&ops::relu(&x)?, None, false)?;
///     loss.backward()?;
///     assert_eq!(x.grad().to_vec(), vec![0.0, 1.0, 1.0]);
///     Ok(())
/// }
/// ```
#[derive(Clone, Default)]
pub struct Graph {
    pub(crate) inner: Rc<RefCell<GraphData>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a leaf tensor holding `data`.
    pub fn tensor(&self, data: impl Into<Array>) -> Tensor {
        let id = self.inner.borrow_mut().push_tensor(data.into(), None, None);
        Tensor::from_parts(self.clone(), id)
    }

    /// Registers a leaf tensor with a diagnostic name.
    pub fn tensor_named(&self, data: impl Into<Array>, name: &str) -> Tensor {
        let id = self
            .inner
            .borrow_mut()
            .push_tensor(data.into(), Some(name.to_string()), None);
        Tensor::from_parts(self.clone(), id)
    }

    pub fn from_vec(&self, data: Vec<f32>, shape: &[usize]) -> Result<Tensor, Error> {
        Ok(self.tensor(Array::from_vec(data, shape)?))
    }

    pub fn zeros(&self, shape: &[usize]) -> Tensor {
        self.tensor(Array::zeros(shape))
    }

    pub fn ones(&self, shape: &[usize]) -> Tensor {
        self.tensor(Array::ones(shape))
    }

    pub fn scalar(&self, value: f32) -> Tensor {
        self.tensor(Array::scalar(value))
    }

    /// Number of tensor nodes.
    pub fn len(&self) -> usize {
        self.inner.borrow().tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn op_count(&self) -> usize {
        self.inner.borrow().ops.len()
    }

    /// Snapshot of an operation node.
    pub fn op(&self, id: OpId) -> Op {
        self.inner.borrow().op(id).clone()
    }

    /// Resets every gradient to zero and re-arms every operation so the graph
    /// can be differentiated again.
    pub fn zero_grad(&self) {
        let mut graph = self.inner.borrow_mut();
        for node in graph.tensors.iter_mut() {
            node.grad = Array::zeros(node.data.shape());
            node.grad_seeded = false;
        }
        for op in graph.ops.iter_mut() {
            op.differentiated = false;
        }
    }

    pub(crate) fn same_graph(&self, other: &Graph) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Wires an operation and its freshly computed output into the graph.
    pub(crate) fn register(
        op_type: OpType,
        parents: &[&Tensor],
        data: Array,
    ) -> Result<Tensor, Error> {
        let first = parents.first().ok_or_else(|| {
            Error::InternalLogicError(format!("{} registered without parents", op_type))
        })?;
        if parents.len() != op_type.arity() {
            return Err(Error::InternalLogicError(format!(
                "{} expects {} parents, got {}",
                op_type,
                op_type.arity(),
                parents.len()
            )));
        }
        if let Some(stranger) = parents.iter().find(|p| !p.graph.same_graph(&first.graph)) {
            return Err(Error::GraphMismatch(first.name(), stranger.name()));
        }

        let graph = first.graph.clone();
        let id = {
            let mut inner = graph.inner.borrow_mut();
            let parent_names: Vec<String> = parents
                .iter()
                .map(|p| {
                    let name = &inner.node(p.id).name;
                    if name.len() <= MAX_INLINE_NAME {
                        name.clone()
                    } else {
                        p.id.to_string()
                    }
                })
                .collect();
            let op_id = OpId(inner.ops.len());
            let name = op_type.output_name(&parent_names);
            let out = inner.push_tensor(data, Some(name), Some(op_id));
            debug_println!("registered {} -> {} {:?}", op_type, out, inner.node(out).data.shape());
            inner.ops.push(Op {
                op_type,
                parents: parents.iter().map(|p| p.id).collect(),
                out,
                differentiated: false,
            });
            out
        };
        Ok(Tensor::from_parts(graph, id))
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.same_graph(other)
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Graph")
            .field("tensors", &inner.tensors.len())
            .field("ops", &inner.ops.len())
            .finish()
    }
}
