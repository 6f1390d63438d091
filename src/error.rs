use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Shape error: {0}")]
    ShapeError(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Incompatible shapes for operation {op}: {shape_a:?} and {shape_b:?}")]
    IncompatibleShapes {
        op: String,
        shape_a: Vec<usize>,
        shape_b: Vec<usize>,
    },

    #[error("Invalid index: {0:?}")]
    InvalidIndex(Vec<usize>),

    #[error("Index out of bounds: index {index}, size {size}")]
    IndexOutOfBounds {
        index: usize,
        size: usize,
    },

    #[error("Dimension mismatch: expected at least {0}, got {1}")]
    DimensionMismatch(usize, usize),

    #[error("Operation cannot be performed on empty tensor")]
    EmptyTensor,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Tensors {0} and {1} belong to different graphs")]
    GraphMismatch(String, String),

    #[error("Invalid reduction '{0}': expected 'mean' or 'sum'")]
    InvalidReduction(String),

    #[error("Dropout probability must lie in (0, 1), got {0}")]
    InvalidDropProbability(f32),

    #[error("Operation {op} (output '{tensor}') was already differentiated in this backward pass")]
    AlreadyDifferentiated { op: String, tensor: String },

    #[error("Gradient of '{0}' has not been seeded; run backward from a scalar output")]
    GradientNotSeeded(String),

    #[error("backward() requires a single-element output, '{name}' has shape {shape:?}")]
    NonScalarBackward { name: String, shape: Vec<usize> },

    #[error("Internal logic error: {0}")]
    InternalLogicError(String),

    #[error("Gradient check error: analytical={analytical:?}, numerical={numerical:?}, max_rel_error={max_rel_error}, max_abs_error={max_abs_error}, at_index={at_index}")]
    GradientCheckError {
        analytical: Vec<f32>,
        numerical: Vec<f32>,
        max_rel_error: f32,
        max_abs_error: f32,
        at_index: usize,
    },
}

/// Specifies the reduction to apply to the output of a loss function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// The output is averaged over all elements.
    #[default]
    Mean,
    /// The output is summed over all elements.
    Sum,
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduction::Mean => write!(f, "mean"),
            Reduction::Sum => write!(f, "sum"),
        }
    }
}

impl FromStr for Reduction {
    type Err = Error;

    /// Parses a reduction name. Anything other than `mean` or `sum` is rejected
    /// rather than mapped to a default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Reduction::Mean),
            "sum" => Ok(Reduction::Sum),
            other => Err(Error::InvalidReduction(other.to_string())),
        }
    }
}
