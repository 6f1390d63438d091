//! Reverse-mode automatic differentiation over dense `f32` tensors.
//!
//! This library provides:
//! - an arena-backed computation graph built eagerly as operations run
//! - broadcasting arithmetic, reductions and activation functions
//! - dropout, embedding lookup and 2-D padding
//! - binary and categorical cross-entropy losses
//! - a backward driver that visits every reachable operation exactly once
//!
//! # Features
//! - `debug_logs` - Prints graph construction and backward-pass traces
//!
//! # Example
//! ```rust
//! use rust_autograd_lib::{ops, Graph, Reduction};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let graph = Graph::new();
//!     let logits = graph.from_vec(vec![0.5, -1.0, 2.0], &[3])?;
//!     let target = graph.from_vec(vec![1.0, 0.0, 1.0], &[3])?;
//!
//!     let loss = ops::bce_loss(&logits, &target, Reduction::Mean)?;
//!     loss.backward()?;
//!
//!     println!("dloss/dlogits: {:?}", logits.grad().to_vec());
//!     Ok(())
//! }
//! ```

// --- Central debug_println macro definition ---
/// Conditional logging macro. Prints if 'debug_logs' feature is enabled.
#[cfg(feature = "debug_logs")]
#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {
        ::std::println!("[DEBUG {}] {}", module_path!(), ::std::format_args!($($arg)*))
    };
}

/// Conditional logging macro (disabled version). Does nothing.
#[cfg(not(feature = "debug_logs"))]
#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {};
}

pub mod array;
mod backward;
pub mod error;
pub mod graph;
pub mod ops;
pub mod tensor;
pub mod util;

pub mod test_utils;

pub use array::Array;
pub use error::{Error, Reduction};
pub use graph::{Graph, Op, OpId, OpType, TensorId};
pub use ops::{Indices, Padding, Target};
pub use tensor::Tensor;
