//! Reverse-mode driver.
//!
//! A backward pass:
//! 1. seeds the output's gradient with ones,
//! 2. orders the operations reachable from the output so that every operation
//!    comes after all operations consuming its result,
//! 3. runs each operation's backward step exactly once in that order.

use std::collections::HashSet;

use crate::array::Array;
use crate::error::Error;
use crate::graph::{Graph, OpId, TensorId};
use crate::ops::cpu_backward;

impl Graph {
    /// Runs a full backward pass from the single-element tensor `root`.
    ///
    /// Gradients accumulate into every reachable tensor. Running a second pass
    /// over the same operations without [`Graph::zero_grad`] fails with
    /// [`Error::AlreadyDifferentiated`].
    pub fn backward_from(&self, root: TensorId) -> Result<(), Error> {
        {
            let mut graph = self.inner.borrow_mut();
            let node = graph.node_mut(root);
            if node.data.size() != 1 {
                return Err(Error::NonScalarBackward {
                    name: node.name.clone(),
                    shape: node.data.shape().to_vec(),
                });
            }
            node.grad = Array::ones(node.data.shape());
            node.grad_seeded = true;
        }

        let order = self.topological_order(root);
        debug_println!("backward from {} over {} ops", root, order.len());
        for op in order {
            self.backward_op(op)?;
        }
        Ok(())
    }

    /// Runs the backward step of a single operation, adding its contribution
    /// into each parent's gradient.
    ///
    /// Fails with [`Error::AlreadyDifferentiated`] if the step already ran since
    /// the last [`Graph::zero_grad`], and with [`Error::GradientNotSeeded`] if no
    /// gradient has reached the operation's output yet.
    pub fn backward_op(&self, op_id: OpId) -> Result<(), Error> {
        let (parents, contributions) = {
            let graph = self.inner.borrow();
            let op = graph.op(op_id);
            let out = graph.node(op.out);
            if op.differentiated {
                return Err(Error::AlreadyDifferentiated {
                    op: op.op_type.to_string(),
                    tensor: out.name.clone(),
                });
            }
            if !out.grad_seeded {
                return Err(Error::GradientNotSeeded(out.name.clone()));
            }
            let parent_data: Vec<&Array> =
                op.parents.iter().map(|&p| &graph.node(p).data).collect();
            let contributions =
                cpu_backward::backward(&op.op_type, &parent_data, &out.data, &out.grad)?;
            (op.parents.clone(), contributions)
        };

        if contributions.len() != parents.len() {
            return Err(Error::InternalLogicError(format!(
                "backward of op {} returned {} gradients for {} parents",
                op_id.0,
                contributions.len(),
                parents.len()
            )));
        }

        let mut graph = self.inner.borrow_mut();
        for (&parent, contribution) in parents.iter().zip(contributions) {
            let node = graph.node_mut(parent);
            if node.grad.shape() != contribution.shape() {
                return Err(Error::IncompatibleShapes {
                    op: format!("gradient accumulation into '{}'", node.name),
                    shape_a: node.grad.shape().to_vec(),
                    shape_b: contribution.shape().to_vec(),
                });
            }
            *node.grad.get_data_mut() += contribution.get_data();
            node.grad_seeded = true;
        }
        graph.ops[op_id.0].differentiated = true;
        Ok(())
    }

    /// Operations reachable from `root`, consumers before producers.
    pub fn topological_order(&self, root: TensorId) -> Vec<OpId> {
        let graph = self.inner.borrow();
        let mut order = Vec::new();
        let Some(root_op) = graph.node(root).op else {
            return order;
        };

        // Iterative post-order DFS; `true` marks a node whose parents are done.
        let mut visited = HashSet::new();
        let mut stack = vec![(root_op, false)];
        while let Some((op_id, expanded)) = stack.pop() {
            if expanded {
                order.push(op_id);
                continue;
            }
            if !visited.insert(op_id) {
                continue;
            }
            stack.push((op_id, true));
            for &parent in &graph.op(op_id).parents {
                if let Some(parent_op) = graph.node(parent).op {
                    if !visited.contains(&parent_op) {
                        stack.push((parent_op, false));
                    }
                }
            }
        }
        order.reverse();
        order
    }
}
