use crate::graph::{Graph, Node};

use super::op_def;

/// Capability predicate: can the engine compiler lower this node?
///
/// Implementations must be pure; the clustering pass snapshots the answer
/// once per block.
pub trait OpSupport: Send + Sync {
    fn supports(&self, graph: &Graph, node: &Node) -> bool;
}

/// Capability predicate backed by the static [`OPS`](super::OPS) table.
///
/// Shapes are never inspected, so zero-sized dimensions classify exactly
/// like any other shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpRegistry;

impl OpSupport for OpRegistry {
    fn supports(&self, graph: &Graph, node: &Node) -> bool {
        if !node.blocks.is_empty() {
            return false;
        }
        let Some(def) = op_def(node.kind.name()) else {
            return false;
        };
        if !def.inputs.accepts(node.inputs.len()) || node.outputs.len() != def.outputs {
            return false;
        }
        if def.dtypes.is_empty() {
            return true;
        }
        node.inputs.iter().all(|input| match graph.value_type(*input) {
            Ok(ty) => ty.dtype().map_or(true, |dtype| def.dtypes.contains(&dtype)),
            Err(_) => false,
        })
    }
}
