use std::collections::HashSet;
use std::fmt;

use anyhow::{anyhow, Result};

use crate::graph::{BlockId, Graph, NodeId, Use, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub usize);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group{}", self.0)
    }
}

/// A connected, eligible subset of one block's nodes.
///
/// The frontier is captured when the group is formed and refers to the
/// unmodified graph: `inputs` in order of first use inside the group,
/// `outputs` in order of production.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionGroup {
    pub id: GroupId,
    pub block: BlockId,
    /// Members in block order.
    pub nodes: Vec<NodeId>,
    /// Original position of the earliest member.
    pub anchor: usize,
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
}

impl FusionGroup {
    pub fn new(graph: &Graph, id: GroupId, block: BlockId, nodes: Vec<NodeId>) -> Result<Self> {
        let first = *nodes
            .first()
            .ok_or_else(|| anyhow!("{} has no members", id))?;
        let anchor = graph.position(first)?;
        let members = nodes.iter().copied().collect::<HashSet<_>>();

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for member in &nodes {
            let node = graph.node(*member)?;
            if node.owner != block {
                return Err(anyhow!("{} is not inside {}", member, block));
            }
            for input in &node.inputs {
                let internal = graph
                    .producer_node(*input)?
                    .map_or(false, |producer| members.contains(&producer));
                if !internal && !inputs.contains(input) {
                    inputs.push(*input);
                }
            }
            for output in &node.outputs {
                let escapes = graph.uses(*output).into_iter().any(|u| match u {
                    Use::Node { node, .. } => !members.contains(&node),
                    Use::Return { .. } => true,
                });
                if escapes {
                    outputs.push(*output);
                }
            }
        }

        Ok(Self {
            id,
            block,
            nodes,
            anchor,
            inputs,
            outputs,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }
}
