use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use anyhow::Result;

use crate::graph::{BlockId, Graph, NodeId, Use, ValueId};

/// Data dependencies between the nodes directly inside one block.
///
/// A consumer nested inside a control-flow node is lifted to that node, so a
/// loop whose body reads a value depends on the value's producer.
#[derive(Debug, Clone)]
pub struct BlockDeps {
    block: BlockId,
    position: HashMap<NodeId, usize>,
    succs: HashMap<NodeId, BTreeSet<NodeId>>,
}

impl BlockDeps {
    pub fn build(graph: &Graph, block: BlockId) -> Result<Self> {
        let nodes = &graph.block(block)?.nodes;
        let position = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (*node, idx))
            .collect::<HashMap<_, _>>();

        let mut produced_here = HashMap::new();
        for id in nodes {
            for output in &graph.node(*id)?.outputs {
                produced_here.insert(*output, *id);
            }
        }

        let mut consumers: HashMap<ValueId, Vec<Use>> = HashMap::new();
        for node in graph.nodes() {
            for (index, input) in node.inputs.iter().enumerate() {
                if produced_here.contains_key(input) {
                    consumers.entry(*input).or_default().push(Use::Node {
                        node: node.id,
                        index,
                    });
                }
            }
        }
        for data in graph.blocks() {
            for (index, ret) in data.returns.iter().enumerate() {
                if produced_here.contains_key(ret) {
                    consumers.entry(*ret).or_default().push(Use::Return {
                        block: data.id,
                        index,
                    });
                }
            }
        }

        let mut succs: HashMap<NodeId, BTreeSet<NodeId>> = HashMap::new();
        for (value, uses) in consumers {
            let producer = produced_here[&value];
            for u in uses {
                let user = match u {
                    Use::Node { node, .. } => Some(node),
                    Use::Return { block: ret_block, .. } if ret_block != block => {
                        graph.block(ret_block)?.owner
                    }
                    Use::Return { .. } => None,
                };
                let Some(lifted) = user.and_then(|user| graph.enclosing_node_in(user, block))
                else {
                    continue;
                };
                if lifted != producer {
                    succs.entry(producer).or_default().insert(lifted);
                }
            }
        }

        Ok(Self {
            block,
            position,
            succs,
        })
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Position of `node` in the block this was built for.
    pub fn position(&self, node: NodeId) -> usize {
        self.position.get(&node).copied().unwrap_or(usize::MAX)
    }

    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.succs.get(&node).into_iter().flatten().copied()
    }

    /// Nodes outside `members` reachable from any member.
    pub fn downstream_of(&self, members: &HashSet<NodeId>) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut queue = members
            .iter()
            .flat_map(|member| self.successors(*member))
            .filter(|node| !members.contains(node))
            .collect::<VecDeque<_>>();
        while let Some(node) = queue.pop_front() {
            if members.contains(&node) || !seen.insert(node) {
                continue;
            }
            queue.extend(self.successors(node));
        }
        seen
    }

    /// True if some path leaves `members` and enters it again.
    ///
    /// Collapsing such a set into one node would create a cycle.
    pub fn reaches_back(&self, members: &HashSet<NodeId>) -> bool {
        self.reaches_back_contracted(members, |_| &[][..])
    }

    /// Like [`reaches_back`](Self::reaches_back), with existing groups
    /// collapsed: `peers` returns the group a node already belongs to, and a
    /// path entering any node of that group continues from all of them.
    pub fn reaches_back_contracted<'g>(
        &self,
        members: &HashSet<NodeId>,
        peers: impl Fn(NodeId) -> &'g [NodeId],
    ) -> bool {
        let mut seen = HashSet::new();
        let mut queue = members
            .iter()
            .flat_map(|member| self.successors(*member))
            .filter(|node| !members.contains(node))
            .collect::<VecDeque<_>>();
        while let Some(node) = queue.pop_front() {
            if !seen.insert(node) {
                continue;
            }
            let origins = std::iter::once(node).chain(peers(node).iter().copied());
            for origin in origins {
                seen.insert(origin);
                for next in self.successors(origin) {
                    if members.contains(&next) {
                        return true;
                    }
                    queue.push_back(next);
                }
            }
        }
        false
    }
}
