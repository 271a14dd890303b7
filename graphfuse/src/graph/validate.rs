use std::collections::HashSet;

use anyhow::{anyhow, Context, Result};

use super::{describe_node, BlockId, Graph, Node, NodeId, Producer, ValueId};

/// Values visible at the current point of the walk, with an undo log so a
/// finished block can drop what it defined.
#[derive(Default)]
struct Scope {
    visible: HashSet<ValueId>,
    defined: Vec<ValueId>,
}

impl Scope {
    fn define(&mut self, value: ValueId) {
        if self.visible.insert(value) {
            self.defined.push(value);
        }
    }

    fn contains(&self, value: &ValueId) -> bool {
        self.visible.contains(value)
    }

    fn mark(&self) -> usize {
        self.defined.len()
    }

    fn rewind(&mut self, mark: usize) {
        for value in self.defined.drain(mark..) {
            self.visible.remove(&value);
        }
    }
}

/// A block on the validation stack. `mark` is set once the block's params
/// are in scope; `pending` holds the node whose outputs become visible when
/// its nested blocks are done.
struct Frame {
    block: BlockId,
    next: usize,
    mark: Option<usize>,
    pending: Option<NodeId>,
}

impl Frame {
    fn new(block: BlockId) -> Self {
        Self {
            block,
            next: 0,
            mark: None,
            pending: None,
        }
    }
}

impl Graph {
    /// Check the scoping rules of the graph.
    ///
    /// Every operand must be defined earlier in its block or in an enclosing
    /// block before the owning node, block returns must be in scope, and
    /// every node must be listed in exactly one block. Nesting depth is
    /// bounded only by memory.
    pub fn validate(&self) -> Result<()> {
        let root = self.block(self.root())?;
        if root.owner.is_some() {
            return Err(anyhow!("root block must not have an owner"));
        }
        let mut seen = HashSet::new();
        let mut scope = Scope::default();
        let mut stack = vec![Frame::new(self.root())];
        while let Some(frame) = stack.last_mut() {
            let block = frame.block;
            let mark = match frame.mark {
                Some(mark) => mark,
                None => {
                    let mark = scope.mark();
                    self.enter_block(block, &mut scope)?;
                    frame.mark = Some(mark);
                    mark
                }
            };
            if let Some(done) = frame.pending.take() {
                for output in &self.node(done)?.outputs {
                    scope.define(*output);
                }
            }

            let data = self.block(block)?;
            let Some(id) = data.nodes.get(frame.next).copied() else {
                for ret in &data.returns {
                    if !scope.contains(ret) {
                        return Err(anyhow!("{} returns {} which is not in scope", block, ret));
                    }
                }
                scope.rewind(mark);
                stack.pop();
                continue;
            };
            frame.next += 1;
            frame.pending = Some(id);

            let node = self.node(id)?;
            self.validate_node(block, node, &scope, &mut seen)
                .with_context(|| format!("{} node {}", block, describe_node(node)))?;
            for nested in node.blocks.iter().rev() {
                stack.push(Frame::new(*nested));
            }
        }
        if seen.len() != self.node_count() {
            let orphan = self
                .nodes()
                .find(|node| !seen.contains(&node.id))
                .map(|node| node.id.to_string())
                .unwrap_or_default();
            return Err(anyhow!("node {} is not listed in any block", orphan));
        }
        Ok(())
    }

    fn enter_block(&self, block: BlockId, scope: &mut Scope) -> Result<()> {
        let data = self.block(block)?;
        for (index, param) in data.params.iter().enumerate() {
            let value = self.value(*param)?;
            if value.producer != (Producer::Param { block, index }) {
                return Err(anyhow!("param {} of {} has a foreign producer", param, block));
            }
            scope.define(*param);
        }
        Ok(())
    }

    fn validate_node(
        &self,
        block: BlockId,
        node: &Node,
        scope: &Scope,
        seen: &mut HashSet<NodeId>,
    ) -> Result<()> {
        if node.owner != block {
            return Err(anyhow!("node is owned by {}", node.owner));
        }
        if !seen.insert(node.id) {
            return Err(anyhow!("node is listed twice"));
        }
        for input in &node.inputs {
            if !scope.contains(input) {
                return Err(anyhow!("operand {} is not defined before use", input));
            }
        }
        for nested in &node.blocks {
            if self.block(*nested)?.owner != Some(node.id) {
                return Err(anyhow!("{} does not point back to its owner", nested));
            }
        }
        for (index, output) in node.outputs.iter().enumerate() {
            let value = self.value(*output)?;
            if value.producer != (Producer::Node { node: node.id, index }) {
                return Err(anyhow!("output {} has a foreign producer", output));
            }
        }
        Ok(())
    }
}
