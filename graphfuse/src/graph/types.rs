//! Core graph data types.
//!
//! A graph is an arena of nodes, values and blocks. Blocks nest under the
//! node that owns them (loop bodies, branch arms). The root block takes the
//! graph inputs as params and hands the graph outputs back as returns.
use std::collections::BTreeMap;
use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block{}", self.0)
    }
}

/// Element type of a tensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    F16,
    BF16,
    F32,
    F64,
    I8,
    I32,
    I64,
    U8,
    Bool,
}

impl DType {
    pub fn as_str(self) -> &'static str {
        match self {
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I8 => "i8",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::Bool => "bool",
        }
    }
}

/// Device a tensor value is expected to live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

/// Type carried by a value edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueType {
    Tensor {
        dtype: DType,
        dims: Vec<usize>,
        device: Device,
    },
    Int,
    Float,
    Bool,
    Tuple(Vec<ValueType>),
}

impl ValueType {
    /// Tensor type placed on the CPU.
    pub fn tensor(dtype: DType, dims: &[usize]) -> Self {
        ValueType::Tensor {
            dtype,
            dims: dims.to_vec(),
            device: Device::Cpu,
        }
    }

    /// Same type moved to `device`; non-tensor types are returned unchanged.
    pub fn on(self, device: Device) -> Self {
        match self {
            ValueType::Tensor { dtype, dims, .. } => ValueType::Tensor {
                dtype,
                dims,
                device,
            },
            other => other,
        }
    }

    pub fn dtype(&self) -> Option<DType> {
        match self {
            ValueType::Tensor { dtype, .. } => Some(*dtype),
            _ => None,
        }
    }

    /// Device of a tensor; scalars and tuples are host-side.
    pub fn device(&self) -> Device {
        match self {
            ValueType::Tensor { device, .. } => *device,
            _ => Device::Cpu,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Tensor {
                dtype,
                dims,
                device,
            } => {
                let dims = dims
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "{}[{}]@{}", dtype.as_str(), dims, device.as_str())
            }
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Tuple(items) => {
                let items = items
                    .iter()
                    .map(|item| item.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "({})", items)
            }
        }
    }
}

/// Attribute value used by ops and constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    IntList(Vec<i64>),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Float(value) => write!(f, "{}", value),
            AttrValue::Int(value) => write!(f, "{}", value),
            AttrValue::Bool(value) => write!(f, "{}", value),
            AttrValue::Str(value) => write!(f, "\"{}\"", value),
            AttrValue::IntList(values) => write!(f, "{:?}", values),
        }
    }
}

/// Named attribute for an op invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpAttr {
    pub name: String,
    pub value: AttrValue,
}

/// Collection of op attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OpAttrs {
    pub items: Vec<OpAttr>,
}

impl OpAttrs {
    /// Build an empty attribute set.
    pub fn none() -> Self {
        Self { items: Vec::new() }
    }

    pub fn with(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.items.push(OpAttr {
            name: name.into(),
            value,
        });
        self
    }
}

/// Node variants that make up a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// An ordinary operator identified by its qualified name (`aten::add`).
    Op { op: String, attrs: OpAttrs },
    Constant { value: AttrValue },
    /// Two nested blocks: then, else.
    If,
    /// One nested block: the body.
    Loop,
    TupleConstruct,
    TupleUnpack,
    /// Invocation of a compiled engine registered on the module.
    EngineCall { engine: String },
}

impl NodeKind {
    pub fn op(name: impl Into<String>) -> Self {
        NodeKind::Op {
            op: name.into(),
            attrs: OpAttrs::none(),
        }
    }

    pub fn op_with(name: impl Into<String>, attrs: OpAttrs) -> Self {
        NodeKind::Op {
            op: name.into(),
            attrs,
        }
    }

    /// Operator-kind identifier used for classification and deny-lists.
    pub fn name(&self) -> &str {
        match self {
            NodeKind::Op { op, .. } => op,
            NodeKind::Constant { .. } => "prim::Constant",
            NodeKind::If => "prim::If",
            NodeKind::Loop => "prim::Loop",
            NodeKind::TupleConstruct => "prim::TupleConstruct",
            NodeKind::TupleUnpack => "prim::TupleUnpack",
            NodeKind::EngineCall { .. } => "engine::call",
        }
    }
}

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Producer {
    Node { node: NodeId, index: usize },
    Param { block: BlockId, index: usize },
}

/// A consumer slot of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Use {
    Node { node: NodeId, index: usize },
    Return { block: BlockId, index: usize },
}

/// A typed data edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub id: ValueId,
    pub ty: ValueType,
    pub producer: Producer,
    #[serde(default)]
    pub name: Option<String>,
}

/// A graph node with identity, operands, results and nested blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub uuid: Uuid,
    pub kind: NodeKind,
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
    pub blocks: Vec<BlockId>,
    pub owner: BlockId,
}

/// An ordered list of nodes with params and returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub params: Vec<ValueId>,
    pub nodes: Vec<NodeId>,
    pub returns: Vec<ValueId>,
    pub owner: Option<NodeId>,
}

/// Hierarchical dataflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    values: BTreeMap<ValueId, Value>,
    blocks: BTreeMap<BlockId, Block>,
    root: BlockId,
    next_node: usize,
    next_value: usize,
    next_block: usize,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create a graph holding only an empty root block.
    pub fn new() -> Self {
        let root = BlockId(0);
        let mut blocks = BTreeMap::new();
        blocks.insert(
            root,
            Block {
                id: root,
                params: Vec::new(),
                nodes: Vec::new(),
                returns: Vec::new(),
                owner: None,
            },
        );
        Self {
            nodes: BTreeMap::new(),
            values: BTreeMap::new(),
            blocks,
            root,
            next_node: 0,
            next_value: 0,
            next_block: 1,
        }
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    /// Fetch a node by id.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| anyhow!("missing node: {}", id))
    }

    /// Fetch a value by id.
    pub fn value(&self, id: ValueId) -> Result<&Value> {
        self.values
            .get(&id)
            .ok_or_else(|| anyhow!("missing value: {}", id))
    }

    /// Fetch a block by id.
    pub fn block(&self, id: BlockId) -> Result<&Block> {
        self.blocks
            .get(&id)
            .ok_or_else(|| anyhow!("missing block: {}", id))
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Type of a value.
    pub fn value_type(&self, id: ValueId) -> Result<&ValueType> {
        Ok(&self.value(id)?.ty)
    }

    /// The `index`-th output of `node`.
    pub fn output(&self, node: NodeId, index: usize) -> Result<ValueId> {
        self.node(node)?
            .outputs
            .get(index)
            .copied()
            .ok_or_else(|| anyhow!("node {} has no output {}", node, index))
    }

    /// Node that produces `value`, if it is not a block param.
    pub fn producer_node(&self, value: ValueId) -> Result<Option<NodeId>> {
        Ok(match self.value(value)?.producer {
            Producer::Node { node, .. } => Some(node),
            Producer::Param { .. } => None,
        })
    }

    /// Attach a debug name to a value.
    pub fn set_value_name(&mut self, value: ValueId, name: impl Into<String>) -> Result<()> {
        let entry = self
            .values
            .get_mut(&value)
            .ok_or_else(|| anyhow!("missing value: {}", value))?;
        entry.name = Some(name.into());
        Ok(())
    }

    /// Append a param (block input) to `block`.
    pub fn add_param(&mut self, block: BlockId, ty: ValueType) -> Result<ValueId> {
        let index = self.block(block)?.params.len();
        let id = self.alloc_value(ty, Producer::Param { block, index });
        self.block_mut(block)?.params.push(id);
        Ok(id)
    }

    /// Append a node to the end of `block`.
    pub fn append_node(
        &mut self,
        block: BlockId,
        kind: NodeKind,
        inputs: Vec<ValueId>,
        output_types: Vec<ValueType>,
    ) -> Result<NodeId> {
        let position = self.block(block)?.nodes.len();
        self.insert_node(block, position, kind, inputs, output_types)
    }

    /// Insert a node into `block` at `position`.
    pub fn insert_node(
        &mut self,
        block: BlockId,
        position: usize,
        kind: NodeKind,
        inputs: Vec<ValueId>,
        output_types: Vec<ValueType>,
    ) -> Result<NodeId> {
        let len = self.block(block)?.nodes.len();
        if position > len {
            return Err(anyhow!(
                "position {} out of range for {} with {} nodes",
                position,
                block,
                len
            ));
        }
        for input in &inputs {
            self.value(*input)?;
        }
        let id = NodeId(self.next_node);
        self.next_node += 1;
        let outputs = output_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| self.alloc_value(ty, Producer::Node { node: id, index }))
            .collect();
        self.nodes.insert(
            id,
            Node {
                id,
                uuid: Uuid::new_v4(),
                kind,
                inputs,
                outputs,
                blocks: Vec::new(),
                owner: block,
            },
        );
        self.block_mut(block)?.nodes.insert(position, id);
        Ok(id)
    }

    /// Create a nested block owned by `node`.
    pub fn add_block(&mut self, node: NodeId) -> Result<BlockId> {
        self.node(node)?;
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.insert(
            id,
            Block {
                id,
                params: Vec::new(),
                nodes: Vec::new(),
                returns: Vec::new(),
                owner: Some(node),
            },
        );
        self.node_mut(node)?.blocks.push(id);
        Ok(id)
    }

    /// Set the values a block hands back to its owner.
    pub fn set_returns(&mut self, block: BlockId, values: Vec<ValueId>) -> Result<()> {
        for value in &values {
            self.value(*value)?;
        }
        self.block_mut(block)?.returns = values;
        Ok(())
    }

    /// All consumer slots of `value`, including nested blocks and returns.
    pub fn uses(&self, value: ValueId) -> Vec<Use> {
        let mut uses = Vec::new();
        for node in self.nodes.values() {
            for (index, input) in node.inputs.iter().enumerate() {
                if *input == value {
                    uses.push(Use::Node {
                        node: node.id,
                        index,
                    });
                }
            }
        }
        for block in self.blocks.values() {
            for (index, ret) in block.returns.iter().enumerate() {
                if *ret == value {
                    uses.push(Use::Return {
                        block: block.id,
                        index,
                    });
                }
            }
        }
        uses
    }

    /// Point every consumer of `old` at `new`.
    pub fn replace_all_uses_with(&mut self, old: ValueId, new: ValueId) -> Result<()> {
        self.value(old)?;
        self.value(new)?;
        for node in self.nodes.values_mut() {
            for input in node.inputs.iter_mut() {
                if *input == old {
                    *input = new;
                }
            }
        }
        for block in self.blocks.values_mut() {
            for ret in block.returns.iter_mut() {
                if *ret == old {
                    *ret = new;
                }
            }
        }
        Ok(())
    }

    /// Remove a node whose outputs are no longer consumed.
    ///
    /// Nested blocks of the node are removed with it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?.clone();
        for output in &node.outputs {
            let live = self
                .uses(*output)
                .into_iter()
                .any(|u| !self.use_is_inside(u, id));
            if live {
                return Err(anyhow!("cannot remove {}: output {} still in use", id, output));
            }
        }
        let mut stack = node.blocks.clone();
        while let Some(block) = stack.pop() {
            let Some(removed) = self.blocks.remove(&block) else {
                continue;
            };
            for param in removed.params {
                self.values.remove(&param);
            }
            for inner in removed.nodes {
                if let Some(inner) = self.nodes.remove(&inner) {
                    for output in inner.outputs {
                        self.values.remove(&output);
                    }
                    stack.extend(inner.blocks);
                }
            }
        }
        for output in &node.outputs {
            self.values.remove(output);
        }
        self.block_mut(node.owner)?.nodes.retain(|n| *n != id);
        self.nodes.remove(&id);
        Ok(())
    }

    /// Replace the node order of `block` with a permutation of itself.
    pub fn reorder_block(&mut self, block: BlockId, order: Vec<NodeId>) -> Result<()> {
        let current = &self.block(block)?.nodes;
        let mut expected = current.clone();
        let mut proposed = order.clone();
        expected.sort();
        proposed.sort();
        if expected != proposed {
            return Err(anyhow!("new order for {} is not a permutation", block));
        }
        self.block_mut(block)?.nodes = order;
        Ok(())
    }

    /// Position of `node` inside its owning block.
    pub fn position(&self, node: NodeId) -> Result<usize> {
        let owner = self.node(node)?.owner;
        self.block(owner)?
            .nodes
            .iter()
            .position(|n| *n == node)
            .ok_or_else(|| anyhow!("node {} not listed in {}", node, owner))
    }

    /// Lift `node` to the node of `block` that (transitively) contains it.
    pub fn enclosing_node_in(&self, node: NodeId, block: BlockId) -> Option<NodeId> {
        let mut current = node;
        loop {
            let owner = self.nodes.get(&current)?.owner;
            if owner == block {
                return Some(current);
            }
            current = self.blocks.get(&owner)?.owner?;
        }
    }

    /// True if `ancestor` is `block` or encloses it.
    pub fn is_ancestor_block(&self, ancestor: BlockId, block: BlockId) -> bool {
        let mut current = Some(block);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self
                .blocks
                .get(&id)
                .and_then(|b| b.owner)
                .and_then(|owner| self.nodes.get(&owner))
                .map(|owner| owner.owner);
        }
        false
    }

    /// Blocks in post-order: every nested block precedes the block owning it.
    pub fn blocks_post_order(&self) -> Vec<BlockId> {
        let mut order = Vec::new();
        let mut stack = vec![(self.root, false)];
        while let Some((block, expanded)) = stack.pop() {
            if expanded {
                order.push(block);
                continue;
            }
            stack.push((block, true));
            let Some(data) = self.blocks.get(&block) else {
                continue;
            };
            for node in data.nodes.iter().rev() {
                if let Some(node) = self.nodes.get(node) {
                    for nested in node.blocks.iter().rev() {
                        stack.push((*nested, false));
                    }
                }
            }
        }
        order
    }

    fn use_is_inside(&self, u: Use, node: NodeId) -> bool {
        match u {
            Use::Node { node: user, .. } => {
                user == node
                    || self
                        .nodes
                        .get(&user)
                        .and_then(|n| self.enclosing_owner_chain_contains(n.owner, node))
                        .unwrap_or(false)
            }
            Use::Return { block, .. } => self
                .enclosing_owner_chain_contains(block, node)
                .unwrap_or(false),
        }
    }

    fn enclosing_owner_chain_contains(&self, block: BlockId, node: NodeId) -> Option<bool> {
        let mut current = block;
        loop {
            let owner = self.blocks.get(&current)?.owner?;
            if owner == node {
                return Some(true);
            }
            current = self.nodes.get(&owner)?.owner;
        }
    }

    fn alloc_value(&mut self, ty: ValueType, producer: Producer) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        self.values.insert(
            id,
            Value {
                id,
                ty,
                producer,
                name: None,
            },
        );
        id
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| anyhow!("missing node: {}", id))
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut Block> {
        self.blocks
            .get_mut(&id)
            .ok_or_else(|| anyhow!("missing block: {}", id))
    }
}
