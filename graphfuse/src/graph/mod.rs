mod json;
mod node;
mod types;
mod validate;

pub use json::{GraphDeserialize, GraphSerialize};
pub use node::describe_node;
pub use types::{
    AttrValue, Block, BlockId, DType, Device, Graph, Node, NodeId, NodeKind, OpAttr, OpAttrs,
    Producer, Use, Value, ValueId, ValueType,
};
