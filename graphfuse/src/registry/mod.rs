mod op_defs;
mod support;

pub use op_defs::{op_def, Arity, OpDef, OPS};
pub use support::{OpRegistry, OpSupport};
