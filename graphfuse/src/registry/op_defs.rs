use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::graph::DType;

/// Number of operands an op accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

/// Static description of an operator the engine compiler can lower.
#[derive(Debug, Clone, Copy)]
pub struct OpDef {
    pub name: &'static str,
    pub inputs: Arity,
    pub outputs: usize,
    /// Accepted tensor operand dtypes; empty accepts any.
    pub dtypes: &'static [DType],
}

const FLOATS: &[DType] = &[DType::F16, DType::BF16, DType::F32, DType::F64];
const NUMERIC: &[DType] = &[
    DType::F16,
    DType::BF16,
    DType::F32,
    DType::F64,
    DType::I8,
    DType::I32,
    DType::I64,
    DType::U8,
];

const fn op(name: &'static str, inputs: Arity, outputs: usize, dtypes: &'static [DType]) -> OpDef {
    OpDef {
        name,
        inputs,
        outputs,
        dtypes,
    }
}

pub const OPS: &[OpDef] = &[
    op("prim::Constant", Arity::Fixed(0), 1, &[]),
    op("aten::add", Arity::Fixed(2), 1, NUMERIC),
    op("aten::sub", Arity::Fixed(2), 1, NUMERIC),
    op("aten::mul", Arity::Fixed(2), 1, NUMERIC),
    op("aten::div", Arity::Fixed(2), 1, NUMERIC),
    op("aten::neg", Arity::Fixed(1), 1, NUMERIC),
    op("aten::abs", Arity::Fixed(1), 1, NUMERIC),
    op("aten::relu", Arity::Fixed(1), 1, NUMERIC),
    op("aten::gelu", Arity::Fixed(1), 1, FLOATS),
    op("aten::tanh", Arity::Fixed(1), 1, FLOATS),
    op("aten::sigmoid", Arity::Fixed(1), 1, FLOATS),
    op("aten::exp", Arity::Fixed(1), 1, FLOATS),
    op("aten::softmax", Arity::Fixed(1), 1, FLOATS),
    op("aten::matmul", Arity::Fixed(2), 1, FLOATS),
    op("aten::addmm", Arity::Fixed(3), 1, FLOATS),
    op("aten::cat", Arity::AtLeast(1), 1, NUMERIC),
    op("aten::reshape", Arity::Fixed(1), 1, &[]),
    op("aten::permute", Arity::Fixed(1), 1, &[]),
    op("aten::transpose", Arity::Fixed(1), 1, &[]),
    op("aten::sum", Arity::Fixed(1), 1, NUMERIC),
    op("aten::mean", Arity::Fixed(1), 1, FLOATS),
    op("aten::item", Arity::Fixed(1), 1, NUMERIC),
    op("aten::Int", Arity::Fixed(1), 1, &[]),
    op("aten::tensor", Arity::Fixed(1), 1, &[]),
];

static OP_INDEX: Lazy<HashMap<&'static str, &'static OpDef>> =
    Lazy::new(|| OPS.iter().map(|def| (def.name, def)).collect());

/// Look up an op definition by its qualified name.
pub fn op_def(name: &str) -> Option<&'static OpDef> {
    OP_INDEX.get(name).copied()
}
