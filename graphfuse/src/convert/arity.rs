use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::graph::{BlockId, Graph, NodeId, NodeKind, ValueId, ValueType};

/// How a group's frontier maps onto the engine call's operands and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArityConvention {
    /// One operand per frontier input and one result per frontier output.
    Natural,
    /// Always a single tuple operand and a single tuple result, whatever the
    /// frontier size (zero included). A `prim::TupleConstruct` packs the
    /// inputs before the call and a `prim::TupleUnpack` restores the outputs
    /// after it.
    #[default]
    Packed,
}

/// Nodes emitted for one engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Every emitted node in block order, the call included.
    pub nodes: Vec<NodeId>,
    pub call: NodeId,
    /// Values standing in for the group's frontier outputs, in order.
    pub outputs: Vec<ValueId>,
}

impl ArityConvention {
    /// `(operands, results)` of the call node for a frontier of this size.
    pub fn call_arity(self, inputs: usize, outputs: usize) -> (usize, usize) {
        match self {
            ArityConvention::Natural => (inputs, outputs),
            ArityConvention::Packed => (1, 1),
        }
    }

    /// Insert the call for `engine` at `position` of `block`.
    ///
    /// `result` is the tuple type returned by engine registration.
    pub(crate) fn emit_call(
        self,
        graph: &mut Graph,
        block: BlockId,
        position: usize,
        engine: &str,
        inputs: &[ValueId],
        result: &ValueType,
    ) -> Result<CallSite> {
        let ValueType::Tuple(output_types) = result else {
            return Err(anyhow!("engine {} must produce a tuple type, got {}", engine, result));
        };
        let call_kind = NodeKind::EngineCall {
            engine: engine.to_string(),
        };
        match self {
            ArityConvention::Natural => {
                let call = graph.insert_node(
                    block,
                    position,
                    call_kind,
                    inputs.to_vec(),
                    output_types.clone(),
                )?;
                Ok(CallSite {
                    nodes: vec![call],
                    call,
                    outputs: graph.node(call)?.outputs.clone(),
                })
            }
            ArityConvention::Packed => {
                let input_types = inputs
                    .iter()
                    .map(|input| graph.value_type(*input).cloned())
                    .collect::<Result<Vec<_>>>()?;
                let pack = graph.insert_node(
                    block,
                    position,
                    NodeKind::TupleConstruct,
                    inputs.to_vec(),
                    vec![ValueType::Tuple(input_types)],
                )?;
                let packed = graph.output(pack, 0)?;
                let call = graph.insert_node(
                    block,
                    position + 1,
                    call_kind,
                    vec![packed],
                    vec![result.clone()],
                )?;
                let returned = graph.output(call, 0)?;
                let unpack = graph.insert_node(
                    block,
                    position + 2,
                    NodeKind::TupleUnpack,
                    vec![returned],
                    output_types.clone(),
                )?;
                Ok(CallSite {
                    nodes: vec![pack, call, unpack],
                    call,
                    outputs: graph.node(unpack)?.outputs.clone(),
                })
            }
        }
    }
}
