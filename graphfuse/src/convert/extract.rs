use std::collections::HashMap;

use anyhow::Result;

use crate::engine::ValueDescriptor;
use crate::fusion::{FusionGroup, GroupId};
use crate::graph::{Graph, ValueId};

/// A fusion group lifted out into a graph of its own.
///
/// The root params mirror the group's input frontier and the root returns
/// its output frontier, in the same order.
#[derive(Debug, Clone)]
pub struct Subgraph {
    pub group: GroupId,
    pub graph: Graph,
    /// Host values feeding each root param.
    pub inputs: Vec<ValueId>,
    /// Host values produced by each root return.
    pub outputs: Vec<ValueId>,
    pub input_descriptors: Vec<ValueDescriptor>,
    pub output_descriptors: Vec<ValueDescriptor>,
}

/// Copy the members of `group` into a standalone graph.
///
/// # Panics
/// If a member reads a value that is neither produced inside the group nor
/// listed in its input frontier. That is a clustering bug, not a
/// recoverable condition.
pub fn extract_subgraph(graph: &Graph, group: &FusionGroup) -> Result<Subgraph> {
    let mut sub = Graph::new();
    let root = sub.root();
    let mut mapped: HashMap<ValueId, ValueId> = HashMap::new();
    let mut input_descriptors = Vec::new();

    for input in &group.inputs {
        let value = graph.value(*input)?;
        let param = sub.add_param(root, value.ty.clone())?;
        if let Some(name) = &value.name {
            sub.set_value_name(param, name.clone())?;
        }
        mapped.insert(*input, param);
        input_descriptors.push(describe(graph, *input)?);
    }

    for member in &group.nodes {
        let node = graph.node(*member)?;
        let inputs = node
            .inputs
            .iter()
            .map(|input| {
                mapped.get(input).copied().unwrap_or_else(|| {
                    panic!(
                        "{} node {} reads {} outside its frontier",
                        group.id, member, input
                    )
                })
            })
            .collect();
        let output_types = node
            .outputs
            .iter()
            .map(|output| graph.value_type(*output).cloned())
            .collect::<Result<Vec<_>>>()?;
        let copy = sub.append_node(root, node.kind.clone(), inputs, output_types)?;
        let copied_outputs = sub.node(copy)?.outputs.clone();
        for (original, copied) in node.outputs.iter().zip(copied_outputs) {
            if let Some(name) = &graph.value(*original)?.name {
                sub.set_value_name(copied, name.clone())?;
            }
            mapped.insert(*original, copied);
        }
    }

    let mut returns = Vec::with_capacity(group.outputs.len());
    let mut output_descriptors = Vec::with_capacity(group.outputs.len());
    for output in &group.outputs {
        let copied = mapped.get(output).copied().unwrap_or_else(|| {
            panic!("{} lists {} as output but does not produce it", group.id, output)
        });
        returns.push(copied);
        output_descriptors.push(describe(graph, *output)?);
    }
    sub.set_returns(root, returns)?;

    Ok(Subgraph {
        group: group.id,
        graph: sub,
        inputs: group.inputs.clone(),
        outputs: group.outputs.clone(),
        input_descriptors,
        output_descriptors,
    })
}

fn describe(graph: &Graph, value: ValueId) -> Result<ValueDescriptor> {
    let data = graph.value(value)?;
    Ok(ValueDescriptor {
        name: data.name.clone().unwrap_or_else(|| value.to_string()),
        ty: data.ty.clone(),
    })
}
