use std::collections::HashSet;

use anyhow::{anyhow, Result};

use crate::fusion::{BlockDeps, FusionGroup};
use crate::graph::{Graph, ValueType};

use super::arity::{ArityConvention, CallSite};

/// Replace the members of `group` with a call to `engine`.
///
/// The call lands in the slot of the last member. Non-members sitting
/// between the first and last member keep their place when they are
/// independent of the group and move behind the call when they consume
/// something it produces. Every external consumer of a frontier output is
/// rewired to the matching call result, then the members are removed.
/// Returns the emitted call site.
pub fn splice_group(
    graph: &mut Graph,
    group: &FusionGroup,
    engine: &str,
    result: &ValueType,
    convention: ArityConvention,
) -> Result<CallSite> {
    let ValueType::Tuple(output_types) = result else {
        return Err(anyhow!("engine {} must produce a tuple type, got {}", engine, result));
    };
    if output_types.len() != group.outputs.len() {
        return Err(anyhow!(
            "engine {} yields {} values but {} has {} frontier outputs",
            engine,
            output_types.len(),
            group.id,
            group.outputs.len()
        ));
    }
    let block = group.block;
    let order = graph.block(block)?.nodes.clone();
    let members = group.nodes.iter().copied().collect::<HashSet<_>>();
    let mut member_positions = Vec::with_capacity(members.len());
    for (pos, node) in order.iter().enumerate() {
        if members.contains(node) {
            member_positions.push(pos);
        }
    }
    if member_positions.len() != members.len() {
        return Err(anyhow!("{} has members outside {}", group.id, block));
    }
    let (Some(&first), Some(&last)) = (member_positions.first(), member_positions.last()) else {
        return Err(anyhow!("{} has no members", group.id));
    };
    for input in &group.inputs {
        graph.value(*input)?;
    }
    let downstream = BlockDeps::build(graph, block)?.downstream_of(&members);

    let site = convention.emit_call(graph, block, last + 1, engine, &group.inputs, result)?;
    for (old, new) in group.outputs.iter().zip(site.outputs.iter()) {
        graph.replace_all_uses_with(*old, *new)?;
    }
    for member in group.nodes.iter().rev() {
        graph.remove_node(*member)?;
    }

    let mut before = Vec::with_capacity(order.len());
    let mut after = Vec::new();
    for (pos, node) in order.iter().enumerate() {
        if members.contains(node) {
            continue;
        }
        if pos < first || (pos < last && !downstream.contains(node)) {
            before.push(*node);
        } else {
            after.push(*node);
        }
    }
    before.extend(site.nodes.iter().copied());
    before.extend(after);
    graph.reorder_block(block, before)?;
    Ok(site)
}
