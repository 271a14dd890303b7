use anyhow::{Context, Result};

use crate::convert::Subgraph;
use crate::engine::DeviceTags;
use crate::graph::GraphSerialize;

/// A subgraph rendered for the external compiler.
#[derive(Debug, Clone)]
pub struct LoweredSubgraph {
    /// Machine-readable input for the compiler.
    pub ir: String,
    /// Human-readable listing kept next to the IR for debugging.
    pub pretty: String,
    pub input_devices: DeviceTags,
    pub output_devices: DeviceTags,
}

pub fn lower_subgraph(subgraph: &Subgraph) -> Result<LoweredSubgraph> {
    let ir = GraphSerialize::json_string(&subgraph.graph)
        .with_context(|| format!("serialize {}", subgraph.group))?;
    Ok(LoweredSubgraph {
        ir,
        pretty: subgraph.graph.to_string(),
        input_devices: DeviceTags::from_descriptors(&subgraph.input_descriptors),
        output_devices: DeviceTags::from_descriptors(&subgraph.output_descriptors),
    })
}
