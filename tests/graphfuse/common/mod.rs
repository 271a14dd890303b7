#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use graphfuse::{
    BlockId, CompiledEngine, DType, DeviceTags, EngineCompiler, FusionGroup, Graph, GroupId,
    NodeId, NodeKind, Subgraph, ValueId, ValueType,
};

/// Serializes tests that spawn the toolchain script.
pub static TOOLCHAIN_LOCK: Mutex<()> = Mutex::new(());

pub fn f32_tensor(dims: &[usize]) -> ValueType {
    ValueType::tensor(DType::F32, dims)
}

/// Append an op with one f32[2,3] result.
pub fn op(graph: &mut Graph, block: BlockId, name: &str, inputs: &[ValueId]) -> Result<NodeId> {
    graph.append_node(
        block,
        NodeKind::op(name),
        inputs.to_vec(),
        vec![f32_tensor(&[2, 3])],
    )
}

pub fn out(graph: &Graph, node: NodeId) -> Result<ValueId> {
    graph.output(node, 0)
}

/// `x -> A -> B -> C -> D -> E -> return`, with C using `middle`.
pub struct Chain {
    pub graph: Graph,
    pub input: ValueId,
    pub nodes: Vec<NodeId>,
}

pub fn chain(middle: &str) -> Result<Chain> {
    let mut graph = Graph::new();
    let root = graph.root();
    let input = graph.add_param(root, f32_tensor(&[2, 3]))?;
    graph.set_value_name(input, "x")?;
    let mut nodes = Vec::new();
    let mut prev = input;
    for name in ["aten::relu", "aten::neg", middle, "aten::abs", "aten::tanh"] {
        let node = op(&mut graph, root, name, &[prev])?;
        prev = out(&graph, node)?;
        nodes.push(node);
    }
    graph.set_returns(root, vec![prev])?;
    Ok(Chain {
        graph,
        input,
        nodes,
    })
}

pub fn member_sets(groups: &[FusionGroup]) -> Vec<Vec<NodeId>> {
    groups.iter().map(|group| group.nodes.clone()).collect()
}

pub fn engine_for(subgraph: &Subgraph) -> CompiledEngine {
    CompiledEngine {
        binary: format!("engine:{}", subgraph.group).into_bytes(),
        metadata: format!("inputs:{} outputs:{}", subgraph.inputs.len(), subgraph.outputs.len())
            .into_bytes(),
        input_devices: DeviceTags::from_descriptors(&subgraph.input_descriptors),
        output_devices: DeviceTags::from_descriptors(&subgraph.output_descriptors),
    }
}

pub fn always_ok(subgraph: &Subgraph) -> Result<CompiledEngine> {
    Ok(engine_for(subgraph))
}

pub fn always_fail(subgraph: &Subgraph) -> Result<CompiledEngine> {
    Err(anyhow!("toolchain rejected {}", subgraph.group))
}

/// Fails the listed groups and compiles the rest.
pub struct FailFor(pub HashSet<GroupId>);

impl EngineCompiler for FailFor {
    fn compile(&self, subgraph: &Subgraph) -> Result<CompiledEngine> {
        if self.0.contains(&subgraph.group) {
            return Err(anyhow!("unsupported construct in {}", subgraph.group));
        }
        Ok(engine_for(subgraph))
    }
}

/// Counts invocations and always succeeds.
#[derive(Default)]
pub struct Counting(pub AtomicUsize);

impl EngineCompiler for Counting {
    fn compile(&self, subgraph: &Subgraph) -> Result<CompiledEngine> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(engine_for(subgraph))
    }
}

/// Node ids of every node kind `name` anywhere in the graph.
pub fn nodes_of_kind(graph: &Graph, name: &str) -> Vec<NodeId> {
    graph
        .nodes()
        .filter(|node| node.kind.name() == name)
        .map(|node| node.id)
        .collect()
}

/// `depth` loops nested inside each other with one relu in the innermost
/// body, which reads the root param and returns its result.
pub struct NestedLoops {
    pub graph: Graph,
    pub innermost: BlockId,
    pub relu: NodeId,
}

pub fn nested_loops(depth: usize) -> Result<NestedLoops> {
    let mut graph = Graph::new();
    let root = graph.root();
    let x = graph.add_param(root, f32_tensor(&[2, 3]))?;
    let mut block = root;
    for _ in 0..depth {
        let lp = graph.append_node(block, NodeKind::Loop, vec![], vec![])?;
        block = graph.add_block(lp)?;
    }
    let relu = op(&mut graph, block, "aten::relu", &[x])?;
    let relu_out = out(&graph, relu)?;
    graph.set_returns(block, vec![relu_out])?;
    Ok(NestedLoops {
        graph,
        innermost: block,
        relu,
    })
}
