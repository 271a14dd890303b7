//! Partition dataflow graphs into fusion groups and swap each group for a
//! call into an ahead-of-time compiled engine.
//!
//! The pass runs in two stages. Clustering walks the block tree bottom-up
//! and merges connected eligible nodes into [`FusionGroup`]s. Conversion
//! hands each group to an [`EngineCompiler`]; successful groups are replaced
//! by a single engine call node, failed groups stay exactly as they were.
pub mod logging;

mod classify;
mod compiler;
mod config;
mod convert;
mod engine;
mod fusion;
mod graph;
mod module;
mod pipeline;
mod registry;

pub use classify::{Classification, SupportClassifier};
pub use compiler::{
    lower_subgraph, metadata_path, CompiledEngine, EngineCompiler, LoweredSubgraph,
    ToolchainCompiler,
};
pub use config::{FusionConfig, ToolchainConfig};
pub use convert::{
    extract_subgraph, splice_group, ArityConvention, CallSite, ConversionError,
    ConversionReport, Converter, GroupOutcome, Subgraph,
};
pub use engine::{DeviceTags, EngineArtifact, ValueDescriptor};
pub use fusion::{cluster_block, cluster_graph, BlockDeps, ClusterPlan, FusionGroup, GroupId};
pub use graph::{
    describe_node, AttrValue, Block, BlockId, DType, Device, Graph, GraphDeserialize,
    GraphSerialize, Node, NodeId, NodeKind, OpAttr, OpAttrs, Producer, Use, Value, ValueId,
    ValueType,
};
pub use module::{Module, ModuleAttr};
pub use pipeline::{optimize_module, optimize_module_with, optimize_module_with_toolchain};
pub use registry::{op_def, Arity, OpDef, OpRegistry, OpSupport, OPS};
