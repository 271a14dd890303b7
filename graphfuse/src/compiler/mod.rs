mod lower;
mod toolchain;

use anyhow::Result;

use crate::convert::Subgraph;
use crate::engine::DeviceTags;

pub use lower::{lower_subgraph, LoweredSubgraph};
pub use toolchain::{metadata_path, ToolchainCompiler};

/// Output of one successful compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledEngine {
    pub binary: Vec<u8>,
    pub metadata: Vec<u8>,
    pub input_devices: DeviceTags,
    pub output_devices: DeviceTags,
}

/// Compiles one extracted subgraph into an engine.
///
/// Compilations of different groups are independent and may run
/// concurrently.
pub trait EngineCompiler: Send + Sync {
    fn compile(&self, subgraph: &Subgraph) -> Result<CompiledEngine>;
}

impl<F> EngineCompiler for F
where
    F: Fn(&Subgraph) -> Result<CompiledEngine> + Send + Sync,
{
    fn compile(&self, subgraph: &Subgraph) -> Result<CompiledEngine> {
        self(subgraph)
    }
}
