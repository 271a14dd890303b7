use anyhow::{Context, Result};

use crate::classify::SupportClassifier;
use crate::compiler::{EngineCompiler, ToolchainCompiler};
use crate::config::FusionConfig;
use crate::convert::{ConversionReport, Converter};
use crate::fusion::cluster_graph;
use crate::module::Module;

/// Cluster every block of the module's graph and convert the groups.
///
/// Failed groups stay in the graph; see [`ConversionReport`]. An `Err` means
/// the input graph was malformed or the rewrite broke an invariant.
pub fn optimize_module(
    module: &mut Module,
    config: &FusionConfig,
    compiler: &dyn EngineCompiler,
) -> Result<ConversionReport> {
    let classifier = SupportClassifier::new(config);
    optimize_module_with(module, &classifier, config, compiler)
}

/// [`optimize_module`] with the external toolchain described by
/// `config.toolchain` as the compiler.
pub fn optimize_module_with_toolchain(
    module: &mut Module,
    config: &FusionConfig,
) -> Result<ConversionReport> {
    let compiler = ToolchainCompiler::new(config.toolchain.clone());
    optimize_module(module, config, &compiler)
}

/// Same as [`optimize_module`] with a caller-supplied classifier.
pub fn optimize_module_with(
    module: &mut Module,
    classifier: &SupportClassifier,
    config: &FusionConfig,
    compiler: &dyn EngineCompiler,
) -> Result<ConversionReport> {
    module
        .graph()
        .validate()
        .context("input graph is malformed")?;
    let plan = cluster_graph(module.graph(), classifier, config)?;
    crate::trace!(
        "fusion.plan groups={} blocks={}",
        plan.len(),
        plan.blocks().len()
    );
    let report = Converter::new(config, compiler).run(module, &plan)?;
    if let Err(err) = module.graph().validate() {
        crate::error!("rewritten graph failed validation: {:#}", err);
        return Err(err.context("rewritten graph is malformed"));
    }
    crate::trace!(
        "fusion.done converted={} failed={}",
        report.converted_count(),
        report.failed_count()
    );
    Ok(report)
}
