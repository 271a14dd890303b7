use std::collections::HashMap;
use std::fmt;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::compiler::{CompiledEngine, EngineCompiler};
use crate::config::FusionConfig;
use crate::engine::EngineArtifact;
use crate::fusion::{ClusterPlan, FusionGroup, GroupId};
use crate::graph::{BlockId, ValueId, ValueType};
use crate::module::Module;

use super::extract::{extract_subgraph, Subgraph};
use super::splice::splice_group;

/// Why a group stayed in the graph.
#[derive(Debug)]
pub enum ConversionError {
    /// The toolchain failed or broke its output contract.
    Compile(anyhow::Error),
    /// The engine could not be registered on the module.
    Register(anyhow::Error),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::Compile(err) => write!(f, "compilation failed: {:#}", err),
            ConversionError::Register(err) => write!(f, "registration failed: {:#}", err),
        }
    }
}

impl std::error::Error for ConversionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConversionError::Compile(err) | ConversionError::Register(err) => Some(&**err),
        }
    }
}

/// Result of converting one group: the engine name on success.
#[derive(Debug)]
pub struct GroupOutcome {
    pub group: GroupId,
    pub block: BlockId,
    pub size: usize,
    pub result: std::result::Result<String, ConversionError>,
}

#[derive(Debug, Default)]
pub struct ConversionReport {
    pub outcomes: Vec<GroupOutcome>,
}

impl ConversionReport {
    /// Names of the engines that replaced a group.
    pub fn converted(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok().map(String::as_str))
    }

    pub fn failed(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }

    pub fn converted_count(&self) -> usize {
        self.converted().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }
}

/// Turns fusion groups into engine calls, one group at a time.
///
/// A group whose compilation or registration fails is logged and left
/// untouched; the remaining groups are still converted.
pub struct Converter<'a> {
    config: &'a FusionConfig,
    compiler: &'a dyn EngineCompiler,
}

impl<'a> Converter<'a> {
    pub fn new(config: &'a FusionConfig, compiler: &'a dyn EngineCompiler) -> Self {
        Self { config, compiler }
    }

    /// Convert every group of `plan` in plan order.
    ///
    /// All subgraphs are extracted from the unmodified graph before the
    /// first splice. Compilation may run on the rayon pool; registration
    /// and splicing are serial. An `Err` here means the graph broke an
    /// internal invariant, never that a group failed to compile.
    pub fn run(&self, module: &mut Module, plan: &ClusterPlan) -> Result<ConversionReport> {
        let mut prepared: Vec<(&FusionGroup, Subgraph)> = Vec::with_capacity(plan.len());
        for group in plan.groups() {
            let subgraph = extract_subgraph(module.graph(), group)
                .with_context(|| format!("extract {}", group.id))?;
            prepared.push((group, subgraph));
        }

        let compiled: Vec<Result<CompiledEngine>> = if self.config.parallel_compile {
            prepared
                .par_iter()
                .map(|(_, subgraph)| self.compile(subgraph))
                .collect()
        } else {
            prepared
                .iter()
                .map(|(_, subgraph)| self.compile(subgraph))
                .collect()
        };

        let mut report = ConversionReport::default();
        // Frontier outputs of spliced groups, mapped to the call results that
        // replaced them. Later groups may still list the old values as inputs.
        let mut rebound: HashMap<ValueId, ValueId> = HashMap::new();
        for ((group, subgraph), compiled) in prepared.into_iter().zip(compiled) {
            let result = match compiled {
                Ok(engine) => match self.register(module, group, &subgraph, engine) {
                    Ok((name, output_type)) => {
                        let current = rebind_inputs(group, &rebound);
                        let site = splice_group(
                            module.graph_mut(),
                            &current,
                            &name,
                            &output_type,
                            self.config.arity,
                        )
                        .with_context(|| format!("splice {} as {}", group.id, name))?;
                        rebound.extend(group.outputs.iter().copied().zip(site.outputs));
                        Ok(name)
                    }
                    Err(err) => Err(err),
                },
                Err(err) => Err(ConversionError::Compile(err)),
            };
            match &result {
                Ok(name) => crate::trace!(
                    "convert.ok {} size={} engine={}",
                    group.id,
                    group.len(),
                    name
                ),
                Err(err) => crate::warning!(
                    "{} in {} ({} nodes) left unconverted: {}",
                    group.id,
                    group.block,
                    group.len(),
                    err
                ),
            }
            report.outcomes.push(GroupOutcome {
                group: group.id,
                block: group.block,
                size: group.len(),
                result,
            });
        }
        Ok(report)
    }

    fn compile(&self, subgraph: &Subgraph) -> Result<CompiledEngine> {
        crate::trace!(
            "convert.compile {} inputs={} outputs={}",
            subgraph.group,
            subgraph.inputs.len(),
            subgraph.outputs.len()
        );
        self.compiler.compile(subgraph)
    }

    fn register(
        &self,
        module: &mut Module,
        group: &FusionGroup,
        subgraph: &Subgraph,
        engine: CompiledEngine,
    ) -> std::result::Result<(String, ValueType), ConversionError> {
        let name = self.engine_name(module, group.id);
        let artifact = EngineArtifact::new(
            engine.binary,
            engine.metadata,
            subgraph.graph.to_string(),
            subgraph.input_descriptors.clone(),
            subgraph.output_descriptors.clone(),
            engine.input_devices,
            engine.output_devices,
        );
        let output_type = module
            .register_engine(&name, artifact)
            .map_err(ConversionError::Register)?;
        Ok((name, output_type))
    }

    /// `<prefix><group>`, suffixed with `_<n>` when the module already uses it.
    fn engine_name(&self, module: &Module, group: GroupId) -> String {
        let base = format!("{}{}", self.config.engine_prefix, group.0);
        if !module.has_attr(&base) {
            return base;
        }
        let mut suffix = 1usize;
        loop {
            let candidate = format!("{}_{}", base, suffix);
            if !module.has_attr(&candidate) {
                crate::warning!(
                    "attribute {} is taken, registering {} as {}",
                    base,
                    group,
                    candidate
                );
                return candidate;
            }
            suffix += 1;
        }
    }
}

fn rebind_inputs(group: &FusionGroup, rebound: &HashMap<ValueId, ValueId>) -> FusionGroup {
    let mut group = group.clone();
    for input in group.inputs.iter_mut() {
        if let Some(value) = rebound.get(input) {
            *input = *value;
        }
    }
    group
}
