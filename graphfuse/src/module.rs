use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use crate::engine::EngineArtifact;
use crate::graph::{AttrValue, Graph, ValueType};

/// A named attribute of a host module.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleAttr {
    Engine(EngineArtifact),
    Value(AttrValue),
}

/// Host module: the graph plus the attributes engines are registered on.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    graph: Graph,
    attrs: BTreeMap<String, ModuleAttr>,
}

impl Module {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            attrs: BTreeMap::new(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn attr(&self, name: &str) -> Option<&ModuleAttr> {
        self.attrs.get(name)
    }

    /// Add a plain attribute; fails if the name is taken.
    pub fn set_attr(&mut self, name: impl Into<String>, value: AttrValue) -> Result<()> {
        let name = name.into();
        if self.attrs.contains_key(&name) {
            return Err(anyhow!("module already has an attribute named {}", name));
        }
        self.attrs.insert(name, ModuleAttr::Value(value));
        Ok(())
    }

    pub fn engine(&self, name: &str) -> Option<&EngineArtifact> {
        match self.attrs.get(name) {
            Some(ModuleAttr::Engine(artifact)) => Some(artifact),
            _ => None,
        }
    }

    /// Registered engines by name.
    pub fn engines(&self) -> impl Iterator<Item = (&str, &EngineArtifact)> {
        self.attrs.iter().filter_map(|(name, attr)| match attr {
            ModuleAttr::Engine(artifact) => Some((name.as_str(), artifact)),
            ModuleAttr::Value(_) => None,
        })
    }

    /// Register `artifact` under `name` and return the call's output type.
    pub fn register_engine(&mut self, name: &str, artifact: EngineArtifact) -> Result<ValueType> {
        if name.is_empty() {
            return Err(anyhow!("engine name must not be empty"));
        }
        if self.attrs.contains_key(name) {
            return Err(anyhow!("module already has an attribute named {}", name));
        }
        let output_type = artifact.output_type();
        self.attrs
            .insert(name.to_string(), ModuleAttr::Engine(artifact));
        Ok(output_type)
    }
}
