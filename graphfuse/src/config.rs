//! Pass configuration.
//!
//! A [`FusionConfig`] is built once and handed to the classifier, the
//! clustering pass and the converter. Settings files use the same layout as
//! other workspace settings: a JSON object whose `graphfuse` key holds the
//! fields below, every one of them optional.
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::convert::ArityConvention;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Operator kinds that must never be offloaded.
    pub deny_list: BTreeSet<String>,
    /// Groups smaller than this are left in the graph.
    pub min_group_size: usize,
    pub arity: ArityConvention,
    /// Prefix of the module attribute each engine is registered under.
    pub engine_prefix: String,
    /// Compile independent groups on the rayon pool before splicing.
    pub parallel_compile: bool,
    pub toolchain: ToolchainConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            deny_list: BTreeSet::new(),
            min_group_size: 1,
            arity: ArityConvention::Packed,
            engine_prefix: "engine_grp".to_string(),
            parallel_compile: false,
            toolchain: ToolchainConfig::default(),
        }
    }
}

impl FusionConfig {
    pub fn deny(mut self, op: impl Into<String>) -> Self {
        self.deny_list.insert(op.into());
        self
    }

    /// Read the `graphfuse` section of a settings file.
    ///
    /// A file without that section yields the defaults.
    pub fn from_settings_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse {}", path.display()))?;
        Self::from_settings(&value)
    }

    pub fn from_settings(value: &Value) -> Result<Self> {
        let Some(section) = value.get("graphfuse") else {
            return Ok(Self::default());
        };
        let config: Self = serde_json::from_value(section.clone())
            .map_err(|err| anyhow!("invalid graphfuse settings: {}", err))?;
        if config.min_group_size == 0 {
            return Err(anyhow!("min_group_size must be at least 1"));
        }
        Ok(config)
    }
}

/// How the external engine compiler is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub program: PathBuf,
    /// Extra flags appended after the input and output paths.
    pub flags: Vec<String>,
    /// The metadata file is expected at `<binary><metadata_suffix>`.
    pub metadata_suffix: String,
    /// Forwarded to the compiler as `TAO_MLIR_ENABLE_AMP`.
    pub enable_amp: bool,
    pub env: BTreeMap<String, String>,
    /// Keep a copy of every IR file and artifact here.
    pub dump_dir: Option<PathBuf>,
    /// Append compiler stdout/stderr here instead of discarding it.
    pub compile_log: Option<PathBuf>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("disc_compiler_main"),
            flags: vec!["--multi-cc-support".to_string()],
            metadata_suffix: ".pbtxt".to_string(),
            enable_amp: false,
            env: BTreeMap::new(),
            dump_dir: None,
            compile_log: None,
        }
    }
}
