use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use uuid::Uuid;

use crate::config::ToolchainConfig;
use crate::convert::Subgraph;

use super::lower::{lower_subgraph, LoweredSubgraph};
use super::{CompiledEngine, EngineCompiler};

/// Runs the external engine compiler as a subprocess.
///
/// Invocation: `<program> <input.ir> <engine.so> <flags...>`. On a zero exit
/// the compiler must have written the binary and `<engine.so><suffix>`;
/// anything else fails the group. Every file lives in a fresh temporary
/// directory that is removed when compilation returns, whatever the outcome.
#[derive(Debug, Clone)]
pub struct ToolchainCompiler {
    config: ToolchainConfig,
}

impl ToolchainCompiler {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    fn output_sinks(&self) -> Result<(Stdio, Stdio)> {
        let Some(log) = &self.config.compile_log else {
            return Ok((Stdio::null(), Stdio::null()));
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log)
            .with_context(|| format!("open compile log {}", log.display()))?;
        let stderr = file
            .try_clone()
            .with_context(|| format!("share compile log {}", log.display()))?;
        Ok((Stdio::from(file), Stdio::from(stderr)))
    }

    fn dump(&self, dir: &Path, tag: &str, files: &[(&Path, &str)]) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        for (src, name) in files {
            let dst = dir.join(format!("{}.{}", tag, name));
            fs::copy(src, &dst)
                .with_context(|| format!("copy {} to {}", src.display(), dst.display()))?;
        }
        Ok(())
    }
}

/// Where the compiler writes the metadata for `binary`.
pub fn metadata_path(binary: &Path, suffix: &str) -> PathBuf {
    let mut raw = binary.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

impl EngineCompiler for ToolchainCompiler {
    fn compile(&self, subgraph: &Subgraph) -> Result<CompiledEngine> {
        let LoweredSubgraph {
            ir,
            pretty,
            input_devices,
            output_devices,
        } = lower_subgraph(subgraph)?;

        let workdir = tempfile::Builder::new()
            .prefix("graphfuse-")
            .tempdir()
            .context("create compile directory")?;
        let ir_path = workdir.path().join("input.ir.json");
        let pretty_path = workdir.path().join("input.pretty.txt");
        let binary_path = workdir.path().join("engine.so");
        let metadata = metadata_path(&binary_path, &self.config.metadata_suffix);
        write_file(&ir_path, &ir)?;
        write_file(&pretty_path, &pretty)?;

        let program = &self.config.program;
        let (stdout, stderr) = self.output_sinks()?;
        crate::trace!(
            "toolchain.run {} {} -> {}",
            program.display(),
            subgraph.group,
            binary_path.display()
        );
        let status = Command::new(program)
            .arg(&ir_path)
            .arg(&binary_path)
            .args(&self.config.flags)
            .env(
                "TAO_MLIR_ENABLE_AMP",
                if self.config.enable_amp { "true" } else { "false" },
            )
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .with_context(|| format!("run {}", program.display()))?;
        if !status.success() {
            return Err(anyhow!(
                "{} failed for {} ({})",
                program.display(),
                subgraph.group,
                status
            ));
        }
        if !binary_path.is_file() {
            return Err(anyhow!(
                "{} exited cleanly but wrote no binary at {}",
                program.display(),
                binary_path.display()
            ));
        }
        if !metadata.is_file() {
            return Err(anyhow!(
                "{} exited cleanly but wrote no metadata at {}",
                program.display(),
                metadata.display()
            ));
        }
        let binary = fs::read(&binary_path)
            .with_context(|| format!("read {}", binary_path.display()))?;
        let metadata_bytes =
            fs::read(&metadata).with_context(|| format!("read {}", metadata.display()))?;

        if let Some(dir) = &self.config.dump_dir {
            let tag = format!("{}.{}", subgraph.group, Uuid::new_v4().simple());
            let suffix = format!("so{}", self.config.metadata_suffix);
            let files = [
                (ir_path.as_path(), "ir.json"),
                (pretty_path.as_path(), "pretty.txt"),
                (binary_path.as_path(), "so"),
                (metadata.as_path(), suffix.as_str()),
            ];
            if let Err(err) = self.dump(dir, &tag, &files) {
                crate::warning!(
                    "could not dump {} to {}: {:#}",
                    subgraph.group,
                    dir.display(),
                    err
                );
            }
        }

        Ok(CompiledEngine {
            binary,
            metadata: metadata_bytes,
            input_devices,
            output_devices,
        })
    }
}
