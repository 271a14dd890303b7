use std::fmt;

use crate::graph::{Device, ValueType};

/// Name and type of one engine operand or result.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDescriptor {
    pub name: String,
    pub ty: ValueType,
}

/// Per-operand device placement, rendered as `cpu,cuda,...`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceTags(pub Vec<Device>);

impl DeviceTags {
    pub fn from_descriptors(descriptors: &[ValueDescriptor]) -> Self {
        Self(descriptors.iter().map(|d| d.ty.device()).collect())
    }
}

impl fmt::Display for DeviceTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags = self
            .0
            .iter()
            .map(|device| device.as_str())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}", tags)
    }
}

/// Compiled engine bound to one call node.
///
/// Immutable once built; the module owns it under the engine's name.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineArtifact {
    binary: Vec<u8>,
    metadata: Vec<u8>,
    diagnostic: String,
    inputs: Vec<ValueDescriptor>,
    outputs: Vec<ValueDescriptor>,
    input_devices: DeviceTags,
    output_devices: DeviceTags,
}

impl EngineArtifact {
    pub fn new(
        binary: Vec<u8>,
        metadata: Vec<u8>,
        diagnostic: String,
        inputs: Vec<ValueDescriptor>,
        outputs: Vec<ValueDescriptor>,
        input_devices: DeviceTags,
        output_devices: DeviceTags,
    ) -> Self {
        Self {
            binary,
            metadata,
            diagnostic,
            inputs,
            outputs,
            input_devices,
            output_devices,
        }
    }

    pub fn binary(&self) -> &[u8] {
        &self.binary
    }

    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    /// Listing of the subgraph the engine was compiled from.
    pub fn diagnostic(&self) -> &str {
        &self.diagnostic
    }

    pub fn inputs(&self) -> &[ValueDescriptor] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValueDescriptor] {
        &self.outputs
    }

    pub fn input_devices(&self) -> &DeviceTags {
        &self.input_devices
    }

    pub fn output_devices(&self) -> &DeviceTags {
        &self.output_devices
    }

    /// Type of the call result: a tuple of the output types.
    pub fn output_type(&self) -> ValueType {
        ValueType::Tuple(self.outputs.iter().map(|d| d.ty.clone()).collect())
    }
}
