use anyhow::Result;
use serde_json::Value;

use super::Graph;

pub struct GraphSerialize;

impl GraphSerialize {
    pub fn json(graph: &Graph) -> Result<Value> {
        Ok(serde_json::to_value(graph)?)
    }

    pub fn json_string(graph: &Graph) -> Result<String> {
        Ok(serde_json::to_string_pretty(graph)?)
    }
}

pub struct GraphDeserialize;

impl GraphDeserialize {
    pub fn from_json(value: Value) -> Result<Graph> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json_str(text: &str) -> Result<Graph> {
        Ok(serde_json::from_str(text)?)
    }
}
