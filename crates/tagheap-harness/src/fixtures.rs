//! Fixture loading and management.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// One allocation-trace operation.
///
/// `id` names the slot a payload offset is bound to; later operations
/// refer back to it. Ids may be rebound after the binding is consumed
/// by a `free` or a zero-size `realloc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum TraceOp {
    /// Allocate `size` bytes and bind the result to `id`.
    Malloc { id: u32, size: usize },
    /// Release the block bound to `id`.
    Free { id: u32 },
    /// Resize the block bound to `id` to `size` bytes.
    Realloc { id: u32, size: usize },
    /// Zero-allocate `count` objects of `size` bytes, bound to `id`.
    Calloc { id: u32, count: usize, size: usize },
}

/// A single replayable trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceCase {
    /// Case identifier.
    pub name: String,
    /// Operations in replay order.
    pub ops: Vec<TraceOp>,
}

/// A collection of trace cases for one workload family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSet {
    /// Schema version.
    pub version: String,
    /// Workload family name.
    pub family: String,
    /// Individual traces.
    pub cases: Vec<TraceCase>,
}

impl TraceSet {
    /// Load a trace set from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, HarnessError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize a trace set to pretty JSON.
    pub fn to_json(&self) -> Result<String, HarnessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a trace set from a file path.
    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
