//! Admission limits enforced at the classification boundary.

use serde::{Deserialize, Serialize};

/// Hard caps applied before a blob enters the pipeline.
///
/// Oversized input is rejected as malformed, never truncated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum size of a schema blob in bytes.
    pub max_blob_bytes: usize,
    /// Maximum number of entries in a blob's dependency list.
    pub max_dependencies: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_blob_bytes: 1 << 20,
            max_dependencies: 4096,
        }
    }
}
