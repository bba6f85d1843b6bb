//! Runtime configuration for the VM.

use serde::{Deserialize, Serialize};

/// Default operand stack capacity.
pub const STACK_MAX: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmConfig {
    /// Pushing past this many values is a stack overflow.
    pub stack_capacity: usize,
    /// Abort a run after this many dispatched instructions (None = unlimited).
    pub instruction_budget: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_capacity: STACK_MAX,
            instruction_budget: None,
        }
    }
}

impl VmConfig {
    /// Parses a JSON config; missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
