//! Named virtual axes

use serde::{Deserialize, Serialize};

/// A virtual axis that reads its value from a physical axis source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    /// Name callers query the axis by
    pub name: String,
    /// Physical axis the host samples
    pub source: String,
}

impl Axis {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}
