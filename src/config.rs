//! Runtime configuration

use serde::{Deserialize, Serialize};

use crate::error::Result;
pub use crate::evaluator::EngineKind;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub engine: EngineKind,
    /// Tick budget applied when a caller passes `None`. Unbounded if unset.
    pub default_max_ticks: Option<u64>,
}

impl RuntimeConfig {
    pub fn with_engine(engine: EngineKind) -> Self {
        Self { engine, ..Self::default() }
    }

    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
