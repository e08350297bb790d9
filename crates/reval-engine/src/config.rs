use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;

/// Engine timing configuration.
///
/// Two tiers: the evaluation timeout bounds how long one pass may treat
/// its input samples as temporally consistent; the expiration timeout
/// bounds how long an asynchronous request may keep deferring before the
/// engine forces another pass.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_evaluation_timeout_secs")]
    pub evaluation_timeout_secs: u64,
    #[serde(default = "default_expiration_timeout_secs")]
    pub expiration_timeout_secs: u64,
}

fn default_evaluation_timeout_secs() -> u64 {
    5
}
fn default_expiration_timeout_secs() -> u64 {
    // 12 hours; a request deferring longer than this is nudged to decide.
    12 * 60 * 60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evaluation_timeout_secs: default_evaluation_timeout_secs(),
            expiration_timeout_secs: default_expiration_timeout_secs(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| EngineError::InvalidConfig(e.to_string()))
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_secs(self.evaluation_timeout_secs)
    }

    pub fn expiration_timeout(&self) -> Duration {
        Duration::from_secs(self.expiration_timeout_secs)
    }
}
