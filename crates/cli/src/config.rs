//! Environment-derived deployment defaults

use anyhow::Result;
use serde::Deserialize;

/// Defaults picked up from `ECSD_*` environment variables. Explicit flags
/// always win over these.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeployDefaults {
    /// Default cluster (ECSD_CLUSTER)
    pub cluster: Option<String>,
    /// Default region (ECSD_REGION)
    pub region: Option<String>,
}

impl DeployDefaults {
    /// Load defaults from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("ECSD"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }
}
