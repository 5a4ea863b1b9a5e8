//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Knobs for one [`PoolRegistry`](crate::registry::PoolRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Seed of the registry's random source. Equal seeds and equal inputs
    /// give equal spawn decisions.
    pub seed: u64,
    /// Minimum seconds between two due-timer scans of the same zone or grid.
    pub zone_recheck_interval: u64,
    /// Respawn delay used when neither the pool nor any override provides one.
    pub default_respawn_secs: u32,
}

impl Default for RegistryConfig {
    /// Seed 0, 10 second recheck interval, 5 minute fallback respawn.
    fn default() -> Self {
        Self {
            seed: 0,
            zone_recheck_interval: 10,
            default_respawn_secs: 300,
        }
    }
}

impl RegistryConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}
