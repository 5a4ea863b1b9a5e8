//! JSON import of pool data.
//!
//! A world document lists maps; each map carries its instance configuration
//! and the flat pool rows:
//!
//! ```json
//! {
//!   "maps": [
//!     {
//!       "map_id": 0,
//!       "config": { "tick_secs": 1, "registry": { "seed": 7 } },
//!       "pools": { "templates": [], "spawn_points": [] }
//!     }
//!   ]
//! }
//! ```
//!
//! Every section is optional and defaults to empty.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use mappool_core::ids::MapId;
use mappool_core::rows::PoolData;

use crate::instance::InstanceConfig;
use crate::WorldError;

/// One map of a world document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapDocument {
    pub map_id: MapId,
    pub config: InstanceConfig,
    pub pools: PoolData,
}

/// Top-level world document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldDocument {
    pub maps: Vec<MapDocument>,
}

impl WorldDocument {
    pub fn map(&self, id: MapId) -> Option<&MapDocument> {
        self.maps.iter().find(|m| m.map_id == id)
    }
}

/// Parse a world document from JSON text.
pub fn parse_world(json: &str) -> Result<WorldDocument, WorldError> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse a world document from disk.
pub fn load_world(path: &Path) -> Result<WorldDocument, WorldError> {
    let text = std::fs::read_to_string(path).map_err(|source| WorldError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let world = parse_world(&text)?;
    info!(
        path = %path.display(),
        maps = world.maps.len(),
        rows = world.maps.iter().map(|m| m.pools.total_rows()).sum::<usize>(),
        "world document loaded"
    );
    Ok(world)
}
