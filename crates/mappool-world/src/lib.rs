//! Mappool World - drives pool registries for a set of live map instances.
//!
//! # Modules
//!
//! - [`loader`]: JSON world documents (one [`PoolData`](mappool_core::rows::PoolData)
//!   per map plus its configuration).
//! - [`instance`]: a single [`MapInstance`](instance::MapInstance) with its
//!   tick, zone activation and grid load handling.
//! - [`manager`]: [`MapManager`](manager::MapManager), the per-map owner of
//!   instances. Instances share nothing, which makes the map the sharding
//!   unit.
//! - [`snapshot`]: persisted respawn timers with a BLAKE3 integrity hash.

#![deny(unsafe_code)]

pub mod instance;
pub mod loader;
pub mod manager;
pub mod snapshot;

use std::path::PathBuf;

use mappool_core::ids::MapId;
use mappool_core::PoolError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while importing, driving or persisting map instances.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("map {0} is not loaded")]
    UnknownMap(MapId),

    #[error("map {0} is already loaded")]
    DuplicateMap(MapId),

    /// A persisted snapshot does not match its recorded hash.
    #[error("snapshot hash mismatch: expected {expected}, got {actual}")]
    SnapshotHashMismatch { expected: String, actual: String },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::instance::{InstanceConfig, MapInstance, TickSummary};
    pub use crate::loader::{load_world, parse_world, MapDocument, WorldDocument};
    pub use crate::manager::MapManager;
    pub use crate::snapshot::{PersistedTimer, TimerSnapshot};
    pub use crate::WorldError;
}
