//! Mappool core -- hierarchical spawn pools for one map instance.
//!
//! A map's creatures and gameobjects are grouped into a tree of pools. Every
//! pool bounds the live population of its subtree with a minimum and a
//! maximum; leaves own weighted candidate templates and the spawn points they
//! may occupy. Spawning walks the tree top-down with weighted random picks,
//! resolves layered attribute overrides, and hands the result to an external
//! entity factory. Deaths and despawns flow back up the same tree and feed a
//! respawn scheduler indexed by pool, grid and zone.
//!
//! # Quick Start
//!
//! ```
//! use mappool_core::prelude::*;
//!
//! let data = PoolData {
//!     templates: vec![PoolTemplateRow::new(1, SpawnKind::Creature, 1, 2)],
//!     spawn_points: vec![SpawnPointRow::new(10, 0.0, 0.0, 0.0), SpawnPointRow::new(11, 5.0, 0.0, 0.0)],
//!     pool_spawns: vec![PoolSpawnRow::new(1, 10), PoolSpawnRow::new(1, 11)],
//!     creatures: vec![CreatureItemRow::new(1, 100, 1.0)],
//!     ..PoolData::default()
//! };
//!
//! let mut registry =
//!     PoolRegistry::load(MapId(0), &data, InMemoryHost::new(), RegistryConfig::default()).unwrap();
//! assert_eq!(registry.spawn_pool(PoolId(1), 0), 2);
//! assert_eq!(registry.pool(PoolId(1)).unwrap().spawns_this_pool(), 2);
//! assert_eq!(registry.host().entity_count(), 2);
//! ```

#![deny(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod handle;
pub mod host;
pub mod ids;
pub mod item;
pub mod overrides;
pub mod point;
pub mod pool;
pub mod random;
pub mod registry;
pub mod respawn;
pub mod rows;
pub mod spawn;
pub mod template;
pub mod tree;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by pool operations.
///
/// Routine runtime outcomes (no capacity, no free point, missing pool in a
/// spawn call) are not errors and are reported through return values.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// A candidate item was attached to a pool that has child pools. Loading
    /// aborts on this.
    #[error("pool {pool} has child pools and cannot hold candidate item {entry}")]
    ItemsOnNonLeafPool { pool: ids::PoolId, entry: u32 },

    #[error("pool {0} does not exist")]
    UnknownPool(ids::PoolId),

    #[error("spawn point {0} does not exist")]
    UnknownPoint(ids::PointId),

    /// A timer removal named zero or several primary scopes.
    #[error("respawn filter must name exactly one of pool, grid or zone, got {given}")]
    AmbiguousRespawnFilter { given: usize },

    #[error("failed to serialize pool state: {0}")]
    Snapshot(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::RegistryConfig;
    pub use crate::handle::{EntityHandle, HandleAllocator};
    pub use crate::host::{Clock, EntityFactory, InMemoryHost, MapHost, Region, SpatialGrid, SpawnRequest};
    pub use crate::ids::{GridId, MapId, PointId, PoolId, Timestamp, ZoneId};
    pub use crate::item::{
        CandidateItem, CreatureDefaults, CreatureOverride, GameObjectDefaults, GameObjectOverride, ItemData, Override,
    };
    pub use crate::overrides::{CreatureAttributes, GameObjectAttributes, OverrideSet, SpawnAttributes};
    pub use crate::point::{ItemRef, Position, Remains, SpawnPoint};
    pub use crate::pool::PoolNode;
    pub use crate::random::{weighted_pick, RandomSource};
    pub use crate::registry::{LiveSpawn, LoadReport, PoolRegistry};
    pub use crate::respawn::{RespawnFilter, RespawnIndex, RespawnInfo, RespawnScheduler};
    pub use crate::rows::{
        CreatureItemRow, CreatureOverrideRow, GameObjectItemRow, GameObjectOverrideRow, HierarchyRow, OverrideScope,
        PoolData, PoolSpawnRow, PoolTemplateRow, SpawnPointRow,
    };
    pub use crate::template::{CorpseTimes, PoolFlags, PoolTemplate, SpawnKind, SpawnTimes};
    pub use crate::tree::{HierarchyError, PoolTree};
    pub use crate::PoolError;
}
