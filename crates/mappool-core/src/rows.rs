//! Flat relation rows supplied by a persistence loader.
//!
//! The engine performs no storage I/O. A loader (the world crate's JSON
//! importer, or a test) fills a [`PoolData`] and hands it to
//! [`PoolRegistry::load`](crate::registry::PoolRegistry::load), which validates
//! row by row.

use serde::{Deserialize, Serialize};

use crate::ids::{MapId, PointId, PoolId};
use crate::item::{CreatureDefaults, CreatureOverride, GameObjectDefaults, GameObjectOverride};
use crate::point::Position;
use crate::template::{CorpseTimes, PoolFlags, PoolTemplate, SpawnKind, SpawnTimes};

/// Every row needed to build the pools of one map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolData {
    pub templates: Vec<PoolTemplateRow>,
    pub hierarchy: Vec<HierarchyRow>,
    pub spawn_points: Vec<SpawnPointRow>,
    pub pool_spawns: Vec<PoolSpawnRow>,
    pub creatures: Vec<CreatureItemRow>,
    pub game_objects: Vec<GameObjectItemRow>,
    pub creature_overrides: Vec<CreatureOverrideRow>,
    pub game_object_overrides: Vec<GameObjectOverrideRow>,
}

impl PoolData {
    pub fn total_rows(&self) -> usize {
        self.templates.len()
            + self.hierarchy.len()
            + self.spawn_points.len()
            + self.pool_spawns.len()
            + self.creatures.len()
            + self.game_objects.len()
            + self.creature_overrides.len()
            + self.game_object_overrides.len()
    }
}

/// One pool template. `type_code` is `0` for creatures, `1` for gameobjects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolTemplateRow {
    pub pool_id: PoolId,
    pub type_code: u8,
    pub phase_mask: u32,
    pub spawn_mask: u8,
    pub min_limit: u32,
    pub max_limit: u32,
    pub movement_type: u8,
    pub spawn_dist: f32,
    pub spawn_time_min: u32,
    pub spawn_time_max: u32,
    pub spawn_time_fast: u32,
    pub corpse_time_looted: u32,
    pub corpse_time_unlooted: u32,
    pub description: String,
    pub flags: u32,
}

impl PoolTemplateRow {
    pub fn new(pool_id: u32, kind: SpawnKind, min_limit: u32, max_limit: u32) -> Self {
        Self {
            pool_id: PoolId(pool_id),
            type_code: kind.code(),
            min_limit,
            max_limit,
            ..Self::default()
        }
    }

    pub fn with_spawn_times(mut self, min: u32, max: u32, fast: u32) -> Self {
        self.spawn_time_min = min;
        self.spawn_time_max = max;
        self.spawn_time_fast = fast;
        self
    }

    pub fn with_flags(mut self, flags: PoolFlags) -> Self {
        self.flags = flags.0;
        self
    }

    /// Convert into a template, or `None` if the type code is unknown.
    pub fn to_template(&self, map_id: MapId) -> Option<PoolTemplate> {
        let kind = SpawnKind::from_code(self.type_code)?;
        Some(PoolTemplate {
            map_id,
            pool_id: self.pool_id,
            kind,
            phase_mask: self.phase_mask,
            spawn_mask: self.spawn_mask,
            min_limit: self.min_limit,
            max_limit: self.max_limit,
            movement_type: self.movement_type,
            spawn_dist: self.spawn_dist,
            spawn_times: SpawnTimes {
                min_secs: self.spawn_time_min,
                max_secs: self.spawn_time_max,
                fast_secs: self.spawn_time_fast,
            },
            corpse_times: CorpseTimes {
                looted_secs: self.corpse_time_looted,
                unlooted_secs: self.corpse_time_unlooted,
            },
            description: self.description.clone(),
            flags: PoolFlags(self.flags).sanitized(),
        })
    }
}

/// Parent to child edge with the child's selection weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HierarchyRow {
    pub pool_id: PoolId,
    pub child_pool_id: PoolId,
    #[serde(default)]
    pub chance: f32,
}

impl HierarchyRow {
    pub fn new(pool_id: u32, child_pool_id: u32, chance: f32) -> Self {
        Self {
            pool_id: PoolId(pool_id),
            child_pool_id: PoolId(child_pool_id),
            chance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPointRow {
    pub point_id: PointId,
    pub position: Position,
    #[serde(default)]
    pub rotation: Option<[f32; 4]>,
}

impl SpawnPointRow {
    pub fn new(point_id: u32, x: f32, y: f32, z: f32) -> Self {
        Self {
            point_id: PointId(point_id),
            position: Position::new(x, y, z, 0.0),
            rotation: None,
        }
    }
}

/// Assigns a spawn point to a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpawnRow {
    pub pool_id: PoolId,
    pub point_id: PointId,
}

impl PoolSpawnRow {
    pub fn new(pool_id: u32, point_id: u32) -> Self {
        Self {
            pool_id: PoolId(pool_id),
            point_id: PointId(point_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatureItemRow {
    pub pool_id: PoolId,
    pub entry: u32,
    #[serde(default)]
    pub chance: f32,
    #[serde(flatten)]
    pub defaults: CreatureDefaults,
}

impl CreatureItemRow {
    pub fn new(pool_id: u32, entry: u32, chance: f32) -> Self {
        Self {
            pool_id: PoolId(pool_id),
            entry,
            chance,
            defaults: CreatureDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameObjectItemRow {
    pub pool_id: PoolId,
    pub entry: u32,
    #[serde(default)]
    pub chance: f32,
    #[serde(flatten)]
    pub defaults: GameObjectDefaults,
}

impl GameObjectItemRow {
    pub fn new(pool_id: u32, entry: u32, chance: f32) -> Self {
        Self {
            pool_id: PoolId(pool_id),
            entry,
            chance,
            defaults: GameObjectDefaults::default(),
        }
    }
}

/// Where an override applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverrideScope {
    /// One candidate entry at one spawn point.
    PointEntry { point_id: PointId, entry: u32 },
    /// A candidate item wherever it spawns.
    Item { pool_id: PoolId, entry: u32 },
    /// Anything spawned at a point.
    Point { point_id: PointId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureOverrideRow {
    pub scope: OverrideScope,
    #[serde(flatten)]
    pub data: CreatureOverride,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObjectOverrideRow {
    pub scope: OverrideScope,
    #[serde(flatten)]
    pub data: GameObjectOverride,
}
