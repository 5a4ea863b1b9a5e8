//! Layered attribute resolution.
//!
//! Every attribute handed to the entity factory is resolved field by field
//! from four layers, highest priority first:
//!
//! 1. the override registered for the exact `(point, entry)` pair,
//! 2. the override attached to the candidate item,
//! 3. the override attached to the spawn point,
//! 4. the base: item defaults for per-template attributes, the (trickled)
//!    pool template for timing, masks and movement.
//!
//! A field is taken from the first layer where it is set. Zero numbers, empty
//! strings and absent rotations count as unset, so an override can never force
//! a field *to* zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::PointId;
use crate::item::{CandidateItem, CreatureOverride, GameObjectOverride, ItemData, Override};
use crate::point::SpawnPoint;
use crate::template::{PoolTemplate, SpawnKind};

/// Identity rotation used when nothing else supplies one.
pub const IDENTITY_ROTATION: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

// ---------------------------------------------------------------------------
// Resolved attribute bundles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreatureAttributes {
    pub model_id: u32,
    pub equipment_id: u8,
    pub current_waypoint: u32,
    pub cur_health: u32,
    pub cur_mana: u32,
    pub npc_flag: u32,
    pub unit_flags: u32,
    pub dynamic_flags: u32,
    pub movement_type: u8,
    pub spawn_dist: f32,
    pub phase_mask: u32,
    pub spawn_mask: u8,
    pub ai_name: String,
    pub script_name: String,
    pub spawn_time_min: u32,
    pub spawn_time_max: u32,
    pub corpse_time_looted: u32,
    pub corpse_time_unlooted: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameObjectAttributes {
    pub anim_progress: u8,
    pub state: u8,
    pub rotation: [f32; 4],
    pub phase_mask: u32,
    pub spawn_mask: u8,
    pub ai_name: String,
    pub script_name: String,
    pub spawn_time_min: u32,
    pub spawn_time_max: u32,
    pub corpse_time_looted: u32,
    pub corpse_time_unlooted: u32,
}

/// The effective attribute set for one instantiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnAttributes {
    Creature(CreatureAttributes),
    GameObject(GameObjectAttributes),
}

impl SpawnAttributes {
    pub fn kind(&self) -> SpawnKind {
        match self {
            SpawnAttributes::Creature(_) => SpawnKind::Creature,
            SpawnAttributes::GameObject(_) => SpawnKind::GameObject,
        }
    }

    /// Respawn delay range `(min, max)` in seconds.
    pub fn spawn_time_range(&self) -> (u32, u32) {
        match self {
            SpawnAttributes::Creature(c) => (c.spawn_time_min, c.spawn_time_max),
            SpawnAttributes::GameObject(g) => (g.spawn_time_min, g.spawn_time_max),
        }
    }

    /// How long remains persist in the given loot state.
    pub fn corpse_secs(&self, looted: bool) -> u32 {
        let (looted_secs, unlooted_secs) = match self {
            SpawnAttributes::Creature(c) => (c.corpse_time_looted, c.corpse_time_unlooted),
            SpawnAttributes::GameObject(g) => (g.corpse_time_looted, g.corpse_time_unlooted),
        };
        if looted {
            looted_secs
        } else {
            unlooted_secs
        }
    }
}

// ---------------------------------------------------------------------------
// Field presence
// ---------------------------------------------------------------------------

/// Whether an override field carries no value.
trait Unset {
    fn is_unset(&self) -> bool;
}

macro_rules! unset_when_zero {
    ($($ty:ty),*) => {
        $(impl Unset for $ty {
            #[inline]
            fn is_unset(&self) -> bool {
                *self == 0
            }
        })*
    };
}

unset_when_zero!(u8, u32);

impl Unset for f32 {
    fn is_unset(&self) -> bool {
        *self == 0.0
    }
}

impl Unset for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Unset for Option<T> {
    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

/// First set value among `layers`, else `base`.
fn layered<T: Unset>(layers: impl IntoIterator<Item = T>, base: T) -> T {
    layers.into_iter().find(|v| !v.is_unset()).unwrap_or(base)
}

// ---------------------------------------------------------------------------
// OverrideSet
// ---------------------------------------------------------------------------

/// Overrides registered for exact `(point, entry)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideSet {
    creatures: BTreeMap<(PointId, u32), CreatureOverride>,
    game_objects: BTreeMap<(PointId, u32), GameObjectOverride>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pair override, replacing any previous one for the pair.
    pub fn insert(&mut self, point: PointId, entry: u32, patch: Override) {
        match patch {
            Override::Creature(o) => {
                self.creatures.insert((point, entry), o);
            }
            Override::GameObject(o) => {
                self.game_objects.insert((point, entry), o);
            }
        }
    }

    pub fn creature(&self, point: PointId, entry: u32) -> Option<&CreatureOverride> {
        self.creatures.get(&(point, entry))
    }

    pub fn game_object(&self, point: PointId, entry: u32) -> Option<&GameObjectOverride> {
        self.game_objects.get(&(point, entry))
    }

    pub fn len(&self) -> usize {
        self.creatures.len() + self.game_objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the attributes for instantiating `item` at `point`.
    ///
    /// `template` must already have had inherited values trickled into it.
    pub fn resolve(&self, point: &SpawnPoint, item: &CandidateItem, template: &PoolTemplate) -> SpawnAttributes {
        match &item.data {
            ItemData::Creature { defaults, override_data } => {
                let layers: Vec<&CreatureOverride> = [
                    self.creature(point.id, item.entry),
                    override_data.as_ref(),
                    point.creature_override.as_ref(),
                ]
                .into_iter()
                .flatten()
                .collect();

                SpawnAttributes::Creature(CreatureAttributes {
                    model_id: layered(layers.iter().map(|o| o.model_id), defaults.model_id),
                    equipment_id: layered(layers.iter().map(|o| o.equipment_id), defaults.equipment_id),
                    current_waypoint: layered(layers.iter().map(|o| o.current_waypoint), defaults.current_waypoint),
                    cur_health: layered(layers.iter().map(|o| o.cur_health), defaults.cur_health),
                    cur_mana: layered(layers.iter().map(|o| o.cur_mana), defaults.cur_mana),
                    npc_flag: layered(layers.iter().map(|o| o.npc_flag), defaults.npc_flag),
                    unit_flags: layered(layers.iter().map(|o| o.unit_flags), defaults.unit_flags),
                    dynamic_flags: layered(layers.iter().map(|o| o.dynamic_flags), defaults.dynamic_flags),
                    movement_type: layered(layers.iter().map(|o| o.movement_type), template.movement_type),
                    spawn_dist: layered(layers.iter().map(|o| o.spawn_dist), template.spawn_dist),
                    phase_mask: layered(layers.iter().map(|o| o.phase_mask), template.phase_mask),
                    spawn_mask: layered(layers.iter().map(|o| o.spawn_mask), template.spawn_mask),
                    ai_name: layered(layers.iter().map(|o| o.ai_name.clone()), String::new()),
                    script_name: layered(layers.iter().map(|o| o.script_name.clone()), String::new()),
                    spawn_time_min: layered(layers.iter().map(|o| o.spawn_time_min), template.spawn_times.min_secs),
                    spawn_time_max: layered(layers.iter().map(|o| o.spawn_time_max), template.spawn_times.max_secs),
                    corpse_time_looted: layered(
                        layers.iter().map(|o| o.corpse_time_looted),
                        template.corpse_times.looted_secs,
                    ),
                    corpse_time_unlooted: layered(
                        layers.iter().map(|o| o.corpse_time_unlooted),
                        template.corpse_times.unlooted_secs,
                    ),
                })
            }
            ItemData::GameObject { defaults, override_data } => {
                let layers: Vec<&GameObjectOverride> = [
                    self.game_object(point.id, item.entry),
                    override_data.as_ref(),
                    point.game_object_override.as_ref(),
                ]
                .into_iter()
                .flatten()
                .collect();

                let rotation = layered(layers.iter().map(|o| o.rotation), point.rotation).unwrap_or(IDENTITY_ROTATION);

                SpawnAttributes::GameObject(GameObjectAttributes {
                    anim_progress: layered(layers.iter().map(|o| o.anim_progress), defaults.anim_progress),
                    state: layered(layers.iter().map(|o| o.state), defaults.state),
                    rotation,
                    phase_mask: layered(layers.iter().map(|o| o.phase_mask), template.phase_mask),
                    spawn_mask: layered(layers.iter().map(|o| o.spawn_mask), template.spawn_mask),
                    ai_name: layered(layers.iter().map(|o| o.ai_name.clone()), String::new()),
                    script_name: layered(layers.iter().map(|o| o.script_name.clone()), String::new()),
                    spawn_time_min: layered(layers.iter().map(|o| o.spawn_time_min), template.spawn_times.min_secs),
                    spawn_time_max: layered(layers.iter().map(|o| o.spawn_time_max), template.spawn_times.max_secs),
                    corpse_time_looted: template.corpse_times.looted_secs,
                    corpse_time_unlooted: template.corpse_times.unlooted_secs,
                })
            }
        }
    }
}
