//! Candidate items and attribute overrides.
//!
//! Both come in two flavours, one per [`SpawnKind`]. They are modelled as sum
//! types so the two places that care about the difference (instantiation and
//! override resolution) match exhaustively instead of downcasting:
//!
//! - [`ItemData::Creature`] / [`Override::Creature`]: health, mana, model,
//!   flags, movement.
//! - [`ItemData::GameObject`] / [`Override::GameObject`]: animation progress,
//!   state, rotation.
//!
//! Zero or empty override fields mean "inherit from the next layer down".

use serde::{Deserialize, Serialize};

use crate::ids::PoolId;
use crate::template::SpawnKind;

// ---------------------------------------------------------------------------
// Default attributes
// ---------------------------------------------------------------------------

/// Base attributes of a creature candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatureDefaults {
    pub model_id: u32,
    pub equipment_id: u8,
    pub current_waypoint: u32,
    pub cur_health: u32,
    pub cur_mana: u32,
    pub npc_flag: u32,
    pub unit_flags: u32,
    pub dynamic_flags: u32,
}

/// Base attributes of a gameobject candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameObjectDefaults {
    pub anim_progress: u8,
    pub state: u8,
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Sparse creature attribute patch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatureOverride {
    pub spawn_time_min: u32,
    pub spawn_time_max: u32,
    pub ai_name: String,
    pub script_name: String,
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
    pub corpse_time_looted: u32,
    pub corpse_time_unlooted: u32,
    pub phase_mask: u32,
    pub spawn_mask: u8,
}

/// Sparse gameobject attribute patch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameObjectOverride {
    pub spawn_time_min: u32,
    pub spawn_time_max: u32,
    pub ai_name: String,
    pub script_name: String,
    pub anim_progress: u8,
    pub state: u8,
    pub rotation: Option<[f32; 4]>,
    pub phase_mask: u32,
    pub spawn_mask: u8,
}

/// An attribute patch for either kind of spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Override {
    Creature(CreatureOverride),
    GameObject(GameObjectOverride),
}

impl Override {
    pub fn kind(&self) -> SpawnKind {
        match self {
            Override::Creature(_) => SpawnKind::Creature,
            Override::GameObject(_) => SpawnKind::GameObject,
        }
    }
}

// ---------------------------------------------------------------------------
// CandidateItem
// ---------------------------------------------------------------------------

/// Kind-specific payload of a candidate item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemData {
    Creature {
        defaults: CreatureDefaults,
        override_data: Option<CreatureOverride>,
    },
    GameObject {
        defaults: GameObjectDefaults,
        override_data: Option<GameObjectOverride>,
    },
}

/// A weighted template a leaf pool may instantiate.
///
/// At most one candidate per `entry` exists within a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub pool_id: PoolId,
    pub entry: u32,
    pub chance: f32,
    pub data: ItemData,
}

impl CandidateItem {
    pub fn creature(pool_id: PoolId, entry: u32, chance: f32, defaults: CreatureDefaults) -> Self {
        Self {
            pool_id,
            entry,
            chance,
            data: ItemData::Creature {
                defaults,
                override_data: None,
            },
        }
    }

    pub fn game_object(pool_id: PoolId, entry: u32, chance: f32, defaults: GameObjectDefaults) -> Self {
        Self {
            pool_id,
            entry,
            chance,
            data: ItemData::GameObject {
                defaults,
                override_data: None,
            },
        }
    }

    pub fn kind(&self) -> SpawnKind {
        match self.data {
            ItemData::Creature { .. } => SpawnKind::Creature,
            ItemData::GameObject { .. } => SpawnKind::GameObject,
        }
    }

    /// Selection weight; anything below 1.0 counts as 1.0.
    #[inline]
    pub fn weight(&self) -> f32 {
        self.chance.max(1.0)
    }

    /// Attach an item-level override.
    ///
    /// Returns `false` (and leaves the item untouched) if the override kind
    /// does not match the item kind.
    pub fn set_override(&mut self, patch: Override) -> bool {
        match (&mut self.data, patch) {
            (ItemData::Creature { override_data, .. }, Override::Creature(o)) => {
                *override_data = Some(o);
                true
            }
            (ItemData::GameObject { override_data, .. }, Override::GameObject(o)) => {
                *override_data = Some(o);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_floors_at_one() {
        let item = CandidateItem::creature(PoolId(1), 100, 0.0, CreatureDefaults::default());
        assert_eq!(item.weight(), 1.0);
        let item = CandidateItem::creature(PoolId(1), 100, 25.5, CreatureDefaults::default());
        assert_eq!(item.weight(), 25.5);
    }

    #[test]
    fn override_must_match_kind() {
        let mut item = CandidateItem::game_object(PoolId(1), 500, 1.0, GameObjectDefaults::default());
        assert_eq!(item.kind(), SpawnKind::GameObject);
        assert!(!item.set_override(Override::Creature(CreatureOverride::default())));
        assert!(item.set_override(Override::GameObject(GameObjectOverride {
            state: 1,
            ..Default::default()
        })));
        match &item.data {
            ItemData::GameObject { override_data, .. } => {
                assert_eq!(override_data.as_ref().map(|o| o.state), Some(1));
            }
            ItemData::Creature { .. } => panic!("expected gameobject data"),
        }
    }

    #[test]
    fn override_kind() {
        let o = Override::Creature(CreatureOverride {
            cur_health: 10,
            ..Default::default()
        });
        assert_eq!(o.kind(), SpawnKind::Creature);
        assert_eq!(Override::GameObject(GameObjectOverride::default()).kind(), SpawnKind::GameObject);
    }
}
