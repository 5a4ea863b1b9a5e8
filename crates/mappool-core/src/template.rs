//! Pool templates: the per-node configuration loaded from storage.

use serde::{Deserialize, Serialize};

use crate::ids::{MapId, PoolId};

// ---------------------------------------------------------------------------
// SpawnKind
// ---------------------------------------------------------------------------

/// What a pool (and each of its candidate items) spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnKind {
    #[default]
    Creature,
    GameObject,
}

impl SpawnKind {
    /// Decode the storage type code (`0` creature, `1` gameobject).
    ///
    /// Returns `None` for any other code; such templates are rejected at load.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SpawnKind::Creature),
            1 => Some(SpawnKind::GameObject),
            _ => None,
        }
    }

    /// The storage type code.
    pub fn code(self) -> u8 {
        match self {
            SpawnKind::Creature => 0,
            SpawnKind::GameObject => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// PoolFlags
// ---------------------------------------------------------------------------

/// Bit flags attached to a pool template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolFlags(pub u32);

impl PoolFlags {
    pub const NONE: PoolFlags = PoolFlags(0);
    /// The pool only spawns after an explicit activation.
    pub const MANUAL_SPAWN: PoolFlags = PoolFlags(0x01);
    pub const ALL: PoolFlags = PoolFlags(0x01);

    #[inline]
    pub fn contains(self, other: PoolFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Drop any bits that have no meaning.
    #[inline]
    pub fn sanitized(self) -> PoolFlags {
        PoolFlags(self.0 & Self::ALL.0)
    }
}

// ---------------------------------------------------------------------------
// Time ranges
// ---------------------------------------------------------------------------

/// Respawn delay range in seconds. Zero fields inherit from the parent pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpawnTimes {
    pub min_secs: u32,
    pub max_secs: u32,
    /// Delay used instead of the range while the root is under its minimum.
    pub fast_secs: u32,
}

/// How long remains persist after death, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorpseTimes {
    pub looted_secs: u32,
    pub unlooted_secs: u32,
}

impl CorpseTimes {
    /// Persist time for a corpse in the given loot state.
    pub fn for_loot_state(&self, looted: bool) -> u32 {
        if looted {
            self.looted_secs
        } else {
            self.unlooted_secs
        }
    }
}

// ---------------------------------------------------------------------------
// PoolTemplate
// ---------------------------------------------------------------------------

/// Configuration of a single pool node.
///
/// After the hierarchy is built, the registry runs a top-down pass that fills
/// zero-valued inheritable fields from the nearest ancestor (see
/// [`PoolTemplate::inherit_from`]), so spawn-time lookups never need to walk
/// the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolTemplate {
    pub map_id: MapId,
    pub pool_id: PoolId,
    pub kind: SpawnKind,
    pub phase_mask: u32,
    pub spawn_mask: u8,
    pub min_limit: u32,
    pub max_limit: u32,
    pub movement_type: u8,
    pub spawn_dist: f32,
    pub spawn_times: SpawnTimes,
    pub corpse_times: CorpseTimes,
    pub description: String,
    pub flags: PoolFlags,
}

impl PoolTemplate {
    /// A template with the given bounds and every other field zeroed.
    pub fn new(map_id: MapId, pool_id: PoolId, kind: SpawnKind, min_limit: u32, max_limit: u32) -> Self {
        Self {
            map_id,
            pool_id,
            kind,
            phase_mask: 0,
            spawn_mask: 0,
            min_limit,
            max_limit,
            movement_type: 0,
            spawn_dist: 0.0,
            spawn_times: SpawnTimes::default(),
            corpse_times: CorpseTimes::default(),
            description: String::new(),
            flags: PoolFlags::NONE,
        }
    }

    /// Fill every zero inheritable field from `parent`.
    ///
    /// Inherited: spawn time range and fast time, both corpse times, phase
    /// mask, spawn mask. Limits are never copied here; see
    /// [`PoolTree::trickle`](crate::tree::PoolTree::trickle).
    pub fn inherit_from(&mut self, parent: &PoolTemplate) {
        fn fill(field: &mut u32, parent: u32) {
            if *field == 0 {
                *field = parent;
            }
        }

        fill(&mut self.spawn_times.min_secs, parent.spawn_times.min_secs);
        fill(&mut self.spawn_times.max_secs, parent.spawn_times.max_secs);
        fill(&mut self.spawn_times.fast_secs, parent.spawn_times.fast_secs);
        fill(&mut self.corpse_times.looted_secs, parent.corpse_times.looted_secs);
        fill(&mut self.corpse_times.unlooted_secs, parent.corpse_times.unlooted_secs);
        fill(&mut self.phase_mask, parent.phase_mask);
        if self.spawn_mask == 0 {
            self.spawn_mask = parent.spawn_mask;
        }
    }

    pub fn is_manual_spawn(&self) -> bool {
        self.flags.contains(PoolFlags::MANUAL_SPAWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes() {
        assert_eq!(SpawnKind::from_code(0), Some(SpawnKind::Creature));
        assert_eq!(SpawnKind::from_code(1), Some(SpawnKind::GameObject));
        assert_eq!(SpawnKind::from_code(2), None);
        assert_eq!(SpawnKind::GameObject.code(), 1);
    }

    #[test]
    fn inherit_fills_only_zero_fields() {
        let mut parent = PoolTemplate::new(MapId(1), PoolId(1), SpawnKind::Creature, 2, 5);
        parent.spawn_times = SpawnTimes { min_secs: 60, max_secs: 120, fast_secs: 10 };
        parent.corpse_times = CorpseTimes { looted_secs: 30, unlooted_secs: 90 };
        parent.phase_mask = 1;
        parent.spawn_mask = 3;

        let mut child = PoolTemplate::new(MapId(1), PoolId(2), SpawnKind::Creature, 0, 0);
        child.spawn_times.max_secs = 300;
        child.phase_mask = 4;
        child.inherit_from(&parent);

        assert_eq!(child.spawn_times, SpawnTimes { min_secs: 60, max_secs: 300, fast_secs: 10 });
        assert_eq!(child.corpse_times, parent.corpse_times);
        assert_eq!(child.phase_mask, 4);
        assert_eq!(child.spawn_mask, 3);
        assert_eq!((child.min_limit, child.max_limit), (0, 0));
    }

    #[test]
    fn own_limits_are_untouched() {
        let parent = PoolTemplate::new(MapId(1), PoolId(1), SpawnKind::Creature, 2, 5);
        let mut child = PoolTemplate::new(MapId(1), PoolId(2), SpawnKind::Creature, 0, 3);
        child.inherit_from(&parent);
        assert_eq!((child.min_limit, child.max_limit), (0, 3));
    }

    #[test]
    fn manual_flag() {
        let mut t = PoolTemplate::new(MapId(1), PoolId(1), SpawnKind::GameObject, 0, 1);
        assert!(!t.is_manual_spawn());
        t.flags = PoolFlags(0xff).sanitized();
        assert_eq!(t.flags, PoolFlags::MANUAL_SPAWN);
        assert!(t.is_manual_spawn());
    }
}
