//! Persisted respawn timers with BLAKE3 hashing.
//!
//! Only pending timers survive a restart; live populations are rebuilt by the
//! normal spawn pass, which deducts restored timers from each root's
//! capacity. A [`TimerSnapshot`] carries a hash of its content so a corrupted
//! or hand-edited file is rejected instead of silently restoring wrong
//! timers.
//!
//! ```
//! use mappool_core::prelude::*;
//! use mappool_world::prelude::*;
//!
//! let data = PoolData {
//!     templates: vec![PoolTemplateRow::new(1, SpawnKind::Creature, 0, 1).with_spawn_times(60, 60, 0)],
//!     spawn_points: vec![SpawnPointRow::new(1, 0.0, 0.0, 0.0)],
//!     pool_spawns: vec![PoolSpawnRow::new(1, 1)],
//!     creatures: vec![CreatureItemRow::new(1, 10, 1.0)],
//!     ..PoolData::default()
//! };
//! let mut instance = MapInstance::load(MapId(0), &data, InMemoryHost::new(), InstanceConfig::default()).unwrap();
//! let victim = instance.registry().point(PointId(1)).unwrap().current_object().unwrap();
//! instance.registry_mut().handle_death(victim, true);
//!
//! let snapshot = TimerSnapshot::capture(&instance).unwrap();
//! assert_eq!(snapshot.timers.len(), 1);
//! assert_eq!(snapshot.hash.len(), 64); // BLAKE3 hex digest
//!
//! let restored = TimerSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
//! assert_eq!(restored, snapshot);
//! ```

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use mappool_core::host::MapHost;
use mappool_core::ids::{MapId, PointId, PoolId, Timestamp};

use crate::instance::MapInstance;
use crate::WorldError;

// ---------------------------------------------------------------------------
// PersistedTimer
// ---------------------------------------------------------------------------

/// One pending respawn as stored between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersistedTimer {
    pub pool_id: PoolId,
    pub point_id: PointId,
    pub map_id: MapId,
    pub instance_id: u32,
    /// Absolute time the respawn becomes due.
    pub timestamp: Timestamp,
}

// ---------------------------------------------------------------------------
// TimerSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub map_id: MapId,
    pub instance_id: u32,
    /// Game time at capture.
    pub taken_at: Timestamp,
    pub timers: Vec<PersistedTimer>,
    /// BLAKE3 hex digest of every other field.
    pub hash: String,
}

fn compute_hash(
    map_id: MapId,
    instance_id: u32,
    taken_at: Timestamp,
    timers: &[PersistedTimer],
) -> Result<String, WorldError> {
    #[derive(Serialize)]
    struct HashableState<'a> {
        map_id: MapId,
        instance_id: u32,
        taken_at: Timestamp,
        timers: &'a [PersistedTimer],
    }

    let hashable = HashableState {
        map_id,
        instance_id,
        taken_at,
        timers,
    };
    let json_bytes = serde_json::to_vec(&hashable)?;
    Ok(blake3::hash(&json_bytes).to_hex().to_string())
}

impl TimerSnapshot {
    /// Capture every pending timer of `instance`, sorted.
    pub fn capture<H: MapHost>(instance: &MapInstance<H>) -> Result<Self, WorldError> {
        let registry = instance.registry();
        let map_id = registry.map_id();
        let instance_id = instance.instance_id();
        let mut timers: Vec<PersistedTimer> = registry
            .respawns()
            .iter()
            .map(|info| PersistedTimer {
                pool_id: info.pool_id,
                point_id: info.point_id,
                map_id,
                instance_id,
                timestamp: info.respawn_time,
            })
            .collect();
        timers.sort();

        let taken_at = registry.now();
        let hash = compute_hash(map_id, instance_id, taken_at, &timers)?;
        Ok(Self {
            map_id,
            instance_id,
            taken_at,
            timers,
            hash,
        })
    }

    /// Recompute the hash and compare it with the stored one.
    pub fn verify(&self) -> Result<(), WorldError> {
        let actual = compute_hash(self.map_id, self.instance_id, self.taken_at, &self.timers)?;
        if actual != self.hash {
            return Err(WorldError::SnapshotHashMismatch {
                expected: self.hash.clone(),
                actual,
            });
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, WorldError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and verify a snapshot.
    pub fn from_json(text: &str) -> Result<Self, WorldError> {
        let snapshot: Self = serde_json::from_str(text)?;
        snapshot.verify()?;
        Ok(snapshot)
    }

    /// Re-create the timers in `instance`. Timers addressed to another map or
    /// instance, or to pools and points that no longer exist, are skipped.
    ///
    /// Returns the number of timers restored.
    pub fn restore<H: MapHost>(&self, instance: &mut MapInstance<H>) -> Result<usize, WorldError> {
        self.verify()?;
        let map_id = instance.map_id();
        let instance_id = instance.instance_id();

        let mut restored = 0;
        for timer in &self.timers {
            if timer.map_id != map_id || timer.instance_id != instance_id {
                warn!(map = %timer.map_id, instance = timer.instance_id, "timer for another instance skipped");
                continue;
            }
            match instance
                .registry_mut()
                .restore_respawn_timer(timer.pool_id, timer.point_id, timer.timestamp)
            {
                Ok(true) => restored += 1,
                Ok(false) => {}
                Err(err) => warn!(map = %map_id, pool = %timer.pool_id, point = %timer.point_id, %err, "stale timer skipped"),
            }
        }
        info!(map = %map_id, instance = instance_id, restored, "respawn timers restored");
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceConfig;
    use mappool_core::prelude::*;

    fn instance(spawn_on_load: bool) -> MapInstance<InMemoryHost> {
        let data = PoolData {
            templates: vec![PoolTemplateRow::new(1, SpawnKind::Creature, 0, 2).with_spawn_times(90, 90, 0)],
            spawn_points: vec![SpawnPointRow::new(1, 0.0, 0.0, 0.0), SpawnPointRow::new(2, 3.0, 0.0, 0.0)],
            pool_spawns: vec![PoolSpawnRow::new(1, 1), PoolSpawnRow::new(1, 2)],
            creatures: vec![CreatureItemRow::new(1, 10, 1.0)],
            ..PoolData::default()
        };
        let config = InstanceConfig {
            spawn_on_load,
            ..InstanceConfig::default()
        };
        MapInstance::load(MapId(4), &data, InMemoryHost::new(), config).unwrap()
    }

    #[test]
    fn tampering_is_detected() {
        let mut source = instance(true);
        let victim = source.registry().point(PointId(2)).unwrap().current_object().unwrap();
        source.registry_mut().handle_death(victim, false);

        let mut snapshot = TimerSnapshot::capture(&source).unwrap();
        snapshot.timers[0].timestamp = Timestamp(1);
        assert!(matches!(snapshot.verify(), Err(WorldError::SnapshotHashMismatch { .. })));
        assert!(TimerSnapshot::from_json(&snapshot.to_json().unwrap()).is_err());
    }

    #[test]
    fn restore_skips_foreign_and_stale_timers() {
        let mut source = instance(true);
        let victim = source.registry().point(PointId(1)).unwrap().current_object().unwrap();
        source.registry_mut().handle_death(victim, false);
        let mut snapshot = TimerSnapshot::capture(&source).unwrap();

        snapshot.timers.push(PersistedTimer {
            map_id: MapId(5),
            ..snapshot.timers[0]
        });
        snapshot.timers.push(PersistedTimer {
            pool_id: PoolId(99),
            ..snapshot.timers[0]
        });
        snapshot.hash = compute_hash(snapshot.map_id, snapshot.instance_id, snapshot.taken_at, &snapshot.timers).unwrap();

        let mut target = instance(false);
        assert_eq!(snapshot.restore(&mut target).unwrap(), 1);
        let timer = target.registry().respawns().get(SpawnKind::Creature, PoolId(1), PointId(1)).unwrap();
        assert_eq!(timer.respawn_time, Timestamp(90));

        // the pending timer holds back one slot of the initial spawn
        assert_eq!(target.registry_mut().spawn_all(), 1);
    }
}
