//! Pending respawn timers.
//!
//! Each entity kind gets its own [`RespawnIndex`]. An index keeps one master
//! map keyed by `(pool, point)`, which enforces at most one timer per key, plus
//! two secondary indexes by grid and by zone so that a region becoming active
//! can pull its due timers without scanning everything.
//!
//! The scheduler stores data only. Executing a timer (spawning into the root
//! pool) is the registry's job.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ids::{GridId, PointId, PoolId, Timestamp, ZoneId};
use crate::template::SpawnKind;
use crate::PoolError;

type Key = (PoolId, PointId);

/// One scheduled respawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespawnInfo {
    pub kind: SpawnKind,
    /// The leaf pool that lost its entity.
    pub pool_id: PoolId,
    /// Root of `pool_id`; the respawn itself spawns into the root.
    pub root_id: PoolId,
    pub point_id: PointId,
    pub respawn_time: Timestamp,
    pub original_respawn_time: Timestamp,
    pub grid_id: GridId,
    pub zone_id: ZoneId,
}

impl RespawnInfo {
    fn key(&self) -> Key {
        (self.pool_id, self.point_id)
    }

    #[inline]
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.respawn_time <= now
    }
}

/// Selects timers for removal.
///
/// Exactly one of `pool`, `grid` or `zone` must be set. `point` narrows the
/// selection further.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RespawnFilter {
    pub pool: Option<PoolId>,
    pub grid: Option<GridId>,
    pub zone: Option<ZoneId>,
    pub point: Option<PointId>,
}

impl RespawnFilter {
    pub fn pool(pool: PoolId) -> Self {
        Self { pool: Some(pool), ..Self::default() }
    }

    pub fn grid(grid: GridId) -> Self {
        Self { grid: Some(grid), ..Self::default() }
    }

    pub fn zone(zone: ZoneId) -> Self {
        Self { zone: Some(zone), ..Self::default() }
    }

    pub fn with_point(mut self, point: PointId) -> Self {
        self.point = Some(point);
        self
    }

    fn validate(&self) -> Result<(), PoolError> {
        let given = [self.pool.is_some(), self.grid.is_some(), self.zone.is_some()]
            .into_iter()
            .filter(|set| *set)
            .count();
        if given == 1 {
            Ok(())
        } else {
            Err(PoolError::AmbiguousRespawnFilter { given })
        }
    }

    fn matches(&self, info: &RespawnInfo) -> bool {
        self.pool.map_or(true, |p| p == info.pool_id)
            && self.grid.map_or(true, |g| g == info.grid_id)
            && self.zone.map_or(true, |z| z == info.zone_id)
            && self.point.map_or(true, |p| p == info.point_id)
    }
}

// ---------------------------------------------------------------------------
// RespawnIndex
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RespawnIndex {
    by_key: BTreeMap<Key, RespawnInfo>,
    by_grid: BTreeMap<GridId, BTreeSet<Key>>,
    by_zone: BTreeMap<ZoneId, BTreeSet<Key>>,
}

impl RespawnIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn get(&self, pool: PoolId, point: PointId) -> Option<&RespawnInfo> {
        self.by_key.get(&(pool, point))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RespawnInfo> {
        self.by_key.values()
    }

    /// Insert a timer.
    ///
    /// If a timer already exists for the key, the earlier time wins and
    /// `false` is returned, unless `replace` is set, in which case the old
    /// timer is dropped in favour of `info`.
    pub fn add(&mut self, info: RespawnInfo, replace: bool) -> bool {
        let key = info.key();
        if let Some(existing) = self.by_key.get(&key) {
            if !replace && existing.respawn_time <= info.respawn_time {
                return false;
            }
            self.remove_key(key.0, key.1);
        }
        self.by_grid.entry(info.grid_id).or_default().insert(key);
        self.by_zone.entry(info.zone_id).or_default().insert(key);
        self.by_key.insert(key, info);
        true
    }

    /// Remove the timer for exactly `(pool, point)`.
    pub fn remove_key(&mut self, pool: PoolId, point: PointId) -> Option<RespawnInfo> {
        let info = self.by_key.remove(&(pool, point))?;
        let key = info.key();
        if let Some(keys) = self.by_grid.get_mut(&info.grid_id) {
            keys.remove(&key);
            if keys.is_empty() {
                self.by_grid.remove(&info.grid_id);
            }
        }
        if let Some(keys) = self.by_zone.get_mut(&info.zone_id) {
            keys.remove(&key);
            if keys.is_empty() {
                self.by_zone.remove(&info.zone_id);
            }
        }
        Some(info)
    }

    /// Remove every timer matching `filter`.
    pub fn remove(&mut self, filter: RespawnFilter) -> Result<Vec<RespawnInfo>, PoolError> {
        filter.validate()?;
        let keys: Vec<Key> = match (filter.grid, filter.zone) {
            (Some(grid), _) => self.by_grid.get(&grid).into_iter().flatten().copied().collect(),
            (_, Some(zone)) => self.by_zone.get(&zone).into_iter().flatten().copied().collect(),
            _ => self.by_key.keys().copied().collect(),
        };
        let matching: Vec<Key> = keys
            .into_iter()
            .filter(|k| self.by_key.get(k).is_some_and(|info| filter.matches(info)))
            .collect();
        Ok(matching
            .into_iter()
            .filter_map(|(pool, point)| self.remove_key(pool, point))
            .collect())
    }

    /// Timers in `grid`, soonest first.
    pub fn in_grid(&self, grid: GridId) -> Vec<&RespawnInfo> {
        self.collect_sorted(self.by_grid.get(&grid))
    }

    /// Timers in `zone`, soonest first.
    pub fn in_zone(&self, zone: ZoneId) -> Vec<&RespawnInfo> {
        self.collect_sorted(self.by_zone.get(&zone))
    }

    fn collect_sorted(&self, keys: Option<&BTreeSet<Key>>) -> Vec<&RespawnInfo> {
        let mut out: Vec<&RespawnInfo> = keys
            .into_iter()
            .flatten()
            .filter_map(|k| self.by_key.get(k))
            .collect();
        out.sort_by_key(|info| (info.respawn_time, info.key()));
        out
    }
}

// ---------------------------------------------------------------------------
// RespawnScheduler
// ---------------------------------------------------------------------------

/// Timers for both entity kinds plus per-region scan throttling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RespawnScheduler {
    creatures: RespawnIndex,
    game_objects: RespawnIndex,
    zone_checked: BTreeMap<ZoneId, Timestamp>,
    grid_checked: BTreeMap<GridId, Timestamp>,
    recheck_interval_secs: u64,
}

impl RespawnScheduler {
    pub fn new(recheck_interval_secs: u64) -> Self {
        Self {
            recheck_interval_secs,
            ..Self::default()
        }
    }

    pub fn index(&self, kind: SpawnKind) -> &RespawnIndex {
        match kind {
            SpawnKind::Creature => &self.creatures,
            SpawnKind::GameObject => &self.game_objects,
        }
    }

    fn index_mut(&mut self, kind: SpawnKind) -> &mut RespawnIndex {
        match kind {
            SpawnKind::Creature => &mut self.creatures,
            SpawnKind::GameObject => &mut self.game_objects,
        }
    }

    pub fn len(&self) -> usize {
        self.creatures.len() + self.game_objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every timer of both kinds, creatures first.
    pub fn iter(&self) -> impl Iterator<Item = &RespawnInfo> {
        self.creatures.iter().chain(self.game_objects.iter())
    }

    pub fn add(&mut self, info: RespawnInfo, replace: bool) -> bool {
        trace!(pool = %info.pool_id, point = %info.point_id, at = %info.respawn_time, "scheduling respawn");
        self.index_mut(info.kind).add(info, replace)
    }

    pub fn get(&self, kind: SpawnKind, pool: PoolId, point: PointId) -> Option<&RespawnInfo> {
        self.index(kind).get(pool, point)
    }

    pub fn remove_key(&mut self, kind: SpawnKind, pool: PoolId, point: PointId) -> Option<RespawnInfo> {
        self.index_mut(kind).remove_key(pool, point)
    }

    /// Remove matching timers of both kinds.
    pub fn remove(&mut self, filter: RespawnFilter) -> Result<Vec<RespawnInfo>, PoolError> {
        let mut removed = self.creatures.remove(filter)?;
        removed.extend(self.game_objects.remove(filter)?);
        Ok(removed)
    }

    /// Number of timers that will respawn into `root`. Shown by operator
    /// listings.
    pub fn pending_for_root(&self, root: PoolId) -> usize {
        self.iter().filter(|info| info.root_id == root).count()
    }

    /// Number of timers whose pool is in `pools`.
    pub fn pending_in(&self, pools: &BTreeSet<PoolId>) -> usize {
        self.iter().filter(|info| pools.contains(&info.pool_id)).count()
    }

    /// The timer that fires soonest among those respawning into `root`.
    pub fn earliest_for_root(&self, root: PoolId) -> Option<&RespawnInfo> {
        self.iter()
            .filter(|info| info.root_id == root)
            .min_by_key(|info| (info.respawn_time, info.key()))
    }

    /// Every timer due at `now`, soonest first.
    pub fn due(&self, now: Timestamp) -> Vec<RespawnInfo> {
        let mut due: Vec<RespawnInfo> = self.iter().filter(|i| i.is_due(now)).cloned().collect();
        due.sort_by_key(|info| (info.respawn_time, info.kind, info.key()));
        due
    }

    /// Due timers in `zone`, or `None` if the zone was scanned less than the
    /// recheck interval ago.
    pub fn due_in_zone(&mut self, zone: ZoneId, now: Timestamp) -> Option<Vec<RespawnInfo>> {
        if !Self::claim_scan(&mut self.zone_checked, zone, now, self.recheck_interval_secs) {
            return None;
        }
        let mut due: Vec<RespawnInfo> = [SpawnKind::Creature, SpawnKind::GameObject]
            .into_iter()
            .flat_map(|kind| self.index(kind).in_zone(zone))
            .filter(|i| i.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|info| (info.respawn_time, info.kind, info.key()));
        Some(due)
    }

    /// Due timers in `grid`, throttled like [`due_in_zone`](Self::due_in_zone).
    pub fn due_in_grid(&mut self, grid: GridId, now: Timestamp) -> Option<Vec<RespawnInfo>> {
        if !Self::claim_scan(&mut self.grid_checked, grid, now, self.recheck_interval_secs) {
            return None;
        }
        let mut due: Vec<RespawnInfo> = [SpawnKind::Creature, SpawnKind::GameObject]
            .into_iter()
            .flat_map(|kind| self.index(kind).in_grid(grid))
            .filter(|i| i.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|info| (info.respawn_time, info.kind, info.key()));
        Some(due)
    }

    fn claim_scan<K: Ord>(checked: &mut BTreeMap<K, Timestamp>, key: K, now: Timestamp, interval: u64) -> bool {
        if let Some(last) = checked.get(&key) {
            if now.secs_since(*last) < interval {
                return false;
            }
        }
        checked.insert(key, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(pool: u32, point: u32, at: u64) -> RespawnInfo {
        RespawnInfo {
            kind: SpawnKind::Creature,
            pool_id: PoolId(pool),
            root_id: PoolId(1),
            point_id: PointId(point),
            respawn_time: Timestamp(at),
            original_respawn_time: Timestamp(at),
            grid_id: GridId(point % 2),
            zone_id: ZoneId(point % 3),
        }
    }

    #[test]
    fn earlier_time_wins_without_replace() {
        let mut idx = RespawnIndex::new();
        assert!(idx.add(info(2, 10, 100), false));
        assert!(!idx.add(info(2, 10, 200), false));
        assert_eq!(idx.get(PoolId(2), PointId(10)).unwrap().respawn_time, Timestamp(100));

        assert!(idx.add(info(2, 10, 50), false));
        assert_eq!(idx.get(PoolId(2), PointId(10)).unwrap().respawn_time, Timestamp(50));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn replace_overrides_earlier_time() {
        let mut idx = RespawnIndex::new();
        idx.add(info(2, 10, 100), false);
        assert!(idx.add(info(2, 10, 300), true));
        assert_eq!(idx.get(PoolId(2), PointId(10)).unwrap().respawn_time, Timestamp(300));
        assert_eq!(idx.in_grid(GridId(0)).len(), 1);
    }

    #[test]
    fn removal_requires_single_primary_filter() {
        let mut idx = RespawnIndex::new();
        idx.add(info(2, 10, 100), false);

        let none = RespawnFilter::default();
        assert!(matches!(idx.remove(none), Err(PoolError::AmbiguousRespawnFilter { given: 0 })));

        let both = RespawnFilter { pool: Some(PoolId(2)), grid: Some(GridId(0)), ..Default::default() };
        assert!(matches!(idx.remove(both), Err(PoolError::AmbiguousRespawnFilter { given: 2 })));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn remove_by_each_scope() {
        let mut idx = RespawnIndex::new();
        for point in 0..6 {
            idx.add(info(2 + point % 2, point, 100), false);
        }
        let removed = idx.remove(RespawnFilter::pool(PoolId(2))).unwrap();
        assert_eq!(removed.len(), 3);

        let removed = idx.remove(RespawnFilter::zone(ZoneId(1)).with_point(PointId(1))).unwrap();
        assert_eq!(removed.len(), 1);

        let removed = idx.remove(RespawnFilter::grid(GridId(1))).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(idx.is_empty());
        assert!(idx.in_zone(ZoneId(0)).is_empty());
    }

    #[test]
    fn zone_scan_is_throttled() {
        let mut sched = RespawnScheduler::new(10);
        sched.add(info(2, 3, 5), false);

        let due = sched.due_in_zone(ZoneId(0), Timestamp(20)).unwrap();
        assert_eq!(due.len(), 1);
        assert!(sched.due_in_zone(ZoneId(0), Timestamp(25)).is_none());
        assert!(sched.due_in_zone(ZoneId(0), Timestamp(30)).is_some());
        // a different zone has its own throttle
        assert_eq!(sched.due_in_zone(ZoneId(2), Timestamp(25)), Some(Vec::new()));
    }

    #[test]
    fn root_queries() {
        let mut sched = RespawnScheduler::new(0);
        sched.add(info(2, 3, 500), false);
        sched.add(info(3, 4, 200), false);
        let mut go = info(4, 5, 100);
        go.kind = SpawnKind::GameObject;
        go.root_id = PoolId(9);
        sched.add(go, false);

        assert_eq!(sched.pending_for_root(PoolId(1)), 2);
        assert_eq!(sched.earliest_for_root(PoolId(1)).map(|i| i.point_id), Some(PointId(4)));
        assert_eq!(sched.due(Timestamp(250)).len(), 2);
        assert_eq!(sched.index(SpawnKind::GameObject).len(), 1);

        let pools: BTreeSet<PoolId> = [PoolId(2), PoolId(4)].into_iter().collect();
        assert_eq!(sched.pending_in(&pools), 2);
    }
}
