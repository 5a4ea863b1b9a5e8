//! Spawn orchestration and administrative pool operations.
//!
//! [`PoolRegistry::spawn_pool`] is the entry point for periodic and triggered
//! population. It runs [`PoolRegistry::spawn_single`] repeatedly, first in
//! minimum mode until that fails once, then in maximum mode.
//!
//! Running out of capacity, points or children is a normal outcome here and is
//! reported as `false` or a zero count, never as an error.

use std::collections::BTreeSet;

use tracing::{debug, info, trace};

use crate::host::MapHost;
use crate::ids::{GridId, PointId, PoolId, ZoneId};
use crate::random::RandomSource;
use crate::registry::PoolRegistry;
use crate::respawn::{RespawnFilter, RespawnInfo};
use crate::template::SpawnKind;
use crate::PoolError;

impl<H: MapHost> PoolRegistry<H> {
    /// How many more entities `pool`'s subtree may hold.
    pub fn spawnable(&self, pool: PoolId, minimum_only: bool) -> u32 {
        self.tree.spawnable(pool, minimum_only)
    }

    /// Spawn up to `count` entities into `pool`. With `count == 0` the pool's
    /// max-mode capacity minus its pending respawn timers is used.
    ///
    /// Returns the number of entities spawned. Missing and inactive pools
    /// spawn nothing.
    pub fn spawn_pool(&mut self, pool: PoolId, count: u32) -> u32 {
        if !self.tree.contains(pool) {
            debug!(map = %self.map_id, pool = %pool, "spawn requested for unknown pool");
            return 0;
        }
        if !self.tree.is_active(pool) {
            debug!(map = %self.map_id, pool = %pool, "pool inactive, not spawning");
            return 0;
        }

        let count = if count == 0 {
            let members: BTreeSet<PoolId> = self.tree.subtree(pool).into_iter().collect();
            let pending = u32::try_from(self.respawns.pending_in(&members)).unwrap_or(u32::MAX);
            self.tree.spawnable(pool, false).saturating_sub(pending)
        } else {
            count
        };

        let mut minimum_only = true;
        let mut spawned = 0;
        for _ in 0..count {
            if minimum_only {
                if self.spawn_single(pool, true) {
                    spawned += 1;
                    continue;
                }
                minimum_only = false;
            }
            if self.spawn_single(pool, false) {
                spawned += 1;
            }
        }

        debug!(map = %self.map_id, pool = %pool, requested = count, spawned, "spawn pass finished");
        spawned
    }

    /// One weighted descent from `pool` to a leaf, then one instantiation.
    ///
    /// Each level only considers children with max-mode capacity left. A
    /// failure below a chosen child fails the whole call; siblings are not
    /// retried.
    pub fn spawn_single(&mut self, pool: PoolId, minimum_only: bool) -> bool {
        let mut current = pool;
        loop {
            if !self.tree.can_spawn(current, minimum_only) {
                return false;
            }
            let Some(node) = self.tree.get(current) else {
                return false;
            };
            if node.is_leaf() {
                break;
            }
            match self.tree.pick_child(current, &mut self.rng) {
                Some(child) => current = child,
                None => return false,
            }
        }

        let free = self.tree.spawn_list(current, true, &self.points);
        if free.is_empty() {
            trace!(map = %self.map_id, pool = %current, "no free spawn point");
            return false;
        }
        let last = u32::try_from(free.len() - 1).unwrap_or(u32::MAX);
        let point = free[self.rng.int_in(0, last) as usize];

        let Some(entry) = self.tree.pick_item(current, &mut self.rng) else {
            trace!(map = %self.map_id, pool = %current, "leaf has no candidates");
            return false;
        };
        let Some(kind) = self.tree.get(current).map(|n| n.kind()) else {
            return false;
        };

        match kind {
            SpawnKind::Creature => self.spawn_creature(current, entry, point),
            SpawnKind::GameObject => self.spawn_game_object(current, entry, point),
        }
    }

    /// Populate every active root to its capacity.
    pub fn spawn_all(&mut self) -> u32 {
        let roots = self.root_pools();
        let spawned: u32 = roots.into_iter().map(|root| self.spawn_pool(root, 0)).sum();
        info!(map = %self.map_id, spawned, "initial population spawned");
        spawned
    }

    /// Remove every live entity (and, with `include_corpses`, every corpse)
    /// belonging to `pool`'s subtree, clearing the spawn point reservations.
    ///
    /// Returns the number of reservations released.
    pub fn despawn_pool(&mut self, pool: PoolId, include_corpses: bool) -> u32 {
        if !self.tree.contains(pool) {
            return 0;
        }
        let members: BTreeSet<PoolId> = self.tree.subtree(pool).into_iter().collect();
        let occupied: Vec<PointId> = self
            .points
            .values()
            .filter(|p| p.current_item().is_some_and(|item| members.contains(&item.pool_id)))
            .map(|p| p.id)
            .collect();

        let mut released = 0;
        for point_id in occupied {
            let Some(point) = self.points.get_mut(&point_id) else {
                continue;
            };
            if let Some(handle) = point.detach() {
                self.live.remove(&handle);
                self.host.destroy(handle);
            }
            if let Some(item) = point.release() {
                self.tree.adjust_spawned(item.pool_id, -1, false);
                released += 1;
            }
        }

        let mut corpses = 0;
        if include_corpses {
            for point in self.points.values_mut() {
                for remains in point.take_remains(|r| members.contains(&r.pool_id)) {
                    self.host.destroy(remains.handle);
                    corpses += 1;
                }
            }
        }

        if released > 0 || corpses > 0 {
            info!(map = %self.map_id, pool = %pool, released, corpses, "despawned pool");
        }
        released
    }

    /// Drop pending timers under `pool`, then spawn it back to capacity.
    pub fn respawn_pool(&mut self, pool: PoolId) -> u32 {
        if !self.tree.contains(pool) {
            return 0;
        }
        let cleared: usize = self
            .tree
            .subtree(pool)
            .into_iter()
            .filter_map(|id| self.respawns.remove(RespawnFilter::pool(id)).ok())
            .map(|removed| removed.len())
            .sum();
        let spawned = self.spawn_pool(pool, 0);
        info!(map = %self.map_id, pool = %pool, cleared, spawned, "respawned pool");
        spawned
    }

    /// Despawn then respawn.
    pub fn reseed_pool(&mut self, pool: PoolId) -> u32 {
        self.despawn_pool(pool, false);
        self.respawn_pool(pool)
    }

    /// Toggle a pool's manual-activation gate.
    ///
    /// Activating spawns the pool to capacity and returns the spawn count.
    /// Deactivating despawns it, drops its timers and returns the despawn
    /// count. Unknown pools return `None`.
    pub fn set_active(&mut self, pool: PoolId, active: bool) -> Option<u32> {
        let node = self.tree.get_mut(pool)?;
        node.active = active;
        info!(map = %self.map_id, pool = %pool, active, "pool activation changed");
        if active {
            Some(self.spawn_pool(pool, 0))
        } else {
            let dropped: usize = self
                .tree
                .subtree(pool)
                .into_iter()
                .filter_map(|id| self.respawns.remove(RespawnFilter::pool(id)).ok())
                .map(|removed| removed.len())
                .sum();
            debug!(map = %self.map_id, pool = %pool, dropped, "timers dropped on deactivation");
            Some(self.despawn_pool(pool, false))
        }
    }

    /// Cancel pending timers. Removal is plain data deletion.
    pub fn clear_respawns(&mut self, filter: RespawnFilter) -> Result<Vec<RespawnInfo>, PoolError> {
        self.respawns.remove(filter)
    }

    // -- timers -------------------------------------------------------------

    /// Try an immediate replacement spawn after `pool` lost an entity.
    ///
    /// Only runs when the root is below its minimum and has a pending timer.
    /// The timer for `(pool, point)` is preferred, else the root's soonest
    /// one. The timer is cancelled only if the spawn succeeds.
    pub(crate) fn expedite(&mut self, kind: SpawnKind, pool: PoolId, point: PointId) -> bool {
        let Some(root) = self.tree.root_of(pool) else {
            return false;
        };
        if !self.tree.can_spawn(root, true) {
            return false;
        }
        let target = match self.respawns.get(kind, pool, point) {
            Some(info) => (info.kind, info.pool_id, info.point_id),
            None => match self.respawns.earliest_for_root(root) {
                Some(info) => (info.kind, info.pool_id, info.point_id),
                None => return false,
            },
        };

        if self.spawn_pool(root, 1) == 1 {
            let (kind, pool, point) = target;
            self.respawns.remove_key(kind, pool, point);
            debug!(map = %self.map_id, pool = %pool, point = %point, "expedited respawn");
            true
        } else {
            false
        }
    }

    fn run_timers(&mut self, due: Vec<RespawnInfo>) -> u32 {
        let mut spawned = 0;
        for info in due {
            // an expedited spawn may already have consumed it
            if self.respawns.remove_key(info.kind, info.pool_id, info.point_id).is_none() {
                continue;
            }
            spawned += self.spawn_pool(info.root_id, 1);
        }
        spawned
    }

    /// Run the due timers of a zone that just became active.
    ///
    /// Scans are throttled per zone by the configured recheck interval.
    pub fn respawn_cell_area_zone(&mut self, zone: ZoneId) -> u32 {
        let now = self.host.now();
        match self.respawns.due_in_zone(zone, now) {
            Some(due) => self.run_timers(due),
            None => 0,
        }
    }

    /// Run the due timers of a grid, throttled like zones.
    pub fn respawn_grid(&mut self, grid: GridId) -> u32 {
        let now = self.host.now();
        match self.respawns.due_in_grid(grid, now) {
            Some(due) => self.run_timers(due),
            None => 0,
        }
    }

    /// Run every due timer regardless of region activity.
    pub fn respawn_due(&mut self) -> u32 {
        let due = self.respawns.due(self.host.now());
        self.run_timers(due)
    }
}
