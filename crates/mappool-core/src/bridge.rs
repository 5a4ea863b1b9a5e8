//! Turning reservations into entities, and entity removals back into counts.
//!
//! Spawning always reserves the point and bumps the pool counters at call
//! time. Materialization through the [`EntityFactory`](crate::host::EntityFactory)
//! only happens when the point's grid is loaded, and only ever fills in
//! `current_object`. A point reserved in an unloaded grid is materialized
//! later by [`PoolRegistry::spawn_pending_point`] or
//! [`PoolRegistry::on_grid_loaded`].

use tracing::{debug, trace, warn};

use crate::handle::EntityHandle;
use crate::host::{MapHost, SpawnRequest};
use crate::ids::{GridId, PointId, PoolId, Timestamp};
use crate::point::{ItemRef, Remains};
use crate::random::RandomSource;
use crate::registry::{LiveSpawn, PoolRegistry};
use crate::respawn::RespawnInfo;
use crate::template::SpawnKind;

impl<H: MapHost> PoolRegistry<H> {
    /// Reserve `point` for creature `entry` of `pool` and materialize it if
    /// the point's grid is loaded.
    ///
    /// # Panics
    ///
    /// Panics if the point is already reserved.
    pub fn spawn_creature(&mut self, pool: PoolId, entry: u32, point: PointId) -> bool {
        self.spawn_kind(SpawnKind::Creature, pool, entry, point)
    }

    /// Gameobject counterpart of [`spawn_creature`](Self::spawn_creature).
    pub fn spawn_game_object(&mut self, pool: PoolId, entry: u32, point: PointId) -> bool {
        self.spawn_kind(SpawnKind::GameObject, pool, entry, point)
    }

    fn spawn_kind(&mut self, kind: SpawnKind, pool: PoolId, entry: u32, point_id: PointId) -> bool {
        let valid = self
            .tree
            .get(pool)
            .and_then(|node| node.item(entry))
            .is_some_and(|item| item.kind() == kind);
        if !valid {
            debug!(map = %self.map_id, pool = %pool, entry, "no such candidate for this kind");
            return false;
        }
        let Some(point) = self.points.get_mut(&point_id) else {
            debug!(map = %self.map_id, point = %point_id, "spawn at unknown point");
            return false;
        };

        point.reserve(ItemRef { pool_id: pool, entry, kind });
        let position = point.position;
        self.tree.adjust_spawned(pool, 1, false);

        if self.host.is_region_loaded(&position) && !self.materialize(point_id) {
            if let Some(point) = self.points.get_mut(&point_id) {
                point.release();
            }
            self.tree.adjust_spawned(pool, -1, false);
            return false;
        }
        trace!(map = %self.map_id, pool = %pool, point = %point_id, entry, "spawned");
        true
    }

    /// Ask the factory for the entity reserved at `point_id`.
    ///
    /// Already-materialized points succeed without a second instantiation.
    fn materialize(&mut self, point_id: PointId) -> bool {
        let Some(point) = self.points.get(&point_id) else {
            return false;
        };
        let Some(reserved) = point.current_item() else {
            return false;
        };
        if point.current_object().is_some() {
            return true;
        }
        let Some(node) = self.tree.get(reserved.pool_id) else {
            return false;
        };
        let Some(item) = node.item(reserved.entry) else {
            return false;
        };

        let request = SpawnRequest {
            kind: reserved.kind,
            pool_id: reserved.pool_id,
            point_id,
            entry: reserved.entry,
            position: point.position,
            attributes: self.overrides.resolve(point, item, node.template()),
        };
        let Some(handle) = self.host.instantiate(&request) else {
            warn!(map = %self.map_id, pool = %reserved.pool_id, point = %point_id, entry = reserved.entry, "entity factory refused spawn");
            return false;
        };

        if let Some(point) = self.points.get_mut(&point_id) {
            point.attach(handle);
        }
        self.live.insert(
            handle,
            LiveSpawn {
                kind: reserved.kind,
                pool_id: reserved.pool_id,
                point_id,
                entry: reserved.entry,
            },
        );
        true
    }

    /// Materialize a reservation whose grid has since been loaded.
    pub fn spawn_pending_point(&mut self, point_id: PointId) -> bool {
        let Some(point) = self.points.get(&point_id) else {
            return false;
        };
        if !point.is_pending() || !self.host.is_region_loaded(&point.position) {
            return false;
        }
        self.materialize(point_id)
    }

    /// Materialize every pending reservation in `grid`.
    pub fn on_grid_loaded(&mut self, grid: GridId) -> u32 {
        let pending: Vec<PointId> = self
            .points
            .values()
            .filter(|p| p.grid_id == grid && p.is_pending())
            .map(|p| p.id)
            .collect();
        let materialized = pending.into_iter().filter(|&id| self.spawn_pending_point(id)).count();
        debug!(map = %self.map_id, grid = %grid, materialized, "grid loaded");
        u32::try_from(materialized).unwrap_or(u32::MAX)
    }

    /// Destroy the live entities of `grid`, keeping reservations and counts
    /// so the grid repopulates identically when it loads again.
    pub fn on_grid_unloaded(&mut self, grid: GridId) -> u32 {
        let live: Vec<EntityHandle> = self
            .points
            .values()
            .filter(|p| p.grid_id == grid)
            .filter_map(|p| p.current_object())
            .collect();
        let mut unloaded = 0;
        for handle in live {
            if self.handle_despawn(handle, true) {
                self.host.destroy(handle);
                unloaded += 1;
            }
        }
        debug!(map = %self.map_id, grid = %grid, unloaded, "grid unloaded");
        unloaded
    }

    /// A pool entity died.
    ///
    /// The body stays on its point as remains until its corpse time runs
    /// out, the reservation is released, counts drop, a respawn timer is
    /// scheduled and an immediate replacement is attempted if the root fell
    /// below its minimum. Returns `false` for handles the registry does not
    /// track.
    pub fn handle_death(&mut self, handle: EntityHandle, looted: bool) -> bool {
        let Some(spawn) = self.live.remove(&handle) else {
            return false;
        };
        let now = self.host.now();

        let (Some(point), Some(node)) = (self.points.get(&spawn.point_id), self.tree.get(spawn.pool_id)) else {
            return false;
        };
        let template = node.template();
        let (corpse_secs, (min_secs, max_secs)) = match node.item(spawn.entry) {
            Some(item) => {
                let attributes = self.overrides.resolve(point, item, template);
                (attributes.corpse_secs(looted), attributes.spawn_time_range())
            }
            None => (
                template.corpse_times.for_loot_state(looted),
                (template.spawn_times.min_secs, template.spawn_times.max_secs),
            ),
        };
        let fast_secs = template.spawn_times.fast_secs;
        let root = node.root();
        let (grid_id, zone_id) = (point.grid_id, point.zone_id);

        if let Some(point) = self.points.get_mut(&spawn.point_id) {
            point.detach();
            point.retire(Remains {
                handle,
                pool_id: spawn.pool_id,
                expires_at: now.plus_secs(u64::from(corpse_secs)),
            });
            point.release();
        }
        self.tree.adjust_spawned(spawn.pool_id, -1, false);

        let delay = if fast_secs > 0 && self.tree.can_spawn(root, true) {
            fast_secs
        } else if max_secs > 0 || min_secs > 0 {
            self.rng.int_in(min_secs, max_secs.max(min_secs))
        } else {
            self.config.default_respawn_secs
        };
        let respawn_time = now.plus_secs(u64::from(delay));

        self.respawns.add(
            RespawnInfo {
                kind: spawn.kind,
                pool_id: spawn.pool_id,
                root_id: root,
                point_id: spawn.point_id,
                respawn_time,
                original_respawn_time: respawn_time,
                grid_id,
                zone_id,
            },
            false,
        );
        debug!(map = %self.map_id, pool = %spawn.pool_id, point = %spawn.point_id, delay, "entity died");

        self.expedite(spawn.kind, spawn.pool_id, spawn.point_id);
        true
    }

    /// A pool entity left the world without dying.
    ///
    /// With `bulk` (a grid unload) only the entity link is cleared: the point
    /// stays reserved and counts are untouched. Otherwise the reservation is
    /// released, counts drop and an immediate replacement is attempted.
    pub fn handle_despawn(&mut self, handle: EntityHandle, bulk: bool) -> bool {
        let Some(spawn) = self.live.remove(&handle) else {
            return false;
        };
        let Some(point) = self.points.get_mut(&spawn.point_id) else {
            return false;
        };
        point.detach();
        if bulk {
            return true;
        }
        point.release();
        self.tree.adjust_spawned(spawn.pool_id, -1, false);
        self.expedite(spawn.kind, spawn.pool_id, spawn.point_id);
        true
    }

    /// Destroy remains whose corpse time has run out. Returns how many.
    pub fn expire_remains(&mut self) -> u32 {
        let now: Timestamp = self.host.now();
        let mut expired = 0;
        for point in self.points.values_mut() {
            for remains in point.take_remains(|r| r.expires_at <= now) {
                self.host.destroy(remains.handle);
                expired += 1;
            }
        }
        expired
    }
}
