//! The per-map owner of every pool, spawn point, override and timer.
//!
//! A [`PoolRegistry`] is built from flat [`PoolData`] rows by
//! [`PoolRegistry::load`]. The operations are spread over three files, each
//! adding an `impl` block:
//!
//! - this file: loading, validation, lookups, state hashing;
//! - [`spawn`](crate::spawn): spawn orchestration, administrative
//!   despawn/respawn/reseed, activation, timer execution;
//! - [`bridge`](crate::bridge): instantiating reservations through the host and
//!   handling deaths, despawns and grid loads.
//!
//! One registry belongs to one map. Registries share nothing, so separate
//! maps can be driven from separate threads without locking.

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::RegistryConfig;
use crate::handle::EntityHandle;
use crate::host::MapHost;
use crate::ids::{MapId, PointId, PoolId, Timestamp};
use crate::item::{CandidateItem, Override};
use crate::overrides::OverrideSet;
use crate::point::{ItemRef, SpawnPoint};
use crate::pool::PoolNode;
use crate::respawn::{RespawnInfo, RespawnScheduler};
use crate::rows::{OverrideScope, PoolData};
use crate::template::SpawnKind;
use crate::tree::PoolTree;
use crate::PoolError;

/// Counts of rows accepted and skipped while loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub templates: usize,
    pub edges: usize,
    pub spawn_points: usize,
    pub assignments: usize,
    pub items: usize,
    pub overrides: usize,
    pub skipped: usize,
    pub leaves_without_items: usize,
}

/// What a live entity was spawned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSpawn {
    pub kind: SpawnKind,
    pub pool_id: PoolId,
    pub point_id: PointId,
    pub entry: u32,
}

pub struct PoolRegistry<H: MapHost> {
    pub(crate) map_id: MapId,
    pub(crate) config: RegistryConfig,
    pub(crate) host: H,
    pub(crate) rng: Pcg64,
    pub(crate) tree: PoolTree,
    pub(crate) points: BTreeMap<PointId, SpawnPoint>,
    pub(crate) overrides: OverrideSet,
    pub(crate) respawns: RespawnScheduler,
    pub(crate) live: BTreeMap<EntityHandle, LiveSpawn>,
    pub(crate) report: LoadReport,
}

impl<H: MapHost> PoolRegistry<H> {
    /// An empty registry.
    pub fn new(map_id: MapId, host: H, config: RegistryConfig) -> Self {
        Self {
            map_id,
            rng: Pcg64::seed_from_u64(config.seed),
            respawns: RespawnScheduler::new(config.zone_recheck_interval),
            config,
            host,
            tree: PoolTree::new(),
            points: BTreeMap::new(),
            overrides: OverrideSet::new(),
            live: BTreeMap::new(),
            report: LoadReport::default(),
        }
    }

    /// Build a registry from flat rows.
    ///
    /// Invalid rows are logged and skipped. The only fatal error is a
    /// candidate item attached to a pool that has children.
    pub fn load(map_id: MapId, data: &PoolData, host: H, config: RegistryConfig) -> Result<Self, PoolError> {
        let mut registry = Self::new(map_id, host, config);
        registry.load_points(data);
        registry.load_templates(data);
        registry.load_hierarchy(data);
        registry.tree.recompute_roots();
        registry.load_assignments(data);
        registry.load_items(data)?;
        registry.load_overrides(data);
        registry.tree.trickle();

        for node in registry.tree.iter().filter(|n| n.is_leaf() && n.items().is_empty()) {
            warn!(map = %map_id, pool = %node.id(), "leaf pool has no candidate items");
            registry.report.leaves_without_items += 1;
        }

        info!(
            map = %map_id,
            pools = registry.report.templates,
            edges = registry.report.edges,
            points = registry.report.spawn_points,
            items = registry.report.items,
            overrides = registry.report.overrides,
            skipped = registry.report.skipped,
            "loaded map pools"
        );
        Ok(registry)
    }

    fn skip(&mut self) {
        self.report.skipped += 1;
    }

    fn load_points(&mut self, data: &PoolData) {
        for row in &data.spawn_points {
            if self.points.contains_key(&row.point_id) {
                warn!(map = %self.map_id, point = %row.point_id, "duplicate spawn point, skipped");
                self.skip();
                continue;
            }
            let region = self.host.region_of(&row.position);
            let mut point = SpawnPoint::new(row.point_id, self.map_id, row.position, region.grid, region.zone);
            point.rotation = row.rotation;
            self.points.insert(row.point_id, point);
            self.report.spawn_points += 1;
        }
    }

    fn load_templates(&mut self, data: &PoolData) {
        for row in &data.templates {
            let Some(template) = row.to_template(self.map_id) else {
                error!(map = %self.map_id, pool = %row.pool_id, code = row.type_code, "unknown pool type code, skipped");
                self.skip();
                continue;
            };
            if !self.tree.insert(PoolNode::new(template)) {
                warn!(map = %self.map_id, pool = %row.pool_id, "duplicate pool template, skipped");
                self.skip();
                continue;
            }
            self.report.templates += 1;
        }
    }

    fn load_hierarchy(&mut self, data: &PoolData) {
        for row in &data.hierarchy {
            match self.tree.link(row.pool_id, row.child_pool_id, row.chance) {
                Ok(()) => self.report.edges += 1,
                Err(e) => {
                    error!(map = %self.map_id, error = %e, "hierarchy edge skipped");
                    self.skip();
                }
            }
        }
    }

    fn load_assignments(&mut self, data: &PoolData) {
        let mut assigned: BTreeSet<PointId> = BTreeSet::new();
        for row in &data.pool_spawns {
            if !self.points.contains_key(&row.point_id) {
                warn!(map = %self.map_id, pool = %row.pool_id, point = %row.point_id, "assignment to unknown spawn point, skipped");
                self.skip();
                continue;
            }
            if !assigned.insert(row.point_id) {
                warn!(map = %self.map_id, pool = %row.pool_id, point = %row.point_id, "spawn point already assigned, skipped");
                self.skip();
                continue;
            }
            let Some(node) = self.tree.get_mut(row.pool_id) else {
                warn!(map = %self.map_id, pool = %row.pool_id, point = %row.point_id, "assignment to unknown pool, skipped");
                assigned.remove(&row.point_id);
                self.skip();
                continue;
            };
            node.spawn_points.push(row.point_id);
            self.report.assignments += 1;
        }
    }

    fn load_items(&mut self, data: &PoolData) -> Result<(), PoolError> {
        let creatures = data
            .creatures
            .iter()
            .map(|row| CandidateItem::creature(row.pool_id, row.entry, row.chance, row.defaults.clone()));
        let game_objects = data
            .game_objects
            .iter()
            .map(|row| CandidateItem::game_object(row.pool_id, row.entry, row.chance, row.defaults.clone()));

        for item in creatures.chain(game_objects) {
            let map = self.map_id;
            let Some(node) = self.tree.get_mut(item.pool_id) else {
                warn!(map = %map, pool = %item.pool_id, entry = item.entry, "candidate for unknown pool, skipped");
                self.skip();
                continue;
            };
            if !node.is_leaf() {
                error!(map = %map, pool = %item.pool_id, entry = item.entry, "candidate item on a pool with children");
                return Err(PoolError::ItemsOnNonLeafPool {
                    pool: item.pool_id,
                    entry: item.entry,
                });
            }
            if node.kind() != item.kind() {
                error!(map = %map, pool = %item.pool_id, entry = item.entry, "candidate kind does not match pool kind, skipped");
                self.skip();
                continue;
            }
            if node.item(item.entry).is_some() {
                warn!(map = %map, pool = %item.pool_id, entry = item.entry, "duplicate candidate entry, skipped");
                self.skip();
                continue;
            }
            node.items.push(item);
            self.report.items += 1;
        }
        Ok(())
    }

    fn load_overrides(&mut self, data: &PoolData) {
        let creature = data
            .creature_overrides
            .iter()
            .map(|row| (row.scope, Override::Creature(row.data.clone())));
        let game_object = data
            .game_object_overrides
            .iter()
            .map(|row| (row.scope, Override::GameObject(row.data.clone())));

        for (scope, patch) in creature.chain(game_object) {
            if self.apply_override(scope, patch) {
                self.report.overrides += 1;
            } else {
                warn!(map = %self.map_id, ?scope, "override target not found, skipped");
                self.skip();
            }
        }
    }

    /// Attach an override at `scope`. Returns `false` if the target is
    /// missing or of the other kind.
    pub fn apply_override(&mut self, scope: OverrideScope, patch: Override) -> bool {
        match scope {
            OverrideScope::PointEntry { point_id, entry } => {
                if !self.points.contains_key(&point_id) {
                    return false;
                }
                self.overrides.insert(point_id, entry, patch);
                true
            }
            OverrideScope::Item { pool_id, entry } => self
                .tree
                .get_mut(pool_id)
                .and_then(|node| node.item_mut(entry))
                .is_some_and(|item| item.set_override(patch)),
            OverrideScope::Point { point_id } => {
                let Some(point) = self.points.get_mut(&point_id) else {
                    return false;
                };
                match patch {
                    Override::Creature(o) => point.creature_override = Some(o),
                    Override::GameObject(o) => point.game_object_override = Some(o),
                }
                true
            }
        }
    }

    // -- lookups ------------------------------------------------------------

    pub fn map_id(&self) -> MapId {
        self.map_id
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn tree(&self) -> &PoolTree {
        &self.tree
    }

    pub fn pool(&self, id: PoolId) -> Option<&PoolNode> {
        self.tree.get(id)
    }

    /// Like [`pool`](Self::pool) but reports a missing pool as an error.
    pub fn require_pool(&self, id: PoolId) -> Result<&PoolNode, PoolError> {
        self.tree.get(id).ok_or(PoolError::UnknownPool(id))
    }

    pub fn point(&self, id: PointId) -> Option<&SpawnPoint> {
        self.points.get(&id)
    }

    pub fn points(&self) -> impl Iterator<Item = &SpawnPoint> {
        self.points.values()
    }

    pub fn overrides(&self) -> &OverrideSet {
        &self.overrides
    }

    pub fn respawns(&self) -> &RespawnScheduler {
        &self.respawns
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.report
    }

    pub fn root_pools(&self) -> Vec<PoolId> {
        self.tree.roots().map(PoolNode::id).collect()
    }

    pub fn live(&self, handle: EntityHandle) -> Option<&LiveSpawn> {
        self.live.get(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn now(&self) -> Timestamp {
        self.host.now()
    }

    /// Points reserved by pools in `pool`'s subtree.
    pub fn occupied_points(&self, pool: PoolId) -> Vec<(PointId, ItemRef)> {
        let members: BTreeSet<PoolId> = self.tree.subtree(pool).into_iter().collect();
        self.points
            .values()
            .filter_map(|p| p.current_item().map(|item| (p.id, item)))
            .filter(|(_, item)| members.contains(&item.pool_id))
            .collect()
    }

    /// Re-insert a timer loaded from persistent storage.
    ///
    /// The timer is keyed to `pool`'s root and the point's spatial keys as
    /// they are now, and the point's reservation is left untouched.
    pub fn restore_respawn_timer(
        &mut self,
        pool: PoolId,
        point: PointId,
        respawn_time: Timestamp,
    ) -> Result<bool, PoolError> {
        let node = self.tree.get(pool).ok_or(PoolError::UnknownPool(pool))?;
        let spawn_point = self.points.get(&point).ok_or(PoolError::UnknownPoint(point))?;
        let info = RespawnInfo {
            kind: node.kind(),
            pool_id: pool,
            root_id: node.root(),
            point_id: point,
            respawn_time,
            original_respawn_time: respawn_time,
            grid_id: spawn_point.grid_id,
            zone_id: spawn_point.zone_id,
        };
        Ok(self.respawns.add(info, false))
    }

    /// BLAKE3 hex digest of the registry's mutable state.
    ///
    /// Two registries loaded from the same rows with the same seed and driven
    /// by the same calls hash equal.
    pub fn state_hash(&self) -> Result<String, PoolError> {
        #[derive(Serialize)]
        struct HashableState<'a> {
            map_id: MapId,
            pools: Vec<(PoolId, u32, u32, bool)>,
            points: Vec<(PointId, Option<ItemRef>, Option<EntityHandle>, usize)>,
            timers: Vec<&'a RespawnInfo>,
            live: Vec<(EntityHandle, &'a LiveSpawn)>,
        }

        let hashable = HashableState {
            map_id: self.map_id,
            pools: self
                .tree
                .iter()
                .map(|n| (n.id(), n.spawns_this_pool(), n.spawns_aggregate(), n.is_active()))
                .collect(),
            points: self
                .points
                .values()
                .map(|p| (p.id, p.current_item(), p.current_object(), p.old_objects().len()))
                .collect(),
            timers: self.respawns.iter().collect(),
            live: self.live.iter().map(|(h, s)| (*h, s)).collect(),
        };

        let json_bytes = serde_json::to_vec(&hashable)?;
        Ok(blake3::hash(&json_bytes).to_hex().to_string())
    }
}
