//! Ownership of every loaded map instance.
//!
//! Instances never reference each other, so a caller may move individual
//! instances to worker threads; the manager itself is a plain owner.

use std::collections::BTreeMap;

use tracing::info;

use mappool_admin::console::MapDirectory;
use mappool_core::host::{InMemoryHost, MapHost};
use mappool_core::ids::MapId;
use mappool_core::registry::PoolRegistry;

use crate::instance::{MapInstance, TickSummary};
use crate::loader::{MapDocument, WorldDocument};
use crate::WorldError;

pub struct MapManager<H: MapHost> {
    instances: BTreeMap<MapId, MapInstance<H>>,
}

impl<H: MapHost> Default for MapManager<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: MapHost> MapManager<H> {
    pub fn new() -> Self {
        Self {
            instances: BTreeMap::new(),
        }
    }

    /// Load one map from its document with the given host.
    pub fn load_map(&mut self, document: &MapDocument, host: H) -> Result<&mut MapInstance<H>, WorldError> {
        let map = document.map_id;
        if self.instances.contains_key(&map) {
            return Err(WorldError::DuplicateMap(map));
        }
        let instance = MapInstance::load(map, &document.pools, host, document.config.clone())?;
        Ok(self.instances.entry(map).or_insert(instance))
    }

    /// Drop a map instance, returning it to the caller.
    pub fn unload_map(&mut self, map: MapId) -> Option<MapInstance<H>> {
        let removed = self.instances.remove(&map);
        if removed.is_some() {
            info!(map = %map, "map instance unloaded");
        }
        removed
    }

    pub fn instance(&self, map: MapId) -> Option<&MapInstance<H>> {
        self.instances.get(&map)
    }

    pub fn instance_mut(&mut self, map: MapId) -> Option<&mut MapInstance<H>> {
        self.instances.get_mut(&map)
    }

    pub fn require(&mut self, map: MapId) -> Result<&mut MapInstance<H>, WorldError> {
        self.instances.get_mut(&map).ok_or(WorldError::UnknownMap(map))
    }

    pub fn maps(&self) -> impl Iterator<Item = MapId> + '_ {
        self.instances.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Tick every instance once, in map id order.
    pub fn tick_all(&mut self) -> Vec<(MapId, TickSummary)> {
        self.instances
            .iter_mut()
            .map(|(&map, instance)| (map, instance.tick()))
            .collect()
    }
}

impl MapManager<InMemoryHost> {
    /// Load every map of `world` with a fresh in-memory host each.
    pub fn from_document(world: &WorldDocument) -> Result<Self, WorldError> {
        let mut manager = Self::new();
        for document in &world.maps {
            manager.load_map(document, InMemoryHost::new())?;
        }
        Ok(manager)
    }

    /// Advance every in-memory clock by its instance's tick length, then
    /// tick.
    pub fn step(&mut self) -> Vec<(MapId, TickSummary)> {
        for instance in self.instances.values_mut() {
            let secs = instance.config().tick_secs;
            instance.registry_mut().host_mut().advance(secs);
        }
        self.tick_all()
    }
}

impl<H: MapHost> MapDirectory for MapManager<H> {
    type Host = H;

    fn registry(&self, map: MapId) -> Option<&PoolRegistry<H>> {
        self.instances.get(&map).map(MapInstance::registry)
    }

    fn registry_mut(&mut self, map: MapId) -> Option<&mut PoolRegistry<H>> {
        self.instances.get_mut(&map).map(MapInstance::registry_mut)
    }
}
