//! One live map instance and its periodic update.
//!
//! Each [`MapInstance::tick`]:
//!
//! 1. Runs due respawn timers of every active zone (throttled per zone by the
//!    registry's recheck interval).
//! 2. Destroys remains whose corpse time ran out.
//! 3. Advances the tick counter.
//!
//! Zones become active when the host reports interest in them (a player
//! nearby). Timers in inactive zones simply wait; they are data, nothing
//! sleeps.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mappool_core::config::RegistryConfig;
use mappool_core::host::MapHost;
use mappool_core::ids::{GridId, MapId, ZoneId};
use mappool_core::registry::PoolRegistry;
use mappool_core::rows::PoolData;

use crate::WorldError;

// ---------------------------------------------------------------------------
// InstanceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Instance id, distinguishing copies of the same map.
    pub instance_id: u32,
    /// Game seconds per tick.
    pub tick_secs: u64,
    /// Populate every root pool right after loading.
    pub spawn_on_load: bool,
    pub registry: RegistryConfig,
}

impl Default for InstanceConfig {
    /// Instance 0, one second ticks, spawn on load.
    fn default() -> Self {
        Self {
            instance_id: 0,
            tick_secs: 1,
            spawn_on_load: true,
            registry: RegistryConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// TickSummary
// ---------------------------------------------------------------------------

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: u64,
    pub respawned: u32,
    pub expired: u32,
}

// ---------------------------------------------------------------------------
// MapInstance
// ---------------------------------------------------------------------------

pub struct MapInstance<H: MapHost> {
    config: InstanceConfig,
    registry: PoolRegistry<H>,
    active_zones: BTreeSet<ZoneId>,
    ticks: u64,
}

impl<H: MapHost> MapInstance<H> {
    /// Build the registry from `data` and, if configured, populate it.
    pub fn load(map_id: MapId, data: &PoolData, host: H, config: InstanceConfig) -> Result<Self, WorldError> {
        let registry = PoolRegistry::load(map_id, data, host, config.registry.clone())?;
        let mut instance = Self {
            config,
            registry,
            active_zones: BTreeSet::new(),
            ticks: 0,
        };
        if instance.config.spawn_on_load {
            instance.registry.spawn_all();
        }
        info!(
            map = %map_id,
            instance = instance.config.instance_id,
            live = instance.registry.live_count(),
            "map instance ready"
        );
        Ok(instance)
    }

    pub fn map_id(&self) -> MapId {
        self.registry.map_id()
    }

    pub fn instance_id(&self) -> u32 {
        self.config.instance_id
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn registry(&self) -> &PoolRegistry<H> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PoolRegistry<H> {
        &mut self.registry
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    // -- zones and grids ----------------------------------------------------

    /// Mark `zone` as observed and run its due timers right away.
    pub fn activate_zone(&mut self, zone: ZoneId) -> u32 {
        let newly = self.active_zones.insert(zone);
        let respawned = self.registry.respawn_cell_area_zone(zone);
        if newly {
            debug!(map = %self.map_id(), zone = %zone, respawned, "zone activated");
        }
        respawned
    }

    pub fn deactivate_zone(&mut self, zone: ZoneId) -> bool {
        self.active_zones.remove(&zone)
    }

    pub fn active_zones(&self) -> impl Iterator<Item = ZoneId> + '_ {
        self.active_zones.iter().copied()
    }

    /// Every zone that holds at least one spawn point.
    pub fn populated_zones(&self) -> BTreeSet<ZoneId> {
        self.registry.points().map(|p| p.zone_id).collect()
    }

    /// The host finished loading `grid`: materialize pending reservations
    /// and run the grid's due timers.
    pub fn grid_loaded(&mut self, grid: GridId) -> u32 {
        self.registry.on_grid_loaded(grid) + self.registry.respawn_grid(grid)
    }

    /// The host is about to unload `grid`.
    pub fn grid_unloaded(&mut self, grid: GridId) -> u32 {
        self.registry.on_grid_unloaded(grid)
    }

    // -- tick ---------------------------------------------------------------

    pub fn tick(&mut self) -> TickSummary {
        let zones: Vec<ZoneId> = self.active_zones.iter().copied().collect();
        let respawned: u32 = zones
            .into_iter()
            .map(|zone| self.registry.respawn_cell_area_zone(zone))
            .sum();
        let expired = self.registry.expire_remains();
        self.ticks += 1;

        let summary = TickSummary {
            tick: self.ticks,
            respawned,
            expired,
        };
        if respawned > 0 || expired > 0 {
            debug!(map = %self.map_id(), tick = self.ticks, respawned, expired, "tick");
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mappool_core::prelude::*;

    fn data() -> PoolData {
        PoolData {
            templates: vec![PoolTemplateRow::new(1, SpawnKind::Creature, 0, 2).with_spawn_times(30, 30, 0)],
            spawn_points: vec![SpawnPointRow::new(1, 0.0, 0.0, 0.0), SpawnPointRow::new(2, 4.0, 0.0, 0.0)],
            pool_spawns: vec![PoolSpawnRow::new(1, 1), PoolSpawnRow::new(1, 2)],
            creatures: vec![CreatureItemRow::new(1, 10, 1.0)],
            ..PoolData::default()
        }
    }

    #[test]
    fn load_spawns_unless_disabled() {
        let instance = MapInstance::load(MapId(0), &data(), InMemoryHost::new(), InstanceConfig::default()).unwrap();
        assert_eq!(instance.registry().live_count(), 2);

        let quiet = InstanceConfig {
            spawn_on_load: false,
            ..InstanceConfig::default()
        };
        let instance = MapInstance::load(MapId(0), &data(), InMemoryHost::new(), quiet).unwrap();
        assert_eq!(instance.registry().live_count(), 0);
    }

    #[test]
    fn timers_wait_for_active_zones() {
        let mut instance =
            MapInstance::load(MapId(0), &data(), InMemoryHost::new(), InstanceConfig::default()).unwrap();
        // x = 0 and x = 4 sit on opposite sides of a grid line
        let zone_of = |point: u32| instance.registry().point(PointId(point)).unwrap().zone_id;
        let (victim_zone, other_zone) = (zone_of(1), zone_of(2));
        assert_ne!(victim_zone, other_zone);
        let victim = instance.registry().point(PointId(1)).unwrap().current_object().unwrap();
        instance.registry_mut().handle_death(victim, true);

        instance.registry_mut().host_mut().advance(40);
        assert_eq!(instance.tick().respawned, 0);
        assert_eq!(instance.registry().live_count(), 1);

        assert_eq!(instance.activate_zone(other_zone), 0);
        assert_eq!(instance.registry().live_count(), 1);
        assert_eq!(instance.activate_zone(victim_zone), 1);
        assert_eq!(instance.registry().live_count(), 2);
        assert_eq!(instance.tick_count(), 1);
    }
}
