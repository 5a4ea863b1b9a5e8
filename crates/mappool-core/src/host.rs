//! Collaborators the pool engine drives but does not own.
//!
//! A map instance hands its registry one value implementing [`MapHost`]: an
//! entity factory, a spatial grid and a clock. [`InMemoryHost`] is a complete
//! stand-in used by the simulator and by tests.

use std::collections::{BTreeMap, BTreeSet};

use crate::handle::{EntityHandle, HandleAllocator};
use crate::ids::{GridId, PointId, PoolId, Timestamp, ZoneId};
use crate::overrides::SpawnAttributes;
use crate::point::Position;
use crate::template::SpawnKind;

/// Everything the factory needs to materialize one pool entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub kind: SpawnKind,
    pub pool_id: PoolId,
    pub point_id: PointId,
    pub entry: u32,
    pub position: Position,
    pub attributes: SpawnAttributes,
}

/// Spatial keys of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    pub grid: GridId,
    pub zone: ZoneId,
}

pub trait EntityFactory {
    /// Create the entity. `None` means the factory refused.
    fn instantiate(&mut self, request: &SpawnRequest) -> Option<EntityHandle>;
    fn destroy(&mut self, handle: EntityHandle);
}

pub trait SpatialGrid {
    fn is_region_loaded(&self, position: &Position) -> bool;
    fn region_of(&self, position: &Position) -> Region;
}

pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// The full set of collaborators a registry needs.
pub trait MapHost: EntityFactory + SpatialGrid + Clock {}

impl<T: EntityFactory + SpatialGrid + Clock> MapHost for T {}

// ---------------------------------------------------------------------------
// InMemoryHost
// ---------------------------------------------------------------------------

/// Width of one grid cell in world units.
pub const GRID_SIZE: f32 = 533.333_3;
/// Grids per map axis.
pub const GRID_COUNT: u32 = 64;
/// Grids per zone axis.
pub const ZONE_SPAN: u32 = 8;

const CENTER_GRID: f32 = 32.0;

/// Grid coordinates of a position; the map origin sits at the center grid.
pub fn grid_coords(position: &Position) -> (u32, u32) {
    let axis = |v: f32| (CENTER_GRID - v / GRID_SIZE).floor().clamp(0.0, (GRID_COUNT - 1) as f32) as u32;
    (axis(position.x), axis(position.y))
}

/// Entities held by [`InMemoryHost`], keyed by handle.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHost {
    handles: HandleAllocator,
    entities: BTreeMap<EntityHandle, SpawnRequest>,
    unloaded: BTreeSet<GridId>,
    rejected: BTreeSet<u32>,
    now: Timestamp,
    destroyed: u64,
}

impl InMemoryHost {
    /// Every grid loaded, clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, secs: u64) {
        self.now = self.now.plus_secs(secs);
    }

    pub fn set_now(&mut self, now: Timestamp) {
        self.now = now;
    }

    pub fn set_grid_loaded(&mut self, grid: GridId, loaded: bool) {
        if loaded {
            self.unloaded.remove(&grid);
        } else {
            self.unloaded.insert(grid);
        }
    }

    pub fn is_grid_loaded(&self, grid: GridId) -> bool {
        !self.unloaded.contains(&grid)
    }

    /// Make the factory refuse every future request for `entry`.
    pub fn reject_entry(&mut self, entry: u32) {
        self.rejected.insert(entry);
    }

    pub fn entity(&self, handle: EntityHandle) -> Option<&SpawnRequest> {
        self.entities.get(&handle)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityHandle, &SpawnRequest)> {
        self.entities.iter().map(|(h, r)| (*h, r))
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn destroyed_count(&self) -> u64 {
        self.destroyed
    }
}

impl EntityFactory for InMemoryHost {
    fn instantiate(&mut self, request: &SpawnRequest) -> Option<EntityHandle> {
        if self.rejected.contains(&request.entry) {
            return None;
        }
        let handle = self.handles.allocate();
        self.entities.insert(handle, request.clone());
        Some(handle)
    }

    fn destroy(&mut self, handle: EntityHandle) {
        if self.entities.remove(&handle).is_some() {
            self.destroyed += 1;
        }
    }
}

impl SpatialGrid for InMemoryHost {
    fn is_region_loaded(&self, position: &Position) -> bool {
        self.is_grid_loaded(self.region_of(position).grid)
    }

    fn region_of(&self, position: &Position) -> Region {
        let (gx, gy) = grid_coords(position);
        Region {
            grid: GridId(gx * GRID_COUNT + gy),
            zone: ZoneId((gx / ZONE_SPAN) * ZONE_SPAN + gy / ZONE_SPAN),
        }
    }
}

impl Clock for InMemoryHost {
    fn now(&self) -> Timestamp {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::CreatureAttributes;

    fn request(entry: u32) -> SpawnRequest {
        SpawnRequest {
            kind: SpawnKind::Creature,
            pool_id: PoolId(1),
            point_id: PointId(1),
            entry,
            position: Position::default(),
            attributes: SpawnAttributes::Creature(CreatureAttributes::default()),
        }
    }

    #[test]
    fn origin_maps_to_center_grid() {
        let host = InMemoryHost::new();
        let region = host.region_of(&Position::default());
        assert_eq!(region.grid, GridId(32 * 64 + 32));
        assert_eq!(region.zone, ZoneId(4 * 8 + 4));
    }

    #[test]
    fn far_positions_clamp_to_edge() {
        assert_eq!(grid_coords(&Position::new(1.0e9, -1.0e9, 0.0, 0.0)), (0, 63));
    }

    #[test]
    fn grid_loading_is_tracked() {
        let mut host = InMemoryHost::new();
        let pos = Position::new(100.0, 100.0, 0.0, 0.0);
        assert!(host.is_region_loaded(&pos));
        let grid = host.region_of(&pos).grid;
        host.set_grid_loaded(grid, false);
        assert!(!host.is_region_loaded(&pos));
        host.set_grid_loaded(grid, true);
        assert!(host.is_region_loaded(&pos));
    }

    #[test]
    fn factory_lifecycle_and_rejection() {
        let mut host = InMemoryHost::new();
        let h = host.instantiate(&request(100)).unwrap();
        assert_eq!(host.entity(h).map(|r| r.entry), Some(100));
        host.reject_entry(200);
        assert!(host.instantiate(&request(200)).is_none());
        host.destroy(h);
        host.destroy(h);
        assert_eq!(host.entity_count(), 0);
        assert_eq!(host.destroyed_count(), 1);
    }

    #[test]
    fn cloned_host_is_independent() {
        let mut host = InMemoryHost::new();
        let h = host.instantiate(&request(100)).unwrap();
        let mut copy = host.clone();
        copy.destroy(h);
        assert_eq!(host.entity_count(), 1);
        assert_eq!(copy.entity_count(), 0);
        let next = copy.instantiate(&request(100)).unwrap();
        assert_ne!(next, h);
    }

    #[test]
    fn clock_advances() {
        let mut host = InMemoryHost::new();
        host.advance(30);
        assert_eq!(host.now(), Timestamp(30));
        host.set_now(Timestamp(5));
        assert_eq!(host.now(), Timestamp(5));
    }
}
