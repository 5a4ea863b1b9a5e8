//! Spawn points and their reservation state.
//!
//! A spawn point hosts at most one pool entity at a time. Occupancy is tracked
//! in two steps:
//!
//! 1. `current_item` -- the reservation. Set as soon as a pool decides to use
//!    the point, whether or not the grid holding it is loaded.
//! 2. `current_object` -- the live entity, set once the factory materializes
//!    the reservation.
//!
//! Only the reservation decides whether the point is free.

use serde::{Deserialize, Serialize};

use crate::handle::EntityHandle;
use crate::ids::{GridId, MapId, PointId, PoolId, Timestamp, ZoneId};
use crate::item::{CreatureOverride, GameObjectOverride};
use crate::template::SpawnKind;

/// World position with facing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub orientation: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32, orientation: f32) -> Self {
        Self { x, y, z, orientation }
    }
}

/// The candidate reserved at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub pool_id: PoolId,
    pub entry: u32,
    pub kind: SpawnKind,
}

/// A vacated entity kept around until its corpse expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remains {
    pub handle: EntityHandle,
    pub pool_id: PoolId,
    pub expires_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub id: PointId,
    pub map_id: MapId,
    pub position: Position,
    /// Static rotation quaternion for oriented gameobjects.
    pub rotation: Option<[f32; 4]>,
    pub grid_id: GridId,
    pub zone_id: ZoneId,
    pub creature_override: Option<CreatureOverride>,
    pub game_object_override: Option<GameObjectOverride>,
    current_item: Option<ItemRef>,
    current_object: Option<EntityHandle>,
    old_objects: Vec<Remains>,
}

impl SpawnPoint {
    pub fn new(id: PointId, map_id: MapId, position: Position, grid_id: GridId, zone_id: ZoneId) -> Self {
        Self {
            id,
            map_id,
            position,
            rotation: None,
            grid_id,
            zone_id,
            creature_override: None,
            game_object_override: None,
            current_item: None,
            current_object: None,
            old_objects: Vec::new(),
        }
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.current_item.is_none()
    }

    pub fn current_item(&self) -> Option<ItemRef> {
        self.current_item
    }

    pub fn current_object(&self) -> Option<EntityHandle> {
        self.current_object
    }

    pub fn old_objects(&self) -> &[Remains] {
        &self.old_objects
    }

    /// Reserved but not yet materialized (its grid was not loaded).
    pub fn is_pending(&self) -> bool {
        self.current_item.is_some() && self.current_object.is_none()
    }

    /// Reserve the point for `item`.
    ///
    /// # Panics
    ///
    /// Panics if the point is already reserved. Double reservation means the
    /// caller's bookkeeping is broken and continuing would put two entities
    /// on one point.
    pub(crate) fn reserve(&mut self, item: ItemRef) {
        assert!(
            self.current_item.is_none(),
            "spawn point {} already reserved by {:?}",
            self.id,
            self.current_item
        );
        self.current_item = Some(item);
    }

    /// Drop the reservation, returning it.
    pub(crate) fn release(&mut self) -> Option<ItemRef> {
        self.current_item.take()
    }

    pub(crate) fn attach(&mut self, handle: EntityHandle) {
        self.current_object = Some(handle);
    }

    pub(crate) fn detach(&mut self) -> Option<EntityHandle> {
        self.current_object.take()
    }

    pub(crate) fn retire(&mut self, remains: Remains) {
        self.old_objects.push(remains);
    }

    /// Remove and return remains matching `pred`.
    pub(crate) fn take_remains(&mut self, mut pred: impl FnMut(&Remains) -> bool) -> Vec<Remains> {
        let mut taken = Vec::new();
        self.old_objects.retain(|r| {
            if pred(r) {
                taken.push(*r);
                false
            } else {
                true
            }
        });
        taken
    }
}
