//! Opaque links from spawn points to factory-owned entities.
//!
//! The engine never looks inside an [`EntityHandle`]. It stores one per
//! materialized point and in the live-spawn table, and hands it back to the
//! factory on destruction and to the registry on death or despawn.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Serial number of an entity created by an [`EntityFactory`](crate::host::EntityFactory).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityHandle(u64);

impl EntityHandle {
    #[inline]
    pub fn new(serial: u64) -> Self {
        Self(serial)
    }

    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityHandle({:#x})", self.0)
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Hands out serials for [`InMemoryHost`](crate::host::InMemoryHost).
///
/// Serials are never reused, so a handle kept by a stale timer or a
/// forgotten corpse can never name a newer entity.
#[derive(Debug, Clone, Default)]
pub struct HandleAllocator {
    next: u64,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> EntityHandle {
        let handle = EntityHandle(self.next);
        self.next += 1;
        handle
    }

    /// Serials handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serials_are_never_reused() {
        let mut alloc = HandleAllocator::new();
        let first = alloc.allocate();
        let second = alloc.allocate();
        assert_ne!(first, second);
        assert!(second > first);
        assert_eq!(alloc.issued(), 2);
    }

    #[test]
    fn cloned_allocator_continues_the_sequence() {
        let mut alloc = HandleAllocator::new();
        alloc.allocate();
        let mut copy = alloc.clone();
        assert_eq!(copy.allocate(), alloc.allocate());
    }

    #[test]
    fn handles_print_as_hex_serials() {
        let h = EntityHandle::new(255);
        assert_eq!(h.to_string(), "0xff");
        assert_eq!(format!("{h:?}"), "EntityHandle(0xff)");
        assert_eq!(serde_json::to_string(&h).unwrap(), "255");
    }
}
