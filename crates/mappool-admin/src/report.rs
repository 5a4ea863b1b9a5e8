//! Read-only views of a registry for operators.
//!
//! Reports are plain serde structs so they can be printed through `Display`
//! or shipped as JSON to an external tool without touching the registry.

use std::fmt;

use serde::{Deserialize, Serialize};

use mappool_core::host::MapHost;
use mappool_core::ids::{PointId, PoolId};
use mappool_core::pool::PoolNode;
use mappool_core::registry::PoolRegistry;
use mappool_core::template::SpawnKind;
use mappool_core::PoolError;

// ---------------------------------------------------------------------------
// PoolSummary
// ---------------------------------------------------------------------------

/// One line of the root listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub pool_id: PoolId,
    pub description: String,
    pub kind: SpawnKind,
    pub min_limit: u32,
    pub max_limit: u32,
    pub spawned: u32,
    pub active: bool,
    pub children: usize,
    /// Timers waiting to respawn into this root.
    pub pending_respawns: usize,
}

impl PoolSummary {
    fn of(node: &PoolNode, pending_respawns: usize) -> Self {
        let template = node.template();
        Self {
            pool_id: node.id(),
            description: template.description.clone(),
            kind: node.kind(),
            min_limit: template.min_limit,
            max_limit: template.max_limit,
            spawned: node.spawns_aggregate(),
            active: node.is_active(),
            children: node.children().len(),
            pending_respawns,
        }
    }
}

impl fmt::Display for PoolSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} [{}..{}] spawned {} children {} pending {}",
            self.pool_id,
            self.description,
            self.min_limit,
            self.max_limit,
            self.spawned,
            self.children,
            self.pending_respawns
        )?;
        if !self.active {
            write!(f, " (inactive)")?;
        }
        Ok(())
    }
}

/// Summaries of every root pool, in id order.
pub fn list_roots<H: MapHost>(registry: &PoolRegistry<H>) -> Vec<PoolSummary> {
    registry
        .tree()
        .roots()
        .map(|node| PoolSummary::of(node, registry.respawns().pending_for_root(node.id())))
        .collect()
}

// ---------------------------------------------------------------------------
// PoolDump
// ---------------------------------------------------------------------------

/// A point reserved by a pool. `entity` is the raw handle once materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupiedPoint {
    pub point_id: PointId,
    pub entry: u32,
    pub entity: Option<u64>,
}

impl fmt::Display for OccupiedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity {
            Some(raw) => write!(f, "{} entry {} entity {raw:#x}", self.point_id, self.entry),
            None => write!(f, "{} entry {} pending", self.point_id, self.entry),
        }
    }
}

/// Recursive view of one pool and its descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolDump {
    pub pool_id: PoolId,
    pub description: String,
    pub kind: SpawnKind,
    pub min_limit: u32,
    pub max_limit: u32,
    pub chance: f32,
    pub spawned: u32,
    pub min_spawnable: u32,
    pub max_spawnable: u32,
    pub occupied: Vec<OccupiedPoint>,
    pub children: Vec<PoolDump>,
}

impl PoolDump {
    /// Total number of pools in this dump, including itself.
    pub fn pool_count(&self) -> usize {
        1 + self.children.iter().map(PoolDump::pool_count).sum::<usize>()
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        writeln!(
            f,
            "{pad}{} {:?} [{}..{}] chance {} spawned {} spawnable {}/{}",
            self.pool_id,
            self.description,
            self.min_limit,
            self.max_limit,
            self.chance,
            self.spawned,
            self.min_spawnable,
            self.max_spawnable
        )?;
        for point in &self.occupied {
            writeln!(f, "{pad}  - {point}")?;
        }
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for PoolDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

/// Dump `pool` and everything beneath it.
pub fn dump_pool<H: MapHost>(registry: &PoolRegistry<H>, pool: PoolId) -> Result<PoolDump, PoolError> {
    let node = registry.require_pool(pool)?;
    let template = node.template();

    let occupied = registry
        .occupied_points(pool)
        .into_iter()
        .filter(|(_, item)| item.pool_id == pool)
        .map(|(point_id, item)| OccupiedPoint {
            point_id,
            entry: item.entry,
            entity: registry
                .point(point_id)
                .and_then(|p| p.current_object())
                .map(|h| h.to_raw()),
        })
        .collect();

    let children = node
        .children()
        .iter()
        .map(|&child| dump_pool(registry, child))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PoolDump {
        pool_id: pool,
        description: template.description.clone(),
        kind: node.kind(),
        min_limit: template.min_limit,
        max_limit: template.max_limit,
        chance: node.chance(),
        spawned: node.spawns_aggregate(),
        min_spawnable: registry.spawnable(pool, true),
        max_spawnable: registry.spawnable(pool, false),
        occupied,
        children,
    })
}
