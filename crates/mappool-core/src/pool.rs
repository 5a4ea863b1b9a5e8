//! A single node of the pool hierarchy.
//!
//! Nodes live in the [`PoolTree`](crate::tree::PoolTree) arena and refer to
//! each other by [`PoolId`] only. Algorithms that need more than one node
//! (capacity, counter propagation, descent) are implemented on the tree.

use serde::{Deserialize, Serialize};

use crate::ids::{PointId, PoolId};
use crate::item::CandidateItem;
use crate::template::{PoolTemplate, SpawnKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolNode {
    pub(crate) template: PoolTemplate,
    pub(crate) parent: Option<PoolId>,
    pub(crate) root: PoolId,
    pub(crate) children: Vec<PoolId>,
    /// Selection weight among the parent's children.
    pub(crate) chance: f32,
    /// Live entities attributed to exactly this node.
    pub(crate) spawns_this_pool: u32,
    /// Live entities in this node's whole subtree, self included.
    pub(crate) spawns_aggregate: u32,
    pub(crate) active: bool,
    /// Leaf whose maximum was copied from a bounded ancestor. In minimum mode
    /// it draws on that ancestor's floor instead of a minimum of its own.
    pub(crate) inherits_limits: bool,
    pub(crate) spawn_points: Vec<PointId>,
    pub(crate) items: Vec<CandidateItem>,
}

impl PoolNode {
    pub fn new(template: PoolTemplate) -> Self {
        let id = template.pool_id;
        let active = !template.is_manual_spawn();
        Self {
            template,
            parent: None,
            root: id,
            children: Vec::new(),
            chance: 0.0,
            spawns_this_pool: 0,
            spawns_aggregate: 0,
            active,
            inherits_limits: false,
            spawn_points: Vec::new(),
            items: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> PoolId {
        self.template.pool_id
    }

    pub fn template(&self) -> &PoolTemplate {
        &self.template
    }

    pub fn kind(&self) -> SpawnKind {
        self.template.kind
    }

    pub fn parent(&self) -> Option<PoolId> {
        self.parent
    }

    pub fn root(&self) -> PoolId {
        self.root
    }

    pub fn children(&self) -> &[PoolId] {
        &self.children
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn chance(&self) -> f32 {
        self.chance
    }

    /// Selection weight; anything below 1.0 counts as 1.0.
    #[inline]
    pub fn weight(&self) -> f32 {
        self.chance.max(1.0)
    }

    pub fn spawns_this_pool(&self) -> u32 {
        self.spawns_this_pool
    }

    pub fn spawns_aggregate(&self) -> u32 {
        self.spawns_aggregate
    }

    /// Whether this node's own flag allows spawning. Ancestors are not
    /// consulted; see [`PoolTree::is_active`](crate::tree::PoolTree::is_active).
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn spawn_points(&self) -> &[PointId] {
        &self.spawn_points
    }

    pub fn items(&self) -> &[CandidateItem] {
        &self.items
    }

    pub fn item(&self, entry: u32) -> Option<&CandidateItem> {
        self.items.iter().find(|i| i.entry == entry)
    }

    pub(crate) fn item_mut(&mut self, entry: u32) -> Option<&mut CandidateItem> {
        self.items.iter_mut().find(|i| i.entry == entry)
    }

    /// Whether this leaf's maximum came from an ancestor during trickle.
    pub fn inherits_limits(&self) -> bool {
        self.inherits_limits
    }

    /// Remaining room under this node's maximum, measured on the aggregate.
    ///
    /// A non-leaf without a maximum is unbounded.
    #[inline]
    pub(crate) fn max_headroom(&self) -> u32 {
        if self.template.max_limit == 0 && !self.is_leaf() {
            return u32::MAX;
        }
        self.template.max_limit.saturating_sub(self.spawns_aggregate)
    }

    /// Entities still missing before this node's minimum is met.
    #[inline]
    pub(crate) fn min_headroom(&self) -> u32 {
        self.template.min_limit.saturating_sub(self.spawns_aggregate)
    }
}
