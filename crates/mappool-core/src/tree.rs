//! Arena of pool nodes and the algorithms that span more than one node.
//!
//! Nodes are stored in a `BTreeMap` keyed by [`PoolId`] so iteration order is
//! deterministic, which keeps seeded runs reproducible. Parent and child links
//! are ids, never references.
//!
//! # Capacity
//!
//! [`PoolTree::spawnable`] answers "how many more entities may this subtree
//! hold right now". The budget starts at the tightest max-headroom of the
//! node's ancestors, then the subtree is walked top-down:
//!
//! - a non-leaf clamps the incoming budget to its own max headroom, asks each
//!   child with that clamped budget, and returns `min(clamped, sum)`;
//! - a leaf returns `min(budget, limit - spawns_this_pool)`, where the limit is
//!   `min_limit` in minimum mode and `max_limit` otherwise.
//!
//! A leaf without limits of its own takes its maximum from the nearest
//! bounded ancestor. In minimum mode such leaves share that ancestor's floor
//! (`min_limit - spawns_aggregate`) instead of each getting a copy of it, so
//! the ancestor's minimum is counted once for the whole subtree.

use std::collections::BTreeMap;

use tracing::trace;

use crate::ids::{PointId, PoolId};
use crate::point::SpawnPoint;
use crate::pool::PoolNode;
use crate::random::{weighted_pick, RandomSource};

/// Why an edge could not be added to the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("parent pool {0} does not exist")]
    MissingParent(PoolId),
    #[error("child pool {0} does not exist")]
    MissingChild(PoolId),
    #[error("pool {child} is already part of the hierarchy of pool {parent}")]
    Cycle { parent: PoolId, child: PoolId },
    #[error("pool {child} already has parent {existing}")]
    AlreadyParented { child: PoolId, existing: PoolId },
}

#[derive(Debug, Clone, Default)]
pub struct PoolTree {
    nodes: BTreeMap<PoolId, PoolNode>,
}

impl PoolTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Returns `false` if the id is already taken.
    pub fn insert(&mut self, node: PoolNode) -> bool {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.nodes.insert(id, node);
        true
    }

    pub fn get(&self, id: PoolId) -> Option<&PoolNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: PoolId) -> Option<&mut PoolNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: PoolId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoolNode> {
        self.nodes.values()
    }

    pub fn roots(&self) -> impl Iterator<Item = &PoolNode> {
        self.nodes.values().filter(|n| n.is_root())
    }

    /// Cached root of `id`'s hierarchy.
    pub fn root_of(&self, id: PoolId) -> Option<PoolId> {
        self.nodes.get(&id).map(|n| n.root)
    }

    /// Ancestors of `id`, nearest first. `id` itself is not included.
    pub fn ancestors(&self, id: PoolId) -> Vec<PoolId> {
        let mut chain = Vec::new();
        let mut cursor = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(pid) = cursor {
            chain.push(pid);
            cursor = self.nodes.get(&pid).and_then(|n| n.parent);
        }
        chain
    }

    /// `id` and all of its descendants in pre-order.
    pub fn subtree(&self, id: PoolId) -> Vec<PoolId> {
        let mut out = Vec::new();
        if !self.nodes.contains_key(&id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    // -- hierarchy ----------------------------------------------------------

    /// Returns `true` if `candidate` already appears anywhere in the hierarchy
    /// that contains `from`.
    ///
    /// Walks from `from` up to its root, then searches every descendant of the
    /// root.
    pub fn check_hierarchy(&self, from: PoolId, candidate: PoolId) -> bool {
        let root = self
            .ancestors(from)
            .last()
            .copied()
            .unwrap_or(from);
        self.subtree(root).contains(&candidate)
    }

    /// Add `child` under `parent` with the given selection weight.
    ///
    /// Rejected edges leave the tree untouched.
    pub fn link(&mut self, parent: PoolId, child: PoolId, chance: f32) -> Result<(), HierarchyError> {
        if !self.nodes.contains_key(&parent) {
            return Err(HierarchyError::MissingParent(parent));
        }
        let existing = match self.nodes.get(&child) {
            None => return Err(HierarchyError::MissingChild(child)),
            Some(node) => node.parent,
        };
        if self.check_hierarchy(parent, child) {
            return Err(HierarchyError::Cycle { parent, child });
        }
        if let Some(existing) = existing {
            return Err(HierarchyError::AlreadyParented { child, existing });
        }

        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
            node.chance = chance;
        }
        Ok(())
    }

    /// Refresh every node's cached root.
    pub fn recompute_roots(&mut self) {
        let roots: Vec<(PoolId, PoolId)> = self
            .nodes
            .keys()
            .map(|&id| (id, self.ancestors(id).last().copied().unwrap_or(id)))
            .collect();
        for (id, root) in roots {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.root = root;
            }
        }
    }

    /// Push inheritable template values from every root down to the leaves.
    ///
    /// A leaf without a maximum takes the maximum of its nearest bounded
    /// ancestor as a cap and keeps a minimum of zero. A non-leaf without a
    /// maximum does not constrain its subtree.
    pub fn trickle(&mut self) {
        let roots: Vec<PoolId> = self.roots().map(|n| n.id()).collect();
        for root in roots {
            for id in self.subtree(root) {
                let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) else {
                    continue;
                };
                // pre-order guarantees the parent is already resolved
                let Some(parent_template) = self.nodes.get(&parent).map(|p| p.template.clone()) else {
                    continue;
                };
                let cap = self.bounding_ancestor(id).map(|n| n.template.max_limit);
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.template.inherit_from(&parent_template);
                    if let (true, 0, Some(max)) = (node.is_leaf(), node.template.max_limit, cap) {
                        node.template.min_limit = 0;
                        node.template.max_limit = max;
                        node.inherits_limits = true;
                    }
                }
            }
        }
    }

    /// Nearest ancestor of `id` with a non-zero maximum.
    fn bounding_ancestor(&self, id: PoolId) -> Option<&PoolNode> {
        self.ancestors(id)
            .into_iter()
            .filter_map(|a| self.nodes.get(&a))
            .find(|n| n.template.max_limit > 0)
    }

    /// Whether `id` and every ancestor are active.
    pub fn is_active(&self, id: PoolId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        node.active
            && self
                .ancestors(id)
                .iter()
                .all(|a| self.nodes.get(a).is_some_and(|n| n.active))
    }

    // -- counters -----------------------------------------------------------

    /// Apply `delta` to `id`'s own count (unless `aggregate_only`) and to the
    /// aggregate of `id` and every ancestor.
    ///
    /// Counts never go below zero; a decrement that would underflow is dropped
    /// for the affected counter.
    pub fn adjust_spawned(&mut self, id: PoolId, delta: i32, aggregate_only: bool) {
        fn apply(value: &mut u32, delta: i32) {
            if let Some(next) = value.checked_add_signed(delta) {
                *value = next;
            }
        }

        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if !aggregate_only {
            apply(&mut node.spawns_this_pool, delta);
        }
        apply(&mut node.spawns_aggregate, delta);

        let mut cursor = node.parent;
        while let Some(pid) = cursor {
            let Some(parent) = self.nodes.get_mut(&pid) else {
                break;
            };
            apply(&mut parent.spawns_aggregate, delta);
            cursor = parent.parent;
        }
    }

    // -- capacity -----------------------------------------------------------

    /// How many more entities `id`'s subtree may hold, honoring every
    /// ancestor's maximum. Inactive pools contribute nothing.
    pub fn spawnable(&self, id: PoolId, minimum_only: bool) -> u32 {
        if !self.nodes.contains_key(&id) {
            return 0;
        }
        let budget = self
            .ancestors(id)
            .iter()
            .filter_map(|a| self.nodes.get(a))
            .map(PoolNode::max_headroom)
            .min()
            .unwrap_or(u32::MAX);
        let mut floor = self.bounding_ancestor(id).map_or(0, PoolNode::min_headroom);
        self.subtree_spawnable(id, minimum_only, budget, &mut floor)
    }

    /// `floor` is what is left of the nearest bounded ancestor's minimum;
    /// leaves with inherited limits draw from it in minimum mode.
    fn subtree_spawnable(&self, id: PoolId, minimum_only: bool, budget: u32, floor: &mut u32) -> u32 {
        let Some(node) = self.nodes.get(&id) else {
            return 0;
        };
        if !node.active {
            return 0;
        }
        if node.is_leaf() {
            let max_room = node.template.max_limit.saturating_sub(node.spawns_this_pool);
            if !minimum_only {
                return budget.min(max_room);
            }
            if node.inherits_limits {
                let taken = budget.min(max_room).min(*floor);
                *floor -= taken;
                return taken;
            }
            return budget.min(node.template.min_limit.saturating_sub(node.spawns_this_pool));
        }

        let clamped = budget.min(node.max_headroom());
        if clamped == 0 {
            return 0;
        }
        let mut own_floor = node.min_headroom();
        let floor = if node.template.max_limit > 0 { &mut own_floor } else { floor };
        let mut sum = 0u32;
        for &child in &node.children {
            sum = sum.saturating_add(self.subtree_spawnable(child, minimum_only, clamped, floor));
        }
        clamped.min(sum)
    }

    #[inline]
    pub fn can_spawn(&self, id: PoolId, minimum_only: bool) -> bool {
        self.spawnable(id, minimum_only) > 0
    }

    // -- selection ----------------------------------------------------------

    /// Weighted pick among the children of `id` that still have max-mode
    /// capacity.
    pub fn pick_child(&self, id: PoolId, rng: &mut impl RandomSource) -> Option<PoolId> {
        let node = self.nodes.get(&id)?;
        let qualifying: Vec<&PoolNode> = node
            .children
            .iter()
            .filter(|&&c| self.spawnable(c, false) > 0)
            .filter_map(|c| self.nodes.get(c))
            .collect();
        let idx = weighted_pick(&qualifying, |n| n.weight(), rng)?;
        let chosen = qualifying[idx].id();
        trace!(pool = %id, child = %chosen, candidates = qualifying.len(), "picked child pool");
        Some(chosen)
    }

    /// Weighted pick of a candidate entry of leaf `id`.
    pub fn pick_item(&self, id: PoolId, rng: &mut impl RandomSource) -> Option<u32> {
        let node = self.nodes.get(&id)?;
        let idx = weighted_pick(&node.items, |i| i.weight(), rng)?;
        Some(node.items[idx].entry)
    }

    /// Spawn points usable by `id`: its own, then each ancestor's, in the
    /// order encountered. With `only_free`, reserved points are skipped.
    pub fn spawn_list(
        &self,
        id: PoolId,
        only_free: bool,
        points: &BTreeMap<PointId, SpawnPoint>,
    ) -> Vec<PointId> {
        let mut chain = vec![id];
        chain.extend(self.ancestors(id));
        chain
            .iter()
            .filter_map(|p| self.nodes.get(p))
            .flat_map(|n| n.spawn_points.iter().copied())
            .filter(|pid| !only_free || points.get(pid).is_some_and(SpawnPoint::is_free))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MapId;
    use crate::template::{PoolTemplate, SpawnKind};
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn node(id: u32, min: u32, max: u32) -> PoolNode {
        PoolNode::new(PoolTemplate::new(MapId(0), PoolId(id), SpawnKind::Creature, min, max))
    }

    /// root(1: 0..4) -> { a(2: 1..3), b(3: 0..3) }
    fn two_leaf_tree() -> PoolTree {
        let mut tree = PoolTree::new();
        tree.insert(node(1, 0, 4));
        tree.insert(node(2, 1, 3));
        tree.insert(node(3, 0, 3));
        tree.link(PoolId(1), PoolId(2), 1.0).unwrap();
        tree.link(PoolId(1), PoolId(3), 1.0).unwrap();
        tree.recompute_roots();
        tree
    }

    #[test]
    fn parent_limit_bounds_sum_of_children() {
        let tree = two_leaf_tree();
        // children could take 3 + 3 but the root caps at 4
        assert_eq!(tree.spawnable(PoolId(1), false), 4);
        assert_eq!(tree.spawnable(PoolId(2), false), 3);
        // minimum mode: only leaf a has a floor
        assert_eq!(tree.spawnable(PoolId(1), true), 1);
        assert!(!tree.can_spawn(PoolId(3), true));
    }

    #[test]
    fn leaf_capacity_respects_ancestor_headroom() {
        let mut tree = two_leaf_tree();
        tree.adjust_spawned(PoolId(3), 3, false);
        assert_eq!(tree.spawnable(PoolId(1), false), 1);
        // leaf a has room for 3 locally, but the root only has 1 left
        assert_eq!(tree.spawnable(PoolId(2), false), 1);
        tree.adjust_spawned(PoolId(2), 1, false);
        assert_eq!(tree.spawnable(PoolId(2), false), 0);
        assert!(!tree.can_spawn(PoolId(1), false));
    }

    #[test]
    fn adjust_propagates_to_every_ancestor() {
        let mut tree = PoolTree::new();
        tree.insert(node(1, 0, 10));
        tree.insert(node(2, 0, 10));
        tree.insert(node(3, 0, 10));
        tree.link(PoolId(1), PoolId(2), 1.0).unwrap();
        tree.link(PoolId(2), PoolId(3), 1.0).unwrap();

        tree.adjust_spawned(PoolId(3), 2, false);
        assert_eq!(tree.get(PoolId(3)).unwrap().spawns_this_pool(), 2);
        assert_eq!(tree.get(PoolId(2)).unwrap().spawns_aggregate(), 2);
        assert_eq!(tree.get(PoolId(1)).unwrap().spawns_aggregate(), 2);
        assert_eq!(tree.get(PoolId(1)).unwrap().spawns_this_pool(), 0);

        tree.adjust_spawned(PoolId(3), -1, false);
        assert_eq!(tree.get(PoolId(1)).unwrap().spawns_aggregate(), 1);
    }

    #[test]
    fn adjust_never_goes_negative() {
        let mut tree = two_leaf_tree();
        tree.adjust_spawned(PoolId(2), -1, false);
        assert_eq!(tree.get(PoolId(2)).unwrap().spawns_this_pool(), 0);
        assert_eq!(tree.get(PoolId(1)).unwrap().spawns_aggregate(), 0);
    }

    #[test]
    fn aggregate_only_leaves_own_count_alone() {
        let mut tree = two_leaf_tree();
        tree.adjust_spawned(PoolId(2), 1, true);
        let leaf = tree.get(PoolId(2)).unwrap();
        assert_eq!(leaf.spawns_this_pool(), 0);
        assert_eq!(leaf.spawns_aggregate(), 1);
        assert_eq!(tree.get(PoolId(1)).unwrap().spawns_aggregate(), 1);
    }

    #[test]
    fn cycle_is_rejected_and_tree_unchanged() {
        let mut tree = PoolTree::new();
        tree.insert(node(1, 0, 1));
        tree.insert(node(2, 0, 1));
        tree.insert(node(3, 0, 1));
        tree.link(PoolId(1), PoolId(2), 1.0).unwrap();
        tree.link(PoolId(2), PoolId(3), 1.0).unwrap();

        let err = tree.link(PoolId(3), PoolId(1), 1.0).unwrap_err();
        assert_eq!(err, HierarchyError::Cycle { parent: PoolId(3), child: PoolId(1) });
        assert!(tree.get(PoolId(3)).unwrap().children().is_empty());
        assert!(tree.get(PoolId(1)).unwrap().parent().is_none());

        assert!(matches!(tree.link(PoolId(2), PoolId(2), 1.0), Err(HierarchyError::Cycle { .. })));
    }

    #[test]
    fn missing_and_reparented_edges_rejected() {
        let mut tree = two_leaf_tree();
        tree.insert(node(4, 0, 1));
        assert_eq!(tree.link(PoolId(9), PoolId(4), 1.0), Err(HierarchyError::MissingParent(PoolId(9))));
        assert_eq!(tree.link(PoolId(4), PoolId(9), 1.0), Err(HierarchyError::MissingChild(PoolId(9))));
        assert_eq!(
            tree.link(PoolId(4), PoolId(2), 1.0),
            Err(HierarchyError::AlreadyParented { child: PoolId(2), existing: PoolId(1) })
        );
    }

    #[test]
    fn roots_and_subtree() {
        let mut tree = two_leaf_tree();
        tree.insert(node(4, 0, 1));
        tree.link(PoolId(2), PoolId(4), 1.0).unwrap();
        tree.recompute_roots();
        assert_eq!(tree.root_of(PoolId(4)), Some(PoolId(1)));
        assert_eq!(tree.ancestors(PoolId(4)), vec![PoolId(2), PoolId(1)]);
        assert_eq!(tree.subtree(PoolId(1)), vec![PoolId(1), PoolId(2), PoolId(4), PoolId(3)]);
        assert_eq!(tree.roots().count(), 1);
    }

    #[test]
    fn pick_child_skips_full_children() {
        let mut tree = two_leaf_tree();
        tree.adjust_spawned(PoolId(2), 3, false);
        let mut rng = Pcg64::seed_from_u64(11);
        for _ in 0..50 {
            assert_eq!(tree.pick_child(PoolId(1), &mut rng), Some(PoolId(3)));
        }
        tree.adjust_spawned(PoolId(3), 1, false);
        assert_eq!(tree.pick_child(PoolId(1), &mut rng), None);
    }

    #[test]
    fn trickle_caps_bare_leaves_at_nearest_bounded_ancestor() {
        let mut tree = PoolTree::new();
        let mut root = PoolTemplate::new(MapId(0), PoolId(1), SpawnKind::Creature, 2, 5);
        root.spawn_times.min_secs = 60;
        tree.insert(PoolNode::new(root));
        tree.insert(node(2, 0, 0));
        tree.insert(node(3, 0, 0));
        tree.link(PoolId(1), PoolId(2), 1.0).unwrap();
        tree.link(PoolId(2), PoolId(3), 1.0).unwrap();
        tree.recompute_roots();
        tree.trickle();

        let mid = tree.get(PoolId(2)).unwrap().template();
        assert_eq!((mid.min_limit, mid.max_limit), (0, 0));
        assert_eq!(mid.spawn_times.min_secs, 60);
        let leaf = tree.get(PoolId(3)).unwrap();
        assert!(leaf.inherits_limits());
        assert_eq!((leaf.template().min_limit, leaf.template().max_limit), (0, 5));
        assert_eq!(leaf.template().spawn_times.min_secs, 60);
        assert!(!tree.get(PoolId(2)).unwrap().inherits_limits());
    }

    #[test]
    fn bare_leaves_share_the_ancestor_floor() {
        let mut tree = PoolTree::new();
        tree.insert(node(1, 2, 5));
        tree.insert(node(2, 0, 0));
        tree.insert(node(3, 0, 0));
        tree.link(PoolId(1), PoolId(2), 1.0).unwrap();
        tree.link(PoolId(1), PoolId(3), 1.0).unwrap();
        tree.recompute_roots();
        tree.trickle();

        assert_eq!(tree.spawnable(PoolId(1), true), 2);
        assert_eq!(tree.spawnable(PoolId(1), false), 5);
        assert_eq!(tree.spawnable(PoolId(3), true), 2);

        tree.adjust_spawned(PoolId(2), 1, false);
        assert_eq!(tree.spawnable(PoolId(1), true), 1);
        assert_eq!(tree.spawnable(PoolId(3), true), 1);

        tree.adjust_spawned(PoolId(3), 1, false);
        assert!(!tree.can_spawn(PoolId(1), true));
        assert!(!tree.can_spawn(PoolId(2), true));
        assert_eq!(tree.spawnable(PoolId(1), false), 3);
    }

    #[test]
    fn leaves_with_own_minimums_keep_them() {
        let mut tree = two_leaf_tree();
        tree.trickle();
        assert!(!tree.get(PoolId(2)).unwrap().inherits_limits());
        // only leaf 2 has a minimum
        assert_eq!(tree.spawnable(PoolId(1), true), 1);
        assert_eq!(tree.spawnable(PoolId(3), true), 0);
    }

    #[test]
    fn inactive_ancestor_disables_subtree() {
        let mut tree = two_leaf_tree();
        assert!(tree.is_active(PoolId(2)));
        tree.get_mut(PoolId(1)).unwrap().active = false;
        assert!(!tree.is_active(PoolId(2)));
        assert!(!tree.is_active(PoolId(42)));
    }
}
