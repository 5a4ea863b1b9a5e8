//! End-to-end spawn scenarios over a loaded registry.

use mappool_core::prelude::*;

fn registry(data: &PoolData) -> PoolRegistry<InMemoryHost> {
    PoolRegistry::load(MapId(0), data, InMemoryHost::new(), RegistryConfig::with_seed(7)).unwrap()
}

/// Root pool 1 with the given bounds over one leaf (pool 2) that inherits
/// them, with `points` spawn points and a single creature candidate.
fn single_leaf(min: u32, max: u32, points: u32) -> PoolData {
    PoolData {
        templates: vec![
            PoolTemplateRow::new(1, SpawnKind::Creature, min, max).with_spawn_times(60, 60, 0),
            PoolTemplateRow::new(2, SpawnKind::Creature, 0, 0),
        ],
        hierarchy: vec![HierarchyRow::new(1, 2, 1.0)],
        spawn_points: (1..=points).map(|i| SpawnPointRow::new(i, i as f32 * 10.0, 0.0, 0.0)).collect(),
        pool_spawns: (1..=points).map(|i| PoolSpawnRow::new(2, i)).collect(),
        creatures: vec![CreatureItemRow::new(2, 100, 1.0)],
        ..PoolData::default()
    }
}

#[test]
fn root_fills_to_maximum_after_minimum_pass() {
    let data = single_leaf(2, 5, 5);

    // the minimum pass alone yields exactly two spawns
    let mut minimum_pass = registry(&data);
    assert_eq!(minimum_pass.spawnable(PoolId(1), true), 2);
    assert!(minimum_pass.spawn_single(PoolId(1), true));
    assert!(minimum_pass.spawn_single(PoolId(1), true));
    assert!(!minimum_pass.spawn_single(PoolId(1), true));

    let mut registry = registry(&data);
    assert_eq!(registry.spawn_pool(PoolId(1), 0), 5);
    assert_eq!(registry.pool(PoolId(2)).unwrap().spawns_this_pool(), 5);
    assert_eq!(registry.pool(PoolId(1)).unwrap().spawns_aggregate(), 5);
    assert!(registry.points().all(|p| !p.is_free()));
    assert_eq!(registry.host().entity_count(), 5);
    assert_eq!(registry.spawnable(PoolId(1), false), 0);
}

#[test]
fn heavy_child_dominates_selection() {
    let data = PoolData {
        templates: vec![
            PoolTemplateRow::new(1, SpawnKind::Creature, 0, 1),
            PoolTemplateRow::new(2, SpawnKind::Creature, 0, 1),
            PoolTemplateRow::new(3, SpawnKind::Creature, 0, 1),
        ],
        hierarchy: vec![HierarchyRow::new(1, 2, 1.0), HierarchyRow::new(1, 3, 99.0)],
        spawn_points: vec![SpawnPointRow::new(1, 0.0, 0.0, 0.0), SpawnPointRow::new(2, 5.0, 0.0, 0.0)],
        pool_spawns: vec![PoolSpawnRow::new(2, 1), PoolSpawnRow::new(3, 2)],
        creatures: vec![CreatureItemRow::new(2, 100, 1.0), CreatureItemRow::new(3, 200, 1.0)],
        ..PoolData::default()
    };
    let mut registry = registry(&data);

    let trials = 10_000;
    let mut heavy = 0;
    for _ in 0..trials {
        assert!(registry.spawn_single(PoolId(1), false));
        if registry.pool(PoolId(3)).unwrap().spawns_this_pool() == 1 {
            heavy += 1;
        }
        assert_eq!(registry.despawn_pool(PoolId(1), false), 1);
    }
    let share = heavy as f64 / trials as f64;
    assert!((0.97..=1.0).contains(&share), "heavy share = {share}");
}

#[test]
fn parent_maximum_bounds_all_children() {
    let data = PoolData {
        templates: vec![
            PoolTemplateRow::new(1, SpawnKind::Creature, 0, 3),
            PoolTemplateRow::new(2, SpawnKind::Creature, 0, 3),
            PoolTemplateRow::new(3, SpawnKind::Creature, 0, 3),
        ],
        hierarchy: vec![HierarchyRow::new(1, 2, 1.0), HierarchyRow::new(1, 3, 1.0)],
        spawn_points: (1..=6).map(|i| SpawnPointRow::new(i, i as f32, 0.0, 0.0)).collect(),
        pool_spawns: (1..=6).map(|i| PoolSpawnRow::new(if i <= 3 { 2 } else { 3 }, i)).collect(),
        creatures: vec![CreatureItemRow::new(2, 100, 1.0), CreatureItemRow::new(3, 200, 1.0)],
        ..PoolData::default()
    };
    let mut registry = registry(&data);
    assert_eq!(registry.spawn_pool(PoolId(1), 0), 3);
    // an explicit count cannot push past the root's maximum either
    assert_eq!(registry.spawn_pool(PoolId(1), 5), 0);

    let a = registry.pool(PoolId(2)).unwrap().spawns_this_pool();
    let b = registry.pool(PoolId(3)).unwrap().spawns_this_pool();
    assert_eq!(a + b, 3);
    assert_eq!(registry.pool(PoolId(1)).unwrap().spawns_aggregate(), 3);
}

#[test]
fn cycle_edges_are_skipped_at_load() {
    let mut data = single_leaf(0, 2, 2);
    data.templates.push(PoolTemplateRow::new(3, SpawnKind::Creature, 0, 1));
    data.hierarchy.push(HierarchyRow::new(2, 1, 1.0));
    data.hierarchy.push(HierarchyRow::new(2, 2, 1.0));
    data.hierarchy.push(HierarchyRow::new(3, 2, 1.0));

    let registry = registry(&data);
    assert_eq!(registry.load_report().edges, 1);
    assert_eq!(registry.load_report().skipped, 3);
    assert!(registry.pool(PoolId(1)).unwrap().is_root());
    assert!(registry.pool(PoolId(2)).unwrap().is_leaf());
    assert!(registry.pool(PoolId(3)).unwrap().children().is_empty());
    assert_eq!(registry.pool(PoolId(2)).unwrap().parent(), Some(PoolId(1)));
}

#[test]
fn despawning_an_empty_pool_changes_nothing() {
    let mut registry = registry(&single_leaf(1, 3, 3));
    let before = registry.state_hash().unwrap();
    assert_eq!(registry.despawn_pool(PoolId(1), true), 0);
    assert_eq!(registry.despawn_pool(PoolId(1), false), 0);
    assert_eq!(registry.state_hash().unwrap(), before);
    assert_eq!(registry.despawn_pool(PoolId(42), false), 0);
}

#[test]
fn despawn_releases_everything() {
    let mut registry = registry(&single_leaf(1, 3, 3));
    registry.spawn_pool(PoolId(1), 0);
    assert_eq!(registry.despawn_pool(PoolId(1), false), 3);
    assert_eq!(registry.pool(PoolId(1)).unwrap().spawns_aggregate(), 0);
    assert_eq!(registry.pool(PoolId(2)).unwrap().spawns_this_pool(), 0);
    assert!(registry.points().all(SpawnPoint::is_free));
    assert_eq!(registry.live_count(), 0);
    assert_eq!(registry.host().entity_count(), 0);
}

#[test]
fn reseed_from_empty_matches_respawn() {
    let data = single_leaf(2, 4, 6);
    let mut reseeded = registry(&data);
    let mut respawned = registry(&data);

    let a = reseeded.reseed_pool(PoolId(1));
    let b = respawned.respawn_pool(PoolId(1));
    assert_eq!(a, b);
    assert_eq!(reseeded.live_count(), respawned.live_count());
    assert_eq!(reseeded.state_hash().unwrap(), respawned.state_hash().unwrap());
}

#[test]
fn reseed_replaces_population() {
    let mut registry = registry(&single_leaf(2, 4, 6));
    registry.spawn_pool(PoolId(1), 0);
    let destroyed_before = registry.host().destroyed_count();
    assert_eq!(registry.reseed_pool(PoolId(1)), 4);
    assert_eq!(registry.host().destroyed_count(), destroyed_before + 4);
    assert_eq!(registry.pool(PoolId(1)).unwrap().spawns_aggregate(), 4);
}

#[test]
fn pending_timers_reduce_requested_count() {
    let mut registry = registry(&single_leaf(0, 4, 6));
    registry.restore_respawn_timer(PoolId(2), PointId(1), Timestamp(500)).unwrap();
    registry.restore_respawn_timer(PoolId(2), PointId(2), Timestamp(500)).unwrap();
    assert_eq!(registry.spawn_pool(PoolId(1), 0), 2);

    // respawn clears the timers first, so the remaining room is used
    assert_eq!(registry.respawn_pool(PoolId(1)), 2);
    assert!(registry.respawns().is_empty());
}

#[test]
fn manual_pool_waits_for_activation() {
    let mut data = single_leaf(1, 2, 2);
    data.templates[0] = data.templates[0].clone().with_flags(PoolFlags::MANUAL_SPAWN);
    let mut registry = registry(&data);

    assert!(!registry.pool(PoolId(1)).unwrap().is_active());
    assert_eq!(registry.spawn_pool(PoolId(1), 0), 0);
    assert_eq!(registry.spawn_all(), 0);

    assert_eq!(registry.set_active(PoolId(1), true), Some(2));
    registry.restore_respawn_timer(PoolId(2), PointId(1), Timestamp(90)).unwrap();
    assert_eq!(registry.set_active(PoolId(1), false), Some(2));
    assert_eq!(registry.pool(PoolId(1)).unwrap().spawns_aggregate(), 0);
    assert!(registry.respawns().is_empty());
    assert_eq!(registry.set_active(PoolId(9), true), None);
}

#[test]
fn pair_override_wins_only_at_its_point() {
    let mut data = single_leaf(0, 2, 8);
    data.pool_spawns.retain(|row| row.point_id == PointId(7) || row.point_id == PointId(8));
    data.creatures[0].defaults.cur_health = 100;
    let patch = |health| CreatureOverride { cur_health: health, ..Default::default() };
    data.creature_overrides = vec![
        CreatureOverrideRow {
            scope: OverrideScope::PointEntry { point_id: PointId(7), entry: 100 },
            data: patch(500),
        },
        CreatureOverrideRow {
            scope: OverrideScope::Item { pool_id: PoolId(2), entry: 100 },
            data: patch(200),
        },
    ];
    let mut registry = registry(&data);

    assert!(registry.spawn_creature(PoolId(2), 100, PointId(7)));
    assert!(registry.spawn_creature(PoolId(2), 100, PointId(8)));

    let health_at = |registry: &PoolRegistry<InMemoryHost>, point: u32| {
        let handle = registry.point(PointId(point)).unwrap().current_object().unwrap();
        match &registry.host().entity(handle).unwrap().attributes {
            SpawnAttributes::Creature(c) => c.cur_health,
            SpawnAttributes::GameObject(_) => panic!("expected a creature"),
        }
    };
    assert_eq!(health_at(&registry, 7), 500);
    assert_eq!(health_at(&registry, 8), 200);
}

#[test]
fn spawn_rejects_wrong_kind_and_unknown_ids() {
    let mut registry = registry(&single_leaf(0, 2, 2));
    assert!(!registry.spawn_game_object(PoolId(2), 100, PointId(1)));
    assert!(!registry.spawn_creature(PoolId(2), 999, PointId(1)));
    assert!(!registry.spawn_creature(PoolId(2), 100, PointId(99)));
    assert!(!registry.spawn_creature(PoolId(9), 100, PointId(1)));
    assert_eq!(registry.pool(PoolId(1)).unwrap().spawns_aggregate(), 0);
}

#[test]
#[should_panic(expected = "already reserved")]
fn double_spawn_on_one_point_panics() {
    let mut registry = registry(&single_leaf(0, 2, 2));
    registry.spawn_creature(PoolId(2), 100, PointId(1));
    registry.spawn_creature(PoolId(2), 100, PointId(1));
}

#[test]
fn same_seed_same_outcome() {
    let data = single_leaf(1, 5, 12);
    let mut a = registry(&data);
    let mut b = registry(&data);
    a.spawn_all();
    b.spawn_all();
    assert_eq!(a.state_hash().unwrap(), b.state_hash().unwrap());
}

#[test]
fn game_object_pools_spawn_game_objects() {
    let data = PoolData {
        templates: vec![PoolTemplateRow::new(5, SpawnKind::GameObject, 1, 1)],
        spawn_points: vec![SpawnPointRow { rotation: Some([0.0, 0.0, 1.0, 0.0]), ..SpawnPointRow::new(1, 0.0, 0.0, 0.0) }],
        pool_spawns: vec![PoolSpawnRow::new(5, 1)],
        game_objects: vec![GameObjectItemRow::new(5, 900, 1.0)],
        ..PoolData::default()
    };
    let mut registry = registry(&data);
    assert_eq!(registry.spawn_pool(PoolId(5), 0), 1);
    let handle = registry.point(PointId(1)).unwrap().current_object().unwrap();
    let request = registry.host().entity(handle).unwrap();
    assert_eq!(request.kind, SpawnKind::GameObject);
    match &request.attributes {
        SpawnAttributes::GameObject(g) => assert_eq!(g.rotation, [0.0, 0.0, 1.0, 0.0]),
        SpawnAttributes::Creature(_) => panic!("expected a gameobject"),
    }
}
