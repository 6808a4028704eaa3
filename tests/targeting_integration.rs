//! Target selection integration tests
//!
//! Covers configuration-driven priority tables and cluster-wide target
//! assignment on sandbox terrain.

use glam::Vec2;

use warband::cluster::{select_targets, PriorityTable};
use warband::core::types::Side;
use warband::spatial::TilePos;
use warband::world::roster;
use warband::{Sandbox, TacticsConfig};

#[test]
fn test_sample_config_matches_builtin_tables() {
    let config = TacticsConfig::from_toml_str(include_str!("../data/tactics.toml")).unwrap();
    assert_eq!(config.targeting.melee, PriorityTable::melee());
    assert_eq!(config.targeting.ranged, PriorityTable::ranged());
    assert_eq!(config.targeting.melee_priority_weight, 64);
    assert_eq!(config.regroup.flee_window, 24);
}

#[test]
fn test_custom_table_changes_choice() {
    let origin = Vec2::new(1600.0, 600.0);
    let mut sandbox = Sandbox::new(80, 40).unwrap();
    let me = sandbox.spawn(roster::RIFLEMAN, Side::Mine, origin).unwrap();
    let worker = sandbox.spawn(roster::DRUDGE, Side::Enemy, origin + Vec2::new(60.0, 0.0)).unwrap();
    let shooter = sandbox.spawn(roster::RIFLEMAN, Side::Enemy, origin + Vec2::new(100.0, 0.0)).unwrap();

    let picks = {
        let ctx = sandbox.context(0);
        select_targets(&ctx, &[me], &ctx.enemies(), Some(me), origin)
    };
    assert_eq!(picks, vec![(me, Some(shooter))]);

    sandbox.config = TacticsConfig::from_toml_str(
        r#"
        [targeting.ranged]
        fallback = 1

        [[targeting.ranged.rules]]
        priority = 12
        all = [{ kind = "target_tag", tag = "worker" }]

        [[targeting.ranged.rules]]
        priority = 2
        all = [{ kind = "target_armed" }]
        "#,
    )
    .unwrap();
    let ctx = sandbox.context(0);
    let picks = select_targets(&ctx, &[me], &ctx.enemies(), Some(me), origin);
    assert_eq!(picks, vec![(me, Some(worker))]);
}

#[test]
fn test_enemies_across_cliff_ignored() {
    let goal = Vec2::new(2400.0, 200.0);
    let build = |walled: bool| {
        let mut sandbox = Sandbox::new(80, 40).unwrap();
        if walled {
            sandbox.map.set_walkable(TilePos::new(40, 0), TilePos::new(40, 34), false);
        }
        let me = sandbox.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(1200.0, 200.0)).unwrap();
        let worker = sandbox.spawn(roster::DRUDGE, Side::Enemy, Vec2::new(1360.0, 200.0)).unwrap();
        (sandbox, me, worker)
    };

    let (open, me, worker) = build(false);
    let ctx = open.context(0);
    let picks = select_targets(&ctx, &[me], &ctx.enemies(), Some(me), goal);
    assert_eq!(picks, vec![(me, Some(worker))]);

    let (walled, me, _) = build(true);
    let ctx = walled.context(0);
    let picks = select_targets(&ctx, &[me], &ctx.enemies(), Some(me), goal);
    assert_eq!(picks, vec![(me, None)]);
}

#[test]
fn test_every_member_gets_an_entry() {
    let origin = Vec2::new(800.0, 600.0);
    let mut sandbox = Sandbox::new(80, 40).unwrap();
    let brawler = sandbox.spawn(roster::BRAWLER, Side::Mine, origin).unwrap();
    let rifle = sandbox.spawn(roster::RIFLEMAN, Side::Mine, origin + Vec2::new(0.0, 40.0)).unwrap();
    let far = sandbox.spawn(roster::RIFLEMAN, Side::Mine, origin - Vec2::new(600.0, 0.0)).unwrap();
    let enemy = sandbox.spawn(roster::BRAWLER, Side::Enemy, origin + Vec2::new(80.0, 0.0)).unwrap();

    let ctx = sandbox.context(0);
    let picks = select_targets(&ctx, &[brawler, rifle, far], &ctx.enemies(), Some(brawler), origin);
    assert_eq!(picks, vec![(brawler, Some(enemy)), (rifle, Some(enemy)), (far, None)]);
}
