//! Randomized checks of the cluster merge rule
//!
//! Two stacked groups are placed far apart so they form separate clusters,
//! then pulled to a random separation. After one update they must merge
//! exactly when the ball gap or, at equal progress, the line gap is within
//! the combine distance.

use glam::Vec2;
use proptest::prelude::*;

use warband::core::config::ClusteringConfig;
use warband::core::types::{Side, UnitId};
use warband::squad::AttackPolicy;
use warband::world::roster;
use warband::{Sandbox, Squad};

const WEST: Vec2 = Vec2::new(200.0, 600.0);

fn stack(sandbox: &mut Sandbox, at: Vec2, count: usize) -> Vec<UnitId> {
    (0..count)
        .map(|_| sandbox.spawn(roster::RIFLEMAN, Side::Mine, at).unwrap())
        .collect()
}

proptest! {
    #[test]
    fn prop_merge_iff_within_combine_distance(
        west_count in 1usize..6,
        east_count in 1usize..6,
        separation in 0.0f32..1200.0,
    ) {
        let combine = ClusteringConfig::default().combine_distance;
        let mut sandbox = Sandbox::new(80, 40).unwrap();
        let west = stack(&mut sandbox, WEST, west_count);
        let east = stack(&mut sandbox, WEST + Vec2::new(1500.0, 0.0), east_count);

        // No objective: both clusters sit at the same progress
        let mut squad = Squad::new("prop", None, Box::new(AttackPolicy));
        {
            let ctx = sandbox.context(0);
            for unit in west.iter().chain(&east) {
                squad.add_unit(&ctx, *unit).unwrap();
            }
            squad.update_clusters(&ctx);
        }
        prop_assert_eq!(squad.clusters().len(), 2);
        let radii: Vec<(f32, f32, f32)> = squad
            .clusters()
            .iter()
            .map(|c| (c.ball_radius(), c.line_radius(), c.progress()))
            .collect();
        let ball_gap = separation - radii[0].0 - radii[1].0;
        let line_gap = separation - radii[0].1 - radii[1].1;
        prop_assume!((ball_gap - combine).abs() > 0.5 && (line_gap - combine).abs() > 0.5);

        for unit in &east {
            sandbox.set_position(*unit, WEST + Vec2::new(separation, 0.0));
        }
        let ctx = sandbox.context(1);
        squad.update_clusters(&ctx);

        let same_progress = (radii[0].2 - radii[1].2).abs() < ctx.config.clustering.arc_progress_tolerance;
        let expected = ball_gap <= combine || (line_gap <= combine && same_progress);
        prop_assert_eq!(squad.clusters().len() == 1, expected);
        prop_assert_eq!(squad.combat_unit_count(), west_count + east_count);
        if expected {
            prop_assert_eq!(squad.clusters()[0].len(), west_count + east_count);
        }
    }
}
