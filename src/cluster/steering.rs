//! Flocking movement
//!
//! With a navigation grid, each unit blends three boids:
//! - goal: toward the grid node a few hops ahead of the unit
//! - cohesion: toward the cluster center
//! - separation: away from neighbours that crowd it
//!
//! Without a grid, units fall back to a plain move to the destination.

use std::f32::consts::PI;

use glam::Vec2;
use tracing::warn;

use crate::cluster::cluster::Cluster;
use crate::orders::CommandBuffer;
use crate::spatial::geometry::{clamp_length, scale_to, tiles_between, TilePos};
use crate::spatial::navigation::NavNode;
use crate::world::context::TickContext;
use crate::world::units::UnitView;

/// Repulsion from neighbours within `factor` times the wider unit's width
///
/// Strength is `weight` at contact and falls off quadratically to zero at
/// the detection limit.
pub fn separation<'a, 'v: 'a>(
    unit: &UnitView,
    others: impl IntoIterator<Item = &'a UnitView<'v>>,
    factor: f32,
    weight: f32,
) -> Vec2 {
    let mut push = Vec2::ZERO;
    for other in others {
        if other.id() == unit.id() {
            continue;
        }
        let limit = unit.kind.width.max(other.kind.width) * factor;
        let distance = unit.edge_distance(other);
        if distance >= limit {
            continue;
        }
        let offset = other.position() - unit.position();
        let center_distance = offset.length().max(1.0);
        let falloff = 1.0 - distance / limit;
        push -= offset * (falloff * falloff * weight / center_distance);
    }
    push
}

/// Final move point for a boid sum
///
/// The sum is capped at `cap` when positive. `None` when a ground unit would
/// end up on unwalkable terrain.
pub fn compute_position(ctx: &TickContext, unit: &UnitView, total: Vec2, cap: f32) -> Option<Vec2> {
    let step = if cap > 0.0 { clamp_length(total, cap) } else { total };
    let position = unit.position() + step;
    if !unit.is_flyer() && !ctx.terrain.is_walkable(position) {
        return None;
    }
    Some(position)
}

/// Unwalkable tile on the straight line between two points
pub fn blocked_between(ctx: &TickContext, from: Vec2, to: Vec2) -> bool {
    tiles_between(from, to)
        .into_iter()
        .any(|tile| !ctx.terrain.is_walkable(tile.center()))
}

/// Cohesion is dropped when the cluster center sits far lower on the cost
/// field than the unit's look-ahead node, which signals a cliff in between
fn cohesion_allowed(ctx: &TickContext, unit: &UnitView, node: &NavNode, center_node: Option<&NavNode>, center: Vec2) -> bool {
    let threshold = ctx.config.steering.cliff_cost_threshold;
    match center_node {
        Some(center_node) => node.cost < threshold || center_node.cost > node.cost - threshold,
        None => !blocked_between(ctx, unit.position(), center),
    }
}

/// Issue flocking moves for every member of `cluster` toward `destination`
pub fn flock(ctx: &TickContext, cluster: &Cluster, destination: Option<Vec2>, commands: &mut CommandBuffer) {
    let Some(destination) = destination else {
        warn!(cluster = %cluster.id, "cluster asked to move without a target position");
        return;
    };
    let config = &ctx.config.steering;
    let grid = ctx.pathing.navigation_grid(destination);
    if grid.is_none() {
        warn!(
            cluster = %cluster.id,
            x = destination.x,
            y = destination.y,
            "moving toward a position without a navigation grid"
        );
    }

    let center = cluster.center();
    let center_node = grid.and_then(|g| g.node_at(center));
    let cohesion_factor = if cluster.area() > 0.0 {
        config.cohesion_weight * PI / cluster.area().sqrt()
    } else {
        0.0
    };
    let members = cluster.member_views(ctx);

    for unit in &members {
        if unit.state.stuck {
            commands.unstick(unit.id());
            continue;
        }
        if !unit.is_ready(ctx.tick) {
            continue;
        }

        let node = grid.and_then(|g| {
            let current = g.node_at(unit.position())?;
            // May land fewer hops out when the destination is closer
            let ahead = g.ahead(current, config.look_ahead_hops);
            (ahead.tile != current.tile).then_some(ahead)
        });
        let Some(node) = node else {
            commands.move_unit(unit.id(), destination);
            continue;
        };

        let own_tile = TilePos::containing(unit.position()).center();
        let goal = scale_to(node.center() - own_tile, config.goal_weight);

        let cohesion = if cohesion_allowed(ctx, unit, &node, center_node.as_ref(), center) {
            (center - unit.position()) * cohesion_factor
        } else {
            Vec2::ZERO
        };

        let push = separation(unit, &members, config.separation_detection_factor, config.separation_weight);

        let target = compute_position(ctx, unit, goal + cohesion + push, config.max_step)
            .unwrap_or_else(|| node.center());
        commands.move_unit(unit.id(), target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ClusterId, Side, UnitId};
    use crate::orders::Action;
    use crate::world::sandbox::Sandbox;
    use crate::world::unit_type::roster;

    fn cluster_of(sandbox: &Sandbox, ids: &[UnitId], target: Vec2) -> Cluster {
        let ctx = sandbox.context(0);
        let mut cluster = Cluster::new(ClusterId(1), &ctx.view(ids[0]).unwrap(), 72);
        for id in &ids[1..] {
            cluster.add_unit(&ctx.view(*id).unwrap(), &ctx, Some(target));
        }
        cluster.update_positions(&ctx, Some(target));
        cluster
    }

    #[test]
    fn test_flock_heads_for_destination() {
        let mut s = Sandbox::new(60, 60).unwrap();
        let goal = TilePos::new(50, 10).center();
        s.map.add_navigation_grid(goal);
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, TilePos::new(5, 10).center()).unwrap();
        let b = s.spawn(roster::RIFLEMAN, Side::Mine, TilePos::new(5, 11).center()).unwrap();
        let cluster = cluster_of(&s, &[a, b], goal);
        let mut commands = CommandBuffer::new();
        flock(&s.context(0), &cluster, Some(goal), &mut commands);
        assert_eq!(commands.len(), 2);
        for id in [a, b] {
            let target = commands.for_unit(id).and_then(|a| a.destination()).unwrap();
            let start = s.units.get(id).unwrap().position;
            assert!(target.x > start.x);
            assert!(target.distance(start) <= 80.0 + 1e-3);
        }
    }

    #[test]
    fn test_missing_grid_moves_directly() {
        let mut s = Sandbox::new(60, 60).unwrap();
        let goal = TilePos::new(50, 10).center();
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, TilePos::new(5, 10).center()).unwrap();
        let cluster = cluster_of(&s, &[a], goal);
        let mut commands = CommandBuffer::new();
        flock(&s.context(0), &cluster, Some(goal), &mut commands);
        assert_eq!(commands.for_unit(a), Some(Action::move_to(goal)));
    }

    #[test]
    fn test_missing_target_issues_nothing() {
        let mut s = Sandbox::new(20, 20).unwrap();
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, TilePos::new(5, 5).center()).unwrap();
        let cluster = cluster_of(&s, &[a], TilePos::new(10, 10).center());
        let mut commands = CommandBuffer::new();
        flock(&s.context(0), &cluster, None, &mut commands);
        assert!(commands.is_empty());
    }

    #[test]
    fn test_stuck_and_busy_units() {
        let mut s = Sandbox::new(60, 60).unwrap();
        let goal = TilePos::new(50, 10).center();
        s.map.add_navigation_grid(goal);
        let stuck = s.spawn(roster::RIFLEMAN, Side::Mine, TilePos::new(5, 10).center()).unwrap();
        let busy = s.spawn(roster::RIFLEMAN, Side::Mine, TilePos::new(5, 12).center()).unwrap();
        s.units.get_mut(stuck).unwrap().stuck = true;
        s.units.get_mut(busy).unwrap().busy_until = 100;
        let cluster = cluster_of(&s, &[stuck, busy], goal);
        let mut commands = CommandBuffer::new();
        flock(&s.context(0), &cluster, Some(goal), &mut commands);
        assert_eq!(commands.for_unit(stuck), Some(Action::Unstick));
        assert_eq!(commands.for_unit(busy), None);
    }

    #[test]
    fn test_separation_pushes_apart() {
        let mut s = Sandbox::new(20, 20).unwrap();
        let a = s.spawn(roster::LANCER, Side::Mine, Vec2::new(200.0, 200.0)).unwrap();
        let b = s.spawn(roster::LANCER, Side::Mine, Vec2::new(220.0, 200.0)).unwrap();
        let far = s.spawn(roster::LANCER, Side::Mine, Vec2::new(500.0, 200.0)).unwrap();
        let ctx = s.context(0);
        let views: Vec<UnitView> = [a, b, far].iter().map(|id| ctx.view(*id).unwrap()).collect();
        let push = separation(&views[0], &views, 2.0, 96.0);
        assert!(push.x < 0.0);
        assert!(push.y.abs() < 1e-4);
        let alone = separation(&views[2], &views, 2.0, 96.0);
        assert_eq!(alone, Vec2::ZERO);
    }

    #[test]
    fn test_cohesion_blocked_by_wall() {
        let mut s = Sandbox::new(20, 20).unwrap();
        s.map.set_walkable(TilePos::new(10, 0), TilePos::new(10, 19), false);
        let ctx = s.context(0);
        assert!(blocked_between(&ctx, TilePos::new(5, 5).center(), TilePos::new(15, 5).center()));
        assert!(!blocked_between(&ctx, TilePos::new(5, 5).center(), TilePos::new(8, 9).center()));
    }

    #[test]
    fn test_unwalkable_result_rejected_for_ground_only() {
        let mut s = Sandbox::new(20, 20).unwrap();
        s.map.set_walkable(TilePos::new(6, 5), TilePos::new(6, 5), false);
        let ground = s.spawn(roster::RIFLEMAN, Side::Mine, TilePos::new(5, 5).center()).unwrap();
        let flyer = s.spawn(roster::DROPSHIP, Side::Mine, TilePos::new(5, 5).center()).unwrap();
        let ctx = s.context(0);
        let step = Vec2::new(32.0, 0.0);
        assert!(compute_position(&ctx, &ctx.view(ground).unwrap(), step, 80.0).is_none());
        assert!(compute_position(&ctx, &ctx.view(flyer).unwrap(), step, 80.0).is_some());
    }
}
