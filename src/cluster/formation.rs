//! Arc formation
//!
//! While a cluster closes in and nobody is under fire yet, ground members
//! fan out on a circle around a pivot just beyond the vanguard's target, so
//! more of them reach range at once. Moving as a ball is the flocking in
//! [`steering`](super::steering).

use glam::Vec2;
use tracing::trace;

use crate::cluster::cluster::Cluster;
use crate::cluster::steering::{blocked_between, compute_position, separation};
use crate::core::types::UnitId;
use crate::orders::CommandBuffer;
use crate::spatial::geometry::scale_to;
use crate::world::context::TickContext;
use crate::world::units::UnitView;

/// Circle the cluster spreads along
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc {
    pub pivot: Vec2,
    /// Desired distance from the pivot for ranged members
    pub distance: f32,
}

fn under_threat(ctx: &TickContext, unit: &UnitView) -> bool {
    let threat = if unit.is_flyer() {
        ctx.enemy_grid.air_threat(unit.position())
    } else {
        ctx.enemy_grid.ground_threat(unit.position())
    };
    threat > 0
}

fn melee_offset(ctx: &TickContext, unit: &UnitView) -> f32 {
    if unit.is_ranged() {
        0.0
    } else {
        ctx.config.formation.melee_offset
    }
}

/// Arc to form ahead of an attack, if one makes sense
///
/// None once any member is threatened or already has its target in range,
/// when the vanguard's target cannot hit back, or when a ground vanguard's
/// straight line to it crosses blocked ground.
pub fn plan_arc(ctx: &TickContext, cluster: &Cluster, targets: &[(UnitId, Option<UnitId>)]) -> Option<Arc> {
    let config = &ctx.config.formation;
    let mut vanguard_target = None;
    for (id, target) in targets {
        let Some(unit) = ctx.view(*id) else { continue };
        let target = target.and_then(|t| ctx.view(t));
        if under_threat(ctx, &unit) || target.as_ref().is_some_and(|t| unit.in_range_of(t, 0.0)) {
            return None;
        }
        if *id == cluster.vanguard() {
            vanguard_target = target;
        }
    }

    let vanguard = ctx.view(cluster.vanguard())?;
    let target = vanguard_target.filter(|t| t.can_attack(&vanguard))?;
    if !vanguard.is_flyer() && blocked_between(ctx, vanguard.position(), target.position()) {
        return None;
    }

    let offset = target.position() - vanguard.position();
    let pivot = vanguard.position() + scale_to(offset, offset.length() + config.pivot_overshoot);
    let effective = |unit: &UnitView| unit.position().distance(pivot) + melee_offset(ctx, unit);
    let mut distance = effective(&vanguard);

    // Tighten once enough of the cluster stands on the arc
    let limit = distance + config.formed_tolerance;
    let mut formed = 0;
    let mut total = 0.0;
    let mut count = 0;
    for unit in cluster.member_views(ctx).iter().filter(|u| !u.is_flyer()) {
        let d = effective(unit);
        if d <= limit {
            formed += 1;
            if formed >= config.formed_count {
                break;
            }
        }
        total += d;
        count += 1;
    }
    if formed >= config.formed_count || (count > 0 && total / count as f32 <= limit) {
        distance -= config.tighten_step;
    }

    Some(Arc { pivot, distance })
}

/// Move members onto `arc`
///
/// Returns false without issuing anything when the vanguard flies or stands
/// in ground too narrow to spread out.
pub fn form_arc(ctx: &TickContext, cluster: &Cluster, arc: &Arc, commands: &mut CommandBuffer) -> bool {
    let config = &ctx.config.formation;
    let Some(vanguard) = ctx.view(cluster.vanguard()) else {
        return false;
    };
    if vanguard.is_flyer() || ctx.terrain.walkable_width(vanguard.position()) < config.min_walkable_width {
        return false;
    }

    let vanguard_to_pivot = vanguard.position().distance(arc.pivot);
    let members = cluster.member_views(ctx);
    let ground: Vec<UnitView> = members.iter().filter(|u| !u.is_flyer()).copied().collect();
    for unit in &members {
        if unit.state.stuck {
            commands.unstick(unit.id());
            continue;
        }
        if !unit.is_ready(ctx.tick) {
            continue;
        }
        let to_pivot = unit.position().distance(arc.pivot);
        if unit.is_flyer() || to_pivot - vanguard_to_pivot > config.straggler_distance {
            commands.move_unit(unit.id(), vanguard.position());
            continue;
        }

        let push = separation(unit, &ground, config.separation_detection_factor, config.separation_weight);
        let change = to_pivot - arc.distance + melee_offset(ctx, unit);
        let step = change.abs().max(push.length() * 2.0).copysign(change);
        let goal = scale_to(arc.pivot - unit.position(), step);
        let destination = compute_position(ctx, unit, goal + push, 0.0).unwrap_or(vanguard.position());
        commands.move_unit(unit.id(), destination);
    }
    trace!(cluster = %cluster.id, pivot = ?arc.pivot, distance = arc.distance, "forming arc");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ClusterId, Side};
    use crate::orders::Action;
    use crate::spatial::geometry::TilePos;
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

    fn approach(s: &mut Sandbox) -> (Vec<UnitId>, UnitId) {
        let mine = [380.0, 400.0, 420.0]
            .into_iter()
            .map(|y| s.spawn(roster::BRAWLER, Side::Mine, Vec2::new(400.0, y)).unwrap())
            .collect();
        let enemy = s.spawn(roster::RIFLEMAN, Side::Enemy, Vec2::new(800.0, 400.0)).unwrap();
        (mine, enemy)
    }

    #[test]
    fn test_arc_spreads_toward_pivot() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let (mine, enemy) = approach(&mut s);
        let cluster = cluster_of(&s, &mine, Vec2::new(800.0, 400.0));
        let targets: Vec<_> = mine.iter().map(|id| (*id, Some(enemy))).collect();
        let ctx = s.context(1);

        let arc = plan_arc(&ctx, &cluster, &targets).unwrap();
        assert!(arc.pivot.x > 800.0);

        let mut commands = CommandBuffer::new();
        assert!(form_arc(&ctx, &cluster, &arc, &mut commands));
        for id in &mine {
            let destination = commands.for_unit(*id).and_then(|a| a.destination()).unwrap();
            assert!(destination.x > 400.0);
        }
    }

    #[test]
    fn test_no_arc_once_in_range() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let mine = s.spawn(roster::BRAWLER, Side::Mine, Vec2::new(400.0, 400.0)).unwrap();
        let enemy = s.spawn(roster::RIFLEMAN, Side::Enemy, Vec2::new(420.0, 400.0)).unwrap();
        let cluster = cluster_of(&s, &[mine], Vec2::new(420.0, 400.0));
        assert_eq!(plan_arc(&s.context(1), &cluster, &[(mine, Some(enemy))]), None);
    }

    #[test]
    fn test_no_arc_under_threat() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let (mine, enemy) = approach(&mut s);
        s.enemy_grid.add_ground_threat(Vec2::new(400.0, 400.0), 64.0, 10);
        let cluster = cluster_of(&s, &mine, Vec2::new(800.0, 400.0));
        let targets: Vec<_> = mine.iter().map(|id| (*id, Some(enemy))).collect();
        assert_eq!(plan_arc(&s.context(1), &cluster, &targets), None);
    }

    #[test]
    fn test_no_arc_against_harmless_target() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let mine = s.spawn(roster::BRAWLER, Side::Mine, Vec2::new(400.0, 400.0)).unwrap();
        let nexus = s.spawn(roster::NEXUS, Side::Enemy, Vec2::new(800.0, 400.0)).unwrap();
        let cluster = cluster_of(&s, &[mine], Vec2::new(800.0, 400.0));
        assert_eq!(plan_arc(&s.context(1), &cluster, &[(mine, Some(nexus))]), None);
    }

    #[test]
    fn test_narrow_ground_keeps_ball() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let (mine, enemy) = approach(&mut s);
        s.map.set_walkable(TilePos::new(0, 0), TilePos::new(59, 9), false);
        s.map.set_walkable(TilePos::new(0, 15), TilePos::new(59, 29), false);
        let cluster = cluster_of(&s, &mine, Vec2::new(800.0, 400.0));
        let targets: Vec<_> = mine.iter().map(|id| (*id, Some(enemy))).collect();
        let ctx = s.context(1);

        let arc = plan_arc(&ctx, &cluster, &targets).unwrap();
        let mut commands = CommandBuffer::new();
        assert!(!form_arc(&ctx, &cluster, &arc, &mut commands));
        assert!(commands.is_empty());
    }
}
