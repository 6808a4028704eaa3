//! Support units that travel with a squad outside its clusters
//!
//! Detectors keep the closest enemy needing detection revealed, or shadow
//! the squad's vanguard when nothing needs revealing. Support casters trail
//! the vanguard cluster. Both avoid spots the enemy both sees and can shoot.

use glam::Vec2;

use crate::core::types::UnitId;
use crate::orders::CommandBuffer;
use crate::spatial::geometry::scale_to;
use crate::world::context::TickContext;
use crate::world::units::UnitView;

/// Distance ahead checked for danger before moving toward a spot
const LOOK_AHEAD: f32 = 48.0;

fn exposed(ctx: &TickContext, pos: Vec2) -> bool {
    ctx.enemy_grid.air_threat(pos) > 0 && ctx.enemy_grid.detection(pos) > 0
}

fn move_away(ctx: &TickContext, unit: &UnitView, from: Vec2, commands: &mut CommandBuffer) {
    let behind = scale_to(unit.position() - from, ctx.config.support.detector_backoff);
    if behind == Vec2::ZERO {
        commands.move_unit(unit.id(), ctx.terrain.home_position());
    } else {
        commands.move_unit(unit.id(), unit.position() + behind);
    }
}

fn move_toward(ctx: &TickContext, unit: &UnitView, to: Vec2, commands: &mut CommandBuffer) {
    let ahead = unit.position() + scale_to(to - unit.position(), LOOK_AHEAD);
    if exposed(ctx, ahead) {
        move_away(ctx, unit, to, commands);
    } else {
        commands.move_unit(unit.id(), to);
    }
}

/// Orders for every detector attached to a squad
///
/// `vanguard` is the squad's frontmost unit, if it has one.
pub fn execute_detectors<'a>(
    ctx: &TickContext<'a>,
    detectors: impl IntoIterator<Item = UnitId>,
    needing_detection: &[UnitView<'a>],
    vanguard: Option<Vec2>,
    commands: &mut CommandBuffer,
) {
    let margin = ctx.config.support.detector_sight_margin;
    for detector in detectors.into_iter().filter_map(|id| ctx.view(id)) {
        let closest = needing_detection.iter().min_by(|a, b| {
            detector
                .edge_distance(a)
                .total_cmp(&detector.edge_distance(b))
        });
        if let Some(enemy) = closest {
            if detector.edge_distance(enemy) > detector.kind.sight_range - margin {
                move_toward(ctx, &detector, enemy.position(), commands);
            } else {
                move_away(ctx, &detector, enemy.position(), commands);
            }
            continue;
        }
        let destination = vanguard.unwrap_or_else(|| ctx.terrain.home_position());
        move_toward(ctx, &detector, destination, commands);
    }
}

/// Orders for support casters: stay a little behind the member nearest
/// the vanguard cluster's center
pub fn execute_casters(
    ctx: &TickContext,
    casters: impl IntoIterator<Item = UnitId>,
    anchor: Option<Vec2>,
    commands: &mut CommandBuffer,
) {
    let home = ctx.terrain.home_position();
    let trail = ctx.config.support.caster_trail_distance;
    for caster in casters.into_iter().filter_map(|id| ctx.view(id)) {
        let Some(anchor) = anchor else {
            commands.move_unit(caster.id(), home);
            continue;
        };
        let spot = anchor + scale_to(home - anchor, trail);
        if ctx.enemy_grid.air_threat(spot) > 0 {
            move_away(ctx, &caster, spot, commands);
        } else {
            commands.move_unit(caster.id(), spot);
        }
    }
}
