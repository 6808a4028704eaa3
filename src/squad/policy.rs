//! Squad policies: what a squad's clusters do each tick
//!
//! Architecture: the squad owns cluster bookkeeping; a policy object decides
//! how each cluster fights. `AttackPolicy` pushes toward an enemy objective
//! with the full engage/regroup machinery. `DefendPolicy` guards a position
//! and never withdraws from it. `MopUpPolicy` hunts down what is left of the
//! enemy, building by building.

use std::fmt;

use glam::Vec2;
use tracing::{trace, warn};

use crate::cluster::cluster::{Activity, Cluster};
use crate::cluster::combat_sim::simulate_engagement;
use crate::cluster::engage;
use crate::cluster::formation;
use crate::cluster::regroup::{self, Engagement};
use crate::cluster::sim_result::CombatSimResult;
use crate::cluster::steering::flock;
use crate::cluster::targeting::select_targets;
use crate::core::types::{ClusterId, UnitId};
use crate::orders::CommandBuffer;
use crate::world::context::TickContext;
use crate::world::units::UnitView;

/// Squad-wide facts a cluster needs while executing
#[derive(Debug, Clone, Default)]
pub struct SquadFrame {
    pub target_position: Option<Vec2>,
    pub vanguard_cluster: Option<ClusterId>,
    pub vanguard_center: Option<Vec2>,
    /// Positions of the squad's mobile detectors
    pub detectors: Vec<Vec2>,
}

impl SquadFrame {
    /// A squad detector is close enough to the cluster's vanguard to reveal
    /// cloaked enemies in its fight
    pub fn has_mobile_detection(&self, ctx: &TickContext, cluster: &Cluster) -> bool {
        let Some(vanguard) = ctx.view(cluster.vanguard()) else {
            return false;
        };
        let radius = ctx.config.combat_sim.mobile_detection_radius;
        self.detectors.iter().any(|d| d.distance(vanguard.position()) < radius)
    }
}

/// Trait for squad behaviours
pub trait SquadPolicy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Issue this tick's orders for one cluster
    fn execute_cluster(
        &self,
        ctx: &TickContext,
        frame: &SquadFrame,
        cluster: &mut Cluster,
        commands: &mut CommandBuffer,
    );
}

/// Advance on an enemy position, fighting when the sim favours it and
/// regrouping when it does not
#[derive(Debug, Clone, Copy, Default)]
pub struct AttackPolicy;

/// Guard a position, engaging only enemies that come close to it
#[derive(Debug, Clone, Copy, Default)]
pub struct DefendPolicy {
    /// Overrides the configured defend radius
    pub radius: Option<f32>,
}

/// Clear out the remaining enemy: fight whatever is close, otherwise march
/// on the nearest known enemy building
#[derive(Debug, Clone, Copy, Default)]
pub struct MopUpPolicy;

fn ids(units: &[UnitView]) -> Vec<UnitId> {
    units.iter().map(|u| u.id()).collect()
}

fn no_fight(sim: &CombatSimResult, targets: &[(UnitId, Option<UnitId>)], negligible: f64) -> bool {
    sim.my_percent_lost() <= negligible
        && sim.enemy_percent_lost() <= negligible
        && targets.iter().all(|(_, t)| t.is_none())
}

/// Attack each member's target; members without one move to the objective
///
/// Before first contact the cluster spreads into an arc where the ground
/// allows it.
pub fn attack_micro(
    ctx: &TickContext,
    cluster: &Cluster,
    targets: &[(UnitId, Option<UnitId>)],
    target_position: Option<Vec2>,
    commands: &mut CommandBuffer,
) {
    if let Some(arc) = formation::plan_arc(ctx, cluster, targets) {
        if formation::form_arc(ctx, cluster, &arc, commands) {
            return;
        }
    }
    for unit in cluster.member_views(ctx) {
        if unit.state.stuck {
            commands.unstick(unit.id());
            continue;
        }
        if !unit.is_ready(ctx.tick) {
            continue;
        }
        let target = targets
            .iter()
            .find(|(id, _)| *id == unit.id())
            .and_then(|(_, t)| *t)
            .filter(|t| ctx.exists(*t));
        match (target, target_position) {
            (Some(target), _) => commands.attack(unit.id(), target),
            (None, Some(position)) => commands.move_unit(unit.id(), position),
            (None, None) => {}
        }
    }
}

/// A lagging cluster joins up with the vanguard cluster instead of fighting alone
fn should_link_up(ctx: &TickContext, frame: &SquadFrame, cluster: &Cluster, targets: &[(UnitId, Option<UnitId>)]) -> Option<Vec2> {
    let (Some(vanguard_cluster), Some(vanguard_center)) = (frame.vanguard_cluster, frame.vanguard_center) else {
        return None;
    };
    if vanguard_cluster == cluster.id {
        return None;
    }
    let vanguard = ctx.view(cluster.vanguard())?;
    let to_center = ctx
        .path_distance(vanguard.position(), vanguard_center)
        .unwrap_or_else(|| vanguard.position().distance(vanguard_center));
    let target = targets
        .iter()
        .find(|(id, _)| *id == vanguard.id())
        .and_then(|(_, t)| *t)
        .and_then(|t| ctx.view(t));
    match target {
        Some(target) if vanguard.position().distance(target.position()) <= to_center => None,
        _ => Some(vanguard_center),
    }
}

impl SquadPolicy for AttackPolicy {
    fn name(&self) -> &'static str {
        "attack"
    }

    fn execute_cluster(
        &self,
        ctx: &TickContext,
        frame: &SquadFrame,
        cluster: &mut Cluster,
        commands: &mut CommandBuffer,
    ) {
        let config = ctx.config;
        let target_position = frame.target_position;

        let reach = ctx
            .view(cluster.vanguard())
            .map_or(0.0, |v| v.position().distance(cluster.center()));
        let enemies = ctx.enemies_near(cluster.center(), config.clustering.enemy_scan_radius + reach);
        if enemies.is_empty() {
            cluster.set_activity(Activity::Default, ctx.tick);
            flock(ctx, cluster, target_position, commands);
            return;
        }

        let members: Vec<UnitId> = cluster.units().iter().copied().collect();
        let aim = target_position.unwrap_or_else(|| cluster.center());
        let targets = select_targets(ctx, &members, &enemies, Some(cluster.vanguard()), aim);
        let enemy_ids = ids(&enemies);
        let detected = frame.has_mobile_detection(ctx, cluster);
        let sim = simulate_engagement(ctx, &targets, &enemy_ids, detected, None)
            .adjust_for_elevation(&config.combat_sim);

        if no_fight(&sim, &targets, config.engage.negligible_loss) {
            cluster.set_activity(Activity::Default, ctx.tick);
            flock(ctx, cluster, target_position, commands);
            return;
        }

        let decision_sim = sim.adjust_for_choke(true, &config.combat_sim);
        if engage::decide(cluster, &decision_sim, &config.engage) {
            cluster.set_activity(Activity::Attacking, ctx.tick);
            attack_micro(ctx, cluster, &targets, target_position, commands);
            return;
        }

        if let Some(rally) = should_link_up(ctx, frame, cluster, &targets) {
            trace!(cluster = %cluster.id, "linking up with vanguard cluster");
            cluster.set_activity(Activity::Default, ctx.tick);
            flock(ctx, cluster, Some(rally), commands);
            return;
        }

        cluster.set_activity(Activity::Regrouping, ctx.tick);
        let mut engagement = Engagement {
            enemies,
            targets,
            sim,
            static_sim: None,
            target_position,
        };
        if engagement.has_static_defense() && regroup::wants_static_sim(cluster) {
            let mobile = ids(&engagement.mobile_enemies());
            engagement.static_sim = Some(
                simulate_engagement(ctx, &engagement.targets, &mobile, detected, None)
                    .adjust_for_elevation(&config.combat_sim),
            );
        }
        regroup::regroup(ctx, cluster, &engagement, commands);
    }
}

impl SquadPolicy for DefendPolicy {
    fn name(&self) -> &'static str {
        "defend"
    }

    fn execute_cluster(
        &self,
        ctx: &TickContext,
        frame: &SquadFrame,
        cluster: &mut Cluster,
        commands: &mut CommandBuffer,
    ) {
        let config = ctx.config;
        let Some(position) = frame.target_position else {
            warn!(cluster = %cluster.id, "defend squad has no position to hold");
            return;
        };
        let radius = self.radius.unwrap_or(config.engage.defend_radius);
        let enemies = ctx.enemies_near(position, radius);
        if enemies.is_empty() {
            cluster.set_activity(Activity::Default, ctx.tick);
            flock(ctx, cluster, Some(position), commands);
            return;
        }

        let members: Vec<UnitId> = cluster.units().iter().copied().collect();
        let targets = select_targets(ctx, &members, &enemies, Some(cluster.vanguard()), position);
        let detected = frame.has_mobile_detection(ctx, cluster);
        let sim = simulate_engagement(ctx, &targets, &ids(&enemies), detected, None)
            .adjust_for_elevation(&config.combat_sim);

        if !no_fight(&sim, &targets, config.engage.negligible_loss) && engage::decide(cluster, &sim, &config.engage) {
            cluster.set_activity(Activity::Attacking, ctx.tick);
            attack_micro(ctx, cluster, &targets, Some(position), commands);
            return;
        }

        // Hold the position rather than withdraw
        cluster.set_activity(Activity::Default, ctx.tick);
        flock(ctx, cluster, Some(position), commands);
    }
}

/// Nearest known enemy building, by ground distance unless the unit flies
fn nearest_enemy_building<'a>(ctx: &TickContext<'a>, unit: &UnitView) -> Option<UnitView<'a>> {
    let from = unit.position();
    let distance = |building: &UnitView| {
        if unit.is_flyer() {
            from.distance(building.position())
        } else {
            ctx.path_distance(from, building.position())
                .unwrap_or_else(|| from.distance(building.position()))
        }
    };
    ctx.enemies()
        .into_iter()
        .filter(|e| e.is_building())
        .map(|e| (distance(&e), e))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, e)| e)
}

impl SquadPolicy for MopUpPolicy {
    fn name(&self) -> &'static str {
        "mop_up"
    }

    fn execute_cluster(
        &self,
        ctx: &TickContext,
        frame: &SquadFrame,
        cluster: &mut Cluster,
        commands: &mut CommandBuffer,
    ) {
        let center = cluster.center();
        let enemies = ctx.enemies_near(center, ctx.config.engage.mop_up_radius);
        if !enemies.is_empty() {
            let members: Vec<UnitId> = cluster.units().iter().copied().collect();
            let targets = select_targets(ctx, &members, &enemies, Some(cluster.vanguard()), center);
            if targets.iter().any(|(_, t)| t.is_some()) {
                cluster.set_activity(Activity::Attacking, ctx.tick);
                attack_micro(ctx, cluster, &targets, Some(center), commands);
                return;
            }
        }

        cluster.set_activity(Activity::Default, ctx.tick);
        let building = ctx
            .view(cluster.vanguard())
            .and_then(|vanguard| nearest_enemy_building(ctx, &vanguard));
        match building {
            Some(building) => {
                trace!(cluster = %cluster.id, building = %building.id(), "mopping up");
                flock(ctx, cluster, Some(building.position()), commands);
            }
            None => flock(ctx, cluster, frame.target_position, commands),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::cluster::SubActivity;
    use crate::core::types::Side;
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

    fn frame(target: Vec2) -> SquadFrame {
        SquadFrame {
            target_position: Some(target),
            ..SquadFrame::default()
        }
    }

    #[test]
    fn test_no_enemies_moves_to_objective() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let target = Vec2::new(1800.0, 400.0);
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(300.0, 400.0)).unwrap();
        let mut cluster = cluster_of(&s, &[a], target);
        let mut commands = CommandBuffer::new();
        AttackPolicy.execute_cluster(&s.context(1), &frame(target), &mut cluster, &mut commands);
        assert_eq!(cluster.activity(), Activity::Default);
        assert_eq!(commands.for_unit(a), Some(Action::move_to(target)));
    }

    #[test]
    fn test_overwhelming_force_attacks() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let target = Vec2::new(1800.0, 400.0);
        let mine: Vec<UnitId> = (0..8)
            .map(|i| s.spawn(roster::LANCER, Side::Mine, Vec2::new(500.0, 300.0 + 30.0 * i as f32)).unwrap())
            .collect();
        let enemy = s.spawn(roster::RIFLEMAN, Side::Enemy, Vec2::new(650.0, 400.0)).unwrap();
        let mut cluster = cluster_of(&s, &mine, target);
        let mut commands = CommandBuffer::new();
        AttackPolicy.execute_cluster(&s.context(1), &frame(target), &mut cluster, &mut commands);
        assert_eq!(cluster.activity(), Activity::Attacking);
        assert!(mine.iter().all(|id| commands.for_unit(*id) == Some(Action::Attack(enemy))));
    }

    #[test]
    fn test_hopeless_fight_regroups_and_flees() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let target = Vec2::new(1800.0, 400.0);
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(500.0, 400.0)).unwrap();
        for i in 0..8 {
            s.spawn(roster::LANCER, Side::Enemy, Vec2::new(650.0, 300.0 + 30.0 * i as f32)).unwrap();
        }
        let mut cluster = cluster_of(&s, &[a], target);
        let mut commands = CommandBuffer::new();
        AttackPolicy.execute_cluster(&s.context(1), &frame(target), &mut cluster, &mut commands);
        assert_eq!(cluster.activity(), Activity::Regrouping);
        assert_eq!(cluster.sub_activity(), SubActivity::Flee);
        let destination = commands.for_unit(a).and_then(|a| a.destination()).unwrap();
        assert!(destination.x < 500.0);
    }

    #[test]
    fn test_defender_holds_instead_of_fleeing() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let post = Vec2::new(500.0, 400.0);
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(520.0, 400.0)).unwrap();
        for i in 0..8 {
            s.spawn(roster::LANCER, Side::Enemy, Vec2::new(700.0, 300.0 + 30.0 * i as f32)).unwrap();
        }
        let mut cluster = cluster_of(&s, &[a], post);
        let mut commands = CommandBuffer::new();
        DefendPolicy::default().execute_cluster(&s.context(1), &frame(post), &mut cluster, &mut commands);
        assert_eq!(cluster.activity(), Activity::Default);
        assert_eq!(commands.for_unit(a), Some(Action::move_to(post)));
    }

    #[test]
    fn test_defender_ignores_enemies_outside_radius() {
        let mut s = Sandbox::new(80, 30).unwrap();
        let post = Vec2::new(300.0, 400.0);
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(320.0, 400.0)).unwrap();
        s.spawn(roster::BRAWLER, Side::Enemy, Vec2::new(1500.0, 400.0)).unwrap();
        let mut cluster = cluster_of(&s, &[a], post);
        let mut commands = CommandBuffer::new();
        let policy = DefendPolicy { radius: Some(400.0) };
        policy.execute_cluster(&s.context(1), &frame(post), &mut cluster, &mut commands);
        assert_eq!(cluster.activity(), Activity::Default);
        assert!(cluster.sim_history.is_empty());
    }

    #[test]
    fn test_mobile_detection_measured_from_vanguard() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(500.0, 400.0)).unwrap();
        let cluster = cluster_of(&s, &[a], Vec2::new(1800.0, 400.0));
        let ctx = s.context(1);
        let near = SquadFrame {
            detectors: vec![Vec2::new(500.0, 800.0)],
            ..SquadFrame::default()
        };
        let edge = SquadFrame {
            detectors: vec![Vec2::new(980.0, 400.0)],
            ..SquadFrame::default()
        };
        assert!(near.has_mobile_detection(&ctx, &cluster));
        assert!(!edge.has_mobile_detection(&ctx, &cluster));
        assert!(!SquadFrame::default().has_mobile_detection(&ctx, &cluster));
    }

    #[test]
    fn test_mop_up_fights_nearby_enemy() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(500.0, 400.0)).unwrap();
        let enemy = s.spawn(roster::BRAWLER, Side::Enemy, Vec2::new(600.0, 400.0)).unwrap();
        s.spawn(roster::BARRACKS, Side::Enemy, Vec2::new(1500.0, 400.0)).unwrap();
        let mut cluster = cluster_of(&s, &[a], Vec2::new(1800.0, 400.0));
        let mut commands = CommandBuffer::new();
        MopUpPolicy.execute_cluster(&s.context(1), &SquadFrame::default(), &mut cluster, &mut commands);
        assert_eq!(cluster.activity(), Activity::Attacking);
        assert_eq!(commands.for_unit(a), Some(Action::Attack(enemy)));
    }

    #[test]
    fn test_mop_up_marches_on_nearest_building() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let target = Vec2::new(1800.0, 400.0);
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(300.0, 400.0)).unwrap();
        s.spawn(roster::NEXUS, Side::Enemy, Vec2::new(1500.0, 400.0)).unwrap();
        let barracks = s.spawn(roster::BARRACKS, Side::Enemy, Vec2::new(900.0, 400.0)).unwrap();
        let barracks_position = s.context(0).view(barracks).unwrap().position();
        let mut cluster = cluster_of(&s, &[a], target);
        let mut commands = CommandBuffer::new();
        MopUpPolicy.execute_cluster(&s.context(1), &frame(target), &mut cluster, &mut commands);
        assert_eq!(cluster.activity(), Activity::Default);
        assert_eq!(commands.for_unit(a), Some(Action::move_to(barracks_position)));
    }

    #[test]
    fn test_mop_up_without_buildings_heads_for_objective() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let target = Vec2::new(1800.0, 400.0);
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(300.0, 400.0)).unwrap();
        let mut cluster = cluster_of(&s, &[a], target);
        let mut commands = CommandBuffer::new();
        MopUpPolicy.execute_cluster(&s.context(1), &frame(target), &mut cluster, &mut commands);
        assert_eq!(commands.for_unit(a), Some(Action::move_to(target)));
    }
}
