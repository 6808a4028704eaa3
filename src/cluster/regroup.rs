//! Regroup controller
//!
//! A regrouping cluster picks one of three behaviours on its first regroup
//! tick and re-checks it every tick after:
//! - contain static defense: fan out just outside the defenses' reach
//! - contain choke: hold the near mouth of a narrow choke
//! - flee: flock back toward home
//!
//! Flee is sticky until the cluster leaves the regroup activity.

use glam::Vec2;
use tracing::debug;

use crate::cluster::cluster::{Cluster, SubActivity};
use crate::cluster::sim_result::CombatSimResult;
use crate::cluster::steering::{compute_position, flock, separation};
use crate::core::config::{RegroupConfig, TacticsConfig};
use crate::core::types::UnitId;
use crate::orders::CommandBuffer;
use crate::spatial::geometry::scale_to;
use crate::world::context::TickContext;
use crate::world::terrain::Choke;
use crate::world::units::UnitView;

/// What a cluster knows about its current fight
#[derive(Debug, Clone)]
pub struct Engagement<'a> {
    /// Enemies relevant to the cluster
    pub enemies: Vec<UnitView<'a>>,
    /// Member and chosen target, in member order
    pub targets: Vec<(UnitId, Option<UnitId>)>,
    pub sim: CombatSimResult,
    /// Sim with enemy static defense left out, when any is present
    pub static_sim: Option<CombatSimResult>,
    pub target_position: Option<Vec2>,
}

impl<'a> Engagement<'a> {
    pub fn has_static_defense(&self) -> bool {
        self.enemies.iter().any(|e| e.is_static_defense())
    }

    /// Enemies without static defense
    pub fn mobile_enemies(&self) -> Vec<UnitView<'a>> {
        self.enemies.iter().filter(|e| !e.is_static_defense()).copied().collect()
    }

    fn target_of(&self, unit: UnitId) -> Option<UnitId> {
        self.targets.iter().find(|(id, _)| *id == unit).and_then(|(_, t)| *t)
    }
}

/// Whether the static-excluded sim is still consulted in this sub-activity
pub fn wants_static_sim(cluster: &Cluster) -> bool {
    matches!(
        cluster.sub_activity(),
        SubActivity::None | SubActivity::ContainStaticDefense
    )
}

/// Hold outside static defense while the fight without it looks fine
pub fn should_contain_static(result: &CombatSimResult, config: &TacticsConfig) -> bool {
    let sim = result.adjust_for_choke(false, &config.combat_sim);
    let r = &config.regroup;
    sim.my_percent_lost() <= r.negligible_loss
        || (sim.value_gain() > 0 && sim.percent_gain() > r.static_gain_floor)
        || sim.percent_gain() > r.static_strong_gain
}

/// Hold a narrow choke, smoothing flee verdicts over the flee window
///
/// Records the verdict in the cluster's regroup history. A single flee
/// verdict with no earlier data withdraws at once; otherwise the hold is
/// only given up after a full window of consecutive flee verdicts.
pub fn should_contain_choke(cluster: &mut Cluster, result: &CombatSimResult, config: &TacticsConfig) -> bool {
    if result.narrow_choke.is_none() {
        return false;
    }
    let sim = result.adjust_for_choke(false, &config.combat_sim);
    let r: &RegroupConfig = &config.regroup;
    let contain = sim.my_percent_lost() <= r.negligible_loss
        || (sim.value_gain() > 0 && sim.percent_gain() > r.choke_gain_floor)
        || sim.percent_gain() > r.choke_fallback_gain;
    cluster.regroup_history.push(sim, contain);

    if contain {
        return true;
    }
    if cluster.regroup_history.len() < 2 {
        return false;
    }
    cluster.regroup_history.trailing_unfavourable() < r.flee_window
}

/// Pick or re-check the regroup behaviour for this tick
pub fn choose_sub_activity(cluster: &mut Cluster, engagement: &Engagement, config: &TacticsConfig) -> SubActivity {
    let static_ok = |e: &Engagement| {
        e.static_sim
            .as_ref()
            .is_some_and(|sim| e.has_static_defense() && should_contain_static(sim, config))
    };
    let next = match cluster.sub_activity() {
        SubActivity::None => {
            if static_ok(engagement) {
                SubActivity::ContainStaticDefense
            } else if should_contain_choke(cluster, &engagement.sim, config) {
                SubActivity::ContainChoke
            } else {
                SubActivity::Flee
            }
        }
        SubActivity::ContainStaticDefense if static_ok(engagement) => SubActivity::ContainStaticDefense,
        SubActivity::ContainChoke if should_contain_choke(cluster, &engagement.sim, config) => {
            SubActivity::ContainChoke
        }
        _ => SubActivity::Flee,
    };
    cluster.set_sub_activity(next);
    next
}

/// Run one regroup tick: choose the behaviour, then issue its orders
pub fn regroup(ctx: &TickContext, cluster: &mut Cluster, engagement: &Engagement, commands: &mut CommandBuffer) {
    let sub_activity = choose_sub_activity(cluster, engagement, ctx.config);
    match (sub_activity, engagement.sim.narrow_choke.as_ref()) {
        (SubActivity::ContainStaticDefense, _) => contain_static_defense(ctx, cluster, engagement, commands),
        (SubActivity::ContainChoke, Some(choke)) => hold_choke(ctx, cluster, choke, engagement, commands),
        _ => flee(ctx, cluster, commands),
    }
}

pub fn flee(ctx: &TickContext, cluster: &Cluster, commands: &mut CommandBuffer) {
    flock(ctx, cluster, Some(ctx.terrain.home_position()), commands);
}

fn ground_range(unit: &UnitView) -> f32 {
    unit.kind.max_ground_range() + unit.state.upgrades.range_bonus
}

/// Which weapon classes are cleared to fire this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HoldFire {
    melee: bool,
    ranged: bool,
}

impl HoldFire {
    const ALL: HoldFire = HoldFire { melee: true, ranged: true };

    fn allows(self, unit: &UnitView) -> bool {
        if unit.is_ranged() {
            self.ranged
        } else {
            self.melee
        }
    }
}

fn hold_fire(
    pairs: &[(UnitView, UnitView)],
    choke: &Choke,
    defend_end: Vec2,
    far_end: Vec2,
    center_dist: f32,
) -> HoldFire {
    let mut fire = HoldFire::default();
    for (unit, target) in pairs {
        let cutoff = (choke.width / 2.0).max(ground_range(unit).min(center_dist));
        if target.position().distance(defend_end) <= cutoff {
            return HoldFire::ALL;
        }

        if unit.is_ranged() {
            if !unit.in_range_of(target, 0.0) || choke.separates(unit.position(), target.position()) {
                continue;
            }
            fire.ranged = true;
            if target.in_range_of(unit, 16.0) {
                return HoldFire::ALL;
            }
            continue;
        }

        if target.is_ranged() {
            let through = choke.center.distance(target.position()) >= center_dist
                && target.position().distance(defend_end) < target.position().distance(far_end);
            if through || target.in_range_of(unit, -16.0) {
                return HoldFire::ALL;
            }
            continue;
        }

        if unit.in_range_of(target, 0.0) {
            return HoldFire::ALL;
        }
    }
    fire
}

/// Reference point and signed distance still to cover for a unit holding a choke
///
/// Positive means move toward the point, negative means back away from it.
fn hold_position(
    unit: &UnitView,
    target: Option<&UnitView>,
    choke: &Choke,
    defend_end: Vec2,
    far_end: Vec2,
    center_dist: f32,
    melee_dist: f32,
) -> (Vec2, f32) {
    let pos = unit.position();
    let defend_end_dist = pos.distance(defend_end);
    let far_end_dist = pos.distance(far_end);
    let to_center = pos.distance(choke.center);
    let wrong_side = far_end_dist < defend_end_dist || to_center < defend_end_dist;

    if unit.is_ranged() {
        let range = ground_range(unit);
        if wrong_side {
            let reference = if defend_end_dist > center_dist.max(32.0) * 2.0 {
                choke.center
            } else {
                defend_end
            };
            return (reference, defend_end_dist);
        }
        if to_center < center_dist || defend_end_dist < 32.0 {
            if to_center > 48.0 {
                return (choke.center, -defend_end_dist - range);
            }
            return (far_end, -defend_end_dist - range - center_dist);
        }
        return (defend_end, defend_end_dist - range);
    }

    if wrong_side {
        return (defend_end, defend_end_dist);
    }
    if let Some(target) = target.filter(|t| t.in_range_of(unit, 48.0)) {
        let reach = ground_range(target);
        return (target.position(), unit.edge_distance(target) - reach - 48.0);
    }
    (choke.center, to_center - melee_dist)
}

/// Melee units hold the line at the defended mouth; ranged units stay in
/// range of it from further back
pub fn hold_choke(
    ctx: &TickContext,
    cluster: &Cluster,
    choke: &Choke,
    engagement: &Engagement,
    commands: &mut CommandBuffer,
) {
    let config = &ctx.config.regroup;
    let defend_end = choke.end_facing(cluster.center());
    let far_end = if defend_end == choke.end1 { choke.end2 } else { choke.end1 };
    let center_dist = choke.center.distance(defend_end);
    // Reach of the enemy frontline
    let frontline_reach = engagement
        .enemies
        .iter()
        .filter(|e| !e.is_building() && e.kind.ground_weapon.is_some())
        .map(ground_range)
        .fold(None, |best: Option<f32>, r| Some(best.map_or(r, |b| b.min(r))))
        .unwrap_or(0.0);
    let melee_dist = (choke.width / 2.0).max(center_dist) + frontline_reach;

    let members = cluster.member_views(ctx);
    let pairs: Vec<(UnitView, UnitView)> = members
        .iter()
        .filter(|u| !u.is_building())
        .filter_map(|u| {
            let target = engagement.target_of(u.id()).and_then(|t| ctx.view(t))?;
            Some((*u, target))
        })
        .collect();
    let fire = hold_fire(&pairs, choke, defend_end, far_end, center_dist);

    let mut movers: Vec<(UnitView, f32, Vec2)> = Vec::new();
    for unit in &members {
        if unit.is_building() {
            continue;
        }
        if unit.state.stuck {
            commands.unstick(unit.id());
            continue;
        }
        if !unit.is_ready(ctx.tick) {
            continue;
        }

        let to_choke = ctx
            .path_distance(unit.position(), choke.center)
            .unwrap_or_else(|| unit.position().distance(choke.center));
        let target = engagement.target_of(unit.id()).and_then(|t| ctx.view(t));

        if let Some(target) = target.as_ref().filter(|_| fire.allows(unit)) {
            if to_choke > config.choke_approach_distance && !unit.in_range_of(target, 0.0) {
                commands.move_unit(unit.id(), choke.center);
            } else {
                commands.attack(unit.id(), target.id());
            }
            continue;
        }
        if to_choke > config.choke_approach_distance {
            commands.move_unit(unit.id(), choke.center);
            continue;
        }

        let (reference, diff) =
            hold_position(unit, target.as_ref(), choke, defend_end, far_end, center_dist, melee_dist);
        movers.push((*unit, diff, reference));
    }

    let grid = ctx.pathing.navigation_grid(choke.center);
    for (unit, diff, reference) in &movers {
        let goal_weight = config.hold_choke_goal_weight;
        let goal = if *diff > 0.0 {
            let step = (reference == &choke.center)
                .then(|| grid.and_then(|g| g.node_at(unit.position()).and_then(|n| Some((n, g.next(&n)?)))))
                .flatten();
            match step {
                Some((node, next)) => scale_to(next.center() - node.center(), goal_weight.min(*diff)),
                None => scale_to(*reference - unit.position(), goal_weight.min(*diff)),
            }
        } else if *diff < 0.0 {
            scale_to(unit.position() - *reference, goal_weight.min(-diff))
        } else {
            Vec2::ZERO
        };

        let others = movers.iter().filter(|(other, other_diff, _)| {
            if other.id() == unit.id() {
                return false;
            }
            // Units already in place are not pushed aside
            if (0.0..5.0).contains(other_diff) {
                return false;
            }
            !(*diff < 0.0 && *other_diff > *diff + 5.0)
        });
        let push = separation(
            unit,
            others.map(|(other, _, _)| other),
            config.hold_choke_separation_factor,
            config.hold_choke_separation_weight,
        );

        let destination = match compute_position(ctx, unit, goal + push, 0.0) {
            Some(pos) => pos,
            None if *diff > 0.0 => *reference,
            None if *diff < 0.0 => ctx.terrain.home_position(),
            None => unit.position(),
        };
        commands.move_unit(unit.id(), destination);
    }
    debug!(cluster = %cluster.id, choke = ?choke.id, ranged = fire.ranged, melee = fire.melee, "holding choke");
}

/// The enemy unit a member should keep away from, and whether it is static
/// defense
fn nearest_threat<'a>(
    unit: &UnitView,
    enemies: &[UnitView<'a>],
    margin: f32,
) -> Option<(UnitView<'a>, bool)> {
    let my_range = ground_range(unit);
    let mut best: Option<(UnitView<'a>, bool, f32)> = None;
    for enemy in enemies {
        if !enemy.state.completed || !enemy.can_attack(unit) {
            continue;
        }
        let Some(reach) = enemy.range_against(unit) else {
            continue;
        };
        let distance = unit.edge_distance(enemy);
        let static_found = best.as_ref().is_some_and(|(_, s, _)| *s);

        if enemy.is_static_defense() {
            if distance > reach + margin {
                continue;
            }
            if !static_found || best.as_ref().is_some_and(|(_, _, d)| distance < *d) {
                best = Some((*enemy, true, distance));
            }
            continue;
        }
        if static_found || reach <= my_range {
            continue;
        }
        if best.as_ref().is_some_and(|(_, _, d)| distance >= *d) {
            continue;
        }
        if distance <= my_range || distance > reach + 2.0 * margin {
            continue;
        }
        best = Some((*enemy, false, distance));
    }
    best.map(|(enemy, is_static, _)| (enemy, is_static))
}

/// Narrow choke around `pos` that static defense covers at one mouth only
fn half_covered_choke<'c>(ctx: &TickContext<'c>, pos: Vec2) -> Option<&'c Choke> {
    let choke = ctx.terrain.narrow_choke_at(pos)?;
    let (a, b) = (
        ctx.enemy_grid.static_ground_threat(choke.end1),
        ctx.enemy_grid.static_ground_threat(choke.end2),
    );
    ((a == 0 && b > 0) || (b == 0 && a > 0)).then_some(choke)
}

/// Fan out just outside the reach of enemy static defense, firing at
/// anything that wanders into range
pub fn contain_static_defense(
    ctx: &TickContext,
    cluster: &Cluster,
    engagement: &Engagement,
    commands: &mut CommandBuffer,
) {
    let config = &ctx.config.regroup;
    let home = ctx.terrain.home_position();
    let Some(target_position) = engagement.target_position else {
        flee(ctx, cluster, commands);
        return;
    };
    let grid = ctx.pathing.navigation_grid(target_position);
    let members = cluster.member_views(ctx);

    let mut ready: Vec<(UnitView, Option<UnitView>, Option<UnitView>)> = Vec::new();
    let mut any_in_static_range = false;
    for unit in &members {
        if unit.is_building() {
            continue;
        }
        if unit.state.stuck {
            commands.unstick(unit.id());
            continue;
        }
        if !unit.is_ready(ctx.tick) {
            continue;
        }
        let threat = nearest_threat(unit, &engagement.enemies, config.static_defense_margin);
        any_in_static_range |= threat.as_ref().is_some_and(|(_, is_static)| *is_static);
        let target = engagement.target_of(unit.id()).and_then(|t| ctx.view(t));
        ready.push((*unit, target, threat.map(|(t, _)| t)));
    }

    for (unit, target, threat) in &ready {
        if let Some(target) = target.as_ref().filter(|t| !any_in_static_range && unit.in_range_of(t, 0.0)) {
            commands.attack(unit.id(), target.id());
            continue;
        }

        let pos = unit.position();
        let mut pulling_back = false;
        let goal = match threat {
            Some(threat) => {
                pulling_back = true;
                scale_to(pos - threat.position(), config.contain_threat_goal_weight)
            }
            None => {
                let inside_choke = half_covered_choke(ctx, pos);
                let nodes = grid.and_then(|g| {
                    let node = g.node_at(pos)?;
                    let next = g.next(&node)?;
                    let second = g.next(&next)?;
                    Some((next.center(), second.center()))
                });
                let (next, second) = nodes.unwrap_or_else(|| {
                    let second = pos + scale_to(target_position - pos, config.contain_goal_weight);
                    ((pos + second) / 2.0, second)
                });
                let blocked = |p: Vec2| {
                    ctx.enemy_grid.static_ground_threat(p) > 0
                        || inside_choke.is_some_and(|c| c.contains(p))
                };
                let length = if blocked(next) {
                    pulling_back = true;
                    -config.contain_goal_weight
                } else if blocked(second) {
                    0.0
                } else {
                    config.contain_goal_weight
                };
                scale_to(second - pos, length)
            }
        };

        let push = if pulling_back {
            Vec2::ZERO
        } else {
            separation(
                unit,
                ready.iter().map(|(other, _, _)| other),
                config.contain_separation_factor,
                config.contain_separation_weight,
            )
        };

        let destination = match compute_position(ctx, unit, goal + push, ctx.config.steering.max_step) {
            None if pulling_back => home,
            None => target_position,
            Some(p) if pulling_back && ctx.enemy_grid.static_ground_threat(p) > 0 => home,
            Some(p) => p,
        };
        commands.move_unit(unit.id(), destination);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::cluster::Activity;
    use crate::core::types::{ChokeId, ClusterId, Side, Tick};
    use crate::orders::Action;
    use crate::spatial::geometry::TilePos;
    use crate::world::sandbox::Sandbox;
    use crate::world::terrain::Terrain;
    use crate::world::unit_type::roster;

    fn choke() -> Choke {
        Choke {
            id: ChokeId(4),
            center: Vec2::new(800.0, 400.0),
            end1: Vec2::new(760.0, 400.0),
            end2: Vec2::new(840.0, 400.0),
            width: 48.0,
            narrow: true,
        }
    }

    fn sim(tick: Tick, final_mine: i32, final_enemy: i32, narrow: bool) -> CombatSimResult {
        CombatSimResult {
            tick,
            my_unit_count: 4,
            enemy_unit_count: 4,
            initial_mine: 1000,
            initial_enemy: 1000,
            final_mine,
            final_enemy,
            narrow_choke: narrow.then(choke),
            ..CombatSimResult::default()
        }
    }

    fn hold(tick: Tick) -> CombatSimResult {
        sim(tick, 900, 800, true)
    }

    fn flee_verdict(tick: Tick) -> CombatSimResult {
        sim(tick, 300, 950, true)
    }

    fn engagement<'a>(result: CombatSimResult) -> Engagement<'a> {
        Engagement {
            enemies: Vec::new(),
            targets: Vec::new(),
            sim: result,
            static_sim: None,
            target_position: Some(Vec2::new(1200.0, 400.0)),
        }
    }

    fn regrouping_cluster(sandbox: &mut Sandbox) -> Cluster {
        let id = sandbox.spawn(roster::LANCER, Side::Mine, Vec2::new(600.0, 400.0)).unwrap();
        let ctx = sandbox.context(0);
        let mut cluster = Cluster::new(ClusterId(1), &ctx.view(id).unwrap(), ctx.config.history_capacity());
        cluster.set_activity(Activity::Regrouping, 0);
        cluster
    }

    #[test]
    fn test_no_choke_means_flee() {
        let mut s = Sandbox::new(50, 30).unwrap();
        let mut cluster = regrouping_cluster(&mut s);
        let config = TacticsConfig::default();
        let next = choose_sub_activity(&mut cluster, &engagement(sim(1, 900, 800, false)), &config);
        assert_eq!(next, SubActivity::Flee);
        assert!(cluster.regroup_history.is_empty());
    }

    #[test]
    fn test_choke_hold_survives_until_full_flee_window() {
        let mut s = Sandbox::new(50, 30).unwrap();
        let mut cluster = regrouping_cluster(&mut s);
        let config = TacticsConfig::default();
        assert_eq!(
            choose_sub_activity(&mut cluster, &engagement(hold(1)), &config),
            SubActivity::ContainChoke
        );
        for i in 1..24 {
            let next = choose_sub_activity(&mut cluster, &engagement(flee_verdict(1 + i)), &config);
            assert_eq!(next, SubActivity::ContainChoke, "fled early after {} verdicts", i);
        }
        let next = choose_sub_activity(&mut cluster, &engagement(flee_verdict(25)), &config);
        assert_eq!(next, SubActivity::Flee);
    }

    #[test]
    fn test_hold_verdict_restarts_flee_count() {
        let mut s = Sandbox::new(50, 30).unwrap();
        let mut cluster = regrouping_cluster(&mut s);
        let config = TacticsConfig::default();
        choose_sub_activity(&mut cluster, &engagement(hold(1)), &config);
        for tick in 2..20 {
            choose_sub_activity(&mut cluster, &engagement(flee_verdict(tick)), &config);
        }
        choose_sub_activity(&mut cluster, &engagement(hold(20)), &config);
        for tick in 21..44 {
            assert_eq!(
                choose_sub_activity(&mut cluster, &engagement(flee_verdict(tick)), &config),
                SubActivity::ContainChoke
            );
        }
        assert_eq!(
            choose_sub_activity(&mut cluster, &engagement(flee_verdict(44)), &config),
            SubActivity::Flee
        );
    }

    #[test]
    fn test_first_flee_verdict_withdraws() {
        let mut s = Sandbox::new(50, 30).unwrap();
        let mut cluster = regrouping_cluster(&mut s);
        let config = TacticsConfig::default();
        assert_eq!(
            choose_sub_activity(&mut cluster, &engagement(flee_verdict(1)), &config),
            SubActivity::Flee
        );
        // Flee sticks while regrouping
        assert_eq!(
            choose_sub_activity(&mut cluster, &engagement(hold(2)), &config),
            SubActivity::Flee
        );
    }

    #[test]
    fn test_static_contain_preferred_when_defense_is_the_problem() {
        let mut s = Sandbox::new(50, 30).unwrap();
        let cannon = s.spawn(roster::CANNON, Side::Enemy, Vec2::new(1100.0, 400.0)).unwrap();
        let mut cluster = regrouping_cluster(&mut s);
        let ctx = s.context(1);
        let config = TacticsConfig::default();
        let mut e = engagement(sim(1, 300, 950, false));
        e.enemies = vec![ctx.view(cannon).unwrap()];
        e.static_sim = Some(sim(1, 1000, 1000, false));
        assert_eq!(
            choose_sub_activity(&mut cluster, &e, &config),
            SubActivity::ContainStaticDefense
        );
        e.static_sim = Some(sim(2, 200, 1000, false));
        assert_eq!(choose_sub_activity(&mut cluster, &e, &config), SubActivity::Flee);
    }

    #[test]
    fn test_flee_heads_home() {
        let mut s = Sandbox::new(50, 30).unwrap();
        let cluster = regrouping_cluster(&mut s);
        let mut commands = CommandBuffer::new();
        flee(&s.context(1), &cluster, &mut commands);
        let home = s.map.home_position();
        assert_eq!(commands.for_unit(cluster.vanguard()), Some(Action::move_to(home)));
    }

    #[test]
    fn test_hold_choke_approaches_from_afar() {
        let mut s = Sandbox::new(50, 30).unwrap();
        let far = s.spawn(roster::BRAWLER, Side::Mine, TilePos::new(5, 12).center()).unwrap();
        let ctx = s.context(1);
        let cluster = Cluster::new(ClusterId(2), &ctx.view(far).unwrap(), 72);
        let mut commands = CommandBuffer::new();
        hold_choke(&ctx, &cluster, &choke(), &engagement(hold(1)), &mut commands);
        assert_eq!(commands.for_unit(far), Some(Action::move_to(choke().center)));
    }

    #[test]
    fn test_hold_choke_fires_when_enemy_reaches_mouth() {
        let mut s = Sandbox::new(50, 30).unwrap();
        let mine = s.spawn(roster::BRAWLER, Side::Mine, Vec2::new(700.0, 400.0)).unwrap();
        let enemy = s.spawn(roster::BRAWLER, Side::Enemy, Vec2::new(765.0, 400.0)).unwrap();
        let ctx = s.context(1);
        let cluster = Cluster::new(ClusterId(3), &ctx.view(mine).unwrap(), 72);
        let mut e = engagement(hold(1));
        e.enemies = vec![ctx.view(enemy).unwrap()];
        e.targets = vec![(mine, Some(enemy))];
        let mut commands = CommandBuffer::new();
        hold_choke(&ctx, &cluster, &choke(), &e, &mut commands);
        assert_eq!(commands.for_unit(mine), Some(Action::Attack(enemy)));
    }

    #[test]
    fn test_hold_choke_melee_waits_behind_mouth() {
        let mut s = Sandbox::new(50, 30).unwrap();
        let mine = s.spawn(roster::BRAWLER, Side::Mine, Vec2::new(600.0, 400.0)).unwrap();
        let enemy = s.spawn(roster::BRAWLER, Side::Enemy, Vec2::new(1000.0, 400.0)).unwrap();
        let ctx = s.context(1);
        let cluster = Cluster::new(ClusterId(3), &ctx.view(mine).unwrap(), 72);
        let mut e = engagement(hold(1));
        e.enemies = vec![ctx.view(enemy).unwrap()];
        e.targets = vec![(mine, Some(enemy))];
        let mut commands = CommandBuffer::new();
        hold_choke(&ctx, &cluster, &choke(), &e, &mut commands);
        let destination = commands.for_unit(mine).and_then(|a| a.destination()).unwrap();
        // Moves up toward the defended mouth without passing it
        assert!(destination.x > 600.0);
        assert!(destination.x < 760.0);
    }

    #[test]
    fn test_contain_static_backs_off_from_cannon() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let cannon = s.spawn(roster::CANNON, Side::Enemy, Vec2::new(1000.0, 400.0)).unwrap();
        let mine = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(800.0, 400.0)).unwrap();
        s.enemy_grid.add_static_ground_threat(Vec2::new(1000.0, 400.0), 256.0, 20);
        let ctx = s.context(1);
        let cluster = Cluster::new(ClusterId(5), &ctx.view(mine).unwrap(), 72);
        let mut e = engagement(sim(1, 1000, 1000, false));
        e.enemies = vec![ctx.view(cannon).unwrap()];
        e.targets = vec![(mine, Some(cannon))];
        e.target_position = Some(Vec2::new(1000.0, 400.0));
        let mut commands = CommandBuffer::new();
        contain_static_defense(&ctx, &cluster, &e, &mut commands);
        let destination = commands.for_unit(mine).and_then(|a| a.destination()).unwrap();
        assert!(destination.x < 800.0);
    }

    #[test]
    fn test_contain_static_advances_when_clear() {
        let mut s = Sandbox::new(60, 30).unwrap();
        let mine = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(400.0, 400.0)).unwrap();
        s.enemy_grid.add_static_ground_threat(Vec2::new(1500.0, 400.0), 256.0, 20);
        let ctx = s.context(1);
        let cluster = Cluster::new(ClusterId(6), &ctx.view(mine).unwrap(), 72);
        let mut e = engagement(sim(1, 1000, 1000, false));
        e.target_position = Some(Vec2::new(1500.0, 400.0));
        let mut commands = CommandBuffer::new();
        contain_static_defense(&ctx, &cluster, &e, &mut commands);
        let destination = commands.for_unit(mine).and_then(|a| a.destination()).unwrap();
        assert!(destination.x > 400.0);
    }
}
