//! A spatially coherent group of combat units
//!
//! The centroid is kept as a running average while units join and leave;
//! `update_positions` rebuilds every derived value (centroid, radii,
//! vanguard, progress) from current membership so nothing goes stale.

use std::collections::{BTreeSet, VecDeque};
use std::f32::consts::PI;

use ahash::AHashMap;
use glam::Vec2;
use serde::Serialize;
use tracing::debug;

use crate::cluster::sim_result::CombatSimResult;
use crate::core::config::ClusteringConfig;
use crate::core::types::{ClusterId, Tick, UnitId};
use crate::world::context::TickContext;
use crate::world::units::UnitView;

/// What a cluster is doing this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Activity {
    /// Moving toward the objective with nothing to fight
    #[default]
    Default,
    Attacking,
    Regrouping,
}

impl Activity {
    pub fn name(self) -> &'static str {
        match self {
            Activity::Default => "Default",
            Activity::Attacking => "Attacking",
            Activity::Regrouping => "Regrouping",
        }
    }
}

/// Regrouping flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SubActivity {
    #[default]
    None,
    ContainStaticDefense,
    ContainChoke,
    Flee,
}

impl SubActivity {
    pub fn name(self) -> &'static str {
        match self {
            SubActivity::None => "None",
            SubActivity::ContainStaticDefense => "ContainStaticDefense",
            SubActivity::ContainChoke => "ContainChoke",
            SubActivity::Flee => "Flee",
        }
    }
}

/// One combat-sim verdict: the (adjusted) result and whether it favoured
/// fighting
#[derive(Debug, Clone)]
pub struct Verdict {
    pub result: CombatSimResult,
    pub favourable: bool,
}

/// Rolling, tick-contiguous record of recent verdicts
///
/// A gap of one or more ticks since the last entry clears the record, so
/// streaks always describe consecutive ticks.
#[derive(Debug, Clone)]
pub struct VerdictHistory {
    entries: VecDeque<Verdict>,
    capacity: usize,
}

impl VerdictHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(2),
        }
    }

    pub fn push(&mut self, result: CombatSimResult, favourable: bool) {
        if let Some(last) = self.entries.back() {
            if last.result.tick + 1 != result.tick {
                self.entries.clear();
            }
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Verdict { result, favourable });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn latest(&self) -> Option<&Verdict> {
        self.entries.back()
    }

    /// The verdict before the latest one
    pub fn previous(&self) -> Option<&Verdict> {
        self.entries.iter().rev().nth(1)
    }

    /// Most recent first
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &Verdict> {
        self.entries.iter().rev().take(limit)
    }

    /// Length of the run of identical verdicts ending at the latest entry,
    /// plus favourable and unfavourable counts within the last `limit`
    pub fn streak(&self, limit: usize) -> (usize, usize, usize) {
        let Some(latest) = self.entries.back() else {
            return (0, 0, 0);
        };
        let mut consecutive = 0;
        let mut in_run = true;
        let (mut yes, mut no) = (0, 0);
        for verdict in self.recent(limit) {
            if in_run && verdict.favourable == latest.favourable {
                consecutive += 1;
            } else {
                in_run = false;
            }
            if verdict.favourable {
                yes += 1;
            } else {
                no += 1;
            }
        }
        (consecutive, yes, no)
    }

    /// Number of trailing unfavourable verdicts
    pub fn trailing_unfavourable(&self) -> usize {
        self.entries.iter().rev().take_while(|v| !v.favourable).count()
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: ClusterId,
    units: BTreeSet<UnitId>,
    center: Vec2,
    vanguard: UnitId,
    vanguard_distance: Option<f32>,
    /// Fraction of the home-to-objective route the vanguard has covered
    progress: f32,
    area: f32,
    total_width: f32,
    ball_radius: f32,
    line_radius: f32,
    /// Path distance of each member to the objective at the last update
    distances: AHashMap<UnitId, Option<f32>>,
    activity: Activity,
    sub_activity: SubActivity,
    last_activity_change: Tick,
    pub sim_history: VerdictHistory,
    pub regroup_history: VerdictHistory,
}

impl Cluster {
    /// New single-unit cluster
    pub fn new(id: ClusterId, unit: &UnitView, history_capacity: usize) -> Self {
        let footprint = unit.footprint();
        let mut distances = AHashMap::new();
        distances.insert(unit.id(), None);
        Self {
            id,
            units: BTreeSet::from([unit.id()]),
            center: unit.position(),
            vanguard: unit.id(),
            vanguard_distance: None,
            progress: 0.5,
            area: footprint.x * footprint.y,
            total_width: footprint.x,
            ball_radius: 0.0,
            line_radius: 0.0,
            distances,
            activity: Activity::Default,
            sub_activity: SubActivity::None,
            last_activity_change: 0,
            sim_history: VerdictHistory::new(history_capacity),
            regroup_history: VerdictHistory::new(history_capacity),
        }
    }

    pub fn units(&self) -> &BTreeSet<UnitId> {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        self.units.contains(&unit)
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn vanguard(&self) -> UnitId {
        self.vanguard
    }

    /// Vanguard's path distance to the objective, when known
    pub fn vanguard_distance(&self) -> Option<f32> {
        self.vanguard_distance
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn area(&self) -> f32 {
        self.area
    }

    pub fn ball_radius(&self) -> f32 {
        self.ball_radius
    }

    pub fn line_radius(&self) -> f32 {
        self.line_radius
    }

    pub fn member_distance(&self, unit: UnitId) -> Option<f32> {
        self.distances.get(&unit).copied().flatten()
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn sub_activity(&self) -> SubActivity {
        self.sub_activity
    }

    pub fn activity_name(&self) -> &'static str {
        self.activity.name()
    }

    pub fn sub_activity_name(&self) -> &'static str {
        self.sub_activity.name()
    }

    pub fn last_activity_change(&self) -> Tick {
        self.last_activity_change
    }

    /// Switch activity; a change resets the sub-activity
    pub fn set_activity(&mut self, activity: Activity, tick: Tick) {
        if self.activity == activity {
            return;
        }
        debug!(cluster = %self.id, from = self.activity.name(), to = activity.name(), "activity changed");
        self.activity = activity;
        self.sub_activity = SubActivity::None;
        self.last_activity_change = tick;
    }

    pub fn set_sub_activity(&mut self, sub_activity: SubActivity) {
        if self.sub_activity == sub_activity {
            return;
        }
        debug!(
            cluster = %self.id,
            from = self.sub_activity.name(),
            to = sub_activity.name(),
            "sub-activity changed"
        );
        self.sub_activity = sub_activity;
    }

    /// Add a unit, nudging the centroid
    pub fn add_unit(&mut self, unit: &UnitView, ctx: &TickContext, target: Option<Vec2>) {
        if !self.units.insert(unit.id()) {
            return;
        }
        let n = self.units.len() as f32;
        self.center = (self.center * (n - 1.0) + unit.position()) / n;
        let footprint = unit.footprint();
        self.area += footprint.x * footprint.y;
        self.total_width += footprint.x;
        self.distances
            .insert(unit.id(), target.and_then(|t| ctx.path_distance(unit.position(), t)));
        self.update_radii();
    }

    /// Remove a unit
    ///
    /// Losing the vanguard triggers a full position update; otherwise the
    /// centroid is adjusted in place. Returns false if the unit was not a
    /// member.
    pub fn remove_unit(&mut self, unit: UnitId, ctx: &TickContext, target: Option<Vec2>) -> bool {
        if !self.units.remove(&unit) {
            return false;
        }
        self.distances.remove(&unit);
        if self.units.is_empty() {
            return true;
        }
        let view = ctx.units.get(unit).and_then(|s| ctx.catalog.get(s.type_id).map(|k| (s, k)));
        match view {
            Some((state, kind)) if unit != self.vanguard => {
                let n = self.units.len() as f32;
                self.center = (self.center * (n + 1.0) - state.position) / n;
                self.area -= kind.width * kind.height;
                self.total_width -= kind.width;
                self.update_radii();
            }
            _ => self.update_positions(ctx, target),
        }
        true
    }

    /// Take over every member of `other`
    pub fn absorb(&mut self, other: Cluster, ctx: &TickContext, target: Option<Vec2>) {
        debug!(into = %self.id, from = %other.id, units = other.len(), "clusters merged");
        self.units.extend(other.units);
        self.update_positions(ctx, target);
    }

    /// Drop dead members and rebuild centroid, radii, vanguard, and progress
    pub fn update_positions(&mut self, ctx: &TickContext, target: Option<Vec2>) {
        let members: Vec<UnitView> = self.units.iter().filter_map(|id| ctx.view(*id)).collect();
        if members.len() != self.units.len() {
            let dead = self.units.len() - members.len();
            debug!(cluster = %self.id, dead, "dropped dead members");
            self.units = members.iter().map(|v| v.id()).collect();
        }
        self.distances.clear();
        if members.is_empty() {
            self.area = 0.0;
            self.total_width = 0.0;
            self.update_radii();
            return;
        }

        let mut sum = Vec2::ZERO;
        self.area = 0.0;
        self.total_width = 0.0;
        let mut ground: Option<(UnitId, f32)> = None;
        let mut flying: Option<(UnitId, f32)> = None;
        for unit in &members {
            sum += unit.position();
            let footprint = unit.footprint();
            self.area += footprint.x * footprint.y;
            self.total_width += footprint.x;

            let Some(target) = target else {
                self.distances.insert(unit.id(), None);
                continue;
            };
            if unit.is_flyer() {
                let distance = unit.position().distance(target);
                self.distances.insert(unit.id(), Some(distance));
                if flying.map_or(true, |(_, best)| distance < best) {
                    flying = Some((unit.id(), distance));
                }
                continue;
            }
            let distance = ctx.path_distance(unit.position(), target);
            self.distances.insert(unit.id(), distance);
            if let Some(distance) = distance {
                if ground.map_or(true, |(_, best)| distance < best) {
                    ground = Some((unit.id(), distance));
                }
            }
        }
        self.center = sum / members.len() as f32;
        self.update_radii();

        let (vanguard, distance) = match ground.or(flying) {
            Some((id, d)) => (id, Some(d)),
            None => (members[0].id(), None),
        };
        if vanguard != self.vanguard {
            debug!(cluster = %self.id, vanguard = %vanguard, "vanguard changed");
        }
        self.vanguard = vanguard;
        self.vanguard_distance = distance;
        self.progress = self.compute_progress(ctx, target);
    }

    fn compute_progress(&self, ctx: &TickContext, target: Option<Vec2>) -> f32 {
        let (Some(target), Some(vanguard)) = (target, ctx.view(self.vanguard)) else {
            return 0.5;
        };
        let home = ctx.terrain.home_position();
        let to_target = self
            .vanguard_distance
            .unwrap_or_else(|| vanguard.position().distance(target));
        let from_home = if vanguard.is_flyer() {
            vanguard.position().distance(home)
        } else {
            ctx.path_distance(vanguard.position(), home)
                .unwrap_or_else(|| vanguard.position().distance(home))
        };
        if to_target + from_home > 0.0 {
            from_home / (from_home + to_target)
        } else {
            0.5
        }
    }

    fn update_radii(&mut self) {
        let n = self.units.len();
        if n <= 1 {
            self.ball_radius = 0.0;
            self.line_radius = 0.0;
            return;
        }
        let mean_area = self.area / n as f32;
        self.ball_radius = ((self.area / PI).sqrt() - (mean_area / PI).sqrt()).max(0.0);
        let mean_width = self.total_width / n as f32;
        self.line_radius = ((self.total_width - mean_width) / 2.0).max(0.0);
    }

    /// How far `position` is outside this cluster's joining range
    ///
    /// Non-positive values mean a unit there may join.
    pub fn join_gap(&self, ctx: &TickContext, position: Vec2, config: &ClusteringConfig) -> f32 {
        let anchor = ctx.view(self.vanguard).map_or(self.center, |v| v.position());
        position.distance(anchor) - self.ball_radius - config.add_distance
    }

    /// A member has strayed far enough to be released
    ///
    /// Beyond the ball threshold a unit is only kept while it is plausibly
    /// taking a longer route: it has path data, is within the line
    /// threshold, and its path distance tracks the vanguard's.
    pub fn should_release(&self, unit: &UnitView, config: &ClusteringConfig) -> bool {
        let distance = unit.position().distance(self.center);
        if distance - self.ball_radius <= config.remove_distance {
            return false;
        }
        let Some(unit_distance) = self.member_distance(unit.id()) else {
            return true;
        };
        if distance - self.line_radius > config.remove_distance {
            return true;
        }
        match self.vanguard_distance {
            Some(vanguard_distance) => (unit_distance - vanguard_distance).abs() > config.path_divergence,
            None => true,
        }
    }

    /// Whether `self` and `other` are close enough to merge
    pub fn should_merge(&self, other: &Cluster, config: &ClusteringConfig) -> bool {
        let distance = self.center.distance(other.center);
        if distance - self.ball_radius - other.ball_radius <= config.combine_distance {
            return true;
        }
        distance - self.line_radius - other.line_radius <= config.combine_distance
            && (self.progress - other.progress).abs() < config.arc_progress_tolerance
    }

    /// Members joined with their types, in id order
    pub fn member_views<'a>(&self, ctx: &TickContext<'a>) -> Vec<UnitView<'a>> {
        self.units.iter().filter_map(|id| ctx.view(*id)).collect()
    }

    #[cfg(test)]
    pub(crate) fn set_geometry(&mut self, center: Vec2, ball_radius: f32, line_radius: f32, progress: f32) {
        self.center = center;
        self.ball_radius = ball_radius;
        self.line_radius = line_radius;
        self.progress = progress;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Side;
    use crate::world::sandbox::Sandbox;
    use crate::world::unit_type::roster;

    fn sandbox() -> Sandbox {
        Sandbox::new(100, 100).unwrap()
    }

    fn result_at(tick: Tick) -> CombatSimResult {
        CombatSimResult::empty(tick)
    }

    #[test]
    fn test_single_unit_cluster() {
        let mut s = sandbox();
        let id = s.spawn(roster::LANCER, Side::Mine, Vec2::new(500.0, 500.0)).unwrap();
        let ctx = s.context(0);
        let mut cluster = Cluster::new(ClusterId(1), &ctx.view(id).unwrap(), 72);
        cluster.update_positions(&ctx, Some(Vec2::new(2500.0, 500.0)));
        assert_eq!(cluster.ball_radius(), 0.0);
        assert_eq!(cluster.line_radius(), 0.0);
        assert_eq!(cluster.vanguard(), id);
        assert_eq!(cluster.center(), Vec2::new(500.0, 500.0));
        assert!(cluster.vanguard_distance().is_some());
    }

    #[test]
    fn test_running_centroid_matches_full_update() {
        let mut s = sandbox();
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(400.0, 400.0)).unwrap();
        let b = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(500.0, 400.0)).unwrap();
        let c = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(450.0, 520.0)).unwrap();
        let ctx = s.context(0);
        let target = Some(Vec2::new(2000.0, 400.0));
        let mut cluster = Cluster::new(ClusterId(1), &ctx.view(a).unwrap(), 72);
        cluster.add_unit(&ctx.view(b).unwrap(), &ctx, target);
        cluster.add_unit(&ctx.view(c).unwrap(), &ctx, target);
        let running = cluster.center();
        cluster.update_positions(&ctx, target);
        assert!(running.distance(cluster.center()) < 1e-3);
        // b is closest to the target
        assert_eq!(cluster.vanguard(), b);

        cluster.remove_unit(c, &ctx, target);
        assert!(cluster.center().distance(Vec2::new(450.0, 400.0)) < 1e-3);
        cluster.remove_unit(b, &ctx, target);
        assert_eq!(cluster.vanguard(), a);
        assert_eq!(cluster.ball_radius(), 0.0);
    }

    #[test]
    fn test_radii_grow_with_members() {
        let mut s = sandbox();
        let ids: Vec<UnitId> = (0..4)
            .map(|i| s.spawn(roster::LANCER, Side::Mine, Vec2::new(400.0 + 32.0 * i as f32, 400.0)).unwrap())
            .collect();
        let ctx = s.context(0);
        let mut cluster = Cluster::new(ClusterId(1), &ctx.view(ids[0]).unwrap(), 72);
        for id in &ids[1..] {
            cluster.add_unit(&ctx.view(*id).unwrap(), &ctx, None);
        }
        // Four 32x32 units: line of 128 wide spans 48 to the outermost center
        assert!((cluster.line_radius() - 48.0).abs() < 1e-3);
        let expected_ball = ((4.0 * 1024.0) / PI).sqrt() - (1024.0 / PI).sqrt();
        assert!((cluster.ball_radius() - expected_ball).abs() < 1e-3);
    }

    #[test]
    fn test_dead_members_dropped() {
        let mut s = sandbox();
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(400.0, 400.0)).unwrap();
        let b = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(420.0, 400.0)).unwrap();
        let mut cluster = {
            let ctx = s.context(0);
            let mut cluster = Cluster::new(ClusterId(1), &ctx.view(a).unwrap(), 72);
            cluster.add_unit(&ctx.view(b).unwrap(), &ctx, None);
            cluster
        };
        s.kill(a);
        let ctx = s.context(1);
        cluster.update_positions(&ctx, Some(Vec2::new(2000.0, 400.0)));
        assert_eq!(cluster.len(), 1);
        assert_eq!(cluster.vanguard(), b);
        s.kill(b);
        let ctx = s.context(2);
        cluster.update_positions(&ctx, None);
        assert!(cluster.is_empty());
    }

    #[test]
    fn test_release_rules() {
        let mut s = sandbox();
        let anchor = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(400.0, 400.0)).unwrap();
        let far = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::new(400.0, 1300.0)).unwrap();
        let config = ClusteringConfig::default();
        let ctx = s.context(0);
        let mut cluster = Cluster::new(ClusterId(1), &ctx.view(anchor).unwrap(), 72);
        cluster.add_unit(&ctx.view(far).unwrap(), &ctx, None);
        cluster.update_positions(&ctx, None);
        cluster.set_geometry(Vec2::new(400.0, 400.0), 0.0, 0.0, 0.5);
        // Without path data the straggler goes
        assert!(cluster.should_release(&ctx.view(far).unwrap(), &config));
        assert!(!cluster.should_release(&ctx.view(anchor).unwrap(), &config));
    }

    #[test]
    fn test_merge_conditions() {
        let mut s = sandbox();
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::ZERO).unwrap();
        let b = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::ZERO).unwrap();
        let ctx = s.context(0);
        let config = ClusteringConfig::default();
        let mut first = Cluster::new(ClusterId(1), &ctx.view(a).unwrap(), 72);
        let mut second = Cluster::new(ClusterId(2), &ctx.view(b).unwrap(), 72);
        first.set_geometry(Vec2::ZERO, 50.0, 0.0, 0.2);
        second.set_geometry(Vec2::new(400.0, 0.0), 50.0, 0.0, 0.9);
        assert!(first.should_merge(&second, &config));
        second.set_geometry(Vec2::new(700.0, 0.0), 50.0, 0.0, 0.9);
        assert!(!first.should_merge(&second, &config));
        // Arc formation: long lines at the same progress
        first.set_geometry(Vec2::ZERO, 50.0, 150.0, 0.40);
        second.set_geometry(Vec2::new(700.0, 0.0), 50.0, 150.0, 0.42);
        assert!(first.should_merge(&second, &config));
        second.set_geometry(Vec2::new(700.0, 0.0), 50.0, 150.0, 0.50);
        assert!(!first.should_merge(&second, &config));
    }

    #[test]
    fn test_history_resets_on_gap() {
        let mut history = VerdictHistory::new(72);
        history.push(result_at(1), true);
        history.push(result_at(2), false);
        assert_eq!(history.len(), 2);
        history.push(result_at(4), false);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_history_streaks() {
        let mut history = VerdictHistory::new(72);
        for tick in 1..=5 {
            history.push(result_at(tick), true);
        }
        for tick in 6..=8 {
            history.push(result_at(tick), false);
        }
        assert_eq!(history.streak(48), (3, 5, 3));
        assert_eq!(history.trailing_unfavourable(), 3);
        assert_eq!(history.previous().map(|v| v.result.tick), Some(7));
    }

    #[test]
    fn test_history_capacity_bounded() {
        let mut history = VerdictHistory::new(4);
        for tick in 1..=10 {
            history.push(result_at(tick), false);
        }
        assert_eq!(history.len(), 4);
        assert_eq!(history.trailing_unfavourable(), 4);
    }

    #[test]
    fn test_activity_change_resets_sub_activity() {
        let mut s = sandbox();
        let a = s.spawn(roster::RIFLEMAN, Side::Mine, Vec2::ZERO).unwrap();
        let ctx = s.context(0);
        let mut cluster = Cluster::new(ClusterId(1), &ctx.view(a).unwrap(), 72);
        cluster.set_activity(Activity::Regrouping, 5);
        cluster.set_sub_activity(SubActivity::Flee);
        cluster.set_activity(Activity::Regrouping, 6);
        assert_eq!(cluster.sub_activity(), SubActivity::Flee);
        assert_eq!(cluster.last_activity_change(), 5);
        cluster.set_activity(Activity::Attacking, 7);
        assert_eq!(cluster.sub_activity(), SubActivity::None);
        assert_eq!(cluster.activity_name(), "Attacking");
    }
}
