//! Squad: a set of clusters plus the support units travelling with them
//!
//! Per tick the owner calls [`Squad::update_clusters`] and then
//! [`Squad::execute`]. The update runs in a fixed order:
//! 1. forget dead detectors and casters
//! 2. refresh every cluster, deleting empty ones
//! 3. merge clusters that have grown close
//! 4. release stray members and reassign them
//! 5. pick the vanguard cluster

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use ahash::AHashMap;
use glam::Vec2;
use tracing::{debug, warn};

use crate::cluster::cluster::{Activity, Cluster, SubActivity};
use crate::core::config::ClusteringConfig;
use crate::core::error::{Result, TacticsError};
use crate::core::types::{ClusterId, SquadId, UnitId, UnitTypeId};
use crate::orders::CommandBuffer;
use crate::squad::policy::{AttackPolicy, DefendPolicy, MopUpPolicy, SquadFrame, SquadPolicy};
use crate::squad::support;
use crate::world::context::TickContext;
use crate::world::unit_type::UnitTag;
use crate::world::units::UnitView;

#[derive(Debug)]
pub struct Squad {
    pub id: SquadId,
    label: String,
    target_position: Option<Vec2>,
    /// In creation order
    clusters: Vec<Cluster>,
    unit_to_cluster: AHashMap<UnitId, ClusterId>,
    detectors: BTreeSet<UnitId>,
    casters: BTreeSet<UnitId>,
    needs_detection: BTreeSet<UnitId>,
    vanguard_cluster: Option<ClusterId>,
    next_cluster_id: u32,
    /// Refreshed from config on every update
    protected_vanguard_size: usize,
    policy: Box<dyn SquadPolicy>,
}

impl Squad {
    pub fn new(label: impl Into<String>, target_position: Option<Vec2>, policy: Box<dyn SquadPolicy>) -> Self {
        Self {
            id: SquadId::new(),
            label: label.into(),
            target_position,
            clusters: Vec::new(),
            unit_to_cluster: AHashMap::new(),
            detectors: BTreeSet::new(),
            casters: BTreeSet::new(),
            needs_detection: BTreeSet::new(),
            vanguard_cluster: None,
            next_cluster_id: 1,
            protected_vanguard_size: ClusteringConfig::default().protected_vanguard_size,
            policy,
        }
    }

    /// Squad pushing toward an enemy position
    pub fn attack(label: impl Into<String>, target: Vec2) -> Self {
        Self::new(label, Some(target), Box::new(AttackPolicy))
    }

    /// Squad guarding a position
    pub fn defend(label: impl Into<String>, position: Vec2) -> Self {
        Self::new(label, Some(position), Box::new(DefendPolicy::default()))
    }

    /// Squad clearing out enemy buildings, falling back to `target` once none
    /// are known
    pub fn mop_up(label: impl Into<String>, target: Vec2) -> Self {
        Self::new(label, Some(target), Box::new(MopUpPolicy))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn target_position(&self) -> Option<Vec2> {
        self.target_position
    }

    /// Takes effect on the next update
    pub fn set_target_position(&mut self, target: Option<Vec2>) {
        self.target_position = target;
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn detectors(&self) -> &BTreeSet<UnitId> {
        &self.detectors
    }

    pub fn casters(&self) -> &BTreeSet<UnitId> {
        &self.casters
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    pub fn cluster_of(&self, unit: UnitId) -> Option<&Cluster> {
        self.unit_to_cluster.get(&unit).and_then(|id| self.cluster(*id))
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        self.unit_to_cluster.contains_key(&unit) || self.detectors.contains(&unit) || self.casters.contains(&unit)
    }

    /// Track a unit
    ///
    /// Mobile detectors and support casters are kept aside; everything
    /// else joins the best cluster in reach or starts a new one.
    pub fn add_unit(&mut self, ctx: &TickContext, unit: UnitId) -> Result<()> {
        let view = ctx.view(unit).ok_or(TacticsError::UnknownUnit(unit))?;
        if self.contains(unit) {
            return Ok(());
        }
        if view.is_mobile_detector() {
            self.detectors.insert(unit);
            debug!(squad = %self.label, unit = %unit, "detector added");
        } else if view.has(UnitTag::SupportCaster) {
            self.casters.insert(unit);
            debug!(squad = %self.label, unit = %unit, "support caster added");
        } else {
            self.add_to_best_cluster(ctx, &view, None);
        }
        Ok(())
    }

    /// Stop tracking a unit; returns whether it was tracked
    pub fn remove_unit(&mut self, ctx: &TickContext, unit: UnitId) -> bool {
        if self.detectors.remove(&unit) || self.casters.remove(&unit) {
            return true;
        }
        let Some(cluster_id) = self.unit_to_cluster.remove(&unit) else {
            return false;
        };
        let target = self.target_position;
        if let Some(index) = self.index_of(cluster_id) {
            self.clusters[index].remove_unit(unit, ctx, target);
            if self.clusters[index].is_empty() {
                self.delete_cluster(index);
            }
        }
        debug!(squad = %self.label, unit = %unit, "unit removed");
        true
    }

    fn index_of(&self, cluster: ClusterId) -> Option<usize> {
        self.clusters.iter().position(|c| c.id == cluster)
    }

    fn delete_cluster(&mut self, index: usize) {
        let cluster = self.clusters.remove(index);
        debug!(squad = %self.label, cluster = %cluster.id, "cluster deleted");
        if self.vanguard_cluster == Some(cluster.id) {
            self.vanguard_cluster = None;
        }
    }

    /// Join the cluster with the smallest non-positive join gap, or found a
    /// new one; `exclude` is skipped
    fn add_to_best_cluster(&mut self, ctx: &TickContext, unit: &UnitView, exclude: Option<ClusterId>) {
        let config = &ctx.config.clustering;
        let target = self.target_position;
        let best = self
            .clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| Some(c.id) != exclude)
            .map(|(i, c)| (i, c.join_gap(ctx, unit.position(), config)))
            .filter(|(_, gap)| *gap <= 0.0)
            .fold(None, |best: Option<(usize, f32)>, (i, gap)| match best {
                Some((_, best_gap)) if best_gap <= gap => best,
                _ => Some((i, gap)),
            });

        match best {
            Some((index, _)) => {
                let cluster = &mut self.clusters[index];
                cluster.add_unit(unit, ctx, target);
                self.unit_to_cluster.insert(unit.id(), cluster.id);
                debug!(squad = %self.label, unit = %unit.id(), cluster = %cluster.id, "unit joined cluster");
            }
            None => {
                let id = ClusterId(self.next_cluster_id);
                self.next_cluster_id += 1;
                let mut cluster = Cluster::new(id, unit, ctx.config.history_capacity());
                cluster.update_positions(ctx, target);
                self.clusters.push(cluster);
                self.unit_to_cluster.insert(unit.id(), id);
                debug!(squad = %self.label, unit = %unit.id(), cluster = %id, "cluster created");
            }
        }
    }

    /// Per-tick cluster maintenance
    pub fn update_clusters(&mut self, ctx: &TickContext) {
        let target = self.target_position;
        let config = &ctx.config.clustering;
        self.protected_vanguard_size = config.protected_vanguard_size;

        self.detectors.retain(|id| ctx.exists(*id));
        self.casters.retain(|id| ctx.exists(*id));

        for cluster in &mut self.clusters {
            cluster.update_positions(ctx, target);
        }
        let mut index = 0;
        while index < self.clusters.len() {
            if self.clusters[index].is_empty() {
                self.delete_cluster(index);
            } else {
                index += 1;
            }
        }
        self.unit_to_cluster.retain(|unit, _| ctx.exists(*unit));

        // Merge work-list: a cluster that absorbed another is checked again
        let mut pending: VecDeque<ClusterId> = self.clusters.iter().map(|c| c.id).collect();
        while let Some(id) = pending.pop_front() {
            let Some(i) = self.index_of(id) else {
                continue;
            };
            let partner = (0..self.clusters.len())
                .find(|&j| j != i && self.clusters[i].should_merge(&self.clusters[j], config));
            let Some(j) = partner else {
                continue;
            };
            let (keep, absorbed) = if i < j { (i, j) } else { (j, i) };
            let other = self.clusters.remove(absorbed);
            let survivor = self.clusters[keep].id;
            for unit in other.units() {
                self.unit_to_cluster.insert(*unit, survivor);
            }
            if self.vanguard_cluster == Some(other.id) {
                self.vanguard_cluster = None;
            }
            self.clusters[keep].absorb(other, ctx, target);
            pending.push_back(survivor);
        }

        let released: Vec<(UnitId, ClusterId)> = self
            .clusters
            .iter()
            .flat_map(|cluster| {
                cluster
                    .member_views(ctx)
                    .into_iter()
                    .filter(|unit| cluster.should_release(unit, config))
                    .map(|unit| (unit.id(), cluster.id))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (unit, from) in &released {
            if let Some(i) = self.index_of(*from) {
                self.clusters[i].remove_unit(*unit, ctx, target);
            }
            self.unit_to_cluster.remove(unit);
            debug!(squad = %self.label, unit = %unit, cluster = %from, "unit released from cluster");
        }
        let mut index = 0;
        while index < self.clusters.len() {
            if self.clusters[index].is_empty() {
                self.delete_cluster(index);
            } else {
                index += 1;
            }
        }
        for (unit, from) in released {
            if let Some(view) = ctx.view(unit) {
                self.add_to_best_cluster(ctx, &view, Some(from));
            }
        }

        self.vanguard_cluster = self.find_vanguard_cluster(ctx);
    }

    fn find_vanguard_cluster(&self, ctx: &TickContext) -> Option<ClusterId> {
        let by_path = self
            .clusters
            .iter()
            .filter_map(|c| c.vanguard_distance().map(|d| (c.id, d)))
            .fold(None, |best: Option<(ClusterId, f32)>, (id, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((id, d)),
            });
        if let Some((id, _)) = by_path {
            return Some(id);
        }
        let target = self.target_position?;
        self.clusters
            .iter()
            .filter_map(|c| ctx.view(c.vanguard()).map(|v| (c.id, v.position().distance(target))))
            .fold(None, |best: Option<(ClusterId, f32)>, (id, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((id, d)),
            })
            .map(|(id, _)| id)
    }

    /// Refresh the set of enemies near our clusters that we cannot see
    pub fn update_detection_needs(&mut self, ctx: &TickContext) {
        let radius = ctx.config.clustering.enemy_scan_radius;
        self.needs_detection = ctx
            .enemies()
            .into_iter()
            .filter(|e| e.state.undetected)
            .filter(|e| {
                self.clusters
                    .iter()
                    .any(|c| e.position().distance(c.center()) <= radius + c.ball_radius())
            })
            .map(|e| e.id())
            .collect();
    }

    /// Issue this tick's orders for every cluster and support unit
    pub fn execute(&mut self, ctx: &TickContext, commands: &mut CommandBuffer) {
        if self.target_position.is_none() {
            warn!(squad = %self.label, "squad executing without a target position");
        }
        self.update_detection_needs(ctx);
        let frame = SquadFrame {
            target_position: self.target_position,
            vanguard_cluster: self.vanguard_cluster,
            vanguard_center: self.vanguard_cluster().map(Cluster::center),
            detectors: self.detectors.iter().filter_map(|id| ctx.view(*id)).map(|d| d.position()).collect(),
        };
        for cluster in &mut self.clusters {
            self.policy.execute_cluster(ctx, &frame, cluster, commands);
        }

        let needing: Vec<UnitView> = self.needs_detection.iter().filter_map(|id| ctx.view(*id)).collect();
        let vanguard = self.vanguard_unit(ctx).map(|v| v.position());
        support::execute_detectors(ctx, self.detectors.iter().copied(), &needing, vanguard, commands);

        let anchor = self.vanguard_cluster().and_then(|cluster| {
            cluster
                .member_views(ctx)
                .into_iter()
                .min_by(|a, b| {
                    a.position()
                        .distance(cluster.center())
                        .total_cmp(&b.position().distance(cluster.center()))
                })
                .map(|unit| unit.position())
        });
        support::execute_casters(ctx, self.casters.iter().copied(), anchor, commands);
    }

    pub fn vanguard_cluster(&self) -> Option<&Cluster> {
        self.vanguard_cluster.and_then(|id| self.cluster(id))
    }

    /// Frontmost unit of the squad
    pub fn vanguard_unit<'a>(&self, ctx: &TickContext<'a>) -> Option<UnitView<'a>> {
        self.vanguard_cluster().and_then(|c| ctx.view(c.vanguard()))
    }

    /// Whether `unit` may be handed to another squad
    ///
    /// Members of a small vanguard cluster that is fighting or withdrawing
    /// stay put.
    pub fn can_reassign_from_vanguard_cluster(&self, unit: UnitId) -> bool {
        let Some(cluster) = self.vanguard_cluster() else {
            return true;
        };
        if !cluster.contains(unit) || cluster.len() > self.protected_vanguard_size {
            return true;
        }
        match cluster.activity() {
            Activity::Attacking => false,
            Activity::Regrouping => cluster.sub_activity() != SubActivity::Flee,
            Activity::Default => true,
        }
    }

    /// The squad wants a detector escort
    pub fn needs_detection(&self) -> bool {
        !self.needs_detection.is_empty()
    }

    pub fn enemies_needing_detection(&self) -> &BTreeSet<UnitId> {
        &self.needs_detection
    }

    /// Nothing needs revealing, or a detector escorts the vanguard, or our
    /// detection already covers an enemy that needs it
    pub fn has_detection(&self, ctx: &TickContext) -> bool {
        if self.needs_detection.is_empty() {
            return true;
        }
        let radius = ctx.config.clustering.detector_escort_radius;
        if let Some(vanguard) = self.vanguard_unit(ctx) {
            let escorted = self
                .detectors
                .iter()
                .filter_map(|id| ctx.view(*id))
                .any(|d| d.position().distance(vanguard.position()) <= radius);
            if escorted {
                return true;
            }
        }
        self.needs_detection
            .iter()
            .filter_map(|id| ctx.view(*id))
            .any(|e| ctx.my_grid.detection(e.position()) > 0)
    }

    /// Every tracked unit, in id order
    pub fn get_units(&self) -> Vec<UnitId> {
        let mut units: Vec<UnitId> = self
            .unit_to_cluster
            .keys()
            .chain(self.detectors.iter())
            .chain(self.casters.iter())
            .copied()
            .collect();
        units.sort();
        units
    }

    /// Clustered units, not counting detectors and casters
    pub fn combat_unit_count(&self) -> usize {
        self.unit_to_cluster.len()
    }

    pub fn unit_count_by_type(&self, ctx: &TickContext) -> BTreeMap<UnitTypeId, usize> {
        let mut counts = BTreeMap::new();
        for unit in self.get_units() {
            if let Some(state) = ctx.units.get(unit) {
                *counts.entry(state.type_id).or_insert(0) += 1;
            }
        }
        counts
    }
}
