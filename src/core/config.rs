//! Tactics configuration with documented constants
//!
//! All magic numbers are collected here with explanations of their purpose
//! and how they interact with each other. Every section deserializes with
//! `#[serde(default)]`, so a partial TOML file only overrides what it names.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cluster::targeting::PriorityTable;
use crate::core::error::{Result, TacticsError};

/// Configuration for every tactical system
///
/// These values have been tuned against live play. Changing them shifts
/// how eagerly squads split, fight, and withdraw.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    pub clustering: ClusteringConfig,
    pub combat_sim: CombatSimConfig,
    pub targeting: TargetingConfig,
    pub steering: SteeringConfig,
    pub formation: FormationConfig,
    pub regroup: RegroupConfig,
    pub engage: EngageConfig,
    pub support: SupportConfig,
}

/// Cluster membership and merge thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// A unit joins a cluster when its distance to the cluster's vanguard,
    /// less the cluster's ball radius, is at most this (world units)
    pub add_distance: f32,

    /// A member is evaluated for removal once its distance to the cluster
    /// center, less the ball radius, exceeds this
    ///
    /// Must be larger than `add_distance`, otherwise units oscillate
    /// between joining and leaving on consecutive updates.
    pub remove_distance: f32,

    /// A distant member is removed if its path distance to the target
    /// differs from the vanguard's by more than this
    pub path_divergence: f32,

    /// Two clusters merge when the gap between their balls (or lines) is at
    /// most this
    pub combine_distance: f32,

    /// Line-shaped clusters only merge when their fractional progress
    /// toward the objective differs by less than this
    pub arc_progress_tolerance: f32,

    /// The vanguard cluster only releases units to other squads when it has
    /// more members than this, unless it is idle
    pub protected_vanguard_size: usize,

    /// A detector this close to the vanguard counts as escorting it
    pub detector_escort_radius: f32,

    /// Radius around a cluster's center (plus its vanguard offset) in which
    /// enemies are considered relevant to the cluster
    pub enemy_scan_radius: f32,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            add_distance: 480.0,
            remove_distance: 600.0,
            path_divergence: 480.0,
            combine_distance: 480.0,
            arc_progress_tolerance: 0.05,
            protected_vanguard_size: 20,
            detector_escort_radius: 120.0,
            enemy_scan_radius: 640.0,
        }
    }
}

/// Forward combat simulation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatSimConfig {
    /// Number of ticks simulated (about six seconds of game time)
    pub horizon_ticks: u32,

    /// Enemy workers only count as combatants if seen attacking fewer than
    /// this many ticks ago
    pub worker_attack_memory: u64,

    /// Own detectors closer than this to a cluster's vanguard reveal
    /// cloaked enemies in that cluster's simulation
    pub mobile_detection_radius: f32,

    /// Ground units inside a narrow choke move at this fraction of their speed
    pub choke_speed_factor: f32,

    /// Fraction of simulated enemy losses kept when attacking through a
    /// narrow choke
    pub choke_attack_factor: f32,

    /// Fraction of simulated own losses kept when holding higher ground
    pub high_ground_loss_factor: f32,

    /// Fraction of simulated enemy losses kept when attacking from lower ground
    pub low_ground_damage_factor: f32,
}

impl Default for CombatSimConfig {
    fn default() -> Self {
        Self {
            horizon_ticks: 144,
            worker_attack_memory: 120,
            mobile_detection_radius: 480.0,
            choke_speed_factor: 0.5,
            choke_attack_factor: 0.8,
            high_ground_loss_factor: 0.75,
            low_ground_damage_factor: 0.75,
        }
    }
}

/// Target scoring parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    /// Score per priority level for melee attackers (two tiles)
    pub melee_priority_weight: i32,

    /// Score per priority level for ranged attackers (five tiles)
    pub ranged_priority_weight: i32,

    /// Melee attackers ignore targets farther than this
    pub melee_consideration_range: f32,

    /// Ranged attackers ignore targets this far or farther (thirteen tiles)
    pub ranged_consideration_range: f32,

    /// Enemies whose path distance to the objective differs from the
    /// vanguard's by more than this are treated as being across a cliff
    pub cliff_path_divergence: f32,

    /// When attacking an enemy base from farther than this, outlying
    /// non-defensive buildings are ignored
    pub outlying_building_distance: f32,

    pub melee: PriorityTable,
    pub ranged: PriorityTable,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            melee_priority_weight: 64,
            ranged_priority_weight: 160,
            melee_consideration_range: 640.0,
            ranged_consideration_range: 416.0,
            cliff_path_divergence: 700.0,
            outlying_building_distance: 200.0,
            melee: PriorityTable::melee(),
            ranged: PriorityTable::ranged(),
        }
    }
}

/// Flocking weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Length of the goal vector toward the look-ahead node
    pub goal_weight: f32,

    /// Base cohesion weight, scaled by pi over the square root of the
    /// cluster footprint area
    pub cohesion_weight: f32,

    /// Separation only considers neighbours closer than the larger unit
    /// width times this factor
    pub separation_detection_factor: f32,

    pub separation_weight: f32,

    /// Upper bound on the length of the summed steering vector
    pub max_step: f32,

    /// Number of navigation-grid hops to look ahead for the goal
    pub look_ahead_hops: usize,

    /// A look-ahead node this much costlier than the cluster center's node
    /// means the center is over a cliff, so cohesion is dropped
    pub cliff_cost_threshold: u32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            goal_weight: 128.0,
            cohesion_weight: 64.0 / 5.0_f32.sqrt(),
            separation_detection_factor: 2.0,
            separation_weight: 96.0,
            max_step: 80.0,
            look_ahead_hops: 3,
            cliff_cost_threshold: 150,
        }
    }
}

/// Arc formation used while closing in on an enemy
///
/// A cluster fans out on a circle around a pivot just beyond the vanguard's
/// target, then tightens the circle once most of it has formed up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationConfig {
    /// Arcs are only formed where the vanguard stands in open ground at
    /// least this many tiles wide
    pub min_walkable_width: u32,

    /// The pivot sits this far beyond the vanguard's target
    pub pivot_overshoot: f32,

    /// Members further than this behind the vanguard (measured to the
    /// pivot) rejoin the vanguard instead of taking a place on the arc
    pub straggler_distance: f32,

    /// Melee units aim this much closer to the pivot than ranged units
    pub melee_offset: f32,

    /// A member counts as formed up within this much of the arc
    pub formed_tolerance: f32,

    /// Formed-up members needed before the arc tightens
    pub formed_count: usize,

    /// How much the arc tightens per step
    pub tighten_step: f32,

    pub separation_detection_factor: f32,
    pub separation_weight: f32,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            min_walkable_width: 7,
            pivot_overshoot: 64.0,
            straggler_distance: 128.0,
            melee_offset: 32.0,
            formed_tolerance: 24.0,
            formed_count: 8,
            tighten_step: 32.0,
            separation_detection_factor: 1.25,
            separation_weight: 32.0,
        }
    }
}

/// Regroup controller thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegroupConfig {
    /// Consecutive flee recommendations needed to abandon a choke hold
    pub flee_window: usize,

    /// Simulated losses below this are treated as no losses at all
    pub negligible_loss: f64,

    /// Static containment holds while value is gained and percent gain stays above this
    pub static_gain_floor: f64,

    /// Static containment always holds above this percent gain
    pub static_strong_gain: f64,

    /// Choke containment holds while value is gained and percent gain stays above this
    pub choke_gain_floor: f64,

    /// Choke containment always holds above this percent gain
    pub choke_fallback_gain: f64,

    /// Units farther than this from the choke center walk to it first
    pub choke_approach_distance: f32,

    pub hold_choke_goal_weight: f32,
    pub hold_choke_separation_factor: f32,
    pub hold_choke_separation_weight: f32,

    pub contain_goal_weight: f32,

    /// Goal weight used while a unit is inside static-defense threat range
    pub contain_threat_goal_weight: f32,
    pub contain_separation_factor: f32,
    pub contain_separation_weight: f32,

    /// Extra distance kept beyond the static defense's weapon range
    pub static_defense_margin: f32,
}

impl Default for RegroupConfig {
    fn default() -> Self {
        Self {
            flee_window: 24,
            negligible_loss: 0.001,
            static_gain_floor: -0.05,
            static_strong_gain: 0.2,
            choke_gain_floor: -0.3,
            choke_fallback_gain: -0.2,
            choke_approach_distance: 300.0,
            hold_choke_goal_weight: 96.0,
            hold_choke_separation_factor: 1.0,
            hold_choke_separation_weight: 64.0,
            contain_goal_weight: 64.0,
            contain_threat_goal_weight: 128.0,
            contain_separation_factor: 1.5,
            contain_separation_weight: 96.0,
            static_defense_margin: 16.0,
        }
    }
}

/// Attack/regroup decision hysteresis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngageConfig {
    pub negligible_loss: f64,

    /// Losses tolerated when the enemy has units we cannot detect
    pub undetected_loss_tolerance: f64,

    /// Percent gain needed to attack at aggression 1.0 and distance factor 1.0
    pub attack_gain_threshold: f64,

    pub continue_aggression: f64,
    pub regroup_aggression: f64,

    /// An attack is re-evaluated from scratch when enemy value grows past
    /// this multiple of what the attack started against
    pub enemy_growth_abort: f64,

    /// Consecutive retreat verdicts needed before an attack is abandoned
    pub retreat_streak: usize,
    pub retreat_window: usize,

    /// Consecutive attack verdicts needed before regrouping ends
    pub regroup_streak: usize,
    pub regroup_window: usize,

    /// Regrouping is held while own unit count grew within this many verdicts
    pub reinforcement_window: usize,

    /// Radius around a defended position inside which enemies are engaged
    pub defend_radius: f32,

    /// Mop-up clusters fight enemies within this distance of their center
    pub mop_up_radius: f32,
}

impl Default for EngageConfig {
    fn default() -> Self {
        Self {
            negligible_loss: 0.001,
            undetected_loss_tolerance: 0.15,
            attack_gain_threshold: 0.2,
            continue_aggression: 1.2,
            regroup_aggression: 0.8,
            enemy_growth_abort: 1.2,
            retreat_streak: 6,
            retreat_window: 48,
            regroup_streak: 12,
            regroup_window: 72,
            reinforcement_window: 48,
            defend_radius: 640.0,
            mop_up_radius: 480.0,
        }
    }
}

/// Detector and support-caster positioning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    /// Detectors stop this far inside their sight range of the revealed unit
    pub detector_sight_margin: f32,

    /// Distance a detector retreats from a spot both detected and air-threatened
    pub detector_backoff: f32,

    /// Support casters trail the vanguard cluster center by this much
    pub caster_trail_distance: f32,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            detector_sight_margin: 32.0,
            detector_backoff: 64.0,
            caster_trail_distance: 96.0,
        }
    }
}

impl TacticsConfig {
    /// Create config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) TOML document and validate it
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: TacticsConfig = toml::from_str(contents)?;
        config.validate().map_err(TacticsError::InvalidConfig)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), String> {
        let c = &self.clustering;
        if c.add_distance <= 0.0 {
            return Err("clustering.add_distance must be positive".into());
        }
        if c.remove_distance < c.add_distance {
            return Err("clustering.remove_distance must be >= add_distance".into());
        }
        if !(0.0..=1.0).contains(&c.arc_progress_tolerance) {
            return Err("clustering.arc_progress_tolerance must be within 0..=1".into());
        }
        if self.combat_sim.horizon_ticks == 0 {
            return Err("combat_sim.horizon_ticks must be positive".into());
        }
        for (name, factor) in [
            ("combat_sim.choke_attack_factor", self.combat_sim.choke_attack_factor),
            ("combat_sim.high_ground_loss_factor", self.combat_sim.high_ground_loss_factor),
            ("combat_sim.low_ground_damage_factor", self.combat_sim.low_ground_damage_factor),
        ] {
            if !(0.0..=1.0).contains(&factor) {
                return Err(format!("{} must be within 0..=1", name));
            }
        }
        if self.targeting.melee_priority_weight <= 0 || self.targeting.ranged_priority_weight <= 0 {
            return Err("targeting priority weights must be positive".into());
        }
        if self.targeting.melee.rules.is_empty() || self.targeting.ranged.rules.is_empty() {
            return Err("targeting priority tables must not be empty".into());
        }
        let s = &self.steering;
        if s.goal_weight <= 0.0 || s.separation_weight < 0.0 || s.cohesion_weight < 0.0 {
            return Err("steering weights must be non-negative and goal weight positive".into());
        }
        if s.max_step <= 0.0 {
            return Err("steering.max_step must be positive".into());
        }
        if self.formation.formed_count == 0 || self.formation.tighten_step < 0.0 {
            return Err("formation.formed_count must be positive and tighten_step non-negative".into());
        }
        if self.regroup.flee_window < 2 {
            return Err("regroup.flee_window must be at least 2".into());
        }
        let e = &self.engage;
        if e.retreat_streak > e.retreat_window || e.regroup_streak > e.regroup_window {
            return Err("engage streaks must fit inside their windows".into());
        }
        Ok(())
    }

    /// Longest verdict history any decision looks back over
    pub fn history_capacity(&self) -> usize {
        self.engage
            .retreat_window
            .max(self.engage.regroup_window)
            .max(self.engage.reinforcement_window)
            .max(self.regroup.flee_window)
    }
}
