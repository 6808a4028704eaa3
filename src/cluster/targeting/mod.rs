//! Per-unit attack target selection
//!
//! Each attacker scores every candidate as `K * priority - range` and then
//! applies situational adjustments; the highest score wins and ties keep the
//! earlier candidate. Melee and ranged attackers use different weights,
//! priority tables, and adjustments.

pub mod priority;

use glam::Vec2;
use tracing::trace;

use crate::core::config::TargetingConfig;
use crate::core::types::{Side, UnitId};
use crate::world::context::TickContext;
use crate::world::unit_type::{DamageType, UnitSize, UnitTag};
use crate::world::units::UnitView;

pub use priority::{Predicate, PriorityRule, PriorityTable, RuleInputs};

/// How far from the target position an enemy depot marks an enemy base
const BASE_RADIUS: f32 = 320.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetingStyle {
    Melee,
    Ranged,
}

impl TargetingStyle {
    pub fn for_unit(unit: &UnitView) -> Self {
        if unit.is_ranged() {
            TargetingStyle::Ranged
        } else {
            TargetingStyle::Melee
        }
    }
}

/// Facts about the whole engagement, computed once per cluster
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetingEnv {
    pub target_position: Vec2,
    /// We own completed permanently cloaked units
    pub own_cloaked_units: bool,
    /// An enemy resource depot stands at the target position
    pub target_is_enemy_base: bool,
}

impl TargetingEnv {
    pub fn scan(ctx: &TickContext, target_position: Vec2) -> Self {
        let own_cloaked_units = ctx
            .units
            .side(Side::Mine)
            .filter(|s| s.completed)
            .filter_map(|s| ctx.view(s.id))
            .any(|v| v.has(UnitTag::Cloaked));
        let target_is_enemy_base = ctx
            .enemies_near(target_position, BASE_RADIUS)
            .iter()
            .any(|v| v.has(UnitTag::ResourceDepot));
        Self {
            target_position,
            own_cloaked_units,
            target_is_enemy_base,
        }
    }
}

pub struct TargetSelector<'a> {
    style: TargetingStyle,
    table: &'a PriorityTable,
    config: &'a TargetingConfig,
}

impl<'a> TargetSelector<'a> {
    pub fn new(style: TargetingStyle, config: &'a TargetingConfig) -> Self {
        let table = match style {
            TargetingStyle::Melee => &config.melee,
            TargetingStyle::Ranged => &config.ranged,
        };
        Self { style, table, config }
    }

    pub fn for_unit(attacker: &UnitView, config: &'a TargetingConfig) -> Self {
        Self::new(TargetingStyle::for_unit(attacker), config)
    }

    pub fn style(&self) -> TargetingStyle {
        self.style
    }

    pub fn priority(&self, attacker: &UnitView, target: &UnitView, ctx: &TickContext, env: &TargetingEnv) -> u8 {
        self.table.priority(&RuleInputs {
            attacker,
            target,
            ctx,
            own_cloaked_units: env.own_cloaked_units,
        })
    }

    fn weight(&self) -> i32 {
        match self.style {
            TargetingStyle::Melee => self.config.melee_priority_weight,
            TargetingStyle::Ranged => self.config.ranged_priority_weight,
        }
    }

    /// Score of attacking `target`, or `None` if it must not be attacked
    pub fn score(
        &self,
        attacker: &UnitView,
        target: &UnitView,
        ctx: &TickContext,
        env: &TargetingEnv,
    ) -> Option<i32> {
        if target.has(UnitTag::Untargetable) || !attacker.can_attack(target) {
            return None;
        }
        let range = attacker.edge_distance(target);
        match self.style {
            TargetingStyle::Melee => {
                if target.state.status.disrupted || range > self.config.melee_consideration_range {
                    return None;
                }
                if target.state.status.shrouded && attacker.is_worker() {
                    return None;
                }
            }
            TargetingStyle::Ranged => {
                if target.state.status.shrouded || range >= self.config.ranged_consideration_range {
                    return None;
                }
            }
        }
        if self.is_outlying_building(attacker, target, env) {
            return None;
        }

        let priority = self.priority(attacker, target, ctx, env);
        if priority == 0 {
            return None;
        }

        let mut score = self.weight() * priority as i32 - range.round() as i32;

        // Prefer targets between us and the goal
        let our_goal_distance = attacker.position().distance(env.target_position);
        if target.position().distance(env.target_position) < our_goal_distance {
            score += 64;
        }

        score += match self.style {
            TargetingStyle::Melee => melee_adjustment(attacker, target),
            TargetingStyle::Ranged => ranged_adjustment(attacker, target),
        };
        score += damaged_bonus(target);
        if target.state.status.damage_absorbing {
            score -= 128;
        }
        Some(score)
    }

    /// Buildings away from an enemy base that cannot fight back are not worth
    /// a detour while the base itself is the goal
    fn is_outlying_building(&self, attacker: &UnitView, target: &UnitView, env: &TargetingEnv) -> bool {
        env.target_is_enemy_base
            && target.is_building()
            && !target.kind.is_armed()
            && !target.has(UnitTag::ResourceDepot)
            && attacker.position().distance(env.target_position) > self.config.outlying_building_distance
    }

    /// Best candidate by score; ties keep the earlier one
    pub fn choose<'v>(
        &self,
        attacker: &UnitView,
        candidates: &[UnitView<'v>],
        ctx: &TickContext,
        env: &TargetingEnv,
    ) -> Option<UnitId> {
        let mut best: Option<(UnitId, i32)> = None;
        for target in candidates {
            let Some(score) = self.score(attacker, target, ctx, env) else {
                continue;
            };
            trace!(attacker = %attacker.id(), target = %target.id(), score, "scored target");
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((target.id(), score));
            }
        }
        best.map(|(id, _)| id)
    }
}

fn melee_adjustment(attacker: &UnitView, target: &UnitView) -> i32 {
    let mut score = 0;
    if target.state.status.shrouded {
        score += 128;
    }
    if attacker.in_range_of(target, 0.0) {
        score += 128;
    } else if !target.state.moving {
        score += if target.has(UnitTag::Siege) { 48 } else { 32 };
    } else if target.state.braking {
        score += 16;
    } else if target.top_speed() >= attacker.top_speed() {
        score -= 64;
    }
    if target.state.status.under_area_damage {
        score -= 128;
    }
    score
}

fn ranged_adjustment(attacker: &UnitView, target: &UnitView) -> i32 {
    let mut score = 0;
    if target.can_attack(attacker) {
        if target.in_range_of(attacker, 0.0) {
            score += 192;
        } else if attacker.in_range_of(target, 0.0) {
            score += 128;
        } else {
            score += 96;
        }
    } else if !target.state.moving {
        score += if target.has(UnitTag::Siege) { 48 } else { 24 };
    } else if target.state.braking {
        score += 16;
    } else if target.top_speed() >= attacker.top_speed() {
        score -= 128;
    }

    let stacks = target.state.status.armor_debuff_stacks as i32;
    score += stacks * if attacker.has(UnitTag::BounceAttack) { 16 } else { 8 };

    if let Some(weapon) = attacker.weapon_against(target) {
        match (weapon.damage_type, target.kind.size) {
            (DamageType::Explosive, UnitSize::Large) => score += 32,
            (DamageType::Concussive, UnitSize::Small) => score += 32,
            (DamageType::Concussive, UnitSize::Large) => score -= 32,
            _ => {}
        }
    }
    score
}

fn damaged_bonus(target: &UnitView) -> i32 {
    let health = target.state.health;
    let low_health = health < target.kind.max_health / 3;
    let mut bonus = 0;
    if target.kind.max_shields > 0 && target.state.shields <= 5 {
        bonus += 32;
        if low_health {
            bonus += 24;
        }
    } else if health < target.kind.max_health {
        bonus += 24;
        if low_health {
            bonus += 24;
        }
    }
    bonus
}

/// Assign a target to every member of a cluster
///
/// Ground enemies whose path distance to the target position differs from
/// the vanguard's by more than the cliff threshold are on another level and
/// ignored, unless they can already shoot the vanguard. Members still
/// committed to an attack keep their current target. Returns pairs in member
/// order; `None` means no valid target.
pub fn select_targets(
    ctx: &TickContext,
    members: &[UnitId],
    enemies: &[UnitView],
    vanguard: Option<UnitId>,
    target_position: Vec2,
) -> Vec<(UnitId, Option<UnitId>)> {
    let config = &ctx.config.targeting;
    let env = TargetingEnv::scan(ctx, target_position);

    let candidates: Vec<UnitView> = match vanguard.and_then(|id| ctx.view(id)) {
        Some(vanguard) if !vanguard.is_flyer() => {
            let vanguard_distance = ctx.path_distance(vanguard.position(), target_position);
            enemies
                .iter()
                .filter(|enemy| {
                    if enemy.is_flyer() {
                        return true;
                    }
                    let (Some(ours), Some(theirs)) =
                        (vanguard_distance, ctx.path_distance(enemy.position(), target_position))
                    else {
                        return true;
                    };
                    (ours - theirs).abs() <= config.cliff_path_divergence
                        || enemy.in_range_of(&vanguard, 0.0)
                })
                .copied()
                .collect()
        }
        _ => enemies.to_vec(),
    };

    members
        .iter()
        .filter_map(|&id| ctx.view(id))
        .map(|unit| {
            if !unit.is_ready(ctx.tick) {
                let locked = unit
                    .state
                    .order_target
                    .filter(|t| candidates.iter().any(|c| c.id() == *t));
                return (unit.id(), locked);
            }
            let selector = TargetSelector::for_unit(&unit, config);
            (unit.id(), selector.choose(&unit, &candidates, ctx, &env))
        })
        .collect()
}
