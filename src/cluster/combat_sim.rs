//! Deterministic forward combat simulation
//!
//! Both armies are copied into lightweight agents and stepped for a fixed
//! horizon. Our agents start aimed at the targets their units were
//! assigned; every agent either attacks its target when in range and off
//! cooldown, or walks toward it. Agents are processed in input order, so
//! identical inputs always give identical results.

use glam::Vec2;

use crate::cluster::sim_result::{CombatSimResult, ElevationEdge};
use crate::core::config::CombatSimConfig;
use crate::core::types::{Tick, UnitId};
use crate::spatial::geometry::edge_distance;
use crate::world::context::TickContext;
use crate::world::terrain::Choke;
use crate::world::unit_type::{DamageType, UnitSize, UnitTag, UnitValue};
use crate::world::units::UnitView;

#[derive(Debug, Clone, Copy)]
pub struct SimWeapon {
    pub damage: i32,
    pub hits: i32,
    pub cooldown: u32,
    pub min_range: f32,
    pub max_range: f32,
    pub damage_type: DamageType,
}

/// One unit inside the simulation
#[derive(Debug, Clone)]
pub struct SimAgent {
    pub id: UnitId,
    pub position: Vec2,
    pub footprint: Vec2,
    pub flyer: bool,
    pub size: UnitSize,
    pub health: f32,
    pub shields: f32,
    pub max_health: i32,
    pub max_shields: i32,
    pub armor: i32,
    pub speed: f32,
    pub ground_weapon: Option<SimWeapon>,
    pub air_weapon: Option<SimWeapon>,
    pub undetected: bool,
    pub value: UnitValue,
    cooldown: u32,
    assigned: Option<UnitId>,
    target: Option<usize>,
}

impl SimAgent {
    /// Snapshot a live unit; weapons respect burrow state and upgrades
    pub fn from_view(view: &UnitView, value: UnitValue) -> Self {
        let as_target_of = |flyer: bool| {
            let weapon = if flyer {
                view.kind.air_weapon.as_ref()
            } else {
                view.kind.ground_weapon.as_ref()
            }?;
            if view.has(UnitTag::BurrowedAttacker) != view.state.burrowed {
                return None;
            }
            let mut cooldown = weapon.cooldown as f32 * view.state.upgrades.cooldown_multiplier;
            if view.state.stimmed {
                cooldown *= 0.5;
            }
            Some(SimWeapon {
                damage: weapon.damage + view.state.upgrades.damage_bonus,
                hits: weapon.hits,
                cooldown: cooldown.round().max(1.0) as u32,
                min_range: weapon.min_range,
                max_range: weapon.max_range + view.state.upgrades.range_bonus,
                damage_type: weapon.damage_type,
            })
        };
        Self {
            id: view.id(),
            position: view.position(),
            footprint: view.footprint(),
            flyer: view.is_flyer(),
            size: view.kind.size,
            health: view.state.health as f32,
            shields: view.state.shields as f32,
            max_health: view.kind.max_health,
            max_shields: view.kind.max_shields,
            armor: view.armor(),
            speed: view.top_speed(),
            ground_weapon: as_target_of(false),
            air_weapon: as_target_of(true),
            undetected: view.state.undetected,
            value,
            cooldown: 0,
            assigned: None,
            target: None,
        }
    }

    /// Start the simulation aimed at `target`
    pub fn with_target(mut self, target: Option<UnitId>) -> Self {
        self.assigned = target;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    fn weapon_vs(&self, other: &SimAgent) -> Option<SimWeapon> {
        if other.flyer {
            self.air_weapon
        } else {
            self.ground_weapon
        }
    }

    /// Current worth: base value plus the health-weighted share of the rest
    pub fn score(&self) -> i64 {
        if !self.is_alive() {
            return 0;
        }
        let base = self.value.base as i64;
        let scaled = self.value.scaled as i64;
        let max = 3 * self.max_health as i64 + self.max_shields as i64;
        if max <= 0 {
            return base + scaled;
        }
        let current = 3 * self.health.floor() as i64 + self.shields.max(0.0).floor() as i64;
        base + scaled * current.min(max) / max
    }
}

/// Runs engagements between two agent lists
#[derive(Debug, Clone, Copy)]
pub struct CombatSimulator<'c> {
    config: &'c CombatSimConfig,
}

impl<'c> CombatSimulator<'c> {
    pub fn new(config: &'c CombatSimConfig) -> Self {
        Self { config }
    }

    /// Simulate the configured horizon and score both sides
    ///
    /// `reveal_cloaked` lets our agents target undetected enemies; only
    /// enemies left undetected are reported in the result. `choke`, when
    /// given, slows ground agents crossing it.
    pub fn simulate(
        &self,
        tick: Tick,
        mut mine: Vec<SimAgent>,
        mut enemy: Vec<SimAgent>,
        reveal_cloaked: bool,
        choke: Option<&Choke>,
    ) -> CombatSimResult {
        if mine.is_empty() || enemy.is_empty() {
            return CombatSimResult::empty(tick);
        }
        let enemy_has_undetected_units = !reveal_cloaked && enemy.iter().any(|a| a.undetected);
        if reveal_cloaked {
            for agent in &mut enemy {
                agent.undetected = false;
            }
        }
        seed_targets(&mut mine, &enemy);
        seed_targets(&mut enemy, &mine);

        let initial_mine = army_score(&mine);
        let initial_enemy = army_score(&enemy);

        for _ in 0..self.config.horizon_ticks {
            let running_mine = self.step(&mut mine, &mut enemy, choke);
            let running_enemy = self.step(&mut enemy, &mut mine, choke);
            if !running_mine && !running_enemy {
                break;
            }
        }

        CombatSimResult {
            tick,
            my_unit_count: mine.len(),
            enemy_unit_count: enemy.len(),
            initial_mine,
            initial_enemy,
            final_mine: army_score(&mine),
            final_enemy: army_score(&enemy),
            enemy_has_undetected_units,
            narrow_choke: choke.filter(|c| c.narrow).cloned(),
            elevation: ElevationEdge::Level,
        }
    }

    /// Advance one side by one tick; returns whether anything could still act
    fn step(&self, allies: &mut [SimAgent], enemies: &mut [SimAgent], choke: Option<&Choke>) -> bool {
        let mut running = false;
        for i in 0..allies.len() {
            if !allies[i].is_alive() {
                continue;
            }
            if allies[i].cooldown > 0 {
                allies[i].cooldown -= 1;
            }

            let Some((target, distance, weapon)) = select_target(&allies[i], enemies) else {
                allies[i].target = None;
                continue;
            };
            running = true;
            allies[i].target = Some(target);

            if distance <= weapon.max_range {
                if allies[i].cooldown == 0 {
                    apply_damage(&mut enemies[target], &weapon);
                    allies[i].cooldown = weapon.cooldown;
                }
                continue;
            }

            let agent = &mut allies[i];
            let mut speed = agent.speed;
            if !agent.flyer && choke.is_some_and(|c| c.narrow && c.contains(agent.position)) {
                speed *= self.config.choke_speed_factor;
            }
            let reach = speed.min(distance - weapon.max_range + 2.0).max(0.0);
            let direction = (enemies[target].position - agent.position).normalize_or_zero();
            agent.position += direction * reach;
        }
        running
    }
}

fn army_score(agents: &[SimAgent]) -> i32 {
    agents.iter().map(SimAgent::score).sum::<i64>().min(i32::MAX as i64) as i32
}

/// Resolve assigned unit ids to indices into the opposing side
fn seed_targets(agents: &mut [SimAgent], opponents: &[SimAgent]) {
    for agent in agents {
        agent.target = agent
            .assigned
            .and_then(|id| opponents.iter().position(|o| o.id == id));
    }
}

/// Keep the current target while it can be attacked. When it is out of
/// range, switch only to a nearer enemy that is in range. Without a target,
/// take the nearest attackable enemy; ties keep the earlier enemy.
fn select_target(agent: &SimAgent, enemies: &[SimAgent]) -> Option<(usize, f32, SimWeapon)> {
    let attackable = |enemy: &SimAgent| enemy.is_alive() && !enemy.undetected;
    let distance_to = |enemy: &SimAgent| {
        edge_distance(agent.position, agent.footprint, enemy.position, enemy.footprint)
    };
    let usable = |enemy: &SimAgent| {
        if !attackable(enemy) {
            return None;
        }
        let weapon = agent.weapon_vs(enemy).filter(|w| w.damage > 0)?;
        let distance = distance_to(enemy);
        (distance >= weapon.min_range).then_some((distance, weapon))
    };

    let current = agent
        .target
        .and_then(|index| enemies.get(index).and_then(usable).map(|(d, w)| (index, d, w)));
    if let Some((_, distance, weapon)) = current {
        if distance <= weapon.max_range {
            return current;
        }
    }

    let mut best: Option<(usize, f32, SimWeapon)> = None;
    for (index, enemy) in enemies.iter().enumerate() {
        if current.is_some_and(|(c, _, _)| c == index) {
            continue;
        }
        let Some((distance, weapon)) = usable(enemy) else {
            continue;
        };
        let bound = best.or(current).map(|(_, d, _)| d);
        if bound.map_or(true, |d| distance < d) {
            best = Some((index, distance, weapon));
        }
    }
    match (current, best) {
        (Some(current), Some((_, distance, weapon))) if distance > weapon.max_range => Some(current),
        (Some(current), None) => Some(current),
        (_, best) => best,
    }
}

/// Shields soak raw damage first; the rest is reduced by size and armor
fn apply_damage(target: &mut SimAgent, weapon: &SimWeapon) {
    let mut damage = (weapon.damage * weapon.hits) as f32;
    if target.shields > 0.0 {
        let absorbed = target.shields.min(damage);
        target.shields -= absorbed;
        damage -= absorbed;
    }
    if damage <= 0.0 {
        return;
    }
    let reduced = damage * weapon.damage_type.modifier(target.size) - (target.armor * weapon.hits) as f32;
    target.health -= reduced.max(0.5 * weapon.hits as f32);
}

/// Simulate a cluster's engagement against the given enemies
///
/// `assignments` pairs each of our units with the target it was given, so
/// the simulation plays out the fight the cluster is actually about to
/// take. Enemies still under construction are left out, and enemy workers
/// only take part if they were seen attacking recently. Undetected enemies
/// can only be targeted with `has_mobile_detection`. When no choke is
/// given, a narrow choke separating the two armies is looked up from the
/// terrain.
pub fn simulate_engagement(
    ctx: &TickContext,
    assignments: &[(UnitId, Option<UnitId>)],
    enemy_units: &[UnitId],
    has_mobile_detection: bool,
    choke: Option<&Choke>,
) -> CombatSimResult {
    let config = &ctx.config.combat_sim;
    let agent_for = |view: &UnitView| SimAgent::from_view(view, ctx.catalog.value(view.state.type_id));

    let mine: Vec<(UnitView, Option<UnitId>)> = assignments
        .iter()
        .filter_map(|(id, target)| ctx.view(*id).map(|view| (view, *target)))
        .collect();
    let enemies: Vec<UnitView> = enemy_units
        .iter()
        .filter_map(|id| ctx.view(*id))
        .filter(|e| e.state.completed)
        .filter(|e| !e.has(UnitTag::Untargetable))
        .filter(|e| {
            !e.is_worker()
                || e.state
                    .last_seen_attacking
                    .is_some_and(|t| ctx.tick.saturating_sub(t) < config.worker_attack_memory)
        })
        .collect();
    if mine.is_empty() || enemies.is_empty() {
        return CombatSimResult::empty(ctx.tick);
    }

    let my_views: Vec<UnitView> = mine.iter().map(|(view, _)| *view).collect();
    let my_center = centroid(my_views.iter().map(|v| v.position()));
    let enemy_center = centroid(enemies.iter().map(|v| v.position()));
    let choke = choke
        .or_else(|| ctx.terrain.narrow_choke_between(my_center, enemy_center));
    let elevation = elevation_edge(ctx, &my_views, &enemies);

    let simulator = CombatSimulator::new(config);
    let mut result = simulator.simulate(
        ctx.tick,
        mine.iter().map(|(view, target)| agent_for(view).with_target(*target)).collect(),
        enemies.iter().map(agent_for).collect(),
        has_mobile_detection,
        choke,
    );
    result.elevation = elevation;
    result
}

fn centroid(points: impl Iterator<Item = Vec2>) -> Vec2 {
    let (sum, count) = points.fold((Vec2::ZERO, 0usize), |(s, n), p| (s + p, n + 1));
    if count == 0 {
        Vec2::ZERO
    } else {
        sum / count as f32
    }
}

/// Compare average ground elevation of both armies
fn elevation_edge(ctx: &TickContext, mine: &[UnitView], enemies: &[UnitView]) -> ElevationEdge {
    let average = |units: &[UnitView]| {
        let levels: Vec<f32> = units
            .iter()
            .filter(|u| !u.is_flyer())
            .map(|u| ctx.terrain.elevation(u.position()) as f32)
            .collect();
        if levels.is_empty() {
            None
        } else {
            Some(levels.iter().sum::<f32>() / levels.len() as f32)
        }
    };
    match (average(mine), average(enemies)) {
        (Some(m), Some(e)) if m - e >= 0.5 => ElevationEdge::Higher,
        (Some(m), Some(e)) if e - m >= 0.5 => ElevationEdge::Lower,
        _ => ElevationEdge::Level,
    }
}
