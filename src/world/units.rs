//! Per-tick unit state supplied by the unit-data provider
//!
//! The engine never owns unit lifetimes: the caller refreshes the
//! [`UnitStore`] every tick and squads refer to units by [`UnitId`].

use std::collections::BTreeMap;

use glam::Vec2;

use crate::core::types::{Side, Tick, UnitId, UnitTypeId};
use crate::spatial::geometry::edge_distance;
use crate::world::unit_type::{UnitTag, UnitType, Weapon};

/// Spell and debuff effects currently applied to a unit
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatusEffects {
    /// Inside a field that blocks ranged attacks
    pub shrouded: bool,
    /// Inside a field that blocks melee attacks
    pub disrupted: bool,
    /// Standing in an area-damage spell
    pub under_area_damage: bool,
    /// Shielded by a damage-absorbing buff
    pub damage_absorbing: bool,
    /// Stacks of an armor-reducing debuff
    pub armor_debuff_stacks: u8,
}

/// Upgrade-adjusted combat stats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Upgrades {
    pub damage_bonus: i32,
    pub armor_bonus: i32,
    pub range_bonus: f32,
    pub speed_multiplier: f32,
    pub cooldown_multiplier: f32,
}

impl Default for Upgrades {
    fn default() -> Self {
        Self {
            damage_bonus: 0,
            armor_bonus: 0,
            range_bonus: 0.0,
            speed_multiplier: 1.0,
            cooldown_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnitState {
    pub id: UnitId,
    pub type_id: UnitTypeId,
    pub side: Side,
    pub position: Vec2,
    pub health: i32,
    pub shields: i32,
    pub completed: bool,
    pub powered: bool,
    pub burrowed: bool,
    pub moving: bool,
    pub braking: bool,
    pub stimmed: bool,
    /// Cloaked or burrowed without being revealed to the observer
    pub undetected: bool,
    /// Flagged by the unit-data provider as unable to make progress
    pub stuck: bool,
    /// Locked in an attack animation until this tick
    pub busy_until: Tick,
    pub cooldown_until: Tick,
    pub constructing: Option<UnitTypeId>,
    pub repairing: Option<UnitId>,
    pub last_seen_attacking: Option<Tick>,
    /// Unit currently ordered to attack
    pub order_target: Option<UnitId>,
    pub status: StatusEffects,
    pub upgrades: Upgrades,
}

impl UnitState {
    /// Full-health, completed unit
    pub fn new(id: UnitId, unit_type: &UnitType, side: Side, position: Vec2) -> Self {
        Self {
            id,
            type_id: unit_type.id,
            side,
            position,
            health: unit_type.max_health,
            shields: unit_type.max_shields,
            completed: true,
            powered: true,
            burrowed: false,
            moving: false,
            braking: false,
            stimmed: false,
            undetected: false,
            stuck: false,
            busy_until: 0,
            cooldown_until: 0,
            constructing: None,
            repairing: None,
            last_seen_attacking: None,
            order_target: None,
            status: StatusEffects::default(),
            upgrades: Upgrades::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}

/// All units known this tick, both sides, in id order
#[derive(Debug, Clone, Default)]
pub struct UnitStore {
    units: BTreeMap<UnitId, UnitState>,
}

impl UnitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: UnitState) {
        self.units.insert(unit.id, unit);
    }

    pub fn remove(&mut self, id: UnitId) -> Option<UnitState> {
        self.units.remove(&id)
    }

    pub fn get(&self, id: UnitId) -> Option<&UnitState> {
        self.units.get(&id)
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut UnitState> {
        self.units.get_mut(&id)
    }

    /// Unit is known and alive
    pub fn exists(&self, id: UnitId) -> bool {
        self.units.get(&id).is_some_and(UnitState::is_alive)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitState> {
        self.units.values()
    }

    pub fn side(&self, side: Side) -> impl Iterator<Item = &UnitState> {
        self.units.values().filter(move |u| u.side == side && u.is_alive())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// A unit's live state joined with its type
#[derive(Debug, Clone, Copy)]
pub struct UnitView<'a> {
    pub state: &'a UnitState,
    pub kind: &'a UnitType,
}

impl<'a> UnitView<'a> {
    pub fn new(state: &'a UnitState, kind: &'a UnitType) -> Self {
        Self { state, kind }
    }

    pub fn id(&self) -> UnitId {
        self.state.id
    }

    pub fn position(&self) -> Vec2 {
        self.state.position
    }

    pub fn has(&self, tag: UnitTag) -> bool {
        self.kind.has(tag)
    }

    pub fn is_flyer(&self) -> bool {
        self.kind.is_flyer()
    }

    pub fn is_building(&self) -> bool {
        self.kind.is_building()
    }

    pub fn is_worker(&self) -> bool {
        self.kind.is_worker()
    }

    pub fn is_ranged(&self) -> bool {
        self.kind.is_ranged()
    }

    /// Detector that moves with the army rather than a detecting structure
    pub fn is_mobile_detector(&self) -> bool {
        self.has(UnitTag::Detector) && !self.is_building()
    }

    pub fn is_static_defense(&self) -> bool {
        self.has(UnitTag::StaticDefense) && self.state.completed
    }

    pub fn is_ready(&self, tick: Tick) -> bool {
        tick >= self.state.busy_until
    }

    pub fn footprint(&self) -> Vec2 {
        self.kind.footprint()
    }

    pub fn edge_distance(&self, other: &UnitView) -> f32 {
        edge_distance(self.position(), self.footprint(), other.position(), other.footprint())
    }

    pub fn top_speed(&self) -> f32 {
        let speed = self.kind.top_speed * self.state.upgrades.speed_multiplier;
        if self.state.stimmed {
            speed * 1.5
        } else {
            speed
        }
    }

    pub fn armor(&self) -> i32 {
        self.kind.armor + self.state.upgrades.armor_bonus - self.state.status.armor_debuff_stacks as i32
    }

    /// Weapon usable against `target`, honouring burrow restrictions
    pub fn weapon_against(&self, target: &UnitView) -> Option<&'a Weapon> {
        if target.has(UnitTag::Untargetable) {
            return None;
        }
        let burrowed_attacker = self.has(UnitTag::BurrowedAttacker);
        if burrowed_attacker != self.state.burrowed {
            return None;
        }
        if target.is_flyer() {
            self.kind.air_weapon.as_ref()
        } else {
            self.kind.ground_weapon.as_ref()
        }
    }

    pub fn range_against(&self, target: &UnitView) -> Option<f32> {
        self.weapon_against(target)
            .map(|w| w.max_range + self.state.upgrades.range_bonus)
    }

    /// Ticks between attacks against `target`
    pub fn cooldown_against(&self, target: &UnitView) -> Option<u32> {
        self.weapon_against(target).map(|w| {
            let mut cooldown = w.cooldown as f32 * self.state.upgrades.cooldown_multiplier;
            if self.state.stimmed {
                cooldown *= 0.5;
            }
            cooldown.round().max(1.0) as u32
        })
    }

    /// Damage one attack deals to `target`'s health once shields are gone
    pub fn damage_against(&self, target: &UnitView) -> i32 {
        let Some(weapon) = self.weapon_against(target) else {
            return 0;
        };
        let per_hit = (weapon.damage + self.state.upgrades.damage_bonus) as f32
            * weapon.damage_type.modifier(target.kind.size)
            - target.armor() as f32;
        (per_hit.max(0.5) * weapon.hits as f32).round() as i32
    }

    /// Can deal damage to `target` at all, given detection
    pub fn can_attack(&self, target: &UnitView) -> bool {
        !target.state.undetected && self.weapon_against(target).is_some()
    }

    /// Target is within this unit's weapon range plus `margin`
    pub fn in_range_of(&self, target: &UnitView, margin: f32) -> bool {
        match self.range_against(target) {
            Some(range) => self.edge_distance(target) <= range + margin,
            None => false,
        }
    }

    /// Combined health and shields
    pub fn hit_points(&self) -> i32 {
        self.state.health + self.state.shields
    }

    pub fn max_hit_points(&self) -> i32 {
        self.kind.max_health + self.kind.max_shields
    }
}
