//! Attack priority tables
//!
//! A table is an ordered list of rules; the first rule whose predicates all
//! hold decides the priority (0..=12, where 0 means "never target").
//! Tables serialize as tagged TOML so they can be tuned without code.

use serde::{Deserialize, Serialize};

use crate::world::context::TickContext;
use crate::world::unit_type::UnitTag;
use crate::world::units::UnitView;

/// Situational facts a rule can test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    TargetTag { tag: UnitTag },
    AttackerTag { tag: UnitTag },
    TargetFlying,
    AttackerFlying,
    /// Target has any weapon
    TargetArmed,
    TargetHasCost,
    TargetHasGasCost,
    TargetIncomplete,
    TargetUnpowered,
    TargetBurrowed,
    /// Constructing or repairing
    TargetBusy,
    TargetConstructing,
    /// Constructing a building carrying `tag`
    TargetConstructingTag { tag: UnitTag },
    /// Repairing something that can shoot
    TargetRepairingArmed,
    /// Repairing static defense that outranges the attacker
    TargetRepairingOutranging,
    TargetInNarrowChoke,
    /// Target can damage the attacker
    TargetThreatens,
    /// Target has a weapon against the attacker but is more than `margin`
    /// beyond its reach
    TargetOutsideOwnRange { margin: f32 },
    TargetWithin { distance: f32 },
    TargetNearHome { radius: f32 },
    /// We field permanently cloaked units, so enemy detection matters
    OwnCloakedUnits,
}

/// Inputs shared by every predicate evaluation
pub struct RuleInputs<'v, 'c> {
    pub attacker: &'v UnitView<'c>,
    pub target: &'v UnitView<'c>,
    pub ctx: &'v TickContext<'c>,
    pub own_cloaked_units: bool,
}

impl Predicate {
    pub fn holds(&self, inputs: &RuleInputs) -> bool {
        let RuleInputs {
            attacker,
            target,
            ctx,
            own_cloaked_units,
        } = inputs;
        match *self {
            Predicate::TargetTag { tag } => target.has(tag),
            Predicate::AttackerTag { tag } => attacker.has(tag),
            Predicate::TargetFlying => target.is_flyer(),
            Predicate::AttackerFlying => attacker.is_flyer(),
            Predicate::TargetArmed => target.kind.is_armed(),
            Predicate::TargetHasCost => target.kind.mineral_cost > 0 || target.kind.gas_cost > 0,
            Predicate::TargetHasGasCost => target.kind.gas_cost > 0,
            Predicate::TargetIncomplete => !target.state.completed,
            Predicate::TargetUnpowered => target.has(UnitTag::RequiresPower) && !target.state.powered,
            Predicate::TargetBurrowed => target.state.burrowed,
            Predicate::TargetBusy => {
                target.state.constructing.is_some() || target.state.repairing.is_some()
            }
            Predicate::TargetConstructing => target.state.constructing.is_some(),
            Predicate::TargetConstructingTag { tag } => target
                .state
                .constructing
                .and_then(|t| ctx.catalog.get(t))
                .is_some_and(|t| t.has(tag)),
            Predicate::TargetRepairingArmed => target
                .state
                .repairing
                .and_then(|id| ctx.view(id))
                .is_some_and(|r| r.kind.ground_weapon.is_some()),
            Predicate::TargetRepairingOutranging => target
                .state
                .repairing
                .and_then(|id| ctx.view(id))
                .filter(|r| r.has(UnitTag::StaticDefense))
                .is_some_and(|r| {
                    let theirs = r.range_against(attacker).unwrap_or(0.0);
                    let ours = attacker.range_against(&r).unwrap_or(0.0);
                    theirs > ours
                }),
            Predicate::TargetInNarrowChoke => ctx.terrain.narrow_choke_at(target.position()).is_some(),
            Predicate::TargetThreatens => target.can_attack(attacker),
            Predicate::TargetOutsideOwnRange { margin } => {
                let weapon = if attacker.is_flyer() {
                    target.kind.air_weapon.as_ref()
                } else {
                    target.kind.ground_weapon.as_ref()
                };
                weapon.is_some_and(|w| {
                    let range = w.max_range + target.state.upgrades.range_bonus;
                    range > 0.0 && attacker.edge_distance(target) > margin + range
                })
            }
            Predicate::TargetWithin { distance } => attacker.edge_distance(target) < distance,
            Predicate::TargetNearHome { radius } => {
                target.position().distance(ctx.terrain.home_position()) < radius
            }
            Predicate::OwnCloakedUnits => *own_cloaked_units,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityRule {
    pub priority: u8,
    #[serde(default)]
    pub all: Vec<Predicate>,
    #[serde(default)]
    pub none: Vec<Predicate>,
}

impl PriorityRule {
    pub fn new(priority: u8, all: Vec<Predicate>, none: Vec<Predicate>) -> Self {
        Self { priority, all, none }
    }

    pub fn matches(&self, inputs: &RuleInputs) -> bool {
        self.all.iter().all(|p| p.holds(inputs)) && !self.none.iter().any(|p| p.holds(inputs))
    }
}

fn default_fallback() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityTable {
    pub rules: Vec<PriorityRule>,
    /// Priority when no rule matches
    #[serde(default = "default_fallback")]
    pub fallback: u8,
}

use Predicate::*;

fn target(tag: UnitTag) -> Predicate {
    TargetTag { tag }
}

fn attacker(tag: UnitTag) -> Predicate {
    AttackerTag { tag }
}

impl PriorityTable {
    pub fn priority(&self, inputs: &RuleInputs) -> u8 {
        self.rules
            .iter()
            .find(|rule| rule.matches(inputs))
            .map_or(self.fallback, |rule| rule.priority)
    }

    /// Priorities for melee attackers
    ///
    /// Critical support units first, then anything armed, then busy
    /// workers, then buildings by importance.
    pub fn melee() -> Self {
        let r = PriorityRule::new;
        Self {
            rules: vec![
                // Cloaked attackers hunt what can reveal them
                r(10, vec![attacker(UnitTag::Cloaked), target(UnitTag::Mine)], vec![]),
                r(
                    9,
                    vec![attacker(UnitTag::Cloaked), target(UnitTag::Detector), target(UnitTag::Building)],
                    vec![],
                ),
                r(8, vec![attacker(UnitTag::Cloaked), target(UnitTag::Worker)], vec![]),
                r(8, vec![TargetOutsideOwnRange { margin: 32.0 }], vec![target(UnitTag::Worker)]),
                r(
                    12,
                    vec![target(UnitTag::Worker), TargetConstructingTag { tag: UnitTag::Bunker }],
                    vec![],
                ),
                r(10, vec![target(UnitTag::Bunker)], vec![]),
                r(12, vec![target(UnitTag::Critical)], vec![]),
                r(11, vec![TargetArmed], vec![target(UnitTag::Worker), target(UnitTag::Building), TargetFlying]),
                r(11, vec![target(UnitTag::Worker), TargetBusy], vec![]),
                r(11, vec![target(UnitTag::Worker), TargetInNarrowChoke], vec![]),
                r(9, vec![target(UnitTag::Worker)], vec![]),
                r(9, vec![target(UnitTag::Detector), target(UnitTag::Building)], vec![]),
                r(11, vec![target(UnitTag::StaticDefense)], vec![]),
                r(10, vec![target(UnitTag::Tunnel)], vec![]),
                r(5, vec![target(UnitTag::ResourceDepot)], vec![]),
                r(5, vec![target(UnitTag::Tech)], vec![]),
                r(5, vec![target(UnitTag::Spellcaster)], vec![]),
                r(1, vec![target(UnitTag::Addon)], vec![]),
                r(3, vec![TargetHasCost], vec![]),
            ],
            fallback: 1,
        }
    }

    /// Priorities for ranged attackers
    pub fn ranged() -> Self {
        let r = PriorityRule::new;
        let suicide_flyer = || vec![attacker(UnitTag::Suicide), AttackerFlying];
        let with = |mut base: Vec<Predicate>, extra: Predicate| {
            base.push(extra);
            base
        };
        Self {
            rules: vec![
                // Suicide flyers only spend themselves on worthwhile air targets
                r(0, suicide_flyer(), vec![TargetFlying]),
                r(0, with(suicide_flyer(), target(UnitTag::Interceptor)), vec![]),
                r(0, with(suicide_flyer(), target(UnitTag::Suicide)), vec![]),
                r(0, with(suicide_flyer(), target(UnitTag::Transport)), vec![TargetArmed]),
                r(10, with(suicide_flyer(), target(UnitTag::SupportCaster)), vec![]),
                r(9, suicide_flyer(), vec![]),
                r(0, vec![attacker(UnitTag::Carrier), target(UnitTag::Interceptor)], vec![]),
                r(1, vec![target(UnitTag::Addon)], vec![]),
                // Anything busy near our base is suspicious
                r(
                    12,
                    vec![TargetNearHome { radius: 1000.0 }, target(UnitTag::Worker), TargetBusy],
                    vec![],
                ),
                r(
                    10,
                    vec![TargetNearHome { radius: 1000.0 }, target(UnitTag::Building), TargetArmed],
                    vec![],
                ),
                r(8, vec![TargetNearHome { radius: 1000.0 }, target(UnitTag::Building)], vec![]),
                r(12, vec![AttackerFlying, target(UnitTag::Suicide), TargetFlying], vec![]),
                r(12, vec![target(UnitTag::Mine)], vec![AttackerFlying, TargetBurrowed]),
                r(12, vec![target(UnitTag::Suicide)], vec![AttackerFlying, TargetFlying]),
                r(12, vec![OwnCloakedUnits, target(UnitTag::Detector)], vec![target(UnitTag::Building)]),
                r(11, vec![attacker(UnitTag::AntiAir), TargetFlying], vec![target(UnitTag::Building)]),
                r(12, vec![target(UnitTag::Critical)], vec![target(UnitTag::Siege)]),
                r(11, vec![target(UnitTag::SupportCaster)], vec![]),
                r(9, vec![target(UnitTag::Bunker)], vec![]),
                r(
                    8,
                    vec![TargetThreatens, TargetOutsideOwnRange { margin: 48.0 }],
                    vec![target(UnitTag::Worker)],
                ),
                r(10, vec![TargetThreatens], vec![target(UnitTag::Worker)]),
                r(10, vec![target(UnitTag::Transport)], vec![target(UnitTag::Building)]),
                r(10, vec![target(UnitTag::Detector)], vec![target(UnitTag::Building)]),
                r(10, vec![target(UnitTag::Suicide), TargetFlying], vec![]),
                r(11, vec![target(UnitTag::Worker), TargetInNarrowChoke], vec![]),
                r(11, vec![target(UnitTag::Worker), TargetRepairingArmed], vec![]),
                r(10, vec![target(UnitTag::Worker), TargetRepairingOutranging], vec![]),
                r(10, vec![target(UnitTag::Worker), TargetWithin { distance: 32.0 }], vec![]),
                r(9, vec![target(UnitTag::Worker), TargetConstructing], vec![]),
                r(8, vec![target(UnitTag::Worker)], vec![]),
                r(9, vec![target(UnitTag::Siege)], vec![]),
                r(8, vec![target(UnitTag::Carrier)], vec![]),
                r(10, vec![target(UnitTag::Tunnel)], vec![]),
                r(7, vec![target(UnitTag::Spellcaster)], vec![]),
                r(7, vec![TargetArmed], vec![]),
                r(7, vec![target(UnitTag::Tech)], vec![]),
                r(6, vec![target(UnitTag::ResourceDepot)], vec![]),
                r(5, vec![target(UnitTag::Supply)], vec![]),
                r(5, vec![target(UnitTag::Production)], vec![]),
                // Unfinished or unpowered buildings are worth little
                r(
                    2,
                    vec![target(UnitTag::Building), TargetIncomplete],
                    vec![target(UnitTag::ResourceDepot), TargetArmed],
                ),
                r(
                    2,
                    vec![target(UnitTag::Building), TargetUnpowered],
                    vec![target(UnitTag::ResourceDepot), TargetArmed],
                ),
                r(4, vec![TargetHasGasCost], vec![]),
                r(3, vec![TargetHasCost], vec![]),
            ],
            fallback: 1,
        }
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self::melee()
    }
}
