//! Data-driven unit type definitions and the unit catalog
//!
//! Types are loaded from TOML rosters; the catalog also precomputes the
//! per-type value split used to score combat simulations.

use ahash::AHashMap;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TacticsError};
use crate::core::types::UnitTypeId;

/// Size class, used for damage-type modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSize {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    #[default]
    Normal,
    Explosive,
    Concussive,
}

impl DamageType {
    /// Fraction of damage dealt against a target of the given size
    pub fn modifier(self, size: UnitSize) -> f32 {
        match (self, size) {
            (DamageType::Normal, _) => 1.0,
            (DamageType::Explosive, UnitSize::Small) => 0.5,
            (DamageType::Explosive, UnitSize::Medium) => 0.75,
            (DamageType::Explosive, UnitSize::Large) => 1.0,
            (DamageType::Concussive, UnitSize::Small) => 1.0,
            (DamageType::Concussive, UnitSize::Medium) => 0.5,
            (DamageType::Concussive, UnitSize::Large) => 0.25,
        }
    }
}

fn one() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weapon {
    /// Damage per hit before upgrades, armor, and size modifiers
    pub damage: i32,
    #[serde(default = "one")]
    pub hits: i32,
    /// Ticks between attacks
    pub cooldown: u32,
    #[serde(default)]
    pub min_range: f32,
    pub max_range: f32,
    #[serde(default)]
    pub damage_type: DamageType,
}

/// Role tags consulted by targeting rules and squad bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitTag {
    Worker,
    Building,
    Flyer,
    /// Reveals cloaked and burrowed units
    Detector,
    Spellcaster,
    /// Caster that follows a squad instead of joining its clusters
    SupportCaster,
    Addon,
    ResourceDepot,
    StaticDefense,
    Bunker,
    Transport,
    /// Units whose loss cripples the enemy army (artillery, healers, storm casters)
    Critical,
    Siege,
    /// Permanently cloaked
    Cloaked,
    Suicide,
    Mine,
    /// Specialist that only meaningfully threatens flyers
    AntiAir,
    Tech,
    Supply,
    Production,
    /// Can only attack while burrowed
    BurrowedAttacker,
    Untargetable,
    BounceAttack,
    Tunnel,
    Carrier,
    Interceptor,
    RequiresPower,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitType {
    pub id: UnitTypeId,
    pub name: String,
    pub size: UnitSize,
    pub width: f32,
    pub height: f32,
    pub max_health: i32,
    #[serde(default)]
    pub max_shields: i32,
    #[serde(default)]
    pub armor: i32,
    /// World units per tick
    #[serde(default)]
    pub top_speed: f32,
    pub sight_range: f32,
    #[serde(default)]
    pub ground_weapon: Option<Weapon>,
    #[serde(default)]
    pub air_weapon: Option<Weapon>,
    #[serde(default)]
    pub mineral_cost: i32,
    #[serde(default)]
    pub gas_cost: i32,
    /// Extra value for units whose worth exceeds their build cost
    #[serde(default)]
    pub value_bonus: i32,
    #[serde(default)]
    pub tags: Vec<UnitTag>,
}

impl UnitType {
    pub fn has(&self, tag: UnitTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_building(&self) -> bool {
        self.has(UnitTag::Building)
    }

    pub fn is_flyer(&self) -> bool {
        self.has(UnitTag::Flyer)
    }

    pub fn is_worker(&self) -> bool {
        self.has(UnitTag::Worker)
    }

    pub fn footprint(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn footprint_area(&self) -> f32 {
        self.width * self.height
    }

    pub fn max_ground_range(&self) -> f32 {
        self.ground_weapon.as_ref().map_or(0.0, |w| w.max_range)
    }

    pub fn is_armed(&self) -> bool {
        self.ground_weapon.is_some() || self.air_weapon.is_some()
    }

    /// Whether this type fights at range rather than in melee
    pub fn is_ranged(&self) -> bool {
        self.max_ground_range() > 32.0 || (self.ground_weapon.is_none() && self.air_weapon.is_some())
    }

    /// Resource value: minerals plus double-weighted gas plus any bonus
    pub fn cost(&self) -> i32 {
        self.mineral_cost + 2 * self.gas_cost + self.value_bonus
    }
}

/// Value split used to score simulated health
///
/// A quarter of a unit's cost is counted for it being alive at all; the rest
/// scales with remaining health and shields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnitValue {
    pub base: i32,
    pub scaled: i32,
}

impl UnitValue {
    pub fn for_type(unit_type: &UnitType) -> Self {
        let cost = unit_type.cost().max(0);
        let base = cost >> 2;
        Self {
            base,
            scaled: cost - base,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(rename = "unit", default)]
    units: Vec<UnitType>,
}

/// Registry of unit types with precomputed values
#[derive(Debug, Clone, Default)]
pub struct UnitCatalog {
    types: AHashMap<UnitTypeId, UnitType>,
    values: AHashMap<UnitTypeId, UnitValue>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundled generic roster (`data/units.toml`)
    pub fn standard() -> Result<Self> {
        Self::from_toml_str(include_str!("../../data/units.toml"))
    }

    /// Parse a roster of `[[unit]]` tables
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let roster: RosterFile = toml::from_str(contents)?;
        let mut catalog = Self::new();
        for unit_type in roster.units {
            catalog.insert(unit_type);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, unit_type: UnitType) {
        self.values.insert(unit_type.id, UnitValue::for_type(&unit_type));
        self.types.insert(unit_type.id, unit_type);
    }

    pub fn get(&self, id: UnitTypeId) -> Option<&UnitType> {
        self.types.get(&id)
    }

    pub fn try_get(&self, id: UnitTypeId) -> Result<&UnitType> {
        self.get(id).ok_or(TacticsError::UnknownUnitType(id))
    }

    pub fn value(&self, id: UnitTypeId) -> UnitValue {
        self.values.get(&id).copied().unwrap_or_default()
    }

    /// Look a type up by its roster name
    pub fn by_name(&self, name: &str) -> Option<&UnitType> {
        self.types.values().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Type ids of the bundled roster
pub mod roster {
    use crate::core::types::UnitTypeId;

    pub const DRUDGE: UnitTypeId = UnitTypeId(0);
    pub const BRAWLER: UnitTypeId = UnitTypeId(1);
    pub const LANCER: UnitTypeId = UnitTypeId(2);
    pub const RIFLEMAN: UnitTypeId = UnitTypeId(3);
    pub const OUTRIDER: UnitTypeId = UnitTypeId(4);
    pub const BOMBARD: UnitTypeId = UnitTypeId(5);
    pub const BUNKER: UnitTypeId = UnitTypeId(6);
    pub const CANNON: UnitTypeId = UnitTypeId(7);
    pub const SPORE_TOWER: UnitTypeId = UnitTypeId(8);
    pub const OBSERVER: UnitTypeId = UnitTypeId(9);
    pub const WARDEN: UnitTypeId = UnitTypeId(10);
    pub const OVERSEER: UnitTypeId = UnitTypeId(11);
    pub const FALCON: UnitTypeId = UnitTypeId(12);
    pub const SHADE: UnitTypeId = UnitTypeId(13);
    pub const LURKER: UnitTypeId = UnitTypeId(14);
    pub const MINE: UnitTypeId = UnitTypeId(15);
    pub const TEMPLAR: UnitTypeId = UnitTypeId(16);
    pub const DROPSHIP: UnitTypeId = UnitTypeId(17);
    pub const NEXUS: UnitTypeId = UnitTypeId(18);
    pub const BARRACKS: UnitTypeId = UnitTypeId(19);
    pub const RELAY: UnitTypeId = UnitTypeId(20);
    pub const ARCHIVE: UnitTypeId = UnitTypeId(21);
    pub const WORKSHOP: UnitTypeId = UnitTypeId(22);
    pub const LARVA: UnitTypeId = UnitTypeId(23);
    pub const TUNNEL: UnitTypeId = UnitTypeId(24);
    pub const STINGER: UnitTypeId = UnitTypeId(25);
    pub const GUNSHIP: UnitTypeId = UnitTypeId(26);
    pub const CARRIER: UnitTypeId = UnitTypeId(27);
    pub const INTERCEPTOR: UnitTypeId = UnitTypeId(28);
    pub const FORGE: UnitTypeId = UnitTypeId(29);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_roster_loads() {
        let catalog = UnitCatalog::standard().unwrap();
        assert_eq!(catalog.len(), 30);
        let lancer = catalog.get(roster::LANCER).unwrap();
        assert_eq!(lancer.name, "Lancer");
        assert!(lancer.is_ranged());
        assert!(!catalog.get(roster::BRAWLER).unwrap().is_ranged());
        assert!(catalog.get(roster::OBSERVER).unwrap().has(UnitTag::Detector));
    }

    #[test]
    fn test_value_split() {
        let catalog = UnitCatalog::standard().unwrap();
        // 125 minerals + 2 * 50 gas = 225; base = 225 >> 2 = 56
        let value = catalog.value(roster::LANCER);
        assert_eq!(value.base, 56);
        assert_eq!(value.scaled, 169);
        assert_eq!(catalog.value(UnitTypeId(999)), UnitValue::default());
    }

    #[test]
    fn test_damage_type_modifiers() {
        assert_eq!(DamageType::Concussive.modifier(UnitSize::Large), 0.25);
        assert_eq!(DamageType::Explosive.modifier(UnitSize::Small), 0.5);
        assert_eq!(DamageType::Normal.modifier(UnitSize::Medium), 1.0);
    }

    #[test]
    fn test_custom_roster_defaults() {
        let catalog = UnitCatalog::from_toml_str(
            r#"
            [[unit]]
            id = 3
            name = "Sentry"
            size = "medium"
            width = 20.0
            height = 20.0
            max_health = 80
            sight_range = 200.0
            ground_weapon = { damage = 10, cooldown = 20, max_range = 96.0 }
            "#,
        )
        .unwrap();
        let sentry = catalog.by_name("sentry").unwrap();
        let weapon = sentry.ground_weapon.as_ref().unwrap();
        assert_eq!(weapon.hits, 1);
        assert_eq!(weapon.damage_type, DamageType::Normal);
        assert!(sentry.tags.is_empty());
        assert!(matches!(
            catalog.try_get(UnitTypeId(4)),
            Err(TacticsError::UnknownUnitType(_))
        ));
    }
}
