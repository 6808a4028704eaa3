//! In-memory battlefield implementing every collaborator trait
//!
//! Used by the harness binary and by tests to drive squads without a game.

use glam::Vec2;

use crate::core::config::TacticsConfig;
use crate::core::error::Result;
use crate::core::types::{Side, Tick, UnitId, UnitTypeId};
use crate::orders::{Action, CommandBuffer};
use crate::spatial::geometry::{TilePos, TILE_SIZE};
use crate::spatial::grid::TileGrid;
use crate::spatial::navigation::NavigationGrid;
use crate::world::context::TickContext;
use crate::world::terrain::{Choke, InfluenceGrid, Pathing, Terrain};
use crate::world::unit_type::UnitCatalog;
use crate::world::units::{UnitState, UnitStore};

/// Tile map with walkability, elevation, chokes, and cached navigation grids
#[derive(Debug, Clone)]
pub struct SandboxMap {
    walkable: TileGrid<bool>,
    elevation: TileGrid<u8>,
    chokes: Vec<Choke>,
    home: Vec2,
    grids: Vec<NavigationGrid>,
}

impl SandboxMap {
    /// Fully walkable flat map, home in the top-left corner
    pub fn open(width: usize, height: usize) -> Self {
        Self {
            walkable: TileGrid::filled(width, height, true),
            elevation: TileGrid::new(width, height),
            chokes: Vec::new(),
            home: TilePos::new(2, 2).center(),
            grids: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.walkable.width
    }

    pub fn height(&self) -> usize {
        self.walkable.height
    }

    pub fn set_walkable(&mut self, from: TilePos, to: TilePos, walkable: bool) {
        self.walkable.fill_rect(from, to, walkable);
        self.grids.clear();
    }

    pub fn set_elevation(&mut self, from: TilePos, to: TilePos, level: u8) {
        self.elevation.fill_rect(from, to, level);
    }

    pub fn add_choke(&mut self, choke: Choke) {
        self.chokes.push(choke);
    }

    pub fn set_home(&mut self, home: Vec2) {
        self.home = home;
    }

    pub fn tile_walkable(&self, tile: TilePos) -> bool {
        self.walkable.get(tile).copied().unwrap_or(false)
    }

    /// Precompute a navigation grid toward `destination`
    pub fn add_navigation_grid(&mut self, destination: Vec2) {
        let grid = self.build_grid(destination);
        self.grids.retain(|g| TilePos::containing(g.destination) != TilePos::containing(destination));
        self.grids.push(grid);
    }

    fn build_grid(&self, destination: Vec2) -> NavigationGrid {
        NavigationGrid::build(self.width(), self.height(), destination, |t| self.tile_walkable(t))
    }
}

impl Terrain for SandboxMap {
    fn is_walkable(&self, pos: Vec2) -> bool {
        self.tile_walkable(TilePos::containing(pos))
    }

    fn elevation(&self, pos: Vec2) -> u8 {
        self.elevation.sample(pos).copied().unwrap_or(0)
    }

    fn chokes(&self) -> &[Choke] {
        &self.chokes
    }

    fn home_position(&self) -> Vec2 {
        self.home
    }
}

impl Pathing for SandboxMap {
    fn ground_distance(&self, from: Vec2, to: Vec2) -> Option<f32> {
        if !self.is_walkable(from) || !self.is_walkable(to) {
            return None;
        }
        match self.navigation_grid(to) {
            Some(grid) => grid.path_distance(from),
            None => self.build_grid(to).path_distance(from),
        }
    }

    fn navigation_grid(&self, destination: Vec2) -> Option<&NavigationGrid> {
        let tile = TilePos::containing(destination);
        self.grids
            .iter()
            .find(|g| TilePos::containing(g.destination) == tile)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct InfluenceCell {
    detection: i32,
    ground: i32,
    air: i32,
    static_ground: i32,
}

/// Influence values painted onto tiles
#[derive(Debug, Clone)]
pub struct SandboxGrid {
    cells: TileGrid<InfluenceCell>,
}

impl SandboxGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            cells: TileGrid::new(width, height),
        }
    }

    fn paint(&mut self, center: Vec2, radius: f32, apply: impl Fn(&mut InfluenceCell)) {
        let reach = (radius / TILE_SIZE).ceil() as i32 + 1;
        let origin = TilePos::containing(center);
        for y in origin.y - reach..=origin.y + reach {
            for x in origin.x - reach..=origin.x + reach {
                let tile = TilePos::new(x, y);
                if tile.center().distance(center) > radius {
                    continue;
                }
                if let Some(cell) = self.cells.get_mut(tile) {
                    apply(cell);
                }
            }
        }
    }

    pub fn add_detection(&mut self, center: Vec2, radius: f32) {
        self.paint(center, radius, |c| c.detection += 1);
    }

    pub fn add_ground_threat(&mut self, center: Vec2, radius: f32, value: i32) {
        self.paint(center, radius, |c| c.ground += value);
    }

    pub fn add_air_threat(&mut self, center: Vec2, radius: f32, value: i32) {
        self.paint(center, radius, |c| c.air += value);
    }

    pub fn add_static_ground_threat(&mut self, center: Vec2, radius: f32, value: i32) {
        self.paint(center, radius, |c| {
            c.static_ground += value;
            c.ground += value;
        });
    }

    fn cell(&self, pos: Vec2) -> InfluenceCell {
        self.cells.sample(pos).copied().unwrap_or_default()
    }
}

impl InfluenceGrid for SandboxGrid {
    fn detection(&self, pos: Vec2) -> i32 {
        self.cell(pos).detection
    }

    fn ground_threat(&self, pos: Vec2) -> i32 {
        self.cell(pos).ground
    }

    fn air_threat(&self, pos: Vec2) -> i32 {
        self.cell(pos).air
    }

    fn static_ground_threat(&self, pos: Vec2) -> i32 {
        self.cell(pos).static_ground
    }
}

/// A complete battlefield: map, influence grids, units, and config
pub struct Sandbox {
    pub map: SandboxMap,
    pub my_grid: SandboxGrid,
    pub enemy_grid: SandboxGrid,
    pub units: UnitStore,
    pub catalog: UnitCatalog,
    pub config: TacticsConfig,
    next_id: u32,
}

impl Sandbox {
    /// Open map with the bundled roster and default config
    pub fn new(width: usize, height: usize) -> Result<Self> {
        Ok(Self::with_map(SandboxMap::open(width, height), UnitCatalog::standard()?))
    }

    pub fn with_map(map: SandboxMap, catalog: UnitCatalog) -> Self {
        let (width, height) = (map.width(), map.height());
        Self {
            map,
            my_grid: SandboxGrid::new(width, height),
            enemy_grid: SandboxGrid::new(width, height),
            units: UnitStore::new(),
            catalog,
            config: TacticsConfig::default(),
            next_id: 1,
        }
    }

    /// Place a full-health unit and return its id
    pub fn spawn(&mut self, type_id: UnitTypeId, side: Side, position: Vec2) -> Result<UnitId> {
        let unit_type = self.catalog.try_get(type_id)?;
        let id = UnitId(self.next_id);
        self.next_id += 1;
        self.units.insert(UnitState::new(id, unit_type, side, position));
        Ok(id)
    }

    pub fn context(&self, tick: Tick) -> TickContext<'_> {
        TickContext {
            tick,
            units: &self.units,
            catalog: &self.catalog,
            terrain: &self.map,
            pathing: &self.map,
            my_grid: &self.my_grid,
            enemy_grid: &self.enemy_grid,
            config: &self.config,
        }
    }

    pub fn set_position(&mut self, unit: UnitId, position: Vec2) {
        if let Some(state) = self.units.get_mut(unit) {
            state.position = position;
        }
    }

    pub fn kill(&mut self, unit: UnitId) {
        if let Some(state) = self.units.get_mut(unit) {
            state.health = 0;
            state.shields = 0;
        }
    }

    /// Move units toward their move intents at top speed
    ///
    /// Attacks are not resolved; the sandbox only animates positioning.
    pub fn advance(&mut self, commands: &CommandBuffer) {
        for command in commands.iter() {
            let Action::Move { x, y } = command.action else {
                continue;
            };
            let Some(state) = self.units.get(command.unit) else {
                continue;
            };
            let Some(kind) = self.catalog.get(state.type_id) else {
                continue;
            };
            let speed = kind.top_speed * state.upgrades.speed_multiplier;
            let offset = Vec2::new(x, y) - state.position;
            let step = if offset.length() <= speed {
                offset
            } else {
                offset.normalize_or_zero() * speed
            };
            let next = state.position + step;
            if kind.is_flyer() || self.map.is_walkable(next) {
                self.set_position(command.unit, next);
            }
        }
    }
}

impl Sandbox {
    /// Apply attack intents whose attacker is ready and in range
    ///
    /// Shields absorb damage before health. Returns the number of hits
    /// landed.
    pub fn resolve_attacks(&mut self, commands: &CommandBuffer, tick: Tick) -> usize {
        let ctx = self.context(tick);
        let hits: Vec<(UnitId, UnitId, i32, u32)> = commands
            .iter()
            .filter_map(|command| {
                let Action::Attack(target) = command.action else {
                    return None;
                };
                let attacker = ctx.view(command.unit)?;
                let victim = ctx.view(target)?;
                let ready = tick >= attacker.state.cooldown_until && attacker.is_ready(tick);
                if !ready || !attacker.can_attack(&victim) || !attacker.in_range_of(&victim, 0.0) {
                    return None;
                }
                let cooldown = attacker.cooldown_against(&victim)?;
                Some((command.unit, target, attacker.damage_against(&victim), cooldown))
            })
            .collect();

        for (attacker, target, damage, cooldown) in &hits {
            if let Some(state) = self.units.get_mut(*attacker) {
                state.cooldown_until = tick + *cooldown as Tick;
                state.last_seen_attacking = Some(tick);
            }
            if let Some(state) = self.units.get_mut(*target) {
                let absorbed = state.shields.min(*damage);
                state.shields -= absorbed;
                state.health = (state.health - (damage - absorbed)).max(0);
            }
        }
        hits.len()
    }
}
