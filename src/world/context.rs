//! Read-only view of the world for one engine tick

use glam::Vec2;

use crate::core::config::TacticsConfig;
use crate::core::types::{Side, Tick, UnitId};
use crate::world::terrain::{InfluenceGrid, Pathing, Terrain};
use crate::world::unit_type::UnitCatalog;
use crate::world::units::{UnitStore, UnitView};

/// Everything per-tick logic may consult
///
/// Built by the caller each tick; the engine holds no references past the
/// call that receives it.
#[derive(Clone, Copy)]
pub struct TickContext<'a> {
    pub tick: Tick,
    pub units: &'a UnitStore,
    pub catalog: &'a UnitCatalog,
    pub terrain: &'a dyn Terrain,
    pub pathing: &'a dyn Pathing,
    /// Own detection coverage and threat
    pub my_grid: &'a dyn InfluenceGrid,
    /// Enemy detection coverage and threat
    pub enemy_grid: &'a dyn InfluenceGrid,
    pub config: &'a TacticsConfig,
}

impl<'a> TickContext<'a> {
    /// Live unit with a known type
    pub fn view(&self, id: UnitId) -> Option<UnitView<'a>> {
        let state = self.units.get(id).filter(|s| s.is_alive())?;
        let kind = self.catalog.get(state.type_id)?;
        Some(UnitView::new(state, kind))
    }

    pub fn exists(&self, id: UnitId) -> bool {
        self.view(id).is_some()
    }

    /// Live enemy units within `radius` of `center`, in id order
    pub fn enemies_near(&self, center: Vec2, radius: f32) -> Vec<UnitView<'a>> {
        self.units
            .side(Side::Enemy)
            .filter(|s| s.position.distance(center) <= radius)
            .filter_map(|s| self.view(s.id))
            .collect()
    }

    pub fn enemies(&self) -> Vec<UnitView<'a>> {
        self.units
            .side(Side::Enemy)
            .filter_map(|s| self.view(s.id))
            .collect()
    }

    /// Path distance from `from` to `target`
    ///
    /// Prefers the navigation grid toward `target`, falling back to the
    /// pathing provider's ground distance.
    pub fn path_distance(&self, from: Vec2, target: Vec2) -> Option<f32> {
        self.pathing
            .navigation_grid(target)
            .and_then(|grid| grid.path_distance(from))
            .or_else(|| self.pathing.ground_distance(from, target))
    }
}
