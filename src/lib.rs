//! Warband - squad and cluster tactics for real-time strategy armies
//!
//! Each tick the caller builds a [`TickContext`] over its unit data, terrain,
//! pathing, and influence grids, then calls [`SquadRegistry::update`] to get
//! one movement or attack intent per unit.

pub mod cluster;
pub mod core;
pub mod orders;
pub mod spatial;
pub mod squad;
pub mod world;

pub use crate::core::{Result, TacticsConfig, TacticsError};
pub use orders::{Action, CommandBuffer, UnitCommand};
pub use squad::{Squad, SquadRegistry};
pub use world::{Sandbox, TickContext};
