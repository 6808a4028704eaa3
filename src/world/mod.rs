//! The world as seen by the tactics engine
//!
//! Unit types and live unit state, the collaborator traits the engine reads
//! each tick (terrain, pathing, influence grids), and an in-memory sandbox
//! implementing all of them.

pub mod context;
pub mod sandbox;
pub mod terrain;
pub mod unit_type;
pub mod units;

pub use context::TickContext;
pub use sandbox::{Sandbox, SandboxGrid, SandboxMap};
pub use terrain::{Choke, InfluenceGrid, Pathing, Terrain};
pub use unit_type::{roster, DamageType, UnitCatalog, UnitSize, UnitTag, UnitType, UnitValue, Weapon};
pub use units::{StatusEffects, UnitState, UnitStore, UnitView, Upgrades};
