//! Squads: groups of clusters sharing an objective, and the registry that
//! ticks them

pub mod policy;
pub mod registry;
pub mod squad;
pub mod support;

pub use policy::{AttackPolicy, DefendPolicy, MopUpPolicy, SquadFrame, SquadPolicy};
pub use registry::SquadRegistry;
pub use squad::Squad;
