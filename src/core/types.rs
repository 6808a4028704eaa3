//! Core type definitions used throughout the codebase

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a unit as reported by the unit-data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a unit type in the [`UnitCatalog`](crate::world::UnitCatalog)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitTypeId(pub u16);

/// Identifier of a cluster, unique within its squad
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Unique identifier for squads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SquadId(pub Uuid);

impl SquadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SquadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SquadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a choke point supplied by the terrain provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChokeId(pub u16);

/// Game tick counter (simulation time unit)
pub type Tick = u64;

/// Which player a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Mine,
    Enemy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squad_ids_are_unique() {
        assert_ne!(SquadId::new(), SquadId::new());
    }

    #[test]
    fn test_unit_ids_order_numerically() {
        let mut ids = vec![UnitId(7), UnitId(2), UnitId(40)];
        ids.sort();
        assert_eq!(ids, vec![UnitId(2), UnitId(7), UnitId(40)]);
        assert_eq!(UnitId(7).to_string(), "#7");
    }
}
