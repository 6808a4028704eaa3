use thiserror::Error;

use crate::core::types::{SquadId, UnitId, UnitTypeId};

#[derive(Error, Debug)]
pub enum TacticsError {
    #[error("Unit not found: {0}")]
    UnknownUnit(UnitId),

    #[error("Unit type not found: {0:?}")]
    UnknownUnitType(UnitTypeId),

    #[error("Squad not found: {0}")]
    UnknownSquad(SquadId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TacticsError>;
