use thiserror::Error;

use crate::core::types::{TerritoryId, UnitId};

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Illegal move for unit {unit:?} to {destination:?}: {reason}")]
    IllegalMove {
        unit: UnitId,
        destination: TerritoryId,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlanError>;
