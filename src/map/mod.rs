pub mod routes;
pub mod territory;
pub mod unit;

pub use routes::Passability;
pub use territory::{Territory, TerritoryGraph, TerritoryKind};
pub use unit::{Unit, UnitKind};
