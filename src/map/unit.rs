//! Unit model
//!
//! Units are flat records held by the territory graph's arena. Combat cost
//! ("TUV" - total unit value) is the normalized trade-off metric every
//! valuation in the planner is denominated in.

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, TerritoryId, UnitId};

/// Broad movement category of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    Land,
    Sea,
    Air,
    Transport,
    /// Factories, AA guns and other non-combat installations
    Infrastructure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub owner: PlayerId,
    pub kind: UnitKind,
    /// Combat cost (TUV)
    pub cost: u32,
    pub attack: u32,
    pub defense: u32,
    pub movement: u32,
    pub location: TerritoryId,
    /// Cargo space offered when this unit is a transport
    pub transport_capacity: u32,
    /// Cargo space consumed when this unit is carried by a transport
    pub transport_cost: u32,
    /// Air units this unit can host when it is a carrier
    pub carrier_capacity: u32,
    pub can_land_on_carrier: bool,
    pub is_aa: bool,
    pub can_produce_units: bool,
    /// Sea units able to shore-bombard during amphibious assaults
    pub can_bombard: bool,
}

impl Unit {
    pub fn new(id: UnitId, owner: PlayerId, kind: UnitKind, location: TerritoryId) -> Self {
        Self {
            id,
            owner,
            kind,
            cost: 0,
            attack: 0,
            defense: 0,
            movement: 0,
            location,
            transport_capacity: 0,
            transport_cost: 0,
            carrier_capacity: 0,
            can_land_on_carrier: false,
            is_aa: false,
            can_produce_units: false,
            can_bombard: false,
        }
    }

    pub fn is_land(&self) -> bool {
        self.kind == UnitKind::Land
    }

    pub fn is_sea(&self) -> bool {
        matches!(self.kind, UnitKind::Sea | UnitKind::Transport)
    }

    pub fn is_air(&self) -> bool {
        self.kind == UnitKind::Air
    }

    pub fn is_transport(&self) -> bool {
        self.kind == UnitKind::Transport
    }

    pub fn is_infrastructure(&self) -> bool {
        self.kind == UnitKind::Infrastructure
    }

    pub fn is_carrier(&self) -> bool {
        self.carrier_capacity > 0
    }

    /// Land units that fit on a transport
    pub fn is_transportable(&self) -> bool {
        self.is_land() && self.transport_cost > 0
    }
}
