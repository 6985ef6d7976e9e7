//! Plan execution
//!
//! The planner emits a [`NonCombatPlan`]; an executor applies it to the
//! game state. The bundled [`RecordingExecutor`] validates each order
//! against movement legality and records it, which is enough for driving a
//! game host that applies moves itself.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::error::{PlanError, Result};
use crate::core::types::{Relations, TerritoryId, UnitId};
use crate::map::routes::candidate_destinations;
use crate::map::territory::TerritoryGraph;

/// One unit redeploying to a destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOrder {
    pub unit: UnitId,
    pub from: TerritoryId,
    pub to: TerritoryId,
}

/// One transport ferrying cargo to a coastal destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmphibOrder {
    pub transport: UnitId,
    pub cargo: Vec<UnitId>,
    /// Water territory the transport ends the phase in
    pub unload_at: TerritoryId,
    /// Land territory the cargo ends the phase in
    pub destination: TerritoryId,
}

/// Everything the non-combat planner decided this turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NonCombatPlan {
    pub moves: Vec<MoveOrder>,
    pub amphib: Vec<AmphibOrder>,
}

impl NonCombatPlan {
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.amphib.is_empty()
    }

    /// Number of units given an order, cargo included
    pub fn units_ordered(&self) -> usize {
        self.moves.len()
            + self
                .amphib
                .iter()
                .map(|order| 1 + order.cargo.len())
                .sum::<usize>()
    }
}

pub trait MoveExecutor {
    /// Apply (or validate, when `dry_run`) a finished plan
    fn execute(
        &mut self,
        graph: &TerritoryGraph,
        relations: &Relations,
        plan: &NonCombatPlan,
        dry_run: bool,
    ) -> Result<()>;
}

/// Validates and records orders without mutating any game state
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub orders: Vec<MoveOrder>,
    pub amphib_orders: Vec<AmphibOrder>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate_move(
        &self,
        graph: &TerritoryGraph,
        relations: &Relations,
        order: &MoveOrder,
    ) -> Result<()> {
        let unit = graph.unit(order.unit);
        if unit.location != order.from {
            return Err(PlanError::IllegalMove {
                unit: order.unit,
                destination: order.to,
                reason: "unit is not where the order says it starts".to_string(),
            });
        }
        if !candidate_destinations(graph, relations, unit).contains(&order.to) {
            return Err(PlanError::IllegalMove {
                unit: order.unit,
                destination: order.to,
                reason: "destination is out of movement range".to_string(),
            });
        }
        Ok(())
    }

    fn validate_amphib(
        &self,
        graph: &TerritoryGraph,
        relations: &Relations,
        order: &AmphibOrder,
    ) -> Result<()> {
        let transport = graph.unit(order.transport);
        if !transport.is_transport() {
            return Err(PlanError::IllegalMove {
                unit: order.transport,
                destination: order.unload_at,
                reason: "amphib order on a unit that is not a transport".to_string(),
            });
        }
        if !graph.territory(order.unload_at).is_water()
            || !graph.neighbors(order.unload_at).contains(&order.destination)
        {
            return Err(PlanError::IllegalMove {
                unit: order.transport,
                destination: order.unload_at,
                reason: "unload position is not water adjacent to the destination".to_string(),
            });
        }
        if !candidate_destinations(graph, relations, transport).contains(&order.unload_at) {
            return Err(PlanError::IllegalMove {
                unit: order.transport,
                destination: order.unload_at,
                reason: "unload position is out of movement range".to_string(),
            });
        }
        let mut load = 0;
        for &unit in &order.cargo {
            let cargo = graph.unit(unit);
            if !cargo.is_transportable() {
                return Err(PlanError::IllegalMove {
                    unit,
                    destination: order.destination,
                    reason: "unit cannot be carried by a transport".to_string(),
                });
            }
            load += cargo.transport_cost;
        }
        if load > transport.transport_capacity {
            return Err(PlanError::IllegalMove {
                unit: order.transport,
                destination: order.destination,
                reason: "cargo exceeds transport capacity".to_string(),
            });
        }
        Ok(())
    }
}

impl MoveExecutor for RecordingExecutor {
    fn execute(
        &mut self,
        graph: &TerritoryGraph,
        relations: &Relations,
        plan: &NonCombatPlan,
        dry_run: bool,
    ) -> Result<()> {
        for order in &plan.moves {
            self.validate_move(graph, relations, order)?;
        }
        for order in &plan.amphib {
            self.validate_amphib(graph, relations, order)?;
        }
        if dry_run {
            return Ok(());
        }
        info!(
            moves = plan.moves.len(),
            amphib = plan.amphib.len(),
            "recording non-combat orders"
        );
        self.orders.extend(plan.moves.iter().cloned());
        self.amphib_orders.extend(plan.amphib.iter().cloned());
        Ok(())
    }
}
