//! Holdability classification
//!
//! For every assessed territory, decide whether it can plausibly be held
//! against the maximal enemy attack. AA guns defend passively and are
//! excluded from every battle estimate.

use tracing::debug;

use crate::combat::oracle::BattleOracle;
use crate::core::types::UnitId;
use crate::map::territory::TerritoryGraph;
use crate::planner::assessment::{sorted_keys, MoveMap};
use crate::planner::value;
use crate::core::config::PlannerConfig;

fn without_aa(graph: &TerritoryGraph, units: &[UnitId]) -> Vec<UnitId> {
    units
        .iter()
        .copied()
        .filter(|&id| !graph.unit(id).is_aa)
        .collect()
}

/// Classify each territory in the move map, filling `min_battle_outcome`,
/// `can_hold` and the enemy attacker sets from the threat data already
/// stored on the assessments.
pub fn classify(
    graph: &TerritoryGraph,
    config: &PlannerConfig,
    oracle: &dyn BattleOracle,
    move_map: &mut MoveMap,
) {
    for t in sorted_keys(move_map) {
        let assessment = match move_map.get_mut(&t) {
            Some(a) => a,
            None => continue,
        };
        if assessment.max_enemy_units.is_empty() {
            assessment.can_hold = true;
            continue;
        }

        let territory = graph.territory(t);
        let attackers = assessment.max_enemy_units.clone();
        let bombarders = assessment.max_enemy_bombard_units.clone();
        let min_defenders = without_aa(graph, &assessment.cant_move_units);
        let min_outcome = oracle.evaluate(graph, t, &attackers, &min_defenders, &bombarders);
        assessment.min_battle_outcome = min_outcome;

        // Already safe with what cannot leave anyway
        if min_outcome.tuv_swing <= 0.0 && !min_defenders.is_empty() {
            assessment.can_hold = true;
            continue;
        }

        let max_defenders = without_aa(graph, &assessment.max_defenders());
        let amphib_defenders = without_aa(graph, &assessment.max_amphib_units);
        let mut defenders = max_defenders;
        defenders.extend(amphib_defenders);
        defenders.sort_unstable();
        defenders.dedup();

        let max_outcome = oracle.evaluate(graph, t, &attackers, &defenders, &bombarders);

        let extra: Vec<UnitId> = defenders
            .iter()
            .copied()
            .filter(|id| !min_defenders.contains(id))
            .collect();
        let factory_bonus = if graph.units_in(t).any(|u| u.can_produce_units) {
            config.factory_hold_bonus
        } else {
            0.0
        };
        let capital_bonus = if territory.is_capital {
            config.capital_hold_bonus
        } else {
            0.0
        };
        let hold_value = value::tuv(graph, &extra) / config.hold_value_divisor
            * (1.0 + factory_bonus)
            * (1.0 + capital_bonus);

        assessment.can_hold = defenders.len() != min_defenders.len()
            && (max_outcome.tuv_swing - hold_value) < min_outcome.tuv_swing;
        debug!(
            territory = %graph.territory(t).name,
            can_hold = assessment.can_hold,
            min_swing = min_outcome.tuv_swing,
            max_swing = max_outcome.tuv_swing,
            hold_value,
            "classified holdability"
        );
    }
}
