//! Defense prioritization
//!
//! Ranks assessed territories by defense value and filters out the ones
//! not worth contesting this turn. The survivors feed the window search in
//! the assignment planner, highest value first.

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::core::config::PlannerConfig;
use crate::core::types::{PlayerId, Relations, TerritoryId};
use crate::map::territory::TerritoryGraph;
use crate::planner::assessment::{sorted_keys, MoveMap};
use crate::planner::value;

/// Immovable-garrison value below which an amphib-only territory is
/// considered not worth a dedicated defense
const LOW_GARRISON_TUV: f64 = 5.0;

/// Score every territory, then return the ones worth defending in
/// descending value order.
pub fn prioritize(
    graph: &TerritoryGraph,
    relations: &Relations,
    player: PlayerId,
    config: &PlannerConfig,
    move_map: &mut MoveMap,
    strategic_values: &AHashMap<TerritoryId, f64>,
    sea_strategic_values: &AHashMap<TerritoryId, f64>,
) -> Vec<TerritoryId> {
    for t in sorted_keys(move_map) {
        let factory_present = value::has_factory(graph, relations, player, t);
        let assessment = &move_map[&t];
        let defense_value = value::defense_value(graph, relations, player, assessment, factory_present);
        if let Some(assessment) = move_map.get_mut(&t) {
            assessment.value = defense_value;
        }
    }

    let mut prioritized: Vec<TerritoryId> = move_map.keys().copied().collect();
    prioritized.sort_by_key(|&t| (OrderedFloat(-move_map[&t].value), t));

    prioritized.retain(|&t| {
        let assessment = &move_map[&t];
        let territory = graph.territory(t);
        let factory_present = value::has_factory(graph, relations, player, t);
        let min = &assessment.min_battle_outcome;

        let air_threat_only = territory.is_land()
            && assessment
                .max_enemy_units
                .iter()
                .all(|&id| graph.unit(id).is_air());
        let safe_without_help = !factory_present
            && (min.tuv_swing <= 0.0 || !min.has_land_unit_remaining);
        let already_held = min.tuv_swing <= 0.0
            && min.win_percentage < (100.0 - config.win_percentage);
        let no_enemy_land_neighbor = territory.is_land()
            && !factory_present
            && !graph.neighbors(t).iter().any(|&n| {
                let neighbor = graph.territory(n);
                neighbor.is_land()
                    && neighbor
                        .owner
                        .map(|o| relations.is_enemy(player, o))
                        .unwrap_or(false)
            });
        let amphib_reinforcement_only = territory.is_land()
            && !factory_present
            && !assessment
                .max_units
                .iter()
                .any(|&id| graph.unit(id).is_land())
            && value::tuv(graph, &assessment.cant_move_units) < LOW_GARRISON_TUV;

        let keep = assessment.can_hold
            && assessment.value > 0.0
            && !air_threat_only
            && !safe_without_help
            && !already_held
            && !no_enemy_land_neighbor
            && !amphib_reinforcement_only;
        if !keep {
            debug!(territory = %territory.name, value = assessment.value, "dropped from defense priorities");
        }
        keep
    });

    // Factories with quiet hinterlands still need their sea lanes: bring
    // back the most strategically valuable contested sea neighbor of each
    // low-value coastal factory
    for t in sorted_keys(move_map) {
        let territory = graph.territory(t);
        let owned_factory = territory.is_land()
            && territory.owner == Some(player)
            && graph
                .units_in(t)
                .any(|u| u.can_produce_units && u.owner == player);
        if !owned_factory {
            continue;
        }
        if strategic_values.get(&t).copied().unwrap_or(0.0) >= 1.0 {
            continue;
        }
        let best_sea = graph
            .neighbors(t)
            .iter()
            .copied()
            .filter(|&n| graph.territory(n).is_water())
            .filter(|n| {
                move_map
                    .get(n)
                    .map(|a| a.can_hold && !a.max_enemy_units.is_empty())
                    .unwrap_or(false)
            })
            .filter_map(|n| {
                let strategic = sea_strategic_values.get(&n).copied().unwrap_or(0.0);
                (strategic > 0.0).then_some((n, strategic))
            })
            .max_by_key(|&(n, strategic)| (OrderedFloat(strategic), n));
        if let Some((sea, _)) = best_sea {
            if prioritized.contains(&sea) {
                continue;
            }
            debug!(territory = %graph.territory(sea).name, "re-added factory sea lane");
            prioritized.push(sea);
        }
    }

    prioritized
}
