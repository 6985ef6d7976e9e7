//! Territory valuation
//!
//! Two scales, used at different stages. The *defense value* ranks
//! territories for the defense prioritizer: it is local, built from
//! production, factories, capitals, garrisons and neighbors. The *strategic
//! value* ranks territories for the best-territory placement passes: it is
//! global, a distance-discounted sum of nearby enemy production, so units
//! drift toward the front instead of garrisoning the interior.

use ahash::{AHashMap, AHashSet};

use crate::core::types::{PlayerId, Relations, TerritoryId, UnitId};
use crate::map::routes::Passability;
use crate::map::territory::TerritoryGraph;
use crate::planner::assessment::TerritoryAssessment;

/// Total unit value of a set of unit ids
pub fn tuv(graph: &TerritoryGraph, units: &[UnitId]) -> f64 {
    units.iter().map(|&id| graph.unit(id).cost as f64).sum()
}

/// Whether any allied unit able to produce sits in the territory
pub fn has_factory(graph: &TerritoryGraph, relations: &Relations, player: PlayerId, t: TerritoryId) -> bool {
    graph
        .units_in(t)
        .any(|u| u.can_produce_units && relations.is_allied(player, u.owner))
}

/// Defense value of one territory, the sort key of the prioritizer
///
/// Production, factories, immovable garrison value and weighted neighbor
/// production add up; capitals multiply. A garrison owned entirely by
/// allies halves the value, and a water territory without owned sea units
/// is worth nothing to defend.
pub fn defense_value(
    graph: &TerritoryGraph,
    relations: &Relations,
    player: PlayerId,
    assessment: &TerritoryAssessment,
    factory_present: bool,
) -> f64 {
    let t = assessment.territory;
    let territory = graph.territory(t);

    let owner_multiplier = if territory.is_water() {
        let has_owned_sea = assessment
            .cant_move_units
            .iter()
            .chain(assessment.units.iter())
            .any(|&id| {
                let unit = graph.unit(id);
                unit.owner == player && unit.is_sea()
            });
        if has_owned_sea {
            1.0
        } else {
            return 0.0;
        }
    } else {
        let garrison_owned = assessment
            .cant_move_units
            .iter()
            .any(|&id| graph.unit(id).owner == player);
        if !assessment.cant_move_units.is_empty() && !garrison_owned {
            0.5
        } else {
            1.0
        }
    };

    let mut neighbor_value = 0.0;
    for &n in graph.neighbors(t) {
        let neighbor = graph.territory(n);
        if !neighbor.is_land() {
            continue;
        }
        match neighbor.owner {
            Some(owner) if relations.is_enemy(player, owner) => {
                neighbor_value += neighbor.production as f64;
            }
            Some(_) => neighbor_value += 0.1 * neighbor.production as f64,
            None => {}
        }
    }

    let garrison_tuv = tuv(graph, &assessment.cant_move_units);
    let factory_bonus = if factory_present { 10.0 } else { 0.0 };
    let is_my_capital = territory.is_capital && territory.owner == Some(player);
    let is_other_capital = territory.is_capital && territory.owner != Some(player);

    owner_multiplier
        * (2.0 * territory.production as f64
            + factory_bonus
            + 0.5 * garrison_tuv
            + 0.5 * neighbor_value)
        * (1.0 + 10.0 * is_my_capital as u8 as f64)
        * (1.0 + 4.0 * is_other_capital as u8 as f64)
}

/// Discount radius for strategic values
const STRATEGIC_RADIUS: u32 = 4;

/// Strategic value per land territory: enemy production nearby, halved per
/// step of land distance, capitals double-weighted. Territories known to be
/// unholdable are worth zero so placement never walks units into them.
pub fn strategic_values(
    graph: &TerritoryGraph,
    relations: &Relations,
    player: PlayerId,
    cant_hold: &AHashSet<TerritoryId>,
) -> AHashMap<TerritoryId, f64> {
    let enemy_land: Vec<&crate::map::territory::Territory> = graph
        .territories()
        .filter(|t| {
            t.is_land()
                && t.owner
                    .map(|o| relations.is_enemy(player, o))
                    .unwrap_or(false)
        })
        .collect();

    let passable = Passability::land(relations, player, true);
    let mut values: AHashMap<TerritoryId, f64> = AHashMap::new();
    for territory in graph.territories().filter(|t| t.is_land()) {
        if cant_hold.contains(&territory.id) {
            values.insert(territory.id, 0.0);
            continue;
        }
        let mut value = 0.0;
        for enemy in &enemy_land {
            let Some(distance) = graph.distance(territory.id, enemy.id, &passable) else {
                continue;
            };
            if distance > STRATEGIC_RADIUS {
                continue;
            }
            let weight = if enemy.is_capital { 2.0 } else { 1.0 };
            value += weight * enemy.production as f64 / f64::powi(2.0, distance as i32);
        }
        values.insert(territory.id, value);
    }
    values
}

/// Strategic value per water territory: enemy coastal production reachable
/// within a short sail, discounted by distance
pub fn sea_strategic_values(
    graph: &TerritoryGraph,
    relations: &Relations,
    player: PlayerId,
    cant_hold: &AHashSet<TerritoryId>,
) -> AHashMap<TerritoryId, f64> {
    let mut values: AHashMap<TerritoryId, f64> = AHashMap::new();
    for territory in graph.territories().filter(|t| t.is_water()) {
        if cant_hold.contains(&territory.id) {
            values.insert(territory.id, 0.0);
            continue;
        }
        let mut value = 0.0;
        let mut nearby = vec![territory.id];
        nearby.extend(graph.neighbors_within(territory.id, 2, |t| t.is_water()));
        let mut seen: AHashSet<TerritoryId> = AHashSet::new();
        for water in nearby {
            let distance = graph
                .distance(territory.id, water, |t| t.is_water())
                .unwrap_or(0);
            for &n in graph.neighbors(water) {
                let coast = graph.territory(n);
                if !coast.is_land() || !seen.insert(n) {
                    continue;
                }
                let enemy = coast
                    .owner
                    .map(|o| relations.is_enemy(player, o))
                    .unwrap_or(false);
                if enemy {
                    value += coast.production as f64 / f64::powi(2.0, distance as i32 + 1);
                }
            }
        }
        values.insert(territory.id, value);
    }
    values
}
