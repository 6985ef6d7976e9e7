//! Amphibious delivery planning
//!
//! For every owned transport, precompute which land territories it could
//! reinforce this turn and from which territories it could pick the cargo
//! up. Movement is split between a leg to the loading position and a leg to
//! the unloading position; any split within the transport's budget counts.

use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;

use crate::core::types::{PlayerId, Relations, TerritoryId, UnitId};
use crate::map::routes::Passability;
use crate::map::territory::{Territory, TerritoryGraph};
use crate::planner::assessment::MoveMap;
use crate::planner::pool::UnitPool;

/// One transport's delivery options for this turn
#[derive(Debug, Clone)]
pub struct AmphibPlan {
    pub transport: UnitId,
    /// Land destination to the territories cargo can be loaded from
    pub transport_map: AHashMap<TerritoryId, AHashSet<TerritoryId>>,
    /// Reachable unload water position to the territories cargo can be
    /// loaded from when unloading there
    pub sea_transport_map: AHashMap<TerritoryId, AHashSet<TerritoryId>>,
}

impl AmphibPlan {
    /// Land destinations in sorted order
    pub fn destinations(&self) -> Vec<TerritoryId> {
        let mut out: Vec<TerritoryId> = self.transport_map.keys().copied().collect();
        out.sort_unstable();
        out
    }

    /// Unload water positions in sorted order
    pub fn sea_positions(&self) -> Vec<TerritoryId> {
        let mut out: Vec<TerritoryId> = self.sea_transport_map.keys().copied().collect();
        out.sort_unstable();
        out
    }
}

/// Build an [`AmphibPlan`] per owned transport with cargo capacity
pub fn build_amphib_plans(
    graph: &TerritoryGraph,
    relations: &Relations,
    player: PlayerId,
) -> Vec<AmphibPlan> {
    let mut transports: Vec<&crate::map::unit::Unit> = graph
        .units()
        .filter(|u| u.owner == player && u.is_transport() && u.transport_capacity > 0)
        .collect();
    transports.sort_by_key(|u| u.id);

    let passable = Passability::sea(graph, relations, player, false);
    transports
        .iter()
        .map(|transport| build_plan(graph, relations, player, transport.id, transport.location, transport.movement, &passable))
        .collect()
}

fn build_plan<F>(
    graph: &TerritoryGraph,
    relations: &Relations,
    player: PlayerId,
    transport: UnitId,
    start: TerritoryId,
    movement: u32,
    passable: &F,
) -> AmphibPlan
where
    F: Fn(&Territory) -> bool,
{
    let from_start = water_distances(graph, start, passable);
    let mut sea_transport_map: AHashMap<TerritoryId, AHashSet<TerritoryId>> = AHashMap::new();
    let mut transport_map: AHashMap<TerritoryId, AHashSet<TerritoryId>> = AHashMap::new();

    for (&unload, &to_unload) in &from_start {
        if to_unload > movement {
            continue;
        }
        // Loading positions: water the transport can visit before heading to
        // the unload position within its budget
        let from_unload = water_distances(graph, unload, passable);
        let mut origins: AHashSet<TerritoryId> = AHashSet::new();
        for (&pickup, &back) in &from_unload {
            let Some(&out) = from_start.get(&pickup) else {
                continue;
            };
            if out + back > movement {
                continue;
            }
            for &n in graph.neighbors(pickup) {
                let t = graph.territory(n);
                if t.is_land() && t.owner.map(|o| relations.is_allied(player, o)).unwrap_or(false) {
                    origins.insert(n);
                }
            }
        }
        if origins.is_empty() {
            continue;
        }
        sea_transport_map.insert(unload, origins.clone());
        for &n in graph.neighbors(unload) {
            let t = graph.territory(n);
            if t.is_land() && t.owner.map(|o| relations.is_allied(player, o)).unwrap_or(false) {
                transport_map.entry(n).or_default().extend(origins.iter().copied());
            }
        }
    }

    AmphibPlan {
        transport,
        transport_map,
        sea_transport_map,
    }
}

/// Water territories reachable from `start` (inclusive, distance 0) with
/// their BFS distances; unbounded depth, the caller applies the budget
fn water_distances<F>(
    graph: &TerritoryGraph,
    start: TerritoryId,
    passable: &F,
) -> AHashMap<TerritoryId, u32>
where
    F: Fn(&Territory) -> bool,
{
    let mut distances: AHashMap<TerritoryId, u32> = AHashMap::new();
    distances.insert(start, 0);
    let mut queue = VecDeque::new();
    queue.push_back((start, 0u32));
    while let Some((current, depth)) = queue.pop_front() {
        for &n in graph.neighbors(current) {
            if !distances.contains_key(&n) && passable(graph.territory(n)) {
                distances.insert(n, depth + 1);
                queue.push_back((n, depth + 1));
            }
        }
    }
    distances
}

/// Pick cargo for one transport from the allowed origin territories:
/// transportable owned land units not already committed elsewhere, most
/// expensive first, as much as fits.
pub fn units_to_transport(
    graph: &TerritoryGraph,
    player: PlayerId,
    transport: UnitId,
    origins: &AHashSet<TerritoryId>,
    excluded: &AHashSet<UnitId>,
) -> Vec<UnitId> {
    let mut candidates: Vec<&crate::map::unit::Unit> = graph
        .units()
        .filter(|u| {
            u.owner == player
                && u.is_transportable()
                && origins.contains(&u.location)
                && !excluded.contains(&u.id)
        })
        .collect();
    candidates.sort_by(|a, b| b.cost.cmp(&a.cost).then(a.id.cmp(&b.id)));

    let mut remaining = graph.unit(transport).transport_capacity;
    let mut cargo = Vec::new();
    for unit in candidates {
        if unit.transport_cost <= remaining {
            remaining -= unit.transport_cost;
            cargo.push(unit.id);
        }
    }
    cargo
}

/// Like [`units_to_transport`] but only takes units whose own movement
/// cannot reach a territory worth more than `value_cap`. Units that could
/// walk somewhere better are left for the land passes.
pub fn units_to_transport_capped(
    graph: &TerritoryGraph,
    player: PlayerId,
    transport: UnitId,
    origins: &AHashSet<TerritoryId>,
    excluded: &AHashSet<UnitId>,
    pool: &UnitPool,
    move_map: &MoveMap,
    value_cap: f64,
) -> Vec<UnitId> {
    let mut candidates: Vec<&crate::map::unit::Unit> = graph
        .units()
        .filter(|u| {
            u.owner == player
                && u.is_transportable()
                && origins.contains(&u.location)
                && !excluded.contains(&u.id)
        })
        .filter(|u| {
            let Some(options) = pool.options(u.id) else {
                return false;
            };
            let best = options
                .iter()
                .filter_map(|t| move_map.get(t))
                .map(|a| a.value)
                .fold(0.0_f64, f64::max);
            best <= value_cap
        })
        .collect();
    candidates.sort_by(|a, b| b.cost.cmp(&a.cost).then(a.id.cmp(&b.id)));

    let mut remaining = graph.unit(transport).transport_capacity;
    let mut cargo = Vec::new();
    for unit in candidates {
        if unit.transport_cost <= remaining {
            remaining -= unit.transport_cost;
            cargo.push(unit.id);
        }
    }
    cargo
}

/// Whether the carriers among `defenders` can host all carrier-dependent
/// air among `defenders` plus `extra_air` more
pub fn carrier_capacity_allows(
    graph: &TerritoryGraph,
    defenders: &[UnitId],
    extra_air: usize,
) -> bool {
    let capacity: u32 = defenders
        .iter()
        .map(|&id| graph.unit(id).carrier_capacity)
        .sum();
    let dependent = defenders
        .iter()
        .filter(|&&id| graph.unit(id).can_land_on_carrier)
        .count()
        + extra_air;
    dependent as u32 <= capacity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::territory::TerritoryKind;
    use crate::map::unit::{Unit, UnitKind};

    fn coastal_map() -> (TerritoryGraph, TerritoryId, TerritoryId, TerritoryId, TerritoryId) {
        let mut graph = TerritoryGraph::new();
        let port = graph.add_territory("port", TerritoryKind::Land, Some(PlayerId(0)), 2);
        let bay = graph.add_territory("bay", TerritoryKind::Water, None, 0);
        let strait = graph.add_territory("strait", TerritoryKind::Water, None, 0);
        let island = graph.add_territory("island", TerritoryKind::Land, Some(PlayerId(0)), 1);
        graph.connect(port, bay);
        graph.connect(bay, strait);
        graph.connect(strait, island);
        (graph, port, bay, strait, island)
    }

    fn transport_at(graph: &mut TerritoryGraph, at: TerritoryId, movement: u32) -> UnitId {
        let mut transport = Unit::new(UnitId(0), PlayerId(0), UnitKind::Transport, at);
        transport.movement = movement;
        transport.transport_capacity = 2;
        graph.add_unit(transport)
    }

    fn infantry_at(graph: &mut TerritoryGraph, at: TerritoryId, cost: u32) -> UnitId {
        let mut unit = Unit::new(UnitId(0), PlayerId(0), UnitKind::Land, at);
        unit.cost = cost;
        unit.movement = 1;
        unit.transport_cost = 1;
        graph.add_unit(unit)
    }

    #[test]
    fn test_plan_reaches_island_from_port() {
        let (mut graph, port, bay, strait, island) = coastal_map();
        transport_at(&mut graph, bay, 2);
        infantry_at(&mut graph, port, 3);

        let plans = build_amphib_plans(&graph, &Relations::new(), PlayerId(0));
        assert_eq!(plans.len(), 1);
        let plan = &plans[0];
        // Load at port (adjacent to bay), sail bay -> strait, unload to island
        assert!(plan.transport_map[&island].contains(&port));
        assert!(plan.sea_transport_map[&strait].contains(&port));
    }

    #[test]
    fn test_plan_respects_movement_budget() {
        let (mut graph, port, _bay, _strait, island) = coastal_map();
        // One movement point: can reach strait only without a loading detour
        transport_at(&mut graph, TerritoryId(1), 1);
        infantry_at(&mut graph, port, 3);

        let plans = build_amphib_plans(&graph, &Relations::new(), PlayerId(0));
        let plan = &plans[0];
        // Loading at port then sailing to the strait needs two points
        assert!(!plan
            .transport_map
            .get(&island)
            .map(|o| o.contains(&port))
            .unwrap_or(false));
    }

    #[test]
    fn test_cargo_prefers_expensive_units_within_capacity() {
        let (mut graph, port, bay, _strait, _island) = coastal_map();
        let transport = transport_at(&mut graph, bay, 2);
        let cheap = infantry_at(&mut graph, port, 3);
        let dear = infantry_at(&mut graph, port, 6);
        let third = infantry_at(&mut graph, port, 4);

        let origins: AHashSet<TerritoryId> = [port].into_iter().collect();
        let cargo = units_to_transport(&graph, PlayerId(0), transport, &origins, &AHashSet::new());
        // Capacity two: the two most expensive fit
        assert_eq!(cargo, vec![dear, third]);
        assert!(!cargo.contains(&cheap));
    }

    #[test]
    fn test_carrier_capacity_check() {
        let mut graph = TerritoryGraph::new();
        let sea = graph.add_territory("sea", TerritoryKind::Water, None, 0);
        let mut carrier = Unit::new(UnitId(0), PlayerId(0), UnitKind::Sea, sea);
        carrier.carrier_capacity = 2;
        let carrier = graph.add_unit(carrier);
        let mut fighter = Unit::new(UnitId(0), PlayerId(0), UnitKind::Air, sea);
        fighter.can_land_on_carrier = true;
        let fighter = graph.add_unit(fighter);

        assert!(carrier_capacity_allows(&graph, &[carrier, fighter], 1));
        assert!(!carrier_capacity_allows(&graph, &[carrier, fighter], 2));
        assert!(!carrier_capacity_allows(&graph, &[fighter], 0));
    }
}
