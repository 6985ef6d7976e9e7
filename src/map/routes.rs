//! Movement legality and reachability
//!
//! Passability predicates per unit category, and the candidate move set:
//! every territory a unit could legally end the non-combat phase in.
//! Computed once per turn; the planner only shrinks it afterwards.

use ahash::AHashSet;
use std::collections::VecDeque;

use crate::core::types::{PlayerId, TerritoryId};
use crate::map::territory::{Territory, TerritoryGraph};
use crate::map::unit::{Unit, UnitKind};

/// Constructors for the passability predicates used by distance and path
/// queries. Water passability depends on the units present, so these borrow
/// the graph.
pub struct Passability;

impl Passability {
    /// Land movement: through allied land, optionally through enemy land
    /// (used for distance estimates, never for actual non-combat moves)
    pub fn land<'a>(
        relations: &'a crate::core::types::Relations,
        player: PlayerId,
        allow_enemy: bool,
    ) -> impl Fn(&Territory) -> bool + 'a {
        move |t: &Territory| {
            if !t.is_land() {
                return false;
            }
            match t.owner {
                Some(owner) => allow_enemy || relations.is_allied(player, owner),
                None => allow_enemy,
            }
        }
    }

    /// Sea movement: through water, optionally through enemy-held water
    pub fn sea<'a>(
        graph: &'a TerritoryGraph,
        relations: &'a crate::core::types::Relations,
        player: PlayerId,
        allow_enemy: bool,
    ) -> impl Fn(&Territory) -> bool + 'a {
        move |t: &Territory| {
            if !t.is_water() {
                return false;
            }
            allow_enemy
                || !graph
                    .units_in(t.id)
                    .any(|u| relations.is_enemy(player, u.owner))
        }
    }

    /// Air movement ignores surface ownership
    pub fn air(_player: PlayerId) -> impl Fn(&Territory) -> bool {
        |_t: &Territory| true
    }
}

/// Compute the candidate move set for one unit: all territories it can
/// legally end this phase in, including its current territory.
///
/// Air landing restrictions (carrier capacity, allied land without a
/// factory) are intentionally not applied here; the planner enforces them
/// per-destination because they depend on where other units end up.
pub fn candidate_destinations(
    graph: &TerritoryGraph,
    relations: &crate::core::types::Relations,
    unit: &Unit,
) -> AHashSet<TerritoryId> {
    let mut destinations: AHashSet<TerritoryId> = AHashSet::new();
    destinations.insert(unit.location);
    if unit.movement == 0 {
        return destinations;
    }
    match unit.kind {
        UnitKind::Land | UnitKind::Infrastructure => {
            let passable = Passability::land(relations, unit.owner, false);
            bfs_collect(graph, unit.location, unit.movement, &passable, &mut destinations);
        }
        UnitKind::Sea | UnitKind::Transport => {
            let passable = Passability::sea(graph, relations, unit.owner, false);
            bfs_collect(graph, unit.location, unit.movement, &passable, &mut destinations);
        }
        UnitKind::Air => {
            let passable = Passability::air(unit.owner);
            let mut reachable: AHashSet<TerritoryId> = AHashSet::new();
            reachable.insert(unit.location);
            bfs_collect(graph, unit.location, unit.movement, &passable, &mut reachable);
            for t in reachable {
                let territory = graph.territory(t);
                // Air may only end on water (carriers) or allied land
                let can_land = territory.is_water()
                    || territory
                        .owner
                        .map(|o| relations.is_allied(unit.owner, o))
                        .unwrap_or(false);
                if can_land {
                    destinations.insert(t);
                }
            }
        }
    }
    destinations
}

fn bfs_collect<F>(
    graph: &TerritoryGraph,
    start: TerritoryId,
    budget: u32,
    passable: &F,
    out: &mut AHashSet<TerritoryId>,
) where
    F: Fn(&Territory) -> bool,
{
    let mut visited: AHashSet<TerritoryId> = AHashSet::new();
    visited.insert(start);
    let mut queue = VecDeque::new();
    queue.push_back((start, 0u32));
    while let Some((current, depth)) = queue.pop_front() {
        if depth == budget {
            continue;
        }
        for &n in graph.neighbors(current) {
            if visited.insert(n) && passable(graph.territory(n)) {
                out.insert(n);
                queue.push_back((n, depth + 1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Relations, UnitId};
    use crate::map::territory::TerritoryKind;

    fn two_player_map() -> (TerritoryGraph, Relations) {
        let mut graph = TerritoryGraph::new();
        let a = graph.add_territory("home", TerritoryKind::Land, Some(PlayerId(0)), 3);
        let b = graph.add_territory("march", TerritoryKind::Land, Some(PlayerId(0)), 1);
        let c = graph.add_territory("hostile", TerritoryKind::Land, Some(PlayerId(1)), 2);
        let d = graph.add_territory("bay", TerritoryKind::Water, None, 0);
        graph.connect(a, b);
        graph.connect(b, c);
        graph.connect(a, d);
        graph.connect(b, d);
        (graph, Relations::new())
    }

    #[test]
    fn test_land_unit_stops_at_enemy_border() {
        let (graph, relations) = two_player_map();
        let mut infantry = Unit::new(UnitId(0), PlayerId(0), UnitKind::Land, TerritoryId(0));
        infantry.movement = 2;
        let destinations = candidate_destinations(&graph, &relations, &infantry);
        assert!(destinations.contains(&TerritoryId(0)));
        assert!(destinations.contains(&TerritoryId(1)));
        // Enemy land and water are not legal non-combat destinations
        assert!(!destinations.contains(&TerritoryId(2)));
        assert!(!destinations.contains(&TerritoryId(3)));
    }

    #[test]
    fn test_air_lands_on_allied_or_water() {
        let (graph, relations) = two_player_map();
        let mut fighter = Unit::new(UnitId(0), PlayerId(0), UnitKind::Air, TerritoryId(0));
        fighter.movement = 4;
        let destinations = candidate_destinations(&graph, &relations, &fighter);
        assert!(destinations.contains(&TerritoryId(1)));
        assert!(destinations.contains(&TerritoryId(3)));
        assert!(!destinations.contains(&TerritoryId(2)));
    }

    #[test]
    fn test_sea_avoids_enemy_held_water() {
        let mut graph = TerritoryGraph::new();
        let s0 = graph.add_territory("port", TerritoryKind::Water, None, 0);
        let s1 = graph.add_territory("strait", TerritoryKind::Water, None, 0);
        let s2 = graph.add_territory("open sea", TerritoryKind::Water, None, 0);
        graph.connect(s0, s1);
        graph.connect(s1, s2);
        let mut raider = Unit::new(UnitId(0), PlayerId(1), UnitKind::Sea, s1);
        raider.defense = 2;
        graph.add_unit(raider);

        let relations = Relations::new();
        let mut destroyer = Unit::new(UnitId(1), PlayerId(0), UnitKind::Sea, s0);
        destroyer.movement = 2;
        let destinations = candidate_destinations(&graph, &relations, &destroyer);
        assert!(destinations.contains(&s0));
        assert!(!destinations.contains(&s1));
        assert!(!destinations.contains(&s2));
    }

    #[test]
    fn test_zero_movement_stays_put() {
        let (graph, relations) = two_player_map();
        let factory = Unit::new(UnitId(0), PlayerId(0), UnitKind::Infrastructure, TerritoryId(0));
        let destinations = candidate_destinations(&graph, &relations, &factory);
        assert_eq!(destinations.len(), 1);
        assert!(destinations.contains(&TerritoryId(0)));
    }
}
