//! Enemy threat model
//!
//! Supplies, per territory, the maximal enemy force that could attack it
//! this turn. The planner consumes this as ground truth; the bundled
//! [`ReachabilityThreatModel`] derives it from movement reach, including
//! amphibious landings and offshore bombardment escorts.

use ahash::AHashMap;
use ahash::AHashSet;
use std::collections::VecDeque;

use crate::core::types::{PlayerId, Relations, TerritoryId, UnitId};
use crate::map::routes::Passability;
use crate::map::territory::{Territory, TerritoryGraph};
use crate::map::unit::{Unit, UnitKind};

/// Maximal enemy force able to reach one territory
#[derive(Debug, Clone, Default)]
pub struct EnemyThreat {
    pub units: Vec<UnitId>,
    pub bombard_units: Vec<UnitId>,
}

impl EnemyThreat {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

pub trait ThreatModel {
    /// For each queried territory, the maximal set of enemy units that could
    /// attack it this turn (empty entries are omitted)
    fn max_attackers(
        &self,
        graph: &TerritoryGraph,
        relations: &Relations,
        player: PlayerId,
        territories: &[TerritoryId],
    ) -> AHashMap<TerritoryId, EnemyThreat>;
}

/// Threat model derived from unit movement reach
#[derive(Debug, Clone, Default)]
pub struct ReachabilityThreatModel;

impl ReachabilityThreatModel {
    pub fn new() -> Self {
        Self
    }

    /// Territories an enemy unit could attack this turn
    fn attack_reach(
        &self,
        graph: &TerritoryGraph,
        relations: &Relations,
        unit: &Unit,
    ) -> AHashSet<TerritoryId> {
        let mut targets: AHashSet<TerritoryId> = AHashSet::new();
        match unit.kind {
            UnitKind::Land => {
                if unit.movement == 0 {
                    return targets;
                }
                // March through friendly ground, final step into anything adjacent
                let passable = Passability::land(relations, unit.owner, false);
                let mut staging: AHashSet<TerritoryId> = AHashSet::new();
                staging.insert(unit.location);
                bfs(graph, unit.location, unit.movement - 1, &passable, &mut staging);
                for s in staging {
                    for &n in graph.neighbors(s) {
                        if graph.territory(n).is_land() {
                            targets.insert(n);
                        }
                    }
                }
            }
            UnitKind::Sea => {
                let passable = Passability::sea(graph, relations, unit.owner, true);
                let mut reach: AHashSet<TerritoryId> = AHashSet::new();
                reach.insert(unit.location);
                bfs(graph, unit.location, unit.movement, &passable, &mut reach);
                targets.extend(reach);
            }
            UnitKind::Air => {
                let passable = Passability::air(unit.owner);
                let mut reach: AHashSet<TerritoryId> = AHashSet::new();
                reach.insert(unit.location);
                bfs(graph, unit.location, unit.movement, &passable, &mut reach);
                targets.extend(reach);
            }
            // Transports deliver attackers but do not attack; infra never attacks
            UnitKind::Transport | UnitKind::Infrastructure => {}
        }
        targets
    }

    /// Water territories a transport could unload an assault from
    fn transport_reach(
        &self,
        graph: &TerritoryGraph,
        relations: &Relations,
        transport: &Unit,
    ) -> AHashSet<TerritoryId> {
        let passable = Passability::sea(graph, relations, transport.owner, true);
        let mut reach: AHashSet<TerritoryId> = AHashSet::new();
        reach.insert(transport.location);
        bfs(graph, transport.location, transport.movement, &passable, &mut reach);
        reach
    }

    /// Best cargo an enemy transport could carry: land units adjacent to its
    /// starting water territory, strongest attackers first, up to capacity
    fn amphib_cargo(&self, graph: &TerritoryGraph, transport: &Unit) -> Vec<UnitId> {
        let mut candidates: Vec<&Unit> = graph
            .neighbors(transport.location)
            .iter()
            .filter(|&&n| graph.territory(n).is_land())
            .flat_map(|&n| graph.units_in(n))
            .filter(|u| u.owner == transport.owner && u.is_transportable())
            .collect();
        candidates.sort_by(|a, b| b.attack.cmp(&a.attack).then(a.id.cmp(&b.id)));

        let mut cargo = Vec::new();
        let mut remaining = transport.transport_capacity;
        for unit in candidates {
            if unit.transport_cost <= remaining {
                remaining -= unit.transport_cost;
                cargo.push(unit.id);
            }
        }
        cargo
    }
}

impl ThreatModel for ReachabilityThreatModel {
    fn max_attackers(
        &self,
        graph: &TerritoryGraph,
        relations: &Relations,
        player: PlayerId,
        territories: &[TerritoryId],
    ) -> AHashMap<TerritoryId, EnemyThreat> {
        let queried: AHashSet<TerritoryId> = territories.iter().copied().collect();
        let mut attackers: AHashMap<TerritoryId, AHashSet<UnitId>> = AHashMap::new();
        let mut bombarders: AHashMap<TerritoryId, AHashSet<UnitId>> = AHashMap::new();

        let enemy_units: Vec<&Unit> = graph
            .units()
            .filter(|u| relations.is_enemy(player, u.owner))
            .collect();

        // Direct overland, sea and air threats
        for unit in &enemy_units {
            if unit.is_aa {
                continue;
            }
            for target in self.attack_reach(graph, relations, unit) {
                if queried.contains(&target) {
                    attackers.entry(target).or_default().insert(unit.id);
                }
            }
        }

        // Amphibious landings plus bombard escorts
        for transport in enemy_units.iter().filter(|u| u.is_transport()) {
            let cargo = self.amphib_cargo(graph, transport);
            if cargo.is_empty() {
                continue;
            }
            let reach = self.transport_reach(graph, relations, transport);
            let mut beachheads: AHashSet<TerritoryId> = AHashSet::new();
            for water in &reach {
                for &n in graph.neighbors(*water) {
                    if graph.territory(n).is_land() && queried.contains(&n) {
                        beachheads.insert(n);
                    }
                }
            }
            for beach in beachheads {
                let entry = attackers.entry(beach).or_default();
                entry.extend(cargo.iter().copied());
                // Bombard-capable ships that can reach any water neighbor
                for escort in enemy_units.iter().filter(|u| u.can_bombard && u.is_sea()) {
                    let escort_reach = self.attack_reach(graph, relations, escort);
                    let can_support = graph
                        .neighbors(beach)
                        .iter()
                        .any(|n| escort_reach.contains(n));
                    if can_support {
                        bombarders.entry(beach).or_default().insert(escort.id);
                    }
                }
            }
        }

        let mut result: AHashMap<TerritoryId, EnemyThreat> = AHashMap::new();
        for (territory, units) in attackers {
            let mut units: Vec<UnitId> = units.into_iter().collect();
            units.sort_unstable();
            let mut bombard_units: Vec<UnitId> = bombarders
                .remove(&territory)
                .map(|s| s.into_iter().collect())
                .unwrap_or_default();
            bombard_units.sort_unstable();
            result.insert(
                territory,
                EnemyThreat {
                    units,
                    bombard_units,
                },
            );
        }
        result
    }
}

fn bfs<F>(
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
