//! Territory graph - per-turn snapshot of the strategic map
//!
//! Territories and units live in arenas indexed by their ids; the graph is
//! read-only during planning. Distance and path queries take a passability
//! predicate so each unit category can reason about its own mobility.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::core::types::{PlayerId, TerritoryId, UnitId};
use crate::map::unit::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerritoryKind {
    Land,
    Water,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Territory {
    pub id: TerritoryId,
    pub name: String,
    pub kind: TerritoryKind,
    pub owner: Option<PlayerId>,
    pub production: u32,
    pub is_capital: bool,
    pub neighbors: Vec<TerritoryId>,
}

impl Territory {
    pub fn is_water(&self) -> bool {
        self.kind == TerritoryKind::Water
    }

    pub fn is_land(&self) -> bool {
        self.kind == TerritoryKind::Land
    }
}

/// The strategic map: a territory arena plus a unit arena
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerritoryGraph {
    territories: Vec<Territory>,
    units: Vec<Unit>,
}

impl TerritoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_territory(
        &mut self,
        name: &str,
        kind: TerritoryKind,
        owner: Option<PlayerId>,
        production: u32,
    ) -> TerritoryId {
        let id = TerritoryId(self.territories.len() as u32);
        self.territories.push(Territory {
            id,
            name: name.to_string(),
            kind,
            owner,
            production,
            is_capital: false,
            neighbors: Vec::new(),
        });
        id
    }

    pub fn connect(&mut self, a: TerritoryId, b: TerritoryId) {
        if !self.territories[a.index()].neighbors.contains(&b) {
            self.territories[a.index()].neighbors.push(b);
        }
        if !self.territories[b.index()].neighbors.contains(&a) {
            self.territories[b.index()].neighbors.push(a);
        }
    }

    pub fn set_capital(&mut self, t: TerritoryId) {
        self.territories[t.index()].is_capital = true;
    }

    pub fn add_unit(&mut self, unit: Unit) -> UnitId {
        let id = UnitId(self.units.len() as u32);
        let mut unit = unit;
        unit.id = id;
        self.units.push(unit);
        id
    }

    pub fn territory(&self, id: TerritoryId) -> &Territory {
        &self.territories[id.index()]
    }

    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id.index()]
    }

    pub fn territories(&self) -> impl Iterator<Item = &Territory> {
        self.territories.iter()
    }

    pub fn territory_ids(&self) -> impl Iterator<Item = TerritoryId> + '_ {
        (0..self.territories.len() as u32).map(TerritoryId)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    /// Units currently located in a territory, in id order
    pub fn units_in(&self, t: TerritoryId) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(move |u| u.location == t)
    }

    pub fn neighbors(&self, t: TerritoryId) -> &[TerritoryId] {
        &self.territories[t.index()].neighbors
    }

    pub fn neighbors_matching<F>(&self, t: TerritoryId, predicate: F) -> Vec<TerritoryId>
    where
        F: Fn(&Territory) -> bool,
    {
        let mut result: Vec<TerritoryId> = self.territories[t.index()]
            .neighbors
            .iter()
            .copied()
            .filter(|&n| predicate(self.territory(n)))
            .collect();
        result.sort_unstable();
        result
    }

    /// All territories within `radius` steps of `t` (excluding `t`) where
    /// every visited territory satisfies the predicate
    pub fn neighbors_within<F>(&self, t: TerritoryId, radius: u32, predicate: F) -> Vec<TerritoryId>
    where
        F: Fn(&Territory) -> bool,
    {
        let mut result = Vec::new();
        let mut visited: AHashSet<TerritoryId> = AHashSet::new();
        visited.insert(t);
        let mut queue = VecDeque::new();
        queue.push_back((t, 0u32));
        while let Some((current, depth)) = queue.pop_front() {
            if depth == radius {
                continue;
            }
            for &n in self.neighbors(current) {
                if visited.insert(n) && predicate(self.territory(n)) {
                    result.push(n);
                    queue.push_back((n, depth + 1));
                }
            }
        }
        result.sort_unstable();
        result
    }

    /// BFS distance from `from` to `to` where every intermediate territory
    /// and the endpoint satisfy the predicate; `None` if unreachable
    pub fn distance<F>(&self, from: TerritoryId, to: TerritoryId, predicate: F) -> Option<u32>
    where
        F: Fn(&Territory) -> bool,
    {
        self.bfs_path(from, to, predicate, false)
            .map(|path| (path.len() - 1) as u32)
    }

    /// Like [`distance`](Self::distance) but the endpoint itself need not be
    /// passable (moving up to a blocked destination, e.g. an attack target)
    pub fn distance_ignore_end<F>(
        &self,
        from: TerritoryId,
        to: TerritoryId,
        predicate: F,
    ) -> Option<u32>
    where
        F: Fn(&Territory) -> bool,
    {
        self.bfs_path(from, to, predicate, true)
            .map(|path| (path.len() - 1) as u32)
    }

    /// Shortest route from `from` to `to`, inclusive of both endpoints
    pub fn path<F>(&self, from: TerritoryId, to: TerritoryId, predicate: F) -> Option<Vec<TerritoryId>>
    where
        F: Fn(&Territory) -> bool,
    {
        self.bfs_path(from, to, predicate, false)
    }

    pub fn path_ignore_end<F>(
        &self,
        from: TerritoryId,
        to: TerritoryId,
        predicate: F,
    ) -> Option<Vec<TerritoryId>>
    where
        F: Fn(&Territory) -> bool,
    {
        self.bfs_path(from, to, predicate, true)
    }

    fn bfs_path<F>(
        &self,
        from: TerritoryId,
        to: TerritoryId,
        predicate: F,
        ignore_end: bool,
    ) -> Option<Vec<TerritoryId>>
    where
        F: Fn(&Territory) -> bool,
    {
        if from == to {
            return Some(vec![from]);
        }
        let mut came_from: Vec<Option<TerritoryId>> = vec![None; self.territories.len()];
        let mut visited: AHashSet<TerritoryId> = AHashSet::new();
        visited.insert(from);
        let mut queue = VecDeque::new();
        queue.push_back(from);
        while let Some(current) = queue.pop_front() {
            for &n in self.neighbors(current) {
                if visited.contains(&n) {
                    continue;
                }
                let passable = predicate(self.territory(n));
                if n == to && (passable || ignore_end) {
                    let mut path = vec![to, current];
                    let mut cursor = current;
                    while let Some(prev) = came_from[cursor.index()] {
                        path.push(prev);
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                if passable {
                    visited.insert(n);
                    came_from[n.index()] = Some(current);
                    queue.push_back(n);
                }
            }
        }
        None
    }

    /// The player's capital, if any territory is flagged as one
    pub fn capital_of(&self, player: PlayerId) -> Option<TerritoryId> {
        self.territories
            .iter()
            .find(|t| t.is_capital && t.owner == Some(player))
            .map(|t| t.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_graph(n: usize) -> TerritoryGraph {
        let mut graph = TerritoryGraph::new();
        let ids: Vec<TerritoryId> = (0..n)
            .map(|i| {
                graph.add_territory(&format!("t{}", i), TerritoryKind::Land, Some(PlayerId(0)), 2)
            })
            .collect();
        for pair in ids.windows(2) {
            graph.connect(pair[0], pair[1]);
        }
        graph
    }

    #[test]
    fn test_distance_on_line() {
        let graph = line_graph(5);
        assert_eq!(
            graph.distance(TerritoryId(0), TerritoryId(4), |_| true),
            Some(4)
        );
        assert_eq!(
            graph.distance(TerritoryId(2), TerritoryId(2), |_| true),
            Some(0)
        );
    }

    #[test]
    fn test_distance_blocked() {
        let graph = line_graph(5);
        // Block the middle territory
        let blocked = TerritoryId(2);
        assert_eq!(
            graph.distance(TerritoryId(0), TerritoryId(4), |t| t.id != blocked),
            None
        );
    }

    #[test]
    fn test_path_ignore_end() {
        let graph = line_graph(4);
        let end = TerritoryId(3);
        let path = graph.path_ignore_end(TerritoryId(0), end, |t| t.id != end);
        assert_eq!(
            path,
            Some(vec![TerritoryId(0), TerritoryId(1), TerritoryId(2), TerritoryId(3)])
        );
    }

    #[test]
    fn test_neighbors_within_radius() {
        let graph = line_graph(6);
        let near = graph.neighbors_within(TerritoryId(0), 2, |_| true);
        assert_eq!(near, vec![TerritoryId(1), TerritoryId(2)]);
    }

    #[test]
    fn test_capital_lookup() {
        let mut graph = line_graph(3);
        graph.set_capital(TerritoryId(1));
        assert_eq!(graph.capital_of(PlayerId(0)), Some(TerritoryId(1)));
        assert_eq!(graph.capital_of(PlayerId(1)), None);
    }
}
