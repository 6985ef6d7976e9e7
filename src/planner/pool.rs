//! Unit pools with exclusive claims
//!
//! A [`UnitPool`] maps each unassigned unit to its remaining candidate
//! destinations. Claiming a unit removes it, so a unit can never be
//! committed to two territories. All snapshot accessors return ids in
//! sorted order to keep planning deterministic.

use ahash::{AHashMap, AHashSet};

use crate::core::types::{TerritoryId, UnitId};
use crate::map::territory::TerritoryGraph;

#[derive(Debug, Clone, Default)]
pub struct UnitPool {
    options: AHashMap<UnitId, AHashSet<TerritoryId>>,
}

impl UnitPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: UnitId, destinations: AHashSet<TerritoryId>) {
        self.options.insert(unit, destinations);
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        self.options.contains_key(&unit)
    }

    pub fn options(&self, unit: UnitId) -> Option<&AHashSet<TerritoryId>> {
        self.options.get(&unit)
    }

    /// Take a unit out of the pool; returns false if it was already claimed
    pub fn claim(&mut self, unit: UnitId) -> bool {
        self.options.remove(&unit).is_some()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Unassigned unit ids in sorted order
    pub fn ids_sorted(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.options.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Unit ids whose option set intersects `window`, ordered by fewest
    /// in-window options first, then cheapest, then id. Constrained units
    /// pick first so flexible units can fill what remains.
    pub fn sorted_by_fewest_options(
        &self,
        graph: &TerritoryGraph,
        window: &[TerritoryId],
    ) -> Vec<UnitId> {
        let window: AHashSet<TerritoryId> = window.iter().copied().collect();
        let mut entries: Vec<(usize, u32, UnitId)> = self
            .options
            .iter()
            .filter_map(|(&unit, destinations)| {
                let in_window = destinations.iter().filter(|t| window.contains(t)).count();
                if in_window == 0 {
                    return None;
                }
                Some((in_window, graph.unit(unit).cost, unit))
            })
            .collect();
        entries.sort_unstable();
        entries.into_iter().map(|(_, _, unit)| unit).collect()
    }

    /// Options of `unit` restricted to `window`, sorted
    pub fn options_in(&self, unit: UnitId, window: &[TerritoryId]) -> Vec<TerritoryId> {
        let Some(destinations) = self.options.get(&unit) else {
            return Vec::new();
        };
        let mut hits: Vec<TerritoryId> = window
            .iter()
            .copied()
            .filter(|t| destinations.contains(t))
            .collect();
        hits.sort_unstable();
        hits
    }
}
