//! Per-territory planning state
//!
//! One [`TerritoryAssessment`] per reachable territory, created at the start
//! of a planning pass. Defender sets live in two phases: trial assignments
//! land in `temp_units` / `temp_amphib_map` and only reach the committed
//! sets through [`commit_temp_units`](TerritoryAssessment::commit_temp_units)
//! once an iteration of the fixed-point search verifies.

use ahash::AHashMap;

use crate::combat::oracle::BattleOutcome;
use crate::core::types::{PlayerId, TerritoryId, UnitId};
use crate::map::territory::TerritoryGraph;

/// Working map from territory to its assessment
pub type MoveMap = AHashMap<TerritoryId, TerritoryAssessment>;

/// Assessment keys in deterministic order
pub fn sorted_keys(move_map: &MoveMap) -> Vec<TerritoryId> {
    let mut keys: Vec<TerritoryId> = move_map.keys().copied().collect();
    keys.sort_unstable();
    keys
}

#[derive(Debug, Clone)]
pub struct TerritoryAssessment {
    pub territory: TerritoryId,
    /// Movable defenders committed this turn
    pub units: Vec<UnitId>,
    /// Units that cannot leave: allied garrisons, zero-move units, pending
    /// purchases placed here
    pub cant_move_units: Vec<UnitId>,
    /// Every owned unit that could reach this territory
    pub max_units: Vec<UnitId>,
    /// Every owned unit deliverable here by transport
    pub max_amphib_units: Vec<UnitId>,
    /// Trial defenders for the current iteration
    pub temp_units: Vec<UnitId>,
    /// Trial transport-to-cargo assignments for the current iteration
    pub temp_amphib_map: AHashMap<UnitId, Vec<UnitId>>,
    /// Committed transport-to-cargo assignments
    pub amphib_attack_map: AHashMap<UnitId, Vec<UnitId>>,
    /// Transport to the water territory it unloads from
    pub transport_territory_map: AHashMap<UnitId, TerritoryId>,
    pub max_enemy_units: Vec<UnitId>,
    pub max_enemy_bombard_units: Vec<UnitId>,
    /// Cached oracle answer for the current defender set; invalidated on
    /// every defender change
    pub battle_outcome: Option<BattleOutcome>,
    /// Baseline outcome with immovable defenders only
    pub min_battle_outcome: BattleOutcome,
    pub can_hold: bool,
    /// Set once a verified defense window includes this territory; later
    /// offensive planning may stage from here
    pub can_attack: bool,
    pub value: f64,
    pub sea_value: f64,
    pub load_value: f64,
}

impl TerritoryAssessment {
    pub fn new(territory: TerritoryId) -> Self {
        Self {
            territory,
            units: Vec::new(),
            cant_move_units: Vec::new(),
            max_units: Vec::new(),
            max_amphib_units: Vec::new(),
            temp_units: Vec::new(),
            temp_amphib_map: AHashMap::new(),
            amphib_attack_map: AHashMap::new(),
            transport_territory_map: AHashMap::new(),
            max_enemy_units: Vec::new(),
            max_enemy_bombard_units: Vec::new(),
            battle_outcome: None,
            min_battle_outcome: BattleOutcome::no_battle(),
            can_hold: true,
            can_attack: false,
            value: 0.0,
            sea_value: 0.0,
            load_value: 0.0,
        }
    }

    /// Committed, immovable and trial defenders combined, deduplicated
    pub fn all_defenders(&self) -> Vec<UnitId> {
        let mut defenders = Vec::with_capacity(
            self.units.len() + self.cant_move_units.len() + self.temp_units.len(),
        );
        defenders.extend_from_slice(&self.units);
        defenders.extend_from_slice(&self.cant_move_units);
        defenders.extend_from_slice(&self.temp_units);
        defenders.sort_unstable();
        defenders.dedup();
        defenders
    }

    /// Maximum possible defenders: everything reachable plus immovable
    pub fn max_defenders(&self) -> Vec<UnitId> {
        let mut defenders = Vec::with_capacity(self.max_units.len() + self.cant_move_units.len());
        defenders.extend_from_slice(&self.max_units);
        defenders.extend_from_slice(&self.cant_move_units);
        defenders.sort_unstable();
        defenders.dedup();
        defenders
    }

    pub fn add_unit(&mut self, unit: UnitId) {
        if !self.units.contains(&unit) {
            self.units.push(unit);
        }
    }

    pub fn add_cant_move_unit(&mut self, unit: UnitId) {
        if !self.cant_move_units.contains(&unit) {
            self.cant_move_units.push(unit);
        }
    }

    pub fn add_temp_unit(&mut self, unit: UnitId) {
        if !self.temp_units.contains(&unit) {
            self.temp_units.push(unit);
        }
    }

    pub fn add_temp_units(&mut self, units: &[UnitId]) {
        for &unit in units {
            self.add_temp_unit(unit);
        }
    }

    /// Discard all trial state for a new iteration
    pub fn reset_temp(&mut self) {
        for transport in self.temp_amphib_map.keys() {
            self.transport_territory_map.remove(transport);
        }
        self.temp_units.clear();
        self.temp_amphib_map.clear();
        self.battle_outcome = None;
    }

    /// Promote trial defenders into committed state
    ///
    /// Allied units pulled along (carrier-borne fighters) become immovable
    /// rather than committed moves, since the player cannot order them.
    /// Returns the owned units that are now committed, so the caller can
    /// retire their claims from the pools.
    pub fn commit_temp_units(&mut self, graph: &TerritoryGraph, player: PlayerId) -> Vec<UnitId> {
        let mut committed = Vec::new();
        for unit in std::mem::take(&mut self.temp_units) {
            if graph.unit(unit).owner == player {
                self.add_unit(unit);
                committed.push(unit);
            } else {
                self.add_cant_move_unit(unit);
            }
        }
        for (transport, cargo) in std::mem::take(&mut self.temp_amphib_map) {
            committed.push(transport);
            self.amphib_attack_map.insert(transport, cargo);
        }
        self.battle_outcome = None;
        committed
    }
}
