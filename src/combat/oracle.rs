//! Combat outcome oracle
//!
//! The planner treats battle resolution as a black box behind the
//! [`BattleOracle`] trait. The bundled [`StrengthOracle`] is a deterministic
//! Lanchester-style estimator: good enough to drive the planner and cheap
//! enough to call thousands of times per turn.
//!
//! Orientation conventions, used by every threshold in the planner:
//! - `win_percentage` is the *attacker's* chance of taking the territory
//! - `tuv_swing` is positive when the defender expects to lose more unit
//!   value than the attacker, so positive favors the attacker

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::core::types::{TerritoryId, UnitId};
use crate::map::territory::TerritoryGraph;
use crate::map::unit::UnitKind;

/// The oracle's answer for one hypothetical battle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BattleOutcome {
    /// Attacker's chance of winning, 0-100
    pub win_percentage: f64,
    /// Expected unit-value swing; positive favors the attacker
    pub tuv_swing: f64,
    /// Whether a defending land unit statistically survives
    pub has_land_unit_remaining: bool,
}

impl BattleOutcome {
    /// Outcome of a battle that never happens
    pub fn no_battle() -> Self {
        Self {
            win_percentage: 0.0,
            tuv_swing: 0.0,
            has_land_unit_remaining: true,
        }
    }
}

pub trait BattleOracle {
    /// Full battle estimate for the given forces at a territory
    fn evaluate(
        &self,
        graph: &TerritoryGraph,
        territory: TerritoryId,
        attackers: &[UnitId],
        defenders: &[UnitId],
        bombarders: &[UnitId],
    ) -> BattleOutcome;

    /// Fast strength comparison: 50 means parity, above 50 the attackers
    /// are stronger. Used for ranking candidates without a full estimate.
    fn estimate_strength_difference(
        &self,
        graph: &TerritoryGraph,
        territory: TerritoryId,
        attackers: &[UnitId],
        defenders: &[UnitId],
    ) -> f64;
}

/// Deterministic strength-based oracle
///
/// Win chance follows the Lanchester square law on summed effective
/// strengths. With a seed set, a small deterministic jitter (a pure function
/// of the seed and the battle inputs) perturbs the win chance to emulate a
/// Monte-Carlo combat simulator with a fixed seed.
#[derive(Debug, Clone, Default)]
pub struct StrengthOracle {
    seed: Option<u64>,
}

/// Shore bombardment hits once, so it counts at half weight
const BOMBARD_WEIGHT: f64 = 0.5;

impl StrengthOracle {
    pub fn new() -> Self {
        Self { seed: None }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    fn attack_strength(&self, graph: &TerritoryGraph, units: &[UnitId]) -> f64 {
        units
            .iter()
            .map(|&id| graph.unit(id).attack as f64)
            .sum()
    }

    fn defense_strength(&self, graph: &TerritoryGraph, units: &[UnitId]) -> f64 {
        units
            .iter()
            .map(|&id| graph.unit(id).defense as f64)
            .sum()
    }

    fn jitter(&self, territory: TerritoryId, attackers: &[UnitId], defenders: &[UnitId]) -> f64 {
        let Some(seed) = self.seed else {
            return 0.0;
        };
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        seed.hash(&mut hasher);
        territory.hash(&mut hasher);
        attackers.hash(&mut hasher);
        defenders.hash(&mut hasher);
        // Map the hash to [-2, 2] percentage points
        let raw = (hasher.finish() % 4001) as f64 / 1000.0;
        raw - 2.0
    }
}

impl BattleOracle for StrengthOracle {
    fn evaluate(
        &self,
        graph: &TerritoryGraph,
        territory: TerritoryId,
        attackers: &[UnitId],
        defenders: &[UnitId],
        bombarders: &[UnitId],
    ) -> BattleOutcome {
        if attackers.is_empty() {
            return BattleOutcome::no_battle();
        }
        let attack = self.attack_strength(graph, attackers)
            + BOMBARD_WEIGHT * self.attack_strength(graph, bombarders);
        let defense = self.defense_strength(graph, defenders);

        let win_percentage = if attack <= 0.0 && defense <= 0.0 {
            // Unopposed occupation by whoever shows up
            100.0
        } else {
            let squared = attack * attack / (attack * attack + defense * defense);
            (100.0 * squared + self.jitter(territory, attackers, defenders)).clamp(0.0, 100.0)
        };

        let attacker_tuv: f64 = attackers.iter().map(|&id| graph.unit(id).cost as f64).sum();
        let defender_tuv: f64 = defenders.iter().map(|&id| graph.unit(id).cost as f64).sum();
        let p = win_percentage / 100.0;
        // Expected losses: winner keeps a share of its force, loser is wiped
        let tuv_swing = p * defender_tuv - (1.0 - p) * attacker_tuv;

        let has_land_defender = defenders
            .iter()
            .any(|&id| graph.unit(id).kind == UnitKind::Land);
        BattleOutcome {
            win_percentage,
            tuv_swing,
            has_land_unit_remaining: has_land_defender && win_percentage < 50.0,
        }
    }

    fn estimate_strength_difference(
        &self,
        graph: &TerritoryGraph,
        _territory: TerritoryId,
        attackers: &[UnitId],
        defenders: &[UnitId],
    ) -> f64 {
        let attack = self.attack_strength(graph, attackers);
        let defense = self.defense_strength(graph, defenders);
        if attack <= 0.0 && defense <= 0.0 {
            return 50.0;
        }
        if attack + defense == 0.0 {
            return 50.0;
        }
        50.0 + 50.0 * (attack - defense) / (attack + defense)
    }
}
