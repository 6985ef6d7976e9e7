//! Planner configuration with documented constants
//!
//! All tunable thresholds are collected here with explanations of their
//! purpose and how they interact with each other.

use serde::{Deserialize, Serialize};

use crate::core::error::{PlanError, Result};

/// Thresholds driving the defense planner
///
/// Two presets exist: `low_luck()` (deterministic combat dice) and
/// `standard()` (regular dice, where outcomes are noisier so the planner
/// accepts lower confidence before committing units).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Required defender confidence for the capital
    ///
    /// A territory assignment involving the capital only counts as safe when
    /// the attacker's win chance stays below `100 - win_percentage`.
    pub win_percentage: f64,

    /// Required defender confidence for factory territories
    ///
    /// Weaker than `win_percentage`: losing a factory hurts, but not as much
    /// as losing the capital, so more risk is tolerated.
    pub min_win_percentage: f64,

    /// Strength-difference estimate above which a heavy unit commits
    /// immediately without consulting the full battle oracle
    ///
    /// The estimate is normalized so 50 means parity; 60 means the enemy
    /// force is clearly stronger and the territory genuinely needs help.
    pub strength_commit_threshold: f64,

    /// Divisor converting committed-defender TUV into a hold-value penalty
    ///
    /// Units parked on defense are unavailable elsewhere; one eighth of
    /// their combat cost per turn approximates that opportunity cost.
    pub hold_value_divisor: f64,

    /// Extra hold-value weight for factory territories
    pub factory_hold_bonus: f64,

    /// Extra hold-value weight for the capital
    pub capital_hold_bonus: f64,

    /// Garrison pass cost slack: a border territory receives one land unit
    /// only if that unit's TUV is at most `production + garrison_cost_slack`
    pub garrison_cost_slack: u32,

    /// Whether the combat rules run in low-luck mode
    pub low_luck: bool,
}

impl PlannerConfig {
    /// Preset for low-luck combat rules
    pub fn low_luck() -> Self {
        Self {
            win_percentage: 95.0,
            min_win_percentage: 75.0,
            strength_commit_threshold: 60.0,
            hold_value_divisor: 8.0,
            factory_hold_bonus: 0.5,
            capital_hold_bonus: 2.0,
            garrison_cost_slack: 3,
            low_luck: true,
        }
    }

    /// Preset for standard dice
    pub fn standard() -> Self {
        Self {
            win_percentage: 90.0,
            min_win_percentage: 65.0,
            low_luck: false,
            ..Self::low_luck()
        }
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.win_percentage)
            || !(0.0..=100.0).contains(&self.min_win_percentage)
        {
            return Err(PlanError::InvalidConfig(
                "win percentages must be within 0-100".into(),
            ));
        }
        if self.min_win_percentage > self.win_percentage {
            return Err(PlanError::InvalidConfig(format!(
                "min_win_percentage ({}) should be <= win_percentage ({})",
                self.min_win_percentage, self.win_percentage
            )));
        }
        if self.hold_value_divisor <= 0.0 {
            return Err(PlanError::InvalidConfig(
                "hold_value_divisor must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self::low_luck()
    }
}
