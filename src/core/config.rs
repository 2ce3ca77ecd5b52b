//! Game tuning with documented constants
//!
//! All magic numbers of the combat engine and the campaign AI are collected
//! here. Every field has a default, so a TOML file only needs to name the
//! values it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{GameError, Result};

/// Tuning for combat resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    // === DICE ===
    /// Sides of the attack and defence dice
    ///
    /// Every attack roll is `positive die - negative die`. The expected
    /// damage estimator enumerates all `die_sides^4` combinations, so this
    /// also sets its cost.
    pub die_sides: u32,

    /// Open-ended reroll threshold for attack and defence dice (0 = off)
    ///
    /// A die showing less than this is rolled again and the results summed.
    pub reroll_threshold: u32,

    // === CRITICALS ===
    /// Whether critical hits exist at all
    pub criticals_enabled: bool,

    /// `positive - negative` at or above this is a critical hit
    ///
    /// With d6 dice only a 6 against a 1 reaches 5, a 1-in-36 chance.
    pub critical_margin: i32,

    // === PACING ===
    /// Rounds after which a fully automatic combat is called a stalemate
    ///
    /// Two sides that cannot hurt each other would otherwise loop forever.
    pub max_turns: u32,

    /// Stop automatic phase advancement after healing so callers can see it
    pub healing_yields: bool,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            die_sides: 6,
            reroll_threshold: 0,
            criticals_enabled: true,
            critical_margin: 5,
            max_turns: 50,
            healing_yields: true,
        }
    }
}

/// Tuning for the campaign AI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    // === SIMULATION ===
    /// Total simulated combats one faction may run per turn
    pub simulation_budget: u32,

    /// Simulated combats per attack plan
    pub simulations_per_plan: u32,

    /// Multiplier on `simulations_per_plan` when heroes take part
    ///
    /// Hero outcomes swing harder, so they need a bigger sample.
    pub hero_simulation_multiplier: u32,

    /// 0 = only the target garrison defends. 1+ = adjacent hostile
    /// major-faction garrisons join the defence to model retaliation.
    pub simulation_fidelity: u8,

    /// Run each plan's simulations on the rayon pool
    pub parallel: bool,

    // === PLAN SELECTION ===
    /// Accepted plans per turn at the easiest AI level
    pub easy_review_cap: usize,

    /// Accepted plans per turn at every other AI level
    pub review_cap: usize,

    /// Plans scoring at or below this are rejected instead of accepted
    pub min_accept_score: f64,

    // === TRAINING ===
    /// Mean loss on a rejected plan above which its defenders count as a threat
    pub danger_loss_tolerance: f64,

    /// Margin by which one side must out-damage the other in a phase
    /// before a unit counts as a counter
    pub decisive_epsilon: f64,

    /// Damage-taken / own-hit-points ratio a defending counter must stay under
    pub defending_counter_ratio: f64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            simulation_budget: 200,
            simulations_per_plan: 10,
            hero_simulation_multiplier: 2,
            simulation_fidelity: 1,
            parallel: true,
            easy_review_cap: 1,
            review_cap: 10,
            min_accept_score: 0.0,
            danger_loss_tolerance: 2.0,
            decisive_epsilon: 0.05,
            defending_counter_ratio: 0.5,
        }
    }
}

/// Complete tuning loaded from one TOML document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub combat: CombatConfig,
    pub ai: AiConfig,
}

impl GameConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: GameConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let combat = &self.combat;
        if combat.die_sides < 2 {
            return Err(GameError::InvalidConfig(format!(
                "die_sides ({}) must be at least 2",
                combat.die_sides
            )));
        }

        // A threshold above the die size would reroll forever
        if combat.reroll_threshold > combat.die_sides {
            return Err(GameError::InvalidRerollThreshold {
                sides: combat.die_sides,
                threshold: combat.reroll_threshold,
            });
        }

        if combat.max_turns == 0 {
            return Err(GameError::InvalidConfig("max_turns must be positive".into()));
        }

        let ai = &self.ai;
        if ai.simulations_per_plan == 0 {
            return Err(GameError::InvalidConfig(
                "simulations_per_plan must be positive".into(),
            ));
        }

        if ai.hero_simulation_multiplier == 0 {
            return Err(GameError::InvalidConfig(
                "hero_simulation_multiplier must be positive".into(),
            ));
        }

        if !(0.0..=1.0).contains(&ai.defending_counter_ratio) {
            return Err(GameError::InvalidConfig(format!(
                "defending_counter_ratio ({}) must lie in [0, 1]",
                ai.defending_counter_ratio
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let config = GameConfig::default();
        assert_eq!(config.combat.die_sides, 6);
        assert_eq!(config.combat.critical_margin, 5);
        assert_eq!(config.ai.simulation_budget, 200);
        assert_eq!(config.ai.review_cap, 10);
        assert_eq!(config.ai.easy_review_cap, 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = GameConfig::from_toml_str(
            r#"
            [combat]
            criticals_enabled = false

            [ai]
            simulation_budget = 50
            "#,
        )
        .expect("valid config");

        assert!(!config.combat.criticals_enabled);
        assert_eq!(config.combat.die_sides, 6);
        assert_eq!(config.ai.simulation_budget, 50);
        assert_eq!(config.ai.simulations_per_plan, 10);
    }

    #[test]
    fn test_rejects_tiny_die() {
        let result = GameConfig::from_toml_str("[combat]\ndie_sides = 1\n");
        assert!(matches!(result, Err(GameError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_runaway_reroll() {
        let result = GameConfig::from_toml_str("[combat]\nreroll_threshold = 7\n");
        assert!(matches!(
            result,
            Err(GameError::InvalidRerollThreshold { sides: 6, threshold: 7 })
        ));
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let result = GameConfig::from_toml_str("[combat\n");
        assert!(matches!(result, Err(GameError::TomlError(_))));
    }
}
