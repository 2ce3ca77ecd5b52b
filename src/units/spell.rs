//! Spells and the effects they leave on unit stacks

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::error::{GameError, Result};
use crate::units::attack::Attack;
use crate::units::unit_type::UnitType;

bitflags! {
    /// Active spell effects on a stack. Cleared at the end of every round.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SpellEffects: u8 {
        /// +2 shield
        const MAGIC_SHIELD = 1 << 0;
        /// +2 armor
        const STONE_SKIN = 1 << 1;
        /// The stack makes no attacks
        const CONFUSION = 1 << 2;
    }
}

impl SpellEffects {
    /// Parse an effect name such as `"stone_skin"`
    pub fn parse_name(name: &str) -> Result<Self> {
        Self::from_name(&name.trim().to_uppercase())
            .ok_or_else(|| GameError::UnknownSpellEffect(name.to_string()))
    }
}

/// When during a round a spell is cast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpellTiming {
    /// Magic phase, creation step
    Creation,
    /// Magic phase, defensive step
    Defensive,
    /// Magic phase, offensive step
    Offensive,
    /// Divine phase and end of combat
    Restorative,
}

#[derive(Debug, Clone)]
pub enum SpellKind {
    /// Conjure a new stack
    Summon {
        unit: Arc<UnitType>,
        quantity: u32,
        illusory: bool,
    },
    /// Buff a friendly stack
    Ward(SpellEffects),
    /// Hex an enemy stack
    Curse(SpellEffects),
    /// One auto-hitting bolt per living caster
    Bolt(Attack),
    /// Remove all wounds from a friendly stack
    Heal,
}

#[derive(Debug, Clone)]
pub struct Spell {
    name: String,
    kind: SpellKind,
}

impl Spell {
    pub fn new(name: impl Into<String>, kind: SpellKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &SpellKind {
        &self.kind
    }

    pub fn timing(&self) -> SpellTiming {
        match self.kind {
            SpellKind::Summon { .. } => SpellTiming::Creation,
            SpellKind::Ward(_) => SpellTiming::Defensive,
            SpellKind::Curse(_) | SpellKind::Bolt(_) => SpellTiming::Offensive,
            SpellKind::Heal => SpellTiming::Restorative,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::attack::AttackQualities;

    #[test]
    fn test_effect_names() {
        assert_eq!(
            SpellEffects::parse_name("stone_skin").unwrap(),
            SpellEffects::STONE_SKIN
        );
        assert_eq!(
            SpellEffects::parse_name("MAGIC_SHIELD").unwrap(),
            SpellEffects::MAGIC_SHIELD
        );
        assert!(SpellEffects::parse_name("haste").is_err());
    }

    #[test]
    fn test_timing_by_kind() {
        let bolt = Attack::new("Firebolt", "1d6", 0, 1, AttackQualities::FIRE).unwrap();
        assert_eq!(
            Spell::new("Firebolt", SpellKind::Bolt(bolt)).timing(),
            SpellTiming::Offensive
        );
        assert_eq!(
            Spell::new("Ward", SpellKind::Ward(SpellEffects::MAGIC_SHIELD)).timing(),
            SpellTiming::Defensive
        );
        assert_eq!(Spell::new("Mend", SpellKind::Heal).timing(), SpellTiming::Restorative);
    }
}
