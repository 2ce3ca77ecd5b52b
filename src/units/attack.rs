//! Attacks and damage expressions
//!
//! A damage expression looks like `2d6+1` or `1d8-1d4-2`: dice terms and at
//! most one flat modifier joined by `+` and `-`.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::core::error::{GameError, Result};
use crate::dice::{DicePool, Die, RandomSource};

/// Separates multiplier from sides in a dice term
pub const DICE_DELIMITER: char = 'd';

bitflags! {
    /// Qualities that change how defences apply against an attack
    ///
    /// RANGED, SKIRMISH, CHARGE, MELEE and DIVINE also select the combat
    /// phase an attack is used in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct AttackQualities: u32 {
        const AP = 1 << 0;
        const GUNPOWDER = 1 << 1;
        const RANGED = 1 << 2;
        const SKIRMISH = 1 << 3;
        const FIRE = 1 << 4;
        const MAGIC = 1 << 5;
        const LIGHTNING = 1 << 6;
        const DIVINE = 1 << 7;
        const CHARGE = 1 << 8;
        const MELEE = 1 << 9;
        const ILLUSORY = 1 << 10;
        const COLD = 1 << 11;
        const POISON = 1 << 12;
    }
}

impl AttackQualities {
    /// Parse a quality name such as `"ranged"` or `"AP"`
    pub fn parse_name(name: &str) -> Result<Self> {
        Self::from_name(&name.trim().to_uppercase())
            .ok_or_else(|| GameError::UnknownQuality(name.to_string()))
    }
}

/// Parsed dice pool plus flat modifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageExpression {
    source: String,
    pool: DicePool,
    modifier: i32,
}

impl DamageExpression {
    /// Parse `N d S (+/- N d S)* (+/- K)`
    ///
    /// Subtraction becomes addition of a negative term. A term without the
    /// delimiter is a flat modifier; if several appear the last one wins.
    pub fn parse(expression: &str) -> Result<Self> {
        let malformed = |reason: &str| GameError::MalformedExpression {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let normalized: String = expression
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase()
            .replace('-', "+-");

        let mut pool = DicePool::new();
        let mut modifier = 0;
        let mut terms = 0;

        for term in normalized.split('+').filter(|t| !t.is_empty()) {
            terms += 1;
            let parts: Vec<&str> = term.split(DICE_DELIMITER).collect();
            match parts.as_slice() {
                [multiplier, sides] => {
                    let multiplier = match *multiplier {
                        "" => 1,
                        "-" => -1,
                        m => m
                            .parse::<i32>()
                            .map_err(|_| malformed(&format!("bad dice count '{m}'")))?,
                    };
                    let sides = sides
                        .parse::<u32>()
                        .map_err(|_| malformed(&format!("bad die size '{sides}'")))?;
                    pool.push(multiplier, Die::new(sides)?);
                }
                [flat] => {
                    modifier = flat
                        .parse::<i32>()
                        .map_err(|_| malformed(&format!("bad modifier '{flat}'")))?;
                }
                _ => return Err(malformed(&format!("bad term '{term}'"))),
            }
        }

        if terms == 0 {
            return Err(malformed("empty expression"));
        }

        Ok(Self {
            source: expression.to_string(),
            pool,
            modifier,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn pool(&self) -> &DicePool {
        &self.pool
    }

    pub fn modifier(&self) -> i32 {
        self.modifier
    }

    pub fn min(&self) -> i32 {
        self.pool.min() + self.modifier
    }

    pub fn max(&self) -> i32 {
        self.pool.max() + self.modifier
    }

    pub fn roll(&self, rng: &mut dyn RandomSource) -> i32 {
        self.pool.roll(rng, 0) + self.modifier
    }

    /// Exact `(damage, probability)` pairs for one roll
    pub fn distribution(&self) -> Vec<(i32, f64)> {
        self.pool
            .distribution()
            .into_iter()
            .map(|(value, p)| (value + self.modifier, p))
            .collect()
    }
}

/// One weapon or natural attack of a unit type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attack {
    name: String,
    damage: DamageExpression,
    qualities: AttackQualities,
    skill: i32,
    count: u32,
}

impl Attack {
    pub fn new(
        name: impl Into<String>,
        damage: &str,
        skill: i32,
        count: u32,
        qualities: AttackQualities,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            damage: DamageExpression::parse(damage)?,
            qualities,
            skill,
            count,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn damage(&self) -> &DamageExpression {
        &self.damage
    }

    pub fn qualities(&self) -> AttackQualities {
        self.qualities
    }

    pub fn skill(&self) -> i32 {
        self.skill
    }

    /// Attacks each combatant makes per phase
    pub fn count(&self) -> u32 {
        self.count
    }

    /// True when the attack carries any of the given qualities
    pub fn has_quality(&self, quality: AttackQualities) -> bool {
        self.qualities.intersects(quality)
    }

    /// Same attack with an extra quality
    pub fn with_quality(mut self, quality: AttackQualities) -> Self {
        self.qualities |= quality;
        self
    }

    pub fn min_damage(&self) -> i32 {
        self.damage.min()
    }

    pub fn max_damage(&self) -> i32 {
        self.damage.max()
    }

    pub fn roll_damage(&self, rng: &mut dyn RandomSource) -> i32 {
        self.damage.roll(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_parse_simple_expression() {
        let expr = DamageExpression::parse("2d6+1").unwrap();
        assert_eq!(expr.pool().terms().len(), 1);
        assert_eq!(expr.pool().terms()[0].0, 2);
        assert_eq!(expr.pool().terms()[0].1.sides(), 6);
        assert_eq!(expr.modifier(), 1);
        assert_eq!(expr.min(), 3);
        assert_eq!(expr.max(), 13);
    }

    #[test]
    fn test_parse_negative_flat_modifier() {
        let expr = DamageExpression::parse("1d4-2").unwrap();
        assert_eq!(expr.pool().terms().len(), 1);
        assert_eq!(expr.modifier(), -2);
        assert_eq!(expr.min(), -1);
        assert_eq!(expr.max(), 2);
    }

    #[test]
    fn test_parse_negative_dice_term() {
        let expr = DamageExpression::parse("1d8-1d4").unwrap();
        assert_eq!(expr.pool().terms()[1].0, -1);
        // worst case: 1 - 4, best case: 8 - 1
        assert_eq!(expr.min(), -3);
        assert_eq!(expr.max(), 7);
    }

    #[test]
    fn test_parse_implicit_multiplier() {
        let expr = DamageExpression::parse("d10").unwrap();
        assert_eq!(expr.pool().terms()[0].0, 1);
        assert_eq!(expr.min(), 1);
        assert_eq!(expr.max(), 10);
    }

    #[test]
    fn test_last_flat_modifier_wins() {
        let expr = DamageExpression::parse("1d6+1+3").unwrap();
        assert_eq!(expr.modifier(), 3);
    }

    #[test]
    fn test_flat_only() {
        let expr = DamageExpression::parse("4").unwrap();
        assert_eq!(expr.min(), 4);
        assert_eq!(expr.max(), 4);
    }

    #[test]
    fn test_whitespace_and_case() {
        let expr = DamageExpression::parse(" 2D6 + 1 ").unwrap();
        assert_eq!(expr.max(), 13);
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(matches!(
            DamageExpression::parse("2x6"),
            Err(GameError::MalformedExpression { .. })
        ));
        assert!(matches!(
            DamageExpression::parse("1d6d6"),
            Err(GameError::MalformedExpression { .. })
        ));
        assert!(matches!(
            DamageExpression::parse(""),
            Err(GameError::MalformedExpression { .. })
        ));
        assert!(matches!(
            DamageExpression::parse("2d0"),
            Err(GameError::InvalidDieSides(0))
        ));
    }

    #[test]
    fn test_rolls_stay_in_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for source in ["2d6+1", "1d4-2", "1d8-1d4", "3d3-1d6+2"] {
            let expr = DamageExpression::parse(source).unwrap();
            for _ in 0..10_000 {
                let roll = expr.roll(&mut rng);
                assert!(roll >= expr.min() && roll <= expr.max(), "{source}: {roll}");
            }
        }
    }

    #[test]
    fn test_distribution_mean() {
        let expr = DamageExpression::parse("2d6+1").unwrap();
        let mean: f64 = expr.distribution().iter().map(|(v, p)| *v as f64 * p).sum();
        assert!((mean - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_quality_names() {
        assert_eq!(AttackQualities::parse_name("ranged").unwrap(), AttackQualities::RANGED);
        assert_eq!(AttackQualities::parse_name("AP").unwrap(), AttackQualities::AP);
        assert!(matches!(
            AttackQualities::parse_name("sharp"),
            Err(GameError::UnknownQuality(_))
        ));
    }

    #[test]
    fn test_with_quality_leaves_original() {
        let bow = Attack::new("Bow", "1d6", 3, 1, AttackQualities::RANGED).unwrap();
        let phantom = bow.clone().with_quality(AttackQualities::ILLUSORY);
        assert!(phantom.has_quality(AttackQualities::ILLUSORY));
        assert!(phantom.has_quality(AttackQualities::RANGED));
        assert!(!bow.has_quality(AttackQualities::ILLUSORY));
    }
}
