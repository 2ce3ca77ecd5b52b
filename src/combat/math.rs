//! Combat math: defensive modifiers, hit and damage rules, and the
//! exhaustive expected-damage estimator used by the AI
//!
//! Every attack and defence roll is `positive die - negative die`. The order
//! in which the shield and armor rules apply matters; each later rule may
//! override an earlier one.

use crate::combat::cache::{ExpectedDamageCache, MatchupKey};
use crate::combat::phase::CombatPhase;
use crate::core::config::CombatConfig;
use crate::core::error::{GameError, Result};
use crate::dice::{Die, RandomSource};
use crate::units::{Attack, AttackQualities, SpellEffects, UnitType};

/// Bonus added to shield by the Magic Shield effect
pub const MAGIC_SHIELD_BONUS: i32 = 2;
/// Bonus added to armor by the Stone Skin effect
pub const STONE_SKIN_BONUS: i32 = 2;

/// The attacker's half of one attack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RolledAttack {
    pub positive_die: i32,
    pub negative_die: i32,
    pub damage: i32,
    /// Second damage roll, made only on a critical
    pub bonus_damage: i32,
    pub critical: bool,
}

impl RolledAttack {
    pub fn attack_roll(&self) -> i32 {
        self.positive_die - self.negative_die
    }
}

/// The defender's half of one attack and its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefenseReport {
    pub positive_die: i32,
    pub negative_die: i32,
    pub defense_skill: i32,
    pub shield: i32,
    pub armor: i32,
    pub hit: bool,
    /// Damage after armor; 0 on a miss
    pub damage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatMath {
    die: Die,
    reroll_threshold: u32,
    criticals_enabled: bool,
    critical_margin: i32,
}

impl CombatMath {
    pub fn new(config: &CombatConfig) -> Result<Self> {
        if config.reroll_threshold > config.die_sides {
            return Err(GameError::InvalidRerollThreshold {
                sides: config.die_sides,
                threshold: config.reroll_threshold,
            });
        }
        Ok(Self {
            die: Die::new(config.die_sides)?,
            reroll_threshold: config.reroll_threshold,
            criticals_enabled: config.criticals_enabled,
            critical_margin: config.critical_margin,
        })
    }

    pub fn die_sides(&self) -> u32 {
        self.die.sides()
    }

    pub fn criticals_enabled(&self) -> bool {
        self.criticals_enabled
    }

    /// Roll a `(positive, negative)` die pair
    pub fn roll_dice(&self, rng: &mut dyn RandomSource) -> (i32, i32) {
        let positive = self.die.roll(rng, self.reroll_threshold) as i32;
        let negative = self.die.roll(rng, self.reroll_threshold) as i32;
        (positive, negative)
    }

    pub fn is_critical(&self, positive_die: i32, negative_die: i32) -> bool {
        self.criticals_enabled && positive_die - negative_die >= self.critical_margin
    }

    /// Ranged attacks ignore defence; skirmish and magic halve it
    pub fn defense_skill(&self, target: &UnitType, attack: &Attack) -> i32 {
        if attack.has_quality(AttackQualities::RANGED) {
            0
        } else if attack.has_quality(AttackQualities::SKIRMISH | AttackQualities::MAGIC) {
            target.defense() / 2
        } else {
            target.defense()
        }
    }

    pub fn shield(&self, target: &UnitType, effects: SpellEffects, attack: &Attack) -> i32 {
        let base = target.shield();
        let mut shield = base;
        if attack.has_quality(AttackQualities::SKIRMISH) {
            shield += base / 2;
        }
        if attack.has_quality(AttackQualities::RANGED) {
            shield = base * 2;
        }
        if attack.has_quality(AttackQualities::MAGIC | AttackQualities::LIGHTNING) {
            shield = base / 2;
        }
        if attack.has_quality(AttackQualities::GUNPOWDER) {
            shield = 0;
        }
        if effects.contains(SpellEffects::MAGIC_SHIELD) {
            shield += MAGIC_SHIELD_BONUS;
        }
        if attack.has_quality(AttackQualities::ILLUSORY) {
            shield = 0;
        }
        shield
    }

    pub fn armor(
        &self,
        target: &UnitType,
        effects: SpellEffects,
        attack: &Attack,
        critical: bool,
    ) -> i32 {
        let mut armor = target.armor();
        if attack.has_quality(
            AttackQualities::AP | AttackQualities::GUNPOWDER | AttackQualities::LIGHTNING,
        ) {
            armor /= 2;
        }
        if critical && self.criticals_enabled {
            armor = 0;
        }
        if attack.has_quality(AttackQualities::FIRE) {
            armor = 0;
        }
        if effects.contains(SpellEffects::STONE_SKIN) {
            armor += STONE_SKIN_BONUS;
        }
        if attack.has_quality(AttackQualities::ILLUSORY) {
            armor = 0;
        }
        armor
    }

    /// Subtract positive armor, floored at 0
    pub fn apply_armor(damage: i32, armor: i32) -> u32 {
        let damage = if armor > 0 { damage - armor } else { damage };
        damage.max(0) as u32
    }

    pub fn is_hit(critical: bool, attack_roll: i32, skill: i32, total_defense: i32) -> bool {
        critical || attack_roll + skill > total_defense
    }

    /// Roll attack dice and weapon damage
    pub fn roll_attack(&self, rng: &mut dyn RandomSource, attack: &Attack) -> RolledAttack {
        let (positive_die, negative_die) = self.roll_dice(rng);
        let critical = self.is_critical(positive_die, negative_die);
        let damage = attack.roll_damage(rng);
        let bonus_damage = if critical { attack.roll_damage(rng) } else { 0 };
        RolledAttack {
            positive_die,
            negative_die,
            damage,
            bonus_damage,
            critical,
        }
    }

    /// Roll defence against an already rolled attack
    pub fn resolve_roll(
        &self,
        rng: &mut dyn RandomSource,
        rolled: &RolledAttack,
        attack: &Attack,
        target: &UnitType,
        effects: SpellEffects,
    ) -> DefenseReport {
        let (positive_die, negative_die) = self.roll_dice(rng);
        let defense_skill = self.defense_skill(target, attack);
        let shield = self.shield(target, effects, attack);
        let armor = self.armor(target, effects, attack, rolled.critical);
        let total_defense = positive_die - negative_die + defense_skill + shield;
        let hit = Self::is_hit(
            rolled.critical,
            rolled.attack_roll(),
            attack.skill(),
            total_defense,
        );
        let damage = if hit {
            Self::apply_armor(rolled.damage + rolled.bonus_damage, armor)
        } else {
            0
        };
        DefenseReport {
            positive_die,
            negative_die,
            defense_skill,
            shield,
            armor,
            hit,
            damage,
        }
    }

    /// One complete live attack: attack roll, defence roll and damage
    pub fn calculate_damage(
        &self,
        rng: &mut dyn RandomSource,
        attack: &Attack,
        target: &UnitType,
        effects: SpellEffects,
    ) -> u32 {
        let rolled = self.roll_attack(rng, attack);
        self.resolve_roll(rng, &rolled, attack, target, effects).damage
    }

    /// Damage an auto-hitting attack (a bolt spell) deals after armor
    pub fn unopposed_damage(
        &self,
        rng: &mut dyn RandomSource,
        attack: &Attack,
        target: &UnitType,
        effects: SpellEffects,
    ) -> u32 {
        let armor = self.armor(target, effects, attack, false);
        Self::apply_armor(attack.roll_damage(rng), armor)
    }

    /// Exact expected damage of one attack, averaged over every attacker and
    /// defender die combination
    ///
    /// Each damage outcome is clamped to the target's hit points. Open-ended
    /// rerolls are not modelled.
    pub fn expected_attack_damage(
        &self,
        attack: &Attack,
        target: &UnitType,
        effects: SpellEffects,
    ) -> f64 {
        let sides = self.die.sides() as i32;
        let max_hp = target.hit_points() as i32;
        let defense = self.defense_skill(target, attack) + self.shield(target, effects, attack);

        let base = attack.damage().distribution();
        let normal = expected_after_armor(&base, self.armor(target, effects, attack, false), max_hp);
        let critical = if self.criticals_enabled {
            let doubled = convolve(&base, &base);
            expected_after_armor(&doubled, self.armor(target, effects, attack, true), max_hp)
        } else {
            0.0
        };

        let mut total = 0.0;
        for attack_pos in 1..=sides {
            for attack_neg in 1..=sides {
                let is_crit = self.is_critical(attack_pos, attack_neg);
                let attack_roll = attack_pos - attack_neg;
                let per_hit = if is_crit { critical } else { normal };
                for defense_pos in 1..=sides {
                    for defense_neg in 1..=sides {
                        let total_defense = defense_pos - defense_neg + defense;
                        if Self::is_hit(is_crit, attack_roll, attack.skill(), total_defense) {
                            total += per_hit;
                        }
                    }
                }
            }
        }
        total / (sides as f64).powi(4)
    }

    /// Expected damage rounded to an integer, with the fraction kept as the
    /// probability of rounding up
    pub fn estimate_attack_damage(
        &self,
        rng: &mut dyn RandomSource,
        attack: &Attack,
        target: &UnitType,
        effects: SpellEffects,
    ) -> u32 {
        stochastic_round(rng, self.expected_attack_damage(attack, target, effects))
    }

    /// Expected damage one attacker combatant deals to one defender combatant
    /// over all its attacks for `phase`
    ///
    /// Cached unless either side carries a spell effect.
    pub fn expected_stack_damage(
        &self,
        cache: &ExpectedDamageCache,
        attacker: &UnitType,
        attacker_effects: SpellEffects,
        defender: &UnitType,
        defender_effects: SpellEffects,
        phase: CombatPhase,
    ) -> f64 {
        let cacheable = attacker_effects.is_empty() && defender_effects.is_empty();
        cache.get_or_compute(MatchupKey::new(attacker, defender, phase), cacheable, || {
            attacker
                .attacks_for(phase.attack_quality())
                .map(|attack| {
                    attack.count() as f64
                        * self.expected_attack_damage(attack, defender, defender_effects)
                })
                .sum()
        })
    }

    /// `expected_stack_damage`, stochastically rounded
    #[allow(clippy::too_many_arguments)]
    pub fn estimate_stack_attacks_damage(
        &self,
        rng: &mut dyn RandomSource,
        cache: &ExpectedDamageCache,
        attacker: &UnitType,
        attacker_effects: SpellEffects,
        defender: &UnitType,
        defender_effects: SpellEffects,
        phase: CombatPhase,
    ) -> u32 {
        stochastic_round(
            rng,
            self.expected_stack_damage(
                cache,
                attacker,
                attacker_effects,
                defender,
                defender_effects,
                phase,
            ),
        )
    }
}

/// Round down, then round up with probability equal to the fraction
pub fn stochastic_round(rng: &mut dyn RandomSource, value: f64) -> u32 {
    if value <= 0.0 {
        return 0;
    }
    let whole = value.floor();
    let fraction = value - whole;
    let extra = if rng.unit_interval() < fraction { 1 } else { 0 };
    whole as u32 + extra
}

fn expected_after_armor(distribution: &[(i32, f64)], armor: i32, max_hp: i32) -> f64 {
    distribution
        .iter()
        .map(|&(damage, p)| p * (CombatMath::apply_armor(damage, armor) as i32).min(max_hp) as f64)
        .sum()
}

fn convolve(a: &[(i32, f64)], b: &[(i32, f64)]) -> Vec<(i32, f64)> {
    let mut out: std::collections::BTreeMap<i32, f64> = std::collections::BTreeMap::new();
    for &(x, p) in a {
        for &(y, q) in b {
            *out.entry(x + y).or_insert(0.0) += p * q;
        }
    }
    out.into_iter().collect()
}
