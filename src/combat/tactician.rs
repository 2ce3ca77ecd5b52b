//! Defender selection for AI-controlled sides

use serde::{Deserialize, Serialize};

use crate::combat::cache::ExpectedDamageCache;
use crate::combat::math::CombatMath;
use crate::combat::phase::CombatPhase;
use crate::combat::stack::UnitStack;
use crate::units::{SpellEffects, UnitType};

/// How an AI side picks which of its stacks absorbs the next attack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TacticianPolicy {
    /// Sacrifice the cheapest stack
    #[default]
    Cheapest,
    /// Minimise expected gold lost per point of damage risk
    MinReplacementCost,
}

impl TacticianPolicy {
    /// Index into `stacks` of the stack that should defend against `attacker`
    pub fn select_defending_stack(
        &self,
        stacks: &[UnitStack],
        attacker: &UnitType,
        attacker_effects: SpellEffects,
        phase: CombatPhase,
        math: &CombatMath,
        cache: &ExpectedDamageCache,
    ) -> Option<usize> {
        match self {
            TacticianPolicy::Cheapest => select_cheapest_unit(stacks),
            TacticianPolicy::MinReplacementCost => select_min_replacement_cost_unit(
                stacks,
                attacker,
                attacker_effects,
                phase,
                math,
                cache,
            ),
        }
    }
}

/// Non-empty stack with the lowest positive training cost. Ties keep the
/// first. Free stacks (summons) are only picked when nothing else is left.
pub fn select_cheapest_unit(stacks: &[UnitStack]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    let mut first_free = None;
    for (index, stack) in stacks.iter().enumerate() {
        if stack.is_empty() {
            continue;
        }
        let cost = stack.unit_type().training_cost();
        if cost == 0 {
            first_free.get_or_insert(index);
            continue;
        }
        match best {
            Some((_, lowest)) if cost >= lowest => {}
            _ => best = Some((index, cost)),
        }
    }
    best.map(|(index, _)| index).or(first_free)
}

/// Non-empty stack minimising `expected damage taken * cost / max hp`
pub fn select_min_replacement_cost_unit(
    stacks: &[UnitStack],
    attacker: &UnitType,
    attacker_effects: SpellEffects,
    phase: CombatPhase,
    math: &CombatMath,
    cache: &ExpectedDamageCache,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, stack) in stacks.iter().enumerate() {
        if stack.is_empty() {
            continue;
        }
        let damage = math.expected_stack_damage(
            cache,
            attacker,
            attacker_effects,
            stack.unit_type(),
            stack.effects(),
            phase,
        );
        let replacement =
            damage * stack.unit_type().training_cost() as f64 / stack.max_hit_points() as f64;
        match best {
            Some((_, lowest)) if replacement >= lowest => {}
            _ => best = Some((index, replacement)),
        }
    }
    best.map(|(index, _)| index)
}
