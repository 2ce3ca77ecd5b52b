//! Unit stacks: a group of identical combatants tracked as a hit-point histogram
//!
//! `health[i]` counts combatants currently at `i + 1` hit points. The stack's
//! quantity is always the histogram sum, and the histogram is always exactly
//! as long as the unit type's maximum hit points.

use serde::Serialize;
use std::sync::Arc;

use crate::core::types::{FactionId, ProvinceId, StackId};
use crate::dice::RandomSource;
use crate::units::{SpellEffects, Unit, UnitType};

/// What one `take_damage` call did to the struck combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DamageOutcome {
    /// No damage, or nobody left to hit
    Unharmed,
    /// Survived with fewer hit points
    Wounded,
    /// Removed from the stack
    Killed,
}

/// Tally of one round of end-of-combat wound checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WoundCheckReport {
    pub recovered: u32,
    pub died: u32,
}

#[derive(Debug, Clone)]
pub struct UnitStack {
    id: StackId,
    unit_type: Arc<UnitType>,
    health: Vec<u32>,
    retreat_to: Option<ProvinceId>,
    owner: Option<FactionId>,
    effects: SpellEffects,
    wound_check_bonus: i32,
}

impl UnitStack {
    /// A stack of `unit.quantity` combatants, all at full health
    pub fn new(unit: Unit) -> Self {
        let max_hp = unit.unit_type.hit_points().max(1) as usize;
        let mut health = vec![0; max_hp];
        health[max_hp - 1] = unit.quantity;
        Self {
            id: StackId(0),
            unit_type: unit.unit_type,
            health,
            retreat_to: None,
            owner: None,
            effects: SpellEffects::empty(),
            wound_check_bonus: 0,
        }
    }

    /// Province the stack falls back to after retreat or defeat
    pub fn with_retreat(mut self, province: ProvinceId) -> Self {
        self.retreat_to = Some(province);
        self
    }

    pub fn with_owner(mut self, owner: FactionId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_wound_check_bonus(mut self, bonus: i32) -> Self {
        self.wound_check_bonus = bonus;
        self
    }

    pub fn id(&self) -> StackId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: StackId) {
        self.id = id;
    }

    pub fn unit_type(&self) -> &Arc<UnitType> {
        &self.unit_type
    }

    /// The surviving combatants as a plain unit
    pub fn unit(&self) -> Unit {
        Unit::new(Arc::clone(&self.unit_type), self.quantity())
    }

    pub fn quantity(&self) -> u32 {
        self.health.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.quantity() == 0
    }

    pub fn max_hit_points(&self) -> u32 {
        self.health.len() as u32
    }

    pub fn health(&self) -> &[u32] {
        &self.health
    }

    /// Combatants below maximum hit points
    pub fn wounded(&self) -> u32 {
        self.health[..self.health.len() - 1].iter().sum()
    }

    pub fn total_hit_points(&self) -> u32 {
        self.health
            .iter()
            .enumerate()
            .map(|(i, &count)| (i as u32 + 1) * count)
            .sum()
    }

    /// Training cost of the survivors
    pub fn training_cost(&self) -> u64 {
        self.unit().training_cost()
    }

    pub fn retreat_to(&self) -> Option<ProvinceId> {
        self.retreat_to
    }

    pub fn owner(&self) -> Option<FactionId> {
        self.owner
    }

    pub fn wound_check_bonus(&self) -> i32 {
        self.wound_check_bonus
    }

    pub fn effects(&self) -> SpellEffects {
        self.effects
    }

    pub fn has_effect(&self, effect: SpellEffects) -> bool {
        self.effects.contains(effect)
    }

    pub fn add_effects(&mut self, effects: SpellEffects) {
        self.effects |= effects;
    }

    pub fn clear_effects(&mut self) {
        self.effects = SpellEffects::empty();
    }

    /// Bucket of a uniformly chosen combatant, weighted by bucket occupancy
    pub fn random_index(&self, rng: &mut dyn RandomSource) -> Option<usize> {
        let total = self.quantity();
        if total == 0 {
            return None;
        }
        let mut roll = rng.uniform_int(1, total as i32) as u32;
        for (index, &count) in self.health.iter().enumerate() {
            if roll <= count {
                return Some(index);
            }
            roll -= count;
        }
        None
    }

    /// Deal `amount` damage to one random combatant
    pub fn take_damage(&mut self, rng: &mut dyn RandomSource, amount: u32) -> DamageOutcome {
        if amount == 0 {
            return DamageOutcome::Unharmed;
        }
        let Some(index) = self.random_index(rng) else {
            return DamageOutcome::Unharmed;
        };

        self.health[index] -= 1;
        match index.checked_sub(amount as usize) {
            Some(wounded) => {
                self.health[wounded] += 1;
                DamageOutcome::Wounded
            }
            None => DamageOutcome::Killed,
        }
    }

    /// Restore every wounded combatant to full health. Returns how many
    /// were healed.
    pub fn heal(&mut self) -> u32 {
        let top = self.health.len() - 1;
        let healed = self.wounded();
        for bucket in &mut self.health[..top] {
            *bucket = 0;
        }
        self.health[top] += healed;
        healed
    }

    /// Resolve every wounded combatant into a survivor or a casualty
    ///
    /// A combatant at `i + 1` hit points survives when `1d(max hp)` rolls at
    /// most `i + 1 + bonus`.
    pub fn perform_wound_checks(
        &mut self,
        rng: &mut dyn RandomSource,
        bonus: i32,
    ) -> WoundCheckReport {
        let top = self.health.len() - 1;
        let max_hp = self.health.len() as i32;
        let mut report = WoundCheckReport::default();

        for index in 0..top {
            let target = index as i32 + 1 + bonus;
            for _ in 0..self.health[index] {
                if rng.uniform_int(1, max_hp) <= target {
                    report.recovered += 1;
                } else {
                    report.died += 1;
                }
            }
            self.health[index] = 0;
        }
        self.health[top] += report.recovered;
        report
    }

    /// Independent copy for a what-if combat. Spell effects are not copied.
    pub fn clone_for_simulation(&self) -> Self {
        Self {
            effects: SpellEffects::empty(),
            ..self.clone()
        }
    }
}
