//! Pending attack rolls, grouped per source stack

use std::collections::VecDeque;
use std::sync::Arc;

use crate::combat::math::RolledAttack;
use crate::combat::phase::CombatPhase;
use crate::core::types::{Side, StackId};
use crate::units::{Attack, UnitType};

/// One attack opportunity rolled for a stack in the current phase
#[derive(Debug, Clone)]
pub struct AttackRollResult {
    pub source: StackId,
    pub side: Side,
    pub unit_type: Arc<UnitType>,
    pub attack_index: usize,
    pub phase: CombatPhase,
    pub positive_die: i32,
    pub negative_die: i32,
    pub skill: i32,
    pub damage: i32,
    pub bonus_damage: i32,
    pub critical: bool,
    /// Resolve with expected damage instead of defence dice
    pub estimated: bool,
}

impl AttackRollResult {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: StackId,
        side: Side,
        unit_type: Arc<UnitType>,
        attack_index: usize,
        phase: CombatPhase,
        rolled: RolledAttack,
        estimated: bool,
    ) -> Self {
        let skill = unit_type
            .attacks()
            .get(attack_index)
            .map(Attack::skill)
            .unwrap_or(0);
        Self {
            source,
            side,
            unit_type,
            attack_index,
            phase,
            positive_die: rolled.positive_die,
            negative_die: rolled.negative_die,
            skill,
            damage: rolled.damage,
            bonus_damage: rolled.bonus_damage,
            critical: rolled.critical,
            estimated,
        }
    }

    pub fn attack(&self) -> Option<&Attack> {
        self.unit_type.attacks().get(self.attack_index)
    }

    pub fn rolled(&self) -> RolledAttack {
        RolledAttack {
            positive_die: self.positive_die,
            negative_die: self.negative_die,
            damage: self.damage,
            bonus_damage: self.bonus_damage,
            critical: self.critical,
        }
    }
}

/// Every roll one stack made this phase. All results share one source.
#[derive(Debug, Clone)]
pub struct AttackRollResultsCollection {
    source: StackId,
    side: Side,
    results: VecDeque<AttackRollResult>,
}

impl AttackRollResultsCollection {
    pub fn new(source: StackId, side: Side) -> Self {
        Self {
            source,
            side,
            results: VecDeque::new(),
        }
    }

    pub fn source(&self) -> StackId {
        self.source
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Add a result. A result from another stack is dropped and `false`
    /// returned.
    pub fn push(&mut self, result: AttackRollResult) -> bool {
        if result.source != self.source {
            tracing::warn!(
                "Dropping attack roll from stack {:?} in collection for {:?}",
                result.source,
                self.source
            );
            return false;
        }
        self.results.push_back(result);
        true
    }

    /// Skill of the first roll, used to order collections
    pub fn first_skill(&self) -> i32 {
        self.results.front().map(|r| r.skill).unwrap_or(0)
    }

    pub fn front(&self) -> Option<&AttackRollResult> {
        self.results.front()
    }

    pub fn pop_front(&mut self) -> Option<AttackRollResult> {
        self.results.pop_front()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttackRollResult> {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UnitTypeId;
    use crate::units::AttackQualities;

    fn result(source: u32, skill: i32) -> AttackRollResult {
        let unit = UnitType::builder(UnitTypeId(1), "Spear")
            .attack(Attack::new("Thrust", "1d6", skill, 1, AttackQualities::MELEE).unwrap())
            .build()
            .unwrap();
        AttackRollResult::new(
            StackId(source),
            Side::Attacker,
            Arc::new(unit),
            0,
            CombatPhase::Melee,
            RolledAttack {
                positive_die: 4,
                negative_die: 2,
                damage: 3,
                bonus_damage: 0,
                critical: false,
            },
            false,
        )
    }

    #[test]
    fn test_collection_rejects_foreign_source() {
        let mut collection = AttackRollResultsCollection::new(StackId(1), Side::Attacker);
        assert!(collection.push(result(1, 3)));
        assert!(!collection.push(result(2, 3)));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.first_skill(), 3);
    }

    #[test]
    fn test_results_consumed_in_order() {
        let mut collection = AttackRollResultsCollection::new(StackId(1), Side::Attacker);
        collection.push(result(1, 1));
        collection.push(result(1, 5));
        assert_eq!(collection.pop_front().map(|r| r.skill), Some(1));
        assert_eq!(collection.pop_front().map(|r| r.skill), Some(5));
        assert!(collection.is_empty());
        assert!(collection.pop_front().is_none());
    }

    #[test]
    fn test_roll_keeps_attack_reference() {
        let r = result(1, 2);
        assert_eq!(r.attack().map(Attack::name), Some("Thrust"));
        assert_eq!(r.rolled().positive_die - r.rolled().negative_die, 2);
    }
}
