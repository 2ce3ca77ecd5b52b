//! Unit types - immutable static data shared through `Arc`
//!
//! Variants such as illusory copies are new values, never edits of a
//! shared type.

use crate::core::error::{GameError, Result};
use crate::core::types::UnitTypeId;
use crate::units::attack::{Attack, AttackQualities};
use crate::units::spell::{Spell, SpellEffects};

#[derive(Debug, Clone)]
pub struct UnitType {
    id: UnitTypeId,
    name: String,
    training_cost: u32,
    hit_points: u32,
    defense: i32,
    shield: i32,
    armor: i32,
    hero: bool,
    holy: bool,
    trainable: bool,
    illusory: bool,
    attacks: Vec<Attack>,
    spells: Vec<Spell>,
    abilities: SpellEffects,
}

impl UnitType {
    pub fn builder(id: UnitTypeId, name: impl Into<String>) -> UnitTypeBuilder {
        UnitTypeBuilder::new(id, name)
    }

    pub fn id(&self) -> UnitTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn training_cost(&self) -> u32 {
        self.training_cost
    }

    /// Maximum hit points of one combatant (always at least 1)
    pub fn hit_points(&self) -> u32 {
        self.hit_points
    }

    pub fn defense(&self) -> i32 {
        self.defense
    }

    pub fn shield(&self) -> i32 {
        self.shield
    }

    pub fn armor(&self) -> i32 {
        self.armor
    }

    pub fn is_hero(&self) -> bool {
        self.hero
    }

    pub fn is_holy(&self) -> bool {
        self.holy
    }

    pub fn is_trainable(&self) -> bool {
        self.trainable
    }

    pub fn is_illusory(&self) -> bool {
        self.illusory
    }

    pub fn attacks(&self) -> &[Attack] {
        &self.attacks
    }

    /// Attacks usable in the phase tagged by `quality`
    pub fn attacks_for(&self, quality: AttackQualities) -> impl Iterator<Item = &Attack> + '_ {
        self.attacks
            .iter()
            .filter(move |attack| !quality.is_empty() && attack.has_quality(quality))
    }

    pub fn has_attacks_for(&self, quality: AttackQualities) -> bool {
        self.attacks_for(quality).next().is_some()
    }

    pub fn spells(&self) -> &[Spell] {
        &self.spells
    }

    /// Effects the unit applies to its own stack at the start of each round
    pub fn abilities(&self) -> SpellEffects {
        self.abilities
    }

    /// A conjured illusion of this unit: one hit point, no shield or armor,
    /// every attack illusory, no magic of its own
    pub fn illusory_copy(&self) -> UnitType {
        UnitType {
            id: self.id,
            name: format!("Illusory {}", self.name),
            training_cost: 0,
            hit_points: 1,
            defense: self.defense,
            shield: 0,
            armor: 0,
            hero: false,
            holy: false,
            trainable: false,
            illusory: true,
            attacks: self
                .attacks
                .iter()
                .cloned()
                .map(|attack| attack.with_quality(AttackQualities::ILLUSORY))
                .collect(),
            spells: Vec::new(),
            abilities: SpellEffects::empty(),
        }
    }
}

/// Builds a validated `UnitType`
#[derive(Debug, Clone)]
pub struct UnitTypeBuilder {
    unit: UnitType,
}

impl UnitTypeBuilder {
    pub fn new(id: UnitTypeId, name: impl Into<String>) -> Self {
        Self {
            unit: UnitType {
                id,
                name: name.into(),
                training_cost: 0,
                hit_points: 1,
                defense: 0,
                shield: 0,
                armor: 0,
                hero: false,
                holy: false,
                trainable: true,
                illusory: false,
                attacks: Vec::new(),
                spells: Vec::new(),
                abilities: SpellEffects::empty(),
            },
        }
    }

    pub fn training_cost(mut self, cost: u32) -> Self {
        self.unit.training_cost = cost;
        self
    }

    pub fn hit_points(mut self, hit_points: u32) -> Self {
        self.unit.hit_points = hit_points;
        self
    }

    pub fn defense(mut self, defense: i32) -> Self {
        self.unit.defense = defense;
        self
    }

    pub fn shield(mut self, shield: i32) -> Self {
        self.unit.shield = shield;
        self
    }

    pub fn armor(mut self, armor: i32) -> Self {
        self.unit.armor = armor;
        self
    }

    pub fn hero(mut self, hero: bool) -> Self {
        self.unit.hero = hero;
        self
    }

    pub fn holy(mut self, holy: bool) -> Self {
        self.unit.holy = holy;
        self
    }

    pub fn trainable(mut self, trainable: bool) -> Self {
        self.unit.trainable = trainable;
        self
    }

    pub fn attack(mut self, attack: Attack) -> Self {
        self.unit.attacks.push(attack);
        self
    }

    pub fn spell(mut self, spell: Spell) -> Self {
        self.unit.spells.push(spell);
        self
    }

    pub fn abilities(mut self, abilities: SpellEffects) -> Self {
        self.unit.abilities = abilities;
        self
    }

    pub fn build(self) -> Result<UnitType> {
        if self.unit.hit_points == 0 {
            return Err(GameError::InvalidUnit {
                name: self.unit.name,
                reason: "hit points must be at least 1".into(),
            });
        }
        Ok(self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archer() -> UnitType {
        UnitType::builder(UnitTypeId(3), "Archer")
            .training_cost(20)
            .hit_points(3)
            .defense(2)
            .shield(1)
            .armor(1)
            .attack(Attack::new("Bow", "1d6", 3, 1, AttackQualities::RANGED).unwrap())
            .attack(Attack::new("Dagger", "1d3", 1, 1, AttackQualities::MELEE).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_zero_hit_points_rejected() {
        let result = UnitType::builder(UnitTypeId(1), "Ghost").hit_points(0).build();
        assert!(matches!(result, Err(GameError::InvalidUnit { .. })));
    }

    #[test]
    fn test_attacks_by_phase_quality() {
        let unit = archer();
        assert_eq!(unit.attacks_for(AttackQualities::RANGED).count(), 1);
        assert_eq!(unit.attacks_for(AttackQualities::MELEE).count(), 1);
        assert!(!unit.has_attacks_for(AttackQualities::CHARGE));
        assert!(!unit.has_attacks_for(AttackQualities::empty()));
    }

    #[test]
    fn test_illusory_copy_is_a_new_value() {
        let unit = archer();
        let phantom = unit.illusory_copy();

        assert!(phantom.is_illusory());
        assert_eq!(phantom.hit_points(), 1);
        assert_eq!(phantom.shield(), 0);
        assert_eq!(phantom.armor(), 0);
        assert!(phantom
            .attacks()
            .iter()
            .all(|a| a.has_quality(AttackQualities::ILLUSORY)));

        // Original untouched
        assert!(!unit.is_illusory());
        assert_eq!(unit.hit_points(), 3);
        assert!(unit
            .attacks()
            .iter()
            .all(|a| !a.has_quality(AttackQualities::ILLUSORY)));
    }
}
