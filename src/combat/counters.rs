//! Counter-unit search used by AI training
//!
//! A unit only counts as a counter if it wins some phase decisively against
//! the threat.

use std::sync::Arc;

use crate::combat::cache::ExpectedDamageCache;
use crate::combat::math::CombatMath;
use crate::combat::phase::CombatPhase;
use crate::units::{SpellEffects, UnitType};

/// Expected damage `attacker` deals `defender` in the first phase where one
/// of them out-damages the other by more than `epsilon`, else 0
pub fn estimate_unit_damage(
    math: &CombatMath,
    cache: &ExpectedDamageCache,
    attacker: &UnitType,
    defender: &UnitType,
    epsilon: f64,
) -> f64 {
    let none = SpellEffects::empty();
    for phase in CombatPhase::DECISIVE {
        let dealt = math.expected_stack_damage(cache, attacker, none, defender, none, phase);
        let taken = math.expected_stack_damage(cache, defender, none, attacker, none, phase);
        if (dealt - taken).abs() > epsilon {
            return dealt;
        }
    }
    0.0
}

/// Non-hero candidate that deals `target` the most damage, provided two
/// exchanges would kill it
pub fn attacking_counter(
    math: &CombatMath,
    cache: &ExpectedDamageCache,
    target: &UnitType,
    candidates: &[Arc<UnitType>],
    epsilon: f64,
) -> Option<Arc<UnitType>> {
    let mut best: Option<(&Arc<UnitType>, f64)> = None;
    for candidate in candidates.iter().filter(|c| !c.is_hero()) {
        let damage = estimate_unit_damage(math, cache, candidate, target, epsilon);
        if damage * 2.0 < target.hit_points() as f64 {
            continue;
        }
        match best {
            Some((_, most)) if damage <= most => {}
            _ => best = Some((candidate, damage)),
        }
    }
    best.map(|(unit, _)| Arc::clone(unit))
}

/// Non-hero candidate with the lowest `damage taken / own hit points` ratio
/// against `threat`, provided the ratio is under `max_ratio`
pub fn defending_counter(
    math: &CombatMath,
    cache: &ExpectedDamageCache,
    threat: &UnitType,
    candidates: &[Arc<UnitType>],
    epsilon: f64,
    max_ratio: f64,
) -> Option<Arc<UnitType>> {
    let mut best: Option<(&Arc<UnitType>, f64)> = None;
    for candidate in candidates.iter().filter(|c| !c.is_hero()) {
        let taken = estimate_unit_damage(math, cache, threat, candidate, epsilon);
        let ratio = taken / candidate.hit_points() as f64;
        if ratio >= max_ratio {
            continue;
        }
        match best {
            Some((_, lowest)) if ratio >= lowest => {}
            _ => best = Some((candidate, ratio)),
        }
    }
    best.map(|(unit, _)| Arc::clone(unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CombatConfig;
    use crate::testing::fixtures;

    fn math() -> CombatMath {
        CombatMath::new(&CombatConfig::default()).unwrap()
    }

    #[test]
    fn test_decisive_phase_damage() {
        let m = math();
        let cache = ExpectedDamageCache::new();
        let archer = fixtures::archer();
        let peasant = fixtures::peasant();
        // Archers win the ranged phase outright
        let damage = estimate_unit_damage(&m, &cache, &archer, &peasant, 0.05);
        assert!(damage > 0.0);
        // and the peasant's best showing is that same phase, where it deals nothing
        assert_eq!(estimate_unit_damage(&m, &cache, &peasant, &archer, 0.05), 0.0);
    }

    #[test]
    fn test_even_match_is_not_decisive() {
        let m = math();
        let cache = ExpectedDamageCache::new();
        let a = fixtures::spearman();
        let b = fixtures::spearman();
        assert_eq!(estimate_unit_damage(&m, &cache, &a, &b, 0.05), 0.0);
    }

    #[test]
    fn test_attacking_counter_skips_heroes() {
        let m = math();
        let cache = ExpectedDamageCache::new();
        let target = fixtures::peasant();
        let candidates = vec![Arc::new(fixtures::champion()), Arc::new(fixtures::archer())];
        let counter = attacking_counter(&m, &cache, &target, &candidates, 0.05);
        assert_eq!(counter.map(|u| u.name().to_string()), Some("Archer".into()));
    }

    #[test]
    fn test_attacking_counter_needs_two_exchange_kill() {
        let m = math();
        let cache = ExpectedDamageCache::new();
        let target = fixtures::ogre();
        let candidates = vec![Arc::new(fixtures::peasant())];
        assert!(attacking_counter(&m, &cache, &target, &candidates, 0.05).is_none());
    }

    #[test]
    fn test_defending_counter_prefers_tough_units() {
        let m = math();
        let cache = ExpectedDamageCache::new();
        let threat = fixtures::spearman();
        let candidates = vec![Arc::new(fixtures::peasant()), Arc::new(fixtures::knight())];
        let counter = defending_counter(&m, &cache, &threat, &candidates, 0.05, 0.5);
        assert_eq!(counter.map(|u| u.name().to_string()), Some("Knight".into()));
    }
}
