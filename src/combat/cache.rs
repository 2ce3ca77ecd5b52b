//! Memoized expected damage per attacker type, defender type and phase

use ahash::AHashMap;
use std::sync::{Mutex, PoisonError};

use crate::combat::phase::CombatPhase;
use crate::core::types::UnitTypeId;
use crate::units::UnitType;

/// Cache key. Illusory copies share their original's id, so the flag is
/// part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchupKey {
    pub attacker: UnitTypeId,
    pub attacker_illusory: bool,
    pub defender: UnitTypeId,
    pub defender_illusory: bool,
    pub phase: CombatPhase,
}

impl MatchupKey {
    pub fn new(attacker: &UnitType, defender: &UnitType, phase: CombatPhase) -> Self {
        Self {
            attacker: attacker.id(),
            attacker_illusory: attacker.is_illusory(),
            defender: defender.id(),
            defender_illusory: defender.is_illusory(),
            phase,
        }
    }
}

/// Shared between every combat of one AI turn; safe to use from rayon workers
#[derive(Debug, Default)]
pub struct ExpectedDamageCache {
    entries: Mutex<AHashMap<MatchupKey, f64>>,
}

impl ExpectedDamageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, or compute it
    ///
    /// When `cacheable` is false the value is computed and neither read from
    /// nor written to the cache. Callers pass false while either stack
    /// carries a spell effect.
    pub fn get_or_compute(
        &self,
        key: MatchupKey,
        cacheable: bool,
        compute: impl FnOnce() -> f64,
    ) -> f64 {
        if !cacheable {
            return compute();
        }
        if let Some(&value) = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return value;
        }

        // Computed outside the lock; a racing worker writes the same value
        let value = compute();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
        value
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> MatchupKey {
        MatchupKey {
            attacker: UnitTypeId(1),
            attacker_illusory: false,
            defender: UnitTypeId(2),
            defender_illusory: false,
            phase: CombatPhase::Melee,
        }
    }

    #[test]
    fn test_computes_once() {
        let cache = ExpectedDamageCache::new();
        let mut calls = 0;
        let a = cache.get_or_compute(key(), true, || {
            calls += 1;
            1.5
        });
        let b = cache.get_or_compute(key(), true, || {
            calls += 1;
            9.0
        });
        assert_eq!(a, 1.5);
        assert_eq!(b, 1.5);
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_uncacheable_bypasses() {
        let cache = ExpectedDamageCache::new();
        cache.get_or_compute(key(), true, || 1.0);
        assert_eq!(cache.get_or_compute(key(), false, || 3.0), 3.0);
        assert_eq!(cache.get_or_compute(key(), true, || 5.0), 1.0);

        let other = MatchupKey {
            phase: CombatPhase::Ranged,
            ..key()
        };
        assert_eq!(cache.get_or_compute(other, false, || 2.0), 2.0);
        assert_eq!(cache.len(), 1);
    }
}
