//! Combat round phases

use serde::Serialize;

use crate::units::AttackQualities;

/// Phases of one combat round, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CombatPhase {
    Start,
    Magic,
    Ranged,
    Skirmish,
    Charge,
    Melee,
    Divine,
    Cleanup,
}

impl CombatPhase {
    /// Phases the counter search compares units in
    pub const DECISIVE: [CombatPhase; 5] = [
        CombatPhase::Magic,
        CombatPhase::Ranged,
        CombatPhase::Skirmish,
        CombatPhase::Charge,
        CombatPhase::Melee,
    ];

    /// Quality that tags an attack as usable in this phase
    pub fn attack_quality(&self) -> AttackQualities {
        match self {
            CombatPhase::Magic => AttackQualities::MAGIC,
            CombatPhase::Ranged => AttackQualities::RANGED,
            CombatPhase::Skirmish => AttackQualities::SKIRMISH,
            CombatPhase::Charge => AttackQualities::CHARGE,
            CombatPhase::Melee => AttackQualities::MELEE,
            CombatPhase::Divine => AttackQualities::DIVINE,
            CombatPhase::Start | CombatPhase::Cleanup => AttackQualities::empty(),
        }
    }

    /// Phases in which stacks roll attacks
    pub fn generates_attack_rolls(&self) -> bool {
        matches!(
            self,
            CombatPhase::Ranged
                | CombatPhase::Skirmish
                | CombatPhase::Charge
                | CombatPhase::Melee
                | CombatPhase::Divine
        )
    }

    /// The following phase. `Cleanup` wraps to `Start`.
    pub fn next(&self) -> CombatPhase {
        match self {
            CombatPhase::Start => CombatPhase::Magic,
            CombatPhase::Magic => CombatPhase::Ranged,
            CombatPhase::Ranged => CombatPhase::Skirmish,
            CombatPhase::Skirmish => CombatPhase::Charge,
            CombatPhase::Charge => CombatPhase::Melee,
            CombatPhase::Melee => CombatPhase::Divine,
            CombatPhase::Divine => CombatPhase::Cleanup,
            CombatPhase::Cleanup => CombatPhase::Start,
        }
    }
}

/// Steps of the magic phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MagicPhase {
    UnitCreation,
    Defensive,
    Offensive,
}

impl MagicPhase {
    pub fn next(&self) -> Option<MagicPhase> {
        match self {
            MagicPhase::UnitCreation => Some(MagicPhase::Defensive),
            MagicPhase::Defensive => Some(MagicPhase::Offensive),
            MagicPhase::Offensive => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_cycle() {
        let mut phase = CombatPhase::Start;
        let mut seen = vec![phase];
        loop {
            phase = phase.next();
            if phase == CombatPhase::Start {
                break;
            }
            seen.push(phase);
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(seen.last(), Some(&CombatPhase::Cleanup));
    }

    #[test]
    fn test_attack_phases() {
        assert!(CombatPhase::Melee.generates_attack_rolls());
        assert!(CombatPhase::Divine.generates_attack_rolls());
        assert!(!CombatPhase::Magic.generates_attack_rolls());
        assert!(CombatPhase::Start.attack_quality().is_empty());
    }
}
