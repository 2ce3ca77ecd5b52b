//! Structured combat events
//!
//! `Combat::perform_phase_actions` returns the events it produced and
//! `Combat::resolve_combat` hands them to a `CombatObserver` as they happen.

use serde::Serialize;

use crate::combat::phase::CombatPhase;
use crate::combat::stack::DamageOutcome;
use crate::core::types::{ProvinceId, Side, StackId};

/// How a combat ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CombatOutcome {
    AttackerVictory,
    DefenderVictory,
    /// Both sides wiped out
    Draw,
    /// The attackers withdrew
    Retreat,
    /// The turn limit ran out with both sides standing
    Stalemate,
}

/// Full detail of one resolved attack
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackResolution {
    pub attacker: StackId,
    pub attacker_side: Side,
    pub defender: StackId,
    pub attack: String,
    pub phase: CombatPhase,
    /// `(positive, negative)` attack dice
    pub attack_dice: (i32, i32),
    /// `(positive, negative)` defence dice; `None` when estimated
    pub defense_dice: Option<(i32, i32)>,
    pub skill: i32,
    pub defense_skill: i32,
    pub shield: i32,
    pub armor: i32,
    pub critical: bool,
    pub hit: bool,
    pub damage: u32,
    pub outcome: DamageOutcome,
    pub estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CombatEvent {
    PhaseStarted {
        turn: u32,
        phase: CombatPhase,
    },
    SpellCast {
        caster: StackId,
        side: Side,
        spell: String,
        target: Option<StackId>,
    },
    StackSummoned {
        stack: StackId,
        side: Side,
        unit: String,
        quantity: u32,
    },
    StacksHealed {
        stack: StackId,
        side: Side,
        healed: u32,
    },
    AttackResolved(AttackResolution),
    WoundChecks {
        stack: StackId,
        side: Side,
        recovered: u32,
        died: u32,
    },
    CombatFinished {
        outcome: CombatOutcome,
        /// Set on attacker victory: the province changes hands
        captured_province: Option<ProvinceId>,
    },
}

/// Receives events as a combat runs
pub trait CombatObserver {
    fn on_event(&mut self, event: &CombatEvent);
}

impl CombatObserver for () {
    fn on_event(&mut self, _event: &CombatEvent) {}
}

/// Events in the order they happened
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombatEventLog {
    pub events: Vec<CombatEvent>,
}

impl CombatEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: CombatEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, other: CombatEventLog) {
        self.events.extend(other.events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CombatEvent> {
        self.events.iter()
    }

    /// Attack resolutions only
    pub fn attacks(&self) -> impl Iterator<Item = &AttackResolution> {
        self.events.iter().filter_map(|event| match event {
            CombatEvent::AttackResolved(resolution) => Some(resolution),
            _ => None,
        })
    }

    /// Every `CombatFinished` event
    pub fn finishes(&self) -> impl Iterator<Item = (CombatOutcome, Option<ProvinceId>)> + '_ {
        self.events.iter().filter_map(|event| match event {
            CombatEvent::CombatFinished {
                outcome,
                captured_province,
            } => Some((*outcome, *captured_province)),
            _ => None,
        })
    }
}

impl CombatObserver for CombatEventLog {
    fn on_event(&mut self, event: &CombatEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filters() {
        let mut log = CombatEventLog::new();
        log.push(CombatEvent::PhaseStarted {
            turn: 1,
            phase: CombatPhase::Start,
        });
        log.on_event(&CombatEvent::CombatFinished {
            outcome: CombatOutcome::AttackerVictory,
            captured_province: Some(ProvinceId(2)),
        });
        assert_eq!(log.len(), 2);
        assert_eq!(log.attacks().count(), 0);
        assert_eq!(
            log.finishes().collect::<Vec<_>>(),
            vec![(CombatOutcome::AttackerVictory, Some(ProvinceId(2)))]
        );
    }

    #[test]
    fn test_events_serialize() {
        let event = CombatEvent::StacksHealed {
            stack: StackId(3),
            side: Side::Defender,
            healed: 2,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("StacksHealed"));
        assert!(json.contains("Defender"));
    }
}
