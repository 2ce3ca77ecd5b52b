//! Combat resolution: unit stacks, damage math and the phase state machine

pub mod cache;
pub mod counters;
pub mod engine;
pub mod events;
pub mod math;
pub mod phase;
pub mod rolls;
pub mod stack;
pub mod tactician;

pub use cache::{ExpectedDamageCache, MatchupKey};
pub use counters::{attacking_counter, defending_counter, estimate_unit_damage};
pub use engine::{Combat, CombatSettings, RollMode, SideController};
pub use events::{AttackResolution, CombatEvent, CombatEventLog, CombatObserver, CombatOutcome};
pub use math::{stochastic_round, CombatMath, DefenseReport, RolledAttack};
pub use phase::{CombatPhase, MagicPhase};
pub use rolls::{AttackRollResult, AttackRollResultsCollection};
pub use stack::{DamageOutcome, UnitStack, WoundCheckReport};
pub use tactician::{select_cheapest_unit, select_min_replacement_cost_unit, TacticianPolicy};
