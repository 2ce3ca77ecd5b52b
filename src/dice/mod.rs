//! Dice - random number utilities shared by combat and the campaign AI

pub mod roll;
pub mod source;

pub use roll::{probability_4d6, roll_die, roll_pool, roll_successes, DicePool, Die};
pub use source::{RandomSource, ScriptedRolls};
