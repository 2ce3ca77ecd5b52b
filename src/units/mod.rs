//! Unit data: attacks, spells, unit types and the catalog that holds them

pub mod attack;
pub mod catalog;
pub mod race;
pub mod spell;
pub mod unit;
pub mod unit_type;

pub use attack::{Attack, AttackQualities, DamageExpression};
pub use catalog::UnitCatalog;
pub use race::Race;
pub use spell::{Spell, SpellEffects, SpellKind, SpellTiming};
pub use unit::{total_training_cost, Unit};
pub use unit_type::{UnitType, UnitTypeBuilder};
