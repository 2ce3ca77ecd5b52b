use std::sync::Arc;

use crate::units::unit_type::UnitType;

/// A quantity of one unit type, as held in a garrison or a movement order
#[derive(Debug, Clone)]
pub struct Unit {
    pub unit_type: Arc<UnitType>,
    pub quantity: u32,
}

impl Unit {
    pub fn new(unit_type: Arc<UnitType>, quantity: u32) -> Self {
        Self {
            unit_type,
            quantity,
        }
    }

    /// Gold it would take to train this many again
    pub fn training_cost(&self) -> u64 {
        self.unit_type.training_cost() as u64 * self.quantity as u64
    }
}

/// Sum of the training cost of a set of units
pub fn total_training_cost<'a>(units: impl IntoIterator<Item = &'a Unit>) -> u64 {
    units.into_iter().map(Unit::training_cost).sum()
}
