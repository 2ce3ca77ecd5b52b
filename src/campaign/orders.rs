//! Orders the AI hands back to the game each turn

use serde::Serialize;
use std::sync::Arc;

use crate::core::types::ProvinceId;
use crate::units::{total_training_cost, Unit, UnitType};

/// Move units from one province to a neighbour. Moving into hostile land
/// is an attack.
#[derive(Debug, Clone)]
pub struct MovementOrder {
    pub origin: ProvinceId,
    pub destination: ProvinceId,
    pub units: Vec<Unit>,
}

impl MovementOrder {
    pub fn new(origin: ProvinceId, destination: ProvinceId, units: Vec<Unit>) -> Self {
        Self {
            origin,
            destination,
            units,
        }
    }

    pub fn quantity(&self) -> u32 {
        self.units.iter().map(|u| u.quantity).sum()
    }

    pub fn training_cost(&self) -> u64 {
        total_training_cost(&self.units)
    }

    pub fn has_heroes(&self) -> bool {
        self.units
            .iter()
            .any(|u| u.quantity > 0 && u.unit_type.is_hero())
    }

    pub fn summary(&self) -> MovementSummary {
        MovementSummary {
            origin: self.origin,
            destination: self.destination,
            units: self
                .units
                .iter()
                .map(|u| (u.unit_type.name().to_string(), u.quantity))
                .collect(),
        }
    }
}

/// Queue `quantity` units for training in a province
#[derive(Debug, Clone)]
pub struct TrainingOrder {
    pub province: ProvinceId,
    pub unit_type: Arc<UnitType>,
    pub quantity: u32,
    /// Repeats every turn; AI orders are always single-turn
    pub standing: bool,
}

impl TrainingOrder {
    pub fn cost(&self) -> u64 {
        self.unit_type.training_cost() as u64 * self.quantity as u64
    }
}

/// Serializable view of a movement order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementSummary {
    pub origin: ProvinceId,
    pub destination: ProvinceId,
    pub units: Vec<(String, u32)>,
}
