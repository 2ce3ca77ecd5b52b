//! Provinces: garrison, manpower and what can be trained there

use std::sync::Arc;

use crate::core::types::{FactionId, ProvinceId, RaceId};
use crate::units::{total_training_cost, Unit, UnitType};

#[derive(Debug, Clone)]
pub struct Province {
    pub id: ProvinceId,
    pub name: String,
    /// `None` for unclaimed land
    pub owner: Option<FactionId>,
    pub neighbors: Vec<ProvinceId>,
    pub garrison: Vec<Unit>,
    /// Recruits available for training this turn
    pub manpower: u32,
    /// Worth of holding the province, in gold
    pub value: f64,
    pub dwelling_race: Option<RaceId>,
    pub trainable: Vec<Arc<UnitType>>,
}

impl Province {
    pub fn new(id: ProvinceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            owner: None,
            neighbors: Vec::new(),
            garrison: Vec::new(),
            manpower: 0,
            value: 0.0,
            dwelling_race: None,
            trainable: Vec::new(),
        }
    }

    pub fn with_owner(mut self, owner: FactionId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn with_manpower(mut self, manpower: u32) -> Self {
        self.manpower = manpower;
        self
    }

    pub fn with_race(mut self, race: RaceId) -> Self {
        self.dwelling_race = Some(race);
        self
    }

    pub fn with_trainable(mut self, trainable: Vec<Arc<UnitType>>) -> Self {
        self.trainable = trainable;
        self
    }

    /// Add units, merging with an existing garrison entry of the same type
    pub fn add_units(&mut self, unit: Unit) {
        if unit.quantity == 0 {
            return;
        }
        match self
            .garrison
            .iter_mut()
            .find(|u| Arc::ptr_eq(&u.unit_type, &unit.unit_type))
        {
            Some(existing) => existing.quantity += unit.quantity,
            None => self.garrison.push(unit),
        }
    }

    pub fn with_units(mut self, unit_type: Arc<UnitType>, quantity: u32) -> Self {
        self.add_units(Unit::new(unit_type, quantity));
        self
    }

    pub fn garrison_quantity(&self) -> u32 {
        self.garrison.iter().map(|u| u.quantity).sum()
    }

    pub fn garrison_cost(&self) -> u64 {
        total_training_cost(&self.garrison)
    }

    pub fn has_heroes(&self) -> bool {
        self.garrison
            .iter()
            .any(|u| u.quantity > 0 && u.unit_type.is_hero())
    }

    pub fn is_neighbor(&self, other: ProvinceId) -> bool {
        self.neighbors.contains(&other)
    }

    /// Every trainable unit type sharing the lowest training cost
    pub fn cheapest_trainable(&self) -> Vec<Arc<UnitType>> {
        let Some(lowest) = self.trainable.iter().map(|u| u.training_cost()).min() else {
            return Vec::new();
        };
        self.trainable
            .iter()
            .filter(|u| u.training_cost() == lowest)
            .cloned()
            .collect()
    }
}
