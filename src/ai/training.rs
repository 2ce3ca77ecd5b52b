//! Per-province training queues built by the AI

use serde::Serialize;
use std::sync::Arc;

use crate::campaign::TrainingOrder;
use crate::core::types::ProvinceId;
use crate::units::UnitType;

/// Why a unit was queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TrainingReason {
    /// Answers a threat that beat one of our attack plans
    Counter,
    /// A fodder slot upgraded to something sturdier
    Core,
    /// Cheapest available, fills spare manpower
    Fodder,
}

#[derive(Debug, Clone)]
pub struct UnitTrainingPlan {
    pub unit_type: Arc<UnitType>,
    pub quantity: u32,
    pub reason: TrainingReason,
}

impl UnitTrainingPlan {
    pub fn cost(&self) -> u64 {
        self.unit_type.training_cost() as u64 * self.quantity as u64
    }
}

#[derive(Debug, Clone)]
pub struct ProvinceTrainingPlan {
    province: ProvinceId,
    manpower: u32,
    units: Vec<UnitTrainingPlan>,
}

impl ProvinceTrainingPlan {
    pub fn new(province: ProvinceId, manpower: u32) -> Self {
        Self {
            province,
            manpower,
            units: Vec::new(),
        }
    }

    pub fn province(&self) -> ProvinceId {
        self.province
    }

    pub fn units(&self) -> &[UnitTrainingPlan] {
        &self.units
    }

    pub fn queued(&self) -> u32 {
        self.units.iter().map(|u| u.quantity).sum()
    }

    pub fn manpower_left(&self) -> u32 {
        self.manpower.saturating_sub(self.queued())
    }

    pub fn cost(&self) -> u64 {
        self.units.iter().map(UnitTrainingPlan::cost).sum()
    }

    /// Queue up to `quantity` units, capped by spare manpower. Returns how
    /// many were queued.
    pub fn add(&mut self, unit_type: &Arc<UnitType>, quantity: u32, reason: TrainingReason) -> u32 {
        let quantity = quantity.min(self.manpower_left());
        if quantity == 0 {
            return 0;
        }
        match self
            .units
            .iter_mut()
            .find(|u| u.reason == reason && Arc::ptr_eq(&u.unit_type, unit_type))
        {
            Some(existing) => existing.quantity += quantity,
            None => self.units.push(UnitTrainingPlan {
                unit_type: Arc::clone(unit_type),
                quantity,
                reason,
            }),
        }
        quantity
    }

    /// Remove one fodder unit of `unit_type`, if any is queued
    pub fn take_fodder(&mut self, unit_type: &Arc<UnitType>) -> bool {
        let Some(index) = self.units.iter().position(|u| {
            u.reason == TrainingReason::Fodder && u.quantity > 0 && Arc::ptr_eq(&u.unit_type, unit_type)
        }) else {
            return false;
        };
        self.units[index].quantity -= 1;
        if self.units[index].quantity == 0 {
            self.units.remove(index);
        }
        true
    }

    /// Fodder unit types queued here, with quantities
    pub fn fodder(&self) -> Vec<(Arc<UnitType>, u32)> {
        self.units
            .iter()
            .filter(|u| u.reason == TrainingReason::Fodder)
            .map(|u| (Arc::clone(&u.unit_type), u.quantity))
            .collect()
    }

    /// Single-turn orders, one per unit type
    pub fn into_orders(self) -> Vec<TrainingOrder> {
        let mut orders: Vec<TrainingOrder> = Vec::new();
        for plan in self.units.into_iter().filter(|u| u.quantity > 0) {
            match orders
                .iter_mut()
                .find(|o| Arc::ptr_eq(&o.unit_type, &plan.unit_type))
            {
                Some(order) => order.quantity += plan.quantity,
                None => orders.push(TrainingOrder {
                    province: self.province,
                    unit_type: plan.unit_type,
                    quantity: plan.quantity,
                    standing: false,
                }),
            }
        }
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_add_respects_manpower() {
        let peasant = Arc::new(fixtures::peasant());
        let mut plan = ProvinceTrainingPlan::new(ProvinceId(1), 5);
        assert_eq!(plan.add(&peasant, 3, TrainingReason::Fodder), 3);
        assert_eq!(plan.add(&peasant, 3, TrainingReason::Fodder), 2);
        assert_eq!(plan.add(&peasant, 1, TrainingReason::Fodder), 0);
        assert_eq!(plan.units().len(), 1);
        assert_eq!(plan.cost(), 25);
    }

    #[test]
    fn test_orders_merge_reasons() {
        let spear = Arc::new(fixtures::spearman());
        let mut plan = ProvinceTrainingPlan::new(ProvinceId(3), 10);
        plan.add(&spear, 2, TrainingReason::Counter);
        plan.add(&spear, 3, TrainingReason::Fodder);
        assert!(plan.take_fodder(&spear));
        let orders = plan.into_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].quantity, 4);
        assert!(!orders[0].standing);
        assert_eq!(orders[0].province, ProvinceId(3));
    }

    #[test]
    fn test_take_fodder_ignores_other_reasons() {
        let spear = Arc::new(fixtures::spearman());
        let mut plan = ProvinceTrainingPlan::new(ProvinceId(1), 4);
        plan.add(&spear, 1, TrainingReason::Counter);
        assert!(!plan.take_fodder(&spear));
        assert_eq!(plan.queued(), 1);
    }
}
