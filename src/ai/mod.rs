//! Campaign AI: attack planning by simulated battles, then training

pub mod attack_plan;
pub mod strategos;
pub mod training;

pub use attack_plan::{PlanState, ProvinceAttackPlan, SimulationSummary};
pub use strategos::{select_plans, Strategos, TurnOrders};
pub use training::{ProvinceTrainingPlan, TrainingReason, UnitTrainingPlan};
