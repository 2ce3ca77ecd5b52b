pub mod config;
pub mod error;
pub mod types;

pub use config::{AiConfig, CombatConfig, GameConfig};
pub use error::{GameError, Result};
pub use types::{FactionId, ProvinceId, RaceId, Side, StackId, UnitTypeId};
