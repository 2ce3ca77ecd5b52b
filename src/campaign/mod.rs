//! Campaign collaborators the AI plans against: provinces, factions and orders

pub mod faction;
pub mod map;
pub mod orders;
pub mod province;

pub use faction::{AiLevel, Faction};
pub use map::CampaignMap;
pub use orders::{MovementOrder, MovementSummary, TrainingOrder};
pub use province::Province;
pub use crate::units::Race;
