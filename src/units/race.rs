use serde::{Deserialize, Serialize};

use crate::core::types::RaceId;

/// A playable race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub id: RaceId,
    pub name: String,
    /// Added to the target number of every end-of-combat wound check
    #[serde(default)]
    pub wound_check_bonus: i32,
}

impl Race {
    pub fn new(id: RaceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            wound_check_bonus: 0,
        }
    }
}
