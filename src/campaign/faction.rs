use serde::{Deserialize, Serialize};

use crate::core::types::{FactionId, RaceId};

/// Strength of a computer-controlled faction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AiLevel {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl AiLevel {
    pub fn is_easiest(&self) -> bool {
        *self == AiLevel::Easy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub name: String,
    /// Gold available for training
    pub money: u64,
    pub ai_level: AiLevel,
    /// Controlled by a player or the AI, as opposed to rebels and monsters
    pub playable: bool,
    /// A great power whose neighbours retaliate against attacks
    pub major: bool,
    pub race: Option<RaceId>,
}

impl Faction {
    pub fn new(id: FactionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            money: 0,
            ai_level: AiLevel::default(),
            playable: true,
            major: true,
            race: None,
        }
    }

    pub fn with_money(mut self, money: u64) -> Self {
        self.money = money;
        self
    }

    pub fn with_ai_level(mut self, ai_level: AiLevel) -> Self {
        self.ai_level = ai_level;
        self
    }

    pub fn with_race(mut self, race: RaceId) -> Self {
        self.race = Some(race);
        self
    }

    /// Rebels, bandits and the like: not playable, not major
    pub fn minor(mut self) -> Self {
        self.playable = false;
        self.major = false;
        self
    }
}
