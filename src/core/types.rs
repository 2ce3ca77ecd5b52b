//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Unit types whose ids fall in this range are conjured creatures.
///
/// Stacks of them are dismissed at the end of every combat round.
pub const SUMMONED_CREATURE_IDS: std::ops::RangeInclusive<u32> = 900..=999;

/// Identifier of a unit type in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitTypeId(pub u32);

impl UnitTypeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// True for the fixed id range reserved for summoned creatures
    pub fn is_summoned_creature(&self) -> bool {
        SUMMONED_CREATURE_IDS.contains(&self.0)
    }
}

/// Identifier of a province on the campaign map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProvinceId(pub u32);

/// Identifier of a faction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactionId(pub u32);

/// Identifier of a race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaceId(pub u32);

/// Identifier of a unit stack within one combat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StackId(pub u32);

/// The two sides of a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    /// The side facing this one
    pub fn opponent(&self) -> Side {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }
}
