use thiserror::Error;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Malformed damage expression '{expression}': {reason}")]
    MalformedExpression { expression: String, reason: String },

    #[error("Invalid die: {0} sides")]
    InvalidDieSides(u32),

    #[error("Reroll threshold {threshold} exceeds die sides {sides}")]
    InvalidRerollThreshold { sides: u32, threshold: u32 },

    #[error("4d6 outcome {0} outside [4, 24]")]
    OutcomeOutOfRange(i32),

    #[error("Unknown unit type: {0}")]
    UnknownUnitType(String),

    #[error("Unknown attack quality: {0}")]
    UnknownQuality(String),

    #[error("Unknown spell effect: {0}")]
    UnknownSpellEffect(String),

    #[error("Unknown race: {0}")]
    UnknownRace(String),

    #[error("Invalid unit definition for {name}: {reason}")]
    InvalidUnit { name: String, reason: String },

    #[error("Unknown faction: {0}")]
    UnknownFaction(u32),

    #[error("Unknown province: {0}")]
    UnknownProvince(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GameError>;
