use crate::session::{CharacterId, ConnectionId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },
    #[error("{field} range is inverted: min {min} > max {max}")]
    InvertedRange {
        field: &'static str,
        min: f32,
        max: f32,
    },
    #[error("response curve {0} has no keys")]
    EmptyCurve(&'static str),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("unknown character {0}")]
    UnknownCharacter(CharacterId),
    #[error("connection {0} already has a character")]
    AlreadySpawned(ConnectionId),
    #[error("connection {connection} does not own character {character}")]
    NotOwner {
        connection: ConnectionId,
        character: CharacterId,
    },
    #[error("only the authority may {0}")]
    NotAuthority(&'static str),
}

pub(crate) fn ensure_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

pub(crate) fn ensure_range(field: &'static str, min: f32, max: f32) -> Result<(), ConfigError> {
    if min <= max {
        Ok(())
    } else {
        Err(ConfigError::InvertedRange { field, min, max })
    }
}
