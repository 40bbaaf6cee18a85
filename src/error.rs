//! Engine error types

use thiserror::Error;

use crate::room::RoomId;
use crate::session::SessionId;

#[derive(Debug, Error)]
pub enum EngineError {
    /// No live or retained game for this session; start one first
    #[error("game not started for session {0}")]
    NotStarted(SessionId),
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    #[error("session {session} is not a member of room {room}")]
    NotInRoom { room: RoomId, session: SessionId },
    #[error("room {0} has no members")]
    EmptyRoom(RoomId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
