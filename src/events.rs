//! Outbound collaborators: score persistence and broadcast
//!
//! The engine never knows how scores are stored or how frames reach viewers.
//! It calls these traits and moves on.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::room::{RankingEntry, RoomId};
use crate::session::{SessionId, Snapshot};

/// Persists a final score. Called exactly once per session, at termination.
/// Errors are logged by the engine and otherwise ignored.
pub trait ScoreSink: Send + Sync + 'static {
    fn save_score(&self, session: SessionId, score: u64) -> anyhow::Result<()>;
}

/// Delivers state to viewers
pub trait Broadcaster: Send + Sync + 'static {
    /// After every command and every scheduled tick
    fn snapshot(&self, session: SessionId, snapshot: &Snapshot);

    /// Once per room, when the last member terminates
    fn room_complete(&self, room: RoomId, ranking: &[RankingEntry]);
}

/// Events emitted by the engine
#[non_exhaustive]
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineEvent {
    /// A session's state changed
    Update { snapshot: Snapshot },
    /// A room finished
    RoomComplete {
        room_id: RoomId,
        rankings: Vec<RankingEntry>,
    },
}

/// Forwards every event into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelBroadcaster {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn snapshot(&self, _session: SessionId, snapshot: &Snapshot) {
        // A closed receiver just means nobody is watching
        let _ = self.tx.send(EngineEvent::Update {
            snapshot: snapshot.clone(),
        });
    }

    fn room_complete(&self, room: RoomId, ranking: &[RankingEntry]) {
        let _ = self.tx.send(EngineEvent::RoomComplete {
            room_id: room,
            rankings: ranking.to_vec(),
        });
    }
}

/// Drops everything; for engines nobody watches
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn snapshot(&self, _session: SessionId, _snapshot: &Snapshot) {}

    fn room_complete(&self, room: RoomId, _ranking: &[RankingEntry]) {
        debug!("Room {} complete (no broadcaster attached)", room);
    }
}

/// Writes scores to the log instead of a store
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingScoreSink;

impl ScoreSink for LoggingScoreSink {
    fn save_score(&self, session: SessionId, score: u64) -> anyhow::Result<()> {
        info!("Saved score {} for session {}", score, session);
        Ok(())
    }
}
