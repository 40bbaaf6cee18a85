//! Room bookkeeping: who is playing, who is done, and the final ranking
//!
//! Each room has one mutex. Recording a termination and checking for
//! completion happen under it together, so when the last two members
//! terminate at the same instant exactly one caller sees `Completed`.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::session::SessionId;

/// Identifies a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything whose current score can be read for a ranking
pub trait Contestant: Send + Sync {
    fn score(&self) -> u64;
}

/// One line of a room's ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// 1-based
    pub rank: usize,
    pub session_id: SessionId,
    pub score: u64,
}

/// Outcome of [`RoomCoordinator::report_terminated`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// Already counted; nothing changed
    Duplicate,
    /// Counted; the room is still running
    Recorded { finished: usize, total: usize },
    /// This report finished the room. Only one caller ever gets this.
    Completed(Vec<RankingEntry>),
}

struct Member {
    id: SessionId,
    contestant: Arc<dyn Contestant>,
}

struct RoomState {
    /// Registration order, used to break ties
    members: Vec<Member>,
    terminated: HashSet<SessionId>,
    ranking: Option<Vec<RankingEntry>>,
}

impl RoomState {
    fn contains(&self, id: SessionId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    fn is_complete(&self) -> bool {
        self.ranking.is_some()
    }

    /// Scores descending; `sort_by` is stable so ties keep registration order
    fn rank(&self) -> Vec<RankingEntry> {
        let mut scored: Vec<(SessionId, u64)> = self
            .members
            .iter()
            .map(|m| (m.id, m.contestant.score()))
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored
            .into_iter()
            .enumerate()
            .map(|(i, (session_id, score))| RankingEntry {
                rank: i + 1,
                session_id,
                score,
            })
            .collect()
    }
}

/// Tracks membership and termination for every room
#[derive(Default)]
pub struct RoomCoordinator {
    rooms: Mutex<HashMap<RoomId, Arc<Mutex<RoomState>>>>,
}

impl RoomCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) bookkeeping for a room. Members are ranked in the
    /// order given when scores tie.
    pub fn register(
        &self,
        room: RoomId,
        members: Vec<(SessionId, Arc<dyn Contestant>)>,
    ) -> Result<(), EngineError> {
        if members.is_empty() {
            return Err(EngineError::EmptyRoom(room));
        }
        let state = RoomState {
            members: members
                .into_iter()
                .map(|(id, contestant)| Member { id, contestant })
                .collect(),
            terminated: HashSet::new(),
            ranking: None,
        };
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(room, Arc::new(Mutex::new(state)));
        Ok(())
    }

    /// Record that a member has terminated.
    ///
    /// The caller that completes the room gets the ranking back and is
    /// responsible for announcing it.
    pub fn report_terminated(&self, room: RoomId, session: SessionId) -> Result<Report, EngineError> {
        let state = self.room(room)?;
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);

        if !state.contains(session) {
            return Err(EngineError::NotInRoom { room, session });
        }
        if !state.terminated.insert(session) {
            warn!("Session {} already reported finished in room {}", session, room);
            return Ok(Report::Duplicate);
        }

        let finished = state.terminated.len();
        let total = state.members.len();
        info!("Room {} completion check: {}/{} finished", room, finished, total);
        if finished < total || state.is_complete() {
            return Ok(Report::Recorded { finished, total });
        }

        let ranking = state.rank();
        state.ranking = Some(ranking.clone());
        info!(
            "Room {} finished, rankings: {}",
            room,
            ranking
                .iter()
                .map(|r| format!("{}:{}", r.session_id, r.score))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Report::Completed(ranking))
    }

    /// Has every member terminated? Read-only.
    pub fn is_complete(&self, room: RoomId) -> Result<bool, EngineError> {
        let state = self.room(room)?;
        let complete = state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_complete();
        Ok(complete)
    }

    /// The final ranking once complete, otherwise a provisional one from
    /// current scores
    pub fn ranking(&self, room: RoomId) -> Result<Vec<RankingEntry>, EngineError> {
        let state = self.room(room)?;
        let state = state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(match &state.ranking {
            Some(ranking) => ranking.clone(),
            None => state.rank(),
        })
    }

    /// Member ids in registration order
    pub fn members(&self, room: RoomId) -> Result<Vec<SessionId>, EngineError> {
        let state = self.room(room)?;
        let state = state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.members.iter().map(|m| m.id).collect())
    }

    /// Forget a room. Returns false if it was unknown.
    pub fn remove(&self, room: RoomId) -> bool {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&room)
            .is_some()
    }

    fn room(&self, room: RoomId) -> Result<Arc<Mutex<RoomState>>, EngineError> {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&room)
            .cloned()
            .ok_or(EngineError::RoomNotFound(room))
    }
}
