//! Session registry and command surface
//!
//! Every session sits behind its own mutex; a command and a scheduled tick
//! on the same session never interleave, and nothing locks across sessions.
//! Termination is handled exactly once per session no matter which path
//! (command, scheduled tick) observes it first: the timer is cancelled, the
//! score is persisted, the final frame is retained for a grace window and
//! the room, if any, is told.
//!
//! Lock order is room -> session. Session locks are always released before
//! the room coordinator is called.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{Broadcaster, LoggingScoreSink, NullBroadcaster, ScoreSink};
use crate::randomizer::Randomizer;
use crate::room::{Contestant, RankingEntry, Report, RoomCoordinator, RoomId};
use crate::scheduler::{TickDriver, TickTimer};
use crate::session::{Command, Session, SessionId, SessionRules, SessionStatus, Snapshot};

/// The game engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

struct Shared {
    config: EngineConfig,
    rules: SessionRules,
    runtime: Handle,
    sessions: Mutex<HashMap<SessionId, Arc<SessionSlot>>>,
    rooms: RoomCoordinator,
    /// Hands out per-session seeds
    seeds: Mutex<ChaCha8Rng>,
    score_sink: Arc<dyn ScoreSink>,
    broadcaster: Arc<dyn Broadcaster>,
}

/// A session plus the engine's bookkeeping for it
struct SessionSlot {
    id: SessionId,
    room: Option<RoomId>,
    session: Mutex<Session>,
    /// Set by whichever path handles termination first
    concluded: AtomicBool,
    timer: Mutex<Option<TickTimer>>,
    /// Purge deadline, set at termination
    expires_at: Mutex<Option<Instant>>,
}

/// Result of applying one command to a slot
struct Applied {
    snapshot: Snapshot,
    /// False when the session was already terminated and nothing changed
    changed: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionSlot {
    fn new(id: SessionId, room: Option<RoomId>, session: Session) -> Self {
        Self {
            id,
            room,
            session: Mutex::new(session),
            concluded: AtomicBool::new(false),
            timer: Mutex::new(None),
            expires_at: Mutex::new(None),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.session)
    }

    fn apply(&self, command: Command) -> Applied {
        let mut session = self.session();
        let changed = session.is_active();
        session.apply(command);
        Applied {
            snapshot: session.snapshot(),
            changed,
        }
    }

    fn cancel_timer(&self) {
        if let Some(timer) = lock(&self.timer).as_ref() {
            if timer.cancel() {
                debug!("Tick cancelled for session {}", self.id);
            }
        }
    }

    fn abort_timer(&self) {
        if let Some(timer) = lock(&self.timer).take() {
            timer.abort();
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        lock(&self.expires_at).is_some_and(|deadline| now >= deadline)
    }
}

impl Contestant for SessionSlot {
    fn score(&self) -> u64 {
        self.session().score()
    }
}

/// Drives one slot from its timer
struct SlotDriver {
    shared: Weak<Shared>,
    slot: Arc<SessionSlot>,
}

impl TickDriver for SlotDriver {
    fn level(&self) -> Option<u32> {
        self.shared.upgrade()?;
        Some(self.slot.session().level())
    }

    fn tick(&self) -> Result<SessionStatus, EngineError> {
        let shared = self
            .shared
            .upgrade()
            .ok_or(EngineError::NotStarted(self.slot.id))?;
        let applied = self.slot.apply(Command::Tick);
        if applied.changed {
            shared.broadcaster.snapshot(self.slot.id, &applied.snapshot);
        }
        Ok(applied.snapshot.status)
    }

    fn terminated(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.conclude(&self.slot);
        }
    }
}

impl Engine {
    /// Build an engine whose timers run on `runtime`
    pub fn new(
        config: EngineConfig,
        runtime: Handle,
        score_sink: Arc<dyn ScoreSink>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        info!("Engine starting with master seed {}", seed);
        let rules = config.session_rules();
        Self {
            shared: Arc::new(Shared {
                config,
                rules,
                runtime,
                sessions: Mutex::new(HashMap::new()),
                rooms: RoomCoordinator::new(),
                seeds: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
                score_sink,
                broadcaster,
            }),
        }
    }

    /// Engine that logs scores and broadcasts nowhere
    pub fn with_defaults(config: EngineConfig, runtime: Handle) -> Self {
        Self::new(
            config,
            runtime,
            Arc::new(LoggingScoreSink),
            Arc::new(NullBroadcaster),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Start (or restart) a solo session
    pub fn start(&self, id: SessionId) -> Snapshot {
        let slot = self.shared.install(id, None);
        if self.shared.config.solo_autotick {
            self.shared.schedule(&slot);
        }
        info!("Solo game started for session {}", id);
        self.shared.publish_start(&slot)
    }

    /// Start a room: one fresh session per member, each with its own timer.
    /// Duplicate ids are ignored; ties in the ranking follow the order given.
    pub fn start_room(&self, room: RoomId, members: &[SessionId]) -> Result<Vec<Snapshot>, EngineError> {
        let mut seen = HashSet::new();
        let ids: Vec<SessionId> = members.iter().copied().filter(|id| seen.insert(*id)).collect();
        if ids.is_empty() {
            return Err(EngineError::EmptyRoom(room));
        }

        let slots: Vec<Arc<SessionSlot>> = ids
            .iter()
            .map(|&id| self.shared.install(id, Some(room)))
            .collect();
        let contestants = slots
            .iter()
            .map(|slot| {
                let contestant: Arc<dyn Contestant> = slot.clone();
                (slot.id, contestant)
            })
            .collect();
        self.shared.rooms.register(room, contestants)?;

        for slot in &slots {
            self.shared.schedule(slot);
        }
        info!("Multiplayer game started in room {} with {} players", room, slots.len());
        Ok(slots.iter().map(|slot| self.shared.publish_start(slot)).collect())
    }

    pub fn move_left(&self, id: SessionId) -> Result<Snapshot, EngineError> {
        self.command(id, Command::MoveLeft)
    }

    pub fn move_right(&self, id: SessionId) -> Result<Snapshot, EngineError> {
        self.command(id, Command::MoveRight)
    }

    pub fn rotate(&self, id: SessionId) -> Result<Snapshot, EngineError> {
        self.command(id, Command::Rotate)
    }

    pub fn soft_drop(&self, id: SessionId) -> Result<Snapshot, EngineError> {
        self.command(id, Command::SoftDrop)
    }

    pub fn hard_drop(&self, id: SessionId) -> Result<Snapshot, EngineError> {
        self.command(id, Command::HardDrop)
    }

    /// Manual gravity step, for tests and unscheduled sessions
    pub fn tick(&self, id: SessionId) -> Result<Snapshot, EngineError> {
        self.command(id, Command::Tick)
    }

    /// Apply a command. On a terminated session within the retention window
    /// this is a no-op that returns the final frame.
    pub fn command(&self, id: SessionId, command: Command) -> Result<Snapshot, EngineError> {
        let slot = self.shared.slot(id)?;
        let applied = slot.apply(command);
        if applied.changed {
            self.shared.broadcaster.snapshot(id, &applied.snapshot);
            if applied.snapshot.status == SessionStatus::Terminated {
                self.shared.conclude(&slot);
            }
        }
        Ok(applied.snapshot)
    }

    /// Current frame, or the final one for a recently terminated session
    pub fn snapshot(&self, id: SessionId) -> Result<Snapshot, EngineError> {
        Ok(self.shared.slot(id)?.session().snapshot())
    }

    pub fn is_room_complete(&self, room: RoomId) -> Result<bool, EngineError> {
        self.shared.rooms.is_complete(room)
    }

    /// Final ranking, or a provisional one while the room is running
    pub fn room_ranking(&self, room: RoomId) -> Result<Vec<RankingEntry>, EngineError> {
        self.shared.rooms.ranking(room)
    }

    pub fn room_members(&self, room: RoomId) -> Result<Vec<SessionId>, EngineError> {
        self.shared.rooms.members(room)
    }

    /// Forget a room's bookkeeping
    pub fn close_room(&self, room: RoomId) -> Result<(), EngineError> {
        if self.shared.rooms.remove(room) {
            Ok(())
        } else {
            Err(EngineError::RoomNotFound(room))
        }
    }

    /// Drop a session right away, live or terminated. A live room member is
    /// counted as finished with its current score.
    pub fn discard(&self, id: SessionId) -> bool {
        let removed = lock(&self.shared.sessions).remove(&id);
        match removed {
            Some(slot) => {
                self.shared.retire(&slot);
                true
            }
            None => false,
        }
    }

    /// Stop every timer. Sessions stay queryable.
    pub fn shutdown(&self) {
        info!("Shutting down engine timers");
        let slots: Vec<_> = lock(&self.shared.sessions).values().cloned().collect();
        for slot in slots {
            slot.abort_timer();
        }
    }
}

impl Shared {
    fn next_seed(&self) -> u64 {
        lock(&self.seeds).next_u64()
    }

    /// Create a fresh slot for `id`, replacing (and stopping) any old one
    fn install(self: &Arc<Self>, id: SessionId, room: Option<RoomId>) -> Arc<SessionSlot> {
        let randomizer = Randomizer::new(self.config.randomizer, self.next_seed());
        let session = Session::new(id, &self.rules, randomizer);
        let slot = Arc::new(SessionSlot::new(id, room, session));
        let old = lock(&self.sessions).insert(id, Arc::clone(&slot));
        if let Some(old) = old {
            self.retire(&old);
            debug!("Replaced previous game for session {}", id);
        }
        slot
    }

    /// Stop a slot that is leaving the registry. A room member counts as
    /// finished so its room can still complete.
    fn retire(self: &Arc<Self>, slot: &Arc<SessionSlot>) {
        slot.abort_timer();
        if slot.room.is_some() {
            self.conclude(slot);
        }
    }

    fn schedule(self: &Arc<Self>, slot: &Arc<SessionSlot>) {
        let driver = Arc::new(SlotDriver {
            shared: Arc::downgrade(self),
            slot: Arc::clone(slot),
        });
        let timer = TickTimer::spawn(&self.runtime, slot.id, driver, self.config.gravity);
        *lock(&slot.timer) = Some(timer);
    }

    /// Broadcast the first frame; a board too small to spawn on ends at once
    fn publish_start(self: &Arc<Self>, slot: &Arc<SessionSlot>) -> Snapshot {
        let snapshot = slot.session().snapshot();
        self.broadcaster.snapshot(slot.id, &snapshot);
        if snapshot.status == SessionStatus::Terminated {
            self.conclude(slot);
        }
        snapshot
    }

    /// Look up a live or retained slot, purging it if its window has passed
    fn slot(&self, id: SessionId) -> Result<Arc<SessionSlot>, EngineError> {
        let mut sessions = lock(&self.sessions);
        let slot = sessions.get(&id).cloned().ok_or(EngineError::NotStarted(id))?;
        if slot.is_expired(Instant::now()) {
            sessions.remove(&id);
            debug!("Final game state expired for session {}", id);
            return Err(EngineError::NotStarted(id));
        }
        Ok(slot)
    }

    /// Everything that happens once a session terminates. Runs once per slot.
    fn conclude(self: &Arc<Self>, slot: &Arc<SessionSlot>) {
        if slot.concluded.swap(true, Ordering::AcqRel) {
            debug!("Session {} termination already handled", slot.id);
            return;
        }
        slot.cancel_timer();

        let score = slot.score();
        info!("Game over for session {} with score {}", slot.id, score);
        if let Err(e) = self.score_sink.save_score(slot.id, score) {
            error!("Failed to save score for session {}: {:#}", slot.id, e);
        }

        self.retain(slot);

        let Some(room) = slot.room else {
            return;
        };
        match self.rooms.report_terminated(room, slot.id) {
            Ok(Report::Completed(ranking)) => self.broadcaster.room_complete(room, &ranking),
            Ok(Report::Recorded { .. }) => {}
            Ok(Report::Duplicate) => warn!("Duplicate termination for session {}", slot.id),
            Err(EngineError::RoomNotFound(_)) => debug!("Room {} already closed", room),
            Err(e) => error!("Could not report session {} to room {}: {}", slot.id, room, e),
        }
    }

    /// Keep the final frame for the retention window, then purge it
    fn retain(self: &Arc<Self>, slot: &Arc<SessionSlot>) {
        let window = self.config.retention();
        *lock(&slot.expires_at) = Some(Instant::now() + window);

        let shared = Arc::downgrade(self);
        let purged = Arc::downgrade(slot);
        self.runtime.spawn(async move {
            tokio::time::sleep(window).await;
            let (Some(shared), Some(purged)) = (shared.upgrade(), purged.upgrade()) else {
                return;
            };
            let mut sessions = lock(&shared.sessions);
            // Only if it has not been restarted in the meantime
            if sessions
                .get(&purged.id)
                .is_some_and(|current| Arc::ptr_eq(current, &purged))
            {
                sessions.remove(&purged.id);
                debug!("Final game state cleaned up for session {}", purged.id);
            }
        });
    }
}
