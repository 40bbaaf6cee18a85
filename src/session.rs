//! One participant's game: simulation plus score, level and status
//!
//! A session is `Active` until a respawn fails, then `Terminated` for good.
//! Every command on a terminated session is a no-op.

use serde::{Deserialize, Serialize};

use crate::randomizer::Randomizer;
use crate::score::{Score, ScoringPolicy};
use crate::simulation::Simulation;
use crate::tetromino::TetrominoType;

/// Identifies a session across the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Terminated,
}

/// Commands a session accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    MoveLeft,
    MoveRight,
    Rotate,
    /// One row down, same as a gravity tick
    SoftDrop,
    HardDrop,
    Tick,
}

/// What a viewer needs to draw one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub session_id: SessionId,
    /// `[y][x]` cell ids, active piece merged in
    pub board: Vec<Vec<u8>>,
    pub score: u64,
    pub level: u32,
    pub lines: u32,
    pub status: SessionStatus,
    pub current_piece: Option<TetrominoType>,
    pub next_piece: TetrominoType,
}

/// Board dimensions and rules a session is created with
#[derive(Debug, Clone)]
pub struct SessionRules {
    pub width: usize,
    pub height: usize,
    pub scoring: ScoringPolicy,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    simulation: Simulation,
    score: Score,
    status: SessionStatus,
    policy: ScoringPolicy,
}

impl Session {
    /// Start a fresh game with the first piece already spawned
    pub fn new(id: SessionId, rules: &SessionRules, randomizer: Randomizer) -> Self {
        let mut simulation = Simulation::new(rules.width, rules.height, randomizer);
        let status = if simulation.spawn() {
            SessionStatus::Active
        } else {
            SessionStatus::Terminated
        };
        Self {
            id,
            simulation,
            score: Score::new(),
            status,
            policy: rules.scoring.clone(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn score(&self) -> u64 {
        self.score.points
    }

    pub fn level(&self) -> u32 {
        self.score.level
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Apply one command. Returns the status afterwards.
    pub fn apply(&mut self, command: Command) -> SessionStatus {
        if !self.is_active() {
            return self.status;
        }
        match command {
            Command::MoveLeft => {
                self.simulation.move_left();
            }
            Command::MoveRight => {
                self.simulation.move_right();
            }
            Command::Rotate => self.simulation.rotate(),
            Command::HardDrop => {
                self.simulation.hard_drop();
                self.settle(true);
            }
            Command::SoftDrop | Command::Tick => {
                if !self.simulation.move_down() {
                    self.settle(false);
                }
            }
        }
        self.status
    }

    /// Clear lines, score, level, respawn; in that order. A failed respawn
    /// ends the game.
    fn settle(&mut self, hard_drop: bool) {
        let lines = self.simulation.clear_lines();
        self.score.add_lock(&self.policy, lines, hard_drop);
        if !self.simulation.spawn() {
            self.status = SessionStatus::Terminated;
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            session_id: self.id,
            board: self.simulation.render(),
            score: self.score.points,
            level: self.score.level,
            lines: self.score.lines,
            status: self.status,
            current_piece: self.simulation.active_type(),
            next_piece: self.simulation.preview().piece_type,
        }
    }

    #[cfg(test)]
    pub(crate) fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.simulation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Cell;
    use crate::piece::Piece;
    use crate::randomizer::RandomizerKind;

    fn rules() -> SessionRules {
        SessionRules {
            width: 10,
            height: 20,
            scoring: ScoringPolicy::default(),
        }
    }

    fn session(seed: u64) -> Session {
        Session::new(SessionId(1), &rules(), Randomizer::new(RandomizerKind::Uniform, seed))
    }

    /// Bottom `rows` rows full except column 0, then an I standing in column 0
    fn prepare_clear(session: &mut Session, rows: i32) {
        let sim = session.simulation_mut();
        for y in (20 - rows)..20 {
            for x in 1..10 {
                sim.board_mut().set(x, y, Cell::Filled(TetrominoType::O));
            }
        }
        let mut piece = Piece::new(TetrominoType::I);
        piece.rotate_clockwise();
        piece.x = 0;
        piece.y = 0;
        sim.set_active(Some(piece));
    }

    #[test]
    fn test_start_state() {
        let session = session(9);
        let snap = session.snapshot();
        assert_eq!(snap.board.len(), 20);
        assert!(snap.board.iter().all(|row| row.len() == 10));
        assert_eq!((snap.score, snap.level), (0, 1));
        assert_eq!(snap.status, SessionStatus::Active);
        assert!(snap.current_piece.is_some());
        // Only the active piece's visible cells are on the board
        let filled = snap.board.iter().flatten().filter(|&&c| c != 0).count();
        assert!((1..=4).contains(&filled));
        assert!(snap.board[2..].iter().flatten().all(|&c| c == 0));
    }

    #[test]
    fn test_line_clear_scores_per_lock() {
        let expected = [100, 300, 500, 800];
        for (i, points) in expected.into_iter().enumerate() {
            let rows = i as i32 + 1;

            let mut ticked = session(1);
            prepare_clear(&mut ticked, rows);
            while ticked.score() == 0 && ticked.is_active() {
                ticked.apply(Command::Tick);
            }
            assert_eq!(ticked.score(), points, "{rows} rows by gravity");

            let mut dropped = session(1);
            prepare_clear(&mut dropped, rows);
            dropped.apply(Command::HardDrop);
            assert_eq!(dropped.score(), points + 10, "{rows} rows by hard drop");
        }
    }

    #[test]
    fn test_hard_drop_without_clear_adds_flat_bonus() {
        let mut session = session(5);
        let mut drops = 0;
        while session.is_active() && drops < 20 {
            let before = session.score();
            session.apply(Command::HardDrop);
            assert_eq!(session.score(), before + 10);
            assert_eq!(session.level(), 1);
            drops += 1;
        }
        assert!(drops > 0);
    }

    #[test]
    fn test_hard_drop_never_leaves_piece_floating() {
        let mut session = session(11);
        for _ in 0..40 {
            if !session.is_active() {
                break;
            }
            session.apply(Command::HardDrop);
            if session.is_active() {
                // A fresh piece sits at the spawn row, nothing mid-air
                let piece = session.simulation().active().unwrap();
                assert_eq!(piece.y, 1 - piece.shape.rows() as i32);
            }
        }
    }

    #[test]
    fn test_stacking_terminates_and_freezes() {
        let mut session = session(3);
        while session.is_active() {
            session.apply(Command::HardDrop);
        }
        assert_eq!(session.status(), SessionStatus::Terminated);
        let frozen = session.snapshot();
        for command in [
            Command::MoveLeft,
            Command::MoveRight,
            Command::Rotate,
            Command::SoftDrop,
            Command::HardDrop,
            Command::Tick,
        ] {
            assert_eq!(session.apply(command), SessionStatus::Terminated);
        }
        assert_eq!(session.snapshot(), frozen);
    }

    #[test]
    fn test_tick_moves_piece_down() {
        let mut session = session(2);
        let y = session.simulation().active().unwrap().y;
        session.apply(Command::Tick);
        assert_eq!(session.simulation().active().unwrap().y, y + 1);
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn test_level_follows_score() {
        let mut session = session(4);
        for _ in 0..2 {
            prepare_clear(&mut session, 4);
            session.apply(Command::HardDrop);
        }
        // 2 x (800 + 10)
        assert_eq!(session.score(), 1620);
        assert_eq!(session.level(), 2);
    }
}
