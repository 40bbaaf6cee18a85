//! TETRS arena - a Rusty falling-block engine
//!
//! Runs solo sessions and multi-player rooms where every player's game
//! advances on its own clock. When the last player in a room tops out the
//! room emits its ranking, once.
//!
//! ```no_run
//! use tetrs_arena::{Engine, EngineConfig, SessionId};
//!
//! # async fn demo() {
//! let engine = Engine::with_defaults(EngineConfig::default(), tokio::runtime::Handle::current());
//! let id = SessionId(1);
//! engine.start(id);
//! engine.rotate(id).unwrap();
//! let frame = engine.hard_drop(id).unwrap();
//! assert_eq!(frame.score, 10);
//! # }
//! ```

pub mod board;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod piece;
pub mod randomizer;
pub mod room;
pub mod scheduler;
pub mod score;
pub mod session;
pub mod simulation;
pub mod tetromino;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{ConfigError, EngineError};
pub use events::{Broadcaster, ChannelBroadcaster, EngineEvent, LoggingScoreSink, ScoreSink};
pub use room::{RankingEntry, RoomId};
pub use session::{Command, SessionId, SessionStatus, Snapshot};
pub use tetromino::TetrominoType;
