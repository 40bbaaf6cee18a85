//! TETRS arena - headless demo
//!
//! Starts a room (or a solo game) driven by simple bots and prints the
//! outcome as JSON.

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tetrs_arena::{
    ChannelBroadcaster, Command, Engine, EngineConfig, EngineError, EngineEvent, LoggingScoreSink,
    RoomId, SessionId, SessionStatus,
};

/// Moves a bot picks from; hard drops are rare so games last a while
const BOT_MOVES: [Command; 6] = [
    Command::MoveLeft,
    Command::MoveRight,
    Command::Rotate,
    Command::SoftDrop,
    Command::MoveLeft,
    Command::HardDrop,
];

#[derive(Debug, Parser)]
#[command(name = "tetrs-arena", version, about = "Falling-block rooms, one clock per player")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Master seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Run a room of bot players until everyone tops out
    Room {
        #[arg(short, long, default_value_t = 4)]
        players: u64,
    },
    /// Run one solo game with gravity
    Solo,
    /// Write the default config file and exit
    InitConfig,
}

/// Get the temp directory for logs, creating it if needed
fn arena_temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join("tetrs-arena");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let run_id: u32 = rand::random();
    let log_dir = arena_temp_dir();
    let log_file = format!("{:08x}.log", run_id);

    // Setup tracing to log file
    let file_appender = tracing_appender::rolling::never(&log_dir, &log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tetrs_arena=debug".parse()?),
        )
        .with_ansi(false)
        .init();

    tracing::info!("TETRS arena starting up, run={:08x}, log={}", run_id, log_dir.join(&log_file).display());

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::load()?,
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to create async runtime")?;

    match cli.mode.unwrap_or(Mode::Room { players: 4 }) {
        Mode::InitConfig => {
            let path = config.save()?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Mode::Room { players } => runtime.block_on(run_room(config, players)),
        Mode::Solo => {
            config.solo_autotick = true;
            runtime.block_on(run_solo(config))
        }
    }
}

async fn run_room(config: EngineConfig, players: u64) -> anyhow::Result<()> {
    let (broadcaster, mut events) = ChannelBroadcaster::new();
    let bot_seed = config.seed.unwrap_or_else(rand::random);
    let engine = Engine::new(
        config,
        tokio::runtime::Handle::current(),
        Arc::new(LoggingScoreSink),
        Arc::new(broadcaster),
    );

    let room = RoomId(1);
    let members: Vec<SessionId> = (1..=players).map(SessionId).collect();
    engine.start_room(room, &members)?;
    for &id in &members {
        tokio::spawn(bot(engine.clone(), id, bot_seed ^ id.0));
    }

    while let Some(event) = events.recv().await {
        if let EngineEvent::RoomComplete { .. } = &event {
            println!("{}", serde_json::to_string_pretty(&event)?);
            break;
        }
    }
    engine.shutdown();
    Ok(())
}

async fn run_solo(config: EngineConfig) -> anyhow::Result<()> {
    let bot_seed = config.seed.unwrap_or_else(rand::random);
    let engine = Engine::with_defaults(config, tokio::runtime::Handle::current());
    let id = SessionId(1);
    engine.start(id);
    bot(engine.clone(), id, bot_seed).await;

    let last = engine.snapshot(id)?;
    println!("{}", serde_json::to_string_pretty(&last)?);
    engine.shutdown();
    Ok(())
}

/// Press random buttons until the game ends
async fn bot(engine: Engine, id: SessionId, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    loop {
        let pause = rng.gen_range(50..250);
        tokio::time::sleep(Duration::from_millis(pause)).await;
        let command = BOT_MOVES[rng.gen_range(0..BOT_MOVES.len())];
        match engine.command(id, command) {
            Ok(snapshot) if snapshot.status == SessionStatus::Terminated => break,
            Ok(_) => {}
            Err(EngineError::NotStarted(_)) => break,
            Err(e) => {
                tracing::error!("Bot for session {} failed: {}", id, e);
                break;
            }
        }
    }
    tracing::debug!("Bot for session {} done", id);
}
