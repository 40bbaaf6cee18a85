//! Per-session gravity timers
//!
//! Every session that needs autonomous gravity gets its own tokio task. The
//! task only touches its own session; nothing here serializes ticks across
//! sessions.
//!
//! Each firing:
//! 1. stops if the cancelled flag is set,
//! 2. re-reads the level; if the cadence changed, re-arms and skips this tick,
//! 3. otherwise ticks, and on termination cancels itself and hands off to
//!    [`TickDriver::terminated`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info};

use crate::config::GravitySettings;
use crate::error::EngineError;
use crate::session::{SessionId, SessionStatus};

/// Gravity interval for a level: `max(floor, base - (level - 1) * step)`
pub fn gravity_interval(gravity: &GravitySettings, level: u32) -> Duration {
    let drop = u64::from(level.saturating_sub(1)).saturating_mul(gravity.step_ms);
    Duration::from_millis(gravity.base_ms.saturating_sub(drop).max(gravity.floor_ms))
}

/// What a timer drives. Implemented by the engine for each session.
pub trait TickDriver: Send + Sync + 'static {
    /// Current level, or None once the session is gone
    fn level(&self) -> Option<u32>;

    /// One gravity step; returns the status afterwards
    fn tick(&self) -> Result<SessionStatus, EngineError>;

    /// Called once by the timer after a tick terminated the session.
    /// Must tolerate racing with other termination paths.
    fn terminated(&self);
}

/// Handle to a running timer
#[derive(Debug)]
pub struct TickTimer {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl TickTimer {
    /// Start ticking `driver` on `handle`. The first tick comes one interval
    /// after the start.
    pub fn spawn<D: TickDriver>(
        handle: &Handle,
        session: SessionId,
        driver: Arc<D>,
        gravity: GravitySettings,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let task = handle.spawn(run(session, driver, gravity, Arc::clone(&cancelled)));
        Self { cancelled, task }
    }

    /// Stop future firings. Safe to call any number of times and from inside
    /// a firing; one that is already running finishes normally. Returns true
    /// for the call that actually cancelled.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancel and drop the task at its next await point
    pub fn abort(&self) {
        self.cancel();
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn arm(period: Duration) -> Interval {
    // interval_at panics on a zero period
    let period = period.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run<D: TickDriver>(
    session: SessionId,
    driver: Arc<D>,
    gravity: GravitySettings,
    cancelled: Arc<AtomicBool>,
) {
    let Some(level) = driver.level() else {
        return;
    };
    let mut armed = gravity_interval(&gravity, level);
    let mut ticker = arm(armed);
    info!(
        "Start tick for session {} with interval {}ms (level {})",
        session,
        armed.as_millis(),
        level
    );

    loop {
        ticker.tick().await;
        if cancelled.load(Ordering::Acquire) {
            break;
        }

        let Some(level) = driver.level() else {
            debug!("Session {} gone, stopping its timer", session);
            break;
        };
        let wanted = gravity_interval(&gravity, level);
        if wanted != armed {
            info!(
                "Level {} reached -> rescheduling tick for session {} at {}ms",
                level,
                session,
                wanted.as_millis()
            );
            armed = wanted;
            ticker = arm(armed);
            continue;
        }

        // A fault in one firing must not stop the next one
        match catch_unwind(AssertUnwindSafe(|| driver.tick())) {
            Ok(Ok(SessionStatus::Active)) => {}
            Ok(Ok(SessionStatus::Terminated)) => {
                cancelled.store(true, Ordering::Release);
                driver.terminated();
                break;
            }
            Ok(Err(e)) => error!("Tick error for session {}: {}", session, e),
            Err(_) => error!("Tick panicked for session {}", session),
        }
    }
    debug!("Tick loop for session {} finished", session);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn gravity() -> GravitySettings {
        GravitySettings::default()
    }

    #[test]
    fn test_gravity_interval_curve() {
        let g = gravity();
        let ms = |level| gravity_interval(&g, level).as_millis();
        assert_eq!(ms(1), 1000);
        assert_eq!(ms(2), 850);
        assert_eq!(ms(5), 400);
        assert_eq!(ms(6), 250);
        assert_eq!(ms(7), 200);
        assert_eq!(ms(1000), 200);
        assert_eq!(ms(0), 1000);
        for level in 1..20 {
            assert!(ms(level + 1) <= ms(level));
        }
    }

    #[derive(Default)]
    struct FakeDriver {
        level: AtomicU32,
        ticks: AtomicU32,
        terminated: AtomicU32,
        /// Tick number that reports termination
        terminate_on: Option<u32>,
        /// Tick number that fails
        fail_on: Option<u32>,
        /// Tick number that panics
        panic_on: Option<u32>,
    }

    impl FakeDriver {
        fn at_level(level: u32) -> Self {
            let driver = Self::default();
            driver.level.store(level, Ordering::SeqCst);
            driver
        }

        fn ticks(&self) -> u32 {
            self.ticks.load(Ordering::SeqCst)
        }
    }

    impl TickDriver for FakeDriver {
        fn level(&self) -> Option<u32> {
            Some(self.level.load(Ordering::SeqCst))
        }

        fn tick(&self) -> Result<SessionStatus, EngineError> {
            let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(n) {
                return Err(EngineError::NotStarted(SessionId(0)));
            }
            if self.panic_on == Some(n) {
                panic!("boom");
            }
            if self.terminate_on == Some(n) {
                return Ok(SessionStatus::Terminated);
            }
            Ok(SessionStatus::Active)
        }

        fn terminated(&self) {
            self.terminated.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_level_cadence() {
        let driver = Arc::new(FakeDriver::at_level(1));
        let timer = TickTimer::spawn(&Handle::current(), SessionId(1), Arc::clone(&driver), gravity());
        sleep_ms(3500).await;
        assert_eq!(driver.ticks(), 3);
        timer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_level_change_rearms_and_skips() {
        let driver = Arc::new(FakeDriver::at_level(1));
        let timer = TickTimer::spawn(&Handle::current(), SessionId(1), Arc::clone(&driver), gravity());
        sleep_ms(3500).await;
        assert_eq!(driver.ticks(), 3);

        // Level 3 -> 700ms. The firing at 4000 only re-arms; then 4700, 5400, 6100
        driver.level.store(3, Ordering::SeqCst);
        sleep_ms(600).await;
        assert_eq!(driver.ticks(), 3);
        sleep_ms(2200).await;
        assert_eq!(driver.ticks(), 6);
        timer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_termination_stops_timer_and_reports_once() {
        let driver = Arc::new(FakeDriver {
            terminate_on: Some(2),
            ..FakeDriver::at_level(1)
        });
        let timer = TickTimer::spawn(&Handle::current(), SessionId(1), Arc::clone(&driver), gravity());
        sleep_ms(10_500).await;
        assert_eq!(driver.ticks(), 2);
        assert_eq!(driver.terminated.load(Ordering::SeqCst), 1);
        assert!(timer.is_cancelled());
        assert!(timer.is_finished());
        // Cancelling after the fact is harmless
        assert!(!timer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent_and_stops_firings() {
        let driver = Arc::new(FakeDriver::at_level(1));
        let timer = TickTimer::spawn(&Handle::current(), SessionId(1), Arc::clone(&driver), gravity());
        sleep_ms(1500).await;
        assert_eq!(driver.ticks(), 1);
        assert!(timer.cancel());
        assert!(!timer.cancel());
        sleep_ms(5000).await;
        assert_eq!(driver.ticks(), 1);
        assert_eq!(driver.terminated.load(Ordering::SeqCst), 0);
        assert!(timer.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_faulty_firings_do_not_stop_timer() {
        let driver = Arc::new(FakeDriver {
            fail_on: Some(1),
            panic_on: Some(2),
            ..FakeDriver::at_level(1)
        });
        let timer = TickTimer::spawn(&Handle::current(), SessionId(1), Arc::clone(&driver), gravity());
        sleep_ms(4500).await;
        assert_eq!(driver.ticks(), 4);
        timer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_ticks() {
        let flat = GravitySettings {
            base_ms: 0,
            step_ms: 0,
            floor_ms: 0,
        };
        assert_eq!(gravity_interval(&flat, 30), Duration::ZERO);
        let driver = Arc::new(FakeDriver::at_level(30));
        let timer = TickTimer::spawn(&Handle::current(), SessionId(1), Arc::clone(&driver), flat);
        tokio::time::sleep(Duration::from_micros(10_500)).await;
        assert_eq!(driver.ticks(), 10);
        assert!(!timer.is_finished());
        timer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_run_independently() {
        let slow = Arc::new(FakeDriver::at_level(1));
        let fast = Arc::new(FakeDriver::at_level(7));
        let a = TickTimer::spawn(&Handle::current(), SessionId(1), Arc::clone(&slow), gravity());
        let b = TickTimer::spawn(&Handle::current(), SessionId(2), Arc::clone(&fast), gravity());
        sleep_ms(2100).await;
        assert_eq!(slow.ticks(), 2);
        assert_eq!(fast.ticks(), 10);
        a.abort();
        sleep_ms(1000).await;
        assert_eq!(slow.ticks(), 2);
        assert_eq!(fast.ticks(), 15);
        b.abort();
    }
}
