//! Patrol state machine
//!
//! While patrolling the drone hovers on every tick and then moves one step of
//! a square: rest, forward, right, backward, left, rest, forward, ...
//!
//! A single-permit semaphore guarantees at most one cycle task. Stopping
//! cancels the task and waits for it to issue its final Hover.

use crate::issuer::CommandIssuer;
use drone_core::Direction;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default time between patrol steps
pub const DEFAULT_PATROL_PERIOD: Duration = Duration::from_secs(3);

/// Phase counter of one patrol run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatrolCycle {
    phase: u8,
}

impl PatrolCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> u8 {
        self.phase
    }

    /// Step for the current tick, then move to the next phase
    ///
    /// Phase 5 wraps back to 0 and is counted as a step, so every lap after
    /// the first starts with a resting tick.
    pub fn advance(&mut self) -> Option<Direction> {
        let step = match self.phase {
            1 => Some(Direction::Forward),
            2 => Some(Direction::Right),
            3 => Some(Direction::Backward),
            4 => Some(Direction::Left),
            5 => {
                self.phase = 0;
                None
            }
            _ => None,
        };
        self.phase += 1;
        step
    }
}

struct ActiveCycle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Starts and stops the patrol task
#[derive(Clone)]
pub struct PatrolController {
    issuer: CommandIssuer,
    speed: Arc<AtomicU8>,
    period: Duration,
    patrolling: Arc<AtomicBool>,
    permit: Arc<Semaphore>,
    active: Arc<Mutex<Option<ActiveCycle>>>,
}

impl PatrolController {
    /// `speed` is read on every tick, so later changes apply to the running cycle
    pub fn new(issuer: CommandIssuer, speed: Arc<AtomicU8>, period: Duration) -> Self {
        Self {
            issuer,
            speed,
            period,
            patrolling: Arc::new(AtomicBool::new(false)),
            permit: Arc::new(Semaphore::new(1)),
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_patrolling(&self) -> bool {
        self.patrolling.load(Ordering::Relaxed)
    }

    /// Start a cycle unless one is already running
    ///
    /// If the previous cycle still holds the permit, the request stops it
    /// instead.
    pub async fn start(&self) {
        if self.is_patrolling() {
            debug!("Patrol already running");
            return;
        }

        let permit = match self.permit.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Previous patrol cycle still finishing, stopping it instead");
                self.signal_quit().await;
                return;
            }
        };

        // The cycle must be reachable by `stop` before the flag goes up
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.clone().run_cycle(cancel.clone(), permit));
        *self.active.lock() = Some(ActiveCycle { cancel, handle });
        self.set_patrolling(true);

        info!("🛰️ Patrol started ({}s period)", self.period.as_secs_f32());
    }

    /// Cancel the running cycle and wait for it to finish; no-op when idle
    pub async fn stop(&self) {
        if !self.is_patrolling() {
            return;
        }
        self.signal_quit().await;
        info!("Patrol stopped");
    }

    async fn signal_quit(&self) {
        let active = self.active.lock().take();
        if let Some(ActiveCycle { cancel, handle }) = active {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!("Patrol task ended abnormally: {}", e);
                self.set_patrolling(false);
            }
        }
    }

    async fn run_cycle(self, cancel: CancellationToken, _permit: OwnedSemaphorePermit) {
        let mut cycle = PatrolCycle::new();
        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.issuer.hover();
                    if let Some(direction) = cycle.advance() {
                        let speed = self.speed.load(Ordering::Relaxed);
                        self.issuer.move_in(direction, speed);
                    }
                    debug!("Patrol phase now {}", cycle.phase());
                }
            }
        }

        self.issuer.hover();
        self.set_patrolling(false);
    }

    fn set_patrolling(&self, patrolling: bool) {
        self.patrolling.store(patrolling, Ordering::Relaxed);
        if let Some(metrics) = self.issuer.metrics() {
            metrics.set_patrol_active(patrolling);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
