//! Drone manager
//!
//! Entry point for operator commands. Owns the shared command issuer, the
//! speed setting, the patrol controller and the tracking and snapshot flags.

use crate::issuer::CommandIssuer;
use crate::patrol::PatrolController;
use crate::snapshot::SnapshotRequest;
use crate::video::{self, VideoPipeline};
use crate::TrackerConfig;
use drone_core::{Direction, DroneState, FlightCommand, LinkEvent, OperatorCommand, clamp_speed};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

pub struct DroneManager {
    issuer: CommandIssuer,
    speed: Arc<AtomicU8>,
    patrol: PatrolController,
    tracking: Arc<AtomicBool>,
    snapshot: SnapshotRequest,
    connected: watch::Sender<bool>,
    config: TrackerConfig,
}

impl DroneManager {
    pub fn new(issuer: CommandIssuer, config: TrackerConfig) -> Self {
        let speed = Arc::new(AtomicU8::new(clamp_speed(config.default_speed.into())));
        let patrol = PatrolController::new(issuer.clone(), speed.clone(), config.patrol_period);
        let (connected, _) = watch::channel(false);

        Self {
            issuer,
            speed,
            patrol,
            tracking: Arc::new(AtomicBool::new(false)),
            snapshot: SnapshotRequest::new(),
            connected,
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // ========================================================================
    // FLIGHT COMMANDS
    // ========================================================================

    pub fn take_off(&self) {
        info!("🚁 Take off");
        self.issuer.issue(FlightCommand::TakeOff);
    }

    pub fn land(&self) {
        info!("🛬 Land");
        self.issuer.issue(FlightCommand::Land);
    }

    pub fn hover(&self) {
        self.issuer.hover();
    }

    pub fn cease_rotation(&self) {
        self.issuer.issue(FlightCommand::CeaseRotation);
    }

    pub fn move_in(&self, direction: Direction, speed: u8) {
        self.issuer.move_in(direction, speed);
    }

    /// Run a command from the control surface
    ///
    /// `speed` overrides the current speed for a single move.
    pub async fn execute(&self, command: OperatorCommand, speed: Option<u8>) {
        debug!("Executing operator command {}", command);
        match command {
            OperatorCommand::TakeOff => self.take_off(),
            OperatorCommand::Land => self.land(),
            OperatorCommand::Hover => self.hover(),
            OperatorCommand::CeaseRotation => self.cease_rotation(),
            OperatorCommand::Move(direction) => {
                self.move_in(direction, speed.unwrap_or_else(|| self.speed()))
            }
            OperatorCommand::Patrol => self.start_patrol().await,
            OperatorCommand::StopPatrol => self.stop_patrol().await,
            OperatorCommand::FaceDetectTracking => self.enable_face_detect_tracking(),
            OperatorCommand::StopFaceDetectTracking => self.disable_face_detect_tracking(),
            OperatorCommand::Snapshot => {
                self.request_snapshot().await;
            }
        }
    }

    // ========================================================================
    // AUTONOMY
    // ========================================================================

    pub async fn start_patrol(&self) {
        self.patrol.start().await;
    }

    pub async fn stop_patrol(&self) {
        self.patrol.stop().await;
    }

    pub fn is_patrolling(&self) -> bool {
        self.patrol.is_patrolling()
    }

    pub fn enable_face_detect_tracking(&self) {
        self.set_tracking(true);
        info!("👤 Face tracking enabled");
    }

    /// Disable tracking and hover in place
    pub fn disable_face_detect_tracking(&self) {
        self.set_tracking(false);
        self.issuer.hover();
        info!("Face tracking disabled");
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::Relaxed)
    }

    fn set_tracking(&self, enabled: bool) {
        self.tracking.store(enabled, Ordering::Relaxed);
        if let Some(metrics) = self.issuer.metrics() {
            metrics.set_tracking_enabled(enabled);
        }
    }

    /// Ask the tracking loop to save its next frame
    ///
    /// Returns whether a frame was saved before the configured timeout.
    pub async fn request_snapshot(&self) -> bool {
        let captured = self.snapshot.request(self.config.snapshot_timeout).await;
        if !captured {
            if let Some(metrics) = self.issuer.metrics() {
                metrics.record_snapshot_timeout();
            }
        }
        captured
    }

    // ========================================================================
    // SETTINGS & STATE
    // ========================================================================

    pub fn speed(&self) -> u8 {
        self.speed.load(Ordering::Relaxed)
    }

    /// Set the speed for later moves, clamped to 1-100
    pub fn set_speed(&self, speed: u8) {
        self.speed.store(clamp_speed(speed.into()), Ordering::Relaxed);
    }

    pub fn state(&self) -> DroneState {
        DroneState {
            speed: self.speed(),
            patrolling: self.is_patrolling(),
            tracking: self.is_tracking(),
            connected: self.is_connected(),
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub(crate) fn mark_connected(&self) {
        if !self.connected.send_replace(true) {
            info!("Drone connected");
        }
        if let Some(metrics) = self.issuer.metrics() {
            metrics.set_link_connected(true);
        }
    }

    /// Wait until the link reports the drone connected; `false` on timeout
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let mut connected = self.connected.subscribe();
        match time::timeout(timeout, connected.wait_for(|c| *c)).await {
            Ok(Ok(_)) => true,
            Ok(Err(_)) => false,
            Err(_) => {
                warn!("Drone did not connect within {:?}", timeout);
                false
            }
        }
    }

    /// Feed link events into the video pipeline; see [`crate::video`]
    pub fn bind_link(
        self: &Arc<Self>,
        events: mpsc::Receiver<LinkEvent>,
        pipeline: VideoPipeline,
    ) -> JoinHandle<()> {
        video::bind_link(self.clone(), events, pipeline)
    }

    // ========================================================================
    // SHARED WITH THE TRACKING LOOP
    // ========================================================================

    pub(crate) fn issuer(&self) -> &CommandIssuer {
        &self.issuer
    }

    pub(crate) fn patrol(&self) -> &PatrolController {
        &self.patrol
    }

    pub(crate) fn tracking_flag(&self) -> Arc<AtomicBool> {
        self.tracking.clone()
    }

    pub(crate) fn snapshot(&self) -> &SnapshotRequest {
        &self.snapshot
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingPort;

    fn manager(port: &Arc<RecordingPort>) -> DroneManager {
        DroneManager::new(CommandIssuer::new(port.clone()), TrackerConfig::default())
    }

    #[tokio::test]
    async fn test_manual_commands() {
        let port = RecordingPort::new();
        let manager = manager(&port);

        manager.execute(OperatorCommand::TakeOff, None).await;
        manager.execute(OperatorCommand::Move(Direction::Up), None).await;
        manager.execute(OperatorCommand::Move(Direction::Left), Some(30)).await;
        manager.execute(OperatorCommand::CeaseRotation, None).await;
        manager.execute(OperatorCommand::Land, None).await;

        assert_eq!(
            port.commands(),
            vec![
                FlightCommand::TakeOff,
                FlightCommand::move_in(Direction::Up, 10),
                FlightCommand::move_in(Direction::Left, 30),
                FlightCommand::CeaseRotation,
                FlightCommand::Land,
            ]
        );
    }

    #[test]
    fn test_speed_is_clamped() {
        let port = RecordingPort::new();
        let manager = manager(&port);

        assert_eq!(manager.speed(), 10);
        manager.set_speed(250);
        assert_eq!(manager.speed(), 100);
        manager.set_speed(0);
        assert_eq!(manager.speed(), 1);
    }

    #[tokio::test]
    async fn test_disable_tracking_hovers() {
        let port = RecordingPort::new();
        let manager = manager(&port);

        manager.execute(OperatorCommand::FaceDetectTracking, None).await;
        assert!(manager.is_tracking());
        assert!(port.commands().is_empty());

        manager.execute(OperatorCommand::StopFaceDetectTracking, None).await;
        assert!(!manager.is_tracking());
        assert_eq!(port.commands(), vec![FlightCommand::Hover]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_patrol_through_execute() {
        let port = RecordingPort::new();
        let manager = manager(&port);

        manager.execute(OperatorCommand::Patrol, None).await;
        assert!(manager.state().patrolling);

        manager.execute(OperatorCommand::StopPatrol, None).await;
        assert!(!manager.state().patrolling);
        assert_eq!(port.commands(), vec![FlightCommand::Hover]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_without_video_times_out() {
        let port = RecordingPort::new();
        let manager = manager(&port);

        let started = time::Instant::now();
        assert!(!manager.request_snapshot().await);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(!manager.snapshot().is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_connected() {
        let port = RecordingPort::new();
        let manager = Arc::new(manager(&port));

        assert!(!manager.wait_connected(Duration::from_secs(1)).await);

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.wait_connected(Duration::from_secs(5)).await })
        };
        time::sleep(Duration::from_millis(100)).await;
        manager.mark_connected();

        assert!(waiter.await.unwrap());
        assert!(manager.state().connected);
    }

    #[test]
    fn test_zero_default_speed_is_raised() {
        let port = RecordingPort::new();
        let config = TrackerConfig { default_speed: 0, ..Default::default() };
        let manager = DroneManager::new(CommandIssuer::new(port.clone()), config);
        assert_eq!(manager.speed(), 1);
    }

    #[test]
    fn test_initial_state() {
        let port = RecordingPort::new();
        let state = manager(&port).state();
        assert_eq!(
            state,
            DroneState {
                speed: 10,
                patrolling: false,
                tracking: false,
                connected: false,
            }
        );
    }
}
