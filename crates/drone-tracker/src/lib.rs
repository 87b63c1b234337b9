//! # Drone Tracker - Main Orchestration
//!
//! Central coordination for the Tello controller. Three producers drive the
//! drone through one shared command port:
//! - the operator, through [`DroneManager`]
//! - the patrol cycle ([`PatrolController`])
//! - the per-frame face tracking loop ([`FaceTrackingController`])
//!
//! ## Exclusivity
//! Local trumps global: while tracking is enabled, every frame stops the
//! patrol before the detections are acted on. There is no lock around the
//! port, so a patrol tick racing a manual command is possible.

pub mod face_tracking;
pub mod issuer;
pub mod manager;
pub mod patrol;
pub mod snapshot;
pub mod video;

#[cfg(test)]
pub(crate) mod testing;

pub use face_tracking::{FaceOffset, FaceTrackingController, FrameOutput, TrackingThresholds};
pub use issuer::CommandIssuer;
pub use manager::DroneManager;
pub use patrol::{PatrolController, PatrolCycle};
pub use snapshot::SnapshotRequest;
pub use video::{DetectorLoader, VideoPipeline, bind_link};

use drone_core::DEFAULT_SPEED;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Initial speed for relative moves (0-100)
    pub default_speed: u8,
    /// Time between patrol steps
    pub patrol_period: Duration,
    /// Bound on a snapshot request
    pub snapshot_timeout: Duration,
    /// How long startup waits for the drone to answer
    pub startup_wait: Duration,
    /// Face tracking rules
    pub thresholds: TrackingThresholds,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_speed: DEFAULT_SPEED,
            patrol_period: patrol::DEFAULT_PATROL_PERIOD,
            snapshot_timeout: snapshot::DEFAULT_SNAPSHOT_TIMEOUT,
            startup_wait: Duration::from_secs(5),
            thresholds: TrackingThresholds::default(),
        }
    }
}
