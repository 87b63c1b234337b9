//! Link configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Addresses and timers for the UDP link
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Drone command endpoint
    pub drone_addr: SocketAddr,
    /// Local address for the command socket
    pub command_bind: SocketAddr,
    /// Local address the drone streams video to
    pub video_bind: SocketAddr,
    /// Retry interval for the `command` handshake
    pub handshake_interval: Duration,
    /// Interval for re-sending `streamon` once connected
    pub keepalive_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            drone_addr: SocketAddr::from(([192, 168, 10, 1], 8889)),
            command_bind: SocketAddr::from(([0, 0, 0, 0], 8889)),
            video_bind: SocketAddr::from(([0, 0, 0, 0], 11111)),
            handshake_interval: Duration::from_secs(1),
            keepalive_interval: Duration::from_secs(5),
        }
    }
}

impl LinkConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let drone_addr = std::env::var("DRONE_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.drone_addr);

        let command_bind = std::env::var("DRONE_COMMAND_BIND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.command_bind);

        let video_bind = std::env::var("DRONE_VIDEO_BIND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.video_bind);

        let keepalive_interval = std::env::var("KEEPALIVE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.keepalive_interval);

        Self {
            drone_addr,
            command_bind,
            video_bind,
            keepalive_interval,
            ..defaults
        }
    }
}
