//! Server configuration

use drone_core::clamp_speed;
use drone_cv::CvConfig;
use drone_link::LinkConfig;
use drone_tracker::TrackerConfig;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address the control surface binds to
    pub address: IpAddr,
    /// Control surface port
    pub port: u16,
    /// Log file, appended to alongside stdout
    pub log_file: PathBuf,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Enable CORS for all origins (development)
    pub cors_permissive: bool,
    /// Drone link settings
    pub link: LinkConfig,
    /// Video pipeline settings
    pub cv: CvConfig,
    /// Manager, patrol and tracking settings
    pub tracker: TrackerConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            log_file: PathBuf::from("gotello.log"),
            static_dir: PathBuf::from("static"),
            cors_permissive: true,
            link: LinkConfig::default(),
            cv: CvConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from `.env` and environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let address = std::env::var("ADDRESS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.address);

        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let log_file = std::env::var("LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);

        let static_dir = std::env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.static_dir);

        let cors_permissive = std::env::var("CORS_PERMISSIVE")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(defaults.cors_permissive);

        Self {
            address,
            port,
            log_file,
            static_dir,
            cors_permissive,
            link: LinkConfig::from_env(),
            cv: cv_from_env(defaults.cv),
            tracker: tracker_from_env(defaults.tracker),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

fn cv_from_env(mut cv: CvConfig) -> CvConfig {
    if let Ok(dir) = std::env::var("SNAPSHOT_DIR") {
        cv.snapshot_dir = PathBuf::from(dir);
    }
    if let Ok(model) = std::env::var("FACE_MODEL") {
        cv.detector.model_path = PathBuf::from(model);
    }
    if let Ok(font) = std::env::var("LABEL_FONT") {
        cv.rendering.font_path = Some(PathBuf::from(font));
    }
    if let Ok(program) = std::env::var("FFMPEG_BIN") {
        cv.decoder.program = PathBuf::from(program);
    }
    if let Ok(hwaccel) = std::env::var("FFMPEG_HWACCEL") {
        cv.decoder.hwaccel = hwaccel == "true" || hwaccel == "1";
    }
    cv.jpeg_quality = std::env::var("JPEG_QUALITY")
        .ok()
        .and_then(|s| s.parse::<u8>().ok())
        .map(|q| q.clamp(1, 100))
        .unwrap_or(cv.jpeg_quality);
    cv
}

fn tracker_from_env(mut tracker: TrackerConfig) -> TrackerConfig {
    tracker.default_speed = std::env::var("DEFAULT_SPEED")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .map(clamp_speed)
        .unwrap_or(tracker.default_speed);

    tracker.startup_wait = std::env::var("STARTUP_WAIT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(tracker.startup_wait);

    tracker
}
