//! Configuration for the CV module

use crate::FrameGeometry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the video pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvConfig {
    /// Size of decoded frames
    pub geometry: FrameGeometry,
    /// Face detector settings
    pub detector: DetectorConfig,
    /// Annotation settings
    pub rendering: RenderingConfig,
    /// External decoder settings
    pub decoder: DecoderConfig,
    /// JPEG quality for the preview stream and snapshots (1-100)
    pub jpeg_quality: u8,
    /// Directory receiving snapshot files
    pub snapshot_dir: PathBuf,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            geometry: FrameGeometry::TELLO_PREVIEW,
            detector: DetectorConfig::default(),
            rendering: RenderingConfig::default(),
            decoder: DecoderConfig::default(),
            jpeg_quality: 80,
            snapshot_dir: PathBuf::from("./static/img/snapshots"),
        }
    }
}

/// Face detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Model file (SeetaFace binary, or Haar cascade XML with `opencv`)
    pub model_path: PathBuf,
    pub min_face_size: u32,
    pub score_thresh: f64,
    pub pyramid_scale_factor: f32,
    pub slide_window_step: (u32, u32),
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/seeta_fd_frontal_v1.0.bin"),
            min_face_size: 20,
            score_thresh: 2.0,
            pyramid_scale_factor: 0.8,
            slide_window_step: (4, 4),
        }
    }
}

/// Rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderingConfig {
    /// Box and label color (RGB)
    pub color: [u8; 3],
    /// Box line thickness in pixels
    pub thickness: u32,
    /// Text drawn next to every face
    pub label: String,
    /// TrueType font for the label; DejaVu Sans is used when unset
    pub font_path: Option<PathBuf>,
    /// Label height in pixels
    pub font_scale: f32,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            color: [0, 0, 255],
            thickness: 3,
            label: "Human".into(),
            font_path: None,
            font_scale: 16.0,
        }
    }
}

/// ffmpeg invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub program: PathBuf,
    /// Ask ffmpeg for OpenCL hardware decoding
    pub hwaccel: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            hwaccel: true,
        }
    }
}
