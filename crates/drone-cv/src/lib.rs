//! # Drone CV - Computer Vision Module
//!
//! Video handling for face tracking on the Tello camera feed.
//! Features:
//! - H.264 decoding through an external ffmpeg process
//! - Fixed-size BGR24 frame reads from the decoder pipe
//! - Face detection with SeetaFace (`rustface`), or a Haar cascade with the
//!   `opencv` feature
//! - Box and label overlays
//! - JPEG encoding, MJPEG preview broadcasting and snapshot files
//!
//! ## Frame Flow
//!
//! 1. Stream packets are written into a [`DecodeSession`]'s input
//! 2. Frames are read back through its [`FrameSource`]
//! 3. A [`FaceDetector`] locates faces and the [`OverlayRenderer`] draws them
//! 4. The annotated frame is encoded once and shared by the preview and
//!    any pending snapshot

pub mod config;
pub mod decoder;
pub mod detector;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod mjpeg;
pub mod renderer;
pub mod snapshot;
pub mod source;

pub use config::{CvConfig, DecoderConfig, DetectorConfig, RenderingConfig};
pub use decoder::{DecodePipeline, DecodeSession, FfmpegPipeline};
#[cfg(feature = "opencv")]
pub use detector::CascadeFaceDetector;
pub use detector::{FaceDetector, SeetaFaceDetector};
pub use encoder::encode_jpeg;
pub use error::{CvError, CvResult};
pub use frame::{Frame, FrameGeometry};
pub use mjpeg::{MjpegBroadcaster, MjpegFrame, MjpegSubscriber};
pub use renderer::OverlayRenderer;
pub use snapshot::{SnapshotPaths, SnapshotWriter};
pub use source::{FrameSource, PipeFrameSource};

/// Load the detector selected by the build
///
/// With the `opencv` feature an `.xml` model is treated as a Haar cascade;
/// everything else goes to SeetaFace.
pub fn load_face_detector(config: &DetectorConfig) -> CvResult<Box<dyn FaceDetector>> {
    #[cfg(feature = "opencv")]
    {
        let is_cascade = config
            .model_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if is_cascade {
            return Ok(Box::new(CascadeFaceDetector::load(config)?));
        }
    }

    Ok(Box::new(SeetaFaceDetector::load(config)?))
}
