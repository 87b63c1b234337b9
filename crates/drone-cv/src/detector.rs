//! Face detection
//!
//! The default detector runs the SeetaFace frontal model through `rustface`.
//! Building with the `opencv` feature adds a Haar cascade detector.

use crate::{CvError, CvResult, DetectorConfig, Frame};
use crossbeam_channel::{Receiver, Sender};
use drone_core::FaceBox;
use image::GrayImage;
use std::thread;
use tracing::{debug, info};

/// Locates faces in a frame
///
/// Detectors may keep per-call scratch state, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> CvResult<Vec<FaceBox>>;
}

// ============================================================================
// SEETAFACE (rustface)
// ============================================================================

struct DetectRequest {
    gray: GrayImage,
    reply: Sender<Vec<FaceBox>>,
}

/// SeetaFace detector running on a dedicated thread
///
/// The rustface model is not `Send`, so it stays on the thread that loaded it
/// and frames are handed over through a channel.
pub struct SeetaFaceDetector {
    requests: Sender<DetectRequest>,
}

impl SeetaFaceDetector {
    /// Load the model; fails if the file is missing or unreadable
    pub fn load(config: &DetectorConfig) -> CvResult<Self> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<DetectRequest>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let config = config.clone();

        thread::Builder::new()
            .name("face-detector".into())
            .spawn(move || run_seeta(config, request_rx, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { requests: request_tx }),
            Ok(Err(e)) => Err(CvError::detector_load(e)),
            Err(_) => Err(CvError::detector_load("detector thread exited during load")),
        }
    }
}

impl FaceDetector for SeetaFaceDetector {
    fn detect(&mut self, frame: &Frame) -> CvResult<Vec<FaceBox>> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.requests
            .send(DetectRequest {
                gray: frame.to_gray_image(),
                reply: reply_tx,
            })
            .map_err(|_| CvError::detection("detector thread stopped"))?;

        reply_rx
            .recv()
            .map_err(|_| CvError::detection("detector thread dropped the request"))
    }
}

fn run_seeta(
    config: DetectorConfig,
    requests: Receiver<DetectRequest>,
    ready: Sender<Result<(), String>>,
) {
    let path = config.model_path.to_string_lossy().into_owned();
    let mut detector = match rustface::create_detector(&path) {
        Ok(detector) => detector,
        Err(e) => {
            let _ = ready.send(Err(format!("{}: {}", path, e)));
            return;
        }
    };

    detector.set_min_face_size(config.min_face_size);
    detector.set_score_thresh(config.score_thresh);
    detector.set_pyramid_scale_factor(config.pyramid_scale_factor);
    detector.set_slide_window_step(config.slide_window_step.0, config.slide_window_step.1);

    info!("Loaded SeetaFace model from {}", path);
    if ready.send(Ok(())).is_err() {
        return;
    }

    // Exits once every sender is dropped
    for request in requests {
        let (width, height) = request.gray.dimensions();
        let mut image = rustface::ImageData::new(request.gray.as_raw(), width, height);
        let faces: Vec<FaceBox> = detector
            .detect(&mut image)
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBox::from_rect(bbox.x(), bbox.y(), bbox.width() as i32, bbox.height() as i32)
            })
            .collect();

        debug!("Detected {} faces", faces.len());
        let _ = request.reply.send(faces);
    }

    debug!("Face detector thread stopped");
}

// ============================================================================
// HAAR CASCADE (opencv)
// ============================================================================

/// Haar cascade detector using OpenCV's `CascadeClassifier`
#[cfg(feature = "opencv")]
pub struct CascadeFaceDetector {
    classifier: opencv::objdetect::CascadeClassifier,
}

#[cfg(feature = "opencv")]
impl CascadeFaceDetector {
    /// Load a cascade XML file
    pub fn load(config: &DetectorConfig) -> CvResult<Self> {
        use opencv::prelude::*;

        let path = config.model_path.to_string_lossy().into_owned();
        let classifier = opencv::objdetect::CascadeClassifier::new(&path)?;
        if classifier.empty()? {
            return Err(CvError::detector_load(format!("empty cascade: {}", path)));
        }

        info!("Loaded Haar cascade from {}", path);
        Ok(Self { classifier })
    }
}

#[cfg(feature = "opencv")]
impl FaceDetector for CascadeFaceDetector {
    fn detect(&mut self, frame: &Frame) -> CvResult<Vec<FaceBox>> {
        use opencv::{
            core::{Mat, Rect, Scalar, Size, Vector, CV_8UC3},
            imgproc,
            prelude::*,
        };

        let geometry = frame.geometry();
        let mut bgr = Mat::new_rows_cols_with_default(
            geometry.height as i32,
            geometry.width as i32,
            CV_8UC3,
            Scalar::all(0.0),
        )?;
        bgr.data_bytes_mut()?.copy_from_slice(frame.as_bgr());

        let mut gray = Mat::default();
        imgproc::cvt_color(&bgr, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

        let mut rects = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            &gray,
            &mut rects,
            1.1,
            3,
            0,
            Size::new(0, 0),
            Size::new(0, 0),
        )?;

        Ok(rects
            .iter()
            .map(|r| FaceBox::from_rect(r.x, r.y, r.width, r.height))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_fails_to_load() {
        let config = DetectorConfig {
            model_path: "/nonexistent/seeta_fd_frontal_v1.0.bin".into(),
            ..Default::default()
        };
        assert!(matches!(
            SeetaFaceDetector::load(&config),
            Err(CvError::DetectorLoad(_))
        ));
    }

    #[test]
    fn test_garbage_model_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"not a model").unwrap();

        let config = DetectorConfig {
            model_path: path,
            ..Default::default()
        };
        assert!(SeetaFaceDetector::load(&config).is_err());
    }
}
