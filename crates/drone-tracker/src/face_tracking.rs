//! Per-frame face tracking
//!
//! Every decoded frame is annotated, encoded and published to the preview,
//! whether tracking is on or not. While tracking is enabled (and a detector
//! loaded) the first detected face steers the drone toward the frame center
//! and a comfortable distance.

use crate::issuer::CommandIssuer;
use crate::manager::DroneManager;
use crate::patrol::PatrolController;
use crate::snapshot::SnapshotRequest;
use bytes::Bytes;
use drone_core::{Direction, FaceBox, FlightCommand};
use drone_cv::{
    CvError, CvResult, FaceDetector, Frame, FrameGeometry, FrameSource, MjpegBroadcaster,
    OverlayRenderer, SnapshotWriter, encode_jpeg,
};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Offsets and speeds of the tracking rules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingThresholds {
    /// Horizontal offset (px) beyond which the drone strafes
    pub horizontal_px: i32,
    /// Vertical offset (px) beyond which the drone climbs or descends
    pub vertical_px: i32,
    /// Face share of the frame (%) above which the drone backs off
    pub near_percent: f64,
    /// Face share of the frame (%) below which the drone closes in
    pub far_percent: f64,
    pub horizontal_speed: u8,
    pub vertical_speed: u8,
    pub depth_speed: u8,
}

impl Default for TrackingThresholds {
    fn default() -> Self {
        Self {
            horizontal_px: 20,
            vertical_px: 30,
            near_percent: 7.0,
            far_percent: 0.9,
            horizontal_speed: 15,
            vertical_speed: 25,
            depth_speed: 10,
        }
    }
}

/// Position and size of a face relative to the frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceOffset {
    /// Frame center minus face center; negative when the face is to the right
    pub diff_x: i32,
    /// Frame center minus face center; negative when the face is below
    pub diff_y: i32,
    /// Face area as a whole-number percentage of the frame
    pub face_percent: f64,
}

impl FaceOffset {
    pub fn measure(geometry: FrameGeometry, face: &FaceBox) -> Self {
        let (cx, cy) = face.center();
        let face_percent = (face.area() as f64 / geometry.area() as f64 * 100.0).round();
        Self {
            diff_x: geometry.center_x() - cx,
            diff_y: geometry.center_y() - cy,
            face_percent,
        }
    }
}

/// Commands that bring the face back to the center
///
/// Rules are independent, so up to three moves may be returned. Hover when
/// the face is already well placed.
pub fn plan_motion(offset: &FaceOffset, thresholds: &TrackingThresholds) -> Vec<FlightCommand> {
    let mut commands = Vec::new();

    if offset.diff_x < -thresholds.horizontal_px {
        commands.push(FlightCommand::move_in(Direction::Right, thresholds.horizontal_speed));
    }
    if offset.diff_x > thresholds.horizontal_px {
        commands.push(FlightCommand::move_in(Direction::Left, thresholds.horizontal_speed));
    }
    if offset.diff_y < -thresholds.vertical_px {
        commands.push(FlightCommand::move_in(Direction::Down, thresholds.vertical_speed));
    }
    if offset.diff_y > thresholds.vertical_px {
        commands.push(FlightCommand::move_in(Direction::Up, thresholds.vertical_speed));
    }
    if offset.face_percent > thresholds.near_percent {
        commands.push(FlightCommand::move_in(Direction::Backward, thresholds.depth_speed));
    }
    if offset.face_percent < thresholds.far_percent {
        commands.push(FlightCommand::move_in(Direction::Forward, thresholds.depth_speed));
    }

    if commands.is_empty() {
        commands.push(FlightCommand::Hover);
    }
    commands
}

/// Where processed frames go
#[derive(Clone)]
pub struct FrameOutput {
    pub renderer: Arc<OverlayRenderer>,
    pub snapshots: SnapshotWriter,
    pub preview: Arc<MjpegBroadcaster>,
    pub jpeg_quality: u8,
}

/// The per-frame tracking loop
pub struct FaceTrackingController {
    issuer: CommandIssuer,
    patrol: PatrolController,
    tracking: Arc<AtomicBool>,
    snapshot: SnapshotRequest,
    thresholds: TrackingThresholds,
    detector: Option<Box<dyn FaceDetector>>,
    output: FrameOutput,
}

impl FaceTrackingController {
    /// Without a detector frames are still previewed but never acted on
    pub fn new(
        manager: &DroneManager,
        detector: Option<Box<dyn FaceDetector>>,
        output: FrameOutput,
    ) -> Self {
        Self {
            issuer: manager.issuer().clone(),
            patrol: manager.patrol().clone(),
            tracking: manager.tracking_flag(),
            snapshot: manager.snapshot().clone(),
            thresholds: manager.config().thresholds,
            detector,
            output,
        }
    }

    /// Process frames until the source closes
    pub async fn run(mut self, mut source: Box<dyn FrameSource>) {
        info!(
            "Face tracking loop started (detector {})",
            if self.detector.is_some() { "loaded" } else { "unavailable" }
        );

        loop {
            let frame = match source.next_frame().await {
                Ok(frame) => frame,
                Err(CvError::SourceClosed) => {
                    warn!("Video source closed, face tracking loop stopping");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read frame: {}", e);
                    self.record_frame_error();
                    continue;
                }
            };

            if let Err(e) = self.process_frame(frame).await {
                warn!("Failed to process frame: {}", e);
                self.record_frame_error();
            }
        }
    }

    /// Act on one frame and publish it; returns the encoded JPEG
    pub async fn process_frame(&mut self, frame: Frame) -> CvResult<Bytes> {
        let started = Instant::now();
        let active = self.tracking.load(Ordering::Relaxed) && self.detector.is_some();

        if active {
            self.patrol.stop().await;
        }

        let geometry = frame.geometry();
        let detector = if active { self.detector.take() } else { None };
        let renderer = self.output.renderer.clone();
        let quality = self.output.jpeg_quality;

        let (detector, rendered) = tokio::task::spawn_blocking(move || {
            let mut detector = detector;
            let rendered = render_frame(detector.as_mut(), &renderer, &frame, quality);
            (detector, rendered)
        })
        .await
        .map_err(|e| {
            if active {
                error!("Frame task failed, face detector lost: {}", e);
            }
            CvError::frame_processing(format!("frame task failed: {}", e))
        })?;

        if detector.is_some() {
            self.detector = detector;
        }
        let (faces, jpeg) = rendered?;

        if active {
            self.steer(geometry, &faces);
        }

        if self.snapshot.is_pending() {
            match self.output.snapshots.write(&jpeg).await {
                Ok(_) => {
                    if let Some(metrics) = self.issuer.metrics() {
                        metrics.record_snapshot();
                    }
                    self.snapshot.clear();
                }
                Err(e) => warn!("Failed to save snapshot: {}", e),
            }
        }

        self.output.preview.publish(jpeg.clone());

        if let Some(metrics) = self.issuer.metrics() {
            metrics.record_frame(started.elapsed().as_secs_f64(), faces.len() as u64);
        }
        trace!("Frame processed in {:?}", started.elapsed());

        Ok(jpeg)
    }

    fn steer(&self, geometry: FrameGeometry, faces: &[FaceBox]) {
        let Some(face) = faces.first() else {
            self.issuer.hover();
            return;
        };

        let offset = FaceOffset::measure(geometry, face);
        let commands = plan_motion(&offset, &self.thresholds);
        debug!(
            "Face offset ({}, {}) at {}%: {:?}",
            offset.diff_x, offset.diff_y, offset.face_percent, commands
        );

        for command in commands {
            self.issuer.issue(command);
        }
    }

    fn record_frame_error(&self) {
        if let Some(metrics) = self.issuer.metrics() {
            metrics.record_frame_error();
        }
    }
}

/// Detect, annotate and encode one frame
fn render_frame(
    detector: Option<&mut Box<dyn FaceDetector>>,
    renderer: &OverlayRenderer,
    frame: &Frame,
    quality: u8,
) -> CvResult<(Vec<FaceBox>, Bytes)> {
    let faces = match detector {
        Some(detector) => detect_faces(detector, frame),
        None => Vec::new(),
    };
    let annotated = renderer.annotate(frame, &faces);
    let jpeg = encode_jpeg(&annotated, quality)?;
    Ok((faces, jpeg))
}

/// Faces in `frame`; a failing or panicking detector sees none
fn detect_faces(detector: &mut Box<dyn FaceDetector>, frame: &Frame) -> Vec<FaceBox> {
    match panic::catch_unwind(AssertUnwindSafe(|| detector.detect(frame))) {
        Ok(Ok(faces)) => faces,
        Ok(Err(e)) => {
            warn!("Face detection failed: {}", e);
            Vec::new()
        }
        Err(_) => {
            error!("Face detector panicked");
            Vec::new()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackerConfig;
    use crate::testing::{FailingDetector, FixedDetector, RecordingPort, ScriptedSource};
    use drone_cv::RenderingConfig;
    use std::collections::VecDeque;

    const GEOMETRY: FrameGeometry = FrameGeometry::TELLO_PREVIEW;

    fn offset(diff_x: i32, diff_y: i32, face_percent: f64) -> FaceOffset {
        FaceOffset { diff_x, diff_y, face_percent }
    }

    fn plan(diff_x: i32, diff_y: i32, face_percent: f64) -> Vec<FlightCommand> {
        plan_motion(&offset(diff_x, diff_y, face_percent), &TrackingThresholds::default())
    }

    fn output(dir: &std::path::Path) -> FrameOutput {
        FrameOutput {
            renderer: Arc::new(OverlayRenderer::new(&RenderingConfig::default()).unwrap()),
            snapshots: SnapshotWriter::new(dir),
            preview: Arc::new(MjpegBroadcaster::new(4)),
            jpeg_quality: 80,
        }
    }

    fn setup(
        faces: Option<Vec<FaceBox>>,
        dir: &std::path::Path,
    ) -> (Arc<RecordingPort>, DroneManager, FaceTrackingController) {
        let port = RecordingPort::new();
        let manager = DroneManager::new(CommandIssuer::new(port.clone()), TrackerConfig::default());
        let detector = faces.map(|f| Box::new(FixedDetector(f)) as Box<dyn FaceDetector>);
        let controller = FaceTrackingController::new(&manager, detector, output(dir));
        (port, manager, controller)
    }

    #[test]
    fn test_rule_table() {
        let mv = FlightCommand::move_in;
        use Direction::*;

        assert_eq!(plan(0, 0, 3.0), vec![FlightCommand::Hover]);
        assert_eq!(plan(-21, 0, 3.0), vec![mv(Right, 15)]);
        assert_eq!(plan(21, 0, 3.0), vec![mv(Left, 15)]);
        assert_eq!(plan(0, -31, 3.0), vec![mv(Down, 25)]);
        assert_eq!(plan(0, 31, 3.0), vec![mv(Up, 25)]);
        assert_eq!(plan(0, 0, 8.0), vec![mv(Backward, 10)]);
        assert_eq!(plan(0, 0, 0.0), vec![mv(Forward, 10)]);
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        assert_eq!(plan(-20, 30, 7.0), vec![FlightCommand::Hover]);
        assert_eq!(plan(20, -30, 1.0), vec![FlightCommand::Hover]);
    }

    #[test]
    fn test_rules_combine() {
        use Direction::*;
        assert_eq!(
            plan(-40, 50, 12.0),
            vec![
                FlightCommand::move_in(Right, 15),
                FlightCommand::move_in(Up, 25),
                FlightCommand::move_in(Backward, 10),
            ]
        );
    }

    #[test]
    fn test_measure_rounds_face_percent() {
        // 20x20 face centered in 320x240: 400 / 76800 = 0.52% rounds to 1
        let centered = FaceOffset::measure(GEOMETRY, &FaceBox::new(150, 110, 170, 130));
        assert_eq!(centered, offset(0, 0, 1.0));
        assert_eq!(plan_motion(&centered, &TrackingThresholds::default()), vec![FlightCommand::Hover]);

        // 10x10 face: 0.13% rounds to 0, so close in
        let small = FaceOffset::measure(GEOMETRY, &FaceBox::new(155, 115, 165, 125));
        assert_eq!(small.face_percent, 0.0);

        // Face to the right and low
        let off = FaceOffset::measure(GEOMETRY, &FaceBox::new(250, 200, 270, 220));
        assert_eq!((off.diff_x, off.diff_y), (-100, -90));
    }

    #[tokio::test]
    async fn test_zero_faces_hovers_once() {
        let dir = tempfile::tempdir().unwrap();
        let (port, manager, mut controller) = setup(Some(vec![]), dir.path());
        manager.enable_face_detect_tracking();

        controller.process_frame(Frame::blank(GEOMETRY)).await.unwrap();

        assert_eq!(port.commands(), vec![FlightCommand::Hover]);
    }

    #[tokio::test]
    async fn test_detection_error_previews_and_hovers() {
        let dir = tempfile::tempdir().unwrap();
        let port = RecordingPort::new();
        let manager = DroneManager::new(CommandIssuer::new(port.clone()), TrackerConfig::default());
        let mut controller = FaceTrackingController::new(
            &manager,
            Some(Box::new(FailingDetector)),
            output(dir.path()),
        );
        manager.enable_face_detect_tracking();

        controller.process_frame(Frame::blank(GEOMETRY)).await.unwrap();

        assert_eq!(controller.output.preview.frames_published(), 1);
        assert_eq!(port.commands(), vec![FlightCommand::Hover]);
    }

    struct PanickingDetector;

    impl FaceDetector for PanickingDetector {
        fn detect(&mut self, _frame: &Frame) -> CvResult<Vec<FaceBox>> {
            panic!("corrupt cascade");
        }
    }

    #[tokio::test]
    async fn test_detector_panic_keeps_detector() {
        let dir = tempfile::tempdir().unwrap();
        let port = RecordingPort::new();
        let manager = DroneManager::new(CommandIssuer::new(port.clone()), TrackerConfig::default());
        let mut controller = FaceTrackingController::new(
            &manager,
            Some(Box::new(PanickingDetector)),
            output(dir.path()),
        );
        manager.enable_face_detect_tracking();

        controller.process_frame(Frame::blank(GEOMETRY)).await.unwrap();
        controller.process_frame(Frame::blank(GEOMETRY)).await.unwrap();

        assert!(controller.detector.is_some());
        assert_eq!(controller.output.preview.frames_published(), 2);
        assert_eq!(port.commands(), vec![FlightCommand::Hover, FlightCommand::Hover]);
    }

    #[tokio::test]
    async fn test_first_face_drives_motion() {
        let dir = tempfile::tempdir().unwrap();
        let faces = vec![FaceBox::new(250, 110, 270, 130), FaceBox::new(0, 0, 20, 20)];
        let (port, manager, mut controller) = setup(Some(faces), dir.path());
        manager.enable_face_detect_tracking();

        controller.process_frame(Frame::blank(GEOMETRY)).await.unwrap();

        assert_eq!(port.commands(), vec![FlightCommand::move_in(Direction::Right, 15)]);
    }

    #[tokio::test]
    async fn test_disabled_tracking_only_previews() {
        let dir = tempfile::tempdir().unwrap();
        let (port, _manager, mut controller) = setup(Some(vec![]), dir.path());
        let mut viewer = controller.output.preview.subscribe();

        let jpeg = controller.process_frame(Frame::blank(GEOMETRY)).await.unwrap();

        assert!(port.commands().is_empty());
        assert_eq!(viewer.recv().await.unwrap().jpeg_data, jpeg);
    }

    #[tokio::test]
    async fn test_missing_detector_never_steers() {
        let dir = tempfile::tempdir().unwrap();
        let (port, manager, mut controller) = setup(None, dir.path());
        manager.enable_face_detect_tracking();

        controller.process_frame(Frame::blank(GEOMETRY)).await.unwrap();

        assert!(port.commands().is_empty());
        assert_eq!(controller.output.preview.frames_published(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracking_preempts_patrol() {
        let dir = tempfile::tempdir().unwrap();
        let (port, manager, mut controller) = setup(Some(vec![]), dir.path());

        manager.start_patrol().await;
        manager.enable_face_detect_tracking();
        controller.process_frame(Frame::blank(GEOMETRY)).await.unwrap();

        assert!(!manager.is_patrolling());
        // Final patrol Hover, then the zero-face Hover
        assert_eq!(port.commands(), vec![FlightCommand::Hover, FlightCommand::Hover]);
    }

    #[tokio::test]
    async fn test_pending_snapshot_is_written_and_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let (_port, manager, mut controller) = setup(None, dir.path());

        let waiter = {
            let snapshot = manager.snapshot().clone();
            tokio::spawn(async move { snapshot.request(std::time::Duration::from_secs(2)).await })
        };
        while !manager.snapshot().is_pending() {
            tokio::task::yield_now().await;
        }

        let jpeg = controller.process_frame(Frame::blank(GEOMETRY)).await.unwrap();

        assert!(waiter.await.unwrap());
        assert!(!manager.snapshot().is_pending());
        let latest = std::fs::read(dir.path().join("snapshot.jpg")).unwrap();
        assert_eq!(latest, jpeg.to_vec());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_run_skips_bad_frames_and_stops_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let (_port, _manager, controller) = setup(None, dir.path());
        let preview = controller.output.preview.clone();

        let frames = VecDeque::from(vec![
            Ok(Frame::blank(GEOMETRY)),
            Err(CvError::FrameSize { expected: 1, actual: 0 }),
            Ok(Frame::blank(GEOMETRY)),
        ]);
        controller.run(Box::new(ScriptedSource(frames))).await;

        assert_eq!(preview.frames_published(), 2);
    }
}
