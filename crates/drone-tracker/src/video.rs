//! Link to video bridge
//!
//! Consumes the drone link's events. The first `Connected` marks the manager
//! connected, starts the decoder and spawns the face tracking loop on its
//! frames. Stream packets are then fed to the decoder; packets that arrive
//! before the drone connects are dropped. If the decoder dies, the next
//! packet or `Connected` starts a fresh session.

use crate::face_tracking::{FaceTrackingController, FrameOutput};
use crate::manager::DroneManager;
use drone_core::LinkEvent;
use drone_cv::{CvResult, DecodePipeline, FaceDetector};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Pause before retrying a decoder that failed to start
const RESTART_BACKOFF: Duration = Duration::from_secs(1);

/// Loads the face detector once streaming starts
pub type DetectorLoader = Arc<dyn Fn() -> CvResult<Box<dyn FaceDetector>> + Send + Sync>;

/// Everything needed to turn stream packets into tracked, previewed frames
pub struct VideoPipeline {
    pub decoder: Arc<dyn DecodePipeline>,
    pub load_detector: DetectorLoader,
    pub output: FrameOutput,
}

/// One decoder session and the tracking loop reading from it
struct VideoStream {
    input: Option<Box<dyn AsyncWrite + Send + Unpin>>,
    tracking_loop: JoinHandle<()>,
}

impl VideoStream {
    fn is_alive(&self) -> bool {
        self.input.is_some() && !self.tracking_loop.is_finished()
    }

    /// Close the decoder input and wait for the tracking loop to drain
    async fn finish(mut self) {
        self.input = None;
        if let Err(e) = self.tracking_loop.await {
            warn!("Face tracking loop ended abnormally: {}", e);
        }
    }

    /// Tear down a dead session
    async fn abort(self) {
        self.tracking_loop.abort();
        if let Err(e) = self.tracking_loop.await {
            if e.is_panic() {
                warn!("Face tracking loop panicked: {}", e);
            }
        }
    }
}

/// Spawn the bridge task; it ends when the link's event channel closes
pub fn bind_link(
    manager: Arc<DroneManager>,
    mut events: mpsc::Receiver<LinkEvent>,
    pipeline: VideoPipeline,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream: Option<VideoStream> = None;
        let mut retry_at: Option<Instant> = None;
        let mut dropped = 0u64;

        while let Some(event) = events.recv().await {
            match event {
                LinkEvent::Connected => {
                    manager.mark_connected();
                    if stream.as_ref().is_some_and(VideoStream::is_alive) {
                        debug!("Video already streaming");
                        continue;
                    }
                    if dropped > 0 {
                        debug!("Dropped {} video packets received while not streaming", dropped);
                    }
                    stream = restart(&manager, &pipeline, stream.take(), &mut retry_at).await;
                }
                LinkEvent::VideoFrame(packet) => {
                    if !manager.is_connected() {
                        dropped += 1;
                        trace!("Dropping video packet, not connected");
                        continue;
                    }

                    if !stream.as_ref().is_some_and(VideoStream::is_alive) {
                        if retry_at.is_some_and(|at| Instant::now() < at) {
                            dropped += 1;
                            continue;
                        }
                        warn!("Video decoder stopped, restarting it");
                        stream = restart(&manager, &pipeline, stream.take(), &mut retry_at).await;
                    }

                    let Some(writer) = stream.as_mut().and_then(|s| s.input.as_mut()) else {
                        dropped += 1;
                        continue;
                    };
                    let written = writer.write_all(&packet).await;
                    if let Err(e) = written {
                        warn!("Decoder input closed: {}", e);
                        if let Some(dead) = stream.as_mut() {
                            dead.input = None;
                        }
                    }
                }
            }
        }

        info!("Drone link closed, stopping video");
        if let Some(stream) = stream {
            stream.finish().await;
        }
    })
}

/// Replace `previous` with a fresh session; `None` if the decoder won't start
async fn restart(
    manager: &DroneManager,
    pipeline: &VideoPipeline,
    previous: Option<VideoStream>,
    retry_at: &mut Option<Instant>,
) -> Option<VideoStream> {
    if let Some(previous) = previous {
        previous.abort().await;
    }

    match start_streaming(manager, pipeline).await {
        Ok(stream) => {
            *retry_at = None;
            Some(stream)
        }
        Err(e) => {
            error!("Failed to start video decoder: {}", e);
            *retry_at = Some(Instant::now() + RESTART_BACKOFF);
            None
        }
    }
}

async fn start_streaming(manager: &DroneManager, pipeline: &VideoPipeline) -> CvResult<VideoStream> {
    let session = pipeline.decoder.start()?;

    let loader = pipeline.load_detector.clone();
    let detector = match tokio::task::spawn_blocking(move || loader()).await {
        Ok(Ok(detector)) => Some(detector),
        Ok(Err(e)) => {
            error!("Face detector unavailable, tracking disabled: {}", e);
            None
        }
        Err(e) => {
            error!("Face detector loader failed: {}", e);
            None
        }
    };

    let controller = FaceTrackingController::new(manager, detector, pipeline.output.clone());
    let tracking_loop = tokio::spawn(controller.run(session.frames));
    info!("📹 Video streaming started");

    Ok(VideoStream {
        input: Some(session.input),
        tracking_loop,
    })
}

// ============================================================================
// TESTS
// ============================================================================
