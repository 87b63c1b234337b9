//! Test doubles shared by the tracker tests

use drone_core::{FaceBox, FlightCommand, FlightCommandPort, LinkResult};
use drone_cv::{CvError, CvResult, FaceDetector, Frame, FrameSource};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Port that records every command it is given
#[derive(Default)]
pub struct RecordingPort {
    sent: Mutex<Vec<FlightCommand>>,
}

impl RecordingPort {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn commands(&self) -> Vec<FlightCommand> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl FlightCommandPort for RecordingPort {
    fn send(&self, command: FlightCommand) -> LinkResult<()> {
        self.sent.lock().push(command);
        Ok(())
    }
}

/// Detector returning the same boxes for every frame
pub struct FixedDetector(pub Vec<FaceBox>);

impl FaceDetector for FixedDetector {
    fn detect(&mut self, _frame: &Frame) -> CvResult<Vec<FaceBox>> {
        Ok(self.0.clone())
    }
}

/// Detector that fails on every frame
pub struct FailingDetector;

impl FaceDetector for FailingDetector {
    fn detect(&mut self, _frame: &Frame) -> CvResult<Vec<FaceBox>> {
        Err(CvError::detection("model rejected frame"))
    }
}

/// Source replaying a fixed list of frames, then closing
pub struct ScriptedSource(pub VecDeque<CvResult<Frame>>);

#[async_trait::async_trait]
impl FrameSource for ScriptedSource {
    async fn next_frame(&mut self) -> CvResult<Frame> {
        self.0.pop_front().unwrap_or(Err(CvError::SourceClosed))
    }
}
