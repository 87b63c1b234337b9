//! Error types for the CV module

use thiserror::Error;

/// Errors that can occur in CV operations
#[derive(Error, Debug)]
pub enum CvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame source closed")]
    SourceClosed,

    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Face detector could not be loaded: {0}")]
    DetectorLoad(String),

    #[error("Face detection failed: {0}")]
    Detection(String),

    #[error("Rendering error: {0}")]
    Rendering(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Frame processing error: {0}")]
    FrameProcessing(String),

    #[error("OpenCV error: {0}")]
    OpenCV(String),
}

impl CvError {
    pub fn decoder(msg: impl Into<String>) -> Self {
        Self::Decoder(msg.into())
    }

    pub fn detector_load(msg: impl Into<String>) -> Self {
        Self::DetectorLoad(msg.into())
    }

    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }

    pub fn rendering(msg: impl Into<String>) -> Self {
        Self::Rendering(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn frame_processing(msg: impl Into<String>) -> Self {
        Self::FrameProcessing(msg.into())
    }
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for CvError {
    fn from(err: opencv::Error) -> Self {
        Self::OpenCV(err.to_string())
    }
}

pub type CvResult<T> = Result<T, CvError>;
