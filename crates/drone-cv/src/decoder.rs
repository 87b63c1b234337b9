//! H.264 decoding through an external ffmpeg process
//!
//! Raw stream packets are written to ffmpeg's stdin and scaled BGR24 frames
//! are read back from its stdout.

use crate::source::{FrameSource, PipeFrameSource};
use crate::{CvError, CvResult, DecoderConfig, Frame, FrameGeometry};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWrite;
use tokio::process::{Child, ChildStdout, Command};
use tracing::info;

/// A running decoder: packets go into `input`, frames come out of `frames`
pub struct DecodeSession {
    pub input: Box<dyn AsyncWrite + Send + Unpin>,
    pub frames: Box<dyn FrameSource>,
}

/// Starts decode sessions
pub trait DecodePipeline: Send + Sync {
    fn start(&self) -> CvResult<DecodeSession>;
}

/// ffmpeg-backed decoder
#[derive(Debug, Clone)]
pub struct FfmpegPipeline {
    config: DecoderConfig,
    geometry: FrameGeometry,
}

impl FfmpegPipeline {
    pub fn new(config: DecoderConfig, geometry: FrameGeometry) -> Self {
        Self { config, geometry }
    }

    /// Command line passed to ffmpeg
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.config.hwaccel {
            args.extend(["-hwaccel", "auto", "-hwaccel_device", "opencl"].map(String::from));
        }
        args.extend(["-i", "pipe:0", "-pix_fmt", "bgr24", "-s"].map(String::from));
        args.push(format!("{}x{}", self.geometry.width, self.geometry.height));
        args.extend(["-f", "rawvideo", "pipe:1"].map(String::from));
        args
    }
}

impl DecodePipeline for FfmpegPipeline {
    fn start(&self) -> CvResult<DecodeSession> {
        let mut child = Command::new(&self.config.program)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CvError::decoder(format!("failed to start {}: {}", self.config.program.display(), e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CvError::decoder("decoder stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CvError::decoder("decoder stdout unavailable"))?;

        info!(
            "Started {} decoding to {}x{}",
            self.config.program.display(),
            self.geometry.width,
            self.geometry.height
        );

        Ok(DecodeSession {
            input: Box::new(stdin),
            frames: Box::new(FfmpegFrames {
                _child: child,
                frames: PipeFrameSource::new(stdout, self.geometry),
            }),
        })
    }
}

/// Frame reader that keeps the ffmpeg process alive
struct FfmpegFrames {
    _child: Child,
    frames: PipeFrameSource<ChildStdout>,
}

#[async_trait]
impl FrameSource for FfmpegFrames {
    async fn next_frame(&mut self) -> CvResult<Frame> {
        self.frames.next_frame().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_with_hwaccel() {
        let pipeline = FfmpegPipeline::new(DecoderConfig::default(), FrameGeometry::TELLO_PREVIEW);
        assert_eq!(
            pipeline.args().join(" "),
            "-hwaccel auto -hwaccel_device opencl -i pipe:0 -pix_fmt bgr24 -s 320x240 -f rawvideo pipe:1"
        );
    }

    #[test]
    fn test_args_without_hwaccel() {
        let config = DecoderConfig {
            hwaccel: false,
            ..Default::default()
        };
        let pipeline = FfmpegPipeline::new(config, FrameGeometry::new(64, 48));
        assert_eq!(
            pipeline.args().join(" "),
            "-i pipe:0 -pix_fmt bgr24 -s 64x48 -f rawvideo pipe:1"
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_decoder_error() {
        let config = DecoderConfig {
            program: "/nonexistent/ffmpeg".into(),
            hwaccel: false,
        };
        let pipeline = FfmpegPipeline::new(config, FrameGeometry::TELLO_PREVIEW);
        assert!(matches!(pipeline.start(), Err(CvError::Decoder(_))));
    }
}
