//! Frame sources
//!
//! The decoder emits raw BGR24 frames back to back with no framing, so a
//! source simply reads `width * height * 3` bytes per frame.

use crate::{CvError, CvResult, Frame, FrameGeometry};
use async_trait::async_trait;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Continuous sequence of decoded frames
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next frame; `CvError::SourceClosed` once the stream ends
    async fn next_frame(&mut self) -> CvResult<Frame>;
}

/// Reads fixed-size frames from a byte pipe
pub struct PipeFrameSource<R> {
    reader: R,
    geometry: FrameGeometry,
}

impl<R> PipeFrameSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R, geometry: FrameGeometry) -> Self {
        Self { reader, geometry }
    }
}

#[async_trait]
impl<R> FrameSource for PipeFrameSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_frame(&mut self) -> CvResult<Frame> {
        let mut buf = vec![0u8; self.geometry.frame_size()];
        match self.reader.read_exact(&mut buf).await {
            Ok(_) => Frame::from_bgr(self.geometry, buf),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(CvError::SourceClosed),
            Err(e) => Err(e.into()),
        }
    }
}
