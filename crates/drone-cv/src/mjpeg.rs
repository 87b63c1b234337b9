//! MJPEG preview streaming
//!
//! Annotated frames are broadcast to every connected viewer. Each viewer gets
//! a `multipart/x-mixed-replace` body where every part is one JPEG; browsers
//! render it natively in an `<img>` tag. Slow viewers skip frames instead of
//! holding up the tracking loop.

use bytes::Bytes;
use futures::Stream;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::trace;

/// Separates parts of the multipart body
pub const MJPEG_BOUNDARY: &str = "gotello_frame_3b9d1c";

/// `Content-Type` header value for the preview stream
pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={MJPEG_BOUNDARY}")
}

/// One encoded preview frame
#[derive(Debug, Clone)]
pub struct MjpegFrame {
    pub jpeg_data: Bytes,
    /// Sequence number assigned by the broadcaster
    pub frame_number: u64,
}

/// Fans encoded frames out to every viewer
pub struct MjpegBroadcaster {
    tx: broadcast::Sender<MjpegFrame>,
    next_frame: AtomicU64,
}

impl MjpegBroadcaster {
    /// `capacity` frames are buffered before slow viewers start skipping
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            next_frame: AtomicU64::new(0),
        }
    }

    /// Publish a frame; returns the number of viewers it reached
    pub fn publish(&self, jpeg_data: Bytes) -> usize {
        let frame_number = self.next_frame.fetch_add(1, Ordering::Relaxed);
        let viewers = self.tx.send(MjpegFrame { jpeg_data, frame_number }).unwrap_or(0);
        trace!("Published preview frame {} to {} viewers", frame_number, viewers);
        viewers
    }

    pub fn subscribe(&self) -> MjpegSubscriber {
        MjpegSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Frames published so far
    pub fn frames_published(&self) -> u64 {
        self.next_frame.load(Ordering::Relaxed)
    }
}

impl Default for MjpegBroadcaster {
    fn default() -> Self {
        Self::new(4)
    }
}

/// A single viewer of the preview stream
pub struct MjpegSubscriber {
    rx: broadcast::Receiver<MjpegFrame>,
}

impl MjpegSubscriber {
    /// Next frame, skipping any the viewer lagged behind on; `None` once the
    /// broadcaster is gone
    pub async fn recv(&mut self) -> Option<MjpegFrame> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!("Preview viewer skipped {} frames", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Multipart body chunks, one per frame
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> + Send {
        BroadcastStream::new(self.rx).filter_map(|result| match result {
            Ok(frame) => Some(Ok(multipart_chunk(&frame.jpeg_data))),
            Err(BroadcastStreamRecvError::Lagged(_)) => None,
        })
    }
}

/// Boundary, part headers and JPEG payload for one frame
pub fn multipart_chunk(jpeg: &[u8]) -> Bytes {
    let head = format!(
        "--{boundary}\r\nContent-Type: image/jpeg\r\nContent-Length: {len}\r\n\r\n",
        boundary = MJPEG_BOUNDARY,
        len = jpeg.len()
    );

    let mut chunk = Vec::with_capacity(head.len() + jpeg.len() + 2);
    chunk.extend_from_slice(head.as_bytes());
    chunk.extend_from_slice(jpeg);
    chunk.extend_from_slice(b"\r\n");
    Bytes::from(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = MjpegBroadcaster::new(4);
        assert_eq!(broadcaster.publish(Bytes::from_static(b"jpeg")), 0);
        assert_eq!(broadcaster.frames_published(), 1);
    }

    #[test]
    fn test_subscriber_count() {
        let broadcaster = MjpegBroadcaster::new(4);
        let first = broadcaster.subscribe();
        let _second = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        drop(first);
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_lagging_viewer_gets_latest_frames() {
        let broadcaster = MjpegBroadcaster::new(2);
        let mut viewer = broadcaster.subscribe();

        for i in 0..5u8 {
            broadcaster.publish(Bytes::from(vec![i]));
        }

        let frame = viewer.recv().await.unwrap();
        assert_eq!(frame.frame_number, 3);
        assert_eq!(frame.jpeg_data, Bytes::from_static(&[3]));
    }

    #[tokio::test]
    async fn test_stream_yields_multipart_chunks() {
        let broadcaster = MjpegBroadcaster::new(4);
        let mut stream = Box::pin(broadcaster.subscribe().into_stream());

        broadcaster.publish(Bytes::from_static(b"abc"));
        drop(broadcaster);

        let chunk = stream.next().await.unwrap().unwrap();
        let expected = format!(
            "--{MJPEG_BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: 3\r\n\r\nabc\r\n"
        );
        assert_eq!(chunk, Bytes::from(expected));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_content_type_names_boundary() {
        assert!(content_type().ends_with(MJPEG_BOUNDARY));
    }
}
