//! Flight command port
//!
//! Every producer of flight commands (operator, patrol, face tracker)
//! writes through one port. Implementations must tolerate concurrent
//! `send` calls from several tasks; commands are fire-and-forget.

use crate::{FlightCommand, LinkResult};
use bytes::Bytes;
use std::sync::Arc;

/// Capability to transmit flight commands to a single drone
pub trait FlightCommandPort: Send + Sync {
    fn send(&self, command: FlightCommand) -> LinkResult<()>;
}

impl<T: FlightCommandPort + ?Sized> FlightCommandPort for Arc<T> {
    fn send(&self, command: FlightCommand) -> LinkResult<()> {
        (**self).send(command)
    }
}

/// Asynchronous events delivered by a drone link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The drone acknowledged the control handshake
    Connected,
    /// One raw datagram of the encoded video stream
    VideoFrame(Bytes),
}
