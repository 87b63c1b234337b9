//! # Drone Link - Tello UDP Transport
//!
//! Implements [`FlightCommandPort`] over the Tello SDK text protocol.
//!
//! ## Lifecycle
//! 1. `command` is sent every `handshake_interval` until the drone answers `ok`
//! 2. [`LinkEvent::Connected`] is emitted and `streamon` starts the camera
//! 3. `streamon` is repeated every `keepalive_interval` while connected
//! 4. Every datagram arriving on the video socket becomes a
//!    [`LinkEvent::VideoFrame`]

pub mod config;
pub mod sticks;

pub use config::LinkConfig;
pub use sticks::StickState;

use bytes::Bytes;
use drone_core::{FlightCommand, FlightCommandPort, LinkEvent, LinkResult};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

/// Event channel capacity
const EVENT_CAPACITY: usize = 1024;

/// Largest datagram the drone sends on either socket
const MAX_DATAGRAM: usize = 2048;

/// UDP link to a single drone
pub struct TelloLink {
    socket: Arc<UdpSocket>,
    drone_addr: SocketAddr,
    video_addr: SocketAddr,
    sticks: Mutex<StickState>,
    tasks: Vec<JoinHandle<()>>,
}

impl TelloLink {
    /// Bind both sockets, start the handshake, and return the event stream
    pub async fn connect(config: LinkConfig) -> LinkResult<(Arc<Self>, mpsc::Receiver<LinkEvent>)> {
        let socket = Arc::new(UdpSocket::bind(config.command_bind).await?);
        let video = UdpSocket::bind(config.video_bind).await?;
        let video_addr = video.local_addr()?;

        info!(
            "Drone link bound (command {}, video {}), drone at {}",
            socket.local_addr()?,
            video_addr,
            config.drone_addr
        );

        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);

        let control = tokio::spawn(run_control(
            socket.clone(),
            config.drone_addr,
            event_tx.clone(),
            config.handshake_interval,
            config.keepalive_interval,
        ));
        let video_task = tokio::spawn(run_video(video, event_tx));

        let link = Self {
            socket,
            drone_addr: config.drone_addr,
            video_addr,
            sticks: Mutex::new(StickState::default()),
            tasks: vec![control, video_task],
        };

        Ok((Arc::new(link), event_rx))
    }

    /// Local address of the video socket
    pub fn video_addr(&self) -> SocketAddr {
        self.video_addr
    }

    /// Local address of the command socket
    pub fn command_addr(&self) -> LinkResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl FlightCommandPort for TelloLink {
    fn send(&self, command: FlightCommand) -> LinkResult<()> {
        let wire = self.sticks.lock().apply(command);
        self.socket.try_send_to(wire.as_bytes(), self.drone_addr)?;
        debug!(%command, %wire, "Sent flight command");
        Ok(())
    }
}

impl Drop for TelloLink {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Handshake, keep-alive and response reader for the command socket
async fn run_control(
    socket: Arc<UdpSocket>,
    drone_addr: SocketAddr,
    events: mpsc::Sender<LinkEvent>,
    handshake_interval: Duration,
    keepalive_interval: Duration,
) {
    let mut connected = false;
    let mut handshake = time::interval(handshake_interval);
    let mut keepalive = time::interval_at(Instant::now() + keepalive_interval, keepalive_interval);
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            _ = handshake.tick(), if !connected => {
                send_text(&socket, drone_addr, "command").await;
            }
            _ = keepalive.tick(), if connected => {
                if events.is_closed() {
                    return;
                }
                send_text(&socket, drone_addr, "streamon").await;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, from) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("Command socket receive failed: {}", e);
                        continue;
                    }
                };

                let reply = String::from_utf8_lossy(&buf[..len]);
                let reply = reply.trim();

                if !connected && reply == "ok" {
                    connected = true;
                    info!("Connected to drone at {}", from);
                    if events.send(LinkEvent::Connected).await.is_err() {
                        return;
                    }
                    send_text(&socket, drone_addr, "streamon").await;
                    keepalive.reset();
                } else if reply.starts_with("error") {
                    warn!("Drone replied: {}", reply);
                } else {
                    trace!("Drone replied: {}", reply);
                }
            }
        }
    }
}

/// Forward every video datagram as an event
async fn run_video(socket: UdpSocket, events: mpsc::Sender<LinkEvent>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        match socket.recv(&mut buf).await {
            Ok(len) => {
                let packet = Bytes::copy_from_slice(&buf[..len]);
                if events.send(LinkEvent::VideoFrame(packet)).await.is_err() {
                    debug!("Link event receiver dropped, stopping video reader");
                    return;
                }
            }
            Err(e) => warn!("Video socket receive failed: {}", e),
        }
    }
}

async fn send_text(socket: &UdpSocket, addr: SocketAddr, text: &str) {
    if let Err(e) = socket.send_to(text.as_bytes(), addr).await {
        warn!("Failed to send '{}' to drone: {}", text, e);
    }
}

// ============================================================================
// TESTS
// ============================================================================
