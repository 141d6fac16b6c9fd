//! Mothership side of the link: a single tank connection served by a
//! receive task that is re-spawned once per tick.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use planet_proto::{
    decode_message, encode_control, encode_message, ControlFrame, Frame, FrameDecoder,
    MothershipMessage, ProtoError, TankMessage,
};

use crate::error::{is_timeout, LinkError};

pub(crate) const READ_CHUNK: usize = 4096;
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
pub struct TankLinkConfig {
    pub bind_addr: String,
    pub accept_timeout: Duration,
    pub recv_timeout: Duration,
    pub handshake_timeout: Duration,
    /// When set, connections from any other address are refused.
    pub allowed_peer: Option<IpAddr>,
}

impl Default for TankLinkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:65432".to_string(),
            accept_timeout: Duration::from_millis(50),
            recv_timeout: Duration::from_millis(50),
            handshake_timeout: Duration::from_secs(2),
            allowed_peer: None,
        }
    }
}

impl TankLinkConfig {
    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = timeout;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_allowed_peer(mut self, peer: Option<IpAddr>) -> Self {
        self.allowed_peer = peer;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    TankConnected { peer: SocketAddr },
    /// The socket was reset, closed by the tank, or a send failed.
    TankLost { peer: SocketAddr, reason: String },
    /// The connection was closed on request of the mothership.
    TankDisconnected { peer: SocketAddr },
}

#[derive(Debug)]
pub(crate) enum Inbound {
    Message(TankMessage),
    Ping,
}

pub(crate) type Inbox = Arc<Mutex<VecDeque<Inbound>>>;

pub(crate) fn lock_inbox(inbox: &Inbox) -> MutexGuard<'_, VecDeque<Inbound>> {
    inbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read half of a connection, moved into the receive task and handed back
/// when the task finishes.
struct Receiver {
    stream: TcpStream,
    decoder: FrameDecoder,
    peer: SocketAddr,
}

enum ReceiveOutcome {
    Continue(Receiver),
    Lost(String),
    Disconnected,
}

/// An accepted stream that has not sent `connection_request` yet.
struct Handshake {
    receiver: Receiver,
    inbox: Inbox,
    deadline: Instant,
}

struct Connection {
    peer: SocketAddr,
    writer: TcpStream,
    inbox: Inbox,
    disconnect: Arc<AtomicBool>,
    idle: Option<Receiver>,
    in_flight: Option<JoinHandle<ReceiveOutcome>>,
}

pub struct TankLink {
    config: TankLinkConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    handshake: Option<Handshake>,
    connection: Option<Connection>,
    pending_events: Vec<LinkEvent>,
}

impl TankLink {
    pub fn bind(config: TankLinkConfig) -> Result<Self, LinkError> {
        let listener = TcpListener::bind(&config.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "listening for tank connections");
        Ok(Self {
            config,
            listener,
            local_addr,
            handshake: None,
            connection: None,
            pending_events: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.connection.as_ref().map(|connection| connection.peer)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Advances the link by one tick. Without a tank this waits up to the
    /// accept timeout for one and reads its handshake once, bounded by the
    /// receive timeout; with a tank it collects the previous receive
    /// attempt, if finished, and starts the next one.
    pub fn poll(&mut self) -> Vec<LinkEvent> {
        let mut events = std::mem::take(&mut self.pending_events);
        if self.connection.is_some() {
            self.refuse_extra_peers();
            self.step_receiver(&mut events);
        } else if self.handshake.is_some() || self.accept_tank() {
            if let Some(event) = self.step_handshake() {
                events.push(event);
            }
        }
        events
    }

    /// Takes every message queued by the receive task, answering pings on
    /// the way.
    pub fn drain(&mut self) -> Vec<TankMessage> {
        let Some(connection) = self.connection.as_mut() else {
            return Vec::new();
        };
        let inbound: Vec<Inbound> = lock_inbox(&connection.inbox).drain(..).collect();
        let mut messages = Vec::new();
        let mut failure = None;
        for item in inbound {
            match item {
                Inbound::Ping => {
                    if let Err(err) = connection
                        .writer
                        .write_all(&encode_control(ControlFrame::Pong))
                    {
                        failure = Some(err.to_string());
                    }
                }
                Inbound::Message(message) => {
                    tracing::debug!(peer = %connection.peer, kind = message.kind(), "received tank message");
                    messages.push(message);
                }
            }
        }
        if let Some(reason) = failure {
            self.mark_lost(reason);
        }
        messages
    }

    pub fn send(&mut self, message: &MothershipMessage) -> Result<(), LinkError> {
        let bytes = encode_message(message)?;
        let connection = self.connection.as_mut().ok_or(LinkError::NotConnected)?;
        let peer = connection.peer;
        if let Err(err) = connection.writer.write_all(&bytes) {
            self.mark_lost(err.to_string());
            return Err(err.into());
        }
        tracing::debug!(%peer, kind = message.kind(), "sent mothership message");
        Ok(())
    }

    /// Asks the receive task to close the connection on its next pass. The
    /// result shows up as [`LinkEvent::TankDisconnected`].
    pub fn request_disconnect(&self) {
        if let Some(connection) = &self.connection {
            tracing::info!(peer = %connection.peer, "disconnect requested");
            connection.disconnect.store(true, Ordering::SeqCst);
        }
    }

    /// Returns true once a stream has been accepted and is awaiting its
    /// `connection_request`.
    fn accept_tank(&mut self) -> bool {
        let deadline = Instant::now() + self.config.accept_timeout;
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    return match self.start_handshake(stream, peer) {
                        Ok(handshake) => {
                            tracing::debug!(%peer, "awaiting connection request");
                            self.handshake = Some(handshake);
                            true
                        }
                        Err(err) => {
                            tracing::warn!(%peer, error = %err, "refused tank connection");
                            false
                        }
                    };
                }
                Err(err) if is_timeout(&err) => {
                    if Instant::now() >= deadline {
                        return false;
                    }
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                    return false;
                }
            }
        }
    }

    fn start_handshake(&self, stream: TcpStream, peer: SocketAddr) -> Result<Handshake, LinkError> {
        if let Some(allowed) = self.config.allowed_peer {
            if peer.ip() != allowed {
                return Err(LinkError::PeerNotAllowed { peer });
            }
        }
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(non_zero(self.config.recv_timeout)))?;
        Ok(Handshake {
            receiver: Receiver {
                stream,
                decoder: FrameDecoder::new(),
                peer,
            },
            inbox: Inbox::default(),
            deadline: Instant::now() + self.config.handshake_timeout,
        })
    }

    /// One bounded read on the pending handshake. A stream that stays silent
    /// past the handshake timeout is dropped.
    fn step_handshake(&mut self) -> Option<LinkEvent> {
        let mut handshake = self.handshake.take()?;
        let peer = handshake.receiver.peer;
        match read_connection_request(&mut handshake.receiver, &handshake.inbox) {
            Ok(true) => match self.approve(handshake) {
                Ok(connection) => {
                    tracing::info!(%peer, "tank connected");
                    self.connection = Some(connection);
                    Some(LinkEvent::TankConnected { peer })
                }
                Err(err) => {
                    tracing::warn!(%peer, error = %err, "refused tank connection");
                    None
                }
            },
            Ok(false) if Instant::now() < handshake.deadline => {
                self.handshake = Some(handshake);
                None
            }
            Ok(false) => {
                tracing::warn!(%peer, "no connection request before the handshake timeout");
                let _ = handshake.receiver.stream.shutdown(Shutdown::Both);
                None
            }
            Err(err) => {
                tracing::warn!(%peer, error = %err, "refused tank connection");
                None
            }
        }
    }

    fn approve(&self, handshake: Handshake) -> Result<Connection, LinkError> {
        let Handshake { receiver, inbox, .. } = handshake;
        let mut writer = receiver.stream.try_clone()?;
        writer.set_write_timeout(Some(non_zero(self.config.handshake_timeout)))?;
        writer.write_all(&encode_control(ControlFrame::ConnectionApproved))?;
        Ok(Connection {
            peer: receiver.peer,
            writer,
            inbox,
            disconnect: Arc::new(AtomicBool::new(false)),
            idle: Some(receiver),
            in_flight: None,
        })
    }

    fn refuse_extra_peers(&mut self) {
        while let Ok((stream, peer)) = self.listener.accept() {
            tracing::warn!(%peer, "a tank is already connected, dropping new connection");
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn step_receiver(&mut self, events: &mut Vec<LinkEvent>) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        if connection
            .in_flight
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
        {
            return;
        }
        if let Some(handle) = connection.in_flight.take() {
            let outcome = handle
                .join()
                .unwrap_or_else(|_| ReceiveOutcome::Lost("receive task panicked".to_string()));
            let peer = connection.peer;
            match outcome {
                ReceiveOutcome::Continue(receiver) => connection.idle = Some(receiver),
                ReceiveOutcome::Lost(reason) => {
                    tracing::warn!(%peer, %reason, "tank connection lost");
                    self.close_connection();
                    events.push(LinkEvent::TankLost { peer, reason });
                    return;
                }
                ReceiveOutcome::Disconnected => {
                    tracing::info!(%peer, "tank disconnected");
                    self.close_connection();
                    events.push(LinkEvent::TankDisconnected { peer });
                    return;
                }
            }
        }

        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        if let Some(receiver) = connection.idle.take() {
            let inbox = Arc::clone(&connection.inbox);
            let disconnect = Arc::clone(&connection.disconnect);
            connection.in_flight = Some(thread::spawn(move || {
                receive_once(receiver, &inbox, &disconnect)
            }));
        }
    }

    fn mark_lost(&mut self, reason: String) {
        if let Some(peer) = self.peer() {
            tracing::warn!(%peer, %reason, "tank connection lost");
            self.close_connection();
            self.pending_events.push(LinkEvent::TankLost { peer, reason });
        }
    }

    fn close_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.writer.shutdown(Shutdown::Both);
        }
    }
}

fn non_zero(timeout: Duration) -> Duration {
    timeout.max(Duration::from_millis(1))
}

/// Reads once. `Ok(true)` when the request arrived; frames that followed
/// it in the same read are queued for delivery.
fn read_connection_request(receiver: &mut Receiver, inbox: &Inbox) -> Result<bool, LinkError> {
    let mut buf = [0u8; READ_CHUNK];
    let read = match receiver.stream.read(&mut buf) {
        Ok(0) => return Err(LinkError::Closed),
        Ok(read) => read,
        Err(err) if is_timeout(&err) || err.kind() == io::ErrorKind::Interrupted => {
            return Ok(false)
        }
        Err(err) => return Err(err.into()),
    };
    let mut frames = receiver.decoder.push(&buf[..read]).into_iter();
    while let Some(frame) = frames.next() {
        match frame? {
            Frame::Control(ControlFrame::ConnectionRequest) => {
                deliver(frames, inbox, receiver.peer);
                return Ok(true);
            }
            Frame::Control(other) => {
                return Err(LinkError::HandshakeRejected {
                    frame: other.as_str().to_string(),
                })
            }
            Frame::Message(text) => return Err(LinkError::HandshakeRejected { frame: text }),
        }
    }
    Ok(false)
}

/// One receive attempt, bounded by the socket's read timeout.
fn receive_once(mut receiver: Receiver, inbox: &Inbox, disconnect: &AtomicBool) -> ReceiveOutcome {
    if disconnect.swap(false, Ordering::SeqCst) {
        let _ = receiver.stream.shutdown(Shutdown::Both);
        return ReceiveOutcome::Disconnected;
    }
    let mut buf = [0u8; READ_CHUNK];
    match receiver.stream.read(&mut buf) {
        Ok(0) => ReceiveOutcome::Lost("connection closed by tank".to_string()),
        Ok(read) => {
            let frames = receiver.decoder.push(&buf[..read]);
            deliver(frames, inbox, receiver.peer);
            ReceiveOutcome::Continue(receiver)
        }
        Err(err) if is_timeout(&err) || err.kind() == io::ErrorKind::Interrupted => {
            ReceiveOutcome::Continue(receiver)
        }
        Err(err) => ReceiveOutcome::Lost(err.to_string()),
    }
}

pub(crate) fn deliver(
    frames: impl IntoIterator<Item = Result<Frame, ProtoError>>,
    inbox: &Inbox,
    peer: SocketAddr,
) {
    let mut queue = lock_inbox(inbox);
    for frame in frames {
        match frame {
            Ok(Frame::Control(ControlFrame::Ping)) => queue.push_back(Inbound::Ping),
            Ok(Frame::Control(control)) => {
                tracing::debug!(%peer, frame = control.as_str(), "ignoring control frame");
            }
            Ok(Frame::Message(text)) => match decode_message::<TankMessage>(&text) {
                Ok(message) => queue.push_back(Inbound::Message(message)),
                Err(err) => tracing::warn!(%peer, error = %err, "dropping malformed tank message"),
            },
            Err(err) => tracing::warn!(%peer, error = %err, "dropping bad frame"),
        }
    }
}
