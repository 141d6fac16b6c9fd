//! Tank side of the link. Every exchange blocks until a message of the
//! expected type arrives.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use planet_map::Direction;
use planet_proto::{
    decode_message, encode_control, encode_message, ControlFrame, Frame, FrameDecoder,
    InternalPlanetUpdate, MothershipMessage, NodeArrivalInfo, RequestResponse, TankMessage,
};

use crate::error::{is_timeout, LinkError};
use crate::tank_link::READ_CHUNK;

const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct MothershipClientConfig {
    pub mothership_addr: String,
    pub retry_interval: Duration,
    /// Zero retries forever.
    pub max_attempts: u32,
    pub handshake_timeout: Duration,
    /// `None` blocks until a response arrives.
    pub response_timeout: Option<Duration>,
}

impl Default for MothershipClientConfig {
    fn default() -> Self {
        Self {
            mothership_addr: "127.0.0.1:65432".to_string(),
            retry_interval: Duration::from_millis(500),
            max_attempts: 0,
            handshake_timeout: Duration::from_secs(2),
            response_timeout: None,
        }
    }
}

impl MothershipClientConfig {
    pub fn new(mothership_addr: impl Into<String>) -> Self {
        Self {
            mothership_addr: mothership_addr.into(),
            ..Self::default()
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }
}

/// Delay before the next connection attempt: doubles from `base` for the
/// first few attempts, capped at five seconds (or `base`, if larger).
pub fn retry_backoff(base: Duration, attempt: u32) -> Duration {
    let exponential = 2_u32.pow(attempt.saturating_sub(1).min(4));
    base.saturating_mul(exponential).min(MAX_RETRY_BACKOFF.max(base))
}

pub struct MothershipClient {
    config: MothershipClientConfig,
    stream: TcpStream,
    decoder: FrameDecoder,
    deferred: VecDeque<Frame>,
    peer: SocketAddr,
}

impl MothershipClient {
    /// Connects and completes the handshake, retrying with backoff until it
    /// succeeds or `max_attempts` is reached.
    pub fn connect(config: MothershipClientConfig) -> Result<Self, LinkError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match Self::try_connect(&config) {
                Ok(client) => {
                    tracing::info!(peer = %client.peer, attempt, "connected to mothership");
                    return Ok(client);
                }
                Err(err) => {
                    if config.max_attempts != 0 && attempt >= config.max_attempts {
                        return Err(LinkError::RetriesExhausted {
                            attempts: attempt,
                            last_error: err.to_string(),
                        });
                    }
                    let delay = retry_backoff(config.retry_interval, attempt);
                    tracing::warn!(
                        addr = %config.mothership_addr,
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "mothership connection failed, retrying"
                    );
                    thread::sleep(delay);
                }
            }
        }
    }

    fn try_connect(config: &MothershipClientConfig) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(&config.mothership_addr)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let mut client = Self {
            config: config.clone(),
            stream,
            decoder: FrameDecoder::new(),
            deferred: VecDeque::new(),
            peer,
        };
        client.handshake()?;
        Ok(client)
    }

    fn handshake(&mut self) -> Result<(), LinkError> {
        self.write_bytes(&encode_control(ControlFrame::ConnectionRequest))?;
        let deadline = Instant::now() + self.config.handshake_timeout;
        match self.read_frame(Some(deadline), "connection_approved") {
            Ok(Frame::Control(ControlFrame::ConnectionApproved)) => Ok(()),
            Ok(Frame::Control(other)) => Err(LinkError::HandshakeRejected {
                frame: other.as_str().to_string(),
            }),
            Ok(Frame::Message(text)) => Err(LinkError::HandshakeRejected { frame: text }),
            Err(LinkError::ResponseTimedOut { .. }) => Err(LinkError::HandshakeTimedOut),
            Err(err) => Err(err),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Pings the mothership and returns the round-trip time. Messages that
    /// arrive before the pong are kept for the next receive.
    pub fn check_alive(&mut self) -> Result<Duration, LinkError> {
        let started = Instant::now();
        self.write_bytes(&encode_control(ControlFrame::Ping))?;
        let deadline = started + self.config.handshake_timeout;
        let mut held = Vec::new();
        let result = loop {
            match self.read_frame(Some(deadline), "pong") {
                Ok(Frame::Control(ControlFrame::Pong)) => break Ok(started.elapsed()),
                Ok(frame) => held.push(frame),
                Err(err) => break Err(err),
            }
        };
        for frame in held.into_iter().rev() {
            self.deferred.push_front(frame);
        }
        result
    }

    pub fn send(&mut self, message: &TankMessage) -> Result<(), LinkError> {
        let bytes = encode_message(message)?;
        self.write_bytes(&bytes)?;
        tracing::debug!(kind = message.kind(), "sent tank message");
        Ok(())
    }

    pub fn send_node_arrival(&mut self) -> Result<(), LinkError> {
        self.send(&TankMessage::NodeArrival)
    }

    pub fn send_path_chosen(&mut self, direction: Direction) -> Result<(), LinkError> {
        self.send(&TankMessage::PathChosen { direction })
    }

    pub fn send_internal_planet_update(
        &mut self,
        update: InternalPlanetUpdate,
    ) -> Result<(), LinkError> {
        self.send(&TankMessage::InternalPlanet(update))
    }

    pub fn send_path_blocked(&mut self) -> Result<(), LinkError> {
        self.send(&TankMessage::PathBlocked)
    }

    pub fn send_finished_exploring(&mut self) -> Result<(), LinkError> {
        self.send(&TankMessage::FinishedExploring)
    }

    pub fn send_stuck(&mut self) -> Result<(), LinkError> {
        self.send(&TankMessage::Stuck)
    }

    /// Blocks until the mothership signals the start of exploration. The
    /// response timeout does not apply here.
    pub fn wait_for_start(&mut self) -> Result<(), LinkError> {
        self.expect("start", None, |message| match message {
            MothershipMessage::Start => Ok(()),
            other => Err(other),
        })
    }

    pub fn get_node_arrival_response(&mut self) -> Result<NodeArrivalInfo, LinkError> {
        let deadline = self.response_deadline();
        self.expect("arrival_response", deadline, |message| match message {
            MothershipMessage::ArrivalResponse(info) => Ok(info),
            other => Err(other),
        })
    }

    pub fn get_path_chosen_response(&mut self) -> Result<RequestResponse, LinkError> {
        let deadline = self.response_deadline();
        self.expect("path_chosen_response", deadline, |message| match message {
            MothershipMessage::PathChosenResponse { request_response } => Ok(request_response),
            other => Err(other),
        })
    }

    /// The next well-formed message of any type.
    pub fn next_message(&mut self) -> Result<MothershipMessage, LinkError> {
        let deadline = self.response_deadline();
        self.next_message_until(deadline, "message")
    }

    fn response_deadline(&self) -> Option<Instant> {
        self.config
            .response_timeout
            .map(|timeout| Instant::now() + timeout)
    }

    fn expect<T>(
        &mut self,
        waiting_for: &'static str,
        deadline: Option<Instant>,
        mut pick: impl FnMut(MothershipMessage) -> Result<T, MothershipMessage>,
    ) -> Result<T, LinkError> {
        loop {
            match self.next_message_until(deadline, waiting_for)? {
                MothershipMessage::Error { msg } => {
                    tracing::error!(%msg, waiting_for, "mothership reported an error");
                    return Err(LinkError::Rejected { msg });
                }
                message => match pick(message) {
                    Ok(value) => return Ok(value),
                    Err(other) => {
                        tracing::warn!(kind = other.kind(), waiting_for, "ignoring unexpected message");
                    }
                },
            }
        }
    }

    fn next_message_until(
        &mut self,
        deadline: Option<Instant>,
        waiting_for: &'static str,
    ) -> Result<MothershipMessage, LinkError> {
        loop {
            match self.read_frame(deadline, waiting_for)? {
                Frame::Control(ControlFrame::Ping) => {
                    self.write_bytes(&encode_control(ControlFrame::Pong))?;
                }
                Frame::Control(other) => {
                    tracing::debug!(frame = other.as_str(), "ignoring control frame");
                }
                Frame::Message(text) => match decode_message::<MothershipMessage>(&text) {
                    Ok(message) => {
                        tracing::debug!(kind = message.kind(), "received mothership message");
                        return Ok(message);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping malformed mothership message");
                    }
                },
            }
        }
    }

    fn read_frame(
        &mut self,
        deadline: Option<Instant>,
        waiting_for: &'static str,
    ) -> Result<Frame, LinkError> {
        if let Some(frame) = self.deferred.pop_front() {
            return Ok(frame);
        }
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let timeout = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(LinkError::ResponseTimedOut { waiting_for });
                    }
                    Some(deadline - now)
                }
                None => None,
            };
            self.stream.set_read_timeout(timeout)?;
            let read = match self.stream.read(&mut buf) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(read) => read,
                Err(err) if is_timeout(&err) || err.kind() == io::ErrorKind::Interrupted => {
                    continue
                }
                Err(err) => return Err(err.into()),
            };
            for frame in self.decoder.push(&buf[..read]) {
                match frame {
                    Ok(frame) => self.deferred.push_back(frame),
                    Err(err) => tracing::warn!(error = %err, "dropping bad frame"),
                }
            }
            if let Some(frame) = self.deferred.pop_front() {
                return Ok(frame);
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }
}
