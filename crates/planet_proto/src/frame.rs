//! Newline-delimited framing. Every frame is one line: either a bare
//! control token (handshake and liveness) or one JSON object.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ProtoError;

/// Frames larger than this are discarded as a protocol violation.
pub const MAX_FRAME_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlFrame {
    ConnectionRequest,
    ConnectionApproved,
    Ping,
    Pong,
}

impl ControlFrame {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlFrame::ConnectionRequest => "connection_request",
            ControlFrame::ConnectionApproved => "connection_approved",
            ControlFrame::Ping => "ping",
            ControlFrame::Pong => "pong",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "connection_request" => Some(ControlFrame::ConnectionRequest),
            "connection_approved" => Some(ControlFrame::ConnectionApproved),
            "ping" => Some(ControlFrame::Ping),
            "pong" => Some(ControlFrame::Pong),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Control(ControlFrame),
    /// Raw JSON text of one message; decode with [`decode_message`].
    Message(String),
}

pub fn encode_control(control: ControlFrame) -> Vec<u8> {
    let mut bytes = control.as_str().as_bytes().to_vec();
    bytes.push(b'\n');
    bytes
}

pub fn encode_message<M: Serialize>(message: &M) -> Result<Vec<u8>, ProtoError> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn decode_message<M: DeserializeOwned>(text: &str) -> Result<M, ProtoError> {
    Ok(serde_json::from_str(text)?)
}

fn parse_line(line: &[u8]) -> Result<Option<Frame>, ProtoError> {
    let text = std::str::from_utf8(line).map_err(|err| ProtoError::Utf8(err.to_string()))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.starts_with('{') {
        return Ok(Some(Frame::Message(trimmed.to_string())));
    }
    ControlFrame::parse(trimmed)
        .map(|control| Some(Frame::Control(control)))
        .ok_or_else(|| ProtoError::UnexpectedFrame {
            frame: trimmed.chars().take(64).collect(),
        })
}

/// Reassembles frames from arbitrarily split reads.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    /// Set after an oversized line was cut; bytes up to its newline are dropped.
    discarding: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes received but not yet terminated by a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feeds raw bytes and returns every complete frame, in order. Bad
    /// frames are returned as errors without affecting later ones.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<Frame, ProtoError>> {
        self.pending.extend_from_slice(bytes);
        let mut frames = Vec::new();
        if self.discarding {
            match self.pending.iter().position(|byte| *byte == b'\n') {
                Some(newline) => {
                    self.pending.drain(..=newline);
                    self.discarding = false;
                }
                None => {
                    self.pending.clear();
                    return frames;
                }
            }
        }
        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            match parse_line(&line) {
                Ok(Some(frame)) => frames.push(Ok(frame)),
                Ok(None) => {}
                Err(err) => frames.push(Err(err)),
            }
        }
        if self.pending.len() > MAX_FRAME_BYTES {
            let size = self.pending.len();
            self.pending.clear();
            self.discarding = true;
            frames.push(Err(ProtoError::FrameTooLarge { size }));
        }
        frames
    }
}
