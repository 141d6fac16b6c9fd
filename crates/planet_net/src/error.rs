use std::fmt;
use std::io;
use std::net::SocketAddr;

use planet_proto::ProtoError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    Io(String),
    Proto(ProtoError),
    HandshakeRejected { frame: String },
    HandshakeTimedOut,
    PeerNotAllowed { peer: SocketAddr },
    NotConnected,
    Closed,
    ResponseTimedOut { waiting_for: &'static str },
    /// The mothership answered with an `error` message.
    Rejected { msg: String },
    RetriesExhausted { attempts: u32, last_error: String },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Io(message) => write!(f, "io error: {message}"),
            LinkError::Proto(err) => write!(f, "protocol error: {err}"),
            LinkError::HandshakeRejected { frame } => {
                write!(f, "handshake rejected, got `{frame}`")
            }
            LinkError::HandshakeTimedOut => write!(f, "handshake timed out"),
            LinkError::PeerNotAllowed { peer } => write!(f, "peer {peer} is not allowed"),
            LinkError::NotConnected => write!(f, "no tank connected"),
            LinkError::Closed => write!(f, "connection closed by peer"),
            LinkError::ResponseTimedOut { waiting_for } => {
                write!(f, "timed out waiting for {waiting_for}")
            }
            LinkError::Rejected { msg } => write!(f, "mothership reported an error: {msg}"),
            LinkError::RetriesExhausted {
                attempts,
                last_error,
            } => write!(f, "gave up after {attempts} connection attempts: {last_error}"),
        }
    }
}

impl std::error::Error for LinkError {}

impl From<io::Error> for LinkError {
    fn from(err: io::Error) -> Self {
        LinkError::Io(err.to_string())
    }
}

impl From<ProtoError> for LinkError {
    fn from(err: ProtoError) -> Self {
        LinkError::Proto(err)
    }
}

pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
