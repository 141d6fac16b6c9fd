use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    Serde(String),
    Utf8(String),
    UnexpectedFrame { frame: String },
    FrameTooLarge { size: usize },
}

impl fmt::Display for ProtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtoError::Serde(message) => write!(f, "malformed message: {message}"),
            ProtoError::Utf8(message) => write!(f, "frame is not utf-8: {message}"),
            ProtoError::UnexpectedFrame { frame } => write!(f, "unexpected frame: {frame}"),
            ProtoError::FrameTooLarge { size } => {
                write!(f, "frame exceeds limit ({size} bytes buffered)")
            }
        }
    }
}

impl std::error::Error for ProtoError {}

impl From<serde_json::Error> for ProtoError {
    fn from(err: serde_json::Error) -> Self {
        ProtoError::Serde(err.to_string())
    }
}
