use std::io;
use thiserror::Error;

// Errors raised while turning bytes into frames or frames into typed messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("frame payload is not valid utf8")]
    InvalidUtf8,

    #[error("unknown message type {0:?}")]
    UnknownTag(String),

    #[error("malformed {tag} message: {reason}")]
    Malformed {
        tag: &'static str,
        reason: &'static str,
    },
}

impl ProtocolError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, ProtocolError::Malformed { .. })
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    // peer closed or reset the stream, or the local side already closed it
    #[error("peer disconnected")]
    Disconnected,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl SessionError {
    pub fn is_disconnected(&self) -> bool {
        matches!(self, SessionError::Disconnected)
    }
}
