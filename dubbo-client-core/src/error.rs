//! Wire-independent error taxonomy (spec §7).

use thiserror::Error;

/// The five error kinds a call can fail with, each carrying an HTTP-like
/// numeric class for interop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Code {
    /// Registry lookup returned no provider for the service config.
    NotFound,
    /// Context deadline exceeded or cancellation.
    Timeout,
    /// Serialization failure, pool failure, transport handshake failure.
    Internal,
    /// The peer returned a well-formed error envelope.
    Remote,
    /// Magic mismatch, truncated header/body, unknown tag, bad back-reference.
    ProtocolViolation,
}

impl Code {
    /// HTTP-like numeric class for interop, per spec §7.
    pub fn class(&self) -> u16 {
        match self {
            Code::NotFound => 404,
            Code::Timeout => 408,
            Code::Internal => 500,
            Code::Remote => 500,
            Code::ProtocolViolation => 500,
        }
    }

    /// Timeout and NotFound are terminal; everything else is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Code::Timeout | Code::NotFound)
    }
}

/// A codec-level failure: a malformed frame, an unsupported argument shape,
/// or a tag the decoder does not recognize.
#[derive(Error, Debug, Clone)]
pub enum CodecError {
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("unsupported param type: {0}")]
    UnsupportedParamType(String),
    #[error("unknown response id: {0}")]
    UnknownResponseId(i64),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("frame too large: {len} bytes exceeds max {max}")]
    FrameTooLarge { len: usize, max: usize },
}

impl CodecError {
    pub fn code(&self) -> Code {
        match self {
            CodecError::Protocol(_) => Code::ProtocolViolation,
            CodecError::UnsupportedParamType(_) => Code::Internal,
            CodecError::UnknownResponseId(_) => Code::ProtocolViolation,
            CodecError::Remote(_) => Code::Remote,
            CodecError::FrameTooLarge { .. } => Code::Internal,
        }
    }
}
