//! Client-facing error type (spec §7), grounded on `dubbo_client_core::Code`.

use dubbo_client_core::{Code, CodecError};
use thiserror::Error;

/// The error a `Call` can fail with. Carries the wire-independent [`Code`]
/// plus a human-readable message, and preserves the peer's verbatim text for
/// [`Code::Remote`].
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    #[error("no provider available for service config")]
    NotFound,
    #[error("call timed out")]
    Timeout,
    #[error("internal error: {0}")]
    Internal(String),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl RpcError {
    pub fn code(&self) -> Code {
        match self {
            RpcError::NotFound => Code::NotFound,
            RpcError::Timeout => Code::Timeout,
            RpcError::Internal(_) => Code::Internal,
            RpcError::Remote(_) => Code::Remote,
            RpcError::ProtocolViolation(_) => Code::ProtocolViolation,
        }
    }

    /// Timeout and NotFound are terminal; everything else is retryable
    /// (spec §7 propagation policy).
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        RpcError::Internal(msg.into())
    }
}

impl From<CodecError> for RpcError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Protocol(msg) => RpcError::ProtocolViolation(msg),
            CodecError::UnsupportedParamType(msg) => RpcError::Internal(msg),
            CodecError::UnknownResponseId(id) => {
                RpcError::ProtocolViolation(format!("unknown response id: {id}"))
            }
            CodecError::Remote(msg) => RpcError::Remote(msg),
            CodecError::FrameTooLarge { len, max } => {
                RpcError::Internal(format!("frame too large: {len} bytes exceeds max {max}"))
            }
        }
    }
}

impl From<std::io::Error> for RpcError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            RpcError::Timeout
        } else {
            RpcError::Internal(e.to_string())
        }
    }
}
