//! Wire types shared by the dubbo consumer runtime.
//!
//! This crate provides the codec-independent [`Message`] type and the two wire
//! codecs used to talk to a Dubbo provider: a JSON-RPC 2.0 text codec
//! ([`jsonrpc`]) and the Dubbo binary codec ([`dubbo`]), plus the Hessian
//! object serialization ([`hessian`]) the Dubbo codec encodes its body with.
//!
//! ## Modules
//!
//! - [`bytes_ext`]: fixed-width big-endian pack/unpack helpers
//! - [`hessian`]: tag-driven Hessian encoder/decoder
//! - [`message`]: the codec-independent [`Message`] intermediate
//! - [`jsonrpc`]: JSON-RPC 2.0 request/response codec
//! - [`dubbo`]: Dubbo binary header + Hessian body codec
//! - [`error`]: the [`Code`]/[`CodecError`] taxonomy

pub mod bytes_ext;
pub mod dubbo;
pub mod error;
pub mod hessian;
pub mod jsonrpc;
pub mod message;

pub use error::{Code, CodecError};
pub use message::{Message, MessageType};
