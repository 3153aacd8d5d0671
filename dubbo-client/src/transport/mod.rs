//! Transport layer: two interchangeable transports sharing one `Client`
//! contract (spec §4.3, components C5/C6).

mod http;
mod tcp;

pub use http::HttpTransport;
pub use tcp::TcpTransport;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RpcError;

/// The opaque byte container shuttled across a transport. The HTTP transport
/// maps `header` to HTTP headers; the TCP transport ignores `header` — all
/// its framing lives in `body` (spec §3).
#[derive(Clone, Debug, Default)]
pub struct Package {
    pub header: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// One live connection to a provider.
#[async_trait]
pub trait Client: Send {
    async fn send(&mut self, pkg: &Package) -> Result<(), RpcError>;

    /// `want` is a read-size hint: the TCP transport reads exactly `want`
    /// bytes (the caller knows the Dubbo header is 16 bytes, then the body
    /// length the header reports). The HTTP transport ignores it and parses
    /// its own `Content-Length` framing, returning the full response body.
    async fn recv(&mut self, want: usize) -> Result<Package, RpcError>;

    async fn close(&mut self) -> Result<(), RpcError>;
}

/// Dials a [`Client`] against an address. Both transports implement
/// deadlines by setting the underlying socket's read/write deadline before
/// I/O and clearing it after; a zero `Timeout` means no deadline (spec
/// §4.3.3).
///
/// `persistent` tells the transport whether the dialed connection is about
/// to be handed to the [`crate::pool::Pool`] for reuse (pooling enabled) or
/// will be used for exactly one call and then closed. The TCP transport
/// ignores it — a Dubbo socket is always reusable. The HTTP transport uses
/// it to pick `Connection: keep-alive` vs. the one-shot revision's
/// `Connection: close` (spec §4.3.1): sending `close` on a connection the
/// pool intends to reuse would hand the next borrower a socket the peer has
/// already torn down.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dial(
        &self,
        addr: &str,
        dial_timeout: Duration,
        persistent: bool,
    ) -> Result<Box<dyn Client>, RpcError>;

    fn name(&self) -> &'static str;
}
