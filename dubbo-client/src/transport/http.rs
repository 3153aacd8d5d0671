//! One-shot HTTP/1.1 `POST` over a raw TCP socket (spec §4.3.1).

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{Client, Package, Transport};
use crate::error::RpcError;

#[derive(Default)]
pub struct HttpTransport;

#[async_trait]
impl Transport for HttpTransport {
    async fn dial(
        &self,
        addr: &str,
        dial_timeout: Duration,
        persistent: bool,
    ) -> Result<Box<dyn Client>, RpcError> {
        let stream = tokio::time::timeout(dial_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| RpcError::Timeout)??;
        Ok(Box::new(HttpClient {
            stream,
            addr: addr.to_string(),
            persistent,
        }))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Deadlines are enforced by the call orchestrator wrapping the whole
/// send/recv round trip in `tokio::time::timeout` (spec §4.3.3's "set the
/// read deadline before I/O, clear it after", expressed the `tokio` way —
/// the deadline is cleared for free when the timed future is dropped).
pub struct HttpClient {
    stream: TcpStream,
    addr: String,
    /// `true` when this connection was dialed for the pool and should stay
    /// open for the next borrower rather than advertise `Connection: close`.
    persistent: bool,
}

#[async_trait]
impl Client for HttpClient {
    async fn send(&mut self, pkg: &Package) -> Result<(), RpcError> {
        let path = pkg
            .header
            .get("__path")
            .cloned()
            .unwrap_or_else(|| "/".to_string());

        let connection = if self.persistent { "keep-alive" } else { "close" };
        let mut request = format!(
            "POST {path} HTTP/1.1\r\nHost: {host}\r\nContent-Length: {len}\r\nConnection: {connection}\r\n",
            path = path,
            host = self.addr,
            len = pkg.body.len()
        );
        for (k, v) in &pkg.header {
            if k == "__path" {
                continue;
            }
            request.push_str(&format!("{k}: {v}\r\n"));
        }
        request.push_str("\r\n");

        self.stream.write_all(request.as_bytes()).await?;
        self.stream.write_all(&pkg.body).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn recv(&mut self, _want: usize) -> Result<Package, RpcError> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(RpcError::internal("connection closed before response"));
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find_header_end(&buf) {
                break pos;
            }
        };

        let header_text = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut lines = header_text.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let status = parse_status(status_line)?;

        let content_length = lines
            .filter_map(|l| l.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let body_start = header_end + 4;
        while buf.len() < body_start + content_length {
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = buf[body_start..(body_start + content_length).min(buf.len())].to_vec();

        if status != 200 {
            return Err(RpcError::Internal(format!(
                "http status {status}: {}",
                String::from_utf8_lossy(&body)
            )));
        }
        Ok(Package {
            header: Default::default(),
            body,
        })
    }

    async fn close(&mut self) -> Result<(), RpcError> {
        self.stream.shutdown().await.map_err(RpcError::from)
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_status(status_line: &str) -> Result<u16, RpcError> {
    status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RpcError::ProtocolViolation(format!("bad status line: {status_line}")))
}
