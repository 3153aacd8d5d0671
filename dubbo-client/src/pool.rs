//! Per `(address, protocol)` LIFO connection cache with TTL eviction (spec
//! §4.4, component C7), grounded on the reference `rpc_pool.go`'s `getConn`/
//! `release` shape.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::RpcError;
use crate::transport::{Client, Transport};

/// `{transport client, created-at, one-shot close latch}`. The pool owns
/// idle entries; a borrower has exclusive use until release.
pub struct PoolEntry {
    client: Box<dyn Client>,
    created_at: Instant,
    closed: AtomicBool,
}

impl PoolEntry {
    fn new(client: Box<dyn Client>) -> Self {
        PoolEntry {
            client,
            created_at: Instant::now(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn client_mut(&mut self) -> &mut (dyn Client + 'static) {
        self.client.as_mut()
    }

    /// Idempotent: guarantees at-most-once real close even if called twice,
    /// e.g. by a caller that both evicts and error-releases the same entry.
    async fn close(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.client.close().await;
    }
}

/// Per `(address, protocol)` LIFO cache of live transport clients with TTL
/// and capacity (spec §4.4). The single lock protects only map/list
/// manipulation; dialing and closing happen outside it.
pub struct Pool {
    size: usize,
    ttl: Duration,
    conns: Mutex<HashMap<String, Vec<PoolEntry>>>,
}

fn key(addr: &str, protocol: &str) -> String {
    format!("{addr}@{protocol}")
}

impl Pool {
    pub fn new(size: usize, ttl: Duration) -> Self {
        Pool {
            size,
            ttl,
            conns: Mutex::new(HashMap::new()),
        }
    }

    /// `size == 0` disables pooling: every `get_conn` dials fresh and every
    /// `release` closes immediately.
    pub fn enabled(&self) -> bool {
        self.size > 0
    }

    pub async fn get_conn(
        &self,
        protocol: &str,
        addr: &str,
        transport: &dyn Transport,
        dial_timeout: Duration,
    ) -> Result<PoolEntry, RpcError> {
        if !self.enabled() {
            return Ok(PoolEntry::new(
                transport.dial(addr, dial_timeout, false).await?,
            ));
        }

        let k = key(addr, protocol);
        let (found, mut evicted) = {
            let mut conns = self.conns.lock().unwrap();
            let list = conns.entry(k).or_default();
            let mut found = None;
            let mut evicted = Vec::new();
            while let Some(entry) = list.pop() {
                if entry.created_at.elapsed() <= self.ttl {
                    found = Some(entry);
                    break;
                }
                evicted.push(entry);
            }
            (found, evicted)
        };

        #[cfg(feature = "tracing")]
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), addr, protocol, "evicting stale pool entries past ttl");
        }
        for entry in evicted.iter_mut() {
            entry.close().await;
        }

        if let Some(entry) = found {
            return Ok(entry);
        }

        Ok(PoolEntry::new(
            transport.dial(addr, dial_timeout, true).await?,
        ))
    }

    pub async fn release(
        &self,
        protocol: &str,
        addr: &str,
        mut entry: PoolEntry,
        err: Option<&RpcError>,
    ) {
        if err.is_some() || !self.enabled() {
            entry.close().await;
            return;
        }

        let k = key(addr, protocol);
        let overflow = {
            let mut conns = self.conns.lock().unwrap();
            let list = conns.entry(k).or_default();
            if list.len() >= self.size {
                Some(entry)
            } else {
                list.push(entry);
                None
            }
        };
        if let Some(mut entry) = overflow {
            entry.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Package;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    struct CountingTransport {
        dials: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    struct FakeClient {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Client for FakeClient {
        async fn send(&mut self, _pkg: &Package) -> Result<(), RpcError> {
            Ok(())
        }
        async fn recv(&mut self, _want: usize) -> Result<Package, RpcError> {
            Ok(Package::default())
        }
        async fn close(&mut self) -> Result<(), RpcError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn dial(
            &self,
            _addr: &str,
            _t: Duration,
            _persistent: bool,
        ) -> Result<Box<dyn Client>, RpcError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeClient {
                closes: self.closes.clone(),
            }))
        }
        fn name(&self) -> &'static str {
            "fake"
        }
    }

    #[tokio::test]
    async fn reuses_entry_within_ttl() {
        let dials = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = CountingTransport {
            dials: dials.clone(),
            closes: closes.clone(),
        };
        let pool = Pool::new(4, Duration::from_secs(60));

        let entry = pool
            .get_conn("jsonrpc", "127.0.0.1:9000", &transport, Duration::from_secs(1))
            .await
            .unwrap();
        pool.release("jsonrpc", "127.0.0.1:9000", entry, None).await;

        let _entry2 = pool
            .get_conn("jsonrpc", "127.0.0.1:9000", &transport, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn error_release_closes_exactly_once() {
        let dials = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = CountingTransport { dials, closes: closes.clone() };
        let pool = Pool::new(4, Duration::from_secs(60));

        let entry = pool
            .get_conn("jsonrpc", "127.0.0.1:9000", &transport, Duration::from_secs(1))
            .await
            .unwrap();
        pool.release(
            "jsonrpc",
            "127.0.0.1:9000",
            entry,
            Some(&RpcError::Internal("boom".into())),
        )
        .await;

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn entry_past_ttl_is_never_returned() {
        let dials = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = CountingTransport { dials: dials.clone(), closes };
        let pool = Pool::new(4, Duration::from_millis(1));

        let entry = pool
            .get_conn("jsonrpc", "127.0.0.1:9000", &transport, Duration::from_secs(1))
            .await
            .unwrap();
        pool.release("jsonrpc", "127.0.0.1:9000", entry, None).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let _entry2 = pool
            .get_conn("jsonrpc", "127.0.0.1:9000", &transport, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(dials.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_pool_dials_every_time() {
        let dials = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = CountingTransport { dials: dials.clone(), closes };
        let pool = Pool::new(0, Duration::from_secs(60));

        let entry = pool
            .get_conn("jsonrpc", "127.0.0.1:9000", &transport, Duration::from_secs(1))
            .await
            .unwrap();
        pool.release("jsonrpc", "127.0.0.1:9000", entry, None).await;
        let _entry2 = pool
            .get_conn("jsonrpc", "127.0.0.1:9000", &transport, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(dials.load(Ordering::SeqCst), 2);
    }
}
