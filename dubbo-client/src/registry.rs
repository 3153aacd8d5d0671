//! Registry watcher abstraction (spec §4.6, component C10).
//!
//! The registry backend itself (a hierarchical coordination store such as
//! ZooKeeper) is an external collaborator, out of scope here: only the
//! abstract `list + watch` interface is consumed. This module defines that
//! interface and ships an in-memory test double for callers that don't need
//! a real backend wired in yet.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RpcError;
use crate::service_url::{ServiceConfig, ServiceURL};

/// Re-establish delay after a watcher reports `!valid()`.
pub const REGISTRY_CONN_DELAY: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Add,
    Del,
    Update,
}

#[derive(Clone, Debug)]
pub struct ServiceUrlEvent {
    pub action: Action,
    pub service: ServiceURL,
}

/// Produces a stream of service-URL events. Event ordering is best-effort;
/// a duplicate `Add` for the same URL is idempotent (replace), and `Del` for
/// an unknown URL is a no-op — both are the selector's responsibility to
/// apply that way, not the watcher's.
#[async_trait]
pub trait Watcher: Send {
    async fn next(&mut self) -> Result<ServiceUrlEvent, RpcError>;
    fn valid(&self) -> bool;
    fn stop(&self);
}

#[async_trait]
pub trait Registry: Send + Sync {
    async fn get_services(&self, config: &ServiceConfig) -> Result<Vec<ServiceURL>, RpcError>;
    async fn watch(&self) -> Result<Box<dyn Watcher>, RpcError>;
    fn close(&self);
}

/// An in-memory registry for tests and for callers not yet wired to a real
/// backend. `push_event` feeds the watch stream; `set_services` seeds the
/// initial `get_services` snapshot.
pub struct StaticRegistry {
    services: Mutex<Vec<ServiceURL>>,
    sender: mpsc::UnboundedSender<ServiceUrlEvent>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<ServiceUrlEvent>>>,
    closed: Mutex<bool>,
}

impl StaticRegistry {
    pub fn new(initial: Vec<ServiceURL>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        StaticRegistry {
            services: Mutex::new(initial),
            sender,
            receiver: Mutex::new(Some(receiver)),
            closed: Mutex::new(false),
        }
    }

    pub fn push_event(&self, event: ServiceUrlEvent) {
        match event.action {
            Action::Add | Action::Update => {
                let mut services = self.services.lock().unwrap();
                services.retain(|u| u.raw_url != event.service.raw_url);
                services.push(event.service.clone());
            }
            Action::Del => {
                let mut services = self.services.lock().unwrap();
                services.retain(|u| u.raw_url != event.service.raw_url);
            }
        }
        let _ = self.sender.send(event);
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn get_services(&self, config: &ServiceConfig) -> Result<Vec<ServiceURL>, RpcError> {
        let services = self.services.lock().unwrap();
        Ok(services.iter().filter(|u| config.matches(u)).cloned().collect())
    }

    async fn watch(&self) -> Result<Box<dyn Watcher>, RpcError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| RpcError::internal("registry already watched once"))?;
        Ok(Box::new(StaticWatcher { receiver }))
    }

    fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }
}

struct StaticWatcher {
    receiver: mpsc::UnboundedReceiver<ServiceUrlEvent>,
}

#[async_trait]
impl Watcher for StaticWatcher {
    async fn next(&mut self) -> Result<ServiceUrlEvent, RpcError> {
        self.receiver
            .recv()
            .await
            .ok_or_else(|| RpcError::internal("watcher channel closed"))
    }

    fn valid(&self) -> bool {
        !self.receiver.is_closed()
    }

    fn stop(&self) {
        self.receiver.close();
    }
}
