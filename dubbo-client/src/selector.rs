//! Pluggable load-balancing strategy driven by a registry watcher (spec
//! §4.5/§4.6, component C9).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;

use crate::error::RpcError;
use crate::registry::{Action, Registry, REGISTRY_CONN_DELAY};
use crate::service_url::{ServiceConfig, ServiceURL};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectorMode {
    Random,
    RoundRobin,
}

impl Default for SelectorMode {
    fn default() -> Self {
        SelectorMode::Random
    }
}

/// Picks one provider for a given request id. Stateless across calls except
/// for the round-robin counter.
pub type Next = Box<dyn Fn(i64) -> Result<ServiceURL, RpcError> + Send + Sync>;

type MarkHook = Arc<dyn Fn(&ServiceConfig, &ServiceURL, &RpcError) + Send + Sync>;

struct CacheEntry {
    services: Vec<ServiceURL>,
}

/// Maintains a per-[`ServiceConfig`] provider list, kept current by a
/// background task draining the registry's watch stream, and exposes
/// [`select`](Selector::select) implementing the chosen policy.
pub struct Selector {
    mode: SelectorMode,
    registry: Arc<dyn Registry>,
    cache: Arc<Mutex<HashMap<ServiceConfig, CacheEntry>>>,
    rng: Arc<Mutex<StdRng>>,
    round_robin_counter: Arc<AtomicI64>,
    mark_hook: Option<MarkHook>,
    closed: Arc<AtomicBool>,
    watch_task: Option<JoinHandle<()>>,
}

impl Selector {
    pub fn new(mode: SelectorMode, registry: Arc<dyn Registry>) -> Self {
        let cache: Arc<Mutex<HashMap<ServiceConfig, CacheEntry>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let watch_task = tokio::spawn(Self::watch_loop(
            registry.clone(),
            cache.clone(),
            closed.clone(),
        ));

        Selector {
            mode,
            registry,
            cache,
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
            round_robin_counter: Arc::new(AtomicI64::new(0)),
            mark_hook: None,
            closed,
            watch_task: Some(watch_task),
        }
    }

    /// Install a hook invoked after a failed attempt against a provider; a
    /// no-op by default (spec §9 Open Question (i)). Reserved for future
    /// ejection policies.
    pub fn with_mark_hook(mut self, hook: MarkHook) -> Self {
        self.mark_hook = Some(hook);
        self
    }

    pub fn mark(&self, config: &ServiceConfig, url: &ServiceURL, err: &RpcError) {
        if let Some(hook) = &self.mark_hook {
            hook(config, url, err);
        }
    }

    async fn watch_loop(
        registry: Arc<dyn Registry>,
        cache: Arc<Mutex<HashMap<ServiceConfig, CacheEntry>>>,
        closed: Arc<AtomicBool>,
    ) {
        while !closed.load(Ordering::Acquire) {
            let mut watcher = match registry.watch().await {
                Ok(w) => w,
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %_err, "registry watch failed, retrying after delay");
                    tokio::time::sleep(REGISTRY_CONN_DELAY).await;
                    continue;
                }
            };

            while watcher.valid() && !closed.load(Ordering::Acquire) {
                let event = match watcher.next().await {
                    Ok(e) => e,
                    Err(_err) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(error = %_err, "registry watcher stream ended, re-establishing");
                        break;
                    }
                };
                let mut cache = cache.lock().unwrap();
                for (config, entry) in cache.iter_mut() {
                    if !config.matches(&event.service) {
                        continue;
                    }
                    entry
                        .services
                        .retain(|u| u.raw_url != event.service.raw_url);
                    if matches!(event.action, Action::Add | Action::Update) {
                        entry.services.push(event.service.clone());
                    }
                }
            }

            if !closed.load(Ordering::Acquire) {
                tokio::time::sleep(REGISTRY_CONN_DELAY).await;
            }
        }
    }

    async fn ensure_cached(&self, config: &ServiceConfig) -> Result<(), RpcError> {
        if self.cache.lock().unwrap().contains_key(config) {
            return Ok(());
        }
        let services = self.registry.get_services(config).await?;
        self.cache
            .lock()
            .unwrap()
            .entry(config.clone())
            .or_insert(CacheEntry { services });
        Ok(())
    }

    /// Resolve the `Next` function for a service config, per the configured
    /// policy. Returns `NotFound` (modeled as [`RpcError::NotFound`]) when the
    /// provider list is empty.
    pub async fn select(&self, config: &ServiceConfig) -> Result<Next, RpcError> {
        self.ensure_cached(config).await?;
        let services = {
            let cache = self.cache.lock().unwrap();
            cache.get(config).expect("just cached").services.clone()
        };
        if services.is_empty() {
            return Err(RpcError::NotFound);
        }

        Ok(match self.mode {
            SelectorMode::Random => random_next(services, self.rng.clone()),
            SelectorMode::RoundRobin => round_robin_next(services, self.round_robin_counter.clone()),
        })
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(task) = &self.watch_task {
            task.abort();
        }
        self.registry.close();
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        self.close();
    }
}

fn random_next(services: Vec<ServiceURL>, rng: Arc<Mutex<StdRng>>) -> Next {
    Box::new(move |req_id: i64| {
        if services.is_empty() {
            return Err(RpcError::NotFound);
        }
        let r: i64 = rng.lock().unwrap().random();
        let idx = (r.wrapping_add(req_id)).rem_euclid(services.len() as i64) as usize;
        Ok(services[idx].clone())
    })
}

fn round_robin_next(services: Vec<ServiceURL>, counter: Arc<AtomicI64>) -> Next {
    Box::new(move |req_id: i64| {
        if services.is_empty() {
            return Err(RpcError::NotFound);
        }
        let i = counter.fetch_add(1, Ordering::SeqCst);
        let idx = (req_id.wrapping_add(i)).rem_euclid(services.len() as i64) as usize;
        Ok(services[idx].clone())
    })
}
