//! Fluent builder assembling an [`RpcClient`] (spec §6), grounded on the
//! teacher's `ClientBuilder`/`ClientBuildError` shape.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::client::RpcClient;
use crate::config::retry::RetryPolicy;
use crate::config::{ClientConfig, CodecType};
use crate::registry::Registry;
use crate::selector::SelectorMode;
use crate::transport::{HttpTransport, TcpTransport, Transport};

pub struct ClientBuilder {
    registry: Option<Arc<dyn Registry>>,
    transport: Option<Arc<dyn Transport>>,
    config: ClientConfig,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        ClientBuilder {
            registry: None,
            transport: None,
            config: ClientConfig::default(),
        }
    }

    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Override the dialed transport. Defaults to [`HttpTransport`] for
    /// [`CodecType::JsonRpc`] and [`TcpTransport`] for [`CodecType::Dubbo`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn codec(mut self, codec: CodecType) -> Self {
        self.config.codec = codec;
        self
    }

    pub fn selector_mode(mut self, mode: SelectorMode) -> Self {
        self.config.selector_mode = mode;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.config.dial_timeout = timeout;
        self
    }

    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.pool_size = size;
        self
    }

    pub fn pool_ttl(mut self, ttl: Duration) -> Self {
        self.config.pool_ttl = ttl;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<RpcClient, ClientBuildError> {
        let registry = self.registry.ok_or(ClientBuildError::MissingRegistry)?;

        if self.config.request_timeout.is_zero() {
            return Err(ClientBuildError::InvalidConfig(
                "request_timeout must be non-zero".into(),
            ));
        }
        if self.config.dial_timeout.is_zero() {
            return Err(ClientBuildError::InvalidConfig(
                "dial_timeout must be non-zero".into(),
            ));
        }

        let transport = self.transport.unwrap_or_else(|| match self.config.codec {
            CodecType::JsonRpc => Arc::new(HttpTransport) as Arc<dyn Transport>,
            CodecType::Dubbo => Arc::new(TcpTransport) as Arc<dyn Transport>,
        });

        Ok(RpcClient::new(registry, transport, self.config))
    }
}

#[derive(Error, Debug)]
pub enum ClientBuildError {
    #[error("a registry is required")]
    MissingRegistry,
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;

    #[test]
    fn build_without_registry_fails() {
        let err = ClientBuilder::new().build().unwrap_err();
        assert!(matches!(err, ClientBuildError::MissingRegistry));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let registry = Arc::new(StaticRegistry::new(vec![]));
        let err = ClientBuilder::new()
            .registry(registry)
            .request_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientBuildError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn defaults_pick_http_transport_for_jsonrpc() {
        let registry = Arc::new(StaticRegistry::new(vec![]));
        let client = ClientBuilder::new().registry(registry).build().unwrap();
        drop(client);
    }
}
