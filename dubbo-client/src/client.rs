//! Central call orchestration (spec §4.1, component C11): select a
//! provider, borrow a pooled connection, round-trip through the configured
//! codec, and retry on retryable failures.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dubbo_client_core::dubbo::{self, DecodedResponse as DubboDecodedResponse, RequestParts};
use dubbo_client_core::hessian::Value;
use dubbo_client_core::jsonrpc::{JsonRpcCodec, Params};
use dubbo_client_core::message::Message;
use serde_json::Value as Json;

use crate::builder::ClientBuilder;
use crate::config::{ClientConfig, CodecType};
use crate::error::RpcError;
use crate::pool::Pool;
use crate::registry::Registry;
use crate::selector::{Next, Selector};
use crate::service_url::{ServiceConfig, ServiceURL};
use crate::transport::{Client, Package, Transport};
use crate::request::{CallOptions, Request};

/// The decoded call result, shaped by which codec answered it.
#[derive(Clone, Debug)]
pub enum CallResult {
    Json(Json),
    Hessian(Value),
}

/// A ready-to-use consumer-side RPC client: one registry, one selector, one
/// connection pool, one transport.
pub struct RpcClient {
    selector: Arc<Selector>,
    pool: Pool,
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    next_id: AtomicI64,
}

enum AttemptError {
    NoProvider(RpcError),
    Failed { url: ServiceURL, err: RpcError },
}

impl RpcClient {
    pub(crate) fn new(registry: Arc<dyn Registry>, transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let selector = Arc::new(Selector::new(config.selector_mode, registry));
        let pool = Pool::new(config.pool_size, config.pool_ttl);
        RpcClient {
            selector,
            pool,
            transport,
            config,
            next_id: AtomicI64::new(1),
        }
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    fn next_request_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Run one call to completion: merge options, select a provider, and
    /// retry sequentially on retryable failures (spec §4.1).
    pub async fn call(&self, request: &Request, opts: CallOptions) -> Result<CallResult, RpcError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "rpc.call",
            rpc.interface = %request.interface,
            rpc.method = %request.method,
            rpc.protocol = %request.protocol,
            otel.kind = "client",
        )
        .entered();

        let timeout = opts.timeout.unwrap_or(self.config.request_timeout);
        // a `Call` always makes at least one attempt even if `retries` is
        // misconfigured to 0.
        let retries = opts.retries.unwrap_or(self.config.retries).max(1);

        let service_config = ServiceConfig::new(
            request.protocol.clone(),
            request.interface.clone(),
            request.group.clone(),
            request.version.clone(),
        );

        let next: Next = match opts.next {
            Some(next) => next,
            None => self.selector.select(&service_config).await?,
        };

        let mut backoff = self.config.retry_policy.as_ref().map(|p| p.backoff());
        let mut last_err: Option<RpcError> = None;

        // spec §4.1 step 1: one id per `Call`, reused across every attempt.
        let request_id = self.next_request_id();

        // `retries` is the total attempt budget, not extra attempts after
        // the first (spec §6).
        for attempt in 0..retries {
            match self.try_once(request, &next, request_id, timeout).await {
                Ok(value) => return Ok(value),
                Err(AttemptError::NoProvider(err)) => {
                    return Err(err);
                }
                Err(AttemptError::Failed { url, err }) => {
                    self.selector.mark(&service_config, &url, &err);
                    if !err.is_retryable() || attempt + 1 == retries {
                        return Err(err);
                    }
                    if let Some(backoff) = backoff.as_mut() {
                        tokio::time::sleep(backoff.next_delay()).await;
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| RpcError::internal("retries exhausted with no recorded error")))
    }

    async fn try_once(
        &self,
        request: &Request,
        next: &Next,
        request_id: i64,
        timeout: Duration,
    ) -> Result<CallResult, AttemptError> {
        let url = next(request_id).map_err(AttemptError::NoProvider)?;
        let addr = url.address();
        // spec §4.1 step 6: the provider's own `timeout` query caps the
        // caller's budget for this one attempt, never extends it.
        let req_timeout = match url.timeout_ms() {
            Some(ms) if ms > 0 => timeout.min(Duration::from_millis(ms)),
            _ => timeout,
        };
        match self.attempt(request, request_id, req_timeout, &url, &addr).await {
            Ok(value) => Ok(value),
            Err(err) => Err(AttemptError::Failed { url, err }),
        }
    }

    async fn attempt(
        &self,
        request: &Request,
        request_id: i64,
        timeout: Duration,
        url: &ServiceURL,
        addr: &str,
    ) -> Result<CallResult, RpcError> {
        let mut entry = self
            .pool
            .get_conn(&request.protocol, addr, self.transport.as_ref(), self.config.dial_timeout)
            .await?;

        let header = build_header(request, self.config.codec, timeout);
        let result = match tokio::time::timeout(
            timeout,
            round_trip(self.config.codec, entry.client_mut(), request, request_id, url, header),
        )
        .await
        {
            Ok(r) => r,
            Err(_) => Err(RpcError::Timeout),
        };

        self.pool
            .release(&request.protocol, addr, entry, result.as_ref().err())
            .await;
        result
    }

    pub fn close(&self) {
        self.selector.close();
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build the outbound header for one attempt: the request's own metadata,
/// minus [`crate::request::RESERVED_HEADERS`], plus `Timeout` (nanoseconds),
/// `Content-Type` and `Accept` (spec §4.1 step 6), grounded on
/// `client/rpc_client.go`'s `reqHeader` construction.
fn build_header(request: &Request, codec: CodecType, timeout: Duration) -> std::collections::HashMap<String, String> {
    let mut header = std::collections::HashMap::new();
    for (k, v) in &request.metadata {
        if crate::request::RESERVED_HEADERS.contains(&k.as_str()) {
            continue;
        }
        header.insert(k.clone(), v.clone());
    }
    header.insert("Timeout".to_string(), timeout.as_nanos().to_string());
    header.insert("Content-Type".to_string(), request.protocol.clone());
    header.insert(
        "Accept".to_string(),
        request
            .content_type
            .clone()
            .unwrap_or_else(|| codec.content_type().to_string()),
    );
    header
}

async fn round_trip(
    codec: CodecType,
    client: &mut dyn Client,
    request: &Request,
    request_id: i64,
    url: &ServiceURL,
    header: std::collections::HashMap<String, String>,
) -> Result<CallResult, RpcError> {
    match codec {
        CodecType::JsonRpc => round_trip_jsonrpc(client, request, request_id, header).await,
        CodecType::Dubbo => round_trip_dubbo(client, request, request_id, url).await,
    }
}

async fn round_trip_jsonrpc(
    client: &mut dyn Client,
    request: &Request,
    request_id: i64,
    mut header: std::collections::HashMap<String, String>,
) -> Result<CallResult, RpcError> {
    let mut codec = JsonRpcCodec::new();
    let msg = Message::request(request_id, request.method.clone());
    let params = build_params(&request.arguments);
    let body = codec.encode(&msg, params)?;

    header.insert("__path".to_string(), format!("/{}", request.interface));
    let pkg = Package { header, body };

    client.send(&pkg).await?;
    let resp = client.recv(0).await?;
    let decoded = codec.decode(&resp.body)?;

    if let Some(err) = decoded.error {
        return Err(RpcError::Remote(err.message));
    }
    Ok(CallResult::Json(decoded.result.unwrap_or(Json::Null)))
}

async fn round_trip_dubbo(
    client: &mut dyn Client,
    request: &Request,
    request_id: i64,
    url: &ServiceURL,
) -> Result<CallResult, RpcError> {
    let parts = RequestParts {
        request_id,
        interface: &request.interface,
        version: &request.version,
        method: &request.method,
        path: &request.interface,
        args: &request.arguments,
        timeout_ms: url.timeout_ms(),
    };
    let frame = dubbo::encode_request(&parts)?;
    client.send(&Package { header: Default::default(), body: frame }).await?;

    let header_pkg = client.recv(dubbo::HEADER_LENGTH).await?;
    let header = dubbo::unpack_header(&header_pkg.body)?;
    let body_pkg = client.recv(header.body_len as usize).await?;

    let mut frame = header_pkg.body;
    frame.extend_from_slice(&body_pkg.body);

    let DubboDecodedResponse {
        header: resp_header,
        value,
    } = dubbo::decode_response(&frame)?;
    if resp_header.request_id != request_id {
        return Err(RpcError::ProtocolViolation(format!(
            "response id {} does not match request id {request_id}",
            resp_header.request_id
        )));
    }
    Ok(CallResult::Hessian(value.unwrap_or(Value::Null)))
}

/// Mirrors the reference JSON-RPC codec's param-omission rule: an empty
/// argument list is omitted from the wire rather than sent as `[]`.
fn build_params(args: &[Value]) -> Params {
    if args.is_empty() {
        Params::None
    } else {
        Params::Array(args.iter().map(hessian_to_json).collect())
    }
}

fn hessian_to_json(v: &Value) -> Json {
    match v {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Long(l) => Json::from(*l),
        Value::Double(d) => Json::from(*d),
        Value::Date(ms) => Json::from(*ms),
        Value::String(s) => Json::String(s.clone()),
        Value::Bytes(b) => Json::Array(b.iter().map(|byte| Json::from(*byte)).collect()),
        Value::List(items) => Json::Array(items.iter().map(hessian_to_json).collect()),
        Value::Map { entries, .. } => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                if let Some(key) = k.as_str() {
                    map.insert(key.to_string(), hessian_to_json(v));
                }
            }
            Json::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct FakeJsonTransport {
        dials: AtomicUsize,
        response: Vec<u8>,
    }

    struct FakeJsonClient {
        response: Vec<u8>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    #[async_trait]
    impl Client for FakeJsonClient {
        async fn send(&mut self, pkg: &Package) -> Result<(), RpcError> {
            self.sent.lock().unwrap().push(pkg.body.clone());
            Ok(())
        }
        async fn recv(&mut self, _want: usize) -> Result<Package, RpcError> {
            Ok(Package {
                header: HashMap::new(),
                body: self.response.clone(),
            })
        }
        async fn close(&mut self) -> Result<(), RpcError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for FakeJsonTransport {
        async fn dial(
            &self,
            _addr: &str,
            _t: Duration,
            _persistent: bool,
        ) -> Result<Box<dyn Client>, RpcError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeJsonClient {
                response: self.response.clone(),
                sent: Arc::new(Mutex::new(Vec::new())),
            }))
        }
        fn name(&self) -> &'static str {
            "fake-json"
        }
    }

    fn service_url() -> ServiceURL {
        ServiceURL::parse("jsonrpc://127.0.0.1:9000/Calc?interface=Calc").unwrap()
    }

    #[tokio::test]
    async fn happy_path_returns_decoded_result() {
        let registry = Arc::new(StaticRegistry::new(vec![service_url()]));
        let transport: Arc<dyn Transport> = Arc::new(FakeJsonTransport {
            dials: AtomicUsize::new(0),
            response: br#"{"jsonrpc":"2.0","id":1,"result":5}"#.to_vec(),
        });
        let client = RpcClient::new(registry, transport, ClientConfig::default());

        let request = Request::new("jsonrpc", "Calc", "add").with_arguments(vec![Value::Int(2), Value::Int(3)]);
        let result = client.call(&request, CallOptions::new()).await.unwrap();
        match result {
            CallResult::Json(v) => assert_eq!(v, Json::from(5)),
            _ => panic!("expected json result"),
        }
    }

    #[tokio::test]
    async fn no_provider_is_not_retried() {
        let registry = Arc::new(StaticRegistry::new(vec![]));
        let transport: Arc<dyn Transport> = Arc::new(FakeJsonTransport {
            dials: AtomicUsize::new(0),
            response: Vec::new(),
        });
        let client = RpcClient::new(registry, transport, ClientConfig::default());
        let request = Request::new("jsonrpc", "Calc", "add");
        let err = client.call(&request, CallOptions::new()).await.unwrap_err();
        assert!(matches!(err, RpcError::NotFound));
    }

    #[tokio::test]
    async fn remote_fault_surfaces_as_remote_error() {
        let registry = Arc::new(StaticRegistry::new(vec![service_url()]));
        let transport: Arc<dyn Transport> = Arc::new(FakeJsonTransport {
            dials: AtomicUsize::new(0),
            response: br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"no such method"}}"#.to_vec(),
        });
        let client = RpcClient::new(registry, transport, ClientConfig::default());
        let request = Request::new("jsonrpc", "Calc", "missing");
        let err = client.call(&request, CallOptions::new()).await.unwrap_err();
        assert!(matches!(err, RpcError::Remote(_)));
    }

    #[test]
    fn build_header_injects_reserved_names_and_keeps_custom_metadata() {
        let mut metadata = HashMap::new();
        metadata.insert("trace-id".to_string(), "abc".to_string());
        metadata.insert("Timeout".to_string(), "should-be-overwritten".to_string());
        let request = Request::new("jsonrpc", "Calc", "add")
            .with_content_type("application/json")
            .with_metadata(metadata);

        let header = build_header(&request, CodecType::JsonRpc, Duration::from_millis(250));

        assert_eq!(header.get("trace-id").map(String::as_str), Some("abc"));
        assert_eq!(header.get("Timeout").map(String::as_str), Some("250000000"));
        assert_eq!(header.get("Content-Type").map(String::as_str), Some("jsonrpc"));
        assert_eq!(header.get("Accept").map(String::as_str), Some("application/json"));
    }

    #[test]
    fn build_header_defaults_accept_to_codec_content_type() {
        let request = Request::new("dubbo", "Calc", "add");
        let header = build_header(&request, CodecType::Dubbo, Duration::from_secs(1));
        assert_eq!(header.get("Accept").map(String::as_str), Some("application/dubbo"));
    }

    #[tokio::test]
    async fn provider_timeout_query_caps_the_call_deadline() {
        // the provider URL advertises a 10ms timeout, well under the
        // client's 5s default; the call must respect the tighter bound.
        let url = ServiceURL::parse("jsonrpc://127.0.0.1:9000/Calc?interface=Calc&timeout=10").unwrap();
        let registry = Arc::new(StaticRegistry::new(vec![url]));

        struct StallingTransport;
        struct StallingClient;
        #[async_trait]
        impl Client for StallingClient {
            async fn send(&mut self, _pkg: &Package) -> Result<(), RpcError> {
                Ok(())
            }
            async fn recv(&mut self, _want: usize) -> Result<Package, RpcError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("provider timeout should fire first")
            }
            async fn close(&mut self) -> Result<(), RpcError> {
                Ok(())
            }
        }
        #[async_trait]
        impl Transport for StallingTransport {
            async fn dial(
                &self,
                _addr: &str,
                _t: Duration,
                _persistent: bool,
            ) -> Result<Box<dyn Client>, RpcError> {
                Ok(Box::new(StallingClient))
            }
            fn name(&self) -> &'static str {
                "stalling"
            }
        }

        let client = RpcClient::new(registry, Arc::new(StallingTransport), ClientConfig::default());
        let request = Request::new("jsonrpc", "Calc", "slow");
        let start = std::time::Instant::now();
        let err = client.call(&request, CallOptions::new()).await.unwrap_err();
        assert!(matches!(err, RpcError::Timeout));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn default_retries_makes_exactly_one_attempt() {
        let registry = Arc::new(StaticRegistry::new(vec![service_url()]));
        let transport = Arc::new(FakeJsonTransport {
            dials: AtomicUsize::new(0),
            response: br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"no such method"}}"#.to_vec(),
        });
        let client = RpcClient::new(registry, transport.clone(), ClientConfig::default());
        let request = Request::new("jsonrpc", "Calc", "missing");
        let err = client.call(&request, CallOptions::new()).await.unwrap_err();
        assert!(matches!(err, RpcError::Remote(_)));
        assert_eq!(transport.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_reuses_same_request_id_across_attempts() {
        use crate::selector::SelectorMode;

        // each attempt dials a fresh connection, so the shared id/addr logs
        // are held outside the per-connection client to observe all attempts.
        struct SharedIdTransport {
            dials: Mutex<Vec<String>>,
            shared_ids: Arc<Mutex<Vec<i64>>>,
        }

        struct SharedIdClient {
            shared_ids: Arc<Mutex<Vec<i64>>>,
        }

        #[async_trait]
        impl Client for SharedIdClient {
            async fn send(&mut self, pkg: &Package) -> Result<(), RpcError> {
                let parsed: serde_json::Value = serde_json::from_slice(&pkg.body).unwrap();
                self.shared_ids
                    .lock()
                    .unwrap()
                    .push(parsed["id"].as_i64().unwrap());
                Ok(())
            }
            async fn recv(&mut self, _want: usize) -> Result<Package, RpcError> {
                Ok(Package {
                    header: HashMap::new(),
                    body: br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"nope"}}"#.to_vec(),
                })
            }
            async fn close(&mut self) -> Result<(), RpcError> {
                Ok(())
            }
        }

        #[async_trait]
        impl Transport for SharedIdTransport {
            async fn dial(
                &self,
                addr: &str,
                _t: Duration,
                _persistent: bool,
            ) -> Result<Box<dyn Client>, RpcError> {
                self.dials.lock().unwrap().push(addr.to_string());
                Ok(Box::new(SharedIdClient {
                    shared_ids: self.shared_ids.clone(),
                }))
            }
            fn name(&self) -> &'static str {
                "shared-id"
            }
        }

        let a = ServiceURL::parse("jsonrpc://127.0.0.1:9001/Calc?interface=Calc").unwrap();
        let b = ServiceURL::parse("jsonrpc://127.0.0.1:9002/Calc?interface=Calc").unwrap();
        let registry = Arc::new(StaticRegistry::new(vec![a, b]));

        let shared_ids = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(SharedIdTransport {
            dials: Mutex::new(Vec::new()),
            shared_ids: shared_ids.clone(),
        });

        let mut config = ClientConfig::default();
        config.selector_mode = SelectorMode::RoundRobin;
        config.retries = 2;

        let client = RpcClient::new(registry, transport.clone(), config);
        let request = Request::new("jsonrpc", "Calc", "missing");
        let err = client.call(&request, CallOptions::new()).await.unwrap_err();
        assert!(matches!(err, RpcError::Remote(_)));

        let dialed = transport.dials.lock().unwrap().clone();
        assert_eq!(dialed.len(), 2, "exactly two attempts for retries=2");
        assert_ne!(
            dialed[0], dialed[1],
            "round-robin must pick a different provider on retry"
        );

        let ids = shared_ids.lock().unwrap().clone();
        assert_eq!(ids.len(), 2);
        assert_eq!(
            ids[0], ids[1],
            "the same request id is reused across every attempt of one call"
        );
    }
}
