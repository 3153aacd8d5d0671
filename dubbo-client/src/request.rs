//! Caller-facing request shape and per-call option overrides (spec §3, §4.1).

use std::collections::HashMap;
use std::time::Duration;

use dubbo_client_core::hessian::Value;

use crate::selector::Next;

/// Header names the RPC client injects itself; a caller's metadata may not
/// override these (spec §4.1 step 6, §6 "Context metadata key").
pub const RESERVED_HEADERS: [&str; 3] = ["Timeout", "Content-Type", "Accept"];

/// One RPC call description: which provider family to reach and what to
/// invoke on it. `arguments` are already-marshalled Hessian values; the
/// JSON-RPC codec converts them to JSON at encode time.
#[derive(Clone, Debug)]
pub struct Request {
    pub protocol: String,
    pub interface: String,
    pub group: String,
    pub version: String,
    pub method: String,
    pub arguments: Vec<Value>,
    /// The codec's declared content type, echoed into the outbound `Accept`
    /// header. Defaults to the codec's own content type when unset.
    pub content_type: Option<String>,
    /// Copied verbatim into the outbound header, minus [`RESERVED_HEADERS`]
    /// (spec §6: "a single well-known key carries a `{string -> string}`
    /// metadata map").
    pub metadata: HashMap<String, String>,
}

impl Request {
    pub fn new(
        protocol: impl Into<String>,
        interface: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Request {
            protocol: protocol.into(),
            interface: interface.into(),
            group: String::new(),
            version: String::new(),
            method: method.into(),
            arguments: Vec::new(),
            content_type: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Per-call overrides, merged over the client's configured defaults (spec
/// §4.1 step 2). `next` lets a caller pin the call to a specific provider
/// selection function instead of consulting the selector.
#[derive(Default)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub next: Option<Next>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_next(mut self, next: Next) -> Self {
        self.next = Some(next);
        self
    }
}
