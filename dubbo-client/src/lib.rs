//! Consumer-side runtime for a Dubbo-compatible RPC framework: selection,
//! pooling, transport and call orchestration over the wire codecs in
//! `dubbo_client_core`.
//!
//! A client is assembled with [`ClientBuilder`], backed by a [`Registry`]
//! implementation that resolves and watches provider URLs, and issues calls
//! through [`RpcClient::call`].

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod pool;
pub mod registry;
pub mod request;
pub mod selector;
pub mod service_url;
pub mod transport;

pub use builder::{ClientBuildError, ClientBuilder};
pub use client::{CallResult, RpcClient};
pub use config::{ClientConfig, CodecType};
pub use error::RpcError;
pub use registry::{Action, Registry, ServiceUrlEvent, StaticRegistry, Watcher};
pub use request::{CallOptions, Request};
pub use selector::{Next, Selector, SelectorMode};
pub use service_url::{ServiceConfig, ServiceURL};
pub use transport::{Client, HttpTransport, Package, TcpTransport, Transport};

pub use dubbo_client_core::hessian::Value;
