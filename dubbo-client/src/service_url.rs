//! Provider endpoint parsing and matching (spec §3, §6, component C8).

use crate::error::RpcError;

/// The caller's abstract description of the wanted service. Equality against
/// a [`ServiceURL`] requires protocol, interface name, group and version to
/// all match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServiceConfig {
    pub protocol: String,
    pub interface: String,
    pub group: String,
    pub version: String,
}

impl ServiceConfig {
    pub fn new(
        protocol: impl Into<String>,
        interface: impl Into<String>,
        group: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        ServiceConfig {
            protocol: protocol.into(),
            interface: interface.into(),
            group: group.into(),
            version: version.into(),
        }
    }

    pub fn matches(&self, url: &ServiceURL) -> bool {
        self.protocol == url.protocol
            && self.interface == url.query_get("interface").unwrap_or_default()
            && self.group == url.group
            && self.version == url.version
    }
}

/// A resolved provider endpoint parsed from a registry URL string. Created by
/// the registry watcher; immutable after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceURL {
    pub protocol: String,
    pub host: String,
    pub port: String,
    pub path: String,
    pub group: String,
    pub version: String,
    pub weight: i32,
    /// the full decoded query multimap, preserved so callers can look up
    /// arbitrary keys (`methods`, `timeout`, ...) after parsing
    query: Vec<(String, String)>,
    pub raw_url: String,
}

impl ServiceURL {
    /// Parse a URL-encoded registry URL string: percent-decode once, then
    /// split scheme/host/port/path/query (spec §6).
    pub fn parse(raw_url_string: &str) -> Result<Self, RpcError> {
        let decoded = percent_decode(raw_url_string);

        let (scheme, rest) = decoded
            .split_once("://")
            .ok_or_else(|| RpcError::ProtocolViolation(format!("missing scheme: {decoded}")))?;

        let (authority_and_path, query_raw) = match rest.split_once('?') {
            Some((a, q)) => (a, q),
            None => (rest, ""),
        };
        let (authority, path) = match authority_and_path.split_once('/') {
            Some((a, p)) => (a, format!("/{p}")),
            None => (authority_and_path, String::new()),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) => {
                (h.to_string(), p.to_string())
            }
            _ => (authority.to_string(), String::new()),
        };

        let query = parse_query(query_raw);
        let group = query_lookup(&query, "group").unwrap_or_default();
        let version = query_lookup(&query, "version").unwrap_or_default();
        let weight = query_lookup(&query, "weight")
            .and_then(|w| w.parse().ok())
            .unwrap_or(100);

        Ok(ServiceURL {
            protocol: scheme.to_string(),
            host,
            port,
            path,
            group,
            version,
            weight,
            query,
            raw_url: raw_url_string.to_string(),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn query_get(&self, key: &str) -> Option<String> {
        query_lookup(&self.query, key)
    }

    pub fn supports_method(&self, method: &str) -> bool {
        match self.query_get("methods") {
            Some(methods) => methods.split(',').any(|m| m == method),
            None => true,
        }
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.query_get("timeout").and_then(|t| t.parse().ok())
    }
}

fn query_lookup(query: &[(String, String)], key: &str) -> Option<String> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

fn parse_query(raw: &str) -> Vec<(String, String)> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
