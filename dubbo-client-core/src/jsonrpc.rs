//! JSON-RPC 2.0 text codec (spec §4.2.1, component C3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::CodecError;
use crate::message::Message;

pub const MAX_JSONRPC_ID: i64 = 0x7FFF_FFFF;
const VERSION: &str = "2.0";

pub const ERR_INTERNAL: i64 = -32603;
pub const ERR_MARSHAL_FAILED: i64 = -32001;

#[derive(Serialize)]
struct RequestEnvelope<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Json>,
    id: i64,
}

#[derive(Deserialize)]
struct ResponseEnvelope {
    #[allow(dead_code)]
    jsonrpc: String,
    id: i64,
    #[serde(default)]
    result: Option<Json>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Json>,
}

/// Encodes requests and decodes response envelopes for one logical
/// connection. Keeps a correlation map from wire id to method name so a
/// response can be matched back to its request.
#[derive(Default)]
pub struct JsonRpcCodec {
    pending: HashMap<i64, String>,
}

/// Parameters for a JSON-RPC call. `params` is omitted on the wire when this
/// is `None`.
pub enum Params {
    None,
    Array(Vec<Json>),
    Object(serde_json::Map<String, Json>),
}

impl JsonRpcCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode one request. `msg.id` is masked to the 31-bit JSON-RPC id
    /// range; the original 63-bit id is not recoverable from the wire and is
    /// tracked by the caller, not this codec.
    pub fn encode(&mut self, msg: &Message, params: Params) -> Result<Vec<u8>, CodecError> {
        let wire_id = msg.id & MAX_JSONRPC_ID;
        let params = match params {
            Params::None => None,
            Params::Array(a) => Some(Json::Array(a)),
            Params::Object(m) => Some(Json::Object(m)),
        };
        let env = RequestEnvelope {
            jsonrpc: VERSION,
            method: &msg.method,
            params,
            id: wire_id,
        };
        let bytes = serde_json::to_vec(&env)
            .map_err(|e| CodecError::Protocol(format!("jsonrpc encode: {e}")))?;
        self.pending.insert(wire_id, msg.method.clone());
        Ok(bytes)
    }

    /// Decode one response envelope, correlating it against a prior
    /// [`encode`](Self::encode) call by wire id.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<DecodedResponse, CodecError> {
        let env: ResponseEnvelope = serde_json::from_slice(bytes)
            .map_err(|e| CodecError::Protocol(format!("jsonrpc decode: {e}")))?;

        let method = self
            .pending
            .remove(&env.id)
            .ok_or(CodecError::UnknownResponseId(env.id))?;

        if let Some(err) = env.error {
            return Ok(DecodedResponse {
                id: env.id,
                method,
                error: Some(err),
                result: None,
            });
        }

        Ok(DecodedResponse {
            id: env.id,
            method,
            error: None,
            result: env.result,
        })
    }
}

pub struct DecodedResponse {
    pub id: i64,
    pub method: String,
    pub error: Option<RpcError>,
    pub result: Option<Json>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_omits_params_when_none() {
        let mut codec = JsonRpcCodec::new();
        let msg = Message::request(1, "Add");
        let bytes = codec.encode(&msg, Params::None).unwrap();
        let v: Json = serde_json::from_slice(&bytes).unwrap();
        assert!(v.get("params").is_none());
        assert_eq!(v["id"], 1);
    }

    #[test]
    fn id_is_masked_to_31_bits() {
        let mut codec = JsonRpcCodec::new();
        let msg = Message::request(0x1_8000_0001, "Add");
        let bytes = codec.encode(&msg, Params::None).unwrap();
        let v: Json = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["id"].as_i64().unwrap(), 0x1_8000_0001 & MAX_JSONRPC_ID);
    }

    #[test]
    fn happy_path_round_trip() {
        let mut codec = JsonRpcCodec::new();
        let msg = Message::request(1, "Add");
        codec
            .encode(&msg, Params::Array(vec![Json::from(2), Json::from(3)]))
            .unwrap();
        let resp = codec
            .decode(br#"{"jsonrpc":"2.0","id":1,"result":5}"#)
            .unwrap();
        assert_eq!(resp.result.unwrap(), Json::from(5));
        assert!(resp.error.is_none());
    }

    #[test]
    fn unknown_id_is_an_error() {
        let mut codec = JsonRpcCodec::new();
        let err = codec
            .decode(br#"{"jsonrpc":"2.0","id":99,"result":5}"#)
            .unwrap_err();
        matches!(err, CodecError::UnknownResponseId(99));
    }

    #[test]
    fn remote_fault_is_surfaced() {
        let mut codec = JsonRpcCodec::new();
        let msg = Message::request(1, "Add");
        codec.encode(&msg, Params::None).unwrap();
        let resp = codec
            .decode(br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#)
            .unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "Method not found");
    }
}
