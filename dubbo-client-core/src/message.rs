//! The codec-independent [`Message`] both codecs read and write (spec §3).

use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Response,
    Heartbeat,
    Error,
}

/// Uniform intermediate the codecs read and write.
///
/// `id` on a request is `>= 1`; `id & 0x7FFF_FFFF` is the wire id. A response
/// echoes the request's id.
#[derive(Clone, Debug, Default)]
pub struct Message {
    pub id: i64,
    pub version: String,
    pub service_path: String,
    pub target: String,
    pub method: String,
    pub timeout_ms: u64,
    pub message_type: Option<MessageType>,
    pub error: Option<String>,
    pub header: HashMap<String, String>,
    pub body_len: usize,
}

impl Message {
    pub fn request(id: i64, method: impl Into<String>) -> Self {
        Message {
            id,
            method: method.into(),
            message_type: Some(MessageType::Request),
            header: HashMap::new(),
            ..Default::default()
        }
    }

    pub fn wire_id(&self) -> i64 {
        self.id & 0x7FFF_FFFF
    }
}
