//! The Dubbo binary codec: 16-byte header + Hessian-encoded body (spec §4.2.2,
//! component C4).

use crate::bytes_ext::{pack_i64, pack_u32, unpack_i64, unpack_u16, unpack_u32};
use crate::error::CodecError;
use crate::hessian::{self, Value};

pub const HEADER_LENGTH: usize = 16;
pub const MAGIC: u16 = 0xDABB;
pub const FLAG_REQUEST: u8 = 0x80;
pub const FLAG_TWOWAY: u8 = 0x40;
pub const FLAG_EVENT: u8 = 0x20;
pub const SERIALIZATION_MASK: u8 = 0x1F;
pub const HESSIAN_SERIALIZATION_ID: u8 = 2;
pub const DUBBO_VERSION: &str = "2.5.4";

/// Maximum encoded frame size; encoding refuses to produce anything larger.
pub const DEFAULT_LEN: usize = 8 * 1024 * 1024;

pub const RESPONSE_OK: u8 = 20;
pub const RESPONSE_CLIENT_TIMEOUT: u8 = 30;
pub const RESPONSE_SERVER_TIMEOUT: u8 = 31;
pub const RESPONSE_BAD_REQUEST: u8 = 40;
pub const RESPONSE_BAD_RESPONSE: u8 = 50;
pub const RESPONSE_SERVICE_NOT_FOUND: u8 = 60;
pub const RESPONSE_SERVICE_ERROR: u8 = 70;
pub const RESPONSE_SERVER_ERROR: u8 = 80;
pub const RESPONSE_CLIENT_ERROR: u8 = 90;

const BODY_WITH_EXCEPTION: i32 = 0;
const BODY_VALUE: i32 = 1;
const BODY_NULL_VALUE: i32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DubboHeader {
    pub flags: u8,
    pub status: u8,
    pub request_id: i64,
    pub body_len: u32,
}

impl DubboHeader {
    pub fn is_request(&self) -> bool {
        self.flags & FLAG_REQUEST != 0
    }

    pub fn is_two_way(&self) -> bool {
        self.flags & FLAG_TWOWAY != 0
    }

    pub fn is_event(&self) -> bool {
        self.flags & FLAG_EVENT != 0
    }

    pub fn serialization_id(&self) -> u8 {
        self.flags & SERIALIZATION_MASK
    }
}

pub fn pack_header(header: &DubboHeader) -> [u8; HEADER_LENGTH] {
    let mut buf = [0u8; HEADER_LENGTH];
    buf[0] = (MAGIC >> 8) as u8;
    buf[1] = (MAGIC & 0xFF) as u8;
    buf[2] = header.flags;
    buf[3] = header.status;
    buf[4..12].copy_from_slice(&pack_i64(header.request_id));
    buf[12..16].copy_from_slice(&pack_u32(header.body_len));
    buf
}

pub fn unpack_header(buf: &[u8]) -> Result<DubboHeader, CodecError> {
    if buf.len() < HEADER_LENGTH {
        return Err(CodecError::Protocol("dubbo header truncated".into()));
    }
    let magic = unpack_u16(&buf[0..2]);
    if magic != MAGIC {
        return Err(CodecError::Protocol(format!(
            "bad magic: {magic:#06x}, expected {MAGIC:#06x}"
        )));
    }
    Ok(DubboHeader {
        flags: buf[2],
        status: buf[3],
        request_id: unpack_i64(&buf[4..12]),
        body_len: unpack_u32(&buf[12..16]),
    })
}

/// JVM field-descriptor string for a Hessian-representable argument, per
/// `com.alibaba.dubbo.common.utils.ReflectUtils.getDesc`.
pub fn arg_type_descriptor(v: &Value) -> String {
    match v {
        Value::Null => "Ljava/lang/Object;".to_string(),
        Value::Bool(_) => "Z".to_string(),
        Value::Int(_) => "I".to_string(),
        Value::Long(_) => "J".to_string(),
        Value::Double(_) => "D".to_string(),
        Value::Date(_) => "Ljava/util/Date;".to_string(),
        Value::String(_) => "Ljava/lang/String;".to_string(),
        Value::Bytes(_) => "[B".to_string(),
        Value::List(_) => "Ljava/util/List;".to_string(),
        Value::Map { .. } => "Ljava/util/Map;".to_string(),
    }
}

fn arg_type_list(args: &[Value]) -> String {
    args.iter().map(arg_type_descriptor).collect()
}

pub struct RequestParts<'a> {
    pub request_id: i64,
    pub interface: &'a str,
    pub version: &'a str,
    pub method: &'a str,
    pub path: &'a str,
    pub args: &'a [Value],
    pub timeout_ms: Option<u64>,
}

/// Build the full wire frame (16-byte header + Hessian body) for one Dubbo
/// request.
pub fn encode_request(parts: &RequestParts<'_>) -> Result<Vec<u8>, CodecError> {
    let mut body = Vec::new();
    hessian::encode(&Value::String(DUBBO_VERSION.to_string()), &mut body)?;
    hessian::encode(&Value::String(parts.interface.to_string()), &mut body)?;
    hessian::encode(&Value::String(parts.version.to_string()), &mut body)?;
    hessian::encode(&Value::String(parts.method.to_string()), &mut body)?;
    hessian::encode(&Value::String(arg_type_list(parts.args)), &mut body)?;
    for arg in parts.args {
        hessian::encode(arg, &mut body)?;
    }

    let mut attachments = vec![
        (
            Value::String("path".into()),
            Value::String(parts.path.to_string()),
        ),
        (
            Value::String("interface".into()),
            Value::String(parts.interface.to_string()),
        ),
    ];
    if !parts.version.is_empty() {
        attachments.push((
            Value::String("version".into()),
            Value::String(parts.version.to_string()),
        ));
    }
    if let Some(timeout_ms) = parts.timeout_ms {
        attachments.push((
            Value::String("timeout".into()),
            Value::String(timeout_ms.to_string()),
        ));
    }
    hessian::encode(&Value::map(attachments), &mut body)?;

    if body.len() > DEFAULT_LEN {
        return Err(CodecError::FrameTooLarge {
            len: body.len(),
            max: DEFAULT_LEN,
        });
    }

    let header = DubboHeader {
        flags: FLAG_REQUEST | FLAG_TWOWAY | (HESSIAN_SERIALIZATION_ID & SERIALIZATION_MASK),
        status: 0,
        request_id: parts.request_id,
        body_len: body.len() as u32,
    };

    let mut frame = Vec::with_capacity(HEADER_LENGTH + body.len());
    frame.extend_from_slice(&pack_header(&header));
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub struct DecodedResponse {
    pub header: DubboHeader,
    pub value: Option<Value>,
}

/// Decode a full response frame (header already validated against `status`).
/// A non-OK status yields a `CodecError::Remote` carrying the body as a
/// UTF-8 exception message, per spec §4.2.2.
pub fn decode_response(buf: &[u8]) -> Result<DecodedResponse, CodecError> {
    let header = unpack_header(buf)?;
    let body = &buf[HEADER_LENGTH..];
    if body.len() < header.body_len as usize {
        return Err(CodecError::Protocol("dubbo body truncated".into()));
    }
    let body = &body[..header.body_len as usize];

    if header.status != RESPONSE_OK {
        let message = String::from_utf8_lossy(body).to_string();
        return Err(CodecError::Remote(message));
    }

    if body.is_empty() {
        return Ok(DecodedResponse { header, value: None });
    }

    let (prefix, consumed) = hessian::decode(body)?;
    let kind = match prefix {
        Value::Int(n) => n,
        _ => return Err(CodecError::Protocol("response body prefix is not an int".into())),
    };

    match kind {
        BODY_WITH_EXCEPTION => {
            let (exc, _) = hessian::decode(&body[consumed..])?;
            let message = match &exc {
                Value::String(s) => s.clone(),
                other => format!("{other:?}"),
            };
            Err(CodecError::Remote(message))
        }
        BODY_VALUE => {
            let (value, _) = hessian::decode(&body[consumed..])?;
            Ok(DecodedResponse {
                header,
                value: Some(value),
            })
        }
        BODY_NULL_VALUE => Ok(DecodedResponse { header, value: None }),
        other => Err(CodecError::Protocol(format!(
            "unknown response body prefix: {other}"
        ))),
    }
}
