//! Tag-driven Hessian object serialization (spec §4.2.3, component C2).
//!
//! Only the primitive/collection/object tags needed to interoperate with the
//! reference Dubbo wire format are implemented: `N T F I L d D S s B b V M r f R`.

mod decode;
mod encode;

pub use decode::Decoder;
pub use encode::Encoder;

use crate::error::CodecError;

pub const CHUNK_SIZE: usize = 0x8000;

/// A Hessian-representable value: the tagged sum covering every kind the
/// Dubbo codec's arguments, results and attachment maps are built from.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    /// milliseconds since the Unix epoch
    Date(i64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// a keyed container; `type_name` is set when the map represents a named
    /// object (e.g. a Java exception class) rather than a plain map
    Map {
        type_name: Option<String>,
        entries: Vec<(Value, Value)>,
    },
}

impl Value {
    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        Value::Map {
            type_name: None,
            entries,
        }
    }

    pub fn string_map(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Value::map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::String(k), Value::String(v)))
                .collect(),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Extension point for application types that want to serialize themselves
/// as a Hessian object rather than going through [`Value`] directly.
pub trait ToHessian {
    fn to_hessian(&self) -> Value;
}

impl ToHessian for Value {
    fn to_hessian(&self) -> Value {
        self.clone()
    }
}

impl ToHessian for bool {
    fn to_hessian(&self) -> Value {
        Value::Bool(*self)
    }
}
impl ToHessian for i32 {
    fn to_hessian(&self) -> Value {
        Value::Int(*self)
    }
}
impl ToHessian for i64 {
    fn to_hessian(&self) -> Value {
        Value::Long(*self)
    }
}
impl ToHessian for f64 {
    fn to_hessian(&self) -> Value {
        Value::Double(*self)
    }
}
impl ToHessian for str {
    fn to_hessian(&self) -> Value {
        Value::String(self.to_string())
    }
}
impl ToHessian for String {
    fn to_hessian(&self) -> Value {
        Value::String(self.clone())
    }
}
impl ToHessian for Vec<u8> {
    fn to_hessian(&self) -> Value {
        Value::Bytes(self.clone())
    }
}
impl<T: ToHessian> ToHessian for Vec<T> {
    fn to_hessian(&self) -> Value {
        Value::List(self.iter().map(|v| v.to_hessian()).collect())
    }
}

/// Encode a value into its Hessian wire form.
pub fn encode(v: &Value, buf: &mut Vec<u8>) -> Result<(), CodecError> {
    Encoder::default().encode_into(v, buf)
}

/// Decode a single Hessian value from the front of `buf`, returning the value
/// and the number of bytes consumed.
pub fn decode(buf: &[u8]) -> Result<(Value, usize), CodecError> {
    let mut dec = Decoder::new(buf);
    let v = dec.parse()?;
    Ok((v, dec.position()))
}
