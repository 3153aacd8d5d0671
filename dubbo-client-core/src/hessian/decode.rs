use super::{CHUNK_SIZE, Value};
use crate::bytes_ext::{unpack_f64, unpack_i32, unpack_i64, unpack_u16};
use crate::error::CodecError;

/// Cursor-based Hessian decoder over an in-memory buffer.
///
/// Maintains an append-only `refs` list: every parsed list or map is appended
/// and may later be addressed by an `R` back-reference.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    refs: Vec<Value>,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Decoder {
            buf,
            pos: 0,
            refs: Vec::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn peek_byte(&self) -> Result<u8, CodecError> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or_else(|| CodecError::Protocol("unexpected end of hessian buffer".into()))
    }

    fn read_byte(&mut self) -> Result<u8, CodecError> {
        let b = self.peek_byte()?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.pos + n > self.buf.len() {
            return Err(CodecError::Protocol("not enough buf".into()));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(unpack_u16(self.take(2)?))
    }

    fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(unpack_i32(self.take(4)?))
    }

    fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(unpack_i64(self.take(8)?))
    }

    fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(unpack_f64(self.take(8)?))
    }

    fn read_runes(&mut self, count: usize) -> Result<String, CodecError> {
        let mut s = String::with_capacity(count);
        for _ in 0..count {
            let b0 = self.read_byte()?;
            let extra = utf8_extra_bytes(b0)?;
            let mut char_buf = vec![b0];
            char_buf.extend_from_slice(self.take(extra)?);
            let ch = std::str::from_utf8(&char_buf)
                .map_err(|_| CodecError::Protocol("invalid utf-8 in hessian string".into()))?
                .chars()
                .next()
                .ok_or_else(|| CodecError::Protocol("empty utf-8 char".into()))?;
            s.push(ch);
        }
        Ok(s)
    }

    fn read_type_name(&mut self) -> Result<Option<String>, CodecError> {
        if self.peek_byte()? != b't' {
            return Ok(None);
        }
        self.read_byte()?;
        let len = self.read_u16()? as usize;
        Ok(Some(self.read_runes(len)?))
    }

    /// Parse a single Hessian value starting at the cursor.
    pub fn parse(&mut self) -> Result<Value, CodecError> {
        let tag = self.read_byte()?;
        match tag {
            b'N' => Ok(Value::Null),
            b'T' => Ok(Value::Bool(true)),
            b'F' => Ok(Value::Bool(false)),
            b'I' => Ok(Value::Int(self.read_i32()?)),
            b'L' => Ok(Value::Long(self.read_i64()?)),
            b'd' => Ok(Value::Date(self.read_i64()?)),
            b'D' => Ok(Value::Double(self.read_f64()?)),
            b'S' | b's' => {
                let mut chunks = String::new();
                let mut t = tag;
                loop {
                    let len = self.read_u16()? as usize;
                    if len > CHUNK_SIZE {
                        return Err(CodecError::Protocol("hessian chunk exceeds CHUNK_SIZE".into()));
                    }
                    chunks.push_str(&self.read_runes(len)?);
                    if t == b'S' {
                        break;
                    }
                    t = self.read_byte()?;
                }
                Ok(Value::String(chunks))
            }
            b'B' | b'b' => {
                let mut bytes = Vec::new();
                let mut t = tag;
                loop {
                    let len = self.read_u16()? as usize;
                    bytes.extend_from_slice(self.take(len)?);
                    if t == b'B' {
                        break;
                    }
                    t = self.read_byte()?;
                }
                Ok(Value::Bytes(bytes))
            }
            b'V' => {
                self.read_type_name()?;
                if self.peek_byte()? == b'l' {
                    self.read_byte()?;
                    self.read_i32()?;
                }
                let mut items = Vec::new();
                while self.peek_byte()? != b'z' {
                    items.push(self.parse()?);
                }
                self.read_byte()?;
                self.refs.push(Value::List(items.clone()));
                Ok(Value::List(items))
            }
            b'M' => {
                let type_name = self.read_type_name()?;
                let mut entries = Vec::new();
                while self.peek_byte()? != b'z' {
                    let k = self.parse()?;
                    let v = self.parse()?;
                    entries.push((k, v));
                }
                self.read_byte()?;
                let value = Value::Map {
                    type_name,
                    entries,
                };
                self.refs.push(value.clone());
                Ok(value)
            }
            b'f' => {
                let _ = self.parse()?; // "code" key
                let code = self.parse()?;
                let _ = self.parse()?; // "message" key
                let message = self.parse()?;
                Ok(Value::Map {
                    type_name: Some("fault".to_string()),
                    entries: vec![
                        (Value::String("code".into()), code),
                        (Value::String("message".into()), message),
                    ],
                })
            }
            b'r' => {
                self.take(2)?; // x01 x00
                self.parse()
            }
            b'R' => {
                let idx = self.read_i32()? as usize;
                self.refs
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| CodecError::Protocol(format!("illegal ref index {idx}")))
            }
            other => Err(CodecError::Protocol(format!(
                "unrecognized hessian tag: {other:#x}"
            ))),
        }
    }
}

fn utf8_extra_bytes(first: u8) -> Result<usize, CodecError> {
    if first & 0x80 == 0 {
        Ok(0)
    } else if first & 0xE0 == 0xC0 {
        Ok(1)
    } else if first & 0xF0 == 0xE0 {
        Ok(2)
    } else if first & 0xF8 == 0xF0 {
        Ok(3)
    } else {
        Err(CodecError::Protocol("invalid utf-8 leading byte".into()))
    }
}
