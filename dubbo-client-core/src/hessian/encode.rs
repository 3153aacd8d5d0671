use super::{CHUNK_SIZE, Value};
use crate::bytes_ext::{pack_i32, pack_i64, pack_u16};
use crate::error::CodecError;

/// Hessian encoder. Stateless across calls; kept as a struct to mirror the
/// decoder's shape and leave room for a future streaming writer.
#[derive(Default)]
pub struct Encoder;

impl Encoder {
    pub fn encode_into(&self, v: &Value, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        match v {
            Value::Null => buf.push(b'N'),
            Value::Bool(true) => buf.push(b'T'),
            Value::Bool(false) => buf.push(b'F'),
            Value::Int(n) => {
                buf.push(b'I');
                buf.extend_from_slice(&pack_i32(*n));
            }
            Value::Long(n) => {
                buf.push(b'L');
                buf.extend_from_slice(&pack_i64(*n));
            }
            Value::Date(ms) => {
                buf.push(b'd');
                buf.extend_from_slice(&pack_i64(*ms));
            }
            Value::Double(d) => {
                buf.push(b'D');
                buf.extend_from_slice(&crate::bytes_ext::pack_f64(*d));
            }
            Value::String(s) => self.encode_chunked(s.chars(), s.chars().count(), b'S', b's', buf),
            Value::Bytes(b) => self.encode_binary(b, buf),
            Value::List(items) => {
                buf.push(b'V');
                for item in items {
                    self.encode_into(item, buf)?;
                }
                buf.push(b'z');
            }
            Value::Map { type_name, entries } => {
                buf.push(b'M');
                if let Some(name) = type_name {
                    buf.push(b't');
                    buf.extend_from_slice(&pack_u16(name.len() as u16));
                    buf.extend_from_slice(name.as_bytes());
                }
                for (k, val) in entries {
                    self.encode_into(k, buf)?;
                    self.encode_into(val, buf)?;
                }
                buf.push(b'z');
            }
        }
        Ok(())
    }

    fn encode_chunked(
        &self,
        chars: std::str::Chars<'_>,
        rune_count: usize,
        final_tag: u8,
        chunk_tag: u8,
        buf: &mut Vec<u8>,
    ) {
        let runes: Vec<char> = chars.collect();
        if rune_count <= CHUNK_SIZE {
            buf.push(final_tag);
            buf.extend_from_slice(&pack_u16(rune_count as u16));
            for c in &runes {
                let mut tmp = [0u8; 4];
                buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
            }
            return;
        }
        let mut offset = 0;
        while offset < runes.len() {
            let end = (offset + CHUNK_SIZE).min(runes.len());
            let last = end == runes.len();
            buf.push(if last { final_tag } else { chunk_tag });
            buf.extend_from_slice(&pack_u16((end - offset) as u16));
            for c in &runes[offset..end] {
                let mut tmp = [0u8; 4];
                buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
            }
            offset = end;
        }
    }

    fn encode_binary(&self, b: &[u8], buf: &mut Vec<u8>) {
        if b.len() <= CHUNK_SIZE {
            buf.push(b'B');
            buf.extend_from_slice(&pack_u16(b.len() as u16));
            buf.extend_from_slice(b);
            return;
        }
        let mut offset = 0;
        while offset < b.len() {
            let end = (offset + CHUNK_SIZE).min(b.len());
            let last = end == b.len();
            buf.push(if last { b'B' } else { b'b' });
            buf.extend_from_slice(&pack_u16((end - offset) as u16));
            buf.extend_from_slice(&b[offset..end]);
            offset = end;
        }
    }
}
