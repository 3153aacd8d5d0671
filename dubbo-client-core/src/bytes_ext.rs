//! Fixed-width big-endian pack/unpack of integers and floats (spec component C1).
//!
//! Built on `bytes::{Buf, BufMut}` the way `connectrpc-axum-client::frame`
//! builds its envelope header into a `BytesMut` rather than hand-rolling a
//! growable `Vec<u8>` cursor.

use bytes::{Buf, BufMut, Bytes, BytesMut};

pub fn pack_u16(v: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(2);
    buf.put_u16(v);
    buf.freeze()
}

pub fn unpack_u16(mut b: &[u8]) -> u16 {
    b.get_u16()
}

pub fn pack_i32(v: i32) -> Bytes {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_i32(v);
    buf.freeze()
}

pub fn unpack_i32(mut b: &[u8]) -> i32 {
    b.get_i32()
}

pub fn pack_u32(v: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_u32(v);
    buf.freeze()
}

pub fn unpack_u32(mut b: &[u8]) -> u32 {
    b.get_u32()
}

pub fn pack_i64(v: i64) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_i64(v);
    buf.freeze()
}

pub fn unpack_i64(mut b: &[u8]) -> i64 {
    b.get_i64()
}

pub fn pack_f64(v: f64) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_f64(v);
    buf.freeze()
}

pub fn unpack_f64(mut b: &[u8]) -> f64 {
    b.get_f64()
}
