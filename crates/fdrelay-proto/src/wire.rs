//! Canonical big-endian serialization for protocol records.
//!
//! Every scalar is two's-complement big-endian; strings and byte blobs are
//! a `u32` length followed by the raw bytes. The traits run over plain
//! `io::Read`/`io::Write` so the same codec serves the blocking shim client
//! and the server loop.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::MAX_FRAME_PAYLOAD;

/// Errors produced while encoding or decoding protocol records.
///
/// Any of these on the server side means the connection is dropped; the
/// shim surfaces them to the caller as a transport failure (EIO).
#[derive(Debug, Error)]
pub enum WireError {
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
    #[error("bad frame magic {0:02x?}")]
    BadMagic([u8; 2]),
    #[error("protocol version mismatch: got {got}, expected {expected}")]
    Version { got: u8, expected: u8 },
    #[error("program identifier mismatch: got {got:#010x}, expected {expected:#010x}")]
    Program { got: u32, expected: u32 },
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    #[error("unknown {what} discriminator {value}")]
    UnknownTag { what: &'static str, value: u32 },
    #[error("length {len} exceeds the {what} limit")]
    Oversized { what: &'static str, len: u32 },
    #[error("reply opcode {got:?} does not match request opcode {expected:?}")]
    OpcodeMismatch { got: crate::Op, expected: crate::Op },
    #[error("string is not valid UTF-8")]
    BadString,
}

pub trait Encodable {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), WireError>;
}

pub trait Decodable: Sized {
    fn decode<R: Read>(r: &mut R) -> Result<Self, WireError>;
}

impl Encodable for i32 {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), WireError> {
        Ok(w.write_i32::<BigEndian>(*self)?)
    }
}

impl Decodable for i32 {
    fn decode<R: Read>(r: &mut R) -> Result<Self, WireError> {
        Ok(r.read_i32::<BigEndian>()?)
    }
}

impl Encodable for u32 {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), WireError> {
        Ok(w.write_u32::<BigEndian>(*self)?)
    }
}

impl Decodable for u32 {
    fn decode<R: Read>(r: &mut R) -> Result<Self, WireError> {
        Ok(r.read_u32::<BigEndian>()?)
    }
}

impl Encodable for i64 {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), WireError> {
        Ok(w.write_i64::<BigEndian>(*self)?)
    }
}

impl Decodable for i64 {
    fn decode<R: Read>(r: &mut R) -> Result<Self, WireError> {
        Ok(r.read_i64::<BigEndian>()?)
    }
}

impl Encodable for u64 {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), WireError> {
        Ok(w.write_u64::<BigEndian>(*self)?)
    }
}

impl Decodable for u64 {
    fn decode<R: Read>(r: &mut R) -> Result<Self, WireError> {
        Ok(r.read_u64::<BigEndian>()?)
    }
}

impl Encodable for Vec<u8> {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), WireError> {
        (self.len() as u32).encode(w)?;
        Ok(w.write_all(self)?)
    }
}

impl Decodable for Vec<u8> {
    fn decode<R: Read>(r: &mut R) -> Result<Self, WireError> {
        let len = u32::decode(r)?;
        // A corrupt length field must not drive allocation.
        if len as usize > MAX_FRAME_PAYLOAD {
            return Err(WireError::Oversized { what: "blob", len });
        }
        let mut buf = vec![0u8; len as usize];
        r.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl Encodable for String {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), WireError> {
        (self.len() as u32).encode(w)?;
        Ok(w.write_all(self.as_bytes())?)
    }
}

impl Decodable for String {
    fn decode<R: Read>(r: &mut R) -> Result<Self, WireError> {
        let bytes = Vec::<u8>::decode(r)?;
        String::from_utf8(bytes).map_err(|_| WireError::BadString)
    }
}
