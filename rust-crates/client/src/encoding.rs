//! Wire encoding of entry-function arguments.
//!
//! Fixed-width kinds are little endian; strings and byte vectors carry a
//! ULEB128 length prefix. Addresses are always 32 bytes.

use crate::address::{
    ADDRESS_LENGTH,
    AccountAddress,
};
use serde_json::{
    Value,
    json,
};
use thiserror::Error;

/// One typed argument to a ledger call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveArg {
    U8(u8),
    U64(u64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Address(AccountAddress),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),
    #[error("length prefix does not fit in 32 bits")]
    LengthOverflow,
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

impl MoveArg {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            MoveArg::U8(v) => encode_u8(out, *v),
            MoveArg::U64(v) => encode_u64(out, *v),
            MoveArg::Bool(v) => encode_bool(out, *v),
            MoveArg::Str(v) => encode_str(out, v),
            MoveArg::Bytes(v) => encode_bytes(out, v),
            MoveArg::Address(v) => encode_address(out, v),
        }
    }

    /// JSON form used by view calls: u64 travels as a decimal string so it
    /// survives JavaScript number precision on the node side.
    pub fn to_view_json(&self) -> Value {
        match self {
            MoveArg::U8(v) => json!(v),
            MoveArg::U64(v) => json!(v.to_string()),
            MoveArg::Bool(v) => json!(v),
            MoveArg::Str(v) => json!(v),
            MoveArg::Bytes(v) => json!(format!("0x{}", hex::encode(v))),
            MoveArg::Address(v) => json!(v.to_hex_literal()),
        }
    }
}

pub fn encode_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn encode_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn encode_bool(out: &mut Vec<u8>, value: bool) {
    out.push(u8::from(value));
}

pub fn encode_str(out: &mut Vec<u8>, value: &str) {
    encode_bytes(out, value.as_bytes());
}

pub fn encode_bytes(out: &mut Vec<u8>, value: &[u8]) {
    write_uleb128(out, value.len() as u64);
    out.extend_from_slice(value);
}

pub fn encode_address(out: &mut Vec<u8>, value: &AccountAddress) {
    out.extend_from_slice(value.as_bytes());
}

pub fn write_uleb128(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Cursor over an encoded buffer.
pub struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < needed {
            return Err(DecodeError::UnexpectedEnd {
                needed,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::InvalidBool(other)),
        }
    }

    pub fn read_uleb128(&mut self) -> Result<u32, DecodeError> {
        let mut value: u64 = 0;
        for shift in (0..32).step_by(7) {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return u32::try_from(value).map_err(|_| DecodeError::LengthOverflow);
            }
        }
        Err(DecodeError::LengthOverflow)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_uleb128()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }

    pub fn read_address(&mut self) -> Result<AccountAddress, DecodeError> {
        let mut buf = [0u8; ADDRESS_LENGTH];
        buf.copy_from_slice(self.take(ADDRESS_LENGTH)?);
        Ok(AccountAddress::new(buf))
    }

    /// Fails if anything is left unread.
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}
