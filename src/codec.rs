/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A small, stable, protobuf-wire-compatible codec for [AccountState] and [CallInfo].
//!
//! `pchain-types` (the production wire codec, which draws its tag numbers from the
//! ParallelChain Mainnet Protocol) is treated as an external collaborator out of scope for
//! this crate: callers integrating a protocol-level wire format are expected to swap this
//! module out for it. Field tags here are deliberately pinned and must not be renumbered,
//! mirroring the stability guarantee the protocol places on the real codec.

use crate::hash::Hash;
use crate::types::{AccountState, CallInfo};

/// Implemented by every wire-codec-addressable value in this crate.
pub trait Serializable {
    fn serialize(&self) -> Vec<u8>;
}

/// Implemented by every wire-codec-addressable value in this crate.
pub trait Deserializable: Sized {
    fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of buffer")]
    UnexpectedEof,
    #[error("malformed varint")]
    MalformedVarint,
    #[error("invalid utf8 in string field")]
    InvalidUtf8,
}

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

fn get_varint(buf: &[u8], pos: &mut usize) -> Result<u64, DecodeError> {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = *buf.get(*pos).ok_or(DecodeError::UnexpectedEof)?;
        *pos += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err(DecodeError::MalformedVarint);
        }
    }
}

fn put_tag(buf: &mut Vec<u8>, field: u32, wire_type: u8) {
    put_varint(buf, ((field as u64) << 3) | wire_type as u64);
}

fn get_tag(buf: &[u8], pos: &mut usize) -> Result<(u32, u8), DecodeError> {
    let tag = get_varint(buf, pos)?;
    Ok(((tag >> 3) as u32, (tag & 0x7) as u8))
}

fn put_bytes_field(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    put_tag(buf, field, 2);
    put_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn get_length_delimited<'a>(buf: &'a [u8], pos: &mut usize) -> Result<&'a [u8], DecodeError> {
    let len = get_varint(buf, pos)? as usize;
    let start = *pos;
    let end = start.checked_add(len).ok_or(DecodeError::UnexpectedEof)?;
    if end > buf.len() {
        return Err(DecodeError::UnexpectedEof);
    }
    *pos = end;
    Ok(&buf[start..end])
}

/// Field tags: 1 = nonce (varint), 2 = balance (varint), 3 = code_hash (bytes),
/// 4 = storage_root (bytes). Must not be renumbered.
impl Serializable for AccountState {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_tag(&mut buf, 1, 0);
        put_varint(&mut buf, self.nonce);
        put_tag(&mut buf, 2, 0);
        put_varint(&mut buf, self.balance);
        if let Some(code_hash) = &self.code_hash {
            put_bytes_field(&mut buf, 3, code_hash.as_bytes());
        }
        if let Some(storage_root) = &self.storage_root {
            put_bytes_field(&mut buf, 4, storage_root.as_bytes());
        }
        buf
    }
}

impl Deserializable for AccountState {
    fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut state = AccountState::default();
        let mut pos = 0;
        while pos < bytes.len() {
            let (field, wire_type) = get_tag(bytes, &mut pos)?;
            match (field, wire_type) {
                (1, 0) => state.nonce = get_varint(bytes, &mut pos)?,
                (2, 0) => state.balance = get_varint(bytes, &mut pos)?,
                (3, 2) => state.code_hash = Some(Hash::from_slice(get_length_delimited(bytes, &mut pos)?)),
                (4, 2) => {
                    state.storage_root = Some(Hash::from_slice(get_length_delimited(bytes, &mut pos)?))
                }
                (_, 0) => {
                    get_varint(bytes, &mut pos)?;
                }
                (_, 2) => {
                    get_length_delimited(bytes, &mut pos)?;
                }
                _ => return Err(DecodeError::MalformedVarint),
            }
        }
        Ok(state)
    }
}

/// Field tags: 1 = name (string), 2 = args (repeated bytes). Must not be renumbered.
impl Serializable for CallInfo {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_bytes_field(&mut buf, 1, self.name.as_bytes());
        for arg in &self.args {
            put_bytes_field(&mut buf, 2, arg);
        }
        buf
    }
}

impl Deserializable for CallInfo {
    fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut name = String::new();
        let mut args = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let (field, wire_type) = get_tag(bytes, &mut pos)?;
            match (field, wire_type) {
                (1, 2) => {
                    let raw = get_length_delimited(bytes, &mut pos)?;
                    name = String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8)?;
                }
                (2, 2) => {
                    let raw = get_length_delimited(bytes, &mut pos)?;
                    args.push(raw.to_vec());
                }
                (_, 0) => {
                    get_varint(bytes, &mut pos)?;
                }
                (_, 2) => {
                    get_length_delimited(bytes, &mut pos)?;
                }
                _ => return Err(DecodeError::MalformedVarint),
            }
        }
        Ok(CallInfo { name, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_state_round_trips() {
        let state = AccountState {
            nonce: 8,
            balance: 800,
            code_hash: Some(Hash::from_slice(b"some code hash padded to 32 byte")),
            storage_root: None,
        };
        let encoded = state.serialize();
        let decoded = AccountState::deserialize(&encoded).unwrap();
        assert_eq!(state, decoded);
    }

    #[test]
    fn account_state_defaults_round_trip() {
        let state = AccountState::default();
        let encoded = state.serialize();
        let decoded = AccountState::deserialize(&encoded).unwrap();
        assert_eq!(state, decoded);
    }

    #[test]
    fn call_info_round_trips_with_multiple_args() {
        let call = CallInfo {
            name: "invoke".to_string(),
            args: vec![b"abc".to_vec(), b"xyz".to_vec()],
        };
        let encoded = call.serialize();
        let decoded = CallInfo::deserialize(&encoded).unwrap();
        assert_eq!(call, decoded);
    }
}
