/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The `env` module's host functions: `_get_len`, `_get` and `_set`, the only way a guest
//! contract touches its own storage.

use super::env::Env;
use super::memory;
use crate::store::ByteStore;

/// Returns the byte length of the value stored at `key`, or `-1` if the key could not be read
/// from guest memory.
pub fn get_len<S: ByteStore + Send + Sync + 'static>(env: &Env<S>, key_ptr: u32, key_len: u32) -> i64 {
    let key = match memory::read_bytes(env.memory(), key_ptr, key_len) {
        Ok(bytes) => bytes,
        Err(_) => return -1,
    };
    let value_len = env.with_contract(|contract| contract.get_data(&key).len());
    value_len as i64
}

/// Writes the value stored at `key` into guest memory at `out_ptr`. Returns `1` on success, `-1`
/// on a memory fault.
pub fn get<S: ByteStore + Send + Sync + 'static>(env: &Env<S>, key_ptr: u32, key_len: u32, out_ptr: u32) -> i64 {
    let key = match memory::read_bytes(env.memory(), key_ptr, key_len) {
        Ok(bytes) => bytes,
        Err(_) => return -1,
    };
    let value = env.with_contract(|contract| contract.get_data(&key));
    match memory::write_bytes(env.memory(), out_ptr, &value) {
        Ok(()) => 1,
        Err(_) => -1,
    }
}

/// Stages a write of `value` under `key`. Returns `1` on success, `-1` on a memory fault.
pub fn set<S: ByteStore + Send + Sync + 'static>(
    env: &Env<S>,
    key_ptr: u32,
    key_len: u32,
    val_ptr: u32,
    val_len: u32,
) -> i64 {
    let key = match memory::read_bytes(env.memory(), key_ptr, key_len) {
        Ok(bytes) => bytes,
        Err(_) => return -1,
    };
    let value = match memory::read_bytes(env.memory(), val_ptr, val_len) {
        Ok(bytes) => bytes,
        Err(_) => return -1,
    };
    env.with_contract(|contract| contract.set_data(&key, value));
    1
}
