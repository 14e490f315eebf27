/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Bounds-checked reads and writes into a guest instance's linear memory.

use wasmer::{Array, Memory, WasmPtr};

use crate::error::CoreError;

pub fn read_bytes(memory: &Memory, ptr: u32, len: u32) -> Result<Vec<u8>, CoreError> {
    let wasm_ptr: WasmPtr<u8, Array> = WasmPtr::new(ptr);
    let cells = wasm_ptr
        .deref(memory, 0, len)
        .ok_or_else(|| CoreError::CreateVm(format!("out of bounds memory read at {ptr}, len {len}")))?;
    Ok(cells.iter().map(|cell| cell.get()).collect())
}

pub fn write_bytes(memory: &Memory, ptr: u32, bytes: &[u8]) -> Result<(), CoreError> {
    let wasm_ptr: WasmPtr<u8, Array> = WasmPtr::new(ptr);
    let cells = wasm_ptr
        .deref(memory, 0, bytes.len() as u32)
        .ok_or_else(|| CoreError::CreateVm(format!("out of bounds memory write at {ptr}, len {}", bytes.len())))?;
    for (cell, byte) in cells.iter().zip(bytes.iter()) {
        cell.set(*byte);
    }
    Ok(())
}
