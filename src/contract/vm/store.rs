/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Builds the Wasmer [Store] a single call is executed against: the Singlepass compiler (for
//! deterministic, allocation-free compilation) wrapped with a [Metering] middleware charging
//! one unit of gas per instruction, and a [CustomTunables] capping guest linear memory and table
//! growth so a module cannot request unbounded host resources.

use std::sync::Arc;

use wasmer::{BaseTunables, Pages, Store, Target, Universal};
use wasmer_compiler_singlepass::Singlepass;
use wasmer_middlewares::Metering;

use super::custom_tunables::CustomTunables;
use crate::gas::wasm_opcode_gas_schedule;

/// Guest linear memory is capped at 128 Wasm pages (8 MiB).
const MAX_MEMORY_PAGES: u32 = 128;
/// Guest tables are capped at 65536 elements, the largest a Wasm table index can address.
const MAX_TABLE_ELEMENTS: u32 = 65536;

/// Builds a fresh `Store` metered at `gas_limit`. One store is used per call; stores are not
/// reused across calls since the metering middleware's remaining-points counter is per-store.
pub fn instantiate_store(gas_limit: u64) -> Store {
    let metering = Arc::new(Metering::new(gas_limit, wasm_opcode_gas_schedule));
    let mut compiler = Singlepass::default();
    compiler.push_middleware(metering);
    let engine = Universal::new(compiler).engine();

    let base_tunables = BaseTunables::for_target(&Target::default());
    let tunables = CustomTunables::new(base_tunables, Pages(MAX_MEMORY_PAGES), MAX_TABLE_ELEMENTS);
    Store::new_with_tunables(&engine, tunables)
}
