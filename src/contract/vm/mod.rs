/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The Wasm virtual machine: deterministic, metered execution of contract bytecode against a
//! [crate::contract::state::ContractState].

mod custom_tunables;
pub mod driver;
mod env;
mod host_functions;
mod instance;
mod memory;
mod module;
mod store;
