/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Contract-account state and the Wasm VM driver built on top of it.

pub mod state;
pub mod vm;

pub use state::{commit_contract_state, ContractState};
pub use vm::driver::{call, create, CreateOutcome, ExecutionOutcome};
