/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [Env]: the `WasmerEnv` shared between the host and a running guest instance. Holds the
//! contract's state behind a lock so every host function call sees a consistent view and
//! mutations made by one call are visible to the next.

use std::sync::{Arc, Mutex};

use wasmer::{LazyInit, Memory, WasmerEnv};

use crate::contract::state::ContractState;
use crate::store::ByteStore;

#[derive(WasmerEnv, Clone)]
pub struct Env<S: ByteStore + Send + Sync + 'static> {
    #[wasmer(export)]
    memory: LazyInit<Memory>,
    contract: Arc<Mutex<ContractState<S>>>,
}

impl<S: ByteStore + Send + Sync + 'static> Env<S> {
    pub fn new(contract: ContractState<S>) -> Self {
        Env {
            memory: LazyInit::new(),
            contract: Arc::new(Mutex::new(contract)),
        }
    }

    pub fn memory(&self) -> &Memory {
        self.memory.get_ref().expect("memory export not initialized before host call")
    }

    pub fn with_contract<R>(&self, f: impl FnOnce(&mut ContractState<S>) -> R) -> R {
        let mut contract = self.contract.lock().unwrap();
        f(&mut contract)
    }

    /// Unwraps the shared contract state back out once the instance is no longer running.
    /// Panics if a clone of this `Env` escaped the call that owns it.
    pub fn into_contract(self) -> ContractState<S> {
        Arc::try_unwrap(self.contract)
            .unwrap_or_else(|_| panic!("Env outlived the instance that owns it"))
            .into_inner()
            .unwrap()
    }
}
