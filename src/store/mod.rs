/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The byte-store adapter: a thin, transactional key/value map.
//!
//! The underlying embedded key/value store is treated as an external collaborator, specified
//! only to the depth needed to reimplement the core. [ByteStore] and [StoreTx] are that
//! contract; [InMemoryStore] is a reference implementation used by this crate's own tests and
//! suitable as a default for callers embedding this crate without a production store of their
//! own.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A transactional byte-map. Implementations are expected to be cheap to `Clone` (an `Arc`
/// around shared storage) so a [crate::manager::StateManager::clone] can share the underlying
/// store.
pub trait ByteStore: Clone {
    type Tx: StoreTx;

    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn new_tx(&self) -> Self::Tx;
}

/// A single round of writes, committed or discarded as a unit.
pub trait StoreTx {
    fn set(&mut self, key: &[u8], value: &[u8]);
    fn commit(self);
    fn discard(self);
}

/// An in-memory [ByteStore] backed by a shared, mutex-guarded map.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteStore for InMemoryStore {
    type Tx = InMemoryTx;

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    fn new_tx(&self) -> InMemoryTx {
        InMemoryTx {
            store: self.inner.clone(),
            pending: HashMap::new(),
        }
    }
}

pub struct InMemoryTx {
    store: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
    pending: HashMap<Vec<u8>, Vec<u8>>,
}

impl StoreTx for InMemoryTx {
    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.pending.insert(key.to_vec(), value.to_vec());
    }

    fn commit(self) {
        let mut store = self.store.lock().unwrap();
        for (key, value) in self.pending {
            store.insert(key, value);
        }
    }

    fn discard(self) {
        // pending writes are simply dropped.
    }
}

/// Saves `value` under `key`. Rejects empty keys.
pub fn save_data<S: ByteStore>(store: &S, key: &[u8], value: &[u8]) -> Result<(), crate::error::CoreError> {
    if key.is_empty() {
        return Err(crate::error::CoreError::InvalidArgs);
    }
    let mut tx = store.new_tx();
    tx.set(key, value);
    tx.commit();
    Ok(())
}

/// Loads the value stored under `key`. Returns an empty byte vector (not an error) when the
/// key is absent.
pub fn load_data<S: ByteStore>(store: &S, key: &[u8]) -> Vec<u8> {
    store.get(key).unwrap_or_default()
}
