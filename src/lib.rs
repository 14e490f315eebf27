/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Deterministic Wasm execution and Merkle-authenticated account state, the core a
//! smart-contract platform builds its transition function on top of.
//!
//! [manager::StateManager] owns the world trie and exposes raw key/value access plus
//! [manager::RolledAccountState] for simple account bookkeeping. [contract::ContractState]
//! layers a per-account code-and-storage view on top of it, and [contract::vm] is the Wasm
//! driver that runs contract bytecode against that view under gas metering.

pub mod buffer;
pub mod codec;
pub mod contract;
pub mod error;
pub mod gas;
pub mod hash;
pub mod manager;
pub mod store;
pub mod trie;
pub mod types;

pub use codec::{Deserializable, Serializable};
pub use contract::{call, create, commit_contract_state, ContractState, CreateOutcome, ExecutionOutcome};
pub use error::CoreError;
pub use hash::{AccountId, Hash, HashAlgorithm};
pub use manager::{RolledAccountState, StateManager};
pub use store::{ByteStore, InMemoryStore, StoreTx};
pub use trie::{MerkleProof, SparseMerkleTrie, Trie};
pub use types::{AccountState, Address, CallInfo};
