/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines the account state record and the call descriptor, the two structured values the
//! wire codec ([crate::codec]) knows how to encode and decode.

use crate::hash::Hash;

/// An address is an opaque, variable-length byte string. The core does not interpret it;
/// account identity is `H(address)`, computed by [crate::hash::HashAlgorithm::account_id].
pub type Address = Vec<u8>;

/// The account state record, keyed by [crate::hash::AccountId] in the world trie.
///
/// `nonce` is stored as given: the core does not enforce monotonicity, that is a policy
/// decision for the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountState {
    pub nonce: u64,
    pub balance: u64,
    /// Hash of the contract bytecode, value-addressed in the byte store. Absent for
    /// non-contract accounts.
    pub code_hash: Option<Hash>,
    /// Root of the account's storage trie. Absent when storage is empty.
    pub storage_root: Option<Hash>,
}

impl AccountState {
    pub fn is_empty(&self) -> bool {
        *self == AccountState::default()
    }
}

/// Describes an invocation of one exported function of a deployed contract.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallInfo {
    pub name: String,
    pub args: Vec<Vec<u8>>,
}
