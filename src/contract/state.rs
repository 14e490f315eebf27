/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [ContractState]: a single contract account's view onto its own code and storage trie.
//!
//! Code is content-addressed: `set_code` stores the bytecode under `H(code)` and records that
//! hash on the account record, so identical bytecode deployed by two accounts shares one copy
//! in the byte store. Storage keys are likewise hashed before they reach the trie.

use crate::buffer::{BufferValue, WriteBuffer};
use crate::error::CoreError;
use crate::hash::{AccountId, Hash, HashAlgorithm};
use crate::manager::StateManager;
use crate::store::ByteStore;
use crate::trie::{SparseMerkleTrie, Trie};
use crate::types::AccountState;

pub struct ContractState<S: ByteStore> {
    account: AccountId,
    account_state: AccountState,
    storage: SparseMerkleTrie<S>,
    buffer: WriteBuffer,
    store: S,
    hasher: HashAlgorithm,
}

impl<S: ByteStore> ContractState<S> {
    /// Loads `account`'s current record from `manager` and opens its storage trie at whatever
    /// `storage_root` that record holds (`None` for an account with no storage yet).
    pub fn load(manager: &StateManager<S>, account: AccountId) -> Result<Self, CoreError> {
        let store = manager.store();
        let hasher = manager.hasher();
        let account_state = manager.get_account_state(account)?;
        let storage = SparseMerkleTrie::new(account_state.storage_root, hasher, store.clone());
        Ok(ContractState {
            account,
            account_state,
            storage,
            buffer: WriteBuffer::new(hasher),
            store,
            hasher,
        })
    }

    pub fn account_id(&self) -> AccountId {
        self.account
    }

    pub fn nonce(&self) -> u64 {
        self.account_state.nonce
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.account_state.nonce = nonce;
    }

    pub fn balance(&self) -> u64 {
        self.account_state.balance
    }

    pub fn add_balance(&mut self, amount: u64) {
        self.account_state.balance = self.account_state.balance.saturating_add(amount);
    }

    pub fn sub_balance(&mut self, amount: u64) -> Result<(), CoreError> {
        self.account_state.balance = self
            .account_state
            .balance
            .checked_sub(amount)
            .ok_or(CoreError::InvalidArgs)?;
        Ok(())
    }

    pub fn code_hash(&self) -> Option<Hash> {
        self.account_state.code_hash
    }

    pub fn storage_root(&self) -> Option<Hash> {
        self.storage.root()
    }

    /// Writes `code` to the byte store under `H(code)` and records that hash as this account's
    /// code hash. Returns the hash.
    pub fn set_code(&mut self, code: &[u8]) -> Hash {
        let hash = self.hasher.hash_one(code);
        crate::store::save_data(&self.store, hash.as_bytes(), code)
            .expect("content hash is never an empty key");
        self.account_state.code_hash = Some(hash);
        hash
    }

    /// Returns the account's deployed bytecode, or an empty vector if none is set.
    pub fn get_code(&self) -> Vec<u8> {
        match self.account_state.code_hash {
            Some(hash) => crate::store::load_data(&self.store, hash.as_bytes()),
            None => Vec::new(),
        }
    }

    /// Stages a write to `user_key`, hashed before it reaches the buffer/trie so storage keys
    /// never leak their plaintext length or prefix into the trie's branching structure.
    pub fn set_data(&mut self, user_key: &[u8], value: Vec<u8>) {
        let key = self.hasher.hash_one(user_key);
        self.buffer.put(key, BufferValue::Bytes(value));
    }

    /// Reads `user_key`, checking the buffer before the storage trie before the byte store.
    /// Absent keys resolve to an empty byte vector, never an error.
    pub fn get_data(&self, user_key: &[u8]) -> Vec<u8> {
        let key = self.hasher.hash_one(user_key);
        if let Some(value) = self.buffer.get(key) {
            return match value {
                BufferValue::Bytes(bytes) => bytes.clone(),
                BufferValue::Encoded(record) => crate::codec::Serializable::serialize(record),
                BufferValue::Preimage(_, bytes) => bytes.clone(),
            };
        }
        match self.storage.get(key) {
            Some(value_hash) => crate::store::load_data(&self.store, value_hash.as_bytes()),
            None => Vec::new(),
        }
    }
}

/// Folds a [ContractState]'s pending storage writes into its trie, persists trie and buffer to
/// the byte store, and stages the resulting account record into `manager`'s own buffer.
/// Returns the hash under which that account record was staged.
///
/// A contract that never called `set_data` has an empty buffer; in that case this skips the
/// trie update entirely rather than turning an absent storage root into the hash of a freshly
/// committed empty tree.
pub fn commit_contract_state<S: ByteStore>(
    manager: &StateManager<S>,
    mut contract: ContractState<S>,
) -> Result<Hash, CoreError> {
    if !contract.buffer.is_empty() {
        let (keys, hashes) = contract.buffer.export();
        contract.storage.update(&keys, &hashes)?;
        contract.storage.commit()?;
        contract.buffer.commit(&contract.store)?;
        contract.account_state.storage_root = contract.storage.root();
    }

    manager.put_account_state(contract.account, contract.account_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn setup() -> (StateManager<InMemoryStore>, AccountId) {
        let store = InMemoryStore::new();
        let manager = StateManager::new(HashAlgorithm::Sha3_256, store);
        let account = HashAlgorithm::Sha3_256.account_id(b"contract-one");
        (manager, account)
    }

    #[test]
    fn fresh_contract_has_no_code_and_empty_data() {
        let (manager, account) = setup();
        let contract = ContractState::load(&manager, account).unwrap();
        assert_eq!(contract.code_hash(), None);
        assert_eq!(contract.get_code(), Vec::<u8>::new());
        assert_eq!(contract.get_data(b"key"), Vec::<u8>::new());
    }

    #[test]
    fn set_code_is_content_addressed() {
        let (manager, account) = setup();
        let mut contract = ContractState::load(&manager, account).unwrap();
        let code = b"\x00asm fake wasm bytes";
        let hash = contract.set_code(code);
        assert_eq!(contract.code_hash(), Some(hash));
        assert_eq!(contract.get_code(), code.to_vec());
    }

    #[test]
    fn set_data_visible_before_commit() {
        let (manager, account) = setup();
        let mut contract = ContractState::load(&manager, account).unwrap();
        contract.set_data(b"counter", b"1".to_vec());
        assert_eq!(contract.get_data(b"counter"), b"1".to_vec());
    }

    #[test]
    fn commit_persists_code_and_data_across_reload() {
        let store = InMemoryStore::new();
        let manager = StateManager::new(HashAlgorithm::Sha3_256, store.clone());
        let account = HashAlgorithm::Sha3_256.account_id(b"contract-two");

        let mut contract = ContractState::load(&manager, account).unwrap();
        contract.set_code(b"code-bytes");
        contract.set_data(b"k", b"v".to_vec());
        contract.set_nonce(1);
        commit_contract_state(&manager, contract).unwrap();
        manager.update().unwrap();
        manager.commit().unwrap();

        let reloaded = ContractState::load(&manager, account).unwrap();
        assert_eq!(reloaded.get_code(), b"code-bytes".to_vec());
        assert_eq!(reloaded.get_data(b"k"), b"v".to_vec());
        assert_eq!(reloaded.nonce(), 1);
    }

    #[test]
    fn sub_balance_rejects_overdraft() {
        let (manager, account) = setup();
        let mut contract = ContractState::load(&manager, account).unwrap();
        assert!(contract.sub_balance(1).is_err());
    }
}
