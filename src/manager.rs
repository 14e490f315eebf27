/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [StateManager]: the single entry point onto the world trie, backed by one write buffer and
//! one byte store, guarded by a reader/writer lock so many readers can observe a consistent
//! view while at most one writer stages mutations.

use std::sync::RwLock;

use crate::buffer::{BufferValue, Snapshot, WriteBuffer};
use crate::codec::{Deserializable, Serializable};
use crate::error::CoreError;
use crate::hash::{AccountId, Hash, HashAlgorithm};
use crate::store::ByteStore;
use crate::trie::{MerkleProof, SparseMerkleTrie, Trie};
use crate::types::AccountState;

struct Inner<S: ByteStore> {
    trie: SparseMerkleTrie<S>,
    buffer: WriteBuffer,
    store: S,
    hasher: HashAlgorithm,
}

/// Owns the world trie and its pending write buffer. Every read first consults the buffer,
/// then the trie, then falls back to the byte store; every write lands in the buffer and
/// becomes visible to subsequent reads immediately, whether or not it has been committed.
pub struct StateManager<S: ByteStore> {
    inner: RwLock<Inner<S>>,
}

impl<S: ByteStore> StateManager<S> {
    pub fn new(hasher: HashAlgorithm, store: S) -> Self {
        let trie = SparseMerkleTrie::new(None, hasher, store.clone());
        StateManager {
            inner: RwLock::new(Inner {
                trie,
                buffer: WriteBuffer::new(hasher),
                store,
                hasher,
            }),
        }
    }

    /// Opens a manager already rooted at a previously committed world-trie root.
    pub fn open(hasher: HashAlgorithm, store: S, root: Hash) -> Self {
        let trie = SparseMerkleTrie::new(Some(root), hasher, store.clone());
        StateManager {
            inner: RwLock::new(Inner {
                trie,
                buffer: WriteBuffer::new(hasher),
                store,
                hasher,
            }),
        }
    }

    pub fn root(&self) -> Option<Hash> {
        self.inner.read().unwrap().trie.root()
    }

    /// Clones the handle to the underlying byte store, e.g. so a [crate::contract::state::ContractState]
    /// can share it for its own storage trie and content-addressed code.
    pub fn store(&self) -> S {
        self.inner.read().unwrap().store.clone()
    }

    pub fn hasher(&self) -> HashAlgorithm {
        self.inner.read().unwrap().hasher
    }

    /// Reads `key`, checking the buffer before the trie before the byte store. Absent values
    /// resolve to an empty byte vector, never an error. Rejects `Hash::EMPTY`.
    pub fn get_state(&self, key: Hash) -> Result<Vec<u8>, CoreError> {
        if key.is_empty() {
            return Err(CoreError::InvalidArgs);
        }
        let inner = self.inner.read().unwrap();
        Ok(Self::read_through(&inner, key))
    }

    fn read_through(inner: &Inner<S>, key: Hash) -> Vec<u8> {
        if let Some(value) = inner.buffer.get(key) {
            return match value {
                BufferValue::Bytes(bytes) => bytes.clone(),
                BufferValue::Encoded(record) => record.serialize(),
                BufferValue::Preimage(_, bytes) => bytes.clone(),
            };
        }
        match inner.trie.get(key) {
            Some(value_hash) => crate::store::load_data(&inner.store, value_hash.as_bytes()),
            None => Vec::new(),
        }
    }

    /// Reads and decodes an account record. A never-written account decodes as
    /// [AccountState::default]. Rejects [AccountId::EMPTY].
    pub fn get_account_state(&self, account: AccountId) -> Result<AccountState, CoreError> {
        if account == AccountId::EMPTY {
            return Err(CoreError::InvalidArgs);
        }
        let bytes = self.get_state(account.0)?;
        if bytes.is_empty() {
            return Ok(AccountState::default());
        }
        AccountState::deserialize(&bytes).map_err(|e| CoreError::GetStateFailed(e.to_string()))
    }

    /// Stages a raw write. Returns the hash under which the value will be content-addressed.
    /// Rejects `Hash::EMPTY`.
    pub fn put_state(&self, key: Hash, value: Vec<u8>) -> Result<Hash, CoreError> {
        if key.is_empty() {
            return Err(CoreError::InvalidArgs);
        }
        let mut inner = self.inner.write().unwrap();
        Ok(inner.buffer.put(key, BufferValue::Bytes(value)))
    }

    /// Stages an account record write. Rejects [AccountId::EMPTY].
    pub fn put_account_state(&self, account: AccountId, state: AccountState) -> Result<Hash, CoreError> {
        if account == AccountId::EMPTY {
            return Err(CoreError::InvalidArgs);
        }
        let mut inner = self.inner.write().unwrap();
        Ok(inner.buffer.put(account.0, BufferValue::Encoded(state)))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.read().unwrap().buffer.snapshot()
    }

    pub fn rollback(&self, snapshot: Snapshot) {
        self.inner.write().unwrap().buffer.rollback(snapshot);
    }

    /// Folds every buffered write into the trie and returns the new root. The buffer is left
    /// intact so `get_state` keeps serving buffered values until [StateManager::commit].
    pub fn update(&self) -> Result<Hash, CoreError> {
        let mut inner = self.inner.write().unwrap();
        let (keys, hashes) = inner.buffer.export();
        inner.trie.update(&keys, &hashes)
    }

    /// Persists trie nodes and buffered values to the byte store, then clears the buffer.
    /// Callers normally call [StateManager::update] first so the root reflects this commit.
    pub fn commit(&self) -> Result<(), CoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.trie.commit()?;
        let store = inner.store.clone();
        inner.buffer.commit(&store)?;
        inner.buffer.reset();
        log::debug!("committed state, root is now {:?}", inner.trie.root());
        Ok(())
    }

    /// Repoints the trie at `root` without touching the node cache or the buffer. Fails with
    /// [CoreError::InvalidRoot] if `root` cannot be resolved.
    pub fn set_root(&self, root: Hash) -> Result<(), CoreError> {
        self.inner.write().unwrap().trie.set_root(Some(root))
    }

    /// Preloads the node cache for `root`, letting reads against it resolve without falling
    /// back to the byte store for the first layer.
    pub fn load_cache(&self, root: Hash) -> Result<(), CoreError> {
        self.inner.write().unwrap().trie.load_cache(root)
    }

    /// Discards the pending buffer and repoints the trie at a previously committed root.
    pub fn revert(&self, root: Hash) -> Result<(), CoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.buffer.reset();
        inner.trie.load_cache(root)
    }

    pub fn get_state_and_proof(&self, key: Hash) -> Result<(Vec<u8>, MerkleProof), CoreError> {
        let inner = self.inner.read().unwrap();
        let value = Self::read_through(&inner, key);
        let proof = inner.trie.merkle_proof(key)?;
        Ok((value, proof))
    }

    /// Loads `account`'s current view (buffer, then trie, then store) into a mutable handle
    /// whose changes are staged back with [StateManager::put_rolled_account_state].
    pub fn get_rolled_account_state(&self, account: AccountId) -> Result<RolledAccountState, CoreError> {
        let original = self.get_account_state(account)?;
        let is_new = original.is_empty();
        Ok(RolledAccountState {
            account_id: account,
            original: original.clone(),
            current: original,
            is_new,
            is_create: false,
        })
    }

    /// Starts a fresh account record for `account`, ignoring whatever, if anything, is
    /// currently stored for it. Used when deploying to a previously unused address.
    pub fn create_rolled_account_state(&self, account: AccountId) -> RolledAccountState {
        RolledAccountState {
            account_id: account,
            original: AccountState::default(),
            current: AccountState::default(),
            is_new: true,
            is_create: true,
        }
    }

    /// Stages `rolled.state()` back into the buffer under its account id.
    pub fn put_rolled_account_state(&self, rolled: RolledAccountState) -> Result<Hash, CoreError> {
        self.put_account_state(rolled.account_id, rolled.current)
    }
}

impl<S: ByteStore> Clone for StateManager<S> {
    /// Returns a new manager sharing the store, hasher and current root, with a fresh, empty
    /// write buffer: whatever this manager has staged but not yet committed is not visible to
    /// the clone.
    fn clone(&self) -> Self {
        let inner = self.inner.read().unwrap();
        StateManager {
            inner: RwLock::new(Inner {
                trie: SparseMerkleTrie::new(inner.trie.root(), inner.hasher, inner.store.clone()),
                buffer: WriteBuffer::new(inner.hasher),
                store: inner.store.clone(),
                hasher: inner.hasher,
            }),
        }
    }
}

/// A mutable, in-flight view of one account's state, read once and staged back once.
///
/// `is_new` is set when the account had no prior record at all; `is_create` is set only when
/// the view was explicitly started via [StateManager::create_rolled_account_state], e.g. when
/// deploying a contract to a fresh address.
pub struct RolledAccountState {
    account_id: AccountId,
    original: AccountState,
    current: AccountState,
    is_new: bool,
    is_create: bool,
}

impl RolledAccountState {
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_create(&self) -> bool {
        self.is_create
    }

    pub fn state(&self) -> &AccountState {
        &self.current
    }

    pub fn add_balance(&mut self, amount: u64) {
        self.current.balance = self.current.balance.saturating_add(amount);
    }

    pub fn sub_balance(&mut self, amount: u64) -> Result<(), CoreError> {
        self.current.balance = self
            .current
            .balance
            .checked_sub(amount)
            .ok_or(CoreError::InvalidArgs)?;
        Ok(())
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.current.nonce = nonce;
    }

    pub fn set_code_hash(&mut self, code_hash: Hash) {
        self.current.code_hash = Some(code_hash);
    }

    pub fn set_storage_root(&mut self, storage_root: Hash) {
        self.current.storage_root = Some(storage_root);
    }

    /// Discards every mutation made since this view was loaded.
    pub fn reset(&mut self) {
        self.current = self.original.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn manager() -> StateManager<InMemoryStore> {
        StateManager::new(HashAlgorithm::Sha3_256, InMemoryStore::new())
    }

    #[test]
    fn fresh_manager_has_no_root_and_no_values() {
        let m = manager();
        assert_eq!(m.root(), None);
        assert_eq!(m.get_state(Hash::from_slice(b"k")).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn put_then_get_before_commit_reads_buffer() {
        let m = manager();
        let key = Hash::from_slice(b"k");
        m.put_state(key, b"v".to_vec()).unwrap();
        assert_eq!(m.get_state(key).unwrap(), b"v".to_vec());
        assert_eq!(m.root(), None);
    }

    #[test]
    fn update_and_commit_persist_across_reopen() {
        let store = InMemoryStore::new();
        let key = Hash::from_slice(b"k");
        let root = {
            let m = StateManager::new(HashAlgorithm::Sha3_256, store.clone());
            m.put_state(key, b"v".to_vec()).unwrap();
            let root = m.update().unwrap();
            m.commit().unwrap();
            root
        };

        let reopened = StateManager::open(HashAlgorithm::Sha3_256, store, root);
        assert_eq!(reopened.get_state(key).unwrap(), b"v".to_vec());
    }

    #[test]
    fn rollback_undoes_buffered_writes() {
        let m = manager();
        let key = Hash::from_slice(b"k");
        let snap = m.snapshot();
        m.put_state(key, b"v".to_vec()).unwrap();
        m.rollback(snap);
        assert_eq!(m.get_state(key).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn account_state_round_trips_through_rolled_view() {
        let m = manager();
        let account = HashAlgorithm::Sha3_256.account_id(b"alice");

        let mut rolled = m.create_rolled_account_state(account);
        assert!(rolled.is_new());
        assert!(rolled.is_create());
        rolled.add_balance(100);
        rolled.set_nonce(1);
        m.put_rolled_account_state(rolled).unwrap();

        let reloaded = m.get_rolled_account_state(account).unwrap();
        assert!(!reloaded.is_new());
        assert_eq!(reloaded.state().balance, 100);
        assert_eq!(reloaded.state().nonce, 1);
    }

    #[test]
    fn sub_balance_rejects_overdraft() {
        let m = manager();
        let account = HashAlgorithm::Sha3_256.account_id(b"bob");
        let mut rolled = m.create_rolled_account_state(account);
        rolled.add_balance(10);
        assert!(rolled.sub_balance(20).is_err());
        assert_eq!(rolled.state().balance, 10);
    }

    #[test]
    fn clone_is_independent_of_original() {
        let m = manager();
        let key = Hash::from_slice(b"k");
        m.put_state(key, b"v".to_vec()).unwrap();

        let cloned = m.clone();
        cloned.put_state(key, b"other".to_vec()).unwrap();

        assert_eq!(m.get_state(key).unwrap(), b"v".to_vec());
        assert_eq!(cloned.get_state(key).unwrap(), b"other".to_vec());
    }

    #[test]
    fn revert_discards_buffer_and_repoints_trie() {
        let store = InMemoryStore::new();
        let key = Hash::from_slice(b"k");
        let m = StateManager::new(HashAlgorithm::Sha3_256, store);
        m.put_state(key, b"v".to_vec()).unwrap();
        let root = m.update().unwrap();
        m.commit().unwrap();

        m.put_state(key, b"uncommitted".to_vec()).unwrap();
        m.revert(root).unwrap();
        assert_eq!(m.get_state(key).unwrap(), b"v".to_vec());
    }
}
