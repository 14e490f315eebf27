/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The write buffer: a snapshottable, index-backed append-log staging pending writes before
//! they reach a trie.
//!
//! A single global vector of entries plus a `key -> stack of positions` index is the canonical
//! representation: the per-key position stack is a list of monotonically increasing integers,
//! and rollback truncates both the vector and every stack from the tail.

use std::collections::HashMap;

use crate::codec::Serializable;
use crate::error::CoreError;
use crate::hash::{Hash, HashAlgorithm};
use crate::store::ByteStore;
use crate::types::AccountState;

/// The three shapes a buffered value can take, expressed as a tagged variant so
/// serialisation dispatches on the tag rather than through runtime reflection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferValue {
    /// A raw byte buffer, written to the store as-is.
    Bytes(Vec<u8>),
    /// A structured record with a wire codec.
    Encoded(AccountState),
    /// A value that advertises its own hash: the hash is used directly and these bytes are
    /// written verbatim at commit time without being re-hashed.
    Preimage(Hash, Vec<u8>),
}

impl BufferValue {
    fn hash_with(&self, hasher: &HashAlgorithm) -> Hash {
        match self {
            BufferValue::Bytes(bytes) => hasher.hash_one(bytes),
            BufferValue::Encoded(record) => hasher.hash_one(&record.serialize()),
            BufferValue::Preimage(hash, _) => *hash,
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        match self {
            BufferValue::Bytes(bytes) => bytes.clone(),
            BufferValue::Encoded(record) => record.serialize(),
            BufferValue::Preimage(_, bytes) => bytes.clone(),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BufferValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_account_state(&self) -> Option<&AccountState> {
        match self {
            BufferValue::Encoded(record) => Some(record),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct BufferEntry {
    key: Hash,
    value_hash: Hash,
    value: BufferValue,
}

/// An opaque revision number marking buffer length, returned by [WriteBuffer::snapshot] and
/// consumed by [WriteBuffer::rollback].
pub type Snapshot = usize;

/// A snapshottable append-log of `(key, value-hash, value)` entries.
#[derive(Clone)]
pub struct WriteBuffer {
    entries: Vec<BufferEntry>,
    /// For every key, the stack of positions in `entries` at which it was written, strictly
    /// increasing; the top is the most recent write.
    index: HashMap<Hash, Vec<usize>>,
    hasher: HashAlgorithm,
}

impl WriteBuffer {
    pub fn new(hasher: HashAlgorithm) -> Self {
        WriteBuffer {
            entries: Vec::new(),
            index: HashMap::new(),
            hasher,
        }
    }

    /// Appends a write and returns the resulting value hash.
    pub fn put(&mut self, key: Hash, value: BufferValue) -> Hash {
        let value_hash = value.hash_with(&self.hasher);
        let position = self.entries.len();
        self.entries.push(BufferEntry { key, value_hash, value });
        self.index.entry(key).or_default().push(position);
        value_hash
    }

    /// Returns the latest write to `key`, if any.
    pub fn get(&self, key: Hash) -> Option<&BufferValue> {
        let position = *self.index.get(&key)?.last()?;
        Some(&self.entries[position].value)
    }

    /// Current length of the entry log; feeds [WriteBuffer::rollback].
    pub fn snapshot(&self) -> Snapshot {
        self.entries.len()
    }

    /// Truncates the log back to `snapshot`, restoring the buffer to exactly the state it was
    /// in immediately after the `snapshot()` call that returned that value.
    pub fn rollback(&mut self, snapshot: Snapshot) {
        self.entries.truncate(snapshot);
        self.index.retain(|_, positions| {
            positions.retain(|&position| position < snapshot);
            !positions.is_empty()
        });
    }

    /// Equivalent to `rollback(0)`.
    pub fn reset(&mut self) {
        self.rollback(0);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Produces two parallel arrays of `(key_bytes, value_hash_bytes)`, one row per distinct
    /// key holding its latest write, sorted ascending by key. Feeds the trie, whose root must
    /// be a deterministic function of this ordering.
    pub fn export(&self) -> (Vec<Hash>, Vec<Hash>) {
        let mut latest: Vec<(Hash, Hash)> = self
            .index
            .iter()
            .filter_map(|(key, positions)| {
                positions.last().map(|&position| (*key, self.entries[position].value_hash))
            })
            .collect();
        latest.sort_by_key(|(key, _)| *key);
        latest.into_iter().unzip()
    }

    /// Writes `value_hash -> serialized value` for each distinct key's latest entry, in a
    /// single transaction.
    pub fn commit<S: ByteStore>(&self, store: &S) -> Result<(), CoreError> {
        let mut tx = store.new_tx();
        for positions in self.index.values() {
            if let Some(&position) = positions.last() {
                let entry = &self.entries[position];
                tx.set(entry.value_hash.as_bytes(), &entry.value.to_bytes());
            }
        }
        tx.commit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn key(s: &str) -> Hash {
        Hash::from_slice(s.as_bytes())
    }

    #[test]
    fn read_your_writes() {
        let mut buf = WriteBuffer::new(HashAlgorithm::Sha3_256);
        buf.put(key("k"), BufferValue::Bytes(b"v1".to_vec()));
        assert_eq!(buf.get(key("k")).unwrap().as_bytes(), Some(&b"v1"[..]));
        buf.put(key("k"), BufferValue::Bytes(b"v2".to_vec()));
        assert_eq!(buf.get(key("k")).unwrap().as_bytes(), Some(&b"v2"[..]));
    }

    #[test]
    fn snapshot_rollback_round_trip() {
        let mut buf = WriteBuffer::new(HashAlgorithm::Sha3_256);
        let s0 = buf.snapshot();
        buf.put(key("a"), BufferValue::Bytes(b"1".to_vec()));
        let s1 = buf.snapshot();
        buf.put(key("a"), BufferValue::Bytes(b"2".to_vec()));
        assert_eq!(buf.get(key("a")).unwrap().as_bytes(), Some(&b"2"[..]));

        buf.rollback(s1);
        assert_eq!(buf.get(key("a")).unwrap().as_bytes(), Some(&b"1"[..]));

        buf.rollback(s0);
        assert!(buf.get(key("a")).is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn export_is_sorted_and_deduplicated() {
        let mut buf = WriteBuffer::new(HashAlgorithm::Sha3_256);
        buf.put(key("zebra"), BufferValue::Bytes(b"1".to_vec()));
        buf.put(key("apple"), BufferValue::Bytes(b"2".to_vec()));
        buf.put(key("apple"), BufferValue::Bytes(b"3".to_vec()));

        let (keys, hashes) = buf.export();
        assert_eq!(keys.len(), 2);
        assert!(keys[0] < keys[1]);
        let expected_apple_hash = HashAlgorithm::Sha3_256.hash_one(b"3");
        let apple_index = keys.iter().position(|k| *k == key("apple")).unwrap();
        assert_eq!(hashes[apple_index], expected_apple_hash);
    }

    #[test]
    fn commit_persists_latest_value_per_key() {
        let mut buf = WriteBuffer::new(HashAlgorithm::Sha3_256);
        buf.put(key("k"), BufferValue::Bytes(b"first".to_vec()));
        let second_hash = buf.put(key("k"), BufferValue::Bytes(b"second".to_vec()));

        let store = InMemoryStore::new();
        buf.commit(&store).unwrap();

        assert_eq!(store.get(second_hash.as_bytes()), Some(b"second".to_vec()));
    }

    #[test]
    fn reset_is_rollback_to_zero() {
        let mut buf = WriteBuffer::new(HashAlgorithm::Sha3_256);
        buf.put(key("k"), BufferValue::Bytes(b"v".to_vec()));
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.snapshot(), 0);
    }
}
