/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The sparse-Merkle trie contract.
//!
//! The trie library is treated as an external collaborator, specified only to the depth
//! needed to reimplement the core: `update(keys, vals) -> root`, `get(key) -> val`,
//! `commit()`, `prove(key)`. [Trie] is that contract and [SparseMerkleTrie] is this crate's
//! concrete implementation — a 256-level binary sparse Merkle tree with domain-separated
//! leaf/internal hashing and memoized empty-subtree hashes.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::hash::{Hash, HashAlgorithm};
use crate::store::ByteStore;

/// Number of bits in a [Hash] key, i.e. the depth of the binary trie.
const DEPTH: usize = 256;

const LEAF_DOMAIN: u8 = 0x00;
const INTERNAL_DOMAIN: u8 = 0x01;

/// One node of the trie, content-addressed by its own hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Node {
    Leaf { key: Hash, value_hash: Hash },
    Internal { left: Hash, right: Hash },
}

impl Node {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(65);
        match self {
            Node::Leaf { key, value_hash } => {
                buf.push(0);
                buf.extend_from_slice(key.as_bytes());
                buf.extend_from_slice(value_hash.as_bytes());
            }
            Node::Internal { left, right } => {
                buf.push(1);
                buf.extend_from_slice(left.as_bytes());
                buf.extend_from_slice(right.as_bytes());
            }
        }
        buf
    }

    fn decode(bytes: &[u8]) -> Option<Node> {
        if bytes.len() != 65 {
            return None;
        }
        let a = Hash::from_slice(&bytes[1..33]);
        let b = Hash::from_slice(&bytes[33..65]);
        match bytes[0] {
            0 => Some(Node::Leaf { key: a, value_hash: b }),
            1 => Some(Node::Internal { left: a, right: b }),
            _ => None,
        }
    }
}

fn bit_at(key: &Hash, index: usize) -> bool {
    let byte = key.0[index / 8];
    let shift = 7 - (index % 8);
    (byte >> shift) & 1 == 1
}

/// The minimal trie contract this crate depends on.
pub trait Trie {
    /// Current root, or `None` if nothing has ever been committed to the trie.
    fn root(&self) -> Option<Hash>;

    /// Replaces the root pointer without touching the node cache. Fails with
    /// [CoreError::InvalidRoot] if `root` is `Some` and does not resolve to an actual node
    /// (or one of the trie's implicit empty-subtree hashes).
    fn set_root(&mut self, root: Option<Hash>) -> Result<(), CoreError>;

    /// Returns the value-hash stored at `key`, or `None` if absent.
    fn get(&self, key: Hash) -> Option<Hash>;

    /// Applies a sorted batch of `(key, value_hash)` pairs and returns the new root.
    /// `keys` and `hashes` must be sorted ascending by key and the same length.
    fn update(&mut self, keys: &[Hash], hashes: &[Hash]) -> Result<Hash, CoreError>;

    /// Persists pending nodes into the byte store.
    fn commit(&mut self) -> Result<(), CoreError>;

    /// Preloads the first layer of the trie rooted at `root` into the node cache. Fails with
    /// [CoreError::InvalidRoot] if `root` does not resolve to an actual node (or one of the
    /// trie's implicit empty-subtree hashes).
    fn load_cache(&mut self, root: Hash) -> Result<(), CoreError>;

    /// Produces an inclusion/non-inclusion proof against the current root.
    fn merkle_proof(&self, key: Hash) -> Result<MerkleProof, CoreError>;

    /// Produces an inclusion/non-inclusion proof against a specified past root.
    fn merkle_proof_past(&self, key: Hash, root: Hash) -> Result<MerkleProof, CoreError>;
}

/// An inclusion or non-inclusion proof for one key.
#[derive(Clone, Debug)]
pub struct MerkleProof {
    pub audit_path: Vec<Hash>,
    pub is_included: bool,
    pub proof_key: Hash,
    pub proof_val: Hash,
}

/// A 256-level binary sparse Merkle trie keyed by [Hash], valued by [Hash].
#[derive(Clone)]
pub struct SparseMerkleTrie<S: ByteStore> {
    root: Option<Hash>,
    /// Pending (uncommitted) and previously-loaded nodes, keyed by node hash.
    nodes: HashMap<Hash, Node>,
    /// `default_hashes[d]` is the root hash of a fully empty subtree of depth `d`
    /// (`d` remaining levels above the leaf). `default_hashes[0] == Hash::EMPTY`.
    default_hashes: Vec<Hash>,
    store: S,
    hasher: HashAlgorithm,
}

impl<S: ByteStore> SparseMerkleTrie<S> {
    pub fn new(root: Option<Hash>, hasher: HashAlgorithm, store: S) -> Self {
        let mut default_hashes = Vec::with_capacity(DEPTH + 1);
        default_hashes.push(Hash::EMPTY);
        for d in 1..=DEPTH {
            let prev = default_hashes[d - 1];
            default_hashes.push(hasher.hash(&[&[INTERNAL_DOMAIN], prev.as_bytes(), prev.as_bytes()]));
        }
        SparseMerkleTrie {
            root,
            nodes: HashMap::new(),
            default_hashes,
            store,
            hasher,
        }
    }

    fn leaf_hash(&self, key: Hash, value_hash: Hash) -> Hash {
        self.hasher
            .hash(&[&[LEAF_DOMAIN], key.as_bytes(), value_hash.as_bytes()])
    }

    fn internal_hash(&self, left: Hash, right: Hash) -> Hash {
        self.hasher
            .hash(&[&[INTERNAL_DOMAIN], left.as_bytes(), right.as_bytes()])
    }

    /// Depth-from-root (remaining levels, including this one) at `bit_index`.
    fn remaining_levels(bit_index: usize) -> usize {
        DEPTH - bit_index
    }

    fn node_at(&self, hash: Hash) -> Option<Node> {
        if let Some(node) = self.nodes.get(&hash) {
            return Some(*node);
        }
        Node::decode(&self.store.get(hash.as_bytes())?)
    }

    /// `true` if `root` is a hash this trie can actually resolve: the empty-root sentinel, the
    /// implicit hash of a fully empty tree, or a node present in the cache or byte store.
    fn root_is_valid(&self, root: Hash) -> bool {
        root == Hash::EMPTY || root == self.default_hashes[DEPTH] || self.node_at(root).is_some()
    }

    fn children_of(&self, node_hash: Hash, bit_index: usize) -> (Hash, Hash) {
        let level_default = self.default_hashes[Self::remaining_levels(bit_index)];
        if node_hash == level_default {
            let child_default = self.default_hashes[Self::remaining_levels(bit_index) - 1];
            return (child_default, child_default);
        }
        match self.node_at(node_hash) {
            Some(Node::Internal { left, right }) => (left, right),
            _ => {
                let child_default = self.default_hashes[Self::remaining_levels(bit_index) - 1];
                (child_default, child_default)
            }
        }
    }

    fn update_rec(&mut self, node_hash: Hash, entries: &[(Hash, Hash)], bit_index: usize) -> Hash {
        if entries.is_empty() {
            return node_hash;
        }
        if bit_index == DEPTH {
            let (key, value_hash) = entries[entries.len() - 1];
            let lh = self.leaf_hash(key, value_hash);
            self.nodes.insert(lh, Node::Leaf { key, value_hash });
            return lh;
        }
        let (left_child, right_child) = self.children_of(node_hash, bit_index);
        let split = entries.partition_point(|(k, _)| !bit_at(k, bit_index));
        let (left_entries, right_entries) = entries.split_at(split);
        let new_left = self.update_rec(left_child, left_entries, bit_index + 1);
        let new_right = self.update_rec(right_child, right_entries, bit_index + 1);
        let new_hash = self.internal_hash(new_left, new_right);
        self.nodes.insert(new_hash, Node::Internal { left: new_left, right: new_right });
        new_hash
    }

    fn get_from(&self, node_hash: Hash, key: Hash, bit_index: usize) -> Option<Hash> {
        if bit_index == DEPTH {
            return match self.node_at(node_hash) {
                Some(Node::Leaf { value_hash, .. }) => Some(value_hash),
                _ => None,
            };
        }
        let level_default = self.default_hashes[Self::remaining_levels(bit_index)];
        if node_hash == level_default {
            return None;
        }
        let (left, right) = self.children_of(node_hash, bit_index);
        let child = if bit_at(&key, bit_index) { right } else { left };
        self.get_from(child, key, bit_index + 1)
    }

    fn proof_from(&self, node_hash: Hash, key: Hash) -> MerkleProof {
        let mut audit_path = Vec::with_capacity(DEPTH);
        let mut current = node_hash;
        for bit_index in 0..DEPTH {
            let (left, right) = self.children_of(current, bit_index);
            let (child, sibling) = if bit_at(&key, bit_index) { (right, left) } else { (left, right) };
            audit_path.push(sibling);
            current = child;
        }
        let (is_included, proof_val) = match self.node_at(current) {
            Some(Node::Leaf { value_hash, .. }) => (true, value_hash),
            _ => (false, Hash::EMPTY),
        };
        MerkleProof {
            audit_path,
            is_included,
            proof_key: key,
            proof_val,
        }
    }
}

impl<S: ByteStore> Trie for SparseMerkleTrie<S> {
    fn root(&self) -> Option<Hash> {
        self.root
    }

    fn set_root(&mut self, root: Option<Hash>) -> Result<(), CoreError> {
        if let Some(r) = root {
            if !self.root_is_valid(r) {
                return Err(CoreError::InvalidRoot);
            }
        }
        self.root = root;
        Ok(())
    }

    fn get(&self, key: Hash) -> Option<Hash> {
        let root = self.root?;
        self.get_from(root, key, 0)
    }

    fn update(&mut self, keys: &[Hash], hashes: &[Hash]) -> Result<Hash, CoreError> {
        if keys.len() != hashes.len() {
            return Err(CoreError::InvalidArgs);
        }
        let entries: Vec<(Hash, Hash)> = keys.iter().copied().zip(hashes.iter().copied()).collect();
        let start = self.root.unwrap_or(self.default_hashes[DEPTH]);
        let new_root = self.update_rec(start, &entries, 0);
        self.root = Some(new_root);
        Ok(new_root)
    }

    fn commit(&mut self) -> Result<(), CoreError> {
        let tx_data: Vec<(Vec<u8>, Vec<u8>)> = self
            .nodes
            .iter()
            .map(|(hash, node)| (hash.as_bytes().to_vec(), node.encode()))
            .collect();
        let mut tx = self.store.new_tx();
        for (key, value) in &tx_data {
            tx.set(key, value);
        }
        tx.commit();
        Ok(())
    }

    fn load_cache(&mut self, root: Hash) -> Result<(), CoreError> {
        if !self.root_is_valid(root) {
            return Err(CoreError::InvalidRoot);
        }
        self.root = Some(root);
        if let Some(node) = self.node_at(root) {
            self.nodes.insert(root, node);
        }
        Ok(())
    }

    fn merkle_proof(&self, key: Hash) -> Result<MerkleProof, CoreError> {
        match self.root {
            None => Ok(MerkleProof {
                audit_path: vec![],
                is_included: false,
                proof_key: key,
                proof_val: Hash::EMPTY,
            }),
            Some(root) => Ok(self.proof_from(root, key)),
        }
    }

    fn merkle_proof_past(&self, key: Hash, root: Hash) -> Result<MerkleProof, CoreError> {
        Ok(self.proof_from(root, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn trie() -> SparseMerkleTrie<InMemoryStore> {
        SparseMerkleTrie::new(None, HashAlgorithm::Sha3_256, InMemoryStore::new())
    }

    #[test]
    fn empty_trie_has_no_root_and_no_values() {
        let t = trie();
        assert_eq!(t.root(), None);
        assert_eq!(t.get(Hash::from_slice(b"anything")), None);
    }

    #[test]
    fn update_then_get_round_trips() {
        let mut t = trie();
        let k1 = Hash::from_slice(b"key-one");
        let k2 = Hash::from_slice(b"key-two");
        let v1 = Hash::from_slice(b"value-one");
        let v2 = Hash::from_slice(b"value-two");
        let mut pairs = vec![(k1, v1), (k2, v2)];
        pairs.sort();
        let keys: Vec<Hash> = pairs.iter().map(|(k, _)| *k).collect();
        let vals: Vec<Hash> = pairs.iter().map(|(_, v)| *v).collect();
        t.update(&keys, &vals).unwrap();
        assert_eq!(t.get(k1), Some(v1));
        assert_eq!(t.get(k2), Some(v2));
        assert_eq!(t.get(Hash::from_slice(b"key-three")), None);
    }

    #[test]
    fn update_is_deterministic() {
        let k1 = Hash::from_slice(b"a");
        let k2 = Hash::from_slice(b"b");
        let v1 = Hash::from_slice(b"1");
        let v2 = Hash::from_slice(b"2");
        let mut pairs = vec![(k1, v1), (k2, v2)];
        pairs.sort();
        let keys: Vec<Hash> = pairs.iter().map(|(k, _)| *k).collect();
        let vals: Vec<Hash> = pairs.iter().map(|(_, v)| *v).collect();

        let mut t1 = trie();
        let root1 = t1.update(&keys, &vals).unwrap();
        let mut t2 = trie();
        let root2 = t2.update(&keys, &vals).unwrap();
        assert_eq!(root1, root2);
    }

    #[test]
    fn commit_and_reopen_preserves_values() {
        let store = InMemoryStore::new();
        let k = Hash::from_slice(b"persisted-key");
        let v = Hash::from_slice(b"persisted-value");
        let root = {
            let mut t = SparseMerkleTrie::new(None, HashAlgorithm::Sha3_256, store.clone());
            let root = t.update(&[k], &[v]).unwrap();
            t.commit().unwrap();
            root
        };
        let reopened = SparseMerkleTrie::new(Some(root), HashAlgorithm::Sha3_256, store);
        assert_eq!(reopened.get(k), Some(v));
    }

    #[test]
    fn proof_for_included_key_is_marked_included() {
        let mut t = trie();
        let k = Hash::from_slice(b"included");
        let v = Hash::from_slice(b"value");
        t.update(&[k], &[v]).unwrap();
        let proof = t.merkle_proof(k).unwrap();
        assert!(proof.is_included);
        assert_eq!(proof.proof_val, v);
        assert_eq!(proof.audit_path.len(), DEPTH);
    }

    #[test]
    fn proof_for_absent_key_is_not_included() {
        let mut t = trie();
        t.update(&[Hash::from_slice(b"k")], &[Hash::from_slice(b"v")]).unwrap();
        let proof = t.merkle_proof(Hash::from_slice(b"other")).unwrap();
        assert!(!proof.is_included);
    }
}
