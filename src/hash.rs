/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines the fixed-size [Hash] type used throughout the state subsystem, the
//! [HashAlgorithm] a [crate::manager::StateManager] is constructed with, and the derived
//! [AccountId] type.

use sha2::{Digest, Sha256};
use sha3::Sha3_256;
use std::fmt;

/// A 32-byte digest, total-ordered by lexicographic byte comparison.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const LEN: usize = 32;

    /// The all-zero value. Used as the sentinel for "no code", "no storage root", etc.
    pub const EMPTY: Hash = Hash([0u8; 32]);

    pub fn from_slice(bytes: &[u8]) -> Hash {
        let mut buf = [0u8; 32];
        let n = bytes.len().min(32);
        buf[..n].copy_from_slice(&bytes[..n]);
        Hash(buf)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        *self == Hash::EMPTY
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Identifies an account: `H(address_bytes)` under the manager's configured
/// [HashAlgorithm]. A newtype over [Hash] so accounts and raw content hashes can't be
/// confused at the type level.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct AccountId(pub Hash);

impl AccountId {
    pub const EMPTY: AccountId = AccountId(Hash::EMPTY);
}

/// The process-wide hash function a [crate::manager::StateManager] is constructed with.
/// Fixed at construction time; must be collision-resistant and deterministic across hosts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha3_256,
}

impl HashAlgorithm {
    /// Hashes the concatenation of every slice in `parts`, mirroring the variadic
    /// `H(data ...[]byte) []byte` signature this subsystem is specified against.
    pub fn hash(&self, parts: &[&[u8]]) -> Hash {
        match self {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                Hash::from_slice(&hasher.finalize())
            }
            HashAlgorithm::Sha3_256 => {
                let mut hasher = Sha3_256::new();
                for part in parts {
                    hasher.update(part);
                }
                Hash::from_slice(&hasher.finalize())
            }
        }
    }

    pub fn hash_one(&self, data: &[u8]) -> Hash {
        self.hash(&[data])
    }

    pub fn account_id(&self, address: &[u8]) -> AccountId {
        AccountId(self.hash_one(address))
    }
}
