pub mod bucket;
pub mod directory;
pub mod file_lock;

use std::hash::Hasher;

use rustc_hash::FxHasher;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A value that can live in the store: serialisable, with an extractable key.
///
/// Records are unique by the hash of their key; inserting a record whose key
/// hashes to an existing entry replaces that entry.
pub trait Record: Serialize + DeserializeOwned {
    fn key(&self) -> Vec<u8>;
}

/// Stable 64-bit hash over key bytes.
pub fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(key);
    hasher.finish()
}

/// Low `depth` bits of a hash, the directory slot selector.
pub fn low_bits(hash: u64, depth: usize) -> u64 {
    if depth >= 64 {
        hash
    } else {
        hash & ((1u64 << depth) - 1)
    }
}
