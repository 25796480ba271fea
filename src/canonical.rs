//! Canonical serialization for deterministic hashing.
//!
//! Fingerprints, structure signatures, configuration hashes and interchange
//! digests all hash the same canonical form: compact JSON produced by
//! `serde_json` from types whose serialization order is fixed.
//!
//! ## Determinism Guarantees
//!
//! - Struct fields serialize in declaration order
//! - `Vec` and tuple elements serialize in index order
//! - Maps in hashed data are `BTreeMap`, never `HashMap`
//! - Ids serialize as their hyphenated UUID string

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes.
///
/// Every type hashed by this crate serializes infallibly (no maps with
/// non-string keys, no custom fallible impls).
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// xxh64 of the canonical bytes of `value`.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// [`canonical_hash`] as 16 lowercase hex digits.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}
