//! Hashing helpers for the cache keyspace. Two scopes, two functions:
//! the persisted blocklist store indexes on the full SHA-256 digest
//! (§3, §4.9 "Lookup uses SHA-256(value) as the index key"); the cache
//! layer (device fingerprints and blocklist verdicts) keys on the
//! 16-hex-char truncation so raw fingerprints and blocklist values are
//! never stored in the cache index (§4.10, §8 "Blocklist value is never
//! written in plaintext to the cache index"). The two hashes are
//! computed independently — the cache layer's collision tolerance is
//! looser than the authoritative store's.

use sha2::{Digest, Sha256};

pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn sha256_hex_truncated(value: &str) -> String {
    let full = sha256_hex(value);
    full[..16].to_string()
}
