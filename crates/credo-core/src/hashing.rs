use chrono::{DateTime, SecondsFormat, Utc};

/// BLAKE3 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using BLAKE3.
pub fn hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Canonical text form of a ledger timestamp (RFC 3339, microseconds, `Z`).
pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Integrity hash of a ledger entry: hex(BLAKE3(did | score | timestamp)).
///
/// The score uses Rust's shortest round-trip float formatting, so the same
/// `f64` always produces the same digest.
pub fn ledger_hash(did: &str, score: f64, timestamp: &DateTime<Utc>) -> String {
    let data = format!("{}|{}|{}", did, score, canonical_timestamp(timestamp));
    hex::encode(hash(data.as_bytes()))
}
