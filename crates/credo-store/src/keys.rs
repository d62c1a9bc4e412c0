//! Key layout of the `identifier_ledger` column family.
//!
//! ```text
//! e/<did>\0<ts>   -> LedgerEntry JSON    (ts: 8-byte big-endian, sign bit flipped)
//! h/<did>         -> LedgerHead JSON
//! ```
//!
//! Flipping the sign bit of the microsecond timestamp makes byte order match
//! chronological order, so a forward prefix scan yields the oldest entry first.

use chrono::{DateTime, Utc};

const ENTRY_TAG: &[u8] = b"e/";
const HEAD_TAG: &[u8] = b"h/";
const SEPARATOR: u8 = 0;

/// Prefix shared by every ledger entry of one identifier.
pub fn ledger_prefix(did: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(ENTRY_TAG.len() + did.len() + 1);
    key.extend_from_slice(ENTRY_TAG);
    key.extend_from_slice(did.as_bytes());
    key.push(SEPARATOR);
    key
}

/// Key of a single ledger entry.
pub fn ledger_entry_key(did: &str, timestamp: &DateTime<Utc>) -> Vec<u8> {
    let mut key = ledger_prefix(did);
    key.extend_from_slice(&encode_timestamp(timestamp));
    key
}

/// Key of an identifier's ledger head.
pub fn ledger_head_key(did: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(HEAD_TAG.len() + did.len());
    key.extend_from_slice(HEAD_TAG);
    key.extend_from_slice(did.as_bytes());
    key
}

fn encode_timestamp(timestamp: &DateTime<Utc>) -> [u8; 8] {
    let micros = timestamp.timestamp_micros();
    ((micros as u64) ^ (1 << 63)).to_be_bytes()
}
