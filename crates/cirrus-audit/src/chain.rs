//! Hash-chain primitives.
//!
//! Hash input layout (bytes, in order):
//!   1. sequence as 8-byte little-endian
//!   2. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   3. canonical JSON of the run record

use sha2::{Digest, Sha256};

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    run::RunRecord,
};

use crate::entry::LedgerEntry;

/// The lowercase hex SHA-256 of one entry's content.
pub fn hash_entry(sequence: u64, record: &RunRecord, prev_hash: &str) -> CirrusResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| CirrusError::AuditWriteFailed {
        reason: format!("run record is not serializable: {e}"),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// The sequence number of the first entry that breaks the chain.
///
/// An entry breaks the chain when its `prev_hash` is not the previous
/// entry's `this_hash` (or `GENESIS_HASH` first), when its sequence is out
/// of place, or when its `this_hash` does not match its content.
pub fn first_break(entries: &[LedgerEntry]) -> Option<u64> {
    let mut expected_prev: &str = LedgerEntry::GENESIS_HASH;

    for (position, entry) in entries.iter().enumerate() {
        let intact = entry.sequence == position as u64
            && entry.prev_hash == expected_prev
            && hash_entry(entry.sequence, &entry.record, &entry.prev_hash)
                .is_ok_and(|h| h == entry.this_hash);
        if !intact {
            return Some(position as u64);
        }
        expected_prev = entry.this_hash.as_str();
    }

    None
}

/// True when every entry links correctly. An empty ledger is valid.
pub fn verify_chain(entries: &[LedgerEntry]) -> bool {
    first_break(entries).is_none()
}
