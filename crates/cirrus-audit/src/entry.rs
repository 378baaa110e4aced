//! Ledger entry and snapshot types.
//!
//! `LedgerEntry` wraps one `RunRecord` with its position in the chain and
//! the SHA-256 hashes that make tampering detectable. `LedgerSnapshot` is
//! an exported copy of the whole ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cirrus_contracts::run::{RunId, RunRecord};

/// One executed action, chained to the entry before it.
///
/// Changing any field, including those of the embedded `record`,
/// invalidates `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Position in the ledger, starting at 0. Spans runs.
    pub sequence: u64,

    pub record: RunRecord,

    /// `this_hash` of the previous entry, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// Hex SHA-256 over (sequence, prev_hash, canonical JSON of record).
    pub this_hash: String,
}

impl LedgerEntry {
    /// The `prev_hash` of the first entry in every ledger.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// An exported copy of a ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub entries: Vec<LedgerEntry>,

    /// Runs that have been finalized, in completion order.
    pub sealed_runs: Vec<RunId>,

    pub exported_at: DateTime<Utc>,

    /// `this_hash` of the last entry. Empty for an empty ledger.
    pub terminal_hash: String,
}

impl LedgerSnapshot {
    /// The entries written by one run, in order.
    pub fn run(&self, run_id: &RunId) -> impl Iterator<Item = &LedgerEntry> + '_ {
        let run_id = *run_id;
        self.entries.iter().filter(move |e| e.record.run_id == run_id)
    }
}
