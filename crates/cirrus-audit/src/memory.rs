//! In-memory implementation of `AuditWriter`.
//!
//! One `InMemoryLedger` serves a whole session: every run the runner
//! executes appends to the same chain, and `finalize` seals a run without
//! closing the ledger.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    run::{RunId, RunRecord},
};
use cirrus_core::traits::AuditWriter;

use crate::{
    chain::{first_break, hash_entry},
    entry::{LedgerEntry, LedgerSnapshot},
};

pub(crate) struct LedgerState {
    pub(crate) entries: Vec<LedgerEntry>,
    pub(crate) last_hash: String,
    pub(crate) sealed: Vec<RunId>,
}

/// An append-only ledger backed by a SHA-256 hash chain.
///
/// Clones share the same chain, so a caller can keep a handle for
/// inspection after boxing one into the runner.
#[derive(Clone)]
pub struct InMemoryLedger {
    pub(crate) state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                entries: Vec::new(),
                last_hash: LedgerEntry::GENESIS_HASH.to_string(),
                sealed: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> CirrusResult<MutexGuard<'_, LedgerState>> {
        self.state.lock().map_err(|e| CirrusError::AuditWriteFailed {
            reason: format!("ledger lock poisoned: {e}"),
        })
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.entries.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out every entry written so far.
    pub fn export(&self) -> CirrusResult<LedgerSnapshot> {
        let state = self.lock()?;
        Ok(LedgerSnapshot {
            entries: state.entries.clone(),
            sealed_runs: state.sealed.clone(),
            exported_at: Utc::now(),
            terminal_hash: state
                .entries
                .last()
                .map(|e| e.this_hash.clone())
                .unwrap_or_default(),
        })
    }

    /// `Ok(())` when the chain is intact, otherwise the sequence of the
    /// first broken entry.
    pub fn verify(&self) -> Result<(), u64> {
        let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match first_break(&state.entries) {
            None => Ok(()),
            Some(sequence) => Err(sequence),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditWriter for InMemoryLedger {
    fn write(&self, record: &RunRecord) -> CirrusResult<()> {
        let mut state = self.lock()?;

        let sequence = state.entries.len() as u64;
        let prev_hash = state.last_hash.clone();
        let this_hash = hash_entry(sequence, record, &prev_hash)?;

        debug!(
            run_id = %record.run_id,
            policy = %record.policy,
            action = %record.report.action,
            sequence,
            "ledger entry appended"
        );

        state.entries.push(LedgerEntry {
            sequence,
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.last_hash = this_hash;
        Ok(())
    }

    fn finalize(&self, run_id: &RunId) -> CirrusResult<()> {
        let mut state = self.lock()?;
        if state.sealed.contains(run_id) {
            return Err(CirrusError::AuditWriteFailed {
                reason: format!("run {run_id} is already sealed"),
            });
        }
        state.sealed.push(*run_id);

        let entries = state.entries.iter().filter(|e| e.record.run_id == *run_id).count();
        info!(
            run_id = %run_id,
            entries,
            terminal_hash = %state.last_hash,
            "run sealed in ledger"
        );
        Ok(())
    }
}
