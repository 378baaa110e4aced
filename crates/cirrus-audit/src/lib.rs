//! # cirrus-audit
//!
//! Append-only, SHA-256 hash-chained remediation ledger for the Cirrus cloud
//! policy plugin.
//!
//! ## Overview
//!
//! Every action the runner executes produces one `RunRecord`, which the
//! ledger wraps in a `LedgerEntry` linked to the previous entry by its
//! hash. Altering any stored entry breaks the chain at that point, which
//! `verify_chain` and `first_break` detect.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cirrus_audit::InMemoryLedger;
//!
//! let ledger = InMemoryLedger::new();
//! let runner = PolicyRunner::new(cloud, Box::new(ledger.clone()), settings);
//! runner.run(&policy, None)?;
//!
//! assert!(ledger.verify().is_ok());
//! let snapshot = ledger.export()?;
//! ```

pub mod chain;
pub mod entry;
pub mod memory;

pub use chain::{first_break, hash_entry, verify_chain};
pub use entry::{LedgerEntry, LedgerSnapshot};
pub use memory::InMemoryLedger;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use cirrus_contracts::{
        report::ActionReport,
        resource::ResourceType,
        run::{RunId, RunRecord},
    };
    use cirrus_core::traits::AuditWriter;

    use super::{first_break, verify_chain, InMemoryLedger, LedgerEntry};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn record(run_id: RunId, action: &str, ids: &[&str]) -> RunRecord {
        let mut report = ActionReport::new(action);
        for id in ids {
            report.success(*id);
        }
        RunRecord::new(run_id, "tag-owners", ResourceType::Functiongraph, report)
    }

    fn ledger_with_three() -> (InMemoryLedger, RunId) {
        let ledger = InMemoryLedger::new();
        let run = RunId::new();
        ledger.write(&record(run, "auto-tag-user", &["f-1"])).unwrap();
        ledger.write(&record(run, "notify-message", &["f-1"])).unwrap();
        ledger.write(&record(run, "tag", &["f-1", "f-2"])).unwrap();
        (ledger, run)
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_hash_chain_integrity() {
        let (ledger, _) = ledger_with_three();
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.verify(), Ok(()));
    }

    #[test]
    fn test_tamper_detection() {
        let (ledger, _) = ledger_with_three();
        {
            let mut state = ledger.state.lock().unwrap();
            state.entries[1].record.report.succeeded.push("f-9".to_string());
        }
        assert_eq!(ledger.verify(), Err(1));
    }

    #[test]
    fn test_relinked_entry_is_still_detected() {
        let (ledger, _) = ledger_with_three();
        let mut entries = ledger.export().unwrap().entries;
        entries.remove(1);
        // Patch the link but not the hash that commits to it.
        entries[1].prev_hash = entries[0].this_hash.clone();
        entries[1].sequence = 1;
        assert_eq!(first_break(&entries), Some(1));
    }

    #[test]
    fn test_genesis_hash() {
        let (ledger, _) = ledger_with_three();
        let snapshot = ledger.export().unwrap();
        assert_eq!(snapshot.entries[0].prev_hash, LedgerEntry::GENESIS_HASH);
    }

    #[test]
    fn test_sequence_spans_runs() {
        let (ledger, first) = ledger_with_three();
        let second = RunId::new();
        ledger.write(&record(second, "delete", &["f-3"])).unwrap();

        let snapshot = ledger.export().unwrap();
        for (idx, entry) in snapshot.entries.iter().enumerate() {
            assert_eq!(entry.sequence, idx as u64);
        }
        assert_eq!(snapshot.run(&first).count(), 3);
        assert_eq!(snapshot.run(&second).count(), 1);
        assert!(verify_chain(&snapshot.entries));
    }

    #[test]
    fn test_export_terminal_hash() {
        let (ledger, _) = ledger_with_three();
        let snapshot = ledger.export().unwrap();
        assert_eq!(snapshot.terminal_hash, snapshot.entries.last().unwrap().this_hash);
    }

    #[test]
    fn test_finalize_seals_once() {
        let (ledger, run) = ledger_with_three();
        ledger.finalize(&run).unwrap();
        assert_eq!(ledger.export().unwrap().sealed_runs, vec![run]);
        assert!(ledger.finalize(&run).is_err());
    }

    #[test]
    fn test_clones_share_the_chain() {
        let ledger = InMemoryLedger::new();
        let handle = ledger.clone();
        let boxed: Box<dyn AuditWriter> = Box::new(ledger);
        boxed.write(&record(RunId::new(), "tag", &["f-1"])).unwrap();
        assert_eq!(handle.len(), 1);
    }

    #[test]
    fn test_verify_empty() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.verify(), Ok(()));
        assert!(verify_chain(&[]));
        assert!(ledger.export().unwrap().terminal_hash.is_empty());
    }
}
