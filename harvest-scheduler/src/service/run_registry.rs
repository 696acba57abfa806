//! Run registry
//!
//! The only state shared between dispatch tasks. A single `RwLock` guards
//! the whole map: `try_begin` and `complete` take the write lock, snapshots
//! take the read lock. Between a successful `try_begin` and the matching
//! `complete`, no other `try_begin` for the same site can succeed.

use chrono::Utc;
use harvest_core::domain::run::{RunOutcome, RunRecord};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

#[derive(Debug, Default)]
pub struct RunRegistry {
    records: RwLock<HashMap<String, RunRecord>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a record half-written
    // (every mutation is a single assignment sequence), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, RunRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, RunRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically claims the site for a new run
    ///
    /// Returns `false` if a run is already active; the record is left untouched.
    pub fn try_begin(&self, site_id: &str) -> bool {
        let mut records = self.write();
        let record = records
            .entry(site_id.to_string())
            .or_insert_with(|| RunRecord::never_run(site_id));

        if record.active {
            return false;
        }

        record.begin(Utc::now());
        true
    }

    /// Ends the active run of a site
    pub fn complete(&self, site_id: &str, outcome: RunOutcome, error: Option<String>) {
        let mut records = self.write();
        let record = records
            .entry(site_id.to_string())
            .or_insert_with(|| RunRecord::never_run(site_id));

        if !record.active {
            warn!("Completing site {} which has no active run", site_id);
        }

        record.finish(Utc::now(), outcome, error);
    }

    /// Copy of the run record of a site (a never-run record if unknown)
    pub fn snapshot(&self, site_id: &str) -> RunRecord {
        self.read()
            .get(site_id)
            .cloned()
            .unwrap_or_else(|| RunRecord::never_run(site_id))
    }

    /// Copy of every record created so far, ordered by site id
    #[cfg(test)]
    pub fn snapshot_all(&self) -> Vec<RunRecord> {
        let mut records: Vec<RunRecord> = self.read().values().cloned().collect();
        records.sort_by(|a, b| a.site_id.cmp(&b.site_id));
        records
    }

    pub fn active_count(&self) -> usize {
        self.read().values().filter(|r| r.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::domain::run::RunStatus;
    use std::sync::Arc;
    use std::sync::Barrier;

    #[test]
    fn test_never_run_snapshot() {
        let registry = RunRegistry::new();
        let record = registry.snapshot("unknown");
        assert_eq!(record.status, RunStatus::NeverRun);
        assert!(!record.active);
        assert!(record.started_at.is_none());
        assert!(registry.snapshot_all().is_empty());
    }

    #[test]
    fn test_second_begin_is_rejected_while_active() {
        let registry = RunRegistry::new();
        assert!(registry.try_begin("a"));
        let first = registry.snapshot("a");

        assert!(!registry.try_begin("a"));
        assert_eq!(registry.snapshot("a"), first);
        assert_eq!(first.status, RunStatus::Running);
    }

    #[test]
    fn test_sites_are_independent() {
        let registry = RunRegistry::new();
        assert!(registry.try_begin("a"));
        assert!(registry.try_begin("b"));
        assert_eq!(registry.active_count(), 2);
    }

    #[test]
    fn test_complete_failed_keeps_error() {
        let registry = RunRegistry::new();
        registry.try_begin("a");
        registry.complete("a", RunOutcome::Failed, Some("timeout".to_string()));

        let record = registry.snapshot("a");
        assert!(!record.active);
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.last_error.as_deref(), Some("timeout"));
        assert!(record.ended_at.is_some());
    }

    #[test]
    fn test_rerun_after_completion_resets_record() {
        let registry = RunRegistry::new();
        registry.try_begin("a");
        registry.complete("a", RunOutcome::Failed, Some("boom".to_string()));
        let failed = registry.snapshot("a");

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(registry.try_begin("a"));

        let fresh = registry.snapshot("a");
        assert_eq!(fresh.status, RunStatus::Running);
        assert!(fresh.started_at > failed.started_at);
        assert!(fresh.ended_at.is_none());
        assert!(fresh.last_error.is_none());
    }

    #[test]
    fn test_concurrent_begin_admits_exactly_one() {
        const THREADS: usize = 16;
        let registry = Arc::new(RunRegistry::new());
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.try_begin("shared")
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();

        assert_eq!(admitted, 1);
        assert_eq!(registry.active_count(), 1);
    }
}
