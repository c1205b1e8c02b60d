//! Reconciliation sweep over artifact storage and the metadata store.
//!
//! A run never raises past its own boundary: every failure lands in the
//! report and the scheduler only logs it. The invariants the sweep
//! maintains:
//!
//! - a candidate's metadata row is only deleted after its storage object is
//!   confirmed gone (deleted now, or already absent), so a record never
//!   silently loses its object;
//! - a metadata row whose object is already gone is always safe to delete,
//!   so a failed batch delete just leaves rows for the next run;
//! - storage objects referenced by no row are orphans from failed inserts
//!   and are removed once they are old enough that no in-flight request can
//!   still be about to reference them.

use crate::config::{ReconcileConfig, RetentionMode};
use crate::models::ImageRecord;
use crate::services::metadata::MetadataStore;
use crate::services::storage::ArtifactStorage;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::{stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Which records a run selects for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Records older than the given age.
    OlderThan(ChronoDuration),
    /// Every record, every run.
    All,
}

impl RetentionPolicy {
    pub fn from_config(config: &ReconcileConfig) -> Self {
        match config.retention {
            RetentionMode::Age => RetentionPolicy::OlderThan(ChronoDuration::days(
                config.max_age_days.max(0),
            )),
            RetentionMode::All => RetentionPolicy::All,
        }
    }

    fn is_candidate(&self, record: &ImageRecord, now: DateTime<Utc>) -> bool {
        match self {
            RetentionPolicy::OlderThan(age) => now - record.created_at >= *age,
            RetentionPolicy::All => true,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Default)]
pub struct ReconciliationReport {
    pub records_scanned: usize,
    pub candidates: usize,
    pub objects_reclaimed: usize,
    pub orphan_objects_reclaimed: usize,
    pub records_deleted: usize,
    pub failed_deletes: usize,
    pub errors: Vec<String>,
}

pub struct ReconciliationJob {
    storage: Arc<dyn ArtifactStorage>,
    metadata: Arc<dyn MetadataStore>,
    policy: RetentionPolicy,
    concurrency: usize,
    orphan_grace: ChronoDuration,
}

/// A storage deletion issued during one run.
enum DeleteTarget {
    /// A candidate record's object; the id is needed for the metadata
    /// batch delete afterwards.
    Candidate { id: String, key: String },
    /// An unreferenced object with no metadata row.
    Orphan { key: String },
}

impl DeleteTarget {
    fn key(&self) -> &str {
        match self {
            DeleteTarget::Candidate { key, .. } => key,
            DeleteTarget::Orphan { key } => key,
        }
    }
}

impl ReconciliationJob {
    pub fn new(
        storage: Arc<dyn ArtifactStorage>,
        metadata: Arc<dyn MetadataStore>,
        policy: RetentionPolicy,
        concurrency: usize,
        orphan_grace: Duration,
    ) -> Self {
        Self {
            storage,
            metadata,
            policy,
            concurrency: concurrency.max(1),
            orphan_grace: ChronoDuration::from_std(orphan_grace)
                .unwrap_or_else(|_| ChronoDuration::seconds(600)),
        }
    }

    /// Execute one sweep. Never returns an error; a run that cannot even
    /// list metadata aborts with zero side effects and reports it.
    pub async fn run(&self) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();

        // 1. The metadata listing defines the expected set of live keys.
        let records = match self.metadata.list().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "Reconciliation aborted: cannot list metadata");
                report.errors.push(format!("metadata list failed: {}", e));
                return report;
            }
        };
        report.records_scanned = records.len();

        let now = Utc::now();

        // 2. Candidate records per the active retention policy.
        let mut targets: Vec<DeleteTarget> = records
            .iter()
            .filter(|r| self.policy.is_candidate(r, now))
            .map(|r| DeleteTarget::Candidate {
                id: r.id.clone(),
                key: r.storage_key.clone(),
            })
            .collect();
        report.candidates = targets.len();

        // 3. Unreferenced storage objects (failed inserts). Objects younger
        //    than the grace period may belong to an in-flight request and
        //    are left for the next run. A failed listing only skips this
        //    part; candidate deletes are safe without it.
        let live_keys: HashSet<&str> = records.iter().map(|r| r.storage_key.as_str()).collect();
        match self.storage.list().await {
            Ok(objects) => {
                targets.extend(
                    objects
                        .into_iter()
                        .filter(|o| !live_keys.contains(o.key.as_str()))
                        .filter(|o| {
                            matches!(o.last_modified, Some(ts) if now - ts >= self.orphan_grace)
                        })
                        .map(|o| DeleteTarget::Orphan { key: o.key }),
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Storage listing failed, skipping orphan sweep this run");
                report.errors.push(format!("storage list failed: {}", e));
            }
        }

        if targets.is_empty() {
            tracing::debug!(records = report.records_scanned, "Nothing to reconcile");
            return report;
        }

        // 4. Issue storage deletions concurrently, bounded, and wait for
        //    every outcome. Keys are disjoint, so ordering is irrelevant.
        let outcomes = stream::iter(targets.into_iter().map(|target| {
            let storage = Arc::clone(&self.storage);
            async move {
                let result = storage.delete(target.key()).await;
                (target, result)
            }
        }))
        .buffer_unordered(self.concurrency)
        .collect::<Vec<_>>()
        .await;

        // 5. Partition. Only candidates whose object is confirmed gone may
        //    lose their metadata row.
        let mut deletable_ids = Vec::new();
        for (target, result) in outcomes {
            match (target, result) {
                (DeleteTarget::Candidate { id, .. }, Ok(())) => {
                    report.objects_reclaimed += 1;
                    deletable_ids.push(id);
                }
                (DeleteTarget::Candidate { id, key }, Err(e)) => {
                    report.failed_deletes += 1;
                    tracing::warn!(image_id = %id, storage_key = %key, error = %e, "Storage delete failed, record kept for next run");
                    report.errors.push(format!("delete {} failed: {}", key, e));
                }
                (DeleteTarget::Orphan { .. }, Ok(())) => {
                    report.orphan_objects_reclaimed += 1;
                }
                (DeleteTarget::Orphan { key }, Err(e)) => {
                    report.failed_deletes += 1;
                    tracing::warn!(storage_key = %key, error = %e, "Orphan delete failed");
                    report.errors.push(format!("delete {} failed: {}", key, e));
                }
            }
        }

        // 6. One batched metadata delete for the confirmed ids. If it
        //    fails, the rows stay behind with their objects already gone;
        //    that state is safe and cleared by a future run.
        if !deletable_ids.is_empty() {
            match self.metadata.delete_by_ids(&deletable_ids).await {
                Ok(()) => report.records_deleted = deletable_ids.len(),
                Err(e) => {
                    tracing::error!(
                        records = deletable_ids.len(),
                        error = %e,
                        "Metadata batch delete failed, rows left for next run"
                    );
                    report.errors.push(format!("metadata delete failed: {}", e));
                }
            }
        }

        report
    }
}

/// Run the job on a fixed interval, fire-and-forget. Reports are only
/// logged; a failing run never takes the scheduler down.
pub fn spawn_scheduler(
    job: Arc<ReconciliationJob>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; a freshly booted service
        // should serve before it sweeps.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let report = job.run().await;
            if report.errors.is_empty() {
                tracing::info!(
                    records_scanned = report.records_scanned,
                    candidates = report.candidates,
                    objects_reclaimed = report.objects_reclaimed,
                    orphan_objects_reclaimed = report.orphan_objects_reclaimed,
                    records_deleted = report.records_deleted,
                    "Reconciliation run completed"
                );
            } else {
                tracing::warn!(
                    records_scanned = report.records_scanned,
                    candidates = report.candidates,
                    objects_reclaimed = report.objects_reclaimed,
                    orphan_objects_reclaimed = report.orphan_objects_reclaimed,
                    records_deleted = report.records_deleted,
                    failed_deletes = report.failed_deletes,
                    errors = report.errors.len(),
                    "Reconciliation run completed with errors"
                );
            }
        }
    })
}
