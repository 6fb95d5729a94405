//! The `GradingQueue` facade.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::QueueConfig;
use crate::error::Result;
use crate::queue::job::{Collation, EnqueueOutcome, GradingJob, GradingJobConfig};
use crate::queue::{coordinator, deferred, reconstruct, reservation};
use crate::store::QueueStore;

/// Keyed mutual exclusion for the enqueue and admission entry points.
///
/// Two concurrent enqueues for one collation must not both observe "not
/// queued" and both insert; serializing per collation closes that window
/// within this process. Guards are created on first use and kept for the
/// service's lifetime.
#[derive(Default)]
struct CollationLocks {
    guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CollationLocks {
    async fn acquire(&self, collation: &Collation) -> OwnedMutexGuard<()> {
        let guard = {
            let mut guards = self.guards.lock().await;
            guards
                .entry(collation.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        guard.lock_owned().await
    }
}

/// Grading queue service over a shared store.
///
/// One instance per process; the store adapter is passed in explicitly so
/// tests can substitute the in-memory double. All operations return
/// categorized errors rather than panicking.
pub struct GradingQueue {
    store: Arc<dyn QueueStore>,
    config: QueueConfig,
    locks: CollationLocks,
}

impl GradingQueue {
    pub fn new(store: Arc<dyn QueueStore>, config: QueueConfig) -> Self {
        Self {
            store,
            config,
            locks: CollationLocks::default(),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Enqueue a deferred job. Anonymous submissions take no lock; grouped
    /// submissions are serialized per collation.
    pub async fn enqueue(&self, job: &GradingJobConfig) -> Result<EnqueueOutcome> {
        let _guard = match &job.collation {
            Some(collation) => Some(self.locks.acquire(collation).await),
            None => None,
        };
        deferred::enqueue(self.store.as_ref(), &self.config, job).await
    }

    /// The full queue in ascending release order.
    pub async fn list(&self) -> Result<Vec<GradingJob>> {
        reconstruct::list_jobs(self.store.as_ref()).await
    }

    /// Reprioritize the job at `member` to release at `new_release_at`.
    pub async fn move_job(&self, member: &str, new_release_at: i64) -> Result<()> {
        coordinator::move_job(self.store.as_ref(), member, new_release_at).await
    }

    /// Withdraw the job at `member`. `collation` must match the member
    /// key's owner (None for anonymous members).
    pub async fn delete(&self, member: &str, collation: Option<&Collation>) -> Result<()> {
        coordinator::delete_job(self.store.as_ref(), member, collation).await
    }

    /// Admit an immediate job, returning its reservation nonce.
    pub async fn admit_immediate(&self, collation: &Collation) -> Result<String> {
        let _guard = self.locks.acquire(collation).await;
        reservation::admit(self.store.as_ref(), &self.config, collation).await
    }

    /// Release one immediate slot previously admitted for `collation`.
    pub async fn release_immediate(&self, collation: &Collation) -> Result<()> {
        reservation::release(self.store.as_ref(), collation).await
    }

    /// Non-expired immediate reservations currently held.
    pub async fn immediate_occupancy(&self) -> Result<usize> {
        reservation::occupancy(self.store.as_ref()).await
    }

    /// Whether `submission_id` already holds a deferred slot under
    /// `collation`.
    pub async fn non_immediate_job_exists(
        &self,
        submission_id: &str,
        collation: &Collation,
    ) -> Result<bool> {
        reservation::non_immediate_job_exists(self.store.as_ref(), submission_id, collation).await
    }

    /// Sweep expired reservations out of the store. Safe to run at any
    /// time; occupancy already ignores expired entries.
    pub async fn purge_expired_reservations(&self) -> Result<usize> {
        reservation::purge_expired(self.store.as_ref()).await
    }
}
