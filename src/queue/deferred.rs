//! Fair deferred-queue enqueue.

use chrono::Utc;

use crate::config::QueueConfig;
use crate::error::Result;
use crate::queue::job::{EnqueueOutcome, GradingJobConfig, QueuedRecord};
use crate::queue::keys::{self, MemberKey, SlotOwner, GLOBAL_QUEUE_KEY};
use crate::store::QueueStore;

/// Enqueue a deferred grading job.
///
/// Persists the job record under its submission id with a TTL no shorter
/// than any previously promised retention, then inserts a slot into the
/// global ordered queue. Grouped submissions are first checked against the
/// collation's submitter sequence: an id already queued there is a
/// duplicate and writes no new slot. The anonymous path has no duplicate
/// detection; each call claims a fresh slot under the same record.
pub async fn enqueue(
    store: &dyn QueueStore,
    config: &QueueConfig,
    job: &GradingJobConfig,
) -> Result<EnqueueOutcome> {
    let record_key = keys::record_key(&job.submission_id);

    // A resubmission never shortens the retention window already promised.
    let promised = store.record_expire_time(&record_key).await?.unwrap_or(0);
    let lifetime = (job.priority + config.lifetime_buffer_secs).max(promised);

    let record = QueuedRecord {
        config: job.clone(),
        created_at: Utc::now().timestamp_millis(),
    };
    store
        .record_set(&record_key, &serde_json::to_string(&record)?)
        .await?;
    store.record_expire_at(&record_key, lifetime).await?;

    let nonce = keys::deferred_nonce();

    let Some(collation) = &job.collation else {
        let member = MemberKey::new(SlotOwner::Submission(job.submission_id.clone()), nonce);
        store
            .index_add(GLOBAL_QUEUE_KEY, &member.to_string(), job.priority)
            .await?;
        tracing::info!(
            submission_id = %job.submission_id,
            release_at = job.priority,
            "Anonymous job enqueued"
        );
        return Ok(EnqueueOutcome::Accepted);
    };

    let submitter_key = keys::submitter_key(collation);
    let queued = store.seq_range(&submitter_key).await?;
    if queued.iter().any(|id| id == &job.submission_id) {
        tracing::info!(
            submission_id = %job.submission_id,
            collation = %collation,
            "Duplicate enqueue ignored"
        );
        return Ok(EnqueueOutcome::Duplicate);
    }

    store
        .seq_push_front(&submitter_key, &job.submission_id)
        .await?;
    store.seq_expire_at(&submitter_key, lifetime).await?;

    let member = MemberKey::new(SlotOwner::Collation(collation.clone()), nonce);
    store
        .index_add(GLOBAL_QUEUE_KEY, &member.to_string(), job.priority)
        .await?;
    tracing::info!(
        submission_id = %job.submission_id,
        collation = %collation,
        release_at = job.priority,
        "Job enqueued"
    );
    Ok(EnqueueOutcome::Accepted)
}
