//! Queue reconstruction: the externally visible ordered job list.

use std::collections::{HashMap, VecDeque};

use crate::error::Result;
use crate::queue::job::{GradingJob, QueuedRecord};
use crate::queue::keys::{self, MemberKey, SlotOwner, GLOBAL_QUEUE_KEY};
use crate::store::QueueStore;

/// Rebuild the ordered job list from the global queue, the submitter
/// sequences, and the job records.
///
/// Each grouped queue member consumes one entry from its owner's sequence
/// snapshot, front first. Snapshots are head-first (newest submission at
/// the head), so the owner's lowest-scored slot resolves to its newest
/// submission. That binding is part of the external contract: a submitter
/// who lowers the priority of a later submission sees that submission
/// surface at the earlier slot.
///
/// A member that cannot be resolved (unparsable key, exhausted sequence,
/// missing or corrupt record) is dropped with a warning; partial results
/// are better than none. Only a failure of the bulk index fetch (or a
/// sequence snapshot fetch) aborts the whole read.
pub async fn list_jobs(store: &dyn QueueStore) -> Result<Vec<GradingJob>> {
    let members = store.index_range(GLOBAL_QUEUE_KEY).await?;
    if members.is_empty() {
        return Ok(Vec::new());
    }

    let mut parsed: Vec<(MemberKey, i64)> = Vec::with_capacity(members.len());
    for (raw, score) in members {
        match MemberKey::parse(&raw) {
            Ok(key) => parsed.push((key, score)),
            Err(error) => {
                tracing::warn!(member = %raw, %error, "Skipping unparsable queue member");
            }
        }
    }

    // One sequence snapshot per distinct grouped owner.
    let mut sequences: HashMap<String, VecDeque<String>> = HashMap::new();
    for (key, _) in &parsed {
        if let SlotOwner::Collation(collation) = &key.owner {
            let sequence_key = keys::submitter_key(collation);
            if !sequences.contains_key(&sequence_key) {
                let snapshot = store.seq_range(&sequence_key).await?;
                sequences.insert(sequence_key, snapshot.into());
            }
        }
    }

    let mut jobs = Vec::with_capacity(parsed.len());
    for (key, score) in parsed {
        let submission_id = match &key.owner {
            SlotOwner::Submission(id) => id.clone(),
            SlotOwner::Collation(collation) => {
                let sequence_key = keys::submitter_key(collation);
                match sequences.get_mut(&sequence_key).and_then(VecDeque::pop_front) {
                    Some(id) => id,
                    None => {
                        tracing::warn!(
                            member = %key,
                            "No sequence entry left for queue member, dropping it"
                        );
                        continue;
                    }
                }
            }
        };

        let raw_record = match store.record_get(&keys::record_key(&submission_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::warn!(%submission_id, "Job record missing, dropping entry");
                continue;
            }
            Err(error) => {
                tracing::warn!(%submission_id, %error, "Job record fetch failed, dropping entry");
                continue;
            }
        };
        let record: QueuedRecord = match serde_json::from_str(&raw_record) {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(%submission_id, %error, "Job record corrupt, dropping entry");
                continue;
            }
        };

        jobs.push(GradingJob {
            config: record.config,
            created_at: record.created_at,
            // The index score is authoritative; the record's own priority
            // may have been overwritten by a later duplicate submission.
            release_at: score,
            nonce: key.nonce,
        });
    }

    jobs.sort_by_key(|job| job.release_at);
    Ok(jobs)
}
