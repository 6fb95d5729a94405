//! Cross-structure move and delete operations.

use crate::error::{QueueError, Result};
use crate::queue::job::Collation;
use crate::queue::keys::{self, MemberKey, SlotOwner, DELIM, GLOBAL_QUEUE_KEY};
use crate::store::QueueStore;

/// Reprioritize a queued job: replace the member's score in the global
/// ordered queue. Nothing else changes; a missing member is a not-found
/// error, never created as a side effect.
pub async fn move_job(store: &dyn QueueStore, member: &str, new_release_at: i64) -> Result<()> {
    MemberKey::parse(member)?;
    if !store
        .index_update(GLOBAL_QUEUE_KEY, member, new_release_at)
        .await?
    {
        return Err(QueueError::EntryNotFound(member.to_string()));
    }
    tracing::info!(member, new_release_at, "Queue entry moved");
    Ok(())
}

/// Withdraw a queued job.
///
/// For grouped jobs the member key carries no submission id, so the entry
/// to drop from the submitter sequence is selected by replaying the
/// reconstruction correspondence: the member's rank among its owner's
/// members (ascending index order) picks the sequence entry at the same
/// position from the head. Removal counts other than one surface as
/// inconsistency errors rather than silent success.
///
/// The job record is left to lapse via TTL; in-flight readers may still be
/// resolving it by submission id.
pub async fn delete_job(
    store: &dyn QueueStore,
    member: &str,
    collation: Option<&Collation>,
) -> Result<()> {
    let key = MemberKey::parse(member)?;
    match (&key.owner, collation) {
        (SlotOwner::Submission(_), None) => {}
        (SlotOwner::Collation(owner), Some(given)) if owner == given => {}
        _ => {
            return Err(QueueError::MalformedKey(format!(
                "collation does not match queue member {member}"
            )))
        }
    }

    if let SlotOwner::Collation(owner) = &key.owner {
        let owner_prefix = key.owner.to_string();
        let members = store.index_range(GLOBAL_QUEUE_KEY).await?;
        let owned: Vec<&str> = members
            .iter()
            .map(|(raw, _)| raw.as_str())
            .filter(|raw| {
                raw.rsplit_once(DELIM)
                    .map(|(prefix, _)| prefix == owner_prefix)
                    .unwrap_or(false)
            })
            .collect();
        let rank = owned
            .iter()
            .position(|raw| *raw == member)
            .ok_or_else(|| QueueError::EntryNotFound(member.to_string()))?;

        let sequence_key = keys::submitter_key(owner);
        let sequence = store.seq_range(&sequence_key).await?;
        if sequence.len() != owned.len() {
            return Err(QueueError::Inconsistency(format!(
                "submitter sequence for {owner} holds {} entries but the queue holds {} slots",
                sequence.len(),
                owned.len()
            )));
        }

        let submission_id = &sequence[rank];
        let removed = store.seq_remove(&sequence_key, submission_id).await?;
        if removed != 1 {
            return Err(QueueError::Inconsistency(format!(
                "expected to remove one sequence entry for {submission_id}, removed {removed}"
            )));
        }
    }

    let removed = store.index_remove(GLOBAL_QUEUE_KEY, member).await?;
    if removed == 0 {
        return Err(QueueError::EntryNotFound(member.to_string()));
    }
    tracing::info!(member, "Queue entry deleted");
    Ok(())
}
