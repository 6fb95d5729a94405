//! Admission control for immediate jobs.
//!
//! An admitted immediate job holds one reservation: a nonce in the
//! collation's nonce set plus a member `<kind>.<id>.<nonce>` in the
//! reservation index, scored with its expiry time. The two structures move
//! in lock-step; release withdraws a nonce first, then removes the matching
//! member, and any count mismatch surfaces as an inconsistency error.
//!
//! Expiry is lazy: a reservation whose score has passed no longer counts
//! toward occupancy even while it is still physically present.

use chrono::Utc;

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::queue::job::Collation;
use crate::queue::keys::{self, MemberKey, SlotOwner, RESERVATIONS_KEY};
use crate::store::QueueStore;

/// Admit an immediate job for `collation`, returning the reservation nonce.
///
/// Rejects with a capacity error when current occupancy (non-expired
/// reservations) has reached the configured bound.
pub async fn admit(
    store: &dyn QueueStore,
    config: &QueueConfig,
    collation: &Collation,
) -> Result<String> {
    let now = Utc::now().timestamp();
    let occupied = store.index_count_from(RESERVATIONS_KEY, now).await?;
    if occupied >= config.immediate_capacity {
        return Err(QueueError::CapacityExhausted(collation.to_string()));
    }

    // Unique within this collation's active nonce set, not globally.
    let nonces_key = keys::nonces_key(collation);
    let mut nonce = keys::random_nonce(config.nonce_length);
    while store.set_contains(&nonces_key, &nonce).await? {
        nonce = keys::random_nonce(config.nonce_length);
    }
    store.set_add(&nonces_key, &nonce).await?;

    let member = MemberKey::new(SlotOwner::Collation(collation.clone()), nonce.clone());
    let added = store
        .index_add(
            RESERVATIONS_KEY,
            &member.to_string(),
            now + config.slot_lifetime_secs,
        )
        .await?;
    if added != 1 {
        return Err(QueueError::Inconsistency(format!(
            "reservation member {member} was already present"
        )));
    }

    tracing::info!(collation = %collation, occupied = occupied + 1, "Immediate job admitted");
    Ok(nonce)
}

/// Release one immediate slot for `collation`.
///
/// Errors if the collation holds no nonce (a release with no matching
/// admission) or if the nonce set and the reservation index have drifted
/// apart.
pub async fn release(store: &dyn QueueStore, collation: &Collation) -> Result<()> {
    let nonce = store
        .set_pop(&keys::nonces_key(collation))
        .await?
        .ok_or_else(|| QueueError::NoActiveReservation(collation.to_string()))?;

    let member = MemberKey::new(SlotOwner::Collation(collation.clone()), nonce);
    let removed = store.index_remove(RESERVATIONS_KEY, &member.to_string()).await?;
    if removed != 1 {
        return Err(QueueError::Inconsistency(format!(
            "nonce set and reservations drifted for {collation}: removed {removed} members"
        )));
    }

    tracing::info!(collation = %collation, "Immediate job released");
    Ok(())
}

/// Count of currently occupied immediate slots (expired ones excluded).
pub async fn occupancy(store: &dyn QueueStore) -> Result<usize> {
    store
        .index_count_from(RESERVATIONS_KEY, Utc::now().timestamp())
        .await
}

/// Whether a deferred job for `submission_id` is already queued under
/// `collation`. Guards against admitting an immediate job for a submission
/// that already holds a deferred slot.
pub async fn non_immediate_job_exists(
    store: &dyn QueueStore,
    submission_id: &str,
    collation: &Collation,
) -> Result<bool> {
    let queued = store.seq_range(&keys::submitter_key(collation)).await?;
    Ok(queued.iter().any(|id| id == submission_id))
}

/// Physically remove expired reservations and their nonces, keeping the
/// two structures in lock-step. Returns the number of members removed.
pub async fn purge_expired(store: &dyn QueueStore) -> Result<usize> {
    let now = Utc::now().timestamp();
    let members = store.index_range(RESERVATIONS_KEY).await?;

    let mut purged = 0;
    for (raw, expires_at) in members {
        if expires_at >= now {
            // Ascending by score: everything from here on is still live.
            break;
        }
        match MemberKey::parse(&raw) {
            Ok(key) => {
                if let SlotOwner::Collation(collation) = &key.owner {
                    store
                        .set_remove(&keys::nonces_key(collation), &key.nonce)
                        .await?;
                }
            }
            Err(error) => {
                tracing::warn!(member = %raw, %error, "Purging unparsable reservation member");
            }
        }
        purged += store.index_remove(RESERVATIONS_KEY, &raw).await?;
    }

    if purged > 0 {
        tracing::info!(purged, "Expired reservations purged");
    }
    Ok(purged)
}
