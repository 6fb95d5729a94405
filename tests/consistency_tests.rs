//! Tests for drift detection and defensive reconstruction: the four
//! structures are not updated transactionally, so partial state must be
//! tolerated on reads and surfaced on mutations.

mod test_harness;

use grading_queue::queue::keys;
use grading_queue::store::QueueStore;
use grading_queue::{Collation, QueueError};

use test_harness::{anonymous_job, member_key, test_queue, user_job, BASE_PRIORITY};

/// A queue member whose record has lapsed is dropped from the listing
/// without failing the read; unrelated members still resolve.
#[tokio::test]
async fn reconstruction_skips_members_with_missing_records() {
    let (queue, store) = test_queue();

    queue
        .enqueue(&user_job("gone", BASE_PRIORITY + 10, "7"))
        .await
        .unwrap();
    queue
        .enqueue(&anonymous_job("kept", BASE_PRIORITY + 20))
        .await
        .unwrap();

    // Backdate the grouped job's record so the next read drops it.
    assert!(store
        .record_expire_at(&keys::record_key("gone"), 1)
        .await
        .unwrap());

    let jobs = queue.list().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].config.submission_id, "kept");
}

/// A queue member with no sequence entry left (drifted state) is dropped,
/// not an error: reconstruction prefers partial results.
#[tokio::test]
async fn reconstruction_skips_members_with_exhausted_sequences() {
    let (queue, store) = test_queue();

    queue
        .enqueue(&user_job("s1", BASE_PRIORITY, "7"))
        .await
        .unwrap();
    let submitter = keys::submitter_key(&Collation::User("7".to_string()));
    assert_eq!(store.seq_remove(&submitter, "s1").await.unwrap(), 1);

    assert!(queue.list().await.unwrap().is_empty());
}

/// Delete refuses to guess when the sequence and the queue disagree about
/// how many slots a submitter holds.
#[tokio::test]
async fn delete_surfaces_sequence_drift() {
    let (queue, store) = test_queue();

    queue
        .enqueue(&user_job("s1", BASE_PRIORITY, "7"))
        .await
        .unwrap();
    let jobs = queue.list().await.unwrap();
    let key = member_key(&jobs[0]);

    let submitter = keys::submitter_key(&Collation::User("7".to_string()));
    assert_eq!(store.seq_remove(&submitter, "s1").await.unwrap(), 1);

    let err = queue
        .delete(&key, jobs[0].config.collation.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Inconsistency(_)));
}

/// An orphaned record (written but never indexed) is invisible to readers
/// and garbage-collected by its TTL.
#[tokio::test]
async fn orphaned_records_are_invisible() {
    let (queue, store) = test_queue();

    let record = serde_json::json!({
        "submission_id": "orphan",
        "priority": BASE_PRIORITY,
        "payload": {},
        "created_at": 0,
    });
    store
        .record_set(&keys::record_key("orphan"), &record.to_string())
        .await
        .unwrap();

    assert!(queue.list().await.unwrap().is_empty());
}

/// Interleaved submitters keep their sequence and queue slots in step
/// through deletes.
#[tokio::test]
async fn interleaved_submitters_stay_consistent_through_deletes() {
    let (queue, _) = test_queue();

    queue
        .enqueue(&user_job("a1", BASE_PRIORITY + 10, "a"))
        .await
        .unwrap();
    queue
        .enqueue(&user_job("b1", BASE_PRIORITY + 20, "b"))
        .await
        .unwrap();
    queue
        .enqueue(&user_job("a2", BASE_PRIORITY + 30, "a"))
        .await
        .unwrap();

    let jobs = queue.list().await.unwrap();
    assert_eq!(jobs.len(), 3);
    let b1 = jobs
        .iter()
        .find(|j| j.config.submission_id == "b1")
        .unwrap();
    queue
        .delete(&member_key(b1), b1.config.collation.as_ref())
        .await
        .unwrap();

    let jobs = queue.list().await.unwrap();
    let ids: Vec<&str> = jobs.iter().map(|j| j.config.submission_id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| id.starts_with('a')));

    // Both of submitter a's slots still resolve after the unrelated delete.
    let remaining = jobs
        .iter()
        .find(|j| j.release_at == BASE_PRIORITY + 10)
        .unwrap();
    queue
        .delete(&member_key(remaining), remaining.config.collation.as_ref())
        .await
        .unwrap();
    assert_eq!(queue.list().await.unwrap().len(), 1);
}
