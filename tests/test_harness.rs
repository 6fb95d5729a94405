//! Shared setup for grading-queue integration tests.
#![allow(dead_code)] // Not every test file uses every helper.

use std::sync::Arc;

use serde_json::json;

use grading_queue::store::MemoryStore;
use grading_queue::{Collation, GradingJob, GradingJobConfig, GradingQueue, QueueConfig};

/// Queue backed by a fresh in-memory store, default configuration.
pub fn test_queue() -> (GradingQueue, Arc<MemoryStore>) {
    test_queue_with(QueueConfig::default())
}

pub fn test_queue_with(config: QueueConfig) -> (GradingQueue, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (GradingQueue::new(store.clone(), config), store)
}

pub fn user_job(submission_id: &str, priority: i64, user_id: &str) -> GradingJobConfig {
    job(
        submission_id,
        priority,
        Some(Collation::User(user_id.to_string())),
    )
}

pub fn team_job(submission_id: &str, priority: i64, team_id: &str) -> GradingJobConfig {
    job(
        submission_id,
        priority,
        Some(Collation::Team(team_id.to_string())),
    )
}

pub fn anonymous_job(submission_id: &str, priority: i64) -> GradingJobConfig {
    job(submission_id, priority, None)
}

fn job(submission_id: &str, priority: i64, collation: Option<Collation>) -> GradingJobConfig {
    GradingJobConfig {
        submission_id: submission_id.to_string(),
        priority,
        collation,
        payload: json!({"grader_image": "grader:latest", "files": []}),
        schema_version: 1,
    }
}

/// The queue-member key a listed job occupies.
pub fn member_key(job: &GradingJob) -> String {
    match &job.config.collation {
        Some(collation) => format!("{}.{}", collation, job.nonce),
        None => format!("sub.{}.{}", job.config.submission_id, job.nonce),
    }
}

/// Priorities far in the future so record TTLs stay comfortably live.
pub const BASE_PRIORITY: i64 = 4_000_000_000;
