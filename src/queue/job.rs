use serde::{Deserialize, Serialize};

/// Grouping key for fairness: a submitter is a user or a team.
///
/// Anonymous submissions carry no collation (`None` on the config); they
/// are keyed directly by submission id and bypass fairness grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Collation {
    User(String),
    Team(String),
}

impl Collation {
    pub fn kind(&self) -> &'static str {
        match self {
            Collation::User(_) => "user",
            Collation::Team(_) => "team",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Collation::User(id) | Collation::Team(id) => id,
        }
    }
}

impl std::fmt::Display for Collation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.kind(), self.id())
    }
}

/// Client-supplied description of a grading job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingJobConfig {
    /// Globally unique among currently queued and reserved jobs.
    pub submission_id: String,
    /// Desired earliest release timestamp, Unix epoch seconds.
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<Collation>,
    /// Opaque payload describing what to grade; validated upstream.
    pub payload: serde_json::Value,
    /// Declared payload schema version.
    #[serde(default)]
    pub schema_version: u32,
}

/// Persisted form of a submitted job, keyed by submission id.
///
/// `priority` here is only the value supplied at the *last* submission; a
/// duplicate submission under the same id overwrites this record, so the
/// ordered-index score stays the authority on release time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRecord {
    #[serde(flatten)]
    pub config: GradingJobConfig,
    /// Enqueue timestamp, Unix epoch milliseconds.
    pub created_at: i64,
}

/// Externally visible queued job, as produced by queue reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingJob {
    #[serde(flatten)]
    pub config: GradingJobConfig,
    /// Enqueue timestamp, Unix epoch milliseconds.
    pub created_at: i64,
    /// Authoritative release timestamp from the ordered index.
    pub release_at: i64,
    /// Unique suffix of this job's ordered-index slot.
    pub nonce: String,
}

/// Outcome of a deferred enqueue. Duplicate is a distinguished success,
/// not an error: the job was already queued and nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    Duplicate,
}

impl std::fmt::Display for EnqueueOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueOutcome::Accepted => write!(f, "accepted"),
            EnqueueOutcome::Duplicate => write!(f, "duplicate"),
        }
    }
}
