//! Key namespacing and the composite member-key codec.
//!
//! Persisted namespaces (kept stable for compatibility with existing
//! deployments): job records under `QueuedGradingInfo.<submission_id>`,
//! the global queue index `GradingQueue`, submitter sequences under
//! `SubmitterInfo.<kind>.<id>`, the reservation index `Reservations`, and
//! nonce sets under `Nonces.<kind>.<id>`.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{QueueError, Result};
use crate::queue::job::Collation;

/// Ordered index holding every deferred job's slot.
pub const GLOBAL_QUEUE_KEY: &str = "GradingQueue";
/// Ordered index holding admitted immediate slots, scored by expiry.
pub const RESERVATIONS_KEY: &str = "Reservations";

const QUEUED_INFO_NS: &str = "QueuedGradingInfo";
const SUBMITTER_INFO_NS: &str = "SubmitterInfo";
const NONCES_NS: &str = "Nonces";
const SUBMISSION_KIND: &str = "sub";

pub const DELIM: char = '.';

pub fn record_key(submission_id: &str) -> String {
    format!("{QUEUED_INFO_NS}{DELIM}{submission_id}")
}

pub fn submitter_key(collation: &Collation) -> String {
    format!("{SUBMITTER_INFO_NS}{DELIM}{collation}")
}

pub fn nonces_key(collation: &Collation) -> String {
    format!("{NONCES_NS}{DELIM}{collation}")
}

static LAST_DEFERRED_NONCE: AtomicI64 = AtomicI64::new(0);

/// Nonce for a deferred slot: the enqueue timestamp in millis, bumped to
/// stay strictly increasing within this process so same-millisecond
/// submissions still get distinct slots.
pub fn deferred_nonce() -> String {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_DEFERRED_NONCE.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_DEFERRED_NONCE.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate.to_string(),
            Err(observed) => last = observed,
        }
    }
}

/// Random nonce for an immediate reservation. Uniqueness is enforced by
/// the caller against the collation's nonce set, not globally.
pub fn random_nonce(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// The slot-owner half of a composite member key: a submission id for
/// anonymous jobs, a collation for grouped ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOwner {
    Submission(String),
    Collation(Collation),
}

impl std::fmt::Display for SlotOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotOwner::Submission(id) => write!(f, "{SUBMISSION_KIND}{DELIM}{id}"),
            SlotOwner::Collation(collation) => write!(f, "{collation}"),
        }
    }
}

/// Composite key of one ordered-index member: `<slot-owner>.<nonce>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberKey {
    pub owner: SlotOwner,
    pub nonce: String,
}

impl MemberKey {
    pub fn new(owner: SlotOwner, nonce: String) -> Self {
        Self { owner, nonce }
    }

    /// Parse `<kind>.<id>.<nonce>`. The kind is the first segment and the
    /// nonce the last, so ids containing the delimiter survive.
    pub fn parse(raw: &str) -> Result<Self> {
        let malformed = || QueueError::MalformedKey(raw.to_string());
        let (kind, rest) = raw.split_once(DELIM).ok_or_else(|| malformed())?;
        let (id, nonce) = rest.rsplit_once(DELIM).ok_or_else(|| malformed())?;
        if id.is_empty() || nonce.is_empty() {
            return Err(malformed());
        }
        let owner = match kind {
            SUBMISSION_KIND => SlotOwner::Submission(id.to_string()),
            "user" => SlotOwner::Collation(Collation::User(id.to_string())),
            "team" => SlotOwner::Collation(Collation::Team(id.to_string())),
            _ => return Err(malformed()),
        };
        Ok(Self {
            owner,
            nonce: nonce.to_string(),
        })
    }
}

impl std::fmt::Display for MemberKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{DELIM}{}", self.owner, self.nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_keys() {
        let user = Collation::User("7".to_string());
        assert_eq!(record_key("abc"), "QueuedGradingInfo.abc");
        assert_eq!(submitter_key(&user), "SubmitterInfo.user.7");
        assert_eq!(nonces_key(&user), "Nonces.user.7");
    }

    #[test]
    fn member_key_roundtrip() {
        let key = MemberKey::new(
            SlotOwner::Collation(Collation::Team("12".to_string())),
            "1662660903246".to_string(),
        );
        let encoded = key.to_string();
        assert_eq!(encoded, "team.12.1662660903246");
        assert_eq!(MemberKey::parse(&encoded).unwrap(), key);
    }

    #[test]
    fn member_key_keeps_dotted_ids() {
        let key = MemberKey::parse("sub.a.b.c.123").unwrap();
        assert_eq!(key.owner, SlotOwner::Submission("a.b.c".to_string()));
        assert_eq!(key.nonce, "123");
    }

    #[test]
    fn member_key_rejects_garbage() {
        assert!(MemberKey::parse("noseparator").is_err());
        assert!(MemberKey::parse("user.7").is_err());
        assert!(MemberKey::parse("ghost.7.123").is_err());
        assert!(MemberKey::parse("user..123").is_err());
    }

    #[test]
    fn deferred_nonces_strictly_increase() {
        let first: i64 = deferred_nonce().parse().unwrap();
        let second: i64 = deferred_nonce().parse().unwrap();
        assert!(second > first);
    }

    #[test]
    fn random_nonces_have_requested_length() {
        let nonce = random_nonce(16);
        assert_eq!(nonce.len(), 16);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
