use std::collections::{BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::QueueStore;

struct Record {
    value: String,
    expires_at: Option<i64>,
}

#[derive(Default)]
struct Shelves {
    records: HashMap<String, Record>,
    indexes: HashMap<String, HashMap<String, i64>>,
    sequences: HashMap<String, (VecDeque<String>, Option<i64>)>,
    sets: HashMap<String, BTreeSet<String>>,
}

/// In-memory store adapter.
///
/// Honors TTLs lazily: an expired record or sequence is dropped the next
/// time it is read. Set pop is deterministic (smallest member) rather than
/// random, which the queue contracts do not depend on.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Shelves>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn expired(expires_at: Option<i64>) -> bool {
    matches!(expires_at, Some(at) if at <= Utc::now().timestamp())
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn record_set(&self, key: &str, value: &str) -> Result<()> {
        let mut shelves = self.inner.lock().await;
        shelves.records.insert(
            key.to_string(),
            Record {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn record_get(&self, key: &str) -> Result<Option<String>> {
        let mut shelves = self.inner.lock().await;
        let lapsed = shelves
            .records
            .get(key)
            .map(|record| expired(record.expires_at))
            .unwrap_or(false);
        if lapsed {
            shelves.records.remove(key);
            return Ok(None);
        }
        Ok(shelves.records.get(key).map(|record| record.value.clone()))
    }

    async fn record_expire_at(&self, key: &str, at_secs: i64) -> Result<bool> {
        let mut shelves = self.inner.lock().await;
        match shelves.records.get_mut(key) {
            Some(record) => {
                record.expires_at = Some(at_secs);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_expire_time(&self, key: &str) -> Result<Option<i64>> {
        let shelves = self.inner.lock().await;
        Ok(shelves
            .records
            .get(key)
            .filter(|r| !expired(r.expires_at))
            .and_then(|r| r.expires_at))
    }

    async fn index_add(&self, index: &str, member: &str, score: i64) -> Result<usize> {
        let mut shelves = self.inner.lock().await;
        let previous = shelves
            .indexes
            .entry(index.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(usize::from(previous.is_none()))
    }

    async fn index_update(&self, index: &str, member: &str, score: i64) -> Result<bool> {
        let mut shelves = self.inner.lock().await;
        match shelves
            .indexes
            .get_mut(index)
            .and_then(|members| members.get_mut(member))
        {
            Some(existing) => {
                *existing = score;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn index_remove(&self, index: &str, member: &str) -> Result<usize> {
        let mut shelves = self.inner.lock().await;
        let removed = shelves
            .indexes
            .get_mut(index)
            .and_then(|members| members.remove(member));
        Ok(usize::from(removed.is_some()))
    }

    async fn index_range(&self, index: &str) -> Result<Vec<(String, i64)>> {
        let shelves = self.inner.lock().await;
        let mut entries: Vec<(String, i64)> = shelves
            .indexes
            .get(index)
            .map(|members| {
                members
                    .iter()
                    .map(|(member, score)| (member.clone(), *score))
                    .collect()
            })
            .unwrap_or_default();
        // Score order, member order on ties, matching the Redis contract.
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(entries)
    }

    async fn index_score(&self, index: &str, member: &str) -> Result<Option<i64>> {
        let shelves = self.inner.lock().await;
        Ok(shelves
            .indexes
            .get(index)
            .and_then(|members| members.get(member).copied()))
    }

    async fn index_count_from(&self, index: &str, min_score: i64) -> Result<usize> {
        let shelves = self.inner.lock().await;
        Ok(shelves
            .indexes
            .get(index)
            .map(|members| members.values().filter(|score| **score >= min_score).count())
            .unwrap_or(0))
    }

    async fn seq_push_front(&self, key: &str, value: &str) -> Result<usize> {
        let mut shelves = self.inner.lock().await;
        let (sequence, _) = shelves.sequences.entry(key.to_string()).or_default();
        sequence.push_front(value.to_string());
        Ok(sequence.len())
    }

    async fn seq_range(&self, key: &str) -> Result<Vec<String>> {
        let mut shelves = self.inner.lock().await;
        let lapsed = shelves
            .sequences
            .get(key)
            .map(|(_, expires_at)| expired(*expires_at))
            .unwrap_or(false);
        if lapsed {
            shelves.sequences.remove(key);
            return Ok(Vec::new());
        }
        Ok(shelves
            .sequences
            .get(key)
            .map(|(sequence, _)| sequence.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn seq_remove(&self, key: &str, value: &str) -> Result<usize> {
        let mut shelves = self.inner.lock().await;
        match shelves.sequences.get_mut(key) {
            Some((sequence, _)) => {
                let before = sequence.len();
                if let Some(position) = sequence.iter().position(|entry| entry == value) {
                    sequence.remove(position);
                }
                Ok(before - sequence.len())
            }
            None => Ok(0),
        }
    }

    async fn seq_expire_at(&self, key: &str, at_secs: i64) -> Result<bool> {
        let mut shelves = self.inner.lock().await;
        match shelves.sequences.get_mut(key) {
            Some((_, expires_at)) => {
                *expires_at = Some(at_secs);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let mut shelves = self.inner.lock().await;
        Ok(shelves
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<usize> {
        let mut shelves = self.inner.lock().await;
        let removed = shelves
            .sets
            .get_mut(key)
            .map(|members| members.remove(member))
            .unwrap_or(false);
        Ok(usize::from(removed))
    }

    async fn set_pop(&self, key: &str) -> Result<Option<String>> {
        let mut shelves = self.inner.lock().await;
        match shelves.sets.get_mut(key) {
            Some(members) => {
                let picked = members.iter().next().cloned();
                if let Some(member) = &picked {
                    members.remove(member);
                }
                Ok(picked)
            }
            None => Ok(None),
        }
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let shelves = self.inner.lock().await;
        Ok(shelves
            .sets
            .get(key)
            .map(|members| members.contains(member))
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_roundtrip_and_expiry() {
        let store = MemoryStore::new();
        store.record_set("k", "v").await.unwrap();
        assert_eq!(store.record_get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.record_expire_time("k").await.unwrap(), None);

        let future = Utc::now().timestamp() + 60;
        assert!(store.record_expire_at("k", future).await.unwrap());
        assert_eq!(store.record_expire_time("k").await.unwrap(), Some(future));

        // Backdating the expiry drops the record on the next read.
        store.record_expire_at("k", 1).await.unwrap();
        assert_eq!(store.record_get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn index_orders_by_score_then_member() {
        let store = MemoryStore::new();
        store.index_add("idx", "b", 5).await.unwrap();
        store.index_add("idx", "a", 5).await.unwrap();
        store.index_add("idx", "c", 1).await.unwrap();

        let range = store.index_range("idx").await.unwrap();
        let members: Vec<&str> = range.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(members, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn index_update_never_creates() {
        let store = MemoryStore::new();
        assert!(!store.index_update("idx", "ghost", 7).await.unwrap());
        assert_eq!(store.index_score("idx", "ghost").await.unwrap(), None);

        store.index_add("idx", "m", 1).await.unwrap();
        assert!(store.index_update("idx", "m", 7).await.unwrap());
        assert_eq!(store.index_score("idx", "m").await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn sequence_push_front_and_remove_one() {
        let store = MemoryStore::new();
        store.seq_push_front("seq", "first").await.unwrap();
        store.seq_push_front("seq", "second").await.unwrap();
        assert_eq!(store.seq_range("seq").await.unwrap(), vec!["second", "first"]);

        assert_eq!(store.seq_remove("seq", "first").await.unwrap(), 1);
        assert_eq!(store.seq_remove("seq", "first").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn set_pop_drains_members() {
        let store = MemoryStore::new();
        store.set_add("s", "x").await.unwrap();
        store.set_add("s", "y").await.unwrap();

        assert!(store.set_contains("s", "x").await.unwrap());
        assert!(store.set_pop("s").await.unwrap().is_some());
        assert!(store.set_pop("s").await.unwrap().is_some());
        assert_eq!(store.set_pop("s").await.unwrap(), None);
    }
}
