use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::Result;
use crate::store::QueueStore;

/// Redis-backed store adapter.
///
/// One logical Redis instance holds all four structures. The connection
/// manager multiplexes requests and reconnects on transport failure, so a
/// single `RedisStore` can be shared by many concurrent callers.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!(url, "Connected to Redis store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl QueueStore for RedisStore {
    async fn record_set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn record_get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn record_expire_at(&self, key: &str, at_secs: i64) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.expire_at(key, at_secs).await?)
    }

    async fn record_expire_time(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.conn.clone();
        // EXPIRETIME returns -1 for no expiry and -2 for a missing key.
        let at: i64 = redis::cmd("EXPIRETIME")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(if at < 0 { None } else { Some(at) })
    }

    async fn index_add(&self, index: &str, member: &str, score: i64) -> Result<usize> {
        let mut conn = self.conn.clone();
        Ok(conn.zadd(index, member, score).await?)
    }

    async fn index_update(&self, index: &str, member: &str, score: i64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let existing: Option<i64> = conn.zscore(index, member).await?;
        if existing.is_none() {
            return Ok(false);
        }
        // XX: update only, never create a member as a side effect.
        let _: i64 = redis::cmd("ZADD")
            .arg(index)
            .arg("XX")
            .arg("CH")
            .arg(score)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(true)
    }

    async fn index_remove(&self, index: &str, member: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        Ok(conn.zrem(index, member).await?)
    }

    async fn index_range(&self, index: &str) -> Result<Vec<(String, i64)>> {
        let mut conn = self.conn.clone();
        Ok(conn.zrange_withscores(index, 0, -1).await?)
    }

    async fn index_score(&self, index: &str, member: &str) -> Result<Option<i64>> {
        let mut conn = self.conn.clone();
        Ok(conn.zscore(index, member).await?)
    }

    async fn index_count_from(&self, index: &str, min_score: i64) -> Result<usize> {
        let mut conn = self.conn.clone();
        Ok(conn.zcount(index, min_score, "+inf").await?)
    }

    async fn seq_push_front(&self, key: &str, value: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        Ok(conn.lpush(key, value).await?)
    }

    async fn seq_range(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(key, 0, -1).await?)
    }

    async fn seq_remove(&self, key: &str, value: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        Ok(conn.lrem(key, 1, value).await?)
    }

    async fn seq_expire_at(&self, key: &str, at_secs: i64) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.expire_at(key, at_secs).await?)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.sadd(key, member).await?)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        Ok(conn.srem(key, member).await?)
    }

    async fn set_pop(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.spop(key).await?)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.sismember(key, member).await?)
    }
}
