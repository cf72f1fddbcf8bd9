//! Redis-backed storage.
//!
//! Lanes and the dead-letter store are Redis lists (LPUSH head, RPOP tail),
//! the scheduled set is a sorted set scored by due time in epoch seconds
//! (millisecond fraction). Check-and-move primitives run as Lua scripts so
//! each is a single atomic step on the server.
//!
//! On Redis Cluster every key of a namespace must hash to one slot; use a
//! hash-tagged namespace such as `{jobs}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use tracing::{info, instrument};

use crate::{
    QueueResult, QueueError,
    backend::{QueueBackend, ListEnd, due_millis},
};

/// ZREM the member; push it onto the target list only if it was removed.
const CLAIM_SCHEDULED_LUA: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 1 then
    redis.call('LPUSH', KEYS[2], ARGV[1])
    return 1
end
return 0
"#;

/// LREM one matching element; push the replacement only if it was removed.
const MOVE_LIST_ITEM_LUA: &str = r#"
if redis.call('LREM', KEYS[1], 1, ARGV[1]) == 1 then
    if ARGV[3] == 'tail' then
        redis.call('RPUSH', KEYS[2], ARGV[2])
    else
        redis.call('LPUSH', KEYS[2], ARGV[2])
    end
    return 1
end
return 0
"#;

/// Cutoff score: epoch seconds, millisecond fraction rounded down
fn score(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

/// Due score: epoch seconds, millisecond fraction rounded up
fn due_score(due: DateTime<Utc>) -> f64 {
    due_millis(due) as f64 / 1000.0
}

/// Redis backend over a multiplexed, auto-reconnecting connection
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    claim_scheduled: Script,
    move_list_item: Script,
}

impl RedisBackend {
    /// Connect to the server at `url` (e.g. `redis://127.0.0.1:6379`)
    pub async fn connect(url: &str) -> QueueResult<Self> {
        let client = Client::open(url)
            .map_err(|e| QueueError::Configuration(format!("invalid redis url: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::backend("CONNECT", "", e))?;

        info!("Connected to redis");
        Ok(Self::from_connection(conn))
    }

    /// Build from an existing connection manager
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            claim_scheduled: Script::new(CLAIM_SCHEDULED_LUA),
            move_list_item: Script::new(MOVE_LIST_ITEM_LUA),
        }
    }
}

#[async_trait]
impl QueueBackend for RedisBackend {
    async fn push(&self, key: &str, value: String, end: ListEnd) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _len: usize = match end {
            ListEnd::Head => conn
                .lpush(key, value)
                .await
                .map_err(|e| QueueError::backend("LPUSH", key, e))?,
            ListEnd::Tail => conn
                .rpush(key, value)
                .await
                .map_err(|e| QueueError::backend("RPUSH", key, e))?,
        };
        Ok(())
    }

    async fn pop(&self, key: &str) -> QueueResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.rpop(key, None)
            .await
            .map_err(|e| QueueError::backend("RPOP", key, e))
    }

    async fn list_len(&self, key: &str) -> QueueResult<usize> {
        let mut conn = self.conn.clone();
        conn.llen(key)
            .await
            .map_err(|e| QueueError::backend("LLEN", key, e))
    }

    async fn list_range(&self, key: &str, count: usize) -> QueueResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let stop = isize::try_from(count - 1).unwrap_or(isize::MAX);
        let mut conn = self.conn.clone();
        conn.lrange(key, 0, stop)
            .await
            .map_err(|e| QueueError::backend("LRANGE", key, e))
    }

    async fn list_index(&self, key: &str, index: usize) -> QueueResult<Option<String>> {
        let Ok(index) = isize::try_from(index) else {
            return Ok(None);
        };
        let mut conn = self.conn.clone();
        conn.lindex(key, index)
            .await
            .map_err(|e| QueueError::backend("LINDEX", key, e))
    }

    #[instrument(skip(self, value, replacement), level = "debug")]
    async fn move_list_item(
        &self,
        from: &str,
        value: &str,
        to: &str,
        replacement: String,
        end: ListEnd,
    ) -> QueueResult<bool> {
        let mut conn = self.conn.clone();
        let side = match end {
            ListEnd::Head => "head",
            ListEnd::Tail => "tail",
        };
        let moved: i64 = self
            .move_list_item
            .key(from)
            .key(to)
            .arg(value)
            .arg(replacement)
            .arg(side)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| QueueError::backend("EVALSHA move_list_item", from, e))?;
        Ok(moved == 1)
    }

    async fn clear_list(&self, key: &str) -> QueueResult<usize> {
        let mut conn = self.conn.clone();
        let (len, _deleted): (usize, i64) = redis::pipe()
            .atomic()
            .llen(key)
            .del(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::backend("MULTI LLEN DEL", key, e))?;
        Ok(len)
    }

    async fn schedule(&self, key: &str, member: String, due: DateTime<Utc>) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _added: usize = conn
            .zadd(key, member, due_score(due))
            .await
            .map_err(|e| QueueError::backend("ZADD", key, e))?;
        Ok(())
    }

    async fn due_members(&self, key: &str, now: DateTime<Utc>) -> QueueResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.zrangebyscore(key, "-inf", score(now))
            .await
            .map_err(|e| QueueError::backend("ZRANGEBYSCORE", key, e))
    }

    async fn scheduled_len(&self, key: &str) -> QueueResult<usize> {
        let mut conn = self.conn.clone();
        conn.zcard(key)
            .await
            .map_err(|e| QueueError::backend("ZCARD", key, e))
    }

    #[instrument(skip(self, member), level = "debug")]
    async fn claim_scheduled(&self, key: &str, member: &str, to: &str) -> QueueResult<bool> {
        let mut conn = self.conn.clone();
        let claimed: i64 = self
            .claim_scheduled
            .key(key)
            .key(to)
            .arg(member)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| QueueError::backend("EVALSHA claim_scheduled", key, e))?;
        Ok(claimed == 1)
    }

    async fn remove_scheduled(&self, key: &str, member: &str) -> QueueResult<bool> {
        let mut conn = self.conn.clone();
        let removed: usize = conn
            .zrem(key, member)
            .await
            .map_err(|e| QueueError::backend("ZREM", key, e))?;
        Ok(removed == 1)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
