#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::QueueResult;

/// Due time as whole milliseconds, rounded up.
///
/// Cutoffs are compared in whole milliseconds rounded down, so rounding the
/// due side up keeps a job invisible until its exact due instant has passed.
pub fn due_millis(due: DateTime<Utc>) -> i64 {
    let millis = due.timestamp_millis();
    if due.timestamp_subsec_nanos() % 1_000_000 != 0 {
        millis.saturating_add(1)
    } else {
        millis
    }
}

/// End of a list an element is pushed to.
///
/// Lists are consumed from the tail, so `Head` is the ordinary FIFO insertion
/// end (LPUSH) and `Tail` places an element next in line (RPUSH).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    Head,
    Tail,
}

/// Storage primitives the queue is built on.
///
/// Every method is a single atomic step on the store. The two `move` style
/// primitives are check-and-move: the push only happens when the removal
/// actually removed something, which is what keeps concurrent consumers from
/// promoting or replaying the same entry twice.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Push a value onto a list
    async fn push(&self, key: &str, value: String, end: ListEnd) -> QueueResult<()>;

    /// Pop a value from the tail (consumption end) of a list
    async fn pop(&self, key: &str) -> QueueResult<Option<String>>;

    /// Number of elements in a list (0 if absent)
    async fn list_len(&self, key: &str) -> QueueResult<usize>;

    /// Up to `count` elements starting at the head
    async fn list_range(&self, key: &str, count: usize) -> QueueResult<Vec<String>>;

    /// Element at a head-based index
    async fn list_index(&self, key: &str, index: usize) -> QueueResult<Option<String>>;

    /// Remove one element equal to `value` from `from`; if one was removed,
    /// push `replacement` onto `to`. Returns whether the move happened.
    async fn move_list_item(
        &self,
        from: &str,
        value: &str,
        to: &str,
        replacement: String,
        end: ListEnd,
    ) -> QueueResult<bool>;

    /// Delete a list, returning how many elements it held
    async fn clear_list(&self, key: &str) -> QueueResult<usize>;

    /// Add a member to a time-ordered set
    async fn schedule(&self, key: &str, member: String, due: DateTime<Utc>) -> QueueResult<()>;

    /// Members whose due time is at or before `now`, earliest first
    async fn due_members(&self, key: &str, now: DateTime<Utc>) -> QueueResult<Vec<String>>;

    /// Number of members in a time-ordered set
    async fn scheduled_len(&self, key: &str) -> QueueResult<usize>;

    /// Remove `member` from the set at `key`; if it was present, push it onto
    /// the head of `to`. Returns whether the member was claimed.
    async fn claim_scheduled(&self, key: &str, member: &str, to: &str) -> QueueResult<bool>;

    /// Remove `member` from the set at `key`, returning whether it was present
    async fn remove_scheduled(&self, key: &str, member: &str) -> QueueResult<bool>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
