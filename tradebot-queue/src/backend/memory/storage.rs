use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    QueueResult,
    backend::{QueueBackend, ListEnd, due_millis},
};

/// Time-ordered set: (due millis, member), kept sorted by due time
type ScoredMembers = Vec<(i64, String)>;

#[derive(Default)]
struct MemoryState {
    lists: HashMap<String, VecDeque<String>>,
    sorted: HashMap<String, ScoredMembers>,
}

/// In-memory backend for testing and development.
///
/// Clones share the same store, so several `Queue` instances built from
/// clones behave like several processes pointed at one server. Every
/// primitive runs under one lock, which makes the check-and-move operations
/// atomic.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueBackend for MemoryBackend {
    async fn push(&self, key: &str, value: String, end: ListEnd) -> QueueResult<()> {
        let mut state = self.state.lock();
        let list = state.lists.entry(key.to_string()).or_default();
        match end {
            ListEnd::Head => list.push_front(value),
            ListEnd::Tail => list.push_back(value),
        }
        Ok(())
    }

    async fn pop(&self, key: &str) -> QueueResult<Option<String>> {
        let mut state = self.state.lock();
        let Some(list) = state.lists.get_mut(key) else {
            return Ok(None);
        };
        let value = list.pop_back();
        if list.is_empty() {
            state.lists.remove(key);
        }
        Ok(value)
    }

    async fn list_len(&self, key: &str) -> QueueResult<usize> {
        Ok(self.state.lock().lists.get(key).map_or(0, VecDeque::len))
    }

    async fn list_range(&self, key: &str, count: usize) -> QueueResult<Vec<String>> {
        let state = self.state.lock();
        Ok(state
            .lists
            .get(key)
            .map(|list| list.iter().take(count).cloned().collect())
            .unwrap_or_default())
    }

    async fn list_index(&self, key: &str, index: usize) -> QueueResult<Option<String>> {
        Ok(self.state.lock().lists.get(key).and_then(|list| list.get(index).cloned()))
    }

    async fn move_list_item(
        &self,
        from: &str,
        value: &str,
        to: &str,
        replacement: String,
        end: ListEnd,
    ) -> QueueResult<bool> {
        let mut state = self.state.lock();

        let removed = match state.lists.get_mut(from) {
            Some(list) => match list.iter().position(|v| v == value) {
                Some(pos) => {
                    list.remove(pos);
                    if list.is_empty() {
                        state.lists.remove(from);
                    }
                    true
                }
                None => false,
            },
            None => false,
        };

        if removed {
            let target = state.lists.entry(to.to_string()).or_default();
            match end {
                ListEnd::Head => target.push_front(replacement),
                ListEnd::Tail => target.push_back(replacement),
            }
        }
        Ok(removed)
    }

    async fn clear_list(&self, key: &str) -> QueueResult<usize> {
        Ok(self.state.lock().lists.remove(key).map_or(0, |list| list.len()))
    }

    async fn schedule(&self, key: &str, member: String, due: DateTime<Utc>) -> QueueResult<()> {
        let mut state = self.state.lock();
        let set = state.sorted.entry(key.to_string()).or_default();
        let score = due_millis(due);

        set.retain(|(_, existing)| *existing != member);
        let pos = set.partition_point(|(s, _)| *s <= score);
        set.insert(pos, (score, member));
        Ok(())
    }

    async fn due_members(&self, key: &str, now: DateTime<Utc>) -> QueueResult<Vec<String>> {
        let state = self.state.lock();
        let cutoff = now.timestamp_millis();
        Ok(state
            .sorted
            .get(key)
            .map(|set| {
                set.iter()
                    .take_while(|(score, _)| *score <= cutoff)
                    .map(|(_, member)| member.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn scheduled_len(&self, key: &str) -> QueueResult<usize> {
        Ok(self.state.lock().sorted.get(key).map_or(0, Vec::len))
    }

    async fn claim_scheduled(&self, key: &str, member: &str, to: &str) -> QueueResult<bool> {
        let mut state = self.state.lock();

        let claimed = match state.sorted.get_mut(key) {
            Some(set) => match set.iter().position(|(_, m)| m == member) {
                Some(pos) => {
                    set.remove(pos);
                    if set.is_empty() {
                        state.sorted.remove(key);
                    }
                    true
                }
                None => false,
            },
            None => false,
        };

        if claimed {
            state
                .lists
                .entry(to.to_string())
                .or_default()
                .push_front(member.to_string());
        }
        Ok(claimed)
    }

    async fn remove_scheduled(&self, key: &str, member: &str) -> QueueResult<bool> {
        let mut state = self.state.lock();
        let Some(set) = state.sorted.get_mut(key) else {
            return Ok(false);
        };
        let Some(pos) = set.iter().position(|(_, m)| m == member) else {
            return Ok(false);
        };
        set.remove(pos);
        if set.is_empty() {
            state.sorted.remove(key);
        }
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
