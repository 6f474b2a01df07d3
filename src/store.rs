//! The store adapter: the handful of atomic primitives the locking protocol
//! is built on.
//!
//! `setnx` is the only operation that provides mutual exclusion. Everything
//! else is a single round trip with no atomicity across calls.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::keys::queue_key;

/// Shared key-value store with list operations.
///
/// Queue-facing methods take the bare queue name; `lrem` takes the full list
/// key so callers can address any list.
pub trait Store: Send + Sync + 'static {
    /// Non-destructive read of up to `count` entries starting at `offset`.
    fn peek(
        &self,
        queue: &str,
        offset: u64,
        count: u64,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Set `key` to `value` only if absent. True iff this call set it.
    fn setnx(&self, key: &str, value: &str) -> impl Future<Output = Result<bool>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Remove `key`. True if something was removed.
    fn del(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Remove up to `count` entries equal to `value`: from the head when
    /// positive, from the tail when negative, all of them when zero.
    /// Returns the number removed.
    fn lrem(
        &self,
        queue_key: &str,
        count: i64,
        value: &str,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Append to the tail of a queue.
    fn push(&self, queue: &str, payload: &str) -> impl Future<Output = Result<()>> + Send;

    /// Destructively take the head of a queue.
    fn pop(&self, queue: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    fn len(&self, queue: &str) -> impl Future<Output = Result<u64>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    lists: HashMap<String, VecDeque<String>>,
    values: HashMap<String, String>,
}

/// Process-local store. Every operation holds one mutex for its duration,
/// which makes each call atomic the same way a single store command is.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every entry in a queue, head first.
    pub fn entries(&self, queue: &str) -> Vec<String> {
        self.state()
            .lists
            .get(&queue_key(queue))
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All keys currently set, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state().values.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Store for MemoryStore {
    async fn peek(&self, queue: &str, offset: u64, count: u64) -> Result<Vec<String>> {
        let state = self.state();
        let Some(list) = state.lists.get(&queue_key(queue)) else {
            return Ok(Vec::new());
        };
        Ok(list
            .iter()
            .skip(offset as usize)
            .take(count as usize)
            .cloned()
            .collect())
    }

    async fn setnx(&self, key: &str, value: &str) -> Result<bool> {
        let mut state = self.state();
        if state.values.contains_key(key) {
            return Ok(false);
        }
        state.values.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state().values.get(key).cloned())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        Ok(self.state().values.remove(key).is_some())
    }

    async fn lrem(&self, queue_key: &str, count: i64, value: &str) -> Result<u64> {
        let mut state = self.state();
        let Some(list) = state.lists.get_mut(queue_key) else {
            return Ok(0);
        };

        let limit = if count == 0 {
            usize::MAX
        } else {
            count.unsigned_abs() as usize
        };

        let mut positions: Vec<usize> = list
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.as_str() == value)
            .map(|(i, _)| i)
            .collect();
        if count < 0 {
            positions.reverse();
        }
        positions.truncate(limit);
        // Remove back to front so earlier indices stay valid.
        positions.sort_unstable_by(|a, b| b.cmp(a));
        for i in &positions {
            list.remove(*i);
        }

        if list.is_empty() {
            state.lists.remove(queue_key);
        }
        Ok(positions.len() as u64)
    }

    async fn push(&self, queue: &str, payload: &str) -> Result<()> {
        self.state()
            .lists
            .entry(queue_key(queue))
            .or_default()
            .push_back(payload.to_string());
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Option<String>> {
        let mut state = self.state();
        let key = queue_key(queue);
        let Some(list) = state.lists.get_mut(&key) else {
            return Ok(None);
        };
        let head = list.pop_front();
        if list.is_empty() {
            state.lists.remove(&key);
        }
        Ok(head)
    }

    async fn len(&self, queue: &str) -> Result<u64> {
        Ok(self
            .state()
            .lists
            .get(&queue_key(queue))
            .map_or(0, |list| list.len() as u64))
    }
}
