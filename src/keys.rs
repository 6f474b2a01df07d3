//! Store key namespaces.

/// Prefix for lock records.
pub const LOCK_PREFIX: &str = "performer_lock:";

/// Prefix for queue lists.
pub const QUEUE_PREFIX: &str = "queue:";

/// Full store key for a lock name.
pub fn lock_key(lock_name: &str) -> String {
    format!("{LOCK_PREFIX}{lock_name}")
}

/// Full store key for a queue's backing list.
pub fn queue_key(queue: &str) -> String {
    format!("{QUEUE_PREFIX}{queue}")
}
