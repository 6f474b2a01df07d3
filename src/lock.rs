//! Lock names and lock records.
//!
//! A lock record `performer_lock:<name> -> queue` exists exactly while some
//! worker holds the right to run the logical job `<name>`. It is created
//! with a single `setnx`, which is the only mutual exclusion in the protocol.

use opentelemetry::KeyValue;
use tracing::{debug, warn};

use crate::error::Result;
use crate::handler::HandlerRegistry;
use crate::keys::lock_key;
use crate::model::JobDescriptor;
use crate::store::Store;
use crate::telemetry::metrics;

/// Separator between class and arguments in default lock names.
const SEPARATOR: &str = "_";

/// Derive the lock name for a descriptor.
///
/// Delegates to the handler's [`lock_name`](crate::handler::Handler::lock_name)
/// when it provides one, otherwise joins class and arguments with `_`.
/// Fails with `UnknownHandler` if the class is not registered.
pub fn lock_name(registry: &HandlerRegistry, descriptor: &JobDescriptor) -> Result<String> {
    let handler = registry.resolve(&descriptor.class)?;
    if let Some(name) = handler.lock_name(&descriptor.args) {
        return Ok(name);
    }
    Ok(default_lock_name(descriptor))
}

fn default_lock_name(descriptor: &JobDescriptor) -> String {
    let args: Vec<String> = descriptor.args.iter().map(ToString::to_string).collect();
    format!("{}{SEPARATOR}{}", descriptor.class, args.join(SEPARATOR))
}

/// Try to claim the lock for `descriptor` on behalf of `queue`.
///
/// Returns `false` when another worker already holds it.
pub async fn try_acquire<S: Store>(
    store: &S,
    registry: &HandlerRegistry,
    descriptor: &JobDescriptor,
    queue: &str,
) -> Result<bool> {
    let key = lock_key(&lock_name(registry, descriptor)?);
    let acquired = store.setnx(&key, queue).await?;

    metrics::lock_attempts().add(
        1,
        &[
            KeyValue::new("queue", queue.to_string()),
            KeyValue::new("result", if acquired { "acquired" } else { "contended" }),
        ],
    );
    debug!(%queue, lock_key = %key, acquired, "lock attempt");

    Ok(acquired)
}

/// Queue name recorded in the descriptor's lock, if it is held.
pub async fn lock_holder<S: Store>(
    store: &S,
    registry: &HandlerRegistry,
    descriptor: &JobDescriptor,
) -> Result<Option<String>> {
    let key = lock_key(&lock_name(registry, descriptor)?);
    store.get(&key).await
}

/// Delete a descriptor's lock record without touching any queue.
///
/// Operator recovery for a lock leaked by a worker that died mid-job.
/// Returns whether a record was removed.
pub async fn force_unlock<S: Store>(
    store: &S,
    registry: &HandlerRegistry,
    descriptor: &JobDescriptor,
) -> Result<bool> {
    let key = lock_key(&lock_name(registry, descriptor)?);
    let removed = store.del(&key).await?;
    if removed {
        warn!(lock_key = %key, "lock record force-removed");
    }
    Ok(removed)
}
