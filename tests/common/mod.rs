//! Shared fixtures: a fault-injecting store and handler registries.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use restrictq::error::{Error, Result};
use restrictq::handler::{FnHandler, HandlerFuture, HandlerRegistry, HandlerResult};
use restrictq::model::{Arg, JobDescriptor};
use restrictq::store::{MemoryStore, Store};

/// Box a handler body, pinning its output type.
pub fn boxed<F>(f: F) -> HandlerFuture
where
    F: Future<Output = HandlerResult> + Send + 'static,
{
    Box::pin(f)
}

/// A [`MemoryStore`] that records each call and can be told to fail.
#[derive(Default)]
pub struct TestStore {
    pub inner: MemoryStore,
    pub fail_lrem: AtomicBool,
    pub fail_del: AtomicBool,
    ops: Mutex<Vec<&'static str>>,
}

impl TestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, op: &'static str) {
        self.ops.lock().unwrap().push(op);
    }

    /// Calls made so far, in order.
    pub fn ops(&self) -> Vec<&'static str> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn entries(&self, queue: &str) -> Vec<String> {
        self.inner.entries(queue)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}

impl Store for TestStore {
    async fn peek(&self, queue: &str, offset: u64, count: u64) -> Result<Vec<String>> {
        self.record("peek");
        self.inner.peek(queue, offset, count).await
    }

    async fn setnx(&self, key: &str, value: &str) -> Result<bool> {
        self.record("setnx");
        self.inner.setnx(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.record("get");
        self.inner.get(key).await
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.record("del");
        if self.fail_del.load(Ordering::SeqCst) {
            return Err(Error::Store("del: store unreachable".to_string()));
        }
        self.inner.del(key).await
    }

    async fn lrem(&self, queue_key: &str, count: i64, value: &str) -> Result<u64> {
        self.record("lrem");
        if self.fail_lrem.load(Ordering::SeqCst) {
            return Err(Error::Store("lrem: store unreachable".to_string()));
        }
        self.inner.lrem(queue_key, count, value).await
    }

    async fn push(&self, queue: &str, payload: &str) -> Result<()> {
        self.record("push");
        self.inner.push(queue, payload).await
    }

    async fn pop(&self, queue: &str) -> Result<Option<String>> {
        self.record("pop");
        self.inner.pop(queue).await
    }

    async fn len(&self, queue: &str) -> Result<u64> {
        self.inner.len(queue).await
    }
}

fn noop(_: Vec<Arg>) -> HandlerFuture {
    boxed(async { Ok(()) })
}

fn fail(_: Vec<Arg>) -> HandlerFuture {
    boxed(async { Err("uh-oh. that wasn't supposed to happen".into()) })
}

/// Registry with:
/// - `X`: default lock naming,
/// - `WithLockName`: every job locks on `foobar`,
/// - `Fails`: always errors.
pub fn registry() -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    registry
        .register(FnHandler::new("X", noop))
        .register(FnHandler::new("WithLockName", noop).with_lock_name(|_| "foobar".to_string()))
        .register(FnHandler::new("Fails", fail));
    Arc::new(registry)
}

/// Registry whose `Count` handler bumps the returned counter.
pub fn counting_registry() -> (Arc<HandlerRegistry>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let mut registry = HandlerRegistry::new();
    registry
        .register(FnHandler::new("X", noop))
        .register(FnHandler::new("Fails", fail))
        .register(FnHandler::new("Count", move |_| {
            let c = Arc::clone(&c);
            boxed(async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }));
    (Arc::new(registry), count)
}

pub fn x(arg: &str) -> JobDescriptor {
    JobDescriptor::new("X").arg(arg)
}

pub async fn push<S: Store>(store: &S, queue: &str, descriptor: &JobDescriptor) {
    restrictq::enqueue(store, queue, descriptor).await.unwrap();
}
