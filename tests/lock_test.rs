//! Lock claiming: one setnx per attempt, at most one holder per lock name.

mod common;

use common::{TestStore, registry, x};
use restrictq::JobDescriptor;
use restrictq::error::Error;
use restrictq::lock::{force_unlock, lock_holder, try_acquire};
use restrictq::store::Store;

#[tokio::test]
async fn acquire_sets_lock_with_queue_name() {
    let store = TestStore::new();
    let registry = registry();
    let desc = JobDescriptor::new("WithLockName").arg("bar");

    assert!(try_acquire(&*store, &registry, &desc, "baz_queue").await.unwrap());
    assert_eq!(store.ops(), vec!["setnx"]);
    assert_eq!(
        store.get("performer_lock:foobar").await.unwrap().as_deref(),
        Some("baz_queue")
    );
}

#[tokio::test]
async fn second_acquire_of_same_lock_fails() {
    let store = TestStore::new();
    let registry = registry();

    assert!(try_acquire(&*store, &registry, &x("a"), "q").await.unwrap());
    assert!(!try_acquire(&*store, &registry, &x("a"), "q").await.unwrap());
    // A different queue does not get its own slot.
    assert!(!try_acquire(&*store, &registry, &x("a"), "other").await.unwrap());
    assert_eq!(
        store.get("performer_lock:X_a").await.unwrap().as_deref(),
        Some("q")
    );
}

#[tokio::test]
async fn different_args_lock_independently() {
    let store = TestStore::new();
    let registry = registry();

    assert!(try_acquire(&*store, &registry, &x("a"), "q").await.unwrap());
    assert!(try_acquire(&*store, &registry, &x("b"), "q").await.unwrap());
}

#[tokio::test]
async fn custom_lock_name_merges_distinct_args() {
    let store = TestStore::new();
    let registry = registry();
    let first = JobDescriptor::new("WithLockName").arg("foo");
    let second = JobDescriptor::new("WithLockName").arg("bar");

    assert!(try_acquire(&*store, &registry, &first, "q").await.unwrap());
    assert!(!try_acquire(&*store, &registry, &second, "q").await.unwrap());
}

#[tokio::test]
async fn unknown_class_fails_without_touching_store() {
    let store = TestStore::new();
    let registry = registry();
    let desc = JobDescriptor::new("Unregistered").arg("a");

    let err = try_acquire(&*store, &registry, &desc, "q").await.unwrap_err();
    assert!(matches!(err, Error::UnknownHandler(ref c) if c == "Unregistered"));
    assert!(store.ops().is_empty());
    assert!(store.keys().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquires_have_one_winner() {
    let store = TestStore::new();
    let registry = registry();

    let mut handles = Vec::new();
    for i in 0..32 {
        let store = store.clone();
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            try_acquire(&*store, &registry, &x("same"), &format!("q{i}"))
                .await
                .unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn holder_and_force_unlock() {
    let store = TestStore::new();
    let registry = registry();

    assert_eq!(lock_holder(&*store, &registry, &x("a")).await.unwrap(), None);
    try_acquire(&*store, &registry, &x("a"), "q").await.unwrap();
    assert_eq!(
        lock_holder(&*store, &registry, &x("a")).await.unwrap().as_deref(),
        Some("q")
    );

    assert!(force_unlock(&*store, &registry, &x("a")).await.unwrap());
    assert!(!force_unlock(&*store, &registry, &x("a")).await.unwrap());
    assert!(try_acquire(&*store, &registry, &x("a"), "q").await.unwrap());
}
