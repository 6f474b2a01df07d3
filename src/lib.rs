//! # restrictq
//!
//! Restricted performers for shared job queues. Workers reserve jobs without
//! popping them, and a job whose lock name is already held by another worker
//! is skipped, so at most one copy of any logical job runs at a time.
//!
//! The pieces, leaf first: [`lock::lock_name`] derives a job's identity,
//! [`lock::try_acquire`] claims it with one `setnx`,
//! [`reserve::next_unlocked`] scans the head of a queue for a claimable job,
//! and [`guard::run_locked`] runs it and releases it (queue entry first, lock
//! second). [`source::RestrictedSource`] composes these over a plain
//! [`source::BasicSource`].
//!
//! Locks have no expiry. A worker that dies mid-job leaves its lock behind
//! until an operator clears it with [`lock::force_unlock`].

pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod handler;
pub mod keys;
pub mod lock;
pub mod model;
pub mod reserve;
pub mod source;
pub mod store;
pub mod telemetry;
pub mod worker;

pub use error::{Error, Result};
pub use handler::{FnHandler, Handler, HandlerRegistry};
pub use model::{Arg, Job, JobDescriptor};
pub use source::{BasicSource, JobSource, RestrictedSource, enqueue};
pub use store::{MemoryStore, Store};
