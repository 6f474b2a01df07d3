//! Error types for restrictq.

use thiserror::Error;

/// Boxed error returned by job handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// The descriptor names a class with no registered handler.
    #[error("unknown handler: {0}")]
    UnknownHandler(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("config error: {0}")]
    Config(String),

    /// The job body failed. Returned only after the lock was released.
    #[error("job {class} failed: {source}")]
    Execution {
        class: String,
        #[source]
        source: BoxError,
    },

    /// Queue removal or lock deletion failed; the lock may still be held.
    #[error("release of {lock_key} failed: {source}")]
    Release {
        lock_key: String,
        #[source]
        source: Box<Error>,
    },

    /// The job failed or panicked, and releasing it failed too. `source()`
    /// is the job's own failure.
    #[error("{release} (after job failure: {execution})")]
    ReleaseAfterFailure {
        release: Box<Error>,
        #[source]
        execution: Box<Error>,
    },

    /// The job body panicked.
    #[error("job {class} panicked: {message}")]
    Panicked { class: String, message: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
