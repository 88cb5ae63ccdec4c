use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors produced by the persistent directory cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Another holder kept the lock for the whole bounded wait. Callers retry
    /// with backoff; this is never silently skipped.
    #[error("timed out waiting for {mode} lock on {path} after {waited_millis}ms")]
    LockTimeout {
        path: PathBuf,
        mode: &'static str,
        waited_millis: u64,
    },

    /// The cache directory could not be created or written. Fatal; surfaced
    /// to the user rather than degraded.
    #[error("failed to initialize cache directory {path}: {source}")]
    Initialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache is open in shared (read-only) mode")]
    ReadOnly,

    #[error("cache has already been closed")]
    Closed,
}
