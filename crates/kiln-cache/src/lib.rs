//! A durable, lock-guarded on-disk cache directory.
//!
//! Each cache identity owns one directory holding a JSON properties block
//! (schema version, validator token, clean-close marker), a lock file used
//! for OS-level advisory locking, and a bincode payload. Opening validates
//! the persisted state under the lock and transparently rebuilds it when the
//! previous session crashed, the validator token changed, or the payload is
//! unreadable. Cross-process ordering is enforced purely through the lock:
//! no write by a concurrent exclusive holder is observable until that holder
//! releases and this process re-acquires.

#![forbid(unsafe_code)]

mod cache;
mod error;
mod lock;
mod properties;
mod util;

pub use cache::{CacheOptions, LockMode, OnFinished, PersistentCache};
pub use error::{CacheError, Result};
pub use lock::{DirLock, LockKind};
pub use properties::{
    CacheProperties, CacheValidator, CACHE_LOCK_FILENAME, CACHE_PAYLOAD_FILENAME,
    CACHE_PROPERTIES_FILENAME, CACHE_SCHEMA_VERSION,
};
pub use util::{atomic_write, PAYLOAD_LIMIT_BYTES};
