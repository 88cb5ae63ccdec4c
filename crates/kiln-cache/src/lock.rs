use crate::error::CacheError;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Which flavor of OS-level lock to take on the lock file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockKind {
    /// Multiple concurrent readers, excludes writers.
    Shared,
    /// Single holder.
    Exclusive,
}

impl LockKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            LockKind::Shared => "shared",
            LockKind::Exclusive => "exclusive",
        }
    }
}

/// An advisory lock on a cache directory's lock file, safe across processes.
///
/// `fs2` file locks are process-scoped on Unix (they do not exclude other
/// threads of the same process), so a leaked per-path `RwLock` provides the
/// in-process half of the exclusion. The lock is released on drop.
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
    kind: LockKind,
    _guard: ProcessGuard,
}

#[derive(Debug)]
enum ProcessGuard {
    Shared(RwLockReadGuard<'static, ()>),
    Exclusive(RwLockWriteGuard<'static, ()>),
}

impl DirLock {
    /// Take the lock if it is free right now.
    pub fn try_acquire(path: &Path, kind: LockKind) -> Result<Option<Self>, CacheError> {
        let process_lock = process_lock_for_path(path);
        let guard = match kind {
            LockKind::Shared => match process_lock.try_read() {
                Ok(guard) => ProcessGuard::Shared(guard),
                Err(TryLockError::Poisoned(poisoned)) => {
                    ProcessGuard::Shared(poisoned.into_inner())
                }
                Err(TryLockError::WouldBlock) => return Ok(None),
            },
            LockKind::Exclusive => match process_lock.try_write() {
                Ok(guard) => ProcessGuard::Exclusive(guard),
                Err(TryLockError::Poisoned(poisoned)) => {
                    ProcessGuard::Exclusive(poisoned.into_inner())
                }
                Err(TryLockError::WouldBlock) => return Ok(None),
            },
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        // Called via the trait: `File` grew inherent `try_lock_*` methods in
        // Rust 1.89 with a different error type.
        let locked = match kind {
            LockKind::Shared => fs2::FileExt::try_lock_shared(&file),
            LockKind::Exclusive => fs2::FileExt::try_lock_exclusive(&file),
        };
        match locked {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
                kind,
                _guard: guard,
            })),
            Err(err) if is_contended(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Take the lock, polling for up to `timeout`. Fails with
    /// [`CacheError::LockTimeout`] instead of blocking indefinitely.
    pub fn acquire(path: &Path, kind: LockKind, timeout: Duration) -> Result<Self, CacheError> {
        let started = Instant::now();
        loop {
            if let Some(lock) = Self::try_acquire(path, kind)? {
                return Ok(lock);
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(CacheError::LockTimeout {
                    path: path.to_path_buf(),
                    mode: kind.name(),
                    waited_millis: waited.as_millis() as u64,
                });
            }
            std::thread::sleep(POLL_INTERVAL.min(timeout - waited));
        }
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Explicit release; equivalent to dropping the lock.
    pub fn release(self) {}

    /// Probe whether some other holder currently has the lock.
    ///
    /// Advisory-lock granularity makes this approximate: a holder in this
    /// process through a different handle also reads as "held elsewhere".
    pub fn is_held_by_other_process(path: &Path) -> Result<bool, CacheError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        match fs2::FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                let _ = fs2::FileExt::unlock(&file);
                Ok(false)
            }
            Err(err) if is_contended(&err) => Ok(true),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(err) = fs2::FileExt::unlock(&self.file) {
            tracing::debug!(
                target = "kiln.cache",
                path = %self.path.display(),
                error = %err,
                "failed to release advisory file lock"
            );
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    let contended = fs2::lock_contended_error();
    err.kind() == contended.kind()
        && (err.raw_os_error() == contended.raw_os_error() || err.raw_os_error().is_none())
}

fn process_lock_for_path(path: &Path) -> &'static RwLock<()> {
    static PROCESS_LOCKS: OnceLock<Mutex<HashMap<PathBuf, &'static RwLock<()>>>> = OnceLock::new();
    let locks = PROCESS_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));

    let mut map = locks
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(existing) = map.get(path) {
        return existing;
    }

    let lock: &'static RwLock<()> = Box::leak(Box::new(RwLock::new(())));
    map.insert(path.to_path_buf(), lock);
    lock
}
