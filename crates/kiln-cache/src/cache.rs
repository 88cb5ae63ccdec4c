use crate::error::CacheError;
use crate::lock::{DirLock, LockKind};
use crate::properties::{
    CacheProperties, CacheValidator, CACHE_LOCK_FILENAME, CACHE_PAYLOAD_FILENAME,
};
use crate::util::{atomic_write, decode_payload, encode_payload, PAYLOAD_LIMIT_BYTES};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Locking discipline for a cache session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    /// Eager shared lock held for the whole session; read-only.
    Shared,
    /// Eager exclusive lock held for the whole session.
    Exclusive,
    /// Lock taken per operation and released in between: shared for reads,
    /// exclusive for updates. Reads re-load the payload so writes committed
    /// by other processes between operations are observed.
    OnDemand,
}

#[derive(Clone, Copy, Debug)]
pub struct CacheOptions {
    pub lock_mode: LockMode,
    /// Bound on any single lock wait; exceeding it fails with
    /// [`CacheError::LockTimeout`].
    pub lock_timeout: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            lock_mode: LockMode::Exclusive,
            lock_timeout: Duration::from_secs(10),
        }
    }
}

/// Callback invoked with the final value during a clean close.
pub type OnFinished<T> = Box<dyn FnOnce(&T) + Send>;

/// A lock-guarded, crash-aware value persisted in its own directory.
///
/// Lifecycle: `Closed -> Opening -> Validating -> [Rebuilding] -> Open ->
/// Closing -> Closed`. Validation and any rebuild run under a lock taken
/// during `open`, so no other process can observe a half-rebuilt directory.
/// A session that mutates the value marks the directory unclean until
/// `close`; if the process dies first, the *next* opener finds the unclean
/// marker, discards the payload, and reruns its initializer.
pub struct PersistentCache<T> {
    dir: PathBuf,
    identity: String,
    validator: CacheValidator,
    options: CacheOptions,
    value: T,
    dirty: bool,
    rebuilt: bool,
    closed: bool,
    lock: Option<DirLock>,
    on_finished: Option<OnFinished<T>>,
}

impl<T> std::fmt::Debug for PersistentCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCache")
            .field("dir", &self.dir)
            .field("identity", &self.identity)
            .field("dirty", &self.dirty)
            .field("rebuilt", &self.rebuilt)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<T: Serialize + DeserializeOwned> PersistentCache<T> {
    /// Open (creating if needed) the cache directory, validate its contents,
    /// and rebuild via `initializer` when they cannot be trusted.
    ///
    /// `initializer` runs at most once, and only when validation fails:
    /// missing or unparseable properties, schema or validator-token mismatch,
    /// a previous session's unclean shutdown, or an undecodable payload.
    pub fn open(
        dir: impl AsRef<Path>,
        identity: &str,
        validator: &CacheValidator,
        options: CacheOptions,
        initializer: impl FnOnce() -> T,
        on_finished: Option<OnFinished<T>>,
    ) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Initialization {
            path: dir.clone(),
            source,
        })?;

        let lock_path = dir.join(CACHE_LOCK_FILENAME);
        let initial_kind = match options.lock_mode {
            LockMode::Shared => LockKind::Shared,
            LockMode::Exclusive | LockMode::OnDemand => LockKind::Exclusive,
        };
        // An unopenable lock file means the directory itself is unusable, so
        // it surfaces as an initialization failure, not a generic I/O error.
        let mut lock = DirLock::acquire(&lock_path, initial_kind, options.lock_timeout)
            .map_err(|err| initialization_failure(&dir, err))?;

        let mut value = Self::try_load(&dir, identity, validator)?;
        if value.is_none() && lock.kind() == LockKind::Shared {
            // Rebuilding needs the exclusive lock. Revalidate after the
            // upgrade: another process may have rebuilt in the gap.
            drop(lock);
            lock = DirLock::acquire(&lock_path, LockKind::Exclusive, options.lock_timeout)
                .map_err(|err| initialization_failure(&dir, err))?;
            value = Self::try_load(&dir, identity, validator)?;
        }

        let mut rebuilt = false;
        let mut value = match value {
            Some(value) => value,
            None => {
                rebuilt = true;
                Self::rebuild(&dir, identity, validator, initializer)?
            }
        };

        let lock = match options.lock_mode {
            LockMode::Shared if lock.kind() == LockKind::Exclusive => {
                drop(lock);
                let shared = DirLock::acquire(&lock_path, LockKind::Shared, options.lock_timeout)
                    .map_err(|err| initialization_failure(&dir, err))?;
                // A writer may have slipped in between the two locks; prefer
                // its committed state over our rebuild.
                if let Some(current) = Self::try_load(&dir, identity, validator)? {
                    value = current;
                }
                Some(shared)
            }
            LockMode::Shared | LockMode::Exclusive => Some(lock),
            LockMode::OnDemand => {
                lock.release();
                None
            }
        };

        Ok(Self {
            dir,
            identity: identity.to_string(),
            validator: validator.clone(),
            options,
            value,
            dirty: false,
            rebuilt,
            closed: false,
            lock,
            on_finished,
        })
    }

    /// Current value. In `OnDemand` mode this takes a shared lock and
    /// re-reads the payload, so another session's committed updates become
    /// visible.
    pub fn get(&mut self) -> Result<&T, CacheError> {
        if self.closed {
            return Err(CacheError::Closed);
        }
        if self.options.lock_mode == LockMode::OnDemand {
            let lock = DirLock::acquire(
                &self.dir.join(CACHE_LOCK_FILENAME),
                LockKind::Shared,
                self.options.lock_timeout,
            )?;
            match Self::try_load(&self.dir, &self.identity, &self.validator)? {
                Some(value) => self.value = value,
                None => {
                    // A concurrent holder crashed; keep serving the value we
                    // validated at open. The next exclusive opener rebuilds.
                    tracing::debug!(
                        target = "kiln.cache",
                        dir = %self.dir.display(),
                        "on-demand read found untrustworthy cache state"
                    );
                }
            }
            lock.release();
        }
        Ok(&self.value)
    }

    /// Apply `mutate` to the value and persist the result.
    ///
    /// The first mutation of an exclusive session marks the directory unclean
    /// before the payload is touched; the clean marker returns at `close`.
    pub fn update(&mut self, mutate: impl FnOnce(&mut T)) -> Result<(), CacheError> {
        if self.closed {
            return Err(CacheError::Closed);
        }
        match self.options.lock_mode {
            LockMode::Shared => Err(CacheError::ReadOnly),
            LockMode::Exclusive => {
                if !self.dirty {
                    CacheProperties::new(&self.identity, &self.validator, false)
                        .store(&self.dir)?;
                    self.dirty = true;
                }
                mutate(&mut self.value);
                self.write_payload()
            }
            LockMode::OnDemand => {
                let lock = DirLock::acquire(
                    &self.dir.join(CACHE_LOCK_FILENAME),
                    LockKind::Exclusive,
                    self.options.lock_timeout,
                )?;
                if let Some(current) = Self::try_load(&self.dir, &self.identity, &self.validator)? {
                    self.value = current;
                }
                // The unclean window spans just this operation.
                CacheProperties::new(&self.identity, &self.validator, false).store(&self.dir)?;
                mutate(&mut self.value);
                self.write_payload()?;
                CacheProperties::new(&self.identity, &self.validator, true).store(&self.dir)?;
                lock.release();
                Ok(())
            }
        }
    }

    fn write_payload(&self) -> Result<(), CacheError> {
        let bytes = encode_payload(&self.value)?;
        atomic_write(&self.dir.join(CACHE_PAYLOAD_FILENAME), &bytes)
    }

    fn try_load(
        dir: &Path,
        identity: &str,
        validator: &CacheValidator,
    ) -> Result<Option<T>, CacheError> {
        let Some(properties) = CacheProperties::load(dir)? else {
            return Ok(None);
        };
        if !properties.is_trustworthy(identity, validator) {
            tracing::debug!(
                target = "kiln.cache",
                dir = %dir.display(),
                clean_close = properties.clean_close,
                "stale or unclean cache state; rebuild required"
            );
            return Ok(None);
        }

        let payload_path = dir.join(CACHE_PAYLOAD_FILENAME);
        let bytes = match std::fs::read(&payload_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if bytes.len() > PAYLOAD_LIMIT_BYTES {
            return Ok(None);
        }
        match decode_payload(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::debug!(
                    target = "kiln.cache",
                    path = %payload_path.display(),
                    error = %err,
                    "undecodable cache payload; rebuild required"
                );
                Ok(None)
            }
        }
    }

    /// Discard on-disk state and rebuild it from the initializer. Runs under
    /// the exclusive lock held by `open`. The clean-close marker is written
    /// only after the initializer and payload write succeed, so a crash at
    /// any point leaves the directory untrusted for the next opener.
    fn rebuild(
        dir: &Path,
        identity: &str,
        validator: &CacheValidator,
        initializer: impl FnOnce() -> T,
    ) -> Result<T, CacheError> {
        remove_file_if_present(&dir.join(crate::properties::CACHE_PROPERTIES_FILENAME))?;
        remove_file_if_present(&dir.join(CACHE_PAYLOAD_FILENAME))?;

        let value = initializer();
        let bytes = encode_payload(&value)?;
        atomic_write(&dir.join(CACHE_PAYLOAD_FILENAME), &bytes)
            .map_err(|err| initialization_failure(dir, err))?;
        CacheProperties::new(identity, validator, true)
            .store(dir)
            .map_err(|err| initialization_failure(dir, err))?;
        Ok(value)
    }
}

impl<T> PersistentCache<T> {
    /// Whether this open discarded prior state and ran the initializer.
    pub fn was_rebuilt(&self) -> bool {
        self.rebuilt
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the clean-close marker (if the session mutated the cache), run
    /// the `on_finished` callback, and release the lock. Idempotent.
    pub fn close(&mut self) -> Result<(), CacheError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.dirty {
            self.dirty = false;
            CacheProperties::new(&self.identity, &self.validator, true).store(&self.dir)?;
        }
        if let Some(on_finished) = self.on_finished.take() {
            on_finished(&self.value);
        }
        self.lock = None;
        Ok(())
    }
}

impl<T> Drop for PersistentCache<T> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.dirty {
            // Best-effort clean marker; on failure the next opener rebuilds,
            // which is the designed recovery path.
            if let Err(err) =
                CacheProperties::new(&self.identity, &self.validator, true).store(&self.dir)
            {
                tracing::debug!(
                    target = "kiln.cache",
                    dir = %self.dir.display(),
                    error = %err,
                    "failed to write clean-close marker while dropping cache"
                );
            }
        }
        if let Some(on_finished) = self.on_finished.take() {
            on_finished(&self.value);
        }
        self.lock = None;
    }
}

fn remove_file_if_present(path: &Path) -> Result<(), CacheError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn initialization_failure(dir: &Path, err: CacheError) -> CacheError {
    match err {
        CacheError::Io(source) => CacheError::Initialization {
            path: dir.to_path_buf(),
            source,
        },
        other => other,
    }
}
