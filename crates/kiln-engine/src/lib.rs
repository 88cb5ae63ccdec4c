//! Compile-avoidance decision engine.
//!
//! Ties the ABI fingerprinting pipeline to the persistent cache: each
//! [`CompileAvoidance::analyze`] call fingerprints the current class files,
//! diffs them against the generation persisted by the previous build, stores
//! the new generation, and reports which classes downstream consumers must
//! recompile against.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kiln_abi::{AbiDiff, AbiError, FingerprintMap, Fingerprinter, MemberPolicy, ABI_FORMAT_VERSION};
use kiln_cache::{CacheError, CacheOptions, CacheValidator, LockMode, PersistentCache};

/// One compiled class handed to the engine.
#[derive(Clone, Debug)]
pub struct ClassInput {
    /// Binary class name, e.g. `com/example/Foo`.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ClassInput {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Only integrity faults surface here; per-class parse failures are
    /// reported in [`AnalysisOutcome::malformed`] instead.
    #[error(transparent)]
    Abi(#[from] AbiError),
}

/// Result of one analysis pass.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub diff: AbiDiff,
    /// Classes that could not be parsed, with the parse error rendered per
    /// class. They are excluded from the stored generation and always
    /// invalidated, so the scheduler treats them as "assume changed".
    pub malformed: BTreeMap<String, String>,
    /// Whether the persisted generation had to be rebuilt from scratch
    /// (first build, unclean shutdown, or format change). A rebuild means
    /// there was no previous generation to compare against.
    pub cache_rebuilt: bool,
}

impl AnalysisOutcome {
    /// Classes downstream consumers must recompile against:
    /// `changed_api ∪ removed_api ∪ malformed`.
    pub fn invalidated(&self) -> BTreeSet<String> {
        let mut set = self.diff.invalidated();
        set.extend(self.malformed.keys().cloned());
        set
    }

    pub fn requires_recompilation(&self) -> bool {
        !self.diff.is_clean() || !self.malformed.is_empty()
    }
}

/// The engine itself. Construction is cheap; all I/O happens in
/// [`analyze`](Self::analyze).
#[derive(Debug)]
pub struct CompileAvoidance {
    cache_dir: PathBuf,
    identity: String,
    policy: MemberPolicy,
    lock_timeout: Duration,
}

impl CompileAvoidance {
    /// `cache_dir` is the per-compilation-unit cache directory; `identity`
    /// names the unit (e.g. `"compile:main"`) and is checked on reopen.
    pub fn new(cache_dir: impl AsRef<Path>, identity: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            identity: identity.into(),
            policy: MemberPolicy::everything(),
            lock_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_policy(mut self, policy: MemberPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Token distinguishing fingerprint generations that cannot be compared.
    /// Embeds the crate version, the canonical ABI format version, and the
    /// member policy, so changing any of them discards the persisted
    /// generation instead of producing a bogus diff against it.
    fn validator_token(&self) -> String {
        format!(
            "kiln/{}/abi-format/{}/policy/{:?}/{}",
            env!("CARGO_PKG_VERSION"),
            ABI_FORMAT_VERSION,
            self.policy.min_visibility,
            self.policy.include_synthetic,
        )
    }

    /// Fingerprint `classes`, diff against the previous generation, persist
    /// the new one, and report the invalidation set.
    ///
    /// A malformed class never aborts the pass; it is dropped from the stored
    /// generation and listed in the outcome. A fingerprint collision does
    /// abort: it would silently mask a real API change.
    pub fn analyze(&self, classes: &[ClassInput]) -> Result<AnalysisOutcome, EngineError> {
        let validator = CacheValidator::new(self.validator_token());
        let options = CacheOptions {
            lock_mode: LockMode::Exclusive,
            lock_timeout: self.lock_timeout,
        };
        let mut cache = PersistentCache::open(
            &self.cache_dir,
            &self.identity,
            &validator,
            options,
            FingerprintMap::new,
            None,
        )?;
        let cache_rebuilt = cache.was_rebuilt();
        let previous = cache.get()?.clone();

        let mut fingerprinter = Fingerprinter::new(self.policy);
        let mut malformed = BTreeMap::new();
        for class in classes {
            match fingerprinter.add(&class.name, &class.bytes) {
                Ok(_) => {}
                Err(err @ AbiError::ClassFormat(_)) => {
                    tracing::debug!(
                        target = "kiln.engine",
                        class = %class.name,
                        error = %err,
                        "skipping malformed class; treating as changed"
                    );
                    malformed.insert(class.name.clone(), err.to_string());
                }
                Err(err) => return Err(err.into()),
            }
        }
        let current = fingerprinter.finish();

        let diff = AbiDiff::between(&previous, &current);
        cache.update(|stored| *stored = current)?;
        cache.close()?;

        tracing::debug!(
            target = "kiln.engine",
            identity = %self.identity,
            changed = diff.changed_api.len(),
            removed = diff.removed_api.len(),
            unchanged = diff.unchanged.len(),
            malformed = malformed.len(),
            cache_rebuilt,
            "analysis complete"
        );

        Ok(AnalysisOutcome {
            diff,
            malformed,
            cache_rebuilt,
        })
    }
}
