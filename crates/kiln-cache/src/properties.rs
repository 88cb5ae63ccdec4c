use crate::error::CacheError;
use crate::util::{atomic_write, now_millis};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk properties schema. Bumped when the properties or payload layout
/// changes; a mismatch is treated like an unclean close.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

pub const CACHE_PROPERTIES_FILENAME: &str = "cache.properties";
pub const CACHE_LOCK_FILENAME: &str = "cache.lock";
pub const CACHE_PAYLOAD_FILENAME: &str = "payload.bin";

/// Expected validator token for a cache. The token identifies the schema and
/// content version the opener understands; persisted state carrying any other
/// token is discarded and rebuilt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheValidator {
    token: String,
}

impl CacheValidator {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// The properties block persisted next to the payload.
///
/// `clean_close` is the crash detector: a writer session flips it to `false`
/// before its first mutation and back to `true` on orderly close. Any opener
/// that finds it `false` treats the payload as untrustworthy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheProperties {
    pub schema_version: u32,
    pub identity: String,
    pub validator_token: String,
    pub clean_close: bool,
    pub last_updated_millis: u64,
}

impl CacheProperties {
    pub fn new(identity: &str, validator: &CacheValidator, clean_close: bool) -> Self {
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            identity: identity.to_string(),
            validator_token: validator.token().to_string(),
            clean_close,
            last_updated_millis: now_millis(),
        }
    }

    /// Load the properties block; `None` when missing or unparseable (both
    /// mean "rebuild", so they are not errors).
    pub fn load(dir: &Path) -> Result<Option<Self>, CacheError> {
        let path = dir.join(CACHE_PROPERTIES_FILENAME);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(properties) => Ok(Some(properties)),
            Err(err) => {
                tracing::debug!(
                    target = "kiln.cache",
                    path = %path.display(),
                    error = %err,
                    "unparseable cache properties; treating as absent"
                );
                Ok(None)
            }
        }
    }

    pub fn store(&self, dir: &Path) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(self)?;
        atomic_write(&dir.join(CACHE_PROPERTIES_FILENAME), &bytes)
    }

    /// Whether persisted state guarded by this block can be trusted by an
    /// opener expecting `identity` and `validator`.
    pub fn is_trustworthy(&self, identity: &str, validator: &CacheValidator) -> bool {
        self.schema_version == CACHE_SCHEMA_VERSION
            && self.identity == identity
            && self.validator_token == validator.token()
            && self.clean_close
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn roundtrips_through_disk() {
        let tmp = TempDir::new().unwrap();
        let validator = CacheValidator::new("v1");
        let properties = CacheProperties::new("compile:main", &validator, true);
        properties.store(tmp.path()).unwrap();

        let loaded = CacheProperties::load(tmp.path()).unwrap().unwrap();
        assert_eq!(loaded, properties);
        assert!(loaded.is_trustworthy("compile:main", &validator));
    }

    #[test]
    fn missing_and_garbage_both_read_as_absent() {
        let tmp = TempDir::new().unwrap();
        assert!(CacheProperties::load(tmp.path()).unwrap().is_none());

        std::fs::write(tmp.path().join(CACHE_PROPERTIES_FILENAME), b"not json").unwrap();
        assert!(CacheProperties::load(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn trust_requires_token_identity_and_clean_close() {
        let validator = CacheValidator::new("v1");
        let properties = CacheProperties::new("compile:main", &validator, true);

        assert!(properties.is_trustworthy("compile:main", &validator));
        assert!(!properties.is_trustworthy("compile:test", &validator));
        assert!(!properties.is_trustworthy("compile:main", &CacheValidator::new("v2")));

        let unclean = CacheProperties::new("compile:main", &validator, false);
        assert!(!unclean.is_trustworthy("compile:main", &validator));

        let mut skewed = properties;
        skewed.schema_version += 1;
        assert!(!skewed.is_trustworthy("compile:main", &validator));
    }
}
