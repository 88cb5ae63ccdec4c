use crate::error::AbiError;
use crate::model::ClassSig;
use crate::policy::MemberPolicy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::btree_map;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A stable SHA-256 digest of a class's canonical ABI serialization, stored
/// as a lowercase hex string.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest an arbitrary byte slice.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes.as_ref());
        Self(hex::encode(hasher.finalize()))
    }

    /// Fingerprint a class's API surface.
    pub fn of(sig: &ClassSig) -> Self {
        Self::from_bytes(sig.canonical_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Fingerprints for one compilation unit, keyed by binary class name.
///
/// This mapping is the unit of comparison between build generations and the
/// payload persisted in the directory cache.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintMap(BTreeMap<String, Fingerprint>);

impl FingerprintMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, fingerprint: Fingerprint) {
        self.0.insert(name.into(), fingerprint);
    }

    pub fn get(&self, name: &str) -> Option<&Fingerprint> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Fingerprint> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a FingerprintMap {
    type Item = (&'a String, &'a Fingerprint);
    type IntoIter = btree_map::Iter<'a, String, Fingerprint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, Fingerprint)> for FingerprintMap {
    fn from_iter<I: IntoIterator<Item = (String, Fingerprint)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Fingerprints a batch of classes under one policy, verifying along the way
/// that no two distinct canonical serializations collide.
///
/// Collisions are only observable while both canonical byte streams are in
/// hand, which is why the check lives here rather than in the diff.
pub struct Fingerprinter {
    policy: MemberPolicy,
    map: FingerprintMap,
    seen: HashMap<Fingerprint, (String, Vec<u8>)>,
}

impl Fingerprinter {
    pub fn new(policy: MemberPolicy) -> Self {
        Self {
            policy,
            map: FingerprintMap::new(),
            seen: HashMap::new(),
        }
    }

    /// Parse, extract, filter, and fingerprint one class.
    pub fn add(&mut self, name: &str, class_bytes: &[u8]) -> Result<Fingerprint, AbiError> {
        let sig = crate::extract::extract_class_bytes(class_bytes)?.retain(self.policy);
        let canonical = sig.canonical_bytes();
        let fingerprint = Fingerprint::from_bytes(&canonical);

        match self.seen.get(&fingerprint) {
            Some((prior_name, prior_canonical)) if *prior_canonical != canonical => {
                return Err(AbiError::HashCollision {
                    first: prior_name.clone(),
                    second: name.to_string(),
                    fingerprint,
                });
            }
            Some(_) => {}
            None => {
                self.seen
                    .insert(fingerprint.clone(), (name.to_string(), canonical));
            }
        }

        self.map.insert(name, fingerprint.clone());
        Ok(fingerprint)
    }

    pub fn finish(self) -> FingerprintMap {
        self.map
    }
}
