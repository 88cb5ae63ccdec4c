use crate::fingerprint::FingerprintMap;
use std::collections::BTreeSet;

/// The API-level difference between two fingerprint generations.
///
/// Absence from the current generation is always a change; invalidation
/// signals are never silently dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AbiDiff {
    /// Classes whose fingerprint differs from the previous generation, plus
    /// classes that are new in this generation.
    pub changed_api: BTreeSet<String>,
    /// Classes present previously but absent now.
    pub removed_api: BTreeSet<String>,
    /// Classes whose fingerprint is identical; their implementation may have
    /// changed, their API did not.
    pub unchanged: BTreeSet<String>,
}

impl AbiDiff {
    pub fn between(previous: &FingerprintMap, current: &FingerprintMap) -> Self {
        let mut diff = AbiDiff::default();

        for (name, fingerprint) in current {
            match previous.get(name) {
                Some(prior) if prior == fingerprint => {
                    diff.unchanged.insert(name.clone());
                }
                _ => {
                    diff.changed_api.insert(name.clone());
                }
            }
        }

        for (name, _) in previous {
            if !current.contains(name) {
                diff.removed_api.insert(name.clone());
            }
        }

        diff
    }

    /// The invalidation signal for the downstream scheduler:
    /// `changed_api ∪ removed_api`.
    pub fn invalidated(&self) -> BTreeSet<String> {
        self.changed_api
            .union(&self.removed_api)
            .cloned()
            .collect()
    }

    /// True when no downstream recompilation is required.
    pub fn is_clean(&self) -> bool {
        self.changed_api.is_empty() && self.removed_api.is_empty()
    }
}
