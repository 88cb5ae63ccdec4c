use crate::fingerprint::Fingerprint;
use kiln_classfile::ClassFormatError;

#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    /// The input class could not be parsed. Scoped to one class; callers keep
    /// fingerprinting the rest of the compilation unit.
    #[error("malformed class file: {0}")]
    ClassFormat(#[from] ClassFormatError),

    /// Two distinct canonical serializations produced the same digest. This
    /// would silently hide a real API change, so it is fatal and must never
    /// be swallowed.
    #[error("fingerprint collision between {first} and {second}: {fingerprint}")]
    HashCollision {
        first: String,
        second: String,
        fingerprint: Fingerprint,
    },
}
