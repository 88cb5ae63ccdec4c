//! The ABI fingerprinting subsystem: an order-independent model of a class's
//! API surface, a canonical serialization of that model, and SHA-256
//! fingerprints over it.
//!
//! Two classes receive the same fingerprint exactly when their API surfaces
//! are equal; implementation-only edits (method bodies, debug info) never
//! change the fingerprint.

#![forbid(unsafe_code)]

mod canonical;
mod diff;
mod error;
mod extract;
mod fingerprint;
mod model;
mod policy;

pub use crate::canonical::ABI_FORMAT_VERSION;
pub use crate::diff::AbiDiff;
pub use crate::error::AbiError;
pub use crate::extract::{extract_class, extract_class_bytes, ClassSigBuilder};
pub use crate::fingerprint::{Fingerprint, FingerprintMap, Fingerprinter};
pub use crate::model::{AnnotationSig, AnnotationValue, ClassSig, FieldSig, MethodSig};
pub use crate::policy::{MemberPolicy, Visibility};
