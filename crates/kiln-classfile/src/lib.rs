//! Binary parsing of compiled JVM classes, limited to the surface that an ABI
//! fingerprint cares about: access flags, super types, member signatures,
//! declared exceptions, and annotations. Method bodies (`Code` attributes) and
//! debug metadata are deliberately skipped.

#![forbid(unsafe_code)]

mod annotation;
mod classfile;
mod constant_pool;
mod error;
mod reader;

pub mod flags;

pub use crate::annotation::{Annotation, ConstValue, ElementValue};
pub use crate::classfile::{ClassFile, ClassMember, MAX_SUPPORTED_MAJOR, MIN_SUPPORTED_MAJOR};
pub use crate::error::{ClassFormatError, Result};
