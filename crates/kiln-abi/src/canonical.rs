//! Canonical serialization of the signature model.
//!
//! The byte stream is deterministic for a given `ClassSig` value: member sets
//! iterate in their `Ord` order, annotation element maps in key order, and
//! class-level annotations are sorted before emission. All multi-byte scalars
//! are big-endian; every string and sequence is length-prefixed so the
//! grammar is unambiguous without delimiters.

use crate::model::{AnnotationSig, AnnotationValue, ClassSig, FieldSig, MethodSig};
use std::collections::BTreeSet;

/// Bumped whenever the canonical byte layout changes; old fingerprints are
/// then unusable, and persisted caches keyed on this version rebuild.
pub const ABI_FORMAT_VERSION: u16 = 1;

const STREAM_MAGIC: &[u8; 4] = b"KABI";

impl ClassSig {
    /// Serialize to the canonical byte form used for fingerprinting.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(STREAM_MAGIC);
        w.u16(ABI_FORMAT_VERSION);

        w.u16(self.access);
        w.str(&self.name);
        w.opt_str(self.super_name.as_deref());
        w.str_set(&self.interfaces);

        w.u32(self.fields.len() as u32);
        for field in &self.fields {
            w.field(field);
        }

        w.u32(self.methods.len() as u32);
        for method in &self.methods {
            w.method(method);
        }

        let mut annotations: Vec<&AnnotationSig> = self.annotations.iter().collect();
        annotations.sort();
        w.u32(annotations.len() as u32);
        for annotation in annotations {
            w.annotation(annotation);
        }

        w.finish()
    }
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::with_capacity(256) }
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn str(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.bytes(s.as_bytes());
    }

    fn opt_str(&mut self, s: Option<&str>) {
        match s {
            Some(s) => {
                self.u8(1);
                self.str(s);
            }
            None => self.u8(0),
        }
    }

    fn str_set(&mut self, set: &BTreeSet<String>) {
        self.u32(set.len() as u32);
        for s in set {
            self.str(s);
        }
    }

    fn field(&mut self, field: &FieldSig) {
        self.u16(field.access);
        self.str(&field.name);
        self.str(&field.desc);
        self.opt_str(field.signature.as_deref());
        self.annotation_list(&field.annotations);
    }

    fn method(&mut self, method: &MethodSig) {
        self.u16(method.access);
        self.str(&method.name);
        self.str(&method.desc);
        self.opt_str(method.signature.as_deref());
        self.str_set(&method.exceptions);
        self.annotation_list(&method.annotations);
    }

    /// Member annotations: emitted in insertion order.
    fn annotation_list(&mut self, annotations: &[AnnotationSig]) {
        self.u32(annotations.len() as u32);
        for annotation in annotations {
            self.annotation(annotation);
        }
    }

    fn annotation(&mut self, annotation: &AnnotationSig) {
        self.str(&annotation.desc);
        self.u8(u8::from(annotation.visible));
        self.u32(annotation.values.len() as u32);
        for (name, value) in &annotation.values {
            self.str(name);
            self.value(value);
        }
    }

    fn value(&mut self, value: &AnnotationValue) {
        match value {
            AnnotationValue::Boolean(v) => {
                self.u8(b'Z');
                self.u8(u8::from(*v));
            }
            AnnotationValue::Byte(v) => {
                self.u8(b'B');
                self.u8(*v as u8);
            }
            AnnotationValue::Char(v) => {
                self.u8(b'C');
                self.u32(*v as u32);
            }
            AnnotationValue::Short(v) => {
                self.u8(b'S');
                self.u16(*v as u16);
            }
            AnnotationValue::Int(v) => {
                self.u8(b'I');
                self.u32(*v as u32);
            }
            AnnotationValue::Long(v) => {
                self.u8(b'J');
                self.u64(*v as u64);
            }
            AnnotationValue::Float(bits) => {
                self.u8(b'F');
                self.u32(*bits);
            }
            AnnotationValue::Double(bits) => {
                self.u8(b'D');
                self.u64(*bits);
            }
            AnnotationValue::String(v) => {
                self.u8(b's');
                self.str(v);
            }
            AnnotationValue::Enum {
                type_desc,
                const_name,
            } => {
                self.u8(b'e');
                self.str(type_desc);
                self.str(const_name);
            }
            AnnotationValue::Class(v) => {
                self.u8(b'c');
                self.str(v);
            }
            AnnotationValue::Nested(nested) => {
                self.u8(b'@');
                self.annotation(nested);
            }
            AnnotationValue::Array(values) => {
                self.u8(b'[');
                self.u32(values.len() as u32);
                for value in values {
                    self.value(value);
                }
            }
        }
    }
}
