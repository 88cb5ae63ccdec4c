use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// One compiled class's API surface.
///
/// Sets make comparison independent of the order members were discovered in
/// the class file; two `ClassSig` values are semantically equal exactly when
/// their canonical serializations are byte-identical.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSig {
    pub access: u16,
    /// Binary class name, e.g. `com/example/Widget`.
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: BTreeSet<String>,
    pub fields: BTreeSet<FieldSig>,
    pub methods: BTreeSet<MethodSig>,
    /// Class-level annotations; order-irrelevant (sorted before hashing).
    pub annotations: Vec<AnnotationSig>,
}

/// A method's contribution to the ABI.
///
/// The `Ord` impl is the deterministic serialization order: lexicographic by
/// (access, name, descriptor, generic signature, exceptions). It carries no
/// business meaning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSig {
    pub access: u16,
    pub name: String,
    pub desc: String,
    pub signature: Option<String>,
    pub exceptions: BTreeSet<String>,
    /// Insertion order preserved: repeatable annotations make order part of
    /// the method's semantics.
    pub annotations: Vec<AnnotationSig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSig {
    pub access: u16,
    pub name: String,
    pub desc: String,
    pub signature: Option<String>,
    pub annotations: Vec<AnnotationSig>,
}

/// One annotation occurrence, with its element values keyed by name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationSig {
    /// Annotation type descriptor, e.g. `Lcom/example/Marker;`.
    pub desc: String,
    /// Whether the annotation is retained at runtime.
    pub visible: bool,
    pub values: BTreeMap<String, AnnotationValue>,
}

/// An annotation element value.
///
/// Floats are stored as IEEE-754 bit patterns so the model is `Eq`/`Ord` and
/// its canonical bytes are platform-independent. Enum constants are a
/// (type, constant name) pair, never an ordinal, so reordering unrelated enum
/// constants upstream cannot change a fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnnotationValue {
    Boolean(bool),
    Byte(i8),
    /// UTF-16 code unit, matching the class-file constant (unpaired
    /// surrogates included).
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    String(String),
    Enum { type_desc: String, const_name: String },
    Class(String),
    Nested(Box<AnnotationSig>),
    Array(Vec<AnnotationValue>),
}

impl Ord for MethodSig {
    fn cmp(&self, other: &Self) -> Ordering {
        self.access
            .cmp(&other.access)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.desc.cmp(&other.desc))
            .then_with(|| {
                self.signature
                    .as_deref()
                    .unwrap_or("")
                    .cmp(other.signature.as_deref().unwrap_or(""))
            })
            .then_with(|| self.exceptions.cmp(&other.exceptions))
            // Tie-breakers keep the ordering consistent with `Eq`.
            .then_with(|| self.signature.cmp(&other.signature))
            .then_with(|| self.annotations.cmp(&other.annotations))
    }
}

impl PartialOrd for MethodSig {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldSig {
    fn cmp(&self, other: &Self) -> Ordering {
        self.access
            .cmp(&other.access)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.desc.cmp(&other.desc))
            .then_with(|| {
                self.signature
                    .as_deref()
                    .unwrap_or("")
                    .cmp(other.signature.as_deref().unwrap_or(""))
            })
            .then_with(|| self.signature.cmp(&other.signature))
            .then_with(|| self.annotations.cmp(&other.annotations))
    }
}

impl PartialOrd for FieldSig {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(access: u16, name: &str, desc: &str) -> MethodSig {
        MethodSig {
            access,
            name: name.to_string(),
            desc: desc.to_string(),
            signature: None,
            exceptions: BTreeSet::new(),
            annotations: Vec::new(),
        }
    }

    #[test]
    fn method_ordering_is_lexicographic() {
        let a = method(1, "alpha", "()V");
        let b = method(1, "beta", "()V");
        let c = method(2, "alpha", "()V");
        assert!(a < b);
        assert!(b < c);

        let mut with_desc = method(1, "alpha", "(I)V");
        assert!(a < with_desc);
        with_desc.desc = "()I".to_string();
        assert!(with_desc < a);
    }

    #[test]
    fn missing_signature_orders_as_empty_string() {
        let bare = method(1, "alpha", "()V");
        let mut with_sig = bare.clone();
        with_sig.signature = Some("()TT;".to_string());
        assert!(bare < with_sig);
    }

    #[test]
    fn member_sets_dedupe_equal_signatures() {
        let mut methods = BTreeSet::new();
        methods.insert(method(1, "alpha", "()V"));
        methods.insert(method(1, "alpha", "()V"));
        assert_eq!(methods.len(), 1);
    }
}
