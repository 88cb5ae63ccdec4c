use crate::error::AbiError;
use crate::model::{AnnotationSig, AnnotationValue, ClassSig, FieldSig, MethodSig};
use kiln_classfile::{Annotation, ClassFile, ConstValue, ElementValue};
use std::collections::{BTreeMap, BTreeSet};

/// Mutable accumulator used while walking a parsed class.
///
/// `ClassSig` itself is immutable; everything mutable happens here, and
/// `build` freezes the result before any fingerprint can be computed from it.
#[derive(Debug, Default)]
pub struct ClassSigBuilder {
    access: u16,
    name: String,
    super_name: Option<String>,
    interfaces: BTreeSet<String>,
    fields: BTreeSet<FieldSig>,
    methods: BTreeSet<MethodSig>,
    annotations: Vec<AnnotationSig>,
}

impl ClassSigBuilder {
    pub fn new(name: impl Into<String>, access: u16) -> Self {
        Self {
            name: name.into(),
            access,
            ..Self::default()
        }
    }

    pub fn super_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.super_name = Some(name.into());
        self
    }

    pub fn add_interface(&mut self, name: impl Into<String>) -> &mut Self {
        self.interfaces.insert(name.into());
        self
    }

    pub fn add_field(&mut self, field: FieldSig) -> &mut Self {
        self.fields.insert(field);
        self
    }

    pub fn add_method(&mut self, method: MethodSig) -> &mut Self {
        self.methods.insert(method);
        self
    }

    pub fn add_annotation(&mut self, annotation: AnnotationSig) -> &mut Self {
        self.annotations.push(annotation);
        self
    }

    pub fn build(self) -> ClassSig {
        ClassSig {
            access: self.access,
            name: self.name,
            super_name: self.super_name,
            interfaces: self.interfaces,
            fields: self.fields,
            methods: self.methods,
            annotations: self.annotations,
        }
    }
}

/// Parse raw class bytes and extract the signature model in one step.
pub fn extract_class_bytes(bytes: &[u8]) -> Result<ClassSig, AbiError> {
    let class = ClassFile::parse(bytes)?;
    Ok(extract_class(&class))
}

/// Populate a [`ClassSig`] from a parsed class.
///
/// Every member is captured regardless of access level; apply a
/// [`crate::MemberPolicy`] via [`ClassSig::retain`] to narrow the surface.
pub fn extract_class(class: &ClassFile) -> ClassSig {
    let mut builder = ClassSigBuilder::new(&class.this_class, class.access_flags);
    if let Some(super_name) = &class.super_class {
        builder.super_name(super_name);
    }
    for interface in &class.interfaces {
        builder.add_interface(interface);
    }

    for annotation in annotation_sigs(
        &class.runtime_visible_annotations,
        &class.runtime_invisible_annotations,
    ) {
        builder.add_annotation(annotation);
    }

    for field in &class.fields {
        builder.add_field(FieldSig {
            access: field.access_flags,
            name: field.name.clone(),
            desc: field.descriptor.clone(),
            signature: field.signature.clone(),
            annotations: annotation_sigs(
                &field.runtime_visible_annotations,
                &field.runtime_invisible_annotations,
            ),
        });
    }

    for method in &class.methods {
        builder.add_method(MethodSig {
            access: method.access_flags,
            name: method.name.clone(),
            desc: method.descriptor.clone(),
            signature: method.signature.clone(),
            exceptions: method.exceptions.iter().cloned().collect(),
            annotations: annotation_sigs(
                &method.runtime_visible_annotations,
                &method.runtime_invisible_annotations,
            ),
        });
    }

    builder.build()
}

/// Runtime-visible annotations first, then invisible; within each group the
/// class-file declaration order is preserved.
fn annotation_sigs(visible: &[Annotation], invisible: &[Annotation]) -> Vec<AnnotationSig> {
    visible
        .iter()
        .map(|a| annotation_sig(a, true))
        .chain(invisible.iter().map(|a| annotation_sig(a, false)))
        .collect()
}

fn annotation_sig(annotation: &Annotation, visible: bool) -> AnnotationSig {
    let mut values = BTreeMap::new();
    for (name, value) in &annotation.elements {
        values.insert(name.clone(), annotation_value(value, visible));
    }
    AnnotationSig {
        desc: annotation.type_descriptor.clone(),
        visible,
        values,
    }
}

fn annotation_value(value: &ElementValue, visible: bool) -> AnnotationValue {
    match value {
        ElementValue::Const(c) => match c {
            ConstValue::Boolean(v) => AnnotationValue::Boolean(*v),
            ConstValue::Byte(v) => AnnotationValue::Byte(*v),
            ConstValue::Char(v) => AnnotationValue::Char(*v),
            ConstValue::Short(v) => AnnotationValue::Short(*v),
            ConstValue::Int(v) => AnnotationValue::Int(*v),
            ConstValue::Long(v) => AnnotationValue::Long(*v),
            ConstValue::Float(v) => AnnotationValue::Float(v.to_bits()),
            ConstValue::Double(v) => AnnotationValue::Double(v.to_bits()),
            ConstValue::String(v) => AnnotationValue::String(v.clone()),
        },
        ElementValue::Enum {
            type_descriptor,
            const_name,
        } => AnnotationValue::Enum {
            type_desc: type_descriptor.clone(),
            const_name: const_name.clone(),
        },
        ElementValue::Class(name) => AnnotationValue::Class(name.clone()),
        // Nested annotations have no retention of their own; they share the
        // outer annotation's visibility.
        ElementValue::Annotation(nested) => {
            AnnotationValue::Nested(Box::new(annotation_sig(nested, visible)))
        }
        ElementValue::Array(values) => {
            AnnotationValue::Array(values.iter().map(|v| annotation_value(v, visible)).collect())
        }
    }
}
