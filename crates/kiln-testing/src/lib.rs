//! Test support: synthesize real JVM class-file bytes without a Java
//! compiler.
//!
//! [`ClassFileBuilder`] emits a structurally valid class file (constant pool,
//! members, attributes) so parser and fingerprint tests run against the same
//! binary format production code sees. Method bodies are arbitrary bytes in a
//! `Code` attribute; fingerprint tests rely on being able to vary them freely.

#![forbid(unsafe_code)]

use std::collections::HashMap;

/// Builds the bytes of one class file.
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    magic: u32,
    minor_version: u16,
    major_version: u16,
    access: u16,
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    signature: Option<String>,
    annotations: Vec<(bool, AnnotationSpec)>,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    access: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
    annotations: Vec<(bool, AnnotationSpec)>,
}

#[derive(Debug, Clone)]
pub struct MethodSpec {
    access: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
    exceptions: Vec<String>,
    code: Option<Vec<u8>>,
    synthetic_attribute: bool,
    annotations: Vec<(bool, AnnotationSpec)>,
}

/// An annotation to embed, with element values in declaration order.
#[derive(Debug, Clone)]
pub struct AnnotationSpec {
    pub descriptor: String,
    pub values: Vec<(String, ValueSpec)>,
}

/// Annotation element values supported by the builder.
#[derive(Debug, Clone)]
pub enum ValueSpec {
    Boolean(bool),
    /// UTF-16 code unit; surrogate halves are representable.
    Char(u16),
    Int(i32),
    Str(String),
    EnumConst { type_descriptor: String, const_name: String },
    Class(String),
    Nested(Box<AnnotationSpec>),
    Array(Vec<ValueSpec>),
}

impl AnnotationSpec {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, value: ValueSpec) -> Self {
        self.values.push((name.into(), value));
        self
    }
}

impl FieldSpec {
    pub fn new(access: u16, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            access,
            name: name.into(),
            descriptor: descriptor.into(),
            signature: None,
            annotations: Vec::new(),
        }
    }

    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn annotation(mut self, visible: bool, spec: AnnotationSpec) -> Self {
        self.annotations.push((visible, spec));
        self
    }
}

impl MethodSpec {
    pub fn new(access: u16, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            access,
            name: name.into(),
            descriptor: descriptor.into(),
            signature: None,
            exceptions: Vec::new(),
            code: None,
            synthetic_attribute: false,
            annotations: Vec::new(),
        }
    }

    /// Mark the method with the legacy `Synthetic` marker attribute instead
    /// of the `ACC_SYNTHETIC` flag.
    pub fn synthetic_attribute(mut self) -> Self {
        self.synthetic_attribute = true;
        self
    }

    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn throws(mut self, exception: impl Into<String>) -> Self {
        self.exceptions.push(exception.into());
        self
    }

    /// Attach a `Code` attribute with the given instruction bytes. The bytes
    /// are not validated; they only need to differ between test inputs.
    pub fn code(mut self, bytes: &[u8]) -> Self {
        self.code = Some(bytes.to_vec());
        self
    }

    pub fn annotation(mut self, visible: bool, spec: AnnotationSpec) -> Self {
        self.annotations.push((visible, spec));
        self
    }
}

impl ClassFileBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            magic: 0xCAFE_BABE,
            minor_version: 0,
            major_version: 52,
            access: 0x0021, // ACC_PUBLIC | ACC_SUPER
            name: name.into(),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            signature: None,
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Override the magic header, for malformed-input tests.
    pub fn magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn super_class(mut self, name: impl Into<String>) -> Self {
        self.super_name = Some(name.into());
        self
    }

    pub fn no_super_class(mut self) -> Self {
        self.super_name = None;
        self
    }

    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn annotation(mut self, visible: bool, spec: AnnotationSpec) -> Self {
        self.annotations.push((visible, spec));
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = Pool::default();
        let mut body = Vec::new();

        push_u16(&mut body, self.access);
        let this_class = pool.class(&self.name);
        push_u16(&mut body, this_class);
        let super_index = match &self.super_name {
            Some(name) => pool.class(name),
            None => 0,
        };
        push_u16(&mut body, super_index);

        push_u16(&mut body, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            let index = pool.class(interface);
            push_u16(&mut body, index);
        }

        push_u16(&mut body, self.fields.len() as u16);
        for field in &self.fields {
            encode_member_header(&mut body, &mut pool, field.access, &field.name, &field.descriptor);
            let attrs = member_attributes(
                &mut pool,
                field.signature.as_deref(),
                &[],
                None,
                false,
                &field.annotations,
            );
            encode_attributes(&mut body, &attrs);
        }

        push_u16(&mut body, self.methods.len() as u16);
        for method in &self.methods {
            encode_member_header(
                &mut body,
                &mut pool,
                method.access,
                &method.name,
                &method.descriptor,
            );
            let attrs = member_attributes(
                &mut pool,
                method.signature.as_deref(),
                &method.exceptions,
                method.code.as_deref(),
                method.synthetic_attribute,
                &method.annotations,
            );
            encode_attributes(&mut body, &attrs);
        }

        let class_attrs = member_attributes(
            &mut pool,
            self.signature.as_deref(),
            &[],
            None,
            false,
            &self.annotations,
        );
        encode_attributes(&mut body, &class_attrs);

        let mut out = Vec::with_capacity(body.len() + 64);
        push_u32(&mut out, self.magic);
        push_u16(&mut out, self.minor_version);
        push_u16(&mut out, self.major_version);
        pool.serialize(&mut out);
        out.extend_from_slice(&body);
        out
    }
}

// --- constant pool ---

#[derive(Debug, Clone)]
enum PoolEntry {
    Utf8(String),
    Integer(i32),
    Class(u16),
}

#[derive(Debug, Default)]
struct Pool {
    entries: Vec<PoolEntry>,
    utf8_index: HashMap<String, u16>,
    class_index: HashMap<String, u16>,
    integer_index: HashMap<i32, u16>,
}

impl Pool {
    fn push(&mut self, entry: PoolEntry) -> u16 {
        self.entries.push(entry);
        self.entries.len() as u16
    }

    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(&index) = self.utf8_index.get(value) {
            return index;
        }
        let index = self.push(PoolEntry::Utf8(value.to_string()));
        self.utf8_index.insert(value.to_string(), index);
        index
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(&index) = self.class_index.get(name) {
            return index;
        }
        let name_index = self.utf8(name);
        let index = self.push(PoolEntry::Class(name_index));
        self.class_index.insert(name.to_string(), index);
        index
    }

    fn integer(&mut self, value: i32) -> u16 {
        if let Some(&index) = self.integer_index.get(&value) {
            return index;
        }
        let index = self.push(PoolEntry::Integer(value));
        self.integer_index.insert(value, index);
        index
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        push_u16(out, self.entries.len() as u16 + 1);
        for entry in &self.entries {
            match entry {
                PoolEntry::Utf8(value) => {
                    // ASCII-only test strings; modified UTF-8 and standard
                    // UTF-8 agree on this subset.
                    out.push(1);
                    push_u16(out, value.len() as u16);
                    out.extend_from_slice(value.as_bytes());
                }
                PoolEntry::Integer(value) => {
                    out.push(3);
                    push_u32(out, *value as u32);
                }
                PoolEntry::Class(name_index) => {
                    out.push(7);
                    push_u16(out, *name_index);
                }
            }
        }
    }
}

// --- attribute encoding ---

fn encode_member_header(out: &mut Vec<u8>, pool: &mut Pool, access: u16, name: &str, desc: &str) {
    push_u16(out, access);
    let name_index = pool.utf8(name);
    push_u16(out, name_index);
    let desc_index = pool.utf8(desc);
    push_u16(out, desc_index);
}

fn member_attributes(
    pool: &mut Pool,
    signature: Option<&str>,
    exceptions: &[String],
    code: Option<&[u8]>,
    synthetic: bool,
    annotations: &[(bool, AnnotationSpec)],
) -> Vec<(u16, Vec<u8>)> {
    let mut attrs = Vec::new();

    if synthetic {
        attrs.push((pool.utf8("Synthetic"), Vec::new()));
    }

    if let Some(signature) = signature {
        let mut payload = Vec::new();
        let index = pool.utf8(signature);
        push_u16(&mut payload, index);
        attrs.push((pool.utf8("Signature"), payload));
    }

    if !exceptions.is_empty() {
        let mut payload = Vec::new();
        push_u16(&mut payload, exceptions.len() as u16);
        for exception in exceptions {
            let index = pool.class(exception);
            push_u16(&mut payload, index);
        }
        attrs.push((pool.utf8("Exceptions"), payload));
    }

    if let Some(code) = code {
        let mut payload = Vec::new();
        push_u16(&mut payload, 8); // max_stack
        push_u16(&mut payload, 8); // max_locals
        push_u32(&mut payload, code.len() as u32);
        payload.extend_from_slice(code);
        push_u16(&mut payload, 0); // exception_table_length
        push_u16(&mut payload, 0); // attributes_count
        attrs.push((pool.utf8("Code"), payload));
    }

    for (visible, wanted) in [(true, "RuntimeVisibleAnnotations"), (false, "RuntimeInvisibleAnnotations")] {
        let group: Vec<&AnnotationSpec> = annotations
            .iter()
            .filter(|(v, _)| *v == visible)
            .map(|(_, spec)| spec)
            .collect();
        if group.is_empty() {
            continue;
        }
        let mut payload = Vec::new();
        push_u16(&mut payload, group.len() as u16);
        for spec in group {
            encode_annotation(&mut payload, pool, spec);
        }
        attrs.push((pool.utf8(wanted), payload));
    }

    attrs
}

fn encode_attributes(out: &mut Vec<u8>, attrs: &[(u16, Vec<u8>)]) {
    push_u16(out, attrs.len() as u16);
    for (name_index, payload) in attrs {
        push_u16(out, *name_index);
        push_u32(out, payload.len() as u32);
        out.extend_from_slice(payload);
    }
}

fn encode_annotation(out: &mut Vec<u8>, pool: &mut Pool, spec: &AnnotationSpec) {
    let type_index = pool.utf8(&spec.descriptor);
    push_u16(out, type_index);
    push_u16(out, spec.values.len() as u16);
    for (name, value) in &spec.values {
        let name_index = pool.utf8(name);
        push_u16(out, name_index);
        encode_element_value(out, pool, value);
    }
}

fn encode_element_value(out: &mut Vec<u8>, pool: &mut Pool, value: &ValueSpec) {
    match value {
        ValueSpec::Boolean(v) => {
            out.push(b'Z');
            let index = pool.integer(i32::from(*v));
            push_u16(out, index);
        }
        ValueSpec::Char(v) => {
            out.push(b'C');
            let index = pool.integer(i32::from(*v));
            push_u16(out, index);
        }
        ValueSpec::Int(v) => {
            out.push(b'I');
            let index = pool.integer(*v);
            push_u16(out, index);
        }
        ValueSpec::Str(v) => {
            out.push(b's');
            let index = pool.utf8(v);
            push_u16(out, index);
        }
        ValueSpec::EnumConst {
            type_descriptor,
            const_name,
        } => {
            out.push(b'e');
            let type_index = pool.utf8(type_descriptor);
            push_u16(out, type_index);
            let name_index = pool.utf8(const_name);
            push_u16(out, name_index);
        }
        ValueSpec::Class(v) => {
            out.push(b'c');
            let index = pool.utf8(v);
            push_u16(out, index);
        }
        ValueSpec::Nested(spec) => {
            out.push(b'@');
            encode_annotation(out, pool, spec);
        }
        ValueSpec::Array(values) => {
            out.push(b'[');
            push_u16(out, values.len() as u16);
            for value in values {
                encode_element_value(out, pool, value);
            }
        }
    }
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}
