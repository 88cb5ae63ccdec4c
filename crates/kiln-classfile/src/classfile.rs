use crate::annotation::Annotation;
use crate::constant_pool::ConstantPool;
use crate::error::{ClassFormatError, Result};
use crate::flags::ACC_SYNTHETIC;
use crate::reader::Reader;

/// JDK 1.1.
pub const MIN_SUPPORTED_MAJOR: u16 = 45;
/// JDK 25.
pub const MAX_SUPPORTED_MAJOR: u16 = 69;

/// The parsed shape of one compiled class, restricted to ABI-relevant data.
///
/// Attributes that only describe implementation (`Code`, `LineNumberTable`,
/// `StackMapTable`, ...) are skipped during parsing, so two classes that
/// differ only in method bodies parse to equal `ClassFile` values.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<ClassMember>,
    pub methods: Vec<ClassMember>,
    pub signature: Option<String>,
    pub runtime_visible_annotations: Vec<Annotation>,
    pub runtime_invisible_annotations: Vec<Annotation>,
}

/// A field or method declaration. `exceptions` is only ever populated for
/// methods (the `Exceptions` attribute is not legal on fields).
#[derive(Debug, Clone)]
pub struct ClassMember {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub exceptions: Vec<String>,
    pub runtime_visible_annotations: Vec<Annotation>,
    pub runtime_invisible_annotations: Vec<Annotation>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != 0xCAFE_BABE {
            return Err(ClassFormatError::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        if !(MIN_SUPPORTED_MAJOR..=MAX_SUPPORTED_MAJOR).contains(&major_version) {
            return Err(ClassFormatError::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }

        let cp = ConstantPool::parse(&mut reader)?;

        let mut access_flags = reader.read_u2()?;
        let this_class = cp.get_class_name(reader.read_u2()?)?;
        let super_class_idx = reader.read_u2()?;
        let super_class = if super_class_idx == 0 {
            None
        } else {
            Some(cp.get_class_name(super_class_idx)?)
        };

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(cp.get_class_name(reader.read_u2()?)?);
        }

        let fields_count = reader.read_u2()? as usize;
        let mut fields = Vec::with_capacity(fields_count);
        for _ in 0..fields_count {
            fields.push(parse_member(&mut reader, &cp)?);
        }

        let methods_count = reader.read_u2()? as usize;
        let mut methods = Vec::with_capacity(methods_count);
        for _ in 0..methods_count {
            methods.push(parse_member(&mut reader, &cp)?);
        }

        let class_attrs = parse_attributes(&mut reader, &cp)?;
        if class_attrs.synthetic {
            access_flags |= ACC_SYNTHETIC;
        }

        reader.ensure_empty()?;

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            signature: class_attrs.signature,
            runtime_visible_annotations: class_attrs.runtime_visible_annotations,
            runtime_invisible_annotations: class_attrs.runtime_invisible_annotations,
        })
    }
}

fn parse_member(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<ClassMember> {
    let mut access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();

    let attrs = parse_attributes(reader, cp)?;
    if attrs.synthetic {
        access_flags |= ACC_SYNTHETIC;
    }

    Ok(ClassMember {
        access_flags,
        name,
        descriptor,
        signature: attrs.signature,
        exceptions: attrs.exceptions,
        runtime_visible_annotations: attrs.runtime_visible_annotations,
        runtime_invisible_annotations: attrs.runtime_invisible_annotations,
    })
}

#[derive(Default)]
struct ParsedAttributes {
    signature: Option<String>,
    exceptions: Vec<String>,
    synthetic: bool,
    runtime_visible_annotations: Vec<Annotation>,
    runtime_invisible_annotations: Vec<Annotation>,
}

fn parse_attributes(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<ParsedAttributes> {
    let attributes_count = reader.read_u2()? as usize;
    let mut parsed = ParsedAttributes::default();
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        let name = cp.get_utf8(name_index)?;

        let mut sub = Reader::new(info);
        match name {
            "Signature" => {
                parsed.signature = Some(cp.get_utf8(sub.read_u2()?)?.to_string());
                sub.ensure_empty()
                    .map_err(|_| ClassFormatError::MalformedAttribute("Signature"))?;
            }
            "Exceptions" => {
                let num = sub.read_u2()? as usize;
                let mut exceptions = Vec::with_capacity(num);
                for _ in 0..num {
                    exceptions.push(cp.get_class_name(sub.read_u2()?)?);
                }
                sub.ensure_empty()
                    .map_err(|_| ClassFormatError::MalformedAttribute("Exceptions"))?;
                parsed.exceptions = exceptions;
            }
            // Pre-ACC_SYNTHETIC compilers mark compiler-generated members with
            // a marker attribute instead of the flag; fold it into the flags.
            "Synthetic" => {
                sub.ensure_empty()
                    .map_err(|_| ClassFormatError::MalformedAttribute("Synthetic"))?;
                parsed.synthetic = true;
            }
            "RuntimeVisibleAnnotations" => {
                parsed
                    .runtime_visible_annotations
                    .extend(parse_annotations(&mut sub, cp)?);
            }
            "RuntimeInvisibleAnnotations" => {
                parsed
                    .runtime_invisible_annotations
                    .extend(parse_annotations(&mut sub, cp)?);
            }
            _ => {
                // Unknown or implementation-only attribute: skipped.
            }
        }
    }

    Ok(parsed)
}

fn parse_annotations(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Vec<Annotation>> {
    let num = reader.read_u2()? as usize;
    let mut annotations = Vec::with_capacity(num);
    for _ in 0..num {
        annotations.push(Annotation::parse(reader, cp)?);
    }
    reader
        .ensure_empty()
        .map_err(|_| ClassFormatError::MalformedAttribute("annotations"))?;
    Ok(annotations)
}
