use kiln_classfile::flags::{ACC_FINAL, ACC_PRIVATE, ACC_PUBLIC, ACC_SUPER, ACC_SYNTHETIC};
use kiln_classfile::{ClassFile, ClassFormatError, ConstValue, ElementValue};
use kiln_testing::{AnnotationSpec, ClassFileBuilder, FieldSpec, MethodSpec, ValueSpec};

#[test]
fn parses_class_shape() {
    let bytes = ClassFileBuilder::new("com/example/Widget")
        .access(ACC_PUBLIC | ACC_SUPER)
        .super_class("com/example/Base")
        .interface("java/io/Serializable")
        .interface("java/lang/Cloneable")
        .field(FieldSpec::new(ACC_PRIVATE | ACC_FINAL, "count", "I"))
        .method(
            MethodSpec::new(ACC_PUBLIC, "render", "(I)Ljava/lang/String;")
                .throws("java/io/IOException")
                .code(&[0x1A, 0xAC]),
        )
        .build();

    let class = ClassFile::parse(&bytes).unwrap();
    assert_eq!(class.this_class, "com/example/Widget");
    assert_eq!(class.super_class.as_deref(), Some("com/example/Base"));
    assert_eq!(
        class.interfaces,
        vec!["java/io/Serializable".to_string(), "java/lang/Cloneable".to_string()]
    );

    assert_eq!(class.fields.len(), 1);
    let field = &class.fields[0];
    assert_eq!(field.name, "count");
    assert_eq!(field.descriptor, "I");
    assert_eq!(field.access_flags, ACC_PRIVATE | ACC_FINAL);
    assert!(field.exceptions.is_empty());

    assert_eq!(class.methods.len(), 1);
    let method = &class.methods[0];
    assert_eq!(method.name, "render");
    assert_eq!(method.descriptor, "(I)Ljava/lang/String;");
    assert_eq!(method.exceptions, vec!["java/io/IOException".to_string()]);
}

#[test]
fn rejects_bad_magic() {
    let bytes = ClassFileBuilder::new("com/example/A").magic(0xDEAD_BEEF).build();
    assert!(matches!(
        ClassFile::parse(&bytes),
        Err(ClassFormatError::InvalidMagic(0xDEAD_BEEF))
    ));
}

#[test]
fn rejects_unsupported_version() {
    let bytes = ClassFileBuilder::new("com/example/A").version(99, 0).build();
    assert!(matches!(
        ClassFile::parse(&bytes),
        Err(ClassFormatError::UnsupportedVersion { major: 99, minor: 0 })
    ));

    let bytes = ClassFileBuilder::new("com/example/A").version(44, 3).build();
    assert!(matches!(
        ClassFile::parse(&bytes),
        Err(ClassFormatError::UnsupportedVersion { major: 44, minor: 3 })
    ));
}

#[test]
fn rejects_truncated_input() {
    let bytes = ClassFileBuilder::new("com/example/A").build();
    let truncated = &bytes[..bytes.len() - 3];
    assert!(matches!(
        ClassFile::parse(truncated),
        Err(ClassFormatError::UnexpectedEof)
    ));
}

#[test]
fn code_attribute_does_not_affect_parsed_shape() {
    let with_body = |code: &[u8]| {
        ClassFileBuilder::new("com/example/A")
            .method(MethodSpec::new(ACC_PUBLIC, "run", "()V").code(code))
            .build()
    };

    let a = ClassFile::parse(&with_body(&[0xB1])).unwrap();
    let b = ClassFile::parse(&with_body(&[0x03, 0x3B, 0xB1])).unwrap();

    assert_eq!(a.methods[0].name, b.methods[0].name);
    assert_eq!(a.methods[0].descriptor, b.methods[0].descriptor);
    assert_eq!(a.methods[0].access_flags, b.methods[0].access_flags);
}

#[test]
fn synthetic_attribute_folds_into_access_flags() {
    let bytes = ClassFileBuilder::new("com/example/A")
        .method(MethodSpec::new(ACC_PUBLIC, "access$000", "()I").synthetic_attribute())
        .build();

    let class = ClassFile::parse(&bytes).unwrap();
    assert_ne!(class.methods[0].access_flags & ACC_SYNTHETIC, 0);
}

#[test]
fn parses_annotation_element_values() {
    let nested = AnnotationSpec::new("Lcom/example/Inner;")
        .value("flag", ValueSpec::Boolean(true));
    let annotation = AnnotationSpec::new("Lcom/example/Marker;")
        .value("count", ValueSpec::Int(7))
        .value("label", ValueSpec::Str("hello".to_string()))
        .value(
            "mode",
            ValueSpec::EnumConst {
                type_descriptor: "Lcom/example/Mode;".to_string(),
                const_name: "FAST".to_string(),
            },
        )
        .value("type", ValueSpec::Class("Lcom/example/Target;".to_string()))
        .value("inner", ValueSpec::Nested(Box::new(nested)))
        .value(
            "tags",
            ValueSpec::Array(vec![
                ValueSpec::Str("a".to_string()),
                ValueSpec::Str("b".to_string()),
            ]),
        );

    let bytes = ClassFileBuilder::new("com/example/A")
        .annotation(true, annotation)
        .build();

    let class = ClassFile::parse(&bytes).unwrap();
    assert_eq!(class.runtime_visible_annotations.len(), 1);
    let parsed = &class.runtime_visible_annotations[0];
    assert_eq!(parsed.type_descriptor, "Lcom/example/Marker;");
    assert_eq!(parsed.elements.len(), 6);

    assert_eq!(
        parsed.elements[0],
        ("count".to_string(), ElementValue::Const(ConstValue::Int(7)))
    );
    assert_eq!(
        parsed.elements[1],
        (
            "label".to_string(),
            ElementValue::Const(ConstValue::String("hello".to_string()))
        )
    );
    assert_eq!(
        parsed.elements[2],
        (
            "mode".to_string(),
            ElementValue::Enum {
                type_descriptor: "Lcom/example/Mode;".to_string(),
                const_name: "FAST".to_string(),
            }
        )
    );
    assert_eq!(
        parsed.elements[3],
        (
            "type".to_string(),
            ElementValue::Class("Lcom/example/Target;".to_string())
        )
    );
    match &parsed.elements[4].1 {
        ElementValue::Annotation(inner) => {
            assert_eq!(inner.type_descriptor, "Lcom/example/Inner;");
            assert_eq!(
                inner.elements[0],
                (
                    "flag".to_string(),
                    ElementValue::Const(ConstValue::Boolean(true))
                )
            );
        }
        other => panic!("expected nested annotation, got {other:?}"),
    }
    match &parsed.elements[5].1 {
        ElementValue::Array(values) => assert_eq!(values.len(), 2),
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn char_element_values_accept_unpaired_surrogates() {
    // `char c = '\uD800'` is a legal Java constant even though it is not a
    // Unicode scalar value.
    let annotation = AnnotationSpec::new("Lcom/example/Marker;")
        .value("plain", ValueSpec::Char('x' as u16))
        .value("surrogate", ValueSpec::Char(0xD800));

    let bytes = ClassFileBuilder::new("com/example/A")
        .annotation(true, annotation)
        .build();

    let class = ClassFile::parse(&bytes).unwrap();
    let parsed = &class.runtime_visible_annotations[0];
    assert_eq!(
        parsed.elements[0],
        (
            "plain".to_string(),
            ElementValue::Const(ConstValue::Char('x' as u16))
        )
    );
    assert_eq!(
        parsed.elements[1],
        (
            "surrogate".to_string(),
            ElementValue::Const(ConstValue::Char(0xD800))
        )
    );
}

#[test]
fn invisible_annotations_are_kept_separately() {
    let bytes = ClassFileBuilder::new("com/example/A")
        .annotation(false, AnnotationSpec::new("Lcom/example/Hidden;"))
        .build();

    let class = ClassFile::parse(&bytes).unwrap();
    assert!(class.runtime_visible_annotations.is_empty());
    assert_eq!(class.runtime_invisible_annotations.len(), 1);
}
