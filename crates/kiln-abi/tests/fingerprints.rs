//! End-to-end fingerprint properties over real class-file bytes.

use kiln_abi::{extract_class_bytes, Fingerprint, MemberPolicy};
use kiln_classfile::flags::{ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC, ACC_SYNTHETIC};
use kiln_testing::{AnnotationSpec, ClassFileBuilder, FieldSpec, MethodSpec, ValueSpec};

fn fingerprint(bytes: &[u8]) -> Fingerprint {
    Fingerprint::of(&extract_class_bytes(bytes).unwrap())
}

#[test]
fn member_declaration_order_does_not_matter() {
    let forward = ClassFileBuilder::new("com/example/A")
        .field(FieldSpec::new(ACC_PUBLIC, "first", "I"))
        .field(FieldSpec::new(ACC_PUBLIC, "second", "J"))
        .method(MethodSpec::new(ACC_PUBLIC, "alpha", "()V"))
        .method(MethodSpec::new(ACC_PUBLIC, "beta", "()I"))
        .interface("java/io/Serializable")
        .interface("java/lang/Cloneable")
        .build();

    let backward = ClassFileBuilder::new("com/example/A")
        .method(MethodSpec::new(ACC_PUBLIC, "beta", "()I"))
        .method(MethodSpec::new(ACC_PUBLIC, "alpha", "()V"))
        .field(FieldSpec::new(ACC_PUBLIC, "second", "J"))
        .field(FieldSpec::new(ACC_PUBLIC, "first", "I"))
        .interface("java/lang/Cloneable")
        .interface("java/io/Serializable")
        .build();

    assert_eq!(fingerprint(&forward), fingerprint(&backward));
}

#[test]
fn method_body_changes_do_not_change_the_fingerprint() {
    let with_code = |code: &[u8]| {
        ClassFileBuilder::new("com/example/A")
            .method(MethodSpec::new(ACC_PUBLIC, "run", "()I").code(code))
            .build()
    };

    // Same signature, different instruction bytes.
    let a = with_code(&[0x04, 0xAC]);
    let b = with_code(&[0x03, 0x04, 0x60, 0xAC]);
    assert_ne!(a, b, "binaries must actually differ for the test to mean anything");
    assert_eq!(fingerprint(&a), fingerprint(&b));
}

#[test]
fn descriptor_change_changes_the_fingerprint() {
    let with_desc = |desc: &str| {
        ClassFileBuilder::new("com/example/A")
            .method(MethodSpec::new(ACC_PUBLIC, "run", desc))
            .build()
    };

    assert_ne!(fingerprint(&with_desc("()I")), fingerprint(&with_desc("()J")));
}

#[test]
fn checked_exception_change_changes_the_fingerprint() {
    let with_throws = |exceptions: &[&str]| {
        let mut method = MethodSpec::new(ACC_PUBLIC, "run", "()V");
        for e in exceptions {
            method = method.throws(*e);
        }
        ClassFileBuilder::new("com/example/A").method(method).build()
    };

    let none = with_throws(&[]);
    let io = with_throws(&["java/io/IOException"]);
    assert_ne!(fingerprint(&none), fingerprint(&io));

    // Declaration order of the throws clause is not part of the ABI.
    let ab = with_throws(&["java/io/IOException", "java/sql/SQLException"]);
    let ba = with_throws(&["java/sql/SQLException", "java/io/IOException"]);
    assert_eq!(fingerprint(&ab), fingerprint(&ba));
}

#[test]
fn annotation_value_change_changes_the_fingerprint() {
    let with_count = |count: i32| {
        ClassFileBuilder::new("com/example/A")
            .annotation(
                true,
                AnnotationSpec::new("Lcom/example/Marker;").value("count", ValueSpec::Int(count)),
            )
            .build()
    };

    assert_ne!(fingerprint(&with_count(1)), fingerprint(&with_count(2)));
}

#[test]
fn enum_annotation_values_are_keyed_by_constant_name() {
    let with_const = |name: &str| {
        ClassFileBuilder::new("com/example/A")
            .annotation(
                true,
                AnnotationSpec::new("Lcom/example/Marker;").value(
                    "mode",
                    ValueSpec::EnumConst {
                        type_descriptor: "Lcom/example/Mode;".to_string(),
                        const_name: name.to_string(),
                    },
                ),
            )
            .build()
    };

    // Same constant name fingerprints identically even when produced from
    // separately assembled binaries (constant pool indices differ freely).
    assert_eq!(fingerprint(&with_const("FAST")), fingerprint(&with_const("FAST")));
    assert_ne!(fingerprint(&with_const("FAST")), fingerprint(&with_const("SLOW")));
}

#[test]
fn annotation_visibility_is_part_of_the_surface() {
    let with_visibility = |visible: bool| {
        ClassFileBuilder::new("com/example/A")
            .annotation(visible, AnnotationSpec::new("Lcom/example/Marker;"))
            .build()
    };

    assert_ne!(fingerprint(&with_visibility(true)), fingerprint(&with_visibility(false)));
}

#[test]
fn public_surface_policy_ignores_private_members() {
    let base = ClassFileBuilder::new("com/example/A")
        .method(MethodSpec::new(ACC_PUBLIC, "get", "()I"));
    let with_private = base
        .clone()
        .field(FieldSpec::new(ACC_PRIVATE, "cached", "I"))
        .build();
    let without_private = base.build();

    let policy = MemberPolicy::public_surface();
    let a = Fingerprint::of(&extract_class_bytes(&with_private).unwrap().retain(policy));
    let b = Fingerprint::of(&extract_class_bytes(&without_private).unwrap().retain(policy));
    assert_eq!(a, b);

    // The default policy sees the private field.
    assert_ne!(fingerprint(&with_private), fingerprint(&without_private));
}

#[test]
fn synthetic_members_are_policy_controlled() {
    let base = ClassFileBuilder::new("com/example/A")
        .method(MethodSpec::new(ACC_PUBLIC, "get", "()I"));
    let with_bridge = base
        .clone()
        .method(MethodSpec::new(
            ACC_PUBLIC | ACC_STATIC | ACC_SYNTHETIC,
            "access$000",
            "()I",
        ))
        .build();
    let without_bridge = base.build();

    let policy = MemberPolicy::public_surface();
    let a = Fingerprint::of(&extract_class_bytes(&with_bridge).unwrap().retain(policy));
    let b = Fingerprint::of(&extract_class_bytes(&without_bridge).unwrap().retain(policy));
    assert_eq!(a, b);

    assert_ne!(fingerprint(&with_bridge), fingerprint(&without_bridge));
}
