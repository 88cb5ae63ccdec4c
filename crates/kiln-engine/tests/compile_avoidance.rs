use kiln_classfile::flags::{ACC_PRIVATE, ACC_PUBLIC};
use kiln_engine::{ClassInput, CompileAvoidance};
use kiln_testing::{ClassFileBuilder, FieldSpec, MethodSpec};
use tempfile::TempDir;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env(),
        )
        .try_init()
        .ok();
}

fn class_a() -> ClassInput {
    let bytes = ClassFileBuilder::new("com/example/A")
        .access(ACC_PUBLIC)
        .method(MethodSpec::new(ACC_PUBLIC, "run", "()V").code(&[0xB1]))
        .build();
    ClassInput::new("com/example/A", bytes)
}

fn class_b(init_code: &[u8], value_descriptor: &str) -> ClassInput {
    let bytes = ClassFileBuilder::new("com/example/B")
        .access(ACC_PUBLIC)
        .field(FieldSpec::new(ACC_PRIVATE, "secret", "I"))
        .method(MethodSpec::new(ACC_PUBLIC, "<init>", "()V").code(init_code))
        .method(MethodSpec::new(ACC_PUBLIC, "value", value_descriptor).code(&[0x03, 0xAC]))
        .build();
    ClassInput::new("com/example/B", bytes)
}

#[test]
fn private_initializer_edit_is_clean_but_descriptor_change_invalidates() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let engine = CompileAvoidance::new(tmp.path(), "compile:main");

    // First build: no previous generation, everything counts as changed.
    let outcome = engine
        .analyze(&[class_a(), class_b(&[0x2A, 0xB7, 0x00, 0x01, 0xB1], "()I")])
        .unwrap();
    assert!(outcome.cache_rebuilt);
    assert_eq!(outcome.diff.changed_api.len(), 2);

    // Rebuild B with a different private-field initializer. The field's
    // declaration is untouched, only <init> bytecode differs.
    let outcome = engine
        .analyze(&[class_a(), class_b(&[0x2A, 0xB7, 0x00, 0x01, 0x04, 0xB1], "()I")])
        .unwrap();
    assert!(!outcome.cache_rebuilt);
    assert!(outcome.diff.is_clean());
    assert!(outcome.invalidated().is_empty());
    assert!(!outcome.requires_recompilation());

    // Change a public method descriptor: B's API changed, A's did not.
    let outcome = engine
        .analyze(&[class_a(), class_b(&[0x2A, 0xB7, 0x00, 0x01, 0xB1], "()J")])
        .unwrap();
    assert!(outcome.diff.changed_api.contains("com/example/B"));
    assert!(outcome.diff.unchanged.contains("com/example/A"));
    assert_eq!(
        outcome.invalidated().into_iter().collect::<Vec<_>>(),
        vec!["com/example/B".to_string()]
    );
    assert!(outcome.requires_recompilation());
}

#[test]
fn removed_class_is_invalidated() {
    let tmp = TempDir::new().unwrap();
    let engine = CompileAvoidance::new(tmp.path(), "compile:main");

    engine
        .analyze(&[class_a(), class_b(&[0xB1], "()I")])
        .unwrap();
    let outcome = engine.analyze(&[class_a()]).unwrap();

    assert!(outcome.diff.removed_api.contains("com/example/B"));
    assert!(outcome.invalidated().contains("com/example/B"));
    assert!(outcome.diff.unchanged.contains("com/example/A"));
}

#[test]
fn malformed_class_is_isolated_and_always_invalidated() {
    let tmp = TempDir::new().unwrap();
    let engine = CompileAvoidance::new(tmp.path(), "compile:main");

    let garbage = ClassInput::new("com/example/Broken", vec![0xDE, 0xAD, 0xBE, 0xEF]);
    let outcome = engine.analyze(&[class_a(), garbage.clone()]).unwrap();

    assert!(outcome.malformed.contains_key("com/example/Broken"));
    assert!(outcome.diff.changed_api.contains("com/example/A"));
    assert!(!outcome.diff.changed_api.contains("com/example/Broken"));
    assert!(outcome.invalidated().contains("com/example/Broken"));
    assert!(outcome.requires_recompilation());

    // The broken class never entered the stored generation, so an unchanged
    // rerun with the same garbage stays invalidated rather than going clean.
    let outcome = engine.analyze(&[class_a(), garbage]).unwrap();
    assert!(outcome.diff.is_clean());
    assert!(outcome.invalidated().contains("com/example/Broken"));
}

#[test]
fn reopen_reuses_the_persisted_generation() {
    let tmp = TempDir::new().unwrap();

    let outcome = CompileAvoidance::new(tmp.path(), "compile:main")
        .analyze(&[class_a()])
        .unwrap();
    assert!(outcome.cache_rebuilt);

    // A fresh engine over the same directory compares against the stored
    // generation instead of rebuilding.
    let outcome = CompileAvoidance::new(tmp.path(), "compile:main")
        .analyze(&[class_a()])
        .unwrap();
    assert!(!outcome.cache_rebuilt);
    assert!(outcome.diff.is_clean());
}

#[test]
fn policy_change_discards_the_persisted_generation() {
    let tmp = TempDir::new().unwrap();

    CompileAvoidance::new(tmp.path(), "compile:main")
        .analyze(&[class_a()])
        .unwrap();

    // Fingerprints under a different member policy are not comparable, so
    // the cache validator rejects the stored generation.
    let outcome = CompileAvoidance::new(tmp.path(), "compile:main")
        .with_policy(kiln_abi::MemberPolicy::public_surface())
        .analyze(&[class_a()])
        .unwrap();
    assert!(outcome.cache_rebuilt);
}

#[test]
fn identity_mismatch_discards_the_persisted_generation() {
    let tmp = TempDir::new().unwrap();

    CompileAvoidance::new(tmp.path(), "compile:main")
        .analyze(&[class_a()])
        .unwrap();

    let outcome = CompileAvoidance::new(tmp.path(), "compile:test")
        .analyze(&[class_a()])
        .unwrap();
    assert!(outcome.cache_rebuilt);
}
