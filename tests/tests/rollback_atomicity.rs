//! Rollback atomicity: a failure in any phase leaves the graph, the indexes
//! and the source registry byte-identical to their pre-cycle state.

use loam_tests::prelude::*;

const BASE: &str = "Class model::Base { id: Integer[1]; }";

fn seeded_workspace() -> Workspace {
    let mut ws = Workspace::new();
    ws.compile_source("/base.loam", BASE).unwrap();
    ws
}

// ========== TEST: parse_failure_rolls_back ==========
#[test]
fn test_parse_failure_rolls_back() {
    let mut ws = seeded_workspace();
    let before = ws.fingerprint();
    let count = ws.node_count();

    let err = ws.compile_source_err("/broken.loam", "Class model::X {");
    assert!(matches!(err, CompilerError::Parse(_)));

    assert_eq!(ws.fingerprint(), before);
    assert_eq!(ws.node_count(), count);
    assert_eq!(ws.source_count(), 1);
}

// ========== TEST: resolution_failure_rolls_back ==========
#[test]
fn test_resolution_failure_rolls_back() {
    let mut ws = seeded_workspace();
    let before = ws.fingerprint();

    let err = ws.compile_source_err("/dangling.loam", "Class model::X { other: model::Nope[1]; }");
    assert!(err.to_string().contains("Nope has not been defined!"));

    assert_eq!(ws.fingerprint(), before);
    assert!(!ws.has("model::X"));
    assert_eq!(ws.compiler.context().get_by_path("model::X"), None);
}

// ========== TEST: validation_failure_rolls_back ==========
#[test]
fn test_validation_failure_rolls_back() {
    let mut ws = seeded_workspace();
    let before = ws.fingerprint();
    let count = ws.node_count();

    // The enum parses and resolves but fails validation on the duplicate
    let err = ws.compile_source_err("/dup.loam", "Enum model::E { A, A }");
    assert!(err.to_string().contains("Duplicated enum value 'A'"));

    // Node count, structure, context and registry all match the pre-call state
    assert_eq!(ws.node_count(), count);
    assert_eq!(ws.fingerprint(), before);
    assert_eq!(ws.compiler.context().get_by_path("model::E"), None);
    assert!(ws.compiler.source(&SourceId::new("/dup.loam")).is_none());
}

// ========== TEST: failed_batch_leaves_no_partial_sources ==========
#[test]
fn test_failed_batch_leaves_no_partial_sources() {
    // GIVEN a batch where the second source is broken
    let mut ws = seeded_workspace();
    let before = ws.fingerprint();

    let result = ws.compile_batch(&[
        ("/good.loam", "Class model::Good { name: String[1]; }"),
        ("/bad.loam", "Enum model::E { A, A }"),
    ]);

    // THEN the healthy source of the failed batch is not committed either
    assert!(result.is_err());
    assert!(!ws.has("model::Good"));
    assert_eq!(ws.fingerprint(), before);
    assert_eq!(ws.source_count(), 1);
}

// ========== TEST: failed_update_keeps_previous_version ==========
#[test]
fn test_failed_update_keeps_previous_version() {
    // GIVEN a compiled source
    let mut ws = seeded_workspace();
    let base = ws.node("model::Base");
    let before = ws.fingerprint();

    // WHEN an update to broken content fails
    let err = ws
        .update_source("/base.loam", "Class model::Base { id: Integer[1] = 'nan'; }")
        .expect_err("update must fail");
    assert!(err.to_string().contains("Type Error"));

    // THEN the previous version is fully restored, same node identity
    assert_eq!(ws.fingerprint(), before);
    assert_eq!(ws.node("model::Base"), base);
    let source = ws.compiler.source(&SourceId::new("/base.loam")).unwrap();
    assert_eq!(source.content, BASE);
    assert!(source.compiled);
}

// ========== TEST: compile_after_failure_succeeds ==========
#[test]
fn test_compile_after_failure_succeeds() {
    // GIVEN a failed compile
    let mut ws = seeded_workspace();
    ws.compile_source_err("/x.loam", "Enum model::E { A, A }");

    // WHEN the corrected source is compiled
    ws.compile_source("/x.loam", "Enum model::E { A, B }").unwrap();

    // THEN it lands normally
    assert!(ws.has("model::E"));
    assert_eq!(ws.source_count(), 2);
}
