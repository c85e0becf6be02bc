//! Deep versus shallow validation at the compiler level.

use loam_tests::prelude::*;

// ========== TEST: shallow_mode_compiles_faster_path ==========
#[test]
fn test_shallow_mode_accepts_and_resolves() {
    // GIVEN a shallow-validation workspace
    let mut ws = Workspace::shallow();
    ws.compile_batch(&[
        ("/colour.loam", "Enum m::Colour { RED, GREEN }"),
        ("/paint.loam", "Class m::Paint { colour: m::Colour[1]; }"),
    ])
    .unwrap();

    // THEN structural results match the deep pipeline's
    let paint = ws.node("m::Paint");
    assert!(ws.compiler.graph().is_validated(paint));
}

// ========== TEST: shallow_mode_still_runs_kind_validators ==========
#[test]
fn test_shallow_mode_still_runs_kind_validators() {
    let mut ws = Workspace::shallow();
    let err = ws.compile_source_err("/dup.loam", "Enum m::E { A, A }");
    assert!(err.to_string().contains("Duplicated enum value 'A'"));
}

// ========== TEST: deep_and_shallow_agree_on_structure ==========
#[test]
fn test_deep_and_shallow_agree_on_structure() {
    let sources = [
        ("/colour.loam", "Enum m::Colour { RED, GREEN }"),
        ("/paint.loam", "Class m::Paint { colour: m::Colour[1]; }"),
    ];

    let mut deep = Workspace::new();
    deep.compile_batch(&sources).unwrap();
    let mut shallow = Workspace::shallow();
    shallow.compile_batch(&sources).unwrap();

    assert_eq!(deep.fingerprint(), shallow.fingerprint());
}

// ========== TEST: association_arity_enforced ==========
#[test]
fn test_association_arity_enforced() {
    // GIVEN an association with three ends: structurally representable,
    // semantically invalid
    let mut ws = Workspace::new();
    let err = ws.compile_source_err(
        "/a.loam",
        "Class m::A { x: Integer[1]; }\nAssociation m::Bad {\n  one: m::A[1];\n  two: m::A[1];\n  three: m::A[1];\n}",
    );
    assert!(err.to_string().contains("must have exactly 2 properties"));
}
