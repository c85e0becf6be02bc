//! Compiling complete models: classes, enums, associations, functions,
//! profiles, imports and stereotypes.

use loam_tests::prelude::*;

// ========== TEST: full_model_compiles ==========
#[test]
fn test_full_model_compiles() {
    // GIVEN a model spread over several sources
    let mut ws = Workspace::new();
    ws.compile_batch(&[
        (
            "/model/doc.loam",
            "Profile model::doc { stereotypes: [deprecated]; tags: [todo]; }",
        ),
        (
            "/model/person.loam",
            "Class model::Person <<doc.deprecated>> {\n  name: String[1];\n  nicknames: String[*];\n}",
        ),
        (
            "/model/firm.loam",
            "Class model::Firm {\n  legalName: String[1] = 'anonymous';\n}",
        ),
        (
            "/model/employment.loam",
            "Association model::Employment {\n  employees: model::Person[*];\n  firm: model::Firm[0..1];\n}",
        ),
    ])
    .unwrap();

    // THEN every element resolves by user path
    let person = ws.node("model::Person");
    let firm = ws.node("model::Firm");
    ws.node("model::Employment");
    ws.node("model::doc");

    // AND the stereotype application resolved onto the profile's stereotype
    let graph = ws.compiler.graph();
    let applied = graph.edges(person, "stereotypes")[0];
    let resolved = graph.resolve_ref(applied);
    assert_eq!(graph.get_node(resolved).unwrap().kind, NodeKind::Stereotype);
    assert_eq!(graph.node_name(resolved), "deprecated");

    // AND the association wired its ends onto the opposite classes
    let on_firm = graph.edges(firm, "propertiesFromAssociations");
    assert_eq!(on_firm.len(), 1);
    assert_eq!(graph.node_name(on_firm[0]), "employees");
    let on_person = graph.edges(person, "propertiesFromAssociations");
    assert_eq!(on_person.len(), 1);
    assert_eq!(graph.node_name(on_person[0]), "firm");
}

// ========== TEST: import_wildcard_resolution ==========
#[test]
fn test_import_wildcard_resolution() {
    let mut ws = Workspace::new();
    ws.compile_source("/domain.loam", "Enum model::domain::Size { S, M, L }")
        .unwrap();
    ws.compile_source(
        "/shirt.loam",
        "import model::domain::*;\nClass shop::Shirt { size: Size[1]; }",
    )
    .unwrap();

    let shirt = ws.node("shop::Shirt");
    let graph = ws.compiler.graph();
    let property = graph.edges(shirt, "properties")[0];
    let gt = loam_inference::declared_generic_type(graph, property).unwrap();
    let resolved = graph.resolve_ref(gt.raw_type().unwrap());
    assert_eq!(resolved, ws.node("model::domain::Size"));
}

// ========== TEST: same_package_short_names ==========
#[test]
fn test_same_package_short_names() {
    // GIVEN two classes in the same package referencing each other by
    // simple name
    let mut ws = Workspace::new();
    ws.compile_source(
        "/m.loam",
        "Class m::Firm { boss: Person[1]; }\nClass m::Person { employer: Firm[0..1]; }",
    )
    .unwrap();

    let firm = ws.node("m::Firm");
    let graph = ws.compiler.graph();
    let boss = graph.edges(firm, "properties")[0];
    let gt = loam_inference::declared_generic_type(graph, boss).unwrap();
    assert_eq!(
        graph.resolve_ref(gt.raw_type().unwrap()),
        ws.node("m::Person")
    );
}

// ========== TEST: generalizations_resolve_across_sources ==========
#[test]
fn test_generalizations_resolve_across_sources() {
    let mut ws = Workspace::new();
    ws.compile_source("/base.loam", "Class m::LegalEntity { id: Integer[1]; }")
        .unwrap();
    ws.compile_source(
        "/firm.loam",
        "Class m::Firm extends m::LegalEntity { name: String[1]; }",
    )
    .unwrap();

    let graph = ws.compiler.graph();
    let firm = ws.node("m::Firm");
    let base = ws.node("m::LegalEntity");
    assert!(graph.type_conforms(firm, base));
    // The inherited property is reachable through the generalization
    assert!(graph.declared_property(firm, "id").is_some());
}

// ========== TEST: duplicate_enum_value_fails_with_location ==========
#[test]
fn test_duplicate_enum_value_fails_with_location() {
    let mut ws = Workspace::new();
    let err = ws.compile_source_err("/e.loam", "Enum m::E { GOOD, GOOD }");
    assert!(err.to_string().contains("Duplicated enum value 'GOOD'"));
}

// ========== TEST: unknown_stereotype_fails ==========
#[test]
fn test_unknown_stereotype_fails() {
    let mut ws = Workspace::new();
    ws.compile_source(
        "/doc.loam",
        "Profile m::doc { stereotypes: [deprecated]; }",
    )
    .unwrap();
    let err = ws.compile_source_err(
        "/c.loam",
        "Class m::C <<doc.missing>> { name: String[1]; }",
    );
    assert!(err
        .to_string()
        .contains("The stereotype 'missing' can't be found in profile m::doc"));
}

// ========== TEST: parse_error_surfaces_verbatim ==========
#[test]
fn test_parse_error_surfaces_verbatim() {
    let mut ws = Workspace::new();
    let err = ws.compile_source_err("/bad.loam", "Class m::C {\n  name String[1];\n}");
    assert_located(&err, "expected ':'", 2, 8);
    // Nothing of the failed source survives
    assert!(!ws.has("m::C"));
    assert_eq!(ws.source_count(), 0);
}

// ========== TEST: default_value_type_mismatch_fails ==========
#[test]
fn test_default_value_type_mismatch_fails() {
    let mut ws = Workspace::new();
    let err = ws.compile_source_err("/c.loam", "Class m::C { name: String[1] = 42; }");
    assert!(err.to_string().contains("Type Error"));
}

// ========== TEST: function_body_must_match_return_type ==========
#[test]
fn test_function_body_must_match_return_type() {
    let mut ws = Workspace::new();
    ws.compile_source("/e.loam", "Enum m::Colour { RED }\nEnum m::Size { BIG }")
        .unwrap();
    let err = ws.compile_source_err(
        "/f.loam",
        "function m::fav(): m::Colour[1] { m::Size.BIG }",
    );
    assert!(err.to_string().contains("Type Error"));
}
