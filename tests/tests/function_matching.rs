//! Signature matching and unification against compiled functions.

use loam_inference::{match_signature, subsumes};
use loam_tests::prelude::*;
use loam_core::GenericType;

// ========== TEST: subsumption_reference_cases ==========
#[test]
fn test_subsumption_reference_cases() {
    let one = Multiplicity::one();
    let zero_five = Multiplicity::range(0, Some(5));
    let many = Multiplicity::zero_many();
    let three = Multiplicity::range(3, Some(3));

    assert_eq!(subsumes(&one, &one), Some(true));
    assert_eq!(subsumes(&one, &zero_five), Some(false));
    assert_eq!(subsumes(&many, &three), Some(true));
}

// ========== TEST: match_compiled_generic_function ==========
#[test]
fn test_match_compiled_generic_function() {
    // GIVEN a compiled generic function and a class hierarchy
    let mut ws = Workspace::new();
    ws.compile_batch(&[
        (
            "/model.loam",
            "Class m::Animal { name: String[1]; }\nClass m::Cat extends m::Animal { lives: Integer[1]; }\nClass m::Dog extends m::Animal { name2: String[1]; }",
        ),
        (
            "/fn.loam",
            "function m::first<T|z>(set: T[*], fallback: T[1]): T[z];",
        ),
    ])
    .unwrap();

    let graph = ws.compiler.graph();
    let function = ws.node("m::first");
    let cat = ws.node("m::Cat");
    let dog = ws.node("m::Dog");
    let animal = ws.node("m::Animal");

    // WHEN matched with two sibling argument types
    let result = match_signature(
        graph,
        function,
        &[GenericType::simple(cat), GenericType::simple(dog)],
        &[Multiplicity::zero_many(), Multiplicity::one()],
    )
    .unwrap();

    // THEN T widens to the common supertype and flows into the return type
    assert_eq!(result.return_type.raw_type(), Some(animal));
}

// ========== TEST: concrete_parameter_rejects_wrong_multiplicity ==========
#[test]
fn test_concrete_parameter_rejects_wrong_multiplicity() {
    let mut ws = Workspace::new();
    ws.compile_batch(&[
        ("/model.loam", "Class m::Animal { name: String[1]; }"),
        (
            "/fn.loam",
            "function m::feed(pet: m::Animal[1]): m::Animal[1];",
        ),
    ])
    .unwrap();

    let graph = ws.compiler.graph();
    let function = ws.node("m::feed");
    let animal = ws.node("m::Animal");

    // A [0..5] argument does not fit a declared [1]
    let err = match_signature(
        graph,
        function,
        &[GenericType::simple(animal)],
        &[Multiplicity::range(0, Some(5))],
    )
    .unwrap_err();
    assert!(err.message.contains("Multiplicity Error"));
    assert!(err.message.contains("[0..5]"));
    assert!(err.message.contains("[1]"));
}

// ========== TEST: concrete_parameter_rejects_wrong_type ==========
#[test]
fn test_concrete_parameter_rejects_wrong_type() {
    let mut ws = Workspace::new();
    ws.compile_batch(&[
        (
            "/model.loam",
            "Class m::Animal { name: String[1]; }\nClass m::Rock { mass: Float[1]; }",
        ),
        (
            "/fn.loam",
            "function m::feed(pet: m::Animal[1]): m::Animal[1];",
        ),
    ])
    .unwrap();

    let graph = ws.compiler.graph();
    let function = ws.node("m::feed");
    let rock = ws.node("m::Rock");

    let err = match_signature(
        graph,
        function,
        &[GenericType::simple(rock)],
        &[Multiplicity::one()],
    )
    .unwrap_err();
    assert!(err.message.contains("Type Error"));
    assert!(err.message.contains("'Rock'"));
    assert!(err.message.contains("'Animal'"));
}

// ========== TEST: multiplicity_parameter_flows_to_return ==========
#[test]
fn test_multiplicity_parameter_flows_to_return() {
    let mut ws = Workspace::new();
    ws.compile_batch(&[
        ("/model.loam", "Class m::Animal { name: String[1]; }"),
        (
            "/fn.loam",
            "function m::echo<|z>(pets: m::Animal[z]): m::Animal[z];",
        ),
    ])
    .unwrap();

    let graph = ws.compiler.graph();
    let function = ws.node("m::echo");
    let animal = ws.node("m::Animal");

    let result = match_signature(
        graph,
        function,
        &[GenericType::simple(animal)],
        &[Multiplicity::range(2, Some(4))],
    )
    .unwrap();
    assert_eq!(result.return_multiplicity, Multiplicity::range(2, Some(4)));
}
