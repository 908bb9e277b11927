//! End-to-end checker tests
//!
//! Covers declaration sequencing, the bidirectional expression rules,
//! row-polymorphic calls, call options, and the error taxonomy.

use constellation::ast::builders::*;
use constellation::ast::{ArithOp, CallOptions, CompareOp, Duration, DurationUnit};
use constellation::error::{CompileError, CompileWarning};
use constellation::typed::{TypedDeclaration, TypedExpression};
use constellation::types::{RowVarId, Type};
use constellation::{check, stdlib_signatures, FunctionRegistry, FunctionSignature};

fn registry_with_stdlib() -> FunctionRegistry {
    let registry = FunctionRegistry::new();
    registry.register_all(stdlib_signatures());
    registry
}

/// `stdlib.misc.name_of(x: {name: String | ρ}) -> String`
fn register_name_of(registry: &FunctionRegistry) {
    let row = RowVarId(0);
    registry.register(
        FunctionSignature::new(
            Some("stdlib.misc"),
            "name_of",
            vec![(
                "x".to_string(),
                Type::open_record([("name", Type::String)], row),
            )],
            Type::String,
            "misc-module",
        )
        .with_row_vars(vec![row]),
    );
}

/// `stdlib.collection.filter(items: List<Int>, pred: (Int) => Boolean) -> List<Int>`
fn register_filter_int(registry: &FunctionRegistry) {
    registry.register(FunctionSignature::new(
        Some("stdlib.collection"),
        "filter",
        vec![
            ("items".to_string(), Type::list(Type::Int)),
            (
                "pred".to_string(),
                Type::function(vec![Type::Int], Type::Boolean),
            ),
        ],
        Type::list(Type::Int),
        "collection-module",
    ));
}

fn assignment_type(typed: &constellation::TypedPipeline, name: &str) -> Type {
    typed
        .binding(name)
        .unwrap_or_else(|| panic!("no binding for '{name}'"))
        .ty()
}

// ============================================================================
// Scenario seeds
// ============================================================================

#[test]
fn row_polymorphic_call_with_open_record_param() {
    let registry = registry_with_stdlib();
    register_name_of(&registry);

    // in u: { name: String, age: Int }
    // out_name = stdlib.misc.name_of(u)
    // out out_name
    let pipeline = PipelineBuilder::new()
        .input(
            "u",
            te_record([("name", te_named("String")), ("age", te_named("Int"))]),
        )
        .assign("out_name", call("stdlib.misc.name_of", [var("u")]))
        .output("out_name")
        .build();

    let typed = check(&pipeline, &registry).expect("row-polymorphic call checks");
    assert_eq!(assignment_type(&typed, "out_name"), Type::String);
    assert_eq!(typed.outputs.len(), 1);
    assert_eq!(typed.outputs[0].1, Type::String);
}

#[test]
fn row_polymorphic_call_rejects_missing_field() {
    let registry = registry_with_stdlib();
    register_name_of(&registry);

    let pipeline = PipelineBuilder::new()
        .input("u", te_record([("age", te_named("Int"))]))
        .assign("out_name", call("stdlib.misc.name_of", [var("u")]))
        .output("out_name")
        .build();

    let errors = check(&pipeline, &registry).expect_err("field is missing");
    assert!(errors[0].to_string().contains("name"));
}

#[test]
fn lambda_parameter_inferred_from_argument_context() {
    let registry = registry_with_stdlib();
    register_filter_int(&registry);

    // in xs: List<Int>
    // ys = filter(xs, (x) => gt(x, 0))
    // out ys
    let pipeline = PipelineBuilder::new()
        .input("xs", te_list(te_named("Int")))
        .assign(
            "ys",
            call(
                "filter",
                [
                    var("xs"),
                    lambda([("x", None)], call("gt", [var("x"), lit_int(0)])),
                ],
            ),
        )
        .output("ys")
        .build();

    let typed = check(&pipeline, &registry).expect("lambda inherits parameter type");
    assert_eq!(assignment_type(&typed, "ys"), Type::list(Type::Int));
}

#[test]
fn empty_list_typed_from_declaration_context() {
    let registry = registry_with_stdlib();

    // in defaults: List<Int> @example([])
    // out defaults
    let pipeline = PipelineBuilder::new()
        .input_with_examples("defaults", te_list(te_named("Int")), [list([])])
        .output("defaults")
        .build();

    let typed = check(&pipeline, &registry).expect("empty example checks against List<Int>");
    assert_eq!(typed.outputs[0].1, Type::list(Type::Int));
}

#[test]
fn record_merge_broadcasts_over_lists() {
    let registry = registry_with_stdlib();

    // in candidates: List<{id: Int}>
    // in ctx: {session: String}
    // enriched = candidates + ctx
    // out enriched
    let pipeline = PipelineBuilder::new()
        .input("candidates", te_list(te_record([("id", te_named("Int"))])))
        .input("ctx", te_record([("session", te_named("String"))]))
        .assign(
            "enriched",
            arith(var("candidates"), ArithOp::Add, var("ctx")),
        )
        .output("enriched")
        .build();

    let typed = check(&pipeline, &registry).expect("broadcast merge checks");
    assert_eq!(
        assignment_type(&typed, "enriched"),
        Type::list(Type::record([
            ("id", Type::Int),
            ("session", Type::String)
        ]))
    );
}

#[test]
fn ambiguous_simple_name_across_wildcard_imports() {
    let registry = registry_with_stdlib();
    for namespace in ["etl", "ml"] {
        registry.register(FunctionSignature::new(
            Some(namespace),
            "process",
            vec![("x".to_string(), Type::Int)],
            Type::Int,
            "processor",
        ));
    }

    let pipeline = PipelineBuilder::new()
        .use_ns("etl")
        .use_ns("ml")
        .input("x", te_named("Int"))
        .assign("y", call("process", [var("x")]))
        .output("y")
        .build();

    let errors = check(&pipeline, &registry).expect_err("two candidates");
    match &errors[0] {
        CompileError::AmbiguousFunction { candidates, .. } => {
            assert_eq!(
                candidates,
                &vec!["etl.process".to_string(), "ml.process".to_string()]
            );
        }
        other => panic!("expected AmbiguousFunction, got {other:?}"),
    }
}

// ============================================================================
// Declarations
// ============================================================================

#[test]
fn type_aliases_resolve_in_later_declarations() {
    let registry = registry_with_stdlib();

    let pipeline = PipelineBuilder::new()
        .type_def("UserId", te_named("Int"))
        .input("id", te_named("UserId"))
        .output("id")
        .build();

    let typed = check(&pipeline, &registry).expect("alias resolves");
    assert_eq!(typed.outputs[0].1, Type::Int);
}

#[test]
fn candidates_is_a_list_alias() {
    let registry = registry_with_stdlib();

    let pipeline = PipelineBuilder::new()
        .input(
            "xs",
            constellation::ast::TypeExpr::Generic {
                name: "Candidates".to_string(),
                args: vec![te_named("String")],
            },
        )
        .output("xs")
        .build();

    let typed = check(&pipeline, &registry).expect("Candidates resolves");
    assert_eq!(typed.outputs[0].1, Type::list(Type::String));
}

#[test]
fn unknown_type_name_is_reported() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("x", te_named("Missing"))
        .output("x")
        .build();

    let errors = check(&pipeline, &registry).expect_err("unknown type");
    assert_eq!(errors[0].kind(), "undefined_type");
}

#[test]
fn use_of_unknown_namespace_fails() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new().use_ns("nowhere").build();

    let errors = check(&pipeline, &registry).expect_err("unknown namespace");
    assert!(matches!(
        errors[0],
        CompileError::UndefinedNamespace { .. }
    ));
}

#[test]
fn use_accepts_namespace_prefixes() {
    let registry = registry_with_stdlib();
    // stdlib.math is registered; `use stdlib` is a prefix of it
    let pipeline = PipelineBuilder::new().use_ns("stdlib").build();
    check(&pipeline, &registry).expect("prefix is accepted");
}

#[test]
fn first_failing_declaration_stops_the_sequence() {
    let registry = registry_with_stdlib();

    // Declaration 2 fails; declaration 3 would fail too but must not be
    // reported (its environment is undefined)
    let pipeline = PipelineBuilder::new()
        .input("x", te_named("Int"))
        .assign("y", var("missing_one"))
        .assign("z", var("missing_two"))
        .build();

    let errors = check(&pipeline, &registry).expect_err("declaration 2 fails");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        CompileError::UndefinedVariable { name, .. } => assert_eq!(name, "missing_one"),
        other => panic!("expected UndefinedVariable, got {other:?}"),
    }
}

#[test]
fn errors_accumulate_within_one_declaration() {
    let registry = registry_with_stdlib();

    // Both list elements are bad; both errors surface together
    let pipeline = PipelineBuilder::new()
        .assign("xs", list([var("missing_one"), var("missing_two")]))
        .build();

    let errors = check(&pipeline, &registry).expect_err("both elements fail");
    assert_eq!(errors.len(), 2);
}

#[test]
fn output_requires_a_bound_variable() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new().output("nothing_here").build();

    let errors = check(&pipeline, &registry).expect_err("unbound output");
    assert_eq!(errors[0].kind(), "undefined_variable");
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn not_equal_wraps_the_equality_call() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("a", te_named("String"))
        .input("b", te_named("String"))
        .assign("differ", compare(var("a"), CompareOp::NotEq, var("b")))
        .output("differ")
        .build();

    let typed = check(&pipeline, &registry).expect("!= on String checks");
    match typed.binding("differ").expect("bound") {
        TypedExpression::Not { operand, .. } => match operand.as_ref() {
            TypedExpression::FunctionCall { signature, .. } => {
                assert_eq!(signature.name, "eq-string");
            }
            other => panic!("expected an eq-string call, got {other:?}"),
        },
        other => panic!("expected a not-wrapped call, got {other:?}"),
    }
}

#[test]
fn string_ordering_is_unsupported() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("a", te_named("String"))
        .input("b", te_named("String"))
        .assign("cmp", compare(var("a"), CompareOp::Lt, var("b")))
        .output("cmp")
        .build();

    let errors = check(&pipeline, &registry).expect_err("no lt for String");
    assert_eq!(errors[0].kind(), "unsupported_comparison");
}

#[test]
fn mixed_type_comparison_is_unsupported() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("a", te_named("Int"))
        .input("b", te_named("String"))
        .assign("cmp", compare(var("a"), CompareOp::Eq, var("b")))
        .build();

    let errors = check(&pipeline, &registry).expect_err("operand types differ");
    assert_eq!(errors[0].kind(), "unsupported_comparison");
}

#[test]
fn arithmetic_on_records_desugars_to_merge() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("a", te_record([("x", te_named("Int"))]))
        .input("b", te_record([("y", te_named("String"))]))
        .assign("merged", arith(var("a"), ArithOp::Add, var("b")))
        .output("merged")
        .build();

    let typed = check(&pipeline, &registry).expect("record + record merges");
    assert!(matches!(
        typed.binding("merged"),
        Some(TypedExpression::Merge { .. })
    ));
    assert_eq!(
        assignment_type(&typed, "merged"),
        Type::record([("x", Type::Int), ("y", Type::String)])
    );
}

#[test]
fn merge_right_side_wins_on_collisions() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("a", te_record([("x", te_named("Int"))]))
        .input("b", te_record([("x", te_named("String"))]))
        .assign("merged", merge(var("a"), var("b")))
        .output("merged")
        .build();

    let typed = check(&pipeline, &registry).expect("colliding merge checks");
    assert_eq!(
        assignment_type(&typed, "merged"),
        Type::record([("x", Type::String)])
    );
}

#[test]
fn merging_non_records_is_rejected() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("a", te_named("Int"))
        .input("b", te_record([("x", te_named("Int"))]))
        .assign("merged", merge(var("a"), var("b")))
        .build();

    let errors = check(&pipeline, &registry).expect_err("Int is not mergeable");
    assert_eq!(errors[0].kind(), "incompatible_merge");
}

#[test]
fn projection_preserves_the_list_wrapper() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input(
            "users",
            te_list(te_record([
                ("id", te_named("Int")),
                ("name", te_named("String")),
                ("age", te_named("Int")),
            ])),
        )
        .assign("slim", project(var("users"), ["id", "name"]))
        .output("slim")
        .build();

    let typed = check(&pipeline, &registry).expect("projection checks");
    assert_eq!(
        assignment_type(&typed, "slim"),
        Type::list(Type::record([
            ("id", Type::Int),
            ("name", Type::String)
        ]))
    );
}

#[test]
fn invalid_projection_names_available_fields() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("u", te_record([("id", te_named("Int"))]))
        .assign("p", project(var("u"), ["missing"]))
        .build();

    let errors = check(&pipeline, &registry).expect_err("field missing");
    match &errors[0] {
        CompileError::InvalidProjection { available, .. } => {
            assert_eq!(available, &vec!["id".to_string()]);
        }
        other => panic!("expected InvalidProjection, got {other:?}"),
    }
}

#[test]
fn field_access_broadcasts_over_lists() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("users", te_list(te_record([("name", te_named("String"))])))
        .assign("names", field(var("users"), "name"))
        .output("names")
        .build();

    let typed = check(&pipeline, &registry).expect("field access checks");
    assert_eq!(assignment_type(&typed, "names"), Type::list(Type::String));
}

#[test]
fn missing_field_access_names_available_fields() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("u", te_record([("id", te_named("Int"))]))
        .assign("x", field(var("u"), "email"))
        .build();

    let errors = check(&pipeline, &registry).expect_err("no such field");
    assert_eq!(errors[0].kind(), "invalid_field_access");
}

#[test]
fn conditional_joins_branch_types() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("flag", te_named("Boolean"))
        .assign(
            "value",
            conditional(var("flag"), lit_int(1), lit_str("fallback")),
        )
        .output("value")
        .build();

    let typed = check(&pipeline, &registry).expect("conditional checks");
    assert_eq!(
        assignment_type(&typed, "value"),
        Type::union([Type::Int, Type::String])
    );
}

#[test]
fn guard_produces_an_optional() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("flag", te_named("Boolean"))
        .assign("maybe", guard(lit_int(42), var("flag")))
        .output("maybe")
        .build();

    let typed = check(&pipeline, &registry).expect("guard checks");
    assert_eq!(
        assignment_type(&typed, "maybe"),
        Type::optional(Type::Int)
    );
}

#[test]
fn coalesce_unwraps_or_keeps_the_optional() {
    let registry = registry_with_stdlib();

    let unwrap = PipelineBuilder::new()
        .input("flag", te_named("Boolean"))
        .assign("maybe", guard(lit_int(1), var("flag")))
        .assign("sure", coalesce(var("maybe"), lit_int(0)))
        .output("sure")
        .build();
    let typed = check(&unwrap, &registry).expect("optional ?? value");
    assert_eq!(assignment_type(&typed, "sure"), Type::Int);

    let keep = PipelineBuilder::new()
        .input("flag", te_named("Boolean"))
        .assign("a", guard(lit_int(1), var("flag")))
        .assign("b", guard(lit_int(2), var("flag")))
        .assign("joined", coalesce(var("a"), var("b")))
        .output("joined")
        .build();
    let typed = check(&keep, &registry).expect("optional ?? optional");
    assert_eq!(
        assignment_type(&typed, "joined"),
        Type::optional(Type::Int)
    );
}

#[test]
fn coalesce_rejects_unrelated_right_side() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("flag", te_named("Boolean"))
        .assign("maybe", guard(lit_int(1), var("flag")))
        .assign("bad", coalesce(var("maybe"), lit_str("zero")))
        .build();

    let errors = check(&pipeline, &registry).expect_err("String is not Int");
    assert_eq!(errors[0].kind(), "type_mismatch");
}

#[test]
fn coalesce_requires_an_optional_left_side() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("x", te_named("Int"))
        .assign("bad", coalesce(var("x"), lit_int(0)))
        .build();

    let errors = check(&pipeline, &registry).expect_err("left must be Optional");
    assert_eq!(errors[0].kind(), "type_error");
}

#[test]
fn branch_joins_all_arms() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("a", te_named("Boolean"))
        .input("b", te_named("Boolean"))
        .assign(
            "label",
            branch(
                [
                    (var("a"), lit_str("first")),
                    (var("b"), lit_str("second")),
                ],
                lit_str("otherwise"),
            ),
        )
        .output("label")
        .build();

    let typed = check(&pipeline, &registry).expect("branch checks");
    assert_eq!(assignment_type(&typed, "label"), Type::String);
}

#[test]
fn string_interpolation_accepts_any_expression_type() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("n", te_named("Int"))
        .assign(
            "greeting",
            interp([text("count is "), part(var("n"))]),
        )
        .output("greeting")
        .build();

    let typed = check(&pipeline, &registry).expect("interpolation checks");
    assert_eq!(assignment_type(&typed, "greeting"), Type::String);
}

#[test]
fn bare_lambda_requires_annotations_in_infer_mode() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .assign("f", lambda([("x", None)], var("x")))
        .build();

    let errors = check(&pipeline, &registry).expect_err("annotation required");
    assert_eq!(errors[0].kind(), "type_error");
    assert!(errors[0].to_string().contains("'x'"));
}

#[test]
fn annotated_lambda_infers_a_function_type() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .assign(
            "f",
            lambda([("x", Some(te_named("Int")))], var("x")),
        )
        .output("f")
        .build();

    let typed = check(&pipeline, &registry).expect("annotated lambda checks");
    assert_eq!(
        assignment_type(&typed, "f"),
        Type::function(vec![Type::Int], Type::Int)
    );
}

// ============================================================================
// Call options
// ============================================================================

#[test]
fn fallback_must_match_the_return_type() {
    let registry = registry_with_stdlib();

    let options = CallOptions {
        fallback: Some(Box::new(lit_str("oops"))),
        ..CallOptions::default()
    };
    let pipeline = PipelineBuilder::new()
        .input("a", te_named("Int"))
        .assign(
            "sum",
            call_with_options("stdlib.math.add", [var("a"), lit_int(1)], options),
        )
        .build();

    let errors = check(&pipeline, &registry).expect_err("String fallback for Int return");
    assert_eq!(errors[0].kind(), "fallback_type_mismatch");
}

#[test]
fn well_typed_fallback_is_captured() {
    let registry = registry_with_stdlib();

    let options = CallOptions {
        fallback: Some(Box::new(lit_int(0))),
        retry: Some(3),
        ..CallOptions::default()
    };
    let pipeline = PipelineBuilder::new()
        .input("a", te_named("Int"))
        .assign(
            "sum",
            call_with_options("stdlib.math.add", [var("a"), lit_int(1)], options),
        )
        .output("sum")
        .build();

    let typed = check(&pipeline, &registry).expect("fallback checks");
    match typed.binding("sum").expect("bound") {
        TypedExpression::FunctionCall { options, .. } => {
            let fallback = options.fallback.as_ref().expect("fallback captured");
            assert_eq!(fallback.ty(), Type::Int);
        }
        other => panic!("expected a call, got {other:?}"),
    }
    assert!(typed.warnings.is_empty());
}

#[test]
fn out_of_range_option_values_are_errors() {
    let registry = registry_with_stdlib();

    let options = CallOptions {
        retry: Some(-1),
        concurrency: Some(0),
        timeout: Some(Duration::new(0, DurationUnit::Seconds)),
        ..CallOptions::default()
    };
    let pipeline = PipelineBuilder::new()
        .input("a", te_named("Int"))
        .assign(
            "sum",
            call_with_options("stdlib.math.add", [var("a"), lit_int(1)], options),
        )
        .build();

    let errors = check(&pipeline, &registry).expect_err("three bad options");
    assert_eq!(errors.len(), 3);
    assert!(errors
        .iter()
        .all(|error| error.kind() == "invalid_option_value"));
}

#[test]
fn option_dependencies_warn_but_do_not_fail() {
    let registry = registry_with_stdlib();

    let options = CallOptions {
        delay: Some(Duration::new(5, DurationUnit::Seconds)),
        cache_backend: Some("redis".to_string()),
        ..CallOptions::default()
    };
    let pipeline = PipelineBuilder::new()
        .input("a", te_named("Int"))
        .assign(
            "sum",
            call_with_options("stdlib.math.add", [var("a"), lit_int(1)], options),
        )
        .output("sum")
        .build();

    let typed = check(&pipeline, &registry).expect("warnings are not errors");
    let kinds: Vec<&str> = typed.warnings.iter().map(CompileWarning::kind).collect();
    assert_eq!(kinds, vec!["option_dependency", "option_dependency"]);
}

#[test]
fn high_retry_count_warns() {
    let registry = registry_with_stdlib();

    let options = CallOptions {
        retry: Some(25),
        ..CallOptions::default()
    };
    let pipeline = PipelineBuilder::new()
        .input("a", te_named("Int"))
        .assign(
            "sum",
            call_with_options("stdlib.math.add", [var("a"), lit_int(1)], options),
        )
        .output("sum")
        .build();

    let typed = check(&pipeline, &registry).expect("high retry is advisory");
    assert!(matches!(
        typed.warnings.as_slice(),
        [CompileWarning::HighRetryCount { value: 25, .. }]
    ));
}

#[test]
fn arity_mismatch_is_reported() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .assign("sum", call("stdlib.math.add", [lit_int(1)]))
        .build();

    let errors = check(&pipeline, &registry).expect_err("add takes two arguments");
    assert!(errors[0].to_string().contains("2 argument"));
}

#[test]
fn aliased_namespace_resolves_calls() {
    let registry = registry_with_stdlib();
    register_name_of(&registry);

    let pipeline = PipelineBuilder::new()
        .use_alias("misc", "stdlib.misc")
        .input(
            "u",
            te_record([("name", te_named("String")), ("age", te_named("Int"))]),
        )
        .assign("n", call("misc.name_of", [var("u")]))
        .output("n")
        .build();

    let typed = check(&pipeline, &registry).expect("alias resolves");
    assert_eq!(assignment_type(&typed, "n"), Type::String);
}

#[test]
fn typed_declarations_mirror_the_source() {
    let registry = registry_with_stdlib();
    let pipeline = PipelineBuilder::new()
        .input("x", te_named("Int"))
        .assign("y", var("x"))
        .output("y")
        .build();

    let typed = check(&pipeline, &registry).expect("checks");
    assert_eq!(typed.declarations.len(), 3);
    assert!(matches!(
        typed.declarations[0],
        TypedDeclaration::InputDecl { .. }
    ));
    assert!(matches!(
        typed.declarations[2],
        TypedDeclaration::OutputDecl { .. }
    ));
}
