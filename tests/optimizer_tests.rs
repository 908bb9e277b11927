//! Optimizer integration tests
//!
//! Exercises the three passes and the fixpoint driver over hand-built IR
//! programs.

use constellation::ast::Literal;
use constellation::ir::{CallMeta, InterpolationPart, Node, NodeId, Program};
use constellation::optimizer::{optimize, OptimizeConfig};
use constellation::types::Type;

fn literal_int(value: i64) -> Node {
    Node::Literal {
        value: Literal::Int(value),
        ty: Type::Int,
    }
}

fn math_call(module: &str, args: Vec<NodeId>) -> Node {
    Node::ModuleCall {
        module: module.to_string(),
        args,
        fallback: None,
        meta: CallMeta::default(),
        ty: Type::Int,
    }
}

fn bind_output(program: &mut Program, name: &str, node: NodeId) {
    program.variable_bindings.insert(name.to_string(), node);
    program.declared_outputs.push(name.to_string());
}

/// add(mul(2, 3), 4) over literals
fn arithmetic_program() -> Program {
    let mut program = Program::new();
    let two = program.insert(literal_int(2));
    let three = program.insert(literal_int(3));
    let product = program.insert(math_call("stdlib.math.multiply", vec![two, three]));
    let four = program.insert(literal_int(4));
    let sum = program.insert(math_call("stdlib.math.add", vec![product, four]));
    bind_output(&mut program, "result", sum);
    program
}

#[test]
fn constant_folding_collapses_arithmetic_to_one_literal() {
    let program = arithmetic_program();
    assert_eq!(program.node_count(), 5);

    let (optimized, stats) = optimize(program, &OptimizeConfig::default());

    assert_eq!(optimized.node_count(), 1, "only the folded literal survives");
    let (_, result) = optimized.output_nodes().pop().expect("output bound");
    match optimized.node(result) {
        Some(Node::Literal {
            value: Literal::Int(10),
            ..
        }) => {}
        other => panic!("expected Literal(10), got {other:?}"),
    }
    assert!(stats.nodes_before - stats.nodes_after >= 4);
    assert!(stats.constants_folded >= 2);
    assert!(optimized.validate().is_ok());
}

#[test]
fn division_by_zero_is_never_folded() {
    let mut program = Program::new();
    let one = program.insert(literal_int(1));
    let zero = program.insert(literal_int(0));
    let quotient = program.insert(math_call("stdlib.math.divide", vec![one, zero]));
    bind_output(&mut program, "q", quotient);

    let (optimized, stats) = optimize(program, &OptimizeConfig::default());

    let (_, result) = optimized.output_nodes().pop().expect("output bound");
    assert!(
        matches!(optimized.node(result), Some(Node::ModuleCall { .. })),
        "the faulting division must reach the runtime"
    );
    assert_eq!(stats.constants_folded, 0);
}

#[test]
fn modulo_by_zero_is_never_folded() {
    let mut program = Program::new();
    let seven = program.insert(literal_int(7));
    let zero = program.insert(literal_int(0));
    let rem = program.insert(math_call("stdlib.math.modulo", vec![seven, zero]));
    bind_output(&mut program, "r", rem);

    let (optimized, _) = optimize(program, &OptimizeConfig::default());
    let (_, result) = optimized.output_nodes().pop().expect("output bound");
    assert!(matches!(
        optimized.node(result),
        Some(Node::ModuleCall { .. })
    ));
}

#[test]
fn boolean_connectives_fold_over_literals() {
    let mut program = Program::new();
    let yes = program.insert(Node::Literal {
        value: Literal::Boolean(true),
        ty: Type::Boolean,
    });
    let no = program.insert(Node::Literal {
        value: Literal::Boolean(false),
        ty: Type::Boolean,
    });
    let conj = program.insert(Node::And {
        left: yes,
        right: no,
    });
    let negated = program.insert(Node::Not { operand: conj });
    bind_output(&mut program, "v", negated);

    let (optimized, _) = optimize(program, &OptimizeConfig::default());

    let (_, result) = optimized.output_nodes().pop().expect("output bound");
    match optimized.node(result) {
        Some(Node::Literal {
            value: Literal::Boolean(true),
            ..
        }) => {}
        other => panic!("expected Literal(true), got {other:?}"),
    }
}

#[test]
fn literal_condition_selects_a_branch() {
    let mut program = Program::new();
    let flag = program.insert(Node::Literal {
        value: Literal::Boolean(false),
        ty: Type::Boolean,
    });
    let then_branch = program.insert(literal_int(1));
    let else_branch = program.insert(literal_int(2));
    let conditional = program.insert(Node::Conditional {
        condition: flag,
        then_branch,
        else_branch,
        ty: Type::Int,
    });
    bind_output(&mut program, "picked", conditional);

    let (optimized, _) = optimize(program, &OptimizeConfig::default());

    let (_, result) = optimized.output_nodes().pop().expect("output bound");
    match optimized.node(result) {
        Some(Node::Literal {
            value: Literal::Int(2),
            ..
        }) => {}
        other => panic!("expected the else branch, got {other:?}"),
    }
    assert_eq!(optimized.node_count(), 1);
}

#[test]
fn fully_literal_interpolation_folds_to_a_string() {
    let mut program = Program::new();
    let count = program.insert(literal_int(3));
    let greeting = program.insert(Node::StringInterpolation {
        parts: vec![
            InterpolationPart::Text("found ".to_string()),
            InterpolationPart::Node(count),
            InterpolationPart::Text(" items".to_string()),
        ],
    });
    bind_output(&mut program, "msg", greeting);

    let (optimized, _) = optimize(program, &OptimizeConfig::default());

    let (_, result) = optimized.output_nodes().pop().expect("output bound");
    match optimized.node(result) {
        Some(Node::Literal {
            value: Literal::String(text),
            ..
        }) => assert_eq!(text, "found 3 items"),
        other => panic!("expected a folded string, got {other:?}"),
    }
}

// ============================================================================
// CSE
// ============================================================================

#[test]
fn identical_calls_on_the_same_inputs_merge() {
    let mut program = Program::new();
    let x = program.insert(Node::Input {
        name: "x".to_string(),
        ty: Type::Int,
    });
    let y = program.insert(Node::Input {
        name: "y".to_string(),
        ty: Type::Int,
    });
    program.inputs.extend([x, y]);
    let first = program.insert(math_call("stdlib.math.subtract", vec![x, y]));
    let second = program.insert(math_call("stdlib.math.subtract", vec![x, y]));
    bind_output(&mut program, "a", first);
    bind_output(&mut program, "b", second);

    let config = OptimizeConfig {
        constant_folding: false,
        dce: false,
        ..OptimizeConfig::default()
    };
    let (optimized, stats) = optimize(program, &config);

    assert_eq!(stats.subexpressions_merged, 1);
    let bound: Vec<NodeId> = optimized
        .output_nodes()
        .into_iter()
        .map(|(_, id)| id)
        .collect();
    assert_eq!(bound[0], bound[1], "both outputs share the representative");
    assert!(optimized.validate().is_ok());
}

#[test]
fn addition_is_commutative_for_cse() {
    let mut program = Program::new();
    let x = program.insert(Node::Input {
        name: "x".to_string(),
        ty: Type::Int,
    });
    let y = program.insert(Node::Input {
        name: "y".to_string(),
        ty: Type::Int,
    });
    program.inputs.extend([x, y]);
    let forward = program.insert(math_call("stdlib.math.add", vec![x, y]));
    let reversed = program.insert(math_call("stdlib.math.add", vec![y, x]));
    bind_output(&mut program, "a", forward);
    bind_output(&mut program, "b", reversed);

    let (optimized, stats) = optimize(program, &OptimizeConfig::default());

    assert_eq!(stats.subexpressions_merged, 1);
    let bound: Vec<NodeId> = optimized
        .output_nodes()
        .into_iter()
        .map(|(_, id)| id)
        .collect();
    assert_eq!(bound[0], bound[1]);
}

#[test]
fn subtraction_is_not_commutative_for_cse() {
    let mut program = Program::new();
    let x = program.insert(Node::Input {
        name: "x".to_string(),
        ty: Type::Int,
    });
    let y = program.insert(Node::Input {
        name: "y".to_string(),
        ty: Type::Int,
    });
    program.inputs.extend([x, y]);
    let forward = program.insert(math_call("stdlib.math.subtract", vec![x, y]));
    let reversed = program.insert(math_call("stdlib.math.subtract", vec![y, x]));
    bind_output(&mut program, "a", forward);
    bind_output(&mut program, "b", reversed);

    let (optimized, stats) = optimize(program, &OptimizeConfig::default());

    assert_eq!(stats.subexpressions_merged, 0);
    let bound: Vec<NodeId> = optimized
        .output_nodes()
        .into_iter()
        .map(|(_, id)| id)
        .collect();
    assert_ne!(bound[0], bound[1], "x - y and y - x stay distinct");
}

#[test]
fn duplicate_subtrees_collapse_in_one_pass() {
    // Two copies of add(x, 1): the literal merges first, then the calls
    let mut program = Program::new();
    let x = program.insert(Node::Input {
        name: "x".to_string(),
        ty: Type::Int,
    });
    program.inputs.push(x);
    let one_a = program.insert(literal_int(1));
    let one_b = program.insert(literal_int(1));
    let sum_a = program.insert(math_call("stdlib.math.add", vec![x, one_a]));
    let sum_b = program.insert(math_call("stdlib.math.add", vec![x, one_b]));
    bind_output(&mut program, "a", sum_a);
    bind_output(&mut program, "b", sum_b);

    let (optimized, stats) = optimize(program, &OptimizeConfig::default());

    // input + one literal + one call
    assert_eq!(optimized.node_count(), 3);
    assert_eq!(stats.subexpressions_merged, 2);
}

// ============================================================================
// DCE
// ============================================================================

#[test]
fn unreferenced_nodes_are_swept() {
    let mut program = Program::new();
    let x = program.insert(Node::Input {
        name: "x".to_string(),
        ty: Type::Int,
    });
    program.inputs.push(x);
    let dead = program.insert(literal_int(99));
    let _ = dead;
    bind_output(&mut program, "out", x);

    let (optimized, stats) = optimize(program, &OptimizeConfig::default());

    assert_eq!(optimized.node_count(), 1);
    assert_eq!(stats.nodes_eliminated, 1);
    assert_eq!(optimized.declared_outputs, vec!["out".to_string()]);
}

#[test]
fn every_config_preserves_declared_outputs() {
    let configs = [
        OptimizeConfig::default(),
        OptimizeConfig {
            constant_folding: false,
            ..OptimizeConfig::default()
        },
        OptimizeConfig {
            cse: false,
            ..OptimizeConfig::default()
        },
        OptimizeConfig {
            dce: false,
            ..OptimizeConfig::default()
        },
        OptimizeConfig {
            max_iterations: 1,
            ..OptimizeConfig::default()
        },
    ];

    for config in configs {
        let (optimized, _) = optimize(arithmetic_program(), &config);
        assert_eq!(optimized.declared_outputs, vec!["result".to_string()]);
        let bound = optimized.output_nodes();
        assert_eq!(bound.len(), 1, "output stays bound under {config:?}");
        assert!(optimized.validate().is_ok());
    }
}

// ============================================================================
// Driver
// ============================================================================

#[test]
fn zero_iterations_disable_optimization() {
    let program = arithmetic_program();
    let config = OptimizeConfig {
        max_iterations: 0,
        ..OptimizeConfig::default()
    };

    let (optimized, stats) = optimize(program.clone(), &config);

    assert_eq!(optimized, program);
    assert_eq!(stats.iterations, 0);
    assert!(stats.passes_applied.is_empty());
}

#[test]
fn optimizing_twice_is_a_fixpoint() {
    let (once, _) = optimize(arithmetic_program(), &OptimizeConfig::default());
    let (twice, stats) = optimize(once.clone(), &OptimizeConfig::default());

    assert_eq!(once, twice, "a second run must change nothing");
    assert_eq!(stats.nodes_before, stats.nodes_after);
}

#[test]
fn stats_report_the_elimination_percentage() {
    let (_, stats) = optimize(arithmetic_program(), &OptimizeConfig::default());
    assert_eq!(stats.nodes_before, 5);
    assert_eq!(stats.nodes_after, 1);
    assert!((stats.elimination_percentage() - 80.0).abs() < f64::EPSILON);
    assert_eq!(
        stats.passes_applied,
        vec!["constant_folding", "cse", "dce"]
    );
}
