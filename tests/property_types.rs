//! Property-based tests (proptest).
//!
//! The universal invariants of the subtyping lattice, union construction,
//! row substitution, and the optimizer driver.

use proptest::prelude::*;

use constellation::ast::builders::*;
use constellation::ast::{ArithOp, Expression};
use constellation::ir::Node;
use constellation::types::{
    subtype::{glb, is_subtype, lub},
    RowVarId, Substitution, Type,
};
use constellation::{check, lower, optimize, stdlib_signatures, FunctionRegistry, OptimizeConfig};

// ============================================================================
// Strategies
// ============================================================================

/// Concrete types: everything except open records and row variables,
/// which only occur at signature sites.
fn arb_type() -> impl Strategy<Value = Type> {
    let leaf = prop_oneof![
        Just(Type::String),
        Just(Type::Int),
        Just(Type::Float),
        Just(Type::Boolean),
        Just(Type::Nothing),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(Type::list),
            inner.clone().prop_map(Type::optional),
            (inner.clone(), inner.clone()).prop_map(|(k, v)| Type::map(k, v)),
            prop::collection::btree_map("[a-d]", inner.clone(), 0..4).prop_map(Type::Record),
            prop::collection::vec(inner.clone(), 2..4).prop_map(Type::union),
            (prop::collection::vec(inner.clone(), 0..3), inner)
                .prop_map(|(params, ret)| Type::function(params, ret)),
        ]
    })
}

/// Small arithmetic expression trees over integer literals. Leaf values
/// and depth are bounded so evaluation never overflows.
#[derive(Debug, Clone)]
enum ArithTree {
    Lit(i64),
    Bin(ArithOp, Box<ArithTree>, Box<ArithTree>),
}

fn arb_arith_tree() -> impl Strategy<Value = ArithTree> {
    let leaf = (-50i64..50).prop_map(ArithTree::Lit);
    leaf.prop_recursive(3, 16, 2, |inner| {
        (
            prop_oneof![Just(ArithOp::Add), Just(ArithOp::Sub), Just(ArithOp::Mul)],
            inner.clone(),
            inner,
        )
            .prop_map(|(op, left, right)| ArithTree::Bin(op, Box::new(left), Box::new(right)))
    })
}

impl ArithTree {
    fn to_expression(&self) -> Expression {
        match self {
            ArithTree::Lit(value) => lit_int(*value),
            ArithTree::Bin(op, left, right) => {
                arith(left.to_expression(), *op, right.to_expression())
            }
        }
    }

    fn eval(&self) -> i64 {
        match self {
            ArithTree::Lit(value) => *value,
            ArithTree::Bin(op, left, right) => {
                let (l, r) = (left.eval(), right.eval());
                match op {
                    ArithOp::Add => l + r,
                    ArithOp::Sub => l - r,
                    ArithOp::Mul => l * r,
                    ArithOp::Div => l / r,
                    ArithOp::Mod => l % r,
                }
            }
        }
    }
}

// ============================================================================
// Lattice properties
// ============================================================================

proptest! {
    #[test]
    fn subtyping_is_reflexive(ty in arb_type()) {
        prop_assert!(is_subtype(&ty, &ty));
    }

    #[test]
    fn lub_is_an_upper_bound(a in arb_type(), b in arb_type()) {
        let join = lub(&a, &b);
        prop_assert!(is_subtype(&a, &join), "{a} </: lub = {join}");
        prop_assert!(is_subtype(&b, &join), "{b} </: lub = {join}");
    }

    #[test]
    fn glb_is_a_lower_bound(a in arb_type(), b in arb_type()) {
        let meet = glb(&a, &b);
        prop_assert!(is_subtype(&meet, &a), "glb = {meet} </: {a}");
        prop_assert!(is_subtype(&meet, &b), "glb = {meet} </: {b}");
    }

    #[test]
    fn wider_records_subtype_narrower_ones(
        base in prop::collection::btree_map("[a-d]", arb_type(), 1..4),
        extra in prop::collection::btree_map("[e-h]", arb_type(), 1..3),
    ) {
        let narrow = Type::Record(base.clone());
        let mut wide_fields = base;
        wide_fields.extend(extra);
        let wide = Type::Record(wide_fields);
        prop_assert!(is_subtype(&wide, &narrow));
    }

    #[test]
    fn constructed_unions_are_flat_and_never_small(
        members in prop::collection::vec(arb_type(), 0..6)
    ) {
        match Type::union(members) {
            Type::Union(flattened) => {
                prop_assert!(flattened.len() >= 2);
                prop_assert!(flattened.iter().all(|m| !matches!(m, Type::Union(_))));
            }
            // Collapsed to a single member (or Nothing): fine
            _ => {}
        }
    }

    #[test]
    fn row_substitution_is_idempotent(
        fields in prop::collection::btree_map("[a-d]", arb_type(), 0..4),
        image in prop::collection::btree_map("[e-h]", arb_type(), 0..4),
    ) {
        // The image is ground (no row variables), so the precondition of
        // idempotence holds
        let row = RowVarId(7);
        let subst = Substitution::singleton(row, Type::Record(image));
        let ty = Type::list(Type::OpenRecord(fields, row));

        let once = subst.apply(&ty);
        let twice = subst.apply(&once);
        prop_assert_eq!(once, twice);
    }
}

// ============================================================================
// Optimizer properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn folding_agrees_with_evaluation(tree in arb_arith_tree()) {
        let registry = FunctionRegistry::new();
        registry.register_all(stdlib_signatures());

        let pipeline = PipelineBuilder::new()
            .assign("r", tree.to_expression())
            .output("r")
            .build();
        let typed = check(&pipeline, &registry).expect("arithmetic checks");
        let program = lower(&typed).expect("arithmetic lowers");

        let (optimized, _) = optimize(program, &OptimizeConfig::default());

        prop_assert_eq!(optimized.node_count(), 1, "whole tree folds to one literal");
        let (_, root) = optimized.output_nodes().pop().expect("output bound");
        match optimized.node(root) {
            Some(Node::Literal { value: constellation::ast::Literal::Int(folded), .. }) => {
                prop_assert_eq!(*folded, tree.eval());
            }
            other => prop_assert!(false, "expected a literal, got {other:?}"),
        }
    }

    #[test]
    fn optimizer_preserves_outputs_under_every_config(
        tree in arb_arith_tree(),
        constant_folding in any::<bool>(),
        cse in any::<bool>(),
        dce in any::<bool>(),
        max_iterations in 0usize..4,
    ) {
        let registry = FunctionRegistry::new();
        registry.register_all(stdlib_signatures());

        let pipeline = PipelineBuilder::new()
            .assign("r", tree.to_expression())
            .output("r")
            .build();
        let typed = check(&pipeline, &registry).expect("arithmetic checks");
        let program = lower(&typed).expect("arithmetic lowers");

        let config = OptimizeConfig { constant_folding, cse, dce, max_iterations };
        let (optimized, stats) = optimize(program, &config);

        prop_assert_eq!(&optimized.declared_outputs, &vec!["r".to_string()]);
        prop_assert_eq!(optimized.output_nodes().len(), 1, "output stays bound");
        prop_assert!(optimized.validate().is_ok());
        prop_assert!(stats.nodes_after <= stats.nodes_before);
    }

    #[test]
    fn optimizer_output_is_a_fixpoint(tree in arb_arith_tree()) {
        let registry = FunctionRegistry::new();
        registry.register_all(stdlib_signatures());

        let pipeline = PipelineBuilder::new()
            .assign("r", tree.to_expression())
            .output("r")
            .build();
        let typed = check(&pipeline, &registry).expect("arithmetic checks");
        let program = lower(&typed).expect("arithmetic lowers");

        let (once, _) = optimize(program, &OptimizeConfig::default());
        let (twice, _) = optimize(once.clone(), &OptimizeConfig::default());
        prop_assert_eq!(once, twice);
    }
}
