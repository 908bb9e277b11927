//! Constant folding.
//!
//! Evaluates, in place, nodes whose operands are all literal: the
//! stdlib arithmetic and string builtins, the boolean connectives,
//! fully-literal string interpolations, and conditionals with a literal
//! condition. Division and modulo by zero are never folded, preserving
//! the runtime's fault behavior; arithmetic that would overflow is left
//! alone for the same reason.
//!
//! Folding rewrites a node under its existing id, so references stay
//! valid; operand literals that become unreferenced are swept by DCE.

use crate::ast::Literal;
use crate::ir::{CallMeta, InterpolationPart, Node, NodeId, Program};
use crate::types::Type;

pub(crate) fn run(program: &Program) -> (Program, usize) {
    let mut out = program.clone();
    let mut folded = 0;

    // Topological order lets a fold feed later folds in the same pass
    for id in out.topological_order() {
        let Some(node) = out.nodes.get(&id) else {
            continue;
        };
        let replacement = match node {
            // Calls with a fallback or execution metadata keep their
            // runtime behavior; only bare pure calls fold
            Node::ModuleCall {
                module,
                args,
                fallback: None,
                meta,
                ..
            } if *meta == CallMeta::default() => fold_call(&out, module, args),

            Node::And { left, right } => {
                fold_bool2(&out, *left, *right, |a, b| a && b)
            }
            Node::Or { left, right } => fold_bool2(&out, *left, *right, |a, b| a || b),
            Node::Not { operand } => match literal_of(&out, *operand) {
                Some(Literal::Boolean(value)) => Some(boolean(!value)),
                _ => None,
            },

            Node::StringInterpolation { parts } => fold_interpolation(&out, parts),

            Node::Conditional {
                condition,
                then_branch,
                else_branch,
                ..
            } => match literal_of(&out, *condition) {
                // Replace with a copy of the chosen branch; CSE merges
                // the copy back into its original
                Some(Literal::Boolean(true)) => out.nodes.get(then_branch).cloned(),
                Some(Literal::Boolean(false)) => out.nodes.get(else_branch).cloned(),
                _ => None,
            },

            _ => None,
        };

        if let Some(new_node) = replacement {
            out.nodes.insert(id, new_node);
            folded += 1;
        }
    }

    (out, folded)
}

fn literal_of(program: &Program, id: NodeId) -> Option<&Literal> {
    match program.node(id) {
        Some(Node::Literal { value, .. }) => Some(value),
        _ => None,
    }
}

fn boolean(value: bool) -> Node {
    Node::Literal {
        value: Literal::Boolean(value),
        ty: Type::Boolean,
    }
}

fn fold_bool2(
    program: &Program,
    left: NodeId,
    right: NodeId,
    op: impl Fn(bool, bool) -> bool,
) -> Option<Node> {
    match (literal_of(program, left), literal_of(program, right)) {
        (Some(Literal::Boolean(a)), Some(Literal::Boolean(b))) => Some(boolean(op(*a, *b))),
        _ => None,
    }
}

fn fold_interpolation(program: &Program, parts: &[InterpolationPart]) -> Option<Node> {
    let mut rendered = String::new();
    for part in parts {
        match part {
            InterpolationPart::Text(text) => rendered.push_str(text),
            InterpolationPart::Node(id) => rendered.push_str(&literal_text(literal_of(program, *id)?)),
        }
    }
    Some(Node::Literal {
        value: Literal::String(rendered),
        ty: Type::String,
    })
}

/// Render a literal the way the runtime interpolates it (no quotes
/// around strings).
fn literal_text(literal: &Literal) -> String {
    match literal {
        Literal::Int(value) => value.to_string(),
        Literal::Float(value) => value.to_string(),
        Literal::String(value) => value.clone(),
        Literal::Boolean(value) => value.to_string(),
    }
}

fn fold_call(program: &Program, module: &str, args: &[NodeId]) -> Option<Node> {
    let literals: Option<Vec<&Literal>> =
        args.iter().map(|id| literal_of(program, *id)).collect();
    let literals = literals?;

    match module {
        "stdlib.math.add" | "add" => fold_numeric(&literals, i64::checked_add, |a, b| a + b),
        "stdlib.math.subtract" | "subtract" => {
            fold_numeric(&literals, i64::checked_sub, |a, b| a - b)
        }
        "stdlib.math.multiply" | "multiply" => {
            fold_numeric(&literals, i64::checked_mul, |a, b| a * b)
        }
        "stdlib.math.divide" | "divide" => {
            if divides_by_zero(&literals) {
                return None;
            }
            fold_numeric(&literals, i64::checked_div, |a, b| a / b)
        }
        "stdlib.math.modulo" | "modulo" => {
            if divides_by_zero(&literals) {
                return None;
            }
            fold_numeric(&literals, i64::checked_rem, |a, b| a % b)
        }
        "stdlib.string.concat" | "concat" => match literals.as_slice() {
            [Literal::String(a), Literal::String(b)] => Some(Node::Literal {
                value: Literal::String(format!("{a}{b}")),
                ty: Type::String,
            }),
            _ => None,
        },
        _ => None,
    }
}

fn divides_by_zero(literals: &[&Literal]) -> bool {
    match literals {
        [_, Literal::Int(0)] => true,
        [_, Literal::Float(divisor)] => *divisor == 0.0,
        _ => false,
    }
}

fn fold_numeric(
    literals: &[&Literal],
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Option<Node> {
    match literals {
        [Literal::Int(a), Literal::Int(b)] => int_op(*a, *b).map(|value| Node::Literal {
            value: Literal::Int(value),
            ty: Type::Int,
        }),
        [Literal::Float(a), Literal::Float(b)] => Some(Node::Literal {
            value: Literal::Float(float_op(*a, *b)),
            ty: Type::Float,
        }),
        _ => None,
    }
}
