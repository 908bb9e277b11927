//! Common subexpression elimination.
//!
//! Two nodes are equivalent when they share the same variant, the same
//! operator/module name, the same dependency-id list (the id *set* for
//! the commutative add/multiply/merge), the same literal value, and the
//! same output type. One representative per equivalence class survives;
//! every other reference is rewritten to the representative.
//!
//! Processing in topological order rewrites each node's dependencies
//! before its own key is computed, so chains of duplicate subtrees
//! collapse in a single pass. Module calls key on identical argument
//! identities, which keeps effectful calls with distinct inputs apart;
//! `Input` and `LambdaParam` nodes are identity nodes and never merge.

use crate::ir::{Node, NodeId, Program};
use std::collections::HashMap;

pub(crate) fn run(program: &Program) -> (Program, usize) {
    let mut out = program.clone();
    let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
    let mut representatives: HashMap<String, NodeId> = HashMap::new();

    for id in out.topological_order() {
        let Some(mut node) = out.nodes.get(&id).cloned() else {
            continue;
        };
        node.remap_dependencies(&remap);
        out.nodes.insert(id, node.clone());

        if matches!(node, Node::Input { .. } | Node::LambdaParam { .. }) {
            continue;
        }

        let key = equivalence_key(&node);
        match representatives.get(&key) {
            Some(representative) => {
                remap.insert(id, *representative);
            }
            None => {
                representatives.insert(key, id);
            }
        }
    }

    let merged = remap.len();
    for id in remap.keys() {
        out.nodes.remove(id);
    }
    for binding in out.variable_bindings.values_mut() {
        if let Some(representative) = remap.get(binding) {
            *binding = *representative;
        }
    }

    (out, merged)
}

/// Subtraction and division stay ordered; only add, multiply, and merge
/// key on the sorted id set.
fn commutative_module(module: &str) -> bool {
    matches!(
        module,
        "stdlib.math.add" | "add" | "stdlib.math.multiply" | "multiply"
    )
}

fn ids(deps: &[NodeId]) -> Vec<String> {
    deps.iter().map(ToString::to_string).collect()
}

fn equivalence_key(node: &Node) -> String {
    match node {
        Node::ModuleCall {
            module,
            args,
            fallback,
            meta,
            ty,
        } => {
            let mut arg_ids = ids(args);
            if commutative_module(module) {
                arg_ids.sort();
            }
            let fallback = fallback.map(|id| id.to_string());
            format!("call|{module}|{arg_ids:?}|{fallback:?}|{meta:?}|{ty}")
        }
        Node::Literal { value, ty } => format!("literal|{value:?}|{ty}"),
        Node::Merge { left, right, ty } => {
            let mut pair = [left.to_string(), right.to_string()];
            pair.sort();
            format!("merge|{pair:?}|{ty}")
        }
        Node::Project { source, fields, ty } => {
            format!("project|{source}|{fields:?}|{ty}")
        }
        Node::FieldAccess { source, field, ty } => {
            format!("field|{source}|{field}|{ty}")
        }
        Node::Conditional {
            condition,
            then_branch,
            else_branch,
            ty,
        } => format!("conditional|{condition}|{then_branch}|{else_branch}|{ty}"),
        Node::And { left, right } => format!("and|{left}|{right}"),
        Node::Or { left, right } => format!("or|{left}|{right}"),
        Node::Not { operand } => format!("not|{operand}"),
        Node::Guard {
            value,
            condition,
            ty,
        } => format!("guard|{value}|{condition}|{ty}"),
        Node::Coalesce { left, right, ty } => format!("coalesce|{left}|{right}|{ty}"),
        Node::Branch {
            cases, otherwise, ..
        } => {
            let case_ids: Vec<String> = cases
                .iter()
                .map(|(condition, body)| format!("{condition}->{body}"))
                .collect();
            format!("branch|{case_ids:?}|{otherwise}")
        }
        Node::StringInterpolation { parts } => format!("interp|{parts:?}"),
        Node::HigherOrder {
            kind,
            source,
            binder,
            body,
            ty,
        } => format!("ho|{}|{source}|{binder}|{body}|{ty}", kind.as_str()),
        Node::ListLiteral { elements, ty } => format!("list|{:?}|{ty}", ids(elements)),
        // Identity nodes are filtered before key computation
        Node::Input { name, ty } => format!("input|{name}|{ty}"),
        Node::LambdaParam { name, ty } => format!("param|{name}|{ty}"),
    }
}
