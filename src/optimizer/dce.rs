//! Dead code elimination.
//!
//! The roots are the nodes bound to declared outputs; everything
//! reachable from a root through dependency edges survives, everything
//! else is removed. The input list and the variable-binding map are
//! pruned to the survivors, so the program stays well-formed.

use crate::ir::{NodeId, Program};
use std::collections::HashSet;

pub(crate) fn run(program: &Program) -> (Program, usize) {
    let mut reachable: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<NodeId> = program
        .output_nodes()
        .into_iter()
        .map(|(_, id)| id)
        .collect();

    while let Some(id) = stack.pop() {
        if !reachable.insert(id) {
            continue;
        }
        if let Some(node) = program.node(id) {
            stack.extend(
                node.dependencies()
                    .into_iter()
                    .filter(|dep| !reachable.contains(dep)),
            );
        }
    }

    let mut out = program.clone();
    let before = out.node_count();
    out.nodes.retain(|id, _| reachable.contains(id));
    out.inputs.retain(|id| reachable.contains(id));
    out.variable_bindings.retain(|_, id| reachable.contains(id));
    let removed = before - out.node_count();

    (out, removed)
}
