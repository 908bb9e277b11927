//! # IR Optimizer
//!
//! Pass driver over the lowered DAG, applied to fixpoint:
//!
//! - Constant folding: evaluate well-known builtins over literal operands
//! - CSE: merge structurally identical nodes
//! - DCE: drop nodes unreachable from the declared outputs
//!
//! ```text
//! Program (from IR Builder) -> [Optimizer] -> Optimized Program + stats
//! ```
//!
//! Passes run in the order [folding, CSE, DCE] each iteration; the loop
//! stops when an iteration leaves the node count and node-id set
//! unchanged, or after `max_iterations`. Every pass returns a new
//! `Program` and preserves the driver invariants: declared outputs stay
//! bound, no dangling references, types unchanged.

mod cse;
mod dce;
mod folding;

use crate::ir::{NodeId, Program};
use std::collections::BTreeSet;
use tracing::debug;

/// Which passes run, and for how many iterations. `max_iterations: 0`
/// disables optimization entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizeConfig {
    pub constant_folding: bool,
    pub cse: bool,
    pub dce: bool,
    pub max_iterations: usize,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        OptimizeConfig {
            constant_folding: true,
            cse: true,
            dce: true,
            max_iterations: 16,
        }
    }
}

/// What the optimizer did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizeStats {
    pub nodes_before: usize,
    pub nodes_after: usize,
    /// Iterations actually run (not counting the unchanged final one)
    pub iterations: usize,
    /// Pass names in first-application order
    pub passes_applied: Vec<String>,
    pub constants_folded: usize,
    pub subexpressions_merged: usize,
    pub nodes_eliminated: usize,
}

impl OptimizeStats {
    /// Share of nodes removed, in percent.
    pub fn elimination_percentage(&self) -> f64 {
        if self.nodes_before == 0 {
            return 0.0;
        }
        let removed = self.nodes_before.saturating_sub(self.nodes_after);
        removed as f64 * 100.0 / self.nodes_before as f64
    }
}

/// Optimize a program under the given configuration.
pub fn optimize(program: Program, config: &OptimizeConfig) -> (Program, OptimizeStats) {
    let mut stats = OptimizeStats {
        nodes_before: program.node_count(),
        nodes_after: program.node_count(),
        ..OptimizeStats::default()
    };
    if config.max_iterations == 0 {
        return (program, stats);
    }

    let mut current = program;
    for iteration in 0..config.max_iterations {
        let ids_before: BTreeSet<NodeId> = current.nodes.keys().copied().collect();
        let count_before = current.node_count();

        if config.constant_folding {
            let (next, folded) = folding::run(&current);
            debug_assert!(next.validate().is_ok(), "constant folding broke the program");
            stats.constants_folded += folded;
            record_pass(&mut stats, "constant_folding");
            current = next;
        }
        if config.cse {
            let (next, merged) = cse::run(&current);
            debug_assert!(next.validate().is_ok(), "CSE broke the program");
            stats.subexpressions_merged += merged;
            record_pass(&mut stats, "cse");
            current = next;
        }
        if config.dce {
            let (next, removed) = dce::run(&current);
            debug_assert!(next.validate().is_ok(), "DCE broke the program");
            stats.nodes_eliminated += removed;
            record_pass(&mut stats, "dce");
            current = next;
        }

        let ids_after: BTreeSet<NodeId> = current.nodes.keys().copied().collect();
        if current.node_count() == count_before && ids_after == ids_before {
            debug!(iteration, "optimizer reached fixpoint");
            break;
        }
        stats.iterations = iteration + 1;
    }

    stats.nodes_after = current.node_count();
    debug!(
        nodes_before = stats.nodes_before,
        nodes_after = stats.nodes_after,
        iterations = stats.iterations,
        "optimization finished"
    );
    (current, stats)
}

fn record_pass(stats: &mut OptimizeStats, name: &str) {
    if !stats.passes_applied.iter().any(|applied| applied == name) {
        stats.passes_applied.push(name.to_string());
    }
}
