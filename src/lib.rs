//! # Constellation Compiler Core
//!
//! Turns the declarative Constellation pipeline language into a typed,
//! optimized intermediate representation for execution on a DAG runtime.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! Pipeline AST (from parser)
//!     ↓
//! [Bidirectional Checker]   → TypedPipeline   (consults FunctionRegistry,
//!     ↓                                        subtyping lattice, row unifier)
//! [IR Builder]              → Program (DAG IR)
//!     ↓
//! [Optimizer]               → Optimized Program + stats
//!     ↓
//! DAG runtime (external)
//! ```
//!
//! The surface parser and the DAG runtime are external collaborators: the
//! parser hands in the [`ast::Pipeline`], the runtime consumes the
//! [`ir::Program`] and the [`types::RuntimeType`] mirror.
//!
//! ## Usage
//!
//! ```rust
//! use constellation::ast::builders::*;
//! use constellation::{check, lower, optimize, FunctionRegistry, OptimizeConfig};
//!
//! let registry = FunctionRegistry::new();
//! registry.register_all(constellation::stdlib_signatures());
//!
//! let pipeline = PipelineBuilder::new()
//!     .input("x", te_named("Int"))
//!     .assign("y", arith(var("x"), constellation::ast::ArithOp::Add, lit_int(1)))
//!     .output("y")
//!     .build();
//!
//! let typed = check(&pipeline, &registry).expect("pipeline checks");
//! let program = lower(&typed).expect("pipeline lowers");
//! let (optimized, stats) = optimize(program, &OptimizeConfig::default());
//! assert_eq!(optimized.declared_outputs, vec!["y".to_string()]);
//! assert!(stats.nodes_after <= stats.nodes_before);
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `ast` | Untyped AST consumed from the parser, plus builders |
//! | `types` | Semantic types, subtyping lattice, row unifier, runtime mirror |
//! | `registry` | Function signatures with namespace resolution |
//! | `checker` | Bidirectional type checker |
//! | `typed` | Typed AST handed to the lowerer |
//! | `ir` | DAG intermediate representation |
//! | `ir_builder` | TypedPipeline → IR lowering |
//! | `optimizer` | Constant folding, CSE, DCE to fixpoint |
//! | `error` | Compile error and warning taxonomy |

pub mod ast;
pub mod checker;
pub mod error;
pub mod ir;
pub mod ir_builder;
pub mod optimizer;
pub mod registry;
pub mod typed;
pub mod types;

pub use checker::check;
pub use error::{CompileError, CompileWarning};
pub use ir::{Node, NodeId, Program};
pub use ir_builder::{lower, LoweringError};
pub use optimizer::{optimize, OptimizeConfig, OptimizeStats};
pub use registry::{stdlib_signatures, FunctionRegistry, FunctionSignature, NamespaceScope};
pub use typed::TypedPipeline;
pub use types::Type;

use thiserror::Error;

/// Why an end-to-end [`compile`] run failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileFailure {
    /// The checker rejected the pipeline
    #[error("type checking failed with {} error(s)", .0.len())]
    Check(Vec<CompileError>),
    /// The checker accepted a pipeline the lowerer could not consume;
    /// this indicates a compiler bug, not bad input
    #[error("lowering failed: {0}")]
    Lowering(#[from] LoweringError),
}

/// A fully compiled pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPipeline {
    pub typed: TypedPipeline,
    pub program: Program,
    pub stats: OptimizeStats,
}

/// Convenience driver: check, lower, and optimize in one call.
pub fn compile(
    pipeline: &ast::Pipeline,
    registry: &FunctionRegistry,
    config: &OptimizeConfig,
) -> Result<CompiledPipeline, CompileFailure> {
    let typed = check(pipeline, registry).map_err(CompileFailure::Check)?;
    let program = lower(&typed)?;
    let (program, stats) = optimize(program, config);
    Ok(CompiledPipeline {
        typed,
        program,
        stats,
    })
}
