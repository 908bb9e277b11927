//! # IR Builder
//!
//! TypedPipeline → IR conversion. Walks the checked declarations in
//! source order, emits one node per typed expression, reuses bound
//! variables through the program's `variable_bindings`, and resolves
//! lambdas handed to the higher-order collection builtins into
//! [`Node::HigherOrder`] subgraphs.
//!
//! ```text
//! TypedPipeline (from Checker) -> [IR Builder] -> Program -> Optimizer
//! ```
//!
//! The checker guarantees every expression carries a final type, every
//! call a resolved signature, and every variable reference a prior
//! binding; the errors here fire only on a violated contract, never on
//! user input.

use crate::ir::{CallMeta, HigherOrderKind, InterpolationPart, Node, NodeId, Program};
use crate::typed::{TypedDeclaration, TypedExpression, TypedPipeline, TypedStringPart};
use crate::types::Type;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// A violated checker/lowerer contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoweringError {
    #[error("variable '{name}' reached lowering without a binding")]
    UnboundVariable { name: String },
    #[error("a lambda reached lowering outside a higher-order argument position")]
    LambdaOutsidePosition,
    #[error("higher-order call '{module}' requires a list argument and a one-parameter lambda")]
    MalformedHigherOrder { module: String },
    #[error("type {ty} still contains row variables after checking")]
    UnresolvedRowType { ty: String },
}

/// Lower a checked pipeline into an IR program.
pub fn lower(pipeline: &TypedPipeline) -> Result<Program, LoweringError> {
    let mut builder = IrBuilder::new();
    for decl in &pipeline.declarations {
        builder.lower_declaration(decl)?;
    }
    let program = builder.finish()?;
    debug!(
        nodes = program.node_count(),
        inputs = program.inputs.len(),
        outputs = program.declared_outputs.len(),
        "pipeline lowered"
    );
    Ok(program)
}

struct IrBuilder {
    program: Program,
    /// Lambda binder scopes, innermost last
    scopes: Vec<HashMap<String, NodeId>>,
}

impl IrBuilder {
    fn new() -> Self {
        IrBuilder {
            program: Program::new(),
            scopes: Vec::new(),
        }
    }

    fn finish(self) -> Result<Program, LoweringError> {
        // Row-typed values must never cross into the runtime DAG
        for node in self.program.nodes.values() {
            let ty = node.ty();
            if ty.has_row_vars() {
                return Err(LoweringError::UnresolvedRowType { ty: ty.to_string() });
            }
        }
        Ok(self.program)
    }

    fn lower_declaration(&mut self, decl: &TypedDeclaration) -> Result<(), LoweringError> {
        match decl {
            TypedDeclaration::InputDecl { name, ty, .. } => {
                let id = self.program.insert(Node::Input {
                    name: name.clone(),
                    ty: ty.clone(),
                });
                self.program.inputs.push(id);
                self.program.variable_bindings.insert(name.clone(), id);
                Ok(())
            }
            TypedDeclaration::Assignment { name, value, .. } => {
                let id = self.lower_expr(value)?;
                self.program.variable_bindings.insert(name.clone(), id);
                Ok(())
            }
            TypedDeclaration::OutputDecl { name, .. } => {
                self.program.declared_outputs.push(name.clone());
                Ok(())
            }
            // Types and imports are compile-time-only
            TypedDeclaration::TypeDef { .. } | TypedDeclaration::UseDecl { .. } => Ok(()),
        }
    }

    fn lower_expr(&mut self, expr: &TypedExpression) -> Result<NodeId, LoweringError> {
        match expr {
            TypedExpression::VarRef { name, .. } => self.resolve_var(name),

            TypedExpression::Literal { value, ty, .. } => Ok(self.program.insert(Node::Literal {
                value: value.clone(),
                ty: ty.clone(),
            })),

            TypedExpression::ListLit { elements, ty, .. } => {
                let lowered: Result<Vec<NodeId>, LoweringError> =
                    elements.iter().map(|element| self.lower_expr(element)).collect();
                Ok(self.program.insert(Node::ListLiteral {
                    elements: lowered?,
                    ty: ty.clone(),
                }))
            }

            TypedExpression::StringInterpolation { parts, .. } => {
                let mut lowered = Vec::with_capacity(parts.len());
                for part in parts {
                    match part {
                        TypedStringPart::Text(text) => {
                            lowered.push(InterpolationPart::Text(text.clone()));
                        }
                        TypedStringPart::Expr(inner) => {
                            lowered.push(InterpolationPart::Node(self.lower_expr(inner)?));
                        }
                    }
                }
                Ok(self
                    .program
                    .insert(Node::StringInterpolation { parts: lowered }))
            }

            TypedExpression::Merge {
                left, right, ty, ..
            } => {
                let left = self.lower_expr(left)?;
                let right = self.lower_expr(right)?;
                Ok(self.program.insert(Node::Merge {
                    left,
                    right,
                    ty: ty.clone(),
                }))
            }

            TypedExpression::Projection {
                source, fields, ty, ..
            } => {
                let source = self.lower_expr(source)?;
                Ok(self.program.insert(Node::Project {
                    source,
                    fields: fields.clone(),
                    ty: ty.clone(),
                }))
            }

            TypedExpression::FieldAccess {
                source, field, ty, ..
            } => {
                let source = self.lower_expr(source)?;
                Ok(self.program.insert(Node::FieldAccess {
                    source,
                    field: field.clone(),
                    ty: ty.clone(),
                }))
            }

            TypedExpression::Conditional {
                condition,
                then_branch,
                else_branch,
                ty,
                ..
            } => {
                let condition = self.lower_expr(condition)?;
                let then_branch = self.lower_expr(then_branch)?;
                let else_branch = self.lower_expr(else_branch)?;
                Ok(self.program.insert(Node::Conditional {
                    condition,
                    then_branch,
                    else_branch,
                    ty: ty.clone(),
                }))
            }

            TypedExpression::BoolBinary {
                left, op, right, ..
            } => {
                let left = self.lower_expr(left)?;
                let right = self.lower_expr(right)?;
                let node = match op {
                    crate::ast::BoolOp::And => Node::And { left, right },
                    crate::ast::BoolOp::Or => Node::Or { left, right },
                };
                Ok(self.program.insert(node))
            }

            TypedExpression::Not { operand, .. } => {
                let operand = self.lower_expr(operand)?;
                Ok(self.program.insert(Node::Not { operand }))
            }

            TypedExpression::Guard {
                value,
                condition,
                ty,
                ..
            } => {
                let value = self.lower_expr(value)?;
                let condition = self.lower_expr(condition)?;
                Ok(self.program.insert(Node::Guard {
                    value,
                    condition,
                    ty: ty.clone(),
                }))
            }

            TypedExpression::Coalesce {
                left, right, ty, ..
            } => {
                let left = self.lower_expr(left)?;
                let right = self.lower_expr(right)?;
                Ok(self.program.insert(Node::Coalesce {
                    left,
                    right,
                    ty: ty.clone(),
                }))
            }

            TypedExpression::Branch {
                cases,
                otherwise,
                ty,
                ..
            } => {
                let mut lowered = Vec::with_capacity(cases.len());
                for (condition, body) in cases {
                    lowered.push((self.lower_expr(condition)?, self.lower_expr(body)?));
                }
                let otherwise = self.lower_expr(otherwise)?;
                Ok(self.program.insert(Node::Branch {
                    cases: lowered,
                    otherwise,
                    ty: ty.clone(),
                }))
            }

            // Lambdas are consumed by their enclosing higher-order call;
            // one surviving to this arm means the checker let a lambda
            // escape argument position
            TypedExpression::Lambda { .. } => Err(LoweringError::LambdaOutsidePosition),

            TypedExpression::FunctionCall {
                signature,
                args,
                options,
                ty,
                ..
            } => {
                let module = signature.qualified_name();
                let higher_order = match signature.namespace.as_deref() {
                    Some("stdlib.collection") => HigherOrderKind::parse(&signature.name),
                    _ => None,
                };
                if let Some(kind) = higher_order {
                    return self.lower_higher_order(kind, &module, args, ty);
                }

                let mut lowered = Vec::with_capacity(args.len());
                for arg in args {
                    lowered.push(self.lower_expr(arg)?);
                }
                let fallback = match &options.fallback {
                    Some(expr) => Some(self.lower_expr(expr)?),
                    None => None,
                };
                Ok(self.program.insert(Node::ModuleCall {
                    module,
                    args: lowered,
                    fallback,
                    meta: CallMeta {
                        retry: options.retry,
                        concurrency: options.concurrency,
                        throttle: options.throttle,
                        timeout: options.timeout,
                        delay: options.delay,
                        cache: options.cache,
                        backoff: options.backoff,
                        cache_backend: options.cache_backend.clone(),
                    },
                    ty: ty.clone(),
                }))
            }
        }
    }

    /// Lower `filter(xs, (x) => ...)` and friends: the source list, a
    /// binder node for the lambda parameter, and the body lowered with
    /// the binder in scope.
    fn lower_higher_order(
        &mut self,
        kind: HigherOrderKind,
        module: &str,
        args: &[TypedExpression],
        ty: &Type,
    ) -> Result<NodeId, LoweringError> {
        let malformed = || LoweringError::MalformedHigherOrder {
            module: module.to_string(),
        };
        let (source_expr, lambda) = match args {
            [source, lambda @ TypedExpression::Lambda { .. }] => (source, lambda),
            _ => return Err(malformed()),
        };
        let (params, body) = match lambda {
            TypedExpression::Lambda { params, body, .. } => (params, body),
            _ => return Err(malformed()),
        };
        let [(param_name, param_ty)] = params.as_slice() else {
            return Err(malformed());
        };

        let source = self.lower_expr(source_expr)?;
        let binder = self.program.insert(Node::LambdaParam {
            name: param_name.clone(),
            ty: param_ty.clone(),
        });

        self.scopes
            .push(HashMap::from([(param_name.clone(), binder)]));
        let body = self.lower_expr(body);
        self.scopes.pop();

        Ok(self.program.insert(Node::HigherOrder {
            kind,
            source,
            binder,
            body: body?,
            ty: ty.clone(),
        }))
    }

    fn resolve_var(&mut self, name: &str) -> Result<NodeId, LoweringError> {
        for scope in self.scopes.iter().rev() {
            if let Some(id) = scope.get(name) {
                return Ok(*id);
            }
        }
        self.program
            .variable_bindings
            .get(name)
            .copied()
            .ok_or_else(|| LoweringError::UnboundVariable {
                name: name.to_string(),
            })
    }
}
