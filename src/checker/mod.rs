//! # Bidirectional Type Checker
//!
//! Dunfield-style bidirectional checking over the untyped AST:
//!
//! - **Infer (⇑)**: derive an expression's type from its shape
//! - **Check (⇓ T)**: verify an expression against an expected type,
//!   using the expectation to drive local decisions (lambda parameter
//!   types, empty-list element types)
//!
//! ```text
//! Pipeline AST -> [Checker] -> TypedPipeline -> IR Builder
//! ```
//!
//! Declarations are checked in source order, threading an immutable
//! [`TypeEnvironment`]. Errors accumulate within a declaration; the first
//! failing declaration stops the sequence (later declarations would check
//! against an undefined environment). Warnings accumulate per invocation
//! and never affect success.
//!
//! Each `check` invocation owns a fresh row-variable counter and warning
//! buffer; concurrent invocations over the same registry share nothing
//! mutable.

mod call;
pub mod env;
mod expr;

pub use env::TypeEnvironment;

use crate::ast::{Declaration, Expression, Pipeline, Span, TypeExpr};
use crate::error::{CompileError, CompileWarning};
use crate::registry::FunctionRegistry;
use crate::typed::{TypedDeclaration, TypedPipeline};
use crate::types::{subtype::is_subtype, RowVarSource, Type};
use tracing::{debug, trace};

/// Type-check a pipeline against a registry.
///
/// Returns the fully typed pipeline (with accumulated warnings) or the
/// list of errors produced by the first failing declaration.
pub fn check(
    pipeline: &Pipeline,
    registry: &FunctionRegistry,
) -> Result<TypedPipeline, Vec<CompileError>> {
    debug!(
        declarations = pipeline.declarations.len(),
        "type-checking pipeline"
    );
    let mut checker = Checker::new();
    let mut env = TypeEnvironment::new(registry);
    let mut declarations = Vec::with_capacity(pipeline.declarations.len());
    let mut outputs = Vec::new();

    for decl in &pipeline.declarations {
        trace!(declaration = ?decl.span(), "checking declaration");
        let (typed, next_env) = checker.check_declaration(&env, decl)?;
        if let TypedDeclaration::OutputDecl { name, ty, span } = &typed {
            outputs.push((name.clone(), ty.clone(), *span));
        }
        declarations.push(typed);
        env = next_env;
    }

    debug!(
        outputs = outputs.len(),
        warnings = checker.warnings.len(),
        "pipeline checked"
    );
    Ok(TypedPipeline {
        declarations,
        outputs,
        warnings: checker.warnings,
    })
}

/// Per-invocation checking state: the fresh row-variable source and the
/// warning buffer.
pub(crate) struct Checker {
    pub(crate) rows: RowVarSource,
    pub(crate) warnings: Vec<CompileWarning>,
}

impl Checker {
    fn new() -> Self {
        Checker {
            rows: RowVarSource::new(),
            warnings: Vec::new(),
        }
    }

    /// Check one declaration, returning its typed form and the extended
    /// environment for the declarations after it.
    fn check_declaration<'r>(
        &mut self,
        env: &TypeEnvironment<'r>,
        decl: &Declaration,
    ) -> Result<(TypedDeclaration, TypeEnvironment<'r>), Vec<CompileError>> {
        match decl {
            Declaration::TypeDef { name, ty, span } => {
                let resolved = self.resolve_type_expr(env, ty, *span)?;
                let next = env.with_alias(name, resolved.clone());
                Ok((
                    TypedDeclaration::TypeDef {
                        name: name.clone(),
                        ty: resolved,
                        span: *span,
                    },
                    next,
                ))
            }

            Declaration::InputDecl {
                name,
                ty,
                annotations,
                span,
            } => {
                let resolved = self.resolve_type_expr(env, ty, *span)?;
                let mut errors = Vec::new();
                for annotation in annotations {
                    if annotation.name != "example" {
                        continue;
                    }
                    for example in &annotation.args {
                        // Checking mode: the declared type drives the
                        // example (empty lists, lambdas, ...)
                        if let Err(example_errors) = self.check_expr(env, example, &resolved) {
                            errors.extend(example_errors);
                        }
                    }
                }
                if !errors.is_empty() {
                    return Err(errors);
                }
                let next = env.with_variable(name, resolved.clone());
                Ok((
                    TypedDeclaration::InputDecl {
                        name: name.clone(),
                        ty: resolved,
                        span: *span,
                    },
                    next,
                ))
            }

            Declaration::Assignment { name, value, span } => {
                let typed = self.infer(env, value)?;
                let next = env.with_variable(name, typed.ty());
                Ok((
                    TypedDeclaration::Assignment {
                        name: name.clone(),
                        value: typed,
                        span: *span,
                    },
                    next,
                ))
            }

            Declaration::OutputDecl { name, span } => {
                let ty = env.lookup_variable(name).cloned().ok_or_else(|| {
                    vec![CompileError::UndefinedVariable {
                        name: name.clone(),
                        span: Some(*span),
                    }]
                })?;
                Ok((
                    TypedDeclaration::OutputDecl {
                        name: name.clone(),
                        ty,
                        span: *span,
                    },
                    env.clone(),
                ))
            }

            Declaration::UseDecl { path, alias, span } => {
                if !env.registry().has_namespace_or_prefix(path) {
                    return Err(vec![CompileError::UndefinedNamespace {
                        namespace: path.clone(),
                        span: Some(*span),
                    }]);
                }
                let scope = match alias {
                    Some(alias) => env.scope().with_alias(alias, path),
                    None => env.scope().with_wildcard(path),
                };
                Ok((
                    TypedDeclaration::UseDecl {
                        path: path.clone(),
                        alias: alias.clone(),
                        span: *span,
                    },
                    env.with_scope(scope),
                ))
            }
        }
    }

    /// Resolve a surface type expression to a semantic type.
    ///
    /// `Candidates<T>` resolves to `List<T>` (legacy alias); bare names
    /// resolve against primitives first, then the alias map.
    pub(crate) fn resolve_type_expr(
        &mut self,
        env: &TypeEnvironment<'_>,
        te: &TypeExpr,
        span: Span,
    ) -> Result<Type, Vec<CompileError>> {
        match te {
            TypeExpr::Named(name) => match name.as_str() {
                "String" => Ok(Type::String),
                "Int" => Ok(Type::Int),
                "Float" => Ok(Type::Float),
                "Boolean" => Ok(Type::Boolean),
                "Nothing" => Ok(Type::Nothing),
                other => env.lookup_alias(other).cloned().ok_or_else(|| {
                    vec![CompileError::UndefinedType {
                        name: other.to_string(),
                        span: Some(span),
                    }]
                }),
            },

            TypeExpr::Generic { name, args } => match (name.as_str(), args.as_slice()) {
                // Candidates<T> is a legacy alias of List<T>
                ("List" | "Candidates", [element]) => {
                    Ok(Type::list(self.resolve_type_expr(env, element, span)?))
                }
                ("Optional", [inner]) => {
                    Ok(Type::optional(self.resolve_type_expr(env, inner, span)?))
                }
                ("Map", [key, value]) => Ok(Type::map(
                    self.resolve_type_expr(env, key, span)?,
                    self.resolve_type_expr(env, value, span)?,
                )),
                ("List" | "Candidates" | "Optional" | "Map", _) => {
                    Err(vec![CompileError::TypeError {
                        message: format!(
                            "wrong number of type arguments for {name}: got {}",
                            args.len()
                        ),
                        span: Some(span),
                    }])
                }
                _ => Err(vec![CompileError::UndefinedType {
                    name: name.clone(),
                    span: Some(span),
                }]),
            },

            TypeExpr::Record(fields) => {
                let mut resolved = Vec::with_capacity(fields.len());
                let mut errors = Vec::new();
                for (field_name, field_te) in fields {
                    match self.resolve_type_expr(env, field_te, span) {
                        Ok(field_ty) => resolved.push((field_name.clone(), field_ty)),
                        Err(field_errors) => errors.extend(field_errors),
                    }
                }
                if !errors.is_empty() {
                    return Err(errors);
                }
                Ok(Type::record(resolved))
            }

            TypeExpr::Union(members) => {
                let mut resolved = Vec::with_capacity(members.len());
                let mut errors = Vec::new();
                for member in members {
                    match self.resolve_type_expr(env, member, span) {
                        Ok(member_ty) => resolved.push(member_ty),
                        Err(member_errors) => errors.extend(member_errors),
                    }
                }
                if !errors.is_empty() {
                    return Err(errors);
                }
                Ok(Type::union(resolved))
            }

            TypeExpr::Function(params, ret) => {
                let mut resolved = Vec::with_capacity(params.len());
                for param in params {
                    resolved.push(self.resolve_type_expr(env, param, span)?);
                }
                let ret = self.resolve_type_expr(env, ret, span)?;
                Ok(Type::function(resolved, ret))
            }
        }
    }

    /// Subsumption: infer the expression and require its type to be a
    /// subtype of the expectation. Shared by the generic check-mode path.
    pub(crate) fn subsume(
        &mut self,
        env: &TypeEnvironment<'_>,
        expr: &Expression,
        expected: &Type,
    ) -> Result<crate::typed::TypedExpression, Vec<CompileError>> {
        let typed = self.infer(env, expr)?;
        let got = typed.ty();
        if !is_subtype(&got, expected) {
            return Err(vec![CompileError::TypeMismatch {
                expected: expected.to_string(),
                got: got.to_string(),
                span: Some(expr.span()),
            }]);
        }
        Ok(typed)
    }
}
