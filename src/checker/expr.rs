//! Bidirectional expression rules.
//!
//! `infer` derives a type from the expression's shape; `check_expr`
//! verifies against an expectation, with specialized rules for lambdas
//! and list literals where the expectation supplies what the shape alone
//! cannot (parameter types, empty-list element types). Everything else
//! goes through subsumption.

use super::{Checker, TypeEnvironment};
use crate::ast::{ArithOp, CompareOp, Expression, Literal, StringPart};
use crate::error::CompileError;
use crate::typed::{TypedExpression, TypedStringPart};
use crate::types::{
    subtype::{common_type, is_subtype, lub},
    Type,
};

impl Checker {
    /// Infer mode: derive the expression's type from its shape.
    pub(crate) fn infer(
        &mut self,
        env: &TypeEnvironment<'_>,
        expr: &Expression,
    ) -> Result<TypedExpression, Vec<CompileError>> {
        match expr {
            Expression::VarRef { name, span } => {
                let ty = env.lookup_variable(name).cloned().ok_or_else(|| {
                    vec![CompileError::UndefinedVariable {
                        name: name.clone(),
                        span: Some(*span),
                    }]
                })?;
                Ok(TypedExpression::VarRef {
                    name: name.clone(),
                    ty,
                    span: *span,
                })
            }

            Expression::Literal { value, span } => {
                let ty = match value {
                    Literal::Int(_) => Type::Int,
                    Literal::Float(_) => Type::Float,
                    Literal::String(_) => Type::String,
                    Literal::Boolean(_) => Type::Boolean,
                };
                Ok(TypedExpression::Literal {
                    value: value.clone(),
                    ty,
                    span: *span,
                })
            }

            Expression::ListLit { elements, span } => {
                let mut typed = Vec::with_capacity(elements.len());
                let mut errors = Vec::new();
                for element in elements {
                    match self.infer(env, element) {
                        Ok(t) => typed.push(t),
                        Err(e) => errors.extend(e),
                    }
                }
                if !errors.is_empty() {
                    return Err(errors);
                }
                let element_types: Vec<Type> = typed.iter().map(TypedExpression::ty).collect();
                let element_ty = common_type(&element_types).unwrap_or(Type::Nothing);
                Ok(TypedExpression::ListLit {
                    elements: typed,
                    ty: Type::list(element_ty),
                    span: *span,
                })
            }

            Expression::StringInterpolation { parts, span } => {
                let mut typed_parts = Vec::with_capacity(parts.len());
                let mut errors = Vec::new();
                for part in parts {
                    match part {
                        StringPart::Text(text) => {
                            typed_parts.push(TypedStringPart::Text(text.clone()));
                        }
                        // Any type may be interpolated
                        StringPart::Expr(inner) => match self.infer(env, inner) {
                            Ok(t) => typed_parts.push(TypedStringPart::Expr(t)),
                            Err(e) => errors.extend(e),
                        },
                    }
                }
                if !errors.is_empty() {
                    return Err(errors);
                }
                Ok(TypedExpression::StringInterpolation {
                    parts: typed_parts,
                    span: *span,
                })
            }

            Expression::Merge { left, right, span } => {
                let (typed_left, typed_right) = self.infer_both(env, left, right)?;
                let ty = self
                    .merge_types(&typed_left.ty(), &typed_right.ty(), *span)
                    .map_err(|e| vec![e])?;
                Ok(TypedExpression::Merge {
                    left: Box::new(typed_left),
                    right: Box::new(typed_right),
                    ty,
                    span: *span,
                })
            }

            Expression::Projection {
                source,
                fields,
                span,
            } => {
                let typed_source = self.infer(env, source)?;
                let source_ty = typed_source.ty();
                let (record_fields, wrapped) = match &source_ty {
                    Type::Record(f) => (f.clone(), false),
                    Type::List(element) => match element.as_ref() {
                        Type::Record(f) => (f.clone(), true),
                        other => {
                            return Err(vec![CompileError::TypeError {
                                message: format!(
                                    "cannot project fields out of List<{other}>; a record or list of records is required"
                                ),
                                span: Some(*span),
                            }]);
                        }
                    },
                    other => {
                        return Err(vec![CompileError::TypeError {
                            message: format!(
                                "cannot project fields out of {other}; a record or list of records is required"
                            ),
                            span: Some(*span),
                        }]);
                    }
                };

                let mut errors = Vec::new();
                let mut projected = Vec::with_capacity(fields.len());
                for field in fields {
                    match record_fields.get(field) {
                        Some(field_ty) => projected.push((field.clone(), field_ty.clone())),
                        None => errors.push(CompileError::InvalidProjection {
                            field: field.clone(),
                            available: record_fields.keys().cloned().collect(),
                            span: Some(*span),
                        }),
                    }
                }
                if !errors.is_empty() {
                    return Err(errors);
                }

                let record = Type::record(projected);
                let ty = if wrapped { Type::list(record) } else { record };
                Ok(TypedExpression::Projection {
                    source: Box::new(typed_source),
                    fields: fields.clone(),
                    ty,
                    span: *span,
                })
            }

            Expression::FieldAccess {
                source,
                field,
                span,
            } => {
                let typed_source = self.infer(env, source)?;
                let source_ty = typed_source.ty();
                let (record_fields, wrapped) = match &source_ty {
                    Type::Record(f) => (f.clone(), false),
                    Type::List(element) => match element.as_ref() {
                        Type::Record(f) => (f.clone(), true),
                        other => {
                            return Err(vec![CompileError::TypeError {
                                message: format!("cannot access field '{field}' on List<{other}>"),
                                span: Some(*span),
                            }]);
                        }
                    },
                    other => {
                        return Err(vec![CompileError::TypeError {
                            message: format!("cannot access field '{field}' on {other}"),
                            span: Some(*span),
                        }]);
                    }
                };

                let field_ty = record_fields.get(field).cloned().ok_or_else(|| {
                    vec![CompileError::InvalidFieldAccess {
                        field: field.clone(),
                        available: record_fields.keys().cloned().collect(),
                        span: Some(*span),
                    }]
                })?;
                let ty = if wrapped {
                    Type::list(field_ty)
                } else {
                    field_ty
                };
                Ok(TypedExpression::FieldAccess {
                    source: Box::new(typed_source),
                    field: field.clone(),
                    ty,
                    span: *span,
                })
            }

            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
                span,
            } => {
                let typed_condition = self.check_expr(env, condition, &Type::Boolean)?;
                let (typed_then, typed_else) = self.infer_both(env, then_branch, else_branch)?;
                let ty = lub(&typed_then.ty(), &typed_else.ty());
                Ok(TypedExpression::Conditional {
                    condition: Box::new(typed_condition),
                    then_branch: Box::new(typed_then),
                    else_branch: Box::new(typed_else),
                    ty,
                    span: *span,
                })
            }

            Expression::Compare {
                left,
                op,
                right,
                span,
            } => self.infer_compare(env, left, *op, right, *span),

            Expression::Arithmetic {
                left,
                op,
                right,
                span,
            } => self.infer_arithmetic(env, left, *op, right, *span),

            Expression::BoolBinary {
                left,
                op,
                right,
                span,
            } => {
                let typed_left = self.check_expr(env, left, &Type::Boolean);
                let typed_right = self.check_expr(env, right, &Type::Boolean);
                let (typed_left, typed_right) = merge_results(typed_left, typed_right)?;
                Ok(TypedExpression::BoolBinary {
                    left: Box::new(typed_left),
                    op: *op,
                    right: Box::new(typed_right),
                    span: *span,
                })
            }

            Expression::Not { operand, span } => {
                let typed = self.check_expr(env, operand, &Type::Boolean)?;
                Ok(TypedExpression::Not {
                    operand: Box::new(typed),
                    span: *span,
                })
            }

            Expression::Guard {
                value,
                condition,
                span,
            } => {
                let typed_value = self.infer(env, value)?;
                let typed_condition = self.check_expr(env, condition, &Type::Boolean)?;
                let ty = Type::optional(typed_value.ty());
                Ok(TypedExpression::Guard {
                    value: Box::new(typed_value),
                    condition: Box::new(typed_condition),
                    ty,
                    span: *span,
                })
            }

            Expression::Coalesce { left, right, span } => {
                let typed_left = self.infer(env, left)?;
                let inner = match typed_left.ty() {
                    Type::Optional(inner) => *inner,
                    other => {
                        return Err(vec![CompileError::TypeError {
                            message: format!(
                                "the left side of '??' must be Optional, got {other}"
                            ),
                            span: Some(left.span()),
                        }]);
                    }
                };
                let typed_right = self.infer(env, right)?;
                let right_ty = typed_right.ty();
                let ty = if right_ty == inner {
                    inner
                } else if right_ty == Type::optional(inner.clone()) {
                    Type::optional(inner)
                } else {
                    return Err(vec![CompileError::TypeMismatch {
                        expected: inner.to_string(),
                        got: right_ty.to_string(),
                        span: Some(right.span()),
                    }]);
                };
                Ok(TypedExpression::Coalesce {
                    left: Box::new(typed_left),
                    right: Box::new(typed_right),
                    ty,
                    span: *span,
                })
            }

            Expression::Branch {
                cases,
                otherwise,
                span,
            } => {
                let mut typed_cases = Vec::with_capacity(cases.len());
                let mut errors = Vec::new();
                for (condition, body) in cases {
                    let typed_condition = self.check_expr(env, condition, &Type::Boolean);
                    let typed_body = self.infer(env, body);
                    match merge_results(typed_condition, typed_body) {
                        Ok(pair) => typed_cases.push(pair),
                        Err(e) => errors.extend(e),
                    }
                }
                let typed_otherwise = match self.infer(env, otherwise) {
                    Ok(t) if errors.is_empty() => t,
                    Ok(_) => return Err(errors),
                    Err(e) => {
                        errors.extend(e);
                        return Err(errors);
                    }
                };

                let mut branch_types: Vec<Type> =
                    typed_cases.iter().map(|(_, body)| body.ty()).collect();
                branch_types.push(typed_otherwise.ty());
                let ty = common_type(&branch_types).unwrap_or(Type::Nothing);
                Ok(TypedExpression::Branch {
                    cases: typed_cases,
                    otherwise: Box::new(typed_otherwise),
                    ty,
                    span: *span,
                })
            }

            Expression::Lambda { params, body, span } => {
                // Infer mode demands annotations; the ergonomic path is
                // check mode, where the calling context supplies the types
                let mut bound = Vec::with_capacity(params.len());
                for param in params {
                    match &param.annotation {
                        Some(te) => {
                            let ty = self.resolve_type_expr(env, te, *span)?;
                            bound.push((param.name.clone(), ty));
                        }
                        None => {
                            return Err(vec![CompileError::TypeError {
                                message: format!(
                                    "cannot infer the type of lambda parameter '{}'; annotate it or use the lambda where a function type is expected",
                                    param.name
                                ),
                                span: Some(*span),
                            }]);
                        }
                    }
                }
                let body_env =
                    env.with_variables(bound.iter().map(|(name, ty)| (name.as_str(), ty.clone())));
                let typed_body = self.infer(&body_env, body)?;
                let ty = Type::function(
                    bound.iter().map(|(_, ty)| ty.clone()).collect(),
                    typed_body.ty(),
                );
                Ok(TypedExpression::Lambda {
                    params: bound,
                    body: Box::new(typed_body),
                    ty,
                    span: *span,
                })
            }

            Expression::FunctionCall {
                name,
                args,
                options,
                span,
            } => self.check_call(env, name, args, options, *span),
        }
    }

    /// Check mode: verify the expression against an expected type.
    pub(crate) fn check_expr(
        &mut self,
        env: &TypeEnvironment<'_>,
        expr: &Expression,
        expected: &Type,
    ) -> Result<TypedExpression, Vec<CompileError>> {
        match (expr, expected) {
            // Lambda against a function type: the expectation supplies
            // missing parameter annotations
            (
                Expression::Lambda { params, body, span },
                Type::Function(expected_params, expected_ret),
            ) => {
                if params.len() != expected_params.len() {
                    return Err(vec![CompileError::TypeError {
                        message: format!(
                            "lambda takes {} parameter(s) but {} were expected",
                            params.len(),
                            expected_params.len()
                        ),
                        span: Some(*span),
                    }]);
                }
                let mut bound = Vec::with_capacity(params.len());
                for (param, expected_ty) in params.iter().zip(expected_params) {
                    let ty = match &param.annotation {
                        None => expected_ty.clone(),
                        Some(te) => {
                            let annotated = self.resolve_type_expr(env, te, *span)?;
                            // Contravariance: the annotation must accept
                            // every value the context may pass
                            if !is_subtype(expected_ty, &annotated) {
                                return Err(vec![CompileError::TypeMismatch {
                                    expected: expected_ty.to_string(),
                                    got: annotated.to_string(),
                                    span: Some(*span),
                                }]);
                            }
                            annotated
                        }
                    };
                    bound.push((param.name.clone(), ty));
                }
                let body_env =
                    env.with_variables(bound.iter().map(|(name, ty)| (name.as_str(), ty.clone())));
                let typed_body = self.check_expr(&body_env, body, expected_ret)?;
                let ty = Type::function(
                    bound.iter().map(|(_, ty)| ty.clone()).collect(),
                    typed_body.ty(),
                );
                Ok(TypedExpression::Lambda {
                    params: bound,
                    body: Box::new(typed_body),
                    ty,
                    span: *span,
                })
            }

            // List literal against a list type: the expectation supplies
            // the element type, which is what makes `[]` checkable
            (Expression::ListLit { elements, span }, Type::List(expected_element)) => {
                if elements.is_empty() {
                    return Ok(TypedExpression::ListLit {
                        elements: Vec::new(),
                        ty: Type::list((**expected_element).clone()),
                        span: *span,
                    });
                }
                let mut typed = Vec::with_capacity(elements.len());
                let mut errors = Vec::new();
                for element in elements {
                    match self.infer(env, element) {
                        Ok(t) => typed.push(t),
                        Err(e) => errors.extend(e),
                    }
                }
                if !errors.is_empty() {
                    return Err(errors);
                }
                let element_types: Vec<Type> = typed.iter().map(TypedExpression::ty).collect();
                let found = Type::list(common_type(&element_types).unwrap_or(Type::Nothing));
                if !is_subtype(&found, expected) {
                    return Err(vec![CompileError::TypeMismatch {
                        expected: expected.to_string(),
                        got: found.to_string(),
                        span: Some(*span),
                    }]);
                }
                // Propagate the expected element type as the result type
                Ok(TypedExpression::ListLit {
                    elements: typed,
                    ty: Type::list((**expected_element).clone()),
                    span: *span,
                })
            }

            _ => self.subsume(env, expr, expected),
        }
    }

    /// Infer both operands of a binary node, combining errors from both
    /// sides before failing.
    fn infer_both(
        &mut self,
        env: &TypeEnvironment<'_>,
        left: &Expression,
        right: &Expression,
    ) -> Result<(TypedExpression, TypedExpression), Vec<CompileError>> {
        let typed_left = self.infer(env, left);
        let typed_right = self.infer(env, right);
        merge_results(typed_left, typed_right)
    }

    fn infer_compare(
        &mut self,
        env: &TypeEnvironment<'_>,
        left: &Expression,
        op: CompareOp,
        right: &Expression,
        span: crate::ast::Span,
    ) -> Result<TypedExpression, Vec<CompileError>> {
        let (typed_left, typed_right) = self.infer_both(env, left, right)?;
        let left_ty = typed_left.ty();
        let right_ty = typed_right.ty();

        let unsupported = || {
            vec![CompileError::UnsupportedComparison {
                op: op.as_str().to_string(),
                lhs: left_ty.to_string(),
                rhs: right_ty.to_string(),
                span: Some(span),
            }]
        };

        if left_ty != right_ty {
            return Err(unsupported());
        }

        let builtin = match op {
            CompareOp::Eq | CompareOp::NotEq => match &left_ty {
                Type::Int => "eq-int",
                Type::String => "eq-string",
                Type::Float => "eq-float",
                Type::Boolean => "eq-boolean",
                _ => return Err(unsupported()),
            },
            // Ordering is defined for numbers only; notably there is no
            // lt/gt for String
            CompareOp::Lt | CompareOp::Gt | CompareOp::Lte | CompareOp::Gte => {
                if !left_ty.is_numeric() {
                    return Err(unsupported());
                }
                match op {
                    CompareOp::Lt => "lt",
                    CompareOp::Gt => "gt",
                    CompareOp::Lte => "lte",
                    CompareOp::Gte => "gte",
                    _ => unreachable!("equality handled above"),
                }
            }
        };

        let signature = self.lookup_builtin(env, builtin).ok_or_else(unsupported)?;
        let call = TypedExpression::FunctionCall {
            signature,
            args: vec![typed_left, typed_right],
            options: crate::typed::TypedCallOptions::default(),
            ty: Type::Boolean,
            span,
        };
        if op == CompareOp::NotEq {
            return Ok(TypedExpression::Not {
                operand: Box::new(call),
                span,
            });
        }
        Ok(call)
    }

    fn infer_arithmetic(
        &mut self,
        env: &TypeEnvironment<'_>,
        left: &Expression,
        op: ArithOp,
        right: &Expression,
        span: crate::ast::Span,
    ) -> Result<TypedExpression, Vec<CompileError>> {
        let (typed_left, typed_right) = self.infer_both(env, left, right)?;
        let left_ty = typed_left.ty();
        let right_ty = typed_right.ty();

        // `+` over mergeable operands is record merge, not addition
        if op == ArithOp::Add && left_ty.is_mergeable() && right_ty.is_mergeable() {
            let ty = self
                .merge_types(&left_ty, &right_ty, span)
                .map_err(|e| vec![e])?;
            return Ok(TypedExpression::Merge {
                left: Box::new(typed_left),
                right: Box::new(typed_right),
                ty,
                span,
            });
        }

        if !left_ty.is_numeric() || left_ty != right_ty {
            return Err(vec![CompileError::UnsupportedArithmetic {
                op: op.as_str().to_string(),
                lhs: left_ty.to_string(),
                rhs: right_ty.to_string(),
                span: Some(span),
            }]);
        }

        let builtin = match op {
            ArithOp::Add => "add",
            ArithOp::Sub => "subtract",
            ArithOp::Mul => "multiply",
            ArithOp::Div => "divide",
            ArithOp::Mod => "modulo",
        };
        let signature = self.lookup_builtin(env, builtin).ok_or_else(|| {
            vec![CompileError::UnsupportedArithmetic {
                op: op.as_str().to_string(),
                lhs: left_ty.to_string(),
                rhs: right_ty.to_string(),
                span: Some(span),
            }]
        })?;
        Ok(TypedExpression::FunctionCall {
            signature,
            args: vec![typed_left, typed_right],
            options: crate::typed::TypedCallOptions::default(),
            ty: left_ty,
            span,
        })
    }
}

/// Combine two independently checked subtrees, accumulating errors from
/// both sides (validation-style) before failing the containing operation.
fn merge_results<A, B>(
    a: Result<A, Vec<CompileError>>,
    b: Result<B, Vec<CompileError>>,
) -> Result<(A, B), Vec<CompileError>> {
    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(mut ea), Err(eb)) => {
            ea.extend(eb);
            Err(ea)
        }
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
    }
}
