//! # Typed AST
//!
//! The checker's output: the untyped AST with every expression annotated
//! with its computed [`Type`], every declaration carrying its span, and
//! every call site carrying the signature it resolved to. Comparison and
//! arithmetic operators do not survive checking; they desugar into module
//! calls (or `Merge`) before reaching this layer.

use crate::ast::{Backoff, BoolOp, Duration, Literal, Span, Throttle};
use crate::error::CompileWarning;
use crate::registry::FunctionSignature;
use crate::types::Type;
use serde::{Deserialize, Serialize};

/// Call options after checking; identical to the surface options except
/// that the fallback expression is typed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypedCallOptions {
    pub fallback: Option<Box<TypedExpression>>,
    pub retry: Option<i64>,
    pub concurrency: Option<i64>,
    pub throttle: Option<Throttle>,
    pub timeout: Option<Duration>,
    pub delay: Option<Duration>,
    pub cache: Option<Duration>,
    pub backoff: Option<Backoff>,
    pub cache_backend: Option<String>,
}

/// One segment of a typed interpolated string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedStringPart {
    Text(String),
    Expr(TypedExpression),
}

/// An expression with its computed type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedExpression {
    VarRef {
        name: String,
        ty: Type,
        span: Span,
    },
    Literal {
        value: Literal,
        ty: Type,
        span: Span,
    },
    ListLit {
        elements: Vec<TypedExpression>,
        ty: Type,
        span: Span,
    },
    StringInterpolation {
        parts: Vec<TypedStringPart>,
        span: Span,
    },
    Merge {
        left: Box<TypedExpression>,
        right: Box<TypedExpression>,
        ty: Type,
        span: Span,
    },
    Projection {
        source: Box<TypedExpression>,
        fields: Vec<String>,
        ty: Type,
        span: Span,
    },
    FieldAccess {
        source: Box<TypedExpression>,
        field: String,
        ty: Type,
        span: Span,
    },
    Conditional {
        condition: Box<TypedExpression>,
        then_branch: Box<TypedExpression>,
        else_branch: Box<TypedExpression>,
        ty: Type,
        span: Span,
    },
    BoolBinary {
        left: Box<TypedExpression>,
        op: BoolOp,
        right: Box<TypedExpression>,
        span: Span,
    },
    Not {
        operand: Box<TypedExpression>,
        span: Span,
    },
    Guard {
        value: Box<TypedExpression>,
        condition: Box<TypedExpression>,
        ty: Type,
        span: Span,
    },
    Coalesce {
        left: Box<TypedExpression>,
        right: Box<TypedExpression>,
        ty: Type,
        span: Span,
    },
    Branch {
        cases: Vec<(TypedExpression, TypedExpression)>,
        otherwise: Box<TypedExpression>,
        ty: Type,
        span: Span,
    },
    Lambda {
        params: Vec<(String, Type)>,
        body: Box<TypedExpression>,
        ty: Type,
        span: Span,
    },
    /// A resolved call. `signature` is the *original* registered
    /// signature (not the row-instantiated copy); `ty` is the return type
    /// after substitution.
    FunctionCall {
        signature: FunctionSignature,
        args: Vec<TypedExpression>,
        options: TypedCallOptions,
        ty: Type,
        span: Span,
    },
}

impl TypedExpression {
    /// The computed type of this expression.
    pub fn ty(&self) -> Type {
        match self {
            TypedExpression::VarRef { ty, .. }
            | TypedExpression::Literal { ty, .. }
            | TypedExpression::ListLit { ty, .. }
            | TypedExpression::Merge { ty, .. }
            | TypedExpression::Projection { ty, .. }
            | TypedExpression::FieldAccess { ty, .. }
            | TypedExpression::Conditional { ty, .. }
            | TypedExpression::Guard { ty, .. }
            | TypedExpression::Coalesce { ty, .. }
            | TypedExpression::Branch { ty, .. }
            | TypedExpression::Lambda { ty, .. }
            | TypedExpression::FunctionCall { ty, .. } => ty.clone(),
            TypedExpression::StringInterpolation { .. } => Type::String,
            TypedExpression::BoolBinary { .. } | TypedExpression::Not { .. } => Type::Boolean,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            TypedExpression::VarRef { span, .. }
            | TypedExpression::Literal { span, .. }
            | TypedExpression::ListLit { span, .. }
            | TypedExpression::StringInterpolation { span, .. }
            | TypedExpression::Merge { span, .. }
            | TypedExpression::Projection { span, .. }
            | TypedExpression::FieldAccess { span, .. }
            | TypedExpression::Conditional { span, .. }
            | TypedExpression::BoolBinary { span, .. }
            | TypedExpression::Not { span, .. }
            | TypedExpression::Guard { span, .. }
            | TypedExpression::Coalesce { span, .. }
            | TypedExpression::Branch { span, .. }
            | TypedExpression::Lambda { span, .. }
            | TypedExpression::FunctionCall { span, .. } => *span,
        }
    }
}

/// A declaration after checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedDeclaration {
    TypeDef { name: String, ty: Type, span: Span },
    InputDecl { name: String, ty: Type, span: Span },
    Assignment {
        name: String,
        value: TypedExpression,
        span: Span,
    },
    OutputDecl { name: String, ty: Type, span: Span },
    UseDecl {
        path: String,
        alias: Option<String>,
        span: Span,
    },
}

/// The fully checked pipeline handed to the lowerer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypedPipeline {
    pub declarations: Vec<TypedDeclaration>,
    /// Declared outputs, in source order: `(name, type, span)`
    pub outputs: Vec<(String, Type, Span)>,
    /// Non-fatal diagnostics, in traversal order
    pub warnings: Vec<CompileWarning>,
}

impl TypedPipeline {
    /// Look up the typed value bound to an assignment, if any.
    pub fn binding(&self, name: &str) -> Option<&TypedExpression> {
        self.declarations.iter().find_map(|decl| match decl {
            TypedDeclaration::Assignment { name: bound, value, .. } if bound == name => {
                Some(value)
            }
            _ => None,
        })
    }
}
