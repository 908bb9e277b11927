//! # Untyped AST
//!
//! The abstract syntax the surface parser produces and the checker
//! consumes. The parser itself lives outside this crate; everything here
//! is plain data. Spans are opaque value objects pointing back into the
//! source text.
//!
//! ## Builders
//!
//! For programmatic construction of AST nodes, see the [`builders`] module
//! which provides fluent APIs like `PipelineBuilder` and the expression
//! helpers (`var`, `lit_int`, `call`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod builders;

// ============================================================================
// Source positions
// ============================================================================

/// Half-open byte range into the original source. Opaque to the compiler
/// core: produced by the parser, carried through for diagnostics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, PartialOrd, Ord,
)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    /// Span for nodes the compiler synthesizes (desugarings, defaults).
    pub fn synthetic() -> Self {
        Span::default()
    }
}

// ============================================================================
// Names
// ============================================================================

/// A possibly-dotted function reference as written at the call site,
/// e.g. `filter` or `stdlib.collection.filter`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub parts: Vec<String>,
}

impl QualifiedName {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QualifiedName {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a dotted string: `"stdlib.math.add"`.
    pub fn parse(dotted: &str) -> Self {
        QualifiedName {
            parts: dotted.split('.').map(str::to_string).collect(),
        }
    }

    /// True for an undotted name.
    pub fn is_simple(&self) -> bool {
        self.parts.len() == 1
    }

    /// The final segment (the function's simple name).
    pub fn simple_name(&self) -> &str {
        self.parts.last().map_or("", String::as_str)
    }

    /// Everything before the final segment, joined with dots; `None` for
    /// a simple name.
    pub fn namespace(&self) -> Option<String> {
        if self.parts.len() < 2 {
            return None;
        }
        Some(self.parts[..self.parts.len() - 1].join("."))
    }

    /// The first segment. For `a.b.c` this is `a`, the candidate alias.
    pub fn head(&self) -> &str {
        self.parts.first().map_or("", String::as_str)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

// ============================================================================
// Type expressions
// ============================================================================

/// A type as written in the source, prior to resolution against the alias
/// map. `Candidates<T>` is accepted as a legacy alias of `List<T>` during
/// resolution; it is not a distinct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeExpr {
    /// A bare name: a primitive (`String`, `Int`, ...) or a type alias
    Named(String),
    /// A generic application: `List<T>`, `Candidates<T>`, `Optional<T>`,
    /// `Map<K, V>`
    Generic { name: String, args: Vec<TypeExpr> },
    /// A record literal type: `{id: Int, name: String}`
    Record(Vec<(String, TypeExpr)>),
    /// A union: `Int | String`
    Union(Vec<TypeExpr>),
    /// A function type: `(Int) => Boolean`
    Function(Vec<TypeExpr>, Box<TypeExpr>),
}

// ============================================================================
// Literals and operators
// ============================================================================

/// A literal value as written in the source.
///
/// Note: does not implement Hash or Eq because the float variant carries
/// an f64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::String(v) => write!(f, "\"{v}\""),
            Literal::Boolean(v) => write!(f, "{v}"),
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    Lte,
    Gte,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Lte => "<=",
            CompareOp::Gte => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

// ============================================================================
// Call options
// ============================================================================

/// Time units accepted by duration-valued options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationUnit {
    Millis,
    Seconds,
    Minutes,
    Hours,
}

/// A duration with an explicit unit, e.g. `30s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Duration {
    pub value: i64,
    pub unit: DurationUnit,
}

impl Duration {
    pub fn new(value: i64, unit: DurationUnit) -> Self {
        Duration { value, unit }
    }
}

/// Backoff strategies for retried calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backoff {
    Fixed,
    Linear,
    Exponential,
}

/// A throttle: at most `count` calls per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Throttle {
    pub count: i64,
    pub window: Duration,
}

/// Optional execution metadata attached to a module call.
///
/// Options never change the call's type apart from `fallback`, which must
/// be assignable to the function's return type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CallOptions {
    pub fallback: Option<Box<Expression>>,
    pub retry: Option<i64>,
    pub concurrency: Option<i64>,
    pub throttle: Option<Throttle>,
    pub timeout: Option<Duration>,
    pub delay: Option<Duration>,
    pub cache: Option<Duration>,
    pub backoff: Option<Backoff>,
    pub cache_backend: Option<String>,
}

impl CallOptions {
    /// True when no option is set.
    pub fn is_empty(&self) -> bool {
        self == &CallOptions::default()
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// One segment of an interpolated string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StringPart {
    /// A literal chunk of text
    Text(String),
    /// An interpolated expression: `{expr}`
    Expr(Expression),
}

/// A lambda parameter; the annotation is optional and, when absent, must
/// be inferable from the calling context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaParam {
    pub name: String,
    pub annotation: Option<TypeExpr>,
}

/// An expression node as produced by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Reference to a bound variable
    VarRef { name: String, span: Span },
    /// A literal value
    Literal { value: Literal, span: Span },
    /// A list literal: `[a, b, c]`
    ListLit {
        elements: Vec<Expression>,
        span: Span,
    },
    /// An interpolated string: `"hello {name}"`
    StringInterpolation { parts: Vec<StringPart>, span: Span },
    /// Record / record-list merge: `left + right` on mergeable operands
    Merge {
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    /// Keep only the named fields: `src.{a, b}`
    Projection {
        source: Box<Expression>,
        fields: Vec<String>,
        span: Span,
    },
    /// Single field access: `src.name`
    FieldAccess {
        source: Box<Expression>,
        field: String,
        span: Span,
    },
    /// `if c then t else e`
    Conditional {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
        span: Span,
    },
    /// Comparison, e.g. `a < b`
    Compare {
        left: Box<Expression>,
        op: CompareOp,
        right: Box<Expression>,
        span: Span,
    },
    /// Arithmetic, e.g. `a * b`. `+` over mergeable operands desugars to
    /// `Merge` during checking.
    Arithmetic {
        left: Box<Expression>,
        op: ArithOp,
        right: Box<Expression>,
        span: Span,
    },
    /// `a and b` / `a or b`
    BoolBinary {
        left: Box<Expression>,
        op: BoolOp,
        right: Box<Expression>,
        span: Span,
    },
    /// `not a`
    Not {
        operand: Box<Expression>,
        span: Span,
    },
    /// `value when condition`; absent when the condition is false
    Guard {
        value: Box<Expression>,
        condition: Box<Expression>,
        span: Span,
    },
    /// `left ?? right`
    Coalesce {
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    /// Multi-way branch with a mandatory otherwise
    Branch {
        cases: Vec<(Expression, Expression)>,
        otherwise: Box<Expression>,
        span: Span,
    },
    /// `(x, y) => body`; only valid in argument position
    Lambda {
        params: Vec<LambdaParam>,
        body: Box<Expression>,
        span: Span,
    },
    /// A module/function call, possibly with execution options
    FunctionCall {
        name: QualifiedName,
        args: Vec<Expression>,
        options: CallOptions,
        span: Span,
    },
}

impl Expression {
    /// The span the parser attached to this node.
    pub fn span(&self) -> Span {
        match self {
            Expression::VarRef { span, .. }
            | Expression::Literal { span, .. }
            | Expression::ListLit { span, .. }
            | Expression::StringInterpolation { span, .. }
            | Expression::Merge { span, .. }
            | Expression::Projection { span, .. }
            | Expression::FieldAccess { span, .. }
            | Expression::Conditional { span, .. }
            | Expression::Compare { span, .. }
            | Expression::Arithmetic { span, .. }
            | Expression::BoolBinary { span, .. }
            | Expression::Not { span, .. }
            | Expression::Guard { span, .. }
            | Expression::Coalesce { span, .. }
            | Expression::Branch { span, .. }
            | Expression::Lambda { span, .. }
            | Expression::FunctionCall { span, .. } => *span,
        }
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// An annotation attached to a declaration, e.g. `@example([1, 2, 3])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<Expression>,
    pub span: Span,
}

/// A top-level declaration; checked in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    /// `type Name = te`
    TypeDef {
        name: String,
        ty: TypeExpr,
        span: Span,
    },
    /// `in name: te` with optional `@example(...)` annotations
    InputDecl {
        name: String,
        ty: TypeExpr,
        annotations: Vec<Annotation>,
        span: Span,
    },
    /// `name = expr`
    Assignment {
        name: String,
        value: Expression,
        span: Span,
    },
    /// `out name`
    OutputDecl { name: String, span: Span },
    /// `use ns.path` or `use ns.path as alias`
    UseDecl {
        path: String,
        alias: Option<String>,
        span: Span,
    },
}

impl Declaration {
    pub fn span(&self) -> Span {
        match self {
            Declaration::TypeDef { span, .. }
            | Declaration::InputDecl { span, .. }
            | Declaration::Assignment { span, .. }
            | Declaration::OutputDecl { span, .. }
            | Declaration::UseDecl { span, .. } => *span,
        }
    }
}

/// A complete source pipeline: the unit of checking.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pipeline {
    pub declarations: Vec<Declaration>,
}

impl Pipeline {
    pub fn new(declarations: Vec<Declaration>) -> Self {
        Pipeline { declarations }
    }
}
