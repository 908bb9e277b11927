//! Builder Patterns for AST Construction
//!
//! Provides fluent APIs for constructing AST nodes, particularly useful for
//! tests and embedders that assemble pipelines without the surface parser.
//! All constructed nodes carry synthetic spans.
//!
//! ## Example
//!
//! ```rust
//! use constellation::ast::builders::*;
//!
//! // in xs: List<Int>
//! // ys = filter(xs, (x) => gt(x, 0))
//! // out ys
//! let pipeline = PipelineBuilder::new()
//!     .input("xs", te_list(te_named("Int")))
//!     .assign(
//!         "ys",
//!         call(
//!             "filter",
//!             [var("xs"), lambda([("x", None)], call("gt", [var("x"), lit_int(0)]))],
//!         ),
//!     )
//!     .output("ys")
//!     .build();
//! assert_eq!(pipeline.declarations.len(), 3);
//! ```

use super::{
    Annotation, ArithOp, BoolOp, CallOptions, CompareOp, Declaration, Expression, LambdaParam,
    Literal, Pipeline, QualifiedName, Span, StringPart, TypeExpr,
};

// ============================================================================
// PipelineBuilder
// ============================================================================

/// Builder for constructing [`Pipeline`] instances declaration by
/// declaration, in source order.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    declarations: Vec<Declaration>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        PipelineBuilder::default()
    }

    /// `use path`
    pub fn use_ns(mut self, path: &str) -> Self {
        self.declarations.push(Declaration::UseDecl {
            path: path.to_string(),
            alias: None,
            span: Span::synthetic(),
        });
        self
    }

    /// `use path as alias`
    pub fn use_alias(mut self, path: &str, alias: &str) -> Self {
        self.declarations.push(Declaration::UseDecl {
            path: path.to_string(),
            alias: Some(alias.to_string()),
            span: Span::synthetic(),
        });
        self
    }

    /// `type name = ty`
    pub fn type_def(mut self, name: &str, ty: TypeExpr) -> Self {
        self.declarations.push(Declaration::TypeDef {
            name: name.to_string(),
            ty,
            span: Span::synthetic(),
        });
        self
    }

    /// `in name: ty`
    pub fn input(mut self, name: &str, ty: TypeExpr) -> Self {
        self.declarations.push(Declaration::InputDecl {
            name: name.to_string(),
            ty,
            annotations: Vec::new(),
            span: Span::synthetic(),
        });
        self
    }

    /// `in name: ty @example(...)...`
    pub fn input_with_examples<I>(mut self, name: &str, ty: TypeExpr, examples: I) -> Self
    where
        I: IntoIterator<Item = Expression>,
    {
        let annotations = examples
            .into_iter()
            .map(|example| Annotation {
                name: "example".to_string(),
                args: vec![example],
                span: Span::synthetic(),
            })
            .collect();
        self.declarations.push(Declaration::InputDecl {
            name: name.to_string(),
            ty,
            annotations,
            span: Span::synthetic(),
        });
        self
    }

    /// `name = value`
    pub fn assign(mut self, name: &str, value: Expression) -> Self {
        self.declarations.push(Declaration::Assignment {
            name: name.to_string(),
            value,
            span: Span::synthetic(),
        });
        self
    }

    /// `out name`
    pub fn output(mut self, name: &str) -> Self {
        self.declarations.push(Declaration::OutputDecl {
            name: name.to_string(),
            span: Span::synthetic(),
        });
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline::new(self.declarations)
    }
}

// ============================================================================
// Expression helpers
// ============================================================================

/// `name`
pub fn var(name: &str) -> Expression {
    Expression::VarRef {
        name: name.to_string(),
        span: Span::synthetic(),
    }
}

/// Integer literal
pub fn lit_int(value: i64) -> Expression {
    Expression::Literal {
        value: Literal::Int(value),
        span: Span::synthetic(),
    }
}

/// Float literal
pub fn lit_float(value: f64) -> Expression {
    Expression::Literal {
        value: Literal::Float(value),
        span: Span::synthetic(),
    }
}

/// String literal
pub fn lit_str(value: &str) -> Expression {
    Expression::Literal {
        value: Literal::String(value.to_string()),
        span: Span::synthetic(),
    }
}

/// Boolean literal
pub fn lit_bool(value: bool) -> Expression {
    Expression::Literal {
        value: Literal::Boolean(value),
        span: Span::synthetic(),
    }
}

/// `[a, b, c]`
pub fn list<I: IntoIterator<Item = Expression>>(elements: I) -> Expression {
    Expression::ListLit {
        elements: elements.into_iter().collect(),
        span: Span::synthetic(),
    }
}

/// `"text {expr} ..."` from alternating parts
pub fn interp<I: IntoIterator<Item = StringPart>>(parts: I) -> Expression {
    Expression::StringInterpolation {
        parts: parts.into_iter().collect(),
        span: Span::synthetic(),
    }
}

/// A literal text segment of an interpolated string
pub fn text(value: &str) -> StringPart {
    StringPart::Text(value.to_string())
}

/// An interpolated expression segment
pub fn part(expr: Expression) -> StringPart {
    StringPart::Expr(expr)
}

/// `left + right` (record merge)
pub fn merge(left: Expression, right: Expression) -> Expression {
    Expression::Merge {
        left: Box::new(left),
        right: Box::new(right),
        span: Span::synthetic(),
    }
}

/// `source.{fields}`
pub fn project<'a, I: IntoIterator<Item = &'a str>>(source: Expression, fields: I) -> Expression {
    Expression::Projection {
        source: Box::new(source),
        fields: fields.into_iter().map(str::to_string).collect(),
        span: Span::synthetic(),
    }
}

/// `source.field`
pub fn field(source: Expression, name: &str) -> Expression {
    Expression::FieldAccess {
        source: Box::new(source),
        field: name.to_string(),
        span: Span::synthetic(),
    }
}

/// `if condition then t else e`
pub fn conditional(condition: Expression, then: Expression, otherwise: Expression) -> Expression {
    Expression::Conditional {
        condition: Box::new(condition),
        then_branch: Box::new(then),
        else_branch: Box::new(otherwise),
        span: Span::synthetic(),
    }
}

/// `left op right` comparison
pub fn compare(left: Expression, op: CompareOp, right: Expression) -> Expression {
    Expression::Compare {
        left: Box::new(left),
        op,
        right: Box::new(right),
        span: Span::synthetic(),
    }
}

/// `left op right` arithmetic
pub fn arith(left: Expression, op: ArithOp, right: Expression) -> Expression {
    Expression::Arithmetic {
        left: Box::new(left),
        op,
        right: Box::new(right),
        span: Span::synthetic(),
    }
}

/// `left and right` / `left or right`
pub fn bool_op(left: Expression, op: BoolOp, right: Expression) -> Expression {
    Expression::BoolBinary {
        left: Box::new(left),
        op,
        right: Box::new(right),
        span: Span::synthetic(),
    }
}

/// `not operand`
pub fn not(operand: Expression) -> Expression {
    Expression::Not {
        operand: Box::new(operand),
        span: Span::synthetic(),
    }
}

/// `value when condition`
pub fn guard(value: Expression, condition: Expression) -> Expression {
    Expression::Guard {
        value: Box::new(value),
        condition: Box::new(condition),
        span: Span::synthetic(),
    }
}

/// `left ?? right`
pub fn coalesce(left: Expression, right: Expression) -> Expression {
    Expression::Coalesce {
        left: Box::new(left),
        right: Box::new(right),
        span: Span::synthetic(),
    }
}

/// `branch { c1 -> e1, ..., otherwise -> o }`
pub fn branch<I>(cases: I, otherwise: Expression) -> Expression
where
    I: IntoIterator<Item = (Expression, Expression)>,
{
    Expression::Branch {
        cases: cases.into_iter().collect(),
        otherwise: Box::new(otherwise),
        span: Span::synthetic(),
    }
}

/// `(params) => body`; a `None` annotation leaves the parameter for the
/// calling context to infer.
pub fn lambda<'a, I>(params: I, body: Expression) -> Expression
where
    I: IntoIterator<Item = (&'a str, Option<TypeExpr>)>,
{
    Expression::Lambda {
        params: params
            .into_iter()
            .map(|(name, annotation)| LambdaParam {
                name: name.to_string(),
                annotation,
            })
            .collect(),
        body: Box::new(body),
        span: Span::synthetic(),
    }
}

/// `name(args)` with no options; `name` may be dotted.
pub fn call<I: IntoIterator<Item = Expression>>(name: &str, args: I) -> Expression {
    call_with_options(name, args, CallOptions::default())
}

/// `name(args) with options`
pub fn call_with_options<I: IntoIterator<Item = Expression>>(
    name: &str,
    args: I,
    options: CallOptions,
) -> Expression {
    Expression::FunctionCall {
        name: QualifiedName::parse(name),
        args: args.into_iter().collect(),
        options,
        span: Span::synthetic(),
    }
}

// ============================================================================
// Type-expression helpers
// ============================================================================

/// `Name`
pub fn te_named(name: &str) -> TypeExpr {
    TypeExpr::Named(name.to_string())
}

/// `List<element>`
pub fn te_list(element: TypeExpr) -> TypeExpr {
    TypeExpr::Generic {
        name: "List".to_string(),
        args: vec![element],
    }
}

/// `Optional<inner>`
pub fn te_optional(inner: TypeExpr) -> TypeExpr {
    TypeExpr::Generic {
        name: "Optional".to_string(),
        args: vec![inner],
    }
}

/// `{name: ty, ...}`
pub fn te_record<'a, I>(fields: I) -> TypeExpr
where
    I: IntoIterator<Item = (&'a str, TypeExpr)>,
{
    TypeExpr::Record(
        fields
            .into_iter()
            .map(|(name, ty)| (name.to_string(), ty))
            .collect(),
    )
}
