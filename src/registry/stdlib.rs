//! Builtin operator signatures.
//!
//! The checker resolves comparison and arithmetic operators through the
//! registry like any other call (`a < b` becomes a call to `lt`). This
//! catalog registers those operator signatures so embedders and tests can
//! seed a registry with one call; providers layer their own module
//! signatures on top.

use super::FunctionSignature;
use crate::types::Type;

fn op(
    namespace: &str,
    name: &str,
    params: &[(&str, Type)],
    return_type: Type,
) -> FunctionSignature {
    FunctionSignature {
        name: name.to_string(),
        namespace: Some(namespace.to_string()),
        params: params
            .iter()
            .map(|(param, ty)| ((*param).to_string(), ty.clone()))
            .collect(),
        return_type,
        impl_tag: format!("{namespace}.{name}"),
        row_vars: Vec::new(),
    }
}

/// The operator signatures the checker's desugarings look up.
pub fn stdlib_signatures() -> Vec<FunctionSignature> {
    let int2 = [("left", Type::Int), ("right", Type::Int)];
    let float2 = [("left", Type::Float), ("right", Type::Float)];
    let string2 = [("left", Type::String), ("right", Type::String)];
    let boolean2 = [("left", Type::Boolean), ("right", Type::Boolean)];

    vec![
        // Arithmetic
        op("stdlib.math", "add", &int2, Type::Int),
        op("stdlib.math", "subtract", &int2, Type::Int),
        op("stdlib.math", "multiply", &int2, Type::Int),
        op("stdlib.math", "divide", &int2, Type::Int),
        op("stdlib.math", "modulo", &int2, Type::Int),
        // Equality, one per comparable primitive
        op("stdlib.compare", "eq-int", &int2, Type::Boolean),
        op("stdlib.compare", "eq-float", &float2, Type::Boolean),
        op("stdlib.compare", "eq-string", &string2, Type::Boolean),
        op("stdlib.compare", "eq-boolean", &boolean2, Type::Boolean),
        // Ordering; numbers only
        op("stdlib.compare", "lt", &int2, Type::Boolean),
        op("stdlib.compare", "gt", &int2, Type::Boolean),
        op("stdlib.compare", "lte", &int2, Type::Boolean),
        op("stdlib.compare", "gte", &int2, Type::Boolean),
        // Logic and strings
        op("stdlib.logic", "not", &[("value", Type::Boolean)], Type::Boolean),
        op("stdlib.string", "concat", &string2, Type::String),
    ]
}
