//! # Runtime Type Mirror
//!
//! The DAG runtime carries its own type enum for values crossing the
//! execution boundary. Every semantic [`Type`] maps onto it except the
//! three compile-time-only forms: `Function`, `RowVar`, and `OpenRecord`
//! (the last must be closed by substitution before lowering). Asking to
//! convert one of those is a programming error, not a user error.

use super::Type;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Raised when compiler-internal types are asked to cross the runtime
/// boundary. Reaching this indicates a checker or lowering bug, never bad
/// user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compile-time-only type {type_repr} has no runtime representation")]
pub struct ProgrammerError {
    pub type_repr: String,
}

/// Mirror of the runtime's value-type enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeType {
    String,
    Int,
    Float,
    Boolean,
    Nothing,
    List(Box<RuntimeType>),
    Map(Box<RuntimeType>, Box<RuntimeType>),
    Optional(Box<RuntimeType>),
    Record(BTreeMap<String, RuntimeType>),
    Union(Vec<RuntimeType>),
}

impl fmt::Display for RuntimeType {
    /// Rendered by round-tripping through the semantic form, keeping the
    /// two pretty-printers in lockstep.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", from_runtime_type(self))
    }
}

/// Convert a semantic type to its runtime mirror.
///
/// `Function`, `RowVar`, and `OpenRecord` have no runtime representation;
/// converting them returns [`ProgrammerError`]. Well-formed lowering never
/// produces them.
pub fn to_runtime_type(ty: &Type) -> Result<RuntimeType, ProgrammerError> {
    match ty {
        Type::String => Ok(RuntimeType::String),
        Type::Int => Ok(RuntimeType::Int),
        Type::Float => Ok(RuntimeType::Float),
        Type::Boolean => Ok(RuntimeType::Boolean),
        Type::Nothing => Ok(RuntimeType::Nothing),
        Type::List(element) => Ok(RuntimeType::List(Box::new(to_runtime_type(element)?))),
        Type::Map(key, value) => Ok(RuntimeType::Map(
            Box::new(to_runtime_type(key)?),
            Box::new(to_runtime_type(value)?),
        )),
        Type::Optional(inner) => Ok(RuntimeType::Optional(Box::new(to_runtime_type(inner)?))),
        Type::Record(fields) => {
            let mut converted = BTreeMap::new();
            for (name, field) in fields {
                converted.insert(name.clone(), to_runtime_type(field)?);
            }
            Ok(RuntimeType::Record(converted))
        }
        Type::Union(members) => {
            let converted: Result<Vec<RuntimeType>, ProgrammerError> =
                members.iter().map(to_runtime_type).collect();
            Ok(RuntimeType::Union(converted?))
        }
        Type::Function(_, _) | Type::RowVar(_) | Type::OpenRecord(_, _) => Err(ProgrammerError {
            type_repr: ty.to_string(),
        }),
    }
}

/// Convert a runtime type back into the semantic form. Total: every
/// runtime type has a semantic counterpart.
pub fn from_runtime_type(ty: &RuntimeType) -> Type {
    match ty {
        RuntimeType::String => Type::String,
        RuntimeType::Int => Type::Int,
        RuntimeType::Float => Type::Float,
        RuntimeType::Boolean => Type::Boolean,
        RuntimeType::Nothing => Type::Nothing,
        RuntimeType::List(element) => Type::List(Box::new(from_runtime_type(element))),
        RuntimeType::Map(key, value) => Type::Map(
            Box::new(from_runtime_type(key)),
            Box::new(from_runtime_type(value)),
        ),
        RuntimeType::Optional(inner) => Type::Optional(Box::new(from_runtime_type(inner))),
        RuntimeType::Record(fields) => Type::Record(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), from_runtime_type(field)))
                .collect(),
        ),
        RuntimeType::Union(members) => Type::union(members.iter().map(from_runtime_type)),
    }
}
