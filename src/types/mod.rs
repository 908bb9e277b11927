//! # Semantic Types
//!
//! The `Type` sum type that flows through the checker, the subtyping
//! lattice, the row unifier, and the IR. Types are finite acyclic terms:
//! structural comparison always terminates.
//!
//! ## Construction invariants
//!
//! - Record fields are canonicalized (`BTreeMap`, key order irrelevant).
//! - Unions are built through [`Type::union`]: nested unions are flattened,
//!   members are deduplicated and sorted by their canonical name, and the
//!   result collapses to the single member when one remains. A constructed
//!   `Union` never nests and never has fewer than two members.
//! - Row variables appear only inside `OpenRecord` or transiently under
//!   substitution during unification.
//! - `Function` and `RowVar` are compile-time only; they have no runtime
//!   value representation (see [`runtime`]).

pub mod rows;
pub mod runtime;
pub mod subtype;

pub use rows::{RowVarSource, Substitution};
pub use runtime::{from_runtime_type, to_runtime_type, ProgrammerError, RuntimeType};
pub use subtype::{common_type, explain_failure, glb, is_subtype, lub};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier for a row variable.
///
/// Fresh ids are minted per call site by [`RowVarSource`]; ids are never
/// persisted and never visible at runtime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct RowVarId(pub u64);

impl fmt::Display for RowVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ρ{}", self.0)
    }
}

/// Semantic type of a Constellation expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// UTF-8 text
    String,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// Boolean
    Boolean,
    /// Bottom type; subtype of every type. The element type of `[]`.
    Nothing,
    /// Homogeneous ordered sequence; covariant in the element type
    List(Box<Type>),
    /// Invariant in the key type, covariant in the value type
    Map(Box<Type>, Box<Type>),
    /// A value that may be absent; covariant
    Optional(Box<Type>),
    /// Closed record; key order irrelevant
    Record(BTreeMap<String, Type>),
    /// Record with a row variable standing for "any further fields".
    /// Only meaningful at function-parameter sites (row polymorphism).
    OpenRecord(BTreeMap<String, Type>, RowVarId),
    /// A bare row variable; only appears under substitution
    RowVar(RowVarId),
    /// Function type; compile-time only. Contravariant in each parameter,
    /// covariant in the return type.
    Function(Vec<Type>, Box<Type>),
    /// Untagged union; members are flattened, deduplicated, and sorted by
    /// canonical name. Never empty, never a singleton.
    Union(Vec<Type>),
}

impl Type {
    /// Build a closed record from `(name, type)` pairs.
    pub fn record<I, S>(fields: I) -> Type
    where
        I: IntoIterator<Item = (S, Type)>,
        S: Into<String>,
    {
        Type::Record(fields.into_iter().map(|(n, t)| (n.into(), t)).collect())
    }

    /// Build an open record from `(name, type)` pairs and a row variable.
    pub fn open_record<I, S>(fields: I, row: RowVarId) -> Type
    where
        I: IntoIterator<Item = (S, Type)>,
        S: Into<String>,
    {
        Type::OpenRecord(
            fields.into_iter().map(|(n, t)| (n.into(), t)).collect(),
            row,
        )
    }

    /// Build a list type.
    pub fn list(element: Type) -> Type {
        Type::List(Box::new(element))
    }

    /// Build an optional type.
    pub fn optional(inner: Type) -> Type {
        Type::Optional(Box::new(inner))
    }

    /// Build a map type.
    pub fn map(key: Type, value: Type) -> Type {
        Type::Map(Box::new(key), Box::new(value))
    }

    /// Build a function type.
    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function(params, Box::new(ret))
    }

    /// Build a union, maintaining the union invariants: nested unions are
    /// flattened, members deduplicated and sorted by canonical name, and
    /// the result collapses when fewer than two members remain.
    pub fn union<I: IntoIterator<Item = Type>>(members: I) -> Type {
        let mut flat: Vec<Type> = Vec::new();
        for member in members {
            match member {
                Type::Union(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        flat.sort_by(|a, b| a.canonical_name().cmp(&b.canonical_name()));
        flat.dedup();
        match flat.len() {
            0 => Type::Nothing,
            1 => flat.remove(0),
            _ => Type::Union(flat),
        }
    }

    /// Canonical name of a type; used to tag union members and to sort
    /// them into a stable order.
    pub fn canonical_name(&self) -> String {
        self.to_string()
    }

    /// True for `Record` and `OpenRecord`.
    pub fn is_record(&self) -> bool {
        matches!(self, Type::Record(_) | Type::OpenRecord(_, _))
    }

    /// True for types the merge operator accepts: records and lists of
    /// records.
    pub fn is_mergeable(&self) -> bool {
        match self {
            Type::Record(_) => true,
            Type::List(element) => element.is_record(),
            _ => false,
        }
    }

    /// True if the type is numeric (`Int` or `Float`).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// True if any `RowVar` or `OpenRecord` occurs anywhere in the type.
    /// Such a type must be resolved by substitution before lowering.
    pub fn has_row_vars(&self) -> bool {
        match self {
            Type::RowVar(_) | Type::OpenRecord(_, _) => true,
            Type::String | Type::Int | Type::Float | Type::Boolean | Type::Nothing => false,
            Type::List(element) | Type::Optional(element) => element.has_row_vars(),
            Type::Map(key, value) => key.has_row_vars() || value.has_row_vars(),
            Type::Record(fields) => fields.values().any(Type::has_row_vars),
            Type::Function(params, ret) => {
                params.iter().any(Type::has_row_vars) || ret.has_row_vars()
            }
            Type::Union(members) => members.iter().any(Type::has_row_vars),
        }
    }

    /// Record fields if this is a `Record` or `OpenRecord`.
    pub fn record_fields(&self) -> Option<&BTreeMap<String, Type>> {
        match self {
            Type::Record(fields) | Type::OpenRecord(fields, _) => Some(fields),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::String => write!(f, "String"),
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Boolean => write!(f, "Boolean"),
            Type::Nothing => write!(f, "Nothing"),
            Type::List(element) => write!(f, "List<{element}>"),
            Type::Map(key, value) => write!(f, "Map<{key}, {value}>"),
            Type::Optional(inner) => write!(f, "Optional<{inner}>"),
            Type::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, "}}")
            }
            Type::OpenRecord(fields, row) => {
                write!(f, "{{")?;
                for (name, ty) in fields {
                    write!(f, "{name}: {ty}, ")?;
                }
                write!(f, "| {row}}}")
            }
            Type::RowVar(row) => write!(f, "{row}"),
            Type::Function(params, ret) => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") => {ret}")
            }
            Type::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
        }
    }
}
