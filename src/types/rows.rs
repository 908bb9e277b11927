//! # Row Unification
//!
//! Unifies record arguments against open-record parameters of
//! row-polymorphic functions. The product is a [`Substitution`] binding
//! each row variable to the fields it stands for; applying the
//! substitution to the signature's return type yields the call's resolved
//! type.
//!
//! Every call site instantiates fresh row-variable ids from the checking
//! invocation's [`RowVarSource`] before unifying, so concurrent calls to
//! the same signature never interfere.

use super::{subtype::is_subtype, RowVarId, Type};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Why two types failed to unify.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowUnifyError {
    /// The parameter requires a field the argument does not carry
    #[error("record is missing required field '{field}'")]
    MissingField { field: String },
    /// A shared field has an incompatible type
    #[error("field '{field}' has type {actual} but {expected} is required")]
    IncompatibleField {
        field: String,
        actual: String,
        expected: String,
    },
    /// The argument is not a record at all
    #[error("expected a record but found {actual}")]
    NotARecord { actual: String },
    /// A non-row parameter failed plain subtyping
    #[error("{actual} is not compatible with {expected}")]
    Mismatch { actual: String, expected: String },
    /// Two substitutions bind the same row variable to different types
    #[error("row variable {var} is bound to both {existing} and {incoming}")]
    Conflict {
        var: RowVarId,
        existing: String,
        incoming: String,
    },
}

/// Monotonic source of fresh row-variable ids.
///
/// One source is owned per check invocation; ids are never reused within
/// an invocation and never persisted.
#[derive(Debug, Default)]
pub struct RowVarSource {
    next: u64,
}

impl RowVarSource {
    pub fn new() -> Self {
        RowVarSource::default()
    }

    /// Mint a fresh row-variable id.
    pub fn fresh(&mut self) -> RowVarId {
        let id = RowVarId(self.next);
        self.next += 1;
        id
    }
}

/// A mapping from row variables to the types they stand for.
///
/// Substitutions compose monoidally; composing two substitutions that
/// disagree on a variable fails with [`RowUnifyError::Conflict`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    bindings: BTreeMap<RowVarId, Type>,
}

impl Substitution {
    pub fn new() -> Self {
        Substitution::default()
    }

    /// A substitution with a single binding.
    pub fn singleton(var: RowVarId, ty: Type) -> Self {
        let mut subst = Substitution::new();
        subst.bindings.insert(var, ty);
        subst
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, var: RowVarId) -> Option<&Type> {
        self.bindings.get(&var)
    }

    /// Merge another substitution into this one. Bindings must agree on
    /// shared variables.
    pub fn compose(&mut self, other: Substitution) -> Result<(), RowUnifyError> {
        for (var, incoming) in other.bindings {
            match self.bindings.get(&var) {
                Some(existing) if *existing != incoming => {
                    return Err(RowUnifyError::Conflict {
                        var,
                        existing: existing.to_string(),
                        incoming: incoming.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    self.bindings.insert(var, incoming);
                }
            }
        }
        Ok(())
    }

    /// Replace every occurrence of a bound row variable with its image,
    /// recursing through records, lists, maps, optionals, functions, and
    /// unions. Unbound variables are left in place.
    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::RowVar(var) => self.get(*var).cloned().unwrap_or_else(|| ty.clone()),
            Type::OpenRecord(fields, var) => {
                let applied: BTreeMap<String, Type> = fields
                    .iter()
                    .map(|(name, field)| (name.clone(), self.apply(field)))
                    .collect();
                match self.get(*var) {
                    // The row resolved to concrete fields: close the record
                    Some(Type::Record(rest)) => {
                        let mut merged = applied;
                        for (name, field) in rest {
                            merged.entry(name.clone()).or_insert_with(|| field.clone());
                        }
                        Type::Record(merged)
                    }
                    // The row resolved to another open row: splice fields,
                    // keep the record open under the new variable
                    Some(Type::OpenRecord(rest, tail)) => {
                        let mut merged = applied;
                        for (name, field) in rest {
                            merged.entry(name.clone()).or_insert_with(|| field.clone());
                        }
                        Type::OpenRecord(merged, *tail)
                    }
                    Some(Type::RowVar(tail)) => Type::OpenRecord(applied, *tail),
                    // No binding (or a non-row image, which unification
                    // never produces): leave the record open
                    _ => Type::OpenRecord(applied, *var),
                }
            }
            Type::List(element) => Type::List(Box::new(self.apply(element))),
            Type::Optional(inner) => Type::Optional(Box::new(self.apply(inner))),
            Type::Map(key, value) => {
                Type::Map(Box::new(self.apply(key)), Box::new(self.apply(value)))
            }
            Type::Record(fields) => Type::Record(
                fields
                    .iter()
                    .map(|(name, field)| (name.clone(), self.apply(field)))
                    .collect(),
            ),
            Type::Function(params, ret) => Type::Function(
                params.iter().map(|param| self.apply(param)).collect(),
                Box::new(self.apply(ret)),
            ),
            Type::Union(members) => {
                Type::union(members.iter().map(|member| self.apply(member)))
            }
            Type::String | Type::Int | Type::Float | Type::Boolean | Type::Nothing => ty.clone(),
        }
    }
}

/// Unify an argument type against an open-record parameter type,
/// producing the substitution under which they become compatible.
///
/// `source` mints fresh row variables for the leftover-row case when two
/// open records meet.
pub fn unify(
    actual: &Type,
    param: &Type,
    source: &mut RowVarSource,
) -> Result<Substitution, RowUnifyError> {
    match (actual, param) {
        // Closed record against an open parameter: the row variable
        // captures whatever the parameter did not name.
        (Type::Record(actual_fields), Type::OpenRecord(param_fields, row)) => {
            check_required_fields(actual_fields, param_fields)?;
            let rest: BTreeMap<String, Type> = actual_fields
                .iter()
                .filter(|(name, _)| !param_fields.contains_key(*name))
                .map(|(name, field)| (name.clone(), field.clone()))
                .collect();
            Ok(Substitution::singleton(*row, Type::Record(rest)))
        }

        // Two open records: unify the field intersection, then relate the
        // two rows through a shared fresh tail.
        (Type::OpenRecord(actual_fields, actual_row), Type::OpenRecord(param_fields, param_row)) => {
            for (name, param_field) in param_fields {
                if let Some(actual_field) = actual_fields.get(name) {
                    if !is_subtype(actual_field, param_field) {
                        return Err(RowUnifyError::IncompatibleField {
                            field: name.clone(),
                            actual: actual_field.to_string(),
                            expected: param_field.to_string(),
                        });
                    }
                }
            }
            let tail = source.fresh();
            let actual_rest: BTreeMap<String, Type> = actual_fields
                .iter()
                .filter(|(name, _)| !param_fields.contains_key(*name))
                .map(|(name, field)| (name.clone(), field.clone()))
                .collect();
            let param_rest: BTreeMap<String, Type> = param_fields
                .iter()
                .filter(|(name, _)| !actual_fields.contains_key(*name))
                .map(|(name, field)| (name.clone(), field.clone()))
                .collect();

            let mut subst =
                Substitution::singleton(*param_row, Type::OpenRecord(actual_rest, tail));
            subst.compose(Substitution::singleton(
                *actual_row,
                Type::OpenRecord(param_rest, tail),
            ))?;
            Ok(subst)
        }

        (other, Type::OpenRecord(_, _)) => Err(RowUnifyError::NotARecord {
            actual: other.to_string(),
        }),

        // Non-row parameter: plain subtyping decides; no bindings arise
        (actual, param) if is_subtype(actual, param) => Ok(Substitution::new()),
        (actual, param) => Err(RowUnifyError::Mismatch {
            actual: actual.to_string(),
            expected: param.to_string(),
        }),
    }
}

fn check_required_fields(
    actual: &BTreeMap<String, Type>,
    required: &BTreeMap<String, Type>,
) -> Result<(), RowUnifyError> {
    for (name, param_field) in required {
        match actual.get(name) {
            None => {
                return Err(RowUnifyError::MissingField { field: name.clone() });
            }
            Some(actual_field) if !is_subtype(actual_field, param_field) => {
                return Err(RowUnifyError::IncompatibleField {
                    field: name.clone(),
                    actual: actual_field.to_string(),
                    expected: param_field.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}
