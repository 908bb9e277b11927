//! # Subtyping Lattice
//!
//! The reflexive, transitive `S <: T` relation together with its join
//! (`lub`), meet (`glb`), and the human-readable failure explanation the
//! error formatter renders.
//!
//! Rules, in priority order:
//!
//! 1. `S == T`
//! 2. `Nothing <: T` for every `T`
//! 3. `List<S> <: List<T>` iff `S <: T`; same for `Optional`
//! 4. `Map<K, S> <: Map<K, T>` iff keys are equal and `S <: T`
//! 5. `Record(A) <: Record(B)` iff every field of `B` is present in `A`
//!    with a subtype-compatible value (width + depth)
//! 6. `Union(M) <: T` iff every member is; `S <: Union(M)` iff some
//!    member admits `S`
//! 7. `(P1) => R1 <: (P2) => R2` iff arities match, parameters are
//!    contravariant, and returns are covariant
//!
//! Types are finite acyclic terms, so the structural recursion terminates
//! without memoization.

use super::Type;

/// Check whether `sub` is a subtype of `sup`.
pub fn is_subtype(sub: &Type, sup: &Type) -> bool {
    // Rule 1: reflexivity on canonical forms
    if sub == sup {
        return true;
    }

    // Rule 2: Nothing is the bottom type
    if matches!(sub, Type::Nothing) {
        return true;
    }

    // Rule 6a: a union is a subtype when every member is.
    // Checked before 6b so union-vs-union distributes over the sub side.
    if let Type::Union(members) = sub {
        return members.iter().all(|member| is_subtype(member, sup));
    }

    // Rule 6b: anything is a subtype of a union admitting it
    if let Type::Union(members) = sup {
        return members.iter().any(|member| is_subtype(sub, member));
    }

    match (sub, sup) {
        // Rule 3: covariant containers
        (Type::List(s), Type::List(t)) | (Type::Optional(s), Type::Optional(t)) => {
            is_subtype(s, t)
        }

        // Rule 4: maps are invariant in the key, covariant in the value
        (Type::Map(sub_key, sub_value), Type::Map(sup_key, sup_value)) => {
            sub_key == sup_key && is_subtype(sub_value, sup_value)
        }

        // Rule 5: record width + depth. An open record guarantees at least
        // its listed fields, so it may stand on the sub side.
        (Type::Record(sub_fields), Type::Record(sup_fields))
        | (Type::OpenRecord(sub_fields, _), Type::Record(sup_fields)) => {
            sup_fields.iter().all(|(name, sup_field)| {
                sub_fields
                    .get(name)
                    .is_some_and(|sub_field| is_subtype(sub_field, sup_field))
            })
        }

        // Rule 7: functions are contravariant in parameters, covariant in
        // the return type
        (Type::Function(sub_params, sub_ret), Type::Function(sup_params, sup_ret)) => {
            sub_params.len() == sup_params.len()
                && sup_params
                    .iter()
                    .zip(sub_params)
                    .all(|(sup_param, sub_param)| is_subtype(sup_param, sub_param))
                && is_subtype(sub_ret, sup_ret)
        }

        _ => false,
    }
}

/// Least upper bound of two types.
///
/// When one side already subsumes the other, the supertype is returned;
/// otherwise the result is the flattened, deduplicated union of both.
pub fn lub(a: &Type, b: &Type) -> Type {
    if is_subtype(a, b) {
        return b.clone();
    }
    if is_subtype(b, a) {
        return a.clone();
    }
    Type::union([a.clone(), b.clone()])
}

/// Greatest lower bound of two types; `Nothing` when they are disjoint.
pub fn glb(a: &Type, b: &Type) -> Type {
    if is_subtype(a, b) {
        return a.clone();
    }
    if is_subtype(b, a) {
        return b.clone();
    }
    // Meets distribute over union members; disjoint members drop out
    if let Type::Union(members) = a {
        return Type::union(
            members
                .iter()
                .map(|member| glb(member, b))
                .filter(|meet| *meet != Type::Nothing),
        );
    }
    if let Type::Union(members) = b {
        return Type::union(
            members
                .iter()
                .map(|member| glb(a, member))
                .filter(|meet| *meet != Type::Nothing),
        );
    }
    Type::Nothing
}

/// Reduce a non-empty list of types with [`lub`] from the left.
/// Returns `None` on an empty slice.
pub fn common_type(types: &[Type]) -> Option<Type> {
    let (first, rest) = types.split_first()?;
    Some(
        rest.iter()
            .fold(first.clone(), |acc, next| lub(&acc, next)),
    )
}

/// Produce a short English reason for a failed subtype check.
///
/// Only called after [`is_subtype`] has returned false; the fallback arm
/// covers every combination the specific arms do not.
pub fn explain_failure(sub: &Type, sup: &Type) -> String {
    match (sub, sup) {
        (Type::Record(sub_fields), Type::Record(sup_fields))
        | (Type::OpenRecord(sub_fields, _), Type::Record(sup_fields)) => {
            let missing: Vec<&str> = sup_fields
                .keys()
                .filter(|name| !sub_fields.contains_key(*name))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return format!("missing record field(s): {}", missing.join(", "));
            }
            for (name, sup_field) in sup_fields {
                if let Some(sub_field) = sub_fields.get(name) {
                    if !is_subtype(sub_field, sup_field) {
                        return format!(
                            "field '{name}' has type {sub_field} but {sup_field} is required"
                        );
                    }
                }
            }
            format!("{sub} is not a subtype of {sup}")
        }
        (Type::List(sub_element), Type::List(sup_element)) => {
            format!(
                "list element mismatch: {}",
                explain_failure(sub_element, sup_element)
            )
        }
        (Type::Function(sub_params, _), Type::Function(sup_params, _))
            if sub_params.len() != sup_params.len() =>
        {
            format!(
                "function takes {} parameter(s) but {} were expected",
                sub_params.len(),
                sup_params.len()
            )
        }
        _ => format!("{sub} is not a subtype of {sup}"),
    }
}
