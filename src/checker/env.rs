//! Immutable checking environment.
//!
//! A snapshot of everything name resolution needs at one point in the
//! declaration sequence: type aliases, variable bindings, the registry
//! handle, and the namespace scope. Extension returns a new value; the
//! checker threads environments through declarations in source order and
//! never mutates one in place.

use crate::registry::{FunctionRegistry, NamespaceScope};
use crate::types::Type;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct TypeEnvironment<'r> {
    aliases: BTreeMap<String, Type>,
    variables: BTreeMap<String, Type>,
    registry: &'r FunctionRegistry,
    scope: NamespaceScope,
}

impl<'r> TypeEnvironment<'r> {
    pub fn new(registry: &'r FunctionRegistry) -> Self {
        TypeEnvironment {
            aliases: BTreeMap::new(),
            variables: BTreeMap::new(),
            registry,
            scope: NamespaceScope::new(),
        }
    }

    /// A copy with `name` aliased to `ty`.
    pub fn with_alias(&self, name: &str, ty: Type) -> Self {
        let mut env = self.clone();
        env.aliases.insert(name.to_string(), ty);
        env
    }

    /// A copy with the variable `name` bound to `ty`.
    pub fn with_variable(&self, name: &str, ty: Type) -> Self {
        let mut env = self.clone();
        env.variables.insert(name.to_string(), ty);
        env
    }

    /// A copy with several variables bound at once (lambda parameters).
    pub fn with_variables<'a, I>(&self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Type)>,
    {
        let mut env = self.clone();
        for (name, ty) in bindings {
            env.variables.insert(name.to_string(), ty);
        }
        env
    }

    /// A copy with a replaced namespace scope.
    pub fn with_scope(&self, scope: NamespaceScope) -> Self {
        let mut env = self.clone();
        env.scope = scope;
        env
    }

    pub fn lookup_alias(&self, name: &str) -> Option<&Type> {
        self.aliases.get(name)
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&Type> {
        self.variables.get(name)
    }

    pub fn registry(&self) -> &'r FunctionRegistry {
        self.registry
    }

    pub fn scope(&self) -> &NamespaceScope {
        &self.scope
    }
}
