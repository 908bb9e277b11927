//! # Function Registry
//!
//! Signatures of the runtime modules the checker can call, indexed three
//! ways: by simple name (several namespaces may export the same name), by
//! unique qualified name, and as a namespace set. All three views live in
//! one immutable snapshot published through `ArcSwap`, so provider threads
//! registering and deregistering signatures are always atomically visible
//! to checker threads; no reader ever observes a torn registry.
//!
//! ## Design
//!
//! - Readers load the current snapshot without holding locks
//! - Writers clone the snapshot, mutate, and publish it atomically under a
//!   writer mutex
//! - The namespace set is derived from the qualified index on every write

pub mod stdlib;

pub use stdlib::stdlib_signatures;

use crate::ast::{QualifiedName, Span};
use crate::error::CompileError;
use crate::types::{RowVarId, RowVarSource, Substitution, Type};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

// ============================================================================
// Signatures
// ============================================================================

/// The compile-time signature of a runtime module function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// Simple name, e.g. `filter`
    pub name: String,
    /// Dotted namespace, e.g. `stdlib.collection`; `None` for globals
    pub namespace: Option<String>,
    /// Ordered `(name, type)` parameters
    pub params: Vec<(String, Type)>,
    pub return_type: Type,
    /// Opaque tag binding the signature to its runtime module
    pub impl_tag: String,
    /// Quantified row variables; non-empty means the signature is
    /// row-polymorphic and every call site instantiates fresh ids
    pub row_vars: Vec<RowVarId>,
}

impl FunctionSignature {
    /// A monomorphic signature.
    pub fn new<S: Into<String>>(
        namespace: Option<S>,
        name: S,
        params: Vec<(String, Type)>,
        return_type: Type,
        impl_tag: S,
    ) -> Self {
        FunctionSignature {
            name: name.into(),
            namespace: namespace.map(Into::into),
            params,
            return_type,
            impl_tag: impl_tag.into(),
            row_vars: Vec::new(),
        }
    }

    /// Quantify the given row variables, making the signature
    /// row-polymorphic.
    pub fn with_row_vars(mut self, row_vars: Vec<RowVarId>) -> Self {
        self.row_vars = row_vars;
        self
    }

    /// `namespace.name`, unique within a registry.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}.{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_row_polymorphic(&self) -> bool {
        !self.row_vars.is_empty()
    }

    /// Produce a copy with every quantified row variable replaced by a
    /// fresh id from `source`, preventing cross-call interference.
    pub fn instantiate(&self, source: &mut RowVarSource) -> FunctionSignature {
        if !self.is_row_polymorphic() {
            return self.clone();
        }
        let mut renaming = Substitution::new();
        let mut fresh_vars = Vec::with_capacity(self.row_vars.len());
        for var in &self.row_vars {
            let fresh = source.fresh();
            fresh_vars.push(fresh);
            // Renaming a quantified variable never conflicts: ids are unique
            let _ = renaming.compose(Substitution::singleton(*var, Type::RowVar(fresh)));
        }
        FunctionSignature {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            params: self
                .params
                .iter()
                .map(|(name, ty)| (name.clone(), renaming.apply(ty)))
                .collect(),
            return_type: renaming.apply(&self.return_type),
            impl_tag: self.impl_tag.clone(),
            row_vars: fresh_vars,
        }
    }
}

// ============================================================================
// Namespace scope
// ============================================================================

/// Per-source import state: which namespaces are wildcard-visible and
/// which aliases are in effect. Extended by returning a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceScope {
    wildcard_imports: BTreeSet<String>,
    aliases: BTreeMap<String, String>,
}

impl NamespaceScope {
    pub fn new() -> Self {
        NamespaceScope::default()
    }

    /// A copy with `namespace` wildcard-imported.
    pub fn with_wildcard(&self, namespace: &str) -> Self {
        let mut scope = self.clone();
        scope.wildcard_imports.insert(namespace.to_string());
        scope
    }

    /// A copy with `alias` mapped to `namespace`.
    pub fn with_alias(&self, alias: &str, namespace: &str) -> Self {
        let mut scope = self.clone();
        scope.aliases.insert(alias.to_string(), namespace.to_string());
        scope
    }

    /// True when the source has no `use` declarations at all. Simple-name
    /// lookup then falls back to searching namespaced signatures (legacy
    /// behavior; see [`FunctionRegistry::lookup_in_scope`]).
    pub fn has_no_imports(&self) -> bool {
        self.wildcard_imports.is_empty() && self.aliases.is_empty()
    }

    pub fn wildcard_imports(&self) -> impl Iterator<Item = &str> {
        self.wildcard_imports.iter().map(String::as_str)
    }

    pub fn resolve_alias(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// The immutable state one registry snapshot holds. Cloned on write,
/// shared on read.
#[derive(Debug, Clone, Default)]
struct RegistryIndex {
    by_simple: HashMap<String, Vec<FunctionSignature>>,
    by_qualified: HashMap<String, FunctionSignature>,
    namespaces: BTreeSet<String>,
}

impl RegistryIndex {
    /// The namespace set is always derived from the qualified index, so
    /// the three views cannot drift apart.
    fn rebuild_namespaces(&mut self) {
        self.namespaces = self
            .by_qualified
            .values()
            .filter_map(|sig| sig.namespace.clone())
            .collect();
    }
}

/// Thread-safe signature registry. Cheap to share (`Arc` inside); clone
/// handles freely.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    snapshot: ArcSwap<RegistryIndex>,
    write_lock: Mutex<()>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry::default()
    }

    /// Insert a signature into all three indexes atomically. An existing
    /// signature with the same `(namespace, name)` is replaced.
    pub fn register(&self, sig: FunctionSignature) {
        let _guard = self.write_lock.lock();
        let mut index: RegistryIndex = (**self.snapshot.load()).clone();

        let qualified = sig.qualified_name();
        if index.by_qualified.remove(&qualified).is_some() {
            if let Some(sigs) = index.by_simple.get_mut(&sig.name) {
                sigs.retain(|existing| existing.qualified_name() != qualified);
            }
        }
        index
            .by_simple
            .entry(sig.name.clone())
            .or_default()
            .push(sig.clone());
        index.by_qualified.insert(qualified, sig);
        index.rebuild_namespaces();

        self.snapshot.store(Arc::new(index));
    }

    /// Register a batch of signatures under one atomic publish.
    pub fn register_all<I: IntoIterator<Item = FunctionSignature>>(&self, sigs: I) {
        let _guard = self.write_lock.lock();
        let mut index: RegistryIndex = (**self.snapshot.load()).clone();

        for sig in sigs {
            let qualified = sig.qualified_name();
            if index.by_qualified.remove(&qualified).is_some() {
                if let Some(existing) = index.by_simple.get_mut(&sig.name) {
                    existing.retain(|s| s.qualified_name() != qualified);
                }
            }
            index
                .by_simple
                .entry(sig.name.clone())
                .or_default()
                .push(sig.clone());
            index.by_qualified.insert(qualified, sig);
        }
        index.rebuild_namespaces();

        self.snapshot.store(Arc::new(index));
    }

    /// Remove a signature from all three indexes. The namespace disappears
    /// from the namespace set with its last member.
    pub fn deregister(&self, qualified_name: &str) -> Option<FunctionSignature> {
        let _guard = self.write_lock.lock();
        let mut index: RegistryIndex = (**self.snapshot.load()).clone();

        let removed = index.by_qualified.remove(qualified_name)?;
        if let Some(sigs) = index.by_simple.get_mut(&removed.name) {
            sigs.retain(|sig| sig.qualified_name() != qualified_name);
            if sigs.is_empty() {
                index.by_simple.remove(&removed.name);
            }
        }
        index.rebuild_namespaces();

        self.snapshot.store(Arc::new(index));
        Some(removed)
    }

    /// All signatures exporting `name`, across namespaces.
    pub fn lookup_simple(&self, name: &str) -> Vec<FunctionSignature> {
        self.snapshot
            .load()
            .by_simple
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// The unique signature under `qualified_name`, if registered.
    pub fn lookup_qualified(&self, qualified_name: &str) -> Option<FunctionSignature> {
        self.snapshot.load().by_qualified.get(qualified_name).cloned()
    }

    /// All registered namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        self.snapshot.load().namespaces.iter().cloned().collect()
    }

    /// True when `path` is a registered namespace or a dotted prefix of
    /// one (`use a.b` is valid when `a.b.c` is registered).
    pub fn has_namespace_or_prefix(&self, path: &str) -> bool {
        let snapshot = self.snapshot.load();
        snapshot.namespaces.iter().any(|namespace| {
            namespace == path || namespace.starts_with(&format!("{path}."))
        })
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().by_qualified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a call-site name against a namespace scope.
    ///
    /// Simple names search unnamespaced signatures plus every
    /// wildcard-imported namespace. When the source has no `use`
    /// declarations at all, namespaced signatures join the candidate set
    /// (legacy behavior, kept deliberately; import namespaces explicitly
    /// in new code). Dotted names expand a leading alias and then resolve
    /// against the qualified index.
    pub fn lookup_in_scope(
        &self,
        name: &QualifiedName,
        scope: &NamespaceScope,
        span: Span,
    ) -> Result<FunctionSignature, CompileError> {
        if name.is_simple() {
            self.lookup_simple_in_scope(name.simple_name(), scope, span)
        } else {
            self.lookup_qualified_in_scope(name, scope, span)
        }
    }

    fn lookup_simple_in_scope(
        &self,
        simple: &str,
        scope: &NamespaceScope,
        span: Span,
    ) -> Result<FunctionSignature, CompileError> {
        // A bare alias is an incomplete reference, not a function
        if scope.is_alias(simple) {
            return Err(CompileError::UndefinedFunction {
                name: simple.to_string(),
                suggestions: Vec::new(),
                span: Some(span),
            });
        }

        let all = self.lookup_simple(simple);
        let candidates: Vec<&FunctionSignature> = all
            .iter()
            .filter(|sig| match &sig.namespace {
                None => true,
                Some(namespace) => {
                    scope.wildcard_imports().any(|imported| imported == namespace)
                        || scope.has_no_imports()
                }
            })
            .collect();

        match candidates.len() {
            1 => Ok(candidates[0].clone()),
            0 => {
                let mut suggestions: Vec<String> = all
                    .iter()
                    .filter(|sig| sig.namespace.is_some())
                    .map(FunctionSignature::qualified_name)
                    .collect();
                suggestions.sort();
                Err(CompileError::UndefinedFunction {
                    name: simple.to_string(),
                    suggestions,
                    span: Some(span),
                })
            }
            _ => {
                let mut qualified: Vec<String> = candidates
                    .iter()
                    .map(|sig| sig.qualified_name())
                    .collect();
                qualified.sort();
                Err(CompileError::AmbiguousFunction {
                    name: simple.to_string(),
                    candidates: qualified,
                    span: Some(span),
                })
            }
        }
    }

    fn lookup_qualified_in_scope(
        &self,
        name: &QualifiedName,
        scope: &NamespaceScope,
        span: Span,
    ) -> Result<FunctionSignature, CompileError> {
        // Expand a leading alias: `m.f` with `use ns as m` means `ns.f`
        let full = match scope.resolve_alias(name.head()) {
            Some(namespace) => {
                let mut parts = vec![namespace.to_string()];
                parts.extend(name.parts[1..].iter().cloned());
                parts.join(".")
            }
            None => name.to_string(),
        };

        if let Some(sig) = self.lookup_qualified(&full) {
            return Ok(sig);
        }

        let resolved = QualifiedName::parse(&full);
        let namespace = resolved.namespace().unwrap_or_default();
        if !self.has_namespace_or_prefix(&namespace) {
            return Err(CompileError::UndefinedNamespace {
                namespace,
                span: Some(span),
            });
        }

        let mut suggestions: Vec<String> = self
            .lookup_simple(resolved.simple_name())
            .iter()
            .map(FunctionSignature::qualified_name)
            .collect();
        suggestions.sort();
        Err(CompileError::UndefinedFunction {
            name: full,
            suggestions,
            span: Some(span),
        })
    }
}
