//! # Intermediate Representation
//!
//! The typed DAG the optimizer transforms and the runtime executes. A
//! [`Program`] owns all nodes; nodes reference each other exclusively by
//! [`NodeId`], so dependencies are explicit and a topological order is
//! always derivable.
//!
//! ```text
//! TypedPipeline -> [IR Builder] -> Program -> [Optimizer] -> Program
//! ```
//!
//! Every node carries its output type. Optimizer passes return a new
//! `Program`; nothing here is shared mutable state.

use crate::ast::Literal;
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Node identity
// ============================================================================

/// Stable 128-bit node identifier, unique within a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Mint a fresh id.
    pub fn fresh() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// The higher-order collection operations the runtime provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HigherOrderKind {
    Filter,
    Map,
    All,
    Any,
    SortBy,
}

impl HigherOrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HigherOrderKind::Filter => "filter",
            HigherOrderKind::Map => "map",
            HigherOrderKind::All => "all",
            HigherOrderKind::Any => "any",
            HigherOrderKind::SortBy => "sortBy",
        }
    }

    /// Recognize a higher-order builtin by its simple name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "filter" => Some(HigherOrderKind::Filter),
            "map" => Some(HigherOrderKind::Map),
            "all" => Some(HigherOrderKind::All),
            "any" => Some(HigherOrderKind::Any),
            "sortBy" => Some(HigherOrderKind::SortBy),
            _ => None,
        }
    }
}

/// One segment of an interpolated string at the IR level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterpolationPart {
    Text(String),
    Node(NodeId),
}

/// Execution metadata lowered from the call options. The fallback, being
/// an expression, lowers to its own node and is referenced by id on the
/// [`Node::ModuleCall`] itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CallMeta {
    pub retry: Option<i64>,
    pub concurrency: Option<i64>,
    pub throttle: Option<crate::ast::Throttle>,
    pub timeout: Option<crate::ast::Duration>,
    pub delay: Option<crate::ast::Duration>,
    pub cache: Option<crate::ast::Duration>,
    pub backoff: Option<crate::ast::Backoff>,
    pub cache_backend: Option<String>,
}

/// An operator in the DAG. Every variant carries its output type;
/// dependencies are by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// A pipeline input; the runtime binds the value at execution time
    Input { name: String, ty: Type },
    /// A call into a runtime module
    ModuleCall {
        module: String,
        args: Vec<NodeId>,
        fallback: Option<NodeId>,
        meta: CallMeta,
        ty: Type,
    },
    /// A constant
    Literal { value: Literal, ty: Type },
    /// Record / record-list merge, right side winning on collisions
    Merge { left: NodeId, right: NodeId, ty: Type },
    /// Keep only the named fields of a record (or each record in a list)
    Project {
        source: NodeId,
        fields: Vec<String>,
        ty: Type,
    },
    /// Single field access (broadcast over lists)
    FieldAccess {
        source: NodeId,
        field: String,
        ty: Type,
    },
    Conditional {
        condition: NodeId,
        then_branch: NodeId,
        else_branch: NodeId,
        ty: Type,
    },
    And { left: NodeId, right: NodeId },
    Or { left: NodeId, right: NodeId },
    Not { operand: NodeId },
    /// `value when condition`: Optional-producing guard
    Guard {
        value: NodeId,
        condition: NodeId,
        ty: Type,
    },
    /// `left ?? right`
    Coalesce { left: NodeId, right: NodeId, ty: Type },
    /// Multi-way branch; conditions are evaluated in order
    Branch {
        cases: Vec<(NodeId, NodeId)>,
        otherwise: NodeId,
        ty: Type,
    },
    StringInterpolation { parts: Vec<InterpolationPart> },
    /// The binder of a higher-order lambda; referenced by the body
    /// subgraph. Never shared between unrelated lambdas by construction.
    LambdaParam { name: String, ty: Type },
    /// filter/map/all/any/sortBy over a list, with the lambda body lowered
    /// into the same program
    HigherOrder {
        kind: HigherOrderKind,
        source: NodeId,
        binder: NodeId,
        body: NodeId,
        ty: Type,
    },
    ListLiteral { elements: Vec<NodeId>, ty: Type },
}

impl Node {
    /// The node's output type.
    pub fn ty(&self) -> Type {
        match self {
            Node::Input { ty, .. }
            | Node::ModuleCall { ty, .. }
            | Node::Literal { ty, .. }
            | Node::Merge { ty, .. }
            | Node::Project { ty, .. }
            | Node::FieldAccess { ty, .. }
            | Node::Conditional { ty, .. }
            | Node::Guard { ty, .. }
            | Node::Coalesce { ty, .. }
            | Node::Branch { ty, .. }
            | Node::LambdaParam { ty, .. }
            | Node::HigherOrder { ty, .. }
            | Node::ListLiteral { ty, .. } => ty.clone(),
            Node::And { .. } | Node::Or { .. } | Node::Not { .. } => Type::Boolean,
            Node::StringInterpolation { .. } => Type::String,
        }
    }

    /// Every node id this node depends on, in argument order.
    pub fn dependencies(&self) -> Vec<NodeId> {
        match self {
            Node::Input { .. } | Node::Literal { .. } | Node::LambdaParam { .. } => Vec::new(),
            Node::ModuleCall { args, fallback, .. } => {
                let mut deps = args.clone();
                deps.extend(fallback.iter().copied());
                deps
            }
            Node::Merge { left, right, .. }
            | Node::And { left, right }
            | Node::Or { left, right }
            | Node::Coalesce { left, right, .. } => vec![*left, *right],
            Node::Project { source, .. } | Node::FieldAccess { source, .. } => vec![*source],
            Node::Conditional {
                condition,
                then_branch,
                else_branch,
                ..
            } => vec![*condition, *then_branch, *else_branch],
            Node::Not { operand } => vec![*operand],
            Node::Guard {
                value, condition, ..
            } => vec![*value, *condition],
            Node::Branch {
                cases, otherwise, ..
            } => {
                let mut deps = Vec::with_capacity(cases.len() * 2 + 1);
                for (condition, body) in cases {
                    deps.push(*condition);
                    deps.push(*body);
                }
                deps.push(*otherwise);
                deps
            }
            Node::StringInterpolation { parts } => parts
                .iter()
                .filter_map(|part| match part {
                    InterpolationPart::Node(id) => Some(*id),
                    InterpolationPart::Text(_) => None,
                })
                .collect(),
            Node::HigherOrder {
                source,
                binder,
                body,
                ..
            } => vec![*source, *binder, *body],
            Node::ListLiteral { elements, .. } => elements.clone(),
        }
    }

    /// Short name of the variant, used in diagnostics and CSE keys.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Input { .. } => "input",
            Node::ModuleCall { .. } => "module_call",
            Node::Literal { .. } => "literal",
            Node::Merge { .. } => "merge",
            Node::Project { .. } => "project",
            Node::FieldAccess { .. } => "field_access",
            Node::Conditional { .. } => "conditional",
            Node::And { .. } => "and",
            Node::Or { .. } => "or",
            Node::Not { .. } => "not",
            Node::Guard { .. } => "guard",
            Node::Coalesce { .. } => "coalesce",
            Node::Branch { .. } => "branch",
            Node::StringInterpolation { .. } => "string_interpolation",
            Node::LambdaParam { .. } => "lambda_param",
            Node::HigherOrder { .. } => "higher_order",
            Node::ListLiteral { .. } => "list_literal",
        }
    }

    /// Rewrite every dependency through `remap`. Ids absent from the map
    /// are kept.
    pub(crate) fn remap_dependencies(&mut self, remap: &HashMap<NodeId, NodeId>) {
        let lookup = |id: &mut NodeId| {
            if let Some(target) = remap.get(id) {
                *id = *target;
            }
        };
        match self {
            Node::Input { .. } | Node::Literal { .. } | Node::LambdaParam { .. } => {}
            Node::ModuleCall { args, fallback, .. } => {
                for id in args.iter_mut() {
                    lookup(id);
                }
                if let Some(id) = fallback {
                    lookup(id);
                }
            }
            Node::Merge { left, right, .. }
            | Node::And { left, right }
            | Node::Or { left, right }
            | Node::Coalesce { left, right, .. } => {
                lookup(left);
                lookup(right);
            }
            Node::Project { source, .. } | Node::FieldAccess { source, .. } => lookup(source),
            Node::Conditional {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                lookup(condition);
                lookup(then_branch);
                lookup(else_branch);
            }
            Node::Not { operand } => lookup(operand),
            Node::Guard {
                value, condition, ..
            } => {
                lookup(value);
                lookup(condition);
            }
            Node::Branch {
                cases, otherwise, ..
            } => {
                for (condition, body) in cases {
                    lookup(condition);
                    lookup(body);
                }
                lookup(otherwise);
            }
            Node::StringInterpolation { parts } => {
                for segment in parts {
                    if let InterpolationPart::Node(id) = segment {
                        lookup(id);
                    }
                }
            }
            Node::HigherOrder {
                source,
                binder,
                body,
                ..
            } => {
                lookup(source);
                lookup(binder);
                lookup(body);
            }
            Node::ListLiteral { elements, .. } => {
                for id in elements.iter_mut() {
                    lookup(id);
                }
            }
        }
    }
}

// ============================================================================
// Program
// ============================================================================

/// A complete lowered pipeline: the node map plus the entry and exit
/// points the runtime wires up.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub nodes: HashMap<NodeId, Node>,
    /// Input nodes in declaration order
    pub inputs: Vec<NodeId>,
    /// Output names in declaration order
    pub declared_outputs: Vec<String>,
    /// Variable name → node producing its value
    pub variable_bindings: BTreeMap<String, NodeId>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Insert a node under a fresh id and return the id.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId::fresh();
        self.nodes.insert(id, node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The node each declared output is bound to.
    pub fn output_nodes(&self) -> Vec<(String, NodeId)> {
        self.declared_outputs
            .iter()
            .filter_map(|name| {
                self.variable_bindings
                    .get(name)
                    .map(|id| (name.clone(), *id))
            })
            .collect()
    }

    /// Kahn's algorithm over the dependency edges. Dependencies come
    /// before dependents. The node map is a DAG by construction; any
    /// residue would indicate a corrupted program and is appended last so
    /// the result always contains every node.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut in_degree: HashMap<NodeId, usize> =
            self.nodes.keys().map(|id| (*id, 0)).collect();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (id, node) in &self.nodes {
            for dep in node.dependencies() {
                if self.nodes.contains_key(&dep) {
                    *in_degree.entry(*id).or_insert(0) += 1;
                    dependents.entry(dep).or_default().push(*id);
                }
            }
        }

        let mut ready: VecDeque<NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_front() {
            order.push(id);
            if let Some(users) = dependents.get(&id) {
                for user in users {
                    if let Some(degree) = in_degree.get_mut(user) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push_back(*user);
                        }
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            let seen: HashSet<NodeId> = order.iter().copied().collect();
            order.extend(self.nodes.keys().filter(|id| !seen.contains(id)));
        }
        order
    }

    /// Check structural well-formedness: every dependency resolves, every
    /// declared output is bound to a live node, every input id exists.
    pub fn validate(&self) -> Result<(), String> {
        for (id, node) in &self.nodes {
            for dep in node.dependencies() {
                if !self.nodes.contains_key(&dep) {
                    return Err(format!(
                        "node {id} ({}) references missing node {dep}",
                        node.kind_name()
                    ));
                }
            }
        }
        for name in &self.declared_outputs {
            match self.variable_bindings.get(name) {
                None => return Err(format!("declared output '{name}' is not bound")),
                Some(id) if !self.nodes.contains_key(id) => {
                    return Err(format!(
                        "declared output '{name}' is bound to missing node {id}"
                    ));
                }
                Some(_) => {}
            }
        }
        for id in &self.inputs {
            if !self.nodes.contains_key(id) {
                return Err(format!("input list references missing node {id}"));
            }
        }
        Ok(())
    }
}
