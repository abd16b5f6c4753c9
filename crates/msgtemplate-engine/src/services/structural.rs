//! Structural confirmation of call sites
//!
//! A literal only counts as a template when the syntax tree says it is a
//! direct argument of a recognized call:
//!
//! ```text
//! string literal ─┬─ (binary "+" / parenthesized)* ─ argument ─ argument_list ─ call
//!                 └─ variable_declarator / assignment  → never a template
//! ```
//!
//! Trees are parsed lazily, one per snapshot version, and the verdict for
//! each call node is memoized by (tree, call position). Both caches are
//! cleared wholesale when they outgrow their ceilings.
//!
//! When no tree can be had (no provider, parse failure, or the literal is
//! missing from an error-recovered tree) `confirm` returns `None` and the
//! caller falls back to the textual heuristic.

use crate::model::DocumentSnapshot;
use crate::services::call_site::{
    receiver_shape, CallShape, CallSiteMatch, ConfigMethod, LEVEL_METHODS, LOGGER_METHODS,
};
use crate::syntax::{ParsedTree, SyntaxNode, SyntaxTreeProvider, TreeId};
use msgtemplate_core::config::ClassifierConfig;
use msgtemplate_core::region::ExpressionRole;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const LITERAL_KINDS: &[&str] = &[
    "string_literal",
    "verbatim_string_literal",
    "raw_string_literal",
];

/// Where a literal sits relative to the surrounding code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralContext<N> {
    /// Direct (possibly concatenated) argument of a call or constructor
    Argument {
        call: N,
        argument: N,
        argument_index: usize,
    },
    /// Initializer or right-hand side of an assignment
    Assigned,
    Other,
}

/// Outcome of a structural check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub recognized: bool,
    /// Set when the literal is expression text rather than a message template
    pub role: Option<ExpressionRole>,
}

impl Confirmation {
    const REJECTED: Self = Self {
        recognized: false,
        role: None,
    };
}

/// Climb from any node inside a literal to the literal node itself
pub fn enclosing_literal<N: SyntaxNode>(node: N) -> Option<N> {
    let mut current = Some(node);
    while let Some(node) = current {
        if LITERAL_KINDS.contains(&node.kind()) {
            return Some(node);
        }
        if matches!(node.kind(), "argument" | "argument_list" | "block" | "compilation_unit") {
            return None;
        }
        current = node.parent();
    }
    None
}

/// Classify the position of a literal node
pub fn literal_context<N: SyntaxNode>(literal: N) -> LiteralContext<N> {
    let mut current = literal;
    loop {
        let Some(parent) = current.parent() else {
            return LiteralContext::Other;
        };
        match parent.kind() {
            "binary_expression" => {
                let is_concat = parent
                    .child_by_field("operator")
                    .is_some_and(|op| op.kind() == "+");
                if !is_concat {
                    return LiteralContext::Other;
                }
                current = parent;
            }
            "parenthesized_expression" => current = parent,
            "argument" => {
                let Some(list) = parent.parent().filter(|n| n.kind() == "argument_list") else {
                    return LiteralContext::Other;
                };
                let Some(call) = list.parent().filter(|n| {
                    matches!(n.kind(), "invocation_expression" | "object_creation_expression")
                }) else {
                    return LiteralContext::Other;
                };
                let argument_index = list
                    .children()
                    .into_iter()
                    .filter(|n| n.kind() == "argument")
                    .position(|n| n.span() == parent.span())
                    .unwrap_or(0);
                return LiteralContext::Argument {
                    call,
                    argument: parent,
                    argument_index,
                };
            }
            "variable_declarator" | "equals_value_clause" | "assignment_expression" => {
                return LiteralContext::Assigned;
            }
            _ => return LiteralContext::Other,
        }
    }
}

fn text_of<'a, N: SyntaxNode>(node: N, source: &'a str) -> &'a str {
    source.get(node.span()).unwrap_or("")
}

/// Method name of a `member_access_expression` name node (`Information`, `Information<T>`)
fn method_name<'a, N: SyntaxNode>(name: N, source: &'a str) -> &'a str {
    if name.kind() == "generic_name" {
        if let Some(identifier) = name.children().into_iter().find(|n| n.kind() == "identifier") {
            return text_of(identifier, source);
        }
    }
    text_of(name, source)
}

/// Receiver of a `?.` access: the expression before the `?`
fn conditional_receiver<N: SyntaxNode>(access: N) -> Option<N> {
    access
        .child_by_field("condition")
        .or_else(|| access.child_by_field("expression"))
        .or_else(|| access.children().into_iter().find(|n| n.is_named()))
}

/// Method name node and receiver of an invoked member
///
/// Handles `a.M(...)` as well as the null-conditional `a?.M(...)`, which
/// parses either as a conditional access wrapping a member binding, or as an
/// invocation of a member binding nested under the conditional access.
fn call_target<N: SyntaxNode>(call: N) -> Option<(N, N)> {
    let function = call.child_by_field("function")?;
    match function.kind() {
        "member_access_expression" => {
            Some((function.child_by_field("name")?, function.child_by_field("expression")?))
        }
        "conditional_access_expression" => {
            let binding = function
                .children()
                .into_iter()
                .find(|n| n.kind() == "member_binding_expression")?;
            Some((binding.child_by_field("name")?, conditional_receiver(function)?))
        }
        "member_binding_expression" => {
            let access = call
                .parent()
                .filter(|n| n.kind() == "conditional_access_expression")?;
            Some((function.child_by_field("name")?, conditional_receiver(access)?))
        }
        _ => None,
    }
}

/// Decide whether a call node is one whose literal arguments we classify
pub fn recognize_call<N: SyntaxNode>(call: N, source: &str) -> Option<CallShape> {
    match call.kind() {
        "object_creation_expression" => {
            let ty = call.child_by_field("type")?;
            let name = text_of(ty, source);
            let last = name.rsplit('.').next().unwrap_or(name);
            (last == "ExpressionTemplate")
                .then_some(CallShape::Configuration(ConfigMethod::ExpressionTemplate))
        }
        "invocation_expression" => {
            let (name, receiver) = call_target(call)?;
            let method = method_name(name, source);

            if LEVEL_METHODS.contains(&method) || LOGGER_METHODS.contains(&method) {
                return receiver_shape(text_of(receiver, source));
            }

            // `.Filter.ByExcluding(...)`: the receiver is `Filter` or `x.Filter`
            let section = match receiver.kind() {
                "member_access_expression" => text_of(receiver.child_by_field("name")?, source),
                "identifier" => text_of(receiver, source),
                _ => return None,
            };
            ConfigMethod::from_member(section, method).map(CallShape::Configuration)
        }
        _ => None,
    }
}

/// Caches for parsed trees and call verdicts
struct StructuralCaches {
    trees: Vec<Arc<ParsedTree>>,
    invocations: HashMap<(TreeId, usize), Option<CallShape>>,
}

/// Tier-2 call-site confirmation backed by a syntax tree
pub struct StructuralClassifier {
    provider: Option<Arc<dyn SyntaxTreeProvider>>,
    caches: RwLock<StructuralCaches>,
    tree_capacity: usize,
    invocation_capacity: usize,
}

impl StructuralClassifier {
    pub fn new(config: &ClassifierConfig, provider: Option<Arc<dyn SyntaxTreeProvider>>) -> Self {
        let provider = if config.structural_confirmation {
            provider
        } else {
            None
        };
        Self {
            provider,
            caches: RwLock::new(StructuralCaches {
                trees: Vec::new(),
                invocations: HashMap::new(),
            }),
            tree_capacity: config.tree_cache_capacity.max(1),
            invocation_capacity: config.invocation_cache_capacity.max(1),
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Tree for a snapshot, parsing it on first use
    pub fn tree_for(&self, snapshot: &DocumentSnapshot) -> Option<Arc<ParsedTree>> {
        let provider = self.provider.as_ref()?;
        let version = snapshot.version();

        if let Ok(caches) = self.caches.read() {
            if let Some(tree) = caches.trees.iter().find(|t| t.version() == version) {
                return Some(tree.clone());
            }
        }

        // Parse outside any lock
        let tree = match provider.parse(snapshot.text()) {
            Ok(tree) => Arc::new(ParsedTree::new(version, tree)),
            Err(e) => {
                tracing::debug!("syntax tree unavailable for version {}: {:#}", version, e);
                return None;
            }
        };
        tracing::trace!("parsed syntax tree for version {}", version);

        if let Ok(mut caches) = self.caches.write() {
            if let Some(existing) = caches.trees.iter().find(|t| t.version() == version) {
                return Some(existing.clone());
            }
            if caches.trees.len() >= self.tree_capacity {
                caches.trees.clear();
            }
            caches.trees.push(tree.clone());
        }
        Some(tree)
    }

    fn call_shape<N: SyntaxNode>(
        &self,
        tree: &ParsedTree,
        call: N,
        source: &str,
    ) -> Option<CallShape> {
        let key = (tree.id(), call.span().start);
        if let Ok(caches) = self.caches.read() {
            if let Some(shape) = caches.invocations.get(&key) {
                return *shape;
            }
        }

        let shape = recognize_call(call, source);

        if let Ok(mut caches) = self.caches.write() {
            if caches.invocations.len() >= self.invocation_capacity {
                caches.invocations.clear();
            }
            caches.invocations.insert(key, shape);
        }
        shape
    }

    /// Structurally check the literal starting at `literal_start`
    ///
    /// `None` means the tree could not answer; callers fall back to the
    /// textual heuristic.
    pub fn confirm(
        &self,
        snapshot: &DocumentSnapshot,
        literal_start: usize,
    ) -> Option<Confirmation> {
        let tree = self.tree_for(snapshot)?;
        let source = snapshot.text();

        let literal = match tree.node_at(literal_start).and_then(enclosing_literal) {
            Some(literal) => literal,
            // Error recovery may have swallowed a half-typed literal
            None if tree.has_error() => return None,
            None => return Some(Confirmation::REJECTED),
        };
        if literal.span().start != literal_start {
            return Some(Confirmation::REJECTED);
        }

        match literal_context(literal) {
            LiteralContext::Argument {
                call,
                argument,
                argument_index,
            } => {
                let named = argument.child_by_field("name").map(|n| text_of(n, source));
                if named == Some("outputTemplate") {
                    return Some(Confirmation {
                        recognized: true,
                        role: None,
                    });
                }
                let confirmation = match self.call_shape(&tree, call, source) {
                    Some(shape) if shape.is_logging() => Confirmation {
                        recognized: true,
                        role: None,
                    },
                    Some(shape) => {
                        let role = shape.role_for_argument(argument_index);
                        Confirmation {
                            recognized: role.is_some(),
                            role,
                        }
                    }
                    None => Confirmation::REJECTED,
                };
                Some(confirmation)
            }
            LiteralContext::Assigned | LiteralContext::Other => Some(Confirmation::REJECTED),
        }
    }

    /// The recognized call that takes the literal at `literal_start` as an argument
    ///
    /// Lets a caller find a call whose opening line lies far above the
    /// literal. The match is shaped like a textual one: anchored at the
    /// argument list's `(`, or at the literal for `outputTemplate:`.
    pub fn enclosing_call(
        &self,
        snapshot: &DocumentSnapshot,
        literal_start: usize,
    ) -> Option<CallSiteMatch> {
        let tree = self.tree_for(snapshot)?;
        let source = snapshot.text();
        let literal = tree.node_at(literal_start).and_then(enclosing_literal)?;
        if literal.span().start != literal_start {
            return None;
        }
        let LiteralContext::Argument { call, argument, .. } = literal_context(literal) else {
            return None;
        };

        if argument.child_by_field("name").map(|n| text_of(n, source)) == Some("outputTemplate") {
            return Some(CallSiteMatch {
                shape: CallShape::OutputTemplate,
                anchor: literal_start,
                start: argument.span().start,
            });
        }
        let shape = self.call_shape(&tree, call, source)?;
        let arguments = SyntaxNode::children(&call)
            .into_iter()
            .find(|n| n.kind() == "argument_list")?;
        Some(CallSiteMatch {
            shape,
            anchor: arguments.span().start,
            start: call.span().start,
        })
    }

    pub fn clear(&self) {
        if let Ok(mut caches) = self.caches.write() {
            caches.trees.clear();
            caches.invocations.clear();
        }
    }
}
