//! # Universal Graph
//!
//! The Form / Function / Failure container for one analysis call.
//!
//! Entity records are the single source of truth: FailureMode relationship
//! lists, performs links, branch lists and the function arena. The traversal
//! [`GraphIndex`] is derived from them lazily and dropped on every mutation,
//! so the two can never drift.
//!
//! All id-keyed storage is `BTreeMap` for deterministic iteration.

use crate::index::GraphIndex;
use crate::types::{
    FailureId, FailureMode, FailurePropagationBranch, FormElement, FormId, Function,
    FunctionBranch, FunctionId,
};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::OnceLock;
use tracing::debug;

// =============================================================================
// WIRING ISSUES
// =============================================================================

/// A violation of the parent/child invariant of the function arena.
///
/// Only reachable through direct record edits
/// ([`UniversalGraph::function_mut`]) or hand-built function records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WiringIssue {
    /// `parent` names a function that does not exist.
    DanglingParent {
        function: FunctionId,
        parent: FunctionId,
    },
    /// `parent` exists but does not list the function as a child.
    ParentMissingChild {
        function: FunctionId,
        parent: FunctionId,
    },
    /// A listed child does not exist.
    DanglingChild {
        function: FunctionId,
        child: FunctionId,
    },
    /// A listed child names a different parent.
    ChildParentMismatch {
        function: FunctionId,
        child: FunctionId,
    },
    /// Following `parent` links from this function returns to it.
    CyclicAncestry { function: FunctionId },
}

// =============================================================================
// UNIVERSAL GRAPH
// =============================================================================

/// Three-layer system model plus its derived traversal index.
#[derive(Debug, Clone, Default)]
pub struct UniversalGraph {
    form_elements: BTreeMap<FormId, FormElement>,
    functions: BTreeMap<FunctionId, Function>,
    failure_modes: BTreeMap<FailureId, FailureMode>,
    /// Form → Function links, in insertion order. Duplicates are kept.
    performs: Vec<(FormId, FunctionId)>,
    function_branches: Vec<FunctionBranch>,
    failure_branches: Vec<FailurePropagationBranch>,
    metadata: Map<String, Value>,
    rejected_links: usize,
    index: OnceLock<GraphIndex>,
}

impl UniversalGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn invalidate(&mut self) {
        self.index.take();
    }

    fn reject(&mut self, operation: &'static str, from: &str, to: &str) -> bool {
        self.rejected_links = self.rejected_links.saturating_add(1);
        debug!(operation, from, to, "link rejected: endpoint missing");
        false
    }

    // =========================================================================
    // ENTITIES
    // =========================================================================

    /// Insert a Form element. An existing element with the same id is
    /// replaced and returned.
    pub fn add_form_element(&mut self, element: FormElement) -> Option<FormElement> {
        self.invalidate();
        self.form_elements.insert(element.id.clone(), element)
    }

    /// Insert a Function record as-is. An existing function with the same id
    /// is replaced and returned.
    ///
    /// Hierarchy wiring goes through [`Self::add_child_function`].
    pub fn add_function(&mut self, function: Function) -> Option<Function> {
        self.invalidate();
        self.functions.insert(function.id.clone(), function)
    }

    /// Insert a FailureMode. An existing mode with the same id is replaced
    /// and returned.
    pub fn add_failure_mode(&mut self, failure: FailureMode) -> Option<FailureMode> {
        self.invalidate();
        self.failure_modes.insert(failure.id.clone(), failure)
    }

    /// Append a time-series sample to a Form element.
    ///
    /// Returns `false` when the element does not exist.
    pub fn add_property_sample(
        &mut self,
        form: &str,
        timestamp: NaiveDateTime,
        property: &str,
        value: impl Into<Value>,
    ) -> bool {
        match self.form_elements.get_mut(form) {
            Some(element) => {
                element.properties.add(timestamp, property, value);
                true
            }
            None => false,
        }
    }

    /// Direct mutable access to a function record.
    ///
    /// Edits made here bypass hierarchy validation; inconsistencies are
    /// reported by [`Self::wiring_issues`].
    pub fn function_mut(&mut self, id: &str) -> Option<&mut Function> {
        self.invalidate();
        self.functions.get_mut(id)
    }

    // =========================================================================
    // LINKS
    // =========================================================================

    /// Record that a Form element performs a Function.
    pub fn link_form_to_function(&mut self, form: &str, function: &str) -> bool {
        if !self.form_elements.contains_key(form) || !self.functions.contains_key(function) {
            return self.reject("link_form_to_function", form, function);
        }
        self.performs
            .push((FormId::from(form), FunctionId::from(function)));
        self.invalidate();
        true
    }

    /// Record that a FailureMode affects a Function.
    pub fn link_function_to_failure(&mut self, function: &str, failure: &str) -> bool {
        if !self.functions.contains_key(function) {
            return self.reject("link_function_to_failure", function, failure);
        }
        let Some(mode) = self.failure_modes.get_mut(failure) else {
            return self.reject("link_function_to_failure", function, failure);
        };
        if !mode.affects_functions.iter().any(|f| f.as_str() == function) {
            mode.affects_functions.push(FunctionId::from(function));
        }
        self.invalidate();
        true
    }

    /// Record that a FailureMode affects a Form element.
    pub fn link_form_to_failure(&mut self, form: &str, failure: &str) -> bool {
        if !self.form_elements.contains_key(form) {
            return self.reject("link_form_to_failure", form, failure);
        }
        let Some(mode) = self.failure_modes.get_mut(failure) else {
            return self.reject("link_form_to_failure", form, failure);
        };
        if !mode.affects_forms.iter().any(|f| f.as_str() == form) {
            mode.affects_forms.push(FormId::from(form));
        }
        self.invalidate();
        true
    }

    /// Record a flow between two functions. Parallel branches are allowed.
    pub fn add_function_branch(&mut self, branch: FunctionBranch) -> bool {
        if !self.functions.contains_key(&branch.source) || !self.functions.contains_key(&branch.target)
        {
            return self.reject(
                "add_function_branch",
                branch.source.as_str(),
                branch.target.as_str(),
            );
        }
        self.function_branches.push(branch);
        self.invalidate();
        true
    }

    /// Record a propagation between two failure modes; the target is added
    /// to the source's `propagates_to` if absent.
    pub fn add_failure_branch(&mut self, branch: FailurePropagationBranch) -> bool {
        if !self.failure_modes.contains_key(&branch.target) {
            return self.reject(
                "add_failure_branch",
                branch.source.as_str(),
                branch.target.as_str(),
            );
        }
        let Some(source) = self.failure_modes.get_mut(&branch.source) else {
            return self.reject(
                "add_failure_branch",
                branch.source.as_str(),
                branch.target.as_str(),
            );
        };
        if !source.propagates_to.contains(&branch.target) {
            source.propagates_to.push(branch.target.clone());
        }
        self.failure_branches.push(branch);
        self.invalidate();
        true
    }

    /// Make `child` a child of `parent`.
    ///
    /// Rejected (returns `false`) when either function is missing, when
    /// `parent == child`, or when `child` is an ancestor of `parent`. A child
    /// with a previous parent is detached from it first.
    pub fn add_child_function(&mut self, parent: &str, child: &str) -> bool {
        if !self.functions.contains_key(parent) || !self.functions.contains_key(child) {
            return self.reject("add_child_function", parent, child);
        }
        if parent == child || self.ancestors(parent).iter().any(|a| a.as_str() == child) {
            self.rejected_links = self.rejected_links.saturating_add(1);
            debug!(parent, child, "hierarchy link rejected: would create a cycle");
            return false;
        }

        let previous = self.functions.get(child).and_then(|f| f.parent.clone());
        if let Some(old) = previous.filter(|old| old.as_str() != parent) {
            if let Some(old_parent) = self.functions.get_mut(&old) {
                old_parent.children.retain(|c| c.as_str() != child);
            }
        }
        if let Some(p) = self.functions.get_mut(parent) {
            if !p.children.iter().any(|c| c.as_str() == child) {
                p.children.push(FunctionId::from(child));
            }
        }
        if let Some(c) = self.functions.get_mut(child) {
            c.parent = Some(FunctionId::from(parent));
        }
        true
    }

    /// Replace a free-form metadata entry.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub(crate) fn replace_metadata(&mut self, metadata: Map<String, Value>) {
        self.metadata = metadata;
    }

    // =========================================================================
    // READ ACCESS
    // =========================================================================

    #[must_use]
    pub fn form_elements(&self) -> &BTreeMap<FormId, FormElement> {
        &self.form_elements
    }

    #[must_use]
    pub fn functions(&self) -> &BTreeMap<FunctionId, Function> {
        &self.functions
    }

    #[must_use]
    pub fn failure_modes(&self) -> &BTreeMap<FailureId, FailureMode> {
        &self.failure_modes
    }

    #[must_use]
    pub fn form_element(&self, id: &str) -> Option<&FormElement> {
        self.form_elements.get(id)
    }

    #[must_use]
    pub fn function(&self, id: &str) -> Option<&Function> {
        self.functions.get(id)
    }

    #[must_use]
    pub fn failure_mode(&self, id: &str) -> Option<&FailureMode> {
        self.failure_modes.get(id)
    }

    /// Form → Function links in insertion order.
    #[must_use]
    pub fn performs(&self) -> &[(FormId, FunctionId)] {
        &self.performs
    }

    #[must_use]
    pub fn function_branches(&self) -> &[FunctionBranch] {
        &self.function_branches
    }

    #[must_use]
    pub fn failure_branches(&self) -> &[FailurePropagationBranch] {
        &self.failure_branches
    }

    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Number of link operations rejected because an endpoint was missing
    /// or a hierarchy link would have formed a cycle.
    #[must_use]
    pub fn rejected_links(&self) -> usize {
        self.rejected_links
    }

    /// True when the graph holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.form_elements.is_empty() && self.functions.is_empty() && self.failure_modes.is_empty()
    }

    /// The traversal index, built on first use after a mutation.
    pub fn index(&self) -> &GraphIndex {
        self.index.get_or_init(|| GraphIndex::build(self))
    }

    // =========================================================================
    // FUNCTION HIERARCHY
    // =========================================================================

    /// Functions with no resolvable parent, in id order.
    #[must_use]
    pub fn root_functions(&self) -> Vec<&Function> {
        self.functions
            .values()
            .filter(|f| {
                f.parent
                    .as_ref()
                    .is_none_or(|p| !self.functions.contains_key(p))
            })
            .collect()
    }

    /// Functions with no resolvable child, in id order.
    #[must_use]
    pub fn leaf_functions(&self) -> Vec<&Function> {
        self.functions
            .values()
            .filter(|f| !f.children.iter().any(|c| self.functions.contains_key(c)))
            .collect()
    }

    /// Children of a function that exist in the arena, in declared order.
    pub fn child_functions<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Function> + 'a {
        self.functions
            .get(id)
            .into_iter()
            .flat_map(|f| f.children.iter())
            .filter_map(|c| self.functions.get(c))
    }

    /// Parent chain from the direct parent upward, stopping at a missing
    /// parent or a repeated id.
    #[must_use]
    pub fn ancestors(&self, id: &str) -> Vec<&FunctionId> {
        let mut chain = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        seen.insert(id);
        let mut current = self.functions.get(id).and_then(|f| f.parent.as_ref());
        while let Some(parent) = current {
            if !seen.insert(parent.as_str()) {
                break;
            }
            let Some(record) = self.functions.get(parent) else {
                break;
            };
            chain.push(&record.id);
            current = record.parent.as_ref();
        }
        chain
    }

    /// Every function below `id` (breadth first, each once).
    #[must_use]
    pub fn descendants(&self, id: &str) -> Vec<&FunctionId> {
        let Some(start) = self.functions.get(id) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        seen.insert(start.id.as_str());
        let mut queue: VecDeque<&str> = VecDeque::from([start.id.as_str()]);
        while let Some(current) = queue.pop_front() {
            for child in self.child_functions(current) {
                if seen.insert(child.id.as_str()) {
                    found.push(&child.id);
                    queue.push_back(child.id.as_str());
                }
            }
        }
        found
    }

    /// Check the parent/child invariant of every function.
    #[must_use]
    pub fn wiring_issues(&self) -> Vec<WiringIssue> {
        let mut issues = Vec::new();
        for (id, function) in &self.functions {
            if let Some(parent) = &function.parent {
                match self.functions.get(parent) {
                    None => issues.push(WiringIssue::DanglingParent {
                        function: id.clone(),
                        parent: parent.clone(),
                    }),
                    Some(record) if !record.children.contains(id) => {
                        issues.push(WiringIssue::ParentMissingChild {
                            function: id.clone(),
                            parent: parent.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
            for child in &function.children {
                match self.functions.get(child) {
                    None => issues.push(WiringIssue::DanglingChild {
                        function: id.clone(),
                        child: child.clone(),
                    }),
                    Some(record) if record.parent.as_ref() != Some(id) => {
                        issues.push(WiringIssue::ChildParentMismatch {
                            function: id.clone(),
                            child: child.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
            if self.in_ancestry_cycle(id.as_str()) {
                issues.push(WiringIssue::CyclicAncestry {
                    function: id.clone(),
                });
            }
        }
        issues
    }

    fn in_ancestry_cycle(&self, id: &str) -> bool {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut current = self.functions.get(id).and_then(|f| f.parent.as_ref());
        while let Some(parent) = current {
            if parent.as_str() == id {
                return true;
            }
            if !seen.insert(parent.as_str()) {
                return false;
            }
            current = self.functions.get(parent).and_then(|f| f.parent.as_ref());
        }
        false
    }
}

// =============================================================================
// TESTS
// =============================================================================
