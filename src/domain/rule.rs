//! The compiled rule tree.
//!
//! A requirement document compiles into a [`RuleTree`]: an arena of
//! [`RuleNode`]s addressed by opaque [`NodeId`] handles, plus a title index
//! for named sections. Named sections may be referenced from several parents,
//! so the structure is a DAG of shared subtrees; references are resolved to
//! handles once, at compile time. The tree is immutable during solving and
//! may be shared read-only across concurrent audits.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use nonempty::NonEmpty;
use petgraph::{
    algo::{is_cyclic_directed, tarjan_scc},
    graphmap::DiGraphMap,
};
use thiserror::Error;

use crate::domain::filter::{CountPredicate, CourseFilter};

/// Opaque handle to a node in a [`RuleTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the handle as a plain index, for reporting.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single node of the rule tree.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleNode {
    /// Leaf: claim one course passing the filter.
    CourseMatch(CourseFilter),

    /// Leaf: satisfy the named section's subtree.
    Reference {
        /// Title of the referenced section.
        title: String,
        /// Handle of the referenced section's root, resolved at compile time.
        target: NodeId,
    },

    /// Every child must be satisfied.
    AllOf(NonEmpty<NodeId>),

    /// Exactly one child, chosen by the solver, must be satisfied.
    OneOf(NonEmpty<NodeId>),

    /// At least `threshold` of the children must be independently satisfied.
    CountOf {
        /// Minimum number of children that must be satisfied.
        threshold: usize,
        /// The candidate children, in declared order.
        children: NonEmpty<NodeId>,
    },

    /// Counts distinct courses claimed by the source requirements that pass
    /// the predicate. Observes claims made elsewhere; never claims itself.
    CountingFilter {
        /// Minimum number of distinct passing courses.
        threshold: usize,
        /// The test applied to each claimed course.
        predicate: CountPredicate,
        /// Roots of the requirements whose claims are counted.
        sources: NonEmpty<NodeId>,
    },
}

/// A named section of the source document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// The section title, as written in its heading.
    pub title: String,
    /// Heading depth (1 for `#`, 2 for `##`, ...).
    pub depth: usize,
    /// Root node of the section's subtree.
    pub node: NodeId,
}

/// Errors raised while resolving named references at the end of compilation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A reference names a section that does not exist.
    #[error("unknown requirement \"{0}\"")]
    UnknownReference(String),

    /// References form a cycle among the listed sections.
    #[error("cyclic reference through {}", .0.join(" -> "))]
    CyclicReference(Vec<String>),

    /// Two sections share the same title, so references would be ambiguous.
    #[error("duplicate section title \"{0}\"")]
    DuplicateSection(String),
}

/// The compiled, immutable rule tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTree {
    nodes: Vec<RuleNode>,
    root: NodeId,
    sections: Vec<Section>,
    titles: BTreeMap<String, NodeId>,
}

impl RuleTree {
    /// Returns the root node handle.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the node behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to this tree. Handles are only
    /// obtainable from the tree itself, so this indicates a logic error.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &RuleNode {
        &self.nodes[id.0]
    }

    /// Returns the number of nodes in the tree.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes. Always false for a compiled tree.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a named section's root by title.
    #[must_use]
    pub fn section(&self, title: &str) -> Option<NodeId> {
        self.titles.get(title).copied()
    }

    /// Returns the named sections in document order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Returns the structural children of a node, in declared order.
    ///
    /// References report their resolved target as their single child.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.node(id) {
            RuleNode::CourseMatch(_) | RuleNode::CountingFilter { .. } => Vec::new(),
            RuleNode::Reference { target, .. } => vec![*target],
            RuleNode::AllOf(children)
            | RuleNode::OneOf(children)
            | RuleNode::CountOf { children, .. } => children.iter().copied().collect(),
        }
    }

    /// Returns every course-match leaf reachable from a node, following
    /// references.
    ///
    /// Used to gather the claims "under" a requirement when evaluating
    /// counting filters.
    #[must_use]
    pub fn leaves_under(&self, id: NodeId) -> BTreeSet<NodeId> {
        let mut leaves = BTreeSet::new();
        let mut stack = vec![id];
        let mut seen = BTreeSet::new();

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            match self.node(current) {
                RuleNode::CourseMatch(_) => {
                    leaves.insert(current);
                }
                RuleNode::CountingFilter { .. } => {}
                RuleNode::Reference { .. }
                | RuleNode::AllOf(_)
                | RuleNode::OneOf(_)
                | RuleNode::CountOf { .. } => {
                    stack.extend(self.children(current));
                }
            }
        }

        leaves
    }
}

/// Incrementally assembles a [`RuleTree`].
///
/// Children are pushed before their parents; references and counting-filter
/// sources are recorded by title and resolved in [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct RuleTreeBuilder {
    nodes: Vec<RuleNode>,
    sections: Vec<Section>,
    titles: BTreeMap<String, NodeId>,
    pending_references: Vec<NodeId>,
    pending_sources: Vec<(NodeId, Vec<String>)>,
}

impl RuleTreeBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: RuleNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Adds a course-match leaf.
    pub fn course_match(&mut self, filter: CourseFilter) -> NodeId {
        self.push(RuleNode::CourseMatch(filter))
    }

    /// Adds a reference to a named section, resolved later.
    pub fn reference(&mut self, title: String) -> NodeId {
        // The target is a placeholder until `finish` resolves it; the builder
        // is the only way to construct a tree, so an unresolved target is
        // never observable.
        let id = self.push(RuleNode::Reference {
            title,
            target: NodeId(0),
        });
        self.pending_references.push(id);
        id
    }

    /// Adds an all-of node over the given children.
    pub fn all_of(&mut self, children: NonEmpty<NodeId>) -> NodeId {
        self.push(RuleNode::AllOf(children))
    }

    /// Adds a one-of node over the given children.
    pub fn one_of(&mut self, children: NonEmpty<NodeId>) -> NodeId {
        self.push(RuleNode::OneOf(children))
    }

    /// Adds a count-of node over the given children.
    pub fn count_of(&mut self, threshold: usize, children: NonEmpty<NodeId>) -> NodeId {
        self.push(RuleNode::CountOf {
            threshold,
            children,
        })
    }

    /// Adds a counting filter whose sources are named sections, resolved
    /// later.
    pub fn counting_filter(
        &mut self,
        threshold: usize,
        predicate: CountPredicate,
        sources: Vec<String>,
    ) -> NodeId {
        let id = self.push(RuleNode::CountingFilter {
            threshold,
            predicate,
            // Placeholder until `finish` resolves the titles.
            sources: NonEmpty::new(NodeId(0)),
        });
        self.pending_sources.push((id, sources));
        id
    }

    /// Registers a named section rooted at `node`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::DuplicateSection`] if the title is already
    /// taken.
    pub fn declare_section(
        &mut self,
        title: String,
        depth: usize,
        node: NodeId,
    ) -> Result<(), ResolveError> {
        if self.titles.contains_key(&title) {
            return Err(ResolveError::DuplicateSection(title));
        }
        self.titles.insert(title.clone(), node);
        self.sections.push(Section { title, depth, node });
        Ok(())
    }

    /// Resolves references and sources, checks for cycles, and produces the
    /// tree.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownReference`] when a reference or source
    /// names a section that was never declared, and
    /// [`ResolveError::CyclicReference`] when the resolved references form a
    /// cycle.
    pub fn finish(mut self, root: NodeId) -> Result<RuleTree, ResolveError> {
        for id in &self.pending_references {
            let RuleNode::Reference { title, target } = &mut self.nodes[id.0] else {
                unreachable!("pending reference points at a non-reference node");
            };
            *target = *self
                .titles
                .get(title.as_str())
                .ok_or_else(|| ResolveError::UnknownReference(title.clone()))?;
        }

        for (id, titles) in &self.pending_sources {
            let resolved = titles
                .iter()
                .map(|title| {
                    self.titles
                        .get(title.as_str())
                        .copied()
                        .ok_or_else(|| ResolveError::UnknownReference(title.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let resolved = NonEmpty::from_vec(resolved)
                .unwrap_or_else(|| unreachable!("counting filter sources are never empty"));

            let RuleNode::CountingFilter { sources, .. } = &mut self.nodes[id.0] else {
                unreachable!("pending sources point at a non-counting node");
            };
            *sources = resolved;
        }

        let tree = RuleTree {
            nodes: self.nodes,
            root,
            sections: self.sections,
            titles: self.titles,
        };

        tree.check_cycles()?;
        Ok(tree)
    }
}

impl RuleTree {
    /// Builds the dependency graph (structural children, reference targets,
    /// and counting sources) and rejects cycles.
    fn check_cycles(&self) -> Result<(), ResolveError> {
        let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();

        for (index, node) in self.nodes.iter().enumerate() {
            let id = NodeId(index);
            graph.add_node(id);
            for child in self.children(id) {
                graph.add_edge(id, child, ());
            }
            if let RuleNode::CountingFilter { sources, .. } = node {
                for source in sources {
                    graph.add_edge(id, *source, ());
                }
            }
        }

        if !is_cyclic_directed(&graph) {
            return Ok(());
        }

        // Name the cycle by the section titles involved, for diagnostics.
        let mut titles: Vec<String> = Vec::new();
        for component in tarjan_scc(&graph) {
            if component.len() < 2 {
                continue;
            }
            let members: BTreeSet<NodeId> = component.into_iter().collect();
            titles.extend(
                self.sections
                    .iter()
                    .filter(|section| members.contains(&section.node))
                    .map(|section| section.title.clone()),
            );
        }
        titles.sort();

        Err(ResolveError::CyclicReference(titles))
    }
}
