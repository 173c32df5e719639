//! The structured result of one audit.
//!
//! An [`AuditResult`] is a read-only projection of the final search state:
//! the rule tree annotated, node by node, with pass/fail and the courses
//! claimed, plus the overall verdict and quality score. It performs no I/O;
//! rendering is the caller's concern.

use std::collections::BTreeSet;

use borsh::BorshSerialize;
use sha2::{Digest, Sha256};

use crate::{
    domain::{CourseId, NodeId, RuleTree, SolverConfig},
    solve::{self, Assignment, CoursePool, Score, Verdict},
};

/// Runs one audit: solves the pool against the tree and wraps the outcome.
#[must_use]
pub fn audit(tree: &RuleTree, pool: &CoursePool, config: &SolverConfig) -> AuditResult {
    let solution = solve::solve(tree, pool, config);
    AuditResult {
        tree: tree.clone(),
        verdict: solution.verdict(),
        assignment: solution.into_assignment(),
    }
}

/// One node's annotation in an audit result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeReport<'a> {
    satisfied: Option<bool>,
    claimed: Option<&'a BTreeSet<CourseId>>,
}

impl<'a> NodeReport<'a> {
    /// Whether the node was satisfied, or `None` when the search never
    /// entered its branch.
    #[must_use]
    pub const fn satisfied(&self) -> Option<bool> {
        self.satisfied
    }

    /// The courses this node claimed, if it is a leaf that claimed any.
    #[must_use]
    pub const fn claimed(&self) -> Option<&'a BTreeSet<CourseId>> {
        self.claimed
    }
}

/// The annotated outcome of one audit. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditResult {
    tree: RuleTree,
    verdict: Verdict,
    assignment: Assignment,
}

impl AuditResult {
    /// Returns the overall verdict.
    #[must_use]
    pub const fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Whether the audit passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Satisfied
    }

    /// Returns the audited rule tree.
    #[must_use]
    pub const fn tree(&self) -> &RuleTree {
        &self.tree
    }

    /// Returns the winning assignment, or the best-scoring failed attempt
    /// when the verdict is [`Verdict::Unsatisfiable`].
    #[must_use]
    pub const fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Returns the assignment's quality score.
    #[must_use]
    pub fn score(&self) -> Score {
        self.assignment.score()
    }

    /// Returns one node's annotation.
    #[must_use]
    pub fn report(&self, id: NodeId) -> NodeReport<'_> {
        NodeReport {
            satisfied: self.assignment.outcomes().get(&id).copied(),
            claimed: self.assignment.claimed(id),
        }
    }

    /// Starts a lazy depth-first traversal from the root, in declared order.
    ///
    /// Each call returns a fresh traversal; shared subtrees are visited once
    /// per reference site.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            tree: &self.tree,
            stack: vec![(self.tree.root(), 0)],
        }
    }

    /// Calculate the fingerprint of this result.
    ///
    /// The fingerprint is a SHA256 hash of the Borsh-serialized verdict,
    /// per-node outcomes, claims, and score. Two audits of the same tree and
    /// pool produce identical fingerprints.
    ///
    /// # Panics
    ///
    /// Panics if borsh serialization fails (which should never happen for
    /// this data structure).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        #[derive(BorshSerialize)]
        struct FingerprintData {
            verdict: u8,
            outcomes: Vec<(u64, bool)>,
            claims: Vec<(u64, Vec<[u8; 16]>)>,
            bonus: u64,
            courses_used: u64,
            choices: Vec<u64>,
        }

        let score = self.score();
        let data = FingerprintData {
            verdict: match self.verdict {
                Verdict::Satisfied => 0,
                Verdict::Unsatisfiable => 1,
                Verdict::Inconclusive => 2,
            },
            outcomes: self
                .assignment
                .outcomes()
                .iter()
                .map(|(id, ok)| (as_u64(id.index()), *ok))
                .collect(),
            claims: self
                .assignment
                .claims()
                .iter()
                .map(|(id, courses)| {
                    (
                        as_u64(id.index()),
                        courses
                            .iter()
                            .map(|course| *course.as_uuid().as_bytes())
                            .collect(),
                    )
                })
                .collect(),
            bonus: as_u64(score.bonus()),
            courses_used: as_u64(score.courses_used()),
            choices: score.choices().iter().copied().map(as_u64).collect(),
        };

        let encoded = borsh::to_vec(&data).expect("this should never fail");
        let hash = Sha256::digest(encoded);
        format!("{hash:x}")
    }
}

fn as_u64(value: usize) -> u64 {
    u64::try_from(value).expect("usize fits in u64")
}

/// A lazy, restartable depth-first traversal of an audit result.
///
/// Yields `(node, depth)` pairs in declared order, root first.
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    tree: &'a RuleTree,
    stack: Vec<(NodeId, usize)>,
}

impl Iterator for Walk<'_> {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        let children = self.tree.children(id);
        for child in children.iter().rev() {
            self.stack.push((*child, depth + 1));
        }
        Some((id, depth))
    }
}
