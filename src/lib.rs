//! Degree-requirement auditing.
//!
//! Requirement documents are constrained natural language. They compile into
//! an immutable rule tree, and a backtracking solver assigns a student's
//! courses to the tree's leaves to decide whether the requirement is met.

pub mod audit;
pub use audit::{audit, AuditResult, NodeReport};

pub mod domain;
pub use domain::{CourseRecord, RuleTree, SolverConfig};

pub mod parse;
pub use parse::{compile, ParseError};

pub mod solve;
pub use solve::{CoursePool, Score, Verdict};

pub mod storage;
pub use storage::Transcript;
