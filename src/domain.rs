//! Domain models for degree auditing.
//!
//! This module contains the core domain types: course records and their
//! validated components, leaf filters, the compiled rule tree, and the solver
//! configuration.

/// Course records and their validated components.
pub mod course;
pub use course::{CourseCode, CourseId, CourseNumber, CourseRecord, Credits, Subject};

/// Leaf filters and the course matcher.
pub mod filter;
pub use filter::{CountPredicate, CourseFilter, NumberFilter};

/// The compiled rule tree and its builder.
pub mod rule;
pub use rule::{NodeId, ResolveError, RuleNode, RuleTree, RuleTreeBuilder};

mod config;
pub use config::SolverConfig;
