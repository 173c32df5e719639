//! The combinatorial audit solver.
//!
//! Solving assigns a student's courses to the leaves of a compiled rule tree
//! by depth-first backtracking search. The search is exhaustive within its
//! pruning bounds and keeps a ranked shortlist of candidate assignments per
//! node, so the reported assignment is the best one found, not merely the
//! first.

mod pool;
pub use pool::CoursePool;

mod score;
pub use score::Score;

mod search;
pub use search::{solve, Assignment, Solution, Verdict};
