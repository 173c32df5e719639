//! Depth-first backtracking search over the rule tree.
//!
//! The search threads a shrinking remaining pool along each path and keeps a
//! ranked shortlist of candidate assignments at every node, so a course
//! claimed eagerly by an early leaf can be released when a later, stricter
//! leaf needs it. Failing candidates are retained and ranked too; when no
//! assignment satisfies the tree, the best-scoring failed attempt becomes the
//! diagnostic result.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use nonempty::NonEmpty;

use crate::{
    domain::{
        CountPredicate, CourseFilter, CourseId, NodeId, RuleNode, RuleTree, SolverConfig,
    },
    solve::{pool::CoursePool, score::Score},
};

/// Overall outcome of one audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// A complete, non-conflicting assignment satisfies the tree.
    Satisfied,
    /// The search was exhaustive and no satisfying assignment exists.
    Unsatisfiable,
    /// The step budget ran out before the search could conclude either way.
    Inconclusive,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Satisfied => f.write_str("satisfied"),
            Self::Unsatisfiable => f.write_str("unsatisfiable"),
            Self::Inconclusive => f.write_str("inconclusive"),
        }
    }
}

/// One candidate claim-assignment, together with the search state that
/// produced it.
///
/// An assignment accumulates along a search path: claims and per-node
/// outcomes only grow, the remaining pool only shrinks. Branching clones the
/// assignment, so backtracking is simply discarding a branch's copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Whether the most recently evaluated node was satisfied.
    satisfied: bool,
    /// Courses claimed per leaf.
    claims: BTreeMap<NodeId, BTreeSet<CourseId>>,
    /// Pass/fail per evaluated node.
    outcomes: BTreeMap<NodeId, bool>,
    /// Identities still available for claiming on this path.
    remaining: BTreeSet<CourseId>,
    /// Optional branches satisfied beyond their thresholds.
    bonus: usize,
    /// Declared indices of branch decisions, in search order.
    choices: Vec<usize>,
}

impl Assignment {
    fn initial(remaining: BTreeSet<CourseId>) -> Self {
        Self {
            satisfied: false,
            claims: BTreeMap::new(),
            outcomes: BTreeMap::new(),
            remaining,
            bonus: 0,
            choices: Vec::new(),
        }
    }

    /// Whether the evaluated subtree was satisfied.
    #[must_use]
    pub const fn satisfied(&self) -> bool {
        self.satisfied
    }

    /// Returns the courses claimed per leaf.
    #[must_use]
    pub const fn claims(&self) -> &BTreeMap<NodeId, BTreeSet<CourseId>> {
        &self.claims
    }

    /// Returns the courses claimed by one leaf, if it claimed any.
    #[must_use]
    pub fn claimed(&self, leaf: NodeId) -> Option<&BTreeSet<CourseId>> {
        self.claims.get(&leaf)
    }

    /// Returns the pass/fail outcome per evaluated node.
    ///
    /// Nodes on branches the search never entered are absent.
    #[must_use]
    pub const fn outcomes(&self) -> &BTreeMap<NodeId, bool> {
        &self.outcomes
    }

    /// Returns the distinct courses consumed across all leaves.
    #[must_use]
    pub fn courses_used(&self) -> BTreeSet<CourseId> {
        self.claims.values().flatten().copied().collect()
    }

    /// Computes the assignment's quality score.
    #[must_use]
    pub fn score(&self) -> Score {
        Score::new(self.bonus, self.courses_used().len(), self.choices.clone())
    }

    fn claim(&mut self, leaf: NodeId, course: CourseId, reusable: bool) {
        self.claims.entry(leaf).or_default().insert(course);
        if !reusable {
            self.remaining.remove(&course);
        }
    }

    fn conclude(&mut self, node: NodeId, satisfied: bool) {
        self.satisfied = satisfied;
        self.outcomes.insert(node, satisfied);
    }

    fn satisfied_nodes(&self) -> usize {
        self.outcomes.values().filter(|ok| **ok).count()
    }

    /// Ranking key: satisfied assignments first, then more satisfied nodes,
    /// then the quality score.
    fn rank_key(&self) -> (bool, usize, Score) {
        (self.satisfied, self.satisfied_nodes(), self.score())
    }
}

/// The result of one audit solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    verdict: Verdict,
    assignment: Assignment,
}

impl Solution {
    /// Returns the overall verdict.
    #[must_use]
    pub const fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Returns the winning assignment, or the best-scoring failed attempt
    /// when the verdict is [`Verdict::Unsatisfiable`].
    #[must_use]
    pub const fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Consumes the solution, returning the assignment.
    #[must_use]
    pub fn into_assignment(self) -> Assignment {
        self.assignment
    }
}

/// Runs the audit search.
///
/// The search is synchronous, single-threaded, and free of side effects; the
/// tree may be shared read-only across concurrent solves. Always returns a
/// solution: unsatisfiable and inconclusive outcomes are values, not errors.
#[must_use]
pub fn solve(tree: &RuleTree, pool: &CoursePool, config: &SolverConfig) -> Solution {
    let mut search = Search {
        tree,
        pool,
        steps: 0,
        max_steps: config.max_steps(),
        beam: config.max_candidates().max(1),
    };
    let initial = Assignment::initial(pool.ids());

    match search.eval(tree.root(), &initial) {
        Ok(mut candidates) => {
            let best = if candidates.is_empty() {
                initial
            } else {
                candidates.remove(0)
            };
            let verdict = if best.satisfied {
                Verdict::Satisfied
            } else {
                Verdict::Unsatisfiable
            };
            tracing::debug!(steps = search.steps, %verdict, "audit search finished");
            Solution {
                verdict,
                assignment: best,
            }
        }
        Err(Exhausted) => {
            tracing::debug!(steps = search.steps, "audit search budget exhausted");
            Solution {
                verdict: Verdict::Inconclusive,
                assignment: initial,
            }
        }
    }
}

/// Raised internally when the step budget runs out.
struct Exhausted;

struct Search<'a> {
    tree: &'a RuleTree,
    pool: &'a CoursePool,
    steps: u64,
    max_steps: u64,
    beam: usize,
}

impl Search<'_> {
    /// Evaluates a node against an incoming path state, returning ranked
    /// candidate extensions of it. The returned list is never empty: when the
    /// node cannot be satisfied it holds the best-scoring failed attempts.
    fn eval(&mut self, id: NodeId, incoming: &Assignment) -> Result<Vec<Assignment>, Exhausted> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(Exhausted);
        }

        let tree = self.tree;
        let mut candidates = match tree.node(id) {
            RuleNode::CourseMatch(filter) => self.eval_course_match(id, filter, incoming),
            RuleNode::Reference { target, .. } => self.eval_reference(id, *target, incoming)?,
            RuleNode::AllOf(children) => self.eval_all_of(id, children, incoming)?,
            RuleNode::OneOf(children) => self.eval_one_of(id, children, incoming)?,
            RuleNode::CountOf {
                threshold,
                children,
            } => self.eval_count_of(id, *threshold, children, incoming)?,
            RuleNode::CountingFilter {
                threshold,
                predicate,
                sources,
            } => vec![self.eval_counting(id, *threshold, predicate, sources, incoming)],
        };

        candidates.sort_by_cached_key(|candidate| Reverse(candidate.rank_key()));
        candidates.truncate(self.beam);
        Ok(candidates)
    }

    /// Each admissible course in the remaining pool is a branch point.
    fn eval_course_match(
        &self,
        id: NodeId,
        filter: &CourseFilter,
        incoming: &Assignment,
    ) -> Vec<Assignment> {
        let admissible: Vec<CourseId> = incoming
            .remaining
            .iter()
            .copied()
            .filter(|course| filter.matches(self.pool.record(*course)))
            .collect();

        if admissible.is_empty() {
            let mut failed = incoming.clone();
            failed.conclude(id, false);
            return vec![failed];
        }

        admissible
            .into_iter()
            .map(|course| {
                let mut next = incoming.clone();
                next.claim(id, course, filter.reusable());
                next.conclude(id, true);
                next
            })
            .collect()
    }

    /// A reference solves its target against the caller's current pool; each
    /// reference site claims independently even when the subtree is shared.
    fn eval_reference(
        &mut self,
        id: NodeId,
        target: NodeId,
        incoming: &Assignment,
    ) -> Result<Vec<Assignment>, Exhausted> {
        let mut results = self.eval(target, incoming)?;
        for result in &mut results {
            let satisfied = result.satisfied;
            result.conclude(id, satisfied);
        }
        Ok(results)
    }

    /// Children are solved in declared order, threading the shrinking pool
    /// from one to the next. A failed child does not stop the traversal, so
    /// the failing candidates still report outcomes for later children.
    fn eval_all_of(
        &mut self,
        id: NodeId,
        children: &NonEmpty<NodeId>,
        incoming: &Assignment,
    ) -> Result<Vec<Assignment>, Exhausted> {
        let mut states = vec![(incoming.clone(), true)];

        for child in children {
            let mut next = Vec::new();
            for (state, all_ok) in &states {
                for result in self.eval(*child, state)? {
                    let ok = *all_ok && result.satisfied;
                    next.push((result, ok));
                }
            }
            shortlist(&mut next, self.beam);
            states = next;
        }

        Ok(states
            .into_iter()
            .map(|(mut assignment, all_ok)| {
                assignment.conclude(id, all_ok);
                assignment
            })
            .collect())
    }

    /// Branches over the children in declared order; the parent fails only
    /// when every child fails.
    fn eval_one_of(
        &mut self,
        id: NodeId,
        children: &NonEmpty<NodeId>,
        incoming: &Assignment,
    ) -> Result<Vec<Assignment>, Exhausted> {
        let mut candidates = Vec::new();
        for (index, child) in children.iter().enumerate() {
            let mut branch = incoming.clone();
            branch.choices.push(index);
            for mut result in self.eval(*child, &branch)? {
                let satisfied = result.satisfied;
                result.conclude(id, satisfied);
                candidates.push(result);
            }
        }
        Ok(candidates)
    }

    /// Branches over child subsets: each child may be claimed or skipped.
    /// Satisfying more children than the threshold earns a score bonus, so
    /// the search does not stop at the first sufficient subset.
    fn eval_count_of(
        &mut self,
        id: NodeId,
        threshold: usize,
        children: &NonEmpty<NodeId>,
        incoming: &Assignment,
    ) -> Result<Vec<Assignment>, Exhausted> {
        let total = children.len();
        let mut states = vec![(incoming.clone(), 0_usize)];

        for (index, child) in children.iter().enumerate() {
            let left = total - index;
            let mut next = Vec::new();
            for (state, count) in &states {
                // Skip the child entirely.
                next.push((state.clone(), *count));

                // A state that cannot reach the threshold even by satisfying
                // every remaining child is carried forward but not expanded.
                if count + left < threshold {
                    continue;
                }

                let mut branch = state.clone();
                branch.choices.push(index);
                for result in self.eval(*child, &branch)? {
                    let reached = count + usize::from(result.satisfied);
                    next.push((result, reached));
                }
            }
            shortlist(&mut next, self.beam);
            states = next;
        }

        Ok(states
            .into_iter()
            .map(|(mut assignment, count)| {
                let satisfied = count >= threshold;
                assignment.bonus += count.saturating_sub(threshold);
                assignment.conclude(id, satisfied);
                assignment
            })
            .collect())
    }

    /// Counts distinct courses already claimed under the source requirements
    /// that pass the predicate. Observes claims only; never claims itself.
    fn eval_counting(
        &self,
        id: NodeId,
        threshold: usize,
        predicate: &CountPredicate,
        sources: &NonEmpty<NodeId>,
        incoming: &Assignment,
    ) -> Assignment {
        let mut counted: BTreeSet<CourseId> = BTreeSet::new();
        for source in sources {
            for leaf in self.tree.leaves_under(*source) {
                if let Some(claimed) = incoming.claims.get(&leaf) {
                    counted.extend(claimed.iter().copied());
                }
            }
        }

        let passing = counted
            .iter()
            .filter(|course| predicate.matches(self.pool.record(**course)))
            .count();

        let mut next = incoming.clone();
        next.conclude(id, passing >= threshold);
        next
    }
}

/// Ranks intermediate search states and keeps the best `cap` of them.
fn shortlist<K: Ord + Clone>(states: &mut Vec<(Assignment, K)>, cap: usize) {
    states.sort_by_cached_key(|(assignment, key)| Reverse((key.clone(), assignment.rank_key())));
    states.truncate(cap);
}

#[cfg(test)]
mod tests {
    use nonempty::nonempty;

    use super::*;
    use crate::{
        domain::{CourseRecord, Credits, NumberFilter, RuleTreeBuilder, Subject},
        parse::compile,
    };

    fn course(code: &str) -> CourseRecord {
        CourseRecord::new(
            crate::domain::CourseId::random(),
            code.parse().unwrap(),
            "2014-4".to_string(),
            Credits::from_hundredths(100),
            BTreeSet::new(),
        )
    }

    fn pool(codes: &[&str]) -> CoursePool {
        codes.iter().map(|code| course(code)).collect()
    }

    fn run(text: &str, pool: &CoursePool) -> Solution {
        let tree = compile(text).unwrap();
        solve(&tree, pool, &SolverConfig::default())
    }

    #[test]
    fn single_leaf_claims_the_matching_course() {
        let pool = pool(&["PSCI 220"]);
        let tree = compile("# Major\ntake PSCI 220\n").unwrap();
        let solution = solve(&tree, &pool, &SolverConfig::default());

        assert_eq!(solution.verdict(), Verdict::Satisfied);
        let claimed = solution.assignment().claimed(tree.root()).unwrap();
        assert_eq!(claimed, &pool.ids());
    }

    #[test]
    fn one_of_prefers_the_earliest_declared_branch() {
        let text = "\
# Intro
take one of the following
- PSCI 111
- PSCI 204
";
        let pool = pool(&["PSCI 111", "PSCI 204"]);
        let solution = run(text, &pool);

        assert_eq!(solution.verdict(), Verdict::Satisfied);
        let used = solution.assignment().courses_used();
        assert_eq!(used.len(), 1);
        let claimed = pool.record(*used.first().unwrap());
        assert_eq!(claimed.code().to_string(), "PSCI 111");
    }

    #[test]
    fn count_of_claims_the_satisfiable_children() {
        let text = "\
# Breadth
take at least 2 of the following
- HIST 101
- HIST 102
- HIST 103
";
        let pool = pool(&["HIST 101", "HIST 103"]);
        let solution = run(text, &pool);

        assert_eq!(solution.verdict(), Verdict::Satisfied);
        assert_eq!(solution.assignment().courses_used().len(), 2);
    }

    #[test]
    fn count_of_reports_partial_progress_on_failure() {
        let text = "\
# Breadth
take at least 2 of the following
- HIST 101
- HIST 102
- HIST 103
";
        let pool = pool(&["HIST 101"]);
        let tree = compile(text).unwrap();
        let solution = solve(&tree, &pool, &SolverConfig::default());

        assert_eq!(solution.verdict(), Verdict::Unsatisfiable);
        // The best failed attempt still claims the one satisfiable child.
        assert_eq!(solution.assignment().courses_used().len(), 1);
        assert_eq!(solution.assignment().outcomes().get(&tree.root()), Some(&false));
    }

    #[test]
    fn counting_filter_fails_below_threshold() {
        let text = "\
# Major
take all of the following

## Area A
take PSCI 320

## Area B
take STAT 210

## Depth
count at least 2 courses with the '>= 300' number attribute from among courses counted by \"Area A\" and \"Area B\"
";
        let pool = pool(&["PSCI 320", "STAT 210"]);
        let tree = compile(text).unwrap();
        let solution = solve(&tree, &pool, &SolverConfig::default());

        assert_eq!(solution.verdict(), Verdict::Unsatisfiable);
        let depth = tree.section("Depth").unwrap();
        assert_eq!(solution.assignment().outcomes().get(&depth), Some(&false));
        // Both claiming areas themselves succeeded.
        assert_eq!(
            solution.assignment().outcomes().get(&tree.section("Area A").unwrap()),
            Some(&true)
        );
    }

    #[test]
    fn counting_filter_passes_at_threshold() {
        let text = "\
# Major
take all of the following

## Area A
take PSCI 320

## Area B
take STAT 310

## Depth
count at least 2 courses with the '>= 300' number attribute from among courses counted by \"Area A\" and \"Area B\"
";
        let pool = pool(&["PSCI 320", "STAT 310"]);
        let solution = run(text, &pool);
        assert_eq!(solution.verdict(), Verdict::Satisfied);
    }

    #[test]
    fn search_backtracks_an_eager_claim() {
        // The department leaf admits both courses; the exact leaf needs
        // PSCI 220 specifically, so the department leaf must settle for the
        // other course.
        let text = "\
# Major
take all of the following
- take a course within the PSCI department
- PSCI 220
";
        let pool = pool(&["PSCI 220", "PSCI 300"]);
        let solution = run(text, &pool);

        assert_eq!(solution.verdict(), Verdict::Satisfied);
        assert_eq!(solution.assignment().courses_used().len(), 2);
    }

    #[test]
    fn non_reusable_courses_are_never_claimed_twice() {
        let text = "\
# Major
take all of the following
- take a course within the PSCI department
- take a course within the PSCI department
";
        let pool = pool(&["PSCI 220", "PSCI 300"]);
        let solution = run(text, &pool);

        assert_eq!(solution.verdict(), Verdict::Satisfied);
        let total: usize = solution
            .assignment()
            .claims()
            .values()
            .map(BTreeSet::len)
            .sum();
        assert_eq!(total, solution.assignment().courses_used().len());
    }

    #[test]
    fn reusable_leaf_shares_its_course() {
        let text = "\
# Writing
take all of the following
- take a course within the ENGL department which may be reused
- ENGL 150
";
        let pool = pool(&["ENGL 150"]);
        let solution = run(text, &pool);
        assert_eq!(solution.verdict(), Verdict::Satisfied);
        assert_eq!(solution.assignment().courses_used().len(), 1);
    }

    #[test]
    fn without_reuse_one_course_cannot_serve_two_leaves() {
        let text = "\
# Writing
take all of the following
- take a course within the ENGL department
- ENGL 150
";
        let pool = pool(&["ENGL 150"]);
        let solution = run(text, &pool);
        assert_eq!(solution.verdict(), Verdict::Unsatisfiable);
    }

    #[test]
    fn repeated_solves_are_identical() {
        let text = "\
# Major
take at least 2 of the following
- PSCI 220
- STAT 110
- take a course within the HIST department
";
        let pool = pool(&["PSCI 220", "STAT 110", "HIST 101", "HIST 205"]);
        let tree = compile(text).unwrap();
        let config = SolverConfig::default();

        let first = solve(&tree, &pool, &config);
        let second = solve(&tree, &pool, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn adding_a_course_preserves_satisfiability() {
        let text = "\
# Intro
take one of the following
- PSCI 111
- PSCI 204
";
        let tree = compile(text).unwrap();
        let config = SolverConfig::default();

        let smaller = CoursePool::new([course("PSCI 111")]);
        assert_eq!(solve(&tree, &smaller, &config).verdict(), Verdict::Satisfied);

        let mut records: Vec<CourseRecord> = smaller.iter().cloned().collect();
        records.push(course("ECON 101"));
        let larger = CoursePool::new(records);
        assert_eq!(solve(&tree, &larger, &config).verdict(), Verdict::Satisfied);
    }

    #[test]
    fn exhausted_budget_is_inconclusive() {
        let text = "\
# Breadth
take at least 2 of the following
- HIST 101
- HIST 102
- HIST 103
";
        let pool = pool(&["HIST 101", "HIST 102", "HIST 103"]);
        let tree = compile(text).unwrap();

        let mut config = SolverConfig::default();
        config.set_max_steps(0);
        let solution = solve(&tree, &pool, &config);
        assert_eq!(solution.verdict(), Verdict::Inconclusive);
    }

    #[test]
    fn exceeding_a_count_threshold_earns_a_bonus() {
        let text = "\
# Breadth
take at least 1 of the following
- PSCI 220
- STAT 110
";
        let pool = pool(&["PSCI 220", "STAT 110"]);
        let solution = run(text, &pool);

        assert_eq!(solution.verdict(), Verdict::Satisfied);
        // Both children satisfied beats the single-course alternative.
        assert_eq!(solution.assignment().score().bonus(), 1);
        assert_eq!(solution.assignment().courses_used().len(), 2);
    }

    fn subject_filter(subject: &str, number: Option<NumberFilter>) -> CourseFilter {
        let group = BTreeSet::from([Subject::new(subject.to_string()).unwrap()]);
        CourseFilter::new(nonempty![group], number, None, false)
    }

    /// Maximum number of filters satisfiable with pairwise-distinct courses,
    /// by exhaustive enumeration.
    fn brute_force_max(filters: &[CourseFilter], courses: &[CourseRecord]) -> usize {
        fn go(filters: &[CourseFilter], courses: &[CourseRecord], used: &mut Vec<bool>) -> usize {
            let Some((first, rest)) = filters.split_first() else {
                return 0;
            };
            // Skip this filter.
            let mut best = go(rest, courses, used);
            // Or claim any unused admissible course for it.
            for (index, course) in courses.iter().enumerate() {
                if !used[index] && first.matches(course) {
                    used[index] = true;
                    best = best.max(1 + go(rest, courses, used));
                    used[index] = false;
                }
            }
            best
        }
        go(filters, courses, &mut vec![false; courses.len()])
    }

    #[test]
    fn count_of_agrees_with_brute_force() {
        let filters = vec![
            subject_filter("PSCI", Some(NumberFilter::AtLeast("300".parse().unwrap()))),
            subject_filter("PSCI", None),
            subject_filter("STAT", None),
            subject_filter("HIST", Some(NumberFilter::AtMost("199".parse().unwrap()))),
        ];
        let courses = vec![
            course("PSCI 320"),
            course("PSCI 101"),
            course("STAT 110"),
            course("HIST 400"),
        ];
        let pool = CoursePool::new(courses.clone());
        let achievable = brute_force_max(&filters, &courses);

        for threshold in 1..=filters.len() {
            let mut builder = RuleTreeBuilder::new();
            let children: Vec<NodeId> = filters
                .iter()
                .map(|filter| builder.course_match(filter.clone()))
                .collect();
            let root = builder.count_of(threshold, NonEmpty::from_vec(children).unwrap());
            builder
                .declare_section("Breadth".to_string(), 1, root)
                .unwrap();
            let tree = builder.finish(root).unwrap();

            let solution = solve(&tree, &pool, &SolverConfig::default());
            let expected = if threshold <= achievable {
                Verdict::Satisfied
            } else {
                Verdict::Unsatisfiable
            };
            assert_eq!(solution.verdict(), expected, "threshold {threshold}");
        }
    }

    #[test]
    fn cross_listed_course_satisfies_single_subject_leaf() {
        let text = "\
# Seminar
take a course within the PS department
";
        let pool = pool(&["ES/PS 276"]);
        let solution = run(text, &pool);
        assert_eq!(solution.verdict(), Verdict::Satisfied);
    }

    #[test]
    fn shared_reference_sites_claim_independently() {
        let text = "\
# Major
take all of the following
- complete the \"Stats\" requirement
- complete the \"Stats\" requirement

# Stats
take a course within the STAT department
";
        let pool = pool(&["STAT 110", "STAT 210"]);
        let solution = run(text, &pool);

        assert_eq!(solution.verdict(), Verdict::Satisfied);
        // Two reference sites, one shared leaf: both claims land on it.
        assert_eq!(solution.assignment().courses_used().len(), 2);
    }
}
