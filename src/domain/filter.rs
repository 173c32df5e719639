//! Leaf filters and the course matcher.
//!
//! A [`CourseFilter`] describes which courses a leaf will accept. Matching is
//! pure and total: malformed filters are rejected when the requirement
//! document is compiled, never at match time.

use std::{collections::BTreeSet, fmt};

use nonempty::NonEmpty;

use crate::domain::course::{CourseNumber, CourseRecord, Subject};

/// A comparison against a course number.
///
/// Range bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFilter {
    /// The course number must equal the given number.
    Exactly(CourseNumber),
    /// The course number must be greater than or equal to the given number.
    AtLeast(CourseNumber),
    /// The course number must be less than or equal to the given number.
    AtMost(CourseNumber),
    /// The course number must fall within the inclusive range.
    Between(CourseNumber, CourseNumber),
}

impl NumberFilter {
    /// Checks a course number against this comparison.
    #[must_use]
    pub fn matches(&self, number: CourseNumber) -> bool {
        match self {
            Self::Exactly(expected) => number == *expected,
            Self::AtLeast(min) => number >= *min,
            Self::AtMost(max) => number <= *max,
            Self::Between(min, max) => number >= *min && number <= *max,
        }
    }
}

impl fmt::Display for NumberFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Exactly(number) => write!(f, "== {number}"),
            Self::AtLeast(number) => write!(f, ">= {number}"),
            Self::AtMost(number) => write!(f, "<= {number}"),
            Self::Between(min, max) => write!(f, "between {min} and {max}"),
        }
    }
}

/// The acceptance test attached to a course-match leaf.
///
/// A course is admissible when at least one subject group intersects the
/// course's cross-listing set, and the number comparison and attribute
/// requirement (where present) both hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFilter {
    /// Acceptable subject-code groups. A group is itself a set because a
    /// cross-listed bullet such as `ES/PS 276` expands to one group with two
    /// subjects.
    groups: NonEmpty<BTreeSet<Subject>>,

    /// Optional comparison against the course number.
    number: Option<NumberFilter>,

    /// Optional attribute tag the course must carry.
    attribute: Option<String>,

    /// Whether courses claimed through this filter remain available to other
    /// leaves.
    reusable: bool,
}

impl CourseFilter {
    /// Creates a filter.
    #[must_use]
    pub const fn new(
        groups: NonEmpty<BTreeSet<Subject>>,
        number: Option<NumberFilter>,
        attribute: Option<String>,
        reusable: bool,
    ) -> Self {
        Self {
            groups,
            number,
            attribute,
            reusable,
        }
    }

    /// Returns the acceptable subject groups.
    #[must_use]
    pub const fn groups(&self) -> &NonEmpty<BTreeSet<Subject>> {
        &self.groups
    }

    /// Returns the number comparison, if any.
    #[must_use]
    pub const fn number(&self) -> Option<NumberFilter> {
        self.number
    }

    /// Returns the required attribute tag, if any.
    #[must_use]
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// Whether claims through this filter leave the course available to other
    /// leaves.
    #[must_use]
    pub const fn reusable(&self) -> bool {
        self.reusable
    }

    /// Checks a course record against this filter.
    ///
    /// Subject comparison is against the course's full cross-listing
    /// equivalence set, so a course stored as `ES/PS 276` satisfies a filter
    /// on `PS` alone.
    #[must_use]
    pub fn matches(&self, course: &CourseRecord) -> bool {
        let subject_ok = self
            .groups
            .iter()
            .any(|group| !group.is_disjoint(course.subjects()));

        let number_ok = self
            .number
            .is_none_or(|filter| filter.matches(course.number()));

        let attribute_ok = self
            .attribute
            .as_deref()
            .is_none_or(|attribute| course.has_attribute(attribute));

        subject_ok && number_ok && attribute_ok
    }
}

/// The predicate of a counting filter.
///
/// Unlike [`CourseFilter`], this never claims courses; it observes courses
/// already claimed by other requirements and tests them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountPredicate {
    /// Optional comparison against the course number.
    number: Option<NumberFilter>,

    /// Optional attribute tag the course must carry.
    attribute: Option<String>,
}

impl CountPredicate {
    /// Creates a predicate.
    #[must_use]
    pub const fn new(number: Option<NumberFilter>, attribute: Option<String>) -> Self {
        Self { number, attribute }
    }

    /// Returns the number comparison, if any.
    #[must_use]
    pub const fn number(&self) -> Option<NumberFilter> {
        self.number
    }

    /// Returns the required attribute tag, if any.
    #[must_use]
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// Checks a course record against this predicate.
    #[must_use]
    pub fn matches(&self, course: &CourseRecord) -> bool {
        let number_ok = self
            .number
            .is_none_or(|filter| filter.matches(course.number()));

        let attribute_ok = self
            .attribute
            .as_deref()
            .is_none_or(|attribute| course.has_attribute(attribute));

        number_ok && attribute_ok
    }
}

#[cfg(test)]
mod tests {
    use nonempty::nonempty;
    use test_case::test_case;

    use super::*;
    use crate::domain::course::{CourseCode, CourseId, Credits};

    fn course(code: &str) -> CourseRecord {
        CourseRecord::new(
            CourseId::random(),
            code.parse().unwrap(),
            "2014-4".to_string(),
            Credits::from_hundredths(100),
            BTreeSet::new(),
        )
    }

    fn course_with_attribute(code: &str, attribute: &str) -> CourseRecord {
        CourseRecord::new(
            CourseId::random(),
            code.parse().unwrap(),
            "2014-4".to_string(),
            Credits::from_hundredths(100),
            BTreeSet::from([attribute.to_string()]),
        )
    }

    fn subject_group(subjects: &[&str]) -> BTreeSet<Subject> {
        subjects
            .iter()
            .map(|s| Subject::new((*s).to_string()).unwrap())
            .collect()
    }

    fn number(s: &str) -> CourseNumber {
        s.parse().unwrap()
    }

    #[test_case(NumberFilter::Exactly(CourseNumber::new(220)), "220", true; "exactly hit")]
    #[test_case(NumberFilter::Exactly(CourseNumber::new(220)), "221", false; "exactly miss")]
    #[test_case(NumberFilter::AtLeast(CourseNumber::new(300)), "300", true; "at least boundary")]
    #[test_case(NumberFilter::AtLeast(CourseNumber::new(300)), "299", false; "at least below")]
    #[test_case(NumberFilter::AtMost(CourseNumber::new(200)), "200", true; "at most boundary")]
    #[test_case(NumberFilter::AtMost(CourseNumber::new(200)), "201", false; "at most above")]
    #[test_case(
        NumberFilter::Between(CourseNumber::new(200), CourseNumber::new(299)),
        "250",
        true;
        "between inside"
    )]
    #[test_case(
        NumberFilter::Between(CourseNumber::new(200), CourseNumber::new(299)),
        "299",
        true;
        "between upper bound inclusive"
    )]
    #[test_case(
        NumberFilter::Between(CourseNumber::new(200), CourseNumber::new(299)),
        "300",
        false;
        "between above"
    )]
    fn number_filter(filter: NumberFilter, value: &str, expected: bool) {
        assert_eq!(filter.matches(number(value)), expected);
    }

    #[test]
    fn letter_suffix_satisfies_at_least() {
        // 276A sorts after 276, so it clears a `>= 276` bound.
        let filter = NumberFilter::AtLeast(number("276"));
        assert!(filter.matches(number("276A")));
    }

    #[test]
    fn subject_match_exact() {
        let filter = CourseFilter::new(nonempty![subject_group(&["PSCI"])], None, None, false);
        assert!(filter.matches(&course("PSCI 220")));
        assert!(!filter.matches(&course("STAT 220")));
    }

    #[test]
    fn cross_listed_course_matches_single_subject() {
        let filter = CourseFilter::new(nonempty![subject_group(&["PS"])], None, None, false);
        assert!(filter.matches(&course("ES/PS 276")));
    }

    #[test]
    fn any_group_may_match() {
        let filter = CourseFilter::new(
            nonempty![subject_group(&["STAT"]), subject_group(&["PSCI"])],
            None,
            None,
            false,
        );
        assert!(filter.matches(&course("PSCI 220")));
        assert!(filter.matches(&course("STAT 110")));
        assert!(!filter.matches(&course("HIST 101")));
    }

    #[test]
    fn number_and_subject_must_both_hold() {
        let filter = CourseFilter::new(
            nonempty![subject_group(&["PSCI"])],
            Some(NumberFilter::AtLeast(number("300"))),
            None,
            false,
        );
        assert!(filter.matches(&course("PSCI 320")));
        assert!(!filter.matches(&course("PSCI 220")));
        assert!(!filter.matches(&course("STAT 320")));
    }

    #[test]
    fn attribute_requirement() {
        let filter = CourseFilter::new(
            nonempty![subject_group(&["ENGL"])],
            None,
            Some("writing".to_string()),
            false,
        );
        assert!(filter.matches(&course_with_attribute("ENGL 150", "writing")));
        assert!(!filter.matches(&course("ENGL 150")));
    }

    #[test]
    fn predicate_ignores_subject() {
        let predicate = CountPredicate::new(Some(NumberFilter::AtLeast(number("300"))), None);
        assert!(predicate.matches(&course("PSCI 320")));
        assert!(predicate.matches(&course("STAT 300")));
        assert!(!predicate.matches(&course("PSCI 220")));
    }

    #[test]
    fn predicate_attribute() {
        let predicate = CountPredicate::new(None, Some("lab".to_string()));
        assert!(predicate.matches(&course_with_attribute("BIO 101", "lab")));
        assert!(!predicate.matches(&course("BIO 101")));
    }
}
