//! The student's course pool.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{CourseId, CourseRecord};

/// The full set of courses available to one audit.
///
/// The pool is immutable during solving; the search threads a shrinking set
/// of remaining course identities along each path and looks records up here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoursePool {
    courses: BTreeMap<CourseId, CourseRecord>,
}

impl CoursePool {
    /// Builds a pool from course records.
    ///
    /// A record with a duplicate identity replaces the earlier one.
    #[must_use]
    pub fn new(courses: impl IntoIterator<Item = CourseRecord>) -> Self {
        Self {
            courses: courses
                .into_iter()
                .map(|course| (course.id(), course))
                .collect(),
        }
    }

    /// Returns the record behind a course identity.
    ///
    /// # Panics
    ///
    /// Panics if the identity does not belong to this pool. The solver only
    /// looks up identities drawn from the pool itself, so this indicates a
    /// logic error.
    #[must_use]
    pub fn record(&self, id: CourseId) -> &CourseRecord {
        &self.courses[&id]
    }

    /// Returns the identities of every course in the pool.
    #[must_use]
    pub fn ids(&self) -> BTreeSet<CourseId> {
        self.courses.keys().copied().collect()
    }

    /// Iterates over the records in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &CourseRecord> {
        self.courses.values()
    }

    /// Returns the number of courses in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.courses.len()
    }

    /// Whether the pool holds no courses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

impl<'a> IntoIterator for &'a CoursePool {
    type Item = &'a CourseRecord;
    type IntoIter = std::collections::btree_map::Values<'a, CourseId, CourseRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.courses.values()
    }
}

impl FromIterator<CourseRecord> for CoursePool {
    fn from_iter<I: IntoIterator<Item = CourseRecord>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::domain::Credits;

    fn course(code: &str) -> CourseRecord {
        CourseRecord::new(
            CourseId::random(),
            code.parse().unwrap(),
            "2014-4".to_string(),
            Credits::from_hundredths(100),
            BTreeSet::new(),
        )
    }

    #[test]
    fn records_are_looked_up_by_identity() {
        let a = course("PSCI 220");
        let id = a.id();
        let pool = CoursePool::new([a.clone(), course("STAT 110")]);

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.record(id), &a);
        assert!(pool.ids().contains(&id));
    }

    #[test]
    fn duplicate_identity_replaces_earlier_record() {
        let first = course("PSCI 220");
        let second = CourseRecord::new(
            first.id(),
            "PSCI 221".parse().unwrap(),
            "2015-1".to_string(),
            Credits::from_hundredths(100),
            BTreeSet::new(),
        );

        let pool = CoursePool::new([first.clone(), second.clone()]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.record(first.id()), &second);
    }

    #[test]
    fn repeated_courses_have_distinct_identities() {
        // The same course taken twice appears twice: identity is per
        // instance, not per code.
        let pool = CoursePool::new([course("PSCI 220"), course("PSCI 220")]);
        assert_eq!(pool.len(), 2);
    }
}
