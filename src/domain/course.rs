use std::{collections::BTreeSet, fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use uuid::Uuid;

/// A validated department code containing only uppercase alphabetic characters
/// ([A-Z]+).
///
/// Used for the subject component of course codes, e.g. `PSCI` or `ES`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Subject(NonEmptyString);

impl Subject {
    /// Creates a new `Subject` from a string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSubjectError` if the string is empty or contains
    /// characters other than uppercase letters (A-Z).
    pub fn new(s: String) -> Result<Self, InvalidSubjectError> {
        let non_empty =
            NonEmptyString::new(s.clone()).map_err(|_| InvalidSubjectError(s.clone()))?;

        if !s.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(InvalidSubjectError(s));
        }

        Ok(Self(non_empty))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Subject {
    type Error = InvalidSubjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Subject {
    type Error = InvalidSubjectError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Subject {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Subject {
    type Err = InvalidSubjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Error returned when a string doesn't match the required pattern [A-Z]+.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid subject '{0}': must be non-empty and contain only uppercase letters (A-Z)")]
pub struct InvalidSubjectError(String);

/// A course number: an integer with an optional uppercase sub-letter.
///
/// Examples: `220`, `276A`.
///
/// Ordering is numeric first, then by letter; a number without a letter sorts
/// before the same number with any letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CourseNumber {
    value: u16,
    letter: Option<char>,
}

impl CourseNumber {
    /// Creates a course number with no sub-letter.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self {
            value,
            letter: None,
        }
    }

    /// Creates a course number with a sub-letter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidNumberError` if the letter is not an uppercase ASCII
    /// letter.
    pub fn with_letter(value: u16, letter: char) -> Result<Self, InvalidNumberError> {
        if !letter.is_ascii_uppercase() {
            return Err(InvalidNumberError(format!("{value}{letter}")));
        }
        Ok(Self {
            value,
            letter: Some(letter),
        })
    }

    /// Returns the integer component.
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.value
    }

    /// Returns the sub-letter, if any.
    #[must_use]
    pub const fn letter(&self) -> Option<char> {
        self.letter
    }
}

impl fmt::Display for CourseNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.letter {
            Some(letter) => write!(f, "{}{letter}", self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

/// Error returned when a course number string is malformed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid course number '{0}': expected digits with an optional uppercase letter suffix")]
pub struct InvalidNumberError(String);

impl FromStr for CourseNumber {
    type Err = InvalidNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(InvalidNumberError(s.to_string()));
        }

        let (digits, letter) = match s.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
            None => (s, None),
            Some((idx, c)) => {
                // A single trailing letter is the only non-digit permitted.
                if idx + c.len_utf8() != s.len() {
                    return Err(InvalidNumberError(s.to_string()));
                }
                (&s[..idx], Some(c))
            }
        };

        let value = digits
            .parse::<u16>()
            .map_err(|_| InvalidNumberError(s.to_string()))?;

        match letter {
            None => Ok(Self::new(value)),
            Some(c) => Self::with_letter(value, c).map_err(|_| InvalidNumberError(s.to_string())),
        }
    }
}

/// A course code: one or more cross-listed subjects and a course number.
///
/// Format: `{SUBJECT(/SUBJECT)*} {NUMBER}`, where cross-listed subjects are
/// separated by `/`.
///
/// Examples: `PSCI 220`, `ES/PS 276`, `STAT 276A`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CourseCode {
    subjects: BTreeSet<Subject>,
    number: CourseNumber,
}

impl CourseCode {
    /// Creates a course code from pre-validated parts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCodeError` if the subject set is empty.
    pub fn new(
        subjects: BTreeSet<Subject>,
        number: CourseNumber,
    ) -> Result<Self, InvalidCodeError> {
        if subjects.is_empty() {
            return Err(InvalidCodeError::NoSubjects);
        }
        Ok(Self { subjects, number })
    }

    /// Returns the full cross-listing equivalence set.
    #[must_use]
    pub const fn subjects(&self) -> &BTreeSet<Subject> {
        &self.subjects
    }

    /// Returns the course number.
    #[must_use]
    pub const fn number(&self) -> CourseNumber {
        self.number
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let subjects = self
            .subjects
            .iter()
            .map(Subject::as_str)
            .collect::<Vec<_>>()
            .join("/");
        write!(f, "{subjects} {}", self.number)
    }
}

/// Errors that can occur when parsing a course code.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidCodeError {
    /// The code is not of the form `SUBJECT NUMBER`.
    #[error("Invalid course code '{0}': expected '{{SUBJECT}} {{NUMBER}}'")]
    Syntax(String),

    /// A subject segment is not uppercase alphabetic.
    #[error(transparent)]
    Subject(#[from] InvalidSubjectError),

    /// The number component is malformed.
    #[error(transparent)]
    Number(#[from] InvalidNumberError),

    /// The cross-listing set is empty.
    #[error("Invalid course code: at least one subject is required")]
    NoSubjects,
}

impl FromStr for CourseCode {
    type Err = InvalidCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let (Some(subjects_str), Some(number_str), None) =
            (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(InvalidCodeError::Syntax(s.to_string()));
        };

        let subjects = subjects_str
            .split('/')
            .map(Subject::from_str)
            .collect::<Result<BTreeSet<_>, _>>()?;

        let number = number_str.parse::<CourseNumber>()?;

        Self::new(subjects, number)
    }
}

impl TryFrom<&str> for CourseCode {
    type Error = InvalidCodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

/// Stable identity of a single course *instance* on a transcript.
///
/// Two records of the same course code (a repeated course) have distinct
/// identities; claims are tracked against this identity, not the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CourseId(Uuid);

impl CourseId {
    /// Mints a fresh identity.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing identity.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A credit value, stored as integer hundredths so equality and ordering are
/// exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Credits(u16);

impl Credits {
    /// Creates a credit value from integer hundredths (`100` is one credit).
    #[must_use]
    pub const fn from_hundredths(hundredths: u16) -> Self {
        Self(hundredths)
    }

    /// Returns the value in integer hundredths.
    #[must_use]
    pub const fn hundredths(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Error returned when a fractional credit value cannot be represented.
#[derive(Debug, thiserror::Error, PartialEq)]
#[error("Invalid credit value {0}: must be a non-negative multiple of 0.01, at most 655.35")]
pub struct InvalidCreditsError(f64);

impl TryFrom<f64> for Credits {
    type Error = InvalidCreditsError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value < 0.0 {
            return Err(InvalidCreditsError(value));
        }

        let hundredths = (value * 100.0).round();
        if hundredths > f64::from(u16::MAX) || (hundredths / 100.0 - value).abs() > 1e-9 {
            return Err(InvalidCreditsError(value));
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Self(hundredths as u16))
    }
}

/// A single completed course on a student's transcript.
///
/// Immutable once constructed; the audit never mutates records, it only claims
/// their identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseRecord {
    id: CourseId,
    code: CourseCode,
    term: String,
    credits: Credits,
    attributes: BTreeSet<String>,
}

impl CourseRecord {
    /// Creates a course record.
    #[must_use]
    pub const fn new(
        id: CourseId,
        code: CourseCode,
        term: String,
        credits: Credits,
        attributes: BTreeSet<String>,
    ) -> Self {
        Self {
            id,
            code,
            term,
            credits,
            attributes,
        }
    }

    /// Returns the stable identity of this course instance.
    #[must_use]
    pub const fn id(&self) -> CourseId {
        self.id
    }

    /// Returns the course code, including the full cross-listing set.
    #[must_use]
    pub const fn code(&self) -> &CourseCode {
        &self.code
    }

    /// Returns the cross-listing equivalence set.
    #[must_use]
    pub const fn subjects(&self) -> &BTreeSet<Subject> {
        self.code.subjects()
    }

    /// Returns the course number.
    #[must_use]
    pub const fn number(&self) -> CourseNumber {
        self.code.number()
    }

    /// Returns the term identifier, e.g. `2014-4`.
    #[must_use]
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Returns the credit value.
    #[must_use]
    pub const fn credits(&self) -> Credits {
        self.credits
    }

    /// Returns the free-form attribute tags, e.g. `writing` or `lab`.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeSet<String> {
        &self.attributes
    }

    /// Checks whether the record carries the given attribute tag.
    #[must_use]
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains(attribute)
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use test_case::test_case;

    use super::*;

    #[test]
    fn subject_rejects_empty() {
        assert!(Subject::new(String::new()).is_err());
    }

    #[test]
    fn subject_rejects_lowercase() {
        assert!(Subject::new("psci".to_string()).is_err());
    }

    #[test]
    fn subject_rejects_digits() {
        assert!(Subject::new("PS1".to_string()).is_err());
    }

    #[test]
    fn subject_accepts_uppercase() {
        let subject = Subject::new("PSCI".to_string()).unwrap();
        assert_eq!(subject.as_str(), "PSCI");
    }

    #[test_case("220", 220, None; "plain number")]
    #[test_case("276A", 276, Some('A'); "letter suffix")]
    #[test_case("1", 1, None; "single digit")]
    fn number_parses(input: &str, value: u16, letter: Option<char>) {
        let number: CourseNumber = input.parse().unwrap();
        assert_eq!(number.value(), value);
        assert_eq!(number.letter(), letter);
        assert_eq!(number.to_string(), input);
    }

    #[test_case(""; "empty")]
    #[test_case("A220"; "leading letter")]
    #[test_case("220a"; "lowercase letter")]
    #[test_case("22A0"; "letter in middle")]
    #[test_case("220AB"; "two letters")]
    #[test_case("99999"; "out of range")]
    fn number_rejects(input: &str) {
        assert!(input.parse::<CourseNumber>().is_err());
    }

    #[test]
    fn number_ordering() {
        let plain: CourseNumber = "276".parse().unwrap();
        let a: CourseNumber = "276A".parse().unwrap();
        let b: CourseNumber = "276B".parse().unwrap();
        let next: CourseNumber = "277".parse().unwrap();

        assert_eq!(plain.cmp(&a), Ordering::Less);
        assert_eq!(a.cmp(&b), Ordering::Less);
        assert_eq!(b.cmp(&next), Ordering::Less);
    }

    #[test]
    fn code_parses_single_subject() {
        let code: CourseCode = "PSCI 220".parse().unwrap();
        assert_eq!(code.subjects().len(), 1);
        assert_eq!(code.number().value(), 220);
        assert_eq!(code.to_string(), "PSCI 220");
    }

    #[test]
    fn code_parses_cross_listing() {
        let code: CourseCode = "ES/PS 276".parse().unwrap();
        let subjects: Vec<&str> = code.subjects().iter().map(Subject::as_str).collect();
        assert_eq!(subjects, vec!["ES", "PS"]);
        assert_eq!(code.number().value(), 276);
    }

    #[test]
    fn code_display_is_canonical() {
        // Subjects are a sorted set, so display order is stable regardless of
        // input order.
        let code: CourseCode = "PS/ES 276".parse().unwrap();
        assert_eq!(code.to_string(), "ES/PS 276");
    }

    #[test_case("PSCI"; "missing number")]
    #[test_case("PSCI 220 extra"; "trailing token")]
    #[test_case("psci 220"; "lowercase subject")]
    #[test_case("PSCI twenty"; "non numeric number")]
    #[test_case(""; "empty")]
    fn code_rejects(input: &str) {
        assert!(input.parse::<CourseCode>().is_err());
    }

    #[test]
    fn code_round_trip() {
        let original: CourseCode = "ES/PS 276A".parse().unwrap();
        let reparsed: CourseCode = original.to_string().parse().unwrap();
        assert_eq!(original, reparsed);
    }

    #[test_case(1.0, 100; "one credit")]
    #[test_case(0.25, 25; "quarter credit")]
    #[test_case(0.0, 0; "zero")]
    fn credits_from_float(input: f64, hundredths: u16) {
        let credits = Credits::try_from(input).unwrap();
        assert_eq!(credits.hundredths(), hundredths);
    }

    #[test_case(-1.0; "negative")]
    #[test_case(0.001; "sub hundredth")]
    #[test_case(1000.0; "out of range")]
    #[test_case(f64::NAN; "not a number")]
    fn credits_rejects(input: f64) {
        assert!(Credits::try_from(input).is_err());
    }

    #[test]
    fn credits_display() {
        assert_eq!(Credits::from_hundredths(100).to_string(), "1.00");
        assert_eq!(Credits::from_hundredths(25).to_string(), "0.25");
    }

    #[test]
    fn record_accessors() {
        let code: CourseCode = "ES/PS 276".parse().unwrap();
        let record = CourseRecord::new(
            CourseId::random(),
            code.clone(),
            "2014-4".to_string(),
            Credits::from_hundredths(100),
            BTreeSet::from(["writing".to_string()]),
        );

        assert_eq!(record.code(), &code);
        assert_eq!(record.term(), "2014-4");
        assert!(record.has_attribute("writing"));
        assert!(!record.has_attribute("lab"));
    }

    #[test]
    fn repeated_course_has_distinct_identity() {
        let code: CourseCode = "PSCI 220".parse().unwrap();
        let first = CourseRecord::new(
            CourseId::random(),
            code.clone(),
            "2014-1".to_string(),
            Credits::from_hundredths(100),
            BTreeSet::new(),
        );
        let second = CourseRecord::new(
            CourseId::random(),
            code,
            "2015-1".to_string(),
            Credits::from_hundredths(100),
            BTreeSet::new(),
        );

        assert_ne!(first.id(), second.id());
    }
}
