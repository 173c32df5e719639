//! Phrase recognizers for the constrained requirement language.
//!
//! Recognition runs an ordered list of strategies over a clause; the first
//! strategy whose phrasing matches wins. A strategy that matches but carries
//! invalid content (a bad number, a duplicate attribute) reports a malformed
//! filter rather than falling through, so a typo inside a recognized phrasing
//! is never silently reinterpreted by a later strategy.

use std::{collections::BTreeSet, str::FromStr, sync::LazyLock};

use nonempty::nonempty;
use regex::Regex;

use crate::domain::{CountPredicate, CourseCode, CourseFilter, CourseNumber, NumberFilter, Subject};

/// A recognized clause, before positional validation.
///
/// Section clauses and bullet items share the recognizer list; the compiler
/// decides which variants are legal in which position.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `take all of the following`
    AllOf,
    /// `take one of the following`
    OneOf,
    /// `take at least N of the following`
    CountOf(usize),
    /// `take PSCI 220 and STAT 110`
    Courses(Vec<CourseCode>),
    /// `take a course within the DEPT department ...`
    CourseWithin(CourseFilter),
    /// `count at least N courses with the '...' attribute from among courses
    /// counted by "A" and "B"`
    Counting {
        /// Minimum number of distinct passing courses.
        threshold: usize,
        /// Test applied to each claimed course.
        predicate: CountPredicate,
        /// Titles of the source requirements, in declared order.
        sources: Vec<String>,
    },
    /// `complete the "Title" requirement`
    Reference(String),
    /// A bare course code bullet, e.g. `ES/PS 276`.
    Code(CourseCode),
}

/// A phrasing that matched but carried invalid content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed {
    /// Human-readable description of the problem.
    pub detail: String,
}

impl Malformed {
    fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

type Recognized = Option<Result<Clause, Malformed>>;

/// A single phrase-recognition strategy.
///
/// Returns `None` when the phrasing does not apply, `Some(Err(_))` when it
/// applies but the content is invalid.
type Recognizer = fn(&str) -> Recognized;

/// The strategies, in priority order. First match wins.
const RECOGNIZERS: &[Recognizer] = &[
    all_of,
    one_of,
    count_of,
    counting,
    course_within,
    reference,
    take_courses,
    course_code,
];

/// Runs the recognizer list over a clause.
///
/// Returns `None` when no phrasing matched at all.
#[must_use]
pub fn recognize(text: &str) -> Recognized {
    let text = text.trim();
    RECOGNIZERS.iter().find_map(|recognizer| recognizer(text))
}

static ALL_OF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^take all of the following$").expect("static regex"));

fn all_of(text: &str) -> Recognized {
    ALL_OF_RE.is_match(text).then(|| Ok(Clause::AllOf))
}

static ONE_OF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^take one of the following$").expect("static regex"));

fn one_of(text: &str) -> Recognized {
    ONE_OF_RE.is_match(text).then(|| Ok(Clause::OneOf))
}

static COUNT_OF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^take at least (\d+) (?:of the following|from among the following)$")
        .expect("static regex")
});

fn count_of(text: &str) -> Recognized {
    let captures = COUNT_OF_RE.captures(text)?;
    Some(parse_threshold(&captures[1]).map(Clause::CountOf))
}

static COUNTING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^count at least (\d+) courses with the '([^']+)' (number )?attribute from among courses counted by (.+)$",
    )
    .expect("static regex")
});

static QUOTED_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("static regex"));

fn counting(text: &str) -> Recognized {
    let captures = COUNTING_RE.captures(text)?;

    let threshold = match parse_threshold(&captures[1]) {
        Ok(threshold) => threshold,
        Err(err) => return Some(Err(err)),
    };

    let predicate = if captures.get(3).is_some() {
        match number_filter(&captures[2]) {
            Ok(filter) => CountPredicate::new(Some(filter), None),
            Err(err) => return Some(Err(err)),
        }
    } else {
        CountPredicate::new(None, Some(captures[2].to_string()))
    };

    let sources: Vec<String> = QUOTED_TITLE_RE
        .captures_iter(&captures[4])
        .map(|c| c[1].to_string())
        .collect();
    if sources.is_empty() {
        return Some(Err(Malformed::new(
            "counting filter names no source requirements",
        )));
    }

    Some(Ok(Clause::Counting {
        threshold,
        predicate,
        sources,
    }))
}

static COURSE_WITHIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^take a course within the ([A-Z]+(?:/[A-Z]+)*) department((?: with the '[^']+' (?:number )?attribute)*)( which may be reused)?$",
    )
    .expect("static regex")
});

static ATTRIBUTE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"with the '([^']+)' (number )?attribute").expect("static regex")
});

fn course_within(text: &str) -> Recognized {
    let captures = COURSE_WITHIN_RE.captures(text)?;

    let group: BTreeSet<Subject> = match captures[1]
        .split('/')
        .map(Subject::from_str)
        .collect::<Result<_, _>>()
    {
        Ok(group) => group,
        Err(err) => return Some(Err(Malformed::new(err.to_string()))),
    };

    let mut number: Option<NumberFilter> = None;
    let mut attribute: Option<String> = None;

    for suffix in ATTRIBUTE_SUFFIX_RE.captures_iter(&captures[2]) {
        if suffix.get(2).is_some() {
            if number.is_some() {
                return Some(Err(Malformed::new("duplicate number attribute")));
            }
            number = match number_filter(&suffix[1]) {
                Ok(filter) => Some(filter),
                Err(err) => return Some(Err(err)),
            };
        } else {
            if attribute.is_some() {
                return Some(Err(Malformed::new("duplicate attribute requirement")));
            }
            attribute = Some(suffix[1].to_string());
        }
    }

    let reusable = captures.get(3).is_some();

    Some(Ok(Clause::CourseWithin(CourseFilter::new(
        nonempty![group],
        number,
        attribute,
        reusable,
    ))))
}

static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^complete the "([^"]+)" requirement$"#).expect("static regex"));

fn reference(text: &str) -> Recognized {
    let captures = REFERENCE_RE.captures(text)?;
    Some(Ok(Clause::Reference(captures[1].to_string())))
}

static TAKE_COURSES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^take ([A-Z]+(?:/[A-Z]+)* \d+[A-Z]?(?: and [A-Z]+(?:/[A-Z]+)* \d+[A-Z]?)*)$")
        .expect("static regex")
});

fn take_courses(text: &str) -> Recognized {
    let captures = TAKE_COURSES_RE.captures(text)?;

    let codes = captures[1]
        .split(" and ")
        .map(CourseCode::from_str)
        .collect::<Result<Vec<_>, _>>();

    Some(match codes {
        Ok(codes) => Ok(Clause::Courses(codes)),
        Err(err) => Err(Malformed::new(err.to_string())),
    })
}

static COURSE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]+(?:/[A-Z]+)* \d+[A-Z]?$").expect("static regex"));

fn course_code(text: &str) -> Recognized {
    if !COURSE_CODE_RE.is_match(text) {
        return None;
    }
    Some(match CourseCode::from_str(text) {
        Ok(code) => Ok(Clause::Code(code)),
        Err(err) => Err(Malformed::new(err.to_string())),
    })
}

fn parse_threshold(digits: &str) -> Result<usize, Malformed> {
    let threshold: usize = digits
        .parse()
        .map_err(|_| Malformed::new(format!("threshold '{digits}' is out of range")))?;
    if threshold == 0 {
        return Err(Malformed::new("threshold must be at least 1"));
    }
    Ok(threshold)
}

static NUMBER_COMPARISON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(==|>=|<=) (\S+)$").expect("static regex"));

static NUMBER_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^between (\S+) and (\S+)$").expect("static regex"));

fn number_filter(content: &str) -> Result<NumberFilter, Malformed> {
    if let Some(captures) = NUMBER_COMPARISON_RE.captures(content) {
        let number = parse_number(&captures[2])?;
        return Ok(match &captures[1] {
            "==" => NumberFilter::Exactly(number),
            ">=" => NumberFilter::AtLeast(number),
            "<=" => NumberFilter::AtMost(number),
            _ => unreachable!("regex only admits the three operators"),
        });
    }

    if let Some(captures) = NUMBER_RANGE_RE.captures(content) {
        let min = parse_number(&captures[1])?;
        let max = parse_number(&captures[2])?;
        if min > max {
            return Err(Malformed::new(format!(
                "empty number range 'between {min} and {max}'"
            )));
        }
        return Ok(NumberFilter::Between(min, max));
    }

    Err(Malformed::new(format!(
        "unrecognized number comparison '{content}'"
    )))
}

fn parse_number(digits: &str) -> Result<CourseNumber, Malformed> {
    digits
        .parse::<CourseNumber>()
        .map_err(|err| Malformed::new(err.to_string()))
}
