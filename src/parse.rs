//! Compiling requirement text into a rule tree.
//!
//! Compilation runs in three passes: the document is split into titled
//! sections, each section's clause and bullets are recognized and turned into
//! nodes in declaration order, and finally named references are resolved and
//! checked for cycles. All structural errors surface here; a compiled tree is
//! fully resolved and safe to evaluate.

pub mod canon;
mod clause;
mod document;

use nonempty::NonEmpty;
use thiserror::Error;

use crate::{
    domain::{CourseCode, CourseFilter, NodeId, NumberFilter, ResolveError, RuleTree,
        RuleTreeBuilder},
    parse::{
        clause::Clause,
        document::{RawSection, SplitError},
    },
};

/// Errors raised while compiling a requirement document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A clause matched none of the known phrasings.
    #[error("unrecognized clause in section \"{section}\": \"{clause}\"")]
    UnrecognizedClause {
        /// Title of the section containing the clause.
        section: String,
        /// The offending clause text.
        clause: String,
    },

    /// A reference or counting-filter source names a section that does not
    /// exist.
    #[error("reference to unknown requirement \"{0}\"")]
    UnknownReference(String),

    /// References form a cycle among the listed sections.
    #[error("cyclic reference through {}", .0.join(" -> "))]
    CyclicReference(Vec<String>),

    /// A recognized phrasing carried invalid content.
    #[error("malformed filter in section \"{section}\": {detail}")]
    MalformedFilter {
        /// Title of the section containing the filter.
        section: String,
        /// Description of the problem.
        detail: String,
    },

    /// Two sections share the same title, so references would be ambiguous.
    #[error("duplicate section title \"{0}\"")]
    DuplicateSection(String),

    /// A quantifier clause has neither bullet items nor child sections.
    #[error("section \"{0}\" has no items to quantify over")]
    MissingItems(String),

    /// A non-blank line appeared outside the heading/clause/bullet structure.
    #[error("stray content: \"{0}\"")]
    StrayContent(String),

    /// The document contains no sections at all.
    #[error("the document contains no sections")]
    Empty,
}

impl From<SplitError> for ParseError {
    fn from(error: SplitError) -> Self {
        match error {
            SplitError::StrayContent(line) => Self::StrayContent(line),
            SplitError::Empty => Self::Empty,
        }
    }
}

impl From<ResolveError> for ParseError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::UnknownReference(title) => Self::UnknownReference(title),
            ResolveError::CyclicReference(titles) => Self::CyclicReference(titles),
            ResolveError::DuplicateSection(title) => Self::DuplicateSection(title),
        }
    }
}

/// Compiles requirement text into a [`RuleTree`].
///
/// The first top-level section becomes the root of the tree; later top-level
/// sections are compiled as named requirements reachable through references.
///
/// # Errors
///
/// Returns a [`ParseError`] describing the first structural problem found.
pub fn compile(text: &str) -> Result<RuleTree, ParseError> {
    let sections = document::split(text)?;
    let mut builder = RuleTreeBuilder::new();

    let mut root = None;
    for section in &sections {
        let node = compile_section(&mut builder, section)?;
        if root.is_none() {
            root = Some(node);
        }
    }
    let root = root.ok_or(ParseError::Empty)?;

    let tree = builder.finish(root)?;
    tracing::debug!(nodes = tree.len(), sections = tree.sections().len(), "compiled rule tree");
    Ok(tree)
}

/// Compiles one section and its descendants, returning the section's root
/// node.
///
/// The section's own node is built before recursing, so sections are declared
/// in document order and quantifiers over child sections compile to
/// references that resolve once the children exist.
fn compile_section(
    builder: &mut RuleTreeBuilder,
    section: &RawSection,
) -> Result<NodeId, ParseError> {
    let Some(clause_text) = section.clause.as_deref() else {
        return Err(ParseError::UnrecognizedClause {
            section: section.title.clone(),
            clause: String::new(),
        });
    };

    let clause = recognize_in(&section.title, clause_text)?;

    let node = match clause {
        Clause::AllOf => {
            let items = operands(builder, section)?;
            builder.all_of(items)
        }
        Clause::OneOf => {
            let items = operands(builder, section)?;
            builder.one_of(items)
        }
        Clause::CountOf(threshold) => {
            let items = operands(builder, section)?;
            builder.count_of(threshold, items)
        }
        Clause::Courses(codes) => {
            reject_bullets(section)?;
            let mut nodes = codes
                .into_iter()
                .map(|code| builder.course_match(exact_filter(&code)));
            let first = nodes.next().ok_or_else(|| ParseError::MissingItems(
                section.title.clone(),
            ))?;
            let rest: Vec<NodeId> = nodes.collect();
            if rest.is_empty() {
                first
            } else {
                builder.all_of(NonEmpty {
                    head: first,
                    tail: rest,
                })
            }
        }
        Clause::CourseWithin(filter) => {
            reject_bullets(section)?;
            builder.course_match(filter)
        }
        Clause::Counting {
            threshold,
            predicate,
            sources,
        } => {
            reject_bullets(section)?;
            builder.counting_filter(threshold, predicate, sources)
        }
        Clause::Reference(title) => {
            reject_bullets(section)?;
            builder.reference(title)
        }
        Clause::Code(_) => {
            return Err(ParseError::UnrecognizedClause {
                section: section.title.clone(),
                clause: clause_text.to_string(),
            });
        }
    };

    builder.declare_section(section.title.clone(), section.depth, node)?;

    for child in &section.children {
        compile_section(builder, child)?;
    }

    Ok(node)
}

/// Gathers a quantifier's operands: its bullet items if it has any, otherwise
/// references to its immediate child sections.
fn operands(
    builder: &mut RuleTreeBuilder,
    section: &RawSection,
) -> Result<NonEmpty<NodeId>, ParseError> {
    let nodes: Vec<NodeId> = if section.bullets.is_empty() {
        section
            .children
            .iter()
            .map(|child| builder.reference(child.title.clone()))
            .collect()
    } else {
        section
            .bullets
            .iter()
            .map(|bullet| compile_bullet(builder, &section.title, bullet))
            .collect::<Result<_, _>>()?
    };

    NonEmpty::from_vec(nodes).ok_or_else(|| ParseError::MissingItems(section.title.clone()))
}

/// Compiles a single bullet item.
///
/// Bullets admit bare course codes, department filters, and references;
/// quantifiers and counting filters only appear as section clauses.
fn compile_bullet(
    builder: &mut RuleTreeBuilder,
    section: &str,
    text: &str,
) -> Result<NodeId, ParseError> {
    match recognize_in(section, text)? {
        Clause::Code(code) => Ok(builder.course_match(exact_filter(&code))),
        Clause::CourseWithin(filter) => Ok(builder.course_match(filter)),
        Clause::Reference(title) => Ok(builder.reference(title)),
        Clause::AllOf
        | Clause::OneOf
        | Clause::CountOf(_)
        | Clause::Courses(_)
        | Clause::Counting { .. } => Err(ParseError::UnrecognizedClause {
            section: section.to_string(),
            clause: text.to_string(),
        }),
    }
}

/// Runs the recognizers, attributing failures to the enclosing section.
fn recognize_in(section: &str, text: &str) -> Result<Clause, ParseError> {
    match clause::recognize(text) {
        None => Err(ParseError::UnrecognizedClause {
            section: section.to_string(),
            clause: text.trim().to_string(),
        }),
        Some(Err(malformed)) => Err(ParseError::MalformedFilter {
            section: section.to_string(),
            detail: malformed.detail,
        }),
        Some(Ok(clause)) => Ok(clause),
    }
}

/// Rejects bullets under clauses that do not quantify over them.
fn reject_bullets(section: &RawSection) -> Result<(), ParseError> {
    match section.bullets.first() {
        Some(bullet) => Err(ParseError::StrayContent(bullet.clone())),
        None => Ok(()),
    }
}

/// A filter matching exactly the given course code.
fn exact_filter(code: &CourseCode) -> CourseFilter {
    CourseFilter::new(
        NonEmpty::new(code.subjects().clone()),
        Some(NumberFilter::Exactly(code.number())),
        None,
        false,
    )
}
