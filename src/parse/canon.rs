//! Canonical serialization of a rule tree back into requirement text.
//!
//! Rendering a compiled tree and re-compiling the output yields a
//! structurally identical tree, and rendering is idempotent: the output of
//! [`render`] re-compiles and re-renders to itself. Quantifiers always render
//! their operands as bullet items, so stylistic variation in the source (a
//! conjunction clause, operands sourced from child sections) normalizes away.

use std::{
    collections::BTreeMap,
    fmt::Write,
};

use crate::domain::{CourseFilter, NodeId, RuleNode, RuleTree};

/// Renders a rule tree as canonical requirement text.
///
/// Sections appear in document order with their original heading depth.
///
/// # Panics
///
/// Panics if the tree contains structure the grammar cannot express: a filter
/// with multiple subject groups, a counting predicate without exactly one
/// test, a counting source that is not a named section, or a quantifier in
/// bullet position. Trees produced by [`compile`](crate::parse::compile)
/// never contain these.
#[must_use]
pub fn render(tree: &RuleTree) -> String {
    let titles: BTreeMap<NodeId, &str> = tree
        .sections()
        .iter()
        .map(|section| (section.node, section.title.as_str()))
        .collect();

    let blocks: Vec<String> = tree
        .sections()
        .iter()
        .map(|section| {
            let mut block = String::new();
            let _ = writeln!(block, "{} {}", "#".repeat(section.depth), section.title);
            block.push_str(&section_clause(tree, &titles, section.node));
            block
        })
        .collect();

    blocks.join("\n")
}

/// Renders a section's clause line, plus bullet items for quantifiers.
fn section_clause(tree: &RuleTree, titles: &BTreeMap<NodeId, &str>, node: NodeId) -> String {
    match tree.node(node) {
        RuleNode::CourseMatch(filter) => format!("{}\n", filter_clause(filter)),
        RuleNode::Reference { title, .. } => {
            format!("complete the \"{title}\" requirement\n")
        }
        RuleNode::AllOf(children) => quantified("take all of the following", tree, children.iter()),
        RuleNode::OneOf(children) => quantified("take one of the following", tree, children.iter()),
        RuleNode::CountOf {
            threshold,
            children,
        } => quantified(
            &format!("take at least {threshold} of the following"),
            tree,
            children.iter(),
        ),
        RuleNode::CountingFilter {
            threshold,
            predicate,
            sources,
        } => {
            let test = match (predicate.number(), predicate.attribute()) {
                (Some(number), None) => format!("'{number}' number attribute"),
                (None, Some(attribute)) => format!("'{attribute}' attribute"),
                _ => panic!("counting predicate must carry exactly one test"),
            };
            let sources = sources
                .iter()
                .map(|source| {
                    titles
                        .get(source)
                        .map(|title| format!("\"{title}\""))
                        .unwrap_or_else(|| panic!("counting source {source} is not a named section"))
                })
                .collect::<Vec<_>>()
                .join(" and ");
            format!(
                "count at least {threshold} courses with the {test} from among courses counted by {sources}\n"
            )
        }
    }
}

/// Renders a quantifier clause followed by one bullet per operand.
fn quantified<'a>(
    clause: &str,
    tree: &RuleTree,
    children: impl Iterator<Item = &'a NodeId>,
) -> String {
    let mut out = format!("{clause}\n");
    for child in children {
        let _ = writeln!(out, "- {}", bullet(tree, *child));
    }
    out
}

/// Renders a single bullet item.
fn bullet(tree: &RuleTree, node: NodeId) -> String {
    match tree.node(node) {
        RuleNode::CourseMatch(filter) => plain_code(filter)
            .unwrap_or_else(|| format!("take a course within the {}", filter_suffix(filter))),
        RuleNode::Reference { title, .. } => format!("complete the \"{title}\" requirement"),
        other => panic!("node {other:?} cannot appear in bullet position"),
    }
}

/// Renders a course-match filter as a section clause.
fn filter_clause(filter: &CourseFilter) -> String {
    plain_code(filter).map_or_else(
        || format!("take a course within the {}", filter_suffix(filter)),
        |code| format!("take {code}"),
    )
}

/// Renders a filter as a bare course code, when it is exactly one.
///
/// A filter is a bare code when it has a single subject group, an exact
/// number comparison, no attribute requirement, and no reuse marker.
fn plain_code(filter: &CourseFilter) -> Option<String> {
    use crate::domain::NumberFilter;

    if filter.groups().len() != 1 || filter.attribute().is_some() || filter.reusable() {
        return None;
    }
    let Some(NumberFilter::Exactly(number)) = filter.number() else {
        return None;
    };

    let subjects = filter
        .groups()
        .first()
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join("/");
    Some(format!("{subjects} {number}"))
}

/// Renders the department phrase of a filter, after "take a course within
/// the".
fn filter_suffix(filter: &CourseFilter) -> String {
    assert!(
        filter.groups().len() == 1,
        "the grammar cannot express a filter with multiple subject groups"
    );

    let subjects = filter
        .groups()
        .first()
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join("/");

    let mut out = format!("{subjects} department");
    if let Some(number) = filter.number() {
        let _ = write!(out, " with the '{number}' number attribute");
    }
    if let Some(attribute) = filter.attribute() {
        let _ = write!(out, " with the '{attribute}' attribute");
    }
    if filter.reusable() {
        out.push_str(" which may be reused");
    }
    out
}
