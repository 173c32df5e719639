//! Splitting requirement text into raw titled sections.
//!
//! A requirement document is a sequence of markdown-style headings, each
//! followed by at most one clause line and any number of `- ` bullet items.
//! Heading depth gives the nesting: a deeper heading opens a child section of
//! the nearest shallower one. Splitting is purely structural; clause text is
//! interpreted later.

use thiserror::Error;

/// A titled section of the source document, before clause recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSection {
    /// The section title, as written in its heading.
    pub title: String,
    /// Heading depth (1 for `#`, 2 for `##`, ...).
    pub depth: usize,
    /// The clause line, if the section has one.
    pub clause: Option<String>,
    /// Bullet items, in document order, with the `- ` marker stripped.
    pub bullets: Vec<String>,
    /// Child sections, in document order.
    pub children: Vec<RawSection>,
}

impl RawSection {
    fn new(title: String, depth: usize) -> Self {
        Self {
            title,
            depth,
            clause: None,
            bullets: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Errors raised while splitting a document into sections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    /// A non-blank line appeared before the first heading, after a section's
    /// clause line, or in a heading with no title.
    #[error("stray content: \"{0}\"")]
    StrayContent(String),

    /// The document contains no sections at all.
    #[error("the document contains no sections")]
    Empty,
}

/// Splits requirement text into top-level sections.
///
/// # Errors
///
/// Returns [`SplitError::StrayContent`] for content outside the
/// heading/clause/bullet structure and [`SplitError::Empty`] for a document
/// with no headings.
pub fn split(text: &str) -> Result<Vec<RawSection>, SplitError> {
    let mut roots: Vec<RawSection> = Vec::new();
    let mut stack: Vec<RawSection> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some((depth, title)) = heading(trimmed) {
            if title.is_empty() {
                return Err(SplitError::StrayContent(trimmed.to_string()));
            }
            while stack.last().is_some_and(|section| section.depth >= depth) {
                close(&mut stack, &mut roots);
            }
            stack.push(RawSection::new(title.to_string(), depth));
        } else if let Some(item) = trimmed.strip_prefix("- ") {
            let Some(current) = stack.last_mut() else {
                return Err(SplitError::StrayContent(trimmed.to_string()));
            };
            current.bullets.push(item.trim().to_string());
        } else {
            let Some(current) = stack.last_mut() else {
                return Err(SplitError::StrayContent(trimmed.to_string()));
            };
            if current.clause.is_some() {
                return Err(SplitError::StrayContent(trimmed.to_string()));
            }
            current.clause = Some(trimmed.to_string());
        }
    }

    while !stack.is_empty() {
        close(&mut stack, &mut roots);
    }

    if roots.is_empty() {
        return Err(SplitError::Empty);
    }
    Ok(roots)
}

/// Moves the deepest open section into its parent, or into the root list.
fn close(stack: &mut Vec<RawSection>, roots: &mut Vec<RawSection>) {
    if let Some(done) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }
}

/// Parses a heading line into its depth and title.
///
/// A heading is one or more `#` characters followed by a space. `#` runs with
/// no following space are ordinary content.
fn heading(line: &str) -> Option<(usize, &str)> {
    let depth = line.bytes().take_while(|byte| *byte == b'#').count();
    if depth == 0 {
        return None;
    }
    let rest = line[depth..].strip_prefix(' ')?;
    Some((depth, rest.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_section_with_clause() {
        let sections = split("# Major\ntake all of the following\n").unwrap();

        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Major");
        assert_eq!(sections[0].depth, 1);
        assert_eq!(
            sections[0].clause.as_deref(),
            Some("take all of the following")
        );
        assert!(sections[0].bullets.is_empty());
        assert!(sections[0].children.is_empty());
    }

    #[test]
    fn bullets_are_collected_in_order() {
        let text = "# Electives\ntake one of the following\n- PSCI 220\n- STAT 110\n";
        let sections = split(text).unwrap();

        assert_eq!(sections[0].bullets, vec!["PSCI 220", "STAT 110"]);
    }

    #[test]
    fn deeper_headings_nest() {
        let text = "\
# Major
take all of the following

## Core
take PSCI 220

## Electives
take one of the following
- PSCI 320
- PSCI 340
";
        let sections = split(text).unwrap();

        assert_eq!(sections.len(), 1);
        let major = &sections[0];
        assert_eq!(major.children.len(), 2);
        assert_eq!(major.children[0].title, "Core");
        assert_eq!(major.children[1].title, "Electives");
        assert_eq!(major.children[1].bullets.len(), 2);
    }

    #[test]
    fn sibling_headings_close_the_previous_section() {
        let text = "\
# First
take PSCI 220

# Second
take STAT 110
";
        let sections = split(text).unwrap();

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "First");
        assert_eq!(sections[1].title, "Second");
    }

    #[test]
    fn shallower_heading_closes_nested_sections() {
        let text = "\
# A
take all of the following

## B
take all of the following

### C
take PSCI 220

## D
take STAT 110
";
        let sections = split(text).unwrap();

        let a = &sections[0];
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0].title, "B");
        assert_eq!(a.children[0].children[0].title, "C");
        assert_eq!(a.children[1].title, "D");
    }

    #[test]
    fn content_before_first_heading_is_stray() {
        let err = split("take PSCI 220\n# Major\n").unwrap_err();
        assert_eq!(err, SplitError::StrayContent("take PSCI 220".to_string()));
    }

    #[test]
    fn second_clause_line_is_stray() {
        let text = "# Major\ntake PSCI 220\ntake STAT 110\n";
        let err = split(text).unwrap_err();
        assert_eq!(err, SplitError::StrayContent("take STAT 110".to_string()));
    }

    #[test]
    fn heading_without_title_is_stray() {
        let err = split("# \ntake PSCI 220\n").unwrap_err();
        assert!(matches!(err, SplitError::StrayContent(_)));
    }

    #[test]
    fn hash_run_without_space_is_content() {
        // `#Major` is not a heading, and there is no open section to hold it.
        let err = split("#Major\n").unwrap_err();
        assert_eq!(err, SplitError::StrayContent("#Major".to_string()));
    }

    #[test]
    fn empty_document_is_rejected() {
        assert_eq!(split(""), Err(SplitError::Empty));
        assert_eq!(split("\n\n  \n"), Err(SplitError::Empty));
    }

    #[test]
    fn blank_lines_are_ignored() {
        let text = "\n# Major\n\ntake PSCI 220\n\n";
        let sections = split(text).unwrap();
        assert_eq!(sections[0].clause.as_deref(), Some("take PSCI 220"));
    }

    #[test]
    fn indented_bullets_are_accepted() {
        let text = "# Electives\ntake one of the following\n  - PSCI 220\n  - STAT 110\n";
        let sections = split(text).unwrap();
        assert_eq!(sections[0].bullets, vec!["PSCI 220", "STAT 110"]);
    }
}
