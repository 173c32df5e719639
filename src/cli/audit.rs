use std::{collections::BTreeMap, path::PathBuf};

use satis::{
    audit::{audit, AuditResult},
    domain::{CourseFilter, NodeId, RuleNode, RuleTree, SolverConfig},
    solve::{CoursePool, Verdict},
    storage::{self, Transcript},
};
use tracing::instrument;

use super::terminal::{self, Colorize};

#[derive(Debug, clap::Parser)]
pub struct Audit {
    /// The requirement document to audit against
    requirement: PathBuf,

    /// The transcript to audit
    transcript: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: Format,

    /// Suppress the report; the exit status carries the verdict
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Format {
    /// Per-node report, indented to match the tree
    Table,
    /// Machine-readable report
    Json,
    /// One line per audit, plus any unmet sections
    Summary,
}

impl Audit {
    #[instrument(skip(config))]
    pub fn run(self, config: &SolverConfig) -> anyhow::Result<()> {
        let tree = storage::requirement::load(&self.requirement)?;
        let transcript = Transcript::load(&self.transcript)?;
        let pool = transcript.pool();
        let result = audit(&tree, &pool, config);

        if !self.quiet {
            match self.format {
                Format::Table => output_table(&transcript, &pool, &result),
                Format::Json => output_json(&transcript, &pool, &result),
                Format::Summary => output_summary(&transcript, &result),
            }
        }

        match result.verdict() {
            Verdict::Satisfied => Ok(()),
            Verdict::Unsatisfiable => std::process::exit(2),
            Verdict::Inconclusive => std::process::exit(3),
        }
    }
}

fn output_table(transcript: &Transcript, pool: &CoursePool, result: &AuditResult) {
    let tree = result.tree();
    let titles = section_titles(tree);
    let show_claims = !terminal::is_narrow();

    println!("Audit for {}", transcript.student());
    println!();

    for (id, depth) in result.walk() {
        let marker = match result.report(id).satisfied() {
            Some(true) => "PASS".success(),
            Some(false) => "FAIL".failure(),
            None => "  - ".dim(),
        };

        let mut line = clause(tree, id);
        if let Some(title) = titles.get(&id) {
            line = format!("{title}: {line}");
        }

        let mut claims = String::new();
        if show_claims {
            if let Some(claimed) = result.report(id).claimed() {
                let codes = claimed
                    .iter()
                    .map(|course| pool.record(*course).code().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                claims = format!(" [{codes}]").dim();
            }
        }

        println!("{marker} {}{line}{claims}", "  ".repeat(depth));
    }

    println!();
    let verdict = match result.verdict() {
        Verdict::Satisfied => "✅ satisfied".success(),
        Verdict::Unsatisfiable => "⚠️  unsatisfiable".failure(),
        Verdict::Inconclusive => "inconclusive".info(),
    };
    println!("{verdict} ({})", result.score());
}

fn output_json(transcript: &Transcript, pool: &CoursePool, result: &AuditResult) {
    let tree = result.tree();
    let titles = section_titles(tree);
    let score = result.score();

    let nodes: Vec<serde_json::Value> = result
        .walk()
        .map(|(id, depth)| {
            let report = result.report(id);
            let claimed = report.claimed().map(|courses| {
                courses
                    .iter()
                    .map(|course| pool.record(*course).code().to_string())
                    .collect::<Vec<_>>()
            });
            serde_json::json!({
                "node": id.index(),
                "depth": depth,
                "title": titles.get(&id),
                "rule": clause(tree, id),
                "satisfied": report.satisfied(),
                "claimed": claimed,
            })
        })
        .collect();

    let report = serde_json::json!({
        "student": transcript.student(),
        "verdict": result.verdict().to_string(),
        "fingerprint": result.fingerprint(),
        "score": {
            "bonus": score.bonus(),
            "courses_used": score.courses_used(),
            "choices": score.choices(),
        },
        "nodes": nodes,
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&report).expect("this must never fail")
    );
}

fn output_summary(transcript: &Transcript, result: &AuditResult) {
    let line = format!(
        "{}: {} ({})",
        transcript.student(),
        result.verdict(),
        result.score()
    );
    let line = match result.verdict() {
        Verdict::Satisfied => line.success(),
        Verdict::Unsatisfiable => line.failure(),
        Verdict::Inconclusive => line.info(),
    };
    println!("{line}");

    for section in result.tree().sections() {
        if result.report(section.node).satisfied() == Some(false) {
            println!("{}", format!("unmet: {}", section.title).warning());
        }
    }
}

fn section_titles(tree: &RuleTree) -> BTreeMap<NodeId, &str> {
    tree.sections()
        .iter()
        .map(|section| (section.node, section.title.as_str()))
        .collect()
}

/// One-line description of a node, in the document grammar's vocabulary.
fn clause(tree: &RuleTree, id: NodeId) -> String {
    match tree.node(id) {
        RuleNode::CourseMatch(filter) => describe_filter(filter),
        RuleNode::Reference { title, .. } => format!("\"{title}\""),
        RuleNode::AllOf(_) => "all of the following".to_string(),
        RuleNode::OneOf(_) => "one of the following".to_string(),
        RuleNode::CountOf { threshold, .. } => format!("at least {threshold} of the following"),
        RuleNode::CountingFilter {
            threshold,
            predicate,
            ..
        } => {
            let mut text = format!("count at least {threshold} courses");
            if let Some(number) = predicate.number() {
                text.push_str(&format!(" numbered {number}"));
            }
            if let Some(attribute) = predicate.attribute() {
                text.push_str(&format!(" with attribute '{attribute}'"));
            }
            text
        }
    }
}

fn describe_filter(filter: &CourseFilter) -> String {
    use satis::domain::NumberFilter;

    let groups = filter
        .groups()
        .iter()
        .map(|group| {
            group
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect::<Vec<_>>()
        .join(" or ");

    // A single-group exact match reads better as the bare course code.
    if let (1, Some(NumberFilter::Exactly(number)), None, false) = (
        filter.groups().len(),
        filter.number(),
        filter.attribute(),
        filter.reusable(),
    ) {
        return format!("{groups} {number}");
    }

    let mut text = groups;
    if let Some(number) = filter.number() {
        text.push_str(&format!(" {number}"));
    }
    if let Some(attribute) = filter.attribute() {
        text.push_str(&format!(" with attribute '{attribute}'"));
    }
    if filter.reusable() {
        text.push_str(" (reusable)");
    }
    text
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use nonempty::nonempty;
    use satis::domain::{CourseNumber, NumberFilter, Subject};

    use super::*;

    fn subject_group(subjects: &[&str]) -> BTreeSet<Subject> {
        subjects
            .iter()
            .map(|s| Subject::new((*s).to_string()).unwrap())
            .collect()
    }

    #[test]
    fn filter_description_includes_every_constraint() {
        let filter = CourseFilter::new(
            nonempty![subject_group(&["PSCI"])],
            Some(NumberFilter::AtLeast(CourseNumber::new(300))),
            Some("writing".to_string()),
            true,
        );
        assert_eq!(
            describe_filter(&filter),
            "PSCI >= 300 with attribute 'writing' (reusable)"
        );
    }

    #[test]
    fn cross_listed_groups_join_with_slash() {
        let filter = CourseFilter::new(
            nonempty![subject_group(&["ES", "PS"]), subject_group(&["STAT"])],
            None,
            None,
            false,
        );
        assert_eq!(describe_filter(&filter), "ES/PS or STAT");
    }

    #[test]
    fn clauses_name_each_node_kind() {
        let tree = satis::compile(
            "\
# Major
take all of the following
- PSCI 220
- complete the \"Breadth\" requirement

# Breadth
take one of the following
- STAT 110
- STAT 220
",
        )
        .unwrap();

        let major = tree.section("Major").unwrap();
        assert_eq!(clause(&tree, major), "all of the following");

        let children = tree.children(major);
        assert_eq!(clause(&tree, children[0]), "PSCI 220");
        assert_eq!(clause(&tree, children[1]), "\"Breadth\"");

        let breadth = tree.section("Breadth").unwrap();
        assert_eq!(clause(&tree, breadth), "one of the following");
    }

    #[test]
    fn exact_single_group_filters_render_as_bare_codes() {
        let filter = CourseFilter::new(
            nonempty![subject_group(&["PSCI"])],
            Some(NumberFilter::Exactly(CourseNumber::new(220))),
            None,
            false,
        );
        assert_eq!(describe_filter(&filter), "PSCI 220");
    }
}
