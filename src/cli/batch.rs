use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use chrono::Utc;
use indicatif::ProgressBar;
use rayon::prelude::*;
use satis::{
    audit::audit,
    domain::{RuleTree, SolverConfig},
    solve::Verdict,
    storage::{self, Transcript},
};
use tracing::instrument;
use walkdir::WalkDir;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Batch {
    /// The requirement document to audit against
    requirement: PathBuf,

    /// Directory of transcripts to audit
    transcript_dir: PathBuf,

    /// Write a JSON report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

impl Batch {
    #[instrument(skip(config))]
    pub fn run(self, config: &SolverConfig) -> anyhow::Result<()> {
        let tree = storage::requirement::load(&self.requirement)?;

        let paths = collect_transcript_paths(&self.transcript_dir);
        if paths.is_empty() {
            bail!(
                "No transcripts found under {}",
                self.transcript_dir.display()
            );
        }

        let progress = ProgressBar::new(u64::try_from(paths.len()).expect("usize fits in u64"));
        let outcomes: Vec<Outcome> = paths
            .par_iter()
            .map(|path| {
                let outcome = audit_one(path, &tree, config);
                progress.inc(1);
                outcome
            })
            .collect();
        progress.finish_and_clear();

        for outcome in &outcomes {
            match &outcome.result {
                Ok(audited) => {
                    let marker = match audited.verdict {
                        Verdict::Satisfied => "PASS".success(),
                        Verdict::Unsatisfiable => "FAIL".failure(),
                        Verdict::Inconclusive => "INC ".info(),
                    };
                    println!("{marker} {} ({})", audited.student, outcome.path.display());
                }
                Err(error) => {
                    println!("{} {}: {error}", "ERR ".warning(), outcome.path.display());
                }
            }
        }

        let satisfied = count(&outcomes, Verdict::Satisfied);
        let unsatisfied = count(&outcomes, Verdict::Unsatisfiable);
        let inconclusive = count(&outcomes, Verdict::Inconclusive);
        let errors = outcomes
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .count();

        println!();
        println!(
            "{} transcripts: {satisfied} satisfied, {unsatisfied} unsatisfied, {inconclusive} inconclusive, {errors} errors",
            outcomes.len()
        );

        if let Some(report) = &self.report {
            write_report(report, &outcomes)
                .with_context(|| format!("Failed to write report to {}", report.display()))?;
        }

        Ok(())
    }
}

/// The result of auditing one transcript file. Load failures are recorded,
/// not fatal, so one bad file cannot sink the run.
#[derive(Debug)]
struct Outcome {
    path: PathBuf,
    result: Result<Audited, String>,
}

#[derive(Debug)]
struct Audited {
    student: String,
    verdict: Verdict,
    bonus: usize,
    courses_used: usize,
    fingerprint: String,
}

fn audit_one(path: &Path, tree: &RuleTree, config: &SolverConfig) -> Outcome {
    let result = Transcript::load(path)
        .map_err(|error| format!("{:#}", anyhow::Error::new(error)))
        .map(|transcript| {
            let pool = transcript.pool();
            let result = audit(tree, &pool, config);
            let score = result.score();
            Audited {
                student: transcript.student().to_string(),
                verdict: result.verdict(),
                bonus: score.bonus(),
                courses_used: score.courses_used(),
                fingerprint: result.fingerprint(),
            }
        });

    Outcome {
        path: path.to_path_buf(),
        result,
    }
}

/// Walks a directory tree and returns every YAML file, sorted for a
/// deterministic report order.
fn collect_transcript_paths(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|extension| extension == "yaml" || extension == "yml")
        })
        .map(walkdir::DirEntry::into_path)
        .collect();
    paths.sort();
    paths
}

fn count(outcomes: &[Outcome], verdict: Verdict) -> usize {
    outcomes
        .iter()
        .filter(|outcome| matches!(&outcome.result, Ok(audited) if audited.verdict == verdict))
        .count()
}

fn write_report(path: &Path, outcomes: &[Outcome]) -> anyhow::Result<()> {
    let audits: Vec<serde_json::Value> = outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(audited) => serde_json::json!({
                "transcript": outcome.path,
                "student": audited.student,
                "verdict": audited.verdict.to_string(),
                "score": {
                    "bonus": audited.bonus,
                    "courses_used": audited.courses_used,
                },
                "fingerprint": audited.fingerprint,
            }),
            Err(error) => serde_json::json!({
                "transcript": outcome.path,
                "error": error,
            }),
        })
        .collect();

    let report = serde_json::json!({
        "generated": Utc::now().to_rfc3339(),
        "audits": audits,
    });

    fs::write(
        path,
        serde_json::to_string_pretty(&report).expect("this must never fail"),
    )?;
    Ok(())
}
