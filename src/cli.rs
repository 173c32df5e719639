use std::path::{Path, PathBuf};

mod audit;
mod batch;
mod terminal;

use audit::Audit;
use batch::Batch;
use clap::ArgAction;
use satis::{parse, storage, SolverConfig};
use tracing::instrument;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the solver configuration file
    #[arg(short, long, default_value = "satis.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let config = load_config(&self.config);
        self.command.run(&config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

fn load_config(path: &Path) -> SolverConfig {
    SolverConfig::load(path).unwrap_or_else(|e| {
        tracing::debug!("Failed to load config: {e}");
        SolverConfig::default()
    })
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Audit one transcript against a requirement document
    Audit(Audit),

    /// Audit every transcript in a directory
    Batch(Batch),

    /// Compile a requirement document and report diagnostics
    Check(Check),

    /// Print a requirement document in canonical form
    Render(Render),
}

impl Command {
    fn run(self, config: &SolverConfig) -> anyhow::Result<()> {
        match self {
            Self::Audit(command) => command.run(config)?,
            Self::Batch(command) => command.run(config)?,
            Self::Check(command) => command.run()?,
            Self::Render(command) => command.run()?,
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Check {
    /// The requirement document to compile
    requirement: PathBuf,
}

impl Check {
    #[instrument]
    fn run(self) -> anyhow::Result<()> {
        use terminal::Colorize;

        match storage::requirement::load(&self.requirement) {
            Ok(tree) => {
                println!(
                    "{}",
                    format!(
                        "✅ {}: {} sections, {} rules",
                        self.requirement.display(),
                        tree.sections().len(),
                        tree.len()
                    )
                    .success()
                );
                Ok(())
            }
            Err(storage::requirement::LoadError::Parse(error)) => {
                eprintln!(
                    "{}",
                    format!("⚠️  {}: {error}", self.requirement.display()).warning()
                );
                std::process::exit(2);
            }
            Err(other) => Err(other.into()),
        }
    }
}

#[derive(Debug, clap::Parser)]
pub struct Render {
    /// The requirement document to render
    requirement: PathBuf,
}

impl Render {
    #[instrument]
    fn run(self) -> anyhow::Result<()> {
        let tree = storage::requirement::load(&self.requirement)?;
        print!("{}", parse::canon::render(&tree));
        Ok(())
    }
}
