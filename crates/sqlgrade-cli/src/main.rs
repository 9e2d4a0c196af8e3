//! sqlgrade CLI
//!
//! Grades SQL submissions against reference queries from the command line.
//! Reports and trees go to stdout as JSON; logs go to stderr.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use sqlgrade_core::{
    canonicalize, extract_features, parse_with_diagnostics, Grader, GraderConfig,
    InterchangeNode, RubricWeights, SchemaDescriptor,
};

/// Grade SQL queries by logical structure rather than text.
#[derive(Parser)]
#[command(name = "sqlgrade")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Grader configuration file (JSON).
    #[arg(short, long, env = "SQLGRADE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a submission and print the report.
    Grade {
        /// The submitted query.
        #[arg(short, long)]
        student: String,

        /// An acceptable solution. Repeat for several.
        #[arg(short, long = "reference", required = true)]
        references: Vec<String>,

        /// Schema file: table name to column name to type.
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Rubric file: category name to weight.
        #[arg(long, conflicts_with = "default_rubric")]
        rubric: Option<PathBuf>,

        /// Apply the built-in rubric (projections 20, tables 30, filters 50).
        #[arg(long)]
        default_rubric: bool,

        /// Pretty-print the report.
        #[arg(long)]
        pretty: bool,
    },

    /// Print the grading tree of a query as interchange JSON.
    Parse {
        #[arg(long)]
        sql: String,

        #[arg(long)]
        schema: Option<PathBuf>,

        /// Canonicalize the tree first.
        #[arg(long)]
        canonical: bool,
    },

    /// Print the features of a query, one per line.
    Features {
        #[arg(long)]
        sql: String,

        #[arg(long)]
        schema: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.config {
        Some(path) => GraderConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GraderConfig::default(),
    };
    debug!(?config, "Loaded configuration");

    match cli.command {
        Commands::Grade {
            student,
            references,
            schema,
            rubric,
            default_rubric,
            pretty,
        } => {
            let mut grader = Grader::new(config);
            if let Some(path) = &schema {
                grader = grader.with_schema(load_schema(path)?);
            }

            let weights = match (&rubric, default_rubric) {
                (Some(path), _) => Some(load_rubric(path)?),
                (None, true) => Some(RubricWeights::default_rubric()),
                (None, false) => None,
            };

            let report = grader.evaluate(&student, references.as_slice(), weights.as_ref())?;
            info!(
                percentage = report.percentage,
                passed = report.passed,
                "Graded submission"
            );

            let json = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{json}");

            if report.is_gradable() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(2))
            }
        }

        Commands::Parse {
            sql,
            schema,
            canonical,
        } => {
            let schema = schema.as_deref().map(load_schema).transpose()?;
            let parsed = parse_with_diagnostics(&sql, schema.as_ref(), &config.limits)?;
            for warning in &parsed.warnings {
                info!(%warning, "Qualification warning");
            }

            let tree = if canonical {
                canonicalize(parsed.tree)
            } else {
                parsed.tree
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&InterchangeNode::from(&tree))?
            );
            Ok(ExitCode::SUCCESS)
        }

        Commands::Features { sql, schema } => {
            let schema = schema.as_deref().map(load_schema).transpose()?;
            let parsed = parse_with_diagnostics(&sql, schema.as_ref(), &config.limits)?;
            for feature in &extract_features(&canonicalize(parsed.tree)) {
                println!("{feature}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_schema(path: &Path) -> anyhow::Result<SchemaDescriptor> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema {}", path.display()))?;
    SchemaDescriptor::from_json_str(&json)
        .with_context(|| format!("Invalid schema {}", path.display()))
}

fn load_rubric(path: &Path) -> anyhow::Result<RubricWeights> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read rubric {}", path.display()))?;
    RubricWeights::from_json_str(&json)
        .with_context(|| format!("Invalid rubric {}", path.display()))
}
