use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use plantsync_kernel::adapters::{JsonDocumentHost, JsonProject};
use plantsync_kernel::batch::{
    process_document, run_batch, write_summary, BatchOutcome, DocumentOutcome, RunError,
};
use plantsync_kernel::config::{parse_save_flag, ConfigError, RunConfig, DEFAULT_OUTPUT_FILE_NAME};
use plantsync_kernel::feed::{load_batch_from_path, MetadataBatch};
use plantsync_kernel::log::{JsonLinesRunLogStore, RunLog};
use plantsync_kernel::parts::PartSelection;
use plantsync_kernel::project::ProjectDescriptor;

/// Plantsync: apply a JSON metadata feed to linked project documents
#[derive(Parser, Debug)]
#[command(name = "plantsync")]
#[command(about = "Apply a JSON metadata feed to linked project documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply the feed to every drawing of a project
    Batch(BatchArgs),

    /// Apply the feed to a single document
    Apply(ApplyArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the project descriptor JSON
    #[arg(long, env = "PLANTSYNC_PROJECT")]
    project: Option<PathBuf>,

    /// Path to the metadata feed JSON
    #[arg(long, env = "PLANTSYNC_FEED")]
    feed: Option<PathBuf>,

    /// Save updated documents (`0` or `false` to only report)
    #[arg(long, env = "PLANTSYNC_SAVE_CHANGES")]
    save_changes: Option<String>,

    /// File name used for saved documents, next to their source
    #[arg(long, env = "PLANTSYNC_OUTPUT_NAME", default_value = DEFAULT_OUTPUT_FILE_NAME)]
    output_name: String,
}

impl RunArgs {
    fn into_config(self) -> RunConfig {
        let mut config = RunConfig::new(
            self.project.unwrap_or_default(),
            self.feed.unwrap_or_default(),
        );
        config.save_changes = parse_save_flag(self.save_changes.as_deref());
        config.output_file_name = self.output_name;
        config
    }
}

#[derive(Args, Debug)]
struct BatchArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Where to write the run summary JSON
    #[arg(long, env = "PLANTSYNC_SUMMARY")]
    summary: Option<PathBuf>,

    /// JSON Lines run log to append to
    #[arg(long, env = "PLANTSYNC_LOG_PATH")]
    log_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Document to update
    #[arg(long)]
    document: PathBuf,
}

/// Wrapper for single-document JSON output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyOutput {
    document: String,
    #[serde(flatten)]
    outcome: DocumentOutcome,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Batch(args) => batch_command(args),
        Command::Apply(args) => apply_command(args),
    }
}

fn batch_command(args: BatchArgs) -> Result<()> {
    let mut config = args.run.into_config();
    config.run_summary_output_path = args.summary;
    config.run_log_path = args.log_path;

    // ----------------------------
    // Fatal checks, nothing touched yet
    // ----------------------------
    config.validate()?;
    let batch = load_batch_from_path(&config.feed_input_path)?;
    tracing::info!(
        feed = %config.feed_input_path.display(),
        records = batch.records.len(),
        "feed loaded"
    );

    // ----------------------------
    // Run; the summary is written whatever happens
    // ----------------------------
    let result = execute_batch(&config, &batch);

    let drawings = result
        .as_ref()
        .map(|outcome| outcome.drawings.clone())
        .unwrap_or_default();
    write_summary(&config, drawings);

    let outcome = result.map_err(|err| {
        tracing::error!(error = %err, "batch run aborted");
        err
    })?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}

fn execute_batch(config: &RunConfig, batch: &MetadataBatch) -> Result<BatchOutcome, RunError> {
    let mut log = match &config.run_log_path {
        Some(path) => {
            let store =
                JsonLinesRunLogStore::open(path).map_err(|e| ConfigError::RunLogUnavailable {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            Some(RunLog::new(store))
        }
        None => None,
    };

    let project = JsonProject::load(&config.project_descriptor_path)?;
    let mut host = JsonDocumentHost;

    Ok(run_batch(config, &project, &mut host, batch, log.as_mut()))
}

fn apply_command(args: ApplyArgs) -> Result<()> {
    let config = args.run.into_config();
    config.validate()?;

    if !args.document.is_file() {
        bail!("document {} does not exist", args.document.display());
    }

    let batch = load_batch_from_path(&config.feed_input_path)?;
    let project = JsonProject::load(&config.project_descriptor_path)?;
    let mut host = JsonDocumentHost;

    tracing::info!(
        document = %args.document.display(),
        feed = %config.feed_input_path.display(),
        "applying feed to document"
    );
    let outcome = process_document(
        &config,
        &mut host,
        &args.document,
        &project.registry(),
        &PartSelection::from_batch(&batch),
        &batch,
    )?;

    let output = ApplyOutput {
        document: args.document.display().to_string(),
        outcome,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
