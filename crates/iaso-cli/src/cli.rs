//! CLI argument definitions for the submission importer.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use iaso_model::ImportStrategy;

#[derive(Parser)]
#[command(
    name = "iaso-import",
    version,
    about = "Import form submissions into an IASO server",
    long_about = "Import tabular form submissions (CSV or Excel) into an IASO server.\n\n\
                  Rows are validated against the form's versioned question and choice\n\
                  definitions, rendered as OpenRosa submission documents, and pushed\n\
                  one at a time: created, updated through an Enketo edit session, or\n\
                  deleted, depending on the import strategy."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Log output format (pretty for humans, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,
}

#[derive(Subcommand)]
pub enum Command {
    /// Import a submissions file against a form.
    Import(ImportArgs),
}

#[derive(Parser)]
pub struct ImportArgs {
    /// Path to the submissions file (.csv, .xlsx or .xls).
    #[arg(value_name = "SUBMISSIONS_FILE")]
    pub input_file: PathBuf,

    /// IASO server base URL, e.g. https://iaso.example.org.
    #[arg(long = "server", value_name = "URL")]
    pub server_url: String,

    /// IASO account username.
    #[arg(long = "username", value_name = "NAME")]
    pub username: String,

    /// IASO account password.
    #[arg(long = "password", value_name = "PASSWORD")]
    pub password: String,

    /// Target project id; resolves the app id used by the instances endpoint.
    #[arg(long = "project", value_name = "ID")]
    pub project: i64,

    /// Target form id.
    #[arg(long = "form-id", value_name = "ID")]
    pub form_id: i64,

    /// Import strategy.
    ///
    /// UPDATE, CREATE_AND_UPDATE and DELETE require the input file to carry
    /// submission identifier columns.
    #[arg(long = "strategy", value_enum, default_value = "create")]
    pub strategy: StrategyArg,

    /// Output directory for generated documents and the run summary
    /// (default: iaso-pipelines/import-submissions/<form_name>).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Enforce full schema and constraint validation per row.
    ///
    /// Without this flag only strategy-critical identifier columns are
    /// checked and constraint violations are logged but not enforced.
    #[arg(long = "strict")]
    pub strict: bool,

    /// Classify and validate without network writes or output files.
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    Create,
    Update,
    CreateAndUpdate,
    Delete,
}

impl From<StrategyArg> for ImportStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Create => ImportStrategy::Create,
            StrategyArg::Update => ImportStrategy::Update,
            StrategyArg::CreateAndUpdate => ImportStrategy::CreateAndUpdate,
            StrategyArg::Delete => ImportStrategy::Delete,
        }
    }
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
