//! CLI argument definitions for the portal ETL.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use portal_model::{RunLevel, RunMode};

#[derive(Parser)]
#[command(
    name = "portal-etl",
    version,
    about = "Clinical genomics portal ETL - assemble summary and timeline artifacts",
    long_about = "Assemble the tab-separated artifacts the clinical genomics portal \
                  consumes: per-subject summary files with a five-row metadata header \
                  and per-event timeline files with day-offset dates.\n\n\
                  All dates leave the pipeline as signed day offsets from each \
                  patient's first tumor sequencing date; MRNs never reach an output."
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

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow row-level values (MRNs, sample ids) in trace logs.
    ///
    /// Off by default: identifiers are replaced with a redaction token.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the summary-assembly pipeline for one cohort and level.
    Summary(SummaryArgs),

    /// Deidentify a timeline table against the anchor index.
    Timeline(TimelineArgs),
}

#[derive(Parser)]
pub struct SummaryArgs {
    /// Path to the warehouse credentials JSON file.
    #[arg(long = "credentials", value_name = "PATH")]
    pub credentials: PathBuf,

    /// Root directory of the warehouse snapshot (one TSV per table).
    #[arg(long = "warehouse-root", value_name = "DIR")]
    pub warehouse_root: PathBuf,

    /// Directory of summary descriptor YAML files.
    #[arg(long = "descriptor-dir", value_name = "DIR")]
    pub descriptor_dir: PathBuf,

    /// Fully qualified table holding MRN / sequencing-date / sample rows.
    #[arg(long = "anchor-table", value_name = "NAME")]
    pub anchor_table: String,

    /// Path to the cohort template TSV (subject-id universe).
    #[arg(long = "template", value_name = "PATH")]
    pub template: PathBuf,

    /// Run level: which descriptors apply and which id keys the artifact.
    #[arg(long = "level", value_enum, default_value = "patient")]
    pub level: LevelArg,

    /// Source-table selection: production or test tables from the descriptors.
    #[arg(long = "mode", value_enum, default_value = "production")]
    pub mode: ModeArg,

    /// Cohort tag; names the artifact subdirectory.
    #[arg(long = "cohort", value_name = "TAG")]
    pub cohort: String,

    /// Warehouse volume root for intermediates and the published artifact.
    #[arg(long = "volume-dir", value_name = "DIR")]
    pub volume_dir: PathBuf,

    /// Local directory receiving the artifact and manifest copies.
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Catalog used when registering intermediate tables.
    #[arg(long = "catalog", value_name = "NAME")]
    pub catalog: String,

    /// Schema used when registering intermediate tables.
    #[arg(long = "schema", value_name = "NAME")]
    pub schema: String,
}

#[derive(Parser)]
pub struct TimelineArgs {
    /// Path to the warehouse credentials JSON file.
    #[arg(long = "credentials", value_name = "PATH")]
    pub credentials: PathBuf,

    /// Root directory of the warehouse snapshot (one TSV per table).
    #[arg(long = "warehouse-root", value_name = "DIR")]
    pub warehouse_root: PathBuf,

    /// Fully qualified table holding MRN / sequencing-date / sample rows.
    #[arg(long = "anchor-table", value_name = "NAME")]
    pub anchor_table: String,

    /// Fully qualified timeline source table (MRN, START_DATE, STOP_DATE, ...).
    #[arg(long = "source-table", value_name = "NAME")]
    pub source_table: String,

    /// Follow-up timeline table; caps stop offsets per patient when given.
    #[arg(long = "follow-up-table", value_name = "NAME")]
    pub follow_up_table: Option<String>,

    /// Cohort template TSV; restricts output to its patients when given.
    #[arg(long = "template", value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Cohort tag; names the artifact subdirectory.
    #[arg(long = "cohort", value_name = "TAG")]
    pub cohort: String,

    /// Artifact file name (e.g. data_timeline_specimen.txt).
    #[arg(long = "artifact-name", value_name = "NAME")]
    pub artifact_name: String,

    /// Warehouse volume root for the published artifact.
    #[arg(long = "volume-dir", value_name = "DIR")]
    pub volume_dir: PathBuf,

    /// Local directory receiving the artifact copy.
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: PathBuf,
}

/// Run-level CLI choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LevelArg {
    Patient,
    Sample,
}

impl From<LevelArg> for RunLevel {
    fn from(value: LevelArg) -> Self {
        match value {
            LevelArg::Patient => RunLevel::Patient,
            LevelArg::Sample => RunLevel::Sample,
        }
    }
}

/// Source-table mode CLI choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Production,
    Test,
}

impl From<ModeArg> for RunMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Production => RunMode::Production,
            ModeArg::Test => RunMode::Test,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
