use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::export::ExportFormat;

#[derive(Debug, Parser)]
#[command(author, version, about = "Load, filter and export CSV files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Filter, sort and search a CSV file, then print a page or export the result
    Filter(FilterArgs),
    /// Show the inferred type of every column
    Types(InputArgs),
    /// Show the most frequent values of one or more columns
    Analyze(AnalyzeArgs),
    /// Suggest filters from common value patterns
    Suggest(InputArgs),
    /// Manage named filter presets
    Preset(PresetArgs),
    /// Write a configuration file holding every default setting
    ConfigInit(ConfigInitArgs),
}

/// Options shared by every command that loads a CSV file.
#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Input CSV file (`-` reads standard input)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML configuration file
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Seconds before loading finishes without type detection
    #[arg(long = "timeout-secs")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Args)]
pub struct InputArgs {
    #[command(flatten)]
    pub load: LoadArgs,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    #[command(flatten)]
    pub load: LoadArgs,
    /// Filters such as `status equals open`, `name != bob` or `code ~ ^A`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Apply the filters of a saved preset (after any --filter)
    #[arg(long = "preset")]
    pub preset: Option<String>,
    /// Preset file used by --preset
    #[arg(long = "presets", default_value = "presets.json")]
    pub presets: PathBuf,
    /// Keep at most this many matching rows
    #[arg(long)]
    pub limit: Option<usize>,
    /// Sort directive of the form `column[:asc|desc]`
    #[arg(long = "sort")]
    pub sort: Option<String>,
    /// Keep only rows containing this text in a visible column
    #[arg(long = "search")]
    pub search: Option<String>,
    /// Page to print (1-based, clamped to the available pages)
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    /// Rows per page
    #[arg(long = "page-size")]
    pub page_size: Option<usize>,
    /// Print the virtual window at this scroll offset (pixels) instead of a page
    #[arg(long = "scroll-top")]
    pub scroll_top: Option<u64>,
    /// Hide the internal routing fields from output
    #[arg(long = "hide-internal")]
    pub hide_internal: bool,
    /// Export the result instead of printing a page
    #[arg(long = "export", value_enum)]
    pub export: Option<ExportFormat>,
    /// Export destination (`-` for stdout); defaults to a timestamped file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub load: LoadArgs,
    /// Columns to analyze
    #[arg(short = 'C', long = "columns", required = true, value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Maximum distinct values to display per column (0 = all)
    #[arg(long, default_value_t = crate::analysis::DEFAULT_TOP)]
    pub top: usize,
}

#[derive(Debug, Args)]
pub struct PresetArgs {
    /// Preset file
    #[arg(long = "presets", default_value = "presets.json", global = true)]
    pub presets: PathBuf,
    #[command(subcommand)]
    pub action: PresetAction,
}

#[derive(Debug, Subcommand)]
pub enum PresetAction {
    /// Save a filter list under a name
    Save {
        /// Preset name
        #[arg(short, long)]
        name: String,
        /// Filters in the same syntax as `filter --filter`
        #[arg(long = "filter", required = true, action = clap::ArgAction::Append)]
        filters: Vec<String>,
    },
    /// List saved presets
    List,
    /// Delete a preset
    Remove {
        /// Preset name
        #[arg(short, long)]
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Destination YAML file
    #[arg(short = 'o', long = "output", default_value = "csv-sieve.yaml")]
    pub output: PathBuf,
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
