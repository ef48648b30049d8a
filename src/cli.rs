use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

use crate::config::OutputFormat;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Csv,
    Tsv,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Tsv => OutputFormat::Tsv,
        }
    }
}

/// Enrich a bookmark table with AI summaries, tags and authors.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Input table (csv, tsv or semicolon separated) with at least a `url` column
    pub input: PathBuf,

    /// Output path [default: <input-stem>_enriched.<format>]
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Output format, overrides the config file
    #[clap(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Continue from a previous (possibly interrupted) output
    #[clap(short, long, default_value = "false")]
    pub resume: bool,

    /// Debug logging
    #[clap(short, long, default_value = "false")]
    pub verbose: bool,

    /// Config file
    #[clap(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Don't draw a progress bar
    #[clap(long, default_value = "false")]
    pub no_progress: bool,
}

/// `<input-dir>/<input-stem>_enriched.<ext>`
pub fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "bookmarks".to_string());
    input.with_file_name(format!("{stem}_enriched.{}", format.extension()))
}
