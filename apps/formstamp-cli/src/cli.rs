use std::path::PathBuf;

use clap::Parser;
use formstamp_core::StandardFont;

use crate::date::DEFAULT_FORMAT;

#[derive(Parser, Debug, Clone)]
#[command(name = "fill-date")]
#[command(
    version,
    about = "Fill a PDF form field with a date and flatten the form"
)]
pub struct Args {
    /// Input PDF
    pub input: PathBuf,

    /// Output PDF (may be the same path as the input)
    pub output: PathBuf,

    /// Name of the form field to fill
    #[arg(long)]
    pub field: String,

    /// strftime format of the date
    #[arg(long, default_value = DEFAULT_FORMAT)]
    pub format: String,

    /// Use this date (YYYY-MM-DD) instead of today
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub force_date: Option<String>,

    /// Standard font for the stamped text
    #[arg(long)]
    pub font: Option<StandardFont>,

    /// Font size in points
    #[arg(long)]
    pub font_size: Option<f64>,

    /// Fill settings file (TOML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also remove the form definition from the document catalog
    #[arg(long)]
    pub strip_acroform: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
