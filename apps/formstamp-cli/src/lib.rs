//! `fill-date`: stamp a date into a PDF form field and flatten the form

pub mod cli;
pub mod date;
pub mod error;

use chrono::NaiveDate;
use formstamp_core::{fill_and_flatten, FillConfig, FlattenReport};
use tracing::{debug, info};

pub use cli::Args;
pub use error::CliError;

/// Result of a successful run
#[derive(Debug)]
pub struct Outcome {
    /// The date as written into the field
    pub date: String,
    pub report: FlattenReport,
}

impl Outcome {
    /// Line printed on success
    pub fn summary(&self, args: &Args) -> String {
        format!(
            "Successfully created '{}' with date '{}' in field '{}' (flattened)",
            args.output.display(),
            self.date,
            args.field
        )
    }
}

/// Resolve and format the date, then fill and flatten.
///
/// The date is settled before the input is opened, so a bad override or
/// format never touches any file.
pub fn run(args: &Args, today: NaiveDate) -> Result<Outcome, CliError> {
    let date = date::resolve_date(args.force_date.as_deref(), today)?;
    let date = date::format_date(date, &args.format)?;
    debug!(date = %date, "Resolved date");

    let config = fill_config(args)?;
    let report = fill_and_flatten(&args.input, &args.output, &args.field, &date, &config)?;
    info!(
        output = %args.output.display(),
        page = report.page_index + 1,
        "Date stamped"
    );

    Ok(Outcome { date, report })
}

/// Settings file (if any) with command-line overrides applied
pub fn fill_config(args: &Args) -> Result<FillConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => FillConfig::from_file(path)?,
        None => FillConfig::default(),
    };
    if let Some(font) = args.font {
        config.font = font;
    }
    if let Some(size) = args.font_size {
        config.font_size = size;
    }
    if args.strip_acroform {
        config.strip_acroform = true;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use formstamp_core::{FormError, StandardFont};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_flags_override_settings_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stamp.toml");
        fs::write(&path, "font = \"Courier\"\nfont_size = 9.0\nbaseline_offset = 3.0\n").unwrap();

        let args = Args::try_parse_from([
            "fill-date",
            "in.pdf",
            "out.pdf",
            "--field",
            "Date",
            "--config",
            path.to_str().unwrap(),
            "--font-size",
            "14",
        ])
        .unwrap();
        let config = fill_config(&args).unwrap();
        assert_eq!(config.font, StandardFont::Courier);
        assert_eq!(config.font_size, 14.0);
        assert_eq!(config.baseline_offset, 3.0);
    }

    #[test]
    fn test_bad_font_size_is_config_error() {
        let args = Args::try_parse_from([
            "fill-date", "in.pdf", "out.pdf", "--field", "Date", "--font-size", "0",
        ])
        .unwrap();
        let err = fill_config(&args).unwrap_err();
        assert!(matches!(err, CliError::Form(FormError::Config(_))));
        assert_eq!(err.exit_code(), 2);
    }
}
