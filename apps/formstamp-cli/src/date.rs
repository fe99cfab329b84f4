//! Date resolution and formatting

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;

use crate::error::CliError;

pub const DEFAULT_FORMAT: &str = "%m/%d/%Y";

/// `--force-date` when given (strict `YYYY-MM-DD`), otherwise `today`
pub fn resolve_date(force: Option<&str>, today: NaiveDate) -> Result<NaiveDate, CliError> {
    match force {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| CliError::InvalidDateOverride(raw.to_string())),
        None => Ok(today),
    }
}

/// Render `date` with a strftime `format`.
///
/// Unknown specifiers and time-of-day fields are rejected instead of
/// panicking during formatting.
pub fn format_date(date: NaiveDate, format: &str) -> Result<String, CliError> {
    let invalid = || CliError::InvalidDateFormat(format.to_string());

    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.is_empty() || items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(invalid());
    }

    let mut out = String::new();
    write!(out, "{}", date.format_with_items(items.into_iter())).map_err(|_| invalid())?;
    if out.is_empty() {
        return Err(invalid());
    }
    Ok(out)
}
