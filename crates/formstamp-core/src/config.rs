//! Fill settings
//!
//! Everything the fill pipeline used to keep as module-level constants
//! (font, size, offsets, flag bits) lives here, with defaults matching the
//! date-stamping use case. Settings can be loaded from a TOML file; every
//! key is optional.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::fonts::StandardFont;

/// Read-only bit of the field flags (`/Ff` bit position 1)
pub const READ_ONLY_FLAG: i64 = 1;

/// Page dimensions in PDF points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn letter() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
        }
    }

    pub fn a4() -> Self {
        Self {
            width: 595.0,
            height: 842.0,
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::letter()
    }
}

/// Settings for drawing the overlay text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    pub font: StandardFont,
    pub font_size: f64,
    /// Distance of the text baseline above the bottom edge of the field
    pub baseline_offset: f64,
    /// Size of the single-page overlay artifact
    pub reference_page: PageSize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        FillConfig::default().render_config()
    }
}

/// Settings for a fill-and-flatten run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    pub font: StandardFont,
    pub font_size: f64,
    pub baseline_offset: f64,
    pub reference_page: PageSize,
    /// Bits OR-ed into the field flags of every filled widget
    pub read_only_flag: i64,
    /// Also drop the catalog `/AcroForm` once the widgets are gone
    pub strip_acroform: bool,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            font: StandardFont::Helvetica,
            font_size: 12.0,
            baseline_offset: 2.0,
            reference_page: PageSize::letter(),
            read_only_flag: READ_ONLY_FLAG,
            strip_acroform: false,
        }
    }
}

impl FillConfig {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FormError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FormError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, FormError> {
        let config: FillConfig = toml::from_str(content)
            .map_err(|e| FormError::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would produce an unusable overlay
    pub fn validate(&self) -> Result<(), FormError> {
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(FormError::Config(format!(
                "font_size must be a positive number, got {}",
                self.font_size
            )));
        }
        if !self.baseline_offset.is_finite() {
            return Err(FormError::Config(
                "baseline_offset must be a finite number".into(),
            ));
        }
        let page = self.reference_page;
        if !(page.width > 0.0 && page.height > 0.0) {
            return Err(FormError::Config(format!(
                "reference_page must have positive dimensions, got {}x{}",
                page.width, page.height
            )));
        }
        if self.read_only_flag == 0 {
            return Err(FormError::Config(
                "read_only_flag must set at least one bit".into(),
            ));
        }
        Ok(())
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            font: self.font,
            font_size: self.font_size,
            baseline_offset: self.baseline_offset,
            reference_page: self.reference_page,
        }
    }
}
