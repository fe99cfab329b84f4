//! Fill and flatten PDF forms
//!
//! This crate stamps a value into a named form field and turns the form into
//! static content using lopdf:
//! - `locate`: find the page and rectangle of a widget by field name
//! - `overlay`: render the value as a single-line text overlay and merge it
//!   onto a page
//! - `flatten`: set the field value, merge the overlay, remove annotations
//!
//! `fill_and_flatten` runs the whole pipeline from input file to output file.

pub mod config;
pub mod document;
pub mod error;
pub mod flatten;
pub mod fonts;
pub mod locate;
pub mod overlay;
pub mod writer;

use std::path::Path;

pub use config::{FillConfig, PageSize, RenderConfig, READ_ONLY_FLAG};
pub use document::{Annotation, AnnotationHandle, FormDocument, Page, Rect};
pub use error::FormError;
pub use flatten::{flatten, FlattenReport};
pub use fonts::StandardFont;
pub use locate::{locate, locate_all, FieldLocation};
pub use overlay::{merge_overlay, render, OverlayArtifact};
pub use writer::{read_document, write_document};

/// Read `input`, stamp `value` into `field_name`, flatten, write `output`.
///
/// `output` is only written when every earlier step succeeded.
pub fn fill_and_flatten<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    field_name: &str,
    value: &str,
    config: &FillConfig,
) -> Result<FlattenReport, FormError> {
    let mut form = read_document(input)?;
    if form.page_count() == 0 {
        return Err(FormError::EmptyDocument);
    }
    let report = flatten(&mut form, field_name, value, config)?;
    write_document(&mut form, output)?;
    Ok(report)
}
