//! Field lookup by name
//!
//! Pages are scanned in order, then annotations in order within each page;
//! the first widget with the requested name and a usable rect wins.

use lopdf::ObjectId;
use tracing::debug;

use crate::document::{normalize_field_name, AnnotationHandle, FormDocument, Page, Rect};
use crate::error::FormError;

/// Where a field's overlay is anchored
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldLocation {
    /// 0-based page index
    pub page_index: usize,
    /// 1-based page number
    pub page_number: u32,
    pub page_id: ObjectId,
    pub rect: Rect,
}

/// One widget annotation belonging to a field
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetMatch {
    pub page_index: usize,
    pub handle: AnnotationHandle,
    pub rect: Option<Rect>,
}

/// Find the page and rectangle of the first widget named `field_name`
pub fn locate(doc: &FormDocument, field_name: &str) -> Result<FieldLocation, FormError> {
    let pages = doc.pages()?;
    locate_in(&pages, field_name)
}

/// Same as [`locate`], over an already-read page list
pub fn locate_in(pages: &[Page], field_name: &str) -> Result<FieldLocation, FormError> {
    let name = normalize_field_name(field_name);

    for page in pages {
        for annot in page.annotations.iter().filter(|a| a.is_field(&name)) {
            match annot.rect {
                Some(rect) => {
                    debug!(
                        field = %name,
                        page = page.number,
                        x0 = rect.x0,
                        y0 = rect.y0,
                        x1 = rect.x1,
                        y1 = rect.y1,
                        "Located field"
                    );
                    return Ok(FieldLocation {
                        page_index: page.index,
                        page_number: page.number,
                        page_id: page.id,
                        rect,
                    });
                }
                None => debug!(field = %name, page = page.number, "Widget has no usable Rect"),
            }
        }
    }

    Err(FormError::FieldNotFound(name))
}

/// Every widget named `field_name`, in document order
pub fn locate_all(pages: &[Page], field_name: &str) -> Vec<WidgetMatch> {
    let name = normalize_field_name(field_name);
    pages
        .iter()
        .flat_map(|page| {
            page.annotations
                .iter()
                .filter(|a| a.is_field(&name))
                .map(move |a| WidgetMatch {
                    page_index: page.index,
                    handle: a.handle,
                    rect: a.rect,
                })
        })
        .collect()
}
