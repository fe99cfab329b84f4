//! Fill a field, stamp its value onto the page, drop the interactive layer

use lopdf::{Object, StringFormat};
use tracing::{debug, info};

use crate::config::FillConfig;
use crate::document::{FormDocument, Page, Rect};
use crate::error::FormError;
use crate::locate::{locate_all, locate_in, WidgetMatch};
use crate::overlay::{merge_overlay, render};

/// What a flatten run did
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenReport {
    /// 0-based index of the page the value was stamped on
    pub page_index: usize,
    /// Rect of the anchoring widget
    pub rect: Rect,
    /// Text origin (x, y) in page space
    pub origin: (f64, f64),
    /// Measured width of the drawn text
    pub text_width: f64,
    /// Number of widgets that received the value
    pub widgets_updated: usize,
    /// Annotations removed across all pages
    pub annotations_removed: usize,
}

/// Set `field_name` to `value`, render it as page content and remove every
/// annotation in the document.
///
/// Nothing is modified unless the field is found.
pub fn flatten(
    form: &mut FormDocument,
    field_name: &str,
    value: &str,
    config: &FillConfig,
) -> Result<FlattenReport, FormError> {
    config.validate()?;

    let pages = form.pages()?;
    if pages.is_empty() {
        return Err(FormError::EmptyDocument);
    }
    let anchor = locate_in(&pages, field_name)?;
    let widgets = locate_all(&pages, field_name);
    let overlay = render(value, &anchor.rect, &config.render_config())?;

    for widget in &widgets {
        set_field_value(form, &pages, widget, value, config.read_only_flag)?;
    }
    debug!(field = field_name, count = widgets.len(), "Field value set");

    merge_overlay(form, anchor.page_id, &overlay)?;
    let annotations_removed = clear_annotations(form, &pages)?;

    if config.strip_acroform {
        strip_acroform(form)?;
    }

    let placement = overlay.placement();
    info!(
        field = field_name,
        page = anchor.page_number,
        widgets = widgets.len(),
        removed = annotations_removed,
        "Flattened form"
    );

    Ok(FlattenReport {
        page_index: anchor.page_index,
        rect: anchor.rect,
        origin: (placement.x, placement.y),
        text_width: placement.text_width,
        widgets_updated: widgets.len(),
        annotations_removed,
    })
}

/// Write the value and flags on the dictionary that owns the field name:
/// the widget itself, or the parent field for a kid widget without `/T`
fn set_field_value(
    form: &mut FormDocument,
    pages: &[Page],
    widget: &WidgetMatch,
    value: &str,
    read_only_flag: i64,
) -> Result<(), FormError> {
    let page = pages
        .get(widget.page_index)
        .ok_or_else(|| FormError::Operation(format!("Page {} vanished", widget.page_index)))?;

    let (owner, flags) = {
        let widget_dict = form.annotation_dict(page, widget.handle)?;
        match form.field_owner(widget_dict) {
            Some(id) => (Some(id), form.field_flags(form.inner().get_dictionary(id)?)),
            None => (None, form.field_flags(widget_dict)),
        }
    };

    let dict = match owner {
        Some(id) => form.inner_mut().get_dictionary_mut(id)?,
        None => form.annotation_dict_mut(page, widget.handle)?,
    };
    dict.set("V", text_string(value));
    dict.set("Ff", flags | read_only_flag);
    Ok(())
}

/// Encode `value` as a PDF text string
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Replace every page's `/Annots` with an empty array, whatever it held
fn clear_annotations(form: &mut FormDocument, pages: &[Page]) -> Result<usize, FormError> {
    let mut removed = 0;
    for page in pages {
        let count = match form.inner().get_dictionary(page.id)?.get(b"Annots") {
            Ok(entry) => match form.resolve(entry) {
                Object::Array(arr) => arr.len(),
                Object::Dictionary(_) => 1,
                _ => 0,
            },
            Err(_) => continue,
        };
        removed += count;
        form.inner_mut()
            .get_dictionary_mut(page.id)?
            .set("Annots", Object::Array(Vec::new()));
    }
    Ok(removed)
}

fn strip_acroform(form: &mut FormDocument) -> Result<(), FormError> {
    let catalog = form
        .inner_mut()
        .catalog_mut()
        .map_err(|e| FormError::Operation(format!("Failed to access catalog: {}", e)))?;
    if catalog.remove(b"AcroForm").is_some() {
        debug!("Removed AcroForm from catalog");
    }
    Ok(())
}
