//! Overlay rendering and page merge
//!
//! The overlay is a throwaway single-page PDF carrying one line of text.
//! Its content is drawn in the same user space as the target page (same
//! unit, same origin), so merging copies the content stream verbatim and
//! only renames the font resource.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::config::{PageSize, RenderConfig};
use crate::document::{FormDocument, Rect};
use crate::error::FormError;
use crate::fonts::{encodable_text, StandardFont};

/// Font resource name inside the overlay artifact
pub const OVERLAY_FONT_KEY: &str = "F1";

/// Prefix of the font resource name added to the target page
const MERGED_FONT_PREFIX: &str = "FStamp";

/// Text origin inside a field rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub text_width: f64,
}

/// Center horizontally, sit `baseline_offset` points above the bottom edge
/// whatever the field's height.
pub fn placement(rect: &Rect, text_width: f64, baseline_offset: f64) -> Placement {
    Placement {
        x: rect.x0 + (rect.width() - text_width) / 2.0,
        y: rect.y0 + baseline_offset,
        text_width,
    }
}

/// A single-page document holding the rendered text
#[derive(Debug)]
pub struct OverlayArtifact {
    text: String,
    font: StandardFont,
    font_size: f64,
    placement: Placement,
    document: Document,
}

impl OverlayArtifact {
    /// The text as drawn (after encoding substitutions)
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn font(&self) -> StandardFont {
        self.font
    }

    pub fn font_size(&self) -> f64 {
        self.font_size
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Serialize the artifact as a standalone PDF
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, FormError> {
        let mut buffer = Vec::new();
        self.document
            .save_to(&mut buffer)
            .map_err(|e| FormError::Operation(format!("Failed to save overlay: {}", e)))?;
        Ok(buffer)
    }

    /// Content stream bytes of the artifact's page
    pub fn content_bytes(&self) -> Result<Vec<u8>, FormError> {
        let page = self.page_dict()?;
        let content_id = page.get(b"Contents")?.as_reference()?;
        match self.document.get_object(content_id)? {
            Object::Stream(stream) => Ok(stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone())),
            _ => Err(FormError::Operation(
                "Overlay contents is not a stream".into(),
            )),
        }
    }

    /// The font dictionary the artifact's content refers to
    pub fn font_dictionary(&self) -> Result<Dictionary, FormError> {
        let page = self.page_dict()?;
        let resources = page.get(b"Resources")?.as_dict()?;
        let fonts = resources.get(b"Font")?.as_dict()?;
        let font_id = fonts.get(OVERLAY_FONT_KEY.as_bytes())?.as_reference()?;
        Ok(self.document.get_dictionary(font_id)?.clone())
    }

    fn page_dict(&self) -> Result<&Dictionary, FormError> {
        let page_id = self
            .document
            .get_pages()
            .into_values()
            .next()
            .ok_or(FormError::EmptyDocument)?;
        Ok(self.document.get_dictionary(page_id)?)
    }
}

/// Render `text` into a single-page overlay anchored in `rect`
pub fn render(
    text: &str,
    rect: &Rect,
    config: &RenderConfig,
) -> Result<OverlayArtifact, FormError> {
    let text = encodable_text(text);
    let text_width = config.font.text_width(&text, config.font_size);
    let placement = placement(rect, text_width, config.baseline_offset);

    debug!(
        text = %text,
        font = %config.font,
        size = config.font_size,
        x = placement.x,
        y = placement.y,
        width = text_width,
        "Rendering overlay"
    );

    let content = Content {
        operations: text_operations(OVERLAY_FONT_KEY, config.font_size, &placement, &text),
    };
    let content = content
        .encode()
        .map_err(|e| FormError::Operation(format!("Failed to encode overlay content: {}", e)))?;
    let document = overlay_document(content, font_dictionary(config.font), config.reference_page);

    Ok(OverlayArtifact {
        text,
        font: config.font,
        font_size: config.font_size,
        placement,
        document,
    })
}

fn text_operations(
    font_key: &str,
    font_size: f64,
    placement: &Placement,
    text: &str,
) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("g", vec![Object::Integer(0)]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(font_key.as_bytes().to_vec()),
                Object::Real(font_size as f32),
            ],
        ),
        Operation::new(
            "Td",
            vec![
                Object::Real(placement.x as f32),
                Object::Real(placement.y as f32),
            ],
        ),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn font_dictionary(font: StandardFont) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn overlay_document(content: Vec<u8>, font: Dictionary, page_size: PageSize) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(font);
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            Object::Real(page_size.width as f32),
            Object::Real(page_size.height as f32),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { OVERLAY_FONT_KEY => font_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Composite the overlay's content onto `page_id`.
///
/// The page's existing content is bracketed with `q`/`Q` so leftover
/// graphics state can't displace the stamp.
pub fn merge_overlay(
    form: &mut FormDocument,
    page_id: ObjectId,
    overlay: &OverlayArtifact,
) -> Result<(), FormError> {
    let font = overlay.font_dictionary()?;
    let mut content = Content::decode(&overlay.content_bytes()?)
        .map_err(|e| FormError::Operation(format!("Failed to decode overlay content: {}", e)))?;

    let doc = form.inner_mut();
    let font_key = register_font(doc, page_id, font)?;
    for op in content.operations.iter_mut().filter(|op| op.operator == "Tf") {
        if let Some(Object::Name(name)) = op.operands.first_mut() {
            *name = font_key.as_bytes().to_vec();
        }
    }
    let stamp = content
        .encode()
        .map_err(|e| FormError::Operation(format!("Failed to encode overlay content: {}", e)))?;

    append_content(doc, page_id, stamp)?;
    debug!(?page_id, font_key = %font_key, "Merged overlay");
    Ok(())
}

/// Add `font` to the page's font resources under an unused name
fn register_font(
    doc: &mut Document,
    page_id: ObjectId,
    font: Dictionary,
) -> Result<String, FormError> {
    let existing = page_resources_mut(doc, page_id)?
        .get(b"Font")
        .ok()
        .cloned();
    let mut fonts = match existing {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc
            .get_dictionary(id)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    };

    let key = unique_key(&fonts, MERGED_FONT_PREFIX);
    let font_id = doc.add_object(font);
    fonts.set(key.clone(), Object::Reference(font_id));
    page_resources_mut(doc, page_id)?.set("Font", Object::Dictionary(fonts));
    Ok(key)
}

fn unique_key(dict: &Dictionary, prefix: &str) -> String {
    if !dict.has(prefix.as_bytes()) {
        return prefix.to_string();
    }
    (1u32..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|key| !dict.has(key.as_bytes()))
        .unwrap_or_else(|| prefix.to_string())
}

/// The page's own resource dictionary, materializing inherited resources
fn page_resources_mut(
    doc: &mut Document,
    page_id: ObjectId,
) -> Result<&mut Dictionary, FormError> {
    let entry = doc.get_dictionary(page_id)?.get(b"Resources").ok().cloned();
    match entry {
        Some(Object::Reference(id)) => return Ok(doc.get_dictionary_mut(id)?),
        Some(Object::Dictionary(_)) => {}
        _ => {
            let inherited = inherited_resources(doc, page_id).unwrap_or_else(Dictionary::new);
            doc.get_dictionary_mut(page_id)?
                .set("Resources", Object::Dictionary(inherited));
        }
    }
    Ok(doc
        .get_dictionary_mut(page_id)?
        .get_mut(b"Resources")?
        .as_dict_mut()?)
}

/// Resources inherited through the page tree, if any
fn inherited_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..32 {
        let parent_id = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent_id).ok()?;
        match node.get(b"Resources") {
            Ok(Object::Dictionary(dict)) => return Some(dict.clone()),
            Ok(Object::Reference(id)) => return doc.get_dictionary(*id).ok().cloned(),
            _ => continue,
        }
    }
    None
}

fn append_content(doc: &mut Document, page_id: ObjectId, stamp: Vec<u8>) -> Result<(), FormError> {
    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Array(arr)) => arr.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(arr)) => arr.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    let mut tail = Vec::new();
    if !existing.is_empty() {
        let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        contents.push(Object::Reference(open_id));
        contents.extend(existing);
        tail.extend_from_slice(b"Q\n");
    }
    tail.extend(stamp);
    let stamp_id = doc.add_object(Stream::new(Dictionary::new(), tail));
    contents.push(Object::Reference(stamp_id));

    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect {
        Rect::new(x0, y0, x1, y1)
    }

    #[test]
    fn test_placement_centers_horizontally() {
        let p = placement(&rect(100.0, 100.0, 300.0, 120.0), 50.0, 2.0);
        assert_eq!(p.x, 175.0);
    }

    #[test]
    fn test_placement_bottom_offset_ignores_height() {
        let short = placement(&rect(100.0, 100.0, 300.0, 120.0), 50.0, 2.0);
        let tall = placement(&rect(100.0, 100.0, 300.0, 400.0), 50.0, 2.0);
        assert_eq!(short.y, 102.0);
        assert_eq!(tall.y, 102.0);
    }

    #[test]
    fn test_render_uses_font_metrics() {
        let config = RenderConfig::default();
        let field = rect(50.0, 50.0, 250.0, 70.0);
        let overlay = render("01/02/2024", &field, &config).unwrap();

        let width = StandardFont::Helvetica.text_width("01/02/2024", 12.0);
        let p = overlay.placement();
        assert!((p.text_width - width).abs() < 1e-9);
        assert!((p.x - (50.0 + (200.0 - width) / 2.0)).abs() < 1e-9);
        assert_eq!(p.y, 52.0);
    }

    #[test]
    fn test_render_is_deterministic() {
        let config = RenderConfig::default();
        let field = rect(100.0, 100.0, 300.0, 120.0);
        let a = render("12/31/2024", &field, &config).unwrap();
        let b = render("12/31/2024", &field, &config).unwrap();
        assert_eq!(a.content_bytes().unwrap(), b.content_bytes().unwrap());
        assert_eq!(a.placement(), b.placement());
    }

    #[test]
    fn test_artifact_is_single_reference_page() {
        let config = RenderConfig::default();
        let mut overlay = render("x", &rect(0.0, 0.0, 10.0, 10.0), &config).unwrap();
        let bytes = overlay.to_bytes().unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page = doc.get_dictionary(pages[&1]).unwrap();
        let media_box: Vec<f64> = page
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| match o {
                Object::Integer(i) => *i as f64,
                Object::Real(r) => *r as f64,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(media_box, vec![0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn test_artifact_font_matches_config() {
        let config = RenderConfig {
            font: StandardFont::Courier,
            ..RenderConfig::default()
        };
        let overlay = render("x", &rect(0.0, 0.0, 10.0, 10.0), &config).unwrap();
        let font = overlay.font_dictionary().unwrap();
        assert_eq!(
            font.get(b"BaseFont").unwrap(),
            &Object::Name(b"Courier".to_vec())
        );
    }

    #[test]
    fn test_non_ascii_is_substituted() {
        let config = RenderConfig::default();
        let overlay = render("1 déc", &rect(0.0, 0.0, 100.0, 10.0), &config).unwrap();
        assert_eq!(overlay.text(), "1 d?c");
        let runs = text_runs(&overlay.content_bytes().unwrap());
        assert_eq!(runs[0].text, "1 d?c");
    }

    #[test]
    fn test_parentheses_survive_encoding() {
        let config = RenderConfig::default();
        let overlay = render("(draft) 1\\2", &rect(0.0, 0.0, 100.0, 10.0), &config).unwrap();
        let runs = text_runs(&overlay.content_bytes().unwrap());
        assert_eq!(runs[0].text, "(draft) 1\\2");
    }

    #[test]
    fn test_merge_appends_text_to_page() {
        let mut form = FormDocument::from_document(form_pdf(&[vec![]]));
        let page_id = first_page(form.inner());
        let overlay = render(
            "01/02/2024",
            &rect(50.0, 50.0, 250.0, 70.0),
            &RenderConfig::default(),
        )
        .unwrap();

        merge_overlay(&mut form, page_id, &overlay).unwrap();

        let content = form.page_content(page_id).unwrap();
        let runs = text_runs(&content);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "01/02/2024");
        assert_eq!(runs[0].font, "FStamp");
        assert!((runs[0].y - 52.0).abs() < 1e-3);
        // Existing drawing is kept, wrapped in its own graphics state
        let text = String::from_utf8_lossy(&content);
        assert!(text.trim_start().starts_with('q'));
        assert!(text.contains("re f"));
    }

    #[test]
    fn test_merge_avoids_font_name_collision() {
        let mut doc = form_pdf(&[vec![]]);
        let page_id = first_page(&doc);
        let existing_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
        });
        doc.get_dictionary_mut(page_id).unwrap().set(
            "Resources",
            dictionary! { "Font" => dictionary! { "FStamp" => existing_font } },
        );
        let mut form = FormDocument::from_document(doc);
        let overlay = render("x", &rect(0.0, 0.0, 10.0, 10.0), &RenderConfig::default()).unwrap();

        merge_overlay(&mut form, page_id, &overlay).unwrap();

        let page = form.inner().get_dictionary(page_id).unwrap();
        let fonts = page
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"Font")
            .unwrap()
            .as_dict()
            .unwrap();
        assert_eq!(
            fonts.get(b"FStamp").unwrap(),
            &Object::Reference(existing_font)
        );
        assert!(fonts.has(b"FStamp1"));
        let runs = text_runs(&form.page_content(page_id).unwrap());
        assert_eq!(runs[0].font, "FStamp1");
    }

    #[test]
    fn test_merge_materializes_inherited_resources() {
        let mut doc = form_pdf(&[vec![]]);
        let page_id = first_page(&doc);
        let pages_id = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Parent")
            .unwrap()
            .as_reference()
            .unwrap();
        doc.get_dictionary_mut(pages_id).unwrap().set(
            "Resources",
            dictionary! { "ProcSet" => vec![Object::Name(b"PDF".to_vec())] },
        );
        let mut form = FormDocument::from_document(doc);
        let overlay = render("x", &rect(0.0, 0.0, 10.0, 10.0), &RenderConfig::default()).unwrap();

        merge_overlay(&mut form, page_id, &overlay).unwrap();

        let page = form.inner().get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(resources.has(b"ProcSet"));
        assert!(resources.get(b"Font").unwrap().as_dict().unwrap().has(b"FStamp"));
    }

    #[test]
    fn test_merge_onto_page_without_content() {
        let mut doc = form_pdf(&[vec![]]);
        let page_id = first_page(&doc);
        doc.get_dictionary_mut(page_id).unwrap().remove(b"Contents");
        let mut form = FormDocument::from_document(doc);
        let overlay = render("x", &rect(0.0, 0.0, 10.0, 10.0), &RenderConfig::default()).unwrap();

        merge_overlay(&mut form, page_id, &overlay).unwrap();

        let contents = form
            .inner()
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_array()
            .unwrap()
            .len();
        assert_eq!(contents, 1);
        assert_eq!(text_runs(&form.page_content(page_id).unwrap()).len(), 1);
    }

    proptest! {
        /// Centered text has equal margins on both sides
        #[test]
        fn placement_margins_are_equal(
            x0 in -500.0f64..500.0,
            width in 1.0f64..400.0,
            text_width in 0.0f64..400.0,
            offset in 0.0f64..10.0,
        ) {
            let field = rect(x0, 0.0, x0 + width, 20.0);
            let p = placement(&field, text_width, offset);
            let left = p.x - field.x0;
            let right = field.x1 - (p.x + text_width);
            prop_assert!((left - right).abs() < 1e-6);
            prop_assert!((p.y - offset).abs() < 1e-9);
        }
    }
}
