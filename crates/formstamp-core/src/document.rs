//! Typed view over a form-bearing PDF
//!
//! `FormDocument` wraps a `lopdf::Document` and exposes its pages and
//! annotations as typed records. Field names are decoded and normalized
//! once here, so every consumer compares bare names.

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::warn;

use crate::error::FormError;

/// How deep a widget's `/Parent` chain is followed looking for a name
const MAX_FIELD_DEPTH: usize = 32;

/// How many indirect hops are followed when resolving a value
const MAX_REFERENCE_HOPS: usize = 8;

/// Axis-aligned box in page space (origin bottom-left, points)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    /// Build a rect from two opposite corners given in any order
    pub fn new(xa: f64, ya: f64, xb: f64, yb: f64) -> Self {
        Self {
            x0: xa.min(xb),
            y0: ya.min(yb),
            x1: xa.max(xb),
            y1: ya.max(yb),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationSubtype {
    Widget,
    Other(String),
}

/// Where an annotation dictionary lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationHandle {
    /// Indirect object referenced from the annotation array
    Indirect(ObjectId),
    /// Dictionary stored inline at this position of the annotation array
    Inline(usize),
}

/// Where a page's `/Annots` array lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotsSlot {
    OnPage,
    Indirect(ObjectId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub handle: AnnotationHandle,
    pub subtype: AnnotationSubtype,
    /// Normalized field name, inherited from the parent field when absent
    pub field_name: Option<String>,
    pub value: Option<String>,
    pub rect: Option<Rect>,
    /// Field flags (`/Ff`), 0 when absent
    pub flags: i64,
}

impl Annotation {
    pub fn is_widget(&self) -> bool {
        self.subtype == AnnotationSubtype::Widget
    }

    /// True for a widget named exactly `name` (already normalized)
    pub fn is_field(&self, name: &str) -> bool {
        self.is_widget() && self.field_name.as_deref() == Some(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 0-based position in the document
    pub index: usize,
    /// 1-based page number
    pub number: u32,
    pub id: ObjectId,
    pub annots: Option<AnnotsSlot>,
    pub annotations: Vec<Annotation>,
}

/// Strip one pair of literal-string delimiters left around a field name
pub fn normalize_field_name(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('(') && raw.ends_with(')') {
        raw[1..raw.len() - 1].to_string()
    } else {
        raw.to_string()
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8 with BOM, or PDFDocEncoding)
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(rest).into_owned()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Wrapper around lopdf::Document for form operations
pub struct FormDocument {
    doc: Document,
}

impl FormDocument {
    /// Parse a PDF from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormError> {
        let doc = Document::load_mem(bytes).map_err(|e| FormError::Parse(e.to_string()))?;
        Ok(Self { doc })
    }

    pub fn from_document(doc: Document) -> Self {
        Self { doc }
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    pub fn inner(&self) -> &Document {
        &self.doc
    }

    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn into_inner(self) -> Document {
        self.doc
    }

    /// Serialize the document to bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, FormError> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| FormError::Operation(format!("Failed to save PDF: {}", e)))?;
        Ok(buffer)
    }

    /// Typed snapshot of every page and its annotations, in page order
    pub fn pages(&self) -> Result<Vec<Page>, FormError> {
        self.doc
            .get_pages()
            .into_iter()
            .enumerate()
            .map(|(index, (number, id))| self.read_page(index, number, id))
            .collect()
    }

    fn read_page(&self, index: usize, number: u32, id: ObjectId) -> Result<Page, FormError> {
        let page_dict = self.doc.get_dictionary(id)?;

        let (annots, entries) = match page_dict.get(b"Annots") {
            Ok(Object::Array(arr)) => (Some(AnnotsSlot::OnPage), arr.as_slice()),
            Ok(Object::Reference(arr_id)) => match self.doc.get_object(*arr_id) {
                Ok(Object::Array(arr)) => (Some(AnnotsSlot::Indirect(*arr_id)), arr.as_slice()),
                _ => {
                    warn!(page = number, "Annots reference is not an array, ignoring");
                    (None, &[][..])
                }
            },
            Ok(_) => {
                warn!(page = number, "Annots is not an array, ignoring");
                (None, &[][..])
            }
            Err(_) => (None, &[][..]),
        };

        let annotations = entries
            .iter()
            .enumerate()
            .filter_map(|(pos, entry)| match entry {
                Object::Reference(annot_id) => match self.doc.get_dictionary(*annot_id) {
                    Ok(dict) => Some(self.read_annotation(
                        AnnotationHandle::Indirect(*annot_id),
                        dict,
                    )),
                    Err(_) => {
                        warn!(page = number, ?annot_id, "Skipping unresolvable annotation");
                        None
                    }
                },
                Object::Dictionary(dict) => {
                    Some(self.read_annotation(AnnotationHandle::Inline(pos), dict))
                }
                _ => None,
            })
            .collect();

        Ok(Page {
            index,
            number,
            id,
            annots,
            annotations,
        })
    }

    fn read_annotation(&self, handle: AnnotationHandle, dict: &Dictionary) -> Annotation {
        let subtype = match dict.get(b"Subtype").map(|o| self.resolve(o)) {
            Ok(Object::Name(name)) if name.as_slice() == b"Widget" => AnnotationSubtype::Widget,
            Ok(Object::Name(name)) => {
                AnnotationSubtype::Other(String::from_utf8_lossy(name).into_owned())
            }
            _ => AnnotationSubtype::Other(String::new()),
        };

        let field_name = self
            .text_entry(dict, b"T")
            .or_else(|| self.inherited_field_name(dict))
            .map(|raw| normalize_field_name(&raw));

        let value = match dict.get(b"V").map(|o| self.resolve(o)) {
            Ok(Object::Name(name)) => Some(String::from_utf8_lossy(name).into_owned()),
            Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
            _ => None,
        };

        let rect = dict.get(b"Rect").ok().and_then(|o| self.read_rect(o));

        let flags = self.field_flags(dict);

        Annotation {
            handle,
            subtype,
            field_name,
            value,
            rect,
            flags,
        }
    }

    /// Name of the nearest ancestor field that has a `/T`
    fn inherited_field_name(&self, dict: &Dictionary) -> Option<String> {
        let owner = self.field_owner(dict)?;
        self.text_entry(self.doc.get_dictionary(owner).ok()?, b"T")
    }

    /// The ancestor field dictionary that names a widget, when the widget
    /// has no `/T` of its own. `None` means the widget is its own field.
    pub fn field_owner(&self, widget: &Dictionary) -> Option<ObjectId> {
        if self.text_entry(widget, b"T").is_some() {
            return None;
        }
        let mut parent = widget.get(b"Parent").ok()?.as_reference().ok();
        for _ in 0..MAX_FIELD_DEPTH {
            let parent_id = parent?;
            let parent_dict = self.doc.get_dictionary(parent_id).ok()?;
            if self.text_entry(parent_dict, b"T").is_some() {
                return Some(parent_id);
            }
            parent = parent_dict
                .get(b"Parent")
                .ok()
                .and_then(|o| o.as_reference().ok());
        }
        None
    }

    /// Field flags of `dict`, following an indirect `/Ff`
    pub fn field_flags(&self, dict: &Dictionary) -> i64 {
        match dict.get(b"Ff").map(|o| self.resolve(o)) {
            Ok(Object::Integer(ff)) => *ff,
            _ => 0,
        }
    }

    fn text_entry(&self, dict: &Dictionary, key: &[u8]) -> Option<String> {
        match dict.get(key).map(|o| self.resolve(o)) {
            Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
            _ => None,
        }
    }

    fn read_rect(&self, obj: &Object) -> Option<Rect> {
        let arr = self.resolve(obj).as_array().ok()?;
        if arr.len() != 4 {
            return None;
        }
        let mut values = [0.0f64; 4];
        for (slot, item) in values.iter_mut().zip(arr) {
            *slot = self.number(item)?;
        }
        Some(Rect::new(values[0], values[1], values[2], values[3]))
    }

    pub(crate) fn number(&self, obj: &Object) -> Option<f64> {
        match self.resolve(obj) {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r as f64),
            _ => None,
        }
    }

    /// Follow indirect references to the underlying object
    pub(crate) fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        let mut current = obj;
        for _ in 0..MAX_REFERENCE_HOPS {
            match current {
                Object::Reference(id) => match self.doc.get_object(*id) {
                    Ok(next) => current = next,
                    Err(_) => return current,
                },
                _ => return current,
            }
        }
        current
    }

    /// One annotation dictionary of `page`
    pub fn annotation_dict(
        &self,
        page: &Page,
        handle: AnnotationHandle,
    ) -> Result<&Dictionary, FormError> {
        match handle {
            AnnotationHandle::Indirect(id) => Ok(self.doc.get_dictionary(id)?),
            AnnotationHandle::Inline(pos) => {
                let array = match page.annots {
                    Some(AnnotsSlot::OnPage) => {
                        self.doc.get_dictionary(page.id)?.get(b"Annots")?.as_array()?
                    }
                    Some(AnnotsSlot::Indirect(arr_id)) => self.doc.get_object(arr_id)?.as_array()?,
                    None => {
                        return Err(FormError::Operation(format!(
                            "Page {} has no annotation array",
                            page.number
                        )))
                    }
                };
                array
                    .get(pos)
                    .ok_or_else(|| {
                        FormError::Operation(format!(
                            "Annotation {} missing on page {}",
                            pos, page.number
                        ))
                    })?
                    .as_dict()
                    .map_err(|_| FormError::Operation("Annotation is not a dictionary".into()))
            }
        }
    }

    /// Mutable access to one annotation dictionary of `page`
    pub fn annotation_dict_mut(
        &mut self,
        page: &Page,
        handle: AnnotationHandle,
    ) -> Result<&mut Dictionary, FormError> {
        match handle {
            AnnotationHandle::Indirect(id) => Ok(self.doc.get_dictionary_mut(id)?),
            AnnotationHandle::Inline(pos) => {
                let array = match page.annots {
                    Some(AnnotsSlot::OnPage) => self
                        .doc
                        .get_dictionary_mut(page.id)?
                        .get_mut(b"Annots")?
                        .as_array_mut()?,
                    Some(AnnotsSlot::Indirect(arr_id)) => {
                        self.doc.get_object_mut(arr_id)?.as_array_mut()?
                    }
                    None => {
                        return Err(FormError::Operation(format!(
                            "Page {} has no annotation array",
                            page.number
                        )))
                    }
                };
                array
                    .get_mut(pos)
                    .ok_or_else(|| {
                        FormError::Operation(format!(
                            "Annotation {} missing on page {}",
                            pos, page.number
                        ))
                    })?
                    .as_dict_mut()
                    .map_err(|_| FormError::Operation("Annotation is not a dictionary".into()))
            }
        }
    }

    /// Concatenated (decoded) content streams of a page
    pub fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>, FormError> {
        let page_dict = self.doc.get_dictionary(page_id)?;
        let entries: Vec<&Object> = match page_dict.get(b"Contents").map(|o| self.resolve(o)) {
            Ok(Object::Array(arr)) => arr.iter().collect(),
            Ok(stream @ Object::Stream(_)) => vec![stream],
            _ => Vec::new(),
        };

        let mut content = Vec::new();
        for entry in entries {
            if let Object::Stream(stream) = self.resolve(entry) {
                let bytes = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                content.extend_from_slice(&bytes);
                content.push(b'\n');
            }
        }
        Ok(content)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory form PDFs for unit tests

    use lopdf::{dictionary, Document, Object, ObjectId, StringFormat};

    /// A widget annotation to place on a test page
    pub struct WidgetSpec<'a> {
        pub name: &'a str,
        pub rect: [f32; 4],
        pub flags: Option<i64>,
    }

    impl<'a> WidgetSpec<'a> {
        pub fn new(name: &'a str, rect: [f32; 4]) -> Self {
            Self {
                name,
                rect,
                flags: None,
            }
        }
    }

    pub fn widget_dict(spec: &WidgetSpec<'_>) -> lopdf::Dictionary {
        let mut dict = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::String(spec.name.as_bytes().to_vec(), StringFormat::Literal),
            "Rect" => spec.rect.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
        };
        if let Some(ff) = spec.flags {
            dict.set("Ff", ff);
        }
        dict
    }

    /// Build a document with one page per entry of `pages`, each carrying
    /// the given widgets as indirect annotations
    pub fn form_pdf(pages: &[Vec<WidgetSpec<'_>>]) -> Document {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        let mut fields = Vec::new();
        for widgets in pages {
            let content_id = doc.add_object(lopdf::Stream::new(
                lopdf::Dictionary::new(),
                b"0 0 1 rg 10 10 50 50 re f".to_vec(),
            ));
            let annots: Vec<Object> = widgets
                .iter()
                .map(|spec| {
                    let id = doc.add_object(widget_dict(spec));
                    fields.push(Object::Reference(id));
                    Object::Reference(id)
                })
                .collect();
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            };
            if !annots.is_empty() {
                page.set("Annots", annots);
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let acroform_id = doc.add_object(dictionary! { "Fields" => fields });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => acroform_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    /// First page object id of a document
    pub fn first_page(doc: &Document) -> ObjectId {
        *doc.get_pages().values().next().expect("document has pages")
    }

    /// Object id of the first annotation on the first page
    pub fn first_annotation(doc: &Document) -> ObjectId {
        let page = doc.get_dictionary(first_page(doc)).expect("page dictionary");
        let annots = page.get(b"Annots").and_then(Object::as_array).expect("annots");
        annots[0].as_reference().expect("indirect annotation")
    }

    /// A string shown by `Tj`, with the font and position in effect
    #[derive(Debug, Clone, PartialEq)]
    pub struct TextRun {
        pub text: String,
        pub font: String,
        pub x: f64,
        pub y: f64,
    }

    /// Every `Tj` in a content stream
    pub fn text_runs(content: &[u8]) -> Vec<TextRun> {
        let content = lopdf::content::Content::decode(content).expect("decodable content");
        let num = |obj: &Object| match obj {
            Object::Integer(i) => *i as f64,
            Object::Real(r) => *r as f64,
            _ => f64::NAN,
        };

        let mut runs = Vec::new();
        let (mut font, mut x, mut y) = (String::new(), 0.0, 0.0);
        for op in &content.operations {
            match op.operator.as_str() {
                "Tf" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        font = String::from_utf8_lossy(name).into_owned();
                    }
                }
                "Td" if op.operands.len() == 2 => {
                    x = num(&op.operands[0]);
                    y = num(&op.operands[1]);
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        runs.push(TextRun {
                            text: String::from_utf8_lossy(bytes).into_owned(),
                            font: font.clone(),
                            x,
                            y,
                        });
                    }
                }
                _ => {}
            }
        }
        runs
    }
}
