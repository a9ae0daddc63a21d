//! Glyph extraction: positioned text fragments per page via lopdf.
//!
//! The extractor interprets just enough of each page's content stream to know
//! where every text-showing operator puts its baseline origin: the text and
//! line matrices (`BT`, `Td`, `TD`, `TL`, `T*`, `Tm`), the graphics CTM
//! (`cm`, `q`, `Q`) and the current font (`Tf`). Glyph widths are not
//! tracked, so one `Tj`/`TJ` becomes one fragment anchored at its start.
//!
//! Loading is CPU-bound and runs inside `spawn_blocking` (see
//! [`crate::parse`]); a loaded [`PdfDocument`] is shared read-only across the
//! per-page tasks.

use crate::budget::Deadline;
use crate::error::{DocumentRole, Pdf2QuizError, Stage};
use crate::output::DocumentMetadata;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Fallback page width/height (US Letter) when no MediaBox can be found.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// `TJ` adjustments at or below this (thousandths of an em) read as a space.
const TJ_SPACE_ADJUSTMENT: f32 = -200.0;

/// One positioned text run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedFragment {
    /// 0-based page index.
    pub page_index: usize,
    pub text: String,
    /// Baseline origin X in PDF user space.
    pub x: f32,
    /// Baseline origin Y in PDF user space (origin bottom-left, so larger is higher).
    pub y: f32,
    pub font_size: f32,
    pub font_name: String,
}

impl PositionedFragment {
    /// A fragment with default font information.
    pub fn new(page_index: usize, text: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            page_index,
            text: text.into(),
            x,
            y,
            font_size: 0.0,
            font_name: String::new(),
        }
    }
}

/// The fragments of one page together with its geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    /// 0-based page index.
    pub index: usize,
    pub width: f32,
    pub height: f32,
    /// Fragments in content-stream emission order.
    pub fragments: Vec<PositionedFragment>,
}

impl ExtractedPage {
    /// A page of default (Letter) size holding `fragments`.
    pub fn new(index: usize, fragments: Vec<PositionedFragment>) -> Self {
        Self {
            index,
            width: DEFAULT_PAGE_SIZE.0,
            height: DEFAULT_PAGE_SIZE.1,
            fragments,
        }
    }
}

/// Parse `bytes` as the `role` document. See [`PdfDocument::load`].
pub fn load_document(bytes: &[u8], role: DocumentRole) -> Result<PdfDocument, Pdf2QuizError> {
    PdfDocument::load(bytes, role)
}

/// A parsed PDF ready for per-page extraction.
pub struct PdfDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
    role: DocumentRole,
}

impl PdfDocument {
    /// Parse `bytes` as a PDF.
    ///
    /// # Errors
    /// * `MalformedDocument` — no `%PDF` header, or lopdf cannot parse it
    /// * `EmptyDocument` — the page tree is empty
    pub fn load(bytes: &[u8], role: DocumentRole) -> Result<Self, Pdf2QuizError> {
        if !bytes.starts_with(b"%PDF") {
            let mut magic = [0u8; 4];
            let n = bytes.len().min(4);
            magic[..n].copy_from_slice(&bytes[..n]);
            return Err(Pdf2QuizError::MalformedDocument {
                document: role,
                detail: format!("missing %PDF header (first bytes {magic:?})"),
            });
        }

        let doc = Document::load_mem(bytes).map_err(|e| Pdf2QuizError::MalformedDocument {
            document: role,
            detail: e.to_string(),
        })?;

        // get_pages() is keyed by 1-based page number, already in order.
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(Pdf2QuizError::EmptyDocument { document: role });
        }

        info!("Loaded {}: {} pages", role, page_ids.len());
        Ok(Self {
            doc,
            page_ids,
            role,
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn role(&self) -> DocumentRole {
        self.role
    }

    /// Extract the positioned fragments of page `index` (0-based).
    pub fn extract_page(
        &self,
        index: usize,
        deadline: &Deadline,
    ) -> Result<ExtractedPage, Pdf2QuizError> {
        deadline.check(Stage::Extract)?;
        let page_id = *self
            .page_ids
            .get(index)
            .ok_or(Pdf2QuizError::PageOutOfRange {
                page: index + 1,
                total: self.page_ids.len(),
            })?;

        let content_data =
            self.doc
                .get_page_content(page_id)
                .map_err(|e| Pdf2QuizError::MalformedDocument {
                    document: self.role,
                    detail: format!("page {}: {}", index + 1, e),
                })?;
        let content =
            Content::decode(&content_data).map_err(|e| Pdf2QuizError::MalformedDocument {
                document: self.role,
                detail: format!("page {} content stream: {}", index + 1, e),
            })?;

        let fonts = self.doc.get_page_fonts(page_id).unwrap_or_default();
        let mut interpreter = TextInterpreter::new(&self.doc, &fonts, index);
        for (i, op) in content.operations.iter().enumerate() {
            deadline.check_every(i, Stage::Extract)?;
            interpreter.apply(&op.operator, &op.operands);
        }

        let (width, height) = self.page_size(page_id);
        let fragments = interpreter.finish();
        debug!(
            "Page {}: {} operators → {} fragments",
            index + 1,
            content.operations.len(),
            fragments.len()
        );

        Ok(ExtractedPage {
            index,
            width,
            height,
            fragments,
        })
    }

    /// Document metadata from the trailer `/Info` dictionary.
    pub fn metadata(&self) -> DocumentMetadata {
        let info = self
            .doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|obj| match obj {
                Object::Reference(id) => self.doc.get_dictionary(*id).ok(),
                Object::Dictionary(dict) => Some(dict),
                _ => None,
            });

        let get_meta = |key: &[u8]| -> Option<String> {
            let value = match info?.get(key).ok()? {
                Object::String(bytes, _) => decode_pdf_string(bytes),
                _ => return None,
            };
            let value = value.trim().to_string();
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        };

        DocumentMetadata {
            title: get_meta(b"Title"),
            author: get_meta(b"Author"),
            subject: get_meta(b"Subject"),
            creator: get_meta(b"Creator"),
            producer: get_meta(b"Producer"),
            page_count: self.page_ids.len(),
            pdf_version: self.doc.version.clone(),
            is_encrypted: self.doc.trailer.get(b"Encrypt").is_ok(),
        }
    }

    /// Width and height from the page's (possibly inherited) MediaBox.
    fn page_size(&self, page_id: ObjectId) -> (f32, f32) {
        let mut current = self.doc.get_dictionary(page_id).ok();
        // Inheritance depth is tiny in practice; the bound guards against cycles.
        for _ in 0..16 {
            let Some(dict) = current else { break };
            if let Some(size) = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| self.resolve(obj).as_array().ok())
                .and_then(|arr| media_box_size(arr))
            {
                return size;
            }
            current = dict
                .get(b"Parent")
                .ok()
                .and_then(|p| p.as_reference().ok())
                .and_then(|id| self.doc.get_dictionary(id).ok());
        }
        DEFAULT_PAGE_SIZE
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }
}

fn media_box_size(arr: &[Object]) -> Option<(f32, f32)> {
    if arr.len() != 4 {
        return None;
    }
    let nums: Vec<f32> = arr.iter().filter_map(number).collect();
    if nums.len() != 4 {
        return None;
    }
    Some(((nums[2] - nums[0]).abs(), (nums[3] - nums[1]).abs()))
}

// ── Content-stream interpretation ────────────────────────────────────────

/// Affine matrix `[a b c d e f]` as used throughout PDF.
type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m1 × m2`: apply `m1` first, then `m2`.
fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn translation(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

/// Text state machine for one page.
struct TextInterpreter<'a> {
    doc: &'a Document,
    fonts: &'a std::collections::BTreeMap<Vec<u8>, &'a Dictionary>,
    page_index: usize,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    leading: f32,
    font_name: String,
    font_size: f32,
    in_text: bool,
    fragments: Vec<PositionedFragment>,
}

impl<'a> TextInterpreter<'a> {
    fn new(
        doc: &'a Document,
        fonts: &'a std::collections::BTreeMap<Vec<u8>, &'a Dictionary>,
        page_index: usize,
    ) -> Self {
        Self {
            doc,
            fonts,
            page_index,
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            leading: 0.0,
            font_name: String::new(),
            font_size: 12.0,
            in_text: false,
            fragments: Vec::new(),
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(m) = self.ctm_stack.pop() {
                    self.ctm = m;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operand(operands) {
                    self.ctm = multiply(&m, &self.ctm);
                }
            }
            "BT" => {
                self.in_text = true;
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
            }
            "ET" => self.in_text = false,
            "Tf" => {
                if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                    self.font_name = String::from_utf8_lossy(name).to_string();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(l) = operands.first().and_then(number) {
                    self.leading = l;
                }
            }
            "Td" | "TD" => {
                let tx = operands.first().and_then(number).unwrap_or(0.0);
                let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                if operator == "TD" {
                    self.leading = -ty;
                }
                self.move_line(tx, ty);
            }
            "Tm" => {
                if let Some(m) = matrix_operand(operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(text) = operands.first().and_then(|o| self.decode(o)) {
                    self.emit(text);
                }
            }
            "TJ" => {
                if let Some(Ok(items)) = operands.first().map(|o| o.as_array()) {
                    let mut combined = String::new();
                    for item in items {
                        match item {
                            Object::String(..) => {
                                if let Some(text) = self.decode(item) {
                                    combined.push_str(&text);
                                }
                            }
                            other => {
                                if number(other).is_some_and(|n| n <= TJ_SPACE_ADJUSTMENT)
                                    && !combined.is_empty()
                                    && !combined.ends_with(' ')
                                {
                                    combined.push(' ');
                                }
                            }
                        }
                    }
                    self.emit(combined);
                }
            }
            "'" => {
                self.next_line();
                if let Some(text) = operands.first().and_then(|o| self.decode(o)) {
                    self.emit(text);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(text) = operands.get(2).and_then(|o| self.decode(o)) {
                    self.emit(text);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply(&translation(tx, ty), &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        // A zero leading would stack every line on one baseline.
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.move_line(0.0, -leading);
    }

    fn emit(&mut self, text: String) {
        if !self.in_text || text.trim().is_empty() {
            return;
        }
        let m = multiply(&self.text_matrix, &self.ctm);
        let scale = (m[1] * m[1] + m[3] * m[3]).sqrt();
        self.fragments.push(PositionedFragment {
            page_index: self.page_index,
            text,
            x: m[4],
            y: m[5],
            font_size: self.font_size * if scale > 0.0 { scale } else { 1.0 },
            font_name: self.font_name.clone(),
        });
    }

    /// Decode a string operand with the current font's encoding, falling back
    /// to UTF-16BE / Latin-1.
    fn decode(&self, obj: &Object) -> Option<String> {
        let Object::String(bytes, _) = obj else {
            return None;
        };
        if let Some(font) = self.fonts.get(self.font_name.as_bytes()) {
            if let Ok(encoding) = font.get_font_encoding(self.doc) {
                if let Ok(text) = Document::decode_text(&encoding, bytes) {
                    return Some(text);
                }
            }
        }
        Some(decode_pdf_string(bytes))
    }

    fn finish(self) -> Vec<PositionedFragment> {
        self.fragments
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(m)
}

/// Decode a PDF text string: UTF-16BE when it carries a BOM, else Latin-1.
pub(crate) fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }
    bytes.iter().map(|&b| b as char).collect()
}
