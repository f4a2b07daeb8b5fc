use std::collections::BTreeMap;

use lopdf::{self, content::Content};

use super::cmap::ToUnicodeMap;
use crate::PdfError;

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Font information extracted from a page's resource dictionary.
#[derive(Debug, Clone, Default)]
pub struct BackendFontInfo {
    /// The font name key as it appears in the resource dictionary (e.g. `b"F1"`).
    pub name: Vec<u8>,
    /// Base font name from the font dictionary, if present.
    pub base_font: Option<String>,
    /// Font subtype (e.g. `Type1`, `TrueType`, `Type0`).
    pub subtype: Option<String>,
    /// Encoding entry from the font dictionary, if it is a name.
    pub encoding: Option<String>,
    /// Parsed `ToUnicode` CMap, if the font carries one.
    pub to_unicode: Option<ToUnicodeMap>,
}

impl BackendFontInfo {
    /// Decode the bytes of a text-showing operand drawn with this font.
    pub fn decode(&self, bytes: &[u8]) -> String {
        decode_text(Some(self), bytes)
    }
}

/// What a named XObject on a page is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XObjectKind {
    Image,
    Form,
    Other,
}

/// An XObject from a page's resource dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct XObjectInfo {
    pub name: Vec<u8>,
    pub kind: XObjectKind,
    /// `/BBox` of a form XObject in form space.
    pub bbox: Option<[f32; 4]>,
    /// `/Matrix` of a form XObject (form space to user space).
    pub matrix: Option<[f32; 6]>,
}

/// A simplified, lopdf-independent representation of a PDF value.
///
/// This enum decouples the layout code from the concrete `lopdf::Object`
/// type so that it can work with pure data.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(PageId),
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

impl ContentOp {
    pub fn new(operator: &str, operands: Vec<PdfValue>) -> Self {
        ContentOp {
            operator: operator.to_string(),
            operands,
        }
    }

    /// The first `n` operands as numbers, or `None` if any is missing or
    /// not numeric.
    pub fn numbers<const N: usize>(&self) -> Option<[f32; N]> {
        let mut out = [0.0; N];
        for (slot, value) in out.iter_mut().zip(self.operands.iter()) {
            *slot = get_number_from_value(value)?;
        }
        (self.operands.len() >= N).then_some(out)
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Extract an `f32` from a [`PdfValue`], accepting both `Integer` and `Real`.
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(f) => Some(*f),
        _ => None,
    }
}

/// Convert a `lopdf::Object` into a [`PdfValue`].
///
/// Stream dictionaries are converted but the stream bytes are discarded.
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Boolean(b) => PdfValue::Bool(*b),
        lopdf::Object::Integer(i) => PdfValue::Integer(*i),
        lopdf::Object::Real(f) => PdfValue::Real(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        lopdf::Object::Dictionary(dict) => PdfValue::Dict(
            dict.iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect(),
        ),
        lopdf::Object::Stream(stream) => PdfValue::Dict(
            stream
                .dict
                .iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect(),
        ),
        lopdf::Object::Reference(id) => PdfValue::Reference(*id),
    }
}

/// Best-effort decoding of raw PDF string bytes into a Rust `String`.
///
/// UTF-16BE with BOM first, then UTF-8, then Latin-1.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let code_units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return String::from_utf16_lossy(&code_units);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    bytes.iter().map(|&b| b as char).collect()
}

/// Map one WinAnsiEncoding byte to a character. Only the 0x80..0x9F block
/// differs from Latin-1.
fn win_ansi_char(b: u8) -> char {
    match b {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x8C => '\u{0152}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x99 => '\u{2122}',
        0x9C => '\u{0153}',
        _ => b as char,
    }
}

/// Decode a text-showing operand with whatever the font tells us.
///
/// A `ToUnicode` CMap wins. Identity-encoded fonts without one are tried as
/// UTF-16BE, WinAnsi fonts are mapped bytewise, and anything else goes
/// through [`decode_text_simple`].
pub fn decode_text(font: Option<&BackendFontInfo>, bytes: &[u8]) -> String {
    let Some(font) = font else {
        return decode_text_simple(bytes);
    };

    if let Some(map) = &font.to_unicode {
        return map.decode(bytes);
    }

    match font.encoding.as_deref() {
        Some(enc) if enc.contains("Identity") && bytes.len() >= 2 && bytes.len() % 2 == 0 => {
            let code_units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            let decoded = String::from_utf16_lossy(&code_units);
            if decoded.chars().any(|c| c != '\u{FFFD}' && c != '\0') {
                return decoded;
            }
            decode_text_simple(bytes)
        }
        Some("WinAnsiEncoding") => bytes.iter().map(|&b| win_ansi_char(b)).collect(),
        _ => decode_text_simple(bytes),
    }
}

// ---------------------------------------------------------------------------
// PdfBackend trait
// ---------------------------------------------------------------------------

/// Abstraction over a PDF parsing backend (currently backed by `lopdf`).
///
/// The layout pipeline only talks to this trait so it can be tested against
/// hand-built pages.
pub trait PdfBackend {
    /// Return a mapping from 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Return the page's MediaBox `[llx, lly, urx, ury]`.
    fn page_box(&self, page: PageId) -> Result<[f32; 4], PdfError>;

    /// Return font information for every font referenced by the given page.
    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, PdfError>;

    /// Return the XObjects named in the page's resources.
    fn page_xobjects(&self, page: PageId) -> Result<Vec<XObjectInfo>, PdfError>;

    /// Return the content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError>;

    /// Decode raw content-stream bytes into a sequence of [`ContentOp`]s.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError>;
}

// ---------------------------------------------------------------------------
// LopdfBackend
// ---------------------------------------------------------------------------

/// Concrete [`PdfBackend`] implementation backed by [`lopdf::Document`].
pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    /// Parse a PDF from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }

        Ok(Self { doc })
    }

    /// Total number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    // -- private helpers ----------------------------------------------------

    fn page_dict(&self, page: PageId) -> Result<&lopdf::Dictionary, PdfError> {
        self.doc
            .get_object(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page object: {}", e)))?
            .as_dict()
            .map_err(|e| PdfError::Parse(format!("page object is not a dictionary: {}", e)))
    }

    /// Follow a single level of indirection.
    fn resolve<'a>(&'a self, obj: &'a lopdf::Object) -> &'a lopdf::Object {
        match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }

    fn resolve_dict<'a>(&'a self, obj: &'a lopdf::Object) -> Option<&'a lopdf::Dictionary> {
        match self.resolve(obj) {
            lopdf::Object::Dictionary(d) => Some(d),
            lopdf::Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Look up an inheritable page attribute, walking up the page tree.
    fn inherited<'a>(&'a self, dict: &'a lopdf::Dictionary, key: &[u8]) -> Option<&'a lopdf::Object> {
        if let Ok(obj) = dict.get(key) {
            return Some(self.resolve(obj));
        }

        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        let parent_dict = self.doc.get_object(parent).ok()?.as_dict().ok()?;
        self.inherited(parent_dict, key)
    }

    fn numbers<const N: usize>(&self, obj: &lopdf::Object) -> Option<[f32; N]> {
        let arr = self.resolve(obj).as_array().ok()?;
        if arr.len() < N {
            return None;
        }

        let mut out = [0.0; N];
        for (slot, item) in out.iter_mut().zip(arr) {
            *slot = match self.resolve(item) {
                lopdf::Object::Integer(i) => *i as f32,
                lopdf::Object::Real(f) => *f,
                _ => return None,
            };
        }
        Some(out)
    }

    fn to_unicode(&self, font: &lopdf::Dictionary) -> Option<ToUnicodeMap> {
        let obj = self.resolve(font.get(b"ToUnicode").ok()?);
        let lopdf::Object::Stream(stream) = obj else {
            return None;
        };
        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        ToUnicodeMap::parse(&data)
    }
}

// ---------------------------------------------------------------------------
// PdfBackend implementation for LopdfBackend
// ---------------------------------------------------------------------------

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_box(&self, page: PageId) -> Result<[f32; 4], PdfError> {
        let dict = self.page_dict(page)?;
        let media_box = self
            .inherited(dict, b"MediaBox")
            .ok_or_else(|| PdfError::Parse("MediaBox not found for page".into()))?;

        self.numbers::<4>(media_box)
            .ok_or_else(|| PdfError::Parse(format!("malformed MediaBox: {:?}", media_box)))
    }

    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, PdfError> {
        let fonts_map = self
            .doc
            .get_page_fonts(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page fonts: {}", e)))?;

        let name_of = |dict: &lopdf::Dictionary, key: &[u8]| {
            dict.get(key)
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).into_owned())
        };

        Ok(fonts_map
            .iter()
            .map(|(name, &dict)| BackendFontInfo {
                name: name.clone(),
                base_font: name_of(dict, b"BaseFont"),
                subtype: name_of(dict, b"Subtype"),
                encoding: name_of(dict, b"Encoding"),
                to_unicode: self.to_unicode(dict),
            })
            .collect())
    }

    fn page_xobjects(&self, page: PageId) -> Result<Vec<XObjectInfo>, PdfError> {
        let dict = self.page_dict(page)?;
        let Some(resources) = self
            .inherited(dict, b"Resources")
            .and_then(|o| self.resolve_dict(o))
        else {
            return Ok(Vec::new());
        };
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|o| self.resolve_dict(o))
        else {
            return Ok(Vec::new());
        };

        let infos = xobjects
            .iter()
            .filter_map(|(name, obj)| {
                let dict = self.resolve_dict(obj)?;
                let kind = match dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok()) {
                    Some(b"Image") => XObjectKind::Image,
                    Some(b"Form") => XObjectKind::Form,
                    _ => XObjectKind::Other,
                };
                Some(XObjectInfo {
                    name: name.clone(),
                    kind,
                    bbox: dict.get(b"BBox").ok().and_then(|o| self.numbers::<4>(o)),
                    matrix: dict.get(b"Matrix").ok().and_then(|o| self.numbers::<6>(o)),
                })
            })
            .collect();

        Ok(infos)
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError> {
        self.doc
            .get_page_content(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page content: {}", e)))
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError> {
        let content = Content::decode(data)
            .map_err(|e| PdfError::Parse(format!("content stream decode error: {}", e)))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
