//! Content-stream walk.
//!
//! Runs a simplified PDF graphics/text state machine over a page's
//! operators and records what gets drawn, in user space:
//!
//! ```text
//! content ops  ->  TextSpan[]      (Tj, TJ, ', ")
//!              ->  PlacedXObject[] (Do, inline images)
//!              ->  shape BBox[]    (painted paths)
//! ```
//!
//! Glyph widths are approximated from the font size; the layout stage only
//! needs them to measure gaps between spans.

use super::backend::{
    decode_text, get_number_from_value, BackendFontInfo, ContentOp, PageId, PdfBackend, PdfValue,
    XObjectInfo, XObjectKind,
};
use crate::types::BBox;
use crate::PdfError;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A single run of text at a specific position on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    /// Left edge of the run, user space.
    pub x: f32,
    /// Baseline, user space.
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
}

impl TextSpan {
    /// Box from descender to ascender, approximated from the font size.
    pub fn bbox(&self) -> BBox {
        BBox::new(
            self.x,
            self.y - self.font_size * DESCENT_RATIO,
            self.x + self.width,
            self.y + self.font_size * ASCENT_RATIO,
        )
    }
}

/// An XObject drawn on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedXObject {
    pub name: String,
    pub kind: XObjectKind,
    pub bbox: BBox,
}

/// Everything drawn on one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMarks {
    pub spans: Vec<TextSpan>,
    pub xobjects: Vec<PlacedXObject>,
    pub shapes: Vec<BBox>,
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Approximate character width as a fraction of font size when no better
/// metric is available.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Portion of the font size below the baseline.
const DESCENT_RATIO: f32 = 0.2;

/// Portion of the font size above the baseline.
const ASCENT_RATIO: f32 = 0.8;

/// A TJ kerning displacement wider than this fraction of a character is
/// read as a word gap.
const TJ_SPACE_RATIO: f32 = 0.3;

// ---------------------------------------------------------------------------
// Matrices
// ---------------------------------------------------------------------------

/// A 2x3 affine matrix `[a, b, c, d, e, f]`.
type Matrix = [f32; 6];

const IDENTITY_MATRIX: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m` followed by `n` (row-vector convention, as in the PDF reference).
fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn apply(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

/// Box of the rectangle `[x0, y0, x1, y1]` after transforming its corners.
fn transform_rect(m: &Matrix, r: [f32; 4]) -> BBox {
    let corners = [(r[0], r[1]), (r[2], r[1]), (r[0], r[3]), (r[2], r[3])];
    BBox::from_points(corners.into_iter().map(|(x, y)| apply(m, x, y))).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Internal: state machine
// ---------------------------------------------------------------------------

/// Text state tracked while walking a page's content stream.
#[derive(Debug, Clone)]
struct TextState {
    /// Index into the page font list for the current `Tf` key.
    font: Option<usize>,
    font_size: f32,
    text_matrix: Matrix,
    line_matrix: Matrix,
    /// Horizontal scaling factor (percent / 100).
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 0.0,
            text_matrix: IDENTITY_MATRIX,
            line_matrix: IDENTITY_MATRIX,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    /// Advance the text matrix horizontally by `dx` text-space units.
    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Multiply the text line matrix by a translation (Td / TD / T*).
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let (x, y) = apply(&self.line_matrix, tx, ty);
        self.line_matrix[4] = x;
        self.line_matrix[5] = y;
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.leading);
    }

    /// Text-space displacement after showing `text`.
    fn displacement(&self, text: &str) -> f32 {
        text.chars()
            .map(|ch| {
                let mut w = self.font_size * APPROX_CHAR_WIDTH_RATIO + self.char_spacing;
                if ch == ' ' {
                    w += self.word_spacing;
                }
                w * self.horiz_scale
            })
            .sum()
    }
}

struct Walker<'a> {
    fonts: &'a [BackendFontInfo],
    xobjects: &'a [XObjectInfo],
    ctm: Matrix,
    stack: Vec<Matrix>,
    text: TextState,
    path: Vec<(f32, f32)>,
    marks: PageMarks,
}

impl<'a> Walker<'a> {
    fn new(fonts: &'a [BackendFontInfo], xobjects: &'a [XObjectInfo]) -> Self {
        Walker {
            fonts,
            xobjects,
            ctm: IDENTITY_MATRIX,
            stack: Vec::new(),
            text: TextState::default(),
            path: Vec::new(),
            marks: PageMarks::default(),
        }
    }

    /// Current text rendering matrix, without the font size.
    fn render_matrix(&self) -> Matrix {
        multiply(&self.text.text_matrix, &self.ctm)
    }

    fn decode(&self, operand: &PdfValue) -> String {
        match operand {
            PdfValue::Str(bytes) => decode_text(self.text.font.map(|i| &self.fonts[i]), bytes),
            _ => String::new(),
        }
    }

    fn step(&mut self, op: &ContentOp) {
        match op.operator.as_str() {
            // -- Graphics state -----------------------------------------
            "q" => self.stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = op.numbers::<6>() {
                    self.ctm = multiply(&m, &self.ctm);
                }
            }

            // -- Text object --------------------------------------------
            "BT" => {
                self.text.text_matrix = IDENTITY_MATRIX;
                self.text.line_matrix = IDENTITY_MATRIX;
            }
            "Tf" => self.set_font(&op.operands),
            "Tm" => {
                if let Some(m) = op.numbers::<6>() {
                    self.text.text_matrix = m;
                    self.text.line_matrix = m;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = op.numbers::<2>() {
                    self.text.translate_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = op.numbers::<2>() {
                    self.text.leading = -ty;
                    self.text.translate_line(tx, ty);
                }
            }
            "T*" => self.text.next_line(),
            "TL" => {
                if let Some([v]) = op.numbers::<1>() {
                    self.text.leading = v;
                }
            }
            "Tc" => {
                if let Some([v]) = op.numbers::<1>() {
                    self.text.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some([v]) = op.numbers::<1>() {
                    self.text.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some([v]) = op.numbers::<1>() {
                    self.text.horiz_scale = v / 100.0;
                }
            }
            "Ts" => {
                if let Some([v]) = op.numbers::<1>() {
                    self.text.text_rise = v;
                }
            }

            // -- Show text ----------------------------------------------
            "Tj" => {
                if let Some(first) = op.operands.first() {
                    self.show(first);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(arr)) = op.operands.first() {
                    self.show_array(arr);
                }
            }
            "'" => {
                self.text.next_line();
                if let Some(first) = op.operands.first() {
                    self.show(first);
                }
            }
            "\"" => {
                if let [aw, ac, string, ..] = op.operands.as_slice() {
                    if let Some(aw) = get_number_from_value(aw) {
                        self.text.word_spacing = aw;
                    }
                    if let Some(ac) = get_number_from_value(ac) {
                        self.text.char_spacing = ac;
                    }
                    self.text.next_line();
                    self.show(string);
                }
            }

            // -- Paths --------------------------------------------------
            "m" | "l" => {
                if let Some([x, y]) = op.numbers::<2>() {
                    self.path_point(x, y);
                }
            }
            "c" => {
                if let Some([x1, y1, x2, y2, x3, y3]) = op.numbers::<6>() {
                    self.path_point(x1, y1);
                    self.path_point(x2, y2);
                    self.path_point(x3, y3);
                }
            }
            "v" | "y" => {
                if let Some([x1, y1, x2, y2]) = op.numbers::<4>() {
                    self.path_point(x1, y1);
                    self.path_point(x2, y2);
                }
            }
            "re" => {
                if let Some([x, y, w, h]) = op.numbers::<4>() {
                    self.path_point(x, y);
                    self.path_point(x + w, y);
                    self.path_point(x, y + h);
                    self.path_point(x + w, y + h);
                }
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                if let Some(bbox) = BBox::from_points(self.path.drain(..)) {
                    self.marks.shapes.push(bbox);
                }
            }
            "n" => self.path.clear(),

            // -- XObjects -----------------------------------------------
            "Do" => {
                if let Some(PdfValue::Name(name)) = op.operands.first() {
                    self.place_xobject(name);
                }
            }
            "BI" => self.marks.xobjects.push(PlacedXObject {
                name: "inline".to_string(),
                kind: XObjectKind::Image,
                bbox: transform_rect(&self.ctm, [0.0, 0.0, 1.0, 1.0]),
            }),

            _ => {}
        }
    }

    fn set_font(&mut self, operands: &[PdfValue]) {
        let [key, size, ..] = operands else {
            return;
        };
        let key = match key {
            PdfValue::Name(n) | PdfValue::Str(n) => n,
            _ => return,
        };
        self.text.font = self.fonts.iter().position(|f| &f.name == key);
        self.text.font_size = get_number_from_value(size).unwrap_or(0.0);
    }

    fn path_point(&mut self, x: f32, y: f32) {
        self.path.push(apply(&self.ctm, x, y));
    }

    /// Baseline origin of the next glyph, user space.
    fn origin(&self) -> (f32, f32) {
        apply(&self.render_matrix(), 0.0, self.text.text_rise)
    }

    fn effective_font_size(&self) -> f32 {
        let m = self.render_matrix();
        (self.text.font_size * (m[1].powi(2) + m[3].powi(2)).sqrt()).abs()
    }

    fn push_span(&mut self, text: String, start: (f32, f32)) {
        let end = self.origin();
        self.marks.spans.push(TextSpan {
            text,
            x: start.0.min(end.0),
            y: start.1,
            width: (end.0 - start.0).abs(),
            font_size: self.effective_font_size(),
        });
    }

    fn show(&mut self, operand: &PdfValue) {
        let text = self.decode(operand);
        if text.is_empty() {
            return;
        }
        let start = self.origin();
        let dx = self.text.displacement(&text);
        self.text.advance_x(dx);
        self.push_span(text, start);
    }

    /// Process a `TJ` array: strings to render and numeric kerning
    /// adjustments in thousandths of a text-space unit. Large adjustments
    /// become spaces.
    fn show_array(&mut self, arr: &[PdfValue]) {
        let mut buf = String::new();
        let mut start = self.origin();

        for elem in arr {
            match elem {
                PdfValue::Str(_) => {
                    let fragment = self.decode(elem);
                    if buf.is_empty() {
                        start = self.origin();
                    }
                    let dx = self.text.displacement(&fragment);
                    buf.push_str(&fragment);
                    self.text.advance_x(dx);
                }
                val => {
                    if let Some(adj) = get_number_from_value(val) {
                        let dx = -adj / 1000.0 * self.text.font_size * self.text.horiz_scale;
                        let gap = self.text.font_size
                            * APPROX_CHAR_WIDTH_RATIO
                            * self.text.horiz_scale
                            * TJ_SPACE_RATIO;
                        if dx > gap && !buf.is_empty() {
                            buf.push(' ');
                        }
                        self.text.advance_x(dx);
                    }
                }
            }
        }

        let trimmed = buf.trim_end();
        if !trimmed.is_empty() {
            let text = trimmed.to_string();
            self.push_span(text, start);
        }
    }

    fn place_xobject(&mut self, name: &[u8]) {
        let Some(info) = self.xobjects.iter().find(|x| x.name == name) else {
            return;
        };

        let bbox = match info.kind {
            XObjectKind::Image => transform_rect(&self.ctm, [0.0, 0.0, 1.0, 1.0]),
            XObjectKind::Form => {
                let m = multiply(&info.matrix.unwrap_or(IDENTITY_MATRIX), &self.ctm);
                transform_rect(&m, info.bbox.unwrap_or([0.0, 0.0, 1.0, 1.0]))
            }
            XObjectKind::Other => return,
        };

        self.marks.xobjects.push(PlacedXObject {
            name: String::from_utf8_lossy(name).into_owned(),
            kind: info.kind,
            bbox,
        });
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the state machine over already-decoded operators.
///
/// | Operator | Action |
/// |----------|--------|
/// | `q` `Q` `cm` | Save, restore and concatenate the CTM |
/// | `BT` | Begin text object, reset matrices |
/// | `Tf` | Set font and size |
/// | `Tm` `Td` `TD` `T*` `TL` | Text position and leading |
/// | `Tc` `Tw` `Tz` `Ts` | Spacing, scaling and rise |
/// | `Tj` `TJ` `'` `"` | Show text |
/// | `m` `l` `c` `v` `y` `re` | Build a path |
/// | `S` `s` `f` `F` `f*` `B` `B*` `b` `b*` `n` | Paint or discard it |
/// | `Do` `BI` | Place an XObject or inline image |
pub fn walk_ops(ops: &[ContentOp], fonts: &[BackendFontInfo], xobjects: &[XObjectInfo]) -> PageMarks {
    let mut walker = Walker::new(fonts, xobjects);
    for op in ops {
        walker.step(op);
    }
    walker.marks
}

/// Walk one page of a backend.
pub fn walk_page(backend: &dyn PdfBackend, page_id: PageId) -> Result<PageMarks, PdfError> {
    let raw_content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw_content)?;
    let fonts = backend.page_fonts(page_id).unwrap_or_default();
    let xobjects = backend.page_xobjects(page_id).unwrap_or_default();

    Ok(walk_ops(&ops, &fonts, &xobjects))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
