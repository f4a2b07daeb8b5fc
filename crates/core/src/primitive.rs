//! Input contract for the layout parser.
//!
//! Whatever produces layout (the bundled `pdf` crate or an external tool
//! writing a JSON layout file) hands the core one [`RawPage`] per page,
//! each holding primitives in the parser's reading order.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Classification of a layout primitive.
///
/// `Other` covers primitives the element model does not ingest (rules,
/// curves, annotations...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    TextBox,
    TextLine,
    Image,
    Figure,
    Other,
}

/// A single layout primitive with its bounding box.
///
/// For text kinds `text` is the raw text as the parser produced it, line
/// breaks and hyphenation included. A `TextBox` lists its lines in `lines`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub bbox: Rect,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub lines: Vec<Primitive>,
}

impl Primitive {
    /// A text line. A trailing newline is appended when missing, matching
    /// what layout parsers report for a line.
    pub fn text_line(bbox: Rect, text: impl Into<String>) -> Self {
        let mut text = text.into();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Primitive {
            kind: PrimitiveKind::TextLine,
            bbox,
            text,
            lines: Vec::new(),
        }
    }

    /// A text box built from its lines; the box text is the concatenation of
    /// the line texts.
    pub fn text_box(bbox: Rect, lines: Vec<Primitive>) -> Self {
        let text = lines.iter().map(|l| l.text.as_str()).collect();
        Primitive {
            kind: PrimitiveKind::TextBox,
            bbox,
            text,
            lines,
        }
    }

    pub fn image(bbox: Rect) -> Self {
        Self::opaque(PrimitiveKind::Image, bbox)
    }

    pub fn figure(bbox: Rect) -> Self {
        Self::opaque(PrimitiveKind::Figure, bbox)
    }

    pub fn other(bbox: Rect) -> Self {
        Self::opaque(PrimitiveKind::Other, bbox)
    }

    fn opaque(kind: PrimitiveKind, bbox: Rect) -> Self {
        Primitive {
            kind,
            bbox,
            text: String::new(),
            lines: Vec::new(),
        }
    }
}

/// One page of layout output with its dimensions in PDF points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub primitives: Vec<Primitive>,
}

/// Parse a JSON layout file (an array of [`RawPage`]s).
pub fn parse_layout_json(json: &str) -> Result<Vec<RawPage>, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_box_concatenates_lines() {
        let primitive = Primitive::text_box(
            Rect::new(0.0, 0.0, 100.0, 30.0),
            vec![
                Primitive::text_line(Rect::new(0.0, 15.0, 100.0, 30.0), "infor-"),
                Primitive::text_line(Rect::new(0.0, 0.0, 100.0, 15.0), "mation\n"),
            ],
        );

        assert_eq!(primitive.kind, PrimitiveKind::TextBox);
        assert_eq!(primitive.text, "infor-\nmation\n");
    }

    #[test]
    fn test_parse_layout_json() {
        let json = r#"[
            {
                "width": 612.0,
                "height": 792.0,
                "primitives": [
                    { "kind": "text_line", "bbox": { "x1": 0.0, "y1": 0.0, "x2": 10.0, "y2": 10.0 }, "text": "Hello\n" },
                    { "kind": "image", "bbox": { "x1": 0.0, "y1": 0.0, "x2": 10.0, "y2": 10.0 } }
                ]
            },
            { "width": 612.0, "height": 792.0 }
        ]"#;

        let pages = parse_layout_json(json).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].primitives.len(), 2);
        assert_eq!(pages[0].primitives[1].kind, PrimitiveKind::Image);
        assert!(pages[0].primitives[1].text.is_empty());
        assert!(pages[1].primitives.is_empty());
    }

    #[test]
    fn test_parse_layout_json_rejects_unknown_kind() {
        let json = r#"[{ "width": 1.0, "height": 1.0, "primitives": [
            { "kind": "hologram", "bbox": { "x1": 0.0, "y1": 0.0, "x2": 1.0, "y2": 1.0 } }
        ] }]"#;
        assert!(parse_layout_json(json).is_err());
    }
}
