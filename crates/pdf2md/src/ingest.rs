use std::path::Path;

use pdf::{BBox, LayoutItem, LayoutPage, LayoutParams};
use pdf2md_core::primitive::parse_layout_json;
use pdf2md_core::{Primitive, RawPage, Rect};

use crate::prelude::*;

/// What kind of file a source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    LayoutJson,
}

impl SourceKind {
    /// Sniff the kind from the file contents, falling back to the extension.
    pub fn detect(path: &Path, bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            return Some(SourceKind::Pdf);
        }
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(SourceKind::Pdf),
            "json" => Some(SourceKind::LayoutJson),
            _ => None,
        }
    }
}

/// Lay out a source file into raw pages for the document model.
pub fn load_pages(path: &Path, bytes: &[u8], params: &LayoutParams) -> Result<Vec<RawPage>> {
    let kind = SourceKind::detect(path, bytes)
        .ok_or_else(|| Error::UnsupportedSource(path.display().to_string()))?;

    match kind {
        SourceKind::Pdf => {
            let pages = pdf::extract_layout(bytes, params)
                .map_err(|e| eyre!("Failed to lay out {}: {}", path.display(), e))?;
            log::debug!("extracted {} pages from {}", pages.len(), path.display());
            Ok(pages.iter().map(raw_page).collect())
        }
        SourceKind::LayoutJson => {
            let json = std::str::from_utf8(bytes)
                .with_context(|| f!("{} is not UTF-8", path.display()))?;
            parse_layout_json(json).with_context(|| f!("Invalid layout file {}", path.display()))
        }
    }
}

/// Convert one parsed page into the primitives the model ingests.
pub fn raw_page(page: &LayoutPage) -> RawPage {
    RawPage {
        width: f64::from(page.width),
        height: f64::from(page.height),
        primitives: page.items.iter().map(primitive).collect(),
    }
}

fn primitive(item: &LayoutItem) -> Primitive {
    match item {
        LayoutItem::TextBox { bbox, lines } => Primitive::text_box(
            rect(bbox),
            lines
                .iter()
                .map(|line| Primitive::text_line(rect(&line.bbox), line.text.as_str()))
                .collect(),
        ),
        LayoutItem::Image { bbox, .. } => Primitive::image(rect(bbox)),
        LayoutItem::Figure { bbox, .. } => Primitive::figure(rect(bbox)),
        LayoutItem::Shape { bbox } => Primitive::other(rect(bbox)),
    }
}

fn rect(b: &BBox) -> Rect {
    Rect::new(
        f64::from(b.x0),
        f64::from(b.y0),
        f64::from(b.x1),
        f64::from(b.y1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf::LayoutLine;
    use pdf2md_core::PrimitiveKind;

    fn line(y: f32, text: &str) -> LayoutLine {
        LayoutLine {
            bbox: BBox::new(72.0, y, 300.0, y + 10.0),
            text: text.to_string(),
            font_size: 10.0,
        }
    }

    #[test]
    fn test_raw_page_conversion() {
        let page = LayoutPage {
            number: 1,
            width: 612.0,
            height: 792.0,
            items: vec![
                LayoutItem::TextBox {
                    bbox: BBox::new(72.0, 688.0, 300.0, 710.0),
                    lines: vec![line(700.0, "infor-"), line(688.0, "mation")],
                },
                LayoutItem::Image {
                    bbox: BBox::new(72.0, 300.0, 300.0, 600.0),
                    name: "Im1".to_string(),
                },
                LayoutItem::Shape {
                    bbox: BBox::new(72.0, 100.0, 500.0, 101.0),
                },
            ],
        };

        let raw = raw_page(&page);

        assert_eq!(raw.width, 612.0);
        assert_eq!(raw.primitives.len(), 3);
        let block = &raw.primitives[0];
        assert_eq!(block.kind, PrimitiveKind::TextBox);
        assert_eq!(block.text, "infor-\nmation\n");
        assert_eq!(block.lines.len(), 2);
        assert_eq!(block.lines[1].bbox, Rect::new(72.0, 688.0, 300.0, 698.0));
        assert_eq!(raw.primitives[1].kind, PrimitiveKind::Image);
        assert_eq!(raw.primitives[2].kind, PrimitiveKind::Other);
    }

    #[test]
    fn test_detect_source_kind() {
        assert_eq!(
            SourceKind::detect(Path::new("book.bin"), b"%PDF-1.7\n"),
            Some(SourceKind::Pdf)
        );
        assert_eq!(
            SourceKind::detect(Path::new("layout.JSON"), b"[]"),
            Some(SourceKind::LayoutJson)
        );
        assert_eq!(SourceKind::detect(Path::new("notes.txt"), b"hello"), None);
    }

    #[test]
    fn test_load_layout_json() {
        let json = r#"[{"width": 600, "height": 800, "primitives": [
            {"kind": "text_line", "bbox": {"x1": 100, "y1": 600, "x2": 500, "y2": 612}, "text": "Hello\n"}
        ]}]"#;
        let pages = load_pages(Path::new("layout.json"), json.as_bytes(), &LayoutParams::default()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].primitives[0].text, "Hello\n");
    }

    #[test]
    fn test_unsupported_source() {
        assert!(load_pages(Path::new("notes.txt"), b"hello", &LayoutParams::default()).is_err());
    }
}
