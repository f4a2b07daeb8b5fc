//! Layout analysis: turn the marks of a page into positioned items.
//!
//! ```text
//! TextSpan[]  --group_spans_into_lines-->  LayoutLine[]
//! LayoutLine[] --group_lines_into_boxes--> TextBox items
//! + images, figures, shapes  --arrange_page-->  LayoutPage
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;

use super::backend::{PageId, PdfBackend, XObjectKind};
use super::content::{walk_page, PageMarks, TextSpan};
use crate::cleanup::cleanup_text;
use crate::types::{BBox, LayoutItem, LayoutLine, LayoutPage, LayoutParams};
use crate::PdfError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Minimum gap (in points) between adjacent spans before we insert a space.
const MIN_WORD_GAP: f32 = 1.5;

/// Lines overlapping vertically by more than this fraction of the font size
/// are not stacked into one box.
const MAX_LINE_OVERLAP: f32 = 0.5;

// ---------------------------------------------------------------------------
// Spaceless-script helper
// ---------------------------------------------------------------------------

/// Returns `true` if `c` belongs to a script that does not use inter-word
/// spaces (CJK ideographs, kana, Hangul, Thai and neighbours).
pub fn is_spaceless_script_char(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0x20000..=0x2A6DF
        | 0xF900..=0xFAFF
        | 0x3040..=0x30FF
        | 0x31F0..=0x31FF
        | 0xAC00..=0xD7AF
        | 0x1100..=0x11FF
        | 0x3130..=0x318F
        | 0x3000..=0x303F
        | 0xFF00..=0xFFEF
        | 0x0E00..=0x0EFF
        | 0x1000..=0x109F
        | 0x1780..=0x17FF
        | 0x0F00..=0x0FFF
    )
}

fn boundary_is_spaceless(prev: &str, next: &str) -> bool {
    match (prev.chars().next_back(), next.chars().next()) {
        (Some(l), Some(f)) => is_spaceless_script_char(l) && is_spaceless_script_char(f),
        _ => false,
    }
}

fn by_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

// ---------------------------------------------------------------------------
// Spans -> lines
// ---------------------------------------------------------------------------

/// A line under construction.
struct LineRun {
    bbox: BBox,
    text: String,
    /// Character count per font size (hundredths of a point).
    sizes: HashMap<i32, usize>,
}

impl LineRun {
    fn start(span: &TextSpan) -> Self {
        let mut run = LineRun {
            bbox: span.bbox(),
            text: String::new(),
            sizes: HashMap::new(),
        };
        run.push_text(span);
        run
    }

    fn push_text(&mut self, span: &TextSpan) {
        self.text.push_str(&span.text);
        let key = (span.font_size * 100.0).round() as i32;
        *self.sizes.entry(key).or_insert(0) += span.text.chars().count();
    }

    fn extend(&mut self, span: &TextSpan) {
        self.bbox = self.bbox.union(&span.bbox());
        self.push_text(span);
    }

    /// Font size covering the most characters.
    fn dominant_font_size(&self) -> f32 {
        self.sizes
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(size, _)| *size as f32 / 100.0)
            .unwrap_or(0.0)
    }

    fn finish(self) -> Option<LayoutLine> {
        let font_size = self.dominant_font_size();
        let text = cleanup_text(&self.text);
        (!text.is_empty()).then_some(LayoutLine {
            bbox: self.bbox,
            text,
            font_size,
        })
    }
}

/// Group spans into lines.
///
/// Spans whose baselines are within `y_tolerance` points share a baseline.
/// Along a baseline, spans are joined left to right; a gap wider than
/// `char_margin` times the font size starts a separate line, and a gap over
/// [`MIN_WORD_GAP`] points gets a space unless both sides are spaceless
/// script. Lines come back top to bottom, left to right.
pub fn group_spans_into_lines(mut spans: Vec<TextSpan>, params: &LayoutParams) -> Vec<LayoutLine> {
    spans.retain(|s| !s.text.trim().is_empty());
    spans.sort_by(|a, b| by_f32(b.y, a.y).then(by_f32(a.x, b.x)));

    let mut baselines: Vec<Vec<TextSpan>> = Vec::new();
    for span in spans {
        match baselines.last_mut() {
            Some(group) if (group[0].y - span.y).abs() <= params.y_tolerance => group.push(span),
            _ => baselines.push(vec![span]),
        }
    }

    baselines
        .into_iter()
        .flat_map(|group| assemble_baseline(group, params))
        .collect()
}

fn assemble_baseline(mut spans: Vec<TextSpan>, params: &LayoutParams) -> Vec<LayoutLine> {
    spans.sort_by(|a, b| by_f32(a.x, b.x));

    let mut runs: Vec<LineRun> = Vec::new();
    for span in &spans {
        if let Some(run) = runs.last_mut() {
            let gap = span.x - run.bbox.x1;
            let font_size = span.font_size.max(run.dominant_font_size());
            if gap <= params.char_margin * font_size {
                if gap >= MIN_WORD_GAP
                    && !run.text.ends_with(' ')
                    && !span.text.starts_with(' ')
                    && !boundary_is_spaceless(&run.text, &span.text)
                {
                    run.text.push(' ');
                }
                run.extend(span);
                continue;
            }
        }
        runs.push(LineRun::start(span));
    }

    runs.into_iter().filter_map(LineRun::finish).collect()
}

// ---------------------------------------------------------------------------
// Lines -> boxes
// ---------------------------------------------------------------------------

/// Stack lines into text boxes.
///
/// A line joins an open box when it sits below the box's last line, the
/// vertical gap is at most `line_margin` times the larger font size and the
/// two lines overlap horizontally. Input must be top to bottom.
pub fn group_lines_into_boxes(lines: Vec<LayoutLine>, params: &LayoutParams) -> Vec<LayoutItem> {
    let mut boxes: Vec<Vec<LayoutLine>> = Vec::new();

    for line in lines {
        let target = boxes.iter_mut().rev().find(|lines| {
            lines
                .last()
                .is_some_and(|last| stacks_below(last, &line, params))
        });
        match target {
            Some(lines) => lines.push(line),
            None => boxes.push(vec![line]),
        }
    }

    boxes
        .into_iter()
        .filter_map(|lines| {
            let bbox = lines
                .iter()
                .map(|l| l.bbox)
                .reduce(|acc, b| acc.union(&b))?;
            Some(LayoutItem::TextBox { bbox, lines })
        })
        .collect()
}

fn stacks_below(above: &LayoutLine, below: &LayoutLine, params: &LayoutParams) -> bool {
    let font_size = above.font_size.max(below.font_size);
    let gap = above.bbox.y0 - below.bbox.y1;
    gap <= params.line_margin * font_size
        && gap >= -MAX_LINE_OVERLAP * font_size
        && above.bbox.overlaps_horizontally(&below.bbox)
}

// ---------------------------------------------------------------------------
// Page assembly
// ---------------------------------------------------------------------------

/// Build the layout of one page from its marks.
///
/// Text boxes, images and figures are ordered top to bottom then left to
/// right; shapes follow in the same order. Coordinates are shifted so the
/// MediaBox origin sits at (0, 0).
pub fn arrange_page(
    number: usize,
    media_box: [f32; 4],
    marks: PageMarks,
    params: &LayoutParams,
) -> LayoutPage {
    let [mx0, my0, mx1, my1] = media_box;
    let lines = group_spans_into_lines(marks.spans, params);
    let mut items = group_lines_into_boxes(lines, params);

    items.extend(marks.xobjects.into_iter().filter_map(|x| match x.kind {
        XObjectKind::Image => Some(LayoutItem::Image {
            bbox: x.bbox,
            name: x.name,
        }),
        XObjectKind::Form => Some(LayoutItem::Figure {
            bbox: x.bbox,
            name: x.name,
        }),
        XObjectKind::Other => None,
    }));
    sort_reading_order(&mut items);

    let mut shapes: Vec<LayoutItem> = marks
        .shapes
        .into_iter()
        .map(|bbox| LayoutItem::Shape { bbox })
        .collect();
    sort_reading_order(&mut shapes);
    items.extend(shapes);

    for item in &mut items {
        shift(item, -mx0, -my0);
    }

    LayoutPage {
        number,
        width: (mx1 - mx0).abs(),
        height: (my1 - my0).abs(),
        items,
    }
}

fn sort_reading_order(items: &mut [LayoutItem]) {
    items.sort_by(|a, b| {
        let (a, b) = (a.bbox(), b.bbox());
        by_f32(b.y1, a.y1).then(by_f32(a.x0, b.x0))
    });
}

fn shift(item: &mut LayoutItem, dx: f32, dy: f32) {
    match item {
        LayoutItem::TextBox { bbox, lines } => {
            *bbox = bbox.translate(dx, dy);
            for line in lines {
                line.bbox = line.bbox.translate(dx, dy);
            }
        }
        LayoutItem::Image { bbox, .. }
        | LayoutItem::Figure { bbox, .. }
        | LayoutItem::Shape { bbox } => *bbox = bbox.translate(dx, dy),
    }
}

/// Walk and arrange one page of a backend.
pub fn analyze_page(
    backend: &dyn PdfBackend,
    number: usize,
    page_id: PageId,
    params: &LayoutParams,
) -> Result<LayoutPage, PdfError> {
    let media_box = backend.page_box(page_id)?;
    let marks = walk_page(backend, page_id)?;
    log::debug!(
        "page {}: {} spans, {} xobjects, {} shapes",
        number,
        marks.spans.len(),
        marks.xobjects.len(),
        marks.shapes.len()
    );
    Ok(arrange_page(number, media_box, marks, params))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::parser::backend::{BackendFontInfo, ContentOp, PdfValue, XObjectInfo};
    use crate::parser::content::PlacedXObject;

    fn span(text: &str, x: f32, y: f32, font_size: f32) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            x,
            y,
            width: text.chars().count() as f32 * font_size * 0.5,
            font_size,
        }
    }

    #[test]
    fn test_spans_on_one_baseline_join_with_space() {
        let spans = vec![span("world", 40.0, 700.3, 10.0), span("Hello", 10.0, 700.0, 10.0)];
        let lines = group_spans_into_lines(spans, &LayoutParams::default());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Hello world");
        assert_eq!(lines[0].font_size, 10.0);
    }

    #[test]
    fn test_adjacent_spans_join_without_space() {
        let spans = vec![span("Hel", 10.0, 700.0, 10.0), span("lo", 25.0, 700.0, 10.0)];
        let lines = group_spans_into_lines(spans, &LayoutParams::default());
        assert_eq!(lines[0].text, "Hello");
    }

    #[test]
    fn test_wide_gap_splits_columns() {
        let spans = vec![span("left", 10.0, 700.0, 10.0), span("right", 300.0, 700.0, 10.0)];
        let lines = group_spans_into_lines(spans, &LayoutParams::default());
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["left", "right"]);
    }

    #[test]
    fn test_cjk_spans_join_without_space() {
        let spans = vec![span("日本", 10.0, 700.0, 10.0), span("語", 32.0, 700.0, 10.0)];
        let lines = group_spans_into_lines(spans, &LayoutParams::default());
        assert_eq!(lines[0].text, "日本語");
    }

    #[test]
    fn test_lines_stack_into_boxes() {
        let params = LayoutParams::default();
        let spans = vec![
            span("first line", 72.0, 700.0, 10.0),
            span("second line", 72.0, 688.0, 10.0),
            span("new paragraph", 72.0, 640.0, 10.0),
        ];
        let lines = group_spans_into_lines(spans, &params);
        let boxes = group_lines_into_boxes(lines, &params);

        assert_eq!(boxes.len(), 2);
        match &boxes[0] {
            LayoutItem::TextBox { lines, bbox } => {
                assert_eq!(lines.len(), 2);
                assert_eq!(bbox.y1, 708.0);
                assert_eq!(bbox.y0, 686.0);
            }
            other => panic!("expected text box, got {:?}", other),
        }
    }

    #[test]
    fn test_columns_do_not_share_boxes() {
        let params = LayoutParams::default();
        let spans = vec![
            span("left one", 50.0, 700.0, 10.0),
            span("right one", 320.0, 700.0, 10.0),
            span("left two", 50.0, 688.0, 10.0),
            span("right two", 320.0, 688.0, 10.0),
        ];
        let boxes = group_lines_into_boxes(group_spans_into_lines(spans, &params), &params);
        assert_eq!(boxes.len(), 2);
        for item in &boxes {
            let LayoutItem::TextBox { lines, .. } = item else {
                panic!("expected text box");
            };
            assert_eq!(lines.len(), 2);
            assert_eq!(lines[0].text.split(' ').next(), lines[1].text.split(' ').next());
        }
    }

    #[test]
    fn test_arrange_page_orders_and_shifts() {
        let marks = PageMarks {
            spans: vec![span("caption", 110.0, 310.0, 10.0)],
            xobjects: vec![PlacedXObject {
                name: "Im1".to_string(),
                kind: XObjectKind::Image,
                bbox: BBox::new(110.0, 400.0, 300.0, 600.0),
            }],
            shapes: vec![BBox::new(110.0, 700.0, 500.0, 701.0)],
        };

        let page = arrange_page(1, [10.0, 10.0, 622.0, 802.0], marks, &LayoutParams::default());

        assert_eq!(page.width, 612.0);
        assert_eq!(page.height, 792.0);
        let kinds: Vec<&str> = page
            .items
            .iter()
            .map(|i| match i {
                LayoutItem::TextBox { .. } => "text",
                LayoutItem::Image { .. } => "image",
                LayoutItem::Figure { .. } => "figure",
                LayoutItem::Shape { .. } => "shape",
            })
            .collect();
        assert_eq!(kinds, vec!["image", "text", "shape"]);
        assert_eq!(page.items[0].bbox(), BBox::new(100.0, 390.0, 290.0, 590.0));
    }

    struct MockBackend {
        ops: Vec<ContentOp>,
    }

    impl PdfBackend for MockBackend {
        fn pages(&self) -> BTreeMap<u32, PageId> {
            BTreeMap::from([(1, (1, 0))])
        }

        fn page_box(&self, _page: PageId) -> Result<[f32; 4], PdfError> {
            Ok([0.0, 0.0, 612.0, 792.0])
        }

        fn page_fonts(&self, _page: PageId) -> Result<Vec<BackendFontInfo>, PdfError> {
            Ok(vec![BackendFontInfo {
                name: b"F1".to_vec(),
                ..Default::default()
            }])
        }

        fn page_xobjects(&self, _page: PageId) -> Result<Vec<XObjectInfo>, PdfError> {
            Ok(Vec::new())
        }

        fn page_content(&self, _page: PageId) -> Result<Vec<u8>, PdfError> {
            Ok(Vec::new())
        }

        fn decode_content(&self, _data: &[u8]) -> Result<Vec<ContentOp>, PdfError> {
            Ok(self.ops.clone())
        }
    }

    #[test]
    fn test_analyze_page_with_mock_backend() {
        let num = PdfValue::Real;
        let backend = MockBackend {
            ops: vec![
                ContentOp::new("BT", vec![]),
                ContentOp::new("Tf", vec![PdfValue::Name(b"F1".to_vec()), num(12.0)]),
                ContentOp::new("Td", vec![num(72.0), num(720.0)]),
                ContentOp::new("Tj", vec![PdfValue::Str(b"\xEF\xAC\x81rst".to_vec())]),
                ContentOp::new("TD", vec![num(0.0), num(-14.0)]),
                ContentOp::new("Tj", vec![PdfValue::Str(b"second".to_vec())]),
                ContentOp::new("ET", vec![]),
            ],
        };

        let page = analyze_page(&backend, 1, (1, 0), &LayoutParams::default()).unwrap();

        assert_eq!(page.items.len(), 1);
        let LayoutItem::TextBox { lines, .. } = &page.items[0] else {
            panic!("expected text box");
        };
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }
}
