//! Safe-area membership.
//!
//! The margin is given as fractional insets of the page: `x1`/`x2` from the
//! left edge and `y1`/`y2` from the TOP edge, the way a reader sees the
//! page. Element boxes are in PDF user space (origin bottom-left), so the
//! Y insets are flipped once, in [`SafeMargin::safe_rect`].

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::store::Document;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafeMargin {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Default for SafeMargin {
    fn default() -> Self {
        SafeMargin {
            x1: 0.15,
            y1: 0.08,
            x2: 0.85,
            y2: 0.92,
        }
    }
}

impl SafeMargin {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        SafeMargin { x1, y1, x2, y2 }
    }

    /// All insets within `[0, 1]` and each pair in increasing order.
    pub fn is_valid(&self) -> bool {
        let unit = |v: f64| (0.0..=1.0).contains(&v);
        unit(self.x1) && unit(self.y1) && unit(self.x2) && unit(self.y2)
            && self.x1 <= self.x2
            && self.y1 <= self.y2
    }

    /// Absolute safe rectangle of a `width` x `height` page, in user space.
    pub fn safe_rect(&self, width: f64, height: f64) -> Rect {
        Rect::new(
            width * self.x1,
            height * (1.0 - self.y2),
            width * self.x2,
            height * (1.0 - self.y1),
        )
    }
}

impl Document {
    /// Recompute `safe` for every element of every page. This is the only
    /// writer of the flag.
    pub fn recalculate_safe_area(&mut self) {
        let margin = self.margin;
        let mut unsafe_count = 0usize;

        for page in &mut self.pages {
            let safe_rect = margin.safe_rect(page.width, page.height);
            for (_, element) in &mut page.elements {
                element.safe = element.bbox.normalized().overlaps(&safe_rect);
                if !element.safe {
                    unsafe_count += 1;
                }
            }
        }

        log::debug!("safe area recalculated, {} elements outside", unsafe_count);
    }

    pub fn set_margin(&mut self, margin: SafeMargin) {
        self.margin = margin;
        self.recalculate_safe_area();
    }

    /// Safe rectangle of one page under the current margin.
    pub fn safe_rect(&self, page_index: usize) -> Option<Rect> {
        self.pages
            .get(page_index)
            .map(|p| self.margin.safe_rect(p.width, p.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKey;
    use crate::primitive::{Primitive, RawPage};

    fn page_with(boxes: &[Rect]) -> RawPage {
        RawPage {
            width: 1000.0,
            height: 1000.0,
            primitives: boxes.iter().map(|b| Primitive::text_line(*b, "x")).collect(),
        }
    }

    fn assert_rect_close(actual: Rect, expected: Rect) {
        let (a, e) = (actual.as_tuple(), expected.as_tuple());
        for (got, want) in [(a.0, e.0), (a.1, e.1), (a.2, e.2), (a.3, e.3)] {
            assert!((got - want).abs() < 1e-9, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_symmetric_margin_rect() {
        let margin = SafeMargin::new(0.1, 0.1, 0.9, 0.9);
        assert_rect_close(
            margin.safe_rect(1000.0, 1000.0),
            Rect::new(100.0, 100.0, 900.0, 900.0),
        );
    }

    #[test]
    fn test_asymmetric_margin_flips_y() {
        // Top inset 0.25, bottom inset 0.5 on a 800x400 page.
        let margin = SafeMargin::new(0.125, 0.25, 0.875, 0.5);
        assert_eq!(
            margin.safe_rect(800.0, 400.0),
            Rect::new(100.0, 200.0, 700.0, 300.0)
        );
    }

    #[test]
    fn test_recalculate_marks_overlap() {
        let layout = vec![page_with(&[
            Rect::new(50.0, 50.0, 150.0, 150.0),
            Rect::new(0.0, 0.0, 99.0, 99.0),
            Rect::new(100.0, 100.0, 100.0, 100.0),
        ])];
        let doc = Document::from_pages(&layout, SafeMargin::new(0.1, 0.1, 0.9, 0.9));

        assert!(doc.get(ElementKey::new(0)).unwrap().is_safe());
        assert!(!doc.get(ElementKey::new(1)).unwrap().is_safe());
        assert!(doc.get(ElementKey::new(2)).unwrap().is_safe());
    }

    #[test]
    fn test_unordered_bbox_is_normalized() {
        let layout = vec![page_with(&[Rect::new(150.0, 150.0, 50.0, 50.0)])];
        let doc = Document::from_pages(&layout, SafeMargin::new(0.1, 0.1, 0.9, 0.9));
        assert!(doc.get(ElementKey::new(0)).unwrap().is_safe());
    }

    #[test]
    fn test_set_margin_recomputes() {
        let layout = vec![page_with(&[Rect::new(20.0, 400.0, 60.0, 420.0)])];
        let mut doc = Document::from_pages(&layout, SafeMargin::new(0.1, 0.1, 0.9, 0.9));
        assert!(!doc.get(ElementKey::new(0)).unwrap().is_safe());

        doc.set_margin(SafeMargin::new(0.0, 0.0, 1.0, 1.0));
        assert!(doc.get(ElementKey::new(0)).unwrap().is_safe());
        assert_eq!(doc.margin(), SafeMargin::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_margin_validation() {
        assert!(SafeMargin::default().is_valid());
        assert!(!SafeMargin::new(0.9, 0.1, 0.1, 0.9).is_valid());
        assert!(!SafeMargin::new(0.1, 0.1, 1.5, 0.9).is_valid());
    }
}
