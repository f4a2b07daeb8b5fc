use serde::{Deserialize, Serialize};

/// Axis-aligned box in page space: origin at the bottom-left corner of the
/// page's MediaBox, Y growing upward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        BBox {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Smallest box containing every point, or `None` for no points.
    pub fn from_points(points: impl IntoIterator<Item = (f32, f32)>) -> Option<Self> {
        points.into_iter().fold(None, |acc, (x, y)| match acc {
            None => Some(BBox::new(x, y, x, y)),
            Some(b) => Some(BBox::new(b.x0.min(x), b.y0.min(y), b.x1.max(x), b.y1.max(y))),
        })
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Horizontal extents intersect (touching counts).
    pub fn overlaps_horizontally(&self, other: &BBox) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1
    }

    pub fn translate(&self, dx: f32, dy: f32) -> BBox {
        BBox::new(self.x0 + dx, self.y0 + dy, self.x1 + dx, self.y1 + dy)
    }
}

/// Tuning knobs for grouping text into lines and boxes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutParams {
    /// Maximum vertical gap between two lines of one box, relative to the
    /// font size.
    pub line_margin: f32,
    /// Horizontal gap, relative to the font size, that splits a line in two.
    pub char_margin: f32,
    /// Spans whose baselines differ by at most this many points share a line.
    pub y_tolerance: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        LayoutParams {
            line_margin: 0.5,
            char_margin: 2.0,
            y_tolerance: 1.0,
        }
    }
}

/// A single line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutLine {
    pub bbox: BBox,
    pub text: String,
    pub font_size: f32,
}

/// One positioned item on a page, in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutItem {
    /// A block of vertically adjacent lines.
    TextBox { bbox: BBox, lines: Vec<LayoutLine> },
    /// An image XObject placed with `Do`.
    Image { bbox: BBox, name: String },
    /// A form XObject placed with `Do`.
    Figure { bbox: BBox, name: String },
    /// A painted vector path (rules, frames, underlines...).
    Shape { bbox: BBox },
}

impl LayoutItem {
    pub fn bbox(&self) -> BBox {
        match self {
            LayoutItem::TextBox { bbox, .. }
            | LayoutItem::Image { bbox, .. }
            | LayoutItem::Figure { bbox, .. }
            | LayoutItem::Shape { bbox } => *bbox,
        }
    }
}

/// Layout of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutPage {
    /// 1-based page number.
    pub number: usize,
    pub width: f32,
    pub height: f32,
    pub items: Vec<LayoutItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_orders_corners() {
        let b = BBox::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(b, BBox::new(0.0, 5.0, 10.0, 20.0));
        assert_eq!(b.width(), 10.0);
        assert_eq!(b.height(), 15.0);
    }

    #[test]
    fn test_bbox_from_points() {
        let b = BBox::from_points([(1.0, 4.0), (3.0, -2.0), (2.0, 0.0)]).unwrap();
        assert_eq!(b, BBox::new(1.0, -2.0, 3.0, 4.0));
        assert!(BBox::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_horizontal_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.overlaps_horizontally(&BBox::new(10.0, 50.0, 20.0, 60.0)));
        assert!(!a.overlaps_horizontally(&BBox::new(11.0, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn test_layout_item_serializes_with_kind_tag() {
        let item = LayoutItem::Shape {
            bbox: BBox::new(0.0, 0.0, 1.0, 1.0),
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.starts_with(r#"{"kind":"shape""#));
    }
}
