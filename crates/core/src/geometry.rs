//! Axis-aligned rectangles in PDF user space.
//!
//! All rectangles handled by the core share one convention: origin at the
//! bottom-left corner of the page, Y growing upward. Producers are not
//! required to order their corners, so consumers call [`Rect::normalized`]
//! before comparing.

use serde::{Deserialize, Serialize};

/// A rectangle given by two opposite corners `(x1, y1)` and `(x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Rect { x1, y1, x2, y2 }
    }

    /// Return the same rectangle with `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(&self) -> Self {
        Rect {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).abs()
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).abs()
    }

    /// Whether this rectangle overlaps `other`. See [`overlaps`].
    pub fn overlaps(&self, other: &Rect) -> bool {
        overlaps(self, other)
    }

    /// Smallest normalized rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let a = self.normalized();
        let b = other.normalized();
        Rect {
            x1: a.x1.min(b.x1),
            y1: a.y1.min(b.y1),
            x2: a.x2.max(b.x2),
            y2: a.y2.max(b.y2),
        }
    }

    /// Bounding union of every rectangle in `rects`, or `None` when empty.
    pub fn bounding<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
        rects.into_iter().fold(None, |acc, r| match acc {
            None => Some(r.normalized()),
            Some(acc) => Some(acc.union(r)),
        })
    }

    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.x1, self.y1, self.x2, self.y2)
    }
}

impl From<(f64, f64, f64, f64)> for Rect {
    fn from((x1, y1, x2, y2): (f64, f64, f64, f64)) -> Self {
        Rect::new(x1, y1, x2, y2)
    }
}

/// True unless `a` lies strictly to one side of `b` on either axis.
///
/// Touching edges count as overlap. Both rectangles are expected to be
/// normalized.
pub fn overlaps(a: &Rect, b: &Rect) -> bool {
    if a.x1 > b.x2 || b.x1 > a.x2 {
        return false;
    }

    if a.y1 > b.y2 || b.y1 > a.y2 {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_is_symmetric() {
        let cases = [
            (Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(5.0, 5.0, 15.0, 15.0)),
            (Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(11.0, 0.0, 20.0, 10.0)),
            (Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(0.0, 11.0, 10.0, 20.0)),
            (Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(2.0, 2.0, 3.0, 3.0)),
        ];

        for (a, b) in cases {
            assert_eq!(overlaps(&a, &b), overlaps(&b, &a), "{:?} vs {:?}", a, b);
        }
    }

    #[test]
    fn test_overlap_with_self() {
        let r = Rect::new(1.0, 2.0, 3.0, 4.0);
        assert!(overlaps(&r, &r));
    }

    #[test]
    fn test_touching_edges_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert!(a.overlaps(&b));

        let corner = Rect::new(10.0, 10.0, 12.0, 12.0);
        assert!(a.overlaps(&corner));
    }

    #[test]
    fn test_disjoint_on_one_axis() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(!a.overlaps(&Rect::new(10.5, 0.0, 20.0, 10.0)));
        assert!(!a.overlaps(&Rect::new(0.0, -5.0, 10.0, -0.5)));
    }

    #[test]
    fn test_normalized_orders_corners() {
        let r = Rect::new(10.0, 8.0, 2.0, 4.0).normalized();
        assert_eq!(r, Rect::new(2.0, 4.0, 10.0, 8.0));
        assert_eq!(r.width(), 8.0);
        assert_eq!(r.height(), 4.0);
    }

    #[test]
    fn test_bounding_union() {
        let rects = [
            Rect::new(10.0, 10.0, 20.0, 20.0),
            Rect::new(5.0, 15.0, 12.0, 30.0),
            Rect::new(18.0, 2.0, 25.0, 3.0),
        ];
        assert_eq!(
            Rect::bounding(rects.iter()),
            Some(Rect::new(5.0, 2.0, 25.0, 30.0))
        );
        assert_eq!(Rect::bounding(std::iter::empty()), None);
    }
}
