//! Axis-aligned rectangles in page space.
//!
//! Coordinates are page units (PDF points) with a top-left origin, so `y` grows
//! downward and `y0` is the top edge.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Page rectangle anchored at the origin.
    pub const fn page(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// True when every coordinate is finite and the corners are ordered.
    pub fn is_valid(&self) -> bool {
        self.x0.is_finite()
            && self.y0.is_finite()
            && self.x1.is_finite()
            && self.y1.is_finite()
            && self.x0 <= self.x1
            && self.y0 <= self.y1
    }

    pub fn width(&self) -> f64 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y1 - self.y0).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center_y(&self) -> f64 {
        (self.y0 + self.y1) / 2.0
    }

    /// Minimal rectangle enclosing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    /// Closed-interval intersection test: rectangles that share only an edge intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1 && self.y0 <= other.y1 && other.y0 <= self.y1
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        self.intersects(other).then(|| {
            Rect::new(
                self.x0.max(other.x0),
                self.y0.max(other.y0),
                self.x1.min(other.x1),
                self.y1.min(other.y1),
            )
        })
    }

    pub fn intersection_area(&self, other: &Rect) -> f64 {
        self.intersection(other).map_or(0.0, |r| r.area())
    }

    pub fn contains(&self, other: &Rect) -> bool {
        self.x0 <= other.x0 && self.y0 <= other.y0 && self.x1 >= other.x1 && self.y1 >= other.y1
    }

    /// Grow by `d` on all four sides.
    pub fn expand(&self, d: f64) -> Rect {
        Rect::new(self.x0 - d, self.y0 - d, self.x1 + d, self.y1 + d)
    }

    /// Clip to `bounds`. The result may be degenerate when the rectangles do not overlap.
    pub fn clamp_to(&self, bounds: &Rect) -> Rect {
        Rect::new(
            self.x0.max(bounds.x0),
            self.y0.max(bounds.y0),
            self.x1.min(bounds.x1),
            self.y1.min(bounds.y1),
        )
    }

    /// Intersection over union in `[0, 1]`; zero when the union has no area.
    pub fn iou(&self, other: &Rect) -> f64 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// Width of the shared x-range divided by the narrower of the two widths.
    ///
    /// A zero-width operand counts as fully overlapping when the x-ranges touch.
    pub fn horizontal_overlap_ratio(&self, other: &Rect) -> f64 {
        let shared = self.x1.min(other.x1) - self.x0.max(other.x0);
        if shared < 0.0 {
            return 0.0;
        }
        let narrower = self.width().min(other.width());
        if narrower <= 0.0 {
            return 1.0;
        }
        (shared / narrower).min(1.0)
    }

    /// Vertical distance between the rectangles, zero when their y-ranges overlap.
    pub fn vertical_gap(&self, other: &Rect) -> f64 {
        (other.y0 - self.y1).max(self.y0 - other.y1).max(0.0)
    }

    /// Distance by which this rectangle leaves `bounds` on its worst side.
    pub fn overflow(&self, bounds: &Rect) -> f64 {
        (bounds.x0 - self.x0)
            .max(bounds.y0 - self.y0)
            .max(self.x1 - bounds.x1)
            .max(self.y1 - bounds.y1)
            .max(0.0)
    }
}

/// Union of a non-empty set of rectangles.
pub fn union_all<'a, I>(rects: I) -> Option<Rect>
where
    I: IntoIterator<Item = &'a Rect>,
{
    rects.into_iter().fold(None, |acc, r| match acc {
        None => Some(*r),
        Some(u) => Some(u.union(r)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touching_rects_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert!(a.intersects(&b));
        assert_eq!(a.intersection_area(&b), 0.0);
    }

    #[test]
    fn test_separated_rects_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.5, 0.0, 20.5, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.expand(0.25).intersects(&b.expand(0.25)));
    }

    #[test]
    fn test_union_and_contains() {
        let a = Rect::new(0.0, 100.0, 200.0, 300.0);
        let b = Rect::new(0.0, 305.0, 200.0, 320.0);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0.0, 100.0, 200.0, 320.0));
        assert!(u.contains(&a));
        assert!(u.contains(&b));
    }

    #[test]
    fn test_iou() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-12);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(Rect::new(0.0, 0.0, 0.0, 0.0).iou(&a), 0.0);
    }

    #[test]
    fn test_horizontal_overlap_ratio() {
        let cluster = Rect::new(0.0, 100.0, 200.0, 300.0);
        assert_eq!(cluster.horizontal_overlap_ratio(&Rect::new(0.0, 305.0, 200.0, 320.0)), 1.0);
        assert_eq!(cluster.horizontal_overlap_ratio(&Rect::new(300.0, 305.0, 500.0, 320.0)), 0.0);
        assert_eq!(cluster.horizontal_overlap_ratio(&Rect::new(150.0, 305.0, 250.0, 320.0)), 0.5);
    }

    #[test]
    fn test_horizontal_overlap_ratio_zero_width() {
        let line = Rect::new(50.0, 0.0, 50.0, 100.0);
        let caption = Rect::new(0.0, 110.0, 100.0, 120.0);
        assert_eq!(line.horizontal_overlap_ratio(&caption), 1.0);
        let far = Rect::new(60.0, 0.0, 60.0, 100.0);
        assert_eq!(far.horizontal_overlap_ratio(&Rect::new(0.0, 0.0, 10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_vertical_gap() {
        let cluster = Rect::new(0.0, 100.0, 200.0, 300.0);
        assert_eq!(cluster.vertical_gap(&Rect::new(0.0, 305.0, 200.0, 320.0)), 5.0);
        assert_eq!(cluster.vertical_gap(&Rect::new(0.0, 80.0, 200.0, 92.0)), 8.0);
        assert_eq!(cluster.vertical_gap(&Rect::new(0.0, 250.0, 200.0, 320.0)), 0.0);
    }

    #[test]
    fn test_is_valid() {
        assert!(Rect::new(0.0, 0.0, 0.0, 0.0).is_valid());
        assert!(!Rect::new(10.0, 0.0, 0.0, 5.0).is_valid());
        assert!(!Rect::new(f64::NAN, 0.0, 1.0, 1.0).is_valid());
    }

    #[test]
    fn test_overflow() {
        let page = Rect::page(100.0, 100.0);
        assert_eq!(Rect::new(10.0, 10.0, 90.0, 90.0).overflow(&page), 0.0);
        assert_eq!(Rect::new(-3.0, 10.0, 90.0, 104.0).overflow(&page), 4.0);
    }

    #[test]
    fn test_union_all() {
        assert!(union_all(std::iter::empty()).is_none());
        let rects = [Rect::new(0.0, 0.0, 1.0, 1.0), Rect::new(5.0, -2.0, 6.0, 0.5)];
        assert_eq!(union_all(&rects), Some(Rect::new(0.0, -2.0, 6.0, 1.0)));
    }
}
