//! Rectangle math for intersection ratios.

use super::margin::RootMargin;

/// An axis-aligned rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Grow each edge by the resolved margin. Negative offsets shrink.
    pub fn expand(&self, margin: &RootMargin) -> Rect {
        let top = margin.top.resolve(self.height);
        let right = margin.right.resolve(self.width);
        let bottom = margin.bottom.resolve(self.height);
        let left = margin.left.resolve(self.width);

        Rect::new(
            self.x - left,
            self.y - top,
            self.width + left + right,
            self.height + top + bottom,
        )
    }

    /// Overlap of two rectangles. Edge-adjacent rectangles produce a
    /// zero-area intersection rather than `None`.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right < x || bottom < y {
            return None;
        }
        Some(Rect::new(x, y, right - x, bottom - y))
    }
}

/// Result of intersecting a target with its (margin-expanded) root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub is_intersecting: bool,
    /// Visible fraction of the target, `0.0..=1.0`.
    pub ratio: f64,
}

impl Intersection {
    pub fn compute(target: &Rect, root: &Rect, margin: &RootMargin) -> Self {
        let root = root.expand(margin);
        match target.intersection(&root) {
            None => Self {
                is_intersecting: false,
                ratio: 0.0,
            },
            Some(overlap) => {
                let area = target.area();
                // Zero-area targets count as fully visible once they touch the root.
                let ratio = if area > 0.0 {
                    (overlap.area() / area).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                Self {
                    is_intersecting: true,
                    ratio,
                }
            }
        }
    }

    /// Whether this intersection satisfies `threshold`.
    ///
    /// A zero threshold only requires touching the root; anything higher
    /// requires the visible ratio to reach it.
    pub fn meets(&self, threshold: f64) -> bool {
        if threshold <= 0.0 {
            self.is_intersecting
        } else {
            self.is_intersecting && self.ratio >= threshold
        }
    }
}
