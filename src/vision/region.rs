//! Screen rectangles and points
//!
//! Every coordinate in the crate is in device pixels of the fixed
//! 1280x720 layout the game runs at.

use serde::{Deserialize, Serialize};

/// A point on the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance to another point
    pub fn distance_sq(&self, other: &Point) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (i32, i32) {
    fn from(point: Point) -> Self {
        (point.x, point.y)
    }
}

/// An axis-aligned rectangle, `(x, y)` is the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Region {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Right edge (inclusive for containment)
    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    /// Bottom edge (inclusive for containment)
    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    /// Compare against another region allowing each of x, y, w and h to
    /// differ by up to `tolerance` pixels. A tolerance of 0 is strict equality.
    pub fn equal_approximated(&self, other: &Region, tolerance: i32) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.w - other.w).abs() <= tolerance
            && (self.h - other.h).abs() <= tolerance
    }

    /// Overlapping area of two regions, `None` when they do not overlap.
    ///
    /// Regions with negative width or height are normalized first, so the
    /// result does not depend on which corner a region was built from.
    pub fn intersection(&self, other: &Region) -> Option<Region> {
        let (ax1, ax2) = ordered(self.x, self.right());
        let (ay1, ay2) = ordered(self.y, self.bottom());
        let (bx1, bx2) = ordered(other.x, other.right());
        let (by1, by2) = ordered(other.y, other.bottom());

        let x1 = ax1.max(bx1);
        let y1 = ay1.max(by1);
        let x2 = ax2.min(bx2);
        let y2 = ay2.min(by2);

        if x1 < x2 && y1 < y2 {
            Some(Region::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }

    /// Center point, rounded toward the top-left
    pub fn center(&self) -> Point {
        Point::new((self.x * 2 + self.w) / 2, (self.y * 2 + self.h) / 2)
    }

    /// Whether the point lies inside the region, edges included
    pub fn contains(&self, point: Point) -> bool {
        (self.x..=self.right()).contains(&point.x) && (self.y..=self.bottom()).contains(&point.y)
    }

    /// Clamp the region to a `width` x `height` screen, returning `None`
    /// when nothing of it is left on screen.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        self.intersection(&Region::new(0, 0, width as i32, height as i32))
    }
}

fn ordered(a: i32, b: i32) -> (i32, i32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
