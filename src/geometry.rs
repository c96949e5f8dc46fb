//! Geometry primitives for ROI filtering.
//!
//! Two coordinate spaces exist:
//! - display space: pixels of the surface the user clicks on
//! - source space: native pixels of the captured frame
//!
//! Detections and ROI points are always kept in source space. Display-space
//! picks are converted once with [`transform_point`] before they are stored.

use serde::{Deserialize, Serialize};

/// A point in a single coordinate space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pixel dimensions of a display surface or source frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero, negative or not finite.
    pub fn is_empty(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }
}

/// Axis-aligned box in source-frame pixels (`x`, `y` is the top-left corner).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a box from `x1, y1, x2, y2` corners, in either order.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Scale a display-space point into source space.
///
/// X and Y use independent factors, so non-uniform scaling (letterboxed or
/// stretched previews) maps exactly. Callers must not pass an empty
/// `display` size.
pub fn transform_point(display_point: Point, display: Size, source: Size) -> Point {
    let scale_x = source.width / display.width;
    let scale_y = source.height / display.height;
    Point::new(display_point.x * scale_x, display_point.y * scale_y)
}

/// Even-odd ray casting test against a closed quadrilateral.
///
/// A horizontal ray is cast from `point`; each edge it crosses flips the
/// result. Points exactly on an edge or vertex land on whichever side the
/// arithmetic puts them, but always the same side for the same input.
///
/// Edges with `yi == yj` never evaluate the division: the first operand of
/// `&&` is false for them.
pub fn contains_point(polygon: &[Point; 4], point: Point) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;

    for i in 0..polygon.len() {
        let (xi, yi) = (polygon[i].x, polygon[i].y);
        let (xj, yj) = (polygon[j].x, polygon[j].y);

        let crosses = ((yi > point.y) != (yj > point.y))
            && (point.x < (xj - xi) * (point.y - yi) / (yj - yi) + xi);
        if crosses {
            inside = !inside;
        }
        j = i;
    }

    inside
}
