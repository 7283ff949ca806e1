//! Watermark placement geometry
//!
//! PDF page space has its origin at the bottom-left, while the UI anchors
//! overlays with fractions measured from the top-left. Text is drawn at an
//! origin and rotated about that same origin, so to keep the visual centre on
//! the anchor the origin has to be pulled back by the rotated half-extent.

use serde::{Deserialize, Serialize};

/// A position in page space (points, origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Width and height of the unrotated text (or image) box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextExtent {
    pub width: f64,
    pub height: f64,
}

/// Where the overlay's centre should land, as fractions of the page.
///
/// `x` runs left to right, `y` runs top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    pub const CENTER: Anchor = Anchor { x: 0.5, y: 0.5 };

    /// Clamp both fractions into [0, 1].
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::CENTER
    }
}

/// The anchor expressed in page space.
pub fn anchor_point(page: PageSize, anchor: Anchor) -> Point {
    Point {
        x: page.width * anchor.x,
        y: page.height * (1.0 - anchor.y),
    }
}

fn rotate(x: f64, y: f64, degrees: f64) -> (f64, f64) {
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

/// Compute the draw origin so the box's centre lands on the anchor after
/// rotating by `rotation_degrees` (counter-clockwise) about the origin.
pub fn place(page: PageSize, anchor: Anchor, rotation_degrees: f64, extent: TextExtent) -> Point {
    let center = anchor_point(page, anchor);
    let (rv_x, rv_y) = rotate(extent.width / 2.0, extent.height / 2.0, rotation_degrees);
    Point {
        x: center.x - rv_x,
        y: center.y - rv_y,
    }
}

/// Where the centre of a box drawn at `origin` ends up after rotation.
pub fn visual_center(origin: Point, rotation_degrees: f64, extent: TextExtent) -> Point {
    let (rv_x, rv_y) = rotate(extent.width / 2.0, extent.height / 2.0, rotation_degrees);
    Point {
        x: origin.x + rv_x,
        y: origin.y + rv_y,
    }
}

/// Text-space matrix `[a b c d e f]` drawing at `origin` rotated by
/// `rotation_degrees`.
pub fn rotation_matrix(origin: Point, rotation_degrees: f64) -> [f64; 6] {
    let (sin, cos) = rotation_degrees.to_radians().sin_cos();
    [cos, sin, -sin, cos, origin.x, origin.y]
}
