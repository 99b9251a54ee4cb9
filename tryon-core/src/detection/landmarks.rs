//! Face box and the 68-point landmark template.
//!
//! Landmarks follow the common 68-point ordering: jaw (0-16), brows (17-26),
//! nose (27-35), eyes (36-47) and lips (48-67). Positions are placed
//! procedurally relative to the face box, so a synthesized detection always
//! yields a full, plausibly shaped set.

use std::{f32::consts::PI, ops::Range};

use serde::{Deserialize, Serialize};
use tryon_utils::Point;

pub const LANDMARK_COUNT: usize = 68;

pub const JAW: Range<usize> = 0..17;
pub const LEFT_BROW: Range<usize> = 17..22;
pub const RIGHT_BROW: Range<usize> = 22..27;
pub const BROWS: Range<usize> = 17..27;
pub const NOSE_BRIDGE: Range<usize> = 27..31;
pub const NOSE_BASE: Range<usize> = 31..36;
pub const LEFT_EYE: Range<usize> = 36..42;
pub const RIGHT_EYE: Range<usize> = 42..48;
pub const OUTER_LIPS: Range<usize> = 48..60;
pub const INNER_LIPS: Range<usize> = 60..68;

/// Axis-aligned box in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Square box of side `side` centered in a `width` x `height` frame.
    pub fn centered(width: u32, height: u32, side: f32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self::new((w - side) * 0.5, (h - side) * 0.5, side, side)
    }

    /// Smallest box holding every point, grown by `pad` on each side.
    pub fn enclosing(points: &[Point], pad: f32) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(
            min_x - pad,
            min_y - pad,
            (max_x - min_x) + 2.0 * pad,
            (max_y - min_y) + 2.0 * pad,
        ))
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }

    /// Map box-relative coordinates (`0..1` on each axis) to image pixels.
    pub fn at(&self, u: f32, v: f32) -> Point {
        Point::new(self.x + u * self.width, self.y + v * self.height)
    }
}

/// Place the 68-point template inside `face`.
pub fn synthesize_landmarks(face: &BoundingBox) -> Vec<Point> {
    let mut points = Vec::with_capacity(LANDMARK_COUNT);

    // Jaw: lower half-ellipse from the left ear, under the chin, to the right ear.
    for i in 0..JAW.len() {
        let theta = PI - PI * i as f32 / 16.0;
        points.push(face.at(0.5 + 0.46 * theta.cos(), 0.42 + 0.55 * theta.sin()));
    }

    // Brows: shallow arches.
    for (start, end) in [(0.17, 0.43), (0.57, 0.83)] {
        for k in 0..5 {
            let t = k as f32 / 4.0;
            let u = start + (end - start) * t;
            points.push(face.at(u, 0.30 - 0.04 * (PI * t).sin()));
        }
    }

    // Nose bridge runs straight down the midline.
    for k in 0..NOSE_BRIDGE.len() {
        points.push(face.at(0.5, 0.36 + 0.07 * k as f32));
    }
    // Nose base: nostril arc, lowest at the tip.
    for k in 0..NOSE_BASE.len() {
        let offset = (k as f32 - 2.0).abs() / 2.0;
        points.push(face.at(0.41 + 0.045 * k as f32, 0.61 + 0.02 * (1.0 - offset)));
    }

    // Eyes: outer corner, two upper lid points, inner corner, two lower lid points.
    for center_u in [0.32, 0.68] {
        for k in 0..6 {
            let theta = PI + k as f32 * PI / 3.0;
            points.push(face.at(center_u + 0.09 * theta.cos(), 0.40 + 0.035 * theta.sin()));
        }
    }

    // Lips: outer contour from the left corner over the upper lip, then the
    // inner contour in the same direction.
    for k in 0..OUTER_LIPS.len() {
        let theta = PI + k as f32 * PI / 6.0;
        points.push(face.at(0.5 + 0.18 * theta.cos(), 0.80 + 0.07 * theta.sin()));
    }
    for k in 0..INNER_LIPS.len() {
        let theta = PI + k as f32 * PI / 4.0;
        points.push(face.at(0.5 + 0.11 * theta.cos(), 0.80 + 0.025 * theta.sin()));
    }

    debug_assert_eq!(points.len(), LANDMARK_COUNT);
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_has_68_points_inside_the_box() {
        let face = BoundingBox::new(100.0, 50.0, 200.0, 200.0);
        let points = synthesize_landmarks(&face);
        assert_eq!(points.len(), LANDMARK_COUNT);
        for (i, p) in points.iter().enumerate() {
            assert!(face.contains(*p), "landmark {i} at {p:?} escapes the box");
        }
    }

    #[test]
    fn groups_sit_in_anatomical_order() {
        let face = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let points = synthesize_landmarks(&face);
        let mean_y = |range: Range<usize>| {
            Point::centroid(&points[range]).map(|p| p.y).unwrap_or_default()
        };
        assert!(mean_y(BROWS) < mean_y(LEFT_EYE));
        assert!(mean_y(LEFT_EYE) < mean_y(NOSE_BASE));
        assert!(mean_y(NOSE_BASE) < mean_y(OUTER_LIPS));
        // Chin is the lowest jaw point.
        let chin = points[8];
        assert!(points[JAW].iter().all(|p| p.y <= chin.y + 1e-3));
    }

    #[test]
    fn eyes_are_mirrored() {
        let face = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let points = synthesize_landmarks(&face);
        for k in 0..6 {
            let left = points[LEFT_EYE.start + k];
            let right = points[RIGHT_EYE.start + k];
            assert!((left.y - right.y).abs() < 1e-4);
            assert!((right.x - left.x - 36.0).abs() < 1e-3);
        }
    }

    #[test]
    fn enclosing_box_pads_all_sides() {
        let points = [Point::new(10.0, 20.0), Point::new(30.0, 5.0)];
        let bbox = BoundingBox::enclosing(&points, 2.0).unwrap();
        assert_eq!(bbox, BoundingBox::new(8.0, 3.0, 24.0, 19.0));
        assert!(BoundingBox::enclosing(&[], 1.0).is_none());
    }
}
