//! Named facial zones derived from the landmark set.

use std::fmt;

use serde::{Deserialize, Serialize};
use tryon_utils::Point;

use super::landmarks::{
    BROWS, BoundingBox, INNER_LIPS, LANDMARK_COUNT, LEFT_BROW, NOSE_BASE, NOSE_BRIDGE, OUTER_LIPS,
    RIGHT_BROW,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneName {
    Forehead,
    LeftCheek,
    RightCheek,
    NoseBridge,
    NoseBase,
    LipsOuter,
    LipsInner,
    Skin,
}

impl ZoneName {
    pub const ALL: [ZoneName; 8] = [
        ZoneName::Forehead,
        ZoneName::LeftCheek,
        ZoneName::RightCheek,
        ZoneName::NoseBridge,
        ZoneName::NoseBase,
        ZoneName::LipsOuter,
        ZoneName::LipsInner,
        ZoneName::Skin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ZoneName::Forehead => "forehead",
            ZoneName::LeftCheek => "left_cheek",
            ZoneName::RightCheek => "right_cheek",
            ZoneName::NoseBridge => "nose_bridge",
            ZoneName::NoseBase => "nose_base",
            ZoneName::LipsOuter => "lips_outer",
            ZoneName::LipsInner => "lips_inner",
            ZoneName::Skin => "skin",
        }
    }

    /// Scale applied to the detection confidence for this zone.
    pub fn confidence_factor(self) -> f32 {
        match self {
            ZoneName::Forehead => 0.90,
            ZoneName::LeftCheek | ZoneName::RightCheek => 0.95,
            ZoneName::NoseBridge => 0.92,
            ZoneName::NoseBase => 0.90,
            ZoneName::LipsOuter => 0.93,
            ZoneName::LipsInner => 0.85,
            ZoneName::Skin => 1.0,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ZoneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spatial extent of a zone: a box or a circle around the zone center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneExtent {
    Bounds(BoundingBox),
    Radius(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceZone {
    pub name: ZoneName,
    pub center: Point,
    pub extent: ZoneExtent,
    /// Indices into the 68-point landmark list.
    pub landmarks: Vec<usize>,
    pub confidence: f32,
}

impl FaceZone {
    /// Box covering the zone regardless of extent kind.
    pub fn bounds(&self) -> BoundingBox {
        match self.extent {
            ZoneExtent::Bounds(bounds) => bounds,
            ZoneExtent::Radius(radius) => BoundingBox::new(
                self.center.x - radius,
                self.center.y - radius,
                radius * 2.0,
                radius * 2.0,
            ),
        }
    }
}

fn pick(landmarks: &[Point], indices: &[usize]) -> Vec<Point> {
    indices.iter().map(|&i| landmarks[i]).collect()
}

fn bounded_zone(
    name: ZoneName,
    landmarks: &[Point],
    indices: Vec<usize>,
    pad: f32,
    confidence: f32,
) -> FaceZone {
    let bounds = BoundingBox::enclosing(&pick(landmarks, &indices), pad).unwrap_or_default();
    FaceZone {
        name,
        center: bounds.center(),
        extent: ZoneExtent::Bounds(bounds),
        landmarks: indices,
        confidence,
    }
}

/// Derive every zone from a face box and its landmarks.
///
/// Returns an empty list when `landmarks` is not a full 68-point set.
pub fn derive_zones(face: &BoundingBox, landmarks: &[Point], confidence: f32) -> Vec<FaceZone> {
    if landmarks.len() != LANDMARK_COUNT {
        return Vec::new();
    }
    let score = |name: ZoneName| (confidence * name.confidence_factor()).clamp(0.0, 1.0);
    let w = face.width;
    let h = face.height;

    // Forehead spans brow to brow, from near the top of the box down to just
    // above the brow arch.
    let brow_top = landmarks[BROWS]
        .iter()
        .map(|p| p.y)
        .fold(f32::INFINITY, f32::min);
    let forehead_left = landmarks[LEFT_BROW.start].x;
    let forehead_right = landmarks[RIGHT_BROW.end - 1].x;
    let forehead_top = face.y + 0.06 * h;
    let forehead = BoundingBox::new(
        forehead_left,
        forehead_top,
        forehead_right - forehead_left,
        (brow_top - 0.02 * h - forehead_top).max(1.0),
    );

    let cheek_radius = 0.14 * w;
    let left_cheek_center = landmarks[41].midpoint(landmarks[3]);
    let right_cheek_center = landmarks[46].midpoint(landmarks[13]);

    let skin_indices: Vec<usize> = (0..BROWS.end).collect();

    vec![
        FaceZone {
            name: ZoneName::Forehead,
            center: forehead.center(),
            extent: ZoneExtent::Bounds(forehead),
            landmarks: BROWS.collect(),
            confidence: score(ZoneName::Forehead),
        },
        FaceZone {
            name: ZoneName::LeftCheek,
            center: left_cheek_center,
            extent: ZoneExtent::Radius(cheek_radius),
            landmarks: vec![1, 2, 3, 4, 31, 36, 41, 48],
            confidence: score(ZoneName::LeftCheek),
        },
        FaceZone {
            name: ZoneName::RightCheek,
            center: right_cheek_center,
            extent: ZoneExtent::Radius(cheek_radius),
            landmarks: vec![12, 13, 14, 15, 35, 45, 46, 54],
            confidence: score(ZoneName::RightCheek),
        },
        bounded_zone(
            ZoneName::NoseBridge,
            landmarks,
            NOSE_BRIDGE.collect(),
            0.05 * w,
            score(ZoneName::NoseBridge),
        ),
        bounded_zone(
            ZoneName::NoseBase,
            landmarks,
            NOSE_BASE.collect(),
            0.03 * w,
            score(ZoneName::NoseBase),
        ),
        bounded_zone(
            ZoneName::LipsOuter,
            landmarks,
            OUTER_LIPS.collect(),
            0.0,
            score(ZoneName::LipsOuter),
        ),
        bounded_zone(
            ZoneName::LipsInner,
            landmarks,
            INNER_LIPS.collect(),
            0.0,
            score(ZoneName::LipsInner),
        ),
        FaceZone {
            name: ZoneName::Skin,
            center: face.center(),
            extent: ZoneExtent::Bounds(*face),
            landmarks: skin_indices,
            confidence: score(ZoneName::Skin),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::landmarks::synthesize_landmarks;

    fn zones() -> Vec<FaceZone> {
        let face = BoundingBox::new(0.0, 0.0, 200.0, 200.0);
        derive_zones(&face, &synthesize_landmarks(&face), 0.8)
    }

    #[test]
    fn every_zone_is_present_once() {
        let zones = zones();
        assert_eq!(zones.len(), ZoneName::ALL.len());
        for (zone, name) in zones.iter().zip(ZoneName::ALL) {
            assert_eq!(zone.name, name);
            assert_eq!(name.index(), ZoneName::ALL.iter().position(|n| *n == name).unwrap());
        }
    }

    #[test]
    fn zone_confidence_is_scaled_and_bounded() {
        for zone in zones() {
            let expected = 0.8 * zone.name.confidence_factor();
            assert!((zone.confidence - expected).abs() < 1e-6, "{}", zone.name);
        }
        let face = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let saturated = derive_zones(&face, &synthesize_landmarks(&face), 3.0);
        assert!(saturated.iter().all(|z| z.confidence <= 1.0));
    }

    #[test]
    fn forehead_sits_above_the_brows() {
        let face = BoundingBox::new(0.0, 0.0, 200.0, 200.0);
        let landmarks = synthesize_landmarks(&face);
        let zones = derive_zones(&face, &landmarks, 0.9);
        let forehead = zones[0].bounds();
        let brow_top = landmarks[BROWS].iter().map(|p| p.y).fold(f32::MAX, f32::min);
        assert!(forehead.bottom() < brow_top);
        assert!(forehead.y >= face.y);
    }

    #[test]
    fn cheeks_are_circles_below_the_eyes() {
        let zones = zones();
        for zone in &zones[1..3] {
            assert!(matches!(zone.extent, ZoneExtent::Radius(r) if r > 0.0));
            assert!(zone.center.y > 80.0, "{} too high", zone.name);
        }
    }

    #[test]
    fn partial_landmarks_yield_no_zones() {
        let face = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(derive_zones(&face, &[Point::default(); 5], 0.9).is_empty());
    }
}
