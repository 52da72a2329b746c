use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyPart {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
}

impl BodyPart {
    pub const ALL: [BodyPart; 9] = [
        BodyPart::Nose,
        BodyPart::LeftShoulder,
        BodyPart::RightShoulder,
        BodyPart::LeftElbow,
        BodyPart::RightElbow,
        BodyPart::LeftWrist,
        BodyPart::RightWrist,
        BodyPart::LeftHip,
        BodyPart::RightHip,
    ];

    pub fn key(self) -> &'static str {
        match self {
            BodyPart::Nose => "nose",
            BodyPart::LeftShoulder => "leftShoulder",
            BodyPart::RightShoulder => "rightShoulder",
            BodyPart::LeftElbow => "leftElbow",
            BodyPart::RightElbow => "rightElbow",
            BodyPart::LeftWrist => "leftWrist",
            BodyPart::RightWrist => "rightWrist",
            BodyPart::LeftHip => "leftHip",
            BodyPart::RightHip => "rightHip",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        BodyPart::ALL.into_iter().find(|part| part.key() == key)
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Bones drawn between landmarks on the ghost overlay.
pub const SKELETON_SEGMENTS: &[(BodyPart, BodyPart)] = &[
    (BodyPart::LeftShoulder, BodyPart::RightShoulder),
    (BodyPart::LeftShoulder, BodyPart::LeftElbow),
    (BodyPart::LeftElbow, BodyPart::LeftWrist),
    (BodyPart::RightShoulder, BodyPart::RightElbow),
    (BodyPart::RightElbow, BodyPart::RightWrist),
    (BodyPart::LeftShoulder, BodyPart::LeftHip),
    (BodyPart::RightShoulder, BodyPart::RightHip),
    (BodyPart::LeftHip, BodyPart::RightHip),
];

/// Point in a 0..=100 coordinate space relative to the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let x = obj.get("x").and_then(Value::as_f64)?;
        let y = obj.get("y").and_then(Value::as_f64)?;
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(x) || !in_range(y) {
            return None;
        }
        Some(Self {
            x: x as f32,
            y: y as f32,
        })
    }

    /// Maps the normalized point to pixel coordinates for a `width x height` image.
    pub fn to_pixels(self, width: u32, height: u32) -> (f32, f32) {
        (
            self.x / 100.0 * width.saturating_sub(1) as f32,
            self.y / 100.0 * height.saturating_sub(1) as f32,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseLandmarks {
    points: BTreeMap<BodyPart, Point>,
}

impl PoseLandmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_point(mut self, part: BodyPart, x: f32, y: f32) -> Self {
        self.points.insert(part, Point { x, y });
        self
    }

    pub fn get(&self, part: BodyPart) -> Option<Point> {
        self.points.get(&part).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyPart, Point)> + '_ {
        self.points.iter().map(|(part, point)| (*part, *point))
    }

    /// Segments whose endpoints are both present.
    pub fn segments(&self) -> Vec<(Point, Point)> {
        SKELETON_SEGMENTS
            .iter()
            .filter_map(|(a, b)| Some((self.get(*a)?, self.get(*b)?)))
            .collect()
    }

    /// Parses a landmark map. Unknown keys and unusable points are skipped;
    /// `None` means no usable point was found.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut points = BTreeMap::new();
        for (key, raw) in obj {
            let Some(part) = BodyPart::from_key(key) else {
                continue;
            };
            if let Some(point) = Point::from_value(raw) {
                points.insert(part, point);
            }
        }
        if points.is_empty() {
            return None;
        }
        Some(Self { points })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{BodyPart, PoseLandmarks};

    #[test]
    fn landmarks_skip_unknown_and_out_of_range_points() {
        let parsed = PoseLandmarks::from_value(&json!({
            "nose": {"x": 50, "y": 12.5},
            "leftShoulder": {"x": 40, "y": 30},
            "rightShoulder": {"x": 140, "y": 30},
            "leftWrist": null,
            "tail": {"x": 1, "y": 1},
        }))
        .unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get(BodyPart::Nose).map(|p| p.y), Some(12.5));
        assert!(parsed.get(BodyPart::RightShoulder).is_none());
    }

    #[test]
    fn landmarks_without_usable_points_are_absent() {
        assert!(PoseLandmarks::from_value(&json!({})).is_none());
        assert!(PoseLandmarks::from_value(&json!({"nose": {"x": "a", "y": 2}})).is_none());
        assert!(PoseLandmarks::from_value(&json!(null)).is_none());
    }

    #[test]
    fn segments_require_both_endpoints() {
        let landmarks = PoseLandmarks::new()
            .with_point(BodyPart::LeftShoulder, 40.0, 30.0)
            .with_point(BodyPart::RightShoulder, 60.0, 30.0)
            .with_point(BodyPart::LeftElbow, 35.0, 45.0);
        assert_eq!(landmarks.segments().len(), 2);
    }

    #[test]
    fn landmarks_serialize_with_camel_case_keys() {
        let landmarks = PoseLandmarks::new().with_point(BodyPart::LeftHip, 45.0, 60.0);
        let value = serde_json::to_value(&landmarks).unwrap();
        assert_eq!(value, json!({"leftHip": {"x": 45.0, "y": 60.0}}));
        assert_eq!(PoseLandmarks::from_value(&value), Some(landmarks));
    }

    #[test]
    fn point_maps_to_pixel_space() {
        let landmarks = PoseLandmarks::new().with_point(BodyPart::Nose, 50.0, 100.0);
        let point = landmarks.get(BodyPart::Nose).unwrap();
        assert_eq!(point.to_pixels(101, 201), (50.0, 200.0));
    }
}
