//! Per-frame hand observations as handed over by the pose estimator.

use serde::Deserialize;
use thiserror::Error;

/// Landmark indices (21-point hand model).
pub mod landmarks {
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_PIP: usize = 14;
    pub const RING_TIP: usize = 16;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;

    pub const COUNT: usize = 21;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum HandLabel {
    Left,
    Right,
}

impl std::fmt::Display for HandLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandLabel::Left => f.write_str("Left"),
            HandLabel::Right => f.write_str("Right"),
        }
    }
}

/// Normalized image-space point; `z` is carried by some estimators and ignored here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    #[cfg(test)]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HandObservation {
    pub label: HandLabel,
    pub landmarks: Vec<Landmark>,
}

#[derive(Debug, Error, PartialEq)]
pub enum GestureError {
    #[error("invalid {label} hand observation: expected {expected} landmarks, got {count}")]
    InvalidObservation {
        label: HandLabel,
        count: usize,
        expected: usize,
    },
}

impl HandObservation {
    #[cfg(test)]
    pub fn new(label: HandLabel, landmarks: Vec<Landmark>) -> Self {
        Self { label, landmarks }
    }

    pub fn validate(&self) -> Result<(), GestureError> {
        if self.landmarks.len() < landmarks::COUNT {
            return Err(GestureError::InvalidObservation {
                label: self.label,
                count: self.landmarks.len(),
                expected: landmarks::COUNT,
            });
        }
        Ok(())
    }

    /// Only meaningful after `validate` succeeded.
    pub fn point(&self, idx: usize) -> Landmark {
        self.landmarks[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_observation_is_rejected() {
        let hand = HandObservation::new(HandLabel::Left, vec![Landmark::default(); 20]);
        assert_eq!(
            hand.validate(),
            Err(GestureError::InvalidObservation {
                label: HandLabel::Left,
                count: 20,
                expected: 21
            })
        );
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Landmark::new(0.0, 0.0);
        let b = Landmark::new(0.3, 0.4);
        assert!((a.distance(&b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn decodes_landmark_without_z() {
        let lm: Landmark = serde_json::from_str(r#"{"x":0.25,"y":0.5}"#).unwrap();
        assert_eq!(lm, Landmark::new(0.25, 0.5));
    }
}
