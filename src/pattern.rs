//! Finger up/down encoding of a single hand.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

use crate::hand::{GestureError, HandObservation, landmarks};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// (tip, joint) landmark indices.
    ///
    /// The thumb is judged vertically like the other digits, which misreads a
    /// sideways-extended thumb.
    fn landmarks(self) -> (usize, usize) {
        match self {
            Finger::Thumb => (landmarks::THUMB_TIP, landmarks::THUMB_IP),
            Finger::Index => (landmarks::INDEX_TIP, landmarks::INDEX_PIP),
            Finger::Middle => (landmarks::MIDDLE_TIP, landmarks::MIDDLE_PIP),
            Finger::Ring => (landmarks::RING_TIP, landmarks::RING_PIP),
            Finger::Pinky => (landmarks::PINKY_TIP, landmarks::PINKY_PIP),
        }
    }
}

/// Five extended/retracted flags packed into the low bits, thumb first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FingerPattern(u8);

impl FingerPattern {
    pub const ALL_UP: FingerPattern = FingerPattern(0b1_1111);
    pub const ALL_DOWN: FingerPattern = FingerPattern(0);

    pub fn from_fingers(up: [bool; 5]) -> Self {
        let mut mask = 0u8;
        for (finger, is_up) in Finger::ALL.iter().zip(up) {
            if is_up {
                mask |= finger.bit();
            }
        }
        Self(mask)
    }

    pub fn is_up(self, finger: Finger) -> bool {
        self.0 & finger.bit() != 0
    }

    pub fn fingers(self) -> [bool; 5] {
        Finger::ALL.map(|f| self.is_up(f))
    }
}

/// Classify each finger as extended iff its tip sits strictly above its joint.
pub fn encode(hand: &HandObservation) -> Result<FingerPattern, GestureError> {
    hand.validate()?;
    let up = Finger::ALL.map(|f| {
        let (tip, joint) = f.landmarks();
        hand.point(tip).y < hand.point(joint).y
    });
    Ok(FingerPattern::from_fingers(up))
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid finger pattern '{0}': expected 5 characters of '0'/'1'")]
pub struct PatternParseError(pub String);

impl FromStr for FingerPattern {
    type Err = PatternParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 5 {
            return Err(PatternParseError(s.to_string()));
        }
        let mut up = [false; 5];
        for (slot, ch) in up.iter_mut().zip(s.chars()) {
            *slot = match ch {
                '1' => true,
                '0' => false,
                _ => return Err(PatternParseError(s.to_string())),
            };
        }
        Ok(Self::from_fingers(up))
    }
}

impl TryFrom<String> for FingerPattern {
    type Error = PatternParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FingerPattern> for String {
    fn from(p: FingerPattern) -> Self {
        p.to_string()
    }
}

impl fmt::Display for FingerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for up in self.fingers() {
            f.write_str(if up { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::hand::{HandLabel, Landmark};

    /// Build a hand whose fingers are extended per `pattern`; the index tip
    /// sits at `pointer` so cursor code has something to follow.
    pub(crate) fn hand_with(label: HandLabel, pattern: &str, pointer: (f32, f32)) -> HandObservation {
        let pattern: FingerPattern = pattern.parse().unwrap();
        let mut pts = vec![Landmark::new(0.5, 0.5); 21];
        for finger in Finger::ALL {
            let (tip, joint) = finger.landmarks();
            pts[joint] = Landmark::new(0.5, 0.5);
            pts[tip] = if pattern.is_up(finger) {
                Landmark::new(0.5, 0.4)
            } else {
                Landmark::new(0.5, 0.6)
            };
        }
        pts[landmarks::INDEX_TIP].x = pointer.0;
        pts[landmarks::INDEX_TIP].y = if pattern.is_up(Finger::Index) {
            pointer.1.min(0.49)
        } else {
            pointer.1.max(0.51)
        };
        // keep thumb and middle tips apart unless a test pinches them
        pts[landmarks::THUMB_TIP].x = 0.1;
        pts[landmarks::MIDDLE_TIP].x = 0.9;
        HandObservation::new(label, pts)
    }

    #[test]
    fn parse_and_display_agree() {
        let p: FingerPattern = "01000".parse().unwrap();
        assert!(p.is_up(Finger::Index));
        assert!(!p.is_up(Finger::Thumb));
        assert_eq!(p.to_string(), "01000");
        assert_eq!("11111".parse::<FingerPattern>().unwrap(), FingerPattern::ALL_UP);
        assert_eq!("00000".parse::<FingerPattern>().unwrap(), FingerPattern::ALL_DOWN);
    }

    #[test]
    fn rejects_bad_patterns() {
        assert!("0100".parse::<FingerPattern>().is_err());
        assert!("01x00".parse::<FingerPattern>().is_err());
        assert!("010000".parse::<FingerPattern>().is_err());
    }

    #[test]
    fn encodes_each_finger_from_tip_and_joint() {
        for s in ["00000", "11111", "01000", "01100", "10101"] {
            let hand = hand_with(HandLabel::Right, s, (0.5, 0.3));
            assert_eq!(encode(&hand).unwrap().to_string(), s);
        }
    }

    #[test]
    fn flipping_one_pair_flips_one_bit() {
        let base = hand_with(HandLabel::Left, "01010", (0.5, 0.3));
        let before = encode(&base).unwrap();
        for finger in Finger::ALL {
            let (tip, joint) = finger.landmarks();
            let mut hand = base.clone();
            let (t, j) = (hand.landmarks[tip].y, hand.landmarks[joint].y);
            hand.landmarks[tip].y = j;
            hand.landmarks[joint].y = t;
            let after = encode(&hand).unwrap();
            for other in Finger::ALL {
                if other == finger {
                    assert_ne!(before.is_up(other), after.is_up(other));
                } else {
                    assert_eq!(before.is_up(other), after.is_up(other));
                }
            }
        }
    }

    #[test]
    fn equal_heights_count_as_retracted() {
        let mut hand = hand_with(HandLabel::Right, "11111", (0.5, 0.3));
        let (tip, joint) = Finger::Ring.landmarks();
        hand.landmarks[tip].y = hand.landmarks[joint].y;
        assert!(!encode(&hand).unwrap().is_up(Finger::Ring));
    }

    #[test]
    fn too_few_landmarks_is_an_error() {
        let hand = HandObservation::new(HandLabel::Right, vec![Landmark::default(); 5]);
        assert!(matches!(
            encode(&hand),
            Err(GestureError::InvalidObservation { count: 5, .. })
        ));
    }

    #[test]
    fn serializes_as_symbol_string() {
        let p: FingerPattern = "11000".parse().unwrap();
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"11000\"");
        let back: FingerPattern = serde_json::from_str("\"11000\"").unwrap();
        assert_eq!(back, p);
    }
}
