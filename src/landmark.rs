//! Hand landmark types shared by ground truth, detector output and merged results.

use std::{fmt, ops::Index};

use anyhow::bail;
use nalgebra::Point2;
use serde::{de, Deserialize, Deserializer, Serialize};

/// Number of landmarks making up a [`HandLandmarks`] set.
pub const NUM_LANDMARKS: usize = 21;

/// A single landmark position in normalized image coordinates.
///
/// Deserializes from a JSON object with `x`, `y` and an optional `z` field. Coordinates may be
/// given as numbers or as strings containing a number (annotation tools tend to emit the latter).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Landmark {
    #[serde(deserialize_with = "coordinate")]
    x: f32,
    #[serde(deserialize_with = "coordinate")]
    y: f32,
    #[serde(default, deserialize_with = "coordinate")]
    z: f32,
}

impl Landmark {
    /// Creates a 2D landmark (Z is set to `0.0`).
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn with_z(self, z: f32) -> Self {
        Self { z, ..self }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.z
    }

    /// Returns the position projected onto the image plane.
    #[inline]
    pub fn point(&self) -> Point2<f32> {
        Point2::new(self.x, self.y)
    }

    /// Euclidean distance between two landmarks in the image plane (Z is ignored).
    pub fn distance(&self, other: &Landmark) -> f32 {
        nalgebra::distance(&self.point(), &other.point())
    }

    /// Rotates the landmark by 90° counter-clockwise around the center of the image.
    ///
    /// Since coordinates are normalized, this maps `(x, y)` to `(y, 1 - x)`.
    pub fn rotate_90_ccw(&self) -> Self {
        Self {
            x: self.y,
            y: 1.0 - self.x,
            z: self.z,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Number(f32),
    Text(String),
}

fn coordinate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    match Coordinate::deserialize(deserializer)? {
        Coordinate::Number(v) => Ok(v),
        Coordinate::Text(s) => s
            .trim()
            .parse()
            .map_err(|e| de::Error::custom(format!("invalid coordinate '{s}': {e}"))),
    }
}

/// Names for the hand pose landmarks, in the order used by [`HandLandmarks`].
///
/// - **CMC**: Carpometacarpal joint, the lowest joint of the thumb, located near the wrist.
/// - **MCP**: Metacarpophalangeal joint, the knuckles near the palm of the hand.
/// - **PIP**: Proximal Interphalangeal joint, between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: placed on the tip of the finger, above the DIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// The 21 landmarks of a single hand.
///
/// The landmark order is fixed (see [`LandmarkIdx`]) and the merging and scoring heuristics index
/// into it directly, so a [`HandLandmarks`] can only be created with exactly [`NUM_LANDMARKS`]
/// entries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<Landmark>")]
pub struct HandLandmarks {
    landmarks: [Landmark; NUM_LANDMARKS],
}

impl HandLandmarks {
    pub fn new(landmarks: [Landmark; NUM_LANDMARKS]) -> Self {
        Self { landmarks }
    }

    /// Creates a landmark set by invoking `f` with every landmark index.
    pub fn from_fn(f: impl FnMut(usize) -> Landmark) -> Self {
        Self {
            landmarks: std::array::from_fn(f),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Landmark> + Clone + '_ {
        self.landmarks.iter()
    }

    pub fn get(&self, index: LandmarkIdx) -> &Landmark {
        &self.landmarks[index as usize]
    }

    /// Returns a copy of this landmark set with every landmark rotated by 90° counter-clockwise.
    pub fn rotate_90_ccw(&self) -> Self {
        Self::from_fn(|i| self.landmarks[i].rotate_90_ccw())
    }
}

impl Index<usize> for HandLandmarks {
    type Output = Landmark;

    fn index(&self, index: usize) -> &Landmark {
        &self.landmarks[index]
    }
}

impl TryFrom<Vec<Landmark>> for HandLandmarks {
    type Error = anyhow::Error;

    fn try_from(landmarks: Vec<Landmark>) -> anyhow::Result<Self> {
        let len = landmarks.len();
        match <[Landmark; NUM_LANDMARKS]>::try_from(landmarks) {
            Ok(landmarks) => Ok(Self { landmarks }),
            Err(_) => bail!("expected {NUM_LANDMARKS} hand landmarks, got {len}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Both hands, left first. This is the order in which hands are processed and reported.
    pub const ALL: [Handedness; 2] = [Handedness::Left, Handedness::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value stored for both the left and the right hand.
///
/// Serializes as an object with `Left` and `Right` keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HandPair<T> {
    #[serde(rename = "Left")]
    pub left: T,
    #[serde(rename = "Right")]
    pub right: T,
}

impl<T> HandPair<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn get(&self, hand: Handedness) -> &T {
        match hand {
            Handedness::Left => &self.left,
            Handedness::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, hand: Handedness) -> &mut T {
        match hand {
            Handedness::Left => &mut self.left,
            Handedness::Right => &mut self.right,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> HandPair<U> {
        HandPair {
            left: f(self.left),
            right: f(self.right),
        }
    }

    pub fn as_ref(&self) -> HandPair<&T> {
        HandPair {
            left: &self.left,
            right: &self.right,
        }
    }

    /// Iterates over both values, left first.
    pub fn iter(&self) -> impl Iterator<Item = (Handedness, &T)> + '_ {
        Handedness::ALL.into_iter().map(|hand| (hand, self.get(hand)))
    }
}

impl<T> HandPair<Vec<T>> {
    /// Appends the values of `pair` to the lists of the respective hand.
    pub fn push(&mut self, pair: HandPair<T>) {
        self.left.push(pair.left);
        self.right.push(pair.right);
    }
}

impl<T> Index<Handedness> for HandPair<T> {
    type Output = T;

    fn index(&self, hand: Handedness) -> &T {
        self.get(hand)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn parses_string_and_numeric_coordinates() {
        let lm: Landmark = serde_json::from_str(r#"{"x": "0.25", "y": 0.5}"#).unwrap();
        assert_eq!(lm, Landmark::new(0.25, 0.5));

        let lm: Landmark = serde_json::from_str(r#"{"x": 0.1, "y": 0.2, "z": -0.3}"#).unwrap();
        assert_eq!(lm.z(), -0.3);

        assert!(serde_json::from_str::<Landmark>(r#"{"x": "left", "y": 0.5}"#).is_err());
    }

    #[test]
    fn rejects_wrong_landmark_count() {
        let err = HandLandmarks::try_from(vec![Landmark::new(0.0, 0.0); 20]).unwrap_err();
        assert_eq!(err.to_string(), "expected 21 hand landmarks, got 20");

        let json = serde_json::to_string(&vec![serde_json::json!({"x": 0.0, "y": 0.0}); 21])
            .unwrap();
        let hand: HandLandmarks = serde_json::from_str(&json).unwrap();
        assert_eq!(hand.len(), NUM_LANDMARKS);
    }

    #[test]
    fn distance_ignores_z() {
        let a = Landmark::new(0.0, 0.0).with_z(5.0);
        let b = Landmark::new(0.3, 0.4);
        assert_relative_eq!(a.distance(&b), 0.5);
    }

    #[test]
    fn rotation() {
        let lm = Landmark::new(0.2, 0.3).rotate_90_ccw();
        assert_relative_eq!(lm.x(), 0.3);
        assert_relative_eq!(lm.y(), 0.8);

        // Four rotations are the identity.
        let hand = HandLandmarks::from_fn(|i| Landmark::new(i as f32 / 40.0, 0.5));
        let rotated = hand
            .rotate_90_ccw()
            .rotate_90_ccw()
            .rotate_90_ccw()
            .rotate_90_ccw();
        for (a, b) in hand.iter().zip(rotated.iter()) {
            assert_relative_eq!(a.x(), b.x(), epsilon = 1e-6);
            assert_relative_eq!(a.y(), b.y(), epsilon = 1e-6);
        }
    }

    #[test]
    fn hand_pair_indexing() {
        let mut pair = HandPair::new(1, 2);
        assert_eq!(pair[Handedness::Left], 1);
        *pair.get_mut(Handedness::Right) = 3;
        assert_eq!(
            pair.iter().collect::<Vec<_>>(),
            [(Handedness::Left, &1), (Handedness::Right, &3)]
        );
        assert_eq!(
            serde_json::to_value(pair).unwrap(),
            serde_json::json!({"Left": 1, "Right": 3})
        );
    }
}
