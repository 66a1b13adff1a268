//! Landmark detector results and the [`Recognizer`] interface.
//!
//! The detector itself (a hand landmark and gesture recognition network) is not part of this crate.
//! [`DetectionResult`] mirrors the result structure of MediaPipe's gesture recognizer, so that its
//! output can be dumped to JSON and loaded via [`PrecomputedRecognizer`].

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::landmark::HandLandmarks;

/// A classification result (gesture or handedness) of a detected hand.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Category {
    pub category_name: String,
    pub score: f32,
}

impl Category {
    pub fn new(category_name: impl Into<String>, score: f32) -> Self {
        Self {
            category_name: category_name.into(),
            score,
        }
    }
}

/// The output of a single detector invocation on an image.
///
/// All lists are indexed in parallel by the position of the detected hand. Every detected hand is
/// guaranteed to have at least one gesture category; the first one is the best match.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "RawDetectionResult")]
pub struct DetectionResult {
    hand_landmarks: Vec<HandLandmarks>,
    gestures: Vec<Vec<Category>>,
    handedness: Vec<Vec<Category>>,
}

#[derive(Deserialize)]
struct RawDetectionResult {
    hand_landmarks: Vec<HandLandmarks>,
    gestures: Vec<Vec<Category>>,
    #[serde(default)]
    handedness: Vec<Vec<Category>>,
}

impl TryFrom<RawDetectionResult> for DetectionResult {
    type Error = anyhow::Error;

    fn try_from(raw: RawDetectionResult) -> anyhow::Result<Self> {
        let hands = raw.hand_landmarks.len();
        if raw.gestures.len() != hands {
            bail!(
                "detection result has {hands} hands, but {} gesture lists",
                raw.gestures.len()
            );
        }
        if !raw.handedness.is_empty() && raw.handedness.len() != hands {
            bail!(
                "detection result has {hands} hands, but {} handedness lists",
                raw.handedness.len()
            );
        }
        if let Some(i) = raw.gestures.iter().position(|g| g.is_empty()) {
            bail!("detected hand #{i} has no gesture category");
        }

        Ok(Self {
            hand_landmarks: raw.hand_landmarks,
            gestures: raw.gestures,
            handedness: raw.handedness,
        })
    }
}

impl DetectionResult {
    /// Creates an empty result (no hands detected).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a detected hand with its best gesture category.
    pub fn push_hand(&mut self, landmarks: HandLandmarks, gesture: Category) {
        self.hand_landmarks.push(landmarks);
        self.gestures.push(vec![gesture]);
        // No handedness is known for manually added hands.
        if !self.handedness.is_empty() {
            self.handedness.push(Vec::new());
        }
    }

    /// Builder-style variant of [`DetectionResult::push_hand`].
    pub fn with_hand(mut self, landmarks: HandLandmarks, gesture: Category) -> Self {
        self.push_hand(landmarks, gesture);
        self
    }

    /// Returns the number of detected hands.
    pub fn len(&self) -> usize {
        self.hand_landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hand_landmarks.is_empty()
    }

    pub fn hand_landmarks(&self) -> &[HandLandmarks] {
        &self.hand_landmarks
    }

    /// Returns the handedness classification made by the detector, if it reported one.
    ///
    /// Either empty or one list per hand. Hands added via [`DetectionResult::push_hand`] have an
    /// empty list. The merging logic does not trust this classification.
    pub fn handedness(&self) -> &[Vec<Category>] {
        &self.handedness
    }

    /// Returns an iterator over the detected hands, paired with their best gesture.
    pub fn hands(&self) -> impl Iterator<Item = DetectedHand<'_>> + '_ {
        self.hand_landmarks
            .iter()
            .zip(&self.gestures)
            .map(|(landmarks, gestures)| DetectedHand {
                landmarks,
                gesture: &gestures[0],
            })
    }
}

/// A single hand in a [`DetectionResult`].
#[derive(Debug, Clone, Copy)]
pub struct DetectedHand<'a> {
    landmarks: &'a HandLandmarks,
    gesture: &'a Category,
}

impl<'a> DetectedHand<'a> {
    pub fn landmarks(&self) -> &'a HandLandmarks {
        self.landmarks
    }

    /// Name of the best matching gesture (eg. `Open_Palm`).
    pub fn gesture(&self) -> &'a str {
        &self.gesture.category_name
    }

    /// Score of the best matching gesture.
    pub fn score(&self) -> f32 {
        self.gesture.score
    }
}

/// Interface to an external hand landmark and gesture detector.
pub trait Recognizer {
    /// Runs the detector on the image file at `image`.
    fn recognize(&mut self, image: &Path) -> anyhow::Result<DetectionResult>;
}

impl<F> Recognizer for F
where
    F: FnMut(&Path) -> anyhow::Result<DetectionResult>,
{
    fn recognize(&mut self, image: &Path) -> anyhow::Result<DetectionResult> {
        self(image)
    }
}

/// A [`Recognizer`] that loads detector results computed ahead of time.
///
/// For an image named `frame1.png`, the results are read from `frame1.png.json` in the configured
/// directory.
#[derive(Debug, Clone)]
pub struct PrecomputedRecognizer {
    dir: PathBuf,
}

impl PrecomputedRecognizer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the path of the file holding the detector results for `image`.
    pub fn results_path(&self, image: &Path) -> anyhow::Result<PathBuf> {
        let Some(name) = image.file_name() else {
            bail!("image path '{}' has no file name", image.display());
        };
        let mut name = name.to_os_string();
        name.push(".json");
        Ok(self.dir.join(name))
    }
}

impl Recognizer for PrecomputedRecognizer {
    fn recognize(&mut self, image: &Path) -> anyhow::Result<DetectionResult> {
        let path = self.results_path(image)?;
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "failed to read detections for '{}' from '{}'",
                image.display(),
                path.display()
            )
        })?;
        let result: DetectionResult = serde_json::from_str(&json)
            .with_context(|| format!("invalid detection result in '{}'", path.display()))?;
        log::trace!("{}: {} hands detected", image.display(), result.len());
        Ok(result)
    }
}
