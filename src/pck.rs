//! Percentage of Correct Keypoints (PCK) scoring.
//!
//! A predicted landmark is counted as correct if it lies within an *acceptable distance* of its
//! ground truth position. The acceptable distance is derived from the size of the annotated hand
//! (the distance between the wrist and the tip of the middle finger), scaled by a configurable
//! threshold factor, so that the metric does not depend on how large the hand appears in the image.

use std::{fmt, path::Path, str::FromStr};

use anyhow::Context;
use itertools::Itertools;

use crate::detection::Recognizer;
use crate::ground_truth;
use crate::landmark::{HandLandmarks, HandPair, LandmarkIdx};
use crate::num;

/// Per-image PCK scores collected over a dataset.
pub type PckScores = HandPair<Vec<f32>>;

/// Which reference bound [`PckCalculator::calculate_pck_bound`] computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundType {
    /// Best-case accuracy, computed on images the detector handles well (RGB).
    Upper,
    /// Worst-case accuracy, computed on untransformed infrared images.
    Lower,
}

impl BoundType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundType::Upper => "upper",
            BoundType::Lower => "lower",
        }
    }
}

impl fmt::Display for BoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoundType {
    type Err = ParseBoundTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upper" => Ok(BoundType::Upper),
            "lower" => Ok(BoundType::Lower),
            _ => Err(ParseBoundTypeError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid [`BoundType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBoundTypeError(String);

impl fmt::Display for ParseBoundTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid bound type '{}', expected 'upper' or 'lower'",
            self.0
        )
    }
}

impl std::error::Error for ParseBoundTypeError {}

/// Computes PCK scores of predicted hand landmarks.
#[derive(Debug, Clone)]
pub struct PckCalculator {
    threshold: f32,
    upper_bound: Option<f32>,
    lower_bound: Option<f32>,
}

impl Default for PckCalculator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl PckCalculator {
    pub const DEFAULT_THRESHOLD: f32 = 0.05;

    /// Creates a new calculator using the given distance threshold factor.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            upper_bound: None,
            lower_bound: None,
        }
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Sets the distance threshold factor.
    ///
    /// The acceptable distance of a hand is its wrist-to-middle-fingertip distance multiplied by
    /// this factor.
    #[inline]
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// Returns the upper bound, if [`PckCalculator::calculate_pck_bound`] has computed one.
    pub fn upper_bound(&self) -> Option<f32> {
        self.upper_bound
    }

    /// Returns the lower bound, if [`PckCalculator::calculate_pck_bound`] has computed one.
    pub fn lower_bound(&self) -> Option<f32> {
        self.lower_bound
    }

    /// Computes the distance within which a predicted landmark is considered correct.
    pub fn calculate_acceptable_distance(&self, ground_truth_hand: &HandLandmarks) -> f32 {
        let wrist = ground_truth_hand.get(LandmarkIdx::Wrist);
        let middle_finger_tip = ground_truth_hand.get(LandmarkIdx::MiddleFingerTip);
        wrist.distance(middle_finger_tip) * self.threshold
    }

    /// Returns the fraction of `predicted_hand` landmarks that are no further than
    /// `acceptable_distance` from the corresponding ground truth landmark.
    pub fn calculate_pck_for_hand(
        ground_truth_hand: &HandLandmarks,
        predicted_hand: &HandLandmarks,
        acceptable_distance: f32,
    ) -> f32 {
        let correct = ground_truth_hand
            .iter()
            .zip(predicted_hand.iter())
            .filter(|(gt, pred)| gt.distance(pred) <= acceptable_distance)
            .count();
        correct as f32 / ground_truth_hand.len() as f32
    }

    /// Scores predicted hands against the ground truth of an image.
    ///
    /// `predicted_hands` may yield the hands in any order, since predicted hands are matched to
    /// the ground truth hands by [`PckCalculator::calculate_best_pck_combination`]. If no hands
    /// were predicted, both scores are `0.0`.
    pub fn calculate_pck<'a>(
        &self,
        ground_truth_hands: &HandPair<HandLandmarks>,
        predicted_hands: impl IntoIterator<Item = &'a HandLandmarks>,
    ) -> HandPair<f32> {
        let predicted_hands = predicted_hands.into_iter().collect_vec();
        if predicted_hands.is_empty() {
            return HandPair::new(0.0, 0.0);
        }

        self.calculate_best_pck_combination(ground_truth_hands, &predicted_hands)
    }

    /// Assigns predicted hands to the ground truth hands so that the total score is maximized.
    ///
    /// Only the first two predicted hands are considered.
    ///
    /// - A single predicted hand is assigned to the ground truth hand it scores higher against. On
    ///   a tie, it is assigned to the right hand. The other hand's score is `0.0`.
    /// - With two predicted hands, both possible assignments are tried and the one with the higher
    ///   sum is kept. On a tie, the first predicted hand is assigned to the right hand and the
    ///   second one to the left hand.
    pub fn calculate_best_pck_combination(
        &self,
        ground_truth_hands: &HandPair<HandLandmarks>,
        predicted_hands: &[&HandLandmarks],
    ) -> HandPair<f32> {
        let mut pck = HandPair::new(0.0, 0.0);
        let Some(&first) = predicted_hands.first() else {
            return pck;
        };
        if predicted_hands.len() > 2 {
            log::debug!(
                "{} hands predicted, ignoring all but the first two",
                predicted_hands.len()
            );
        }

        let gt = ground_truth_hands;
        let acceptable = gt
            .as_ref()
            .map(|hand| self.calculate_acceptable_distance(hand));
        let score = |hand: &HandLandmarks| {
            HandPair::new(
                Self::calculate_pck_for_hand(&gt.left, hand, acceptable.left),
                Self::calculate_pck_for_hand(&gt.right, hand, acceptable.right),
            )
        };

        let first = score(first);
        let Some(&second) = predicted_hands.get(1) else {
            if first.left > first.right {
                pck.left = first.left;
            } else {
                pck.right = first.right;
            }
            return pck;
        };

        let second = score(second);
        if first.left + second.right > first.right + second.left {
            pck.left = first.left;
            pck.right = second.right;
        } else {
            pck.left = second.left;
            pck.right = first.right;
        }
        pck
    }

    /// Averages all collected scores of both hands.
    ///
    /// Returns `0.0` if no scores were collected.
    pub fn calculate_final_pck(scores: &PckScores) -> f32 {
        num::mean(scores.left.iter().chain(&scores.right).copied()).unwrap_or(0.0)
    }

    /// Computes a reference bound by running `recognizer` directly on a dataset.
    ///
    /// For every annotated image in the `.json` files of `ground_truth_directory`, the image is
    /// loaded from `image_directory`, the detector output is scored against the annotation, and
    /// the average over all images is stored as the upper or lower bound (depending on
    /// `bound_type`) and returned.
    pub fn calculate_pck_bound(
        &mut self,
        recognizer: &mut dyn Recognizer,
        image_directory: &Path,
        ground_truth_directory: &Path,
        bound_type: BoundType,
    ) -> anyhow::Result<f32> {
        let mut scores = PckScores::default();
        for path in ground_truth::annotation_files(ground_truth_directory)? {
            for annotation in ground_truth::load_file(&path)? {
                let image_path = image_directory.join(annotation.image());
                let result = recognizer
                    .recognize(&image_path)
                    .with_context(|| format!("detection failed on '{}'", image_path.display()))?;
                let pck = self.calculate_pck(annotation.hands(), result.hand_landmarks());
                log::trace!("{bound_type} bound: {}: {pck:?}", annotation.image());
                scores.push(pck);
            }
        }

        let final_pck = Self::calculate_final_pck(&scores);
        log::info!(
            "{bound_type} bound: PCK {final_pck:.4} over {} images",
            scores.left.len()
        );
        match bound_type {
            BoundType::Upper => self.upper_bound = Some(final_pck),
            BoundType::Lower => self.lower_bound = Some(final_pck),
        }
        Ok(final_pck)
    }
}
