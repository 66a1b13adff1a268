//! Merging of landmark detections from two image pipelines.
//!
//! Each pipeline run produces its own set of detected hands. The [`LandmarkMerger`] sorts them into
//! left and right hands by their position in the image and then reconciles the (up to) two
//! candidates per hand into one landmark set, preferring hands recognized as an open palm.

use itertools::Itertools;

use crate::detection::{DetectedHand, DetectionResult};
use crate::landmark::{HandLandmarks, HandPair, Handedness, LandmarkIdx};
use crate::num::TotalF32;

/// Gesture label marking a reliable detection of a spread hand.
pub const OPEN_PALM: &str = "Open_Palm";

/// Returns whether `landmarks` most likely belong to a right hand.
///
/// The detector's own handedness classification is unreliable on transformed images, so hands are
/// classified by their position instead: a hand with more than half of its landmarks in the right
/// half of the image (`x > 0.5`) is considered a right hand.
pub fn is_right_hand(landmarks: &HandLandmarks) -> bool {
    landmarks.iter().filter(|lm| lm.x() > 0.5).count() > 10
}

/// Classifies a hand via [`is_right_hand`].
pub fn classify_handedness(landmarks: &HandLandmarks) -> Handedness {
    if is_right_hand(landmarks) {
        Handedness::Right
    } else {
        Handedness::Left
    }
}

/// Combines the detections of two pipelines into one landmark set per hand.
pub struct LandmarkMerger<'a> {
    first: HandPair<Option<DetectedHand<'a>>>,
    second: HandPair<Option<DetectedHand<'a>>>,
}

impl<'a> LandmarkMerger<'a> {
    /// Creates a merger for the detector results of the first and second pipeline.
    ///
    /// If a pipeline detected more than one hand on the same side of the image, only the last one
    /// is kept.
    pub fn new(first: &'a DetectionResult, second: &'a DetectionResult) -> Self {
        Self {
            first: Self::classify(first),
            second: Self::classify(second),
        }
    }

    fn classify(result: &'a DetectionResult) -> HandPair<Option<DetectedHand<'a>>> {
        let mut hands: HandPair<Option<DetectedHand<'a>>> = HandPair::default();
        for hand in result.hands() {
            let handedness = classify_handedness(hand.landmarks());
            let slot = hands.get_mut(handedness);
            if slot.is_some() {
                log::trace!("multiple {handedness} hands in one result, keeping the last");
            }
            *slot = Some(hand);
        }
        hands
    }

    /// Returns the candidates for `hand`, first pipeline first.
    pub fn candidates(&self, hand: Handedness) -> impl Iterator<Item = DetectedHand<'a>> {
        [*self.first.get(hand), *self.second.get(hand)]
            .into_iter()
            .flatten()
    }

    /// Computes the final landmarks of both hands.
    ///
    /// For each hand, the candidates from both pipelines are reconciled like this:
    ///
    /// - If no pipeline found the hand, it is absent from the result.
    /// - If exactly one candidate was recognized as [`OPEN_PALM`], it is used as-is.
    /// - If several candidates are open palms, they are merged landmark-by-landmark (see below).
    /// - Otherwise, the candidate with the *lowest* gesture score is used as-is.
    ///
    /// Merging open palms first discards candidates whose fingers are on the wrong side of the
    /// thumb (unless that would discard all of them). Then the thumb and wrist landmarks are taken
    /// from the candidate that extends furthest outward (leftmost for a left hand, rightmost for a
    /// right hand), and the finger landmarks from the candidate that extends furthest up. Ties go
    /// to the earlier candidate.
    pub fn merge_landmarks(&self) -> MergedHands {
        let hands = HandPair::new(
            self.merge_hand(Handedness::Left),
            self.merge_hand(Handedness::Right),
        );
        MergedHands { hands }
    }

    fn merge_hand(&self, hand: Handedness) -> Option<HandLandmarks> {
        let candidates = self.candidates(hand).collect::<Vec<_>>();
        let open_palms = candidates
            .iter()
            .filter(|c| c.gesture() == OPEN_PALM)
            .map(|c| c.landmarks())
            .collect::<Vec<_>>();

        match open_palms.len() {
            0 => {
                // FIXME: lower scores are treated as better here, which is the opposite of what
                // the detector's confidence values mean
                let best = candidates.iter().min_by_key(|c| TotalF32(c.score()))?;
                log::trace!(
                    "{hand}: no open palm among {} candidates, using {} (score {})",
                    candidates.len(),
                    best.gesture(),
                    best.score(),
                );
                Some(best.landmarks().clone())
            }
            1 => Some(open_palms[0].clone()),
            _ => merge_open_palms(&open_palms, hand),
        }
    }
}

/// Checks that landmarks of the middle, ring and pinky fingers are on the expected side of the
/// thumb MCP.
pub fn is_finger_order_plausible(landmarks: &HandLandmarks, hand: Handedness) -> bool {
    let thumb = landmarks.get(LandmarkIdx::ThumbMcp).x();
    let mut fingers = (LandmarkIdx::MiddleFingerPip as usize..=LandmarkIdx::PinkyTip as usize)
        .map(|i| landmarks[i].x());
    match hand {
        Handedness::Right => fingers.all(|x| x < thumb),
        Handedness::Left => fingers.all(|x| x > thumb),
    }
}

fn merge_open_palms(candidates: &[&HandLandmarks], hand: Handedness) -> Option<HandLandmarks> {
    let plausible = candidates
        .iter()
        .copied()
        .filter(|lm| is_finger_order_plausible(lm, hand))
        .collect_vec();
    let pool = if plausible.is_empty() {
        log::debug!(
            "{hand}: none of {} open palms has plausible finger order, merging all",
            candidates.len()
        );
        candidates
    } else {
        &plausible[..]
    };

    let (first, rest) = pool.split_first()?;
    Some(HandLandmarks::from_fn(|i| {
        rest.iter().map(|c| c[i]).fold(first[i], |best, lm| {
            let better = if i < LandmarkIdx::IndexFingerPip as usize {
                match hand {
                    Handedness::Left => lm.x() < best.x(),
                    Handedness::Right => lm.x() > best.x(),
                }
            } else {
                lm.y() < best.y()
            };
            if better {
                lm
            } else {
                best
            }
        })
    }))
}

/// The merged landmarks of an image, with at most one landmark set per hand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedHands {
    hands: HandPair<Option<HandLandmarks>>,
}

impl MergedHands {
    pub fn left(&self) -> Option<&HandLandmarks> {
        self.hands.left.as_ref()
    }

    pub fn right(&self) -> Option<&HandLandmarks> {
        self.hands.right.as_ref()
    }

    /// Returns the number of hands that were found (0 to 2).
    pub fn len(&self) -> usize {
        self.final_landmarks().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the landmark sets of all found hands, left hand first.
    ///
    /// Hands that weren't found are skipped, so this yields between 0 and 2 items.
    pub fn final_landmarks(&self) -> impl Iterator<Item = &HandLandmarks> + Clone + '_ {
        self.left().into_iter().chain(self.right())
    }
}
