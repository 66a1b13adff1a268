//! Dataset evaluation driver.
//!
//! Runs every annotated image of a dataset through both pipelines and the detector, merges the
//! results and scores them, producing an [`EvaluationReport`].

use std::{fs, path::Path};

use anyhow::Context;
use serde::Serialize;

use crate::config::Dataset;
use crate::detection::Recognizer;
use crate::ground_truth::{self, Annotation};
use crate::landmark::HandPair;
use crate::merge::LandmarkMerger;
use crate::pck::{BoundType, PckCalculator, PckScores};
use crate::pipeline::{Pipeline, Rotated};

/// The PCK score of a single image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageScore {
    pub image: String,
    /// Number of hands in the merged result.
    pub hands_found: usize,
    pub pck: HandPair<f32>,
}

/// Result of a full evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub threshold: f32,
    pub upper_bound: Option<f32>,
    pub lower_bound: Option<f32>,
    /// Average PCK over all images and both hands.
    pub final_pck: f32,
    pub images: Vec<ImageScore>,
}

impl EvaluationReport {
    /// Writes the report to `path` as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write report to '{}'", path.display()))
    }
}

/// Evaluates the two-pipeline landmark detection setup on a dataset.
pub struct Evaluation {
    calculator: PckCalculator,
    recognizer: Box<dyn Recognizer>,
    first: Box<dyn Pipeline>,
    second: Box<dyn Pipeline>,
    rotation: Option<Rotated>,
}

impl Evaluation {
    pub fn new<R, P1, P2>(calculator: PckCalculator, recognizer: R, first: P1, second: P2) -> Self
    where
        R: Recognizer + 'static,
        P1: Pipeline + 'static,
        P2: Pipeline + 'static,
    {
        Self {
            calculator,
            recognizer: Box::new(recognizer),
            first: Box::new(first),
            second: Box::new(second),
            rotation: None,
        }
    }

    /// Rotates images and annotations by 90° counter-clockwise before running the pipelines.
    ///
    /// The rotated images are written by `rotation`.
    pub fn with_rotation(self, rotation: Rotated) -> Self {
        Self {
            rotation: Some(rotation),
            ..self
        }
    }

    pub fn calculator(&self) -> &PckCalculator {
        &self.calculator
    }

    /// Computes the reference bounds: the upper bound on `rgb`, the lower bound on `ir`.
    ///
    /// Both run the detector directly on the dataset images, without transformation.
    pub fn compute_bounds(&mut self, rgb: &Dataset, ir: &Dataset) -> anyhow::Result<()> {
        for (dataset, bound_type) in [(rgb, BoundType::Upper), (ir, BoundType::Lower)] {
            self.calculator
                .calculate_pck_bound(
                    &mut *self.recognizer,
                    &dataset.images,
                    &dataset.annotations,
                    bound_type,
                )
                .with_context(|| format!("failed to compute {bound_type} bound"))?;
        }
        Ok(())
    }

    /// Scores a single annotated image located in `image_dir`.
    pub fn evaluate_image(
        &mut self,
        image_dir: &Path,
        annotation: &Annotation,
    ) -> anyhow::Result<ImageScore> {
        let mut image = image_dir.join(annotation.image());
        let name = annotation.image().to_string();

        let rotated;
        let annotation = match &mut self.rotation {
            Some(rotation) => {
                image = rotation.apply(&image, &name)?;
                rotated = annotation.rotate_90_ccw();
                &rotated
            }
            None => annotation,
        };

        let first_image = self
            .first
            .apply(&image, &name)
            .with_context(|| format!("pipeline '{}' failed", self.first.name()))?;
        let second_image = self
            .second
            .apply(&image, &name)
            .with_context(|| format!("pipeline '{}' failed", self.second.name()))?;

        let first = self.recognizer.recognize(&first_image)?;
        let second = self.recognizer.recognize(&second_image)?;
        log::trace!(
            "{}: {} hands in {}, {} hands in {}",
            annotation.image(),
            first.len(),
            self.first.name(),
            second.len(),
            self.second.name(),
        );

        let merged = LandmarkMerger::new(&first, &second).merge_landmarks();
        if merged.is_empty() {
            log::debug!("{}: no hands found", annotation.image());
        }
        let pck = self
            .calculator
            .calculate_pck(annotation.hands(), merged.final_landmarks());
        log::debug!(
            "{}: PCK left={:.3} right={:.3}",
            annotation.image(),
            pck.left,
            pck.right
        );

        Ok(ImageScore {
            image: annotation.image().to_string(),
            hands_found: merged.len(),
            pck,
        })
    }

    /// Evaluates all annotated images of `dataset`.
    ///
    /// Bounds computed earlier via [`Evaluation::compute_bounds`] are included in the report.
    pub fn evaluate(&mut self, dataset: &Dataset) -> anyhow::Result<EvaluationReport> {
        let annotations = ground_truth::load_dir(&dataset.annotations)?;
        log::info!(
            "evaluating {} images from {}",
            annotations.len(),
            dataset.images.display()
        );

        let mut scores = PckScores::default();
        let mut images = Vec::with_capacity(annotations.len());
        for annotation in &annotations {
            let score = self
                .evaluate_image(&dataset.images, annotation)
                .with_context(|| format!("failed to evaluate '{}'", annotation.image()))?;
            scores.push(score.pck);
            images.push(score);
        }

        let final_pck = PckCalculator::calculate_final_pck(&scores);
        log::info!("final PCK: {final_pck:.4}");
        Ok(EvaluationReport {
            threshold: self.calculator.threshold(),
            upper_bound: self.calculator.upper_bound(),
            lower_bound: self.calculator.lower_bound(),
            final_pck,
            images,
        })
    }
}
