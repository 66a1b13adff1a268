//! Evaluation configuration.
//!
//! The configuration is read from a JSON file. All fields are optional; missing fields use the
//! default dataset layout:
//!
//! ```text
//! resources/
//! ├── evaluation_dataset/
//! │   ├── IR/                  infrared images
//! │   ├── IR_annotations/      ground truth for IR/
//! │   ├── RGB/                 RGB images
//! │   └── RGB_annotation/      ground truth for RGB/
//! ├── detections/              precomputed detector results (`<image file>.json`)
//! └── stylized-pictures/       pipeline outputs (`<image file>_<suffix>.png`)
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

use crate::pck::PckCalculator;
use crate::pipeline::{Inverted, Pipeline, Prerendered};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// PCK distance threshold factor.
    pub threshold: f32,
    /// The infrared dataset that is evaluated. Also used to compute the lower bound.
    pub ir: Dataset,
    /// The RGB dataset used to compute the upper bound.
    pub rgb: Dataset,
    /// Directory containing the precomputed detector results.
    pub detections: PathBuf,
    /// Whether to rotate IR images and their annotations by 90° counter-clockwise before running
    /// the pipelines.
    pub rotate: bool,
    /// Output directory for intermediate images (eg. rotated inputs).
    pub work_dir: PathBuf,
    pub first_pipeline: PipelineConfig,
    pub second_pipeline: PipelineConfig,
    /// If set, the evaluation report is written to this file as JSON.
    pub report: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: PckCalculator::DEFAULT_THRESHOLD,
            ir: Dataset {
                images: "resources/evaluation_dataset/IR".into(),
                annotations: "resources/evaluation_dataset/IR_annotations".into(),
            },
            rgb: Dataset {
                images: "resources/evaluation_dataset/RGB".into(),
                annotations: "resources/evaluation_dataset/RGB_annotation".into(),
            },
            detections: "resources/detections".into(),
            rotate: true,
            work_dir: "resources/stylized-pictures/rotated".into(),
            first_pipeline: PipelineConfig {
                kind: PipelineKind::Prerendered,
                name: "siggraph17".into(),
                dir: "resources/stylized-pictures/siggraph17".into(),
                suffix: "siggraph17".into(),
                extension: "png".into(),
            },
            second_pipeline: PipelineConfig {
                kind: PipelineKind::Prerendered,
                name: "clahe".into(),
                dir: "resources/stylized-pictures/not_detected/sharpened".into(),
                suffix: "sharpened".into(),
                extension: "png".into(),
            },
            report: None,
        }
    }
}

impl Config {
    /// Loads the configuration from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// An image directory and the directory of annotation files belonging to it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dataset {
    pub images: PathBuf,
    pub annotations: PathBuf,
}

/// How a pipeline obtains its output images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Pick up images rendered offline (see [`Prerendered`]).
    #[default]
    Prerendered,
    /// Invert the input image and write the result to `dir` (see [`Inverted`]).
    Inverted,
}

/// Configuration of one of the two pipelines.
///
/// `suffix` and `extension` only apply to [`PipelineKind::Prerendered`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub kind: PipelineKind,
    pub name: String,
    pub dir: PathBuf,
    #[serde(default)]
    pub suffix: String,
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    "png".into()
}

impl PipelineConfig {
    pub fn to_pipeline(&self) -> Box<dyn Pipeline> {
        match self.kind {
            PipelineKind::Prerendered => Box::new(
                Prerendered::new(&*self.name, &self.dir, &*self.suffix).extension(&*self.extension),
            ),
            PipelineKind::Inverted => Box::new(Inverted::new(&self.dir)),
        }
    }
}
