//! Loading of hand-annotated ground truth.
//!
//! Annotation files are JSON arrays with one record per image:
//!
//! ```json
//! [
//!   {
//!     "image": "frame1.jpg",
//!     "landmarks": [[{"x": "0.41", "y": "0.62"}, ...], [{"x": "0.58", "y": "0.60"}, ...]],
//!     "extra_points": {}
//!   }
//! ]
//! ```
//!
//! The first landmark group is the left hand, the second one the right hand.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use itertools::Itertools;
use serde::Deserialize;

use crate::landmark::{HandLandmarks, HandPair};

/// Ground truth for a single image.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawAnnotation")]
pub struct Annotation {
    image: String,
    hands: HandPair<HandLandmarks>,
    extra_points: serde_json::Value,
}

#[derive(Deserialize)]
struct RawAnnotation {
    image: String,
    landmarks: Vec<HandLandmarks>,
    #[serde(default)]
    extra_points: serde_json::Value,
}

impl TryFrom<RawAnnotation> for Annotation {
    type Error = anyhow::Error;

    fn try_from(raw: RawAnnotation) -> anyhow::Result<Self> {
        let count = raw.landmarks.len();
        let Some((left, right)) = raw.landmarks.into_iter().collect_tuple() else {
            bail!(
                "annotation for '{}' has {count} hands, expected 2 (left and right)",
                raw.image
            );
        };
        Ok(Self {
            image: raw.image,
            hands: HandPair::new(left, right),
            extra_points: raw.extra_points,
        })
    }
}

impl Annotation {
    pub fn new(image: impl Into<String>, left: HandLandmarks, right: HandLandmarks) -> Self {
        Self {
            image: image.into(),
            hands: HandPair::new(left, right),
            extra_points: serde_json::Value::Null,
        }
    }

    /// File name of the annotated image, relative to the image directory.
    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn hands(&self) -> &HandPair<HandLandmarks> {
        &self.hands
    }

    /// Additional annotated points. Their structure depends on the annotation tool and is not
    /// interpreted.
    pub fn extra_points(&self) -> &serde_json::Value {
        &self.extra_points
    }

    /// Rotates the annotated landmarks of both hands by 90° counter-clockwise.
    ///
    /// Hands keep their left/right assignment.
    pub fn rotate_90_ccw(&self) -> Self {
        Self {
            image: self.image.clone(),
            hands: self.hands.as_ref().map(HandLandmarks::rotate_90_ccw),
            extra_points: self.extra_points.clone(),
        }
    }
}

/// Loads all annotations from a single JSON file.
pub fn load_file(path: &Path) -> anyhow::Result<Vec<Annotation>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read annotations from '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("invalid annotation file '{}'", path.display()))
}

/// Returns the paths of all `.json` files in `dir`, sorted by file name.
pub fn annotation_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read annotation directory '{}'", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "json") && entry.file_type()?.is_file() {
            paths.push(path);
        } else {
            log::warn!("skipping non-annotation file {}", path.display());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Loads the annotations of all `.json` files in `dir`, in file name order.
pub fn load_dir(dir: &Path) -> anyhow::Result<Vec<Annotation>> {
    let mut annotations = Vec::new();
    for path in annotation_files(dir)? {
        let file = load_file(&path)?;
        log::debug!("{}: {} annotated images", path.display(), file.len());
        annotations.extend(file);
    }
    Ok(annotations)
}
