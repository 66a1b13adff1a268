//! Image transformation pipelines.
//!
//! A [`Pipeline`] maps an input image file to a transformed image file that the landmark detector
//! is then run on. The expensive pipelines (colorization networks, CLAHE and inpainting) are run
//! offline; [`Prerendered`] picks up their results. Cheap transformations are implemented directly
//! on top of the `image` crate.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};

/// An image transformation producing a new image file.
pub trait Pipeline {
    /// Short name of the pipeline, used in log output.
    fn name(&self) -> &str;

    /// Transforms the image at `image` and returns the path of the transformed image.
    ///
    /// `image_name` identifies the source image (its file name, eg. `frame1.png`) and prefixes the
    /// names of the output files.
    fn apply(&mut self, image: &Path, image_name: &str) -> anyhow::Result<PathBuf>;
}

impl<P: Pipeline + ?Sized> Pipeline for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn apply(&mut self, image: &Path, image_name: &str) -> anyhow::Result<PathBuf> {
        (**self).apply(image, image_name)
    }
}

/// Looks up images that were transformed ahead of time.
///
/// The output for `image_name` is expected at `<dir>/<image_name>_<suffix>.<extension>`, where
/// `image_name` is the full file name of the source image (for example
/// `siggraph17/frame1.jpg_siggraph17.png`).
#[derive(Debug, Clone)]
pub struct Prerendered {
    name: String,
    dir: PathBuf,
    suffix: String,
    extension: String,
}

impl Prerendered {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            suffix: suffix.into(),
            extension: "png".into(),
        }
    }

    /// Sets the file extension of the prerendered images (`png` by default).
    pub fn extension(self, extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            ..self
        }
    }

    pub fn output_path(&self, image_name: &str) -> PathBuf {
        self.dir
            .join(format!("{image_name}_{}.{}", self.suffix, self.extension))
    }
}

impl Pipeline for Prerendered {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&mut self, _image: &Path, image_name: &str) -> anyhow::Result<PathBuf> {
        let path = self.output_path(image_name);
        if !path.is_file() {
            bail!(
                "{}: no prerendered image for '{image_name}' at '{}'",
                self.name,
                path.display()
            );
        }
        Ok(path)
    }
}

/// Inverts all color channels of the image.
///
/// Inverted infrared images look closer to regular photographs of skin, since warm regions are
/// rendered bright in the original.
#[derive(Debug, Clone)]
pub struct Inverted {
    out_dir: PathBuf,
}

impl Inverted {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

impl Pipeline for Inverted {
    fn name(&self) -> &str {
        "inverted"
    }

    fn apply(&mut self, image: &Path, image_name: &str) -> anyhow::Result<PathBuf> {
        let mut img = load(image)?;
        img.invert();
        save(&img, &self.out_dir.join(format!("{image_name}_inverted.png")))
    }
}

/// Rotates the image by 90° counter-clockwise.
///
/// Matches [`Annotation::rotate_90_ccw`][crate::ground_truth::Annotation::rotate_90_ccw].
#[derive(Debug, Clone)]
pub struct Rotated {
    out_dir: PathBuf,
}

impl Rotated {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

impl Pipeline for Rotated {
    fn name(&self) -> &str {
        "rotated"
    }

    fn apply(&mut self, image: &Path, image_name: &str) -> anyhow::Result<PathBuf> {
        let img = load(image)?.rotate270();
        save(&img, &self.out_dir.join(format!("{image_name}_rotated.png")))
    }
}

fn load(path: &Path) -> anyhow::Result<image::DynamicImage> {
    image::open(path).with_context(|| format!("failed to load image '{}'", path.display()))
}

fn save(img: &image::DynamicImage, path: &Path) -> anyhow::Result<PathBuf> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory '{}'", dir.display()))?;
    }
    img.save(path)
        .with_context(|| format!("failed to save image to '{}'", path.display()))?;
    log::trace!("wrote {}", path.display());
    Ok(path.to_path_buf())
}
