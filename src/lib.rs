//! Hand landmark merging and PCK evaluation.
//!
//! This crate scores hand landmark detections on infrared and RGB hand photographs. Every image is
//! run through two image transformation [pipelines][pipeline], a landmark detector is invoked on
//! both outputs, and the two results are reconciled by the [`LandmarkMerger`]. The merged
//! landmarks are then compared against hand-annotated ground truth by the [`PckCalculator`], using
//! the *Percentage of Correct Keypoints* metric.
//!
//! # Coordinates
//!
//! All landmark coordinates are normalized to the image: X is in range 0.0 to 1.0 from the left
//! edge to the right edge, Y is in range 0.0 to 1.0 from the top edge to the bottom edge (so Y
//! points *down*). The Z coordinate output by detectors is carried along, but ignored by all
//! merging and scoring logic.
//!
//! # Environment Variables
//!
//! * `RUST_LOG`: Overrides the log filter set up by [`init_logger!`], using the [env_logger]
//!   syntax.
//! * `HANDEVAL_CONFIG`: Path of the JSON configuration file read by the `handeval` binary when no
//!   `--config` argument is given. See [`Config`].
//!
//! [env_logger]: https://docs.rs/env_logger
//! [`LandmarkMerger`]: merge::LandmarkMerger
//! [`PckCalculator`]: pck::PckCalculator
//! [`Config`]: config::Config

use log::LevelFilter;

pub mod config;
pub mod detection;
pub mod evaluate;
pub mod ground_truth;
pub mod landmark;
pub mod merge;
pub mod num;
pub mod pck;
pub mod pipeline;


/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and `handeval` will log at *debug* level. Everything else only logs errors,
/// unless overridden by `RUST_LOG`.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
