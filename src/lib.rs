// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

//! Fixed-point multi-scale cascade object detector.
//!
//! A [`Detector`] builds an image pyramid with hardware-friendly resize
//! ratios, asks a [`RoiGenerator`] which regions to look at, slides every
//! loaded [`Classifier`] over them and merges the overlapping responses.
//! Scores and geometry are integers with explicit fractional bits up to the
//! point where results are handed out.

mod common;
mod error;

pub mod classifier;
pub mod config;
pub mod detector;
pub mod feat;
pub mod math;
pub mod model;
pub mod pyramid;
pub mod roi;

pub use crate::classifier::{Classifier, LabCascade, Score};
pub use crate::common::{ImageData, Rect};
pub use crate::config::{
    DetectorConfig, MergeConfig, PyramidConfig, PyramidKind, ScanConfig, DEFAULT_CONF_THRESHOLD,
};
pub use crate::detector::{flatten, DetResponse, Detection, Detector, ScanMode};
pub use crate::error::{Error, Result};
pub use crate::model::{load_model, read_model, ModelSet};
pub use crate::roi::{GridRoiGenerator, RoiGenerator, RoiOptions, SeededRoiGenerator};

use std::path::Path;

/// Create a detector with the default configuration and one model per file.
pub fn create_detector<P: AsRef<Path>>(model_paths: &[P]) -> Result<Detector> {
    let mut detector = Detector::new(DetectorConfig::default())?;
    detector.init_from_paths(model_paths)?;
    Ok(detector)
}

/// Create a detector with the default configuration around prepared models.
pub fn create_detector_with_models(models: ModelSet) -> Result<Detector> {
    Ok(Detector::new(DetectorConfig::default())?.with_models(models))
}
