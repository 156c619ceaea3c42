// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

mod merge;
mod scan;

pub use self::merge::{cluster_online, contain_ratio, iou_ratio, non_maximum_suppression};
pub use self::scan::{
    level_to_source, DetResponse, LevelStats, ModelScan, ScanMode, ScanSpec, ScanStats, Scanner,
};

use std::io::Read;
use std::path::Path;

use log::{debug, info};

use crate::common::{ImageData, Rect};
use crate::config::{DetectorConfig, PyramidKind};
use crate::error::{Error, Result};
use crate::math::{self, COORD_DEC_PREC, SCORE_DEC_PREC};
use crate::model::ModelSet;
use crate::pyramid::{FixedPointPyramid, OctavePyramid, Pyramid, PyramidBuilder};
use crate::roi::{GridRoiGenerator, RoiGenerator};

/// A final detection in source image pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    bbox: Rect<f32>,
    score: f32,
}

impl Detection {
    pub fn new(bbox: Rect<f32>, score: f32) -> Self {
        Detection { bbox, score }
    }

    pub fn from_response(response: &DetResponse) -> Self {
        let rect = &response.rect;
        Detection {
            bbox: Rect::new(
                math::decode(rect.left(), COORD_DEC_PREC),
                math::decode(rect.top(), COORD_DEC_PREC),
                math::decode(rect.right(), COORD_DEC_PREC),
                math::decode(rect.bottom(), COORD_DEC_PREC),
            ),
            score: math::decode(response.conf, SCORE_DEC_PREC),
        }
    }

    #[inline]
    pub fn bbox(&self) -> &Rect<f32> {
        &self.bbox
    }

    #[inline]
    pub fn score(&self) -> f32 {
        self.score
    }

    /// `[left, top, right, bottom, confidence]`
    pub fn to_array(&self) -> [f32; 5] {
        [
            self.bbox.left(),
            self.bbox.top(),
            self.bbox.right(),
            self.bbox.bottom(),
            self.score,
        ]
    }
}

/// Flat run of five values per detection, as produced by [`Detection::to_array`].
pub fn flatten(detections: &[Detection]) -> Vec<f32> {
    detections.iter().flat_map(|d| d.to_array()).collect()
}

/// Multi-scale cascade detector.
///
/// Every `detect` call builds a pyramid, picks regions, scans them with each
/// loaded model and merges the raw responses per model.
///
/// # Examples
///
/// ```no_run
/// use fpcascade::{Detector, DetectorConfig, ImageData};
///
/// let mut detector = Detector::new(DetectorConfig::default()).unwrap();
/// detector.init_from_paths(&["/path/to/model"]).unwrap();
///
/// let (width, height) = (640, 480);
/// let pixels = vec![0u8; width * height];
/// let image = ImageData::new(&pixels, width as u32, height as u32);
/// for (model, detections) in detector.detect(&image).unwrap().iter().enumerate() {
///     for detection in detections {
///         println!("model #{}: {:?}", model, detection);
///     }
/// }
/// ```
pub struct Detector {
    config: DetectorConfig,
    models: ModelSet,
    pyramid_builder: Box<dyn PyramidBuilder>,
    roi_generator: Box<dyn RoiGenerator>,
    scanner: Scanner,
    raw: Vec<Vec<DetResponse>>,
    merged: Vec<Vec<DetResponse>>,
    stats: Vec<ScanStats>,
}

impl Detector {
    /// Detector without models; `init` or `with_models` must follow.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;

        let pyramid_builder: Box<dyn PyramidBuilder> = match config.pyramid.kind {
            PyramidKind::FixedPoint => Box::new(FixedPointPyramid::new(config.pyramid.clone())),
            PyramidKind::Octave {
                octave_num,
                sub_level_num,
            } => Box::new(OctavePyramid::new(
                config.pyramid.clone(),
                octave_num,
                sub_level_num,
            )),
        };

        Ok(Detector {
            scanner: Scanner::new(&config.scan),
            config,
            models: ModelSet::default(),
            pyramid_builder,
            roi_generator: Box::new(GridRoiGenerator::new()),
            raw: vec![],
            merged: vec![],
            stats: vec![],
        })
    }

    pub fn with_models(mut self, models: ModelSet) -> Self {
        self.models = models;
        self
    }

    /// Loads one model per source. On failure no model stays loaded.
    pub fn init<R, I>(&mut self, sources: I) -> Result<()>
    where
        R: Read,
        I: IntoIterator<Item = R>,
    {
        let loaded = ModelSet::load(sources);
        self.install(loaded)
    }

    pub fn init_from_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        let loaded = ModelSet::load_paths(paths);
        self.install(loaded)
    }

    fn install(&mut self, loaded: Result<ModelSet>) -> Result<()> {
        self.clear_results();
        match loaded {
            Ok(models) => {
                info!("detector initialized with {} models", models.len());
                self.models = models;
                Ok(())
            }
            Err(e) => {
                self.models.clear();
                Err(e)
            }
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        !self.models.is_empty()
    }

    #[inline]
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Reference window size of a loaded model.
    pub fn model_ref_size(&self, index: usize) -> Option<(u32, u32)> {
        self.models.ref_size(index)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn set_pyramid_builder(&mut self, builder: Box<dyn PyramidBuilder>) {
        self.pyramid_builder = builder;
    }

    pub fn set_roi_generator(&mut self, generator: Box<dyn RoiGenerator>) {
        self.roi_generator = generator;
    }

    pub fn roi_generator_mut(&mut self) -> &mut dyn RoiGenerator {
        self.roi_generator.as_mut()
    }

    /// Pyramid of the last `detect` call.
    pub fn pyramid(&self) -> &Pyramid {
        self.pyramid_builder.pyramid()
    }

    /// Detects objects with every loaded model; the result holds one list per
    /// model, in loading order.
    pub fn detect(&mut self, image: &ImageData<'_>) -> Result<Vec<Vec<Detection>>> {
        self.clear_results();
        if self.models.is_empty() {
            return Err(Error::NotInitialized);
        }
        image.validate()?;

        let pyramid = self.pyramid_builder.build(image)?;
        let specs = self.roi_generator.generate(pyramid);
        let scans = self.scanner.scan(pyramid, &specs, self.models.as_slice());

        let merge = &self.config.merge;
        for (index, scan) in scans.into_iter().enumerate() {
            let clustered = cluster_online(&scan.responses, merge.overlap_ratio)?;
            let kept = non_maximum_suppression(
                &clustered,
                merge.nms_conf_thresh,
                merge.nms_max_overlap,
                merge.nms_max_contain,
            )?;
            debug!(
                "model #{}: {} raw, {} clustered, {} kept",
                index,
                scan.responses.len(),
                clustered.len(),
                kept.len()
            );
            self.raw.push(scan.responses);
            self.merged.push(kept);
            self.stats.push(scan.stats);
        }

        Ok(self
            .merged
            .iter()
            .map(|list| list.iter().map(Detection::from_response).collect())
            .collect())
    }

    /// Fixed-point responses of the last call before merging.
    pub fn raw_responses(&self) -> &[Vec<DetResponse>] {
        &self.raw
    }

    /// Fixed-point responses of the last call after merging.
    pub fn merged_responses(&self) -> &[Vec<DetResponse>] {
        &self.merged
    }

    pub fn last_scan_stats(&self) -> &[ScanStats] {
        &self.stats
    }

    fn clear_results(&mut self) {
        self.raw.clear();
        self.merged.clear();
        self.stats.clear();
    }
}
