// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

//! Construction-time configuration of a detector.

use serde::Deserialize;

use crate::detector::ScanMode;
use crate::error::{Error, Result};

/// Confidence threshold a detection has to reach to be reported by default.
pub const DEFAULT_CONF_THRESHOLD: f32 = 4.0;

const MAX_SCALE_NUMER_BITS: u32 = 12;

/// Pyramid variant built for each detection call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum PyramidKind {
    /// Geometric progression `2^bits / start_denom * (2^bits / step_denom)^k`.
    FixedPoint,
    /// Halving octaves, each split into `sub_level_num` steps of `2^bits / step_denom`.
    Octave { octave_num: usize, sub_level_num: usize },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PyramidConfig {
    pub kind: PyramidKind,
    /// Border (pixels) reserved on every side of each level.
    pub pad_border: u32,
    pub max_level_num: usize,
    pub min_level_width: u32,
    pub min_level_height: u32,
    /// Bit width of the scale numerator, i.e. every resize ratio is `2^bits / denom`.
    pub scale_numer_bits: u32,
    pub start_scale_denom: u32,
    pub scale_step_denom: u32,
    /// Part of the Nyquist band the anti-aliasing filter keeps, in `(0, 1]`.
    /// `1.0` disables horizontal filtering.
    pub nyquist_freq_ratio: f32,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        PyramidConfig {
            kind: PyramidKind::FixedPoint,
            pad_border: 16,
            max_level_num: 12,
            min_level_width: 64,
            min_level_height: 64,
            scale_numer_bits: 4,
            start_scale_denom: 16,
            scale_step_denom: 20,
            nyquist_freq_ratio: 1.0,
        }
    }
}

impl PyramidConfig {
    pub fn with_kind(mut self, kind: PyramidKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_pad_border(mut self, pad_border: u32) -> Self {
        self.pad_border = pad_border;
        self
    }

    pub fn with_max_level_num(mut self, max_level_num: usize) -> Self {
        self.max_level_num = max_level_num;
        self
    }

    pub fn with_min_level_size(mut self, width: u32, height: u32) -> Self {
        self.min_level_width = width;
        self.min_level_height = height;
        self
    }

    pub fn with_scale(mut self, numer_bits: u32, start_denom: u32, step_denom: u32) -> Self {
        self.scale_numer_bits = numer_bits;
        self.start_scale_denom = start_denom;
        self.scale_step_denom = step_denom;
        self
    }

    pub fn with_nyquist_freq_ratio(mut self, ratio: f32) -> Self {
        self.nyquist_freq_ratio = ratio;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_level_num == 0 {
            return config_error("max_level_num must be positive");
        }
        if self.min_level_width == 0 || self.min_level_height == 0 {
            return config_error("minimum level size must be positive");
        }
        if self.scale_numer_bits == 0 || self.scale_numer_bits > MAX_SCALE_NUMER_BITS {
            return config_error(format!(
                "scale_numer_bits must lie in 1..={}, got {}",
                MAX_SCALE_NUMER_BITS, self.scale_numer_bits
            ));
        }
        if self.start_scale_denom == 0 {
            return config_error("start_scale_denom must be positive");
        }
        if self.scale_step_denom <= 1 << self.scale_numer_bits {
            return config_error(format!(
                "scale_step_denom {} must exceed 2^{} for the scales to decrease",
                self.scale_step_denom, self.scale_numer_bits
            ));
        }
        if !(self.nyquist_freq_ratio > 0.0 && self.nyquist_freq_ratio <= 1.0) {
            return config_error(format!(
                "nyquist_freq_ratio must lie in (0, 1], got {}",
                self.nyquist_freq_ratio
            ));
        }
        if let PyramidKind::Octave {
            octave_num,
            sub_level_num,
        } = self.kind
        {
            if octave_num == 0 || sub_level_num == 0 {
                return config_error("octave pyramid needs at least one octave and sub-level");
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub mode: ScanMode,
    /// Refinement rounds of the coarse-to-fine search.
    pub coarse_to_fine_depth: u32,
    pub step_x: u32,
    pub step_y: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            mode: ScanMode::CellSearch,
            coarse_to_fine_depth: 2,
            step_x: 4,
            step_y: 4,
        }
    }
}

impl ScanConfig {
    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_coarse_to_fine_depth(mut self, depth: u32) -> Self {
        self.coarse_to_fine_depth = depth;
        self
    }

    pub fn with_step(mut self, step_x: u32, step_y: u32) -> Self {
        self.step_x = step_x;
        self.step_y = step_y;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.step_x == 0 || self.step_y == 0 {
            return config_error(format!(
                "window steps must be positive, got {}x{}",
                self.step_x, self.step_y
            ));
        }
        Ok(())
    }
}

/// Thresholds of response merging. Ratios are configured as floats and
/// evaluated in fixed point.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// IoU above which a response joins an existing cluster.
    pub overlap_ratio: f32,
    pub nms_max_overlap: f32,
    pub nms_max_contain: f32,
    pub nms_conf_thresh: f32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            overlap_ratio: 0.5,
            nms_max_overlap: 0.6,
            nms_max_contain: 0.8,
            nms_conf_thresh: DEFAULT_CONF_THRESHOLD,
        }
    }
}

impl MergeConfig {
    pub fn with_overlap_ratio(mut self, ratio: f32) -> Self {
        self.overlap_ratio = ratio;
        self
    }

    pub fn with_nms(mut self, max_overlap: f32, max_contain: f32, conf_thresh: f32) -> Self {
        self.nms_max_overlap = max_overlap;
        self.nms_max_contain = max_contain;
        self.nms_conf_thresh = conf_thresh;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("overlap_ratio", self.overlap_ratio),
            ("nms_max_overlap", self.nms_max_overlap),
            ("nms_max_contain", self.nms_max_contain),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return config_error(format!("{} must lie in (0, 1], got {}", name, value));
            }
        }
        if !self.nms_conf_thresh.is_finite() {
            return config_error("nms_conf_thresh must be finite");
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub pyramid: PyramidConfig,
    pub scan: ScanConfig,
    pub merge: MergeConfig,
}

impl DetectorConfig {
    pub fn with_pyramid(mut self, pyramid: PyramidConfig) -> Self {
        self.pyramid = pyramid;
        self
    }

    pub fn with_scan(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merge = merge;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.pyramid.validate()?;
        self.scan.validate()?;
        self.merge.validate()
    }
}

fn config_error<T, S: Into<String>>(message: S) -> Result<T> {
    Err(Error::Config(message.into()))
}
