// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

use log::debug;

use super::resizer::{scaled_size, Resizer, ScaleRatio};
use super::{FixedScale, Pyramid, PyramidBuilder, PyramidLevel};
use crate::common::ImageData;
use crate::config::PyramidConfig;
use crate::error::Result;

/// Pyramid with a geometric scale progression.
///
/// Level 0 is the source resized by `2^bits / start_scale_denom`, every next
/// level is the previous one resized by `2^bits / scale_step_denom`.
pub struct FixedPointPyramid {
    config: PyramidConfig,
    resizer: Resizer,
    pyramid: Pyramid,
}

impl FixedPointPyramid {
    /// The configuration is expected to be validated.
    pub fn new(config: PyramidConfig) -> Self {
        FixedPointPyramid {
            config,
            resizer: Resizer::new(),
            pyramid: Pyramid::default(),
        }
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }
}

impl PyramidBuilder for FixedPointPyramid {
    fn build(&mut self, image: &ImageData<'_>) -> Result<&Pyramid> {
        image.validate()?;

        let config = &self.config;
        let bits = config.scale_numer_bits;
        let start = ScaleRatio::new(bits, config.start_scale_denom);
        let step = ScaleRatio::new(bits, config.scale_step_denom);

        self.pyramid
            .reset(config.pad_border, image.width(), image.height());

        let source_size = (image.width(), image.height());
        let mut ratio = start;
        while self.pyramid.len() < config.max_level_num {
            let source = match self.pyramid.levels.last() {
                Some(level) => level.interior(),
                None => *image,
            };
            let level = match resize_level(
                &mut self.resizer,
                config,
                &source,
                ratio,
                source_size,
                self.pyramid.levels.last().map(PyramidLevel::scale),
            ) {
                Some(level) => level,
                None => break,
            };
            self.pyramid.levels.push(level);
            ratio = step;
        }

        debug!(
            "built {} pyramid levels for {}x{} image",
            self.pyramid.len(),
            image.width(),
            image.height()
        );
        Ok(&self.pyramid)
    }

    fn pyramid(&self) -> &Pyramid {
        &self.pyramid
    }
}

/// Pyramid made of halving octaves, each split into `sub_level_num` levels
/// spaced by `2^bits / scale_step_denom`.
pub struct OctavePyramid {
    config: PyramidConfig,
    octave_num: usize,
    sub_level_num: usize,
    resizer: Resizer,
    pyramid: Pyramid,
}

impl OctavePyramid {
    /// The configuration is expected to be validated.
    pub fn new(config: PyramidConfig, octave_num: usize, sub_level_num: usize) -> Self {
        OctavePyramid {
            config,
            octave_num,
            sub_level_num,
            resizer: Resizer::new(),
            pyramid: Pyramid::default(),
        }
    }
}

impl PyramidBuilder for OctavePyramid {
    fn build(&mut self, image: &ImageData<'_>) -> Result<&Pyramid> {
        image.validate()?;

        let config = &self.config;
        let bits = config.scale_numer_bits;
        let unit = 1u32 << bits;
        let step = ScaleRatio::new(bits, config.scale_step_denom);
        let halve = ScaleRatio::new(bits, unit << 1);

        self.pyramid
            .reset(config.pad_border, image.width(), image.height());

        let source_size = (image.width(), image.height());
        let mut base_index: Option<usize> = None;
        let mut base_scale = FixedScale::ONE.mul_ratio(unit, config.start_scale_denom);

        'octaves: for octave in 0..self.octave_num {
            let (source, ratio) = match base_index {
                Some(index) => (self.pyramid.levels[index].interior(), halve),
                None => (*image, ScaleRatio::new(bits, config.start_scale_denom)),
            };
            if octave > 0 {
                base_scale = base_scale.mul_ratio(1, 2);
            }
            if self.pyramid.len() >= config.max_level_num {
                break;
            }
            let previous = self.pyramid.levels.last().map(PyramidLevel::scale);
            let base = match resize_level(
                &mut self.resizer,
                config,
                &source,
                ratio,
                source_size,
                previous,
            ) {
                Some(level) => level,
                None => break,
            };
            self.pyramid.levels.push(base);
            base_index = Some(self.pyramid.len() - 1);

            // nominal scales decide how many sub-levels fit in the octave
            let next_octave = base_scale.mul_ratio(1, 2);
            let mut scale = base_scale;
            for _ in 1..self.sub_level_num {
                scale = scale.mul_ratio(unit, config.scale_step_denom);
                if scale <= next_octave {
                    break;
                }
                if self.pyramid.len() >= config.max_level_num {
                    break 'octaves;
                }
                let previous = self.pyramid.levels.last().map(PyramidLevel::scale);
                let source = match self.pyramid.levels.last() {
                    Some(level) => level.interior(),
                    None => break 'octaves,
                };
                let level = match resize_level(
                    &mut self.resizer,
                    config,
                    &source,
                    step,
                    source_size,
                    previous,
                ) {
                    Some(level) => level,
                    None => break 'octaves,
                };
                self.pyramid.levels.push(level);
            }
        }

        debug!(
            "built {} octave pyramid levels for {}x{} image",
            self.pyramid.len(),
            image.width(),
            image.height()
        );
        Ok(&self.pyramid)
    }

    fn pyramid(&self) -> &Pyramid {
        &self.pyramid
    }
}

/// Resizes `source` by `ratio` into a new padded level, or returns `None` when
/// the level would be smaller than the configured minimum or would not
/// decrease the scale.
///
/// The level's scale is its size relative to `image_size`, the original image.
fn resize_level(
    resizer: &mut Resizer,
    config: &PyramidConfig,
    source: &ImageData<'_>,
    ratio: ScaleRatio,
    image_size: (u32, u32),
    previous: Option<FixedScale>,
) -> Option<PyramidLevel> {
    let width = scaled_size(source.width(), ratio.bits, ratio.denom);
    let height = scaled_size(source.height(), ratio.bits, ratio.denom);
    if width < config.min_level_width || height < config.min_level_height {
        return None;
    }

    let scale = FixedScale::ratio(width, image_size.0);
    if scale.raw() == 0 || previous.map_or(false, |p| scale >= p) {
        return None;
    }

    let mut level = PyramidLevel::new(width, height, config.pad_border, image_size);
    let (dst, stride) = level.interior_mut();
    resizer.resize_hor_filter5(source, ratio, ratio, config.nyquist_freq_ratio, dst, stride);
    level.buffer.replicate_border(config.pad_border);
    Some(level)
}
