// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{Classifier, ClassifierKind, Score};
use crate::feat::LevelFeatures;

const LAB_BIN_NUM: usize = 256;
const MAX_STAGE_NUM: i32 = 4096;
const MAX_FEATURE_NUM: i32 = 1 << 16;
/// Largest standard deviation of 8-bit pixels.
const MAX_STD_DEV: u32 = 255;

/// One boosted LAB feature: a 3x3 grid of cells placed inside the window and
/// a fixed-point weight for each of its 256 codes.
#[derive(Debug, Clone, PartialEq)]
pub struct LabFeature {
    x: u32,
    y: u32,
    cell_w: u32,
    cell_h: u32,
    weights: Vec<i16>,
}

impl LabFeature {
    /// # Panics
    ///
    /// Panics if `weights` does not hold 256 values or a cell size is zero.
    pub fn new(x: u32, y: u32, cell_w: u32, cell_h: u32, weights: Vec<i16>) -> Self {
        assert_eq!(LAB_BIN_NUM, weights.len(), "LAB feature needs 256 weights");
        assert!(cell_w > 0 && cell_h > 0, "empty LAB cell");
        LabFeature {
            x,
            y,
            cell_w,
            cell_h,
            weights,
        }
    }

    fn fits(&self, window_w: u32, window_h: u32) -> bool {
        let reach =
            |origin: u32, cell: u32| cell.checked_mul(3).and_then(|c| c.checked_add(origin));
        matches!(reach(self.x, self.cell_w), Some(r) if r <= window_w)
            && matches!(reach(self.y, self.cell_h), Some(r) if r <= window_h)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabStage {
    features: Vec<LabFeature>,
    threshold: i32,
}

impl LabStage {
    /// Stage rejecting windows whose accumulated score drops below `threshold`.
    pub fn new(threshold: i32) -> Self {
        LabStage {
            features: vec![],
            threshold,
        }
    }

    pub fn add_feature(&mut self, feature: LabFeature) {
        self.features.push(feature);
    }

    pub fn with_feature(mut self, feature: LabFeature) -> Self {
        self.add_feature(feature);
        self
    }
}

/// Boosted cascade over LAB features with integer scores.
///
/// Scores accumulate over all stages; a window is rejected as soon as the
/// running score falls below the threshold of the stage just finished.
#[derive(Debug, Clone, PartialEq)]
pub struct LabCascade {
    window_w: u32,
    window_h: u32,
    min_std_dev: u32,
    stages: Vec<LabStage>,
}

impl LabCascade {
    pub fn new(window_w: u32, window_h: u32) -> Self {
        LabCascade {
            window_w,
            window_h,
            min_std_dev: 0,
            stages: vec![],
        }
    }

    /// Rejects flat windows whose pixel standard deviation is below `min_std_dev`,
    /// capped at 255.
    pub fn with_min_std_dev(mut self, min_std_dev: u32) -> Self {
        self.min_std_dev = min_std_dev.min(MAX_STD_DEV);
        self
    }

    /// # Panics
    ///
    /// Panics if a feature of the stage reaches outside the window.
    pub fn add_stage(&mut self, stage: LabStage) {
        for feature in &stage.features {
            assert!(
                feature.fits(self.window_w, self.window_h),
                "LAB feature {:?} exceeds {}x{} window",
                (feature.x, feature.y),
                self.window_w,
                self.window_h
            );
        }
        self.stages.push(stage);
    }

    pub fn with_stage(mut self, stage: LabStage) -> Self {
        self.add_stage(stage);
        self
    }

    pub fn stage_num(&self) -> usize {
        self.stages.len()
    }

    /// Reads a cascade body, i.e. everything following the classifier kind id.
    ///
    /// Structural problems are reported as `io::ErrorKind::InvalidData`.
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let window_w = read_positive(reader, "window width")?;
        let window_h = read_positive(reader, "window height")?;
        let min_std_dev = read_count(reader, "min std dev", MAX_STD_DEV as i32)?;
        let num_stage = read_count(reader, "stage count", MAX_STAGE_NUM)?;

        let mut cascade = LabCascade::new(window_w, window_h).with_min_std_dev(min_std_dev);
        for _ in 0..num_stage {
            let num_feat = read_count(reader, "feature count", MAX_FEATURE_NUM)?;
            let threshold = reader.read_i32::<LittleEndian>()?;
            let mut stage = LabStage::new(threshold);

            for _ in 0..num_feat {
                let x = read_count(reader, "feature x", i32::MAX)?;
                let y = read_count(reader, "feature y", i32::MAX)?;
                let cell_w = read_positive(reader, "cell width")?;
                let cell_h = read_positive(reader, "cell height")?;
                let mut weights = vec![0i16; LAB_BIN_NUM];
                reader.read_i16_into::<LittleEndian>(&mut weights)?;

                let feature = LabFeature {
                    x,
                    y,
                    cell_w,
                    cell_h,
                    weights,
                };
                if !feature.fits(window_w, window_h) {
                    return Err(invalid_data(format!(
                        "feature at ({}, {}) with {}x{} cells exceeds {}x{} window",
                        x, y, cell_w, cell_h, window_w, window_h
                    )));
                }
                stage.add_feature(feature);
            }
            cascade.stages.push(stage);
        }

        Ok(cascade)
    }

    /// Writes a complete model stream, kind id included.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_i32::<LittleEndian>(ClassifierKind::LabCascade.id())?;
        writer.write_i32::<LittleEndian>(self.window_w as i32)?;
        writer.write_i32::<LittleEndian>(self.window_h as i32)?;
        writer.write_i32::<LittleEndian>(self.min_std_dev as i32)?;
        writer.write_i32::<LittleEndian>(self.stages.len() as i32)?;

        for stage in &self.stages {
            writer.write_i32::<LittleEndian>(stage.features.len() as i32)?;
            writer.write_i32::<LittleEndian>(stage.threshold)?;
            for feature in &stage.features {
                writer.write_i32::<LittleEndian>(feature.x as i32)?;
                writer.write_i32::<LittleEndian>(feature.y as i32)?;
                writer.write_i32::<LittleEndian>(feature.cell_w as i32)?;
                writer.write_i32::<LittleEndian>(feature.cell_h as i32)?;
                for &w in &feature.weights {
                    writer.write_i16::<LittleEndian>(w)?;
                }
            }
        }
        Ok(())
    }

    fn has_enough_contrast(&self, features: &LevelFeatures, x: u32, y: u32) -> bool {
        if self.min_std_dev == 0 {
            return true;
        }
        let area = u128::from(self.window_w) * u128::from(self.window_h);
        let thresh = u128::from(self.min_std_dev) * area;
        let variance = u128::from(features.scaled_variance(x, y, self.window_w, self.window_h));
        thresh.checked_mul(thresh).map_or(false, |t| variance >= t)
    }
}

impl Classifier for LabCascade {
    fn window_size(&self) -> (u32, u32) {
        (self.window_w, self.window_h)
    }

    fn classify(&self, features: &LevelFeatures, x: u32, y: u32) -> Score {
        if !self.has_enough_contrast(features, x, y) {
            return Score::new(false, 0);
        }

        let mut score = 0i32;
        for stage in &self.stages {
            for feature in &stage.features {
                let code =
                    features.lab_code(x + feature.x, y + feature.y, feature.cell_w, feature.cell_h);
                score = score.saturating_add(i32::from(feature.weights[code as usize]));
            }
            if score < stage.threshold {
                return Score::new(false, score);
            }
        }
        Score::new(true, score)
    }
}

fn read_count<R: Read>(reader: &mut R, what: &str, max: i32) -> io::Result<u32> {
    let value = reader.read_i32::<LittleEndian>()?;
    if value < 0 || value > max {
        return Err(invalid_data(format!("{} out of range: {}", what, value)));
    }
    Ok(value as u32)
}

fn read_positive<R: Read>(reader: &mut R, what: &str) -> io::Result<u32> {
    let value = reader.read_i32::<LittleEndian>()?;
    if value <= 0 {
        return Err(invalid_data(format!("{} must be positive, got {}", what, value)));
    }
    Ok(value as u32)
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}
