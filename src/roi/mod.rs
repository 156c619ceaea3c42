// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

//! Region-of-interest strategies deciding what the scanner looks at.

use crate::common::Rect;
use crate::detector::ScanSpec;
use crate::error::{Error, Result};
use crate::math::{self, COORD_DEC_PREC, MERGE_RATIO_DEC_PREC, SCALE_DEC_PREC};
use crate::pyramid::{Pyramid, PyramidLevel};

#[derive(Clone, Debug, PartialEq)]
pub enum RoiOptions {
    /// Sorted split fractions of each level's padded width and height;
    /// both lists include the `0` and `1` ends.
    Grid { xs: Vec<f32>, ys: Vec<f32> },
    /// Rectangles in source image coordinates, each grown on every side by
    /// `margin` times its size.
    Seeded { seeds: Vec<Rect<f32>>, margin: f32 },
}

impl Default for RoiOptions {
    fn default() -> Self {
        RoiOptions::Grid {
            xs: vec![0.0, 1.0],
            ys: vec![0.0, 1.0],
        }
    }
}

/// Picks the levels and regions to scan out of a pyramid.
pub trait RoiGenerator: Send {
    fn reset(&mut self);

    fn configure(&mut self, options: &RoiOptions) -> Result<()>;

    fn generate<'a>(&mut self, pyramid: &'a Pyramid) -> Vec<ScanSpec<'a>>;
}

/// Splits every level into a fixed grid of cells.
#[derive(Debug, Clone)]
pub struct GridRoiGenerator {
    xs: Vec<f32>,
    ys: Vec<f32>,
    round: u64,
}

impl Default for GridRoiGenerator {
    fn default() -> Self {
        GridRoiGenerator {
            xs: vec![0.0, 1.0],
            ys: vec![0.0, 1.0],
            round: 0,
        }
    }
}

impl GridRoiGenerator {
    pub fn new() -> Self {
        GridRoiGenerator::default()
    }

    /// Number of `generate` calls since the last reset.
    pub fn round(&self) -> u64 {
        self.round
    }

    fn cuts(fractions: &[f32], size: i32) -> Vec<i32> {
        fractions
            .iter()
            .map(|f| (f * size as f32).round() as i32)
            .collect()
    }

    fn regions(&self, level: &PyramidLevel) -> Vec<Rect<i32>> {
        let bounds = level.bounds();
        let xs = Self::cuts(&self.xs, bounds.width());
        let ys = Self::cuts(&self.ys, bounds.height());

        let mut regions = vec![];
        for row in ys.windows(2) {
            for col in xs.windows(2) {
                let cell = Rect::new(col[0], row[0], col[1], row[1]);
                if cell.is_valid() {
                    regions.push(cell);
                }
            }
        }
        regions
    }
}

impl RoiGenerator for GridRoiGenerator {
    fn reset(&mut self) {
        self.round = 0;
    }

    fn configure(&mut self, options: &RoiOptions) -> Result<()> {
        match options {
            RoiOptions::Grid { xs, ys } => {
                check_fractions("xs", xs)?;
                check_fractions("ys", ys)?;
                self.xs = xs.clone();
                self.ys = ys.clone();
                Ok(())
            }
            other => Err(Error::Config(format!(
                "grid ROI generator cannot use {:?}",
                other
            ))),
        }
    }

    fn generate<'a>(&mut self, pyramid: &'a Pyramid) -> Vec<ScanSpec<'a>> {
        self.round += 1;
        pyramid
            .levels()
            .iter()
            .enumerate()
            .map(|(index, level)| ScanSpec::new(index, level, self.regions(level)))
            .filter(|spec| !spec.regions.is_empty())
            .collect()
    }
}

fn check_fractions(name: &str, fractions: &[f32]) -> Result<()> {
    if fractions.len() < 2 {
        return Err(Error::Config(format!("{} needs at least two split fractions", name)));
    }
    if fractions.iter().any(|f| !(0.0..=1.0).contains(f)) {
        return Err(Error::Config(format!("{} fractions must lie in [0, 1]", name)));
    }
    if fractions.windows(2).any(|w| w[1] < w[0]) {
        return Err(Error::Config(format!("{} fractions must be sorted", name)));
    }
    Ok(())
}

/// Scans only around known positions, e.g. detections of a previous frame.
#[derive(Debug, Clone, Default)]
pub struct SeededRoiGenerator {
    seeds: Vec<Rect<i32>>,
    margin: i64,
}

impl SeededRoiGenerator {
    pub fn new() -> Self {
        SeededRoiGenerator::default()
    }

    pub fn seed_count(&self) -> usize {
        self.seeds.len()
    }

    /// Seed mapped into padded level coordinates and clipped to the level.
    fn map_seed(&self, seed: &Rect<i32>, level: &PyramidLevel) -> Option<Rect<i32>> {
        let grow_x = math::rescale(i64::from(seed.width()) * self.margin, MERGE_RATIO_DEC_PREC, 0);
        let grow_y = math::rescale(i64::from(seed.height()) * self.margin, MERGE_RATIO_DEC_PREC, 0);
        let scale_x = i64::from(level.scale_x().raw());
        let scale_y = i64::from(level.scale_y().raw());
        let pad = level.pad() as i32;
        let to_level = |v: i64, scale: i64| -> i32 {
            math::rescale(v * scale, COORD_DEC_PREC + SCALE_DEC_PREC, 0) as i32 + pad
        };

        let rect = Rect::new(
            to_level(i64::from(seed.left()) - grow_x, scale_x),
            to_level(i64::from(seed.top()) - grow_y, scale_y),
            to_level(i64::from(seed.right()) + grow_x, scale_x),
            to_level(i64::from(seed.bottom()) + grow_y, scale_y),
        );
        rect.intersection(&level.bounds())
    }
}

impl RoiGenerator for SeededRoiGenerator {
    /// Forgets all seeds.
    fn reset(&mut self) {
        self.seeds.clear();
    }

    fn configure(&mut self, options: &RoiOptions) -> Result<()> {
        match options {
            RoiOptions::Seeded { seeds, margin } => {
                if !(margin.is_finite() && *margin >= 0.0) {
                    return Err(Error::Config(format!("invalid seed margin {}", margin)));
                }
                let seeds = seeds
                    .iter()
                    .map(|s| {
                        Rect::new(
                            math::encode(s.left(), COORD_DEC_PREC),
                            math::encode(s.top(), COORD_DEC_PREC),
                            math::encode(s.right(), COORD_DEC_PREC),
                            math::encode(s.bottom(), COORD_DEC_PREC),
                        )
                    })
                    .collect::<Vec<_>>();
                if let Some(bad) = seeds.iter().find(|s| !s.is_valid()) {
                    return Err(Error::Config(format!("empty seed rectangle {:?}", bad)));
                }
                self.seeds = seeds;
                self.margin = i64::from(math::encode(*margin, MERGE_RATIO_DEC_PREC));
                Ok(())
            }
            other => Err(Error::Config(format!(
                "seeded ROI generator cannot use {:?}",
                other
            ))),
        }
    }

    fn generate<'a>(&mut self, pyramid: &'a Pyramid) -> Vec<ScanSpec<'a>> {
        let mut specs = vec![];
        for (index, level) in pyramid.levels().iter().enumerate() {
            let regions: Vec<Rect<i32>> = self
                .seeds
                .iter()
                .filter_map(|seed| self.map_seed(seed, level))
                .collect();
            if !regions.is_empty() {
                specs.push(ScanSpec::new(index, level, regions));
            }
        }
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ImageData;
    use crate::config::PyramidConfig;
    use crate::pyramid::{FixedPointPyramid, PyramidBuilder};

    fn pyramid_of(size: u32) -> FixedPointPyramid {
        let data = vec![128u8; (size * size) as usize];
        let mut builder = FixedPointPyramid::new(PyramidConfig::default());
        builder.build(&ImageData::new(&data, size, size)).unwrap();
        builder
    }

    #[test]
    fn test_default_grid_covers_levels() {
        let builder = pyramid_of(128);
        let pyramid = builder.pyramid();
        let mut roi = GridRoiGenerator::new();
        let specs = roi.generate(pyramid);

        assert_eq!(4, specs.len());
        for (index, spec) in specs.iter().enumerate() {
            assert_eq!(index, spec.level_index);
            assert_eq!(pyramid.scale(index).unwrap(), spec.scale_x);
            assert_eq!(spec.level.scale_y(), spec.scale_y);
            assert_eq!(vec![spec.level.bounds()], spec.regions);
        }
    }

    #[test]
    fn test_grid_cells() {
        let builder = pyramid_of(128);
        let mut roi = GridRoiGenerator::new();
        roi.configure(&RoiOptions::Grid {
            xs: vec![0.0, 0.5, 1.0],
            ys: vec![0.0, 0.25, 0.25, 1.0],
        })
        .unwrap();
        let specs = roi.generate(builder.pyramid());

        // the zero-height row is skipped; level 0 is 160 pixels wide padded
        assert_eq!(
            vec![
                Rect::new(0, 0, 80, 40),
                Rect::new(80, 0, 160, 40),
                Rect::new(0, 40, 80, 160),
                Rect::new(80, 40, 160, 160),
            ],
            specs[0].regions
        );
    }

    #[test]
    fn test_round_counter() {
        let builder = pyramid_of(128);
        let mut roi = GridRoiGenerator::new();
        roi.generate(builder.pyramid());
        roi.generate(builder.pyramid());
        assert_eq!(2, roi.round());
        roi.reset();
        assert_eq!(0, roi.round());
    }

    #[test]
    fn test_rejects_bad_options() {
        let mut grid = GridRoiGenerator::new();
        let unsorted = RoiOptions::Grid {
            xs: vec![0.0, 0.7, 0.3, 1.0],
            ys: vec![0.0, 1.0],
        };
        assert!(matches!(grid.configure(&unsorted), Err(Error::Config(_))));
        let seeded = RoiOptions::Seeded {
            seeds: vec![],
            margin: 0.0,
        };
        assert!(matches!(grid.configure(&seeded), Err(Error::Config(_))));

        let mut seeds = SeededRoiGenerator::new();
        assert!(matches!(seeds.configure(&RoiOptions::default()), Err(Error::Config(_))));
        let empty = RoiOptions::Seeded {
            seeds: vec![Rect::new(10.0, 10.0, 10.0, 20.0)],
            margin: 0.0,
        };
        assert!(matches!(seeds.configure(&empty), Err(Error::Config(_))));
    }

    #[test]
    fn test_seeds_map_into_levels() {
        let builder = pyramid_of(128);
        let pyramid = builder.pyramid();
        let mut roi = SeededRoiGenerator::new();
        roi.configure(&RoiOptions::Seeded {
            seeds: vec![Rect::new(10.0, 20.0, 50.0, 60.0), Rect::new(1000.0, 0.0, 1100.0, 50.0)],
            margin: 0.25,
        })
        .unwrap();
        let specs = roi.generate(pyramid);

        assert_eq!(4, specs.len());
        // grown by 10 pixels, shifted by the 16 pixel border; the second seed is off-image
        assert_eq!(vec![Rect::new(16, 26, 76, 86)], specs[0].regions);
        for spec in &specs {
            assert_eq!(1, spec.regions.len());
            assert!(spec.level.bounds().contains(&spec.regions[0]));
        }

        roi.reset();
        assert_eq!(0, roi.seed_count());
        assert!(roi.generate(pyramid).is_empty());
    }
}
