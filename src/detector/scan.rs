// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

//! Sliding-window search of classifiers over pyramid levels.

use std::collections::HashSet;

use log::debug;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::Deserialize;

use crate::classifier::Classifier;
use crate::common::{stepped, Rect};
use crate::config::ScanConfig;
use crate::feat::LevelFeatures;
use crate::math::{self, COORD_DEC_PREC, SCALE_DEC_PREC};
use crate::pyramid::{FixedScale, Pyramid, PyramidLevel};

/// Window search strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum ScanMode {
    /// Every step position whose anchor lies in a region.
    Uniform,
    /// Coarse grid first, then refinement around accepted windows.
    CoarseToFine,
    /// Only windows lying entirely inside a region.
    CellSearch,
}

/// One pyramid level to scan together with its regions, given in padded
/// level coordinates.
#[derive(Debug, Clone)]
pub struct ScanSpec<'a> {
    pub level: &'a PyramidLevel,
    pub level_index: usize,
    pub scale_x: FixedScale,
    pub scale_y: FixedScale,
    pub regions: Vec<Rect<i32>>,
}

impl<'a> ScanSpec<'a> {
    pub fn new(level_index: usize, level: &'a PyramidLevel, regions: Vec<Rect<i32>>) -> Self {
        ScanSpec {
            level,
            level_index,
            scale_x: level.scale_x(),
            scale_y: level.scale_y(),
            regions,
        }
    }
}

/// A raw detection in source image coordinates: the rectangle carries
/// `COORD_DEC_PREC` and the confidence `SCORE_DEC_PREC` fractional bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetResponse {
    pub rect: Rect<i32>,
    pub conf: i32,
}

impl DetResponse {
    pub fn new(rect: Rect<i32>, conf: i32) -> Self {
        DetResponse { rect, conf }
    }
}

/// Window and detection counts of one pyramid level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelStats {
    pub windows: usize,
    pub detections: usize,
}

/// Diagnostic counters of one model's scan.
///
/// `levels` is indexed by pyramid level; levels that were not scanned keep
/// zero counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub windows: usize,
    pub detections: usize,
    pub levels: Vec<LevelStats>,
}

impl ScanStats {
    fn level_mut(&mut self, level_index: usize) -> &mut LevelStats {
        if self.levels.len() <= level_index {
            self.levels.resize(level_index + 1, LevelStats::default());
        }
        &mut self.levels[level_index]
    }

    fn count_window(&mut self, level_index: usize) {
        self.windows += 1;
        self.level_mut(level_index).windows += 1;
    }

    fn count_detection(&mut self, level_index: usize) {
        self.detections += 1;
        self.level_mut(level_index).detections += 1;
    }
}

/// Responses and counters of one model.
#[derive(Clone, Debug, Default)]
pub struct ModelScan {
    pub responses: Vec<DetResponse>,
    pub stats: ScanStats,
}

/// Maps a padded level coordinate to the source image, with
/// `COORD_DEC_PREC` fractional bits.
#[inline]
pub fn level_to_source(v: i32, pad: u32, scale: FixedScale) -> i32 {
    let shifted = i64::from(v - pad as i32) << (COORD_DEC_PREC + SCALE_DEC_PREC);
    math::div_round(shifted, i64::from(scale.raw())) as i32
}

pub struct Scanner {
    mode: ScanMode,
    depth: u32,
    step_x: i32,
    step_y: i32,
}

impl Scanner {
    pub fn new(config: &ScanConfig) -> Self {
        Scanner {
            mode: config.mode,
            depth: config.coarse_to_fine_depth,
            step_x: config.step_x as i32,
            step_y: config.step_y as i32,
        }
    }

    #[inline]
    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Scans `specs` of `pyramid` with every model; the result is parallel to `models`.
    pub fn scan(
        &self,
        pyramid: &Pyramid,
        specs: &[ScanSpec<'_>],
        models: &[Box<dyn Classifier>],
    ) -> Vec<ModelScan> {
        let (src_w, src_h) = pyramid.source_size();
        let bounds = Rect::new(
            0,
            0,
            (src_w as i32) << COORD_DEC_PREC,
            (src_h as i32) << COORD_DEC_PREC,
        );

        #[cfg(feature = "rayon")]
        let features: Vec<LevelFeatures> = specs
            .par_iter()
            .map(|spec| LevelFeatures::compute(&spec.level.buffer().view()))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let features: Vec<LevelFeatures> = specs
            .iter()
            .map(|spec| LevelFeatures::compute(&spec.level.buffer().view()))
            .collect();

        let scan_one = |model: &Box<dyn Classifier>| {
            let mut out = ModelScan::default();
            for (spec, feat) in specs.iter().zip(&features) {
                self.scan_level(model.as_ref(), spec, feat, &bounds, &mut out);
            }
            out
        };

        #[cfg(feature = "rayon")]
        let results: Vec<ModelScan> = models.par_iter().map(scan_one).collect();
        #[cfg(not(feature = "rayon"))]
        let results: Vec<ModelScan> = models.iter().map(scan_one).collect();

        for (index, result) in results.iter().enumerate() {
            debug!(
                "model #{}: {:?} scan evaluated {} windows, {} detections",
                index, self.mode, result.stats.windows, result.stats.detections
            );
            for (level, counts) in result.stats.levels.iter().enumerate() {
                debug!(
                    "model #{} level {}: {} windows, {} detections",
                    index, level, counts.windows, counts.detections
                );
            }
        }
        results
    }

    fn scan_level(
        &self,
        model: &dyn Classifier,
        spec: &ScanSpec<'_>,
        features: &LevelFeatures,
        bounds: &Rect<i32>,
        out: &mut ModelScan,
    ) {
        let (win_w, win_h) = model.window_size();
        let level_bounds = spec.level.bounds();
        if win_w as i32 > level_bounds.width() || win_h as i32 > level_bounds.height() {
            return;
        }
        let win_w = win_w as i32;
        let win_h = win_h as i32;
        let pad = spec.level.pad();

        let visit = |x: i32, y: i32, out: &mut ModelScan| -> bool {
            out.stats.count_window(spec.level_index);
            let score = model.classify(features, x as u32, y as u32);
            if !score.is_positive() {
                return false;
            }
            let rect = Rect::new(
                level_to_source(x, pad, spec.scale_x),
                level_to_source(y, pad, spec.scale_y),
                level_to_source(x + win_w, pad, spec.scale_x),
                level_to_source(y + win_h, pad, spec.scale_y),
            )
            .clip(bounds);
            // windows lying in the padding alone map to nothing
            if rect.is_valid() {
                out.responses.push(DetResponse::new(rect, score.score()));
                out.stats.count_detection(spec.level_index);
            }
            true
        };

        for region in &spec.regions {
            let region = match region.intersection(&level_bounds) {
                Some(region) => region,
                None => continue,
            };
            // exclusive limits for the anchor
            let anchors = match self.mode {
                ScanMode::CellSearch => Rect::new(
                    region.left(),
                    region.top(),
                    region.right() - win_w + 1,
                    region.bottom() - win_h + 1,
                ),
                ScanMode::Uniform | ScanMode::CoarseToFine => Rect::new(
                    region.left(),
                    region.top(),
                    region.right().min(level_bounds.right() - win_w + 1),
                    region.bottom().min(level_bounds.bottom() - win_h + 1),
                ),
            };
            if !anchors.is_valid() {
                continue;
            }

            match self.mode {
                ScanMode::Uniform | ScanMode::CellSearch => {
                    for y in stepped(anchors.top(), anchors.bottom(), self.step_y) {
                        for x in stepped(anchors.left(), anchors.right(), self.step_x) {
                            visit(x, y, out);
                        }
                    }
                }
                ScanMode::CoarseToFine => {
                    let rounds = self.refinement_rounds(win_w, win_h);
                    self.coarse_to_fine(&anchors, rounds, |x, y| visit(x, y, out));
                }
            }
        }
    }

    /// `min(depth, max k with step << k <= window size)`.
    fn refinement_rounds(&self, win_w: i32, win_h: i32) -> u32 {
        let mut rounds = 0;
        while rounds < self.depth
            && self.step_x << (rounds + 1) <= win_w
            && self.step_y << (rounds + 1) <= win_h
        {
            rounds += 1;
        }
        rounds
    }

    fn coarse_to_fine<F>(&self, anchors: &Rect<i32>, rounds: u32, mut visit: F)
    where
        F: FnMut(i32, i32) -> bool,
    {
        let mut visited = HashSet::new();
        let mut accepted = vec![];

        let coarse_x = self.step_x << rounds;
        let coarse_y = self.step_y << rounds;
        for y in stepped(anchors.top(), anchors.bottom(), coarse_y) {
            for x in stepped(anchors.left(), anchors.right(), coarse_x) {
                visited.insert((x, y));
                if visit(x, y) {
                    accepted.push((x, y));
                }
            }
        }

        for round in 1..=rounds {
            let stride_x = self.step_x << (rounds - round);
            let stride_y = self.step_y << (rounds - round);
            let mut next = vec![];
            for &(cx, cy) in &accepted {
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let x = cx + dx * stride_x;
                        let y = cy + dy * stride_y;
                        if x < anchors.left()
                            || x >= anchors.right()
                            || y < anchors.top()
                            || y >= anchors.bottom()
                        {
                            continue;
                        }
                        if visited.insert((x, y)) && visit(x, y) {
                            next.push((x, y));
                        }
                    }
                }
            }
            accepted = next;
        }
    }
}
