// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

use fpcascade::classifier::{LabFeature, LabStage};
use fpcascade::detector::cluster_online;
use fpcascade::feat::LevelFeatures;
use fpcascade::math::{self, COORD_DEC_PREC, SCORE_DEC_PREC};
use fpcascade::{
    Classifier, DetResponse, Detection, Detector, DetectorConfig, Error, ImageData, LabCascade,
    ModelSet, PyramidConfig, Rect, Score, DEFAULT_CONF_THRESHOLD,
};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as ImageRect;

/// Accepts windows made only of white pixels with a fixed confidence of 5.0.
struct WhitePatch(u32);

impl Classifier for WhitePatch {
    fn window_size(&self) -> (u32, u32) {
        (self.0, self.0)
    }

    fn classify(&self, features: &LevelFeatures, x: u32, y: u32) -> Score {
        let sum = features.rect_sum(x, y, self.0, self.0);
        Score::new(sum == 255 * self.0 * self.0, 5 << SCORE_DEC_PREC)
    }
}

/// Accepts a white window surrounded by a black two-pixel ring, that is a
/// white patch of exactly the window's size.
struct FramedPatch(u32);

impl Classifier for FramedPatch {
    fn window_size(&self) -> (u32, u32) {
        (self.0, self.0)
    }

    fn classify(&self, features: &LevelFeatures, x: u32, y: u32) -> Score {
        let side = self.0;
        if x < 2 || y < 2 || x + side + 2 > features.width() || y + side + 2 > features.height() {
            return Score::new(false, 0);
        }
        let inner = features.rect_sum(x, y, side, side);
        let outer = features.rect_sum(x - 2, y - 2, side + 4, side + 4);
        Score::new(inner == 255 * side * side && outer == inner, 5 << SCORE_DEC_PREC)
    }
}

struct Never;

impl Classifier for Never {
    fn window_size(&self) -> (u32, u32) {
        (40, 40)
    }

    fn classify(&self, _: &LevelFeatures, _: u32, _: u32) -> Score {
        Score::new(false, 0)
    }
}

fn image_with_square(size: u32, x: i32, y: i32, side: u32) -> GrayImage {
    let mut image = GrayImage::new(size, size);
    draw_filled_rect_mut(&mut image, ImageRect::at(x, y).of_size(side, side), Luma([255u8]));
    image
}

fn detect(detector: &mut Detector, image: &GrayImage) -> fpcascade::Result<Vec<Vec<Detection>>> {
    let (width, height) = image.dimensions();
    detector.detect(&ImageData::new(image.as_raw(), width, height))
}

#[test]
fn test_single_patch_is_found_once_per_model() {
    let image = image_with_square(512, 100, 100, 50);
    let models = ModelSet::new(vec![Box::new(WhitePatch(50)), Box::new(WhitePatch(50))]);
    let mut detector = Detector::new(DetectorConfig::default())
        .unwrap()
        .with_models(models);

    let result = detect(&mut detector, &image).unwrap();
    assert_eq!(2, result.len());
    for detections in &result {
        assert_eq!(1, detections.len());
        let [l, t, r, b, conf] = detections[0].to_array();
        for (found, expected) in [l, t, r, b].iter().zip(&[100.0f32, 100.0, 150.0, 150.0]) {
            assert!((found - expected).abs() <= 1.0, "{:?}", detections[0]);
        }
        assert!(conf >= DEFAULT_CONF_THRESHOLD);
    }
    assert!(detector.merged_responses()[0].len() <= detector.raw_responses()[0].len());
}

#[test]
fn test_patch_found_on_coarse_level_maps_back_to_source() {
    let mut image = GrayImage::new(512, 384);
    draw_filled_rect_mut(&mut image, ImageRect::at(96, 64).of_size(200, 200), Luma([255u8]));
    // halving levels: 512x384, 256x192, 128x96
    let config =
        DetectorConfig::default().with_pyramid(PyramidConfig::default().with_scale(4, 16, 32));
    let models = ModelSet::new(vec![Box::new(FramedPatch(50))]);
    let mut detector = Detector::new(config).unwrap().with_models(models);

    let result = detect(&mut detector, &image).unwrap();
    assert_eq!(3, detector.pyramid().len());
    assert_eq!(1, detector.raw_responses()[0].len());
    let levels = &detector.last_scan_stats()[0].levels;
    assert_eq!(0, levels[0].detections + levels[1].detections);
    assert_eq!(1, levels[2].detections);

    assert_eq!(1, result[0].len());
    let [l, t, r, b, _] = result[0][0].to_array();
    for (found, expected) in [l, t, r, b].iter().zip(&[96.0f32, 64.0, 296.0, 264.0]) {
        assert!((found - expected).abs() <= 1.0, "{:?}", result[0][0]);
    }
}

#[test]
fn test_overlap_decides_clustering() {
    let coord = |v: i32| v << COORD_DEC_PREC;
    let response =
        |r: i32, b: i32| DetResponse::new(Rect::new(0, 0, coord(r), coord(b)), 3 << SCORE_DEC_PREC);

    // IoU 0.9
    let merged = cluster_online(&[response(100, 100), response(100, 90)], 0.5).unwrap();
    assert_eq!(1, merged.len());
    // IoU 0.1
    let merged = cluster_online(&[response(100, 100), response(10, 100)], 0.5).unwrap();
    assert_eq!(2, merged.len());
}

#[test]
fn test_no_responses_give_empty_lists() {
    let image = image_with_square(256, 60, 60, 80);
    let models = ModelSet::new(vec![Box::new(Never), Box::new(WhitePatch(50))]);
    let mut detector = Detector::new(DetectorConfig::default())
        .unwrap()
        .with_models(models);

    let result = detect(&mut detector, &image).unwrap();
    assert!(result[0].is_empty());
    assert!(detector.raw_responses()[0].is_empty());
    assert!(detector.merged_responses()[0].is_empty());
    assert!(!result[1].is_empty());
    assert!(detector.last_scan_stats()[0].windows > 0);
}

#[test]
fn test_unreadable_model_blocks_detection() {
    let mut detector = Detector::new(DetectorConfig::default()).unwrap();
    let err = detector
        .init_from_paths(&["/nonexistent/fpcascade/model.bin"])
        .unwrap_err();
    assert!(matches!(err, Error::ModelLoad { index: 0, .. }));

    let image = image_with_square(128, 10, 10, 20);
    assert!(matches!(detect(&mut detector, &image), Err(Error::NotInitialized)));
    assert!(fpcascade::create_detector(&["/nonexistent/fpcascade/model.bin"]).is_err());
}

#[test]
fn test_lab_cascade_locates_bright_square() {
    let mut weights = vec![-(2 << SCORE_DEC_PREC) as i16; 256];
    weights[0xff] = (5 << SCORE_DEC_PREC) as i16;
    let cascade = LabCascade::new(60, 60)
        .with_min_std_dev(10)
        .with_stage(LabStage::new(0).with_feature(LabFeature::new(0, 0, 20, 20, weights)));

    let mut bytes = vec![];
    cascade.write_to(&mut bytes).unwrap();
    // the two finest levels keep the blur of repeated resizing small
    let config =
        DetectorConfig::default().with_pyramid(PyramidConfig::default().with_max_level_num(2));
    let mut detector = Detector::new(config).unwrap();
    detector.init(vec![bytes.as_slice()]).unwrap();
    assert_eq!(Some((60, 60)), detector.model_ref_size(0));

    let image = image_with_square(256, 120, 120, 40);
    let result = detect(&mut detector, &image).unwrap();
    assert!(!result[0].is_empty());

    let best = result[0][0].bbox();
    let centre_x = (best.left() + best.right()) / 2.0;
    let centre_y = (best.top() + best.bottom()) / 2.0;
    assert!((centre_x - 140.0).abs() <= 32.0, "{:?}", best);
    assert!((centre_y - 140.0).abs() <= 32.0, "{:?}", best);
    assert!(result[0][0].score() >= math::decode(5 << SCORE_DEC_PREC, SCORE_DEC_PREC));
}
