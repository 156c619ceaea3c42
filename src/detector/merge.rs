// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

//! Online clustering and non-maximum suppression of raw responses.
//!
//! All geometry stays in fixed point; float thresholds are converted to
//! `MERGE_RATIO_DEC_PREC` bits once per call.

use super::scan::DetResponse;
use crate::common::Rect;
use crate::error::{Error, Result};
use crate::math::{self, DIV_DEC_PREC, MERGE_RATIO_DEC_PREC, SCORE_DEC_PREC};

/// Intersection over union with `MERGE_RATIO_DEC_PREC` fractional bits.
pub fn iou_ratio(a: &Rect<i32>, b: &Rect<i32>) -> i64 {
    match a.intersection(b) {
        Some(inter) => {
            let inter = area(&inter);
            math::merge_ratio(inter, area(a) + area(b) - inter)
        }
        None => 0,
    }
}

/// Part of `inner` covered by `outer`, with `MERGE_RATIO_DEC_PREC` fractional bits.
pub fn contain_ratio(inner: &Rect<i32>, outer: &Rect<i32>) -> i64 {
    match inner.intersection(outer) {
        Some(inter) => math::merge_ratio(area(&inter), area(inner)),
        None => 0,
    }
}

#[inline]
fn area(rect: &Rect<i32>) -> i64 {
    i64::from(rect.width()) * i64::from(rect.height())
}

fn check_rects(responses: &[DetResponse]) -> Result<()> {
    match responses.iter().find(|r| !r.rect.is_valid()) {
        Some(r) => Err(Error::MalformedRect {
            l: r.rect.left(),
            t: r.rect.top(),
            r: r.rect.right(),
            b: r.rect.bottom(),
        }),
        None => Ok(()),
    }
}

struct Cluster {
    rect: [i64; 4],
    conf: i64,
    weight: i64,
}

impl Cluster {
    fn open(response: &DetResponse) -> Self {
        Cluster {
            rect: corners(&response.rect),
            conf: i64::from(response.conf),
            weight: i64::from(response.conf.max(1)),
        }
    }

    fn rect(&self) -> Rect<i32> {
        Rect::new(
            self.rect[0] as i32,
            self.rect[1] as i32,
            self.rect[2] as i32,
            self.rect[3] as i32,
        )
    }

    /// Moves the representative towards `response` by its share of the
    /// accumulated weight.
    fn absorb(&mut self, response: &DetResponse) {
        let weight = i64::from(response.conf.max(1));
        self.weight += weight;
        self.conf += i64::from(response.conf);
        let ratio = (weight << DIV_DEC_PREC) / self.weight;
        for (rep, v) in self.rect.iter_mut().zip(corners(&response.rect).iter()) {
            *rep += math::right_shift_round((v - *rep) * ratio, DIV_DEC_PREC);
        }
    }

    fn into_response(self) -> DetResponse {
        let conf = self.conf.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        DetResponse::new(self.rect(), conf)
    }
}

#[inline]
fn corners(rect: &Rect<i32>) -> [i64; 4] {
    [
        i64::from(rect.left()),
        i64::from(rect.top()),
        i64::from(rect.right()),
        i64::from(rect.bottom()),
    ]
}

/// Single forward pass; returns the clusters and whether anything merged.
fn cluster_pass(responses: &[DetResponse], thresh: i64) -> (Vec<DetResponse>, bool) {
    let mut clusters: Vec<Cluster> = vec![];
    let mut merged = false;

    for response in responses {
        let best = clusters
            .iter()
            .enumerate()
            .map(|(i, c)| (i, iou_ratio(&c.rect(), &response.rect)))
            .fold(None, |best: Option<(usize, i64)>, (i, iou)| match best {
                Some((_, b)) if b >= iou => best,
                _ => Some((i, iou)),
            });

        match best {
            Some((index, iou)) if iou > thresh => {
                clusters[index].absorb(response);
                merged = true;
            }
            _ => clusters.push(Cluster::open(response)),
        }
    }

    let out = clusters.into_iter().map(Cluster::into_response).collect();
    (out, merged)
}

/// Groups overlapping responses into confidence-weighted clusters, in order
/// of cluster creation.
///
/// A response joins the open cluster it overlaps most when the IoU exceeds
/// `overlap_thresh`. Passes are repeated until nothing merges, so clustering
/// an already clustered list returns it unchanged. Clusters that only come to
/// overlap after an earlier pass are merged too, so the result can hold fewer
/// boxes than a single forward pass would give.
pub fn cluster_online(raw: &[DetResponse], overlap_thresh: f32) -> Result<Vec<DetResponse>> {
    check_rects(raw)?;
    let thresh = i64::from(math::encode(overlap_thresh, MERGE_RATIO_DEC_PREC));

    let (mut clusters, mut merged) = cluster_pass(raw, thresh);
    while merged && clusters.len() > 1 {
        let (next, again) = cluster_pass(&clusters, thresh);
        clusters = next;
        merged = again;
    }
    Ok(clusters)
}

/// Greedy suppression in order of decreasing confidence.
///
/// Responses below `conf_thresh` are dropped first. Equal confidences keep
/// their input order. A candidate is suppressed by an accepted response when
/// their IoU exceeds `max_overlap` or when more than `max_contain` of the
/// candidate's own area is covered.
pub fn non_maximum_suppression(
    responses: &[DetResponse],
    conf_thresh: f32,
    max_overlap: f32,
    max_contain: f32,
) -> Result<Vec<DetResponse>> {
    check_rects(responses)?;
    let conf_thresh = i64::from(math::encode(conf_thresh, MERGE_RATIO_DEC_PREC));
    let max_overlap = i64::from(math::encode(max_overlap, MERGE_RATIO_DEC_PREC));
    let max_contain = i64::from(math::encode(max_contain, MERGE_RATIO_DEC_PREC));

    let mut candidates: Vec<DetResponse> = responses
        .iter()
        .filter(|r| {
            math::rescale(i64::from(r.conf), SCORE_DEC_PREC, MERGE_RATIO_DEC_PREC) >= conf_thresh
        })
        .copied()
        .collect();
    candidates.sort_by(|a, b| b.conf.cmp(&a.conf));

    let mut suppressed = vec![false; candidates.len()];
    let mut accepted = vec![];
    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        let best = candidates[i];
        accepted.push(best);

        for (j, other) in candidates.iter().enumerate().skip(i + 1) {
            if suppressed[j] {
                continue;
            }
            if iou_ratio(&best.rect, &other.rect) > max_overlap
                || contain_ratio(&other.rect, &best.rect) > max_contain
            {
                suppressed[j] = true;
            }
        }
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: i64 = 1 << MERGE_RATIO_DEC_PREC;

    fn response(l: i32, t: i32, r: i32, b: i32, conf: f32) -> DetResponse {
        DetResponse::new(Rect::new(l, t, r, b), math::encode(conf, SCORE_DEC_PREC))
    }

    fn scattered() -> Vec<DetResponse> {
        let mut state = 7u32;
        let mut next = move |m: u32| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            ((state >> 16) % m) as i32
        };
        (0..60)
            .map(|_| {
                let (x, y, s) = (next(400), next(400), 40 + next(120));
                DetResponse::new(Rect::at(x, y, s, s), 256 + next(2048))
            })
            .collect()
    }

    #[test]
    fn test_iou_ratio() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 0, 150, 100);
        assert_eq!(ONE, iou_ratio(&a, &a));
        assert_eq!(iou_ratio(&a, &b), iou_ratio(&b, &a));
        assert_eq!(ONE / 3, iou_ratio(&a, &b));
        assert_eq!(0, iou_ratio(&a, &Rect::new(100, 0, 200, 100)));

        for pair in scattered().windows(2) {
            let (a, b) = (&pair[0].rect, &pair[1].rect);
            assert_eq!(iou_ratio(a, b), iou_ratio(b, a));
            assert_eq!(ONE, iou_ratio(&pair[0].rect, &pair[0].rect));
        }
    }

    #[test]
    fn test_contain_ratio_is_directional() {
        let small = Rect::new(10, 10, 20, 20);
        let big = Rect::new(0, 0, 100, 100);
        assert_eq!(ONE, contain_ratio(&small, &big));
        assert_eq!(ONE / 100, contain_ratio(&big, &small));
    }

    #[test]
    fn test_high_overlap_merges() {
        let raw = vec![response(0, 0, 100, 100, 2.0), response(0, 0, 100, 90, 3.0)];
        assert_eq!((ONE * 9) / 10, iou_ratio(&raw[0].rect, &raw[1].rect));
        let merged = cluster_online(&raw, 0.5).unwrap();
        assert_eq!(1, merged.len());
        assert_eq!(math::encode(5.0, SCORE_DEC_PREC), merged[0].conf);
    }

    #[test]
    fn test_low_overlap_stays_apart() {
        let raw = vec![response(0, 0, 100, 100, 2.0), response(0, 0, 10, 100, 3.0)];
        assert_eq!(ONE / 10, iou_ratio(&raw[0].rect, &raw[1].rect));
        assert_eq!(raw, cluster_online(&raw, 0.5).unwrap());
    }

    #[test]
    fn test_representative_is_weighted_average() {
        let raw = vec![response(0, 0, 100, 100, 1.0), response(20, 0, 120, 100, 3.0)];
        let merged = cluster_online(&raw, 0.5).unwrap();
        assert_eq!(vec![response(15, 0, 115, 100, 4.0)], merged);
    }

    #[test]
    fn test_clustering_is_idempotent_and_non_expansive() {
        let raw = scattered();
        for &thresh in &[0.3, 0.5, 0.7] {
            let once = cluster_online(&raw, thresh).unwrap();
            assert!(once.len() <= raw.len());
            assert_eq!(once, cluster_online(&once, thresh).unwrap());
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster_online(&[], 0.5).unwrap().is_empty());
        assert!(non_maximum_suppression(&[], 4.0, 0.6, 0.8).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_rect() {
        let raw = vec![response(0, 0, 100, 100, 5.0), response(30, 10, 30, 50, 5.0)];
        match cluster_online(&raw, 0.5) {
            Err(Error::MalformedRect { l: 30, r: 30, .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(non_maximum_suppression(&raw, 4.0, 0.6, 0.8).is_err());
    }

    #[test]
    fn test_nms_drops_low_confidence() {
        let list = vec![response(0, 0, 10, 10, 3.99), response(100, 0, 110, 10, 4.0)];
        let kept = non_maximum_suppression(&list, 4.0, 0.6, 0.8).unwrap();
        assert_eq!(vec![list[1]], kept);
    }

    #[test]
    fn test_nms_suppresses_contained_boxes() {
        let list = vec![
            response(10, 10, 30, 30, 5.0),
            response(0, 0, 100, 100, 9.0),
            response(200, 200, 260, 260, 6.0),
        ];
        let kept = non_maximum_suppression(&list, 4.0, 0.6, 0.8).unwrap();
        assert_eq!(vec![list[1], list[2]], kept);
    }

    #[test]
    fn test_nms_ties_keep_input_order() {
        let a = response(0, 0, 100, 100, 5.0);
        let b = response(10, 0, 110, 100, 5.0);
        assert_eq!(vec![a], non_maximum_suppression(&[a, b], 4.0, 0.6, 0.8).unwrap());
        assert_eq!(vec![b], non_maximum_suppression(&[b, a], 4.0, 0.6, 0.8).unwrap());
    }

    #[test]
    fn test_nms_output_properties() {
        let list = scattered();
        let (max_overlap, max_contain) = (0.3, 0.6);
        let kept = non_maximum_suppression(&list, 4.0, max_overlap, max_contain).unwrap();
        assert!(!kept.is_empty());

        let conf_thresh = math::encode(4.0, SCORE_DEC_PREC);
        let max_overlap = i64::from(math::encode(max_overlap, MERGE_RATIO_DEC_PREC));
        let max_contain = i64::from(math::encode(max_contain, MERGE_RATIO_DEC_PREC));
        for (i, a) in kept.iter().enumerate() {
            assert!(a.conf >= conf_thresh);
            for b in &kept[i + 1..] {
                assert!(a.conf >= b.conf);
                assert!(iou_ratio(&a.rect, &b.rect) <= max_overlap);
                assert!(contain_ratio(&b.rect, &a.rect) <= max_contain);
            }
        }
    }
}
