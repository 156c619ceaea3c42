// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

use std::cmp;

use crate::common::ImageData;
use crate::math::FILTER_DEC_PREC;

const FILTER_TAPS: usize = 5;
const FILTER_UNIT: u32 = 1 << FILTER_DEC_PREC;
const IDENTITY_FILTER: [u8; FILTER_TAPS] = [0, 0, FILTER_UNIT as u8, 0, 0];
const BILINEAR_WEIGHT_BITS: u32 = 8;

/// Size of `size` resized by `2^bits / denom`.
#[inline]
pub fn scaled_size(size: u32, bits: u32, denom: u32) -> u32 {
    ((u64::from(size) << bits) / u64::from(denom)) as u32
}

/// 5-tap low-pass filter for a horizontal downsample by `down_sample_scale`
/// (source size over destination size).
///
/// The taps sample a Gaussian with `sigma^2 = -8 * f^2 * ln(nyquist_freq_ratio)`
/// and are quantized to `FILTER_DEC_PREC` bits, summing to exactly one.
pub fn filter5_for_downsample(down_sample_scale: f32, nyquist_freq_ratio: f32) -> [u8; 5] {
    if down_sample_scale <= 1.0 || nyquist_freq_ratio >= 1.0 || nyquist_freq_ratio <= 0.0 {
        return IDENTITY_FILTER;
    }

    let f = f64::from(down_sample_scale);
    let sigma2 = -8.0 * f * f * f64::from(nyquist_freq_ratio).ln();
    let mut weights = [0f64; FILTER_TAPS];
    for (i, w) in weights.iter_mut().enumerate() {
        let k = i as f64 - 2.0;
        *w = (-k * k / (2.0 * sigma2)).exp();
    }
    let total: f64 = weights.iter().sum();

    let mut taps = [0u8; FILTER_TAPS];
    let mut side_sum = 0u32;
    for i in [0, 1, 3, 4] {
        let tap = (weights[i] / total * f64::from(FILTER_UNIT)).round() as u32;
        taps[i] = tap as u8;
        side_sum += tap;
    }
    taps[2] = (FILTER_UNIT - side_sum) as u8;
    taps
}

/// Plain bilinear resize of `src` into a `dst_w x dst_h` destination.
///
/// Weights use fixed-point arithmetic only; a same-sized destination is a copy.
pub fn resize_bilinear(
    src: &ImageData<'_>,
    dst: &mut [u8],
    dst_stride: usize,
    dst_w: u32,
    dst_h: u32,
) {
    let src_w = src.width();
    let src_h = src.height();
    if dst_w == 0 || dst_h == 0 {
        return;
    }

    if src_w == dst_w && src_h == dst_h {
        for y in 0..dst_h {
            let start = y as usize * dst_stride;
            dst[start..start + dst_w as usize].copy_from_slice(src.row(y));
        }
        return;
    }

    let unit = 1u64 << BILINEAR_WEIGHT_BITS;
    let mask = unit - 1;
    for y in 0..dst_h {
        let pos_y = (u64::from(y) * u64::from(src_h) << BILINEAR_WEIGHT_BITS) / u64::from(dst_h);
        let (sy0, sy1) = neighbours((pos_y >> BILINEAR_WEIGHT_BITS) as u32, src_h);
        let wy = pos_y & mask;
        let row0 = src.row(sy0);
        let row1 = src.row(sy1);
        let out = &mut dst[y as usize * dst_stride..y as usize * dst_stride + dst_w as usize];

        for (x, d) in out.iter_mut().enumerate() {
            let pos_x = (x as u64 * u64::from(src_w) << BILINEAR_WEIGHT_BITS) / u64::from(dst_w);
            let (sx0, sx1) = neighbours((pos_x >> BILINEAR_WEIGHT_BITS) as u32, src_w);
            let wx = pos_x & mask;

            let top = u64::from(row0[sx0 as usize]) * (unit - wx)
                + u64::from(row0[sx1 as usize]) * wx;
            let bottom = u64::from(row1[sx0 as usize]) * (unit - wx)
                + u64::from(row1[sx1 as usize]) * wx;
            let value = top * (unit - wy) + bottom * wy;
            *d = ((value + (1 << (2 * BILINEAR_WEIGHT_BITS - 1))) >> (2 * BILINEAR_WEIGHT_BITS))
                as u8;
        }
    }
}

#[inline]
fn neighbours(index: u32, size: u32) -> (u32, u32) {
    let i0 = cmp::min(index, size - 1);
    (i0, cmp::min(i0 + 1, size - 1))
}

/// Resize ratio `2^bits / denom`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleRatio {
    pub bits: u32,
    pub denom: u32,
}

impl ScaleRatio {
    pub fn new(bits: u32, denom: u32) -> Self {
        ScaleRatio { bits, denom }
    }

    /// Source pixels per destination pixel.
    pub fn down_sample_scale(self) -> f32 {
        self.denom as f32 / (1u32 << self.bits) as f32
    }

    #[inline]
    fn apply(self, size: u32) -> u32 {
        scaled_size(size, self.bits, self.denom)
    }
}

/// Resizes greyscale images with hardware-friendly fixed-point ratios.
///
/// Scratch rows are kept between calls and only ever grow, so one resizer
/// must not be shared between concurrent callers.
#[derive(Debug, Default)]
pub struct Resizer {
    filter_buf: Vec<u8>,
    row_buf: [Vec<u32>; 2],
    row_tag: [Option<u32>; 2],
}

impl Resizer {
    pub fn new() -> Self {
        Resizer::default()
    }

    /// Total scratch length currently held, in elements.
    pub fn scratch_len(&self) -> usize {
        self.filter_buf.len() + self.row_buf[0].len() + self.row_buf[1].len()
    }

    /// Bilinear resize by `hor` and `ver` without anti-aliasing.
    pub fn resize_hw(
        &mut self,
        src: &ImageData<'_>,
        hor: ScaleRatio,
        ver: ScaleRatio,
        dst: &mut [u8],
        dst_stride: usize,
    ) -> (u32, u32) {
        self.resize_with_filter(src, hor, ver, IDENTITY_FILTER, dst, dst_stride)
    }

    /// Resize with a 5-tap horizontal low-pass filter sized from the horizontal
    /// ratio and `nyquist_freq_ratio`; vertically plain bilinear interpolation.
    ///
    /// Returns the destination size, `(w << hor.bits) / hor.denom` by
    /// `(h << ver.bits) / ver.denom`.
    pub fn resize_hor_filter5(
        &mut self,
        src: &ImageData<'_>,
        hor: ScaleRatio,
        ver: ScaleRatio,
        nyquist_freq_ratio: f32,
        dst: &mut [u8],
        dst_stride: usize,
    ) -> (u32, u32) {
        let filter = filter5_for_downsample(hor.down_sample_scale(), nyquist_freq_ratio);
        self.resize_with_filter(src, hor, ver, filter, dst, dst_stride)
    }

    fn resize_with_filter(
        &mut self,
        src: &ImageData<'_>,
        hor: ScaleRatio,
        ver: ScaleRatio,
        filter: [u8; 5],
        dst: &mut [u8],
        dst_stride: usize,
    ) -> (u32, u32) {
        let dst_w = hor.apply(src.width());
        let dst_h = ver.apply(src.height());
        if dst_w == 0 || dst_h == 0 {
            return (dst_w, dst_h);
        }

        grow(&mut self.filter_buf, src.width() as usize);
        for buf in self.row_buf.iter_mut() {
            grow(buf, dst_w as usize);
        }
        self.row_tag = [None, None];

        let total_bits = hor.bits + ver.bits;
        let ver_unit = 1u64 << ver.bits;
        let ver_mask = ver_unit - 1;

        for y in 0..dst_h {
            let pos = u64::from(y) * u64::from(ver.denom);
            let (sy0, sy1) = neighbours((pos >> ver.bits) as u32, src.height());
            let wy = pos & ver_mask;
            let (slot0, slot1) = self.load_rows(src, sy0, sy1, hor, &filter, dst_w);

            let row0 = &self.row_buf[slot0][..dst_w as usize];
            let row1 = &self.row_buf[slot1][..dst_w as usize];
            let start = y as usize * dst_stride;
            let out = &mut dst[start..start + dst_w as usize];
            for ((d, &a), &b) in out.iter_mut().zip(row0).zip(row1) {
                let value = u64::from(a) * (ver_unit - wy) + u64::from(b) * wy;
                *d = ((value + (1 << (total_bits - 1))) >> total_bits) as u8;
            }
        }

        (dst_w, dst_h)
    }

    /// Makes the horizontally resampled rows `sy0` and `sy1` available and
    /// returns their slots.
    fn load_rows(
        &mut self,
        src: &ImageData<'_>,
        sy0: u32,
        sy1: u32,
        hor: ScaleRatio,
        filter: &[u8; 5],
        dst_w: u32,
    ) -> (usize, usize) {
        let slot0 = match self.slot_of(sy0) {
            Some(slot) => slot,
            None => {
                let slot = if self.row_tag[0] == Some(sy1) { 1 } else { 0 };
                self.resample_row(src, sy0, slot, hor, filter, dst_w);
                slot
            }
        };
        let slot1 = match self.slot_of(sy1) {
            Some(slot) => slot,
            None => {
                let slot = 1 - slot0;
                self.resample_row(src, sy1, slot, hor, filter, dst_w);
                slot
            }
        };
        (slot0, slot1)
    }

    #[inline]
    fn slot_of(&self, row: u32) -> Option<usize> {
        self.row_tag.iter().position(|tag| *tag == Some(row))
    }

    fn resample_row(
        &mut self,
        src: &ImageData<'_>,
        y: u32,
        slot: usize,
        hor: ScaleRatio,
        filter: &[u8; 5],
        dst_w: u32,
    ) {
        let src_row = src.row(y);
        let filtered: &[u8] = if *filter == IDENTITY_FILTER {
            src_row
        } else {
            let src_w = src_row.len() as isize;
            let out = &mut self.filter_buf[..src_row.len()];
            for (x, o) in out.iter_mut().enumerate() {
                let mut acc = 0u32;
                for (k, &tap) in filter.iter().enumerate() {
                    let sx = (x as isize + k as isize - 2).clamp(0, src_w - 1);
                    acc += u32::from(tap) * u32::from(src_row[sx as usize]);
                }
                *o = ((acc + (FILTER_UNIT >> 1)) >> FILTER_DEC_PREC) as u8;
            }
            &self.filter_buf[..src_row.len()]
        };

        let hor_unit = 1u32 << hor.bits;
        let hor_mask = u64::from(hor_unit - 1);
        let out = &mut self.row_buf[slot][..dst_w as usize];
        for (x, o) in out.iter_mut().enumerate() {
            let pos = x as u64 * u64::from(hor.denom);
            let (sx0, sx1) = neighbours((pos >> hor.bits) as u32, filtered.len() as u32);
            let wx = (pos & hor_mask) as u32;
            *o = u32::from(filtered[sx0 as usize]) * (hor_unit - wx)
                + u32::from(filtered[sx1 as usize]) * wx;
        }
        self.row_tag[slot] = Some(y);
    }
}

fn grow<T: Copy + Default>(buf: &mut Vec<T>, len: usize) {
    if buf.len() < len {
        buf.resize(len, T::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        (0..height)
            .flat_map(|y| (0..width).map(move |x| ((x * 7 + y * 3) % 256) as u8))
            .collect()
    }

    #[test]
    fn test_scaled_size() {
        assert_eq!(512, scaled_size(512, 4, 16));
        assert_eq!(409, scaled_size(512, 4, 20));
        assert_eq!(256, scaled_size(512, 4, 32));
    }

    #[test]
    fn test_identity_filter() {
        assert_eq!(IDENTITY_FILTER, filter5_for_downsample(1.25, 1.0));
        assert_eq!(IDENTITY_FILTER, filter5_for_downsample(1.0, 0.5));
    }

    #[test]
    fn test_filter_is_normalized_and_symmetric() {
        for &(scale, ratio) in &[(1.25f32, 0.9f32), (2.0, 0.8), (4.0, 0.5)] {
            let taps = filter5_for_downsample(scale, ratio);
            let sum: u32 = taps.iter().map(|&t| u32::from(t)).sum();
            assert_eq!(FILTER_UNIT, sum);
            assert_eq!(taps[0], taps[4]);
            assert_eq!(taps[1], taps[3]);
            assert!(taps[2] >= taps[1] && taps[1] >= taps[0]);
        }
    }

    #[test]
    fn test_filter_widens_with_downsample_ratio() {
        let narrow = filter5_for_downsample(1.25, 0.9);
        let wide = filter5_for_downsample(3.0, 0.9);
        assert!(wide[2] < narrow[2]);
    }

    #[test]
    fn test_unit_ratio_copies_image() {
        let (w, h) = (23, 11);
        let data = gradient(w, h);
        let src = ImageData::new(&data, w, h);
        let mut dst = vec![0u8; (w * h) as usize];
        let mut resizer = Resizer::new();
        let size = resizer.resize_hor_filter5(
            &src,
            ScaleRatio::new(4, 16),
            ScaleRatio::new(4, 16),
            0.5,
            &mut dst,
            w as usize,
        );
        assert_eq!((w, h), size);
        assert_eq!(data, dst);
    }

    #[test]
    fn test_constant_image_stays_constant() {
        let (w, h) = (40, 30);
        let data = vec![117u8; (w * h) as usize];
        let src = ImageData::new(&data, w, h);
        let mut resizer = Resizer::new();
        let mut dst = vec![0u8; 64 * 30];
        let (dw, dh) = resizer.resize_hor_filter5(
            &src,
            ScaleRatio::new(4, 20),
            ScaleRatio::new(4, 20),
            0.7,
            &mut dst,
            64,
        );
        assert_eq!((32, 24), (dw, dh));
        for y in 0..dh as usize {
            assert!(dst[y * 64..y * 64 + dw as usize].iter().all(|&p| p == 117));
        }
    }

    #[test]
    fn test_half_scale_picks_even_pixels() {
        let (w, h) = (8, 4);
        let data = gradient(w, h);
        let src = ImageData::new(&data, w, h);
        let mut resizer = Resizer::new();
        let mut dst = vec![0u8; 4 * 2];
        let size = resizer.resize_hw(
            &src,
            ScaleRatio::new(4, 32),
            ScaleRatio::new(4, 32),
            &mut dst,
            4,
        );
        assert_eq!((4, 2), size);
        for y in 0..2 {
            for x in 0..4 {
                assert_eq!(data[(2 * y * w + 2 * x) as usize], dst[(y * 4 + x) as usize]);
            }
        }
    }

    #[test]
    fn test_scratch_only_grows() {
        let mut resizer = Resizer::new();
        let big = vec![0u8; 200 * 50];
        let small = vec![0u8; 20 * 10];
        let mut dst = vec![0u8; 200 * 50];

        resizer.resize_hw(
            &ImageData::new(&big, 200, 50),
            ScaleRatio::new(4, 20),
            ScaleRatio::new(4, 20),
            &mut dst,
            200,
        );
        let grown = resizer.scratch_len();
        resizer.resize_hw(
            &ImageData::new(&small, 20, 10),
            ScaleRatio::new(4, 20),
            ScaleRatio::new(4, 20),
            &mut dst,
            200,
        );
        assert_eq!(grown, resizer.scratch_len());
    }

    #[test]
    fn test_resize_bilinear_copy_and_shrink() {
        let (w, h) = (10, 6);
        let data = gradient(w, h);
        let src = ImageData::new(&data, w, h);

        let mut same = vec![0u8; (w * h) as usize];
        resize_bilinear(&src, &mut same, w as usize, w, h);
        assert_eq!(data, same);

        let flat = vec![200u8; 100];
        let mut dst = vec![0u8; 3 * 3];
        resize_bilinear(&ImageData::new(&flat, 10, 10), &mut dst, 3, 3, 3);
        assert!(dst.iter().all(|&p| p == 200));
    }
}
