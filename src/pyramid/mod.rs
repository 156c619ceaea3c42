// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

//! Padded greyscale buffers and multi-scale pyramids built from them.

mod builder;
mod resizer;

pub use self::builder::{FixedPointPyramid, OctavePyramid};
pub use self::resizer::{
    filter5_for_downsample, resize_bilinear, scaled_size, Resizer, ScaleRatio,
};

use std::fmt;

use crate::common::{ImageData, Rect};
use crate::error::{Error, Result};
use crate::math::{self, SCALE_DEC_PREC};

/// Owned greyscale buffer with 16-byte aligned rows.
#[derive(Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    stride: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let stride = math::align_step_round_up(width as usize) as u32;
        PixelBuffer {
            width,
            height,
            stride,
            data: vec![0; stride as usize * height as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.stride) as usize;
        &self.data[start..start + self.width as usize]
    }

    pub fn view(&self) -> ImageData<'_> {
        ImageData::with_stride(&self.data, self.width, self.height, self.stride)
    }

    /// Fills a `pad` pixel frame by replicating the nearest pixel of the
    /// interior `(width - 2 * pad) x (height - 2 * pad)` area.
    pub fn replicate_border(&mut self, pad: u32) {
        if pad == 0 {
            return;
        }
        let stride = self.stride as usize;
        let width = self.width as usize;
        let pad = pad as usize;
        let inner_w = width - 2 * pad;
        let inner_h = self.height as usize - 2 * pad;

        for y in pad..(pad + inner_h) {
            let row = &mut self.data[y * stride..y * stride + width];
            let first = row[pad];
            let last = row[pad + inner_w - 1];
            row[..pad].iter_mut().for_each(|p| *p = first);
            row[pad + inner_w..].iter_mut().for_each(|p| *p = last);
        }

        let (head, rest) = self.data.split_at_mut(pad * stride);
        let top = &rest[..width];
        for y in 0..pad {
            head[y * stride..y * stride + width].copy_from_slice(top);
        }

        let last_row = pad + inner_h - 1;
        let (body, tail) = self.data.split_at_mut((last_row + 1) * stride);
        let bottom = &body[last_row * stride..last_row * stride + width];
        for y in 0..pad {
            tail[y * stride..y * stride + width].copy_from_slice(bottom);
        }
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .finish()
    }
}

/// Scale factor with `SCALE_DEC_PREC` fractional bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedScale(u32);

impl FixedScale {
    pub const ONE: FixedScale = FixedScale(1 << SCALE_DEC_PREC);

    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        FixedScale(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// `numer / denom`, rounded. A zero `denom` gives zero.
    pub fn ratio(numer: u32, denom: u32) -> Self {
        let value = math::div_round(i64::from(numer) << SCALE_DEC_PREC, i64::from(denom));
        FixedScale(value as u32)
    }

    /// `self * numer / denom`, rounded.
    pub fn mul_ratio(self, numer: u32, denom: u32) -> Self {
        let value = math::div_round(i64::from(self.0) * i64::from(numer), i64::from(denom));
        FixedScale(value as u32)
    }

    pub fn to_f32(self) -> f32 {
        math::decode(self.0 as i32, SCALE_DEC_PREC)
    }
}

/// One resized, border-padded copy of the source image.
///
/// Scales are the level's actual size over the source size, per axis.
#[derive(Debug)]
pub struct PyramidLevel {
    buffer: PixelBuffer,
    pad: u32,
    scale_x: FixedScale,
    scale_y: FixedScale,
}

impl PyramidLevel {
    fn new(width: u32, height: u32, pad: u32, source_size: (u32, u32)) -> Self {
        PyramidLevel {
            buffer: PixelBuffer::new(width + 2 * pad, height + 2 * pad),
            pad,
            scale_x: FixedScale::ratio(width, source_size.0),
            scale_y: FixedScale::ratio(height, source_size.1),
        }
    }

    /// Unpadded width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buffer.width - 2 * self.pad
    }

    /// Unpadded height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buffer.height - 2 * self.pad
    }

    #[inline]
    pub fn pad(&self) -> u32 {
        self.pad
    }

    /// Horizontal scale, which also orders the levels of a pyramid.
    #[inline]
    pub fn scale(&self) -> FixedScale {
        self.scale_x
    }

    #[inline]
    pub fn scale_x(&self) -> FixedScale {
        self.scale_x
    }

    #[inline]
    pub fn scale_y(&self) -> FixedScale {
        self.scale_y
    }

    /// The padded buffer; level coordinates refer to it.
    #[inline]
    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// Bounds of the padded buffer in level coordinates.
    pub fn bounds(&self) -> Rect<i32> {
        Rect::new(0, 0, self.buffer.width as i32, self.buffer.height as i32)
    }

    /// View of the unpadded image.
    pub fn interior(&self) -> ImageData<'_> {
        let offset = self.interior_offset();
        ImageData::with_stride(
            &self.buffer.data[offset..],
            self.width(),
            self.height(),
            self.buffer.stride,
        )
    }

    fn interior_offset(&self) -> usize {
        (self.pad * self.buffer.stride + self.pad) as usize
    }

    fn interior_mut(&mut self) -> (&mut [u8], usize) {
        let offset = self.interior_offset();
        let stride = self.buffer.stride as usize;
        (&mut self.buffer.data[offset..], stride)
    }
}

/// Levels ordered from the finest (index 0) to the coarsest.
#[derive(Debug, Default)]
pub struct Pyramid {
    levels: Vec<PyramidLevel>,
    pad_border: u32,
    source_width: u32,
    source_height: u32,
}

impl Pyramid {
    fn reset(&mut self, pad_border: u32, source_width: u32, source_height: u32) {
        self.levels.clear();
        self.pad_border = pad_border;
        self.source_width = source_width;
        self.source_height = source_height;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, index: usize) -> Result<&PyramidLevel> {
        self.levels.get(index).ok_or(Error::LevelOutOfRange {
            index,
            count: self.levels.len(),
        })
    }

    pub fn scale(&self, index: usize) -> Result<FixedScale> {
        self.level(index).map(PyramidLevel::scale)
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    pub fn scales(&self) -> Vec<FixedScale> {
        self.levels.iter().map(PyramidLevel::scale).collect()
    }

    #[inline]
    pub fn pad_border(&self) -> u32 {
        self.pad_border
    }

    /// Size of the image the pyramid was built from.
    pub fn source_size(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }
}

/// Strategy building a pyramid out of a source image.
///
/// The pyramid is rebuilt from scratch on every call; builders keep their
/// resize scratch memory between calls.
pub trait PyramidBuilder: Send {
    fn build(&mut self, image: &ImageData<'_>) -> Result<&Pyramid>;

    /// The pyramid produced by the last `build` call.
    fn pyramid(&self) -> &Pyramid;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_buffer_stride_is_aligned() {
        let buffer = PixelBuffer::new(37, 5);
        assert_eq!(48, buffer.stride());
        assert_eq!(48 * 5, buffer.data().len());
    }

    #[test]
    fn test_replicate_border() {
        let pad = 2;
        let mut level = PyramidLevel::new(3, 2, pad, (3, 2));
        {
            let (data, stride) = level.interior_mut();
            data[..3].copy_from_slice(&[1, 2, 3]);
            data[stride..stride + 3].copy_from_slice(&[4, 5, 6]);
        }
        level.buffer.replicate_border(pad);

        let buffer = level.buffer();
        assert_eq!(&[1, 1, 1, 2, 3, 3, 3], buffer.row(0));
        assert_eq!(&[1, 1, 1, 2, 3, 3, 3], buffer.row(2));
        assert_eq!(&[4, 4, 4, 5, 6, 6, 6], buffer.row(3));
        assert_eq!(&[4, 4, 4, 5, 6, 6, 6], buffer.row(5));
        assert_eq!(&[1, 2, 3], level.interior().row(0));
    }

    #[test]
    fn test_fixed_scale_ratio() {
        let scale = FixedScale::ONE.mul_ratio(16, 20);
        assert_eq!(52429, scale.raw());
        assert!((scale.to_f32() - 0.8).abs() < 1e-4);
        assert_eq!(FixedScale::ONE, FixedScale::ratio(512, 512));
        assert_eq!(8576, FixedScale::ratio(67, 512).raw());
        assert!(scale < FixedScale::ONE);
    }

    #[test]
    fn test_level_access_out_of_range() {
        let pyramid = Pyramid::default();
        assert!(matches!(
            pyramid.level(0),
            Err(Error::LevelOutOfRange { index: 0, count: 0 })
        ));
    }
}
