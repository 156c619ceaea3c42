// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

//! Per-level feature maps shared by all classifiers scanning a level.

mod integral;

pub use self::integral::IntegralImage;

use crate::common::ImageData;

/// Integral images of one (padded) pyramid level.
#[derive(Debug, Clone)]
pub struct LevelFeatures {
    width: u32,
    height: u32,
    sum: IntegralImage<u32>,
    square_sum: IntegralImage<u64>,
}

impl LevelFeatures {
    pub fn compute(image: &ImageData<'_>) -> Self {
        LevelFeatures {
            width: image.width(),
            height: image.height(),
            sum: IntegralImage::compute(image),
            square_sum: IntegralImage::compute_with(image, |p| u64::from(p) * u64::from(p)),
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

    /// Pixel sum of the `w x h` block at `(x, y)`.
    #[inline]
    pub fn rect_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u32 {
        self.sum
            .rect_sum(x as usize, y as usize, w as usize, h as usize)
    }

    /// `area^2 * variance` of the block, exact in integers.
    pub fn scaled_variance(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let area = u64::from(w) * u64::from(h);
        let sum = u64::from(self.rect_sum(x, y, w, h));
        let square_sum =
            self.square_sum
                .rect_sum(x as usize, y as usize, w as usize, h as usize);
        (area * square_sum).saturating_sub(sum * sum)
    }

    /// Locally assembled binary code of the 3x3 grid of `cell_w x cell_h`
    /// cells whose top-left corner is `(x, y)`.
    ///
    /// Each bit is set when the centre cell sum is not smaller than the sum of
    /// one neighbour cell.
    pub fn lab_code(&self, x: u32, y: u32, cell_w: u32, cell_h: u32) -> u8 {
        let centre = self.rect_sum(x + cell_w, y + cell_h, cell_w, cell_h);
        let cell =
            |col: u32, row: u32| self.rect_sum(x + col * cell_w, y + row * cell_h, cell_w, cell_h);

        let mut code = 0u8;
        for &(col, row, bit) in LAB_NEIGHBOURS.iter() {
            if centre >= cell(col, row) {
                code |= bit;
            }
        }
        code
    }
}

const LAB_NEIGHBOURS: [(u32, u32, u8); 8] = [
    (0, 0, 0x80),
    (1, 0, 0x40),
    (2, 0, 0x20),
    (2, 1, 0x08),
    (2, 2, 0x01),
    (1, 2, 0x02),
    (0, 2, 0x04),
    (0, 1, 0x10),
];
