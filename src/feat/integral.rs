// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

use num::traits::{WrappingAdd, WrappingSub};
use num::PrimInt;

use crate::common::ImageData;

/// Summed-area table with an extra leading zero row and column.
///
/// Accumulation wraps around; a rectangle sum is exact as long as the true
/// sum fits into `T`.
#[derive(Debug, Clone)]
pub struct IntegralImage<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T> IntegralImage<T>
where
    T: PrimInt + WrappingAdd + WrappingSub + From<u8>,
{
    pub fn compute(image: &ImageData<'_>) -> Self {
        IntegralImage::compute_with(image, <T as From<u8>>::from)
    }

    /// Integral of `map(pixel)`.
    pub fn compute_with<F>(image: &ImageData<'_>, map: F) -> Self
    where
        F: Fn(u8) -> T,
    {
        let width = image.width() as usize + 1;
        let height = image.height() as usize + 1;
        let mut data = vec![T::zero(); width * height];

        for y in 1..height {
            let src = image.row((y - 1) as u32);
            let (prev, cur) = data.split_at_mut(y * width);
            let prev = &prev[(y - 1) * width..];
            let cur = &mut cur[..width];

            let mut s = T::zero();
            for x in 1..width {
                s = s.wrapping_add(&map(src[x - 1]));
                cur[x] = prev[x].wrapping_add(&s);
            }
        }

        IntegralImage {
            width,
            height,
            data,
        }
    }

    /// Sum over the `w x h` rectangle at `(x, y)`. The rectangle must lie inside the image.
    #[inline]
    pub fn rect_sum(&self, x: usize, y: usize, w: usize, h: usize) -> T {
        debug_assert!(x + w < self.width && y + h < self.height);
        let top = y * self.width;
        let bottom = (y + h) * self.width;
        self.data[bottom + x + w]
            .wrapping_sub(&self.data[bottom + x])
            .wrapping_sub(&self.data[top + x + w])
            .wrapping_add(&self.data[top + x])
    }
}

#[cfg(test)]
mod tests {
    use super::IntegralImage;
    use crate::common::ImageData;

    #[test]
    fn test_rect_sums() {
        let data: Vec<u8> = (1..=12).collect();
        let image = ImageData::new(&data, 4, 3);
        let integral: IntegralImage<u32> = IntegralImage::compute(&image);

        assert_eq!(78, integral.rect_sum(0, 0, 4, 3));
        assert_eq!(1, integral.rect_sum(0, 0, 1, 1));
        assert_eq!(12, integral.rect_sum(3, 2, 1, 1));
        // 6 + 7 + 10 + 11
        assert_eq!(34, integral.rect_sum(1, 1, 2, 2));
    }

    #[test]
    fn test_square_sums_respect_stride() {
        let data = vec![2u8, 3, 99, 99, 4, 5, 99, 99];
        let image = ImageData::with_stride(&data, 2, 2, 4);
        let integral: IntegralImage<u64> =
            IntegralImage::compute_with(&image, |p| u64::from(p) * u64::from(p));
        assert_eq!(4 + 9 + 16 + 25, integral.rect_sum(0, 0, 2, 2));
    }

    #[test]
    fn test_wrapping_keeps_small_sums_exact() {
        let data = vec![255u8; 64 * 64];
        let image = ImageData::new(&data, 64, 64);
        let integral: IntegralImage<u16> = IntegralImage::compute(&image);
        // the full sum overflows u16, a 4x4 block does not
        assert_eq!(255 * 16, integral.rect_sum(30, 30, 4, 4));
    }
}
