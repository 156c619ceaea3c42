// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

use crate::error::{Error, Result};

/// Borrowed single-channel 8-bit image with an explicit row stride.
#[derive(Debug, Clone, Copy)]
pub struct ImageData<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: u32,
}

impl<'a> ImageData<'a> {
    /// Image with tightly packed rows.
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Self {
        ImageData::with_stride(data, width, height, width)
    }

    pub fn with_stride(data: &'a [u8], width: u32, height: u32, stride: u32) -> Self {
        ImageData {
            data,
            width,
            height,
            stride,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The `width` visible pixels of row `y`.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = (y * self.stride) as usize;
        &self.data[start..start + self.width as usize]
    }

    /// Checks the preconditions of detection: non-zero size, `stride >= width`
    /// and a buffer holding at least `stride * height` bytes.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidImage(format!(
                "non-positive size {}x{}",
                self.width, self.height
            )));
        }
        if self.stride < self.width {
            return Err(Error::InvalidImage(format!(
                "stride {} is less than width {}",
                self.stride, self.width
            )));
        }
        let required = self.stride as usize * self.height as usize;
        if self.data.len() < required {
            return Err(Error::InvalidImage(format!(
                "buffer holds {} bytes, {} required",
                self.data.len(),
                required
            )));
        }
        Ok(())
    }
}
