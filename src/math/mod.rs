// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

//! Fixed-point helpers.
//!
//! Every fixed-point quantity in the crate is an integer paired with one of the
//! fractional-bit counts below; conversion to and from floating point happens
//! only at module boundaries.

/// Fractional bits of detection coordinates.
pub const COORD_DEC_PREC: u32 = 2;
/// Fractional bits of detection confidences.
pub const SCORE_DEC_PREC: u32 = 8;
/// Fractional bits of the ratio used for weighted averaging during clustering.
pub const DIV_DEC_PREC: u32 = 12;
/// Fractional bits of overlap/containment ratios and confidence thresholds in merging.
pub const MERGE_RATIO_DEC_PREC: u32 = 10;
/// Fractional bits of pyramid level scales.
pub const SCALE_DEC_PREC: u32 = 16;
/// Fractional bits of resize filter taps.
pub const FILTER_DEC_PREC: u32 = 7;

const MEM_ALIGN_STEP: usize = 16;

#[inline]
pub fn encode(value: f32, bits: u32) -> i32 {
    (f64::from(value) * f64::from(1u32 << bits)).round() as i32
}

#[inline]
pub fn decode(value: i32, bits: u32) -> f32 {
    (f64::from(value) / f64::from(1u32 << bits)) as f32
}

/// Changes the fractional-bit count of a fixed-point value, rounding when bits are dropped.
#[inline]
pub fn rescale(value: i64, from_bits: u32, to_bits: u32) -> i64 {
    if to_bits >= from_bits {
        value << (to_bits - from_bits)
    } else {
        right_shift_round(value, from_bits - to_bits)
    }
}

#[inline]
pub fn right_shift_round(value: i64, bits: u32) -> i64 {
    if bits == 0 {
        value
    } else {
        (value + (1 << (bits - 1))) >> bits
    }
}

/// Integer division rounding half up. `denom` must be positive.
#[inline]
pub fn div_round(numer: i64, denom: i64) -> i64 {
    debug_assert!(denom > 0);
    (2 * numer + denom).div_euclid(2 * denom)
}

#[inline]
pub fn div_up(numer: usize, denom: usize) -> usize {
    (numer + denom - 1) / denom
}

#[inline]
pub fn align_step_round_up(x: usize) -> usize {
    div_up(x, MEM_ALIGN_STEP) * MEM_ALIGN_STEP
}

/// `numer / denom` with `MERGE_RATIO_DEC_PREC` fractional bits, truncated.
#[inline]
pub fn merge_ratio(numer: i64, denom: i64) -> i64 {
    if denom <= 0 {
        return 0;
    }
    (numer << MERGE_RATIO_DEC_PREC) / denom
}
