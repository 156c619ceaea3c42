// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

//! Opaque window classifiers driven by the scanner.

mod lab_cascade;

pub use self::lab_cascade::{LabCascade, LabFeature, LabStage};

use crate::feat::LevelFeatures;

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum ClassifierKind {
    LabCascade,
}

impl ClassifierKind {
    #[inline]
    pub fn from(id: i32) -> Option<Self> {
        match id {
            0 => Some(ClassifierKind::LabCascade),
            _ => None,
        }
    }

    #[inline]
    pub fn id(self) -> i32 {
        match self {
            ClassifierKind::LabCascade => 0,
        }
    }
}

/// Outcome of classifying one window; the score has `SCORE_DEC_PREC` fractional bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    positive: bool,
    score: i32,
}

impl Score {
    #[inline]
    pub fn new(positive: bool, score: i32) -> Self {
        Score { positive, score }
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.positive
    }

    #[inline]
    pub fn score(&self) -> i32 {
        self.score
    }
}

/// A staged window classifier.
///
/// Implementations are immutable once loaded and may be shared between
/// threads; early rejection inside the cascade is their own business.
pub trait Classifier: Send + Sync {
    /// Reference window size `(width, height)` in level pixels.
    fn window_size(&self) -> (u32, u32);

    /// Classifies the window whose top-left corner is `(x, y)` in level
    /// coordinates. The window lies entirely inside `features`.
    fn classify(&self, features: &LevelFeatures, x: u32, y: u32) -> Score;
}
