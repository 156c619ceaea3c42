// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

use std::io;

use thiserror::Error;

/// Errors reported by the detection pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid construction-time parameters.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A model source could not be opened or read.
    #[error("failed to load model #{index}: {source}")]
    ModelLoad {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// A model stream was readable but its content is not a valid classifier.
    #[error("malformed model: {0}")]
    ModelFormat(String),

    /// The input image violates the detection preconditions.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// `detect` was called before models were successfully loaded.
    #[error("detector has no models loaded")]
    NotInitialized,

    #[error("pyramid level {index} out of range ({count} levels)")]
    LevelOutOfRange { index: usize, count: usize },

    #[error("malformed rectangle ({l}, {t}, {r}, {b})")]
    MalformedRect { l: i32, t: i32, r: i32, b: i32 },
}

pub type Result<T> = std::result::Result<T, Error>;
