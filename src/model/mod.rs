// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

//! Loading of classifier models from byte streams.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::slice;

use byteorder::{LittleEndian, ReadBytesExt};
use log::info;

use crate::classifier::{Classifier, ClassifierKind, LabCascade};
use crate::error::{Error, Result};

/// Ordered classifiers, immutable once loaded.
#[derive(Default)]
pub struct ModelSet {
    models: Vec<Box<dyn Classifier>>,
}

impl ModelSet {
    pub fn new(models: Vec<Box<dyn Classifier>>) -> Self {
        ModelSet { models }
    }

    /// Reads one classifier per source, in order.
    ///
    /// The first failing source aborts loading; nothing read so far is kept.
    pub fn load<R, I>(sources: I) -> Result<Self>
    where
        R: Read,
        I: IntoIterator<Item = R>,
    {
        let mut models = vec![];
        for (index, mut source) in sources.into_iter().enumerate() {
            let model = read_model(&mut source).map_err(|e| load_error(index, e))?;
            let (w, h) = model.window_size();
            info!("loaded model #{} with {}x{} reference window", index, w, h);
            models.push(model);
        }
        Ok(ModelSet { models })
    }

    pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut files = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            let file = File::open(path).map_err(|source| Error::ModelLoad { index, source })?;
            files.push(BufReader::new(file));
        }
        Self::load(files)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Classifier> {
        self.models.get(index).map(|model| model.as_ref())
    }

    /// Reference window size of the model at `index`.
    pub fn ref_size(&self, index: usize) -> Option<(u32, u32)> {
        self.get(index).map(|model| model.window_size())
    }

    pub fn iter(&self) -> slice::Iter<'_, Box<dyn Classifier>> {
        self.models.iter()
    }

    pub fn as_slice(&self) -> &[Box<dyn Classifier>] {
        &self.models
    }

    pub fn clear(&mut self) {
        self.models.clear();
    }
}

/// Reads one self-delimiting classifier: an `i32` kind id followed by the
/// kind-specific body.
pub fn read_model<R: Read>(reader: &mut R) -> io::Result<Box<dyn Classifier>> {
    let kind_id = reader.read_i32::<LittleEndian>()?;
    match ClassifierKind::from(kind_id) {
        Some(ClassifierKind::LabCascade) => Ok(Box::new(LabCascade::read_from(reader)?)),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected classifier kind id: {}", kind_id),
        )),
    }
}

pub fn load_model<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn Classifier>> {
    let mut reader = BufReader::new(File::open(path)?);
    read_model(&mut reader)
}

fn load_error(index: usize, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::InvalidData => Error::ModelFormat(format!("model #{}: {}", index, err)),
        _ => Error::ModelLoad { index, source: err },
    }
}
