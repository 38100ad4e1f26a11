use std::path::{Path, PathBuf};

use ndarray::Array2;

use super::{Chromosome, MafCutoff, VariantFile};
use crate::workspace::ArrayView;
use crate::{Result, TriError};

/// In-memory variant file: the fast back-end, also used by tests.
///
/// Holds a variants × samples dosage matrix and serves it through the
/// same cursor semantics as the streaming reader.
#[derive(Debug, Clone)]
pub struct MemoryVariantFile {
    path: PathBuf,
    chromosome: Chromosome,
    samples: Vec<String>,
    dosages: Array2<f64>,
    /// Raw indices offered to `read`, in order
    selected: Vec<usize>,
    cursor: usize,
}

impl MemoryVariantFile {
    /// Wrap a variants × samples dosage matrix
    pub fn new(
        chromosome: Chromosome,
        samples: Vec<String>,
        dosages: Array2<f64>,
    ) -> Result<Self> {
        if dosages.ncols() != samples.len() {
            return Err(TriError::ShapeMismatch(format!(
                "dosage matrix has {} columns for {} samples",
                dosages.ncols(),
                samples.len()
            )));
        }
        let selected = (0..dosages.nrows()).collect();
        Ok(Self {
            path: PathBuf::from(format!("memory://chr{chromosome}")),
            chromosome,
            samples,
            dosages,
            selected,
            cursor: 0,
        })
    }

    /// Restrict reading to the given variant indices, in the given order
    pub fn with_variant_indices(mut self, indices: Vec<usize>) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.dosages.nrows()) {
            return Err(TriError::ShapeMismatch(format!(
                "variant index {bad} out of range for {} variants",
                self.dosages.nrows()
            )));
        }
        self.selected = indices;
        self.cursor = 0;
        Ok(self)
    }
}

impl VariantFile for MemoryVariantFile {
    fn variant_count(&self) -> usize {
        self.selected.len() - self.cursor
    }

    fn samples(&self) -> &[String] {
        &self.samples
    }

    fn chromosome(&self) -> Chromosome {
        self.chromosome
    }

    fn file_path(&self) -> &Path {
        &self.path
    }

    fn read(&mut self, block: &mut ArrayView, predicate: &MafCutoff) -> Result<usize> {
        if block.cols() != self.sample_count() {
            return Err(TriError::ShapeMismatch(format!(
                "block is {} samples wide but the file has {}",
                block.cols(),
                self.sample_count()
            )));
        }

        let budget = block.rows();
        let mut view = block.view_mut();
        let mut written = 0;
        for _ in 0..budget {
            let Some(&raw) = self.selected.get(self.cursor) else {
                break;
            };
            self.cursor += 1;
            let variant: Vec<f64> = self.dosages.row(raw).iter().copied().collect();
            if predicate.accepts(&variant) {
                view.row_mut(written)
                    .iter_mut()
                    .zip(&variant)
                    .for_each(|(dst, &dosage)| *dst = dosage);
                written += 1;
            }
        }
        Ok(written)
    }
}
