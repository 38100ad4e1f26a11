//! The per-chromosome triangular artifact
//!
//! An S×S factor wrapping a workspace view, with the metadata needed to
//! decide cache reuse and to stack chunks during reduction. Rows are in
//! original sample order; entries above the diagonal are unspecified.

mod file;

use crate::variants::Chromosome;
use crate::workspace::ArrayView;
use crate::{Result, TriError};

/// Lower-triangular factor of one chromosome's scaled dosage matrix
pub struct Triangular {
    view: ArrayView,
    chromosome: Chromosome,
    samples: Vec<String>,
    variant_count: usize,
    maf_cutoff: f64,
}

impl std::fmt::Debug for Triangular {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Triangular")
            .field("chromosome", &self.chromosome)
            .field("sample_count", &self.sample_count())
            .field("variant_count", &self.variant_count)
            .field("maf_cutoff", &self.maf_cutoff)
            .finish()
    }
}

impl Triangular {
    /// Wrap a square workspace view and its metadata
    pub fn new(
        view: ArrayView,
        chromosome: Chromosome,
        samples: Vec<String>,
        variant_count: usize,
        maf_cutoff: f64,
    ) -> Result<Self> {
        if view.rows() != samples.len() || view.cols() != view.rows() {
            return Err(TriError::ShapeMismatch(format!(
                "triangular view is {}x{} for {} samples",
                view.rows(),
                view.cols(),
                samples.len()
            )));
        }
        Ok(Self {
            view,
            chromosome,
            samples,
            variant_count,
            maf_cutoff,
        })
    }

    /// File name of the on-disk artifact for a chromosome
    pub fn file_name(chromosome: Chromosome) -> String {
        format!("chr{chromosome}.tri.txt.gz")
    }

    /// The wrapped workspace view
    pub fn view(&self) -> &ArrayView {
        &self.view
    }

    /// Number of samples (matrix height)
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Ordered sample identifiers
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Chromosome this factor summarises
    pub fn chromosome(&self) -> Chromosome {
        self.chromosome
    }

    /// Variants reduced into this factor so far
    pub fn variant_count(&self) -> usize {
        self.variant_count
    }

    /// Allele frequency cutoff the variants were filtered with
    pub fn maf_cutoff(&self) -> f64 {
        self.maf_cutoff
    }

    /// Take the view out for merging, dropping the metadata
    pub(crate) fn into_view(self) -> ArrayView {
        self.view
    }

    /// Keep only the given samples, moving their columns into the
    /// leading positions and shrinking the width.
    ///
    /// The result is no longer triangular and is intended solely as SVD
    /// input. A no-op when the argument equals the current sample list.
    pub fn subset_samples(&mut self, samples: &[String]) -> Result<()> {
        if samples == self.samples {
            // Nothing to do.
            return Ok(());
        }

        let indices = samples
            .iter()
            .map(|sample| {
                self.samples
                    .iter()
                    .position(|s| s == sample)
                    .ok_or_else(|| TriError::UnknownSample(sample.clone()))
            })
            .collect::<Result<Vec<usize>>>()?;

        let rows = self.view.rows();
        let mut scratch = vec![0.0; indices.len()];
        let mut view = self.view.view_mut();
        for r in 0..rows {
            for (k, &src) in indices.iter().enumerate() {
                scratch[k] = view[[r, src]];
            }
            for (k, &value) in scratch.iter().enumerate() {
                view[[r, k]] = value;
            }
        }

        self.view.resize(rows, indices.len())?;
        self.samples = samples.to_vec();
        Ok(())
    }

    /// Return the factor's bytes to the workspace
    pub fn free(self) {
        self.view.free();
    }
}
