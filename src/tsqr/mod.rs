//! Tall-skinny QR over a variant file
//!
//! `map` triangularizes as much of the file as fits into the workspace;
//! `reduce` stacks chunk R-factors and re-triangularizes, which yields
//! the R factor of the full matrix (the TSQR identity). The driver
//! alternates the two, reducing whenever the workspace runs out.

use std::sync::Arc;

use tracing::{debug, info};

use crate::linalg::{apply_row_order, invert_pivot, scale_rows, triangularize};
use crate::sched::TaskSync;
use crate::tri::Triangular;
use crate::variants::{MafCutoff, VariantFile};
use crate::workspace::{ArrayView, SharedWorkspace, ELEM_SIZE};
use crate::{Result, TriError};

/// Streaming triangularization of one chromosome's variant file
pub struct TallSkinnyQr<'a, F: VariantFile> {
    file: &'a mut F,
    workspace: Arc<SharedWorkspace>,
    predicate: MafCutoff,
    sync: Option<Arc<TaskSync>>,
}

impl<F: VariantFile> std::fmt::Debug for TallSkinnyQr<'_, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TallSkinnyQr")
            .field("file", &self.file.file_path())
            .field("chromosome", &self.file.chromosome())
            .field("maf_cutoff", &self.predicate.cutoff())
            .finish()
    }
}

impl<'a, F: VariantFile> TallSkinnyQr<'a, F> {
    /// Triangularize `file` through `workspace`, filtering variants
    /// with `predicate`
    pub fn new(file: &'a mut F, workspace: Arc<SharedWorkspace>, predicate: MafCutoff) -> Self {
        Self {
            file,
            workspace,
            predicate,
            sync: None,
        }
    }

    /// Attach scheduler sync state: `can_run` is signalled as soon as a
    /// map claims the rest of the file, and `should_exit` is honoured
    /// between blocks
    pub fn with_sync(mut self, sync: Arc<TaskSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Triangularize as much of the variant file as fits into the
    /// workspace.
    ///
    /// Returns `Ok(None)` once the file is exhausted. Fails with
    /// [`TriError::InsufficientSpace`] when fewer than `sample_count`
    /// block columns fit; the driver recovers from that by reducing.
    pub fn map(&mut self) -> Result<Option<Triangular>> {
        let sample_count = self.file.sample_count();
        let unallocated = self.workspace.unallocated_size();

        let mut block_variants = unallocated / (ELEM_SIZE * sample_count);
        if block_variants < sample_count {
            return Err(TriError::InsufficientSpace {
                needed: sample_count * sample_count * ELEM_SIZE,
                available: unallocated,
            });
        }
        let remaining = self.file.variant_count();
        if block_variants >= remaining {
            debug!(
                "there is space for {block_variants} block columns but only {remaining} are left"
            );
            if let Some(sync) = &self.sync {
                // The rest of the file fits, so the next task can size
                // its block against what this one leaves behind.
                sync.can_run.set();
            }
            // Keep at least sample_count columns so the block can
            // regrow to square after a short read.
            block_variants = remaining.max(sample_count);
        }

        let name = self
            .workspace
            .next_name(&format!("chr{}-tri", self.file.chromosome()));
        let mut block = self
            .workspace
            .alloc(&name, sample_count, block_variants)?;
        debug!(
            "mapping up to {block_variants} variants from {} into {name:?}",
            self.file.file_path().display()
        );

        // The reader fills the transposed orientation, variants as rows.
        block.transpose();
        let variant_count = self.file.read(&mut block, &self.predicate)?;
        if variant_count == 0 {
            block.free();
            return Ok(None);
        }

        // Shrink to the variants actually written, then scale and
        // triangularize in the variants × samples orientation.
        block.transpose();
        block.resize(sample_count, variant_count)?;
        block.transpose();
        scale_rows(block.view_mut())?;
        let pivot = triangularize(block.view_mut());

        // Keep R^T, rows permuted back to the original sample order. A
        // short final block regrows to square with zero-filled columns.
        block.transpose();
        block.resize(sample_count, sample_count)?;
        apply_row_order(block.view_mut(), &invert_pivot(&pivot));

        Triangular::new(
            block,
            self.file.chromosome(),
            self.file.samples().to_vec(),
            variant_count,
            self.predicate.cutoff(),
        )
        .map(Some)
    }

    /// Run maps until the file is exhausted, reducing whenever the
    /// workspace cannot fit another block, and return the final factor.
    ///
    /// Fails with [`TriError::EmptyFilter`] when not a single variant
    /// passes the filter, and propagates [`TriError::InsufficientSpace`]
    /// when even an empty workspace could not fit one block.
    pub fn map_reduce(mut self) -> Result<Triangular> {
        let mut chunks: Vec<Triangular> = Vec::new();
        loop {
            if let Some(sync) = &self.sync {
                if sync.should_exit.is_set() {
                    return Err(TriError::Shutdown);
                }
            }
            match self.map() {
                Ok(Some(chunk)) => chunks.push(chunk),
                Ok(None) => break,
                // With at least two chunks pending, reducing frees
                // enough room to retry the map.
                Err(TriError::InsufficientSpace { .. }) if chunks.len() > 1 => {
                    chunks = vec![reduce(chunks)?];
                }
                Err(error) => return Err(error),
            }
        }

        if chunks.is_empty() {
            return Err(TriError::EmptyFilter {
                path: self.file.file_path().to_path_buf(),
            });
        }
        reduce(chunks)
    }
}

/// Reduce chunk factors into one by merging them side by side and
/// re-triangularizing.
///
/// A single chunk passes through unchanged. Chunks must agree on
/// chromosome and (to within relative 1e-9) on the frequency cutoff;
/// the result carries the summed variant count, the first operand's
/// samples and the smallest cutoff.
pub fn reduce(mut chunks: Vec<Triangular>) -> Result<Triangular> {
    match chunks.len() {
        0 => {
            return Err(TriError::IncompatibleChunks(
                "cannot reduce zero chunks".into(),
            ))
        }
        1 => return Ok(chunks.swap_remove(0)),
        k => info!("reducing {k} chunks"),
    }

    let chromosome = chunks[0].chromosome();
    if let Some(other) = chunks.iter().find(|c| c.chromosome() != chromosome) {
        return Err(TriError::IncompatibleChunks(format!(
            "chromosome {} mixed with chromosome {chromosome}",
            other.chromosome()
        )));
    }
    if let Some(other) = chunks.iter().find(|c| c.samples() != chunks[0].samples()) {
        return Err(TriError::IncompatibleChunks(format!(
            "chunks for chromosome {chromosome} disagree on samples ({} vs {})",
            other.sample_count(),
            chunks[0].sample_count()
        )));
    }
    let min_cutoff = chunks
        .iter()
        .map(Triangular::maf_cutoff)
        .fold(f64::INFINITY, f64::min);
    let max_cutoff = chunks
        .iter()
        .map(Triangular::maf_cutoff)
        .fold(f64::NEG_INFINITY, f64::max);
    if max_cutoff - min_cutoff > 1e-9 * max_cutoff.abs() {
        return Err(TriError::IncompatibleChunks(format!(
            "frequency cutoffs differ: {min_cutoff} vs {max_cutoff}"
        )));
    }

    let samples = chunks[0].samples().to_vec();
    let sample_count = samples.len();
    let variant_count = chunks.iter().map(Triangular::variant_count).sum();

    let workspace = Arc::clone(chunks[0].view().workspace());
    let views: Vec<ArrayView> = chunks.into_iter().map(Triangular::into_view).collect();
    let mut merged = workspace.merge(views)?;

    merged.transpose();
    let pivot = triangularize(merged.view_mut());
    merged.transpose();
    merged.resize(sample_count, sample_count)?;
    apply_row_order(merged.view_mut(), &invert_pivot(&pivot));

    Triangular::new(merged, chromosome, samples, variant_count, min_cutoff)
}
