//! # Per-chromosome TSQR triangularization for GWAS
//!
//! This library reduces the scaled dosage matrix of each autosomal
//! chromosome to a compact S×S triangular factor suitable for SVD and
//! null-model estimation, where S is the number of samples.
//!
//! ## Pipeline
//!
//! 1. **Map**: read as many variants as fit into the shared workspace,
//!    scale each variant to zero mean and unit allele variance, and
//!    triangularize in place with column pivoting
//! 2. **Reduce**: concatenate chunk R-factors side by side and
//!    re-triangularize (the tall-skinny QR identity)
//! 3. **Schedule**: run one map-reduce per chromosome on worker threads,
//!    admitting workers only while the workspace can hold their block
//!
//! Only the R factor is kept; Q is never formed.
//!
//! ## Usage Example
//!
//! ```ignore
//! use gwas_tri::{calc_tri, SharedWorkspace, TextDosageFile};
//!
//! let workspace = SharedWorkspace::new(2 << 30);
//! let paths = calc_tri(&chromosomes, files, out_dir, workspace, &[], 0.05)?;
//! ```

#![warn(missing_docs, missing_debug_implementations)]

// Core modules - leaves first
pub mod workspace; // Bounded workspace issuing named matrix views
pub mod linalg;    // Scaler and pivoted Householder QR kernel
pub mod variants;  // Variant-file back-ends and the MAF predicate
pub mod tri;       // Triangular artifact and its on-disk codec
pub mod tsqr;      // Map, reduce and the map-reduce driver
pub mod sched;     // Task sync, workers and the admission scheduler

// Re-exports for convenience
pub use linalg::{invert_pivot, Pivot};
pub use sched::{calc_tri, TaskSync, TriWorker};
pub use tri::Triangular;
pub use tsqr::TallSkinnyQr;
pub use variants::{Chromosome, MafCutoff, MemoryVariantFile, TextDosageFile, VariantFile};
pub use workspace::{ArrayView, SharedWorkspace};

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while triangularizing
#[derive(Error, Debug)]
pub enum TriError {
    /// The workspace cannot fit a block of at least `sample_count` columns.
    /// Recoverable inside the map-reduce driver by reducing pending chunks.
    #[error("workspace has {available} bytes free but the next block needs {needed}")]
    InsufficientSpace {
        /// Bytes the allocation would need
        needed: usize,
        /// Bytes currently unallocated
        available: usize,
    },

    /// A variant row had zero variance after filtering
    #[error("variant row {row} has zero variance after the allele frequency filter")]
    NumericDegeneracy {
        /// Row index within the block being scaled
        row: usize,
    },

    /// Reduce was called with chunks that do not belong together
    #[error("cannot reduce incompatible chunks: {0}")]
    IncompatibleChunks(String),

    /// No variant passed the allele frequency filter
    #[error("no variants passed the allele frequency filter in {}", path.display())]
    EmptyFilter {
        /// The variant file that produced no rows
        path: PathBuf,
    },

    /// An expected output file is missing after the run
    #[error("could not find output file {}", path.display())]
    MissingOutput {
        /// The expected output path
        path: PathBuf,
    },

    /// A worker thread failed; carries the underlying error
    #[error("worker for chromosome {chromosome} failed: {source}")]
    Worker {
        /// Chromosome the worker was triangularizing
        chromosome: Chromosome,
        /// The error raised inside the worker
        #[source]
        source: Box<TriError>,
    },

    /// A view name is already allocated in the workspace
    #[error("view name {0:?} is already allocated")]
    DuplicateName(String),

    /// An operation was applied to a view of unsuitable shape
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// `subset_samples` was given a sample the artifact does not carry
    #[error("sample {0:?} is not present in the triangular factor")]
    UnknownSample(String),

    /// The allele frequency cutoff is outside its domain
    #[error("allele frequency cutoff {0} is outside [0, 0.5]")]
    InvalidCutoff(f64),

    /// A variant or triangular file could not be parsed
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        /// File being parsed
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// The scheduler requested shutdown while work was in flight
    #[error("shutdown requested before the chromosome was finished")]
    Shutdown,

    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, TriError>;
