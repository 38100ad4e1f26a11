//! Dense kernels for the triangularization pipeline
//!
//! All routines operate in place on `ndarray` views handed out by the
//! workspace, so no kernel allocates more than scratch space for one
//! column or one row permutation.

mod pivot;
mod qr;
mod scale;

pub use pivot::{apply_row_order, invert_pivot, Pivot};
pub use qr::triangularize;
pub use scale::scale_rows;
