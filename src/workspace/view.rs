use std::sync::Arc;

use ndarray::{ArrayView2, ArrayViewMut2};

use super::arena::SharedWorkspace;
use super::ELEM_SIZE;
use crate::{Result, TriError};

/// A named matrix view issued by a [`SharedWorkspace`].
///
/// The buffer is row-major in the shape the view was allocated with;
/// [`transpose`](ArrayView::transpose) swaps the logical shape without
/// touching the data, and [`resize`](ArrayView::resize) reshapes in
/// place within the original allocation. Dropping the view credits its
/// bytes back to the ledger.
pub struct ArrayView {
    name: String,
    workspace: Arc<SharedWorkspace>,
    data: Vec<f64>,
    /// Current base (allocation-order) shape; the logical shape swaps
    /// these when the transposed flag is set
    base_rows: usize,
    base_cols: usize,
    /// Shape of the first allocation; `resize` may not exceed it
    alloc_rows: usize,
    alloc_cols: usize,
    transposed: bool,
}

impl std::fmt::Debug for ArrayView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayView")
            .field("name", &self.name)
            .field("rows", &self.rows())
            .field("cols", &self.cols())
            .field("transposed", &self.transposed)
            .finish()
    }
}

impl ArrayView {
    pub(crate) fn new(
        name: String,
        workspace: Arc<SharedWorkspace>,
        data: Vec<f64>,
        rows: usize,
        cols: usize,
    ) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self {
            name,
            workspace,
            data,
            base_rows: rows,
            base_cols: cols,
            alloc_rows: rows,
            alloc_cols: cols,
            transposed: false,
        }
    }

    /// Unique name of this view within its workspace
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The workspace this view was issued by
    pub fn workspace(&self) -> &Arc<SharedWorkspace> {
        &self.workspace
    }

    /// Logical row count
    pub fn rows(&self) -> usize {
        if self.transposed {
            self.base_cols
        } else {
            self.base_rows
        }
    }

    /// Logical column count
    pub fn cols(&self) -> usize {
        if self.transposed {
            self.base_rows
        } else {
            self.base_cols
        }
    }

    /// Bytes currently accounted to this view
    pub fn bytes(&self) -> usize {
        self.base_rows * self.base_cols * ELEM_SIZE
    }

    /// Swap the logical shape; the buffer is untouched
    pub fn transpose(&mut self) {
        self.transposed = !self.transposed;
    }

    /// Read-only ndarray view in the logical orientation
    pub fn view(&self) -> ArrayView2<'_, f64> {
        let occupied = &self.data[..self.base_rows * self.base_cols];
        let base = ArrayView2::from_shape((self.base_rows, self.base_cols), occupied)
            .expect("view buffer matches its base shape");
        if self.transposed {
            base.reversed_axes()
        } else {
            base
        }
    }

    /// Mutable ndarray view in the logical orientation
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        let occupied = &mut self.data[..self.base_rows * self.base_cols];
        let base = ArrayViewMut2::from_shape((self.base_rows, self.base_cols), occupied)
            .expect("view buffer matches its base shape");
        if self.transposed {
            base.reversed_axes()
        } else {
            base
        }
    }

    /// Reshape to logical shape `(rows, cols)` in place, compacting or
    /// spreading the buffer as needed. Shrinking credits the freed
    /// bytes back to the ledger; regrowing, which is legal up to the
    /// shape the view was first allocated with, debits them again and
    /// zero-fills the newly exposed region. Exceeding the original
    /// allocation fails with [`TriError::ShapeMismatch`].
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<()> {
        // Map the logical request onto the base layout.
        let (new_rows, new_cols) = if self.transposed {
            (cols, rows)
        } else {
            (rows, cols)
        };
        if new_rows > self.alloc_rows || new_cols > self.alloc_cols {
            return Err(TriError::ShapeMismatch(format!(
                "cannot resize view {:?} to {rows}x{cols} beyond its {}x{} allocation",
                self.name, self.alloc_rows, self.alloc_cols
            )));
        }

        self.workspace
            .update(&self.name, new_rows * new_cols * ELEM_SIZE)?;

        let (old_rows, old_cols) = (self.base_rows, self.base_cols);
        let kept = old_rows.min(new_rows);
        if new_cols < old_cols {
            // Compact surviving row prefixes towards the front.
            for r in 1..kept {
                self.data
                    .copy_within(r * old_cols..r * old_cols + new_cols, r * new_cols);
            }
        } else if new_cols > old_cols {
            // Spread rows back out, zeroing the newly exposed tail.
            for r in (0..kept).rev() {
                self.data
                    .copy_within(r * old_cols..(r + 1) * old_cols, r * new_cols);
                self.data[r * new_cols + old_cols..(r + 1) * new_cols].fill(0.0);
            }
        }
        if new_rows > old_rows {
            self.data[old_rows * new_cols..new_rows * new_cols].fill(0.0);
        }

        self.base_rows = new_rows;
        self.base_cols = new_cols;
        Ok(())
    }

    /// Return the view's bytes to the workspace
    pub fn free(self) {
        drop(self);
    }
}

impl Drop for ArrayView {
    fn drop(&mut self) {
        self.workspace.release(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_is_a_flag_flip() {
        let ws = SharedWorkspace::new(4096);
        let mut v = ws.alloc("v", 2, 3).unwrap();
        v.view_mut()
            .iter_mut()
            .zip([1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .for_each(|(x, val)| *x = val);

        v.transpose();
        assert_eq!((v.rows(), v.cols()), (3, 2));
        assert_eq!(v.view()[[0, 1]], 4.0);
        assert_eq!(v.view()[[2, 0]], 3.0);

        v.transpose();
        assert_eq!((v.rows(), v.cols()), (2, 3));
        assert_eq!(v.view()[[1, 0]], 4.0);
    }

    #[test]
    fn resize_compacts_rows_and_credits_ledger() {
        let ws = SharedWorkspace::new(4096);
        let mut v = ws.alloc("v", 3, 4).unwrap();
        let values: Vec<f64> = (0..12).map(f64::from).collect();
        v.view_mut()
            .iter_mut()
            .zip(values)
            .for_each(|(x, val)| *x = val);

        v.resize(3, 2).unwrap();
        assert_eq!((v.rows(), v.cols()), (3, 2));
        assert_eq!(v.view().row(0).to_vec(), vec![0.0, 1.0]);
        assert_eq!(v.view().row(1).to_vec(), vec![4.0, 5.0]);
        assert_eq!(v.view().row(2).to_vec(), vec![8.0, 9.0]);
        assert_eq!(ws.unallocated_size(), 4096 - 6 * ELEM_SIZE);
    }

    #[test]
    fn resize_regrows_within_the_original_allocation() {
        let ws = SharedWorkspace::new(4096);
        let mut v = ws.alloc("v", 3, 4).unwrap();
        let values: Vec<f64> = (1..=12).map(f64::from).collect();
        v.view_mut()
            .iter_mut()
            .zip(values)
            .for_each(|(x, val)| *x = val);

        v.resize(3, 2).unwrap();
        v.resize(3, 4).unwrap();
        assert_eq!((v.rows(), v.cols()), (3, 4));
        assert_eq!(v.view().row(0).to_vec(), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(v.view().row(1).to_vec(), vec![5.0, 6.0, 0.0, 0.0]);
        assert_eq!(v.view().row(2).to_vec(), vec![9.0, 10.0, 0.0, 0.0]);
        assert_eq!(ws.unallocated_size(), 4096 - 12 * ELEM_SIZE);

        assert!(
            v.resize(4, 4).is_err(),
            "regrowth must stop at the original allocation"
        );
    }

    #[test]
    fn resize_respects_the_transposed_orientation() {
        let ws = SharedWorkspace::new(4096);
        let mut v = ws.alloc("v", 2, 4).unwrap();
        let values: Vec<f64> = (0..8).map(f64::from).collect();
        v.view_mut()
            .iter_mut()
            .zip(values)
            .for_each(|(x, val)| *x = val);

        v.transpose(); // logical 4x2
        v.resize(3, 2).unwrap(); // keep three variants
        assert_eq!((v.rows(), v.cols()), (3, 2));
        assert_eq!(v.view()[[2, 1]], 6.0);
    }
}
