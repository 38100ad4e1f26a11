use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::view::ArrayView;
use super::ELEM_SIZE;
use crate::{Result, TriError};

/// Capacity-bounded ledger issuing named matrix views.
///
/// All sizes are in bytes. Allocation debits the ledger, dropping a view
/// credits it back; `merge` retires its inputs and re-issues the same
/// bytes, so it can never fail for space.
pub struct SharedWorkspace {
    capacity: usize,
    ledger: Mutex<Ledger>,
}

#[derive(Debug)]
struct Ledger {
    unallocated: usize,
    /// Bytes held by each live view, keyed by its unique name
    views: HashMap<String, usize>,
}

impl std::fmt::Debug for SharedWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedWorkspace")
            .field("capacity", &self.capacity)
            .field("unallocated", &self.unallocated_size())
            .finish()
    }
}

impl SharedWorkspace {
    /// Create a workspace with the given capacity in bytes
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            ledger: Mutex::new(Ledger {
                unallocated: capacity,
                views: HashMap::new(),
            }),
        })
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes not currently held by any view
    pub fn unallocated_size(&self) -> usize {
        self.lock().unallocated
    }

    /// Bytes held by live views
    pub fn allocated_size(&self) -> usize {
        self.lock().views.values().sum()
    }

    /// Smallest unused name of the form `{prefix}-{i}`
    pub fn next_name(&self, prefix: &str) -> String {
        let ledger = self.lock();
        (0..)
            .map(|i| format!("{prefix}-{i}"))
            .find(|name| !ledger.views.contains_key(name))
            .expect("the name sequence is unbounded")
    }

    /// Allocate a zero-filled view of logical shape `(rows, cols)`.
    ///
    /// Fails with [`TriError::InsufficientSpace`] when the ledger cannot
    /// cover `8 * rows * cols` bytes and with [`TriError::DuplicateName`]
    /// when a live view already carries `name`.
    pub fn alloc(self: &Arc<Self>, name: &str, rows: usize, cols: usize) -> Result<ArrayView> {
        let bytes = rows * cols * ELEM_SIZE;
        self.debit(name, bytes)?;
        Ok(ArrayView::new(
            name.to_owned(),
            Arc::clone(self),
            vec![0.0; rows * cols],
            rows,
            cols,
        ))
    }

    /// Concatenate views with identical logical row count along the
    /// column axis, retiring the inputs and re-issuing their bytes under
    /// the first input's name. A single view passes through unchanged.
    pub fn merge(self: &Arc<Self>, views: Vec<ArrayView>) -> Result<ArrayView> {
        let mut views = views;
        if views.is_empty() {
            return Err(TriError::ShapeMismatch(
                "merge requires at least one view".into(),
            ));
        }
        if views.len() == 1 {
            return Ok(views.swap_remove(0));
        }

        let rows = views[0].rows();
        if let Some(v) = views.iter().find(|v| v.rows() != rows) {
            return Err(TriError::ShapeMismatch(format!(
                "cannot merge view {:?} with {} rows into a block of {} rows",
                v.name(),
                v.rows(),
                rows
            )));
        }

        let total_cols: usize = views.iter().map(|v| v.cols()).sum();
        let mut data = Vec::with_capacity(rows * total_cols);
        for r in 0..rows {
            for view in &views {
                data.extend(view.view().row(r).iter());
            }
        }

        let name = views[0].name().to_owned();
        // Retire the inputs before re-issuing their bytes; the net ledger
        // change is zero, so the debit below cannot fail for space.
        drop(views);
        self.debit(&name, data.len() * ELEM_SIZE)?;
        Ok(ArrayView::new(name, Arc::clone(self), data, rows, total_cols))
    }

    fn debit(&self, name: &str, bytes: usize) -> Result<()> {
        let mut ledger = self.lock();
        if ledger.views.contains_key(name) {
            return Err(TriError::DuplicateName(name.to_owned()));
        }
        if ledger.unallocated < bytes {
            return Err(TriError::InsufficientSpace {
                needed: bytes,
                available: ledger.unallocated,
            });
        }
        ledger.unallocated -= bytes;
        ledger.views.insert(name.to_owned(), bytes);
        Ok(())
    }

    /// Credit a view's bytes back. No-op when the name has already been
    /// retired, which makes release exactly-once under `Drop`.
    pub(crate) fn release(&self, name: &str) {
        let mut ledger = self.lock();
        if let Some(bytes) = ledger.views.remove(name) {
            ledger.unallocated += bytes;
        }
    }

    /// Record a view reshaping in place. Shrinking credits the
    /// difference back; regrowing debits it again and fails with
    /// [`TriError::InsufficientSpace`] when the ledger cannot cover it.
    pub(crate) fn update(&self, name: &str, new_bytes: usize) -> Result<()> {
        let mut ledger = self.lock();
        let Some(&bytes) = ledger.views.get(name) else {
            return Ok(());
        };
        if new_bytes > bytes {
            let growth = new_bytes - bytes;
            if ledger.unallocated < growth {
                return Err(TriError::InsufficientSpace {
                    needed: growth,
                    available: ledger.unallocated,
                });
            }
            ledger.unallocated -= growth;
        } else {
            ledger.unallocated += bytes - new_bytes;
        }
        ledger.views.insert(name.to_owned(), new_bytes);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger
            .lock()
            .expect("a ledger operation panicked while holding the lock")
    }
}
