//! Bounded shared workspace
//!
//! The workspace owns a byte ledger with a fixed capacity and issues
//! named matrix views against it. Views own their buffers; the ledger
//! guarantees that the bytes held by live views plus the unallocated
//! remainder always equal the capacity, which is what the admission
//! scheduler bases its decisions on.

mod arena;
mod view;

pub use arena::SharedWorkspace;
pub use view::ArrayView;

/// Size of one matrix element in bytes (IEEE-754 double)
pub const ELEM_SIZE: usize = std::mem::size_of::<f64>();
