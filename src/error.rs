//! Defines the [`AllocError`] type.

use std::error::Error;
use std::fmt;

/// Errors reported by [`FirstFit::allocate`](crate::FirstFit::allocate).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The request was for zero bytes. Zero-sized requests are rejected
    /// rather than rounded up to a real block.
    ZeroSize,
    /// The request can never be served, even from a brand-new chunk:
    /// the aligned size plus a header exceeds the chunk capacity.
    /// Reported before any chunk is reserved.
    RequestTooLarge {
        /// The size that was requested.
        requested: usize,
        /// The largest size the allocator can serve, see
        /// [`FirstFit::max_request`](crate::FirstFit::max_request).
        max: usize,
    },
    /// The chunk source failed to reserve another chunk.
    /// The allocator is left untouched and prior allocations stay usable.
    OutOfMemory {
        /// Capacity in bytes of the chunk that could not be reserved.
        capacity: usize,
    },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::ZeroSize => write!(f, "cannot allocate zero bytes"),
            AllocError::RequestTooLarge { requested, max } => {
                write!(f, "requested {requested} bytes but at most {max} fit in a chunk")
            }
            AllocError::OutOfMemory { capacity } => {
                write!(f, "could not reserve a new {capacity}-byte chunk")
            }
        }
    }
}

impl Error for AllocError {}
