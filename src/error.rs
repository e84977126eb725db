use thiserror::Error;

/// Reasons why a request could not be served.
///
/// Every failure leaves the allocator exactly as it was: no region is mapped,
/// no block changes state and every pointer handed out before stays valid.
/// None of these are ever logged or retried, the caller decides what to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// Zero bytes were requested. This is not really an error, there is just
    /// no storage to hand out.
    #[error("zero-sized request")]
    ZeroSize,
    /// `count * elem_size` does not fit in a `usize`.
    #[error("requested size overflows usize")]
    Overflow,
    /// The kernel refused to map a new region.
    #[error("no memory available to map a new region")]
    Exhausted,
}
