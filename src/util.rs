//! Utility functions.

/// Returns the smallest multiple of `align` that is greater or equal to `value`
/// or `None` if no such multiple fits in a `usize`.
///
/// # Panics
/// Panics if `align` is not a power-of-two.
#[inline]
pub(crate) fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(
        align.is_power_of_two(),
        "align_up() should only be called with power-of-two alignments."
    );
    let mask = align - 1;
    value.checked_add(mask).map(|v| v & !mask)
}
