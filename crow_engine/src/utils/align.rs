/// Alignment helpers for GPU buffer layouts

/// Round `size` up to the next multiple of `alignment`.
///
/// An `alignment` of zero leaves the size untouched, matching the
/// convention devices use when they report no alignment requirement.
pub fn align_up(size: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return size;
    }
    (size + alignment - 1) & !(alignment - 1)
}

/// Pad a uniform block size to the device's dynamic-offset alignment.
///
/// Per-frame regions packed into one uniform buffer must each start on
/// `min_uniform_buffer_offset_alignment`, so the stride between regions
/// is the padded size, not the raw struct size.
pub fn pad_uniform_size(size: u64, min_alignment: u64) -> u64 {
    align_up(size, min_alignment)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "align_tests.rs"]
mod tests;
