//! Flattening canonical descriptors into an address-ordered region list.

use super::bits::gather;
use super::descriptor::MemoryDescriptor;

/// A span of the exposed address space and the core memory behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// First bus address covered
    pub start: usize,
    pub len: usize,
    /// Descriptor `ptr + offset`; null when the span has no storage
    pub data: *mut u8,
    /// Distance of `start` from the descriptor's own start
    pub skip: usize,
    pub disconnect: usize,
    pub writable: bool,
}

impl Region {
    pub fn unmapped(start: usize, len: usize) -> Self {
        Self { start, len, data: std::ptr::null_mut(), skip: 0, disconnect: 0, writable: false }
    }

    pub fn contiguous(start: usize, data: *mut u8, len: usize, writable: bool) -> Self {
        Self { start, len, data, skip: 0, disconnect: 0, writable }
    }

    pub fn is_mapped(&self) -> bool {
        !self.data.is_null()
    }

    /// Pointer to the byte at `index` within this region.
    pub fn byte(&self, index: usize) -> Option<*mut u8> {
        if !self.is_mapped() || index >= self.len { return None; }
        let at = gather(self.skip + index, !self.disconnect);
        Some(unsafe { self.data.add(at) })
    }
}

/// Regions of the primary address space (the tag of the first descriptor),
/// sorted by start. A region overlapping its predecessor loses the overlap;
/// one that is fully shadowed disappears.
pub fn regions_from_map(descriptors: &[MemoryDescriptor]) -> Vec<Region> {
    let Some(first) = descriptors.first() else { return Vec::new() };
    let primary = first.addrspace.as_deref();

    let mut ordered: Vec<&MemoryDescriptor> = descriptors
        .iter()
        .filter(|d| d.addrspace.as_deref() == primary && d.len > 0)
        .collect();
    ordered.sort_by_key(|d| d.start);

    let mut regions: Vec<Region> = Vec::with_capacity(ordered.len());
    let mut covered = 0usize;

    for d in ordered {
        let end = d.start.saturating_add(d.len);
        let skip = if regions.is_empty() { 0 } else { covered.saturating_sub(d.start) };
        if skip >= d.len {
            tracing::debug!(start = d.start, len = d.len, "memory descriptor fully shadowed");
            continue;
        }
        let data = if d.is_mapped() { unsafe { d.ptr.add(d.offset) } } else { std::ptr::null_mut() };
        regions.push(Region {
            start: d.start + skip,
            len: d.len - skip,
            data,
            skip,
            disconnect: d.disconnect,
            writable: !d.is_const(),
        });
        covered = covered.max(end);
    }

    regions
}
