//! Memory descriptors and their canonical form.
//!
//! A core may leave `select`, `len` or `disconnect` at zero and expect the
//! host to derive them. Canonicalization fills them in against one shared
//! top address so every descriptor decodes addresses the same way:
//!
//!   hit:    (addr & select) == (start & select)
//!   offset: offset + gather(addr - start, !disconnect)

use std::ffi::CStr;

use retro_core_abi::{RetroMemoryDescriptor, MEMDESC_CONST};
use thiserror::Error;

use super::bits::{fill_below_highest, gather, highest_bit, scatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDescriptor {
    pub flags: u64,
    pub ptr: *mut u8,
    pub offset: usize,
    pub start: usize,
    pub select: usize,
    pub disconnect: usize,
    pub len: usize,
    pub addrspace: Option<String>,
}

impl Default for MemoryDescriptor {
    fn default() -> Self {
        Self {
            flags: 0,
            ptr: std::ptr::null_mut(),
            offset: 0,
            start: 0,
            select: 0,
            disconnect: 0,
            len: 0,
            addrspace: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("neither select nor len is set")]
    Underspecified,

    #[error("start {start:#x} sets bits outside select {select:#x}")]
    StartOutsideSelect { start: usize, select: usize },

    #[error("derived len overflows the address space")]
    LengthOverflow,
}

impl MemoryDescriptor {
    /// Deep-copies a descriptor declared by a core.
    ///
    /// # Safety
    /// `raw.addrspace` must be null or a valid C string.
    pub unsafe fn from_raw(raw: &RetroMemoryDescriptor) -> Self {
        let addrspace = (!raw.addrspace.is_null())
            .then(|| CStr::from_ptr(raw.addrspace).to_string_lossy().into_owned());
        Self {
            flags: raw.flags,
            ptr: raw.ptr.cast(),
            offset: raw.offset,
            start: raw.start,
            select: raw.select,
            disconnect: raw.disconnect,
            len: raw.len,
            addrspace,
        }
    }

    pub fn is_mapped(&self) -> bool {
        !self.ptr.is_null()
    }

    pub fn is_const(&self) -> bool {
        self.flags & MEMDESC_CONST != 0
    }

    /// Whether `addr` selects this descriptor.
    pub fn contains(&self, addr: usize) -> bool {
        (addr & self.select) == (self.start & self.select)
    }

    /// Byte offset from `ptr` backing `addr`, for a canonical descriptor.
    pub fn byte_offset(&self, addr: usize) -> Option<usize> {
        if !self.contains(addr) { return None; }
        let index = gather(addr.wrapping_sub(self.start), !self.disconnect);
        (index < self.len).then(|| self.offset + index)
    }
}

/// All-ones mask covering the highest address any descriptor reaches.
pub fn top_address(descriptors: &[MemoryDescriptor]) -> usize {
    let reach = descriptors.iter().fold(1usize, |acc, d| {
        let highest = if d.select != 0 { d.select } else { d.start.wrapping_add(d.len.saturating_sub(1)) };
        acc | highest
    });
    fill_below_highest(reach)
}

/// Fills in the derived fields of one descriptor against `top`.
pub fn canonicalize(desc: &MemoryDescriptor, top: usize) -> Result<MemoryDescriptor, DescriptorError> {
    let mut d = desc.clone();

    // 1) derive select from len rounded up to a power of two; len itself
    // still bounds the bytes that decode
    if d.select == 0 {
        if d.len == 0 { return Err(DescriptorError::Underspecified); }
        d.select = top & !scatter(fill_below_highest(d.len - 1), !d.disconnect);
    }

    // 2) derive len from the bits select leaves free
    if d.len == 0 {
        d.len = fill_below_highest(gather(top & !d.select, !d.disconnect))
            .checked_add(1)
            .ok_or(DescriptorError::LengthOverflow)?;
    }

    // 3) the base must not set selector bits
    if d.start & !d.select != 0 {
        return Err(DescriptorError::StartOutsideSelect { start: d.start, select: d.select });
    }

    // 4) disconnect address bits the descriptor has no storage for
    while gather(top & !d.select, !d.disconnect) >> 1 > d.len - 1 {
        let bit = highest_bit(top & !d.select & !d.disconnect);
        if bit == 0 { break; }
        d.disconnect |= bit;
    }

    // 5) keep disconnect inside the addressable range
    let mut mask = fill_below_highest(d.len - 1);
    d.disconnect &= mask;
    while (!mask >> 1) & d.disconnect != 0 {
        mask >>= 1;
        d.disconnect &= mask;
    }

    Ok(d)
}

/// Canonicalizes a declared map. Malformed descriptors are logged and
/// dropped; the rest keep their declaration order.
pub fn canonicalize_all(descriptors: &[MemoryDescriptor]) -> Vec<MemoryDescriptor> {
    let top = top_address(descriptors);
    descriptors
        .iter()
        .enumerate()
        .filter_map(|(i, desc)| match canonicalize(desc, top) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(index = i + 1, start = desc.start, "dropping memory descriptor: {e}");
                None
            }
        })
        .collect()
}
