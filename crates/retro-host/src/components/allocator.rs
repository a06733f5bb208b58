use std::alloc::Layout;
use std::ptr::NonNull;

use super::Allocator;

/// Fixed-capacity bump allocator. The buffer never moves, so pointers stay
/// valid until the next `reset`.
pub struct BumpAllocator {
    buffer: Box<[u8]>,
    head: usize,
}

impl BumpAllocator {
    pub const DEFAULT_CAPACITY: usize = 64 * 1024;

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buffer: vec![0u8; capacity].into_boxed_slice(), head: 0 }
    }

    pub fn used(&self) -> usize {
        self.head
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for BumpAllocator {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl Allocator for BumpAllocator {
    fn reset(&mut self) {
        self.head = 0;
    }

    fn allocate(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        let base = self.buffer.as_mut_ptr() as usize;
        let align_m1 = layout.align() - 1;
        let offset = ((base + self.head + align_m1) & !align_m1) - base;

        if layout.size() > self.buffer.len().saturating_sub(offset) {
            tracing::error!(bytes = layout.size(), used = self.head, capacity = self.buffer.len(), "bump allocator exhausted");
            return None;
        }

        self.head = offset + layout.size();
        NonNull::new(unsafe { self.buffer.as_mut_ptr().add(offset) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_respect_alignment() {
        let mut alloc = BumpAllocator::with_capacity(128);
        alloc.allocate(Layout::from_size_align(3, 1).unwrap()).unwrap();
        let p = alloc.allocate(Layout::from_size_align(8, 8).unwrap()).unwrap();
        assert_eq!(p.as_ptr() as usize % 8, 0);
        assert!(alloc.used() >= 11);
    }

    #[test]
    fn exhaustion_returns_none_until_reset() {
        let mut alloc = BumpAllocator::with_capacity(16);
        let layout = Layout::from_size_align(12, 1).unwrap();
        assert!(alloc.allocate(layout).is_some());
        assert!(alloc.allocate(layout).is_none());
        alloc.reset();
        assert_eq!(alloc.used(), 0);
        assert!(alloc.allocate(layout).is_some());
    }
}
