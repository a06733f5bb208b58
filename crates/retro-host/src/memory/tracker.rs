//! Keeps the published banks in step with the memory a core exposes.
//!
//! Sources, in order of preference:
//!   1. the declared memory map (primary address space only)
//!   2. SYSTEM_RAM followed by SAVE_RAM
//!   3. a read-only copy of the serialized state

use std::ffi::c_uint;
use std::time::{Duration, Instant};

use retro_core_abi::{MEMORY_SAVE_RAM, MEMORY_SYSTEM_RAM};

use super::banks::{build_banks, signature, Signature};
use super::descriptor::MemoryDescriptor;
use super::publish::{self, MemoryConsumer};
use super::regions::{regions_from_map, Region};

/// Shortest time between two refreshes of the snapshot bank.
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(10);

/// What the tracker needs from a running core.
pub trait MemorySource {
    /// Bumped whenever the core declares a new memory map.
    fn map_generation(&self) -> u64;
    /// Canonical descriptors, in declaration order.
    fn memory_map(&self) -> Vec<MemoryDescriptor>;
    fn memory_region(&self, id: c_uint) -> (*mut u8, usize);
    fn serialize_size(&self) -> usize;
    fn serialize_into(&self, buf: &mut [u8]) -> bool;
}

#[derive(Debug)]
struct Snapshot {
    buffer: Box<[u8]>,
    taken: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct MemoryTracker {
    published: Option<Signature>,
    generation: Option<u64>,
    declared: Vec<Region>,
    snapshot: Option<Snapshot>,
    reported_empty: bool,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds and republishes the banks when the exposed memory changed.
    /// Returns true when `consumer` received a new layout.
    pub fn sync(&mut self, source: &dyn MemorySource, consumer: &mut dyn MemoryConsumer) -> bool {
        let regions = self.current_regions(source);
        let sig = signature(&regions);
        if self.published.as_ref() == Some(&sig) { return false; }

        let banks = build_banks(&regions);
        tracing::debug!(regions = regions.len(), banks = banks.len(), total = sig.total, "memory layout changed");
        publish::publish(&banks, consumer);
        self.published = Some(sig);
        true
    }

    /// Withdraws every bank and forgets the cached layout.
    pub fn clear(&mut self, consumer: &mut dyn MemoryConsumer) {
        publish::clear(consumer);
        *self = Self::default();
    }

    fn current_regions(&mut self, source: &dyn MemorySource) -> Vec<Region> {
        let generation = source.map_generation();
        if self.generation != Some(generation) {
            self.declared = regions_from_map(&source.memory_map());
            self.generation = Some(generation);
        }
        if !self.declared.is_empty() {
            self.snapshot = None;
            return self.declared.clone();
        }

        let implicit = implicit_regions(source);
        if !implicit.is_empty() {
            self.snapshot = None;
            return implicit;
        }

        self.snapshot_region(source).into_iter().collect()
    }

    fn snapshot_region(&mut self, source: &dyn MemorySource) -> Option<Region> {
        let size = source.serialize_size();
        if size == 0 {
            self.snapshot = None;
            if !self.reported_empty {
                tracing::warn!("core exposes no memory and no serializable state");
                self.reported_empty = true;
            }
            return None;
        }

        if self.snapshot.as_ref().map_or(true, |s| s.buffer.len() != size) {
            self.snapshot = Some(Snapshot { buffer: vec![0; size].into_boxed_slice(), taken: None });
        }
        let snapshot = self.snapshot.as_mut()?;
        let stale = snapshot.taken.map_or(true, |t| t.elapsed() >= SNAPSHOT_INTERVAL);
        if stale {
            if !source.serialize_into(&mut snapshot.buffer) {
                tracing::debug!(size, "state snapshot failed");
            }
            snapshot.taken = Some(Instant::now());
        }
        Some(Region::contiguous(0, snapshot.buffer.as_mut_ptr(), size, false))
    }
}

fn implicit_regions(source: &dyn MemorySource) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut start = 0usize;
    for id in [MEMORY_SYSTEM_RAM, MEMORY_SAVE_RAM] {
        let (data, size) = source.memory_region(id);
        if size == 0 { continue; }
        regions.push(if data.is_null() { Region::unmapped(start, size) } else { Region::contiguous(start, data, size, true) });
        start += size;
    }
    regions
}

impl Drop for MemoryTracker {
    fn drop(&mut self) {
        // the snapshot bank points into this tracker's buffer
        if self.published.is_some() { publish::invalidate(); }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::sync::PoisonError;

    use super::*;
    use crate::memory::publish::{LoggingConsumer, TEST_TABLE_LOCK};

    #[derive(Default)]
    struct FakeSource {
        generation: Cell<u64>,
        map: RefCell<Vec<MemoryDescriptor>>,
        wram: RefCell<Vec<u8>>,
        sram: RefCell<Vec<u8>>,
        state: RefCell<Vec<u8>>,
        serialized: Cell<usize>,
    }

    impl MemorySource for FakeSource {
        fn map_generation(&self) -> u64 {
            self.generation.get()
        }

        fn memory_map(&self) -> Vec<MemoryDescriptor> {
            self.map.borrow().clone()
        }

        fn memory_region(&self, id: c_uint) -> (*mut u8, usize) {
            let buf = match id {
                MEMORY_SYSTEM_RAM => &self.wram,
                MEMORY_SAVE_RAM => &self.sram,
                _ => return (std::ptr::null_mut(), 0),
            };
            let mut buf = buf.borrow_mut();
            (buf.as_mut_ptr(), buf.len())
        }

        fn serialize_size(&self) -> usize {
            self.state.borrow().len()
        }

        fn serialize_into(&self, out: &mut [u8]) -> bool {
            self.serialized.set(self.serialized.get() + 1);
            out.copy_from_slice(&self.state.borrow());
            true
        }
    }

    #[test]
    fn implicit_ram_is_published_once() {
        let _guard = TEST_TABLE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let source = FakeSource { wram: RefCell::new(vec![7; 0x2000]), sram: RefCell::new(vec![0; 0x800]), ..Default::default() };
        let mut consumer = LoggingConsumer::default();
        let mut tracker = MemoryTracker::new();

        assert!(tracker.sync(&source, &mut consumer));
        assert!(!tracker.sync(&source, &mut consumer));
        assert_eq!(consumer.registrations(), 1);
        assert_eq!(consumer.banks().len(), 1);
        assert_eq!(consumer.banks()[0].size, 0x2800);
        assert_eq!(consumer.read(0, 0x10), 7);

        tracker.clear(&mut consumer);
        assert!(consumer.banks().is_empty());
    }

    #[test]
    fn declared_map_wins_and_is_refetched_on_generation_change() {
        let _guard = TEST_TABLE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ram = vec![0u8; 0x100];
        let source = FakeSource { wram: RefCell::new(vec![1; 16]), ..Default::default() };
        *source.map.borrow_mut() =
            vec![MemoryDescriptor { start: 0, len: 0x100, select: !0xFF, ptr: ram.as_mut_ptr(), ..Default::default() }];

        let mut consumer = LoggingConsumer::default();
        let mut tracker = MemoryTracker::new();
        assert!(tracker.sync(&source, &mut consumer));
        assert_eq!(consumer.banks()[0].size, 0x100);

        source.map.borrow_mut().push(MemoryDescriptor { start: 0x100, len: 0x100, select: !0xFF, ..Default::default() });
        assert!(!tracker.sync(&source, &mut consumer), "same generation keeps the cached map");
        source.generation.set(1);
        assert!(tracker.sync(&source, &mut consumer));
        assert_eq!(consumer.banks().len(), 2);
        assert!(!consumer.banks()[1].mapped);
        tracker.clear(&mut consumer);
    }

    #[test]
    fn snapshot_bank_is_read_only_and_throttled() {
        let _guard = TEST_TABLE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let source = FakeSource { state: RefCell::new(vec![0x5A; 64]), ..Default::default() };
        let mut consumer = LoggingConsumer::default();
        let mut tracker = MemoryTracker::new();

        assert!(tracker.sync(&source, &mut consumer));
        assert_eq!(consumer.read(0, 3), 0x5A);
        consumer.write(0, 3, 0);
        assert_eq!(consumer.read(0, 3), 0x5A);

        // the buffer is refreshed in place, so the layout is stable
        assert!(!tracker.sync(&source, &mut consumer));
        assert_eq!(source.serialized.get(), 1);
        std::thread::sleep(SNAPSHOT_INTERVAL + Duration::from_millis(2));
        source.state.borrow_mut()[3] = 0x11;
        assert!(!tracker.sync(&source, &mut consumer));
        assert_eq!(source.serialized.get(), 2);
        assert_eq!(consumer.read(0, 3), 0x11);
        tracker.clear(&mut consumer);
    }

    #[test]
    fn nothing_exposed_publishes_nothing() {
        let _guard = TEST_TABLE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let source = FakeSource::default();
        let mut consumer = LoggingConsumer::default();
        let mut tracker = MemoryTracker::new();
        tracker.sync(&source, &mut consumer);
        assert!(consumer.banks().is_empty());
        assert!(!tracker.sync(&source, &mut consumer));
    }

    #[test]
    fn dropped_tracker_withdraws_its_snapshot() {
        let _guard = TEST_TABLE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let source = FakeSource { state: RefCell::new(vec![0x5A; 64]), ..Default::default() };
        let mut consumer = LoggingConsumer::default();
        let mut tracker = MemoryTracker::new();
        assert!(tracker.sync(&source, &mut consumer));
        assert_eq!(consumer.read(0, 3), 0x5A);

        drop(tracker);
        assert_eq!(consumer.read(0, 3), 0);
    }
}
