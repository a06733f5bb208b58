//! The process-wide bank table shared with the external memory consumer.
//!
//! The consumer's ABI is global: it registers up to 16 banks, each with a
//! pair of plain `extern "C"` accessors and no user data. Slot `n` is served
//! by the `n`th accessor pair generated below.

use std::sync::{PoisonError, RwLock};

use serde::Serialize;

use super::banks::{Bank, MAX_BANKS};
use super::bits::gather;

pub type BankReadFn = extern "C" fn(addr: u32) -> u8;
pub type BankWriteFn = extern "C" fn(addr: u32, value: u32);

#[derive(Debug, Clone, Copy)]
pub enum BankAccessor {
    Mapped { read: BankReadFn, write: BankWriteFn },
    /// Reads return zero and writes are discarded
    Unmapped,
}

/// The external consumer of exposed memory.
pub trait MemoryConsumer {
    fn clear_banks(&mut self);
    fn install_bank(&mut self, id: u32, size: usize, accessor: BankAccessor);
}

// ── Bank table ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Segment {
    data: usize,
    len: usize,
    skip: usize,
    disconnect: usize,
    writable: bool,
}

impl Segment {
    fn locate(segments: &[Segment], mut addr: usize) -> Option<(&Segment, usize)> {
        for seg in segments {
            if addr < seg.len { return Some((seg, seg.data + gather(seg.skip + addr, !seg.disconnect))); }
            addr -= seg.len;
        }
        None
    }
}

static TABLE: RwLock<Vec<Vec<Segment>>> = RwLock::new(Vec::new());

fn read_byte(bank: usize, addr: u32) -> u8 {
    let table = TABLE.read().unwrap_or_else(PoisonError::into_inner);
    let Some(segments) = table.get(bank) else { return 0 };
    match Segment::locate(segments, addr as usize) {
        Some((_, at)) => unsafe { *(at as *const u8) },
        None => 0,
    }
}

fn write_byte(bank: usize, addr: u32, value: u32) {
    let table = TABLE.read().unwrap_or_else(PoisonError::into_inner);
    let Some(segments) = table.get(bank) else { return };
    if let Some((seg, at)) = Segment::locate(segments, addr as usize) {
        if seg.writable { unsafe { *(at as *mut u8) = value as u8 } }
    }
}

macro_rules! bank_accessors {
    ($($id:literal => $read:ident, $write:ident;)*) => {
        $(
            extern "C" fn $read(addr: u32) -> u8 { read_byte($id, addr) }
            extern "C" fn $write(addr: u32, value: u32) { write_byte($id, addr, value) }
        )*
        const ACCESSORS: [(BankReadFn, BankWriteFn); MAX_BANKS] = [$(($read as BankReadFn, $write as BankWriteFn)),*];
    };
}

bank_accessors! {
    0 => read_bank_0, write_bank_0;
    1 => read_bank_1, write_bank_1;
    2 => read_bank_2, write_bank_2;
    3 => read_bank_3, write_bank_3;
    4 => read_bank_4, write_bank_4;
    5 => read_bank_5, write_bank_5;
    6 => read_bank_6, write_bank_6;
    7 => read_bank_7, write_bank_7;
    8 => read_bank_8, write_bank_8;
    9 => read_bank_9, write_bank_9;
    10 => read_bank_10, write_bank_10;
    11 => read_bank_11, write_bank_11;
    12 => read_bank_12, write_bank_12;
    13 => read_bank_13, write_bank_13;
    14 => read_bank_14, write_bank_14;
    15 => read_bank_15, write_bank_15;
}

/// Replaces the bank table and registers every bank with `consumer`, ids
/// counting up from 0.
pub fn publish(banks: &[Bank], consumer: &mut dyn MemoryConsumer) {
    consumer.clear_banks();
    let banks = &banks[..banks.len().min(MAX_BANKS)];

    {
        let mut table = TABLE.write().unwrap_or_else(PoisonError::into_inner);
        table.clear();
        for bank in banks {
            let segments = bank.regions.iter().map(|r| Segment {
                data: r.data as usize,
                len: r.len,
                skip: r.skip,
                disconnect: r.disconnect,
                writable: r.writable,
            });
            table.push(if bank.mapped { segments.collect() } else { Vec::new() });
        }
    }

    for (id, bank) in banks.iter().enumerate() {
        let accessor = if bank.mapped {
            let (read, write) = ACCESSORS[id];
            BankAccessor::Mapped { read, write }
        } else {
            BankAccessor::Unmapped
        };
        consumer.install_bank(id as u32, bank.size, accessor);
    }
}

/// Empties the table and tells `consumer` every bank is gone.
pub fn clear(consumer: &mut dyn MemoryConsumer) {
    invalidate();
    consumer.clear_banks();
}

/// Empties the table behind the consumer's back. Accessors it still holds
/// read zero and discard writes from here on.
pub fn invalidate() {
    TABLE.write().unwrap_or_else(PoisonError::into_inner).clear();
}

// ── Logging consumer ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstalledBank {
    pub id: u32,
    pub size: usize,
    pub mapped: bool,
}

/// Logs registrations and remembers the current bank layout.
#[derive(Debug, Default)]
pub struct LoggingConsumer {
    banks: Vec<InstalledBank>,
    accessors: Vec<BankAccessor>,
    registrations: usize,
}

impl LoggingConsumer {
    pub fn banks(&self) -> &[InstalledBank] {
        &self.banks
    }

    /// How many times a layout has been installed.
    pub fn registrations(&self) -> usize {
        self.registrations
    }

    pub fn read(&self, id: u32, addr: u32) -> u8 {
        match self.accessors.get(id as usize) {
            Some(BankAccessor::Mapped { read, .. }) => read(addr),
            _ => 0,
        }
    }

    pub fn write(&self, id: u32, addr: u32, value: u8) {
        if let Some(BankAccessor::Mapped { write, .. }) = self.accessors.get(id as usize) {
            write(addr, value as u32);
        }
    }
}

impl MemoryConsumer for LoggingConsumer {
    fn clear_banks(&mut self) {
        self.banks.clear();
        self.accessors.clear();
    }

    fn install_bank(&mut self, id: u32, size: usize, accessor: BankAccessor) {
        let mapped = matches!(accessor, BankAccessor::Mapped { .. });
        tracing::info!(id, size = format_args!("{size:#x}"), mapped, "memory bank installed");
        if id == 0 { self.registrations += 1; }
        self.banks.push(InstalledBank { id, size, mapped });
        self.accessors.push(accessor);
    }
}

#[cfg(test)]
pub(crate) static TEST_TABLE_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::banks::build_banks;
    use crate::memory::regions::Region;

    #[test]
    fn accessors_address_bank_relative_bytes() {
        let _guard = TEST_TABLE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut wram: Vec<u8> = (0..16).collect();
        let mut rom = [0xAAu8; 8];
        let regions = [
            Region::contiguous(0, wram.as_mut_ptr(), 16, true),
            Region::unmapped(16, 16),
            Region::contiguous(32, rom.as_mut_ptr(), 8, false),
        ];
        let mut consumer = LoggingConsumer::default();
        publish(&build_banks(&regions), &mut consumer);

        let layout: Vec<_> = consumer.banks().iter().map(|b| (b.id, b.size, b.mapped)).collect();
        assert_eq!(layout, vec![(0, 16, true), (1, 16, false), (2, 8, true)]);

        assert_eq!(consumer.read(0, 5), 5);
        consumer.write(0, 5, 0x42);
        assert_eq!(wram[5], 0x42);
        assert_eq!(consumer.read(1, 3), 0);
        consumer.write(2, 0, 0x11);
        assert_eq!(rom[0], 0xAA);
        assert_eq!(consumer.read(0, 99), 0);

        clear(&mut consumer);
        assert!(consumer.banks().is_empty());
        assert_eq!(read_bank_0(5), 0);
    }

    #[test]
    fn merged_bank_spans_several_regions() {
        let _guard = TEST_TABLE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut low = [1u8; 4];
        let mut high = [2u8; 4];
        let regions = [
            Region::contiguous(0, low.as_mut_ptr(), 4, true),
            Region::contiguous(4, high.as_mut_ptr(), 4, true),
        ];
        let mut consumer = LoggingConsumer::default();
        publish(&build_banks(&regions), &mut consumer);
        assert_eq!(consumer.banks().len(), 1);
        assert_eq!(consumer.read(0, 3), 1);
        assert_eq!(consumer.read(0, 4), 2);
        clear(&mut consumer);
    }

    #[test]
    fn invalidated_table_reads_zero_through_held_accessors() {
        let _guard = TEST_TABLE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ram = [0x33u8; 8];
        let mut consumer = LoggingConsumer::default();
        publish(&build_banks(&[Region::contiguous(0, ram.as_mut_ptr(), 8, true)]), &mut consumer);
        assert_eq!(consumer.read(0, 2), 0x33);

        invalidate();
        assert_eq!(consumer.banks().len(), 1);
        assert_eq!(consumer.read(0, 2), 0);
        consumer.write(0, 2, 0x44);
        assert_eq!(ram[2], 0x33);
    }
}
