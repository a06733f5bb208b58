//! Bank publication from a live bridge. The bank table is process-wide, so
//! the tests in this file take turns.

mod common;

use std::sync::Mutex;

use common::{initialized, with_core, RAM_SIZE};
use retro_host::memory::{LoggingConsumer, MemoryTracker};

static TABLE: Mutex<()> = Mutex::new(());

#[test]
fn declared_map_becomes_one_writable_bank() {
    let _turn = TABLE.lock().unwrap_or_else(|e| e.into_inner());
    let (mut bridge, _log) = initialized();
    with_core(|c| c.declare_map = true);
    bridge.load_game(None, None).unwrap();

    let (mut tracker, mut consumer) = (MemoryTracker::new(), LoggingConsumer::default());
    assert!(tracker.sync(&bridge, &mut consumer));
    assert_eq!(consumer.banks().len(), 1);
    assert_eq!(consumer.banks()[0].size, RAM_SIZE);
    assert!(consumer.banks()[0].mapped);

    with_core(|c| c.ram[0x10] = 0x5A);
    assert_eq!(consumer.read(0, 0x10), 0x5A);
    consumer.write(0, 0x11, 0xA5);
    assert_eq!(with_core(|c| c.ram[0x11]), 0xA5);

    bridge.step(true, true).unwrap();
    assert!(!tracker.sync(&bridge, &mut consumer));
    assert_eq!(consumer.registrations(), 1);

    tracker.clear(&mut consumer);
    assert!(consumer.banks().is_empty());
}

#[test]
fn implicit_system_ram_is_used_without_a_map() {
    let _turn = TABLE.lock().unwrap_or_else(|e| e.into_inner());
    let (mut bridge, _log) = initialized();
    bridge.load_game(None, None).unwrap();

    let (mut tracker, mut consumer) = (MemoryTracker::new(), LoggingConsumer::default());
    assert!(tracker.sync(&bridge, &mut consumer));
    assert_eq!(consumer.banks().len(), 1);
    assert_eq!(consumer.banks()[0].size, RAM_SIZE);

    with_core(|c| c.ram[RAM_SIZE - 1] = 7);
    assert_eq!(consumer.read(0, (RAM_SIZE - 1) as u32), 7);
    tracker.clear(&mut consumer);
}

#[test]
fn unloading_the_core_withdraws_its_banks() {
    let _turn = TABLE.lock().unwrap_or_else(|e| e.into_inner());
    let (mut bridge, _log) = initialized();
    with_core(|c| c.declare_map = true);
    bridge.load_game(None, None).unwrap();

    let (mut tracker, mut consumer) = (MemoryTracker::new(), LoggingConsumer::default());
    assert!(tracker.sync(&bridge, &mut consumer));
    with_core(|c| c.ram[0x10] = 0x5A);
    assert_eq!(consumer.read(0, 0x10), 0x5A);

    bridge.destroy();
    assert_eq!(consumer.banks().len(), 1);
    assert_eq!(consumer.read(0, 0x10), 0);
    consumer.write(0, 0x11, 0xA5);
    assert_eq!(with_core(|c| c.ram[0x11]), 0);
}
