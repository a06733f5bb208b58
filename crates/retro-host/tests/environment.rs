//! Environment requests as a core issues them from inside its entry points.

mod common;

use common::{initialized, with_core};
use retro_host::components::LogLevel;

#[test]
fn unknown_commands_are_reported_once() {
    let (mut bridge, log) = initialized();
    bridge.load_game(None, None).unwrap();

    with_core(|c| c.unknown_calls = 500);
    bridge.step(true, true).unwrap();
    bridge.step(true, true).unwrap();

    // 1000 calls per code across the two frames
    assert_eq!(log.count(LogLevel::Warn, "Unimplemented env call: 4"), 1);
    assert_eq!(log.count(LogLevel::Warn, &format!("Unimplemented env call: {}", 0x800010)), 1);
}

#[test]
fn unknown_commands_warn_again_after_reload() {
    let (mut bridge, log) = initialized();
    bridge.load_game(None, None).unwrap();
    with_core(|c| c.unknown_calls = 1);
    bridge.step(true, true).unwrap();
    bridge.destroy();

    bridge.attach_core(common::fake_api()).unwrap();
    bridge.init_core().unwrap();
    bridge.load_game(None, None).unwrap();
    bridge.step(true, true).unwrap();
    assert_eq!(log.count(LogLevel::Warn, "Unimplemented env call: 4"), 2);
}

#[test]
fn declared_options_are_logged_at_debug() {
    let (_bridge, log) = initialized();
    assert!(log.count(LogLevel::Debug, "fake_region: Region") >= 1);
    assert_eq!(log.count(LogLevel::Debug, "Called SetVariables (16) -> true"), 1);
}

#[test]
fn declared_memory_map_is_kept_canonical() {
    let (mut bridge, _log) = initialized();
    with_core(|c| c.declare_map = true);
    bridge.load_game(None, None).unwrap();

    let map = bridge.memory_descriptors();
    assert_eq!(map.len(), 1);
    assert_eq!(map[0].start, 0xC000);
    assert_eq!(map[0].len, common::RAM_SIZE);
    assert_ne!(map[0].select, 0);
}
