//! Lifecycle of a bridge driving the linked-in fake core.

mod common;

use common::{bridge_with, calls, fake_api, initialized, with_core, BATCH_FRAMES};
use retro_host::components::LogLevel;
use retro_host::{HostError, HostSettings, Lifecycle};

#[test]
fn full_lifecycle_is_repeatable() {
    let (mut bridge, _log) = bridge_with(HostSettings::default());
    for round in 1..=2 {
        bridge.attach_core(fake_api()).unwrap();
        assert_eq!(bridge.lifecycle(), Lifecycle::LibraryLoaded);
        bridge.init_core().unwrap();
        assert_eq!(bridge.lifecycle(), Lifecycle::Initialized);
        assert_eq!(bridge.system_info().unwrap().library_name, "Fake Core");

        bridge.load_game(None, Some(&[0xAA; 32])).unwrap();
        assert_eq!(bridge.lifecycle(), Lifecycle::GameLoaded);
        for _ in 0..3 {
            bridge.step(true, true).unwrap();
        }

        bridge.destroy();
        assert_eq!(bridge.lifecycle(), Lifecycle::Unloaded);
        assert!(bridge.system_info().is_none());
        assert_eq!(calls("init"), round);
        assert_eq!(calls("run"), 3 * round);
        assert_eq!(calls("unload_game"), round);
        assert_eq!(calls("deinit"), round);
    }
}

#[test]
fn av_info_is_negotiated_on_load() {
    let (mut bridge, _log) = initialized();
    bridge.load_game(None, None).unwrap();
    let av = bridge.av_info();
    assert_eq!(av.geometry.base_width, 160);
    assert!((av.geometry.aspect_ratio - 160.0 / 144.0).abs() < 1e-6);
    assert_eq!(av.timing.sample_rate, 44_100.0);
    assert_eq!(bridge.pixel_format(), retro_host::components::PixelFormat::Xrgb8888);
    assert_eq!(bridge.region(), retro_core_abi::REGION_PAL);
}

#[test]
fn step_requires_loaded_content() {
    let (mut bridge, _log) = initialized();
    assert!(matches!(
        bridge.step(true, true),
        Err(HostError::InvalidState { expected: Lifecycle::GameLoaded, found: Lifecycle::Initialized })
    ));
}

#[test]
fn audio_is_mixed_once_per_step_when_requested() {
    let (mut components, stats) = retro_host::Components::headless(HostSettings::default());
    components.logger = Box::new(common::RecordingLogger::default());
    let mut bridge = retro_host::HostBridge::new(components);
    bridge.attach_core(fake_api()).unwrap();
    bridge.init_core().unwrap();
    bridge.load_game(None, None).unwrap();

    bridge.step(true, true).unwrap();
    assert_eq!(stats.audio_frames.get(), BATCH_FRAMES as u64);
    assert_eq!(stats.video_frames.get(), 1);

    bridge.step(false, false).unwrap();
    assert_eq!(stats.audio_frames.get(), BATCH_FRAMES as u64);
    assert_eq!(stats.video_frames.get(), 1);
}

#[test]
fn frame_time_starts_from_the_reference() {
    let (mut bridge, _log) = initialized();
    bridge.load_game(None, None).unwrap();
    bridge.step(true, true).unwrap();
    bridge.step(true, true).unwrap();
    let times = with_core(|c| c.frame_times.clone());
    assert_eq!(times.len(), 2);
    assert_eq!(times[0], 16_667);
    assert!(times[1] >= 0);
}

#[test]
fn rejected_content_reports_what_the_core_said() {
    let (mut bridge, _log) = initialized();
    with_core(|c| c.reject_content = true);

    let err = bridge.load_game(None, Some(&[0; 4])).unwrap_err();
    match err {
        HostError::ContentRejected { details, .. } => {
            assert!(details.contains("header checksum mismatch"), "{details}");
            assert!(details.contains("unsupported cartridge type"), "{details}");
            assert!(!details.ends_with('\n'));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(bridge.lifecycle(), Lifecycle::Unloaded);
    assert_eq!(calls("deinit"), 1);
}

#[test]
fn core_that_tore_itself_down_is_not_deinitialized_again() {
    let (mut bridge, _log) = initialized();
    with_core(|c| {
        c.reject_content = true;
        c.teardown_on_reject = true;
    });
    assert!(bridge.load_game(None, None).is_err());
    assert_eq!(bridge.lifecycle(), Lifecycle::Unloaded);
    assert_eq!(calls("deinit"), 0);
}

#[test]
fn rejected_save_state_carries_details() {
    let (mut bridge, log) = initialized();
    bridge.load_game(None, None).unwrap();

    let mut state = vec![0u8; bridge.serialize_size()];
    assert!(bridge.serialize(&mut state));
    bridge.unserialize(&state).unwrap();

    let err = bridge.unserialize(&[0; 3]).unwrap_err();
    assert!(err.to_string().contains("state size mismatch"), "{err}");
    assert_eq!(log.count(LogLevel::Error, "state size mismatch"), 1);
}

#[test]
fn user_option_reaches_the_core() {
    let mut settings = HostSettings::default();
    settings.options.insert("fake_region".into(), "pal".into());
    let (mut bridge, _log) = bridge_with(settings);
    bridge.attach_core(fake_api()).unwrap();
    bridge.init_core().unwrap();
    bridge.load_game(None, None).unwrap();
    assert_eq!(with_core(|c| c.region_option.clone()).as_deref(), Some("pal"));
}

#[test]
fn disk_interface_is_reachable() {
    let (bridge, _log) = initialized();
    assert_eq!(bridge.disk_count(), 2);
    assert_eq!(bridge.disk_index(), Some(1));
    assert_eq!(bridge.disk_label(0).as_deref(), Some("Disc 1"));
    assert_eq!(bridge.disk_path(0), None);
    assert!(!bridge.disk_tray_open());
}

#[test]
fn dropping_a_loaded_bridge_shuts_the_core_down() {
    {
        let (mut bridge, _log) = initialized();
        bridge.load_game(None, None).unwrap();
    }
    assert_eq!(calls("unload_game"), 1);
    assert_eq!(calls("deinit"), 1);
}
