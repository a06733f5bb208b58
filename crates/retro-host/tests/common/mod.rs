//! A core linked into the test binary, attached through `PluginHandle::from_api`.
//!
//! Its state lives in a thread-local, so every test thread drives its own copy.

#![allow(dead_code)]

use std::cell::RefCell;
use std::ffi::{c_char, c_uint, c_void, CStr};
use std::ptr;
use std::rc::Rc;

use retro_core_abi::env::FRONTEND_BASE;
use retro_core_abi::*;
use retro_host::components::{LogLevel, Logger};
use retro_host::{Components, CoreApi, HostBridge, HostSettings};

macro_rules! cstr {
    ($s:literal) => {
        concat!($s, "\0").as_ptr().cast::<c_char>()
    };
}

pub const RAM_SIZE: usize = 0x2000;
pub const BATCH_FRAMES: usize = 400;

#[derive(Default)]
pub struct FakeCore {
    pub calls: Vec<&'static str>,
    pub reject_content: bool,
    pub teardown_on_reject: bool,
    pub torn_down: bool,
    pub declare_map: bool,
    pub unknown_calls: u32,
    pub region_option: Option<String>,
    pub frame_times: Vec<i64>,
    pub ram: Vec<u8>,
    environment: Option<RetroEnvironmentFn>,
    video: Option<RetroVideoRefreshFn>,
    audio_batch: Option<RetroAudioSampleBatchFn>,
    input_poll: Option<RetroInputPollFn>,
}

thread_local! {
    static CORE: RefCell<FakeCore> = RefCell::new(FakeCore { ram: vec![0; RAM_SIZE], ..FakeCore::default() });
}

/// Inspects or configures this thread's fake core.
pub fn with_core<R>(f: impl FnOnce(&mut FakeCore) -> R) -> R {
    CORE.with(|core| f(&mut core.borrow_mut()))
}

pub fn calls(name: &str) -> usize {
    with_core(|c| c.calls.iter().filter(|&&call| call == name).count())
}

fn record(name: &'static str) {
    with_core(|c| c.calls.push(name));
}

/// Calls the host's environment callback without holding the core state.
unsafe fn env<T>(cmd: EnvCommand, data: *mut T) -> bool {
    env_raw(cmd.code(), data.cast())
}

unsafe fn env_raw(cmd: c_uint, data: *mut c_void) -> bool {
    match with_core(|c| c.environment) {
        Some(cb) => cb(cmd, data),
        None => false,
    }
}

unsafe fn log(level: c_uint, line: *const c_char) {
    let mut iface = RetroLogCallback { log: None };
    if env(EnvCommand::GetLogInterface, &mut iface) {
        if let Some(log) = iface.log { log(level, line); }
    }
}

// ── Entry points ─────────────────────────────────────────────────────────────

unsafe extern "C" fn init() {
    record("init");
    let vars = [
        RetroVariable { key: cstr!("fake_region"), value: cstr!("Region; auto|ntsc|pal") },
        RetroVariable { key: ptr::null(), value: ptr::null() },
    ];
    env(EnvCommand::SetVariables, vars.as_ptr().cast_mut());

    let mut disks = RetroDiskControlExtCallback {
        get_num_images: Some(num_images),
        get_image_index: Some(image_index),
        get_image_label: Some(image_label),
        ..Default::default()
    };
    env(EnvCommand::SetDiskControlExtInterface, &mut disks);

    let mut timing = RetroFrameTimeCallback { callback: Some(frame_time), reference: 16_667 };
    env(EnvCommand::SetFrameTimeCallback, &mut timing);
}

unsafe extern "C" fn deinit() {
    record("deinit");
}

unsafe extern "C" fn api_version() -> c_uint {
    RETRO_API_VERSION
}

unsafe extern "C" fn get_system_info(info: *mut RetroSystemInfo) {
    let torn_down = with_core(|c| c.torn_down);
    *info = RetroSystemInfo {
        library_name: if torn_down { cstr!("") } else { cstr!("Fake Core") },
        library_version: cstr!("1.0"),
        valid_extensions: cstr!("bin|fak"),
        need_fullpath: false,
        block_extract: false,
    };
}

unsafe extern "C" fn get_system_av_info(info: *mut RetroSystemAvInfo) {
    *info = RetroSystemAvInfo {
        geometry: RetroGameGeometry { base_width: 160, base_height: 144, max_width: 160, max_height: 144, aspect_ratio: 0.0 },
        timing: RetroSystemTiming { fps: 60.0, sample_rate: 44_100.0 },
    };
}

unsafe extern "C" fn set_environment(cb: RetroEnvironmentFn) {
    with_core(|c| c.environment = Some(cb));
}

unsafe extern "C" fn set_video_refresh(cb: RetroVideoRefreshFn) {
    with_core(|c| c.video = Some(cb));
}

unsafe extern "C" fn set_audio_sample(_cb: RetroAudioSampleFn) {}

unsafe extern "C" fn set_audio_sample_batch(cb: RetroAudioSampleBatchFn) {
    with_core(|c| c.audio_batch = Some(cb));
}

unsafe extern "C" fn set_input_poll(cb: RetroInputPollFn) {
    with_core(|c| c.input_poll = Some(cb));
}

unsafe extern "C" fn set_input_state(_cb: RetroInputStateFn) {}

unsafe extern "C" fn set_controller_port_device(_port: c_uint, _device: c_uint) {
    record("set_controller_port_device");
}

unsafe extern "C" fn reset() {
    record("reset");
}

unsafe extern "C" fn run() {
    record("run");
    let (unknown, video, audio, poll) = with_core(|c| (c.unknown_calls, c.video, c.audio_batch, c.input_poll));
    for _ in 0..unknown {
        env_raw(4, ptr::null_mut());
        env_raw(FRONTEND_BASE + 0x10, ptr::null_mut());
    }
    if let Some(poll) = poll { poll(); }

    let pixels = [0u8; 160 * 144 * 4];
    if let Some(video) = video { video(pixels.as_ptr().cast(), 160, 144, 160 * 4); }
    let samples = [0i16; BATCH_FRAMES * 2];
    if let Some(audio) = audio { audio(samples.as_ptr(), BATCH_FRAMES); }
}

unsafe extern "C" fn serialize_size() -> usize {
    16
}

unsafe extern "C" fn serialize(data: *mut c_void, size: usize) -> bool {
    if size < 16 { return false; }
    with_core(|c| ptr::copy_nonoverlapping(c.ram.as_ptr(), data.cast::<u8>(), 16));
    true
}

unsafe extern "C" fn unserialize(_data: *const c_void, size: usize) -> bool {
    if size == 16 { return true; }
    log(LOG_ERROR, cstr!("state size mismatch"));
    false
}

unsafe extern "C" fn cheat_reset() {}

unsafe extern "C" fn cheat_set(_index: c_uint, _enabled: bool, _code: *const c_char) {}

unsafe extern "C" fn load_game(_game: *const RetroGameInfo) -> bool {
    record("load_game");
    let mut format = PIXEL_FORMAT_XRGB8888;
    env(EnvCommand::SetPixelFormat, &mut format);

    let mut var = RetroVariable { key: cstr!("fake_region"), value: ptr::null() };
    if env(EnvCommand::GetVariable, &mut var) {
        let value = CStr::from_ptr(var.value).to_string_lossy().into_owned();
        with_core(|c| c.region_option = Some(value));
    }

    let (reject, teardown, declare) = with_core(|c| (c.reject_content, c.teardown_on_reject, c.declare_map));
    if reject {
        log(LOG_WARN, cstr!("header checksum mismatch\n"));
        log(LOG_ERROR, cstr!("unsupported cartridge type\n"));
        if teardown { with_core(|c| c.torn_down = true); }
        return false;
    }

    if declare {
        let ram = with_core(|c| c.ram.as_mut_ptr());
        let descs = [RetroMemoryDescriptor {
            flags: MEMDESC_SYSTEM_RAM,
            ptr: ram.cast(),
            offset: 0,
            start: 0xC000,
            select: 0,
            disconnect: 0,
            len: RAM_SIZE,
            addrspace: ptr::null(),
        }];
        let mut map = RetroMemoryMap { descriptors: descs.as_ptr(), num_descriptors: 1 };
        env(EnvCommand::SetMemoryMaps, &mut map);
    }
    true
}

unsafe extern "C" fn load_game_special(_game_type: c_uint, _info: *const RetroGameInfo, _num: usize) -> bool {
    false
}

unsafe extern "C" fn unload_game() {
    record("unload_game");
}

unsafe extern "C" fn get_region() -> c_uint {
    REGION_PAL
}

unsafe extern "C" fn get_memory_data(id: c_uint) -> *mut c_void {
    if id != MEMORY_SYSTEM_RAM { return ptr::null_mut(); }
    with_core(|c| c.ram.as_mut_ptr().cast())
}

unsafe extern "C" fn get_memory_size(id: c_uint) -> usize {
    if id == MEMORY_SYSTEM_RAM { RAM_SIZE } else { 0 }
}

// ── Disk control ─────────────────────────────────────────────────────────────

unsafe extern "C" fn num_images() -> c_uint {
    2
}

unsafe extern "C" fn image_index() -> c_uint {
    1
}

unsafe extern "C" fn image_label(index: c_uint, s: *mut c_char, len: usize) -> bool {
    let bytes: &[u8] = if index == 0 { b"Disc 1\0" } else { b"Disc 2\0" };
    if bytes.len() > len { return false; }
    ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), s, bytes.len());
    true
}

unsafe extern "C" fn frame_time(usec: i64) {
    with_core(|c| c.frame_times.push(usec));
}

pub fn fake_api() -> CoreApi {
    CoreApi {
        init,
        deinit,
        api_version,
        get_system_info,
        get_system_av_info,
        set_environment,
        set_video_refresh,
        set_audio_sample,
        set_audio_sample_batch,
        set_input_poll,
        set_input_state,
        set_controller_port_device,
        reset,
        run,
        serialize_size,
        serialize,
        unserialize,
        cheat_reset,
        cheat_set,
        load_game,
        load_game_special,
        unload_game,
        get_region,
        get_memory_data,
        get_memory_size,
    }
}

// ── Host side ────────────────────────────────────────────────────────────────

/// Keeps every line the bridge logs.
#[derive(Clone, Default)]
pub struct RecordingLogger {
    pub lines: Rc<RefCell<Vec<(LogLevel, String)>>>,
}

impl RecordingLogger {
    pub fn count(&self, level: LogLevel, needle: &str) -> usize {
        self.lines.borrow().iter().filter(|(l, line)| *l == level && line.contains(needle)).count()
    }
}

impl Logger for RecordingLogger {
    fn level(&self) -> LogLevel {
        LogLevel::Debug
    }

    fn log(&mut self, level: LogLevel, line: &str) {
        self.lines.borrow_mut().push((level, line.to_string()));
    }
}

pub fn bridge_with(settings: HostSettings) -> (HostBridge, RecordingLogger) {
    let (mut components, _stats) = Components::headless(settings);
    let logger = RecordingLogger::default();
    components.logger = Box::new(logger.clone());
    (HostBridge::new(components), logger)
}

/// A bridge with the fake core attached and initialized.
pub fn initialized() -> (HostBridge, RecordingLogger) {
    let (mut bridge, logger) = bridge_with(HostSettings::default());
    bridge.attach_core(fake_api()).unwrap();
    bridge.init_core().unwrap();
    (bridge, logger)
}
