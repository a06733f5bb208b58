//! retro-core-abi: the C-linkage contract every emulation core plugin exports
//!
//! A core is a shared object exporting the 25 `retro_*` entry points listed in
//! [`ENTRY_POINTS`]. The host hands it a handful of stateless callbacks; every
//! capability beyond that is negotiated through the environment callback with
//! the command codes in [`env`]. All structs here are `#[repr(C)]` and match
//! the plugin side bit for bit.

use std::ffi::{c_char, c_int, c_uint, c_void};

pub mod env;

pub use env::EnvCommand;

// ── Version sentinel ─────────────────────────────────────────────────────────

pub const RETRO_API_VERSION: c_uint = 1;

// ── Devices ──────────────────────────────────────────────────────────────────

pub const DEVICE_TYPE_SHIFT: c_uint = 8;
pub const DEVICE_MASK: c_uint = (1 << DEVICE_TYPE_SHIFT) - 1;

pub const DEVICE_NONE: c_uint = 0;
pub const DEVICE_JOYPAD: c_uint = 1;
pub const DEVICE_MOUSE: c_uint = 2;
pub const DEVICE_KEYBOARD: c_uint = 3;
pub const DEVICE_LIGHTGUN: c_uint = 4;
pub const DEVICE_ANALOG: c_uint = 5;
pub const DEVICE_POINTER: c_uint = 6;

/// Builds a subclassed device id, e.g. a specific pad layout on top of JOYPAD.
pub const fn device_subclass(base: c_uint, id: c_uint) -> c_uint {
    ((id + 1) << DEVICE_TYPE_SHIFT) | base
}

// ── Memory ids for retro_get_memory_data / _size ─────────────────────────────

pub const MEMORY_MASK: c_uint = 0xff;
pub const MEMORY_SAVE_RAM: c_uint = 0;
pub const MEMORY_RTC: c_uint = 1;
pub const MEMORY_SYSTEM_RAM: c_uint = 2;
pub const MEMORY_VIDEO_RAM: c_uint = 3;

// ── Memory descriptor flags ──────────────────────────────────────────────────

pub const MEMDESC_CONST: u64 = 1 << 0;
pub const MEMDESC_BIGENDIAN: u64 = 1 << 1;
pub const MEMDESC_SYSTEM_RAM: u64 = 1 << 2;
pub const MEMDESC_SAVE_RAM: u64 = 1 << 3;
pub const MEMDESC_VIDEO_RAM: u64 = 1 << 4;
pub const MEMDESC_ALIGN_2: u64 = 1 << 16;
pub const MEMDESC_ALIGN_4: u64 = 2 << 16;
pub const MEMDESC_ALIGN_8: u64 = 3 << 16;
pub const MEMDESC_MINSIZE_2: u64 = 1 << 24;
pub const MEMDESC_MINSIZE_4: u64 = 2 << 24;
pub const MEMDESC_MINSIZE_8: u64 = 3 << 24;

// ── Pixel formats / hw contexts / log levels / regions ───────────────────────

pub const PIXEL_FORMAT_0RGB1555: c_uint = 0;
pub const PIXEL_FORMAT_XRGB8888: c_uint = 1;
pub const PIXEL_FORMAT_RGB565: c_uint = 2;
pub const PIXEL_FORMAT_UNKNOWN: c_uint = c_int::MAX as c_uint;

pub const HW_CONTEXT_NONE: c_uint = 0;
pub const HW_CONTEXT_OPENGL: c_uint = 1;
pub const HW_CONTEXT_OPENGLES2: c_uint = 2;
pub const HW_CONTEXT_OPENGL_CORE: c_uint = 3;
pub const HW_CONTEXT_OPENGLES3: c_uint = 4;
pub const HW_CONTEXT_OPENGLES_VERSION: c_uint = 5;
pub const HW_CONTEXT_VULKAN: c_uint = 6;
pub const HW_CONTEXT_D3D11: c_uint = 7;
pub const HW_CONTEXT_D3D10: c_uint = 8;
pub const HW_CONTEXT_D3D12: c_uint = 9;
pub const HW_CONTEXT_D3D9: c_uint = 10;

/// Passed as `data` to the video refresh callback when the frame was rendered
/// straight into the host framebuffer.
pub const HW_FRAME_BUFFER_VALID: *const c_void = usize::MAX as *const c_void;

pub const LOG_DEBUG: c_uint = 0;
pub const LOG_INFO: c_uint = 1;
pub const LOG_WARN: c_uint = 2;
pub const LOG_ERROR: c_uint = 3;

pub const REGION_NTSC: c_uint = 0;
pub const REGION_PAL: c_uint = 1;

pub const LANGUAGE_ENGLISH: c_uint = 0;

pub const RUMBLE_STRONG: c_uint = 0;
pub const RUMBLE_WEAK: c_uint = 1;

pub const AV_ENABLE_VIDEO: c_int = 1 << 0;
pub const AV_ENABLE_AUDIO: c_int = 1 << 1;

pub const NUM_CORE_OPTION_VALUES_MAX: usize = 128;

// ── Core info blocks ─────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroSystemInfo {
    pub library_name: *const c_char,
    pub library_version: *const c_char,
    /// `|`-separated list, may be null
    pub valid_extensions: *const c_char,
    pub need_fullpath: bool,
    pub block_extract: bool,
}

impl Default for RetroSystemInfo {
    fn default() -> Self {
        Self {
            library_name: std::ptr::null(),
            library_version: std::ptr::null(),
            valid_extensions: std::ptr::null(),
            need_fullpath: false,
            block_extract: false,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetroGameGeometry {
    pub base_width: c_uint,
    pub base_height: c_uint,
    pub max_width: c_uint,
    pub max_height: c_uint,
    /// Non-positive means "derive from base_width / base_height"
    pub aspect_ratio: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetroSystemTiming {
    pub fps: f64,
    pub sample_rate: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetroSystemAvInfo {
    pub geometry: RetroGameGeometry,
    pub timing: RetroSystemTiming,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroGameInfo {
    pub path: *const c_char,
    pub data: *const c_void,
    pub size: usize,
    pub meta: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroSystemContentInfoOverride {
    pub extensions: *const c_char,
    pub need_fullpath: bool,
    pub persistent_data: bool,
}

// ── Messages ─────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroMessage {
    pub msg: *const c_char,
    pub frames: c_uint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroMessageExt {
    pub msg: *const c_char,
    /// Milliseconds
    pub duration: c_uint,
    pub priority: c_uint,
    pub level: c_uint,
    pub target: c_uint,
    pub kind: c_uint,
    pub progress: i8,
}

// ── Input declarations ───────────────────────────────────────────────────────

/// Arrays of these are terminated by an entry with a null `description`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroInputDescriptor {
    pub port: c_uint,
    pub device: c_uint,
    pub index: c_uint,
    pub id: c_uint,
    pub description: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroControllerDescription {
    pub desc: *const c_char,
    pub id: c_uint,
}

/// Arrays of these are terminated by an entry with null `types`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroControllerInfo {
    pub types: *const RetroControllerDescription,
    pub num_types: c_uint,
}

pub type RetroKeyboardEventFn =
    unsafe extern "C" fn(down: bool, keycode: c_uint, character: u32, key_modifiers: u16);

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroKeyboardCallback {
    pub callback: Option<RetroKeyboardEventFn>,
}

// ── Subsystems ───────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroSubsystemMemoryInfo {
    pub extension: *const c_char,
    pub kind: c_uint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroSubsystemRomInfo {
    pub desc: *const c_char,
    pub valid_extensions: *const c_char,
    pub need_fullpath: bool,
    pub block_extract: bool,
    pub required: bool,
    pub memory: *const RetroSubsystemMemoryInfo,
    pub num_memory: c_uint,
}

/// Arrays of these are terminated by an entry with a null `desc`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroSubsystemInfo {
    pub desc: *const c_char,
    pub ident: *const c_char,
    pub roms: *const RetroSubsystemRomInfo,
    pub num_roms: c_uint,
    pub id: c_uint,
}

// ── Memory maps ──────────────────────────────────────────────────────────────

/// One span of core memory as seen on an emulated bus.
///
/// `select`, `disconnect` and `len` may be zero, in which case the host
/// derives them from the rest of the map.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroMemoryDescriptor {
    pub flags: u64,
    pub ptr: *mut c_void,
    pub offset: usize,
    pub start: usize,
    pub select: usize,
    pub disconnect: usize,
    pub len: usize,
    pub addrspace: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroMemoryMap {
    pub descriptors: *const RetroMemoryDescriptor,
    pub num_descriptors: c_uint,
}

// ── Variables & core options ─────────────────────────────────────────────────

/// Arrays of these are terminated by an entry with a null `key`.
/// For SET_VARIABLES, `value` reads "Description; first|second|third".
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroVariable {
    pub key: *const c_char,
    pub value: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroCoreOptionValue {
    pub value: *const c_char,
    pub label: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroCoreOptionDefinition {
    pub key: *const c_char,
    pub desc: *const c_char,
    pub info: *const c_char,
    pub values: [RetroCoreOptionValue; NUM_CORE_OPTION_VALUES_MAX],
    pub default_value: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroCoreOptionsIntl {
    pub us: *const RetroCoreOptionDefinition,
    pub local: *const RetroCoreOptionDefinition,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroCoreOptionV2Category {
    pub key: *const c_char,
    pub desc: *const c_char,
    pub info: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroCoreOptionV2Definition {
    pub key: *const c_char,
    pub desc: *const c_char,
    pub desc_categorized: *const c_char,
    pub info: *const c_char,
    pub info_categorized: *const c_char,
    pub category_key: *const c_char,
    pub values: [RetroCoreOptionValue; NUM_CORE_OPTION_VALUES_MAX],
    pub default_value: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroCoreOptionsV2 {
    pub categories: *const RetroCoreOptionV2Category,
    pub definitions: *const RetroCoreOptionV2Definition,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroCoreOptionsV2Intl {
    pub us: *const RetroCoreOptionsV2,
    pub local: *const RetroCoreOptionsV2,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroCoreOptionDisplay {
    pub key: *const c_char,
    pub visible: bool,
}

// ── Hardware rendering ───────────────────────────────────────────────────────

pub type RetroProcAddressFn = unsafe extern "C" fn();
pub type RetroHwContextResetFn = unsafe extern "C" fn();
pub type RetroHwGetCurrentFramebufferFn = unsafe extern "C" fn() -> usize;
pub type RetroHwGetProcAddressFn =
    unsafe extern "C" fn(sym: *const c_char) -> Option<RetroProcAddressFn>;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroHwRenderCallback {
    pub context_type: c_uint,
    pub context_reset: Option<RetroHwContextResetFn>,
    /// Filled in by the host
    pub get_current_framebuffer: Option<RetroHwGetCurrentFramebufferFn>,
    /// Filled in by the host
    pub get_proc_address: Option<RetroHwGetProcAddressFn>,
    pub depth: bool,
    pub stencil: bool,
    pub bottom_left_origin: bool,
    pub version_major: c_uint,
    pub version_minor: c_uint,
    pub cache_context: bool,
    pub context_destroy: Option<RetroHwContextResetFn>,
    pub debug_context: bool,
}

impl Default for RetroHwRenderCallback {
    fn default() -> Self {
        Self {
            context_type: HW_CONTEXT_NONE,
            context_reset: None,
            get_current_framebuffer: None,
            get_proc_address: None,
            depth: false,
            stencil: false,
            bottom_left_origin: false,
            version_major: 0,
            version_minor: 0,
            cache_context: false,
            context_destroy: None,
            debug_context: false,
        }
    }
}

// ── Host-provided interfaces ─────────────────────────────────────────────────

/// printf-style; the host sees the format string and cannot read the
/// variadic tail on stable Rust.
pub type RetroLogPrintfFn = unsafe extern "C" fn(level: c_uint, fmt: *const c_char, ...);

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroLogCallback {
    pub log: Option<RetroLogPrintfFn>,
}

pub type RetroSetRumbleStateFn =
    unsafe extern "C" fn(port: c_uint, effect: c_uint, strength: u16) -> bool;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroRumbleInterface {
    pub set_rumble_state: Option<RetroSetRumbleStateFn>,
}

pub type RetroSetLedStateFn = unsafe extern "C" fn(led: c_int, state: c_int);

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroLedInterface {
    pub set_led_state: Option<RetroSetLedStateFn>,
}

/// Microseconds elapsed since the previous frame.
pub type RetroFrameTimeFn = unsafe extern "C" fn(usec: i64);

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroFrameTimeCallback {
    pub callback: Option<RetroFrameTimeFn>,
    pub reference: i64,
}

pub type RetroClearAllThreadWaitsFn = unsafe extern "C" fn(clear_threads: c_uint, data: *mut c_void) -> bool;

// ── Disk control ─────────────────────────────────────────────────────────────

pub type RetroSetEjectStateFn = unsafe extern "C" fn(ejected: bool) -> bool;
pub type RetroGetEjectStateFn = unsafe extern "C" fn() -> bool;
pub type RetroGetImageIndexFn = unsafe extern "C" fn() -> c_uint;
pub type RetroSetImageIndexFn = unsafe extern "C" fn(index: c_uint) -> bool;
pub type RetroGetNumImagesFn = unsafe extern "C" fn() -> c_uint;
pub type RetroReplaceImageIndexFn = unsafe extern "C" fn(index: c_uint, info: *const RetroGameInfo) -> bool;
pub type RetroAddImageIndexFn = unsafe extern "C" fn() -> bool;
pub type RetroSetInitialImageFn = unsafe extern "C" fn(index: c_uint, path: *const c_char) -> bool;
pub type RetroGetImageStringFn = unsafe extern "C" fn(index: c_uint, s: *mut c_char, len: usize) -> bool;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RetroDiskControlCallback {
    pub set_eject_state: Option<RetroSetEjectStateFn>,
    pub get_eject_state: Option<RetroGetEjectStateFn>,
    pub get_image_index: Option<RetroGetImageIndexFn>,
    pub set_image_index: Option<RetroSetImageIndexFn>,
    pub get_num_images: Option<RetroGetNumImagesFn>,
    pub replace_image_index: Option<RetroReplaceImageIndexFn>,
    pub add_image_index: Option<RetroAddImageIndexFn>,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RetroDiskControlExtCallback {
    pub set_eject_state: Option<RetroSetEjectStateFn>,
    pub get_eject_state: Option<RetroGetEjectStateFn>,
    pub get_image_index: Option<RetroGetImageIndexFn>,
    pub set_image_index: Option<RetroSetImageIndexFn>,
    pub get_num_images: Option<RetroGetNumImagesFn>,
    pub replace_image_index: Option<RetroReplaceImageIndexFn>,
    pub add_image_index: Option<RetroAddImageIndexFn>,
    pub set_initial_image: Option<RetroSetInitialImageFn>,
    pub get_image_path: Option<RetroGetImageStringFn>,
    pub get_image_label: Option<RetroGetImageStringFn>,
}

// ── Host callbacks handed to the core ────────────────────────────────────────

pub type RetroEnvironmentFn = unsafe extern "C" fn(cmd: c_uint, data: *mut c_void) -> bool;
pub type RetroVideoRefreshFn =
    unsafe extern "C" fn(data: *const c_void, width: c_uint, height: c_uint, pitch: usize);
pub type RetroAudioSampleFn = unsafe extern "C" fn(left: i16, right: i16);
pub type RetroAudioSampleBatchFn = unsafe extern "C" fn(data: *const i16, frames: usize) -> usize;
pub type RetroInputPollFn = unsafe extern "C" fn();
pub type RetroInputStateFn =
    unsafe extern "C" fn(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16;

// ── Core entry points ────────────────────────────────────────────────────────

pub type RetroInitFn = unsafe extern "C" fn();
pub type RetroDeinitFn = unsafe extern "C" fn();
pub type RetroApiVersionFn = unsafe extern "C" fn() -> c_uint;
pub type RetroGetSystemInfoFn = unsafe extern "C" fn(info: *mut RetroSystemInfo);
pub type RetroGetSystemAvInfoFn = unsafe extern "C" fn(info: *mut RetroSystemAvInfo);
pub type RetroSetEnvironmentFn = unsafe extern "C" fn(cb: RetroEnvironmentFn);
pub type RetroSetVideoRefreshFn = unsafe extern "C" fn(cb: RetroVideoRefreshFn);
pub type RetroSetAudioSampleFn = unsafe extern "C" fn(cb: RetroAudioSampleFn);
pub type RetroSetAudioSampleBatchFn = unsafe extern "C" fn(cb: RetroAudioSampleBatchFn);
pub type RetroSetInputPollFn = unsafe extern "C" fn(cb: RetroInputPollFn);
pub type RetroSetInputStateFn = unsafe extern "C" fn(cb: RetroInputStateFn);
pub type RetroSetControllerPortDeviceFn = unsafe extern "C" fn(port: c_uint, device: c_uint);
pub type RetroResetFn = unsafe extern "C" fn();
pub type RetroRunFn = unsafe extern "C" fn();
pub type RetroSerializeSizeFn = unsafe extern "C" fn() -> usize;
pub type RetroSerializeFn = unsafe extern "C" fn(data: *mut c_void, size: usize) -> bool;
pub type RetroUnserializeFn = unsafe extern "C" fn(data: *const c_void, size: usize) -> bool;
pub type RetroCheatResetFn = unsafe extern "C" fn();
pub type RetroCheatSetFn = unsafe extern "C" fn(index: c_uint, enabled: bool, code: *const c_char);
pub type RetroLoadGameFn = unsafe extern "C" fn(game: *const RetroGameInfo) -> bool;
pub type RetroLoadGameSpecialFn =
    unsafe extern "C" fn(game_type: c_uint, info: *const RetroGameInfo, num_info: usize) -> bool;
pub type RetroUnloadGameFn = unsafe extern "C" fn();
pub type RetroGetRegionFn = unsafe extern "C" fn() -> c_uint;
pub type RetroGetMemoryDataFn = unsafe extern "C" fn(id: c_uint) -> *mut c_void;
pub type RetroGetMemorySizeFn = unsafe extern "C" fn(id: c_uint) -> usize;

/// Symbols every core must export, in the order the host resolves them.
pub const ENTRY_POINTS: [&str; 25] = [
    "retro_init",
    "retro_deinit",
    "retro_api_version",
    "retro_get_system_info",
    "retro_get_system_av_info",
    "retro_set_environment",
    "retro_set_video_refresh",
    "retro_set_audio_sample",
    "retro_set_audio_sample_batch",
    "retro_set_input_poll",
    "retro_set_input_state",
    "retro_set_controller_port_device",
    "retro_reset",
    "retro_run",
    "retro_serialize_size",
    "retro_serialize",
    "retro_unserialize",
    "retro_cheat_reset",
    "retro_cheat_set",
    "retro_load_game",
    "retro_load_game_special",
    "retro_unload_game",
    "retro_get_region",
    "retro_get_memory_data",
    "retro_get_memory_size",
];
