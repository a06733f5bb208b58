//! Everything the bridge knows about the loaded core, behind one `RefCell`.

use std::collections::{HashMap, HashSet};
use std::ffi::c_char;
use std::fmt;
use std::ptr;
use std::time::Instant;

use retro_core_abi::env::describe;
use retro_core_abi::{
    RetroDiskControlExtCallback, RetroFrameTimeCallback, RetroGameGeometry, RetroHwContextResetFn,
    RetroHwRenderCallback, RetroSystemAvInfo,
};

use super::audio::SampleBuffer;
use super::tables::{ContentOverride, ControllerInfo, InputDescriptor, SubsystemInfo, SystemInfo};
use super::Lifecycle;
use crate::components::logger::clip_line;
use crate::components::{alloc_c_string, Components, LogLevel, PixelFormat};
use crate::memory::MemoryDescriptor;

/// Codes already reported as unimplemented.
#[derive(Debug, Default)]
pub(crate) struct UnknownCommands {
    low: u128,
    high: HashSet<u32>,
}

impl UnknownCommands {
    /// True the first time `code` is seen.
    pub(crate) fn first_sighting(&mut self, code: u32) -> bool {
        if code < 128 {
            let bit = 1u128 << code;
            let first = self.low & bit == 0;
            self.low |= bit;
            first
        } else {
            self.high.insert(code)
        }
    }
}

pub(crate) struct BridgeState {
    pub components: Components,
    pub lifecycle: Lifecycle,

    pub libretro_path: *const c_char,
    pub system_info: Option<SystemInfo>,
    pub av_info: RetroSystemAvInfo,
    pub pixel_format: PixelFormat,
    pub hw_render: Option<RetroHwRenderCallback>,
    /// Set by AV negotiation; run once the state is no longer borrowed
    pub pending_context_reset: Option<RetroHwContextResetFn>,

    pub performance_level: u32,
    pub supports_no_game: bool,
    pub supports_achievements: bool,
    pub shutdown_requested: bool,

    pub input_descriptors: Vec<InputDescriptor>,
    pub controller_info: Vec<ControllerInfo>,
    pub ports: Vec<u32>,
    pub subsystems: Vec<SubsystemInfo>,
    pub content_overrides: Vec<ContentOverride>,
    pub memory_map: Vec<MemoryDescriptor>,
    pub map_generation: u64,
    pub disk_control: RetroDiskControlExtCallback,
    pub frame_time: Option<RetroFrameTimeCallback>,
    pub last_frame: Option<Instant>,

    pub samples: SampleBuffer,
    pub generate_video: bool,
    pub generate_audio: bool,

    /// Warn and error lines collected while a call is being watched
    pub capture: Option<Vec<String>>,
    pub unknown: UnknownCommands,
    strings: HashMap<String, *const c_char>,
}

impl BridgeState {
    pub(crate) fn new(components: Components) -> Self {
        Self {
            components,
            lifecycle: Lifecycle::Unloaded,
            libretro_path: ptr::null(),
            system_info: None,
            av_info: RetroSystemAvInfo::default(),
            pixel_format: PixelFormat::default(),
            hw_render: None,
            pending_context_reset: None,
            performance_level: 0,
            supports_no_game: false,
            supports_achievements: false,
            shutdown_requested: false,
            input_descriptors: Vec::new(),
            controller_info: Vec::new(),
            ports: Vec::new(),
            subsystems: Vec::new(),
            content_overrides: Vec::new(),
            memory_map: Vec::new(),
            map_generation: 0,
            disk_control: RetroDiskControlExtCallback::default(),
            frame_time: None,
            last_frame: None,
            samples: SampleBuffer::default(),
            generate_video: true,
            generate_audio: true,
            capture: None,
            unknown: UnknownCommands::default(),
            strings: HashMap::new(),
        }
    }

    /// Back to `Unloaded`, dropping every copy taken from the core and the
    /// allocator storage handed to it.
    pub(crate) fn reset(&mut self) {
        self.lifecycle = Lifecycle::Unloaded;
        self.libretro_path = ptr::null();
        self.system_info = None;
        self.av_info = RetroSystemAvInfo::default();
        self.pixel_format = PixelFormat::default();
        self.hw_render = None;
        self.pending_context_reset = None;
        self.performance_level = 0;
        self.supports_no_game = false;
        self.supports_achievements = false;
        self.shutdown_requested = false;
        self.input_descriptors.clear();
        self.controller_info.clear();
        self.ports.clear();
        self.subsystems.clear();
        self.content_overrides.clear();
        self.memory_map.clear();
        self.map_generation += 1;
        self.disk_control = RetroDiskControlExtCallback::default();
        self.frame_time = None;
        self.last_frame = None;
        self.samples.clear();
        self.generate_video = true;
        self.generate_audio = true;
        self.capture = None;
        self.unknown = UnknownCommands::default();
        self.strings.clear();

        self.components.input.set_keyboard_callback(None);
        self.components.allocator.reset();
    }

    // ── Logging ──────────────────────────────────────────────────────────────

    fn enabled(&self, level: LogLevel) -> bool {
        level >= self.components.logger.level() || (self.capture.is_some() && level >= LogLevel::Warn)
    }

    pub(crate) fn log(&mut self, level: LogLevel, line: &str) {
        if level >= LogLevel::Warn {
            if let Some(captured) = &mut self.capture { captured.push(clip_line(line).into_owned()); }
        }
        if level >= self.components.logger.level() { self.components.logger.log(level, line); }
    }

    pub(crate) fn log_fmt(&mut self, level: LogLevel, args: fmt::Arguments<'_>) {
        if self.enabled(level) { self.log(level, &args.to_string()); }
    }

    /// Warns about `code` the first time only.
    pub(crate) fn report_unimplemented(&mut self, code: u32) {
        if self.unknown.first_sighting(code) {
            self.log_fmt(LogLevel::Warn, format_args!("Unimplemented env call: {}", describe(code)));
        }
    }

    // ── Strings handed to the core ───────────────────────────────────────────

    /// Frees all allocator storage; pointers from `intern` become invalid.
    pub(crate) fn reset_storage(&mut self) {
        self.strings.clear();
        self.components.allocator.reset();
    }

    /// A C copy of `text` that stays valid until the next reset; null when
    /// storage runs out or `text` holds a NUL.
    pub(crate) fn intern(&mut self, text: &str) -> *const c_char {
        if let Some(&ptr) = self.strings.get(text) { return ptr; }
        match alloc_c_string(self.components.allocator.as_mut(), text) {
            Some(ptr) => {
                let ptr = ptr.as_ptr().cast_const().cast::<c_char>();
                self.strings.insert(text.to_string(), ptr);
                ptr
            }
            None => {
                self.log_fmt(LogLevel::Error, format_args!("Could not copy string for the core: {text:?}"));
                ptr::null()
            }
        }
    }

    // ── AV negotiation ───────────────────────────────────────────────────────

    /// Pushes the current AV info to Video and Audio.
    pub(crate) fn negotiate_av(&mut self) -> bool {
        let RetroSystemAvInfo { geometry: g, timing: t } = self.av_info;
        self.log_fmt(
            LogLevel::Debug,
            format_args!(
                "retro_system_av_info: base {}x{}, max {}x{}, aspect {}, fps {}, sample rate {}",
                g.base_width, g.base_height, g.max_width, g.max_height, g.aspect_ratio, t.fps, t.sample_rate
            ),
        );
        fix_aspect_ratio(&mut self.av_info.geometry);

        let hw = self.hw_render;
        if !self.components.video.set_geometry(&self.av_info.geometry, self.pixel_format, hw.as_ref()) {
            self.log(LogLevel::Error, "Video rejected the core's geometry");
            return false;
        }
        if let Some(hw) = hw { self.pending_context_reset = hw.context_reset; }

        if !self.components.audio.set_rate(t.sample_rate) {
            self.log_fmt(LogLevel::Error, format_args!("Audio rejected the sample rate {}", t.sample_rate));
            return false;
        }
        true
    }

    /// Applies a geometry change that keeps the maximum size.
    pub(crate) fn change_geometry(&mut self, geometry: &RetroGameGeometry) -> bool {
        let current = &mut self.av_info.geometry;
        current.base_width = geometry.base_width;
        current.base_height = geometry.base_height;
        current.aspect_ratio = geometry.aspect_ratio;
        fix_aspect_ratio(current);

        let hw = self.hw_render;
        self.components.video.set_geometry(&self.av_info.geometry, self.pixel_format, hw.as_ref())
    }
}

fn fix_aspect_ratio(g: &mut RetroGameGeometry) {
    if g.aspect_ratio <= 0.0 && g.base_height > 0 {
        g.aspect_ratio = g.base_width as f32 / g.base_height as f32;
    }
}
