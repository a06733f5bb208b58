//! Collaborators the bridge forwards core requests to.
//!
//! The bridge owns one boxed implementation of each trait. Headless versions
//! ship with the crate for the CLI and tests; a real frontend swaps in its own
//! window, audio device and gamepad layers.

use std::alloc::Layout;
use std::ffi::{c_uint, CStr};
use std::path::PathBuf;
use std::ptr::NonNull;
use std::rc::Rc;

use retro_core_abi::{
    RetroGameGeometry, RetroHwRenderCallback, RetroKeyboardEventFn, RetroProcAddressFn, LOG_DEBUG,
    LOG_INFO, LOG_WARN, PIXEL_FORMAT_0RGB1555, PIXEL_FORMAT_RGB565, PIXEL_FORMAT_XRGB8888,
};
use serde::{Deserialize, Serialize};

use crate::bridge::tables::{ControllerInfo, CoreOption, InputDescriptor, OptionCategory};

pub mod allocator;
pub mod headless;
pub mod logger;

pub use allocator::BumpAllocator;
pub use headless::{HeadlessAudio, HeadlessStats, HeadlessVideo, NullInput, StatsSummary};
pub use logger::TracingLogger;

// ── Shared value types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Unknown levels from a core are treated as errors.
    pub fn from_raw(raw: c_uint) -> Self {
        match raw {
            LOG_DEBUG => Self::Debug,
            LOG_INFO => Self::Info,
            LOG_WARN => Self::Warn,
            _ => Self::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// Default until the core asks for something else; deprecated
    #[default]
    Rgb1555,
    Xrgb8888,
    Rgb565,
}

impl PixelFormat {
    pub fn from_raw(raw: c_uint) -> Option<Self> {
        match raw {
            PIXEL_FORMAT_0RGB1555 => Some(Self::Rgb1555),
            PIXEL_FORMAT_XRGB8888 => Some(Self::Xrgb8888),
            PIXEL_FORMAT_RGB565 => Some(Self::Rgb565),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self { Self::Xrgb8888 => 4, Self::Rgb1555 | Self::Rgb565 => 2 }
    }
}

/// One video refresh from the core.
#[derive(Debug, Clone, Copy)]
pub enum Frame<'a> {
    Software { data: &'a [u8], width: u32, height: u32, pitch: usize },
    /// Already rendered into the framebuffer handed out by `current_framebuffer`
    Hardware { width: u32, height: u32 },
    /// The core asks to show the previous frame again
    Duplicate { width: u32, height: u32 },
}

// ── Collaborator traits ──────────────────────────────────────────────────────

pub trait Logger {
    /// Lines below this level are dropped before formatting.
    fn level(&self) -> LogLevel;
    fn log(&mut self, level: LogLevel, line: &str);
}

pub trait Config {
    fn system_directory(&self) -> PathBuf;
    fn save_directory(&self) -> PathBuf;
    fn core_assets_directory(&self) -> PathBuf;

    /// Replaces the declared option set.
    fn set_variables(&mut self, options: &[CoreOption], categories: &[OptionCategory]);
    fn set_variable_display(&mut self, key: &str, visible: bool);
    /// Returns true once after any option value changed.
    fn variables_updated(&mut self) -> bool;
    fn variable(&self, key: &str) -> Option<String>;
    /// Core-initiated change; false when the key or value is not declared.
    fn set_variable(&mut self, key: &str, value: &str) -> bool;

    fn fast_forwarding(&self) -> bool;
    fn username(&self) -> Option<String>;
    fn language(&self) -> c_uint;
}

pub trait Video {
    fn set_enabled(&mut self, enabled: bool);
    fn set_geometry(&mut self, geometry: &RetroGameGeometry, format: PixelFormat, hw: Option<&RetroHwRenderCallback>) -> bool;
    fn refresh(&mut self, frame: Frame<'_>);
    fn supports_context(&self, context_type: c_uint) -> bool;
    fn current_framebuffer(&self) -> usize;
    fn proc_address(&self, symbol: &CStr) -> Option<RetroProcAddressFn>;
    fn show_message(&mut self, text: &str, frames: u32);
    /// Quarter turns counter-clockwise.
    fn set_rotation(&mut self, rotation: u32);
}

pub trait Audio {
    fn set_rate(&mut self, rate: f64) -> bool;
    /// Interleaved stereo; one frame is two samples.
    fn mix(&mut self, samples: &[i16]);
}

pub trait Input {
    fn set_input_descriptors(&mut self, descriptors: &[InputDescriptor]);
    fn set_keyboard_callback(&mut self, callback: Option<RetroKeyboardEventFn>);
    fn set_controller_info(&mut self, info: &[ControllerInfo]);
    fn controllers_updated(&mut self) -> bool;
    fn controller(&self, port: u32) -> u32;
    fn set_rumble(&mut self, port: u32, effect: u32, strength: u16) -> bool;
    fn poll(&mut self);
    fn read(&mut self, port: u32, device: u32, index: u32, id: u32) -> i16;
}

/// Bump storage for strings handed to the core. Memory is never freed one
/// allocation at a time, only in bulk by `reset`.
pub trait Allocator {
    fn reset(&mut self);
    fn allocate(&mut self, layout: Layout) -> Option<NonNull<u8>>;
}

/// Copies `text` into allocator storage as a NUL-terminated C string.
pub fn alloc_c_string(allocator: &mut dyn Allocator, text: &str) -> Option<NonNull<u8>> {
    if text.as_bytes().contains(&0) { return None; }
    let layout = Layout::array::<u8>(text.len() + 1).ok()?;
    let dst = allocator.allocate(layout)?;
    unsafe {
        std::ptr::copy_nonoverlapping(text.as_ptr(), dst.as_ptr(), text.len());
        *dst.as_ptr().add(text.len()) = 0;
    }
    Some(dst)
}

// ── Bundle ───────────────────────────────────────────────────────────────────

pub struct Components {
    pub logger: Box<dyn Logger>,
    pub config: Box<dyn Config>,
    pub video: Box<dyn Video>,
    pub audio: Box<dyn Audio>,
    pub input: Box<dyn Input>,
    pub allocator: Box<dyn Allocator>,
}

impl Components {
    /// Windowless collaborators driven by `settings`, plus the counters they update.
    pub fn headless(settings: crate::settings::HostSettings) -> (Self, Rc<HeadlessStats>) {
        let stats = Rc::new(HeadlessStats::default());
        let components = Self {
            logger: Box::new(TracingLogger::new(settings.log_level)),
            config: Box::new(crate::settings::SettingsConfig::new(settings)),
            video: Box::new(HeadlessVideo::new(stats.clone())),
            audio: Box::new(HeadlessAudio::new(stats.clone())),
            input: Box::new(NullInput::default()),
            allocator: Box::new(BumpAllocator::default()),
        };
        (components, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_log_levels_escalate() {
        assert_eq!(LogLevel::from_raw(LOG_WARN), LogLevel::Warn);
        assert_eq!(LogLevel::from_raw(77), LogLevel::Error);
        assert!(LogLevel::Debug < LogLevel::Error);
    }

    #[test]
    fn pixel_formats_decode() {
        assert_eq!(PixelFormat::from_raw(PIXEL_FORMAT_RGB565), Some(PixelFormat::Rgb565));
        assert_eq!(PixelFormat::from_raw(retro_core_abi::PIXEL_FORMAT_UNKNOWN), None);
        assert_eq!(PixelFormat::Xrgb8888.bytes_per_pixel(), 4);
    }

    #[test]
    fn c_strings_are_terminated() {
        let mut alloc = BumpAllocator::with_capacity(64);
        let ptr = alloc_c_string(&mut alloc, "bios").unwrap();
        let copied = unsafe { CStr::from_ptr(ptr.as_ptr().cast()) };
        assert_eq!(copied.to_str().unwrap(), "bios");
        assert!(alloc_c_string(&mut alloc, "a\0b").is_none());
    }
}
