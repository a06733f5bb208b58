//! Windowless collaborators: count what the core produces and answer input
//! queries with "nothing pressed".

use std::cell::{Cell, RefCell};
use std::ffi::CStr;
use std::rc::Rc;

use retro_core_abi::{RetroGameGeometry, RetroHwRenderCallback, RetroKeyboardEventFn, RetroProcAddressFn, DEVICE_NONE};
use serde::Serialize;

use super::{Audio, Frame, Input, PixelFormat, Video};
use crate::bridge::tables::{ControllerInfo, InputDescriptor};

/// Counters shared between the headless collaborators and whoever drives them.
#[derive(Debug, Default)]
pub struct HeadlessStats {
    pub video_frames: Cell<u64>,
    pub duplicate_frames: Cell<u64>,
    pub audio_frames: Cell<u64>,
    pub messages: RefCell<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub video_frames: u64,
    pub duplicate_frames: u64,
    pub audio_frames: u64,
    pub messages: Vec<String>,
}

impl HeadlessStats {
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            video_frames: self.video_frames.get(),
            duplicate_frames: self.duplicate_frames.get(),
            audio_frames: self.audio_frames.get(),
            messages: self.messages.borrow().clone(),
        }
    }
}

// ── Video ────────────────────────────────────────────────────────────────────

/// Accepts every software pixel format and no hardware context.
#[derive(Debug, Default)]
pub struct HeadlessVideo {
    stats: Rc<HeadlessStats>,
    enabled: bool,
    geometry: Option<(RetroGameGeometry, PixelFormat)>,
    rotation: u32,
}

impl HeadlessVideo {
    pub fn new(stats: Rc<HeadlessStats>) -> Self {
        Self { stats, ..Self::default() }
    }

    pub fn geometry(&self) -> Option<(RetroGameGeometry, PixelFormat)> {
        self.geometry
    }
}

impl Video for HeadlessVideo {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_geometry(&mut self, geometry: &RetroGameGeometry, format: PixelFormat, hw: Option<&RetroHwRenderCallback>) -> bool {
        if hw.is_some() || geometry.base_width == 0 || geometry.base_height == 0 { return false; }
        tracing::debug!(width = geometry.base_width, height = geometry.base_height, ?format, "headless geometry");
        self.geometry = Some((*geometry, format));
        true
    }

    fn refresh(&mut self, frame: Frame<'_>) {
        if !self.enabled { return; }
        match frame {
            Frame::Duplicate { .. } => self.stats.duplicate_frames.set(self.stats.duplicate_frames.get() + 1),
            Frame::Software { .. } | Frame::Hardware { .. } => self.stats.video_frames.set(self.stats.video_frames.get() + 1),
        }
    }

    fn supports_context(&self, _context_type: u32) -> bool {
        false
    }

    fn current_framebuffer(&self) -> usize {
        0
    }

    fn proc_address(&self, _symbol: &CStr) -> Option<RetroProcAddressFn> {
        None
    }

    fn show_message(&mut self, text: &str, frames: u32) {
        tracing::info!(frames, "core message: {text}");
        self.stats.messages.borrow_mut().push(text.to_string());
    }

    fn set_rotation(&mut self, rotation: u32) {
        self.rotation = rotation;
    }
}

// ── Audio ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct HeadlessAudio {
    stats: Rc<HeadlessStats>,
    rate: f64,
}

impl HeadlessAudio {
    pub fn new(stats: Rc<HeadlessStats>) -> Self {
        Self { stats, rate: 0.0 }
    }
}

impl Audio for HeadlessAudio {
    fn set_rate(&mut self, rate: f64) -> bool {
        if rate.is_nan() || rate <= 0.0 { return false; }
        self.rate = rate;
        true
    }

    fn mix(&mut self, samples: &[i16]) {
        self.stats.audio_frames.set(self.stats.audio_frames.get() + (samples.len() / 2) as u64);
    }
}

// ── Input ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct NullInput {
    descriptors: usize,
    ports: usize,
    keyboard: Option<RetroKeyboardEventFn>,
}

impl Input for NullInput {
    fn set_input_descriptors(&mut self, descriptors: &[InputDescriptor]) {
        self.descriptors = descriptors.len();
    }

    fn set_keyboard_callback(&mut self, callback: Option<RetroKeyboardEventFn>) {
        self.keyboard = callback;
    }

    fn set_controller_info(&mut self, info: &[ControllerInfo]) {
        self.ports = info.len();
    }

    fn controllers_updated(&mut self) -> bool {
        false
    }

    fn controller(&self, _port: u32) -> u32 {
        DEVICE_NONE
    }

    fn set_rumble(&mut self, _port: u32, _effect: u32, _strength: u16) -> bool {
        false
    }

    fn poll(&mut self) {}

    fn read(&mut self, _port: u32, _device: u32, _index: u32, _id: u32) -> i16 {
        0
    }
}
