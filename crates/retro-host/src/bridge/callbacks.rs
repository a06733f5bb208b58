//! `extern "C"` entry points handed to the core.
//!
//! None of them carries user data; each looks up the active bridge and
//! answers with a neutral value when there is none.

use std::borrow::Cow;
use std::ffi::{c_char, c_int, c_uint, c_void, CStr};

use retro_core_abi::{RetroLogPrintfFn, RetroProcAddressFn, HW_FRAME_BUFFER_VALID};

use super::active::with_active;
use super::environment;
use crate::components::{Frame, LogLevel};

pub(crate) unsafe extern "C" fn environment(cmd: c_uint, data: *mut c_void) -> bool {
    let (handled, context_reset) = with_active((false, None), |state| {
        let handled = environment::dispatch(state, cmd, data);
        (handled, state.pending_context_reset.take())
    });
    // runs unborrowed, the core may call back in
    if let Some(reset) = context_reset { reset(); }
    handled
}

pub(crate) unsafe extern "C" fn video_refresh(data: *const c_void, width: c_uint, height: c_uint, pitch: usize) {
    with_active((), |state| {
        let frame = if data == HW_FRAME_BUFFER_VALID {
            Frame::Hardware { width, height }
        } else if data.is_null() {
            Frame::Duplicate { width, height }
        } else {
            let row = width as usize * state.pixel_format.bytes_per_pixel();
            let len = if height == 0 { 0 } else { pitch * (height as usize - 1) + row };
            Frame::Software { data: std::slice::from_raw_parts(data.cast::<u8>(), len), width, height, pitch }
        };
        state.components.video.refresh(frame);
    })
}

pub(crate) unsafe extern "C" fn audio_sample(left: i16, right: i16) {
    with_active((), |state| state.samples.push(left, right, state.components.audio.as_mut()))
}

pub(crate) unsafe extern "C" fn audio_sample_batch(data: *const i16, frames: usize) -> usize {
    if data.is_null() || frames == 0 { return frames; }
    let batch = std::slice::from_raw_parts(data, frames * 2);
    with_active(frames, |state| state.samples.push_batch(batch, state.generate_audio, state.components.audio.as_mut()))
}

pub(crate) unsafe extern "C" fn input_poll() {
    with_active((), |state| state.components.input.poll())
}

pub(crate) unsafe extern "C" fn input_state(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16 {
    with_active(0, |state| state.components.input.read(port, device, index, id))
}

/// Receives printf-style lines. Stable Rust cannot walk C varargs, so the
/// format string is forwarded as is, marked when it had conversions.
unsafe extern "C" fn log_line(level: c_uint, fmt: *const c_char) {
    if fmt.is_null() { return; }
    let fmt = CStr::from_ptr(fmt).to_string_lossy();
    let line = mark_conversions(&fmt);
    with_active((), |state| state.log(LogLevel::from_raw(level), &line))
}

const ARGS_OMITTED: &str = " [printf arguments omitted]";

fn mark_conversions(fmt: &str) -> Cow<'_, str> {
    if !fmt.replace("%%", "").contains('%') { return Cow::Borrowed(fmt); }
    let body = fmt.trim_end_matches(['\r', '\n']);
    Cow::Owned(format!("{body}{ARGS_OMITTED}{}", &fmt[body.len()..]))
}

/// The log entry point under the variadic type cores expect. The fixed
/// arguments travel the same way in both signatures on every supported ABI.
pub(crate) fn log_printf() -> RetroLogPrintfFn {
    let fixed: unsafe extern "C" fn(c_uint, *const c_char) = log_line;
    unsafe { std::mem::transmute::<unsafe extern "C" fn(c_uint, *const c_char), RetroLogPrintfFn>(fixed) }
}

pub(crate) unsafe extern "C" fn set_rumble_state(port: c_uint, effect: c_uint, strength: u16) -> bool {
    with_active(false, |state| state.components.input.set_rumble(port, effect, strength))
}

pub(crate) unsafe extern "C" fn set_led_state(_led: c_int, _state: c_int) {}

pub(crate) unsafe extern "C" fn current_framebuffer() -> usize {
    with_active(0, |state| state.components.video.current_framebuffer())
}

pub(crate) unsafe extern "C" fn proc_address(symbol: *const c_char) -> Option<RetroProcAddressFn> {
    if symbol.is_null() { return None; }
    let symbol = CStr::from_ptr(symbol);
    with_active(None, |state| state.components.video.proc_address(symbol))
}

/// Some cores crash on exit without a callback here; it does nothing.
pub(crate) unsafe extern "C" fn clear_all_thread_waits(_clear_threads: c_uint, _data: *mut c_void) -> bool {
    true
}
