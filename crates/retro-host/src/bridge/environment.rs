//! The environment dispatcher: one entry point, one code per request.
//!
//! Every handler reads its payload with the layout fixed by the command,
//! answers from the bridge state or a collaborator, and reports whether the
//! request was honoured. Codes the host does not serve are refused and
//! reported once per bridge.

use std::ffi::{c_char, c_int, c_uint, c_void};
use std::path::PathBuf;

use retro_core_abi::env::{EXPERIMENTAL, PRIVATE};
use retro_core_abi::*;

use super::callbacks;
use super::state::BridgeState;
use super::tables::{self, owned, CoreOption, OptionCategory};
use crate::components::{LogLevel, PixelFormat};
use crate::memory::{canonicalize_all, MemoryDescriptor};

enum Reply {
    Done(bool),
    /// Named but not served; treated like an unknown code
    Unimplemented,
}

use Reply::{Done, Unimplemented};

/// Serves one environment request. `data` is the untyped payload the core
/// passed along with `raw`.
///
/// # Safety
/// `data` must match the payload layout of the command, as the core promises.
pub(crate) unsafe fn dispatch(state: &mut BridgeState, raw: c_uint, data: *mut c_void) -> bool {
    if raw & PRIVATE != 0 { return false; }
    let code = raw & !EXPERIMENTAL;
    let Some(cmd) = EnvCommand::from_raw(code) else {
        state.report_unimplemented(code);
        return false;
    };
    if data.is_null() && !accepts_null(cmd) {
        state.log_fmt(LogLevel::Warn, format_args!("{cmd} called without a payload"));
        return false;
    }

    state.log_fmt(LogLevel::Debug, format_args!("Calling {cmd}"));
    match handle(state, cmd, data) {
        Done(true) => {
            state.log_fmt(LogLevel::Debug, format_args!("Called {cmd} -> true"));
            true
        }
        Done(false) => {
            state.log_fmt(LogLevel::Warn, format_args!("Called {cmd} -> false"));
            false
        }
        Unimplemented => {
            state.report_unimplemented(code);
            false
        }
    }
}

fn accepts_null(cmd: EnvCommand) -> bool {
    use EnvCommand::*;
    matches!(cmd, Shutdown | GetInputBitmasks | SetVariable | SetSaveStateInBackground | PollTypeOverride)
}

unsafe fn read<T: Copy>(data: *mut c_void) -> T {
    *data.cast::<T>()
}

unsafe fn write<T>(data: *mut c_void, value: T) {
    data.cast::<T>().write(value)
}

unsafe fn handle(state: &mut BridgeState, cmd: EnvCommand, data: *mut c_void) -> Reply {
    use EnvCommand::*;
    match cmd {
        // ── Video and messages ───────────────────────────────────────────────
        SetRotation => {
            state.components.video.set_rotation(read::<c_uint>(data));
            Done(true)
        }
        GetOverscan => {
            write(data, false);
            Done(true)
        }
        GetCanDupe => {
            write(data, true);
            Done(true)
        }
        SetPixelFormat => set_pixel_format(state, read(data)),
        SetHwRender => set_hw_render(state, &mut *data.cast()),
        GetPreferredHwRender => {
            write::<c_uint>(data, HW_CONTEXT_OPENGL_CORE);
            Done(true)
        }
        SetSystemAvInfo => {
            state.av_info = read(data);
            Done(state.negotiate_av())
        }
        SetGeometry => {
            let g: RetroGameGeometry = read(data);
            state.log_fmt(
                LogLevel::Debug,
                format_args!("retro_game_geometry: base {}x{}, aspect {}", g.base_width, g.base_height, g.aspect_ratio),
            );
            Done(state.change_geometry(&g))
        }
        GetTargetRefreshRate => {
            write(data, state.av_info.timing.fps as f32);
            Done(true)
        }
        GetAudioVideoEnable => {
            let mut flags: c_int = 0;
            if state.generate_video { flags |= AV_ENABLE_VIDEO; }
            if state.generate_audio { flags |= AV_ENABLE_AUDIO; }
            write(data, flags);
            Done(true)
        }
        SetMessage => {
            let msg: RetroMessage = read(data);
            if let Some(text) = owned(msg.msg) { state.components.video.show_message(&text, msg.frames); }
            Done(true)
        }
        GetMessageInterfaceVersion => {
            write::<c_uint>(data, 1);
            Done(true)
        }
        SetMessageExt => set_message_ext(state, &read(data)),

        // ── Paths and identity ───────────────────────────────────────────────
        GetSystemDirectory => {
            let dir = state.components.config.system_directory();
            directory(state, data, dir, false)
        }
        GetSaveDirectory => {
            let dir = state.components.config.save_directory();
            directory(state, data, dir, true)
        }
        GetCoreAssetsDirectory => {
            let dir = state.components.config.core_assets_directory();
            directory(state, data, dir, false)
        }
        GetLibretroPath => {
            write(data, state.libretro_path);
            Done(!state.libretro_path.is_null())
        }
        GetUsername => match state.components.config.username() {
            Some(name) => {
                let ptr = state.intern(&name);
                write(data, ptr);
                Done(!ptr.is_null())
            }
            None => Done(false),
        },
        GetLanguage => {
            write(data, state.components.config.language());
            Done(true)
        }

        // ── Core state reports ───────────────────────────────────────────────
        Shutdown => {
            state.log(LogLevel::Info, "Core requested shutdown");
            state.shutdown_requested = true;
            Done(true)
        }
        SetPerformanceLevel => {
            let level: c_uint = read(data);
            state.log_fmt(LogLevel::Info, format_args!("Performance level {level} reported"));
            state.performance_level = level;
            Done(true)
        }
        SetSupportNoGame => {
            state.supports_no_game = read(data);
            Done(true)
        }
        SetSupportAchievements => {
            state.supports_achievements = read(data);
            Done(true)
        }
        GetFastForwarding => {
            write(data, state.components.config.fast_forwarding());
            Done(true)
        }
        SetFrameTimeCallback => {
            state.frame_time = Some(read(data));
            Done(true)
        }
        SetContentInfoOverride => {
            let overrides = tables::content_overrides(data.cast());
            for o in &overrides {
                state.log_fmt(
                    LogLevel::Info,
                    format_args!("Content override {}: need_fullpath={} persistent_data={}", o.extensions, o.need_fullpath, o.persistent_data),
                );
            }
            state.content_overrides = overrides;
            Done(true)
        }

        // ── Options ──────────────────────────────────────────────────────────
        GetVariable => get_variable(state, &mut *data.cast()),
        SetVariables => declare_options(state, tables::variables(data.cast()), Vec::new()),
        GetVariableUpdate => {
            write(data, state.components.config.variables_updated());
            Done(true)
        }
        SetVariable => {
            // a null payload asks whether the command is supported
            if data.is_null() { return Done(true); }
            let var: RetroVariable = read(data);
            match (owned(var.key), owned(var.value)) {
                (Some(key), Some(value)) => Done(state.components.config.set_variable(&key, &value)),
                _ => Done(false),
            }
        }
        GetCoreOptionsVersion => {
            write::<c_uint>(data, 2);
            Done(true)
        }
        SetCoreOptions => declare_options(state, tables::options_v1(data.cast()), Vec::new()),
        SetCoreOptionsIntl => {
            let intl: RetroCoreOptionsIntl = read(data);
            declare_options(state, tables::options_v1(intl.us), Vec::new())
        }
        SetCoreOptionsV2 => {
            let (options, categories) = tables::options_v2(&*data.cast());
            declare_options(state, options, categories)
        }
        SetCoreOptionsV2Intl => {
            let intl: RetroCoreOptionsV2Intl = read(data);
            if intl.us.is_null() { return Done(false); }
            let (options, categories) = tables::options_v2(&*intl.us);
            declare_options(state, options, categories)
        }
        SetCoreOptionsDisplay => {
            let display: RetroCoreOptionDisplay = read(data);
            if let Some(key) = owned(display.key) { state.components.config.set_variable_display(&key, display.visible); }
            Done(true)
        }

        // ── Input ────────────────────────────────────────────────────────────
        SetInputDescriptors => {
            let descriptors = tables::input_descriptors(data.cast());
            state.log(LogLevel::Debug, "retro_input_descriptor: port device index id description");
            for d in &descriptors {
                state.log_fmt(
                    LogLevel::Debug,
                    format_args!("  {:4} {:6} {:5} {:2} {}", d.port, d.device, d.index, d.id, d.description),
                );
            }
            state.components.input.set_input_descriptors(&descriptors);
            state.input_descriptors = descriptors;
            Done(true)
        }
        SetKeyboardCallback => {
            let cb: RetroKeyboardCallback = read(data);
            state.components.input.set_keyboard_callback(cb.callback);
            Done(true)
        }
        SetControllerInfo => {
            let info = tables::controller_info(data.cast());
            state.log(LogLevel::Debug, "retro_controller_info: port id desc");
            for (port, types) in info.iter().enumerate() {
                for t in &types.types {
                    state.log_fmt(LogLevel::Debug, format_args!("  {port:4} {:04x} {}", t.id, t.desc));
                }
            }
            state.ports = vec![DEVICE_NONE; info.len()];
            state.components.input.set_controller_info(&info);
            state.controller_info = info;
            Done(true)
        }
        GetInputBitmasks => Done(true),
        GetInputDeviceCapabilities => {
            let caps: u64 = (1 << DEVICE_JOYPAD) | (1 << DEVICE_ANALOG) | (1 << DEVICE_MOUSE) | (1 << DEVICE_KEYBOARD);
            write(data, caps);
            // the mask is filled in, but the answer stays "not supported"
            Done(false)
        }
        GetRumbleInterface => {
            write(data, RetroRumbleInterface { set_rumble_state: Some(callbacks::set_rumble_state) });
            Done(true)
        }
        GetLedInterface => {
            write(data, RetroLedInterface { set_led_state: Some(callbacks::set_led_state) });
            Done(true)
        }
        GetLogInterface => {
            write(data, RetroLogCallback { log: Some(callbacks::log_printf()) });
            Done(true)
        }

        // ── Disks ────────────────────────────────────────────────────────────
        GetDiskControlInterfaceVersion => {
            write::<c_uint>(data, 1);
            Done(true)
        }
        SetDiskControlInterface => {
            let cb: RetroDiskControlCallback = read(data);
            state.disk_control = RetroDiskControlExtCallback {
                set_eject_state: cb.set_eject_state,
                get_eject_state: cb.get_eject_state,
                get_image_index: cb.get_image_index,
                set_image_index: cb.set_image_index,
                get_num_images: cb.get_num_images,
                replace_image_index: cb.replace_image_index,
                add_image_index: cb.add_image_index,
                ..Default::default()
            };
            Done(true)
        }
        SetDiskControlExtInterface => {
            state.disk_control = read(data);
            Done(true)
        }

        // ── Descriptions ─────────────────────────────────────────────────────
        SetSubsystemInfo => {
            let subsystems = tables::subsystem_info(data.cast());
            for s in &subsystems {
                state.log_fmt(LogLevel::Debug, format_args!("retro_subsystem_info: {} ({}) id {}", s.desc, s.ident, s.id));
                for (i, rom) in s.roms.iter().enumerate() {
                    state.log_fmt(
                        LogLevel::Debug,
                        format_args!(
                            "  roms[{i}] {} [{}] need_fullpath={} block_extract={} required={} memory={}",
                            rom.desc, rom.valid_extensions, rom.need_fullpath, rom.block_extract, rom.required, rom.memory.len()
                        ),
                    );
                }
            }
            state.subsystems = subsystems;
            Done(true)
        }
        SetMemoryMaps => {
            let declared = tables::memory_map(&*data.cast());
            log_memory_map(state, &declared);
            state.memory_map = canonicalize_all(&declared);
            state.map_generation += 1;
            Done(true)
        }

        // ── Frontend probes ──────────────────────────────────────────────────
        GetClearAllThreadWaitsCb => {
            write::<RetroClearAllThreadWaitsFn>(data, callbacks::clear_all_thread_waits);
            Unimplemented
        }

        _ => Unimplemented,
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

fn set_pixel_format(state: &mut BridgeState, raw: c_uint) -> Reply {
    match PixelFormat::from_raw(raw) {
        Some(format) => {
            if format == PixelFormat::Rgb1555 { state.log(LogLevel::Warn, "Pixel format 0RGB1555 is deprecated"); }
            state.pixel_format = format;
            Done(true)
        }
        None => {
            state.log_fmt(LogLevel::Error, format_args!("Unsupported pixel format {raw}"));
            Done(false)
        }
    }
}

const CONTEXT_NAMES: [&str; 11] = [
    "NONE", "OPENGL", "OPENGLES2", "OPENGL_CORE", "OPENGLES3", "OPENGLES_VERSION", "VULKAN", "D3D11", "D3D10", "D3D12", "D3D9",
];

fn set_hw_render(state: &mut BridgeState, cb: &mut RetroHwRenderCallback) -> Reply {
    let name = CONTEXT_NAMES.get(cb.context_type as usize).copied().unwrap_or("?");
    if !state.components.video.supports_context(cb.context_type) {
        state.log_fmt(LogLevel::Error, format_args!("Context type not supported: {name}"));
        return Done(false);
    }

    cb.get_current_framebuffer = Some(callbacks::current_framebuffer);
    cb.get_proc_address = Some(callbacks::proc_address);
    state.log_fmt(
        LogLevel::Debug,
        format_args!(
            "retro_hw_render_callback: {name} {}.{} depth={} stencil={} bottom_left_origin={} cache_context={} debug_context={}",
            cb.version_major, cb.version_minor, cb.depth, cb.stencil, cb.bottom_left_origin, cb.cache_context, cb.debug_context
        ),
    );
    state.hw_render = Some(*cb);
    Done(true)
}

unsafe fn directory(state: &mut BridgeState, data: *mut c_void, path: PathBuf, create: bool) -> Reply {
    if path.as_os_str().is_empty() {
        write::<*const c_char>(data, std::ptr::null());
        return Done(true);
    }
    if create {
        if let Err(e) = std::fs::create_dir_all(&path) {
            state.log_fmt(LogLevel::Warn, format_args!("Could not create {}: {e}", path.display()));
        }
    }
    let ptr = state.intern(&path.to_string_lossy());
    write(data, ptr);
    Done(!ptr.is_null())
}

unsafe fn get_variable(state: &mut BridgeState, var: &mut RetroVariable) -> Reply {
    let Some(key) = owned(var.key) else { return Done(false) };
    match state.components.config.variable(&key) {
        Some(value) => {
            var.value = state.intern(&value);
            state.log_fmt(LogLevel::Debug, format_args!("Variable {key} is {value:?}"));
            Done(!var.value.is_null())
        }
        None => {
            var.value = std::ptr::null();
            state.log_fmt(LogLevel::Debug, format_args!("Variable {key} not found"));
            Done(false)
        }
    }
}

fn declare_options(state: &mut BridgeState, options: Vec<CoreOption>, categories: Vec<OptionCategory>) -> Reply {
    for o in &options {
        state.log_fmt(LogLevel::Debug, format_args!("  {}: {}", o.key, o.desc));
    }
    state.components.config.set_variables(&options, &categories);
    Done(true)
}

const MESSAGE_TARGET_OSD: c_uint = 1;
const MESSAGE_TARGET_LOG: c_uint = 2;

unsafe fn set_message_ext(state: &mut BridgeState, msg: &RetroMessageExt) -> Reply {
    let Some(text) = owned(msg.msg) else { return Done(false) };
    if msg.target != MESSAGE_TARGET_OSD { state.log(LogLevel::from_raw(msg.level), &text); }
    if msg.target != MESSAGE_TARGET_LOG {
        let fps = if state.av_info.timing.fps > 0.0 { state.av_info.timing.fps } else { 60.0 };
        let frames = ((msg.duration as f64 * fps / 1000.0) as u32).max(1);
        state.components.video.show_message(&text, frames);
    }
    Done(true)
}

/// Flag summary in the `M<minsize>A<align><b|B><c|C>` form.
fn memdesc_flags(flags: u64) -> String {
    let width = |eight: u64, four: u64, two: u64| {
        if flags & eight == eight { '8' } else if flags & four == four { '4' } else if flags & two == two { '2' } else { '1' }
    };
    format!(
        "M{}A{}{}{}",
        width(MEMDESC_MINSIZE_8, MEMDESC_MINSIZE_4, MEMDESC_MINSIZE_2),
        width(MEMDESC_ALIGN_8, MEMDESC_ALIGN_4, MEMDESC_ALIGN_2),
        if flags & MEMDESC_BIGENDIAN != 0 { 'B' } else { 'b' },
        if flags & MEMDESC_CONST != 0 { 'C' } else { 'c' },
    )
}

fn log_memory_map(state: &mut BridgeState, declared: &[MemoryDescriptor]) {
    state.log(LogLevel::Debug, "retro_memory_map: ndx flags  ptr      offset   start    select   disconn  len      addrspace");
    for (i, d) in declared.iter().enumerate() {
        state.log_fmt(
            LogLevel::Debug,
            format_args!(
                "  {:3} {} {:p} {:08X} {:08X} {:08X} {:08X} {:08X} {}",
                i + 1,
                memdesc_flags(d.flags),
                d.ptr,
                d.offset,
                d.start,
                d.select,
                d.disconnect,
                d.len,
                d.addrspace.as_deref().unwrap_or("")
            ),
        );
    }
}
