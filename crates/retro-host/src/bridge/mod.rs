//! The host bridge: owns one plugin and drives it through its lifecycle.
//!
//! ```text
//! Unloaded --load_core--> LibraryLoaded --init_core--> Initialized
//!     ^                                                    |
//!     +-------------- destroy <-- GameLoaded <--load_game--+
//! ```
//!
//! Every call into the plugin runs inside an [`active::ActiveScope`] with no
//! borrow of the state held, so the plugin's callbacks can reach the state.

use std::cell::RefCell;
use std::ffi::{c_char, c_uint, c_void, CStr, CString};
use std::path::Path;
use std::ptr;
use std::time::Instant;

use retro_core_abi::{RetroFrameTimeCallback, RetroGameInfo, RetroGetImageStringFn, RetroSystemAvInfo, DEVICE_NONE};

mod active;
pub mod audio;
mod callbacks;
mod environment;
pub(crate) mod state;
pub mod tables;

use self::active::ActiveScope;
use self::state::BridgeState;
use self::tables::SystemInfo;
use crate::components::{Components, PixelFormat};
use crate::error::{join_details, HostError, Result};
use crate::memory::{publish, MemoryDescriptor, MemorySource};
use crate::plugin::{CoreApi, PluginHandle};
use crate::restrictions::{self, DisallowedSetting};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unloaded,
    LibraryLoaded,
    Initialized,
    GameLoaded,
}

const DISK_LABEL_LEN: usize = 256;
const DISK_PATH_LEN: usize = 1024;

pub struct HostBridge {
    // Boxed so the address handed to the thread-local slot never moves.
    state: Box<RefCell<BridgeState>>,
    plugin: PluginHandle,
}

impl HostBridge {
    pub fn new(components: Components) -> Self {
        Self { state: Box::new(RefCell::new(BridgeState::new(components))), plugin: PluginHandle::default() }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.borrow().lifecycle
    }

    fn require(&self, expected: Lifecycle) -> Result<()> {
        let found = self.lifecycle();
        if found != expected { return Err(HostError::InvalidState { expected, found }); }
        Ok(())
    }

    fn set_lifecycle(&self, lifecycle: Lifecycle) {
        self.state.borrow_mut().lifecycle = lifecycle;
        tracing::debug!(?lifecycle, "bridge state changed");
    }

    /// Runs `f` against the plugin with this bridge active.
    fn call<R>(&self, f: impl FnOnce(&PluginHandle) -> R) -> R {
        let _scope = ActiveScope::enter(&self.state);
        f(&self.plugin)
    }

    /// Drops the plugin and every copy taken from it.
    fn teardown(&mut self) {
        // published banks point into memory the core owns
        if self.plugin.is_loaded() { publish::invalidate(); }
        self.plugin.destroy();
        self.state.borrow_mut().reset();
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Opens a core library and binds its entry points.
    pub fn load_core(&mut self, path: &Path) -> Result<()> {
        self.require(Lifecycle::Unloaded)?;
        {
            let mut state = self.state.borrow_mut();
            state.reset_storage();
            state.libretro_path = state.intern(&path.to_string_lossy());
        }
        if let Err(e) = self.plugin.load(path) {
            tracing::error!(path = %path.display(), "{e}");
            self.teardown();
            return Err(e);
        }
        tracing::info!(path = %path.display(), "core loaded");
        self.set_lifecycle(Lifecycle::LibraryLoaded);
        Ok(())
    }

    /// Attaches a core whose entry points are already resolved, typically one
    /// linked into the host binary.
    pub fn attach_core(&mut self, api: CoreApi) -> Result<()> {
        self.require(Lifecycle::Unloaded)?;
        self.state.borrow_mut().reset_storage();
        self.plugin = PluginHandle::from_api(api);
        self.set_lifecycle(Lifecycle::LibraryLoaded);
        Ok(())
    }

    pub fn init_core(&mut self) -> Result<()> {
        self.require(Lifecycle::LibraryLoaded)?;
        let raw = self.call(PluginHandle::system_info);
        let info = match unsafe { SystemInfo::from_raw(&raw) } {
            Ok(info) => info,
            Err(e) => {
                tracing::error!("{e}");
                self.teardown();
                return Err(e);
            }
        };
        tracing::info!(
            name = %info.library_name,
            version = %info.library_version,
            extensions = info.valid_extensions.as_deref().unwrap_or(""),
            need_fullpath = info.need_fullpath,
            block_extract = info.block_extract,
            "core system info"
        );
        self.state.borrow_mut().system_info = Some(info);

        self.call(|plugin| {
            plugin.set_environment(callbacks::environment);
            plugin.init();
        });
        self.set_lifecycle(Lifecycle::Initialized);
        Ok(())
    }

    /// Hands content to the core. `path` and `data` may both be absent for
    /// cores that run without content.
    pub fn load_game(&mut self, path: Option<&Path>, data: Option<&[u8]>) -> Result<()> {
        self.require(Lifecycle::Initialized)?;
        let shown = path.map_or_else(|| "(no content)".to_string(), |p| p.display().to_string());
        let c_path = path.map(|p| CString::new(p.to_string_lossy().into_owned())).transpose()?;
        let game = RetroGameInfo {
            path: c_path.as_ref().map_or(ptr::null(), |p| p.as_ptr()),
            data: data.map_or(ptr::null(), |d| d.as_ptr().cast()),
            size: data.map_or(0, <[u8]>::len),
            meta: ptr::null(),
        };

        self.state.borrow_mut().capture = Some(Vec::new());
        let accepted = self.call(|plugin| unsafe { plugin.load_game(&game) });
        let captured = self.state.borrow_mut().capture.take().unwrap_or_default();
        if !accepted {
            tracing::error!(content = %shown, "core rejected content");
            self.abandon_rejected();
            return Err(HostError::ContentRejected { path: shown, details: join_details(captured) });
        }

        let av = self.call(|plugin| {
            plugin.set_video_refresh(callbacks::video_refresh);
            plugin.set_audio_sample(callbacks::audio_sample);
            plugin.set_audio_sample_batch(callbacks::audio_sample_batch);
            plugin.set_input_poll(callbacks::input_poll);
            plugin.set_input_state(callbacks::input_state);
            plugin.system_av_info()
        });

        let (negotiated, context_reset, ports) = {
            let mut state = self.state.borrow_mut();
            state.av_info = av;
            let negotiated = state.negotiate_av();
            state.ports.iter_mut().for_each(|port| *port = DEVICE_NONE);
            (negotiated, state.pending_context_reset.take(), state.ports.len())
        };
        if !negotiated {
            self.call(|plugin| {
                plugin.unload_game();
                plugin.deinit();
            });
            self.teardown();
            return Err(HostError::Negotiation(format!("frontend refused the AV settings for {shown}")));
        }

        self.call(|plugin| {
            if let Some(reset) = context_reset { unsafe { reset() } }
            for port in 0..ports {
                plugin.set_controller_port_device(port as c_uint, DEVICE_NONE);
            }
        });
        tracing::info!(content = %shown, "content loaded");
        self.set_lifecycle(Lifecycle::GameLoaded);
        Ok(())
    }

    /// Some cores deinitialize themselves when they reject content and then
    /// report an empty library name; those must not be deinitialized twice.
    fn abandon_rejected(&mut self) {
        self.call(|plugin| {
            let info = plugin.system_info();
            let alive = !info.library_name.is_null() && unsafe { *info.library_name != 0 };
            if alive {
                plugin.deinit();
            } else {
                tracing::debug!("core already tore itself down");
            }
        });
        self.teardown();
    }

    /// Emulates one frame.
    pub fn step(&mut self, generate_video: bool, generate_audio: bool) -> Result<()> {
        self.require(Lifecycle::GameLoaded)?;

        let (changes, frame_time) = {
            let mut state = self.state.borrow_mut();
            let mut changes = Vec::new();
            if state.components.input.controllers_updated() {
                for port in 0..state.ports.len() {
                    let device = state.components.input.controller(port as u32);
                    if state.ports[port] != device {
                        state.ports[port] = device;
                        changes.push((port as c_uint, device));
                    }
                }
            }

            let mut frame_time = None;
            if let Some(RetroFrameTimeCallback { callback: Some(callback), reference }) = state.frame_time {
                let now = Instant::now();
                let usec = state.last_frame.replace(now).map_or(reference, |prev| now.duration_since(prev).as_micros() as i64);
                frame_time = Some((callback, usec));
            }

            state.samples.clear();
            state.generate_video = generate_video;
            state.generate_audio = generate_audio;
            state.components.video.set_enabled(generate_video);
            (changes, frame_time)
        };

        self.call(|plugin| {
            for (port, device) in changes {
                tracing::debug!(port, device, "controller changed");
                plugin.set_controller_port_device(port, device);
            }
            if let Some((callback, usec)) = frame_time { unsafe { callback(usec) } }
            plugin.run();
        });

        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if generate_audio { state.samples.flush(state.components.audio.as_mut()) } else { state.samples.clear() }
        Ok(())
    }

    /// Unloads content, shuts the core down and closes its library. Always
    /// ends `Unloaded`.
    pub fn destroy(&mut self) {
        let lifecycle = self.lifecycle();
        self.call(|plugin| {
            if lifecycle == Lifecycle::GameLoaded { plugin.unload_game(); }
            if matches!(lifecycle, Lifecycle::Initialized | Lifecycle::GameLoaded) { plugin.deinit(); }
        });
        self.teardown();
        if lifecycle != Lifecycle::Unloaded { tracing::info!("core unloaded"); }
    }

    // ── Pass-throughs ────────────────────────────────────────────────────────

    pub fn api_version(&self) -> u32 {
        self.call(PluginHandle::api_version)
    }

    pub fn region(&self) -> u32 {
        self.call(PluginHandle::region)
    }

    pub fn memory_data(&self, id: u32) -> *mut c_void {
        self.call(|plugin| plugin.memory_data(id))
    }

    pub fn memory_size(&self, id: u32) -> usize {
        self.call(|plugin| plugin.memory_size(id))
    }

    pub fn reset_game(&mut self) -> Result<()> {
        self.require(Lifecycle::GameLoaded)?;
        self.call(PluginHandle::reset);
        Ok(())
    }

    pub fn serialize_size(&self) -> usize {
        self.call(PluginHandle::serialize_size)
    }

    pub fn serialize(&self, buf: &mut [u8]) -> bool {
        self.call(|plugin| plugin.serialize(buf))
    }

    /// Restores a save state; the core's complaints come back in the error.
    pub fn unserialize(&mut self, data: &[u8]) -> Result<()> {
        self.state.borrow_mut().capture = Some(Vec::new());
        let accepted = self.call(|plugin| plugin.unserialize(data));
        let captured = self.state.borrow_mut().capture.take().unwrap_or_default();
        if accepted { Ok(()) } else { Err(HostError::StateRejected { details: join_details(captured) }) }
    }

    pub fn cheat_reset(&self) {
        self.call(PluginHandle::cheat_reset)
    }

    pub fn cheat_set(&self, index: u32, enabled: bool, code: &str) -> Result<()> {
        let code = CString::new(code)?;
        self.call(|plugin| plugin.cheat_set(index, enabled, &code));
        Ok(())
    }

    // ── Disk control ─────────────────────────────────────────────────────────

    pub fn disk_count(&self) -> u32 {
        let cb = self.state.borrow().disk_control.get_num_images;
        cb.map_or(0, |f| self.call(|_| unsafe { f() }))
    }

    pub fn disk_index(&self) -> Option<u32> {
        let cb = self.state.borrow().disk_control.get_image_index;
        cb.map(|f| self.call(|_| unsafe { f() }))
    }

    pub fn set_disk_index(&self, index: u32) -> bool {
        let cb = self.state.borrow().disk_control.set_image_index;
        cb.map_or(false, |f| self.call(|_| unsafe { f(index) }))
    }

    pub fn disk_tray_open(&self) -> bool {
        let cb = self.state.borrow().disk_control.get_eject_state;
        cb.map_or(false, |f| self.call(|_| unsafe { f() }))
    }

    pub fn set_disk_tray_open(&self, open: bool) -> bool {
        let cb = self.state.borrow().disk_control.set_eject_state;
        cb.map_or(false, |f| self.call(|_| unsafe { f(open) }))
    }

    /// Only cores with the extended disk interface label their images.
    pub fn disk_label(&self, index: u32) -> Option<String> {
        let cb = self.state.borrow().disk_control.get_image_label;
        self.image_string(cb, index, DISK_LABEL_LEN)
    }

    pub fn disk_path(&self, index: u32) -> Option<String> {
        let cb = self.state.borrow().disk_control.get_image_path;
        self.image_string(cb, index, DISK_PATH_LEN)
    }

    fn image_string(&self, cb: Option<RetroGetImageStringFn>, index: u32, len: usize) -> Option<String> {
        let f = cb?;
        let mut buf = vec![0u8; len];
        let ok = self.call(|_| unsafe { f(index, buf.as_mut_ptr().cast::<c_char>(), len) });
        if !ok { return None; }
        buf[len - 1] = 0;
        CStr::from_bytes_until_nul(&buf).ok().map(|s| s.to_string_lossy().into_owned())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn system_info(&self) -> Option<SystemInfo> {
        self.state.borrow().system_info.clone()
    }

    pub fn av_info(&self) -> RetroSystemAvInfo {
        self.state.borrow().av_info
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.state.borrow().pixel_format
    }

    pub fn performance_level(&self) -> u32 {
        self.state.borrow().performance_level
    }

    pub fn supports_no_game(&self) -> bool {
        self.state.borrow().supports_no_game
    }

    pub fn supports_achievements(&self) -> bool {
        self.state.borrow().supports_achievements
    }

    pub fn shutdown_requested(&self) -> bool {
        self.state.borrow().shutdown_requested
    }

    pub fn input_descriptors(&self) -> Vec<tables::InputDescriptor> {
        self.state.borrow().input_descriptors.clone()
    }

    pub fn controller_info(&self) -> Vec<tables::ControllerInfo> {
        self.state.borrow().controller_info.clone()
    }

    pub fn subsystems(&self) -> Vec<tables::SubsystemInfo> {
        self.state.borrow().subsystems.clone()
    }

    pub fn memory_descriptors(&self) -> Vec<MemoryDescriptor> {
        self.state.borrow().memory_map.clone()
    }

    /// Whether content with extension `ext` must be loaded from a path rather
    /// than a buffer.
    pub fn needs_full_path(&self, ext: &str) -> bool {
        let state = self.state.borrow();
        if let Some(o) = state.content_overrides.iter().find(|o| o.matches(ext)) { return o.need_fullpath; }
        // playlists are resolved by the core itself
        if tables::extension_matches("m3u", ext) { return true; }
        state.system_info.as_ref().map_or(false, |info| info.need_fullpath)
    }

    pub fn persistent_data(&self, ext: &str) -> bool {
        let state = self.state.borrow();
        state.content_overrides.iter().find(|o| o.matches(ext)).map_or(false, |o| o.persistent_data)
    }

    /// Option values the loaded core may not use while achievements are active.
    pub fn disallowed_settings(&self) -> Option<&'static [DisallowedSetting]> {
        let state = self.state.borrow();
        restrictions::disallowed_settings(&state.system_info.as_ref()?.library_name)
    }
}

impl Drop for HostBridge {
    fn drop(&mut self) {
        if self.lifecycle() != Lifecycle::Unloaded { self.destroy(); }
    }
}

impl MemorySource for HostBridge {
    fn map_generation(&self) -> u64 {
        self.state.borrow().map_generation
    }

    fn memory_map(&self) -> Vec<MemoryDescriptor> {
        self.memory_descriptors()
    }

    fn memory_region(&self, id: c_uint) -> (*mut u8, usize) {
        self.call(|plugin| (plugin.memory_data(id).cast(), plugin.memory_size(id)))
    }

    fn serialize_size(&self) -> usize {
        HostBridge::serialize_size(self)
    }

    fn serialize_into(&self, buf: &mut [u8]) -> bool {
        self.serialize(buf)
    }
}
