//! Plugin loader: binds the 25 `retro_*` entry points of one core.
//!
//! A `PluginHandle` is either unloaded or fully bound. Every method on an
//! unloaded handle is a no-op returning a neutral value, so callers never need
//! to check `is_loaded()` before tearing down.
//!
//! Cores are trusted in-process code; the safe wrappers assume the core honours
//! the signatures it exports.

use std::ffi::{c_uint, c_void, CStr};
use std::path::Path;

use libloading::Library;
use retro_core_abi::*;

use crate::error::{HostError, Result};

/// Resolved entry points of one core.
#[derive(Clone, Copy)]
pub struct CoreApi {
    pub init: RetroInitFn,
    pub deinit: RetroDeinitFn,
    pub api_version: RetroApiVersionFn,
    pub get_system_info: RetroGetSystemInfoFn,
    pub get_system_av_info: RetroGetSystemAvInfoFn,
    pub set_environment: RetroSetEnvironmentFn,
    pub set_video_refresh: RetroSetVideoRefreshFn,
    pub set_audio_sample: RetroSetAudioSampleFn,
    pub set_audio_sample_batch: RetroSetAudioSampleBatchFn,
    pub set_input_poll: RetroSetInputPollFn,
    pub set_input_state: RetroSetInputStateFn,
    pub set_controller_port_device: RetroSetControllerPortDeviceFn,
    pub reset: RetroResetFn,
    pub run: RetroRunFn,
    pub serialize_size: RetroSerializeSizeFn,
    pub serialize: RetroSerializeFn,
    pub unserialize: RetroUnserializeFn,
    pub cheat_reset: RetroCheatResetFn,
    pub cheat_set: RetroCheatSetFn,
    pub load_game: RetroLoadGameFn,
    pub load_game_special: RetroLoadGameSpecialFn,
    pub unload_game: RetroUnloadGameFn,
    pub get_region: RetroGetRegionFn,
    pub get_memory_data: RetroGetMemoryDataFn,
    pub get_memory_size: RetroGetMemorySizeFn,
}

// Field order matches `ENTRY_POINTS`.
macro_rules! resolve_entry_points {
    ($lib:expr; $($field:ident),* $(,)?) => {
        CoreApi {
            $($field: symbol($lib, concat!("retro_", stringify!($field), "\0").as_bytes())?,)*
        }
    };
}

unsafe fn symbol<T: Copy>(lib: &Library, name: &[u8]) -> std::result::Result<T, libloading::Error> {
    Ok(*lib.get::<T>(name)?)
}

/// # Safety
/// The library must export its `retro_*` symbols with the ABI signatures.
unsafe fn resolve(lib: &Library) -> std::result::Result<CoreApi, libloading::Error> {
    Ok(resolve_entry_points!(lib;
        init, deinit, api_version, get_system_info, get_system_av_info,
        set_environment, set_video_refresh, set_audio_sample, set_audio_sample_batch,
        set_input_poll, set_input_state, set_controller_port_device,
        reset, run, serialize_size, serialize, unserialize, cheat_reset, cheat_set,
        load_game, load_game_special, unload_game, get_region, get_memory_data, get_memory_size,
    ))
}

/// Entry points `lib` does not export, in resolution order.
fn missing_entry_points(lib: &Library) -> Vec<&'static str> {
    ENTRY_POINTS
        .iter()
        .copied()
        .filter(|name| unsafe { lib.get::<*const c_void>(name.as_bytes()) }.is_err())
        .collect()
}

#[derive(Default)]
pub struct PluginHandle {
    api: Option<CoreApi>,
    // Dropped after `api`; closing the library invalidates every pointer in it.
    library: Option<Library>,
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("loaded", &self.api.is_some())
            .field("dynamic", &self.library.is_some())
            .finish()
    }
}

impl PluginHandle {
    /// Attaches a core linked into the host binary.
    pub fn from_api(api: CoreApi) -> Self {
        Self { api: Some(api), library: None }
    }

    /// Opens `path` and binds every entry point. On failure the library is
    /// closed again and the handle is left unloaded.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.destroy();
        let shown = path.display().to_string();

        let library = unsafe { Library::new(path) }
            .map_err(|e| HostError::LibraryOpen { path: shown.clone(), reason: e.to_string() })?;
        let missing = missing_entry_points(&library);
        if !missing.is_empty() {
            return Err(HostError::SymbolMissing { path: shown, reason: format!("missing {}", missing.join(", ")) });
        }
        let api = unsafe { resolve(&library) }
            .map_err(|e| HostError::SymbolMissing { path: shown.clone(), reason: e.to_string() })?;

        tracing::debug!(path = %shown, "core library bound");
        self.api = Some(api);
        self.library = Some(library);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.api.is_some()
    }

    /// Forgets every entry point and closes the library. Safe to repeat.
    pub fn destroy(&mut self) {
        self.api = None;
        if self.library.take().is_some() {
            tracing::debug!("core library closed");
        }
    }

    // ── Entry points ─────────────────────────────────────────────────────────

    pub fn init(&self) {
        if let Some(api) = &self.api { unsafe { (api.init)() } }
    }

    pub fn deinit(&self) {
        if let Some(api) = &self.api { unsafe { (api.deinit)() } }
    }

    pub fn api_version(&self) -> c_uint {
        self.api.as_ref().map_or(0, |api| unsafe { (api.api_version)() })
    }

    pub fn system_info(&self) -> RetroSystemInfo {
        let mut info = RetroSystemInfo::default();
        if let Some(api) = &self.api { unsafe { (api.get_system_info)(&mut info) } }
        info
    }

    pub fn system_av_info(&self) -> RetroSystemAvInfo {
        let mut info = RetroSystemAvInfo::default();
        if let Some(api) = &self.api { unsafe { (api.get_system_av_info)(&mut info) } }
        info
    }

    pub fn set_environment(&self, cb: RetroEnvironmentFn) {
        if let Some(api) = &self.api { unsafe { (api.set_environment)(cb) } }
    }

    pub fn set_video_refresh(&self, cb: RetroVideoRefreshFn) {
        if let Some(api) = &self.api { unsafe { (api.set_video_refresh)(cb) } }
    }

    pub fn set_audio_sample(&self, cb: RetroAudioSampleFn) {
        if let Some(api) = &self.api { unsafe { (api.set_audio_sample)(cb) } }
    }

    pub fn set_audio_sample_batch(&self, cb: RetroAudioSampleBatchFn) {
        if let Some(api) = &self.api { unsafe { (api.set_audio_sample_batch)(cb) } }
    }

    pub fn set_input_poll(&self, cb: RetroInputPollFn) {
        if let Some(api) = &self.api { unsafe { (api.set_input_poll)(cb) } }
    }

    pub fn set_input_state(&self, cb: RetroInputStateFn) {
        if let Some(api) = &self.api { unsafe { (api.set_input_state)(cb) } }
    }

    pub fn set_controller_port_device(&self, port: c_uint, device: c_uint) {
        if let Some(api) = &self.api { unsafe { (api.set_controller_port_device)(port, device) } }
    }

    pub fn reset(&self) {
        if let Some(api) = &self.api { unsafe { (api.reset)() } }
    }

    pub fn run(&self) {
        if let Some(api) = &self.api { unsafe { (api.run)() } }
    }

    pub fn serialize_size(&self) -> usize {
        self.api.as_ref().map_or(0, |api| unsafe { (api.serialize_size)() })
    }

    pub fn serialize(&self, buf: &mut [u8]) -> bool {
        self.api.as_ref().map_or(false, |api| unsafe {
            (api.serialize)(buf.as_mut_ptr().cast(), buf.len())
        })
    }

    pub fn unserialize(&self, data: &[u8]) -> bool {
        self.api.as_ref().map_or(false, |api| unsafe {
            (api.unserialize)(data.as_ptr().cast(), data.len())
        })
    }

    pub fn cheat_reset(&self) {
        if let Some(api) = &self.api { unsafe { (api.cheat_reset)() } }
    }

    pub fn cheat_set(&self, index: c_uint, enabled: bool, code: &CStr) {
        if let Some(api) = &self.api { unsafe { (api.cheat_set)(index, enabled, code.as_ptr()) } }
    }

    /// # Safety
    /// Every pointer inside `game` must stay valid for the duration of the call.
    pub unsafe fn load_game(&self, game: &RetroGameInfo) -> bool {
        self.api.as_ref().map_or(false, |api| (api.load_game)(game))
    }

    /// # Safety
    /// Every pointer inside `info` must stay valid for the duration of the call.
    pub unsafe fn load_game_special(&self, game_type: c_uint, info: &[RetroGameInfo]) -> bool {
        self.api.as_ref().map_or(false, |api| (api.load_game_special)(game_type, info.as_ptr(), info.len()))
    }

    pub fn unload_game(&self) {
        if let Some(api) = &self.api { unsafe { (api.unload_game)() } }
    }

    pub fn region(&self) -> c_uint {
        self.api.as_ref().map_or(REGION_NTSC, |api| unsafe { (api.get_region)() })
    }

    pub fn memory_data(&self, id: c_uint) -> *mut c_void {
        self.api.as_ref().map_or(std::ptr::null_mut(), |api| unsafe { (api.get_memory_data)(id) })
    }

    pub fn memory_size(&self, id: c_uint) -> usize {
        self.api.as_ref().map_or(0, |api| unsafe { (api.get_memory_size)(id) })
    }
}
