//! Owned copies of the tables a core hands over through the environment.
//!
//! Cores are free to release the memory behind a payload once the call
//! returns, so everything kept past the call is copied into plain Rust values
//! here. C arrays are terminated by a sentinel entry (a null key or
//! description) unless they carry an explicit count.

use std::ffi::{c_char, CStr};

use retro_core_abi::{
    RetroControllerInfo, RetroCoreOptionDefinition, RetroCoreOptionV2Category, RetroCoreOptionV2Definition,
    RetroCoreOptionValue, RetroCoreOptionsV2, RetroInputDescriptor, RetroMemoryMap, RetroSubsystemInfo,
    RetroSystemContentInfoOverride, RetroSystemInfo, RetroVariable, NUM_CORE_OPTION_VALUES_MAX,
};
use serde::Serialize;

use crate::error::{HostError, Result};
use crate::memory::MemoryDescriptor;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn owned(ptr: *const c_char) -> Option<String> {
    (!ptr.is_null()).then(|| CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// Entries of a sentinel-terminated array, sentinel excluded.
///
/// # Safety
/// `ptr` must be null or point to an array containing an entry for which
/// `is_end` holds.
unsafe fn terminated<'a, T>(ptr: *const T, is_end: impl Fn(&T) -> bool) -> &'a [T] {
    if ptr.is_null() { return &[]; }
    let mut count = 0;
    while !is_end(&*ptr.add(count)) {
        count += 1;
    }
    std::slice::from_raw_parts(ptr, count)
}

/// # Safety
/// `ptr` must be null or point to `count` entries.
unsafe fn counted<'a, T>(ptr: *const T, count: usize) -> &'a [T] {
    if ptr.is_null() || count == 0 { &[] } else { std::slice::from_raw_parts(ptr, count) }
}

/// Whether `ext` appears in a `|`-separated list, ignoring ASCII case.
pub fn extension_matches(list: &str, ext: &str) -> bool {
    list.split('|').any(|candidate| candidate.eq_ignore_ascii_case(ext))
}

// ── System info ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub library_name: String,
    pub library_version: String,
    pub valid_extensions: Option<String>,
    pub need_fullpath: bool,
    pub block_extract: bool,
}

impl SystemInfo {
    /// # Safety
    /// Every non-null string in `raw` must be NUL-terminated.
    pub unsafe fn from_raw(raw: &RetroSystemInfo) -> Result<Self> {
        Ok(Self {
            library_name: owned(raw.library_name).ok_or(HostError::SystemInfo("library name is missing"))?,
            library_version: owned(raw.library_version).ok_or(HostError::SystemInfo("library version is missing"))?,
            valid_extensions: owned(raw.valid_extensions),
            need_fullpath: raw.need_fullpath,
            block_extract: raw.block_extract,
        })
    }
}

// ── Input ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputDescriptor {
    pub port: u32,
    pub device: u32,
    pub index: u32,
    pub id: u32,
    pub description: String,
}

/// # Safety
/// `ptr` must point to a descriptor array ending with a null description.
pub unsafe fn input_descriptors(ptr: *const RetroInputDescriptor) -> Vec<InputDescriptor> {
    terminated(ptr, |d| d.description.is_null())
        .iter()
        .map(|d| InputDescriptor {
            port: d.port,
            device: d.device,
            index: d.index,
            id: d.id,
            description: owned(d.description).unwrap_or_default(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerType {
    pub id: u32,
    pub desc: String,
}

/// Device types one port accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControllerInfo {
    pub types: Vec<ControllerType>,
}

/// # Safety
/// `ptr` must point to a port array ending with a null `types` entry; each
/// `types` array holds `num_types` entries.
pub unsafe fn controller_info(ptr: *const RetroControllerInfo) -> Vec<ControllerInfo> {
    terminated(ptr, |p| p.types.is_null())
        .iter()
        .map(|port| ControllerInfo {
            // a null description ends the list early
            types: counted(port.types, port.num_types as usize)
                .iter()
                .map_while(|t| owned(t.desc).map(|desc| ControllerType { id: t.id, desc }))
                .collect(),
        })
        .collect()
}

// ── Subsystems ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubsystemMemory {
    pub extension: String,
    pub kind: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubsystemRom {
    pub desc: String,
    pub valid_extensions: String,
    pub need_fullpath: bool,
    pub block_extract: bool,
    pub required: bool,
    pub memory: Vec<SubsystemMemory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubsystemInfo {
    pub desc: String,
    pub ident: String,
    pub id: u32,
    pub roms: Vec<SubsystemRom>,
}

/// # Safety
/// `ptr` must point to a subsystem array ending with a null `desc`; nested
/// arrays hold their declared counts.
pub unsafe fn subsystem_info(ptr: *const RetroSubsystemInfo) -> Vec<SubsystemInfo> {
    terminated(ptr, |s| s.desc.is_null())
        .iter()
        .map(|s| SubsystemInfo {
            desc: owned(s.desc).unwrap_or_default(),
            ident: owned(s.ident).unwrap_or_default(),
            id: s.id,
            roms: counted(s.roms, s.num_roms as usize)
                .iter()
                .map(|rom| SubsystemRom {
                    desc: owned(rom.desc).unwrap_or_default(),
                    valid_extensions: owned(rom.valid_extensions).unwrap_or_default(),
                    need_fullpath: rom.need_fullpath,
                    block_extract: rom.block_extract,
                    required: rom.required,
                    memory: counted(rom.memory, rom.num_memory as usize)
                        .iter()
                        .map(|m| SubsystemMemory { extension: owned(m.extension).unwrap_or_default(), kind: m.kind })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

// ── Core options ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionValue {
    pub value: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreOption {
    pub key: String,
    pub desc: String,
    pub info: Option<String>,
    pub category: Option<String>,
    pub values: Vec<OptionValue>,
    /// Falls back to the first value when the core names none
    pub default_value: Option<String>,
    pub visible: bool,
}

impl CoreOption {
    pub fn accepts(&self, value: &str) -> bool {
        self.values.iter().any(|v| v.value == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionCategory {
    pub key: String,
    pub desc: String,
    pub info: Option<String>,
}

/// Parses a legacy `"Description; first|second|third"` variable.
pub fn parse_variable(key: &str, spec: &str) -> CoreOption {
    let (desc, list) = match spec.split_once(';') {
        Some((desc, list)) => (desc, list.trim_start()),
        None => (spec, ""),
    };
    let values: Vec<OptionValue> = list
        .split('|')
        .filter(|v| !v.is_empty())
        .map(|v| OptionValue { value: v.to_string(), label: None })
        .collect();
    CoreOption {
        key: key.to_string(),
        desc: desc.to_string(),
        info: None,
        category: None,
        default_value: values.first().map(|v| v.value.clone()),
        values,
        visible: true,
    }
}

/// # Safety
/// `ptr` must point to a variable array ending with a null key.
pub unsafe fn variables(ptr: *const RetroVariable) -> Vec<CoreOption> {
    terminated(ptr, |v| v.key.is_null())
        .iter()
        .map(|v| parse_variable(&owned(v.key).unwrap_or_default(), &owned(v.value).unwrap_or_default()))
        .collect()
}

unsafe fn option_values(values: &[RetroCoreOptionValue; NUM_CORE_OPTION_VALUES_MAX]) -> Vec<OptionValue> {
    values
        .iter()
        .map_while(|v| owned(v.value).map(|value| OptionValue { value, label: owned(v.label) }))
        .collect()
}

fn with_default(values: Vec<OptionValue>, default_value: Option<String>) -> (Vec<OptionValue>, Option<String>) {
    let default_value = default_value.or_else(|| values.first().map(|v| v.value.clone()));
    (values, default_value)
}

/// # Safety
/// `ptr` must point to a definition array ending with a null key.
pub unsafe fn options_v1(ptr: *const RetroCoreOptionDefinition) -> Vec<CoreOption> {
    terminated(ptr, |d| d.key.is_null())
        .iter()
        .map(|d| {
            let (values, default_value) = with_default(option_values(&d.values), owned(d.default_value));
            CoreOption {
                key: owned(d.key).unwrap_or_default(),
                desc: owned(d.desc).unwrap_or_default(),
                info: owned(d.info),
                category: None,
                values,
                default_value,
                visible: true,
            }
        })
        .collect()
}

/// # Safety
/// Both arrays in `raw` must be null or end with a null key.
pub unsafe fn options_v2(raw: &RetroCoreOptionsV2) -> (Vec<CoreOption>, Vec<OptionCategory>) {
    let categories = terminated(raw.categories, |c: &RetroCoreOptionV2Category| c.key.is_null())
        .iter()
        .map(|c| OptionCategory {
            key: owned(c.key).unwrap_or_default(),
            desc: owned(c.desc).unwrap_or_default(),
            info: owned(c.info),
        })
        .collect();
    let options = terminated(raw.definitions, |d: &RetroCoreOptionV2Definition| d.key.is_null())
        .iter()
        .map(|d| {
            let (values, default_value) = with_default(option_values(&d.values), owned(d.default_value));
            CoreOption {
                key: owned(d.key).unwrap_or_default(),
                desc: owned(d.desc).unwrap_or_default(),
                info: owned(d.info),
                category: owned(d.category_key),
                values,
                default_value,
                visible: true,
            }
        })
        .collect();
    (options, categories)
}

// ── Content override ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentOverride {
    pub extensions: String,
    pub need_fullpath: bool,
    pub persistent_data: bool,
}

impl ContentOverride {
    /// # Safety
    /// `raw.extensions` must be null or NUL-terminated.
    pub unsafe fn from_raw(raw: &RetroSystemContentInfoOverride) -> Self {
        Self {
            extensions: owned(raw.extensions).unwrap_or_default(),
            need_fullpath: raw.need_fullpath,
            persistent_data: raw.persistent_data,
        }
    }

    pub fn matches(&self, ext: &str) -> bool {
        extension_matches(&self.extensions, ext)
    }
}

/// # Safety
/// `ptr` must point to an override array ending with null `extensions`.
pub unsafe fn content_overrides(ptr: *const RetroSystemContentInfoOverride) -> Vec<ContentOverride> {
    terminated(ptr, |o| o.extensions.is_null()).iter().map(|o| ContentOverride::from_raw(o)).collect()
}

// ── Memory map ───────────────────────────────────────────────────────────────

/// # Safety
/// `raw.descriptors` must hold `raw.num_descriptors` entries.
pub unsafe fn memory_map(raw: &RetroMemoryMap) -> Vec<MemoryDescriptor> {
    counted(raw.descriptors, raw.num_descriptors as usize)
        .iter()
        .map(|d| MemoryDescriptor::from_raw(d))
        .collect()
}
