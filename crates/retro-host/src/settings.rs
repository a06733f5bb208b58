//! Host settings and the option store built on them.

use std::collections::BTreeMap;
use std::ffi::c_uint;
use std::fs;
use std::path::{Path, PathBuf};

use retro_core_abi::LANGUAGE_ENGLISH;
use serde::{Deserialize, Serialize};

use crate::bridge::tables::{CoreOption, OptionCategory};
use crate::components::{Config, LogLevel};
use crate::error::Result;

/// Everything a frontend tells the host up front. Missing fields take their
/// defaults, so an empty JSON object is a valid settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    pub system_dir: PathBuf,
    pub save_dir: PathBuf,
    pub core_assets_dir: PathBuf,
    /// Option values chosen by the user, keyed by option key
    pub options: BTreeMap<String, String>,
    pub fast_forward: bool,
    pub username: Option<String>,
    pub language: c_uint,
    pub log_level: LogLevel,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            system_dir: PathBuf::from("system"),
            save_dir: PathBuf::from("saves"),
            core_assets_dir: PathBuf::from("assets"),
            options: BTreeMap::new(),
            fast_forward: false,
            username: None,
            language: LANGUAGE_ENGLISH,
            log_level: LogLevel::Info,
        }
    }
}

impl HostSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// The `Config` collaborator over `HostSettings`: keeps the options the core
/// declared and answers lookups from the user's choices when they are valid.
#[derive(Debug, Clone)]
pub struct SettingsConfig {
    settings: HostSettings,
    declared: Vec<CoreOption>,
    categories: Vec<OptionCategory>,
    updated: bool,
}

impl SettingsConfig {
    pub fn new(settings: HostSettings) -> Self {
        Self { settings, declared: Vec::new(), categories: Vec::new(), updated: false }
    }

    pub fn declared(&self) -> &[CoreOption] {
        &self.declared
    }

    pub fn categories(&self) -> &[OptionCategory] {
        &self.categories
    }

    /// Frontend-side change; the core sees it on its next update poll.
    pub fn set_option(&mut self, key: &str, value: &str) -> bool {
        let Some(option) = self.declared.iter().find(|o| o.key == key) else { return false };
        if !option.accepts(value) { return false; }
        self.settings.options.insert(key.to_string(), value.to_string());
        self.updated = true;
        true
    }
}

impl Config for SettingsConfig {
    fn system_directory(&self) -> PathBuf {
        self.settings.system_dir.clone()
    }

    fn save_directory(&self) -> PathBuf {
        self.settings.save_dir.clone()
    }

    fn core_assets_directory(&self) -> PathBuf {
        self.settings.core_assets_dir.clone()
    }

    fn set_variables(&mut self, options: &[CoreOption], categories: &[OptionCategory]) {
        for option in options {
            if let Some(chosen) = self.settings.options.get(&option.key) {
                if !option.accepts(chosen) {
                    tracing::warn!(key = %option.key, value = %chosen, "ignoring option value the core does not offer");
                }
            }
        }
        self.declared = options.to_vec();
        self.categories = categories.to_vec();
        self.updated = false;
    }

    fn set_variable_display(&mut self, key: &str, visible: bool) {
        if let Some(option) = self.declared.iter_mut().find(|o| o.key == key) { option.visible = visible; }
    }

    fn variables_updated(&mut self) -> bool {
        std::mem::take(&mut self.updated)
    }

    fn variable(&self, key: &str) -> Option<String> {
        let option = self.declared.iter().find(|o| o.key == key)?;
        match self.settings.options.get(key) {
            Some(chosen) if option.accepts(chosen) => Some(chosen.clone()),
            _ => option.default_value.clone().or_else(|| option.values.first().map(|v| v.value.clone())),
        }
    }

    fn set_variable(&mut self, key: &str, value: &str) -> bool {
        self.set_option(key, value)
    }

    fn fast_forwarding(&self) -> bool {
        self.settings.fast_forward
    }

    fn username(&self) -> Option<String> {
        self.settings.username.clone()
    }

    fn language(&self) -> c_uint {
        self.settings.language
    }
}
