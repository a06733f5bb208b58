//! Host for dynamically loaded emulation cores.
//!
//! A [`HostBridge`] loads a core library, answers its environment requests
//! through a set of [`Components`], and drives it frame by frame. The
//! [`memory`] module turns whatever memory the core exposes into at most
//! sixteen flat banks for an external consumer.

pub mod bridge;
pub mod cli;
pub mod components;
pub mod error;
pub mod memory;
pub mod plugin;
pub mod restrictions;
pub mod settings;

pub use crate::bridge::{HostBridge, Lifecycle};
pub use crate::components::Components;
pub use crate::error::{HostError, Result};
pub use crate::plugin::{CoreApi, PluginHandle};
pub use crate::settings::{HostSettings, SettingsConfig};
