use std::ffi::NulError;
use std::io;

use thiserror::Error;

use crate::bridge::Lifecycle;

pub type Result<T> = std::result::Result<T, HostError>;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("could not open core library {path}: {reason}")]
    LibraryOpen { path: String, reason: String },

    #[error("core library {path} is missing a required entry point: {reason}")]
    SymbolMissing { path: String, reason: String },

    #[error("operation requires the {expected:?} state, bridge is {found:?}")]
    InvalidState { expected: Lifecycle, found: Lifecycle },

    #[error("core reported unusable system info: {0}")]
    SystemInfo(&'static str),

    #[error("core rejected content {path}: {details}")]
    ContentRejected { path: String, details: String },

    #[error("core rejected the save state: {details}")]
    StateRejected { details: String },

    #[error("audio/video negotiation failed: {0}")]
    Negotiation(String),

    #[error("string contains an interior NUL byte: {0}")]
    InteriorNul(#[from] NulError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("settings are not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Joins captured core messages for an error payload.
pub(crate) fn join_details(lines: Vec<String>) -> String {
    if lines.is_empty() { "no details reported".to_string() } else { lines.join("\n") }
}
