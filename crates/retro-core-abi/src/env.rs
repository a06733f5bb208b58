//! Environment command codes.
//!
//! Codes form a flat namespace. Bit 16 marks a command as experimental and is
//! ignored when matching; bit 17 marks it as private to one frontend.

use std::ffi::c_uint;
use std::fmt;

pub const EXPERIMENTAL: c_uint = 0x10000;
pub const PRIVATE: c_uint = 0x20000;

/// Start of the block of frontend-specific codes a few cores probe.
pub const FRONTEND_BASE: c_uint = 0x800000;

macro_rules! env_commands {
    ($($variant:ident = $code:expr,)*) => {
        /// Every environment command the host can name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum EnvCommand {
            $($variant = $code,)*
        }

        impl EnvCommand {
            /// Decodes a raw code, ignoring the experimental flag. Private and
            /// unassigned codes decode to `None`.
            pub fn from_raw(raw: c_uint) -> Option<Self> {
                match raw & !EXPERIMENTAL {
                    $(c if c == $code => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn code(self) -> c_uint {
                self as c_uint
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

env_commands! {
    SetRotation = 1,
    GetOverscan = 2,
    GetCanDupe = 3,
    SetMessage = 6,
    Shutdown = 7,
    SetPerformanceLevel = 8,
    GetSystemDirectory = 9,
    SetPixelFormat = 10,
    SetInputDescriptors = 11,
    SetKeyboardCallback = 12,
    SetDiskControlInterface = 13,
    SetHwRender = 14,
    GetVariable = 15,
    SetVariables = 16,
    GetVariableUpdate = 17,
    SetSupportNoGame = 18,
    GetLibretroPath = 19,
    SetFrameTimeCallback = 21,
    SetAudioCallback = 22,
    GetRumbleInterface = 23,
    GetInputDeviceCapabilities = 24,
    GetSensorInterface = 25,
    GetCameraInterface = 26,
    GetLogInterface = 27,
    GetPerfInterface = 28,
    GetLocationInterface = 29,
    GetCoreAssetsDirectory = 30,
    GetSaveDirectory = 31,
    SetSystemAvInfo = 32,
    SetProcAddressCallback = 33,
    SetSubsystemInfo = 34,
    SetControllerInfo = 35,
    SetMemoryMaps = 36,
    SetGeometry = 37,
    GetUsername = 38,
    GetLanguage = 39,
    GetCurrentSoftwareFramebuffer = 40,
    GetHwRenderInterface = 41,
    SetSupportAchievements = 42,
    SetHwRenderContextNegotiationInterface = 43,
    SetSerializationQuirks = 44,
    GetVfsInterface = 45,
    GetLedInterface = 46,
    GetAudioVideoEnable = 47,
    GetMidiInterface = 48,
    GetFastForwarding = 49,
    GetTargetRefreshRate = 50,
    GetInputBitmasks = 51,
    GetCoreOptionsVersion = 52,
    SetCoreOptions = 53,
    SetCoreOptionsIntl = 54,
    SetCoreOptionsDisplay = 55,
    GetPreferredHwRender = 56,
    GetDiskControlInterfaceVersion = 57,
    SetDiskControlExtInterface = 58,
    GetMessageInterfaceVersion = 59,
    SetMessageExt = 60,
    GetInputMaxUsers = 61,
    SetAudioBufferStatusCallback = 62,
    SetMinimumAudioLatency = 63,
    SetFastForwardingOverride = 64,
    SetContentInfoOverride = 65,
    GetGameInfoExt = 66,
    SetCoreOptionsV2 = 67,
    SetCoreOptionsV2Intl = 68,
    SetCoreOptionsUpdateDisplayCallback = 69,
    SetVariable = 70,
    SetSaveStateInBackground = FRONTEND_BASE + 2,
    GetClearAllThreadWaitsCb = FRONTEND_BASE + 3,
    PollTypeOverride = FRONTEND_BASE + 4,
}

impl fmt::Display for EnvCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Human-readable label for a raw code, for log lines.
pub fn describe(raw: c_uint) -> String {
    match EnvCommand::from_raw(raw) {
        Some(cmd) => cmd.to_string(),
        None => format!("{}", raw & !EXPERIMENTAL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experimental_bit_is_ignored() {
        assert_eq!(EnvCommand::from_raw(36 | EXPERIMENTAL), Some(EnvCommand::SetMemoryMaps));
        assert_eq!(EnvCommand::from_raw(36), Some(EnvCommand::SetMemoryMaps));
    }

    #[test]
    fn private_and_unassigned_codes_are_unknown() {
        assert_eq!(EnvCommand::from_raw(4), None);
        assert_eq!(EnvCommand::from_raw(20), None);
        assert_eq!(EnvCommand::from_raw(PRIVATE | 1), None);
        assert_eq!(EnvCommand::from_raw(9999), None);
    }

    #[test]
    fn frontend_block_decodes() {
        assert_eq!(EnvCommand::from_raw(0x800003), Some(EnvCommand::GetClearAllThreadWaitsCb));
        assert_eq!(EnvCommand::PollTypeOverride.code(), 0x800004);
    }

    #[test]
    fn describe_labels_codes() {
        assert_eq!(describe(10), "SetPixelFormat (10)");
        assert_eq!(describe(EXPERIMENTAL | 4242), "4242");
    }
}
