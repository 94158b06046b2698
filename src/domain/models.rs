use serde::{Deserialize, Serialize};

/// Lifecycle of the single logical BLE link.
///
/// Exactly one peripheral may be associated at a time. Writes only succeed
/// while `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// A peripheral seen during a scan pass.
///
/// Keyed by address; a rescan replaces the whole set and duplicate addresses
/// overwrite in place (latest RSSI wins).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDevice {
    pub name: String,
    pub address: String,
    /// Signal strength in dBm.
    pub rssi: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// A human-readable status line for the diagnostic log.
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: MessageSeverity::Info,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: MessageSeverity::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: MessageSeverity::Error,
        }
    }
}

/// Sensor-fusion strategy, chosen once at engine start from the sensors the
/// host actually exposes and fixed for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FusionMode {
    /// Hardware orientation sensor (already fused).
    HardwareFusion,
    /// Gyro-integrated roll/pitch blended with accelerometer tilt.
    Complementary,
    /// Accelerometer tilt only, no yaw.
    #[default]
    None,
}

/// Latest orientation + raw-motion estimate.
///
/// Roll/pitch/yaw are degrees relative to the reference pose captured at
/// start or on explicit reset. Accelerometer values are m/s² including
/// gravity, gyro values rad/s.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuSample {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    /// Measured accelerometer rate, averaged over 50-sample windows.
    pub sample_rate_hz: f32,
    pub sample_count: u64,
    pub fusion_mode: FusionMode,
}

/// How control state is turned into packets each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    /// Six individually set axis values.
    #[default]
    Manual,
    /// Phone orientation mapped to pre-computed motion commands.
    OrientationMapped,
    /// Raw orientation + accelerometer streamed for on-platform cueing.
    RawMotion,
}

impl ControlMode {
    /// Mode-coupled side effect table: which modes need live sensors.
    pub fn needs_sensors(self) -> bool {
        match self {
            ControlMode::Manual => false,
            ControlMode::OrientationMapped | ControlMode::RawMotion => true,
        }
    }
}

/// Per-axis streaming configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub enabled: bool,
    /// Multiplier in [0.01, 2.0].
    pub scale: f32,
    pub invert: bool,
}

impl AxisConfig {
    pub fn new(enabled: bool, scale: f32) -> Self {
        Self {
            enabled,
            scale,
            invert: false,
        }
    }

    /// Signed scale factor with the invert flag applied.
    pub fn sign(&self) -> f32 {
        if self.invert {
            -1.0
        } else {
            1.0
        }
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scale: 0.3,
            invert: false,
        }
    }
}

pub const AXIS_COUNT: usize = 6;

/// Platform axis order used throughout: translation first, then rotation.
pub const AXIS_NAMES: [&str; AXIS_COUNT] = ["Surge", "Sway", "Heave", "Roll", "Pitch", "Yaw"];

pub const AXIS_SURGE: usize = 0;
pub const AXIS_SWAY: usize = 1;
pub const AXIS_HEAVE: usize = 2;
pub const AXIS_ROLL: usize = 3;
pub const AXIS_PITCH: usize = 4;
pub const AXIS_YAW: usize = 5;
