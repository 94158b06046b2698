//! Axis math: percent-to-channel encoding and the per-mode transforms that
//! turn control state into the six values a tick transmits.

use crate::domain::models::{
    AxisConfig, ImuSample, AXIS_COUNT, AXIS_HEAVE, AXIS_PITCH, AXIS_ROLL, AXIS_SURGE, AXIS_SWAY,
    AXIS_YAW,
};

/// Channel value for the platform's neutral position.
pub const CHANNEL_CENTER: u16 = 2047;
/// Inclusive channel maximum (12-bit range).
pub const CHANNEL_MAX: u16 = 4095;

/// Standard gravity subtracted from the heave axis, m/s².
pub const STANDARD_GRAVITY: f32 = 9.81;

/// Maps a percent in [-100, 100] onto the 12-bit channel range.
///
/// -100% -> 0, 0% -> 2047, +100% -> 4095.
pub fn encode_channel(pct: f32) -> u16 {
    let clamped = pct.clamp(-100.0, 100.0);
    let raw = (clamped / 100.0 * f32::from(CHANNEL_CENTER) + f32::from(CHANNEL_CENTER)).round();
    (raw as i32).clamp(0, i32::from(CHANNEL_MAX)) as u16
}

/// Encodes six axis percents into channel values.
pub fn encode_channels(pct: &[f32; AXIS_COUNT]) -> [u16; AXIS_COUNT] {
    pct.map(encode_channel)
}

/// Orientation-mapped axis percents: roll/pitch/yaw scaled against the max
/// angle, translation axes forced to zero.
pub fn orientation_axes_pct(
    imu: &ImuSample,
    sensitivity: f32,
    max_angle_deg: f32,
) -> [f32; AXIS_COUNT] {
    let map = |angle: f32| (angle * sensitivity / max_angle_deg * 100.0).clamp(-100.0, 100.0);

    let mut pct = [0.0; AXIS_COUNT];
    pct[AXIS_ROLL] = map(imu.roll);
    pct[AXIS_PITCH] = map(imu.pitch);
    pct[AXIS_YAW] = map(imu.yaw);
    pct
}

/// Raw-motion values in axis order [surge, sway, heave, roll, pitch, yaw].
///
/// Rotation axes carry orientation degrees scaled and clamped to the max
/// angle; translation axes carry raw accelerometer m/s² (heave with standard
/// gravity removed), scaled but unclamped. Disabled axes emit zero.
pub fn raw_motion_values(
    imu: &ImuSample,
    axes: &[AxisConfig; AXIS_COUNT],
    max_angle_deg: f32,
) -> [f32; AXIS_COUNT] {
    let translation = |i: usize, value: f32| {
        if axes[i].enabled {
            value * axes[i].scale * axes[i].sign()
        } else {
            0.0
        }
    };
    let rotation = |i: usize, angle: f32| {
        if axes[i].enabled {
            (angle * axes[i].scale * axes[i].sign()).clamp(-max_angle_deg, max_angle_deg)
        } else {
            0.0
        }
    };

    let mut values = [0.0; AXIS_COUNT];
    values[AXIS_SURGE] = translation(AXIS_SURGE, imu.accel_x);
    values[AXIS_SWAY] = translation(AXIS_SWAY, imu.accel_y);
    values[AXIS_HEAVE] = translation(AXIS_HEAVE, imu.accel_z - STANDARD_GRAVITY);
    values[AXIS_ROLL] = rotation(AXIS_ROLL, imu.roll);
    values[AXIS_PITCH] = rotation(AXIS_PITCH, imu.pitch);
    values[AXIS_YAW] = rotation(AXIS_YAW, imu.yaw);
    values
}
