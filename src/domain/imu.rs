//! Sensor fusion for the orientation engine.
//!
//! Turns raw accelerometer/gyroscope/orientation events into roll/pitch/yaw
//! relative to a reference pose. Three strategies, picked once per session:
//! hardware fusion when the host has an orientation sensor, a complementary
//! filter when only a gyroscope is present, and plain accelerometer tilt
//! otherwise.

use crate::domain::models::{FusionMode, ImuSample};

const RAD_TO_DEG: f32 = 57.295_78;

/// Low-pass coefficient for accelerometer smoothing (weight on the old value).
const ACCEL_ALPHA: f32 = 0.8;

/// Complementary blend: weight toward the gyro-integrated angle.
const GYRO_WEIGHT: f32 = 0.98;

/// Per-update washout applied to integrated yaw.
const YAW_DECAY: f32 = 0.998;

/// Gyro deltas outside this window are sensor gaps, not integration steps.
const MIN_GYRO_DT_S: f32 = 0.001;
const MAX_GYRO_DT_S: f32 = 0.1;

/// Measures the accelerometer sample rate over fixed windows.
#[derive(Debug, Default)]
pub struct SampleRateMeter {
    last_ts_ns: Option<u64>,
    window_sum_s: f64,
    window_count: u32,
    rate_hz: f32,
}

impl SampleRateMeter {
    /// Inter-arrival deltas accepted as valid, in seconds.
    const MIN_DELTA_S: f64 = 0.0005;
    const MAX_DELTA_S: f64 = 1.0;
    /// Valid deltas per averaging window.
    const WINDOW: u32 = 50;

    pub fn on_sample(&mut self, ts_ns: u64) -> f32 {
        if let Some(last) = self.last_ts_ns {
            let delta_s = ts_ns.saturating_sub(last) as f64 * 1e-9;
            if (Self::MIN_DELTA_S..=Self::MAX_DELTA_S).contains(&delta_s) {
                self.window_sum_s += delta_s;
                self.window_count += 1;
                if self.window_count >= Self::WINDOW {
                    self.rate_hz = (f64::from(self.window_count) / self.window_sum_s) as f32;
                    self.window_sum_s = 0.0;
                    self.window_count = 0;
                }
            }
        }
        self.last_ts_ns = Some(ts_ns);
        self.rate_hz
    }

    pub fn rate_hz(&self) -> f32 {
        self.rate_hz
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Owned filter state carried across sensor callbacks.
///
/// One instance per engine session; every `on_*` call returns the updated
/// sample so callers can publish it immediately.
#[derive(Debug)]
pub struct FusionFilter {
    mode: FusionMode,

    // Low-passed accelerometer and latest gyro, device frame.
    accel: [f32; 3],
    gyro: [f32; 3],

    // Roll/pitch estimate in raw (pre-reference) space, degrees.
    est_roll: f32,
    est_pitch: f32,
    yaw: f32,
    last_gyro_ts_ns: Option<u64>,

    ref_roll: f32,
    ref_pitch: f32,
    ref_yaw: f32,
    has_reference: bool,

    sample_count: u64,
    rate: SampleRateMeter,
    latest: ImuSample,
}

impl FusionFilter {
    pub fn new(mode: FusionMode) -> Self {
        Self {
            mode,
            accel: [0.0; 3],
            gyro: [0.0; 3],
            est_roll: 0.0,
            est_pitch: 0.0,
            yaw: 0.0,
            last_gyro_ts_ns: None,
            ref_roll: 0.0,
            ref_pitch: 0.0,
            ref_yaw: 0.0,
            has_reference: false,
            sample_count: 0,
            rate: SampleRateMeter::default(),
            latest: ImuSample {
                fusion_mode: mode,
                ..ImuSample::default()
            },
        }
    }

    pub fn mode(&self) -> FusionMode {
        self.mode
    }

    /// Clears all filter state; the next sample re-captures the reference.
    pub fn reset(&mut self) {
        *self = Self::new(self.mode);
    }

    /// Re-zeroes the emitted angles without touching smoothing state or
    /// subscriptions.
    pub fn reset_reference(&mut self) {
        self.has_reference = false;
        self.yaw = 0.0;
    }

    pub fn sample(&self) -> ImuSample {
        self.latest
    }

    /// Accelerometer event, m/s² including gravity.
    pub fn on_accel(&mut self, x: f32, y: f32, z: f32, ts_ns: u64) -> ImuSample {
        // Low-pass to smooth out vibration before deriving tilt.
        self.accel[0] = ACCEL_ALPHA * self.accel[0] + (1.0 - ACCEL_ALPHA) * x;
        self.accel[1] = ACCEL_ALPHA * self.accel[1] + (1.0 - ACCEL_ALPHA) * y;
        self.accel[2] = ACCEL_ALPHA * self.accel[2] + (1.0 - ACCEL_ALPHA) * z;
        self.rate.on_sample(ts_ns);

        if self.mode != FusionMode::HardwareFusion {
            let (tilt_roll, tilt_pitch) = tilt_from_gravity(self.accel);

            if !self.has_reference {
                self.ref_roll = tilt_roll;
                self.ref_pitch = tilt_pitch;
                self.est_roll = tilt_roll;
                self.est_pitch = tilt_pitch;
                self.has_reference = true;
            }

            // Tilt is the whole estimate when there is no gyro. The
            // complementary path corrects on gyro events instead; here the
            // accel event only refreshes the tilt input and raw fields.
            if self.mode == FusionMode::None {
                self.est_roll = tilt_roll;
                self.est_pitch = tilt_pitch;
            }
        }

        self.emit()
    }

    /// Gyroscope event, rad/s.
    pub fn on_gyro(&mut self, x: f32, y: f32, z: f32, ts_ns: u64) -> ImuSample {
        self.gyro = [x, y, z];

        if self.mode == FusionMode::Complementary {
            if let Some(last) = self.last_gyro_ts_ns {
                let dt = ts_ns.saturating_sub(last) as f32 * 1e-9;
                if (MIN_GYRO_DT_S..=MAX_GYRO_DT_S).contains(&dt) {
                    // Blend gyro integration against accelerometer tilt.
                    let (tilt_roll, tilt_pitch) = tilt_from_gravity(self.accel);
                    let gyro_roll = self.est_roll + y * dt * RAD_TO_DEG;
                    let gyro_pitch = self.est_pitch - x * dt * RAD_TO_DEG;
                    self.est_roll = GYRO_WEIGHT * gyro_roll + (1.0 - GYRO_WEIGHT) * tilt_roll;
                    self.est_pitch = GYRO_WEIGHT * gyro_pitch + (1.0 - GYRO_WEIGHT) * tilt_pitch;

                    // Yaw is pure integration with a slow washout; the
                    // accelerometer cannot observe it.
                    self.yaw = (self.yaw + z * dt * RAD_TO_DEG) * YAW_DECAY;
                }
            }
            self.last_gyro_ts_ns = Some(ts_ns);
        }

        self.emit()
    }

    /// Hardware-fused orientation event, degrees.
    pub fn on_orientation(&mut self, roll: f32, pitch: f32, yaw: f32) -> ImuSample {
        if self.mode != FusionMode::HardwareFusion {
            return self.latest;
        }

        if !self.has_reference {
            self.ref_roll = roll;
            self.ref_pitch = pitch;
            self.ref_yaw = yaw;
            self.has_reference = true;
        }

        self.est_roll = roll;
        self.est_pitch = pitch;
        self.yaw = wrap_degrees(yaw - self.ref_yaw);

        self.emit()
    }

    fn emit(&mut self) -> ImuSample {
        self.sample_count += 1;

        let yaw = match self.mode {
            FusionMode::HardwareFusion | FusionMode::Complementary => self.yaw,
            FusionMode::None => 0.0,
        };
        // Until the reference is (re)captured the estimate may still hold
        // pre-reset state; report level instead of stale angles.
        let (roll, pitch) = if self.has_reference {
            (
                self.est_roll - self.ref_roll,
                self.est_pitch - self.ref_pitch,
            )
        } else {
            (0.0, 0.0)
        };

        self.latest = ImuSample {
            roll,
            pitch,
            yaw,
            accel_x: self.accel[0],
            accel_y: self.accel[1],
            accel_z: self.accel[2],
            gyro_x: self.gyro[0],
            gyro_y: self.gyro[1],
            gyro_z: self.gyro[2],
            sample_rate_hz: self.rate.rate_hz(),
            sample_count: self.sample_count,
            fusion_mode: self.mode,
        };
        self.latest
    }
}

/// Tilt angles in degrees from the (filtered) gravity vector.
///
/// Device frame: X right, Y up the screen, Z out of the screen.
fn tilt_from_gravity(accel: [f32; 3]) -> (f32, f32) {
    let [ax, ay, az] = accel;
    let roll = ax.atan2((ay * ay + az * az).sqrt()) * RAD_TO_DEG;
    let pitch = -ay.atan2((ax * ax + az * az).sqrt()) * RAD_TO_DEG;
    (roll, pitch)
}

/// Wraps an angle into (-180, 180] with at most one correction step.
fn wrap_degrees(deg: f32) -> f32 {
    if deg > 180.0 {
        deg - 360.0
    } else if deg <= -180.0 {
        deg + 360.0
    } else {
        deg
    }
}
