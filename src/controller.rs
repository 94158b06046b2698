//! Streaming coordinator: owns control mode and axis configuration, and
//! runs the periodic task that turns control state into packets whenever
//! the link is connected.

use crate::domain::axes::{self, encode_channels};
use crate::domain::models::{
    AxisConfig, ControlMode, LinkState, AXIS_COUNT, AXIS_HEAVE, AXIS_PITCH, AXIS_ROLL, AXIS_SURGE,
    AXIS_SWAY, AXIS_YAW,
};
use crate::domain::settings::Settings;
use crate::infrastructure::sensors::ImuEngine;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Write primitives the periodic task needs from the link layer.
///
/// Every operation is fire-and-forget: `false` means "this tick did not
/// count", never a fatal condition.
pub trait MotionLink: Send + Sync + 'static {
    fn write_motion_packet(
        &self,
        channels: [u16; AXIS_COUNT],
    ) -> impl Future<Output = bool> + Send;

    fn write_raw_motion(&self, values: [f32; AXIS_COUNT]) -> impl Future<Output = bool> + Send;

    fn write_command(&self, command: &str) -> impl Future<Output = bool> + Send;
}

/// Mutable control state read by every tick.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub mode: ControlMode,
    /// Manual axis values, percent in [-100, 100].
    pub manual_pct: [f32; AXIS_COUNT],
    pub axes: [AxisConfig; AXIS_COUNT],
    /// Multiplier on orientation angles, [0.1, 5.0].
    pub sensitivity: f32,
    /// Clamp for orientation axes in degrees, [1.0, 6.0].
    pub max_angle_deg: f32,
    /// Packet rate, [1, 200] Hz.
    pub send_rate_hz: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            mode: ControlMode::Manual,
            manual_pct: [0.0; AXIS_COUNT],
            axes: settings.axes,
            sensitivity: 1.0,
            max_angle_deg: settings.imu_max_angle,
            send_rate_hz: settings.send_rate_hz,
        }
    }
}

pub const SEND_RATE_RANGE: std::ops::RangeInclusive<u32> = 1..=200;
pub const SENSITIVITY_RANGE: std::ops::RangeInclusive<f32> = 0.1..=5.0;
pub const MAX_ANGLE_RANGE: std::ops::RangeInclusive<f32> = 1.0..=6.0;
pub const AXIS_SCALE_RANGE: std::ops::RangeInclusive<f32> = 0.01..=2.0;

/// Read-only streaming snapshot for the presentation layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamingState {
    pub streaming: bool,
    pub packets_sent: u64,
    /// Last transmitted raw-motion values, axis order [surge..yaw].
    pub live_sent_values: [f32; AXIS_COUNT],
}

/// Coordinates control state, the orientation engine and the periodic
/// transmission task.
pub struct PlatformController<L: MotionLink> {
    link: Arc<L>,
    imu: Arc<ImuEngine>,
    config: Mutex<ControlConfig>,
    packets_sent: AtomicU64,
    live_values: Mutex<[f32; AXIS_COUNT]>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl<L: MotionLink> PlatformController<L> {
    pub fn new(link: Arc<L>, imu: Arc<ImuEngine>) -> Arc<Self> {
        Arc::new(Self {
            link,
            imu,
            config: Mutex::new(ControlConfig::default()),
            packets_sent: AtomicU64::new(0),
            live_values: Mutex::new([0.0; AXIS_COUNT]),
            tick_task: Mutex::new(None),
        })
    }

    /// Follows link state: the periodic task runs exactly while Connected.
    /// Returns the supervisor handle; dropping the state sender ends it.
    pub fn run(self: &Arc<Self>, mut link_state: watch::Receiver<LinkState>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let connected = *link_state.borrow_and_update() == LinkState::Connected;
                if connected {
                    controller.start_streaming();
                } else {
                    controller.stop_streaming();
                }
                if link_state.changed().await.is_err() {
                    break;
                }
            }
            controller.stop_streaming();
        })
    }

    // ── Configuration ────────────────────────────────────────────────

    pub fn config(&self) -> ControlConfig {
        self.config.lock().unwrap().clone()
    }

    /// Switches control mode and applies the mode's sensor requirement.
    /// The periodic task itself is untouched.
    pub fn set_control_mode(&self, mode: ControlMode) {
        if mode.needs_sensors() {
            if let Err(e) = self.imu.start() {
                debug!("sensor start failed: {e}");
            }
        } else {
            self.imu.stop();
        }
        self.config.lock().unwrap().mode = mode;
        info!(?mode, "control mode changed");
    }

    /// Sets a manual axis value, clamped to [-100, 100] percent.
    pub fn set_axis_value(&self, index: usize, value: f32) {
        if index >= AXIS_COUNT {
            return;
        }
        self.config.lock().unwrap().manual_pct[index] = value.clamp(-100.0, 100.0);
    }

    /// Returns all manual axes to neutral.
    pub fn home_all_axes(&self) {
        self.config.lock().unwrap().manual_pct = [0.0; AXIS_COUNT];
    }

    pub fn set_axis_scale(&self, index: usize, scale: f32) {
        if index >= AXIS_COUNT {
            return;
        }
        self.config.lock().unwrap().axes[index].scale =
            scale.clamp(*AXIS_SCALE_RANGE.start(), *AXIS_SCALE_RANGE.end());
    }

    pub fn set_axis_invert(&self, index: usize, invert: bool) {
        if index >= AXIS_COUNT {
            return;
        }
        self.config.lock().unwrap().axes[index].invert = invert;
    }

    pub fn set_axis_enabled(&self, index: usize, enabled: bool) {
        if index >= AXIS_COUNT {
            return;
        }
        self.config.lock().unwrap().axes[index].enabled = enabled;
    }

    pub fn set_imu_sensitivity(&self, value: f32) {
        self.config.lock().unwrap().sensitivity =
            value.clamp(*SENSITIVITY_RANGE.start(), *SENSITIVITY_RANGE.end());
    }

    pub fn set_imu_max_angle(&self, degrees: f32) {
        self.config.lock().unwrap().max_angle_deg =
            degrees.clamp(*MAX_ANGLE_RANGE.start(), *MAX_ANGLE_RANGE.end());
    }

    /// Changes the packet rate; the running task picks the new period up on
    /// its next tick without resetting any other streaming state.
    pub fn set_send_rate(&self, hz: u32) {
        self.config.lock().unwrap().send_rate_hz =
            hz.clamp(*SEND_RATE_RANGE.start(), *SEND_RATE_RANGE.end());
    }

    pub fn reset_imu_reference(&self) {
        self.imu.reset_reference();
    }

    /// Applies persisted settings to the live configuration.
    pub fn apply_settings(&self, settings: &Settings) {
        let mut config = self.config.lock().unwrap();
        config.send_rate_hz = settings
            .send_rate_hz
            .clamp(*SEND_RATE_RANGE.start(), *SEND_RATE_RANGE.end());
        config.max_angle_deg = settings
            .imu_max_angle
            .clamp(*MAX_ANGLE_RANGE.start(), *MAX_ANGLE_RANGE.end());
        config.axes = settings.axes;
    }

    /// Copies the live configuration back into a settings struct for saving.
    pub fn store_settings(&self, settings: &mut Settings) {
        let config = self.config.lock().unwrap();
        settings.send_rate_hz = config.send_rate_hz;
        settings.imu_max_angle = config.max_angle_deg;
        settings.axes = config.axes;
    }

    /// Forwards an ASCII command to the platform.
    pub async fn send_command(&self, command: &str) -> bool {
        self.link.write_command(command).await
    }

    // ── Streaming ────────────────────────────────────────────────────

    pub fn streaming_state(&self) -> StreamingState {
        StreamingState {
            streaming: self.tick_task.lock().unwrap().is_some(),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            live_sent_values: *self.live_values.lock().unwrap(),
        }
    }

    /// Starts the periodic task. No-op while already running; the packet
    /// counter restarts from zero.
    fn start_streaming(self: &Arc<Self>) {
        let mut task = self.tick_task.lock().unwrap();
        if task.is_some() {
            return;
        }
        self.packets_sent.store(0, Ordering::Relaxed);

        let controller = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            loop {
                let period_ms = {
                    let rate = controller.config.lock().unwrap().send_rate_hz.max(1);
                    1000 / u64::from(rate)
                };
                if controller.tick().await {
                    controller.packets_sent.fetch_add(1, Ordering::Relaxed);
                }
                tokio::time::sleep(Duration::from_millis(period_ms.max(1))).await;
            }
        }));
        info!("streaming started");
    }

    /// Stops the periodic task. Idempotent.
    fn stop_streaming(&self) {
        let Some(handle) = self.tick_task.lock().unwrap().take() else {
            return;
        };
        handle.abort();
        info!("streaming stopped");
    }

    /// One transmission: reads the latest snapshots, encodes, writes.
    /// Returns whether the write counted.
    async fn tick(&self) -> bool {
        let config = self.config.lock().unwrap().clone();

        match config.mode {
            ControlMode::RawMotion => {
                let imu = self.imu.sample();
                let values = axes::raw_motion_values(&imu, &config.axes, config.max_angle_deg);
                // Live readout reflects what we tried to send even when the
                // write is dropped.
                *self.live_values.lock().unwrap() = values;
                self.link.write_raw_motion(to_packet_order(values)).await
            }
            ControlMode::Manual => {
                self.link
                    .write_motion_packet(encode_channels(&config.manual_pct))
                    .await
            }
            ControlMode::OrientationMapped => {
                let imu = self.imu.sample();
                let pct = axes::orientation_axes_pct(&imu, config.sensitivity, config.max_angle_deg);
                self.link.write_motion_packet(encode_channels(&pct)).await
            }
        }
    }
}

/// Axis order [surge..yaw] to raw-motion packet order [roll, pitch, yaw,
/// surge, sway, heave].
fn to_packet_order(values: [f32; AXIS_COUNT]) -> [f32; AXIS_COUNT] {
    [
        values[AXIS_ROLL],
        values[AXIS_PITCH],
        values[AXIS_YAW],
        values[AXIS_SURGE],
        values[AXIS_SWAY],
        values[AXIS_HEAVE],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_order_swaps_rotation_first() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(to_packet_order(values), [4.0, 5.0, 6.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn default_config_matches_settings_defaults() {
        let config = ControlConfig::default();
        assert_eq!(config.mode, ControlMode::Manual);
        assert_eq!(config.send_rate_hz, 50);
        assert_eq!(config.max_angle_deg, 3.0);
        assert_eq!(config.sensitivity, 1.0);
    }
}
