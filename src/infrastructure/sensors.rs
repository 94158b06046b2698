//! Sensor access for the orientation engine.
//!
//! Hosts expose wildly different motion hardware, so raw sampling sits
//! behind [`SensorSource`]: a source reports what it has, then delivers
//! events into a channel until stopped. The [`ImuEngine`] picks a fusion
//! mode from the capabilities once per session and publishes the filtered
//! sample through a watch cell.

use crate::domain::imu::FusionFilter;
use crate::domain::models::{FusionMode, ImuSample};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Nominal sensor subscription rate.
pub const TARGET_SAMPLE_RATE_HZ: u32 = 100;

/// A raw motion event from the host's sensors.
#[derive(Debug, Clone, Copy)]
pub enum SensorEvent {
    /// Accelerometer reading, m/s² including gravity.
    Accel {
        x: f32,
        y: f32,
        z: f32,
        timestamp_ns: u64,
    },
    /// Gyroscope reading, rad/s.
    Gyro {
        x: f32,
        y: f32,
        z: f32,
        timestamp_ns: u64,
    },
    /// Hardware-fused orientation, degrees.
    Orientation { roll: f32, pitch: f32, yaw: f32 },
}

/// Which sensors a source can deliver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorCaps {
    pub has_accelerometer: bool,
    pub has_gyroscope: bool,
    pub has_orientation: bool,
}

impl SensorCaps {
    /// Best fusion strategy for this sensor set.
    pub fn fusion_mode(self) -> FusionMode {
        if self.has_orientation {
            FusionMode::HardwareFusion
        } else if self.has_gyroscope {
            FusionMode::Complementary
        } else {
            FusionMode::None
        }
    }
}

/// A subscribable stream of raw sensor events.
pub trait SensorSource: Send {
    fn capabilities(&self) -> SensorCaps;

    /// Begin delivering events into `tx` at roughly `target_rate_hz`.
    /// Must not block; delivery happens from the source's own task.
    fn start(
        &mut self,
        target_rate_hz: u32,
        tx: mpsc::UnboundedSender<SensorEvent>,
    ) -> anyhow::Result<()>;

    /// Stop delivery. Idempotent.
    fn stop(&mut self);
}

/// Source for hosts without motion hardware. Never emits.
pub struct NullSensorSource;

impl SensorSource for NullSensorSource {
    fn capabilities(&self) -> SensorCaps {
        SensorCaps::default()
    }

    fn start(
        &mut self,
        _target_rate_hz: u32,
        _tx: mpsc::UnboundedSender<SensorEvent>,
    ) -> anyhow::Result<()> {
        warn!("no motion sensors available on this host");
        Ok(())
    }

    fn stop(&mut self) {}
}

/// Maintains the best available orientation estimate from whatever sensors
/// the host exposes, and publishes it as a latest-value cell.
pub struct ImuEngine {
    source: Mutex<Box<dyn SensorSource>>,
    filter: Arc<Mutex<FusionFilter>>,
    mode: FusionMode,
    sample_tx: watch::Sender<ImuSample>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ImuEngine {
    pub fn new(source: Box<dyn SensorSource>) -> Self {
        let mode = source.capabilities().fusion_mode();
        info!(?mode, "sensor fusion mode selected");
        let (sample_tx, _) = watch::channel(ImuSample {
            fusion_mode: mode,
            ..ImuSample::default()
        });
        Self {
            source: Mutex::new(source),
            filter: Arc::new(Mutex::new(FusionFilter::new(mode))),
            mode,
            sample_tx,
            task: Mutex::new(None),
        }
    }

    pub fn fusion_mode(&self) -> FusionMode {
        self.mode
    }

    /// Latest-value cell for the orientation sample.
    pub fn samples(&self) -> watch::Receiver<ImuSample> {
        self.sample_tx.subscribe()
    }

    pub fn sample(&self) -> ImuSample {
        *self.sample_tx.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.task.lock().unwrap().is_some()
    }

    /// Subscribes to the sensors and starts publishing samples.
    /// No-op while already active; a fresh start clears all filter state.
    pub fn start(&self) -> anyhow::Result<()> {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            return Ok(());
        }

        self.filter.lock().unwrap().reset();

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.source
            .lock()
            .unwrap()
            .start(TARGET_SAMPLE_RATE_HZ, tx)?;

        let filter = Arc::clone(&self.filter);
        let sample_tx = self.sample_tx.clone();
        *task = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let sample = {
                    let mut filter = filter.lock().unwrap();
                    match event {
                        SensorEvent::Accel {
                            x,
                            y,
                            z,
                            timestamp_ns,
                        } => filter.on_accel(x, y, z, timestamp_ns),
                        SensorEvent::Gyro {
                            x,
                            y,
                            z,
                            timestamp_ns,
                        } => filter.on_gyro(x, y, z, timestamp_ns),
                        SensorEvent::Orientation { roll, pitch, yaw } => {
                            filter.on_orientation(roll, pitch, yaw)
                        }
                    }
                };
                sample_tx.send_replace(sample);
            }
            debug!("sensor event stream ended");
        }));

        info!("orientation engine started");
        Ok(())
    }

    /// Unsubscribes and resets the published sample to its all-zero default.
    /// Idempotent.
    pub fn stop(&self) {
        let mut task = self.task.lock().unwrap();
        let Some(handle) = task.take() else {
            return;
        };
        self.source.lock().unwrap().stop();
        handle.abort();
        self.sample_tx.send_replace(ImuSample {
            fusion_mode: self.mode,
            ..ImuSample::default()
        });
        info!("orientation engine stopped");
    }

    /// Re-zeroes roll/pitch/yaw without touching the subscription.
    pub fn reset_reference(&self) {
        self.filter.lock().unwrap().reset_reference();
        debug!("orientation reference reset");
    }
}

impl Drop for ImuEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
