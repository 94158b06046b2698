//! End-to-end streaming behaviour against a recording link.

use sixdof_remote::controller::{MotionLink, PlatformController};
use sixdof_remote::domain::models::{ControlMode, LinkState, AXIS_COUNT};
use sixdof_remote::infrastructure::sensors::{
    ImuEngine, NullSensorSource, SensorCaps, SensorEvent, SensorSource,
};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Duration};

/// Captures every write instead of touching a radio.
#[derive(Default)]
struct RecordingLink {
    motion: Mutex<Vec<[u16; AXIS_COUNT]>>,
    raw: Mutex<Vec<[f32; AXIS_COUNT]>>,
    commands: Mutex<Vec<String>>,
}

impl RecordingLink {
    fn motion_count(&self) -> usize {
        self.motion.lock().unwrap().len()
    }

    fn raw_count(&self) -> usize {
        self.raw.lock().unwrap().len()
    }
}

impl MotionLink for RecordingLink {
    async fn write_motion_packet(&self, channels: [u16; AXIS_COUNT]) -> bool {
        self.motion.lock().unwrap().push(channels);
        true
    }

    async fn write_raw_motion(&self, values: [f32; AXIS_COUNT]) -> bool {
        self.raw.lock().unwrap().push(values);
        true
    }

    async fn write_command(&self, command: &str) -> bool {
        self.commands.lock().unwrap().push(command.to_string());
        true
    }
}

/// Hardware-fusion source that reports level once, then a 10 degree roll.
struct TiltedSource;

impl SensorSource for TiltedSource {
    fn capabilities(&self) -> SensorCaps {
        SensorCaps {
            has_accelerometer: true,
            has_gyroscope: true,
            has_orientation: true,
        }
    }

    fn start(
        &mut self,
        _target_rate_hz: u32,
        tx: mpsc::UnboundedSender<SensorEvent>,
    ) -> anyhow::Result<()> {
        let _ = tx.send(SensorEvent::Orientation {
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
        });
        let _ = tx.send(SensorEvent::Orientation {
            roll: 10.0,
            pitch: 0.0,
            yaw: 0.0,
        });
        Ok(())
    }

    fn stop(&mut self) {}
}

fn harness() -> (
    Arc<RecordingLink>,
    Arc<PlatformController<RecordingLink>>,
    watch::Sender<LinkState>,
    watch::Receiver<LinkState>,
) {
    let link = Arc::new(RecordingLink::default());
    let imu = Arc::new(ImuEngine::new(Box::new(NullSensorSource)));
    let controller = PlatformController::new(Arc::clone(&link), imu);
    let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);
    (link, controller, state_tx, state_rx)
}

#[tokio::test(start_paused = true)]
async fn connected_link_streams_neutral_manual_packets() {
    let (link, controller, state_tx, state_rx) = harness();
    let _supervisor = controller.run(state_rx);

    state_tx.send(LinkState::Connected).unwrap();
    sleep(Duration::from_millis(205)).await;

    // 50 Hz default: a tick every 20 ms.
    let packets = link.motion.lock().unwrap().clone();
    assert!(
        (9..=12).contains(&packets.len()),
        "expected roughly 10 packets, got {}",
        packets.len()
    );
    for packet in &packets {
        assert_eq!(packet, &[2047; AXIS_COUNT]);
    }
    assert_eq!(link.raw_count(), 0);

    let streaming = controller.streaming_state();
    assert!(streaming.streaming);
    assert_eq!(streaming.packets_sent, packets.len() as u64);
}

#[tokio::test(start_paused = true)]
async fn disconnect_stops_the_periodic_task() {
    let (link, controller, state_tx, state_rx) = harness();
    let _supervisor = controller.run(state_rx);

    state_tx.send(LinkState::Connected).unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(link.motion_count() > 0);

    state_tx.send(LinkState::Disconnected).unwrap();
    sleep(Duration::from_millis(5)).await;
    let frozen = link.motion_count();
    let counter = controller.streaming_state().packets_sent;

    sleep(Duration::from_millis(200)).await;
    assert_eq!(link.motion_count(), frozen);
    assert_eq!(controller.streaming_state().packets_sent, counter);
    assert!(!controller.streaming_state().streaming);
}

#[tokio::test(start_paused = true)]
async fn reconnect_restarts_the_packet_counter() {
    let (link, controller, state_tx, state_rx) = harness();
    let _supervisor = controller.run(state_rx);

    state_tx.send(LinkState::Connected).unwrap();
    sleep(Duration::from_millis(100)).await;
    let first_run = controller.streaming_state().packets_sent;
    assert!(first_run > 3);

    state_tx.send(LinkState::Disconnected).unwrap();
    sleep(Duration::from_millis(5)).await;
    state_tx.send(LinkState::Connected).unwrap();
    sleep(Duration::from_millis(45)).await;

    let second_run = controller.streaming_state().packets_sent;
    assert!(second_run < first_run, "counter should restart from zero");
    assert!(second_run > 0);
    assert_eq!(
        link.motion_count() as u64,
        first_run + second_run,
        "total writes span both runs"
    );
}

#[tokio::test(start_paused = true)]
async fn mode_switch_does_not_interrupt_streaming() {
    let link = Arc::new(RecordingLink::default());
    let imu = Arc::new(ImuEngine::new(Box::new(TiltedSource)));
    let controller = PlatformController::new(Arc::clone(&link), imu);
    let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);
    let _supervisor = controller.run(state_rx);

    controller.set_control_mode(ControlMode::RawMotion);
    state_tx.send(LinkState::Connected).unwrap();
    sleep(Duration::from_millis(100)).await;
    let raw_seen = link.raw_count();
    assert!(raw_seen > 0);
    assert_eq!(link.motion_count(), 0);

    controller.set_control_mode(ControlMode::Manual);
    sleep(Duration::from_millis(100)).await;
    assert!(link.motion_count() > 0, "task kept ticking across the switch");
    assert_eq!(link.raw_count(), raw_seen);
    assert!(controller.streaming_state().streaming);
}

#[tokio::test(start_paused = true)]
async fn raw_motion_clamps_roll_to_max_angle() {
    let link = Arc::new(RecordingLink::default());
    let imu = Arc::new(ImuEngine::new(Box::new(TiltedSource)));
    let controller = PlatformController::new(Arc::clone(&link), imu);
    let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);
    let _supervisor = controller.run(state_rx);

    controller.set_control_mode(ControlMode::RawMotion);
    sleep(Duration::from_millis(5)).await; // let the fused sample land
    state_tx.send(LinkState::Connected).unwrap();
    sleep(Duration::from_millis(50)).await;

    // Packet order is [roll, pitch, yaw, surge, sway, heave]. A 10 degree
    // roll at default scale 0.5 exceeds the 3 degree limit.
    let last = *link.raw.lock().unwrap().last().unwrap();
    assert_eq!(last[0], 3.0);
    assert_eq!(&last[1..], &[0.0; 5]);
}

#[tokio::test(start_paused = true)]
async fn send_rate_change_applies_without_restart() {
    let (link, controller, state_tx, state_rx) = harness();
    let _supervisor = controller.run(state_rx);

    state_tx.send(LinkState::Connected).unwrap();
    sleep(Duration::from_millis(100)).await;
    let before = controller.streaming_state().packets_sent;

    controller.set_send_rate(10); // 100 ms period
    sleep(Duration::from_millis(400)).await;
    let after = controller.streaming_state().packets_sent;

    let delta = after - before;
    assert!(
        (3..=6).contains(&delta),
        "expected roughly 4 packets at 10 Hz, got {delta}"
    );
    assert!(after > before, "counter keeps running across a rate change");
    assert_eq!(link.motion_count() as u64, after);
}

#[test]
fn setters_clamp_to_documented_ranges() {
    let link = Arc::new(RecordingLink::default());
    let imu = Arc::new(ImuEngine::new(Box::new(NullSensorSource)));
    let controller = PlatformController::new(link, imu);

    controller.set_send_rate(500);
    controller.set_imu_max_angle(10.0);
    controller.set_imu_sensitivity(9.0);
    controller.set_axis_scale(0, 5.0);
    controller.set_axis_value(2, 250.0);

    let config = controller.config();
    assert_eq!(config.send_rate_hz, 200);
    assert_eq!(config.max_angle_deg, 6.0);
    assert_eq!(config.sensitivity, 5.0);
    assert_eq!(config.axes[0].scale, 2.0);
    assert_eq!(config.manual_pct[2], 100.0);

    controller.set_send_rate(0);
    controller.set_imu_max_angle(0.2);
    controller.set_imu_sensitivity(0.01);
    controller.set_axis_scale(0, 0.0);
    controller.set_axis_value(2, -300.0);

    let config = controller.config();
    assert_eq!(config.send_rate_hz, 1);
    assert_eq!(config.max_angle_deg, 1.0);
    assert_eq!(config.sensitivity, 0.1);
    assert_eq!(config.axes[0].scale, 0.01);
    assert_eq!(config.manual_pct[2], -100.0);

    // Out-of-range axis indices are ignored.
    let before = controller.config();
    controller.set_axis_value(AXIS_COUNT, 50.0);
    controller.set_axis_scale(99, 1.0);
    let after = controller.config();
    assert_eq!(after.manual_pct, before.manual_pct);
    assert_eq!(after.axes, before.axes);
}

#[tokio::test]
async fn commands_pass_through_to_the_link() {
    let link = Arc::new(RecordingLink::default());
    let imu = Arc::new(ImuEngine::new(Box::new(NullSensorSource)));
    let controller = PlatformController::new(Arc::clone(&link), imu);

    assert!(controller.send_command("STATUS").await);
    assert_eq!(link.commands.lock().unwrap().as_slice(), ["STATUS"]);
}
