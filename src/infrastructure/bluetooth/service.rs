//! Link manager: owns the single logical connection to a motion platform
//! and provides the byte-level write primitives used by the streaming layer.

use crate::controller::MotionLink;
use crate::domain::models::{LinkState, MessageSeverity, ScannedDevice, StatusMessage, AXIS_COUNT};
use crate::infrastructure::bluetooth::{
    connection::{self, ResolvedChannels},
    protocol,
    scanner::BleScanner,
    LinkError,
};
use anyhow::Result;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Bounded diagnostic log, most recent line first.
#[derive(Debug, Default)]
pub struct StatusLog {
    lines: VecDeque<StatusMessage>,
}

impl StatusLog {
    pub const CAPACITY: usize = 50;

    pub fn push(&mut self, message: StatusMessage) {
        self.lines.push_front(message);
        while self.lines.len() > Self::CAPACITY {
            self.lines.pop_back();
        }
    }

    pub fn snapshot(&self) -> Vec<StatusMessage> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Default)]
struct LinkInner {
    peripheral: Option<Peripheral>,
    device_name: Option<String>,
    motion_char: Option<Characteristic>,
    accel_char: Option<Characteristic>,
}

struct Shared {
    inner: RwLock<LinkInner>,
    state_tx: watch::Sender<LinkState>,
    log: StdMutex<StatusLog>,
}

impl Shared {
    fn set_state(&self, state: LinkState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!(?state, "link state changed");
                *current = state;
                true
            }
        });
    }

    fn log(&self, message: StatusMessage) {
        match message.severity {
            MessageSeverity::Error | MessageSeverity::Warning => warn!("{}", message.message),
            _ => info!("{}", message.message),
        }
        self.log.lock().unwrap().push(message);
    }

    /// Releases the peripheral and all channel handles. Safe to call twice;
    /// only the teardown that actually ends an attempt records the reason.
    async fn teardown(&self, reason: StatusMessage) {
        let peripheral = {
            let mut inner = self.inner.write().await;
            inner.device_name = None;
            inner.motion_char = None;
            inner.accel_char = None;
            inner.peripheral.take()
        };
        // A failed connect never stored a peripheral but still has a reason
        // the status log must carry.
        let was_active =
            peripheral.is_some() || *self.state_tx.borrow() != LinkState::Disconnected;
        if let Some(peripheral) = peripheral {
            let _ = peripheral.disconnect().await;
        }
        if was_active {
            self.log(reason);
        }
        self.set_state(LinkState::Disconnected);
    }
}

/// Manages one logical connection to a peripheral advertising the platform
/// service, plus discovery of candidates.
pub struct LinkManager {
    adapter: Adapter,
    scanner: BleScanner,
    shared: Arc<Shared>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl LinkManager {
    /// Binds to the first available Bluetooth adapter.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(LinkError::NoAdapter)?;

        let (state_tx, _) = watch::channel(LinkState::Disconnected);
        Ok(Self {
            scanner: BleScanner::new(adapter.clone()),
            adapter,
            shared: Arc::new(Shared {
                inner: RwLock::new(LinkInner::default()),
                state_tx,
                log: StdMutex::new(StatusLog::default()),
            }),
            tasks: StdMutex::new(Vec::new()),
        })
    }

    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.shared.state_tx.subscribe()
    }

    pub fn current_state(&self) -> LinkState {
        *self.shared.state_tx.borrow()
    }

    pub fn devices(&self) -> watch::Receiver<Vec<ScannedDevice>> {
        self.scanner.devices()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanner.is_scanning()
    }

    /// Most-recent-first diagnostic log.
    pub fn status_log(&self) -> Vec<StatusMessage> {
        self.shared.log.lock().unwrap().snapshot()
    }

    pub async fn connected_device_name(&self) -> Option<String> {
        self.shared.inner.read().await.device_name.clone()
    }

    /// True when the connected firmware exposes the raw-motion channel.
    pub async fn has_raw_motion_support(&self) -> bool {
        self.shared.inner.read().await.accel_char.is_some()
    }

    pub async fn start_scan(&self) -> Result<()> {
        if let Err(e) = self.scanner.start().await {
            self.shared.log(StatusMessage::error(format!("Scan failed: {e}")));
            return Err(e);
        }
        self.shared
            .log(StatusMessage::info("Scanning for motion platforms..."));
        Ok(())
    }

    pub async fn stop_scan(&self) -> Result<()> {
        if self.scanner.is_scanning() {
            self.scanner.stop().await?;
            self.shared.log(StatusMessage::info("Scan stopped"));
        }
        Ok(())
    }

    /// Connects to a previously discovered peripheral.
    ///
    /// No-op unless currently Disconnected. Scanning is stopped first; on
    /// any failure the state falls back to Disconnected with a log line and
    /// the same call can be retried.
    pub async fn connect(&self, address: &str) -> Result<()> {
        if self.current_state() != LinkState::Disconnected {
            return Ok(());
        }
        let _ = self.stop_scan().await;

        self.shared.set_state(LinkState::Connecting);
        self.shared
            .log(StatusMessage::info(format!("Connecting to {address}...")));

        match self.try_connect(address).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.shared
                    .teardown(StatusMessage::error(format!("Connection failed: {e}")))
                    .await;
                Err(e.into())
            }
        }
    }

    async fn try_connect(&self, address: &str) -> Result<(), LinkError> {
        let peripheral = self
            .adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|p| p.address().to_string() == address)
            .ok_or_else(|| LinkError::DeviceNotFound(address.to_string()))?;

        let channels = connection::establish(&peripheral).await?;
        let name = peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|p| p.local_name)
            .unwrap_or_else(|| address.to_string());

        self.store_connection(&peripheral, name.clone(), channels)
            .await;
        self.spawn_link_tasks(peripheral).await;

        self.shared.set_state(LinkState::Connected);
        self.shared
            .log(StatusMessage::success(format!("Connected to {name}")));
        Ok(())
    }

    async fn store_connection(
        &self,
        peripheral: &Peripheral,
        name: String,
        channels: ResolvedChannels,
    ) {
        let mut inner = self.shared.inner.write().await;
        inner.peripheral = Some(peripheral.clone());
        inner.device_name = Some(name);
        inner.motion_char = Some(channels.motion);
        inner.accel_char = channels.accel;
    }

    /// Status-notification decoding and disconnect detection both run off
    /// the peripheral's streams until teardown.
    async fn spawn_link_tasks(&self, peripheral: Peripheral) {
        let mut tasks = self.tasks.lock().unwrap();
        for task in tasks.drain(..) {
            task.abort();
        }

        // Inbound status lines.
        let shared = Arc::clone(&self.shared);
        let notif_peripheral = peripheral.clone();
        tasks.push(tokio::spawn(async move {
            let mut stream = match notif_peripheral.notifications().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("no notification stream: {e}");
                    return;
                }
            };
            while let Some(notification) = stream.next().await {
                if notification.uuid == protocol::STATUS_CHAR_UUID {
                    let text = protocol::decode_status(&notification.value);
                    shared.log(StatusMessage::info(format!("Platform: {text}")));
                }
            }
            // Stream end means the link dropped underneath us.
            shared.teardown(StatusMessage::info("Disconnected")).await;
        }));

        // Adapter-level disconnect events.
        let shared = Arc::clone(&self.shared);
        let adapter = self.adapter.clone();
        let id = peripheral.id();
        tasks.push(tokio::spawn(async move {
            let Ok(mut events) = adapter.events().await else {
                return;
            };
            while let Some(event) = events.next().await {
                if matches!(event, CentralEvent::DeviceDisconnected(ref gone) if *gone == id) {
                    shared.teardown(StatusMessage::info("Disconnected")).await;
                    break;
                }
            }
        }));
    }

    /// Requests teardown of the current connection. Idempotent.
    pub async fn disconnect(&self) {
        self.shared.teardown(StatusMessage::info("Disconnected")).await;
        let mut tasks = self.tasks.lock().unwrap();
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    async fn write(&self, char_of: fn(&LinkInner) -> Option<&Characteristic>, payload: &[u8], write_type: WriteType) -> bool {
        if self.current_state() != LinkState::Connected {
            return false;
        }
        let inner = self.shared.inner.read().await;
        let (Some(peripheral), Some(characteristic)) = (inner.peripheral.as_ref(), char_of(&inner))
        else {
            return false;
        };
        match peripheral.write(characteristic, payload, write_type).await {
            Ok(()) => true,
            Err(e) => {
                // Best-effort link: a dropped packet is preferable to a
                // resent stale command, so no retry.
                debug!("write failed: {e}");
                false
            }
        }
    }
}

impl MotionLink for LinkManager {
    /// Unacknowledged 12-byte motion command on the mandatory channel.
    async fn write_motion_packet(&self, channels: [u16; AXIS_COUNT]) -> bool {
        let payload = protocol::encode_motion_packet(&channels);
        self.write(
            |inner| inner.motion_char.as_ref(),
            &payload,
            WriteType::WithoutResponse,
        )
        .await
    }

    /// Unacknowledged 24-byte raw-motion payload on the secondary channel.
    /// Fails when the firmware never exposed it.
    async fn write_raw_motion(&self, values: [f32; AXIS_COUNT]) -> bool {
        let payload = protocol::encode_raw_motion_packet(&values);
        self.write(
            |inner| inner.accel_char.as_ref(),
            &payload,
            WriteType::WithoutResponse,
        )
        .await
    }

    /// Acknowledged ASCII command (diagnostics/config queries) on the
    /// mandatory channel, sentinel-terminated.
    async fn write_command(&self, command: &str) -> bool {
        let payload = protocol::encode_command(command);
        self.write(
            |inner| inner.motion_char.as_ref(),
            &payload,
            WriteType::WithResponse,
        )
        .await
    }
}
