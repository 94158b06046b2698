//! BLE discovery for motion platforms.
//!
//! A scan pass is filtered to the platform service UUID. Results are kept in
//! a [`DeviceRegistry`] keyed by address and published, strongest signal
//! first, through a watch cell.

use crate::domain::models::ScannedDevice;
use crate::infrastructure::bluetooth::protocol;
use anyhow::Result;
use btleplug::api::{Central, CentralEvent, Peripheral as _, ScanFilter};
use btleplug::platform::Adapter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Discovered peripherals for the current scan pass, keyed by address.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, ScannedDevice>,
}

impl DeviceRegistry {
    pub fn clear(&mut self) {
        self.devices.clear();
    }

    /// Inserts or replaces the entry for the device's address.
    pub fn upsert(&mut self, device: ScannedDevice) {
        self.devices.insert(device.address.clone(), device);
    }

    /// All known devices, strongest signal first.
    pub fn sorted(&self) -> Vec<ScannedDevice> {
        let mut list: Vec<_> = self.devices.values().cloned().collect();
        list.sort_by(|a, b| b.rssi.cmp(&a.rssi).then_with(|| a.address.cmp(&b.address)));
        list
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Runs filtered discovery passes and publishes the device list.
pub struct BleScanner {
    adapter: Adapter,
    registry: Arc<Mutex<DeviceRegistry>>,
    devices_tx: watch::Sender<Vec<ScannedDevice>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BleScanner {
    pub fn new(adapter: Adapter) -> Self {
        let (devices_tx, _) = watch::channel(Vec::new());
        Self {
            adapter,
            registry: Arc::new(Mutex::new(DeviceRegistry::default())),
            devices_tx,
            task: Mutex::new(None),
        }
    }

    /// Latest-value cell with the sorted device list.
    pub fn devices(&self) -> watch::Receiver<Vec<ScannedDevice>> {
        self.devices_tx.subscribe()
    }

    pub fn is_scanning(&self) -> bool {
        self.task.lock().unwrap().is_some()
    }

    /// Starts a discovery pass restricted to the platform service.
    /// The previous device set is discarded. No-op while already scanning.
    pub async fn start(&self) -> Result<()> {
        if self.is_scanning() {
            return Ok(());
        }

        self.registry.lock().unwrap().clear();
        self.devices_tx.send_replace(Vec::new());

        let mut events = self.adapter.events().await?;
        self.adapter
            .start_scan(ScanFilter {
                services: vec![protocol::SERVICE_UUID],
            })
            .await?;
        info!("scanning for motion platforms");

        let adapter = self.adapter.clone();
        let registry = Arc::clone(&self.registry);
        let devices_tx = self.devices_tx.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                let Ok(Some(props)) = peripheral.properties().await else {
                    continue;
                };
                // Nameless advertisements are not useful in a picker.
                let Some(name) = props.local_name else {
                    continue;
                };
                let device = ScannedDevice {
                    name,
                    address: peripheral.address().to_string(),
                    rssi: props.rssi.unwrap_or(0),
                };
                debug!(address = %device.address, rssi = device.rssi, "device seen");

                let snapshot = {
                    let mut registry = registry.lock().unwrap();
                    registry.upsert(device);
                    registry.sorted()
                };
                devices_tx.send_replace(snapshot);
            }
        });
        *self.task.lock().unwrap() = Some(handle);

        Ok(())
    }

    /// Ends the discovery pass. The device list is retained. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        let handle = self.task.lock().unwrap().take();
        let Some(handle) = handle else {
            return Ok(());
        };
        handle.abort();
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("failed to stop scan cleanly: {e}");
        }
        info!("scan stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(address: &str, rssi: i16) -> ScannedDevice {
        ScannedDevice {
            name: format!("platform-{address}"),
            address: address.to_string(),
            rssi,
        }
    }

    #[test]
    fn duplicate_addresses_overwrite_in_place() {
        let mut registry = DeviceRegistry::default();
        registry.upsert(device("AA:BB", -60));
        registry.upsert(device("AA:BB", -40));
        registry.upsert(device("CC:DD", -50));

        let list = registry.sorted();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].address, "AA:BB");
        assert_eq!(list[0].rssi, -40);
        assert_eq!(list[1].address, "CC:DD");
    }

    #[test]
    fn sorted_is_signal_strength_descending() {
        let mut registry = DeviceRegistry::default();
        registry.upsert(device("11", -90));
        registry.upsert(device("22", -30));
        registry.upsert(device("33", -60));

        let rssi: Vec<i16> = registry.sorted().iter().map(|d| d.rssi).collect();
        assert_eq!(rssi, vec![-30, -60, -90]);
    }

    #[test]
    fn clear_discards_previous_pass() {
        let mut registry = DeviceRegistry::default();
        registry.upsert(device("11", -50));
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }
}
