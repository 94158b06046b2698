//! Connection establishment: GATT discovery, characteristic resolution and
//! status-channel subscription for a freshly connected platform.

use crate::infrastructure::bluetooth::{protocol, LinkError};
use btleplug::api::{Characteristic, Peripheral as _};
use btleplug::platform::Peripheral;
use tracing::{debug, info, warn};

/// Channel handles resolved once per connection.
///
/// The motion channel is mandatory; raw motion is missing on older firmware
/// and the capability is fixed until the next connect.
pub struct ResolvedChannels {
    pub motion: Characteristic,
    pub accel: Option<Characteristic>,
    pub status: Option<Characteristic>,
}

impl ResolvedChannels {
    pub fn has_raw_motion(&self) -> bool {
        self.accel.is_some()
    }
}

/// Connects the peripheral and resolves the platform's channels.
///
/// Fails with [`LinkError::MotionChannelMissing`] when the mandatory motion
/// characteristic is absent; the transport is disconnected again before any
/// resolution error is returned.
pub async fn establish(peripheral: &Peripheral) -> Result<ResolvedChannels, LinkError> {
    peripheral.connect().await?;
    debug!("transport connected, discovering services");

    match resolve_channels(peripheral).await {
        Ok(channels) => Ok(channels),
        Err(e) => {
            // A failed resolution must not leave the transport connected.
            let _ = peripheral.disconnect().await;
            Err(e)
        }
    }
}

async fn resolve_channels(peripheral: &Peripheral) -> Result<ResolvedChannels, LinkError> {
    peripheral.discover_services().await?;

    let mut motion = None;
    let mut accel = None;
    let mut status = None;
    for service in peripheral.services() {
        if service.uuid != protocol::SERVICE_UUID {
            continue;
        }
        for characteristic in &service.characteristics {
            match characteristic.uuid {
                uuid if uuid == protocol::MOTION_CHAR_UUID => {
                    motion = Some(characteristic.clone());
                }
                uuid if uuid == protocol::ACCEL_CHAR_UUID => {
                    accel = Some(characteristic.clone());
                }
                uuid if uuid == protocol::STATUS_CHAR_UUID => {
                    status = Some(characteristic.clone());
                }
                _ => {}
            }
        }
    }

    let motion = motion.ok_or(LinkError::MotionChannelMissing)?;

    if accel.is_some() {
        info!("motion + raw-motion channels resolved");
    } else {
        info!("motion channel resolved (no raw-motion support, older firmware)");
    }

    // Diagnostic lines arrive as notifications on the status channel.
    if let Some(ref status_char) = status {
        if let Err(e) = peripheral.subscribe(status_char).await {
            warn!("could not subscribe to status notifications: {e}");
        }
    }

    Ok(ResolvedChannels {
        motion,
        accel,
        status,
    })
}
