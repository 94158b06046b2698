//! Wire protocol for the motion platform's BLE service.
//!
//! The platform exposes one GATT service with three characteristics:
//! a mandatory motion-command characteristic, an optional raw-motion
//! characteristic (absent on older firmware), and a status characteristic
//! that notifies free-form UTF-8 diagnostic lines.

use crate::domain::models::AXIS_COUNT;
use uuid::Uuid;

/// Motion platform BLE service UUID.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x42100001_0001_1000_8000_00805f9b34fb);

/// Motion command characteristic (write, unacknowledged) - mandatory.
pub const MOTION_CHAR_UUID: Uuid = Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb);

/// Status characteristic (notify) - UTF-8 diagnostic lines from the firmware.
pub const STATUS_CHAR_UUID: Uuid = Uuid::from_u128(0x0000ff02_0000_1000_8000_00805f9b34fb);

/// Raw motion characteristic (write, unacknowledged) - optional high-rate
/// channel; older firmware does not expose it.
pub const ACCEL_CHAR_UUID: Uuid = Uuid::from_u128(0x0000ff03_0000_1000_8000_00805f9b34fb);

/// The firmware sets its local MTU to this so 24-byte payloads fit with ATT
/// overhead to spare; host stacks negotiate up to it automatically.
pub const REQUIRED_MTU: usize = 128;

/// Terminator the firmware's ASCII command parser looks for.
pub const COMMAND_TERMINATOR: u8 = b'X';

pub const MOTION_PACKET_LEN: usize = 12;
pub const RAW_MOTION_PACKET_LEN: usize = 24;

/// Packs six channel values (0-4095, center 2047) into the 12-byte motion
/// command payload: 6 x u16 little-endian, order [surge, sway, heave, roll,
/// pitch, yaw].
pub fn encode_motion_packet(channels: &[u16; AXIS_COUNT]) -> [u8; MOTION_PACKET_LEN] {
    let mut payload = [0u8; MOTION_PACKET_LEN];
    for (i, &value) in channels.iter().enumerate() {
        let bytes = value.min(4095).to_le_bytes();
        payload[i * 2] = bytes[0];
        payload[i * 2 + 1] = bytes[1];
    }
    payload
}

/// Packs the raw motion payload: 6 x f32 little-endian, order
/// [roll_deg, pitch_deg, yaw_deg, surge_ms2, sway_ms2, heave_ms2].
pub fn encode_raw_motion_packet(values: &[f32; AXIS_COUNT]) -> [u8; RAW_MOTION_PACKET_LEN] {
    let mut payload = [0u8; RAW_MOTION_PACKET_LEN];
    for (i, &value) in values.iter().enumerate() {
        payload[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
    payload
}

/// Frames an ASCII command string for the firmware parser.
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(command.len() + 1);
    data.extend_from_slice(command.as_bytes());
    data.push(COMMAND_TERMINATOR);
    data
}

/// Decodes a status notification payload as UTF-8 text, dropping invalid
/// sequences rather than failing.
pub fn decode_status(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_packet_is_little_endian_center() {
        let payload = encode_motion_packet(&[2047; 6]);
        assert_eq!(payload, [0xFF, 0x07].repeat(6).as_slice());
    }

    #[test]
    fn motion_packet_encodes_extremes() {
        let payload = encode_motion_packet(&[0, 4095, 2047, 0, 4095, 2047]);
        assert_eq!(&payload[0..2], &[0x00, 0x00]);
        assert_eq!(&payload[2..4], &[0xFF, 0x0F]);
        assert_eq!(&payload[4..6], &[0xFF, 0x07]);
    }

    #[test]
    fn motion_packet_caps_overrange_values() {
        let payload = encode_motion_packet(&[u16::MAX, 0, 0, 0, 0, 0]);
        assert_eq!(&payload[0..2], &[0xFF, 0x0F]); // 4095
    }

    #[test]
    fn raw_motion_packet_layout() {
        let values = [3.0, -1.5, 0.0, 0.25, 9.81, -9.81];
        let payload = encode_raw_motion_packet(&values);
        assert_eq!(payload.len(), RAW_MOTION_PACKET_LEN);
        for (i, &v) in values.iter().enumerate() {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&payload[i * 4..i * 4 + 4]);
            assert_eq!(f32::from_le_bytes(bytes), v);
        }
    }

    #[test]
    fn command_framing_appends_sentinel() {
        assert_eq!(encode_command("CONFIG?"), b"CONFIG?X");
        assert_eq!(encode_command(""), b"X");
    }

    #[test]
    fn status_decoding_tolerates_invalid_utf8() {
        assert_eq!(decode_status(b"ready"), "ready");
        let decoded = decode_status(&[0x68, 0x69, 0xFF]);
        assert!(decoded.starts_with("hi"));
    }
}
