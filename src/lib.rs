//! Remote control for 6-DOF motion platforms over Bluetooth LE.
//!
//! Three layers:
//! - [`domain`]: axis math, orientation fusion, models and settings.
//! - [`infrastructure`]: the BLE link, sensor sources and logging.
//! - [`controller`]: the streaming coordinator tying the two together.

pub mod controller;
pub mod domain;
pub mod infrastructure;

pub use controller::{MotionLink, PlatformController};
pub use domain::models::{ControlMode, FusionMode, ImuSample, LinkState, ScannedDevice};
pub use infrastructure::bluetooth::LinkManager;
pub use infrastructure::sensors::ImuEngine;
