//! Bluetooth LE link to the motion platform.
//!
//! The [`service::LinkManager`] is the single entry point; scanning,
//! connection establishment and the wire protocol live in the submodules.

pub mod connection;
pub mod protocol;
pub mod scanner;
pub mod service;

pub use service::LinkManager;

use thiserror::Error;

/// Link-layer failures. All of them are non-fatal: they surface as a state
/// transition plus a status-log line and the operation can be retried.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("motion channel missing on peripheral")]
    MotionChannelMissing,

    #[error(transparent)]
    Transport(#[from] btleplug::Error),
}
