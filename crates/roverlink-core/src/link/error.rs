//! Link errors

use thiserror::Error;

/// Errors that can occur while opening or running the device link
///
/// Out-of-range port indices are a registration bug in the caller, not a
/// runtime condition, so they panic instead of appearing here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("no serial device found on any candidate path")]
    NoDeviceFound,

    #[error("serial port error: {0}")]
    Serial(String),

    #[error("link lost: {0}")]
    LinkLost(String),

    #[error("read deadline exceeded waiting for device reply")]
    LinkTimeout,

    #[error("unrecognized data block type: {byte:#04x}")]
    ProtocolViolation {
        /// The offending type byte read off the wire
        byte: u8,
    },

    #[error("link is not running")]
    NotConnected,

    #[error("link is already running")]
    AlreadyRunning,
}
