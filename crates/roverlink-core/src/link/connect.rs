//! Serial endpoint discovery and opening
//!
//! The device enumerates as `<base><N>` for a small range of N, so opening
//! walks the candidates in order and takes the first that opens. The device
//! resets when its port opens, so the first success is followed by a settle
//! delay and a flush of any boot-banner bytes before traffic begins.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::LinkError;
use super::transport::{SerialTransport, Transport};
use super::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS, DEFAULT_SETTLE_DELAY_MS};

/// Per-read-call timeout on the port itself; the overall reply deadline is
/// enforced by [`SerialTransport`]
const SERIAL_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Device path template; candidate N is `<path_base><N>`
    pub path_base: String,
    /// Number of candidate paths to try, starting at 0
    pub candidates: u8,
    /// Baud rate
    pub baud_rate: u32,
    /// Pause after a successful open, letting the device boot
    pub settle_delay_ms: u64,
    /// Deadline for each device reply
    pub read_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            path_base: "/dev/ttyACM".to_string(),
            candidates: 4,
            baud_rate: DEFAULT_BAUD_RATE,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

/// Open the first candidate serial endpoint that accepts a connection.
///
/// Performs the settle delay, flushes boot-banner bytes, and returns the
/// ready transport. When no candidate opens, returns
/// [`LinkError::NoDeviceFound`]; retrying is the caller's decision.
pub fn open_link(config: &LinkConfig) -> Result<SerialTransport, LinkError> {
    let read_timeout = Duration::from_millis(config.read_timeout_ms);
    let baud = config.baud_rate;
    let port = open_with(config, |path| {
        serialport::new(path, baud)
            .timeout(SERIAL_POLL_TIMEOUT)
            .open()
            .map_err(|e| e.to_string())
    })?;

    let mut transport = SerialTransport::new(port, read_timeout);
    transport
        .flush_input()
        .map_err(|e| LinkError::Serial(e.to_string()))?;
    Ok(transport)
}

/// Candidate walk with an injectable opener, shared by [`open_link`] and the
/// tests. Exactly one settle delay happens, after the first successful open.
pub(crate) fn open_with<T, F>(config: &LinkConfig, mut opener: F) -> Result<T, LinkError>
where
    F: FnMut(&str) -> Result<T, String>,
{
    for n in 0..config.candidates {
        let path = format!("{}{}", config.path_base, n);
        match opener(&path) {
            Ok(handle) => {
                info!(%path, baud = config.baud_rate, "serial endpoint opened");
                std::thread::sleep(Duration::from_millis(config.settle_delay_ms));
                return Ok(handle);
            }
            Err(err) => {
                debug!(%path, %err, "candidate did not open");
            }
        }
    }
    warn!(
        base = %config.path_base,
        candidates = config.candidates,
        "no serial endpoint found"
    );
    Err(LinkError::NoDeviceFound)
}
