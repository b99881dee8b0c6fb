//! Duplex polling loop
//!
//! One background thread repeats {encode command frame, write, read one data
//! frame, apply} until told to stop. The stop flag is only examined at
//! iteration boundaries; cancelling mid-frame would desynchronize the
//! device's parser.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use super::codec;
use super::error::LinkError;
use super::registry::PortRegistry;
use super::transport::Transport;

/// Lifecycle state of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// Not started; ports may still be registered
    Idle,
    /// Polling loop is exchanging frames with the device
    Running,
    /// Loop has exited, either by request or on a terminal error
    Stopped,
}

/// Handle to the spawned polling thread
pub(crate) struct LinkWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    last_error: Arc<Mutex<Option<LinkError>>>,
}

impl LinkWorker {
    /// Spawn the polling loop over the given transport.
    ///
    /// The registry mutex is held only while encoding a command frame and
    /// while applying a decoded data frame, never across the blocking write
    /// or read, so setters and getters stay responsive.
    pub(crate) fn spawn(
        registry: Arc<Mutex<PortRegistry>>,
        mut transport: Box<dyn Transport>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let last_error = Arc::new(Mutex::new(None));

        let thread_stop = Arc::clone(&stop);
        let thread_error = Arc::clone(&last_error);
        let handle = std::thread::Builder::new()
            .name("roverlink-io".to_string())
            .spawn(move || {
                info!("link loop started");
                match run_loop(&registry, transport.as_mut(), &thread_stop) {
                    Ok(()) => info!("link loop stopped"),
                    Err(err) => {
                        warn!(%err, "link loop terminated");
                        *thread_error.lock().expect("error slot poisoned") = Some(err);
                    }
                }
            })
            .expect("failed to spawn link thread");

        Self {
            stop,
            handle: Some(handle),
            last_error,
        }
    }

    /// Request a cooperative stop and wait for the loop to finish.
    ///
    /// Takes effect after the in-flight write and read complete. Joining a
    /// loop that already terminated on its own returns immediately.
    pub(crate) fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }

    pub(crate) fn last_error(&self) -> Option<LinkError> {
        self.last_error.lock().expect("error slot poisoned").clone()
    }
}

fn run_loop(
    registry: &Mutex<PortRegistry>,
    transport: &mut dyn Transport,
    stop: &AtomicBool,
) -> Result<(), LinkError> {
    while !stop.load(Ordering::Relaxed) {
        let command = codec::encode_command(&mut registry.lock().expect("registry poisoned"));
        transport
            .write_all(&command)
            .map_err(|e| LinkError::LinkLost(e.to_string()))?;

        let frame = codec::decode_data(transport)?;
        debug!(
            digital = frame.digital.len(),
            analog = frame.analog.len(),
            "data frame applied"
        );
        registry
            .lock()
            .expect("registry poisoned")
            .apply_data(&frame);
    }
    Ok(())
}
