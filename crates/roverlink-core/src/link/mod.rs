//! Serial link to the actuator/sensor microcontroller
//!
//! The link layer has four parts: the port registry mapping logical ports to
//! protocol indices, the packet codec for the `;`-terminated wire frames, the
//! connection manager that discovers and opens the serial endpoint, and the
//! duplex polling loop that keeps host and device state mirrored.

pub mod codec;
mod connect;
mod device;
mod error;
pub mod registry;
pub mod transport;
mod worker;

pub use connect::{open_link, LinkConfig};
pub use device::{DeviceLink, RobotLink};
pub use error::LinkError;
pub use registry::{
    AnalogId, ControllerId, DigitalId, MotorId, PortRegistry, ServoId, StepDirection, StepperId,
};
pub use transport::{SerialTransport, Transport};
pub use worker::LinkState;

/// Default baud rate for the device link
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default pause after opening the port, letting the device finish its
/// boot-time reset before any traffic
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;

/// Default deadline for each device reply
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;
