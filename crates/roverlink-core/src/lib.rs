//! # roverlink core library
//!
//! Host-side control link for a microcontroller that drives heterogeneous
//! actuators (motor controllers, steppers, servos) and reads heterogeneous
//! sensors (digital, analog).
//!
//! Application code registers logical "ports" against a [`link::DeviceLink`],
//! starts the link, and from then on only ever touches setters and getters.
//! A background thread mirrors desired actuator state to the device and
//! mirrors device-read sensor state back; the wire format never leaks out of
//! the [`link`] module.
//!
//! ## Example
//!
//! ```rust,ignore
//! use roverlink_core::link::{DeviceLink, LinkConfig, RobotLink};
//!
//! let mut link = DeviceLink::new(LinkConfig::default());
//! let controller = link.register_motor_controller(19, 18);
//! let left = link.register_motor(controller);
//! let bumper = link.register_digital_sensor(2);
//!
//! link.start()?;
//! link.set_motor_speed(left, 60);
//! if link.digital_read(bumper) == Some(true) {
//!     link.set_motor_speed(left, 0);
//! }
//! link.stop();
//! ```

#![warn(missing_docs)]

pub mod link;
pub mod sim;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::link::{
        AnalogId, ControllerId, DeviceLink, DigitalId, LinkConfig, LinkError, LinkState, MotorId,
        RobotLink, ServoId, StepDirection, StepperId,
    };
    pub use crate::sim::SimLink;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
