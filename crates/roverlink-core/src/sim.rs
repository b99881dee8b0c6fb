//! Simulated link for offline testing
//!
//! Drop-in stand-in for the physical [`DeviceLink`](crate::link::DeviceLink):
//! same registration phase, same [`RobotLink`] surface, no transport and no
//! thread. A simulation environment (or a test) plays the device's role by
//! injecting sensor readings and inspecting commanded actuator state.

use std::sync::{Mutex, MutexGuard};

use crate::link::registry::{
    AnalogId, ControllerId, DigitalId, MotorId, PortRegistry, ServoId, StepDirection, StepperId,
};
use crate::link::RobotLink;

/// In-memory robot link
///
/// Actuator setters store wire-equivalent values; sensor getters return
/// whatever the simulation injected, with the same "no data yet" semantics
/// as the physical link.
#[derive(Default)]
pub struct SimLink {
    registry: Mutex<PortRegistry>,
    injected: Mutex<crate::link::codec::DataFrame>,
}

impl SimLink {
    /// Create an empty simulated link
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, PortRegistry> {
        self.registry.lock().expect("registry poisoned")
    }

    /// Register a motor controller on an (rx, tx) pin pair
    pub fn register_motor_controller(&mut self, rx_pin: u8, tx_pin: u8) -> ControllerId {
        self.registry().add_motor_controller(rx_pin, tx_pin)
    }

    /// Register a motor on one of a controller's two slots
    pub fn register_motor(&mut self, controller: ControllerId) -> MotorId {
        self.registry().add_motor(controller)
    }

    /// Register a stepper on (direction, step) pins
    pub fn register_stepper(&mut self, dir_pin: u8, step_pin: u8) -> StepperId {
        self.registry().add_stepper(dir_pin, step_pin)
    }

    /// Register a servo on a single pin
    pub fn register_servo(&mut self, pin: u8) -> ServoId {
        self.registry().add_servo(pin)
    }

    /// Register a digital sensor on a single pin
    pub fn register_digital_sensor(&mut self, pin: u8) -> DigitalId {
        self.registry().add_digital_sensor(pin)
    }

    /// Register an analog sensor on a single pin
    pub fn register_analog_sensor(&mut self, pin: u8) -> AnalogId {
        self.registry().add_analog_sensor(pin)
    }

    /// Inject a digital reading, as if a data frame carried it
    pub fn inject_digital(&self, sensor: DigitalId, hit: bool) {
        let mut frame = self.injected.lock().expect("frame poisoned");
        grow_to(&mut frame.digital, sensor.0, false);
        frame.digital[sensor.0] = hit;
        self.registry().apply_data(&frame);
    }

    /// Inject an analog reading, as if a data frame carried it
    pub fn inject_analog(&self, sensor: AnalogId, value: u16) {
        let mut frame = self.injected.lock().expect("frame poisoned");
        grow_to(&mut frame.analog, sensor.0, 0);
        frame.analog[sensor.0] = value;
        self.registry().apply_data(&frame);
    }

    /// Wire byte a command frame would carry for this motor right now
    pub fn motor_speed_byte(&self, motor: MotorId) -> u8 {
        self.registry().motor_speeds()[motor.0]
    }

    /// Commanded servo angle
    pub fn servo_angle(&self, servo: ServoId) -> u8 {
        self.registry().servo_angles()[servo.0]
    }

    /// Consume pending stepper commands the way an encode pass would.
    ///
    /// Returns `(direction, steps)` wire pairs per stepper index; each
    /// queued move shows up in exactly one call.
    pub fn take_stepper_commands(&self) -> Vec<(u8, u8)> {
        self.registry().take_stepper_commands()
    }
}

fn grow_to<T: Copy>(values: &mut Vec<T>, index: usize, fill: T) {
    while values.len() <= index {
        values.push(fill);
    }
}

impl RobotLink for SimLink {
    fn set_motor_speed(&self, motor: MotorId, speed: i16) {
        self.registry().set_motor_speed(motor, speed);
    }

    fn step_stepper(&self, stepper: StepperId, direction: StepDirection, steps: u8) {
        self.registry().step_stepper(stepper, direction, steps);
    }

    fn set_servo_angle(&self, servo: ServoId, angle: u8) {
        self.registry().set_servo_angle(servo, angle);
    }

    fn digital_read(&self, sensor: DigitalId) -> Option<bool> {
        self.registry().digital_read(sensor)
    }

    fn analog_read(&self, sensor: AnalogId) -> Option<u16> {
        self.registry().analog_read(sensor)
    }
}
