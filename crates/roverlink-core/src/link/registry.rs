//! Port registration and live value state
//!
//! Each port category keeps an ordered, append-only list of registrations;
//! registration order is the protocol index order and is never compacted.
//! The same struct holds the live value arrays the polling loop serializes
//! from and decodes into.

/// Handle for a registered motor controller (a pin pair driving two motors)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerId(pub(crate) usize);

/// Handle for a registered motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotorId(pub(crate) usize);

/// Handle for a registered stepper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepperId(pub(crate) usize);

/// Handle for a registered servo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServoId(pub(crate) usize);

/// Handle for a registered digital sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DigitalId(pub(crate) usize);

/// Handle for a registered analog sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnalogId(pub(crate) usize);

/// Direction of a stepper move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    /// Wire value 0
    Reverse,
    /// Wire value 1
    Forward,
}

impl StepDirection {
    pub(crate) fn wire(self) -> u8 {
        match self {
            StepDirection::Reverse => 0,
            StepDirection::Forward => 1,
        }
    }
}

/// Largest value a single payload byte may carry.
///
/// The transport reserves the zero byte, so every payload byte goes out as
/// `value + 1` and must stay in `[0, 254]`.
pub const MAX_WIRE_VALUE: u8 = 254;

/// Per-category port registrations and their live values
///
/// Indices are issued monotonically from 0 per category and are immutable
/// once issued; there is no de-registration. Sensor values start out as
/// `None` ("no data yet") until the first data frame is applied.
#[derive(Debug, Default)]
pub struct PortRegistry {
    // Pin assignments, fixed once the loop starts
    controller_pins: Vec<(u8, u8)>,
    motors_per_controller: Vec<u8>,
    stepper_pins: Vec<(u8, u8)>,
    servo_pins: Vec<u8>,
    digital_pins: Vec<u8>,
    analog_pins: Vec<u8>,

    // Live values, mutated by setters and by the polling loop
    motor_speeds: Vec<u8>,
    stepper_pending: Vec<(u8, u8)>,
    servo_angles: Vec<u8>,
    digital_values: Vec<Option<bool>>,
    analog_values: Vec<Option<u16>>,
}

impl PortRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a motor controller on an (rx, tx) pin pair.
    ///
    /// A controller always reserves both of its motor slots on the wire,
    /// whether or not motors are registered against them.
    pub fn add_motor_controller(&mut self, rx_pin: u8, tx_pin: u8) -> ControllerId {
        self.controller_pins.push((rx_pin, tx_pin));
        self.motors_per_controller.push(0);
        self.motor_speeds.push(0);
        self.motor_speeds.push(0);
        ControllerId(self.controller_pins.len() - 1)
    }

    /// Register a motor on one of a controller's two slots.
    ///
    /// The motor's protocol index is `controller * 2 + slot`.
    ///
    /// # Panics
    ///
    /// Panics if the controller already has two motors.
    pub fn add_motor(&mut self, controller: ControllerId) -> MotorId {
        let slots = &mut self.motors_per_controller[controller.0];
        assert!(
            *slots < 2,
            "motor controller {} already has two motors",
            controller.0
        );
        let slot = *slots as usize;
        *slots += 1;
        MotorId(controller.0 * 2 + slot)
    }

    /// Register a stepper on (direction, step) pins
    pub fn add_stepper(&mut self, dir_pin: u8, step_pin: u8) -> StepperId {
        self.stepper_pins.push((dir_pin, step_pin));
        self.stepper_pending.push((0, 0));
        StepperId(self.stepper_pins.len() - 1)
    }

    /// Register a servo on a single pin
    pub fn add_servo(&mut self, pin: u8) -> ServoId {
        self.servo_pins.push(pin);
        self.servo_angles.push(0);
        ServoId(self.servo_pins.len() - 1)
    }

    /// Register a digital sensor on a single pin
    pub fn add_digital_sensor(&mut self, pin: u8) -> DigitalId {
        self.digital_pins.push(pin);
        self.digital_values.push(None);
        DigitalId(self.digital_pins.len() - 1)
    }

    /// Register an analog sensor on a single pin
    pub fn add_analog_sensor(&mut self, pin: u8) -> AnalogId {
        self.analog_pins.push(pin);
        self.analog_values.push(None);
        AnalogId(self.analog_pins.len() - 1)
    }

    /// Set the desired speed of a motor.
    ///
    /// The signed speed is folded into the device's `[0, 254]` byte range as
    /// `speed mod 255`, matching what the device firmware unfolds.
    ///
    /// # Panics
    ///
    /// Panics if the index was never issued by this registry.
    pub fn set_motor_speed(&mut self, motor: MotorId, speed: i16) {
        self.motor_speeds[motor.0] = speed.rem_euclid(255) as u8;
    }

    /// Queue a one-shot stepper command.
    ///
    /// The command is pending until the next command frame serializes it,
    /// at which point it is consumed. A second call before that overwrites
    /// the first; the queue is one deep per stepper.
    ///
    /// # Panics
    ///
    /// Panics if the index was never issued by this registry.
    pub fn step_stepper(&mut self, stepper: StepperId, direction: StepDirection, steps: u8) {
        self.stepper_pending[stepper.0] = (direction.wire(), steps.min(MAX_WIRE_VALUE));
    }

    /// Set the persistent angle of a servo, clamped to the wire range
    ///
    /// # Panics
    ///
    /// Panics if the index was never issued by this registry.
    pub fn set_servo_angle(&mut self, servo: ServoId, angle: u8) {
        self.servo_angles[servo.0] = angle.min(MAX_WIRE_VALUE);
    }

    /// Most recent digital reading, `None` until the first data frame
    ///
    /// # Panics
    ///
    /// Panics if the index was never issued by this registry.
    pub fn digital_read(&self, sensor: DigitalId) -> Option<bool> {
        self.digital_values[sensor.0]
    }

    /// Most recent analog reading, `None` until the first data frame
    ///
    /// # Panics
    ///
    /// Panics if the index was never issued by this registry.
    pub fn analog_read(&self, sensor: AnalogId) -> Option<u16> {
        self.analog_values[sensor.0]
    }

    // Codec-facing accessors

    pub(crate) fn controller_pins(&self) -> &[(u8, u8)] {
        &self.controller_pins
    }

    pub(crate) fn stepper_pins(&self) -> &[(u8, u8)] {
        &self.stepper_pins
    }

    pub(crate) fn servo_pins(&self) -> &[u8] {
        &self.servo_pins
    }

    pub(crate) fn digital_pins(&self) -> &[u8] {
        &self.digital_pins
    }

    pub(crate) fn analog_pins(&self) -> &[u8] {
        &self.analog_pins
    }

    pub(crate) fn motor_speeds(&self) -> &[u8] {
        &self.motor_speeds
    }

    pub(crate) fn servo_angles(&self) -> &[u8] {
        &self.servo_angles
    }

    /// Take every pending stepper command, leaving `(0, 0)` behind.
    ///
    /// Owned by the polling loop during encode; application writes between
    /// two encodes are requests that the next encode consumes.
    pub(crate) fn take_stepper_commands(&mut self) -> Vec<(u8, u8)> {
        self.stepper_pending
            .iter_mut()
            .map(|slot| std::mem::replace(slot, (0, 0)))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn pending_stepper(&self, stepper: StepperId) -> (u8, u8) {
        self.stepper_pending[stepper.0]
    }

    /// Apply a fully decoded data frame.
    ///
    /// Called only after the whole frame decoded cleanly, so getters never
    /// observe a partial packet. Values past the registered count are
    /// dropped rather than growing the arrays.
    pub(crate) fn apply_data(&mut self, frame: &crate::link::codec::DataFrame) {
        for (slot, &hit) in self.digital_values.iter_mut().zip(frame.digital.iter()) {
            *slot = Some(hit);
        }
        for (slot, &value) in self.analog_values.iter_mut().zip(frame.analog.iter()) {
            *slot = Some(value);
        }
    }
}
