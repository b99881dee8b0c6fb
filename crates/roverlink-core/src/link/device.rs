//! Device link facade
//!
//! Composes the registry, connection manager, codec, and polling loop behind
//! the register/set/get surface application code sees. State is owned by the
//! instance; two links never share arrays.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use super::codec;
use super::connect::{open_link, LinkConfig};
use super::error::LinkError;
use super::registry::{
    AnalogId, ControllerId, DigitalId, MotorId, PortRegistry, ServoId, StepDirection, StepperId,
};
use super::transport::Transport;
use super::worker::{LinkState, LinkWorker};

/// Runtime setter/getter surface of a robot link.
///
/// Implemented by the physical [`DeviceLink`] and by the in-memory
/// [`crate::sim::SimLink`], so behavior code can be pointed at either by
/// configuration.
pub trait RobotLink: Send + Sync {
    /// Set the desired speed of a motor
    fn set_motor_speed(&self, motor: MotorId, speed: i16);

    /// Queue a one-shot stepper move
    fn step_stepper(&self, stepper: StepperId, direction: StepDirection, steps: u8);

    /// Set the persistent angle of a servo
    fn set_servo_angle(&self, servo: ServoId, angle: u8);

    /// Most recent digital reading, `None` until data has arrived
    fn digital_read(&self, sensor: DigitalId) -> Option<bool>;

    /// Most recent analog reading, `None` until data has arrived
    fn analog_read(&self, sensor: AnalogId) -> Option<u16>;
}

/// Control link to the physical device
///
/// Register every port first, then [`start`](DeviceLink::start); from that
/// point on only the setters and getters are meaningful. Registering after
/// start is a programmer error and panics.
pub struct DeviceLink {
    registry: Arc<Mutex<PortRegistry>>,
    config: LinkConfig,
    worker: Option<LinkWorker>,
}

impl DeviceLink {
    /// Create an idle link with empty registries
    pub fn new(config: LinkConfig) -> Self {
        Self {
            registry: Arc::new(Mutex::new(PortRegistry::new())),
            config,
            worker: None,
        }
    }

    fn registry(&self) -> MutexGuard<'_, PortRegistry> {
        self.registry.lock().expect("registry poisoned")
    }

    fn assert_registration_open(&self) {
        assert!(
            self.worker.is_none(),
            "ports must be registered before the link starts"
        );
    }

    /// Register a motor controller on an (rx, tx) pin pair
    pub fn register_motor_controller(&mut self, rx_pin: u8, tx_pin: u8) -> ControllerId {
        self.assert_registration_open();
        self.registry().add_motor_controller(rx_pin, tx_pin)
    }

    /// Register a motor on one of a controller's two slots
    pub fn register_motor(&mut self, controller: ControllerId) -> MotorId {
        self.assert_registration_open();
        self.registry().add_motor(controller)
    }

    /// Register a stepper on (direction, step) pins
    pub fn register_stepper(&mut self, dir_pin: u8, step_pin: u8) -> StepperId {
        self.assert_registration_open();
        self.registry().add_stepper(dir_pin, step_pin)
    }

    /// Register a servo on a single pin
    pub fn register_servo(&mut self, pin: u8) -> ServoId {
        self.assert_registration_open();
        self.registry().add_servo(pin)
    }

    /// Register a digital sensor on a single pin
    pub fn register_digital_sensor(&mut self, pin: u8) -> DigitalId {
        self.assert_registration_open();
        self.registry().add_digital_sensor(pin)
    }

    /// Register an analog sensor on a single pin
    pub fn register_analog_sensor(&mut self, pin: u8) -> AnalogId {
        self.assert_registration_open();
        self.registry().add_analog_sensor(pin)
    }

    /// Open the serial endpoint and start the polling loop.
    ///
    /// Discovery, settle delay, and boot-banner flush happen here; then the
    /// initialization frame describing the final registry goes out exactly
    /// once and the loop takes over.
    pub fn start(&mut self) -> Result<(), LinkError> {
        let transport = open_link(&self.config)?;
        self.start_with(Box::new(transport))
    }

    /// Start the polling loop over an already-opened transport.
    ///
    /// Useful for non-serial channels and for tests.
    pub fn start_with(&mut self, mut transport: Box<dyn Transport>) -> Result<(), LinkError> {
        if self.worker.is_some() {
            return Err(LinkError::AlreadyRunning);
        }

        let init = codec::encode_init(&self.registry());
        transport
            .write_all(&init)
            .map_err(|e| LinkError::LinkLost(e.to_string()))?;
        info!(bytes = init.len(), "initialization frame sent");

        self.worker = Some(LinkWorker::spawn(Arc::clone(&self.registry), transport));
        Ok(())
    }

    /// Stop the polling loop and wait for it to finish.
    ///
    /// Cooperative: takes effect after the in-flight iteration completes.
    /// Completes immediately when the loop already exited on an error.
    pub fn stop(&mut self) {
        if let Some(worker) = &mut self.worker {
            worker.stop();
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LinkState {
        match &self.worker {
            None => LinkState::Idle,
            Some(worker) if worker.is_finished() => LinkState::Stopped,
            Some(_) => LinkState::Running,
        }
    }

    /// Terminal error that ended the loop, if any
    pub fn last_error(&self) -> Option<LinkError> {
        self.worker.as_ref().and_then(|worker| worker.last_error())
    }
}

impl RobotLink for DeviceLink {
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

impl Drop for DeviceLink {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::transport::testing::ScriptedTransport;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};

    fn wait_for<F: Fn() -> bool>(condition: F) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met within 2s");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn digital_hit_is_visible_after_one_iteration() {
        let mut link = DeviceLink::new(LinkConfig::default());
        let bumper = link.register_digital_sensor(2);

        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[b'D', 2, 2, b';']); // one digital block, "hit"
        link.start_with(Box::new(transport)).unwrap();

        wait_for(|| link.digital_read(bumper) == Some(true));
        link.stop();
        assert_eq!(link.state(), LinkState::Stopped);
    }

    #[test]
    fn init_frame_goes_out_before_any_command_frame() {
        let mut link = DeviceLink::new(LinkConfig::default());
        link.register_digital_sensor(7);

        let transport = ScriptedTransport::new();
        let probe = transport.clone();
        link.start_with(Box::new(transport)).unwrap();

        wait_for(|| probe.written().len() >= 20);
        link.stop();

        let written = probe.written();
        let init: &[u8] = b"IM\x01T\x01S\x01D\x02\x07A\x01;";
        assert_eq!(&written[..init.len()], init);
        // First command frame follows immediately
        assert_eq!(&written[init.len()..init.len() + 7], b"M\x01T\x01S\x01;");
    }

    #[test]
    fn write_failure_surfaces_as_link_lost_and_stop_does_not_deadlock() {
        let mut link = DeviceLink::new(LinkConfig::default());

        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[b';', b';', b';']);
        transport.fail_writes_after(2); // init + first command succeed
        link.start_with(Box::new(transport)).unwrap();

        wait_for(|| link.state() == LinkState::Stopped);
        assert!(matches!(link.last_error(), Some(LinkError::LinkLost(_))));
        link.stop(); // already exited; must return promptly
        assert_eq!(link.state(), LinkState::Stopped);
    }

    #[test]
    fn silent_device_surfaces_as_link_timeout() {
        let mut link = DeviceLink::new(LinkConfig::default());

        let transport = ScriptedTransport::new(); // never replies
        link.start_with(Box::new(transport)).unwrap();

        wait_for(|| link.state() == LinkState::Stopped);
        assert_eq!(link.last_error(), Some(LinkError::LinkTimeout));
    }

    #[test]
    fn desynchronized_stream_is_terminal() {
        let mut link = DeviceLink::new(LinkConfig::default());

        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[b'Z']);
        link.start_with(Box::new(transport)).unwrap();

        wait_for(|| link.state() == LinkState::Stopped);
        assert_eq!(
            link.last_error(),
            Some(LinkError::ProtocolViolation { byte: b'Z' })
        );
    }

    #[test]
    fn starting_twice_is_rejected() {
        let mut link = DeviceLink::new(LinkConfig::default());
        link.start_with(Box::new(ScriptedTransport::new())).unwrap();
        let second = link.start_with(Box::new(ScriptedTransport::new()));
        assert_eq!(second.unwrap_err(), LinkError::AlreadyRunning);
        link.stop();
    }

    #[test]
    #[should_panic(expected = "before the link starts")]
    fn registration_after_start_panics() {
        let mut link = DeviceLink::new(LinkConfig::default());
        link.start_with(Box::new(ScriptedTransport::new())).unwrap();
        link.register_servo(1);
    }

    #[test]
    fn idle_link_reports_idle() {
        let link = DeviceLink::new(LinkConfig::default());
        assert_eq!(link.state(), LinkState::Idle);
        assert_eq!(link.last_error(), None);
    }
}
