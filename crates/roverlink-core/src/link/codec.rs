//! Wire frame encoding/decoding
//!
//! Three `;`-terminated frame shapes travel over the link, all ASCII command
//! letters plus bias-encoded payload bytes:
//!
//! - Init (host→device, once): `I`, then per category in fixed order
//!   `M`,`T`,`S`,`D`,`A` a header byte, `count + 1`, and the pin bytes
//!   (a pin pair per motor controller and per stepper, one pin otherwise).
//! - Command (host→device, every loop iteration): `M (n+1) speeds…`,
//!   `T (n+1) (dir+1)(steps+1)…`, `S (n+1) angles…`, `;`. Empty categories
//!   still emit their header with count byte 1, keeping the device parser
//!   unambiguous.
//! - Data (device→host, once per iteration): zero or more `D`/`A` blocks in
//!   any order, then `;`.
//!
//! Payload bytes are transmitted as `value + 1` and decoded as `value - 1`
//! because the transport keeps the zero byte free; digital sensor value
//! bytes are the exception and compare raw against the "hit" byte 2.

use std::io;

use super::error::LinkError;
use super::registry::PortRegistry;
use super::transport::Transport;

const INIT_HEADER: u8 = b'I';
const MOTOR_HEADER: u8 = b'M';
const STEPPER_HEADER: u8 = b'T';
const SERVO_HEADER: u8 = b'S';
const DIGITAL_HEADER: u8 = b'D';
const ANALOG_HEADER: u8 = b'A';
const FRAME_END: u8 = b';';

/// Raw digital value byte meaning "hit"
const DIGITAL_HIT: u8 = 2;

/// Build the one-time initialization frame describing every registered port.
///
/// Must be sent exactly once, before the polling loop starts, and must
/// reflect the final registry contents.
pub fn encode_init(registry: &PortRegistry) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(INIT_HEADER);

    out.push(MOTOR_HEADER);
    let controllers = registry.controller_pins();
    out.push(controllers.len() as u8 + 1);
    for &(rx, tx) in controllers {
        out.push(rx);
        out.push(tx);
    }

    out.push(STEPPER_HEADER);
    let steppers = registry.stepper_pins();
    out.push(steppers.len() as u8 + 1);
    for &(dir, step) in steppers {
        out.push(dir);
        out.push(step);
    }

    out.push(SERVO_HEADER);
    let servos = registry.servo_pins();
    out.push(servos.len() as u8 + 1);
    out.extend_from_slice(servos);

    out.push(DIGITAL_HEADER);
    let digitals = registry.digital_pins();
    out.push(digitals.len() as u8 + 1);
    out.extend_from_slice(digitals);

    out.push(ANALOG_HEADER);
    let analogs = registry.analog_pins();
    out.push(analogs.len() as u8 + 1);
    out.extend_from_slice(analogs);

    out.push(FRAME_END);
    out
}

/// Build a command frame from current actuator state.
///
/// Serializing also consumes every pending stepper command: the registry
/// reads back `(0, 0)` for each stepper afterwards, so a queued move lands
/// in exactly one frame.
pub fn encode_command(registry: &mut PortRegistry) -> Vec<u8> {
    let mut out = Vec::new();

    out.push(MOTOR_HEADER);
    let speeds = registry.motor_speeds();
    out.push(speeds.len() as u8 + 1);
    for &speed in speeds {
        out.push(speed + 1);
    }

    out.push(STEPPER_HEADER);
    let commands = registry.take_stepper_commands();
    out.push(commands.len() as u8 + 1);
    for (dir, steps) in commands {
        out.push(dir + 1);
        out.push(steps + 1);
    }

    out.push(SERVO_HEADER);
    let angles = registry.servo_angles();
    out.push(angles.len() as u8 + 1);
    for &angle in angles {
        out.push(angle + 1);
    }

    out.push(FRAME_END);
    out
}

/// A fully decoded data frame, ready to apply to the registry
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DataFrame {
    /// Digital readings in protocol index order
    pub digital: Vec<bool>,
    /// Analog readings in protocol index order
    pub analog: Vec<u16>,
}

/// Read and decode one data frame from the transport.
///
/// Blocks on each byte up to the transport's read deadline. Blocks may
/// repeat; a later block of the same type overwrites the earlier one from
/// index 0, mirroring how the device streams refreshed readings. An
/// unrecognized type byte means the stream is desynchronized and is fatal.
pub fn decode_data(transport: &mut dyn Transport) -> Result<DataFrame, LinkError> {
    let mut frame = DataFrame::default();
    loop {
        match next_byte(transport)? {
            DIGITAL_HEADER => {
                let len = next_byte(transport)?.saturating_sub(1) as usize;
                for i in 0..len {
                    let hit = next_byte(transport)? == DIGITAL_HIT;
                    write_at(&mut frame.digital, i, hit);
                }
            }
            ANALOG_HEADER => {
                let len = next_byte(transport)?.saturating_sub(1) as usize;
                for i in 0..len {
                    let lo = next_byte(transport)?.saturating_sub(1) as u16;
                    let hi = next_byte(transport)?.saturating_sub(1) as u16;
                    write_at(&mut frame.analog, i, hi * 256 + lo);
                }
            }
            FRAME_END => return Ok(frame),
            byte => return Err(LinkError::ProtocolViolation { byte }),
        }
    }
}

fn next_byte(transport: &mut dyn Transport) -> Result<u8, LinkError> {
    transport.read_byte().map_err(|e| match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => LinkError::LinkTimeout,
        _ => LinkError::LinkLost(e.to_string()),
    })
}

fn write_at<T: Copy>(values: &mut Vec<T>, index: usize, value: T) {
    if index < values.len() {
        values[index] = value;
    } else {
        values.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::registry::StepDirection;
    use crate::link::transport::testing::ScriptedTransport;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_registry_still_emits_every_category() {
        let mut reg = PortRegistry::new();
        assert_eq!(encode_command(&mut reg), b"M\x01T\x01S\x01;");
    }

    #[test]
    fn command_frame_bias_encodes_values() {
        let mut reg = PortRegistry::new();
        let mc = reg.add_motor_controller(19, 18);
        let m0 = reg.add_motor(mc);
        let m1 = reg.add_motor(mc);
        let servo = reg.add_servo(1);

        reg.set_motor_speed(m0, 100);
        reg.set_motor_speed(m1, -1); // 254 on the wire before bias
        reg.set_servo_angle(servo, 90);

        assert_eq!(
            encode_command(&mut reg),
            [
                b'M', 3, 101, 255, //
                b'T', 1, //
                b'S', 2, 91, //
                b';'
            ]
        );
    }

    #[test]
    fn stepper_command_is_consumed_by_exactly_one_frame() {
        let mut reg = PortRegistry::new();
        let stepper = reg.add_stepper(11, 12);
        reg.step_stepper(stepper, StepDirection::Forward, 40);

        let first = encode_command(&mut reg);
        assert_eq!(first, [b'M', 1, b'T', 2, 2, 41, b'S', 1, b';']);
        assert_eq!(reg.pending_stepper(stepper), (0, 0));

        // The follow-up frame carries the reset command
        let second = encode_command(&mut reg);
        assert_eq!(second, [b'M', 1, b'T', 2, 1, 1, b'S', 1, b';']);
    }

    #[test]
    fn init_frame_lists_pins_per_category_in_fixed_order() {
        let mut reg = PortRegistry::new();
        reg.add_motor_controller(19, 18);
        reg.add_motor_controller(17, 16);
        reg.add_stepper(11, 12);
        reg.add_servo(1);
        reg.add_digital_sensor(2);
        reg.add_digital_sensor(3);
        reg.add_analog_sensor(4);

        assert_eq!(
            encode_init(&reg),
            [
                b'I', //
                b'M', 3, 19, 18, 17, 16, //
                b'T', 2, 11, 12, //
                b'S', 2, 1, //
                b'D', 3, 2, 3, //
                b'A', 2, 4, //
                b';'
            ]
        );
    }

    #[test]
    fn init_frame_for_empty_registry() {
        let reg = PortRegistry::new();
        assert_eq!(encode_init(&reg), b"IM\x01T\x01S\x01D\x01A\x01;");
    }

    #[test]
    fn decode_digital_block() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[b'D', 3, 2, 1, b';']);
        let frame = decode_data(&mut transport).unwrap();
        assert_eq!(frame.digital, vec![true, false]);
        assert_eq!(frame.analog, Vec::<u16>::new());
    }

    #[test]
    fn decode_analog_block_undoes_per_byte_bias() {
        // 1000 = 232 + 3 * 256, transmitted as 233, 4
        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[b'A', 2, 233, 4, b';']);
        let frame = decode_data(&mut transport).unwrap();
        assert_eq!(frame.analog, vec![1000]);
    }

    #[test]
    fn analog_extremes_survive_the_bias_round_trip() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[b'A', 3, 1, 1, 255, 255, b';']);
        let frame = decode_data(&mut transport).unwrap();
        assert_eq!(frame.analog, vec![0, 254 * 256 + 254]);
    }

    #[test]
    fn blocks_may_repeat_and_interleave() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[b'D', 2, 1, b'A', 2, 11, 1, b'D', 2, 2, b';']);
        let frame = decode_data(&mut transport).unwrap();
        // The second digital block overwrote the first
        assert_eq!(frame.digital, vec![true]);
        assert_eq!(frame.analog, vec![10]);
    }

    #[test]
    fn empty_data_frame_is_valid() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[b';']);
        assert_eq!(decode_data(&mut transport).unwrap(), DataFrame::default());
    }

    #[test]
    fn unknown_block_type_is_a_protocol_violation() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[b'X', b';']);
        assert_eq!(
            decode_data(&mut transport),
            Err(LinkError::ProtocolViolation { byte: b'X' })
        );
    }

    #[test]
    fn truncated_frame_surfaces_as_timeout() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[b'D', 3, 2]); // one value byte missing, no terminator
        assert_eq!(decode_data(&mut transport), Err(LinkError::LinkTimeout));
    }
}
