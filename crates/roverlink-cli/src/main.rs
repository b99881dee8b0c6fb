//! Demo driver for the roverlink device link
//!
//! Registers a motor controller with two motors plus one digital and one
//! analog sensor, starts the link, sweeps the motors back and forth for a
//! bounded run, and logs sensor readings. `--sim` swaps the physical link
//! for the in-memory variant so the same drive code runs without hardware.

use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roverlink_core::link::{
    AnalogId, DeviceLink, DigitalId, LinkConfig, MotorId, RobotLink,
};
use roverlink_core::sim::SimLink;

#[derive(Parser, Debug)]
#[command(name = "roverlink", about = "Drive the roverlink device link")]
struct Args {
    /// Device path template; candidate N is <PATH_BASE><N>
    #[arg(long, default_value = "/dev/ttyACM")]
    path_base: String,

    /// Baud rate
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Run against the in-memory simulated link instead of hardware
    #[arg(long)]
    sim: bool,

    /// How long to drive, in seconds
    #[arg(long, default_value_t = 5)]
    seconds: u64,
}

/// Ports the demo registers, shared between both link variants
struct DemoPorts {
    left: MotorId,
    right: MotorId,
    bumper: DigitalId,
    range: AnalogId,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    if args.sim {
        let mut sim = SimLink::new();
        let controller = sim.register_motor_controller(19, 18);
        let ports = DemoPorts {
            left: sim.register_motor(controller),
            right: sim.register_motor(controller),
            bumper: sim.register_digital_sensor(2),
            range: sim.register_analog_sensor(3),
        };
        sim.inject_analog(ports.range, 120);
        info!("driving simulated link");
        drive(&sim, &ports, args.seconds);
        return Ok(());
    }

    let config = LinkConfig {
        path_base: args.path_base,
        baud_rate: args.baud,
        ..LinkConfig::default()
    };

    let mut link = DeviceLink::new(config);
    let controller = link.register_motor_controller(19, 18);
    let ports = DemoPorts {
        left: link.register_motor(controller),
        right: link.register_motor(controller),
        bumper: link.register_digital_sensor(2),
        range: link.register_analog_sensor(3),
    };

    link.start().context("failed to open the device link")?;
    info!("driving physical link");
    drive(&link, &ports, args.seconds);
    link.stop();

    if let Some(err) = link.last_error() {
        return Err(err).context("link terminated abnormally");
    }
    Ok(())
}

/// Sweep the motors while polling sensors; generic over the link variant
fn drive(link: &dyn RobotLink, ports: &DemoPorts, seconds: u64) {
    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut speed: i16 = 0;
    let mut step: i16 = 10;

    while Instant::now() < deadline {
        if !(-100..=100).contains(&(speed + step)) {
            step = -step;
        }
        speed += step;

        link.set_motor_speed(ports.left, speed);
        link.set_motor_speed(ports.right, -speed);

        if link.digital_read(ports.bumper) == Some(true) {
            info!("bumper hit, reversing");
            step = -step;
        }
        if let Some(distance) = link.analog_read(ports.range) {
            info!(speed, distance, "telemetry");
        }

        std::thread::sleep(Duration::from_millis(100));
    }

    link.set_motor_speed(ports.left, 0);
    link.set_motor_speed(ports.right, 0);
}
