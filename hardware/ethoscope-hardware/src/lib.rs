// Copyright 2024-2026 the ethoscope-rs authors.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Stimulation hardware.
//!
//! Instructions are queued on a [HardwareHandle] and executed in order by a
//! worker thread owned by the [HardwareConnection]. Tracking never waits on
//! the hardware. Failures are logged by the worker and otherwise ignored.

mod codec;
mod connection;
mod interface;
mod probe;

pub use codec::{
    LYNX_MOTION_BAUD_RATE, LynxMotionCodec, OPTOMOTOR_BAUD_RATE, OptoMotorCodec, PulseCommand,
    ServoCommand, angle_to_pulse,
};
pub use connection::{HardwareConnection, HardwareHandle};
pub use interface::{
    DefaultInterface, GpioInterface, Interface, LynxMotionInterface, OptoMotorInterface,
};
pub use probe::{find_port, probe_ports};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("serial port: {0}")]
    Serial(#[from] tokio_serial::Error),
    #[error("no serial port could be opened at {baud} baud")]
    NoPortFound { baud: u32 },
    #[error("the {interface} interface cannot execute {instruction:?}")]
    Unsupported {
        interface: &'static str,
        instruction: Instruction,
    },
    #[error("no GPIO pin configured for channel {channel}")]
    UnknownChannel { channel: u32 },
    #[error("channel {channel} is out of range")]
    InvalidChannel { channel: u32 },
    #[error("hardware worker exited before the interface was ready")]
    WorkerGone,
}

/// One stimulation, as decided by a stimulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    /// Rotate a servo to 0°, wait, rotate back to 150°, wait.
    Servo { channel: u32, dt_ms: u64 },
    /// Drive a PWM channel for `duration_ms` at `intensity`.
    Pulse {
        channel: u32,
        duration_ms: u64,
        intensity: u32,
    },
    /// Hold a GPIO line high for `duration_ms`.
    Gpio { channel: u32, duration_ms: u64 },
}

/// An [Instruction] variant, without its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    Servo,
    Pulse,
    Gpio,
}

impl Instruction {
    pub fn kind(&self) -> InstructionKind {
        match self {
            Self::Servo { .. } => InstructionKind::Servo,
            Self::Pulse { .. } => InstructionKind::Pulse,
            Self::Gpio { .. } => InstructionKind::Gpio,
        }
    }
}

/// Maps a logical stimulator channel onto a GPIO pin number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpioPin {
    pub channel: u32,
    pub pin: u32,
}

/// Which physical interface a [HardwareConnection] drives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "interface", rename_all = "snake_case")]
pub enum HardwareConfig {
    /// No hardware. Instructions are logged and discarded.
    #[default]
    Default,
    /// LynxMotion SSC-32 style servo controller.
    LynxMotion {
        /// Serial device. The first port that opens is used when unset.
        #[serde(default)]
        port: Option<String>,
    },
    /// Optomotor PWM board.
    OptoMotor {
        #[serde(default)]
        port: Option<String>,
    },
    /// Linux sysfs GPIO lines.
    Gpio {
        #[serde(default = "default_sysfs_root")]
        sysfs_root: PathBuf,
        pins: Vec<GpioPin>,
    },
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

impl HardwareConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::LynxMotion { .. } => "lynx_motion",
            Self::OptoMotor { .. } => "opto_motor",
            Self::Gpio { .. } => "gpio",
        }
    }

    /// Whether the interface can execute instructions of `kind`.
    ///
    /// The default interface accepts everything.
    pub fn supports(&self, kind: InstructionKind) -> bool {
        match self {
            Self::Default => true,
            Self::LynxMotion { .. } => kind == InstructionKind::Servo,
            Self::OptoMotor { .. } => kind == InstructionKind::Pulse,
            Self::Gpio { .. } => kind == InstructionKind::Gpio,
        }
    }

    /// Open the interface. Serial ports need a running tokio reactor.
    pub async fn open_interface(&self) -> Result<Box<dyn Interface>> {
        Ok(match self {
            Self::Default => Box::new(DefaultInterface),
            Self::LynxMotion { port } => Box::new(LynxMotionInterface::open(port.as_deref())?),
            Self::OptoMotor { port } => Box::new(OptoMotorInterface::open(port.as_deref())?),
            Self::Gpio { pins, sysfs_root } => {
                Box::new(GpioInterface::new(pins.clone(), sysfs_root.clone()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_config_from_toml() {
        let cfg: HardwareConfig = toml::from_str("interface = \"lynx_motion\"\n").unwrap();
        assert_eq!(cfg, HardwareConfig::LynxMotion { port: None });

        let cfg: HardwareConfig = toml::from_str(
            "interface = \"gpio\"\npins = [{ channel = 1, pin = 17 }]\n",
        )
        .unwrap();
        assert_eq!(
            cfg,
            HardwareConfig::Gpio {
                pins: vec![GpioPin { channel: 1, pin: 17 }],
                sysfs_root: PathBuf::from("/sys/class/gpio"),
            }
        );
        assert_eq!(cfg.name(), "gpio");
    }

    #[test]
    fn each_interface_supports_its_own_instructions() {
        let servo = Instruction::Servo {
            channel: 1,
            dt_ms: 350,
        };
        let gpio = Instruction::Gpio {
            channel: 1,
            duration_ms: 200,
        };
        let lynx = HardwareConfig::LynxMotion { port: None };
        assert!(lynx.supports(servo.kind()));
        assert!(!lynx.supports(gpio.kind()));
        assert!(!HardwareConfig::OptoMotor { port: None }.supports(InstructionKind::Servo));
        assert!(HardwareConfig::OptoMotor { port: None }.supports(InstructionKind::Pulse));
        let pins = HardwareConfig::Gpio {
            sysfs_root: default_sysfs_root(),
            pins: vec![],
        };
        assert!(pins.supports(gpio.kind()));
        assert!(!pins.supports(InstructionKind::Pulse));
        for kind in [InstructionKind::Servo, InstructionKind::Pulse, InstructionKind::Gpio] {
            assert!(HardwareConfig::Default.supports(kind));
        }
    }
}
