//! Text command encodings of the serial boards.

use std::fmt::Write;

use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::{Error, Result};

pub const LYNX_MOTION_BAUD_RATE: u32 = 115_200;
pub const OPTOMOTOR_BAUD_RATE: u32 = 115_200;

const MIN_ANGLE: f64 = 0.0;
const MAX_ANGLE: f64 = 150.0;
const MIN_PULSE: f64 = 800.0;
const MAX_PULSE: f64 = 2400.0;

/// Move servo `channel` (1-based) to `angle` degrees over `duration_ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoCommand {
    pub channel: u32,
    pub angle: f64,
    pub duration_ms: u64,
}

/// PWM pulse on an optomotor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseCommand {
    pub channel: u32,
    pub duration_ms: u64,
    pub intensity: u32,
}

/// Servo pulse width in µs for `angle`, clamped to the servo range.
pub fn angle_to_pulse(angle: f64) -> u32 {
    let angle = angle.clamp(MIN_ANGLE, MAX_ANGLE);
    let frac = (angle - MIN_ANGLE) / (MAX_ANGLE - MIN_ANGLE);
    (MIN_PULSE + frac * (MAX_PULSE - MIN_PULSE)).round() as u32
}

#[derive(Debug, Default)]
pub struct LynxMotionCodec;

impl Encoder<ServoCommand> for LynxMotionCodec {
    type Error = Error;

    fn encode(&mut self, cmd: ServoCommand, buf: &mut BytesMut) -> Result<()> {
        // the controller numbers its outputs from zero
        let Some(output) = cmd.channel.checked_sub(1) else {
            return Err(Error::InvalidChannel {
                channel: cmd.channel,
            });
        };
        write!(
            buf,
            "#{} P{} T{}\r",
            output,
            angle_to_pulse(cmd.angle),
            cmd.duration_ms
        )
        .map_err(|_| std::io::Error::other("formatting servo command"))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct OptoMotorCodec;

impl Encoder<PulseCommand> for OptoMotorCodec {
    type Error = Error;

    fn encode(&mut self, cmd: PulseCommand, buf: &mut BytesMut) -> Result<()> {
        write!(
            buf,
            "P {} {} {}\r\n",
            cmd.channel, cmd.duration_ms, cmd.intensity
        )
        .map_err(|_| std::io::Error::other("formatting pulse command"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn servo_pulse_range() {
        assert_eq!(angle_to_pulse(0.0), 800);
        assert_eq!(angle_to_pulse(75.0), 1600);
        assert_eq!(angle_to_pulse(150.0), 2400);
        assert_eq!(angle_to_pulse(400.0), 2400);
        assert_eq!(angle_to_pulse(-5.0), 800);
    }

    #[test]
    fn lynx_motion_command() {
        let mut buf = BytesMut::new();
        LynxMotionCodec
            .encode(
                ServoCommand {
                    channel: 3,
                    angle: 150.0,
                    duration_ms: 350,
                },
                &mut buf,
            )
            .unwrap();
        assert_eq!(&buf[..], b"#2 P2400 T350\r");

        let err = LynxMotionCodec.encode(
            ServoCommand {
                channel: 0,
                angle: 0.0,
                duration_ms: 1,
            },
            &mut buf,
        );
        assert!(matches!(err, Err(Error::InvalidChannel { channel: 0 })));
    }

    #[test]
    fn optomotor_command() {
        let mut buf = BytesMut::new();
        OptoMotorCodec
            .encode(
                PulseCommand {
                    channel: 23,
                    duration_ms: 1000,
                    intensity: 1000,
                },
                &mut buf,
            )
            .unwrap();
        assert_eq!(&buf[..], b"P 23 1000 1000\r\n");
    }
}
