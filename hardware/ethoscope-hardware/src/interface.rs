use std::{path::PathBuf, time::Duration};

use futures::{FutureExt, SinkExt, future::BoxFuture};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::FramedWrite;
use tracing::{debug, info};

use crate::{
    Error, GpioPin, Instruction, LYNX_MOTION_BAUD_RATE, LynxMotionCodec, OPTOMOTOR_BAUD_RATE,
    OptoMotorCodec, PulseCommand, Result, ServoCommand, find_port,
};

/// A physical device that executes [Instruction]s.
///
/// `send` completes once the instruction has been carried out, including any
/// waits it implies.
pub trait Interface: Send {
    fn name(&self) -> &'static str;

    fn send<'a>(&'a mut self, instruction: &'a Instruction) -> BoxFuture<'a, Result<()>>;
}

/// Accepts everything and does nothing.
#[derive(Debug, Default)]
pub struct DefaultInterface;

impl Interface for DefaultInterface {
    fn name(&self) -> &'static str {
        "default"
    }

    fn send<'a>(&'a mut self, instruction: &'a Instruction) -> BoxFuture<'a, Result<()>> {
        debug!("no hardware for {instruction:?}");
        futures::future::ready(Ok(())).boxed()
    }
}

fn open_serial(port: Option<&str>, baud: u32) -> Result<SerialStream> {
    let path = match port {
        Some(p) => p.to_string(),
        None => find_port(baud)?,
    };
    #[allow(unused_mut)]
    let mut stream = tokio_serial::new(&path, baud).open_native_async()?;
    #[cfg(unix)]
    stream.set_exclusive(false)?;
    info!("opened serial port {path} at {baud} baud");
    Ok(stream)
}

/// Servo controller used for mechanical sleep deprivation.
pub struct LynxMotionInterface {
    writer: FramedWrite<SerialStream, LynxMotionCodec>,
}

impl LynxMotionInterface {
    pub fn open(port: Option<&str>) -> Result<Self> {
        let stream = open_serial(port, LYNX_MOTION_BAUD_RATE)?;
        Ok(Self {
            writer: FramedWrite::new(stream, LynxMotionCodec),
        })
    }

    async fn move_to(&mut self, channel: u32, angle: f64, duration_ms: u64) -> Result<()> {
        self.writer
            .send(ServoCommand {
                channel,
                angle,
                duration_ms,
            })
            .await?;
        tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        Ok(())
    }

    async fn deprive(&mut self, channel: u32, dt_ms: u64) -> Result<()> {
        self.move_to(channel, 0.0, dt_ms).await?;
        self.move_to(channel, 150.0, dt_ms).await
    }
}

impl Interface for LynxMotionInterface {
    fn name(&self) -> &'static str {
        "lynx_motion"
    }

    fn send<'a>(&'a mut self, instruction: &'a Instruction) -> BoxFuture<'a, Result<()>> {
        async move {
            match *instruction {
                Instruction::Servo { channel, dt_ms } => self.deprive(channel, dt_ms).await,
                _ => Err(Error::Unsupported {
                    interface: "lynx_motion",
                    instruction: instruction.clone(),
                }),
            }
        }
        .boxed()
    }
}

/// PWM board driving LEDs and vibration motors.
pub struct OptoMotorInterface {
    writer: FramedWrite<SerialStream, OptoMotorCodec>,
}

impl OptoMotorInterface {
    pub fn open(port: Option<&str>) -> Result<Self> {
        let stream = open_serial(port, OPTOMOTOR_BAUD_RATE)?;
        Ok(Self {
            writer: FramedWrite::new(stream, OptoMotorCodec),
        })
    }
}

impl Interface for OptoMotorInterface {
    fn name(&self) -> &'static str {
        "opto_motor"
    }

    fn send<'a>(&'a mut self, instruction: &'a Instruction) -> BoxFuture<'a, Result<()>> {
        async move {
            match *instruction {
                Instruction::Pulse {
                    channel,
                    duration_ms,
                    intensity,
                } => {
                    self.writer
                        .send(PulseCommand {
                            channel,
                            duration_ms,
                            intensity,
                        })
                        .await
                }
                _ => Err(Error::Unsupported {
                    interface: "opto_motor",
                    instruction: instruction.clone(),
                }),
            }
        }
        .boxed()
    }
}

/// GPIO lines exported through sysfs.
#[derive(Debug, Clone)]
pub struct GpioInterface {
    pins: Vec<GpioPin>,
    sysfs_root: PathBuf,
}

impl GpioInterface {
    pub fn new(pins: Vec<GpioPin>, sysfs_root: PathBuf) -> Self {
        Self { pins, sysfs_root }
    }

    fn value_path(&self, channel: u32) -> Result<PathBuf> {
        let pin = self
            .pins
            .iter()
            .find(|p| p.channel == channel)
            .ok_or(Error::UnknownChannel { channel })?;
        Ok(self
            .sysfs_root
            .join(format!("gpio{}", pin.pin))
            .join("value"))
    }
}

impl Interface for GpioInterface {
    fn name(&self) -> &'static str {
        "gpio"
    }

    fn send<'a>(&'a mut self, instruction: &'a Instruction) -> BoxFuture<'a, Result<()>> {
        async move {
            let Instruction::Gpio {
                channel,
                duration_ms,
            } = *instruction
            else {
                return Err(Error::Unsupported {
                    interface: "gpio",
                    instruction: instruction.clone(),
                });
            };
            let path = self.value_path(channel)?;
            tokio::fs::write(&path, b"1").await?;
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
            tokio::fs::write(&path, b"0").await?;
            Ok(())
        }
        .boxed()
    }
}
