use std::sync::{Arc, Mutex};

use ethoscope_hardware::{
    GpioPin, HardwareConfig, HardwareConnection, Instruction, Interface, Result,
};
use futures::{FutureExt, future::BoxFuture};

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<Instruction>>>,
}

impl Interface for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    fn send<'a>(&'a mut self, instruction: &'a Instruction) -> BoxFuture<'a, Result<()>> {
        self.seen.lock().unwrap().push(instruction.clone());
        futures::future::ready(Ok(())).boxed()
    }
}

fn servo(channel: u32) -> Instruction {
    Instruction::Servo { channel, dt_ms: 0 }
}

#[test_log::test]
fn executes_in_order_and_drains_on_stop() {
    let recorder = Recorder::default();
    let mut conn = HardwareConnection::with_interface(Box::new(recorder.clone()), 16).unwrap();
    assert_eq!(conn.interface_name(), "recorder");

    let handle = conn.handle();
    for channel in 1..=5 {
        handle.send_instruction(servo(channel));
    }
    conn.stop();

    let seen = recorder.seen.lock().unwrap().clone();
    assert_eq!(seen, (1..=5).map(servo).collect::<Vec<_>>());

    // the worker is gone: this is logged and dropped
    handle.send_instruction(servo(6));
    assert_eq!(recorder.seen.lock().unwrap().len(), 5);
}

#[test]
fn default_interface_accepts_everything() {
    let conn = HardwareConnection::open(HardwareConfig::Default, 4).unwrap();
    assert_eq!(conn.interface_name(), "default");
    conn.handle().send_instruction(Instruction::Pulse {
        channel: 1,
        duration_ms: 10,
        intensity: 1000,
    });
    drop(conn);
}

#[test]
fn gpio_interface_toggles_the_value_file() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("gpio17")).unwrap();
    let cfg = HardwareConfig::Gpio {
        pins: vec![GpioPin {
            channel: 2,
            pin: 17,
        }],
        sysfs_root: root.path().to_path_buf(),
    };
    let mut conn = HardwareConnection::open(cfg, 4).unwrap();
    conn.handle().send_instruction(Instruction::Gpio {
        channel: 2,
        duration_ms: 5,
    });
    // no pin for this channel: logged by the worker
    conn.handle().send_instruction(Instruction::Gpio {
        channel: 9,
        duration_ms: 5,
    });
    conn.stop();

    let value = std::fs::read_to_string(root.path().join("gpio17").join("value")).unwrap();
    assert_eq!(value, "0");
}
