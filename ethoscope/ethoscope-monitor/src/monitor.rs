use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use ethoscope_hardware::HardwareConnection;
use ethoscope_types::DataPoint;
use tracing::{debug, info};

use crate::{Drawer, Error, FrameSource, ResultWriter, Result, TrackingUnit};

/// Requests the [Monitor] to stop after the current frame.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Monitor {
    source: Box<dyn FrameSource>,
    units: Vec<TrackingUnit>,
    hardware: Vec<HardwareConnection>,
    stop: StopHandle,
    frame_count: u64,
    last_positions: BTreeMap<u32, Vec<DataPoint>>,
}

impl Monitor {
    pub fn new(source: Box<dyn FrameSource>, units: Vec<TrackingUnit>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for unit in &units {
            if !seen.insert(unit.roi().idx()) {
                return Err(Error::DuplicateRoi(unit.roi().idx()));
            }
        }
        Ok(Self {
            source,
            units,
            hardware: Vec::new(),
            stop: StopHandle::default(),
            frame_count: 0,
            last_positions: BTreeMap::new(),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Route the instructions of every stimulator to `connection`, which is
    /// stopped when the run ends.
    pub fn attach_hardware(&mut self, connection: HardwareConnection) {
        let handle = connection.handle();
        for unit in &mut self.units {
            unit.bind_hardware(handle.clone());
        }
        self.hardware.push(connection);
    }

    pub fn units(&self) -> &[TrackingUnit] {
        &self.units
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Absolute positions of the latest frame, per ROI id.
    pub fn last_positions(&self) -> &BTreeMap<u32, Vec<DataPoint>> {
        &self.last_positions
    }

    /// Process frames until the source ends, a stop is requested or a fatal
    /// error occurs. Hardware is released in every case.
    pub fn run(
        &mut self,
        writer: &mut dyn ResultWriter,
        drawer: Option<&mut dyn Drawer>,
    ) -> Result<()> {
        info!("monitor started with {} ROIs", self.units.len());
        let result = self.run_frames(writer, drawer);
        let closed = writer.close();
        for mut connection in self.hardware.drain(..) {
            connection.stop();
        }
        info!("monitor stopped after {} frames", self.frame_count);
        result.and(closed)
    }

    fn run_frames(
        &mut self,
        writer: &mut dyn ResultWriter,
        mut drawer: Option<&mut dyn Drawer>,
    ) -> Result<()> {
        while !self.stop.is_stopped() {
            let Some(frame) = self.source.next_frame()? else {
                debug!("frame source ended");
                break;
            };
            for unit in &mut self.units {
                let mut points = unit.track(frame.t_ms, &frame.image)?;
                if unit.has_stimulator() {
                    let interaction = unit.stimulate(frame.wall_clock).to_variable();
                    for point in &mut points {
                        point.set(interaction);
                    }
                }
                if !points.is_empty() {
                    writer.write(frame.t_ms, unit.roi(), &points)?;
                }
                self.last_positions
                    .insert(unit.roi().idx(), unit.last_positions().to_vec());
            }
            writer.flush(frame.t_ms, &frame)?;
            if let Some(drawer) = drawer.as_mut() {
                drawer.draw(&frame, &self.last_positions, &self.units)?;
            }
            self.frame_count += 1;
        }
        Ok(())
    }
}
