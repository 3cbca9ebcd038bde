use chrono::NaiveDateTime;
use ethoscope_hardware::HardwareHandle;
use ethoscope_stimulators::{Interaction, Stimulate, StimulatorState, TrackingContext};
use ethoscope_tracker::{PositionHistory, Tracker};
use ethoscope_types::{DataPoint, Roi};
use image::GrayImage;

use crate::Result;

/// Everything that belongs to one ROI: its tracker, its trajectory and its
/// stimulator.
pub struct TrackingUnit {
    roi: Roi,
    tracker: Box<dyn Tracker>,
    history: PositionHistory,
    stimulator: Option<Box<dyn Stimulate>>,
    last_absolute: Vec<DataPoint>,
}

impl TrackingUnit {
    pub fn new(
        roi: Roi,
        tracker: Box<dyn Tracker>,
        history: PositionHistory,
        stimulator: Option<Box<dyn Stimulate>>,
    ) -> Self {
        Self {
            roi,
            tracker,
            history,
            stimulator,
            last_absolute: Vec::new(),
        }
    }

    pub fn roi(&self) -> &Roi {
        &self.roi
    }

    pub fn history(&self) -> &PositionHistory {
        &self.history
    }

    pub fn has_stimulator(&self) -> bool {
        self.stimulator.is_some()
    }

    /// Track the animal on `frame`. Points are relative to the ROI.
    ///
    /// A frame without a position is absorbed here; only an ROI that does
    /// not fit the frame is an error.
    pub fn track(&mut self, t_ms: u64, frame: &GrayImage) -> Result<Vec<DataPoint>> {
        let (crop, mask) = self.roi.apply(frame)?;
        let outcome = self.tracker.find_position(&crop, &mask, t_ms);
        let points = self.history.record(t_ms, outcome);
        self.last_absolute = points.iter().map(|p| p.to_absolute(&self.roi)).collect();
        Ok(points)
    }

    /// Let the stimulator decide on the latest tracked frame.
    pub fn stimulate(&mut self, wall_clock: NaiveDateTime) -> Interaction {
        let Some(stimulator) = self.stimulator.as_mut() else {
            return Interaction::None;
        };
        let ctx = TrackingContext {
            roi: &self.roi,
            history: &self.history,
        };
        stimulator.apply(&ctx, wall_clock).0
    }

    pub fn stimulator_state(&self, wall_clock: NaiveDateTime, t_ms: u64) -> Option<StimulatorState> {
        self.stimulator
            .as_ref()
            .map(|s| s.state(wall_clock, t_ms))
    }

    pub fn bind_hardware(&mut self, hardware: HardwareHandle) {
        if let Some(stimulator) = self.stimulator.as_mut() {
            stimulator.bind_hardware(hardware);
        }
    }

    /// Points of the latest frame in frame coordinates.
    pub fn last_positions(&self) -> &[DataPoint] {
        &self.last_absolute
    }
}
