// Copyright 2024-2026 the ethoscope-rs authors.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Closed-loop stimulation.
//!
//! A stimulator looks at the recent trajectory of one ROI after each frame
//! and decides whether to act on the animal. Decisions are gated by a date
//! range [Scheduler](ethoscope_schedule::Scheduler) and, optionally, a
//! [DailyScheduler](ethoscope_schedule::DailyScheduler). Real interactions are
//! queued on the bound hardware; ghost interactions are decisions whose
//! probability draw suppressed the hardware call.

mod decide;
mod describe;
mod kinds;
mod multi;
mod stimulator;

pub use describe::{
    ParameterDefault, ParameterDescription, StimulatorDescription, describe, describe_all,
};
pub use kinds::{
    Actuator, DailySchedule, MiddleCrossingParams, OptomotorParams, RoiChannel,
    SleepDepriverParams, StimulatorConfig, StimulatorKind,
};
pub use multi::MultiStimulator;
pub use stimulator::Stimulator;

use chrono::NaiveDateTime;
use ethoscope_hardware::{HardwareHandle, Instruction};
use ethoscope_tracker::PositionHistory;
use ethoscope_types::{Roi, Variable, VariableKind};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("schedule: {0}")]
    Schedule(#[from] ethoscope_schedule::Error),
    #[error("{name} must lie in [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
    #[error("stimulus_type must be 1 (opto) or 2 (moto), got {0}")]
    StimulusType(u8),
    #[error("stimulator sequences cannot be nested")]
    NestedSequence,
    #[error("ROI {roi} holds {n} animals, only one is supported")]
    MultipleAnimals { roi: u32, n: usize },
}

/// Outcome of one stimulation decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    #[default]
    None,
    Real,
    Ghost,
}

impl Interaction {
    pub fn value(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Real => 1,
            Self::Ghost => 2,
        }
    }

    pub fn to_variable(self) -> Variable {
        Variable::new(VariableKind::HasInteracted, self.value())
    }
}

/// What a stimulator may look at for one ROI.
#[derive(Debug, Clone, Copy)]
pub struct TrackingContext<'a> {
    pub roi: &'a Roi,
    pub history: &'a PositionHistory,
}

/// Coarse status for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulatorState {
    /// Outside the date range or the daily window.
    Inactive,
    /// Scheduled, nothing recent.
    Scheduled,
    /// Interacted within the last two seconds.
    Stimulating,
}

/// A configured stimulator bound to one ROI.
pub trait Stimulate: Send {
    /// Decide on the latest frame and queue any resulting instruction.
    fn apply(
        &mut self,
        ctx: &TrackingContext<'_>,
        wall_clock: NaiveDateTime,
    ) -> (Interaction, Option<Instruction>);

    fn state(&self, wall_clock: NaiveDateTime, t_ms: u64) -> StimulatorState;

    fn bind_hardware(&mut self, hardware: HardwareHandle);

    /// Time and value of the most recent interaction.
    fn last_interaction(&self) -> Option<(u64, Interaction)>;
}
