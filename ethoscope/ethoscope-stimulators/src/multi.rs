use chrono::NaiveDateTime;
use ethoscope_hardware::{HardwareHandle, Instruction};
use tracing::debug;

use crate::{Interaction, Stimulate, Stimulator, StimulatorState, TrackingContext};

/// Runs whichever child stimulator is scheduled.
///
/// When ranges overlap, the child listed first wins.
pub struct MultiStimulator {
    children: Vec<Stimulator>,
    active: Option<usize>,
}

impl MultiStimulator {
    pub fn new(children: Vec<Stimulator>) -> Self {
        Self {
            children,
            active: None,
        }
    }

    pub fn children(&self) -> &[Stimulator] {
        &self.children
    }

    /// Index of the child that decided on the latest frame.
    pub fn active_child(&self) -> Option<usize> {
        self.active
    }

    fn scheduled_child(&self, wall_clock: NaiveDateTime) -> Option<usize> {
        self.children
            .iter()
            .position(|child| child.is_scheduled(wall_clock))
    }
}

impl Stimulate for MultiStimulator {
    fn apply(
        &mut self,
        ctx: &TrackingContext<'_>,
        wall_clock: NaiveDateTime,
    ) -> (Interaction, Option<Instruction>) {
        let active = self.scheduled_child(wall_clock);
        if active != self.active {
            debug!("ROI {}: active stimulator now {active:?}", ctx.roi.idx());
            self.active = active;
        }
        match active {
            Some(i) => self.children[i].apply(ctx, wall_clock),
            None => (Interaction::None, None),
        }
    }

    fn state(&self, wall_clock: NaiveDateTime, t_ms: u64) -> StimulatorState {
        match self.scheduled_child(wall_clock) {
            Some(i) => self.children[i].state(wall_clock, t_ms),
            None => StimulatorState::Inactive,
        }
    }

    fn bind_hardware(&mut self, hardware: HardwareHandle) {
        for child in &mut self.children {
            child.bind_hardware(hardware.clone());
        }
    }

    fn last_interaction(&self) -> Option<(u64, Interaction)> {
        self.children
            .iter()
            .filter_map(|child| child.last_interaction())
            .max_by_key(|(t, _)| *t)
    }
}
