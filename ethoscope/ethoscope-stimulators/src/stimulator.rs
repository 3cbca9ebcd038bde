use chrono::NaiveDateTime;
use ethoscope_hardware::{HardwareHandle, Instruction};
use ethoscope_schedule::{DailyScheduler, Scheduler};
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::{
    Interaction, Result, Stimulate, StimulatorConfig, StimulatorState, TrackingContext,
    decide::Decider,
};

const STIMULATING_WINDOW_MS: u64 = 2000;

/// One stimulation rule, gated by its date range and optional daily window.
pub struct Stimulator {
    name: &'static str,
    scheduler: Scheduler,
    daily: Option<DailyScheduler>,
    decider: Decider,
    hardware: Option<HardwareHandle>,
    rng: StdRng,
    last_interaction: Option<(u64, Interaction)>,
}

impl Stimulator {
    pub fn new(cfg: &StimulatorConfig, rng: StdRng) -> Result<Self> {
        Ok(Self {
            name: cfg.kind.name(),
            scheduler: cfg.scheduler()?,
            daily: cfg.daily_scheduler()?,
            decider: Decider::new(&cfg.kind),
            hardware: None,
            rng,
            last_interaction: None,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn daily_scheduler(&self) -> Option<&DailyScheduler> {
        self.daily.as_ref()
    }

    pub fn is_scheduled(&self, wall_clock: NaiveDateTime) -> bool {
        self.scheduler.in_range(wall_clock)
            && self
                .daily
                .as_ref()
                .is_none_or(|daily| daily.is_active_period(wall_clock))
    }

    /// Queue the instruction of a real interaction and remember when any
    /// interaction happened.
    fn record(
        &mut self,
        roi: u32,
        t_ms: u64,
        interaction: Interaction,
        instruction: Option<&Instruction>,
    ) {
        match (interaction, instruction) {
            (Interaction::None, _) => return,
            (Interaction::Real, Some(instruction)) => {
                info!("{}: stimulating ROI {roi} with {instruction:?}", self.name);
                if let Some(hardware) = &self.hardware {
                    hardware.send_instruction(instruction.clone());
                }
            }
            (Interaction::Real, None) => {
                warn!("{}: real stimulation of ROI {roi} produced no instruction", self.name);
            }
            (Interaction::Ghost, _) => {
                info!("{}: ghost stimulation of ROI {roi}", self.name);
            }
        }
        self.last_interaction = Some((t_ms, interaction));
    }
}

impl Stimulate for Stimulator {
    fn apply(
        &mut self,
        ctx: &TrackingContext<'_>,
        wall_clock: NaiveDateTime,
    ) -> (Interaction, Option<Instruction>) {
        if !self.is_scheduled(wall_clock) {
            return (Interaction::None, None);
        }
        let (interaction, instruction) = match self.decider.decide(ctx, &mut self.rng) {
            Ok(decision) => decision,
            Err(e) => {
                warn!("{} on ROI {}: {e}", self.name, ctx.roi.idx());
                return (Interaction::None, None);
            }
        };

        let t_ms = ctx.history.last_time_point().unwrap_or_default();
        self.record(ctx.roi.idx(), t_ms, interaction, instruction.as_ref());
        (interaction, instruction)
    }

    fn state(&self, wall_clock: NaiveDateTime, t_ms: u64) -> StimulatorState {
        if !self.is_scheduled(wall_clock) {
            return StimulatorState::Inactive;
        }
        match self.last_interaction {
            Some((t, _)) if t_ms.saturating_sub(t) <= STIMULATING_WINDOW_MS => {
                StimulatorState::Stimulating
            }
            _ => StimulatorState::Scheduled,
        }
    }

    fn bind_hardware(&mut self, hardware: HardwareHandle) {
        self.hardware = Some(hardware);
    }

    fn last_interaction(&self) -> Option<(u64, Interaction)> {
        self.last_interaction
    }
}
