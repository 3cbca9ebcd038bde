//! Per-kind decision rules.

use ethoscope_hardware::Instruction;
use ethoscope_types::{DataPoint, VariableKind};
use rand::{Rng, rngs::StdRng};

use crate::{
    Actuator, Error, Interaction, Result, RoiChannel, StimulatorKind, TrackingContext,
    kinds::lookup_channel,
};

pub(crate) type Decision = (Interaction, Option<Instruction>);

const NOTHING: Decision = (Interaction::None, None);

/// What a sleep depriver does to the animal once it decides to act.
#[derive(Debug, Clone, Copy)]
enum Action {
    Servo { dt_ms: u64 },
    Pulse { duration_ms: u64, intensity: u32 },
    Gpio { duration_ms: u64 },
}

impl Action {
    fn actuate(actuator: Actuator, dt_ms: u64) -> Self {
        match actuator {
            Actuator::Servo => Self::Servo { dt_ms },
            Actuator::Gpio => Self::Gpio { duration_ms: dt_ms },
        }
    }

    fn instruction(self, channel: u32) -> Instruction {
        match self {
            Self::Servo { dt_ms } => Instruction::Servo { channel, dt_ms },
            Self::Pulse {
                duration_ms,
                intensity,
            } => Instruction::Pulse {
                channel,
                duration_ms,
                intensity,
            },
            Self::Gpio { duration_ms } => Instruction::Gpio {
                channel,
                duration_ms,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SleepDeprivation {
    velocity_correction_coef: f64,
    min_inactive_ms: u64,
    probability: f64,
    channels: Vec<RoiChannel>,
    action: Action,
    /// Start of the current immobility bout.
    t0: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct MiddleCrossing {
    probability: f64,
    refractory_ms: u64,
    action: Action,
    channels: Vec<RoiChannel>,
    last_stimulus_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) enum Decider {
    Never,
    SleepDeprivation(SleepDeprivation),
    MiddleCrossing(MiddleCrossing),
}

fn seconds_to_ms(s: f64) -> u64 {
    (s.max(0.0) * 1000.0).round() as u64
}

impl Decider {
    /// `kind` must not be a sequence.
    pub(crate) fn new(kind: &StimulatorKind) -> Self {
        match kind {
            StimulatorKind::Default | StimulatorKind::Multi { .. } => Self::Never,
            StimulatorKind::SleepDepriver(p) => Self::SleepDeprivation(SleepDeprivation {
                velocity_correction_coef: p.velocity_correction_coef,
                min_inactive_ms: seconds_to_ms(p.min_inactive_time),
                probability: p.stimulus_probability,
                channels: p.channels.clone(),
                action: Action::actuate(p.actuator, p.servo_dt),
                t0: None,
            }),
            StimulatorKind::OptomotorSleepDepriver(p) => {
                Self::SleepDeprivation(SleepDeprivation {
                    velocity_correction_coef: p.velocity_correction_coef,
                    min_inactive_ms: seconds_to_ms(p.min_inactive_time),
                    probability: p.stimulus_probability,
                    channels: p.channels().to_vec(),
                    action: Action::Pulse {
                        duration_ms: p.pulse_duration,
                        intensity: p.intensity,
                    },
                    t0: None,
                })
            }
            StimulatorKind::MiddleCrossing(p) => Self::MiddleCrossing(MiddleCrossing {
                probability: p.stimulus_probability,
                refractory_ms: seconds_to_ms(p.refractory_period),
                action: Action::actuate(p.actuator, p.servo_dt),
                channels: p.channels.clone(),
                last_stimulus_ms: None,
            }),
        }
    }

    pub(crate) fn decide(&mut self, ctx: &TrackingContext<'_>, rng: &mut StdRng) -> Result<Decision> {
        match self {
            Self::Never => Ok(NOTHING),
            Self::SleepDeprivation(d) => d.decide(ctx, rng),
            Self::MiddleCrossing(d) => d.decide(ctx, rng),
        }
    }
}

/// The only animal of the newest history entry.
fn single_animal<'a>(ctx: &TrackingContext<'_>, points: &'a [DataPoint]) -> Result<&'a DataPoint> {
    match points {
        [point] => Ok(point),
        _ => Err(Error::MultipleAnimals {
            roi: ctx.roi.idx(),
            n: points.len(),
        }),
    }
}

/// Whether the animal moved on the latest frame.
///
/// An animal not seen on the latest frame is taken as still.
pub(crate) fn has_moved(ctx: &TrackingContext<'_>, velocity_correction_coef: f64) -> Result<bool> {
    let entries = ctx.history.entries();
    if entries.len() < 2 {
        return Ok(false);
    }
    let Some((t_last, points)) = entries.back() else {
        return Ok(false);
    };
    let point = single_animal(ctx, points)?;
    if ctx.history.last_time_point() != Some(*t_last) {
        return Ok(false);
    }
    let Some(xy_dist) = point.get(VariableKind::XyDistance) else {
        return Ok(false);
    };
    let dist = 10f64.powf(xy_dist as f64 / 1000.0);
    Ok(dist / velocity_correction_coef > 1.0)
}

impl SleepDeprivation {
    fn decide(&mut self, ctx: &TrackingContext<'_>, rng: &mut StdRng) -> Result<Decision> {
        let Some(now) = ctx.history.last_time_point() else {
            return Ok(NOTHING);
        };
        let Some(channel) = lookup_channel(&self.channels, ctx.roi.idx()) else {
            return Ok(NOTHING);
        };
        let moved = has_moved(ctx, self.velocity_correction_coef)?;
        let t0 = *self.t0.get_or_insert(now);
        if moved {
            self.t0 = Some(now);
            return Ok(NOTHING);
        }
        if now.saturating_sub(t0) <= self.min_inactive_ms {
            return Ok(NOTHING);
        }
        self.t0 = None;
        if rng.random::<f64>() <= self.probability {
            Ok((Interaction::Real, Some(self.action.instruction(channel))))
        } else {
            Ok((Interaction::Ghost, None))
        }
    }
}

impl MiddleCrossing {
    fn decide(&mut self, ctx: &TrackingContext<'_>, rng: &mut StdRng) -> Result<Decision> {
        let Some(now) = ctx.history.last_time_point() else {
            return Ok(NOTHING);
        };
        if let Some(last) = self.last_stimulus_ms {
            if now.saturating_sub(last) < self.refractory_ms {
                return Ok(NOTHING);
            }
        }
        let Some(channel) = lookup_channel(&self.channels, ctx.roi.idx()) else {
            return Ok(NOTHING);
        };
        let entries = ctx.history.entries();
        let n = entries.len();
        if n < 2 {
            return Ok(NOTHING);
        }
        let current = single_animal(ctx, &entries[n - 1].1)?;
        let previous = single_animal(ctx, &entries[n - 2].1)?;
        let axis = ctx.roi.longest_axis() as f64;
        let (Some(x1), Some(x0)) = (current.get(VariableKind::X), previous.get(VariableKind::X))
        else {
            return Ok(NOTHING);
        };
        let side = |x: i32| x as f64 / axis - 0.5 > 0.0;
        if side(x0) == side(x1) {
            return Ok(NOTHING);
        }
        self.last_stimulus_ms = Some(now);
        if rng.random::<f64>() < self.probability {
            Ok((Interaction::Real, Some(self.action.instruction(channel))))
        } else {
            Ok((Interaction::Ghost, None))
        }
    }
}
