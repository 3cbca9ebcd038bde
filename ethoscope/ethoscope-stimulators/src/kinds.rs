use ethoscope_hardware::InstructionKind;
use ethoscope_schedule::{DailyScheduler, Scheduler};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{Error, MultiStimulator, ParameterDescription, Result, Stimulate, Stimulator};

/// Which hardware channel serves the animal in ROI `roi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoiChannel {
    pub roi: u32,
    pub channel: u32,
}

fn channel_map(pairs: &[(u32, u32)]) -> Vec<RoiChannel> {
    pairs
        .iter()
        .map(|&(roi, channel)| RoiChannel { roi, channel })
        .collect()
}

pub(crate) fn lookup_channel(map: &[RoiChannel], roi: u32) -> Option<u32> {
    map.iter().find(|rc| rc.roi == roi).map(|rc| rc.channel)
}

// One servo per tube of the 10x2 arena, odd ROIs on the left, even ones
// from 12 on the right.
fn default_servo_channels() -> Vec<RoiChannel> {
    channel_map(&[
        (1, 1),
        (3, 2),
        (5, 3),
        (7, 4),
        (9, 5),
        (12, 6),
        (14, 7),
        (16, 8),
        (18, 9),
        (20, 10),
    ])
}

fn default_opto_channels() -> Vec<RoiChannel> {
    channel_map(&[
        (1, 1),
        (3, 3),
        (5, 5),
        (7, 7),
        (9, 9),
        (12, 23),
        (14, 21),
        (16, 19),
        (18, 17),
        (20, 15),
    ])
}

fn default_moto_channels() -> Vec<RoiChannel> {
    channel_map(&[
        (1, 0),
        (3, 2),
        (5, 4),
        (7, 6),
        (9, 8),
        (12, 22),
        (14, 20),
        (16, 18),
        (18, 16),
        (20, 14),
    ])
}

fn default_velocity_correction_coef() -> f64 {
    3.0e-3
}

fn default_min_inactive_time() -> f64 {
    120.0
}

fn default_probability() -> f64 {
    1.0
}

fn default_servo_dt() -> u64 {
    350
}

fn default_pulse_duration() -> u64 {
    1000
}

fn default_stimulus_type() -> u8 {
    2
}

fn default_intensity() -> u32 {
    1000
}

fn default_refractory_period() -> f64 {
    60.0
}

fn default_daily_duration_hours() -> f64 {
    8.0
}

fn default_interval_hours() -> f64 {
    24.0
}

fn default_daily_start_time() -> String {
    "09:00:00".into()
}

/// What a servo-style stimulator drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actuator {
    #[default]
    Servo,
    /// Hold the channel's GPIO line high for `servo_dt` milliseconds.
    Gpio,
}

impl Actuator {
    pub fn instruction_kind(self) -> InstructionKind {
        match self {
            Self::Servo => InstructionKind::Servo,
            Self::Gpio => InstructionKind::Gpio,
        }
    }
}

/// Servo sleep deprivation of animals that stay still too long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SleepDepriverParams {
    /// Movement threshold on the per-frame displacement.
    #[serde(default = "default_velocity_correction_coef")]
    pub velocity_correction_coef: f64,
    /// Seconds of immobility before the animal is disturbed.
    #[serde(default = "default_min_inactive_time")]
    pub min_inactive_time: f64,
    #[serde(default = "default_probability")]
    pub stimulus_probability: f64,
    /// Milliseconds per servo stroke or GPIO pulse.
    #[serde(default = "default_servo_dt")]
    pub servo_dt: u64,
    #[serde(default)]
    pub actuator: Actuator,
    #[serde(default = "default_servo_channels")]
    pub channels: Vec<RoiChannel>,
}

impl Default for SleepDepriverParams {
    fn default() -> Self {
        Self {
            velocity_correction_coef: default_velocity_correction_coef(),
            min_inactive_time: default_min_inactive_time(),
            stimulus_probability: default_probability(),
            servo_dt: default_servo_dt(),
            actuator: Actuator::Servo,
            channels: default_servo_channels(),
        }
    }
}

/// Sleep deprivation with light (opto) or vibration (moto) pulses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptomotorParams {
    #[serde(default = "default_velocity_correction_coef")]
    pub velocity_correction_coef: f64,
    #[serde(default = "default_min_inactive_time")]
    pub min_inactive_time: f64,
    #[serde(default = "default_probability")]
    pub stimulus_probability: f64,
    /// Milliseconds.
    #[serde(default = "default_pulse_duration")]
    pub pulse_duration: u64,
    /// 1 for opto, 2 for moto.
    #[serde(default = "default_stimulus_type")]
    pub stimulus_type: u8,
    /// PWM duty cycle, 0 to 1000.
    #[serde(default = "default_intensity")]
    pub intensity: u32,
    #[serde(default = "default_opto_channels")]
    pub opto_channels: Vec<RoiChannel>,
    #[serde(default = "default_moto_channels")]
    pub moto_channels: Vec<RoiChannel>,
}

impl Default for OptomotorParams {
    fn default() -> Self {
        Self {
            velocity_correction_coef: default_velocity_correction_coef(),
            min_inactive_time: default_min_inactive_time(),
            stimulus_probability: default_probability(),
            pulse_duration: default_pulse_duration(),
            stimulus_type: default_stimulus_type(),
            intensity: default_intensity(),
            opto_channels: default_opto_channels(),
            moto_channels: default_moto_channels(),
        }
    }
}

impl OptomotorParams {
    pub fn channels(&self) -> &[RoiChannel] {
        if self.stimulus_type == 1 {
            &self.opto_channels
        } else {
            &self.moto_channels
        }
    }
}

/// Disturbs the animal when it crosses the middle of its tube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MiddleCrossingParams {
    #[serde(default = "default_probability")]
    pub stimulus_probability: f64,
    /// Seconds after a crossing during which no new one is considered.
    #[serde(default = "default_refractory_period")]
    pub refractory_period: f64,
    #[serde(default = "default_servo_dt")]
    pub servo_dt: u64,
    #[serde(default)]
    pub actuator: Actuator,
    #[serde(default = "default_servo_channels")]
    pub channels: Vec<RoiChannel>,
}

impl Default for MiddleCrossingParams {
    fn default() -> Self {
        Self {
            stimulus_probability: default_probability(),
            refractory_period: default_refractory_period(),
            servo_dt: default_servo_dt(),
            actuator: Actuator::Servo,
            channels: default_servo_channels(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StimulatorKind {
    /// Never interacts.
    #[default]
    Default,
    SleepDepriver(SleepDepriverParams),
    OptomotorSleepDepriver(OptomotorParams),
    MiddleCrossing(MiddleCrossingParams),
    /// Several stimulators, each with its own date range. The first one
    /// whose range is open decides.
    Multi { sequence: Vec<StimulatorConfig> },
}

impl StimulatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::SleepDepriver(_) => "sleep_depriver",
            Self::OptomotorSleepDepriver(_) => "optomotor_sleep_depriver",
            Self::MiddleCrossing(_) => "middle_crossing",
            Self::Multi { .. } => "multi",
        }
    }

    /// Parameter metadata of this kind.
    pub fn describe(&self) -> &'static [ParameterDescription] {
        crate::describe(self.name()).map_or(&[], |d| d.arguments)
    }

    pub fn overview(&self) -> &'static str {
        crate::describe(self.name()).map_or("", |d| d.overview)
    }

    /// The instructions this kind sends. `None` for kinds that never
    /// touch the hardware and for sequences.
    pub fn instruction_kind(&self) -> Option<InstructionKind> {
        match self {
            Self::Default | Self::Multi { .. } => None,
            Self::SleepDepriver(p) => Some(p.actuator.instruction_kind()),
            Self::OptomotorSleepDepriver(_) => Some(InstructionKind::Pulse),
            Self::MiddleCrossing(p) => Some(p.actuator.instruction_kind()),
        }
    }
}

/// A window recurring every `interval_hours`, restarting each day at
/// `daily_start_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DailySchedule {
    #[serde(default = "default_daily_duration_hours")]
    pub daily_duration_hours: f64,
    #[serde(default = "default_interval_hours")]
    pub interval_hours: f64,
    /// `HH:MM:SS`, local time.
    #[serde(default = "default_daily_start_time")]
    pub daily_start_time: String,
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self {
            daily_duration_hours: default_daily_duration_hours(),
            interval_hours: default_interval_hours(),
            daily_start_time: default_daily_start_time(),
        }
    }
}

impl DailySchedule {
    pub fn scheduler(&self) -> Result<DailyScheduler> {
        Ok(DailyScheduler::new(
            self.daily_duration_hours,
            self.interval_hours,
            &self.daily_start_time,
        )?)
    }
}

/// A stimulator kind with the date range it is active in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StimulatorConfig {
    /// Comma separated `start > end` windows. Empty means always.
    #[serde(default)]
    pub date_range: String,
    /// Further restricts stimulation to a daily window. Children of a
    /// sequence without their own inherit the sequence's.
    #[serde(default)]
    pub daily_schedule: Option<DailySchedule>,
    #[serde(default)]
    pub kind: StimulatorKind,
}

fn check_probability(value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Probability {
            name: "stimulus_probability",
            value,
        })
    }
}

impl StimulatorConfig {
    /// Check parameters and date ranges, including those of a sequence.
    pub fn validate(&self) -> Result<()> {
        self.scheduler()?;
        self.daily_scheduler()?;
        match &self.kind {
            StimulatorKind::Default => {}
            StimulatorKind::SleepDepriver(p) => check_probability(p.stimulus_probability)?,
            StimulatorKind::OptomotorSleepDepriver(p) => {
                check_probability(p.stimulus_probability)?;
                if !matches!(p.stimulus_type, 1 | 2) {
                    return Err(Error::StimulusType(p.stimulus_type));
                }
            }
            StimulatorKind::MiddleCrossing(p) => check_probability(p.stimulus_probability)?,
            StimulatorKind::Multi { sequence } => {
                for child in sequence {
                    if matches!(child.kind, StimulatorKind::Multi { .. }) {
                        return Err(Error::NestedSequence);
                    }
                    child.validate()?;
                }
            }
        }
        Ok(())
    }

    pub fn scheduler(&self) -> Result<Scheduler> {
        Ok(Scheduler::parse(&self.date_range)?)
    }

    pub fn daily_scheduler(&self) -> Result<Option<DailyScheduler>> {
        self.daily_schedule
            .as_ref()
            .map(DailySchedule::scheduler)
            .transpose()
    }

    /// A stimulator for one ROI, with an entropy-seeded random source.
    pub fn build(&self) -> Result<Box<dyn Stimulate>> {
        self.build_with(&mut || StdRng::from_os_rng())
    }

    /// Like [Self::build], with a reproducible random source.
    pub fn build_seeded(&self, seed: u64) -> Result<Box<dyn Stimulate>> {
        let mut next = seed;
        self.build_with(&mut || {
            let rng = StdRng::seed_from_u64(next);
            next = next.wrapping_add(1);
            rng
        })
    }

    fn build_with(&self, make_rng: &mut dyn FnMut() -> StdRng) -> Result<Box<dyn Stimulate>> {
        self.validate()?;
        match &self.kind {
            StimulatorKind::Multi { sequence } => {
                let children = sequence
                    .iter()
                    .map(|child| match (&child.daily_schedule, &self.daily_schedule) {
                        (None, Some(inherited)) => {
                            let child = StimulatorConfig {
                                daily_schedule: Some(inherited.clone()),
                                ..child.clone()
                            };
                            Stimulator::new(&child, make_rng())
                        }
                        _ => Stimulator::new(child, make_rng()),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Box::new(MultiStimulator::new(children)))
            }
            _ => Ok(Box::new(Stimulator::new(self, make_rng())?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_from_toml() {
        let cfg: StimulatorConfig = toml::from_str(
            r#"
            date_range = ""
            [kind]
            type = "optomotor_sleep_depriver"
            stimulus_type = 1
            "#,
        )
        .unwrap();
        let StimulatorKind::OptomotorSleepDepriver(p) = &cfg.kind else {
            panic!("wrong kind {:?}", cfg.kind);
        };
        assert_eq!(p.pulse_duration, 1000);
        assert_eq!(lookup_channel(p.channels(), 12), Some(23));
        cfg.validate().unwrap();

        let cfg: StimulatorConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.kind, StimulatorKind::Default);
    }

    #[test]
    fn invalid_parameters() {
        let cfg = StimulatorConfig {
            kind: StimulatorKind::SleepDepriver(SleepDepriverParams {
                stimulus_probability: 1.5,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Probability { .. })));

        let cfg = StimulatorConfig {
            kind: StimulatorKind::OptomotorSleepDepriver(OptomotorParams {
                stimulus_type: 3,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(Error::StimulusType(3)));

        let nested = StimulatorConfig {
            kind: StimulatorKind::Multi {
                sequence: vec![StimulatorConfig {
                    kind: StimulatorKind::Multi { sequence: vec![] },
                    ..Default::default()
                }],
            },
            ..Default::default()
        };
        assert_eq!(nested.validate(), Err(Error::NestedSequence));

        let bad_range = StimulatorConfig {
            date_range: "2020-01-01 00:00:00".into(),
            ..Default::default()
        };
        assert!(matches!(bad_range.validate(), Err(Error::Schedule(_))));

        let bad_daily = StimulatorConfig {
            daily_schedule: Some(DailySchedule {
                daily_duration_hours: 12.0,
                interval_hours: 8.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(bad_daily.validate(), Err(Error::Schedule(_))));
    }

    #[test]
    fn daily_schedule_and_actuator_from_toml() {
        let cfg: StimulatorConfig = toml::from_str(
            r#"
            [daily_schedule]
            daily_duration_hours = 4.0
            interval_hours = 12.0
            [kind]
            type = "middle_crossing"
            actuator = "gpio"
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.daily_schedule,
            Some(DailySchedule {
                daily_duration_hours: 4.0,
                interval_hours: 12.0,
                daily_start_time: "09:00:00".into(),
            })
        );
        assert_eq!(cfg.kind.instruction_kind(), Some(InstructionKind::Gpio));
        cfg.validate().unwrap();
        assert!(cfg.daily_scheduler().unwrap().is_some());

        let written = toml::to_string(&cfg).unwrap();
        assert_eq!(toml::from_str::<StimulatorConfig>(&written).unwrap(), cfg);
    }
}
