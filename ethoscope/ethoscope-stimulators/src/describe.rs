//! Parameter metadata for user interfaces.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterDefault {
    Number(f64),
    Text(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterDescription {
    pub name: &'static str,
    /// `number` or `date_range`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    pub default: ParameterDefault,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StimulatorDescription {
    pub name: &'static str,
    pub overview: &'static str,
    pub arguments: &'static [ParameterDescription],
}

const fn number(
    name: &'static str,
    min: f64,
    max: f64,
    step: f64,
    default: f64,
    description: &'static str,
) -> ParameterDescription {
    ParameterDescription {
        name,
        kind: "number",
        min: Some(min),
        max: Some(max),
        step: Some(step),
        default: ParameterDefault::Number(default),
        description,
    }
}

const DATE_RANGE: ParameterDescription = ParameterDescription {
    name: "date_range",
    kind: "date_range",
    min: None,
    max: None,
    step: None,
    default: ParameterDefault::Text(""),
    description: "Active time period",
};

const VELOCITY_CORRECTION_COEF: ParameterDescription = number(
    "velocity_correction_coef",
    0.0,
    1.0,
    0.0001,
    3.0e-3,
    "Velocity correction coef",
);

const MIN_INACTIVE_TIME: ParameterDescription = number(
    "min_inactive_time",
    1.0,
    43200.0,
    1.0,
    120.0,
    "The minimal time after which an inactive animal is awaken (s)",
);

const STIMULUS_PROBABILITY: ParameterDescription = number(
    "stimulus_probability",
    0.0,
    1.0,
    0.01,
    1.0,
    "Probability the stimulus will happen",
);

static DEFAULT_ARGS: [ParameterDescription; 1] = [DATE_RANGE];

static SLEEP_DEPRIVER_ARGS: [ParameterDescription; 4] = [
    VELOCITY_CORRECTION_COEF,
    MIN_INACTIVE_TIME,
    STIMULUS_PROBABILITY,
    DATE_RANGE,
];

static OPTOMOTOR_ARGS: [ParameterDescription; 6] = [
    VELOCITY_CORRECTION_COEF,
    MIN_INACTIVE_TIME,
    number(
        "pulse_duration",
        50.0,
        10000.0,
        50.0,
        1000.0,
        "For how long to deliver the stimulus (ms)",
    ),
    number("stimulus_type", 1.0, 2.0, 1.0, 2.0, "1 = opto, 2 = moto"),
    STIMULUS_PROBABILITY,
    DATE_RANGE,
];

static MIDDLE_CROSSING_ARGS: [ParameterDescription; 2] = [
    number(
        "stimulus_probability",
        0.0,
        1.0,
        0.1,
        1.0,
        "The probability to move the tube when a midline crossing was detected",
    ),
    DATE_RANGE,
];

static MULTI_ARGS: [ParameterDescription; 0] = [];

static DESCRIPTIONS: [StimulatorDescription; 5] = [
    StimulatorDescription {
        name: "default",
        overview: "No stimulation. Tracking only.",
        arguments: &DEFAULT_ARGS,
    },
    StimulatorDescription {
        name: "sleep_depriver",
        overview: "Sleep deprive an animal using a servo motor.",
        arguments: &SLEEP_DEPRIVER_ARGS,
    },
    StimulatorDescription {
        name: "optomotor_sleep_depriver",
        overview: "Sleep deprive an animal using light or vibration pulses.",
        arguments: &OPTOMOTOR_ARGS,
    },
    StimulatorDescription {
        name: "middle_crossing",
        overview: "Disturb animals as they cross the midline of their tube.",
        arguments: &MIDDLE_CROSSING_ARGS,
    },
    StimulatorDescription {
        name: "multi",
        overview: "A sequence of stimulators, each with its own date range.",
        arguments: &MULTI_ARGS,
    },
];

/// Metadata of every stimulator kind, in configuration order.
pub fn describe_all() -> &'static [StimulatorDescription] {
    &DESCRIPTIONS
}

/// Metadata of the stimulator kind called `name`.
pub fn describe(name: &str) -> Option<&'static StimulatorDescription> {
    DESCRIPTIONS.iter().find(|d| d.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_serialise() {
        let json = serde_json::to_value(describe_all()).unwrap();
        assert_eq!(json[1]["name"], "sleep_depriver");
        assert_eq!(json[1]["arguments"][1]["default"], 120.0);
        assert_eq!(json[1]["arguments"][3]["type"], "date_range");
        assert!(json[1]["arguments"][3].get("min").is_none());
        assert_eq!(describe("middle_crossing").unwrap().arguments.len(), 2);
        assert!(describe("nope").is_none());
    }
}
