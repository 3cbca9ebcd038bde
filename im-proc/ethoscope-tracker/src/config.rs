use serde::{Deserialize, Serialize};

use crate::{AdaptiveBgTracker, PositionHistory, SingleObjectTracker, Tracker};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    /// One animal per ROI, candidates disambiguated by an appearance model.
    #[default]
    AdaptiveBg,
    /// One animal per ROI, all foreground treated as a single object.
    SingleObject,
}

/// Tracking parameters, shared by every ROI of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackerConfig {
    #[serde(default)]
    pub kind: TrackerKind,
    /// Minimum grey level difference from the background for foreground.
    #[serde(default = "default_fg_threshold")]
    pub fg_threshold: u8,
    /// Largest foreground share of the ROI that can still be one animal.
    #[serde(default = "default_max_area_fraction")]
    pub max_area_fraction: f64,
    #[serde(default = "default_min_learning_rate")]
    pub min_learning_rate: f64,
    #[serde(default = "default_max_learning_rate")]
    pub max_learning_rate: f64,
    #[serde(default = "default_learning_rate_step")]
    pub learning_rate_step: f64,
    /// Candidates further than this from the object model are rejected.
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
    #[serde(default = "default_object_model_learning_rate")]
    pub object_model_learning_rate: f64,
    /// Seconds without an update after which the object model is dropped.
    #[serde(default = "default_object_model_memory")]
    pub object_model_memory: f64,
    #[serde(default = "default_blur_sigma")]
    pub blur_sigma: f32,
    /// Seconds after the last real observation during which it is repeated.
    #[serde(default = "default_max_inferred_window")]
    pub max_inferred_window: f64,
    /// Seconds of trajectory kept for the stimulators.
    #[serde(default = "default_max_history_length")]
    pub max_history_length: f64,
}

fn default_fg_threshold() -> u8 {
    20
}

fn default_max_area_fraction() -> f64 {
    // five expected animal lengths of 0.05 ROI width, squared
    (5.0_f64 * 0.05).powi(2)
}

fn default_min_learning_rate() -> f64 {
    1e-4
}

fn default_max_learning_rate() -> f64 {
    0.02
}

fn default_learning_rate_step() -> f64 {
    1.2
}

fn default_max_distance() -> f64 {
    0.75
}

fn default_object_model_learning_rate() -> f64 {
    0.05
}

fn default_object_model_memory() -> f64 {
    60.0
}

fn default_blur_sigma() -> f32 {
    1.2
}

fn default_max_inferred_window() -> f64 {
    30.0
}

fn default_max_history_length() -> f64 {
    250.0
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            kind: TrackerKind::default(),
            fg_threshold: default_fg_threshold(),
            max_area_fraction: default_max_area_fraction(),
            min_learning_rate: default_min_learning_rate(),
            max_learning_rate: default_max_learning_rate(),
            learning_rate_step: default_learning_rate_step(),
            max_distance: default_max_distance(),
            object_model_learning_rate: default_object_model_learning_rate(),
            object_model_memory: default_object_model_memory(),
            blur_sigma: default_blur_sigma(),
            max_inferred_window: default_max_inferred_window(),
            max_history_length: default_max_history_length(),
        }
    }
}

pub(crate) fn seconds_to_ms(s: f64) -> u64 {
    (s.max(0.0) * 1000.0).round() as u64
}

impl TrackerConfig {
    /// A fresh tracker of the configured kind.
    pub fn build(&self) -> Box<dyn Tracker> {
        match self.kind {
            TrackerKind::AdaptiveBg => Box::new(AdaptiveBgTracker::new(self)),
            TrackerKind::SingleObject => Box::new(SingleObjectTracker::new(self)),
        }
    }

    /// A fresh history with the configured windows.
    pub fn history(&self) -> PositionHistory {
        PositionHistory::new(
            seconds_to_ms(self.max_history_length),
            seconds_to_ms(self.max_inferred_window),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg: TrackerConfig = toml::from_str("kind = \"single_object\"\nfg_threshold = 25\n").unwrap();
        assert_eq!(cfg.kind, TrackerKind::SingleObject);
        assert_eq!(cfg.fg_threshold, 25);
        assert_eq!(cfg.max_history_length, 250.0);
        assert_eq!(cfg.build().kind(), TrackerKind::SingleObject);

        assert!(toml::from_str::<TrackerConfig>("no_such_field = 1\n").is_err());
    }
}
