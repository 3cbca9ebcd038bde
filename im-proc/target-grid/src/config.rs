use serde::{Deserialize, Serialize};

/// Extra distance between the target centres and the grid reference
/// triangle, in units of the mean target diameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetMargins {
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub bottom: f64,
}

/// Grid layout and target detection parameters.
///
/// Margins are fractions of the reference rectangle: `top_margin` is the
/// distance from the top reference edge to the middle of the top row of
/// cells. Fills are the fraction of each grid step a cell covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetGridConfig {
    #[serde(default = "default_n_rows")]
    pub n_rows: u32,
    #[serde(default = "default_n_cols")]
    pub n_cols: u32,
    #[serde(default)]
    pub top_margin: f64,
    #[serde(default)]
    pub bottom_margin: f64,
    #[serde(default)]
    pub left_margin: f64,
    #[serde(default)]
    pub right_margin: f64,
    #[serde(default = "default_fill")]
    pub horizontal_fill: f64,
    #[serde(default = "default_fill")]
    pub vertical_fill: f64,
    /// Contours at least this circular count as target candidates.
    #[serde(default = "default_min_circularity")]
    pub min_circularity: f64,
    /// Maximum coefficient of variation of the three target widths.
    #[serde(default = "default_max_width_cv")]
    pub max_width_cv: f64,
    /// Binarized frames covering more than this are skipped.
    #[serde(default = "default_max_binary_fraction")]
    pub max_binary_fraction: f64,
    #[serde(default = "default_threshold_step")]
    pub threshold_step: u8,
    #[serde(default)]
    pub target_margins: TargetMargins,
}

fn default_n_rows() -> u32 {
    10
}

fn default_n_cols() -> u32 {
    2
}

fn default_fill() -> f64 {
    0.9
}

fn default_min_circularity() -> f64 {
    0.8
}

fn default_max_width_cv() -> f64 {
    0.10
}

fn default_max_binary_fraction() -> f64 {
    0.7
}

fn default_threshold_step() -> u8 {
    5
}

impl Default for TargetGridConfig {
    fn default() -> Self {
        Self {
            n_rows: default_n_rows(),
            n_cols: default_n_cols(),
            top_margin: 0.0,
            bottom_margin: 0.0,
            left_margin: 0.0,
            right_margin: 0.0,
            horizontal_fill: default_fill(),
            vertical_fill: default_fill(),
            min_circularity: default_min_circularity(),
            max_width_cv: default_max_width_cv(),
            max_binary_fraction: default_max_binary_fraction(),
            threshold_step: default_threshold_step(),
            target_margins: TargetMargins::default(),
        }
    }
}
