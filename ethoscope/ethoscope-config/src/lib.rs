// Copyright 2024-2026 the ethoscope-rs authors.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Experiment configuration.
//!
//! An experiment is described by one TOML file. Every section is optional and
//! falls back to its defaults, so an empty file is a valid configuration
//! which tracks with the adaptive background tracker and never interacts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ethoscope_hardware::{HardwareConfig, InstructionKind};
use ethoscope_stimulators::{StimulatorConfig, StimulatorKind};
use ethoscope_tracker::TrackerConfig;
use target_grid::TargetGridConfig;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("shell expansion failed: {0}")]
    ShellExpand(#[from] shellexpand::LookupError<std::env::VarError>),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("cannot serialize to TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("invalid stimulator: {0}")]
    Stimulator(#[from] ethoscope_stimulators::Error),
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
    #[error("frame rate must be positive, got {0}")]
    FrameRate(f64),
    #[error("the {stimulator} stimulator sends {instruction:?} instructions, which {hardware} hardware cannot execute")]
    HardwareMismatch {
        stimulator: &'static str,
        hardware: &'static str,
        instruction: InstructionKind,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Directory of still images, replayed in file name order.
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    /// Frames per second used to timestamp the images.
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// Start over after the last image.
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub max_frames: Option<u64>,
    /// Pace frames at `fps` instead of as fast as possible.
    #[serde(default)]
    pub realtime: bool,
    /// Seconds without a frame before the run is aborted.
    #[serde(default = "default_camera_timeout")]
    pub camera_timeout: f64,
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("frames")
}

fn default_fps() -> f64 {
    5.0
}

fn default_camera_timeout() -> f64 {
    30.0
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
            fps: default_fps(),
            repeat: false,
            max_frames: None,
            realtime: false,
            camera_timeout: default_camera_timeout(),
        }
    }
}

impl SourceConfig {
    pub fn camera_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.camera_timeout.max(0.0))
    }
}

/// Where results go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// One CSV row per ROI per frame.
    #[serde(default = "default_results")]
    pub results: PathBuf,
    /// ROI geometry written once at start.
    #[serde(default = "default_roi_map")]
    pub roi_map: PathBuf,
    /// Annotated JPEG, overwritten every `snapshot_period` seconds.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
    #[serde(default = "default_snapshot_period")]
    pub snapshot_period: f64,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_results() -> PathBuf {
    PathBuf::from("results.csv")
}

fn default_roi_map() -> PathBuf {
    PathBuf::from("rois.csv")
}

fn default_snapshot_period() -> f64 {
    5.0
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results: default_results(),
            roi_map: default_roi_map(),
            snapshot: None,
            snapshot_period: default_snapshot_period(),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub calibration: TargetGridConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub stimulator: StimulatorConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
}

impl ExperimentConfig {
    /// Check everything that can be checked before the first frame.
    ///
    /// Date ranges are parsed here, including those of a stimulator
    /// sequence, and every stimulator must send instructions the hardware
    /// can execute.
    pub fn validate(&self) -> Result<()> {
        if self.source.fps.is_nan() || self.source.fps <= 0.0 {
            return Err(Error::FrameRate(self.source.fps));
        }
        self.stimulator.validate()?;
        self.check_hardware(&self.stimulator)?;
        Ok(())
    }

    fn check_hardware(&self, stimulator: &StimulatorConfig) -> Result<()> {
        if let StimulatorKind::Multi { sequence } = &stimulator.kind {
            return sequence.iter().try_for_each(|child| self.check_hardware(child));
        }
        match stimulator.kind.instruction_kind() {
            Some(instruction) if !self.hardware.supports(instruction) => {
                Err(Error::HardwareMismatch {
                    stimulator: stimulator.kind.name(),
                    hardware: self.hardware.name(),
                    instruction,
                })
            }
            _ => Ok(()),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn fixup_relative_paths(&mut self, orig_path: &Path) -> Result<()> {
        let dirname = config_dir(orig_path);
        fixup_relative_path(&mut self.source.image_dir, dirname)?;
        fixup_relative_path(&mut self.output.results, dirname)?;
        fixup_relative_path(&mut self.output.roi_map, dirname)?;
        if let Some(snapshot) = self.output.snapshot.as_mut() {
            fixup_relative_path(snapshot, dirname)?;
        }
        if let Some(log_file) = self.output.log_file.as_mut() {
            fixup_relative_path(log_file, dirname)?;
        }
        if let HardwareConfig::Gpio { sysfs_root, .. } = &mut self.hardware {
            fixup_relative_path(sysfs_root, dirname)?;
        }
        Ok(())
    }
}

fn config_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Expand `~` and environment variables, then make `path` relative to
/// `dirname` unless it is absolute.
pub fn fixup_relative_path(path: &mut PathBuf, dirname: &Path) -> Result<()> {
    let as_str = path
        .to_str()
        .ok_or_else(|| Error::NonUtf8Path(path.clone()))?;
    let expanded = PathBuf::from(shellexpand::full(as_str)?.as_ref());
    *path = if expanded.is_relative() {
        dirname.join(expanded)
    } else {
        expanded
    };
    Ok(())
}

/// Parse an experiment from a TOML file.
///
/// Relative paths in the file are taken relative to the file's directory.
pub fn parse_config_file<P: AsRef<Path>>(fname: P) -> Result<ExperimentConfig> {
    let fname = fname.as_ref();
    let contents = std::fs::read_to_string(fname)?;
    let mut cfg: ExperimentConfig = toml::from_str(&contents)?;
    cfg.fixup_relative_paths(fname)?;
    cfg.validate()?;
    tracing::debug!(
        "loaded {}: tracker {:?}, stimulator {}, hardware {}",
        fname.display(),
        cfg.tracker.kind,
        cfg.stimulator.kind.name(),
        cfg.hardware.name()
    );
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips() {
        let cfg = ExperimentConfig::default();
        let buf = cfg.to_toml().unwrap();
        let parsed: ExperimentConfig = toml::from_str(&buf).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn empty_file_is_default() {
        let cfg: ExperimentConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, ExperimentConfig::default());
    }

    #[test]
    fn absolute_paths_are_kept() {
        let mut p = PathBuf::from("/data/frames");
        fixup_relative_path(&mut p, Path::new("/etc/ethoscope")).unwrap();
        assert_eq!(p, PathBuf::from("/data/frames"));

        let mut p = PathBuf::from("frames");
        fixup_relative_path(&mut p, Path::new("/etc/ethoscope")).unwrap();
        assert_eq!(p, PathBuf::from("/etc/ethoscope/frames"));
    }

    #[test]
    fn bare_file_name_resolves_to_cwd() {
        assert_eq!(config_dir(Path::new("experiment.toml")), Path::new("."));
    }
}
