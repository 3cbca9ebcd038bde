// Copyright 2024-2026 the ethoscope-rs authors.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! ROI grid calibration from three circular targets.
//!
//! The arena carries three dark discs at three corners of a rectangle. They
//! are labelled A (top right), B (bottom right) and C (bottom left), with B
//! at the right angle. The affine transform mapping the canonical points
//! `(0,-1), (0,0), (-1,0)` to A, B, C places a grid of rectangular cells
//! over the arena.

mod affine;
mod calibrator;
mod config;
mod detect;
mod grid;

pub use affine::AffineTransform;
pub use calibrator::{Calibration, TargetGridCalibrator};
pub use config::{TargetGridConfig, TargetMargins};
pub use detect::{check_diameter_uniformity, sort_targets};
pub use grid::{UnitCell, make_grid};

use image::GrayImage;

/// Why a calibration attempt failed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationFailure {
    #[error("no frame to calibrate from")]
    NoFrame,
    #[error("frames differ in size")]
    FrameSizeMismatch,
    #[error("only {found} target(s) found, 3 are needed")]
    NotEnoughTargets { found: usize },
    #[error("no threshold isolates exactly 3 targets")]
    NoThreeTargetLevel,
    #[error("targets not uniform: width coefficient of variation {cv:.3} exceeds {max:.3}")]
    TargetsNotUniform { cv: f64, max: f64 },
    #[error("target order is ambiguous: two distances are exactly equal")]
    AmbiguousTargetOrder,
    #[error("targets are collinear")]
    DegenerateTargets,
    #[error("ROI construction failed: {0}")]
    Roi(String),
}

/// A failed calibration together with the frame it was attempted on.
#[derive(thiserror::Error, Debug)]
#[error("calibration failed: {failure}")]
pub struct CalibrationError {
    pub failure: CalibrationFailure,
    pub frame: Box<GrayImage>,
}

impl CalibrationError {
    pub fn new(failure: CalibrationFailure, frame: &GrayImage) -> Self {
        Self {
            failure,
            frame: Box::new(frame.clone()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CalibrationError>;
