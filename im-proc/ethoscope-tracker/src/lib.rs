// Copyright 2024-2026 the ethoscope-rs authors.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Per-ROI animal tracking.
//!
//! Each ROI gets its own [Tracker]. A tracker looks at the ROI crop of every
//! frame and either finds the animal or reports a [NoPosition] reason. The
//! [PositionHistory] sitting next to it turns short gaps into inferred
//! positions and keeps the recent trajectory for the stimulators.

mod adaptive_bg;
mod background_model;
mod config;
mod history;
mod object_model;
mod single_object;
mod stage;

pub use adaptive_bg::AdaptiveBgTracker;
pub use background_model::{BackgroundModel, FloatImage};
pub use config::{TrackerConfig, TrackerKind};
pub use history::PositionHistory;
pub use object_model::{ObjectFeatures, ObjectModel};
pub use single_object::SingleObjectTracker;

use ethoscope_types::DataPoint;
use image::GrayImage;

/// Why a frame produced no position. Recoverable, one frame only.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum NoPosition {
    #[error("background model initialised on this frame")]
    Initialising,
    #[error("timestamp {t_ms} ms precedes the previous frame at {previous_ms} ms")]
    TimeWentBackwards { t_ms: u64, previous_ms: u64 },
    #[error("crop and mask sizes differ")]
    SizeMismatch,
    #[error("no foreground")]
    NoForeground,
    #[error("foreground covers {fraction:.3} of the ROI")]
    ForegroundTooLarge { fraction: f64 },
    #[error("no usable contour")]
    DegenerateContour,
    #[error("best candidate is {distance:.3} away from the object model")]
    TooDistant { distance: f64 },
    #[error("fitted object is implausibly large")]
    ImplausibleObject,
}

/// Locates the animal within one ROI crop.
///
/// `crop` and `mask` come from [ethoscope_types::Roi::apply]. Returned
/// coordinates are relative to the crop.
pub trait Tracker: Send {
    fn find_position(
        &mut self,
        crop: &GrayImage,
        mask: &GrayImage,
        t_ms: u64,
    ) -> Result<Vec<DataPoint>, NoPosition>;

    fn kind(&self) -> TrackerKind;
}
