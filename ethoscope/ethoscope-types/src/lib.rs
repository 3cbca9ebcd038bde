// Copyright 2024-2026 the ethoscope-rs authors.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Geometry and measurement types shared by the tracking pipeline.
//!
//! A [Roi] is one arena cell. Trackers emit [DataPoint]s, ordered bundles of
//! typed [Variable]s, with coordinates relative to the ROI bounding
//! rectangle. [Variable::to_absolute] and [DataPoint::to_absolute] convert
//! them to frame coordinates.

pub mod blob;
mod data_point;
mod roi;
mod variables;

pub use data_point::{ColumnSpec, DataPoint};
pub use roi::{Rect, Roi, RoiFeatures, RoiIdAllocator};
pub use variables::{FunctionalType, SqlType, Variable, VariableKind};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("ROI polygon needs at least 3 points, got {0}")]
    DegeneratePolygon(usize),
    #[error(
        "ROI {idx} rectangle {rect:?} is outside the {frame_width}x{frame_height} frame"
    )]
    RoiOutOfBounds {
        idx: u32,
        rect: Rect,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("ROI id must be at least 1")]
    InvalidRoiId,
    #[error("ROI polygon spans more than {} pixels", u32::MAX)]
    PolygonTooLarge,
}

pub type Result<T> = std::result::Result<T, Error>;
