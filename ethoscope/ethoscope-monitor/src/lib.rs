// Copyright 2024-2026 the ethoscope-rs authors.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The tracking loop.
//!
//! A [Monitor] pulls frames from a [FrameSource] and hands each one to every
//! [TrackingUnit]. A unit crops its ROI, tracks, fills gaps from its history
//! and lets its stimulator decide. Results go to a [ResultWriter] and,
//! optionally, to a [Drawer].

mod drawer;
mod monitor;
mod source;
mod unit;
mod writer;

pub use drawer::{Drawer, SnapshotDrawer, render};
pub use monitor::{Monitor, StopHandle};
pub use source::{FrameGrabber, FrameSource, ImageDirectoryGrabber, ThreadedFrameSource};
pub use unit::TrackingUnit;
pub use writer::{CsvResultWriter, ResultWriter, write_roi_map};

use std::{path::PathBuf, time::Duration};

use chrono::NaiveDateTime;
use image::GrayImage;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no frame from the camera within {0:?}")]
    CameraTimeout(Duration),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Csv(#[from] csv::Error),
    #[error("{0}")]
    Image(#[from] image::ImageError),
    #[error("{0}")]
    Roi(#[from] ethoscope_types::Error),
    #[error("ROI {0} is used by more than one tracking unit")]
    DuplicateRoi(u32),
    #[error("ROI {roi}: columns {found:?} differ from {expected:?}")]
    SchemaMismatch {
        roi: u32,
        expected: Vec<&'static str>,
        found: Vec<&'static str>,
    },
    #[error("no images in {0}")]
    NoImages(PathBuf),
    #[error("frame grabber thread could not be started: {0}")]
    Spawn(std::io::Error),
}

/// One greyscale camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Milliseconds since the start of acquisition.
    pub t_ms: u64,
    pub wall_clock: NaiveDateTime,
    pub image: GrayImage,
}
