use std::collections::BTreeMap;
use std::path::PathBuf;

use ethoscope_types::{DataPoint, VariableKind};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_line_segment_mut};
use tracing::trace;

use crate::{Frame, Result, TrackingUnit};

const ROI_COLOUR: Rgb<u8> = Rgb([0, 200, 0]);
const OBSERVED_COLOUR: Rgb<u8> = Rgb([255, 0, 0]);
const INFERRED_COLOUR: Rgb<u8> = Rgb([0, 0, 255]);

/// Visualises the state of the tracking loop.
pub trait Drawer {
    /// `last_positions` holds the newest positions of each ROI, keyed by
    /// ROI index.
    fn draw(
        &mut self,
        frame: &Frame,
        last_positions: &BTreeMap<u32, Vec<DataPoint>>,
        units: &[TrackingUnit],
    ) -> Result<()>;
}

/// Frame with ROI outlines and a cross on every animal.
pub fn render(
    frame: &Frame,
    last_positions: &BTreeMap<u32, Vec<DataPoint>>,
    units: &[TrackingUnit],
) -> RgbImage {
    let mut canvas = DynamicImage::ImageLuma8(frame.image.clone()).to_rgb8();
    for unit in units {
        let polygon = unit.roi().polygon();
        for (i, &(x0, y0)) in polygon.iter().enumerate() {
            let (x1, y1) = polygon[(i + 1) % polygon.len()];
            draw_line_segment_mut(
                &mut canvas,
                (x0 as f32, y0 as f32),
                (x1 as f32, y1 as f32),
                ROI_COLOUR,
            );
        }
    }
    for point in last_positions.values().flatten() {
        let (Some(x), Some(y)) = (point.get(VariableKind::X), point.get(VariableKind::Y))
        else {
            continue;
        };
        let colour = if point.get(VariableKind::IsInferred) == Some(1) {
            INFERRED_COLOUR
        } else {
            OBSERVED_COLOUR
        };
        draw_cross_mut(&mut canvas, colour, x, y);
    }
    canvas
}

/// Overwrites a JPEG snapshot at most once per period.
pub struct SnapshotDrawer {
    path: PathBuf,
    period_ms: u64,
    last_ms: Option<u64>,
}

impl SnapshotDrawer {
    pub fn new(path: PathBuf, period_ms: u64) -> Self {
        Self {
            path,
            period_ms,
            last_ms: None,
        }
    }
}

impl Drawer for SnapshotDrawer {
    fn draw(
        &mut self,
        frame: &Frame,
        last_positions: &BTreeMap<u32, Vec<DataPoint>>,
        units: &[TrackingUnit],
    ) -> Result<()> {
        if let Some(last) = self.last_ms {
            if frame.t_ms.saturating_sub(last) < self.period_ms {
                return Ok(());
            }
        }
        render(frame, last_positions, units).save_with_format(&self.path, ImageFormat::Jpeg)?;
        trace!("snapshot at {} ms", frame.t_ms);
        self.last_ms = Some(frame.t_ms);
        Ok(())
    }
}
