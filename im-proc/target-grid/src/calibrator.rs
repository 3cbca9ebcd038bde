use ethoscope_types::{Roi, RoiIdAllocator};
use image::{GrayImage, Luma};
use nalgebra::{Point2, Vector2};
use tracing::{info, warn};

use crate::{
    AffineTransform, CalibrationError, CalibrationFailure, Result, TargetGridConfig,
    detect::{check_diameter_uniformity, normalize_contrast, score_map, sort_targets, three_targets},
    grid::make_grid,
};

/// Canonical positions of targets A, B and C.
fn canonical_targets() -> [Point2<f64>; 3] {
    [
        Point2::new(0.0, -1.0),
        Point2::new(0.0, 0.0),
        Point2::new(-1.0, 0.0),
    ]
}

/// Result of a successful calibration.
#[derive(Debug, Clone)]
pub struct Calibration {
    /// One ROI per grid cell, ids from 1 in column-major order.
    pub rois: Vec<Roi>,
    /// Detected target centres `[A, B, C]`, before margins are applied.
    pub reference_points: [Point2<f64>; 3],
    pub mean_diameter: f64,
    /// Canonical points to the margin-adjusted reference points.
    pub transform: AffineTransform,
}

#[derive(Debug, Clone, Default)]
pub struct TargetGridCalibrator {
    cfg: TargetGridConfig,
}

impl TargetGridCalibrator {
    pub fn new(cfg: TargetGridConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &TargetGridConfig {
        &self.cfg
    }

    /// Locate the three targets and return `[A, B, C]` with their mean width.
    pub fn find_targets(
        &self,
        frame: &GrayImage,
    ) -> std::result::Result<([Point2<f64>; 3], f64), CalibrationFailure> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(CalibrationFailure::NoFrame);
        }
        let grey = normalize_contrast(frame);
        let score = score_map(&grey, &self.cfg);
        let targets = three_targets(&score)?;

        let widths: Vec<f64> = targets
            .iter()
            .map(|b| b.bounding_rect().w as f64)
            .collect();
        let mean_diameter = check_diameter_uniformity(&widths, self.cfg.max_width_cv)?;

        let centres: Vec<Point2<f64>> = targets
            .iter()
            .map(|b| {
                let (x, y) = b.centroid();
                Point2::new(x, y)
            })
            .collect();
        let sorted = sort_targets([centres[0], centres[1], centres[2]])?;
        Ok((sorted, mean_diameter))
    }

    pub fn calibrate(&self, frame: &GrayImage) -> Result<Calibration> {
        let fail = |failure: CalibrationFailure| {
            warn!("calibration failed: {failure}");
            CalibrationError::new(failure, frame)
        };

        let (reference_points, mean_diameter) = self.find_targets(frame).map_err(fail)?;
        let adjusted = self.apply_target_margins(&reference_points, mean_diameter);
        let transform = AffineTransform::from_point_pairs(&canonical_targets(), &adjusted)
            .ok_or_else(|| fail(CalibrationFailure::DegenerateTargets))?;

        let b = adjusted[1].coords;
        let mut ids = RoiIdAllocator::new();
        let mut rois = Vec::new();
        for cell in make_grid(&self.cfg) {
            let polygon = cell
                .corners
                .iter()
                .map(|c| {
                    let p = transform.apply_vector(Vector2::new(c.x - 1.0, c.y - 1.0)) + b;
                    (p.x.round() as i32, p.y.round() as i32)
                })
                .collect();
            let roi = ids
                .build(polygon)
                .map_err(|e| fail(CalibrationFailure::Roi(e.to_string())))?;
            rois.push(roi);
        }

        info!(
            "calibrated {} ROIs from targets {:?}, mean target diameter {mean_diameter:.1} px",
            rois.len(),
            reference_points.map(|p| (p.x.round(), p.y.round())),
        );
        Ok(Calibration {
            rois,
            reference_points,
            mean_diameter,
            transform,
        })
    }

    /// Calibrate on the per-pixel median of several frames.
    pub fn calibrate_from_frames(&self, frames: &[GrayImage]) -> Result<Calibration> {
        let Some(first) = frames.first() else {
            return Err(CalibrationError::new(
                CalibrationFailure::NoFrame,
                &GrayImage::new(0, 0),
            ));
        };
        if frames.iter().any(|f| f.dimensions() != first.dimensions()) {
            return Err(CalibrationError::new(
                CalibrationFailure::FrameSizeMismatch,
                first,
            ));
        }
        let median = temporal_median(frames);
        self.calibrate(&median)
    }

    fn apply_target_margins(&self, pts: &[Point2<f64>; 3], diameter: f64) -> [Point2<f64>; 3] {
        let m = &self.cfg.target_margins;
        let d = diameter;
        [
            pts[0] + Vector2::new(m.right * d, -m.top * d),
            pts[1] + Vector2::new(m.right * d, m.bottom * d),
            pts[2] + Vector2::new(-m.left * d, m.bottom * d),
        ]
    }
}

fn temporal_median(frames: &[GrayImage]) -> GrayImage {
    let (w, h) = frames[0].dimensions();
    let mut values = Vec::with_capacity(frames.len());
    GrayImage::from_fn(w, h, |x, y| {
        values.clear();
        values.extend(frames.iter().map(|f| f.get_pixel(x, y)[0]));
        values.sort_unstable();
        Luma([values[values.len() / 2]])
    })
}
