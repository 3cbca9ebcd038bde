use ethoscope_types::blob::{Blob, external_blobs};
use image::{GrayImage, Luma};
use nalgebra::Point2;
use tracing::debug;

use crate::{CalibrationFailure, TargetGridConfig};

/// Per-pixel count of thresholds at which the pixel belonged to a round blob.
pub(crate) struct ScoreMap {
    width: u32,
    height: u32,
    counts: Vec<u16>,
}

impl ScoreMap {
    fn max(&self) -> u16 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    fn above(&self, level: u16) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let i = (y * self.width + x) as usize;
            Luma([if self.counts[i] > level { 255 } else { 0 }])
        })
    }
}

fn median(grey: &GrayImage) -> u8 {
    let mut hist = [0usize; 256];
    for p in grey.pixels() {
        hist[p[0] as usize] += 1;
    }
    let half = (grey.width() as usize * grey.height() as usize).div_ceil(2);
    let mut seen = 0;
    for (value, count) in hist.iter().enumerate() {
        seen += count;
        if seen >= half {
            return value as u8;
        }
    }
    255
}

/// Stretch so that the median grey level maps to white.
pub(crate) fn normalize_contrast(grey: &GrayImage) -> GrayImage {
    let m = median(grey);
    if m == 0 {
        return grey.clone();
    }
    let scale = 255.0 / m as f64;
    GrayImage::from_fn(grey.width(), grey.height(), |x, y| {
        let v = grey.get_pixel(x, y)[0] as f64 * scale;
        Luma([v.min(255.0) as u8])
    })
}

pub(crate) fn score_map(grey: &GrayImage, cfg: &TargetGridConfig) -> ScoreMap {
    let (width, height) = grey.dimensions();
    let n_pixels = width as usize * height as usize;
    let mut counts = vec![0u16; n_pixels];
    let step = cfg.threshold_step.max(1) as usize;

    for t in (0..=250u8).step_by(step) {
        let mut covered = 0usize;
        let binary = GrayImage::from_fn(width, height, |x, y| {
            if grey.get_pixel(x, y)[0] <= t {
                covered += 1;
                Luma([255])
            } else {
                Luma([0])
            }
        });
        if covered as f64 > cfg.max_binary_fraction * n_pixels as f64 {
            continue;
        }
        let mut hits = GrayImage::new(width, height);
        let mut n_round = 0;
        for blob in external_blobs(&binary) {
            if blob.circularity() >= cfg.min_circularity {
                blob.fill(&mut hits, 255);
                n_round += 1;
            }
        }
        if n_round == 0 {
            continue;
        }
        for (c, h) in counts.iter_mut().zip(hits.as_raw().iter()) {
            if *h > 0 {
                *c = c.saturating_add(1);
            }
        }
    }
    ScoreMap {
        width,
        height,
        counts,
    }
}

/// Lowest score level at which exactly three blobs remain.
pub(crate) fn three_targets(score: &ScoreMap) -> Result<Vec<Blob>, CalibrationFailure> {
    for level in 0..=score.max() {
        let blobs = external_blobs(&score.above(level));
        match blobs.len() {
            3 => {
                debug!("three targets isolated at score level {level}");
                return Ok(blobs);
            }
            n if n < 3 => return Err(CalibrationFailure::NotEnoughTargets { found: n }),
            _ => {}
        }
    }
    Err(CalibrationFailure::NoThreeTargetLevel)
}

/// Check target widths are similar and return their mean.
pub fn check_diameter_uniformity(widths: &[f64], max_cv: f64) -> Result<f64, CalibrationFailure> {
    if widths.is_empty() {
        return Err(CalibrationFailure::NotEnoughTargets { found: 0 });
    }
    let n = widths.len() as f64;
    let mean = widths.iter().sum::<f64>() / n;
    let var = widths.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / n;
    let cv = if mean > 0.0 { var.sqrt() / mean } else { f64::INFINITY };
    if cv > max_cv {
        return Err(CalibrationFailure::TargetsNotUniform { cv, max: max_cv });
    }
    Ok(mean)
}

/// Order three target centres as `[A, B, C]`.
///
/// A and C are the two farthest apart and B is the remaining one. C is the
/// one of A and C that lies farther from B. Exact distance ties have no
/// defined order and are reported as [CalibrationFailure::AmbiguousTargetOrder].
pub fn sort_targets(points: [Point2<f64>; 3]) -> Result<[Point2<f64>; 3], CalibrationFailure> {
    let dist = |i: usize, j: usize| (points[i] - points[j]).norm();
    let pairs = [(0, 1), (1, 2), (0, 2)];
    let dists = pairs.map(|(i, j)| dist(i, j));

    let mut longest = 0;
    for k in 1..3 {
        if dists[k] > dists[longest] {
            longest = k;
        }
    }
    if (0..3).any(|k| k != longest && dists[k] == dists[longest]) {
        return Err(CalibrationFailure::AmbiguousTargetOrder);
    }
    let (i, j) = pairs[longest];
    let b = 3 - i - j;
    let (di, dj) = (dist(i, b), dist(j, b));
    if di == dj {
        return Err(CalibrationFailure::AmbiguousTargetOrder);
    }
    let (a, c) = if di > dj { (j, i) } else { (i, j) };
    Ok([points[a], points[b], points[c]])
}
