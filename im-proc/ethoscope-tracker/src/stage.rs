//! Background subtraction steps shared by the tracker variants.

use ethoscope_types::{
    DataPoint, Variable, VariableKind,
    blob::{Blob, RotatedRect, external_blobs},
};
use image::{GrayImage, Luma};

use crate::{BackgroundModel, NoPosition, ObjectFeatures, TrackerConfig};

/// Output of [BackgroundStage::prepare] for one frame.
pub(crate) struct Prepared {
    pub(crate) grey: GrayImage,
    pub(crate) fg: GrayImage,
    pub(crate) blobs: Vec<Blob>,
}

pub(crate) struct BackgroundStage {
    pub(crate) bg: BackgroundModel,
    fg_threshold: u8,
    max_area_fraction: f64,
    blur_sigma: f32,
    last_t_ms: Option<u64>,
    last_pos: Option<(f64, f64)>,
}

impl BackgroundStage {
    pub(crate) fn new(cfg: &TrackerConfig) -> Self {
        Self {
            bg: BackgroundModel::new(
                cfg.min_learning_rate,
                cfg.max_learning_rate,
                cfg.learning_rate_step,
            ),
            fg_threshold: cfg.fg_threshold,
            max_area_fraction: cfg.max_area_fraction,
            blur_sigma: cfg.blur_sigma,
            last_t_ms: None,
            last_pos: None,
        }
    }

    /// Subtract the background and extract the foreground blobs.
    pub(crate) fn prepare(
        &mut self,
        crop: &GrayImage,
        mask: &GrayImage,
        t_ms: u64,
    ) -> Result<Prepared, NoPosition> {
        if crop.dimensions() != mask.dimensions() || crop.width() == 0 || crop.height() == 0 {
            return Err(NoPosition::SizeMismatch);
        }
        if let Some(previous_ms) = self.last_t_ms {
            if t_ms < previous_ms {
                return Err(NoPosition::TimeWentBackwards { t_ms, previous_ms });
            }
        }
        self.last_t_ms = Some(t_ms);

        let grey = preprocess(crop, mask, self.blur_sigma);
        let Some((fg, count)) = self.bg.foreground(&grey, mask, self.fg_threshold) else {
            self.bg.initialise(&grey);
            return Err(NoPosition::Initialising);
        };

        let n_pixels = (grey.width() * grey.height()) as f64;
        let fraction = count as f64 / n_pixels;
        if count == 0 {
            return Err(self.reject(&grey, NoPosition::NoForeground));
        }
        if fraction > self.max_area_fraction {
            return Err(self.reject(&grey, NoPosition::ForegroundTooLarge { fraction }));
        }
        let blobs = external_blobs(&fg);
        if blobs.is_empty() {
            return Err(self.reject(&grey, NoPosition::DegenerateContour));
        }
        Ok(Prepared { grey, fg, blobs })
    }

    /// Give up on this frame: learn faster and absorb it into the background.
    pub(crate) fn reject(&mut self, grey: &GrayImage, reason: NoPosition) -> NoPosition {
        self.bg.increase_learning_rate();
        self.bg.update(grey, None);
        reason
    }

    /// Fit a rotated rectangle to `blob`, rejecting implausible sizes.
    pub(crate) fn fit(&mut self, prepared: &Prepared, blob: &Blob) -> Result<RotatedRect, NoPosition> {
        let rect = blob.min_area_rect().canonical();
        let shorter = prepared.grey.width().min(prepared.grey.height()) as f64;
        if rect.w > 2.0 * shorter || rect.h > 2.0 * shorter {
            return Err(self.reject(&prepared.grey, NoPosition::ImplausibleObject));
        }
        Ok(rect)
    }

    /// Update the background after accepting a position.
    ///
    /// A confident frame keeps the animal out of the background. An
    /// ambiguous one is absorbed whole.
    pub(crate) fn commit(&mut self, prepared: &Prepared, ambiguous: bool) {
        if ambiguous {
            self.bg.increase_learning_rate();
            self.bg.update(&prepared.grey, None);
        } else {
            self.bg.decrease_learning_rate();
            self.bg.update(&prepared.grey, Some(&prepared.fg));
        }
    }

    /// Position, shape and displacement of the accepted object.
    pub(crate) fn data_point(&mut self, rect: &RotatedRect, prepared: &Prepared) -> DataPoint {
        let w_im = prepared.grey.width().max(prepared.grey.height()) as f64;
        let pos = (rect.cx / w_im, rect.cy / w_im);
        let step = match self.last_pos {
            Some((px, py)) => ((pos.0 - px).powi(2) + (pos.1 - py).powi(2)).sqrt(),
            None => 0.0,
        };
        self.last_pos = Some(pos);
        let xy_dist = ((1.0 / w_im + step).log10() * 1000.0).round() as i32;

        DataPoint::new([
            Variable::new(VariableKind::X, rect.cx.round() as i32),
            Variable::new(VariableKind::Y, rect.cy.round() as i32),
            Variable::new(VariableKind::Width, rect.w.round() as i32),
            Variable::new(VariableKind::Height, rect.h.round() as i32),
            Variable::new(VariableKind::Phi, (rect.angle.round() as i32).rem_euclid(180)),
            Variable::new(VariableKind::XyDistance, xy_dist),
        ])
    }
}

/// Appearance features of `blob` and its fitted rectangle.
pub(crate) fn blob_features(grey: &GrayImage, blob: &Blob) -> (ObjectFeatures, RotatedRect) {
    let rect = blob.min_area_rect().canonical();
    let mut inside = GrayImage::new(grey.width(), grey.height());
    blob.fill(&mut inside, 255);
    let (mut sum, mut n) = (0u64, 0u64);
    for (g, m) in grey.pixels().zip(inside.pixels()) {
        if m[0] > 0 {
            sum += g[0] as u64;
            n += 1;
        }
    }
    let mean_grey = if n > 0 { sum as f64 / n as f64 } else { 0.0 };
    (ObjectFeatures::new(blob.area(), rect.h, mean_grey), rect)
}

/// Blur, scale so the mean inside `mask` is 128, and blank the outside.
pub(crate) fn preprocess(crop: &GrayImage, mask: &GrayImage, sigma: f32) -> GrayImage {
    let blurred = if sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(crop, sigma)
    } else {
        crop.clone()
    };
    let (mut sum, mut n) = (0u64, 0u64);
    for (p, m) in blurred.pixels().zip(mask.pixels()) {
        if m[0] > 0 {
            sum += p[0] as u64;
            n += 1;
        }
    }
    let scale = if n > 0 && sum > 0 {
        128.0 * n as f64 / sum as f64
    } else {
        1.0
    };
    GrayImage::from_fn(crop.width(), crop.height(), |x, y| {
        if mask.get_pixel(x, y)[0] == 0 {
            return Luma([0]);
        }
        let v = blurred.get_pixel(x, y)[0] as f64 * scale;
        Luma([v.round().min(255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_centres_grey_levels() {
        let crop = GrayImage::from_pixel(20, 10, Luma([64]));
        let mut mask = GrayImage::from_pixel(20, 10, Luma([255]));
        mask.put_pixel(0, 0, Luma([0]));
        let grey = preprocess(&crop, &mask, 0.0);
        assert_eq!(grey.get_pixel(10, 5)[0], 128);
        assert_eq!(grey.get_pixel(0, 0)[0], 0);
    }
}
