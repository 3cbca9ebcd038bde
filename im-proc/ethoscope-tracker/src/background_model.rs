use image::{GrayImage, ImageBuffer, Luma};

pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Running mean of the empty arena.
///
/// The learning rate is the weight of the newest frame in the mean. It is
/// raised while the tracker is unsure so a changed arena is absorbed
/// quickly, and lowered while tracking is confident. It always stays in
/// `[min_rate, max_rate]`.
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    mean: Option<FloatImage>,
    learning_rate: f64,
    min_rate: f64,
    max_rate: f64,
    step: f64,
}

impl BackgroundModel {
    /// Starts at `max_rate`. Bounds given in the wrong order are swapped.
    pub fn new(min_rate: f64, max_rate: f64, step: f64) -> Self {
        let (min_rate, max_rate) = if min_rate <= max_rate {
            (min_rate, max_rate)
        } else {
            (max_rate, min_rate)
        };
        Self {
            mean: None,
            learning_rate: max_rate,
            min_rate,
            max_rate,
            step,
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.mean.is_some()
    }

    pub fn initialise(&mut self, grey: &GrayImage) {
        self.mean = Some(FloatImage::from_fn(grey.width(), grey.height(), |x, y| {
            Luma([grey.get_pixel(x, y)[0] as f32])
        }));
    }

    pub fn reset(&mut self) {
        self.mean = None;
        self.learning_rate = self.max_rate;
    }

    pub fn mean(&self) -> Option<&FloatImage> {
        self.mean.as_ref()
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn increase_learning_rate(&mut self) {
        self.learning_rate = (self.learning_rate * self.step).clamp(self.min_rate, self.max_rate);
    }

    pub fn decrease_learning_rate(&mut self) {
        self.learning_rate = (self.learning_rate / self.step).clamp(self.min_rate, self.max_rate);
    }

    /// Blend `grey` into the mean. Pixels set in `exclude` keep their value.
    pub fn update(&mut self, grey: &GrayImage, exclude: Option<&GrayImage>) {
        let Some(mean) = self.mean.as_mut() else {
            self.initialise(grey);
            return;
        };
        if mean.dimensions() != grey.dimensions() {
            self.initialise(grey);
            return;
        }
        let a = self.learning_rate as f32;
        for (x, y, m) in mean.enumerate_pixels_mut() {
            if let Some(ex) = exclude {
                if ex.get_pixel_checked(x, y).is_some_and(|p| p[0] > 0) {
                    continue;
                }
            }
            let g = grey.get_pixel(x, y)[0] as f32;
            m[0] += a * (g - m[0]);
        }
    }

    /// Binary mask of pixels further than `threshold` from the mean, inside
    /// `roi_mask`, with the number of such pixels.
    pub fn foreground(
        &self,
        grey: &GrayImage,
        roi_mask: &GrayImage,
        threshold: u8,
    ) -> Option<(GrayImage, usize)> {
        let mean = self.mean.as_ref()?;
        if mean.dimensions() != grey.dimensions() || roi_mask.dimensions() != grey.dimensions() {
            return None;
        }
        let mut count = 0;
        let fg = GrayImage::from_fn(grey.width(), grey.height(), |x, y| {
            let inside = roi_mask.get_pixel(x, y)[0] > 0;
            let diff = (grey.get_pixel(x, y)[0] as f32 - mean.get_pixel(x, y)[0]).abs();
            if inside && diff > threshold as f32 {
                count += 1;
                Luma([255])
            } else {
                Luma([0])
            }
        });
        Some((fg, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn learning_rate_stays_bounded() {
        let mut bg = BackgroundModel::new(1e-4, 0.02, 1.2);
        assert_relative_eq!(bg.learning_rate(), 0.02);
        // a pseudo-random walk of increases and decreases
        let mut state = 12345u32;
        for _ in 0..10_000 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            if state & 0x100 == 0 {
                bg.increase_learning_rate();
            } else {
                bg.decrease_learning_rate();
            }
            assert!(bg.learning_rate() >= 1e-4 && bg.learning_rate() <= 0.02);
        }
        for _ in 0..200 {
            bg.decrease_learning_rate();
        }
        assert_relative_eq!(bg.learning_rate(), 1e-4);
        for _ in 0..200 {
            bg.increase_learning_rate();
        }
        assert_relative_eq!(bg.learning_rate(), 0.02);
    }

    #[test]
    fn excluded_pixels_are_frozen() {
        let mut bg = BackgroundModel::new(0.5, 0.5, 1.0);
        bg.initialise(&GrayImage::from_pixel(4, 4, Luma([100])));
        let mut exclude = GrayImage::new(4, 4);
        exclude.put_pixel(0, 0, Luma([255]));
        bg.update(&GrayImage::from_pixel(4, 4, Luma([200])), Some(&exclude));
        let mean = bg.mean().unwrap();
        assert_relative_eq!(mean.get_pixel(0, 0)[0], 100.0);
        assert_relative_eq!(mean.get_pixel(1, 0)[0], 150.0);
    }

    #[test]
    fn foreground_respects_roi_mask() {
        let mut bg = BackgroundModel::new(0.01, 0.1, 1.2);
        bg.initialise(&GrayImage::from_pixel(4, 4, Luma([128])));
        let mut grey = GrayImage::from_pixel(4, 4, Luma([128]));
        grey.put_pixel(1, 1, Luma([10]));
        grey.put_pixel(3, 3, Luma([10]));
        let mut roi_mask = GrayImage::from_pixel(4, 4, Luma([255]));
        roi_mask.put_pixel(3, 3, Luma([0]));
        let (fg, count) = bg.foreground(&grey, &roi_mask, 20).unwrap();
        assert_eq!(count, 1);
        assert_eq!(fg.get_pixel(1, 1)[0], 255);
        assert_eq!(fg.get_pixel(3, 3)[0], 0);
    }
}
