/// Size, thickness and darkness of a candidate blob.
///
/// Stored as `[log10(area + 1), height + 1, mean_grey + 1]` so that none of
/// the components is zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectFeatures(pub [f64; 3]);

impl ObjectFeatures {
    pub fn new(area: f64, height: f64, mean_grey: f64) -> Self {
        Self([(area.max(0.0) + 1.0).log10(), height + 1.0, mean_grey + 1.0])
    }
}

/// Smoothed appearance of the tracked animal.
///
/// Used only to choose between several candidate blobs.
#[derive(Debug, Clone)]
pub struct ObjectModel {
    mean: Option<[f64; 3]>,
    learning_rate: f64,
    memory_ms: u64,
    last_update_ms: Option<u64>,
}

impl ObjectModel {
    pub fn new(learning_rate: f64, memory_ms: u64) -> Self {
        Self {
            mean: None,
            learning_rate,
            memory_ms,
            last_update_ms: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.mean.is_some()
    }

    pub fn mean(&self) -> Option<ObjectFeatures> {
        self.mean.map(ObjectFeatures)
    }

    /// Forget the model if it has not been updated for too long.
    pub fn expire(&mut self, t_ms: u64) {
        if let Some(last) = self.last_update_ms {
            if t_ms.saturating_sub(last) > self.memory_ms {
                tracing::debug!("object model not updated for {} ms, resetting", t_ms - last);
                self.mean = None;
                self.last_update_ms = None;
            }
        }
    }

    /// Mean relative absolute deviation from the model. Zero when empty.
    pub fn distance(&self, features: &ObjectFeatures) -> f64 {
        let Some(mean) = self.mean else {
            return 0.0;
        };
        let sum: f64 = mean
            .iter()
            .zip(features.0.iter())
            .map(|(m, f)| {
                if m.abs() > f64::EPSILON {
                    (f - m).abs() / m.abs()
                } else {
                    (f - m).abs()
                }
            })
            .sum();
        sum / mean.len() as f64
    }

    pub fn update(&mut self, features: &ObjectFeatures, t_ms: u64) {
        self.mean = Some(match self.mean {
            None => features.0,
            Some(mut mean) => {
                for (m, f) in mean.iter_mut().zip(features.0.iter()) {
                    *m += self.learning_rate * (f - *m);
                }
                mean
            }
        });
        self.last_update_ms = Some(t_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn distance_is_relative() {
        let mut model = ObjectModel::new(0.05, 60_000);
        let f = ObjectFeatures([2.0, 10.0, 100.0]);
        assert_relative_eq!(model.distance(&f), 0.0);
        model.update(&f, 0);
        assert_relative_eq!(model.distance(&f), 0.0);
        let g = ObjectFeatures([3.0, 10.0, 50.0]);
        assert_relative_eq!(model.distance(&g), (0.5 + 0.0 + 0.5) / 3.0);
    }

    #[test]
    fn slow_update_and_expiry() {
        let mut model = ObjectModel::new(0.1, 60_000);
        model.update(&ObjectFeatures([1.0, 1.0, 1.0]), 0);
        model.update(&ObjectFeatures([2.0, 2.0, 2.0]), 1000);
        assert_relative_eq!(model.mean().unwrap().0[0], 1.1);
        model.expire(50_000);
        assert!(model.is_ready());
        model.expire(61_001);
        assert!(!model.is_ready());
    }
}
