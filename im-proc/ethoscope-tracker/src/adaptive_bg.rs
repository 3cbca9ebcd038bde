use ethoscope_types::{DataPoint, Variable, VariableKind, blob::Blob};
use image::GrayImage;
use imageproc::point::Point;
use tracing::debug;

use crate::{
    BackgroundModel, NoPosition, ObjectModel, Tracker, TrackerConfig, TrackerKind,
    config::seconds_to_ms,
    stage::{BackgroundStage, blob_features},
};

/// Adaptive background subtraction with an appearance model of the animal.
///
/// When the foreground splits into several candidates, nearby fragments are
/// merged and the candidate closest to the [ObjectModel] wins. Ambiguous
/// frames are absorbed into the background quickly so that stray objects
/// fade out.
pub struct AdaptiveBgTracker {
    stage: BackgroundStage,
    object_model: ObjectModel,
    max_distance: f64,
}

impl AdaptiveBgTracker {
    pub fn new(cfg: &TrackerConfig) -> Self {
        Self {
            stage: BackgroundStage::new(cfg),
            object_model: ObjectModel::new(
                cfg.object_model_learning_rate,
                seconds_to_ms(cfg.object_model_memory),
            ),
            max_distance: cfg.max_distance,
        }
    }

    pub fn object_model(&self) -> &ObjectModel {
        &self.object_model
    }

    pub fn learning_rate(&self) -> f64 {
        self.stage.bg.learning_rate()
    }

    pub fn background(&self) -> &BackgroundModel {
        &self.stage.bg
    }
}

impl Tracker for AdaptiveBgTracker {
    fn find_position(
        &mut self,
        crop: &GrayImage,
        mask: &GrayImage,
        t_ms: u64,
    ) -> Result<Vec<DataPoint>, NoPosition> {
        self.object_model.expire(t_ms);
        let prepared = self.stage.prepare(crop, mask, t_ms)?;
        let ambiguous = prepared.blobs.len() > 1;

        let candidates: Vec<Blob> = if ambiguous {
            merge_nearby(&prepared.blobs)
        } else {
            prepared.blobs.clone()
        }
        .into_iter()
        .filter(|b| b.hull().len() >= 3)
        .collect();

        let best = candidates
            .iter()
            .map(|b| {
                let (features, _) = blob_features(&prepared.grey, b);
                let distance = self.object_model.distance(&features);
                (b, features, distance)
            })
            .min_by(|a, b| a.2.total_cmp(&b.2));
        let Some((blob, features, distance)) = best else {
            return Err(self.stage.reject(&prepared.grey, NoPosition::DegenerateContour));
        };

        if ambiguous && distance > self.max_distance {
            debug!("{} candidates, best at distance {distance:.3}", candidates.len());
            return Err(self
                .stage
                .reject(&prepared.grey, NoPosition::TooDistant { distance }));
        }

        let rect = self.stage.fit(&prepared, blob)?;
        self.stage.commit(&prepared, ambiguous);
        self.object_model.update(&features, t_ms);

        let mut point = self.stage.data_point(&rect, &prepared);
        point.set(Variable::new(
            VariableKind::MLogLikelihood,
            (distance * 1000.0).round() as i32,
        ));
        Ok(vec![point])
    }

    fn kind(&self) -> TrackerKind {
        TrackerKind::AdaptiveBg
    }
}

/// Group blobs whose hulls overlap or whose equivalent discs touch.
fn merge_nearby(blobs: &[Blob]) -> Vec<Blob> {
    let hulls: Vec<Vec<Point<i32>>> = blobs.iter().map(Blob::hull).collect();
    let discs: Vec<((f64, f64), f64)> = blobs
        .iter()
        .map(|b| (b.centroid(), (b.area() / std::f64::consts::PI).sqrt().max(0.5)))
        .collect();

    let mut group: Vec<usize> = (0..blobs.len()).collect();
    fn root(group: &mut [usize], mut i: usize) -> usize {
        while group[i] != i {
            group[i] = group[group[i]];
            i = group[i];
        }
        i
    }

    for i in 0..blobs.len() {
        for j in (i + 1)..blobs.len() {
            let ((xi, yi), ri) = discs[i];
            let ((xj, yj), rj) = discs[j];
            let close = ((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt() < ri + rj;
            if close || hulls_overlap(&hulls[i], &hulls[j]) {
                let (a, b) = (root(&mut group, i), root(&mut group, j));
                group[b] = a;
            }
        }
    }

    let mut merged = Vec::new();
    for i in 0..blobs.len() {
        if root(&mut group, i) != i {
            continue;
        }
        let members: Vec<&Blob> = (0..blobs.len())
            .filter(|&j| root(&mut group, j) == i)
            .map(|j| &blobs[j])
            .collect();
        if members.len() == 1 {
            merged.push(members[0].clone());
        } else {
            merged.push(Blob::merged(members));
        }
    }
    merged
}

fn hulls_overlap(a: &[Point<i32>], b: &[Point<i32>]) -> bool {
    a.iter().any(|p| inside_convex(b, *p)) || b.iter().any(|p| inside_convex(a, *p))
}

fn inside_convex(hull: &[Point<i32>], p: Point<i32>) -> bool {
    if hull.len() < 3 {
        return false;
    }
    let (mut pos, mut neg) = (false, false);
    for (i, a) in hull.iter().enumerate() {
        let b = hull[(i + 1) % hull.len()];
        let cross = (b.x - a.x) as i64 * (p.y - a.y) as i64 - (b.y - a.y) as i64 * (p.x - a.x) as i64;
        pos |= cross > 0;
        neg |= cross < 0;
        if pos && neg {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: i32, y0: i32, side: i32) -> Blob {
        Blob::new(vec![
            Point::new(x0, y0),
            Point::new(x0 + side, y0),
            Point::new(x0 + side, y0 + side),
            Point::new(x0, y0 + side),
        ])
    }

    #[test]
    fn fragments_merge_distant_blobs_do_not() {
        let blobs = vec![square(10, 10, 4), square(13, 10, 4), square(60, 60, 4)];
        let merged = merge_nearby(&blobs);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn nested_hulls_overlap() {
        let outer = square(0, 0, 20).hull();
        let inner = square(5, 5, 2).hull();
        assert!(hulls_overlap(&outer, &inner));
        assert!(!hulls_overlap(&outer, &square(30, 30, 2).hull()));
    }
}
