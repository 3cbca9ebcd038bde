use ethoscope_types::{DataPoint, blob::Blob};
use image::GrayImage;

use crate::{NoPosition, Tracker, TrackerConfig, TrackerKind, stage::BackgroundStage};

/// Background subtraction where all foreground belongs to the one animal.
///
/// Fragments are joined by their common convex hull, so frames are never
/// ambiguous.
pub struct SingleObjectTracker {
    stage: BackgroundStage,
}

impl SingleObjectTracker {
    pub fn new(cfg: &TrackerConfig) -> Self {
        Self {
            stage: BackgroundStage::new(cfg),
        }
    }
}

impl Tracker for SingleObjectTracker {
    fn find_position(
        &mut self,
        crop: &GrayImage,
        mask: &GrayImage,
        t_ms: u64,
    ) -> Result<Vec<DataPoint>, NoPosition> {
        let prepared = self.stage.prepare(crop, mask, t_ms)?;
        let blob = if prepared.blobs.len() == 1 {
            prepared.blobs[0].clone()
        } else {
            Blob::merged(&prepared.blobs)
        };
        if blob.hull().len() < 3 {
            return Err(self.stage.reject(&prepared.grey, NoPosition::DegenerateContour));
        }
        let rect = self.stage.fit(&prepared, &blob)?;
        self.stage.commit(&prepared, false);
        Ok(vec![self.stage.data_point(&rect, &prepared)])
    }

    fn kind(&self) -> TrackerKind {
        TrackerKind::SingleObject
    }
}
