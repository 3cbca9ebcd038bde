use std::collections::VecDeque;

use ethoscope_types::{DataPoint, Variable, VariableKind};
use tracing::trace;

use crate::NoPosition;

/// Recent trajectory of one ROI, with gap filling.
///
/// Every point leaving [Self::record] carries `is_inferred`. After a failed
/// frame the last observed position is repeated as inferred, as long as the
/// last real observation is no older than `max_inferred_ms`.
#[derive(Debug, Clone)]
pub struct PositionHistory {
    entries: VecDeque<(u64, Vec<DataPoint>)>,
    max_history_ms: u64,
    max_inferred_ms: u64,
    last_non_inferred_ms: Option<u64>,
    last_time_point_ms: Option<u64>,
}

impl PositionHistory {
    pub fn new(max_history_ms: u64, max_inferred_ms: u64) -> Self {
        Self {
            entries: VecDeque::new(),
            max_history_ms,
            max_inferred_ms,
            last_non_inferred_ms: None,
            last_time_point_ms: None,
        }
    }

    /// Store the outcome of tracking one frame and return what to emit.
    pub fn record(
        &mut self,
        t_ms: u64,
        outcome: Result<Vec<DataPoint>, NoPosition>,
    ) -> Vec<DataPoint> {
        self.last_time_point_ms = Some(t_ms);
        match outcome {
            Ok(points) if points.is_empty() => Vec::new(),
            Ok(points) => {
                let points: Vec<DataPoint> = points
                    .into_iter()
                    .map(|mut p| {
                        p.set(Variable::boolean(VariableKind::IsInferred, false));
                        p
                    })
                    .collect();
                self.last_non_inferred_ms = Some(t_ms);
                self.entries.push_back((t_ms, points.clone()));
                self.prune();
                points
            }
            Err(reason) => {
                trace!("no position at {t_ms} ms: {reason}");
                self.infer(t_ms)
            }
        }
    }

    fn infer(&mut self, t_ms: u64) -> Vec<DataPoint> {
        let Some(last_ok) = self.last_non_inferred_ms else {
            return Vec::new();
        };
        if t_ms.saturating_sub(last_ok) > self.max_inferred_ms {
            return Vec::new();
        }
        let Some((_, last)) = self.entries.back() else {
            return Vec::new();
        };
        let inferred: Vec<DataPoint> = last
            .iter()
            .map(|p| {
                let mut p = p.clone();
                p.set(Variable::boolean(VariableKind::IsInferred, true));
                p
            })
            .collect();
        self.entries.push_back((t_ms, inferred.clone()));
        self.prune();
        inferred
    }

    fn prune(&mut self) {
        let Some(&(newest, _)) = self.entries.back() else {
            return;
        };
        while self.entries.len() > 2 {
            match self.entries.front() {
                Some(&(oldest, _)) if newest - oldest > self.max_history_ms => {
                    self.entries.pop_front();
                }
                _ => break,
            }
        }
    }

    /// `(t_ms, points)` pairs, oldest first.
    pub fn entries(&self) -> &VecDeque<(u64, Vec<DataPoint>)> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_positions(&self) -> Option<&[DataPoint]> {
        self.entries.back().map(|(_, p)| p.as_slice())
    }

    /// Timestamp of the most recent frame, tracked or not.
    pub fn last_time_point(&self) -> Option<u64> {
        self.last_time_point_ms
    }

    pub fn last_non_inferred_time(&self) -> Option<u64> {
        self.last_non_inferred_ms
    }
}
