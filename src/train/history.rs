use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::train::epoch_stats::PhaseResult;

/// The four per-epoch series a training run records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TrainLoss,
    ValidLoss,
    TrainMiou,
    ValidMiou,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::TrainLoss, Metric::ValidLoss, Metric::TrainMiou, Metric::ValidMiou];

    pub fn name(self) -> &'static str {
        match self {
            Metric::TrainLoss => "train_loss",
            Metric::ValidLoss => "valid_loss",
            Metric::TrainMiou => "train_miou",
            Metric::ValidMiou => "valid_miou",
        }
    }
}

/// Per-epoch loss and mIoU, one entry per series per completed epoch.
///
/// Serializes as a map keyed by the metric names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub train_loss: Vec<f64>,
    pub valid_loss: Vec<f64>,
    pub train_miou: Vec<f64>,
    pub valid_miou: Vec<f64>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one epoch.
    pub fn record(&mut self, train: &PhaseResult, valid: &PhaseResult) {
        self.train_loss.push(train.loss);
        self.valid_loss.push(valid.loss);
        self.train_miou.push(train.miou);
        self.valid_miou.push(valid.miou);
    }

    pub fn series(&self, metric: Metric) -> &[f64] {
        match metric {
            Metric::TrainLoss => &self.train_loss,
            Metric::ValidLoss => &self.valid_loss,
            Metric::TrainMiou => &self.train_miou,
            Metric::ValidMiou => &self.valid_miou,
        }
    }

    /// Lookup by metric name, e.g. `"valid_miou"`.
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        Metric::ALL.iter().find(|m| m.name() == name).map(|&m| self.series(m))
    }

    pub fn epochs(&self) -> usize {
        self.train_loss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs() == 0
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(loss: f64, miou: f64) -> PhaseResult {
        PhaseResult { loss, miou, class_iou: [miou, miou], batches: 1, elapsed_ms: 0 }
    }

    #[test]
    fn record_grows_every_series_by_one() {
        let mut h = History::new();
        h.record(&phase(0.7, 0.4), &phase(0.8, 0.3));
        h.record(&phase(0.5, 0.6), &phase(0.6, 0.5));
        assert_eq!(h.epochs(), 2);
        assert_eq!(h.get("train_loss").unwrap(), &[0.7, 0.5]);
        assert_eq!(h.series(Metric::ValidMiou), &[0.3, 0.5]);
        assert!(h.get("test_loss").is_none());
    }

    #[test]
    fn serializes_with_metric_names() {
        let mut h = History::new();
        h.record(&phase(1.0, 0.5), &phase(2.0, 0.25));
        let v = serde_json::to_value(&h).unwrap();
        for m in Metric::ALL {
            assert!(v.get(m.name()).is_some(), "{}", m.name());
        }
    }
}
