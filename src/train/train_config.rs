use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::error::{Result, SegError};
use crate::metrics::iou::NUM_CLASSES;
use crate::optim::OptimizerKind;
use crate::schedule::ScheduleConfig;

/// Configuration for a `Trainer`.
///
/// # Fields
/// - `optimizer`      — optimizer name, `"sgd"` or `"adam"` (any case)
/// - `learning_rate`  — initial rate; the floor of the schedule when one is set
/// - `num_class`      — must be 2; the mIoU bookkeeping is background/foreground only
/// - `max_epochs`     — full passes over the training source; no early stopping
/// - `disp_epoch`     — log an epoch summary every this many epochs
/// - `disp_step`      — log running loss/mIoU every this many batches
/// - `log_dir`        — created at `Trainer` construction; plots land here
/// - `checkpoint_dir` — used as-is, never created
/// - `schedule`       — cosine warm-restart schedule, stepped once per epoch
/// - `save_history`   — also write `history.json` into `log_dir` every epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub optimizer: String,
    pub learning_rate: f64,
    pub num_class: usize,
    pub max_epochs: usize,
    pub disp_epoch: usize,
    pub disp_step: usize,
    pub log_dir: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub schedule: Option<ScheduleConfig>,
    pub save_history: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            optimizer: "adam".to_string(),
            learning_rate: 1e-4,
            num_class: NUM_CLASSES,
            max_epochs: 20,
            disp_epoch: 1,
            disp_step: 10,
            log_dir: PathBuf::from("./logs"),
            checkpoint_dir: PathBuf::from("./logs"),
            schedule: None,
            save_history: false,
        }
    }
}

impl TrainerConfig {
    /// Parses the optimizer name, failing on anything unsupported.
    pub fn optimizer_kind(&self) -> Result<OptimizerKind> {
        self.optimizer.parse()
    }

    /// Every check that can fail before the first batch is seen.
    pub fn validate(&self) -> Result<()> {
        self.optimizer_kind()?;
        if self.num_class != NUM_CLASSES {
            return Err(SegError::ClassCount { expected: NUM_CLASSES, found: self.num_class });
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(SegError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.disp_epoch == 0 {
            return Err(SegError::InvalidConfig("disp_epoch must be at least 1".into()));
        }
        if self.disp_step == 0 {
            return Err(SegError::InvalidConfig("disp_step must be at least 1".into()));
        }
        if let Some(schedule) = &self.schedule {
            schedule.validate()?;
        }
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<TrainerConfig> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}
