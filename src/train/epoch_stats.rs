use std::fmt;

/// Outcome of one phase (a train, validation or test pass over a source).
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseResult {
    /// Mean loss over the batches of the pass.
    pub loss: f64,
    /// Mean of the background and foreground IoU means.
    pub miou: f64,
    /// `[background, foreground]` IoU means.
    pub class_iou: [f64; 2],
    pub batches: usize,
    /// Wall-clock duration of the phase in milliseconds.
    pub elapsed_ms: u64,
}

/// Per-epoch summary, logged every `disp_epoch` epochs.
#[derive(Debug, Clone)]
pub struct EpochStats {
    /// 0-based epoch index.
    pub epoch: usize,
    pub total_epochs: usize,
    pub train_loss: f64,
    pub valid_loss: f64,
    pub train_miou: f64,
    pub valid_miou: f64,
    /// Rate the optimizer will use for the next epoch.
    pub learning_rate: f64,
    /// Time since the previous summary, in milliseconds.
    pub elapsed_ms: u64,
}

impl EpochStats {
    pub fn new(epoch: usize, total_epochs: usize, train: &PhaseResult, valid: &PhaseResult) -> Self {
        EpochStats {
            epoch,
            total_epochs,
            train_loss: train.loss,
            valid_loss: valid.loss,
            train_miou: train.miou,
            valid_miou: valid.miou,
            learning_rate: 0.0,
            elapsed_ms: 0,
        }
    }
}

impl fmt::Display for EpochStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch: {}, train loss: {:.6}, valid loss: {:.6}, train miou: {:.6}, valid miou: {:.6}, lr: {:.3e}, time: {:.3}s",
            self.epoch,
            self.train_loss,
            self.valid_loss,
            self.train_miou,
            self.valid_miou,
            self.learning_rate,
            self.elapsed_ms as f64 / 1000.0,
        )
    }
}
