pub mod cosine;

use crate::optim::Optimizer;

pub use cosine::{CosineWarmRestarts, ScheduleConfig};

/// Learning-rate policy advanced once per epoch.
pub trait LrSchedule {
    fn step(&mut self, optimizer: &mut dyn Optimizer);

    fn current_lr(&self) -> f64;
}
