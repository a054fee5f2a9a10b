use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegError};
use crate::optim::Optimizer;
use crate::schedule::LrSchedule;

/// Knobs for [`CosineWarmRestarts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Peak rate of the first cycle. The optimizer's configured rate is the floor.
    pub eta_max: f64,
    /// Length of the first cycle, in epochs.
    pub t_0: usize,
    /// Cycle length multiplier applied at every restart.
    pub t_mult: usize,
    /// Linear warm-up epochs at the start of each cycle.
    pub t_up: usize,
    /// Peak decay per completed cycle.
    pub gamma: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig { eta_max: 1e-3, t_0: 10, t_mult: 1, t_up: 2, gamma: 0.3 }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.t_0 == 0 {
            return Err(SegError::InvalidConfig("schedule t_0 must be at least 1".into()));
        }
        if self.t_mult == 0 {
            return Err(SegError::InvalidConfig("schedule t_mult must be at least 1".into()));
        }
        if self.t_up >= self.t_0 {
            return Err(SegError::InvalidConfig(format!(
                "schedule warm-up ({}) must be shorter than the cycle ({})",
                self.t_up, self.t_0
            )));
        }
        if !(self.gamma > 0.0) {
            return Err(SegError::InvalidConfig("schedule gamma must be positive".into()));
        }
        Ok(())
    }
}

/// Cosine annealing with warm restarts and a linear warm-up.
///
/// Within a cycle of length `t_i` the rate climbs linearly from the base rate
/// to the current peak over `t_up` epochs, then follows half a cosine back
/// down. Each restart multiplies the non-warm-up part of the cycle by
/// `t_mult` and the peak by `gamma`.
#[derive(Debug, Clone)]
pub struct CosineWarmRestarts {
    base_lr: f64,
    base_eta_max: f64,
    eta_max: f64,
    t_up: usize,
    t_mult: usize,
    gamma: f64,
    t_i: usize,
    t_cur: usize,
    cycle: u32,
}

impl CosineWarmRestarts {
    /// Takes the optimizer's current rate as the floor and sets the rate for
    /// epoch 0.
    pub fn new(config: &ScheduleConfig, optimizer: &mut dyn Optimizer) -> Result<Self> {
        config.validate()?;
        let schedule = CosineWarmRestarts {
            base_lr: optimizer.learning_rate(),
            base_eta_max: config.eta_max,
            eta_max: config.eta_max,
            t_up: config.t_up,
            t_mult: config.t_mult,
            gamma: config.gamma,
            t_i: config.t_0,
            t_cur: 0,
            cycle: 0,
        };
        optimizer.set_learning_rate(schedule.current_lr());
        Ok(schedule)
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }
}

impl LrSchedule for CosineWarmRestarts {
    fn step(&mut self, optimizer: &mut dyn Optimizer) {
        self.t_cur += 1;
        if self.t_cur >= self.t_i {
            self.cycle += 1;
            self.t_cur -= self.t_i;
            self.t_i = (self.t_i - self.t_up) * self.t_mult + self.t_up;
        }
        self.eta_max = self.base_eta_max * self.gamma.powi(self.cycle as i32);
        optimizer.set_learning_rate(self.current_lr());
    }

    fn current_lr(&self) -> f64 {
        let span = self.eta_max - self.base_lr;
        if self.t_cur < self.t_up {
            self.base_lr + span * self.t_cur as f64 / self.t_up as f64
        } else {
            let progress = (self.t_cur - self.t_up) as f64 / (self.t_i - self.t_up) as f64;
            self.base_lr + span * (1.0 + (PI * progress).cos()) / 2.0
        }
    }
}
