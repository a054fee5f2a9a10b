use std::time::Instant;

use log::info;

use crate::data::source::BatchSource;
use crate::error::{Result, SegError};
use crate::network::network::SegNet;
use crate::optim::Optimizer;
use crate::persist::checkpoint::{CheckpointSink, JsonCheckpoints};
use crate::persist::plot::{PlotSink, PngPlotter};
use crate::schedule::{CosineWarmRestarts, LrSchedule};
use crate::train::epoch_stats::{EpochStats, PhaseResult};
use crate::train::history::History;
use crate::train::loop_fn::{self, Phase};
use crate::train::train_config::TrainerConfig;

/// Drives train and validation phases for a fixed number of epochs.
///
/// Owns the model, its optimizer, the optional schedule and the two output
/// sinks. After every epoch a checkpoint named `log_epoch_{e}` is saved and
/// the history is plotted to `<log_dir>/log_epoch_{e}.png`.
pub struct Trainer {
    net: SegNet,
    optimizer: Box<dyn Optimizer>,
    scheduler: Option<Box<dyn LrSchedule>>,
    checkpoints: Box<dyn CheckpointSink>,
    plotter: Box<dyn PlotSink>,
    config: TrainerConfig,
}

impl Trainer {
    /// Validates `config`, builds the optimizer (and schedule if configured)
    /// and creates `log_dir`. An unsupported optimizer name fails here,
    /// before any batch is read.
    pub fn new(net: SegNet, config: TrainerConfig) -> Result<Trainer> {
        config.validate()?;
        if net.spec.num_class != config.num_class {
            return Err(SegError::ClassCount { expected: config.num_class, found: net.spec.num_class });
        }

        let mut optimizer = config.optimizer_kind()?.build(config.learning_rate);
        let scheduler = match &config.schedule {
            Some(schedule) => {
                let s = CosineWarmRestarts::new(schedule, optimizer.as_mut())?;
                Some(Box::new(s) as Box<dyn LrSchedule>)
            }
            None => None,
        };

        std::fs::create_dir_all(&config.log_dir)?;

        info!(
            "trainer ready: optimizer={} lr={} params={} scheduler={}",
            config.optimizer.to_lowercase(),
            optimizer.learning_rate(),
            net.param_count(),
            scheduler.is_some(),
        );

        Ok(Trainer {
            net,
            optimizer,
            scheduler,
            checkpoints: Box::new(JsonCheckpoints::new(config.checkpoint_dir.clone())),
            plotter: Box::new(PngPlotter::default()),
            config,
        })
    }

    pub fn with_checkpoint_sink(mut self, sink: impl CheckpointSink + 'static) -> Self {
        self.checkpoints = Box::new(sink);
        self
    }

    pub fn with_plot_sink(mut self, sink: impl PlotSink + 'static) -> Self {
        self.plotter = Box::new(sink);
        self
    }

    /// Runs `max_epochs` epochs of train + validation and returns the
    /// per-epoch history. There is no early stopping or best-model selection.
    pub fn train(&mut self, train: &mut dyn BatchSource, valid: &mut dyn BatchSource) -> Result<History> {
        let max_epochs = self.config.max_epochs;
        info!("===== Train Start =====");
        let mut history = History::new();
        let mut summary_start = Instant::now();

        for e in 0..max_epochs {
            info!("Start Train Epoch {e}");
            let train_result = self.train_epoch(train)?;
            info!("Start Valid Epoch {e}");
            let valid_result = self.valid_epoch(valid)?;

            history.record(&train_result, &valid_result);

            if let Some(scheduler) = self.scheduler.as_mut() {
                scheduler.step(self.optimizer.as_mut());
            }

            if e % self.config.disp_epoch == 0 {
                let mut stats = EpochStats::new(e, max_epochs, &train_result, &valid_result);
                stats.learning_rate = self.optimizer.learning_rate();
                stats.elapsed_ms = summary_start.elapsed().as_millis() as u64;
                info!("{stats}");
                summary_start = Instant::now();
            }

            self.checkpoints.save(&format!("log_epoch_{e}"), &self.net)?;
            let plot_path = self.config.log_dir.join(format!("log_epoch_{e}.png"));
            self.plotter.plot(&history, Some(&plot_path))?;
            if self.config.save_history {
                history.save_json(self.config.log_dir.join("history.json"))?;
            }
        }

        Ok(history)
    }

    pub fn train_epoch(&mut self, source: &mut dyn BatchSource) -> Result<PhaseResult> {
        loop_fn::train_epoch(&mut self.net, self.optimizer.as_mut(), source, self.config.disp_step)
    }

    pub fn valid_epoch(&mut self, source: &mut dyn BatchSource) -> Result<PhaseResult> {
        loop_fn::eval_epoch(&mut self.net, source, Phase::Valid, self.config.disp_step)
    }

    /// One evaluation pass over a held-out source. History, checkpoints and
    /// plots are left untouched.
    pub fn test(&mut self, source: &mut dyn BatchSource) -> Result<PhaseResult> {
        info!("===== Test Start =====");
        loop_fn::eval_epoch(&mut self.net, source, Phase::Test, self.config.disp_step)
    }

    pub fn model(&self) -> &SegNet {
        &self.net
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }
}
