use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;
use serde::{Deserialize, Serialize};

use crate::data::source::InMemoryDataset;
use crate::data::synthetic::{self, SyntheticConfig};
use crate::network::network::SegNet;
use crate::network::spec::NetSpec;
use crate::train::epoch_stats::PhaseResult;
use crate::train::loop_fn::{self, Phase};
use crate::train::train_config::TrainerConfig;
use crate::train::trainer::Trainer;

/// Everything a command-line run needs: trainer settings, architecture and
/// the synthetic data it trains on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub trainer: TrainerConfig,
    pub model: NetSpec,
    pub data: SyntheticConfig,
    pub train_samples: usize,
    pub valid_samples: usize,
    pub test_samples: usize,
    pub batch_size: usize,
    /// Seeds weight init, data generation and shuffling.
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            trainer: TrainerConfig::default(),
            model: NetSpec { in_channels: SyntheticConfig::default().channels, ..NetSpec::default() },
            data: SyntheticConfig::default(),
            train_samples: 256,
            valid_samples: 64,
            test_samples: 64,
            batch_size: 8,
            seed: 42,
        }
    }
}

impl RunConfig {
    pub fn load_json(path: &std::path::Path) -> anyhow::Result<RunConfig> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open config {}", path.display()))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    fn dataset(&self, count: usize, seed_offset: u64, shuffle: bool) -> anyhow::Result<InMemoryDataset> {
        let samples = synthetic::generate(&self.data, count, self.seed.wrapping_add(seed_offset))?;
        let ds = InMemoryDataset::new(samples, self.batch_size)?;
        Ok(if shuffle { ds.shuffled(self.seed) } else { ds })
    }
}

#[derive(Parser, Debug)]
#[command(name = "ferrite-seg", about = "Train and evaluate a two-class segmentation network")]
pub struct Cli {
    /// JSON run configuration; missing fields take their defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Overrides the configured seed.
    #[arg(long, global = true)]
    pub seed: Option<u64>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train for the configured number of epochs, checkpointing and plotting each one.
    Train {
        #[arg(long)]
        epochs: Option<usize>,
        /// Optimizer name (sgd | adam).
        #[arg(long)]
        optimizer: Option<String>,
        #[arg(long)]
        lr: Option<f64>,
        #[arg(long)]
        log_dir: Option<PathBuf>,
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
    },
    /// Evaluate a saved checkpoint on freshly generated held-out data.
    Test {
        #[arg(long)]
        checkpoint: PathBuf,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut cfg = match &cli.config {
        Some(path) => RunConfig::load_json(path)?,
        None => RunConfig::default(),
    };
    if let Some(seed) = cli.seed {
        cfg.seed = seed;
    }

    match cli.command {
        Command::Train { epochs, optimizer, lr, log_dir, checkpoint_dir } => {
            if let Some(e) = epochs {
                cfg.trainer.max_epochs = e;
            }
            if let Some(o) = optimizer {
                cfg.trainer.optimizer = o;
            }
            if let Some(lr) = lr {
                cfg.trainer.learning_rate = lr;
            }
            if let Some(dir) = log_dir {
                cfg.trainer.log_dir = dir;
            }
            if let Some(dir) = checkpoint_dir {
                cfg.trainer.checkpoint_dir = dir;
            }
            run_train(&cfg)
        }
        Command::Test { checkpoint } => {
            let result = run_test(&cfg, &checkpoint)?;
            println!(
                "Test loss: {:.6}, miou: {:.6}, iou_back: {:.6}, iou_fore: {:.6}",
                result.loss, result.miou, result.class_iou[0], result.class_iou[1]
            );
            Ok(())
        }
    }
}

pub fn run_train(cfg: &RunConfig) -> anyhow::Result<()> {
    // Fail on a bad optimizer name before generating any data.
    cfg.trainer.validate()?;

    let net = SegNet::new(cfg.model.clone(), cfg.seed)?;
    let mut trainer = Trainer::new(net, cfg.trainer.clone())?;
    std::fs::create_dir_all(&cfg.trainer.checkpoint_dir).with_context(|| {
        format!("failed to create checkpoint dir {}", cfg.trainer.checkpoint_dir.display())
    })?;

    let mut train = cfg.dataset(cfg.train_samples, 0, true)?;
    let mut valid = cfg.dataset(cfg.valid_samples, 1, false)?;
    info!(
        "synthetic data: {} train / {} valid samples, batch size {}",
        train.sample_count(),
        valid.sample_count(),
        cfg.batch_size
    );

    let history = trainer.train(&mut train, &mut valid)?;
    if let (Some(loss), Some(miou)) = (history.valid_loss.last(), history.valid_miou.last()) {
        info!("finished {} epochs: valid loss {loss:.6}, valid miou {miou:.6}", history.epochs());
    }
    Ok(())
}

/// Evaluates a checkpoint on held-out data. Nothing is written: no log
/// directory, checkpoint or plot.
pub fn run_test(cfg: &RunConfig, checkpoint: &std::path::Path) -> anyhow::Result<PhaseResult> {
    let mut net = SegNet::load_json(checkpoint)
        .with_context(|| format!("failed to load checkpoint {}", checkpoint.display()))?;
    let mut test = cfg.dataset(cfg.test_samples, 2, false)?;
    info!("===== Test Start =====");
    Ok(loop_fn::eval_epoch(&mut net, &mut test, Phase::Test, cfg.trainer.disp_step)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_subcommand_overrides() {
        let cli = Cli::try_parse_from([
            "ferrite-seg", "--seed", "7", "train", "--epochs", "2", "--optimizer", "SGD",
        ])
        .unwrap();
        assert_eq!(cli.seed, Some(7));
        match cli.command {
            Command::Train { epochs, optimizer, .. } => {
                assert_eq!(epochs, Some(2));
                assert_eq!(optimizer.as_deref(), Some("SGD"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_subcommand_requires_checkpoint() {
        assert!(Cli::try_parse_from(["ferrite-seg", "test"]).is_err());
    }

    #[test]
    fn default_model_matches_default_data() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.model.in_channels, cfg.data.channels);
    }

    #[test]
    fn test_command_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = RunConfig {
            data: SyntheticConfig { height: 4, width: 4, ..SyntheticConfig::default() },
            test_samples: 6,
            batch_size: 3,
            ..RunConfig::default()
        };
        cfg.trainer.log_dir = dir.path().join("logs");
        cfg.trainer.checkpoint_dir = dir.path().join("ckpt");

        let checkpoint = dir.path().join("model.json");
        SegNet::new(cfg.model.clone(), cfg.seed).unwrap().save_json(&checkpoint).unwrap();

        let result = run_test(&cfg, &checkpoint).unwrap();
        assert_eq!(result.batches, 2);
        assert!((0.0..=1.0).contains(&result.miou));
        assert!(!cfg.trainer.log_dir.exists());
        assert!(!cfg.trainer.checkpoint_dir.exists());
    }
}
