pub mod epoch_stats;
pub mod history;
pub mod loop_fn;
pub mod train_config;
pub mod trainer;

pub use epoch_stats::{EpochStats, PhaseResult};
pub use history::{History, Metric};
pub use loop_fn::{eval_epoch, train_epoch, Phase};
pub use train_config::TrainerConfig;
pub use trainer::Trainer;
