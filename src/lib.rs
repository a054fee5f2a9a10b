pub mod error;
pub mod math;
pub mod tensor;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod schedule;
pub mod metrics;
pub mod data;
pub mod persist;
pub mod train;
pub mod cli;

// Convenience re-exports
pub use error::{Result, SegError};
pub use math::matrix::Matrix;
pub use tensor::{ImageBatch, LabelMap, Logits, Mask};
pub use activation::activation::ActivationFunction;
pub use network::{EvalScope, Mode, ModelOutput, NetSpec, SegNet};
pub use loss::CrossEntropyLoss;
pub use optim::{Adam, Optimizer, OptimizerKind, Sgd};
pub use schedule::{CosineWarmRestarts, LrSchedule, ScheduleConfig};
pub use metrics::{batch_iou_sum, IouAccumulator};
pub use data::{Batch, BatchSource, InMemoryDataset, Labels, Sample, SyntheticConfig};
pub use persist::{CheckpointSink, JsonCheckpoints, PlotSink, PngPlotter};
pub use train::{History, PhaseResult, Trainer, TrainerConfig};
