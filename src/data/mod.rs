pub mod source;
pub mod synthetic;

pub use source::{Batch, BatchSource, InMemoryDataset, Labels, Sample};
pub use synthetic::SyntheticConfig;
