pub mod checkpoint;
pub mod plot;

pub use checkpoint::{CheckpointSink, JsonCheckpoints};
pub use plot::{PlotSink, PngPlotter};
