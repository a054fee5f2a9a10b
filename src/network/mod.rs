pub mod mode;
pub mod network;
pub mod spec;

pub use mode::{EvalScope, Mode};
pub use network::{ModelOutput, SegNet};
pub use spec::NetSpec;
