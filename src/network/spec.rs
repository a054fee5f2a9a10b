use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{Result, SegError};
use crate::metrics::iou::NUM_CLASSES;

/// Architecture of a pixel-wise segmentation network.
///
/// Each entry of `hidden` is the width of one 1x1 layer; a final identity
/// layer maps to `num_class` logits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetSpec {
    pub in_channels: usize,
    #[serde(default)]
    pub hidden: Vec<usize>,
    pub activation: ActivationFunction,
    pub num_class: usize,
}

impl Default for NetSpec {
    fn default() -> Self {
        NetSpec {
            in_channels: 3,
            hidden: vec![16, 16],
            activation: ActivationFunction::ReLU,
            num_class: NUM_CLASSES,
        }
    }
}

impl NetSpec {
    pub fn validate(&self) -> Result<()> {
        if self.in_channels == 0 {
            return Err(SegError::InvalidConfig("in_channels must be at least 1".into()));
        }
        if self.hidden.iter().any(|&w| w == 0) {
            return Err(SegError::InvalidConfig("hidden layer widths must be at least 1".into()));
        }
        if self.num_class != NUM_CLASSES {
            return Err(SegError::ClassCount { expected: NUM_CLASSES, found: self.num_class });
        }
        Ok(())
    }

    /// `(in, out, activation)` for every layer, input to output.
    pub fn layer_shapes(&self) -> Vec<(usize, usize, ActivationFunction)> {
        let mut shapes = Vec::with_capacity(self.hidden.len() + 1);
        let mut width = self.in_channels;
        for &h in &self.hidden {
            shapes.push((width, h, self.activation));
            width = h;
        }
        shapes.push((width, self.num_class, ActivationFunction::Identity));
        shapes
    }
}
