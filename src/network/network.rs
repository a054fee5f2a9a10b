use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};

use crate::error::{Result, SegError};
use crate::layers::dense::Layer;
use crate::math::matrix::Matrix;
use crate::network::mode::Mode;
use crate::network::spec::NetSpec;
use crate::tensor::{ImageBatch, Logits};

/// What a forward pass hands back. `out` holds the per-pixel class logits.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub out: Logits,
}

fn grad_on() -> bool {
    true
}

/// Stack of pixel-wise dense layers turning `[N, C, H, W]` images into
/// `[N, num_class, H, W]` logits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegNet {
    pub spec: NetSpec,
    pub layers: Vec<Layer>,
    #[serde(skip)]
    mode: Mode,
    #[serde(skip, default = "grad_on")]
    grad_enabled: bool,
}

impl SegNet {
    /// Builds a network with weights drawn from a generator seeded by `seed`,
    /// so two networks built from the same spec and seed are identical.
    pub fn new(spec: NetSpec, seed: u64) -> Result<SegNet> {
        spec.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let layers = spec
            .layer_shapes()
            .into_iter()
            .map(|(input, output, activation)| Layer::new(input, output, activation, &mut rng))
            .collect();
        Ok(SegNet { spec, layers, mode: Mode::Train, grad_enabled: true })
    }

    /// Forward pass. Inputs and pre-activations are kept for `backward` only
    /// in train mode with gradient recording enabled.
    pub fn forward(&mut self, input: &ImageBatch) -> Result<ModelOutput> {
        if input.c != self.spec.in_channels {
            return Err(SegError::ShapeMismatch {
                expected: vec![input.n, self.spec.in_channels, input.h, input.w],
                found: input.shape().to_vec(),
            });
        }
        let record = self.records_gradients();
        let mut current = input.to_pixel_rows();
        for layer in &mut self.layers {
            current = layer.forward(&current, record)?;
        }
        let out = Logits::from_pixel_rows(&current, input.n, input.h, input.w)?;
        Ok(ModelOutput { out })
    }

    /// Backpropagates `grad` (dL/dlogits as `[N * H * W, K]` pixel rows),
    /// accumulating into every layer's gradient buffers.
    pub fn backward(&mut self, grad: &Matrix) -> Result<()> {
        let mut delta = grad.clone();
        for layer in self.layers.iter_mut().rev() {
            delta = layer.backward(&delta)?;
        }
        Ok(())
    }

    pub fn zero_grad(&mut self) {
        self.layers.iter_mut().for_each(Layer::zero_grad);
    }

    pub fn train(&mut self) {
        self.mode = Mode::Train;
    }

    pub fn eval(&mut self) {
        self.mode = Mode::Eval;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_grad_enabled(&mut self, enabled: bool) {
        self.grad_enabled = enabled;
    }

    pub fn is_grad_enabled(&self) -> bool {
        self.grad_enabled
    }

    pub fn records_gradients(&self) -> bool {
        self.mode == Mode::Train && self.grad_enabled
    }

    pub(crate) fn clear_tapes(&mut self) {
        self.layers.iter_mut().for_each(Layer::clear_tape);
    }

    pub fn param_count(&self) -> usize {
        self.layers.iter().map(Layer::param_count).sum()
    }

    /// Serializes the architecture and weights to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Loads a network written by `save_json`. Gradient buffers start zeroed
    /// and the network is in train mode.
    pub fn load_json(path: impl AsRef<Path>) -> Result<SegNet> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let mut net: SegNet = serde_json::from_reader(reader)?;
        net.spec.validate()?;
        net.zero_grad();
        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::mode::EvalScope;

    fn tiny() -> SegNet {
        SegNet::new(NetSpec { in_channels: 1, hidden: vec![3], ..NetSpec::default() }, 11).unwrap()
    }

    fn image() -> ImageBatch {
        ImageBatch::new(2, 1, 2, 2, vec![0.0, 0.5, 1.0, 0.25, 1.0, 0.0, 0.5, 0.75]).unwrap()
    }

    #[test]
    fn forward_yields_two_class_logits() {
        let out = tiny().forward(&image()).unwrap().out;
        assert_eq!(out.shape(), [2, 2, 2, 2]);
    }

    #[test]
    fn same_seed_same_weights() {
        let a = tiny();
        let b = tiny();
        for (la, lb) in a.layers.iter().zip(&b.layers) {
            assert_eq!(la.weights, lb.weights);
        }
    }

    #[test]
    fn eval_scope_restores_mode_and_blocks_backward() {
        let mut net = tiny();
        let grad = Matrix::zeros(8, 2);
        {
            let mut scoped = EvalScope::enter(&mut net);
            assert_eq!(scoped.mode(), Mode::Eval);
            scoped.forward(&image()).unwrap();
            assert!(matches!(scoped.backward(&grad), Err(SegError::NoGradientTape)));
        }
        assert_eq!(net.mode(), Mode::Train);
        assert!(net.is_grad_enabled());
    }

    #[test]
    fn wrong_channel_count_is_rejected() {
        let img = ImageBatch::new(1, 3, 1, 1, vec![0.0; 3]).unwrap();
        assert!(matches!(tiny().forward(&img), Err(SegError::ShapeMismatch { .. })));
    }

    #[test]
    fn json_round_trip_keeps_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        let net = tiny();
        net.save_json(&path).unwrap();
        let loaded = SegNet::load_json(&path).unwrap();
        assert_eq!(loaded.spec, net.spec);
        assert_eq!(loaded.layers[0].weights, net.layers[0].weights);
        assert!(loaded.is_grad_enabled());
    }
}
