use crate::network::network::SegNet;
use crate::optim::Optimizer;

pub const DEFAULT_BETA1: f64 = 0.9;
pub const DEFAULT_BETA2: f64 = 0.999;
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Adam with bias-corrected moments.
///
/// Moment buffers are laid out in the same order as
/// `Layer::params_and_grads` visits parameters and are sized lazily on the
/// first step.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    beta1_t: f64,
    beta2_t: f64,
    epsilon: f64,
    m: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self::with_hyperparams(learning_rate, DEFAULT_BETA1, DEFAULT_BETA2, DEFAULT_EPSILON)
    }

    pub fn with_hyperparams(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            epsilon,
            m: Vec::new(),
            v: Vec::new(),
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, net: &mut SegNet) {
        let Self { learning_rate: lr, beta1: b1, beta2: b2, epsilon: eps, .. } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;
        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        let mut slot = 0;
        for layer in &mut net.layers {
            for (param, grad) in layer.params_and_grads() {
                if self.m.len() <= slot {
                    self.m.push(vec![0.; param.data.len()]);
                    self.v.push(vec![0.; param.data.len()]);
                }
                param
                    .data
                    .iter_mut()
                    .zip(&grad.data)
                    .zip(self.m[slot].iter_mut())
                    .zip(self.v[slot].iter_mut())
                    .for_each(|(((p, g), m), v)| {
                        *m = b1 * *m + (1. - b1) * g;
                        *v = b2 * *v + (1. - b2) * g.powi(2);
                        *p -= step_size * *m / (v.sqrt() + eps);
                    });
                slot += 1;
            }
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }
}
