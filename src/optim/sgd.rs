use crate::network::network::SegNet;
use crate::optim::Optimizer;

/// Plain stochastic gradient descent: `p -= lr * g`.
#[derive(Debug, Clone)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, net: &mut SegNet) {
        let lr = self.learning_rate;
        for layer in &mut net.layers {
            for (param, grad) in layer.params_and_grads() {
                for (p, g) in param.data.iter_mut().zip(&grad.data) {
                    *p -= lr * g;
                }
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
