use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{activation::activation::ActivationFunction, error::{Result, SegError}, math::matrix::Matrix};

/// Values cached by a recording forward pass, consumed by `backward`.
#[derive(Debug, Clone, Default)]
struct Tape {
    input: Matrix,
    /// Pre-activation `z = xW + b`; the activation derivative is taken here.
    pre: Matrix,
}

/// Fully-connected layer applied independently to every row.
///
/// Fed with one row per pixel this is a 1x1 convolution. Gradients are
/// accumulated into `weight_grad` / `bias_grad` until `zero_grad` clears them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub in_features: usize,
    pub out_features: usize,
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction,
    #[serde(skip)]
    pub weight_grad: Matrix,
    #[serde(skip)]
    pub bias_grad: Matrix,
    #[serde(skip)]
    tape: Option<Tape>,
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        let weights = if activation.prefers_he_init() {
            Matrix::he(in_features, out_features, rng)
        } else {
            Matrix::xavier(in_features, out_features, rng)
        };

        Layer {
            in_features,
            out_features,
            weights,
            biases: Matrix::zeros(1, out_features),
            activator: activation,
            weight_grad: Matrix::zeros(in_features, out_features),
            bias_grad: Matrix::zeros(1, out_features),
            tape: None,
        }
    }

    /// Forward pass over a `[rows, in_features]` matrix.
    ///
    /// With `record` set the input and pre-activation are kept for `backward`;
    /// otherwise any previously recorded tape is dropped.
    pub fn forward(&mut self, input: &Matrix, record: bool) -> Result<Matrix> {
        if input.cols != self.in_features {
            return Err(SegError::ShapeMismatch {
                expected: vec![input.rows, self.in_features],
                found: vec![input.rows, input.cols],
            });
        }
        let z = (input * &self.weights).add_row(&self.biases);
        let a = z.map(|x| self.activator.function(x));
        self.tape = record.then(|| Tape { input: input.clone(), pre: z });
        Ok(a)
    }

    /// Accumulates parameter gradients from `grad_out` (dL/da for this
    /// layer's output) and returns dL/dx for the layer input.
    pub fn backward(&mut self, grad_out: &Matrix) -> Result<Matrix> {
        let tape = self.tape.take().ok_or(SegError::NoGradientTape)?;
        let act_derivative = tape.pre.map(|x| self.activator.derivative(x));
        let delta = grad_out.hadamard(&act_derivative);

        self.weight_grad = &self.weight_grad + &(&tape.input.transpose() * &delta);
        self.bias_grad = &self.bias_grad + &delta.sum_rows();

        Ok(&delta * &self.weights.transpose())
    }

    pub fn zero_grad(&mut self) {
        if self.weight_grad.rows != self.in_features || self.weight_grad.cols != self.out_features {
            self.weight_grad = Matrix::zeros(self.in_features, self.out_features);
            self.bias_grad = Matrix::zeros(1, self.out_features);
        } else {
            self.weight_grad.fill(0.0);
            self.bias_grad.fill(0.0);
        }
    }

    pub fn clear_tape(&mut self) {
        self.tape = None;
    }

    /// `(parameter, gradient)` pairs in a fixed order: weights, then biases.
    pub fn params_and_grads(&mut self) -> [(&mut Matrix, &Matrix); 2] {
        let Layer { weights, biases, weight_grad, bias_grad, .. } = self;
        [(weights, &*weight_grad), (biases, &*bias_grad)]
    }

    pub fn param_count(&self) -> usize {
        self.weights.data.len() + self.biases.data.len()
    }
}
