use crate::error::{Result, SegError};
use crate::math::matrix::Matrix;
use crate::tensor::{LabelMap, Logits};

/// Pixel-wise softmax cross-entropy with mean reduction over `N * H * W`.
pub struct CrossEntropyLoss;

/// Loss value plus its gradient with respect to the logits, laid out as
/// `[N * H * W, K]` pixel rows to feed straight into the network's backward pass.
#[derive(Debug, Clone)]
pub struct LossOutput {
    pub loss: f64,
    pub grad: Matrix,
}

impl CrossEntropyLoss {
    /// Scalar loss only; used by evaluation phases.
    pub fn loss(logits: &Logits, labels: &LabelMap) -> Result<f64> {
        Ok(Self::forward(logits, labels, false)?.loss)
    }

    /// Loss and gradient. The combined softmax + CE gradient per pixel is
    /// `(softmax(z) - onehot(y)) / (N * H * W)`.
    pub fn loss_and_grad(logits: &Logits, labels: &LabelMap) -> Result<LossOutput> {
        Self::forward(logits, labels, true)
    }

    fn forward(logits: &Logits, labels: &LabelMap, want_grad: bool) -> Result<LossOutput> {
        if [logits.n, logits.h, logits.w] != labels.shape() {
            return Err(SegError::ShapeMismatch {
                expected: vec![logits.n, logits.h, logits.w],
                found: labels.shape().to_vec(),
            });
        }
        if let Some(&bad) = labels.data.iter().find(|&&c| c >= logits.classes) {
            return Err(SegError::ClassCount { expected: logits.classes, found: bad + 1 });
        }

        let rows = logits.to_pixel_rows();
        let pixels = rows.rows;
        let scale = 1.0 / pixels as f64;
        let mut total = 0.0;
        let mut grad = if want_grad { Matrix::zeros(pixels, rows.cols) } else { Matrix::default() };

        for (r, &target) in labels.data.iter().enumerate() {
            let z = rows.row(r);
            // log-sum-exp with the max subtracted
            let max = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let sum_exp: f64 = z.iter().map(|&v| (v - max).exp()).sum();
            let log_norm = max + sum_exp.ln();
            total += log_norm - z[target];

            if want_grad {
                for (k, &v) in z.iter().enumerate() {
                    let p = (v - log_norm).exp();
                    let y = if k == target { 1.0 } else { 0.0 };
                    grad.set(r, k, (p - y) * scale);
                }
            }
        }

        Ok(LossOutput { loss: total * scale, grad })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_logits_give_ln_k() {
        let logits = Logits::new(1, 2, 1, 2, vec![0.0; 4]).unwrap();
        let labels = LabelMap::new(1, 1, 2, vec![0, 1]).unwrap();
        let loss = CrossEntropyLoss::loss(&logits, &labels).unwrap();
        assert!((loss - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn gradient_rows_sum_to_zero() {
        let logits = Logits::new(1, 2, 1, 3, vec![0.3, -1.0, 2.0, 0.1, 0.5, -0.2]).unwrap();
        let labels = LabelMap::new(1, 1, 3, vec![1, 0, 1]).unwrap();
        let out = CrossEntropyLoss::loss_and_grad(&logits, &labels).unwrap();
        for r in 0..out.grad.rows {
            let s: f64 = out.grad.row(r).iter().sum();
            assert!(s.abs() < 1e-12);
        }
        // the target column is always pushed up
        assert!(out.grad.get(0, 1) < 0.0);
        assert!(out.grad.get(1, 0) < 0.0);
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let data = vec![0.3, -1.0, 0.1, 0.5];
        let labels = LabelMap::new(1, 1, 2, vec![1, 0]).unwrap();
        let base = Logits::new(1, 2, 1, 2, data.clone()).unwrap();
        let analytic = CrossEntropyLoss::loss_and_grad(&base, &labels).unwrap().grad;

        let eps = 1e-6;
        let mut bumped = data.clone();
        bumped[0] += eps; // class 0, pixel 0
        let up = CrossEntropyLoss::loss(&Logits::new(1, 2, 1, 2, bumped).unwrap(), &labels).unwrap();
        let down = CrossEntropyLoss::loss(&base, &labels).unwrap();
        let numeric = (up - down) / eps;
        assert!((numeric - analytic.get(0, 0)).abs() < 1e-5);
    }

    #[test]
    fn out_of_range_label_is_rejected() {
        let logits = Logits::new(1, 2, 1, 1, vec![0.0, 0.0]).unwrap();
        let labels = LabelMap::new(1, 1, 1, vec![2]).unwrap();
        assert!(CrossEntropyLoss::loss(&logits, &labels).is_err());
    }
}
