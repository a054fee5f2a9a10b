//! Fixed-rank containers for the data flowing through a training step.
//!
//! All buffers are contiguous and row-major in the order their shape names
//! them (`[N, C, H, W]` etc).

use serde::{Serialize, Deserialize};

use crate::error::{Result, SegError};
use crate::math::matrix::Matrix;

/// Network input, shape `[N, C, H, W]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBatch {
    pub n: usize,
    pub c: usize,
    pub h: usize,
    pub w: usize,
    pub data: Vec<f64>,
}

impl ImageBatch {
    pub fn new(n: usize, c: usize, h: usize, w: usize, data: Vec<f64>) -> Result<ImageBatch> {
        check_len(&[n, c, h, w], data.len())?;
        Ok(ImageBatch { n, c, h, w, data })
    }

    pub fn shape(&self) -> [usize; 4] {
        [self.n, self.c, self.h, self.w]
    }

    /// Concatenates single-sample images along the batch axis.
    pub fn stack(samples: &[&ImageBatch]) -> Result<ImageBatch> {
        let first = samples.first().ok_or(SegError::EmptySource)?;
        let mut data = Vec::with_capacity(first.data.len() * samples.len());
        let mut n = 0;
        for s in samples {
            if (s.c, s.h, s.w) != (first.c, first.h, first.w) {
                return Err(SegError::ShapeMismatch {
                    expected: first.shape().to_vec(),
                    found: s.shape().to_vec(),
                });
            }
            n += s.n;
            data.extend_from_slice(&s.data);
        }
        Ok(ImageBatch { n, c: first.c, h: first.h, w: first.w, data })
    }

    /// Rearranges to `[N * H * W, C]`: one row per pixel, one column per channel.
    pub fn to_pixel_rows(&self) -> Matrix {
        let plane = self.h * self.w;
        let mut out = Matrix::zeros(self.n * plane, self.c);
        for b in 0..self.n {
            for ch in 0..self.c {
                let src = &self.data[(b * self.c + ch) * plane..(b * self.c + ch + 1) * plane];
                for (p, &v) in src.iter().enumerate() {
                    out.set(b * plane + p, ch, v);
                }
            }
        }
        out
    }
}

/// Integer ground truth, shape `[N, H, W]`, class ids in `0..num_class`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMap {
    pub n: usize,
    pub h: usize,
    pub w: usize,
    pub data: Vec<usize>,
}

impl LabelMap {
    pub fn new(n: usize, h: usize, w: usize, data: Vec<usize>) -> Result<LabelMap> {
        check_len(&[n, h, w], data.len())?;
        Ok(LabelMap { n, h, w, data })
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.n, self.h, self.w]
    }

    pub fn stack(samples: &[&LabelMap]) -> Result<LabelMap> {
        let first = samples.first().ok_or(SegError::EmptySource)?;
        let mut data = Vec::with_capacity(first.data.len() * samples.len());
        let mut n = 0;
        for s in samples {
            if (s.h, s.w) != (first.h, first.w) {
                return Err(SegError::ShapeMismatch {
                    expected: first.shape().to_vec(),
                    found: s.shape().to_vec(),
                });
            }
            n += s.n;
            data.extend_from_slice(&s.data);
        }
        Ok(LabelMap { n, h: first.h, w: first.w, data })
    }

    /// Pixels equal to `class`.
    pub fn class_mask(&self, class: usize) -> Mask {
        Mask {
            n: self.n,
            h: self.h,
            w: self.w,
            data: self.data.iter().map(|&c| c == class).collect(),
        }
    }
}

/// Binary mask, shape `[N, H, W]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub n: usize,
    pub h: usize,
    pub w: usize,
    pub data: Vec<bool>,
}

impl Mask {
    pub fn new(n: usize, h: usize, w: usize, data: Vec<bool>) -> Result<Mask> {
        check_len(&[n, h, w], data.len())?;
        Ok(Mask { n, h, w, data })
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.n, self.h, self.w]
    }

    pub fn not(&self) -> Mask {
        Mask {
            n: self.n,
            h: self.h,
            w: self.w,
            data: self.data.iter().map(|&b| !b).collect(),
        }
    }

    /// The `H * W` slice belonging to sample `i`.
    pub fn sample(&self, i: usize) -> &[bool] {
        let plane = self.h * self.w;
        &self.data[i * plane..(i + 1) * plane]
    }
}

/// Per-pixel class scores, shape `[N, K, H, W]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Logits {
    pub n: usize,
    pub classes: usize,
    pub h: usize,
    pub w: usize,
    pub data: Vec<f64>,
}

impl Logits {
    pub fn new(n: usize, classes: usize, h: usize, w: usize, data: Vec<f64>) -> Result<Logits> {
        check_len(&[n, classes, h, w], data.len())?;
        Ok(Logits { n, classes, h, w, data })
    }

    pub fn shape(&self) -> [usize; 4] {
        [self.n, self.classes, self.h, self.w]
    }

    #[inline]
    pub fn at(&self, b: usize, class: usize, pixel: usize) -> f64 {
        let plane = self.h * self.w;
        self.data[(b * self.classes + class) * plane + pixel]
    }

    /// Inverse of [`Logits::to_pixel_rows`].
    pub fn from_pixel_rows(rows: &Matrix, n: usize, h: usize, w: usize) -> Result<Logits> {
        let plane = h * w;
        if rows.rows != n * plane {
            return Err(SegError::ShapeMismatch {
                expected: vec![n * plane, rows.cols],
                found: vec![rows.rows, rows.cols],
            });
        }
        let classes = rows.cols;
        let mut data = vec![0.0; n * classes * plane];
        for b in 0..n {
            for p in 0..plane {
                for k in 0..classes {
                    data[(b * classes + k) * plane + p] = rows.get(b * plane + p, k);
                }
            }
        }
        Ok(Logits { n, classes, h, w, data })
    }

    /// `[N * H * W, K]` view, pixel-major.
    pub fn to_pixel_rows(&self) -> Matrix {
        let plane = self.h * self.w;
        let mut out = Matrix::zeros(self.n * plane, self.classes);
        for b in 0..self.n {
            for k in 0..self.classes {
                for p in 0..plane {
                    out.set(b * plane + p, k, self.at(b, k, p));
                }
            }
        }
        out
    }

    /// Index of the highest score per pixel; ties go to the lowest index.
    pub fn argmax(&self) -> LabelMap {
        let plane = self.h * self.w;
        let mut data = Vec::with_capacity(self.n * plane);
        for b in 0..self.n {
            for p in 0..plane {
                let mut best = 0;
                for k in 1..self.classes {
                    if self.at(b, k, p) > self.at(b, best, p) {
                        best = k;
                    }
                }
                data.push(best);
            }
        }
        LabelMap { n: self.n, h: self.h, w: self.w, data }
    }
}

fn check_len(shape: &[usize], len: usize) -> Result<()> {
    let expected: usize = shape.iter().product();
    if expected != len {
        return Err(SegError::ShapeMismatch {
            expected: shape.to_vec(),
            found: vec![len],
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_rows_round_trip_through_logits() {
        // 1 sample, 2 classes, 1x2 image
        let logits = Logits::new(1, 2, 1, 2, vec![0.1, 0.2, 0.9, 0.8]).unwrap();
        let rows = logits.to_pixel_rows();
        assert_eq!(rows.data, vec![0.1, 0.9, 0.2, 0.8]);
        assert_eq!(Logits::from_pixel_rows(&rows, 1, 1, 2).unwrap(), logits);
    }

    #[test]
    fn argmax_breaks_ties_towards_class_zero() {
        let logits = Logits::new(1, 2, 1, 3, vec![1.0, 0.0, 0.5, 1.0, 2.0, 0.5]).unwrap();
        assert_eq!(logits.argmax().data, vec![0, 1, 0]);
    }

    #[test]
    fn image_channels_become_columns() {
        let img = ImageBatch::new(1, 2, 1, 2, vec![1.0, 2.0, 10.0, 20.0]).unwrap();
        assert_eq!(img.to_pixel_rows().data, vec![1.0, 10.0, 2.0, 20.0]);
    }

    #[test]
    fn buffer_length_is_checked() {
        assert!(matches!(
            LabelMap::new(1, 2, 2, vec![0; 3]),
            Err(SegError::ShapeMismatch { .. })
        ));
    }
}
