//! Generated image/mask pairs: noisy dark backgrounds crossed by bright
//! straight "scratches". Some images carry no scratch at all.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::source::Sample;
use crate::error::{Result, SegError};
use crate::tensor::{ImageBatch, LabelMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    /// Standard deviation-ish amplitude of the uniform pixel noise.
    pub noise: f64,
    /// Probability that an image has no foreground.
    pub empty_ratio: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        SyntheticConfig { channels: 3, height: 16, width: 16, noise: 0.15, empty_ratio: 0.1 }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 || self.height == 0 || self.width == 0 {
            return Err(SegError::InvalidConfig("synthetic images need non-zero dimensions".into()));
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(SegError::InvalidConfig(format!(
                "synthetic noise must be a finite non-negative amplitude, got {}",
                self.noise
            )));
        }
        if !(0.0..=1.0).contains(&self.empty_ratio) {
            return Err(SegError::InvalidConfig(format!(
                "synthetic empty_ratio must lie in [0, 1], got {}",
                self.empty_ratio
            )));
        }
        Ok(())
    }
}

/// Draws `count` samples from a generator seeded with `seed`.
pub fn generate(config: &SyntheticConfig, count: usize, seed: u64) -> Result<Vec<Sample>> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| one(config, &mut rng)).collect()
}

fn one(config: &SyntheticConfig, rng: &mut StdRng) -> Result<Sample> {
    let (c, h, w) = (config.channels, config.height, config.width);
    let plane = h * w;
    let mut mask = vec![0usize; plane];

    if !rng.gen_bool(config.empty_ratio) {
        // Segment between two random points, a couple of pixels thick.
        let (y0, x0) = (rng.gen_range(0..h) as f64, rng.gen_range(0..w) as f64);
        let (y1, x1) = (rng.gen_range(0..h) as f64, rng.gen_range(0..w) as f64);
        let thickness = rng.gen_range(0.6..1.6);
        for y in 0..h {
            for x in 0..w {
                if distance_to_segment((y as f64, x as f64), (y0, x0), (y1, x1)) <= thickness {
                    mask[y * w + x] = 1;
                }
            }
        }
    }

    let mut data = Vec::with_capacity(c * plane);
    for ch in 0..c {
        let tint = 0.05 * ch as f64;
        for &m in &mask {
            let base = if m == 1 { 0.8 - tint } else { 0.2 + tint };
            let jitter = rng.gen_range(-config.noise..=config.noise);
            data.push((base + jitter).clamp(0.0, 1.0));
        }
    }

    Ok(Sample {
        image: ImageBatch::new(1, c, h, w, data)?,
        mask: LabelMap::new(1, h, w, mask)?,
    })
}

fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dy, dx) = (b.0 - a.0, b.1 - a.1);
    let len2 = dy * dy + dx * dx;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dy + (p.1 - a.1) * dx) / len2).clamp(0.0, 1.0)
    };
    let (cy, cx) = (a.0 + t * dy, a.1 + t * dx);
    ((p.0 - cy).powi(2) + (p.1 - cx).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_data() {
        let cfg = SyntheticConfig::default();
        assert_eq!(generate(&cfg, 3, 5).unwrap(), generate(&cfg, 3, 5).unwrap());
    }

    #[test]
    fn masks_are_binary_and_shaped() {
        let cfg = SyntheticConfig { height: 8, width: 6, ..SyntheticConfig::default() };
        for s in generate(&cfg, 10, 1).unwrap() {
            assert_eq!(s.image.shape(), [1, 3, 8, 6]);
            assert_eq!(s.mask.shape(), [1, 8, 6]);
            assert!(s.mask.data.iter().all(|&v| v <= 1));
        }
    }

    #[test]
    fn all_empty_when_ratio_is_one() {
        let cfg = SyntheticConfig { empty_ratio: 1.0, ..SyntheticConfig::default() };
        for s in generate(&cfg, 4, 2).unwrap() {
            assert!(s.mask.data.iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn bad_noise_or_ratio_is_rejected_before_sampling() {
        let base = SyntheticConfig::default();
        for cfg in [
            SyntheticConfig { noise: -0.1, ..base.clone() },
            SyntheticConfig { noise: f64::NAN, ..base.clone() },
            SyntheticConfig { empty_ratio: f64::NAN, ..base.clone() },
            SyntheticConfig { empty_ratio: 1.5, ..base.clone() },
        ] {
            assert!(matches!(generate(&cfg, 2, 0), Err(SegError::InvalidConfig(_))), "{cfg:?}");
        }
    }

    #[test]
    fn zero_noise_is_allowed() {
        let cfg = SyntheticConfig { noise: 0.0, ..SyntheticConfig::default() };
        assert_eq!(generate(&cfg, 2, 3).unwrap().len(), 2);
    }
}
