use crate::error::{Result, SegError};
use crate::tensor::{LabelMap, Logits, Mask};

/// Added to both sides of the IoU ratio so two empty masks score 1.
pub const SMOOTH: f64 = 1e-6;

/// The metric is defined for background/foreground segmentation only.
pub const NUM_CLASSES: usize = 2;

pub const BACKGROUND: usize = 0;
pub const FOREGROUND: usize = 1;

/// Smoothed IoU of one sample's `H * W` masks.
pub fn sample_iou(pred: &[bool], truth: &[bool]) -> f64 {
    let (mut intersection, mut union) = (0usize, 0usize);
    for (&p, &t) in pred.iter().zip(truth) {
        intersection += (p & t) as usize;
        union += (p | t) as usize;
    }
    (intersection as f64 + SMOOTH) / (union as f64 + SMOOTH)
}

/// Sum (not mean) of the per-sample IoU over a `[N, H, W]` batch.
pub fn batch_iou_sum(pred: &Mask, truth: &Mask) -> Result<f64> {
    if pred.shape() != truth.shape() {
        return Err(SegError::ShapeMismatch {
            expected: truth.shape().to_vec(),
            found: pred.shape().to_vec(),
        });
    }
    Ok((0..pred.n).map(|i| sample_iou(pred.sample(i), truth.sample(i))).sum())
}

/// Predicted `[background, foreground]` masks from 2-channel logits.
///
/// Foreground is the argmax class; background is its complement, which is
/// exactly the argmin class when there are two channels. Any other channel
/// count is refused.
pub fn two_class_masks(logits: &Logits) -> Result<[Mask; NUM_CLASSES]> {
    if logits.classes != NUM_CLASSES {
        return Err(SegError::ClassCount { expected: NUM_CLASSES, found: logits.classes });
    }
    let foreground = logits.argmax().class_mask(FOREGROUND);
    let background = foreground.not();
    Ok([background, foreground])
}

/// Running per-class IoU sums for one phase.
///
/// Means divide by `batches * last_batch_size`, so they are exact only while
/// every batch has the same size. A smaller trailing batch shifts the
/// denominator for all batches seen before it.
#[derive(Debug, Clone, Default)]
pub struct IouAccumulator {
    sums: [f64; NUM_CLASSES],
    batches: usize,
    last_batch_size: usize,
    samples: usize,
    size_changed: bool,
}

impl IouAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one batch worth of IoU sums for both classes.
    pub fn update(&mut self, logits: &Logits, labels: &LabelMap) -> Result<()> {
        let [pred_bg, pred_fg] = two_class_masks(logits)?;
        let truth_fg = labels.class_mask(FOREGROUND);
        let truth_bg = truth_fg.not();

        let bg = batch_iou_sum(&pred_bg, &truth_bg)?;
        let fg = batch_iou_sum(&pred_fg, &truth_fg)?;
        self.record(labels.n, [bg, fg]);
        Ok(())
    }

    /// Adds precomputed per-class sums for a batch of `batch_size` samples.
    pub fn record(&mut self, batch_size: usize, sums: [f64; NUM_CLASSES]) {
        if self.batches > 0 && batch_size != self.last_batch_size {
            self.size_changed = true;
        }
        self.sums[BACKGROUND] += sums[BACKGROUND];
        self.sums[FOREGROUND] += sums[FOREGROUND];
        self.batches += 1;
        self.samples += batch_size;
        self.last_batch_size = batch_size;
    }

    pub fn sums(&self) -> [f64; NUM_CLASSES] {
        self.sums
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Samples actually seen, as opposed to the `batches * last_batch_size`
    /// used by the means.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// True once a batch arrived whose size differs from its predecessor.
    pub fn size_changed(&self) -> bool {
        self.size_changed
    }

    pub fn class_means(&self) -> Result<[f64; NUM_CLASSES]> {
        let denom = (self.batches * self.last_batch_size) as f64;
        if denom == 0.0 {
            return Err(SegError::EmptySource);
        }
        Ok([self.sums[BACKGROUND] / denom, self.sums[FOREGROUND] / denom])
    }

    /// Mean of the two class means.
    pub fn miou(&self) -> Result<f64> {
        let [bg, fg] = self.class_means()?;
        Ok((bg + fg) / 2.0)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(bits: &[u8]) -> Mask {
        Mask::new(1, 1, bits.len(), bits.iter().map(|&b| b == 1).collect()).unwrap()
    }

    #[test]
    fn identical_masks_score_one() {
        let m = mask(&[1, 0, 1, 1]);
        let iou = batch_iou_sum(&m, &m).unwrap();
        assert!((iou - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_masks_score_near_zero() {
        let iou = batch_iou_sum(&mask(&[1, 1, 0, 0]), &mask(&[0, 0, 1, 1])).unwrap();
        assert!(iou < 1e-6);
    }

    #[test]
    fn two_empty_masks_are_smoothed_to_one() {
        let iou = batch_iou_sum(&mask(&[0, 0, 0]), &mask(&[0, 0, 0])).unwrap();
        assert_eq!(iou, 1.0);
    }

    #[test]
    fn partial_overlap() {
        // |A∩B| = 1, |A∪B| = 3
        let iou = batch_iou_sum(&mask(&[1, 1, 0]), &mask(&[0, 1, 1])).unwrap();
        assert!((iou - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn sum_is_not_averaged_over_the_batch() {
        let m = Mask::new(3, 1, 2, vec![true, false, true, true, false, false]).unwrap();
        assert!((batch_iou_sum(&m, &m).unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        assert!(matches!(
            batch_iou_sum(&mask(&[1, 0]), &mask(&[1, 0, 0])),
            Err(SegError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn three_channel_logits_are_refused() {
        let logits = Logits::new(1, 3, 1, 1, vec![0.0, 1.0, 2.0]).unwrap();
        assert!(matches!(
            two_class_masks(&logits),
            Err(SegError::ClassCount { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn predicted_masks_are_complementary() {
        let logits = Logits::new(1, 2, 1, 3, vec![2.0, 0.0, 1.0, 1.0, 3.0, 1.0]).unwrap();
        let [bg, fg] = two_class_masks(&logits).unwrap();
        assert_eq!(fg.data, vec![false, true, false]);
        assert_eq!(bg.data, vec![true, false, true]);
    }

    #[test]
    fn means_use_last_batch_size_for_every_batch() {
        let mut acc = IouAccumulator::new();
        acc.record(4, [4.0, 2.0]);
        acc.record(2, [2.0, 2.0]);
        assert!(acc.size_changed());
        assert_eq!(acc.samples(), 6);
        // denominator is 2 batches * 2, not 6 samples
        assert_eq!(acc.class_means().unwrap(), [1.5, 1.0]);
        assert_eq!(acc.miou().unwrap(), 1.25);
    }

    #[test]
    fn empty_accumulator_has_no_mean() {
        assert!(matches!(IouAccumulator::new().miou(), Err(SegError::EmptySource)));
    }
}
