use ferrite_seg::metrics::iou::{batch_iou_sum, IouAccumulator, SMOOTH};
use ferrite_seg::{LabelMap, Logits, Mask};

/// 1x2x4x4 logits where every pixel favours `class`.
fn logits_favouring(class: usize) -> Logits {
    let mut data = vec![0.0; 2 * 16];
    for p in 0..16 {
        data[class * 16 + p] = 1.0;
    }
    Logits::new(1, 2, 4, 4, data).unwrap()
}

#[test]
fn all_background_label_and_prediction_scores_one() {
    let labels = LabelMap::new(1, 4, 4, vec![0; 16]).unwrap();
    let mut acc = IouAccumulator::new();
    acc.update(&logits_favouring(0), &labels).unwrap();

    let [bg, fg] = acc.class_means().unwrap();
    assert!((bg - 1.0).abs() < 1e-12);
    // intersection 0, union 0: smoothed to 1
    assert!((fg - 1.0).abs() < 1e-12);
    assert!((acc.miou().unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn all_foreground_label_predicted_as_background_scores_near_zero() {
    let labels = LabelMap::new(1, 4, 4, vec![1; 16]).unwrap();
    let mut acc = IouAccumulator::new();
    acc.update(&logits_favouring(0), &labels).unwrap();

    let expected = SMOOTH / (16.0 + SMOOTH);
    let [bg, fg] = acc.class_means().unwrap();
    assert!((bg - expected).abs() < 1e-15);
    assert!((fg - expected).abs() < 1e-15);
    assert!((acc.miou().unwrap() - expected).abs() < 1e-15);
}

#[test]
fn running_mean_over_identical_samples_equals_single_sample_iou() {
    // every sample: pred = {0, 1}, truth = {1, 2} of a 1x4 row -> IoU 1/3
    let n = 5;
    let pred = Mask::new(n, 1, 4, [true, true, false, false].repeat(n)).unwrap();
    let truth = Mask::new(n, 1, 4, [false, true, true, false].repeat(n)).unwrap();
    let single = batch_iou_sum(
        &Mask::new(1, 1, 4, vec![true, true, false, false]).unwrap(),
        &Mask::new(1, 1, 4, vec![false, true, true, false]).unwrap(),
    )
    .unwrap();

    let mut acc = IouAccumulator::new();
    let sum = batch_iou_sum(&pred, &truth).unwrap();
    acc.record(n, [sum, sum]);
    acc.record(n, [sum, sum]);

    assert!((acc.miou().unwrap() - single).abs() < 1e-12);
}

#[test]
fn identical_non_empty_masks_over_a_batch() {
    let m = Mask::new(3, 2, 2, vec![true, false, false, true, true, true, true, true, false, true, false, false]).unwrap();
    let per_sample = batch_iou_sum(&m, &m).unwrap() / 3.0;
    assert!((per_sample - 1.0).abs() < 1e-9);
}

#[test]
fn disjoint_non_empty_masks_over_a_batch() {
    let a = Mask::new(2, 1, 4, vec![true, true, false, false, true, false, false, false]).unwrap();
    let b = Mask::new(2, 1, 4, vec![false, false, true, true, false, true, true, true]).unwrap();
    assert!(batch_iou_sum(&a, &b).unwrap() < 1e-6);
}
