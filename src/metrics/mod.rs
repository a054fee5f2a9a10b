pub mod iou;

pub use iou::{batch_iou_sum, sample_iou, two_class_masks, IouAccumulator, SMOOTH};
