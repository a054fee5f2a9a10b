use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Result, SegError};
use crate::tensor::{ImageBatch, LabelMap};

/// Label side of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Labels {
    pub masks: LabelMap,
}

/// One step's worth of data: `[N, C, H, W]` input and `[N, H, W]` masks.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub input: ImageBatch,
    pub label: Labels,
}

impl Batch {
    pub fn new(input: ImageBatch, masks: LabelMap) -> Result<Batch> {
        if [input.n, input.h, input.w] != masks.shape() {
            return Err(SegError::ShapeMismatch {
                expected: vec![input.n, input.h, input.w],
                found: masks.shape().to_vec(),
            });
        }
        Ok(Batch { input, label: Labels { masks } })
    }

    pub fn size(&self) -> usize {
        self.input.n
    }
}

/// A finite sequence of batches that can be walked again for every phase.
pub trait BatchSource {
    /// Number of batches one pass yields.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a new pass.
    fn batches(&mut self) -> Box<dyn Iterator<Item = Result<Batch>> + '_>;
}

impl BatchSource for Vec<Batch> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn batches(&mut self) -> Box<dyn Iterator<Item = Result<Batch>> + '_> {
        Box::new(self.iter().cloned().map(Ok))
    }
}

/// A single image and its mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: ImageBatch,
    pub mask: LabelMap,
}

/// Samples held in memory and collated into fixed-size batches.
///
/// The final batch of a pass is smaller when the sample count is not a
/// multiple of the batch size.
pub struct InMemoryDataset {
    samples: Vec<Sample>,
    batch_size: usize,
    shuffle: Option<StdRng>,
}

impl InMemoryDataset {
    pub fn new(samples: Vec<Sample>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(SegError::InvalidConfig("batch_size must be at least 1".into()));
        }
        Ok(InMemoryDataset { samples, batch_size, shuffle: None })
    }

    /// Reorders samples at the start of every pass, reproducibly for a given seed.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.shuffle = Some(StdRng::seed_from_u64(seed));
        self
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl BatchSource for InMemoryDataset {
    fn len(&self) -> usize {
        self.samples.len().div_ceil(self.batch_size)
    }

    fn batches(&mut self) -> Box<dyn Iterator<Item = Result<Batch>> + '_> {
        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        if let Some(rng) = self.shuffle.as_mut() {
            order.shuffle(rng);
        }
        let samples = &self.samples;
        let chunks: Vec<Vec<usize>> = order.chunks(self.batch_size).map(<[usize]>::to_vec).collect();
        Box::new(chunks.into_iter().map(move |idx| -> Result<Batch> {
            let images: Vec<&ImageBatch> = idx.iter().map(|&i| &samples[i].image).collect();
            let masks: Vec<&LabelMap> = idx.iter().map(|&i| &samples[i].mask).collect();
            Batch::new(ImageBatch::stack(&images)?, LabelMap::stack(&masks)?)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(v: f64) -> Sample {
        Sample {
            image: ImageBatch::new(1, 1, 1, 2, vec![v, v]).unwrap(),
            mask: LabelMap::new(1, 1, 2, vec![0, 1]).unwrap(),
        }
    }

    #[test]
    fn last_batch_is_short() {
        let mut ds = InMemoryDataset::new((0..5).map(|i| sample(i as f64)).collect(), 2).unwrap();
        assert_eq!(ds.len(), 3);
        let sizes: Vec<usize> = ds.batches().map(|b| b.unwrap().size()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn passes_can_be_repeated() {
        let mut ds = InMemoryDataset::new((0..4).map(|i| sample(i as f64)).collect(), 3)
            .unwrap()
            .shuffled(9);
        let first: usize = ds.batches().map(|b| b.unwrap().size()).sum();
        let second: usize = ds.batches().map(|b| b.unwrap().size()).sum();
        assert_eq!((first, second), (4, 4));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(InMemoryDataset::new(vec![sample(0.0)], 0).is_err());
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let img = ImageBatch::new(1, 1, 2, 2, vec![0.0; 4]).unwrap();
        let mask = LabelMap::new(1, 1, 2, vec![0; 2]).unwrap();
        assert!(Batch::new(img, mask).is_err());
    }
}
