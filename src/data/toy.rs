//! Synthetic 2-D classification task: is a point inside the disk around
//! the centre of the unit square?

use crate::data::dataset::SampleSource;
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Squared radius of the class-0 disk centred at (0.5, 0.5).
pub const DISK_RADIUS_SQ: f64 = 0.15;

/// 0 inside the disk, 1 outside.
pub fn classify(x: f64, y: f64) -> usize {
    let (dx, dy) = (x - 0.5, y - 0.5);
    if dx * dx + dy * dy < DISK_RADIUS_SQ {
        0
    } else {
        1
    }
}

/// Endless stream of uniform points in the unit square, cut into epochs of
/// `per_epoch` samples.
#[derive(Debug, Clone)]
pub struct DiskDataset {
    rng: StdRng,
    per_epoch: usize,
    drawn: usize,
}

impl DiskDataset {
    pub fn new(per_epoch: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            per_epoch,
            drawn: 0,
        }
    }
}

impl SampleSource for DiskDataset {
    type Target = usize;

    fn next_sample(&mut self) -> Option<(Tensor, usize)> {
        if self.drawn >= self.per_epoch {
            return None;
        }
        self.drawn += 1;
        let x: f64 = self.rng.gen();
        let y: f64 = self.rng.gen();
        Some((Tensor::column(&[x, y]), classify(x, y)))
    }

    fn reset(&mut self) {
        self.drawn = 0;
    }

    fn len(&self) -> usize {
        self.per_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(0.5, 0.5), 0);
        assert_eq!(classify(0.8, 0.5), 0);
        assert_eq!(classify(0.0, 0.0), 1);
        assert_eq!(classify(1.0, 0.5), 1);
    }

    #[test]
    fn test_epoch_length_and_labels() {
        let mut ds = DiskDataset::new(20, 3);
        let mut count = 0;
        while let Some((p, label)) = ds.next_sample() {
            let (x, y) = (p.get(0, 0).unwrap(), p.get(1, 0).unwrap());
            assert!((0.0..1.0).contains(&x) && (0.0..1.0).contains(&y));
            assert_eq!(label, classify(x, y));
            count += 1;
        }
        assert_eq!(count, 20);
        ds.reset();
        assert!(ds.next_sample().is_some());
    }
}
