// --- Файл: src/data/sampler.rs ---

//! Стратегии обхода индексов датасета.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Трейт для сэмплеров - генераторов индексов.
pub trait Sampler: Iterator<Item = usize> {
    /// Возвращает общее количество образцов.
    fn len(&self) -> usize;

    /// Проверяет, пуст ли сэмплер.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Возвращает сэмплер в начало эпохи.
    fn reset(&mut self);
}

/// Последовательный сэмплер - возвращает индексы по порядку.
#[derive(Debug, Clone)]
pub struct SequentialSampler {
    len: usize,
    current: usize,
}

impl SequentialSampler {
    pub fn new(len: usize) -> Self {
        Self { len, current: 0 }
    }
}

impl Iterator for SequentialSampler {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current < self.len {
            let idx = self.current;
            self.current += 1;
            Some(idx)
        } else {
            None
        }
    }
}

impl Sampler for SequentialSampler {
    fn len(&self) -> usize {
        self.len
    }

    fn reset(&mut self) {
        self.current = 0;
    }
}

/// Случайный сэмплер - возвращает индексы в случайном порядке.
///
/// Генератор создаётся один раз из seed и живёт внутри сэмплера, поэтому
/// каждый `reset` даёт новую перестановку, а вся последовательность эпох
/// воспроизводима.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    indices: Vec<usize>,
    current: usize,
    rng: StdRng,
}

impl RandomSampler {
    pub fn with_seed(len: usize, seed: u64) -> Self {
        let mut sampler = Self {
            indices: (0..len).collect(),
            current: 0,
            rng: StdRng::seed_from_u64(seed),
        };
        sampler.shuffle();
        sampler
    }

    fn shuffle(&mut self) {
        self.indices.shuffle(&mut self.rng);
    }
}

impl Iterator for RandomSampler {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.indices.get(self.current).copied()?;
        self.current += 1;
        Some(idx)
    }
}

impl Sampler for RandomSampler {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn reset(&mut self) {
        self.current = 0;
        self.shuffle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_sampler() {
        let mut sampler = SequentialSampler::new(5);
        let indices: Vec<_> = sampler.by_ref().collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);

        sampler.reset();
        let indices: Vec<_> = sampler.collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_random_sampler_is_permutation() {
        let sampler = RandomSampler::with_seed(5, 42);
        let mut indices: Vec<_> = sampler.collect();
        assert_eq!(indices.len(), 5);
        indices.sort();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_random_sampler_reshuffles_on_reset() {
        let mut sampler = RandomSampler::with_seed(50, 7);
        let first: Vec<_> = sampler.by_ref().collect();
        sampler.reset();
        let second: Vec<_> = sampler.by_ref().collect();
        assert_ne!(first, second);

        // тот же seed - та же последовательность эпох
        let mut again = RandomSampler::with_seed(50, 7);
        assert_eq!(again.by_ref().collect::<Vec<_>>(), first);
        again.reset();
        assert_eq!(again.collect::<Vec<_>>(), second);
    }

    #[test]
    fn test_empty_sampler() {
        let mut sampler = RandomSampler::with_seed(0, 1);
        assert!(sampler.is_empty());
        assert_eq!(sampler.next(), None);
    }
}
