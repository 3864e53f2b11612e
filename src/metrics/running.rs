// --- Файл: src/metrics/running.rs ---

//! Онлайн-статистики для отчётов по эпохам.

/// Онлайн вычисление среднего значения.
///
/// Использует инкрементальный алгоритм для численной стабильности.
#[derive(Debug, Clone, Default)]
pub struct RunningMean {
    mean: f64,
    count: usize,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет значение.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
    }

    /// Возвращает текущее среднее (0 до первого значения).
    pub fn compute(&self) -> f64 {
        self.mean
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        self.mean = 0.0;
        self.count = 0;
    }
}

/// Отслеживает минимум и максимум.
#[derive(Debug, Clone)]
pub struct RunningMinMax {
    min: f64,
    max: f64,
}

impl Default for RunningMinMax {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl RunningMinMax {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// `None`, пока не было ни одного значения.
    pub fn range(&self) -> Option<(f64, f64)> {
        (self.min <= self.max).then_some((self.min, self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_running_mean() {
        let mut mean = RunningMean::new();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            mean.update(v);
        }
        assert_abs_diff_eq!(mean.compute(), 3.0, epsilon = 1e-12);
        assert_eq!(mean.count(), 5);

        mean.reset();
        assert_eq!(mean.count(), 0);
        assert_eq!(mean.compute(), 0.0);
    }

    #[test]
    fn test_min_max() {
        let mut mm = RunningMinMax::new();
        assert_eq!(mm.range(), None);
        for v in [3.0, -1.0, 7.5] {
            mm.update(v);
        }
        assert_eq!(mm.range(), Some((-1.0, 7.5)));
    }
}
