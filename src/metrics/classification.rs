// --- Файл: src/metrics/classification.rs ---

//! Метрики для задач классификации.

use super::Metric;
use crate::tensor::Tensor;

/// Доля верно предсказанных классов.
///
/// Пока не было ни одного образца, accuracy считается равной 1.
#[derive(Debug, Clone, Default)]
pub struct Accuracy {
    correct: usize,
    total: usize,
}

impl Accuracy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

impl Metric for Accuracy {
    type Prediction = usize;
    type Target = usize;
    type Output = f64;

    fn update(&mut self, prediction: &usize, target: &usize) {
        if prediction == target {
            self.correct += 1;
        }
        self.total += 1;
    }

    fn compute(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }

    fn name(&self) -> &str {
        "Accuracy"
    }
}

/// Матрица ошибок для нескольких классов.
///
/// Строка - предсказанный класс, столбец - истинный.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    num_classes: usize,
    matrix: Vec<Vec<usize>>, // [predicted][actual]
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![vec![0; num_classes]; num_classes],
        }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Количество образцов класса `actual`, предсказанных как `predicted`.
    pub fn count(&self, predicted: usize, actual: usize) -> usize {
        self.matrix
            .get(predicted)
            .and_then(|row| row.get(actual))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Вычисляет accuracy по диагонали.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 1.0;
        }
        let correct: usize = (0..self.num_classes).map(|i| self.matrix[i][i]).sum();
        correct as f64 / total as f64
    }

    /// Матрица в виде тензора `num_classes × num_classes`.
    pub fn to_tensor(&self) -> Tensor {
        let mut t = Tensor::zeros(self.num_classes, self.num_classes);
        for (i, row) in self.matrix.iter().enumerate() {
            for (j, &n) in row.iter().enumerate() {
                // индексы заведомо в пределах
                let _ = t.set(i, j, n as f64);
            }
        }
        t
    }
}

impl Metric for ConfusionMatrix {
    type Prediction = usize;
    type Target = usize;
    type Output = Tensor;

    /// Классы вне диапазона пропускаются.
    fn update(&mut self, prediction: &usize, target: &usize) {
        if *prediction < self.num_classes && *target < self.num_classes {
            self.matrix[*prediction][*target] += 1;
        }
    }

    fn compute(&self) -> Tensor {
        self.to_tensor()
    }

    fn reset(&mut self) {
        for row in &mut self.matrix {
            for cell in row {
                *cell = 0;
            }
        }
    }

    fn name(&self) -> &str {
        "ConfusionMatrix"
    }
}
