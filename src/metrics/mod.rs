// --- Файл: src/metrics/mod.rs ---

//! Модуль метрик для оценки качества моделей.
//!
//! - **Классификация**: Accuracy, ConfusionMatrix
//! - **Статистики**: RunningMean, RunningMinMax
//!
//! # Пример использования
//!
//! ```rust,ignore
//! use labnet::metrics::{Accuracy, Metric};
//!
//! let mut accuracy = Accuracy::new();
//! accuracy.update(&predicted, &label);
//! println!("Accuracy: {:.4}", accuracy.compute());
//! accuracy.reset();
//! ```

pub mod classification;
pub mod running;

pub use classification::{Accuracy, ConfusionMatrix};
pub use running::{RunningMean, RunningMinMax};

/// Базовый трейт для всех метрик.
pub trait Metric {
    /// Тип предсказания
    type Prediction;
    /// Тип целевого значения
    type Target;
    /// Тип результата метрики
    type Output;

    /// Обновляет состояние метрики одним образцом.
    fn update(&mut self, prediction: &Self::Prediction, target: &Self::Target);

    /// Вычисляет текущее значение метрики.
    fn compute(&self) -> Self::Output;

    /// Сбрасывает состояние метрики.
    fn reset(&mut self);

    /// Возвращает имя метрики.
    fn name(&self) -> &str;
}
