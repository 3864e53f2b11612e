// --- Файл: src/data/dataset.rs ---

//! Источники обучающих образцов.

use crate::data::sampler::{RandomSampler, Sampler, SequentialSampler};
use crate::tensor::{Shape, Tensor};
use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path} contains no records")]
    Empty { path: PathBuf },

    #[error("line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}, column {column}: cannot parse {value:?} as a number")]
    Parse {
        line: usize,
        column: usize,
        value: String,
    },

    #[error("line {line}: label {value} is not a non-negative class index")]
    BadLabel { line: usize, value: f64 },

    #[error("sample {index} has shape {actual:?}, expected {expected:?}")]
    SampleShape {
        index: usize,
        expected: Shape,
        actual: Shape,
    },

    #[error("{samples} samples but {labels} labels")]
    LengthMismatch { samples: usize, labels: usize },
}

pub type Result<T> = std::result::Result<T, DatasetError>;

/// Поток образцов, который читает цикл обучения.
///
/// `None` из `next_sample` означает конец эпохи; `reset` начинает новую
/// (и перемешивает, если источник это умеет).
pub trait SampleSource {
    type Target;

    fn next_sample(&mut self) -> Option<(Tensor, Self::Target)>;

    fn reset(&mut self);

    /// Количество образцов за эпоху.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Датасет, хранящий данные в памяти.
///
/// Каждый образец - столбец `k × 1`, метка - номер класса. Порядок обхода
/// задаёт сэмплер.
#[derive(Debug, Clone)]
pub struct InMemoryDataset<S = RandomSampler> {
    samples: Vec<Tensor>,
    labels: Vec<usize>,
    sampler: S,
}

impl InMemoryDataset<RandomSampler> {
    /// Датасет, перемешиваемый на каждой эпохе генератором с заданным seed.
    pub fn new(samples: Vec<Tensor>, labels: Vec<usize>, seed: u64) -> Result<Self> {
        let sampler = RandomSampler::with_seed(samples.len(), seed);
        Self::with_sampler(samples, labels, sampler)
    }

    /// Загружает CSV без заголовка: в каждой строке сначала метка, затем
    /// признаки. Метка читается как число и округляется до ближайшего целого.
    pub fn from_labelled_csv<P: AsRef<Path>>(path: P, seed: u64) -> Result<Self> {
        let (samples, labels) = read_labelled_csv(path.as_ref())?;
        Self::new(samples, labels, seed)
    }
}

impl<S: Sampler> InMemoryDataset<S> {
    pub fn with_sampler(samples: Vec<Tensor>, labels: Vec<usize>, sampler: S) -> Result<Self> {
        if samples.len() != labels.len() || sampler.len() != samples.len() {
            return Err(DatasetError::LengthMismatch {
                samples: samples.len(),
                labels: labels.len(),
            });
        }
        if let Some(first) = samples.first() {
            let expected = first.shape();
            if let Some((index, bad)) = samples
                .iter()
                .enumerate()
                .find(|(_, s)| s.shape() != expected)
            {
                return Err(DatasetError::SampleShape {
                    index,
                    expected,
                    actual: bad.shape(),
                });
            }
        }
        Ok(Self {
            samples,
            labels,
            sampler,
        })
    }

    /// Тот же набор данных с обходом по порядку (для оценки).
    pub fn into_sequential(self) -> InMemoryDataset<SequentialSampler> {
        InMemoryDataset {
            sampler: SequentialSampler::new(self.samples.len()),
            samples: self.samples,
            labels: self.labels,
        }
    }

    /// Возвращает образец и метку по индексу хранения.
    pub fn get(&self, index: usize) -> Option<(&Tensor, usize)> {
        Some((self.samples.get(index)?, *self.labels.get(index)?))
    }

    /// Форма одного образца; `None` для пустого датасета.
    pub fn sample_shape(&self) -> Option<Shape> {
        self.samples.first().map(Tensor::shape)
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }
}

impl<S: Sampler> SampleSource for InMemoryDataset<S> {
    type Target = usize;

    fn next_sample(&mut self) -> Option<(Tensor, usize)> {
        let index = self.sampler.next()?;
        Some((self.samples[index].clone(), self.labels[index]))
    }

    fn reset(&mut self) {
        self.sampler.reset();
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

fn read_labelled_csv(path: &Path) -> Result<(Vec<Tensor>, Vec<usize>)> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut samples = Vec::new();
    let mut labels = Vec::new();
    let mut width = None;

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = i + 1;
        let expected = *width.get_or_insert(record.len());
        if record.len() != expected || expected < 2 {
            return Err(DatasetError::RaggedRow {
                line,
                expected: expected.max(2),
                found: record.len(),
            });
        }

        let mut values = Vec::with_capacity(expected);
        for (column, field) in record.iter().enumerate() {
            let value = field.trim().parse::<f64>().map_err(|_| DatasetError::Parse {
                line,
                column,
                value: field.to_string(),
            })?;
            values.push(value);
        }

        let label = values[0].round();
        if !label.is_finite() || label < 0.0 {
            return Err(DatasetError::BadLabel {
                line,
                value: values[0],
            });
        }
        labels.push(label as usize);
        samples.push(Tensor::column(&values[1..]));
    }

    if samples.is_empty() {
        return Err(DatasetError::Empty {
            path: path.to_path_buf(),
        });
    }
    info!(
        "loaded {} samples of {} features from {}",
        samples.len(),
        width.unwrap_or(1) - 1,
        path.display()
    );
    Ok((samples, labels))
}
