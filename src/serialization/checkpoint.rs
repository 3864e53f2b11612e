// --- Файл: src/serialization/checkpoint.rs ---

//! Сохранение и загрузка моделей в JSON.
//!
//! Модель хранится как дерево [`LayerState`]: только веса и смещения
//! полносвязных слоёв, без буферов моментума и накопленных градиентов.
//! Чекпоинт - директория с метаданными обучения и самой моделью.

use crate::nn::{Layer, LayerError, LayerState};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Ошибки при работе с чекпоинтами
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Ошибка ввода/вывода: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Ошибка JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Сохранённая модель не подходит к архитектуре: {0}")]
    Layer(#[from] LayerError),

    #[error("Файл не найден: {0}")]
    FileNotFound(PathBuf),
}

type Result<T> = std::result::Result<T, CheckpointError>;

/// Метаданные чекпоинта
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Версия формата чекпоинта
    pub version: String,
    /// Название модели
    pub model_name: Option<String>,
    /// Номер завершённой эпохи
    pub epoch: usize,
    pub learning_rate: f64,
    /// Последнее значение loss
    pub last_loss: Option<f64>,
    /// Дополнительные метаданные
    pub metadata: HashMap<String, String>,
}

impl Default for CheckpointMeta {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            model_name: None,
            epoch: 0,
            learning_rate: 1e-5,
            last_loss: None,
            metadata: HashMap::new(),
        }
    }
}

impl CheckpointMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model_name(mut self, name: &str) -> Self {
        self.model_name = Some(name.to_string());
        self
    }

    pub fn with_epoch(mut self, epoch: usize) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_last_loss(mut self, loss: f64) -> Self {
        self.last_loss = Some(loss);
        self
    }

    /// Добавляет метаданные
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Полный чекпоинт: метаданные и параметры модели.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub meta: CheckpointMeta,
    pub model: LayerState,
}

impl Checkpoint {
    /// Снимает текущее состояние модели.
    pub fn capture(model: &dyn Layer, meta: CheckpointMeta) -> Self {
        Self {
            meta,
            model: model.state(),
        }
    }

    /// Загружает параметры в модель той же архитектуры.
    pub fn restore_into(&self, model: &mut dyn Layer) -> Result<()> {
        model.restore(&self.model)?;
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(CheckpointError::FileNotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Сохраняет параметры модели в JSON-файл.
pub fn save_model<P: AsRef<Path>>(path: P, model: &dyn Layer) -> Result<()> {
    let path = path.as_ref();
    write_json(path, &model.state())?;
    info!("saved {} to {}", model.name(), path.display());
    Ok(())
}

/// Загружает параметры из JSON-файла.
///
/// Число, порядок, типы и формы слоёв должны совпадать с моделью. При
/// любом несовпадении модель остаётся без изменений.
pub fn load_model<P: AsRef<Path>>(path: P, model: &mut dyn Layer) -> Result<()> {
    let path = path.as_ref();
    let state: LayerState = read_json(path)?;
    model.restore(&state)?;
    info!("loaded {} from {}", state.describe(), path.display());
    Ok(())
}

/// Сохраняет чекпоинт в директорию.
///
/// Структура директории:
/// ```text
/// checkpoint_dir/
/// ├── config.json          # Метаданные
/// └── model.json           # Параметры модели
/// ```
pub fn save_checkpoint<P: AsRef<Path>>(path: P, checkpoint: &Checkpoint) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir)?;
    write_json(&dir.join("config.json"), &checkpoint.meta)?;
    write_json(&dir.join("model.json"), &checkpoint.model)?;
    info!(
        "checkpoint for epoch {} written to {}",
        checkpoint.meta.epoch,
        dir.display()
    );
    Ok(())
}

/// Загружает чекпоинт из директории.
pub fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Checkpoint> {
    let dir = path.as_ref();
    if !dir.is_dir() {
        return Err(CheckpointError::FileNotFound(dir.to_path_buf()));
    }
    Ok(Checkpoint {
        meta: read_json(&dir.join("config.json"))?,
        model: read_json(&dir.join("model.json"))?,
    })
}

/// Менеджер чекпоинтов для автоматического сохранения.
pub struct CheckpointManager {
    /// Базовая директория для чекпоинтов
    pub base_dir: PathBuf,
    /// Максимальное количество сохраняемых чекпоинтов
    pub max_to_keep: usize,
    /// Чекпоинты, записанные этим менеджером
    checkpoints: Vec<PathBuf>,
}

impl CheckpointManager {
    pub fn new<P: AsRef<Path>>(base_dir: P, max_to_keep: usize) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            max_to_keep,
            checkpoints: Vec::new(),
        }
    }

    /// Сохраняет чекпоинт в `checkpoint_epoch{N}` и удаляет самые старые,
    /// если их больше `max_to_keep`.
    pub fn save(&mut self, checkpoint: &Checkpoint) -> Result<PathBuf> {
        let checkpoint_path = self
            .base_dir
            .join(format!("checkpoint_epoch{:04}", checkpoint.meta.epoch));
        save_checkpoint(&checkpoint_path, checkpoint)?;
        self.checkpoints.push(checkpoint_path.clone());

        while self.checkpoints.len() > self.max_to_keep.max(1) {
            let old_path = self.checkpoints.remove(0);
            if old_path.exists() {
                fs::remove_dir_all(&old_path)?;
            }
        }
        Ok(checkpoint_path)
    }

    /// Загружает последний чекпоинт из базовой директории.
    pub fn load_latest(&self) -> Result<Option<Checkpoint>> {
        match self.find_checkpoints()?.last() {
            Some(latest) => Ok(Some(load_checkpoint(latest)?)),
            None => Ok(None),
        }
    }

    /// Ищет существующие чекпоинты в базовой директории.
    fn find_checkpoints(&self) -> Result<Vec<PathBuf>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut checkpoints: Vec<PathBuf> = fs::read_dir(&self.base_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_dir()
                    && path
                        .file_name()
                        .map(|n| n.to_string_lossy().starts_with("checkpoint_"))
                        .unwrap_or(false)
            })
            .collect();

        checkpoints.sort();
        Ok(checkpoints)
    }
}
