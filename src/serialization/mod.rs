// --- Файл: src/serialization/mod.rs ---

//! Модуль для сериализации и десериализации моделей.
//!
//! Поддерживает два формата:
//! - **JSON**: Человекочитаемое дерево параметров модели и чекпоинты
//! - **SafeTensors**: Плоский бинарный экспорт весов
//!
//! # Примеры
//!
//! ```rust,ignore
//! use labnet::serialization::{save_model, load_model};
//!
//! save_model("vae.json", &model)?;
//! load_model("vae.json", &mut model)?;
//! ```

pub mod checkpoint;
pub mod safetensors_io;

pub use checkpoint::{
    load_checkpoint, load_model, save_checkpoint, save_model, Checkpoint, CheckpointError,
    CheckpointManager, CheckpointMeta,
};
pub use safetensors_io::{export_safetensors, import_safetensors, SafeTensorsError};
