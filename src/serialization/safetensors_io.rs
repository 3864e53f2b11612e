// --- Файл: src/serialization/safetensors_io.rs ---

//! Экспорт и импорт весов сети в формате SafeTensors.
//!
//! Дерево [`LayerState`] разворачивается в плоский список именованных
//! тензоров: `layers.{i}.weight` / `layers.{i}.bias` для слоёв верхнего
//! уровня и `layers.{i}.layers.{j}.weight` для вложенных сетей. Все тензоры
//! пишутся как F64 формы `[rows, cols]`.

use crate::nn::{Layer, LayerError, LayerState};
use crate::tensor::{Tensor, TensorError};
use log::info;
use safetensors::serialize_to_file;
use safetensors::tensor::{SafeTensors, TensorView};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Ошибки при работе с SafeTensors
#[derive(Error, Debug)]
pub enum SafeTensorsError {
    #[error("Ошибка ввода/вывода: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Ошибка SafeTensors: {0}")]
    SafeTensorsError(#[from] safetensors::SafeTensorError),

    #[error("Неподдерживаемый тип данных: {0}")]
    UnsupportedDtype(String),

    #[error("Тензор '{name}' имеет форму {shape:?}, ожидалась двумерная")]
    BadRank { name: String, shape: Vec<usize> },

    #[error("Тензор '{0}' не найден")]
    TensorNotFound(String),

    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error(transparent)]
    Layer(#[from] LayerError),
}

type Result<T> = std::result::Result<T, SafeTensorsError>;

/// Разворачивает дерево состояний в пары (имя, тензор) в порядке слоёв.
pub fn flatten_state(state: &LayerState) -> Vec<(String, Tensor)> {
    let mut out = Vec::new();
    flatten_into(state, "", &mut out);
    out
}

fn flatten_into(state: &LayerState, prefix: &str, out: &mut Vec<(String, Tensor)>) {
    match state {
        LayerState::FullyConnected { weight, bias } => {
            out.push((format!("{prefix}weight"), weight.clone()));
            out.push((format!("{prefix}bias"), bias.clone()));
        }
        LayerState::Network { layers } => {
            for (i, layer) in layers.iter().enumerate() {
                flatten_into(layer, &format!("{prefix}layers.{i}."), out);
            }
        }
        LayerState::Stateless { .. } => {}
    }
}

/// Собирает дерево той же структуры, что и `template`, беря параметры
/// из `tensors`.
fn rebuild_state(
    template: &LayerState,
    prefix: &str,
    tensors: &HashMap<String, Tensor>,
) -> Result<LayerState> {
    let lookup = |name: String| {
        tensors
            .get(&name)
            .cloned()
            .ok_or(SafeTensorsError::TensorNotFound(name))
    };
    Ok(match template {
        LayerState::FullyConnected { .. } => LayerState::FullyConnected {
            weight: lookup(format!("{prefix}weight"))?,
            bias: lookup(format!("{prefix}bias"))?,
        },
        LayerState::Network { layers } => LayerState::Network {
            layers: layers
                .iter()
                .enumerate()
                .map(|(i, layer)| rebuild_state(layer, &format!("{prefix}layers.{i}."), tensors))
                .collect::<Result<_>>()?,
        },
        LayerState::Stateless { layer } => LayerState::Stateless {
            layer: layer.clone(),
        },
    })
}

/// Сохраняет именованные тензоры в файл SafeTensors (F64).
pub fn save_safetensors<P: AsRef<Path>>(path: P, tensors: &[(String, Tensor)]) -> Result<()> {
    // Сначала конвертируем все данные в байты
    let data_storage: Vec<Vec<u8>> = tensors
        .iter()
        .map(|(_, t)| t.iter().flat_map(f64::to_le_bytes).collect())
        .collect();

    let mut tensor_views: Vec<(&str, TensorView<'_>)> = Vec::with_capacity(tensors.len());
    for ((name, t), data) in tensors.iter().zip(&data_storage) {
        tensor_views.push((
            name.as_str(),
            TensorView::new(safetensors::Dtype::F64, vec![t.rows(), t.cols()], data)?,
        ));
    }

    serialize_to_file(tensor_views, &None, path.as_ref())?;
    Ok(())
}

/// Загружает все тензоры из файла SafeTensors.
///
/// Принимаются F64 и F32 (расширяется до f64); тензоры должны быть
/// двумерными.
pub fn load_safetensors<P: AsRef<Path>>(path: P) -> Result<HashMap<String, Tensor>> {
    let buffer = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&buffer)?;

    let mut result = HashMap::new();
    for (name, view) in tensors.tensors() {
        let values: Vec<f64> = match view.dtype() {
            safetensors::Dtype::F64 => view
                .data()
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
            safetensors::Dtype::F32 => view
                .data()
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
                .collect(),
            other => return Err(SafeTensorsError::UnsupportedDtype(format!("{:?}", other))),
        };
        let &[rows, cols] = view.shape() else {
            return Err(SafeTensorsError::BadRank {
                name,
                shape: view.shape().to_vec(),
            });
        };
        result.insert(name, Tensor::from_vec(rows, cols, values)?);
    }
    Ok(result)
}

/// Возвращает список имен тензоров в файле SafeTensors.
pub fn list_tensors<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let buffer = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&buffer)?;
    let mut names: Vec<String> = tensors.names().iter().map(|s| s.to_string()).collect();
    names.sort();
    Ok(names)
}

/// Записывает веса всех полносвязных слоёв модели.
pub fn export_safetensors<P: AsRef<Path>>(path: P, model: &dyn Layer) -> Result<()> {
    let tensors = flatten_state(&model.state());
    save_safetensors(path.as_ref(), &tensors)?;
    info!(
        "exported {} tensors to {}",
        tensors.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Загружает веса в модель той же архитектуры.
///
/// Недостающий тензор или несовпадение форм - ошибка; в этом случае модель
/// не изменяется.
pub fn import_safetensors<P: AsRef<Path>>(path: P, model: &mut dyn Layer) -> Result<()> {
    let tensors = load_safetensors(path.as_ref())?;
    let state = rebuild_state(&model.state(), "", &tensors)?;
    model.restore(&state)?;
    info!(
        "imported {} tensors from {}",
        tensors.len(),
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{FullyConnected, LeakyReLU, Network};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn model(seed: u64) -> Network {
        let mut rng = StdRng::seed_from_u64(seed);
        let inner = Network::new()
            .with(FullyConnected::new(3, 2, &mut rng))
            .with(LeakyReLU::new());
        Network::new()
            .with(FullyConnected::new(4, 3, &mut rng))
            .with(LeakyReLU::new())
            .with(inner)
    }

    #[test]
    fn test_flat_names() {
        let names: Vec<String> = flatten_state(&model(0).state())
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(
            names,
            vec![
                "layers.0.weight",
                "layers.0.bias",
                "layers.2.layers.0.weight",
                "layers.2.layers.0.bias",
            ]
        );
    }

    #[test]
    fn test_export_import() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.safetensors");

        let source = model(1);
        export_safetensors(&path, &source).unwrap();
        assert_eq!(list_tensors(&path).unwrap().len(), 4);

        let mut target = model(2);
        assert_ne!(target.state(), source.state());
        import_safetensors(&path, &mut target).unwrap();
        assert_eq!(target.state(), source.state());
    }

    #[test]
    fn test_import_into_other_architecture() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        export_safetensors(&path, &model(1)).unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        let mut other = Network::new().with(FullyConnected::new(4, 5, &mut rng));
        let before = other.state();
        assert!(matches!(
            import_safetensors(&path, &mut other),
            Err(SafeTensorsError::Layer(LayerError::StateMismatch { .. }))
        ));
        assert_eq!(other.state(), before);

        let mut deeper = Network::new().with(LeakyReLU::new()).with(FullyConnected::new(4, 3, &mut rng));
        assert!(matches!(
            import_safetensors(&path, &mut deeper),
            Err(SafeTensorsError::TensorNotFound(name)) if name == "layers.1.weight"
        ));
    }
}
