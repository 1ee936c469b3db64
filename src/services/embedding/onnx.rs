//! Local ONNX embedding model.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::{ArrayViewD, IxDyn};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::{Session, SessionInputValue, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams, TruncationStrategy};
use tracing::{debug, info};

use super::{Embedder, normalize, prepare_inputs};
use crate::error::EmbeddingError;
use crate::models::{Device, EmbedKind, EmbeddingConfig, Pooling};

struct OnnxModel {
    session: Mutex<Session>,
    input_names: Vec<String>,
    tokenizer: Tokenizer,
    dimension: usize,
    pooling: Pooling,
}

/// Embedder running an ONNX export with ONNX Runtime.
///
/// Inference blocks, so every call is moved onto the blocking pool.
pub struct OnnxEmbedder {
    model: Arc<OnnxModel>,
    model_id: String,
    query_prefix: Option<String>,
}

impl OnnxEmbedder {
    /// Load `model.onnx` and `tokenizer.json` from `model_path`.
    pub fn load(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model_dir = config
            .model_path
            .clone()
            .or_else(|| default_model_dir(&config.model))
            .ok_or_else(|| {
                EmbeddingError::ModelLoad("no model_path configured for the onnx backend".into())
            })?;
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(EmbeddingError::ModelLoad(format!(
                "model not found: {}",
                model_path.display()
            )));
        }

        let session = build_session(&model_path, config.device)?;
        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let tokenizer = load_tokenizer(&tokenizer_path, config.max_tokens as usize)?;

        info!(
            model = %config.model,
            path = %model_dir.display(),
            device = %config.device,
            inputs = ?input_names,
            "loaded ONNX embedding model"
        );

        Ok(Self {
            model: Arc::new(OnnxModel {
                session: Mutex::new(session),
                input_names,
                tokenizer,
                dimension: config.dimension as usize,
                pooling: config.pooling,
            }),
            model_id: config.model.clone(),
            query_prefix: config.query_prefix.clone(),
        })
    }
}

fn default_model_dir(model: &str) -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("docvec").join("models").join(model.replace('/', "--")))
}

fn build_session(model_path: &Path, device: Device) -> Result<Session, EmbeddingError> {
    let load_err = |e: ort::Error| EmbeddingError::ModelLoad(e.to_string());

    let mut builder = Session::builder()
        .map_err(load_err)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(load_err)?
        .with_intra_threads(num_cpus())
        .map_err(load_err)?;

    if let Device::Cuda(device_id) = device {
        builder = builder
            .with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build()
                .error_on_failure()])
            .map_err(load_err)?;
    }

    builder.commit_from_file(model_path).map_err(load_err)
}

fn load_tokenizer(path: &Path, max_tokens: usize) -> Result<Tokenizer, EmbeddingError> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| EmbeddingError::ModelLoad(format!("{}: {}", path.display(), e)))?;

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_tokens,
            strategy: TruncationStrategy::LongestFirst,
            ..Default::default()
        }))
        .map_err(|e| EmbeddingError::TokenizerError(e.to_string()))?;

    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        ..Default::default()
    }));

    Ok(tokenizer)
}

impl OnnxModel {
    fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| EmbeddingError::TokenizerError(e.to_string()))?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut position_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            for (j, (&id, &m)) in ids.iter().zip(mask.iter()).enumerate() {
                input_ids[i * max_len + j] = id as i64;
                attention_mask[i * max_len + j] = m as i64;
                position_ids[i * max_len + j] = j as i64;
            }
        }

        let infer_err = |e: ort::Error| EmbeddingError::InferenceError(e.to_string());
        let shape = [batch_size, max_len];
        let mut inputs: Vec<(String, SessionInputValue<'static>)> = Vec::new();
        for name in &self.input_names {
            let data = match name.as_str() {
                "input_ids" => input_ids.clone(),
                "attention_mask" => attention_mask.clone(),
                "position_ids" => position_ids.clone(),
                "token_type_ids" => vec![0i64; batch_size * max_len],
                other => {
                    return Err(EmbeddingError::InferenceError(format!(
                        "unsupported model input: {other}"
                    )));
                }
            };
            let tensor = Tensor::from_array((shape, data)).map_err(infer_err)?;
            inputs.push((name.clone(), SessionInputValue::from(tensor)));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| EmbeddingError::InferenceError("session lock poisoned".to_string()))?;
        let outputs = session.run(inputs).map_err(infer_err)?;

        let (out_shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(infer_err)?;
        let dims: Vec<usize> = out_shape.iter().map(|&d| d as usize).collect();
        let output = ArrayViewD::from_shape(IxDyn(&dims), data)
            .map_err(|e| EmbeddingError::InferenceError(e.to_string()))?;

        let mask_rows: Vec<&[u32]> = encodings.iter().map(|e| e.get_attention_mask()).collect();
        (0..batch_size)
            .map(|i| {
                let pooled: Vec<f32> = match dims.len() {
                    3 => pool(&output, i, mask_rows[i], self.pooling),
                    2 => (0..dims[1]).map(|d| output[[i, d]]).collect(),
                    _ => {
                        return Err(EmbeddingError::InferenceError(format!(
                            "unexpected output shape: {:?}",
                            dims
                        )));
                    }
                };
                if pooled.len() < self.dimension {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.dimension,
                        actual: pooled.len(),
                    });
                }
                Ok(normalize(&pooled[..self.dimension]))
            })
            .collect()
    }
}

/// Reduce `[batch, seq, hidden]` token states of row `row` to one vector.
fn pool(output: &ArrayViewD<'_, f32>, row: usize, mask: &[u32], pooling: Pooling) -> Vec<f32> {
    let hidden = output.shape()[2];
    match pooling {
        Pooling::Mean => {
            let mut sum = vec![0f32; hidden];
            let mut count = 0f32;
            for (t, &m) in mask.iter().enumerate() {
                if m == 0 {
                    continue;
                }
                count += 1.0;
                for (d, value) in sum.iter_mut().enumerate() {
                    *value += output[[row, t, d]];
                }
            }
            if count > 0.0 {
                sum.iter_mut().for_each(|v| *v /= count);
            }
            sum
        }
        Pooling::LastToken => {
            let last = mask.iter().rposition(|&m| m != 0).unwrap_or(0);
            (0..hidden).map(|d| output[[row, last, d]]).collect()
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.model.dimension
    }

    async fn embed(
        &self,
        texts: Vec<String>,
        kind: EmbedKind,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs = prepare_inputs(texts, kind, self.query_prefix.as_deref());
        debug!(inputs = inputs.len(), "running ONNX inference");

        let model = self.model.clone();
        tokio::task::spawn_blocking(move || model.embed_blocking(inputs))
            .await
            .map_err(|e| EmbeddingError::InferenceError(format!("embedding task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_mean_pooling_ignores_padding() {
        let data = Array3::from_shape_vec(
            (1, 3, 2),
            vec![1.0, 2.0, 3.0, 4.0, 100.0, 100.0],
        )
        .unwrap()
        .into_dyn();
        let pooled = pool(&data.view(), 0, &[1, 1, 0], Pooling::Mean);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn test_last_token_pooling_uses_last_unmasked() {
        let data = Array3::from_shape_vec(
            (1, 3, 2),
            vec![1.0, 2.0, 3.0, 4.0, 100.0, 100.0],
        )
        .unwrap()
        .into_dyn();
        let pooled = pool(&data.view(), 0, &[1, 1, 0], Pooling::LastToken);
        assert_eq!(pooled, vec![3.0, 4.0]);
    }

    #[test]
    fn test_load_missing_model_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddingConfig {
            model_path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let err = OnnxEmbedder::load(&config).err().unwrap();
        assert!(matches!(err, EmbeddingError::ModelLoad(_)));
    }
}
