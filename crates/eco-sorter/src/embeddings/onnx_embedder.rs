//! ONNX-based embedding generation
//!
//! Runs a sentence-transformers model (all-MiniLM-L6-v2 by default) locally
//! and returns L2-normalised, mean-pooled sentence embeddings.

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use tokenizers::Tokenizer;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// ONNX-based text embedder
pub struct OnnxEmbedder {
    /// ONNX Runtime session
    session: Mutex<Session>,
    /// HuggingFace tokenizer
    tokenizer: Tokenizer,
    /// Embedding dimensions
    dimensions: usize,
    /// Maximum sequence length
    max_length: usize,
    /// Batch size
    batch_size: usize,
    model: String,
}

impl OnnxEmbedder {
    /// Load the model, downloading it into the cache directory on first use
    pub async fn new(config: &EmbeddingConfig) -> Result<Self> {
        tracing::info!("Initializing ONNX embedder with model: {}", config.model);

        let model_dir = config.cache_dir.join(&config.model);
        std::fs::create_dir_all(&model_dir).map_err(|e| {
            Error::Config(format!("Failed to create cache directory: {}", e))
        })?;

        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            let url = format!(
                "https://huggingface.co/sentence-transformers/{}/resolve/main/onnx/model.onnx",
                config.model
            );
            download_file(&url, &model_path).await?;
        }

        if !tokenizer_path.exists() {
            let url = format!(
                "https://huggingface.co/sentence-transformers/{}/resolve/main/tokenizer.json",
                config.model
            );
            download_file(&url, &tokenizer_path).await?;
        }

        let session = Session::builder()
            .map_err(|e| Error::embedding(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::embedding(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| Error::embedding(format!("Failed to set threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| Error::embedding(format!("Failed to load model: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::embedding(format!("Failed to load tokenizer: {}", e)))?;

        tracing::info!("ONNX embedder initialized successfully");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimensions: config.dimensions,
            max_length: config.max_length.max(1),
            batch_size: config.batch_size.max(1),
            model: config.model.clone(),
        })
    }

    /// Get embedding dimensions
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed a single text
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text])?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty embedding result"))
    }

    /// Embed multiple texts
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            all_embeddings.extend(self.embed_batch_internal(batch)?);
        }

        Ok(all_embeddings)
    }

    fn embed_batch_internal(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::embedding(format!("Tokenization failed: {}", e)))?;

        let rows: Vec<TokenRow<'_>> = encodings
            .iter()
            .map(|e| TokenRow {
                ids: e.get_ids(),
                mask: e.get_attention_mask(),
                types: e.get_type_ids(),
            })
            .collect();
        let batch = PaddedBatch::from_rows(&rows, self.max_length);
        let max_len = batch.seq_len;

        let shape = vec![batch_size, max_len];
        let input_ids_tensor =
            Tensor::from_array((shape.clone(), batch.input_ids.into_boxed_slice()))
                .map_err(|e| Error::embedding(format!("Input tensor creation failed: {}", e)))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), batch.attention_mask.clone().into_boxed_slice()))
                .map_err(|e| {
                    Error::embedding(format!("Attention mask tensor creation failed: {}", e))
                })?;
        let token_type_ids_tensor =
            Tensor::from_array((shape, batch.token_type_ids.into_boxed_slice()))
                .map_err(|e| {
                    Error::embedding(format!("Token type tensor creation failed: {}", e))
                })?;

        let inputs = vec![
            ("input_ids", input_ids_tensor.into_dyn()),
            ("attention_mask", attention_mask_tensor.into_dyn()),
            ("token_type_ids", token_type_ids_tensor.into_dyn()),
        ];

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| Error::embedding(format!("Inference failed: {}", e)))?;

        // last_hidden_state: [batch, seq, hidden]
        let output_iter: Vec<_> = outputs.iter().collect();
        let output = output_iter
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| output_iter.first())
            .map(|(_, v)| v)
            .ok_or_else(|| Error::embedding("No output tensor"))?;

        let (tensor_shape, tensor_data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::embedding(format!("Failed to extract tensor: {}", e)))?;

        let dims: Vec<usize> = tensor_shape.iter().map(|&d| d as usize).collect();
        let hidden_size = dims.get(2).copied().unwrap_or(self.dimensions);

        Ok(mean_pool(tensor_data, &batch.attention_mask, batch_size, max_len, hidden_size))
    }
}

/// Tokenizer output for one text
struct TokenRow<'a> {
    ids: &'a [u32],
    mask: &'a [u32],
    types: &'a [u32],
}

/// Row-major `[batch, seq_len]` model inputs; rows are truncated to
/// `max_length` and zero-padded to the longest row
struct PaddedBatch {
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    token_type_ids: Vec<i64>,
    seq_len: usize,
}

impl PaddedBatch {
    fn from_rows(rows: &[TokenRow<'_>], max_length: usize) -> Self {
        let seq_len = rows
            .iter()
            .map(|r| r.ids.len())
            .max()
            .unwrap_or(0)
            .clamp(1, max_length.max(1));

        let mut input_ids = vec![0i64; rows.len() * seq_len];
        let mut attention_mask = vec![0i64; rows.len() * seq_len];
        let mut token_type_ids = vec![0i64; rows.len() * seq_len];

        for (i, row) in rows.iter().enumerate() {
            let offset = i * seq_len;
            for j in 0..row.ids.len().min(seq_len) {
                input_ids[offset + j] = row.ids[j] as i64;
                attention_mask[offset + j] = row.mask.get(j).copied().unwrap_or(1) as i64;
                token_type_ids[offset + j] = row.types.get(j).copied().unwrap_or(0) as i64;
            }
        }

        Self {
            input_ids,
            attention_mask,
            token_type_ids,
            seq_len,
        }
    }
}

/// Attention-masked mean pooling followed by L2 normalisation
fn mean_pool(
    hidden: &[f32],
    attention_mask: &[i64],
    batch_size: usize,
    seq_len: usize,
    hidden_size: usize,
) -> Vec<Vec<f32>> {
    let mut embeddings = Vec::with_capacity(batch_size);

    for i in 0..batch_size {
        let mut sum = vec![0.0f32; hidden_size];
        let mut count = 0.0f32;

        for j in 0..seq_len {
            let mask_val = attention_mask[i * seq_len + j] as f32;
            if mask_val > 0.0 {
                for (k, slot) in sum.iter_mut().enumerate() {
                    let idx = i * seq_len * hidden_size + j * hidden_size + k;
                    if let Some(v) = hidden.get(idx) {
                        *slot += v * mask_val;
                    }
                }
                count += mask_val;
            }
        }

        if count > 0.0 {
            for val in &mut sum {
                *val /= count;
            }
        }

        let norm: f32 = sum.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut sum {
                *val /= norm;
            }
        }

        embeddings.push(sum);
    }

    embeddings
}

/// Download a model artifact; written to a temporary name first so an
/// interrupted download is retried on the next start
async fn download_file(url: &str, path: &Path) -> Result<()> {
    tracing::info!("Downloading {}", url);

    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::embedding(format!("Failed to download {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(Error::embedding(format!(
            "Download of {} failed: HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::embedding(format!("Failed to read {}: {}", url, e)))?;

    let partial = path.with_extension("part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, path).await?;

    tracing::info!("Saved {:?} ({} bytes)", path, bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_batch_pads_and_truncates() {
        let rows = [
            TokenRow {
                ids: &[101, 7, 102],
                mask: &[1, 1, 1],
                types: &[0, 0, 0],
            },
            TokenRow {
                ids: &[101, 102],
                mask: &[1, 1],
                types: &[0, 0],
            },
        ];

        let batch = PaddedBatch::from_rows(&rows, 8);
        assert_eq!(batch.seq_len, 3);
        assert_eq!(batch.input_ids, vec![101, 7, 102, 101, 102, 0]);
        assert_eq!(batch.attention_mask, vec![1, 1, 1, 1, 1, 0]);
        assert_eq!(batch.token_type_ids, vec![0; 6]);

        let truncated = PaddedBatch::from_rows(&rows, 2);
        assert_eq!(truncated.seq_len, 2);
        assert_eq!(truncated.input_ids, vec![101, 7, 101, 102]);
    }

    #[test]
    fn test_mean_pool_ignores_padding() {
        // batch 1, seq 2, hidden 2; second token is padding
        let hidden = [3.0, 4.0, 100.0, 100.0];
        let mask = [1, 0];
        let pooled = mean_pool(&hidden, &mask, 1, 2, 2);
        assert_eq!(pooled.len(), 1);
        assert!((pooled[0][0] - 0.6).abs() < 1e-6);
        assert!((pooled[0][1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_mean_pool_is_normalised() {
        let hidden = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let mask = [1, 1, 1, 1];
        let pooled = mean_pool(&hidden, &mask, 2, 2, 2);
        for v in pooled {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }
}
