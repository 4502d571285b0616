//! Local embedding models

mod onnx_embedder;

pub use onnx_embedder::OnnxEmbedder;
