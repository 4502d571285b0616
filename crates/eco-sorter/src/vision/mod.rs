//! Photo-based waste classification

mod category;
mod yolo;

pub use category::{Prediction, WasteCategory, GENERIC_QUESTION};
pub use yolo::{decode_output, is_supported_image, letterbox, preprocess, YoloClassifier};

use async_trait::async_trait;
use crate::error::Result;

/// Trait for image-based waste classifiers
#[async_trait]
pub trait WasteClassifier: Send + Sync {
    /// Classify the main object in an encoded JPEG or PNG photo
    async fn classify(&self, image_bytes: &[u8]) -> Result<Prediction>;

    /// Get classifier name for logging
    fn name(&self) -> &str;
}
